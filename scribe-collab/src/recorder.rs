//! Attributed operation log with bounded, best-effort persistence.
//!
//! Every local content change becomes a [`RecordedOperation`] appended
//! to the page's [`ReplaySession`]. The log is capped (oldest entries
//! dropped first) and the whole session expires by age, checked at
//! load time. Persistence is fire-and-forget: a failed store write is
//! logged and swallowed, the in-memory session stays authoritative for
//! the current process.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scribe_core::TextOperation;

use crate::now_ms;
use crate::storage::SessionStore;

/// Maximum operations kept per session (FIFO trim beyond this).
pub const MAX_OPERATIONS: usize = 500;

/// Sessions older than this at load time are discarded.
pub const MAX_SESSION_AGE_MS: i64 = 24 * 60 * 60 * 1000;

/// What a recorded operation did to its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedPayload {
    Insert { position: usize, text: String },
    Delete { position: usize, length: usize },
    /// Full replacement content, used to seed or checkpoint a block
    /// without replaying every keystroke.
    Snapshot { content: String },
}

impl RecordedPayload {
    /// View as a plain text operation, if it is one.
    pub fn as_text_op(&self) -> Option<TextOperation> {
        match self {
            Self::Insert { position, text } => Some(TextOperation::Insert {
                position: *position,
                text: text.clone(),
            }),
            Self::Delete { position, length } => Some(TextOperation::Delete {
                position: *position,
                length: *length,
            }),
            Self::Snapshot { .. } => None,
        }
    }
}

impl From<TextOperation> for RecordedPayload {
    fn from(op: TextOperation) -> Self {
        match op {
            TextOperation::Insert { position, text } => Self::Insert { position, text },
            TextOperation::Delete { position, length } => Self::Delete { position, length },
        }
    }
}

/// Author identity attached to recorded operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub user_id: String,
    pub user_name: String,
    /// CSS-style hex color for history rendering
    pub user_color: String,
}

impl AuthorInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Create with an explicit id; the color is derived from it so the
    /// same author always renders the same.
    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        let color = format!("#{:06x}", (id.as_u128() & 0xFF_FFFF) as u32);
        Self {
            user_id: id.to_string(),
            user_name: name.into(),
            user_color: color,
        }
    }
}

/// A fully attributed entry in the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedOperation {
    pub id: String,
    /// Milliseconds since epoch, assigned at record time
    pub timestamp: i64,
    pub block_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_color: String,
    #[serde(flatten)]
    pub payload: RecordedPayload,
}

/// What callers hand to [`OperationRecorder::record`]: everything but
/// the id and timestamp, which the recorder assigns.
#[derive(Debug, Clone)]
pub struct OperationDraft {
    pub block_id: String,
    pub author: AuthorInfo,
    pub payload: RecordedPayload,
}

impl OperationDraft {
    pub fn edit(block_id: impl Into<String>, author: AuthorInfo, op: TextOperation) -> Self {
        Self {
            block_id: block_id.into(),
            author,
            payload: op.into(),
        }
    }

    pub fn snapshot(
        block_id: impl Into<String>,
        author: AuthorInfo,
        content: impl Into<String>,
    ) -> Self {
        Self {
            block_id: block_id.into(),
            author,
            payload: RecordedPayload::Snapshot {
                content: content.into(),
            },
        }
    }
}

/// One page's bounded, age-limited edit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySession {
    pub page_id: String,
    /// Creation time in milliseconds since epoch
    pub start_time: i64,
    /// Block contents at session start
    pub initial_snapshot: HashMap<String, String>,
    /// Append-only, ordered by recording time
    pub operations: Vec<RecordedOperation>,
}

impl ReplaySession {
    pub fn new(page_id: impl Into<String>, initial_snapshot: HashMap<String, String>) -> Self {
        Self {
            page_id: page_id.into(),
            start_time: now_ms(),
            initial_snapshot,
            operations: Vec::new(),
        }
    }

    /// Drop oldest entries beyond [`MAX_OPERATIONS`], preserving the
    /// relative order of what remains.
    pub fn trim(&mut self) {
        if self.operations.len() > MAX_OPERATIONS {
            let excess = self.operations.len() - MAX_OPERATIONS;
            self.operations.drain(..excess);
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now - self.start_time > MAX_SESSION_AGE_MS
    }
}

/// Records attributed operations and persists sessions to a keyed
/// store under `"<prefix>:<page_id>"`.
pub struct OperationRecorder {
    store: Arc<dyn SessionStore>,
    prefix: String,
}

impl OperationRecorder {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_prefix(store, "replay")
    }

    pub fn with_prefix(store: Arc<dyn SessionStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, page_id: &str) -> String {
        format!("{}:{}", self.prefix, page_id)
    }

    /// Build a fresh session with an empty operation list and persist
    /// it immediately.
    pub fn create_session(
        &self,
        page_id: impl Into<String>,
        initial_snapshot: HashMap<String, String>,
    ) -> ReplaySession {
        let session = ReplaySession::new(page_id, initial_snapshot);
        self.persist(&session);
        session
    }

    /// Load the persisted session for a page.
    ///
    /// Returns `None` if nothing is persisted, the stored value is
    /// unreadable, or the session has expired; stale and corrupt
    /// entries are deleted as a side effect.
    pub fn load_session(&self, page_id: &str) -> Option<ReplaySession> {
        let key = self.key(page_id);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("failed to read session {key}: {e}");
                return None;
            }
        };

        let session: ReplaySession = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("discarding unreadable session {key}: {e}");
                let _ = self.store.remove(&key);
                return None;
            }
        };

        if session.is_expired(now_ms()) {
            log::info!("session {key} expired, deleting");
            if let Err(e) = self.store.remove(&key) {
                log::warn!("failed to delete expired session {key}: {e}");
            }
            return None;
        }

        Some(session)
    }

    /// Assign an id and timestamp to `draft`, append it, trim, and
    /// persist. Returns the assigned operation id.
    pub fn record(&self, session: &mut ReplaySession, draft: OperationDraft) -> String {
        let id = Uuid::new_v4().to_string();
        session.operations.push(RecordedOperation {
            id: id.clone(),
            timestamp: now_ms(),
            block_id: draft.block_id,
            user_id: draft.author.user_id,
            user_name: draft.author.user_name,
            user_color: draft.author.user_color,
            payload: draft.payload,
        });
        session.trim();
        self.persist(session);
        id
    }

    /// Remove a page's persisted session (e.g. on page reset).
    pub fn clear_session(&self, page_id: &str) {
        let key = self.key(page_id);
        if let Err(e) = self.store.remove(&key) {
            log::warn!("failed to clear session {key}: {e}");
        }
    }

    /// Best-effort write; failures never reach the edit path.
    fn persist(&self, session: &ReplaySession) {
        let key = self.key(&session.page_id);
        let json = match serde_json::to_string(session) {
            Ok(j) => j,
            Err(e) => {
                log::warn!("failed to serialize session {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(&key, &json) {
            log::warn!("failed to persist session {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoreError};

    fn recorder() -> (OperationRecorder, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (OperationRecorder::new(store.clone()), store)
    }

    fn author() -> AuthorInfo {
        AuthorInfo::with_id(
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            "Alice",
        )
    }

    fn insert_draft(text: &str, position: usize) -> OperationDraft {
        OperationDraft::edit(
            "b1",
            author(),
            TextOperation::Insert {
                position,
                text: text.into(),
            },
        )
    }

    #[test]
    fn test_create_session_persists() {
        let (recorder, store) = recorder();
        let session = recorder.create_session("p1", HashMap::new());
        assert!(session.operations.is_empty());
        assert!(store.get("replay:p1").unwrap().is_some());
    }

    #[test]
    fn test_record_assigns_id_and_timestamp() {
        let (recorder, _) = recorder();
        let mut session = recorder.create_session("p1", HashMap::new());
        let id = recorder.record(&mut session, insert_draft("hi", 0));

        assert_eq!(session.operations.len(), 1);
        let op = &session.operations[0];
        assert_eq!(op.id, id);
        assert!(op.timestamp > 0);
        assert_eq!(op.user_name, "Alice");
        assert_eq!(
            op.payload,
            RecordedPayload::Insert {
                position: 0,
                text: "hi".into()
            }
        );
    }

    #[test]
    fn test_load_roundtrip() {
        let (recorder, _) = recorder();
        let mut snapshot = HashMap::new();
        snapshot.insert("b1".to_string(), "hello".to_string());
        let mut session = recorder.create_session("p1", snapshot);
        recorder.record(&mut session, insert_draft("!", 5));

        let loaded = recorder.load_session("p1").unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (recorder, _) = recorder();
        assert!(recorder.load_session("nope").is_none());
    }

    #[test]
    fn test_expired_session_deleted_on_load() {
        let (recorder, store) = recorder();
        let mut session = recorder.create_session("p1", HashMap::new());
        session.start_time = now_ms() - MAX_SESSION_AGE_MS - 1;
        // Persist the aged session directly.
        store
            .set("replay:p1", &serde_json::to_string(&session).unwrap())
            .unwrap();

        assert!(recorder.load_session("p1").is_none());
        assert!(store.get("replay:p1").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_session_deleted_on_load() {
        let (recorder, store) = recorder();
        store.set("replay:p1", "{broken").unwrap();
        assert!(recorder.load_session("p1").is_none());
        assert!(store.get("replay:p1").unwrap().is_none());
    }

    #[test]
    fn test_trim_keeps_newest_in_order() {
        let (recorder, _) = recorder();
        let mut session = recorder.create_session("p1", HashMap::new());
        for i in 0..MAX_OPERATIONS {
            recorder.record(&mut session, insert_draft(&i.to_string(), 0));
        }
        assert_eq!(session.operations.len(), MAX_OPERATIONS);
        let previously_second = session.operations[1].id.clone();

        // The 501st record drops the oldest entry.
        recorder.record(&mut session, insert_draft("last", 0));
        assert_eq!(session.operations.len(), MAX_OPERATIONS);
        assert_eq!(session.operations[0].id, previously_second);
        if let RecordedPayload::Insert { text, .. } =
            &session.operations[MAX_OPERATIONS - 1].payload
        {
            assert_eq!(text, "last");
        } else {
            panic!("expected insert");
        }
    }

    #[test]
    fn test_clear_session() {
        let (recorder, store) = recorder();
        recorder.create_session("p1", HashMap::new());
        recorder.clear_session("p1");
        assert!(store.get("replay:p1").unwrap().is_none());
    }

    #[test]
    fn test_custom_prefix_keying() {
        let store = Arc::new(MemoryStore::new());
        let recorder = OperationRecorder::with_prefix(store.clone(), "history");
        recorder.create_session("p1", HashMap::new());
        assert!(store.get("history:p1").unwrap().is_some());
        assert!(store.get("replay:p1").unwrap().is_none());
    }

    #[test]
    fn test_store_failure_is_swallowed() {
        struct FailingStore;
        impl SessionStore for FailingStore {
            fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
                Err(StoreError::Backend("unavailable".into()))
            }
            fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
                Err(StoreError::Backend("quota exceeded".into()))
            }
            fn remove(&self, _: &str) -> Result<(), StoreError> {
                Err(StoreError::Backend("unavailable".into()))
            }
        }

        let recorder = OperationRecorder::new(Arc::new(FailingStore));
        let mut session = recorder.create_session("p1", HashMap::new());
        // The in-memory session stays authoritative.
        recorder.record(&mut session, insert_draft("hi", 0));
        assert_eq!(session.operations.len(), 1);
        assert!(recorder.load_session("p1").is_none());
        recorder.clear_session("p1");
    }

    #[test]
    fn test_author_color_stable() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let a = AuthorInfo::with_id(id, "A");
        let b = AuthorInfo::with_id(id, "A");
        assert_eq!(a.user_color, b.user_color);
        assert!(a.user_color.starts_with('#'));
        assert_eq!(a.user_color.len(), 7);
    }

    #[test]
    fn test_session_json_shape() {
        let op = RecordedOperation {
            id: "op1".into(),
            timestamp: 10,
            block_id: "b1".into(),
            user_id: "u1".into(),
            user_name: "Alice".into(),
            user_color: "#aabbcc".into(),
            payload: RecordedPayload::Delete {
                position: 2,
                length: 3,
            },
        };
        let json = serde_json::to_value(&op).unwrap();
        // Payload flattens next to the attribution fields.
        assert_eq!(json["kind"], "delete");
        assert_eq!(json["position"], 2);
        assert_eq!(json["length"], 3);
        assert_eq!(json["block_id"], "b1");
        let back: RecordedOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
