//! # scribe-collab — Operation log & wire protocol for Scribe
//!
//! Converts whole-buffer change events into a minimal operation log,
//! carries operation messages over a symmetric JSON/binary wire
//! protocol, and records/replays attributed edit history per page.
//!
//! ## Architecture
//!
//! ```text
//! local edit (full snapshot)
//!       │
//!       ▼
//! scribe_core::diff ──► TextOperation
//!       │                      │
//!       │                      ▼
//!       │               WireCodec (json | binary) ──► transport
//!       ▼
//! OperationRecorder ──► ReplaySession ──► SessionStore (memory | RocksDB+LZ4)
//!                            │
//!                            ▼
//!                      ReplayEngine (play / pause / seek, one timer)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — `WireMessage`, type-code table, JSON + binary codecs
//! - [`recorder`] — bounded, age-limited attributed operation log
//! - [`replay`] — deterministic state reconstruction and timed playback
//! - [`storage`] — keyed session store (in-memory and RocksDB backends)
//! - [`ytext`] — bridge onto a Yjs-style shared text type (yrs)

pub mod protocol;
pub mod recorder;
pub mod replay;
pub mod storage;
pub mod ytext;

// Re-exports for convenience
pub use protocol::{
    decode_frame, BinaryCodec, JsonCodec, MessageType, ProtocolError, WireCodec, WireFrame,
    WireMessage,
};
pub use recorder::{
    AuthorInfo, OperationDraft, OperationRecorder, RecordedOperation, RecordedPayload,
    ReplaySession, MAX_OPERATIONS, MAX_SESSION_AGE_MS,
};
pub use replay::{
    reconstruct_state, PlaybackSpeed, PlaybackState, ReplayEngine, ReplayEvent,
};
pub use storage::{MemoryStore, RocksConfig, RocksStore, SessionStore, StoreError};
pub use ytext::SharedText;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
