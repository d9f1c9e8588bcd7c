//! Bridge onto the shared collaborative text type (yrs).
//!
//! `TextOperation`s are designed to be passed straight into a shared
//! text's `insert`/`delete` mutators; this module provides that
//! surface over a `yrs::Doc` configured for UTF-16 offsets so both
//! sides speak the same coordinate space. Multi-writer merging stays
//! yrs's job — nothing here resolves concurrent edits.

use yrs::{Doc, GetString, Observable, OffsetKind, Options, Subscription, Text, TextRef, Transact};

use scribe_core::{diff, TextOperation};

/// A single shared text block.
pub struct SharedText {
    doc: Doc,
    text: TextRef,
}

impl SharedText {
    /// Create an empty shared text with UTF-16 offset addressing.
    pub fn new() -> Self {
        let mut options = Options::default();
        options.offset_kind = OffsetKind::Utf16;
        let doc = Doc::with_options(options);
        let text = doc.get_or_insert_text("content");
        Self { doc, text }
    }

    /// Create seeded with initial content.
    pub fn with_content(content: &str) -> Self {
        let shared = Self::new();
        if !content.is_empty() {
            shared.insert(0, content);
        }
        shared
    }

    /// Current full content.
    pub fn contents(&self) -> String {
        let txn = self.doc.transact();
        self.text.get_string(&txn)
    }

    /// Insert `chunk` at a UTF-16 offset.
    pub fn insert(&self, position: usize, chunk: &str) {
        let mut txn = self.doc.transact_mut();
        self.text.insert(&mut txn, position as u32, chunk);
    }

    /// Delete `length` UTF-16 code units starting at `position`.
    pub fn delete(&self, position: usize, length: usize) {
        let mut txn = self.doc.transact_mut();
        self.text.remove_range(&mut txn, position as u32, length as u32);
    }

    /// Apply a diffed operation directly.
    pub fn apply_operation(&self, op: &TextOperation) {
        match op {
            TextOperation::Insert { position, text } => self.insert(*position, text),
            TextOperation::Delete { position, length } => self.delete(*position, *length),
        }
    }

    /// Converge to `new_content` via the diff engine.
    ///
    /// This is the coarse-event path: when only a whole-buffer
    /// snapshot is available, turn it into minimal operations and
    /// apply them. Returns the operations for recording/transmission.
    pub fn diff_and_apply(&self, new_content: &str) -> Vec<TextOperation> {
        let ops = diff(&self.contents(), new_content);
        for op in &ops {
            self.apply_operation(op);
        }
        ops
    }

    /// Subscribe to content changes; the callback receives the new
    /// full content. Dropping the returned subscription unsubscribes.
    pub fn subscribe(
        &self,
        callback: impl Fn(String) + Send + Sync + 'static,
    ) -> Subscription {
        self.text.observe(move |txn, event| {
            callback(event.target().get_string(txn));
        })
    }

    /// Underlying document, for sync integration.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }
}

impl Default for SharedText {
    fn default() -> Self {
        Self::new()
    }
}
