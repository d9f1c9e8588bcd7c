//! # scribe-core — Text operation primitives for Scribe
//!
//! Pure, synchronous building blocks for the operation log:
//!
//! ```text
//! "hello world" ──┐
//!                 ├── diff() ──► [Delete, Insert] ──► apply() ──► "hallo world"
//! "hallo world" ──┘                    │
//!                                      └── remap_cursor() ──► caret offset
//! ```
//!
//! ## Modules
//!
//! - [`op`] — [`TextOperation`] plus UTF-16 position arithmetic
//! - [`diff`] — common-prefix/suffix diff between two snapshots
//! - [`cursor`] — caret remapping across an applied diff
//!
//! All positions and lengths are **UTF-16 code units** over the
//! pre-operation string, matching the coordinate space of editor
//! surfaces and of Yjs-style shared text types.

pub mod cursor;
pub mod diff;
pub mod op;

pub use cursor::remap_cursor;
pub use diff::diff;
pub use op::{apply, apply_all, apply_clamped, utf16_len, OpError, TextOperation};
