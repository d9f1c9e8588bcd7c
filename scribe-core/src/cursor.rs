//! Caret remapping across a content change.
//!
//! Folds the effect of `diff(old, new)` onto a caret offset so that a
//! programmatic consumer (replay, or any path that only has the
//! pre/post strings) can keep a cursor in place without DOM-level
//! selection preservation.

use crate::diff::diff;
use crate::op::{utf16_len, TextOperation};

/// Remap a caret offset from `old` into `new`.
///
/// For a Delete wholly before the caret the caret moves left by the
/// deleted length; a Delete containing the caret clamps it to the
/// deletion point; an Insert at or before the caret pushes it right by
/// the inserted length. The result is always within
/// `[0, utf16_len(new)]`.
pub fn remap_cursor(old: &str, new: &str, old_cursor: usize) -> usize {
    let mut cursor = old_cursor;
    for op in diff(old, new) {
        match op {
            TextOperation::Delete { position, length } => {
                if position + length <= cursor {
                    cursor -= length;
                } else if position < cursor {
                    cursor = position;
                }
            }
            TextOperation::Insert { position, text } => {
                if position <= cursor {
                    cursor += utf16_len(&text);
                }
            }
        }
    }
    cursor.min(utf16_len(new))
}
