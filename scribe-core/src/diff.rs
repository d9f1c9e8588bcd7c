//! Common-prefix/suffix diff between two whole-string snapshots.
//!
//! Tuned for the single contiguous edit region produced by interactive
//! typing, paste, and IME composition: find the longest unchanged
//! prefix and suffix, treat only the middle span as changed, and emit
//! at most one Delete followed by one Insert. This is deliberately
//! *not* a general minimal diff — two disjoint edits in one update
//! collapse into a single replaced span covering both.

use crate::op::TextOperation;

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..0xDC00).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..0xE000).contains(&unit)
}

/// Compute the operations that turn `old` into `new`.
///
/// Returns 0, 1, or 2 operations: nothing when the strings are equal,
/// otherwise a Delete of the changed middle of `old` (if non-empty)
/// followed by an Insert of the changed middle of `new` (if
/// non-empty), both positioned at the end of the common prefix.
/// Positions and lengths are UTF-16 code units.
pub fn diff(old: &str, new: &str) -> Vec<TextOperation> {
    if old == new {
        return Vec::new();
    }

    let a: Vec<u16> = old.encode_utf16().collect();
    let b: Vec<u16> = new.encode_utf16().collect();

    let mut prefix = a
        .iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .count();
    // Never cut between the halves of a surrogate pair.
    if prefix > 0 && is_high_surrogate(a[prefix - 1]) {
        prefix -= 1;
    }

    // Suffix search is bounded so it cannot overlap the prefix.
    let max_suffix = a.len().min(b.len()) - prefix;
    let mut suffix = 0;
    while suffix < max_suffix && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix] {
        suffix += 1;
    }
    if suffix > 0 && is_low_surrogate(a[a.len() - suffix]) {
        suffix -= 1;
    }

    let mut ops = Vec::with_capacity(2);
    let removed = a.len() - prefix - suffix;
    if removed > 0 {
        ops.push(TextOperation::Delete {
            position: prefix,
            length: removed,
        });
    }
    let inserted = &b[prefix..b.len() - suffix];
    if !inserted.is_empty() {
        ops.push(TextOperation::Insert {
            position: prefix,
            text: String::from_utf16_lossy(inserted),
        });
    }
    ops
}
