//! Text operations over UTF-16 code-unit offsets.
//!
//! An operation addresses the *pre-operation* string: `Insert` splices
//! text in at `position`, `Delete` removes `length` code units starting
//! at `position`. Positions are UTF-16 code units, not bytes or chars,
//! so they line up with editor caret offsets and shared-text indices.

use serde::{Deserialize, Serialize};

/// A single position-addressed edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextOperation {
    Insert { position: usize, text: String },
    Delete { position: usize, length: usize },
}

impl TextOperation {
    /// The position this operation applies at.
    pub fn position(&self) -> usize {
        match self {
            Self::Insert { position, .. } | Self::Delete { position, .. } => *position,
        }
    }

    /// Net length change in UTF-16 code units (+ for Insert, - for Delete).
    pub fn len_delta(&self) -> isize {
        match self {
            Self::Insert { text, .. } => utf16_len(text) as isize,
            Self::Delete { length, .. } => -(*length as isize),
        }
    }
}

/// Errors from strict operation application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    /// The operation's span does not fit the content it was applied to.
    /// Indicates a desynchronized log, not a recoverable edit.
    OutOfBounds {
        position: usize,
        length: usize,
        content_len: usize,
    },
}

impl std::fmt::Display for OpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBounds {
                position,
                length,
                content_len,
            } => write!(
                f,
                "operation span {position}+{length} exceeds content length {content_len}"
            ),
        }
    }
}

impl std::error::Error for OpError {}

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn to_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Apply one operation strictly.
///
/// An `Insert` past the end of the content or a `Delete` whose
/// `position + length` exceeds it returns [`OpError::OutOfBounds`];
/// nothing is clamped silently.
pub fn apply(content: &str, op: &TextOperation) -> Result<String, OpError> {
    let mut units = to_units(content);
    match op {
        TextOperation::Insert { position, text } => {
            if *position > units.len() {
                return Err(OpError::OutOfBounds {
                    position: *position,
                    length: 0,
                    content_len: units.len(),
                });
            }
            let chunk: Vec<u16> = text.encode_utf16().collect();
            units.splice(*position..*position, chunk);
        }
        TextOperation::Delete { position, length } => {
            let end = position.checked_add(*length).unwrap_or(usize::MAX);
            if end > units.len() {
                return Err(OpError::OutOfBounds {
                    position: *position,
                    length: *length,
                    content_len: units.len(),
                });
            }
            units.drain(*position..end);
        }
    }
    Ok(String::from_utf16_lossy(&units))
}

/// Apply a sequence of operations strictly, left to right.
pub fn apply_all(content: &str, ops: &[TextOperation]) -> Result<String, OpError> {
    let mut current = content.to_string();
    for op in ops {
        current = apply(&current, op)?;
    }
    Ok(current)
}

/// Apply one operation, clamping out-of-range spans.
///
/// Used inside replay folds where a deep error return is unavailable.
/// Any clamp is logged as a warning because it means the log and the
/// content have drifted apart.
pub fn apply_clamped(content: &str, op: &TextOperation) -> String {
    let mut units = to_units(content);
    match op {
        TextOperation::Insert { position, text } => {
            let at = if *position > units.len() {
                log::warn!(
                    "insert position {} clamped to content length {}",
                    position,
                    units.len()
                );
                units.len()
            } else {
                *position
            };
            let chunk: Vec<u16> = text.encode_utf16().collect();
            units.splice(at..at, chunk);
        }
        TextOperation::Delete { position, length } => {
            let wanted_end = position.checked_add(*length).unwrap_or(usize::MAX);
            let start = (*position).min(units.len());
            let end = wanted_end.min(units.len());
            if start != *position || end != wanted_end {
                log::warn!(
                    "delete span {}+{} clamped to {}..{} (content length {})",
                    position,
                    length,
                    start,
                    end,
                    units.len()
                );
            }
            units.drain(start..end);
        }
    }
    String::from_utf16_lossy(&units)
}
