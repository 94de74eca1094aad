//! Text coordinates and half-open intervals over them
//!
//! Positions are `(line, column)` pairs ordered lexicographically. Columns are
//! counted in chars, which is what [`TextEdit::insertion`] assumes when it
//! derives the end of an inserted span.
//!
//! [`TextEdit::insertion`]: crate::model::edit::TextEdit::insertion

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::edit::TextEdit;

/// A `(line, column)` coordinate in a text document, both 0-indexed
///
/// The derived ordering compares `line` first, then `column`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The position one column to the right on the same line
    pub fn next_column(self) -> Self {
        Self::new(self.line, self.column + 1)
    }

    /// Shift this position for text inserted at `from`
    ///
    /// `to` is where the inserted text ends, in the new coordinate space.
    /// A position exactly at `from` only moves when `is_start` is set: the
    /// start of an interval sticks to the text that follows the insertion
    /// point while an end sticks to the text before it.
    ///
    /// An insertion whose `to` is not after `from` leaves the position alone.
    pub fn on_inserted_text(&mut self, from: TextPosition, to: TextPosition, is_start: bool) {
        self.apply_edit(&TextEdit::Insert { from, to }, is_start);
    }

    /// Shift this position for the text between `from` and `to` (old
    /// coordinates) having been removed
    ///
    /// Anything inside the removed span collapses onto `from`. A removal
    /// whose `from` is not before `to` leaves the position alone.
    pub fn on_removed_text(&mut self, from: TextPosition, to: TextPosition) {
        self.apply_edit(&TextEdit::Remove { from, to }, false);
    }

    /// Shift this position for `edit`, see [`TextPosition::on_inserted_text`]
    /// for the meaning of `is_start`
    pub fn apply_edit(&mut self, edit: &TextEdit, is_start: bool) {
        if edit.is_noop() {
            return;
        }
        match *edit {
            TextEdit::Insert { from, to } => self.shift_for_insertion(from, to, is_start),
            TextEdit::Remove { from, to } => self.shift_for_removal(from, to),
        }
    }

    fn shift_for_insertion(&mut self, from: TextPosition, to: TextPosition, is_start: bool) {
        if self.line < from.line {
            return;
        }

        if self.line == from.line {
            if self.column < from.column || (self.column == from.column && !is_start) {
                return;
            }
            self.column = to.column + (self.column - from.column);
            self.line = to.line;
        } else {
            self.line += to.line - from.line;
        }
    }

    fn shift_for_removal(&mut self, from: TextPosition, to: TextPosition) {
        if *self < from {
            return;
        }
        if *self < to {
            *self = from;
            return;
        }

        if self.line == to.line {
            self.column = from.column + (self.column - to.column);
            self.line = from.line;
        } else {
            self.line -= to.line - from.line;
        }
    }

}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

impl From<(usize, usize)> for TextPosition {
    fn from((line, column): (usize, usize)) -> Self {
        Self::new(line, column)
    }
}

/// How degenerate intervals (`start >= end`) are treated on construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    /// Extend `end` to one column past `start`
    #[default]
    Repair,
    /// Reject with [`IntervalError::InvalidInterval`]
    Strict,
}

/// Errors raised while building intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    /// `start` is not strictly before `end`
    InvalidInterval {
        start: TextPosition,
        end: TextPosition,
    },
}

impl fmt::Display for IntervalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalError::InvalidInterval { start, end } => write!(
                f,
                "Invalid interval: start {start} must be before end {end}"
            ),
        }
    }
}

impl std::error::Error for IntervalError {}

/// Half-open span `[start, end)` over text positions
///
/// A constructed interval always satisfies `start < end`, deserialization
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "IntervalParts")]
pub struct TextInterval {
    pub(crate) start: TextPosition,
    pub(crate) end: TextPosition,
}

#[derive(Deserialize)]
struct IntervalParts {
    start: TextPosition,
    end: TextPosition,
}

impl TryFrom<IntervalParts> for TextInterval {
    type Error = IntervalError;

    fn try_from(parts: IntervalParts) -> Result<Self, Self::Error> {
        Self::try_new(parts.start, parts.end)
    }
}

impl TextInterval {
    /// Build an interval, repairing a degenerate one by extending `end` to
    /// the column after `start`
    pub fn new(start: impl Into<TextPosition>, end: impl Into<TextPosition>) -> Self {
        let start = start.into();
        let mut end = end.into();
        if start >= end {
            tracing::trace!("Repairing degenerate interval {} -> {}", start, end);
            end = start.next_column();
        }
        Self { start, end }
    }

    /// Build an interval, rejecting `start >= end`
    pub fn try_new(
        start: impl Into<TextPosition>,
        end: impl Into<TextPosition>,
    ) -> Result<Self, IntervalError> {
        let start = start.into();
        let end = end.into();
        if start >= end {
            return Err(IntervalError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build an interval according to `validation`
    pub fn with_validation(
        start: impl Into<TextPosition>,
        end: impl Into<TextPosition>,
        validation: Validation,
    ) -> Result<Self, IntervalError> {
        match validation {
            Validation::Repair => Ok(Self::new(start, end)),
            Validation::Strict => Self::try_new(start, end),
        }
    }

    pub fn start(&self) -> TextPosition {
        self.start
    }

    pub fn end(&self) -> TextPosition {
        self.end
    }

    /// Whether the two intervals share at least one position
    ///
    /// Intervals that merely touch (`self.end == other.start`) do not overlap.
    pub fn overlaps(&self, other: &TextInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `position` lies inside `[start, end)`
    pub fn contains(&self, position: TextPosition) -> bool {
        self.start <= position && position < self.end
    }

    /// Rebuild an interval from parts already known to be ordered
    pub(crate) fn spanning(start: TextPosition, end: TextPosition) -> Self {
        debug_assert!(start < end);
        Self { start, end }
    }

    /// Whether shifting has collapsed the interval
    pub(crate) fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for TextInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> TextPosition {
        TextPosition::new(line, column)
    }

    #[test]
    fn test_position_ordering_is_line_major() {
        assert!(pos(0, 10) < pos(1, 0));
        assert!(pos(1, 2) < pos(1, 3));
        assert_eq!(pos(2, 2).cmp(&pos(2, 2)), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_degenerate_interval_is_repaired() {
        let interval = TextInterval::new((3, 4), (3, 4));
        assert_eq!(interval.start(), pos(3, 4));
        assert_eq!(interval.end(), pos(3, 5));

        let inverted = TextInterval::new((3, 4), (1, 0));
        assert_eq!(inverted.end(), pos(3, 5));
    }

    #[test]
    fn test_strict_construction_rejects_degenerate_interval() {
        let err = TextInterval::try_new((1, 1), (1, 1)).unwrap_err();
        assert_eq!(
            err,
            IntervalError::InvalidInterval {
                start: pos(1, 1),
                end: pos(1, 1)
            }
        );
        assert!(err.to_string().contains("(1, 1)"));

        assert!(TextInterval::with_validation((0, 0), (0, 1), Validation::Strict).is_ok());
        assert!(TextInterval::with_validation((0, 1), (0, 0), Validation::Strict).is_err());
        assert!(TextInterval::with_validation((0, 1), (0, 0), Validation::Repair).is_ok());
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        let a = TextInterval::new((0, 0), (0, 5));
        let b = TextInterval::new((0, 5), (1, 0));
        let c = TextInterval::new((0, 4), (0, 6));

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_multiline_overlap_compares_lexicographically() {
        let a = TextInterval::new((1, 8), (3, 0));
        let b = TextInterval::new((2, 50), (2, 60));
        let c = TextInterval::new((3, 0), (3, 1));

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.contains(pos(2, 99)));
        assert!(!a.contains(pos(3, 0)));
    }

    #[test]
    fn test_insert_before_position_on_same_line() {
        // Two new lines inserted at (0, 1), ending at (2, 0)
        let mut p = pos(0, 5);
        p.on_inserted_text(pos(0, 1), pos(2, 0), true);
        assert_eq!(p, pos(2, 4));
    }

    #[test]
    fn test_insert_boundary_depends_on_start_flag() {
        let mut start = pos(0, 1);
        let mut end = pos(0, 1);
        start.on_inserted_text(pos(0, 1), pos(0, 4), true);
        end.on_inserted_text(pos(0, 1), pos(0, 4), false);

        assert_eq!(start, pos(0, 4));
        assert_eq!(end, pos(0, 1));
    }

    #[test]
    fn test_insert_on_earlier_line_shifts_lines_only() {
        let mut p = pos(5, 7);
        p.on_inserted_text(pos(2, 3), pos(4, 1), false);
        assert_eq!(p, pos(7, 7));

        let mut before = pos(2, 2);
        before.on_inserted_text(pos(2, 3), pos(4, 1), true);
        assert_eq!(before, pos(2, 2));
    }

    #[test]
    fn test_removal_collapses_and_pulls_back() {
        let from = pos(1, 2);
        let to = pos(3, 4);

        let mut before = pos(1, 1);
        before.on_removed_text(from, to);
        assert_eq!(before, pos(1, 1));

        let mut inside = pos(2, 9);
        inside.on_removed_text(from, to);
        assert_eq!(inside, from);

        let mut same_line_after = pos(3, 10);
        same_line_after.on_removed_text(from, to);
        assert_eq!(same_line_after, pos(1, 8));

        let mut later_line = pos(6, 0);
        later_line.on_removed_text(from, to);
        assert_eq!(later_line, pos(4, 0));
    }

    #[test]
    fn test_apply_edit_dispatches() {
        let mut p = pos(0, 3);
        p.apply_edit(
            &TextEdit::Insert {
                from: pos(0, 0),
                to: pos(0, 2),
            },
            false,
        );
        assert_eq!(p, pos(0, 5));

        p.apply_edit(
            &TextEdit::Remove {
                from: pos(0, 0),
                to: pos(0, 2),
            },
            false,
        );
        assert_eq!(p, pos(0, 3));
    }

    #[test]
    fn test_inverted_edits_leave_position_alone() {
        let mut p = pos(5, 0);
        p.apply_edit(
            &TextEdit::Insert {
                from: pos(3, 0),
                to: pos(1, 0),
            },
            true,
        );
        assert_eq!(p, pos(5, 0));

        p.on_inserted_text(pos(5, 0), pos(4, 9), true);
        assert_eq!(p, pos(5, 0));

        p.on_removed_text(pos(6, 0), pos(2, 0));
        assert_eq!(p, pos(5, 0));

        let replayed: TextEdit = serde_json::from_str(
            r#"{"kind":"remove","from":{"line":9,"column":3},"to":{"line":0,"column":0}}"#,
        )
        .unwrap();
        p.apply_edit(&replayed, false);
        assert_eq!(p, pos(5, 0));
    }

    #[test]
    fn test_interval_deserialization_is_validated() {
        let ok: TextInterval = serde_json::from_str(
            r#"{"start":{"line":0,"column":1},"end":{"line":2,"column":0}}"#,
        )
        .unwrap();
        assert_eq!(ok, TextInterval::new((0, 1), (2, 0)));

        let bad = serde_json::from_str::<TextInterval>(
            r#"{"start":{"line":4,"column":1},"end":{"line":4,"column":1}}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_validation_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Validation::Strict).unwrap(),
            "\"strict\""
        );
        let parsed: Validation = serde_json::from_str("\"repair\"").unwrap();
        assert_eq!(parsed, Validation::Repair);
    }
}
