use serde::{Deserialize, Serialize};

use crate::model::position::TextPosition;

/// A text edit reported by the document that owns the positions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TextEdit {
    /// Text was inserted at `from`; `to` is where it ends in the new
    /// coordinate space
    Insert { from: TextPosition, to: TextPosition },
    /// The text between `from` and `to` (old coordinates) was removed
    Remove { from: TextPosition, to: TextPosition },
}

impl TextEdit {
    /// Create the edit for inserting `text` at `at`
    ///
    /// Lines are separated by `\n` and columns are counted in chars.
    pub fn insertion(at: TextPosition, text: &str) -> Self {
        let to = match text.rsplit_once('\n') {
            Some((head, tail)) => TextPosition::new(
                at.line + head.matches('\n').count() + 1,
                tail.chars().count(),
            ),
            None => TextPosition::new(at.line, at.column + text.chars().count()),
        };
        TextEdit::Insert { from: at, to }
    }

    /// Create the edit for removing the text between `from` and `to`
    pub fn removal(from: TextPosition, to: TextPosition) -> Self {
        TextEdit::Remove { from, to }
    }

    /// Where the edit happened
    pub fn start(&self) -> TextPosition {
        match *self {
            TextEdit::Insert { from, .. } | TextEdit::Remove { from, .. } => from,
        }
    }

    /// Whether applying the edit leaves every position where it was
    pub fn is_noop(&self) -> bool {
        match *self {
            TextEdit::Insert { from, to } | TextEdit::Remove { from, to } => from >= to,
        }
    }
}

/// Receives edit notifications from the buffer that owns the positions
///
/// The buffer calls [`EditObserver::on_edit`] after every insertion or
/// removal so stored positions follow the text they were attached to.
pub trait EditObserver {
    fn on_edit(&mut self, edit: &TextEdit);
}
