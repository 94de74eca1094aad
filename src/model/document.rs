//! Line-based text store that reports its edits
//!
//! `TextDocument` is the smallest buffer that can drive an
//! [`EditObserver`]: every insertion or removal returns the matching
//! [`TextEdit`], and the `*_notify` variants forward it so that stored
//! positions (for example the spans held by an
//! [`IntervalTree`](crate::model::interval_tree::IntervalTree)) keep
//! covering the same text.
//!
//! Lines are separated by `\n` and columns are counted in chars, matching
//! [`TextEdit::insertion`].

use anyhow::Result;

use crate::model::edit::{EditObserver, TextEdit};
use crate::model::position::{TextInterval, TextPosition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    lines: Vec<String>,
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDocument {
    /// An empty document with a single empty line
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(String::from).collect(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }

    /// The position just past the last char
    pub fn end_position(&self) -> TextPosition {
        let last = self.lines.len() - 1;
        TextPosition::new(last, self.lines[last].chars().count())
    }

    /// Insert `text` at `at` and return the edit describing it
    pub fn insert(&mut self, at: TextPosition, text: &str) -> Result<TextEdit> {
        let index = self.byte_index(at)?;
        let line = &self.lines[at.line];
        let combined = format!("{}{}{}", &line[..index], text, &line[index..]);
        self.lines
            .splice(at.line..=at.line, combined.split('\n').map(String::from));

        tracing::trace!("Inserted {} bytes at {}", text.len(), at);
        Ok(TextEdit::insertion(at, text))
    }

    /// Remove the text between `from` and `to` and return the edit
    /// describing it
    pub fn remove(&mut self, from: TextPosition, to: TextPosition) -> Result<TextEdit> {
        if from > to {
            anyhow::bail!("Invalid removal: {} is after {}", from, to);
        }
        let start = self.byte_index(from)?;
        let end = self.byte_index(to)?;

        let joined = format!(
            "{}{}",
            &self.lines[from.line][..start],
            &self.lines[to.line][end..]
        );
        self.lines.splice(from.line..=to.line, std::iter::once(joined));

        tracing::trace!("Removed text from {} to {}", from, to);
        Ok(TextEdit::removal(from, to))
    }

    /// Insert and forward the resulting edit to `observer`
    pub fn insert_notify(
        &mut self,
        at: TextPosition,
        text: &str,
        observer: &mut impl EditObserver,
    ) -> Result<TextEdit> {
        let edit = self.insert(at, text)?;
        observer.on_edit(&edit);
        Ok(edit)
    }

    /// Remove and forward the resulting edit to `observer`
    pub fn remove_notify(
        &mut self,
        from: TextPosition,
        to: TextPosition,
        observer: &mut impl EditObserver,
    ) -> Result<TextEdit> {
        let edit = self.remove(from, to)?;
        observer.on_edit(&edit);
        Ok(edit)
    }

    /// The text covered by `interval`
    pub fn slice(&self, interval: &TextInterval) -> Result<String> {
        let (from, to) = (interval.start(), interval.end());
        let start = self.byte_index(from)?;
        let end = self.byte_index(to)?;

        if from.line == to.line {
            return Ok(self.lines[from.line][start..end].to_string());
        }

        let mut text = self.lines[from.line][start..].to_string();
        for line in &self.lines[from.line + 1..to.line] {
            text.push('\n');
            text.push_str(line);
        }
        text.push('\n');
        text.push_str(&self.lines[to.line][..end]);
        Ok(text)
    }

    /// Byte offset of `position` within its line
    fn byte_index(&self, position: TextPosition) -> Result<usize> {
        let line = self.lines.get(position.line).ok_or_else(|| {
            anyhow::anyhow!(
                "Line {} out of range (document has {} lines)",
                position.line,
                self.lines.len()
            )
        })?;

        match line.char_indices().nth(position.column) {
            Some((index, _)) => Ok(index),
            None if line.chars().count() == position.column => Ok(line.len()),
            None => anyhow::bail!(
                "Column {} out of range on line {} ({} chars)",
                position.column,
                position.line,
                line.chars().count()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> TextPosition {
        TextPosition::new(line, column)
    }

    #[derive(Default)]
    struct Recorder {
        edits: Vec<TextEdit>,
    }

    impl EditObserver for Recorder {
        fn on_edit(&mut self, edit: &TextEdit) {
            self.edits.push(*edit);
        }
    }

    #[test]
    fn test_insert_single_line() {
        let mut doc = TextDocument::from_text("hello world");
        let edit = doc.insert(pos(0, 5), ",").unwrap();
        assert_eq!(doc.text(), "hello, world");
        assert_eq!(
            edit,
            TextEdit::Insert {
                from: pos(0, 5),
                to: pos(0, 6)
            }
        );
    }

    #[test]
    fn test_insert_newlines_splits_line() {
        let mut doc = TextDocument::from_text("ab\ncd");
        doc.insert(pos(0, 1), "\n\n").unwrap();
        assert_eq!(doc.text(), "a\n\nb\ncd");
        assert_eq!(doc.line_count(), 4);
        assert_eq!(doc.line(2), Some("b"));
    }

    #[test]
    fn test_remove_across_lines() {
        let mut doc = TextDocument::from_text("one\ntwo\nthree");
        let edit = doc.remove(pos(0, 1), pos(2, 2)).unwrap();
        assert_eq!(doc.text(), "oree");
        assert_eq!(edit, TextEdit::removal(pos(0, 1), pos(2, 2)));
    }

    #[test]
    fn test_columns_are_chars() {
        let mut doc = TextDocument::from_text("héllo");
        doc.insert(pos(0, 2), "X").unwrap();
        assert_eq!(doc.text(), "héXllo");
        assert_eq!(doc.end_position(), pos(0, 6));
        assert_eq!(
            doc.slice(&TextInterval::new((0, 1), (0, 3))).unwrap(),
            "éX"
        );
    }

    #[test]
    fn test_slice_multiline() {
        let doc = TextDocument::from_text("fn main() {\n    body\n}");
        let text = doc.slice(&TextInterval::new((0, 10), (2, 1))).unwrap();
        assert_eq!(text, "{\n    body\n}");
    }

    #[test]
    fn test_out_of_range_positions_are_errors() {
        let mut doc = TextDocument::from_text("abc");
        assert!(doc.insert(pos(1, 0), "x").is_err());
        assert!(doc.insert(pos(0, 4), "x").is_err());
        assert!(doc.remove(pos(0, 2), pos(0, 1)).is_err());
        let err = doc.slice(&TextInterval::new((0, 0), (3, 0))).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert_eq!(doc.text(), "abc");
    }

    #[test]
    fn test_notify_forwards_edits() {
        let mut doc = TextDocument::new();
        let mut recorder = Recorder::default();

        doc.insert_notify(pos(0, 0), "ab\nc", &mut recorder).unwrap();
        doc.remove_notify(pos(0, 1), pos(1, 0), &mut recorder).unwrap();

        assert_eq!(doc.text(), "ac");
        assert_eq!(
            recorder.edits,
            vec![
                TextEdit::Insert {
                    from: pos(0, 0),
                    to: pos(1, 1)
                },
                TextEdit::Remove {
                    from: pos(0, 1),
                    to: pos(1, 0)
                },
            ]
        );
    }
}
