use ropey::Rope;

use super::source::TextSource;

/// Errors raised before a buffer is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("offset {offset} is outside the document (length {len})")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("edit removing {removed} chars at {offset} exceeds the document (length {len})")]
    EditOutOfBounds {
        offset: usize,
        removed: usize,
        len: usize,
    },
}

/// A single replacement in char units: `removed` chars at `offset` are
/// replaced by `inserted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub offset: usize,
    pub removed: usize,
    pub inserted: String,
}

impl TextEdit {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            removed: 0,
            inserted: text.into(),
        }
    }

    pub fn delete(offset: usize, len: usize) -> Self {
        Self {
            offset,
            removed: len,
            inserted: String::new(),
        }
    }

    pub fn replace(offset: usize, len: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            removed: len,
            inserted: text.into(),
        }
    }

    pub fn inserted_len(&self) -> usize {
        self.inserted.chars().count()
    }

    /// End of the replaced range, in pre-edit offsets.
    pub fn removed_end(&self) -> usize {
        self.offset + self.removed
    }

    /// End of the inserted text, in post-edit offsets.
    pub fn inserted_end(&self) -> usize {
        self.offset + self.inserted_len()
    }

    /// Length change the edit applies to everything after it.
    pub fn delta(&self) -> isize {
        self.inserted_len() as isize - self.removed as isize
    }

    pub fn is_noop(&self) -> bool {
        self.removed == 0 && self.inserted.is_empty()
    }
}

/// Rope-backed text of an open document.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    text: Rope,
}

impl TextBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
        }
    }

    pub fn rope(&self) -> &Rope {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.len_chars() == 0
    }

    /// Validates an edit without applying it.
    pub fn check(&self, edit: &TextEdit) -> Result<(), DocumentError> {
        let len = self.text.len_chars();
        if edit.offset > len || edit.removed > len - edit.offset {
            return Err(DocumentError::EditOutOfBounds {
                offset: edit.offset,
                removed: edit.removed,
                len,
            });
        }
        Ok(())
    }

    /// Applies an edit, leaving the buffer untouched when it is out of bounds.
    pub fn apply(&mut self, edit: &TextEdit) -> Result<(), DocumentError> {
        self.check(edit)?;
        if edit.removed > 0 {
            self.text.remove(edit.offset..edit.removed_end());
        }
        if !edit.inserted.is_empty() {
            self.text.insert(edit.offset, &edit.inserted);
        }
        Ok(())
    }
}

impl std::fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for chunk in self.text.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl From<Rope> for TextBuffer {
    fn from(text: Rope) -> Self {
        Self { text }
    }
}

impl TextSource for TextBuffer {
    fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.text.get_char(offset)
    }

    fn line_of(&self, offset: usize) -> usize {
        TextSource::line_of(&self.text, offset)
    }

    fn line_to_offset(&self, line: usize) -> usize {
        TextSource::line_to_offset(&self.text, line)
    }

    fn len_lines(&self) -> usize {
        self.text.len_lines()
    }

    fn text_between(&self, start: usize, end: usize) -> String {
        TextSource::text_between(&self.text, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_insert() {
        let mut buffer = TextBuffer::new("hello world");
        buffer.apply(&TextEdit::insert(5, ",")).unwrap();
        assert_eq!(buffer.to_string(), "hello, world");
    }

    #[test]
    fn test_apply_replace() {
        let mut buffer = TextBuffer::new("hello world");
        buffer.apply(&TextEdit::replace(6, 5, "there")).unwrap();
        assert_eq!(buffer.to_string(), "hello there");
    }

    #[test]
    fn test_apply_multibyte() {
        let mut buffer = TextBuffer::new("größe x");
        buffer.apply(&TextEdit::delete(2, 1)).unwrap();
        assert_eq!(buffer.to_string(), "grße x");
    }

    #[test]
    fn test_out_of_bounds_edit_is_rejected_without_change() {
        let mut buffer = TextBuffer::new("abc");
        let error = buffer.apply(&TextEdit::delete(2, 5)).unwrap_err();

        assert_eq!(
            error,
            DocumentError::EditOutOfBounds {
                offset: 2,
                removed: 5,
                len: 3
            }
        );
        assert_eq!(buffer.to_string(), "abc");
    }

    #[test]
    fn test_edit_delta() {
        assert_eq!(TextEdit::replace(0, 3, "ab").delta(), -1);
        assert_eq!(TextEdit::insert(0, "äö").delta(), 2);
        assert!(TextEdit::insert(4, "").is_noop());
    }
}
