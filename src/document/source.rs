//! Document position abstraction
//!
//! Recognition never touches a concrete text type. It works in char offsets
//! against [`TextSource`], which only has to answer a handful of questions:
//! how long is the text, which char sits at an offset, and where lines
//! begin. Word scanning and line arithmetic are provided on top of that.

use ropey::Rope;

/// Read access to a text buffer in char offsets.
pub trait TextSource {
    /// Number of chars in the buffer.
    fn len_chars(&self) -> usize;

    /// Char at `offset`, `None` at or past the end.
    fn char_at(&self, offset: usize) -> Option<char>;

    /// Zero-based line containing `offset` (`offset == len_chars()` is allowed).
    fn line_of(&self, offset: usize) -> usize;

    /// Offset of the first char of zero-based `line`.
    fn line_to_offset(&self, line: usize) -> usize;

    /// Number of lines (a trailing line break starts an empty last line).
    fn len_lines(&self) -> usize;

    fn text_between(&self, start: usize, end: usize) -> String {
        (start..end).filter_map(|offset| self.char_at(offset)).collect()
    }

    fn is_whitespace_at(&self, offset: usize) -> bool {
        self.char_at(offset).is_some_and(char::is_whitespace)
    }

    /// Start of the non-whitespace run ending at `offset` (scans backwards).
    fn word_start(&self, offset: usize) -> usize {
        let mut start = offset.min(self.len_chars());
        while start > 0 && self.char_at(start - 1).is_some_and(|c| !c.is_whitespace()) {
            start -= 1;
        }
        start
    }

    /// End of the non-whitespace run starting at `offset` (scans forwards).
    fn word_end(&self, offset: usize) -> usize {
        let len = self.len_chars();
        let mut end = offset.min(len);
        while end < len && self.char_at(end).is_some_and(|c| !c.is_whitespace()) {
            end += 1;
        }
        end
    }

    /// First non-whitespace offset at or after `offset`, or `len_chars()`.
    fn skip_whitespace(&self, offset: usize) -> usize {
        let len = self.len_chars();
        let mut cursor = offset.min(len);
        while cursor < len && self.is_whitespace_at(cursor) {
            cursor += 1;
        }
        cursor
    }

    /// Offset of the start of the line containing `offset`.
    fn line_start(&self, offset: usize) -> usize {
        self.line_to_offset(self.line_of(offset.min(self.len_chars())))
    }

    /// Offset just past the last char of the line containing `offset`,
    /// excluding the line break.
    fn line_end(&self, offset: usize) -> usize {
        let line = self.line_of(offset.min(self.len_chars()));
        let mut end = if line + 1 < self.len_lines() {
            self.line_to_offset(line + 1)
        } else {
            self.len_chars()
        };
        let start = self.line_to_offset(line);
        while end > start && self.char_at(end - 1).is_some_and(is_line_break) {
            end -= 1;
        }
        end
    }

    fn is_line_start(&self, offset: usize) -> bool {
        self.line_start(offset) == offset
    }

    /// One-based `(line, column)` of `offset`.
    fn line_column(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.len_chars());
        let line = self.line_of(offset);
        (line + 1, offset - self.line_to_offset(line) + 1)
    }
}

/// Line break chars recognised by ropey.
pub fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}

impl TextSource for Rope {
    fn len_chars(&self) -> usize {
        Rope::len_chars(self)
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.get_char(offset)
    }

    fn line_of(&self, offset: usize) -> usize {
        self.char_to_line(offset.min(Rope::len_chars(self)))
    }

    fn line_to_offset(&self, line: usize) -> usize {
        self.line_to_char(line.min(Rope::len_lines(self)))
    }

    fn len_lines(&self) -> usize {
        Rope::len_lines(self)
    }

    fn text_between(&self, start: usize, end: usize) -> String {
        let len = Rope::len_chars(self);
        self.slice(start.min(len)..end.min(len)).to_string()
    }
}
