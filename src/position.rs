//! Line/column positions.
//!
//! The buffer port speaks char offsets; block selections and the sort
//! command need columns, so conversions live here.

use ropey::Rope;

use crate::buffer::Buffer;

/// A position in the buffer, represented as line and column.
///
/// Both `line` and `column` are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position of a char offset in `buffer`.
    pub fn of(buffer: &dyn Buffer, offset: usize) -> Self {
        let offset = offset.min(buffer.len_chars());
        let line = buffer.char_to_line(offset);
        Self::new(line, offset - buffer.line_to_char(line))
    }

    /// Char offset of this position, clamped to the text of its line.
    pub fn to_offset(&self, buffer: &dyn Buffer) -> usize {
        let line = match buffer.line_count() {
            Some(count) => self.line.min(count.saturating_sub(1)),
            None => self.line,
        };
        buffer.line_to_char(line) + self.column.min(buffer.line_text(line).chars().count())
    }
}

/// Length of `line` in chars, not counting its line terminator.
pub fn line_length_excluding_newline(rope: &Rope, line: usize) -> usize {
    if line >= rope.len_lines() {
        return 0;
    }
    let slice = rope.line(line);
    let mut len = slice.len_chars();
    if len > 0 && slice.char(len - 1) == '\n' {
        len -= 1;
    }
    if len > 0 && slice.char(len - 1) == '\r' {
        len -= 1;
    }
    len
}
