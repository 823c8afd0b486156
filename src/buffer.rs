//! The buffer port: the narrow interface the ex engine edits through.
//!
//! Offsets are char indices. Lines are 0-based here; ex addresses are
//! 1-based and converted at the address layer.

use regex::Regex;

use crate::marks::MarkId;

/// How a selection is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionKind {
    #[default]
    Stream,
    Lines,
    /// Rectangular. Spans the lines of anchor and head, and their columns
    /// inclusive of both ends.
    Block,
}

/// The current selection. Empty when `anchor == head`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
    pub kind: SelectionKind,
}

impl Selection {
    pub fn new(anchor: usize, head: usize, kind: SelectionKind) -> Self {
        Self { anchor, head, kind }
    }

    pub fn caret(offset: usize) -> Self {
        Self::new(offset, offset, SelectionKind::Stream)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }
}

pub trait Buffer {
    /// Whole text.
    fn text(&self) -> String;

    fn len_chars(&self) -> usize;

    /// Number of lines, `None` if the buffer cannot tell (a stream still loading).
    fn line_count(&self) -> Option<usize>;

    /// Offset of the first char of `line`; `len_chars()` past the end.
    fn line_to_char(&self, line: usize) -> usize;

    fn char_to_line(&self, offset: usize) -> usize;

    /// Text of `line` without its terminator.
    fn line_text(&self, line: usize) -> String;

    fn slice(&self, start: usize, end: usize) -> String;

    fn cursor(&self) -> usize;

    fn set_cursor(&mut self, offset: usize);

    fn selection(&self) -> Selection;

    fn set_selection(&mut self, selection: Selection);

    fn first_visible_line(&self) -> usize;

    fn lines_on_screen(&self) -> usize;

    fn insert(&mut self, offset: usize, text: &str);

    fn delete(&mut self, start: usize, end: usize);

    fn replace(&mut self, start: usize, end: usize, text: &str) {
        self.delete(start, end);
        self.insert(start, text);
    }

    /// Open an undo group; nested groups join the outermost one.
    fn begin_undo_action(&mut self);

    fn end_undo_action(&mut self);

    /// Revert the most recent undo group. Returns false if there is none.
    fn undo(&mut self) -> bool;

    fn is_read_only(&self) -> bool;

    fn is_binary(&self) -> bool;

    fn eol(&self) -> &str;

    fn mark(&self, id: MarkId) -> Option<usize>;

    fn set_mark(&mut self, id: MarkId, offset: usize);

    fn clear_mark(&mut self, id: MarkId);

    /// Named marks, sorted.
    fn named_marks(&self) -> Vec<(char, usize)>;

    /// Remove user marks inside `start..end`.
    fn clear_marks_within(&mut self, start: usize, end: usize);

    /// First match of `regex` in `start..end`, as char offsets.
    fn find_in_range(&self, regex: &Regex, start: usize, end: usize) -> Option<(usize, usize)> {
        if start > end {
            return None;
        }
        let hay = self.slice(start, end);
        regex
            .find(&hay)
            .map(|m| (start + char_count(&hay[..m.start()]), start + char_count(&hay[..m.end()])))
    }

    /// Last match of `regex` in `start..end`, as char offsets.
    fn rfind_in_range(&self, regex: &Regex, start: usize, end: usize) -> Option<(usize, usize)> {
        if start > end {
            return None;
        }
        let hay = self.slice(start, end);
        regex
            .find_iter(&hay)
            .last()
            .map(|m| (start + char_count(&hay[..m.start()]), start + char_count(&hay[..m.end()])))
    }

    /// Offset just past the last char of `line`, before its terminator.
    fn line_end(&self, line: usize) -> usize {
        self.line_to_char(line) + self.line_text(line).chars().count()
    }

    /// Current line, 0-based.
    fn cursor_line(&self) -> usize {
        self.char_to_line(self.cursor())
    }

    fn is_editable(&self) -> bool {
        !self.is_read_only() && !self.is_binary()
    }

    /// Char span covering `first..=last` (0-based) including terminators.
    ///
    /// When the span reaches an unterminated final line, the terminator in
    /// front of `first` is included instead so that removing the span leaves
    /// no dangling empty line.
    fn deletion_span(&self, first: usize, last: usize) -> (usize, usize) {
        let (start, end) = self.lines_span(first, last);
        let len = self.len_chars();
        if end == len && first > 0 && !self.text_ends_with_eol() {
            (self.line_end(first - 1), end)
        } else {
            (start, end)
        }
    }

    /// Char span of `first..=last` including the terminator of `last` if any.
    fn lines_span(&self, first: usize, last: usize) -> (usize, usize) {
        (self.line_to_char(first), self.line_to_char(last + 1))
    }

    fn text_ends_with_eol(&self) -> bool {
        let len = self.len_chars();
        len > 0 && matches!(self.slice(len - 1, len).as_str(), "\n" | "\r")
    }

    /// Insert whole lines after `line` (1-based, 0 = before the first line).
    ///
    /// Text without a final terminator is completed with [`eol`](Buffer::eol)
    /// unless it lands at the end of an unterminated buffer.
    ///
    /// Returns the number of lines inserted.
    fn put_lines(&mut self, line: usize, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let eol = self.eol().to_string();
        let len = self.len_chars();
        let count = text.lines().count().max(1);
        if len == 0 && line == 0 {
            self.insert(0, text);
            return count;
        }
        let offset = self.line_to_char(line);
        if offset >= len && !self.text_ends_with_eol() {
            let body = text.strip_suffix(eol.as_str()).unwrap_or(text);
            self.insert(len, &format!("{eol}{body}"));
        } else if offset < len && !text.ends_with('\n') && !text.ends_with('\r') {
            self.insert(offset, &format!("{text}{eol}"));
        } else {
            self.insert(offset, text);
        }
        count
    }
}

pub(crate) fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Char offset for byte offset `byte` in `s`.
pub(crate) fn byte_to_char(s: &str, byte: usize) -> usize {
    char_count(&s[..byte])
}
