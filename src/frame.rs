//! `Frame`: an in-memory rope buffer with marks and grouped undo.

use std::fmt;

use ropey::Rope;

use crate::buffer::{Buffer, Selection};
use crate::marks::{MarkId, MarkSet};
use crate::position::line_length_excluding_newline;

const DEFAULT_LINES_ON_SCREEN: usize = 24;

/// An editable text frame implementing the [`Buffer`] port.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The underlying rope data structure.
    rope: Rope,
    /// All marks in this frame.
    marks: MarkSet,
    cursor: usize,
    selection: Selection,
    first_visible_line: usize,
    lines_on_screen: usize,
    read_only: bool,
    binary: bool,
    eol: String,
    /// Snapshots taken when the outermost undo group opened.
    undo_stack: Vec<Rope>,
    undo_depth: usize,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rope)
    }
}

// Constructors
impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self::from_rope(Rope::new())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        Self::from_rope(Rope::from_str(s))
    }

    /// Frame holding `lines`, each terminated by `\n`.
    pub fn from_lines(lines: &[&str]) -> Self {
        let mut text = lines.join("\n");
        if !lines.is_empty() {
            text.push('\n');
        }
        Self::from_str(&text)
    }

    fn from_rope(rope: Rope) -> Self {
        let eol = if rope.to_string().contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            rope,
            marks: MarkSet::new(),
            cursor: 0,
            selection: Selection::default(),
            first_visible_line: 0,
            lines_on_screen: DEFAULT_LINES_ON_SCREEN,
            read_only: false,
            binary: false,
            eol: eol.to_string(),
            undo_stack: Vec::new(),
            undo_depth: 0,
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Set the visible window, as a frontend would after scrolling.
    pub fn set_view(&mut self, first_visible_line: usize, lines_on_screen: usize) {
        self.first_visible_line = first_visible_line;
        self.lines_on_screen = lines_on_screen;
    }

    /// Lines without terminators.
    pub fn lines(&self) -> Vec<String> {
        let count = self.line_count().unwrap_or(0);
        (0..count).map(|line| self.line_text(line)).collect()
    }

    fn clamp(&self, offset: usize) -> usize {
        offset.min(self.rope.len_chars())
    }

    /// Record the pre-edit state when an edit happens outside any group.
    fn snapshot_if_ungrouped(&mut self) {
        if self.undo_depth == 0 {
            self.undo_stack.push(self.rope.clone());
        }
    }
}

impl Buffer for Frame {
    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn line_count(&self) -> Option<usize> {
        let lines = self.rope.len_lines();
        if lines > 1 && line_length_excluding_newline(&self.rope, lines - 1) == 0 {
            Some(lines - 1)
        } else {
            Some(lines)
        }
    }

    fn line_to_char(&self, line: usize) -> usize {
        if line >= self.rope.len_lines() {
            self.rope.len_chars()
        } else {
            self.rope.line_to_char(line)
        }
    }

    fn char_to_line(&self, offset: usize) -> usize {
        self.rope.char_to_line(self.clamp(offset))
    }

    fn line_text(&self, line: usize) -> String {
        if line >= self.rope.len_lines() {
            return String::new();
        }
        let start = self.rope.line_to_char(line);
        let len = line_length_excluding_newline(&self.rope, line);
        self.rope.slice(start..start + len).to_string()
    }

    fn slice(&self, start: usize, end: usize) -> String {
        let (start, end) = (self.clamp(start), self.clamp(end));
        if start >= end {
            return String::new();
        }
        self.rope.slice(start..end).to_string()
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, offset: usize) {
        self.cursor = self.clamp(offset);
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection::new(
            self.clamp(selection.anchor),
            self.clamp(selection.head),
            selection.kind,
        );
    }

    fn first_visible_line(&self) -> usize {
        self.first_visible_line
    }

    fn lines_on_screen(&self) -> usize {
        self.lines_on_screen
    }

    fn insert(&mut self, offset: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        self.snapshot_if_ungrouped();
        let offset = self.clamp(offset);
        let len = text.chars().count();
        self.rope.insert(offset, text);
        self.marks.update_after_insert(offset, len);
        if self.cursor >= offset {
            self.cursor += len;
        }
    }

    fn delete(&mut self, start: usize, end: usize) {
        let (start, end) = (self.clamp(start.min(end)), self.clamp(start.max(end)));
        if start == end {
            return;
        }
        self.snapshot_if_ungrouped();
        self.rope.remove(start..end);
        self.marks.update_after_delete(start, end);
        if self.cursor > start {
            self.cursor = if self.cursor < end { start } else { self.cursor - (end - start) };
        }
        self.selection = Selection::caret(self.clamp(self.selection.start()));
    }

    fn begin_undo_action(&mut self) {
        if self.undo_depth == 0 {
            self.undo_stack.push(self.rope.clone());
        }
        self.undo_depth += 1;
    }

    fn end_undo_action(&mut self) {
        self.undo_depth = self.undo_depth.saturating_sub(1);
    }

    fn undo(&mut self) -> bool {
        while let Some(previous) = self.undo_stack.pop() {
            // Groups that changed nothing are skipped.
            if previous != self.rope {
                self.rope = previous;
                let len = self.rope.len_chars();
                self.marks.clamp(len);
                self.cursor = self.cursor.min(len);
                self.selection = Selection::caret(self.cursor);
                return true;
            }
        }
        false
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_binary(&self) -> bool {
        self.binary
    }

    fn eol(&self) -> &str {
        &self.eol
    }

    fn mark(&self, id: MarkId) -> Option<usize> {
        self.marks.get(id)
    }

    fn set_mark(&mut self, id: MarkId, offset: usize) {
        let offset = self.clamp(offset);
        self.marks.set(id, offset);
    }

    fn clear_mark(&mut self, id: MarkId) {
        self.marks.unset(id);
    }

    fn named_marks(&self) -> Vec<(char, usize)> {
        self.marks.named()
    }

    fn clear_marks_within(&mut self, start: usize, end: usize) {
        self.marks.clear_named_within(start, end);
    }
}

#[cfg(test)]
mod tests;
