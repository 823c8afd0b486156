//! Modal editing state.
//!
//! [`transition`] is a pure function over every (mode, event) pair; pairs it
//! does not name leave the mode unchanged. [`ModeMachine`] applies it and
//! runs the side effects that belong to entering or leaving a mode.

use tracing::debug;

use crate::buffer::{Buffer, Selection, SelectionKind};

/// The current editing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Keys are commands.
    #[default]
    Command,
    Insert,
    /// Insert inside a visual block; escape returns to the block.
    InsertBlock,
    Visual,
    VisualLine,
    VisualBlock,
}

impl Mode {
    pub fn is_insert(self) -> bool {
        matches!(self, Mode::Insert | Mode::InsertBlock)
    }

    pub fn is_visual(self) -> bool {
        matches!(self, Mode::Visual | Mode::VisualLine | Mode::VisualBlock)
    }
}

/// Commands that start inserting, each with its own cursor placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertCommand {
    /// `a`: after the cursor.
    Append,
    /// `i`: at the cursor.
    Insert,
    /// `o`: on a new line below.
    OpenBelow,
    /// `A`: at end of line.
    AppendEol,
    /// `C`: replace the rest of the line.
    ChangeEol,
    /// `I`: before the first non-blank.
    InsertBol,
    /// `O`: on a new line above.
    OpenAbove,
    /// `R`: overtype.
    Replace,
    /// `c`: replace the selection.
    Change,
}

impl InsertCommand {
    pub fn from_char(c: char) -> Option<InsertCommand> {
        Some(match c {
            'a' => InsertCommand::Append,
            'i' => InsertCommand::Insert,
            'o' => InsertCommand::OpenBelow,
            'A' => InsertCommand::AppendEol,
            'C' => InsertCommand::ChangeEol,
            'I' => InsertCommand::InsertBol,
            'O' => InsertCommand::OpenAbove,
            'R' => InsertCommand::Replace,
            'c' => InsertCommand::Change,
            _ => return None,
        })
    }

    /// Place the cursor (and edit the buffer) before inserting starts.
    fn prepare(self, buffer: &mut dyn Buffer) {
        let cursor = buffer.cursor();
        let line = buffer.char_to_line(cursor);
        let line_start = buffer.line_to_char(line);
        let line_end = buffer.line_end(line);
        match self {
            InsertCommand::Insert | InsertCommand::Replace => {}
            InsertCommand::Append => buffer.set_cursor((cursor + 1).min(line_end)),
            InsertCommand::AppendEol => buffer.set_cursor(line_end),
            InsertCommand::ChangeEol => {
                buffer.delete(cursor, line_end);
                buffer.set_cursor(cursor);
            }
            InsertCommand::InsertBol => {
                let indent = buffer
                    .line_text(line)
                    .chars()
                    .take_while(|c| c.is_whitespace())
                    .count();
                buffer.set_cursor(line_start + indent);
            }
            InsertCommand::OpenBelow => {
                let eol = buffer.eol().to_string();
                buffer.insert(line_end, &eol);
                buffer.set_cursor(line_end + eol.chars().count());
            }
            InsertCommand::OpenAbove => {
                let eol = buffer.eol().to_string();
                buffer.insert(line_start, &eol);
                buffer.set_cursor(line_start);
            }
            InsertCommand::Change => {
                let selection = buffer.selection();
                if !selection.is_empty() {
                    buffer.delete(selection.start(), selection.end());
                    buffer.set_cursor(selection.start());
                }
            }
        }
    }
}

/// Something that can change the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    Insert(InsertCommand),
    Visual,
    VisualLine,
    VisualBlock,
    Escape,
}

/// The mode after `event` in `mode`. Inserting into a read-only buffer is refused.
pub fn transition(mode: Mode, event: ModeEvent, read_only: bool) -> Mode {
    use Mode::*;
    match (mode, event) {
        (Command, ModeEvent::Insert(_)) if !read_only => Insert,
        (VisualBlock, ModeEvent::Insert(_)) if !read_only => InsertBlock,
        (Command | VisualLine | VisualBlock, ModeEvent::Visual) => Visual,
        (Command | Visual | VisualBlock, ModeEvent::VisualLine) => VisualLine,
        (Command | Visual | VisualLine, ModeEvent::VisualBlock) => VisualBlock,
        (InsertBlock, ModeEvent::Escape) => VisualBlock,
        (Insert | Visual | VisualLine | VisualBlock, ModeEvent::Escape) => Command,
        _ => mode,
    }
}

/// Callbacks run when insert modes are entered and left.
pub trait ModeHooks {
    /// Entering `Insert` or `InsertBlock`.
    fn setup_insert(&mut self, _mode: Mode) {}

    /// Leaving `Insert` or `InsertBlock`.
    fn restore_command(&mut self) {}
}

/// Hooks that do nothing.
pub struct NoHooks;

impl ModeHooks for NoHooks {}

#[derive(Debug, Default)]
pub struct ModeMachine {
    mode: Mode,
    overtype: bool,
}

impl ModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the current insert was started with `R`.
    pub fn is_overtype(&self) -> bool {
        self.overtype && self.mode.is_insert()
    }

    /// Apply `event`. Returns true if the mode changed.
    pub fn handle(
        &mut self,
        event: ModeEvent,
        buffer: &mut dyn Buffer,
        hooks: &mut dyn ModeHooks,
    ) -> bool {
        let from = self.mode;
        let to = transition(from, event, buffer.is_read_only());
        if from == to {
            return false;
        }
        debug!(?from, ?to, ?event, "mode transition");

        if from.is_insert() {
            hooks.restore_command();
        }
        if let ModeEvent::Insert(command) = event {
            command.prepare(buffer);
            self.overtype = command == InsertCommand::Replace;
        }
        match to {
            Mode::Visual | Mode::VisualBlock if !from.is_visual() && !from.is_insert() => {
                let cursor = buffer.cursor();
                let kind = if to == Mode::Visual {
                    SelectionKind::Stream
                } else {
                    SelectionKind::Block
                };
                buffer.set_selection(Selection::new(cursor, cursor, kind));
            }
            Mode::Visual | Mode::VisualBlock => {
                let selection = buffer.selection();
                let kind = if to == Mode::Visual {
                    SelectionKind::Stream
                } else {
                    SelectionKind::Block
                };
                buffer.set_selection(Selection::new(selection.anchor, selection.head, kind));
            }
            Mode::VisualLine => normalize_to_lines(buffer),
            Mode::Command if from.is_visual() => {
                let head = buffer.selection().head;
                buffer.set_selection(Selection::caret(head));
            }
            _ => {}
        }
        if to.is_insert() {
            hooks.setup_insert(to);
        }
        self.mode = to;
        true
    }
}

/// Extend the selection to whole lines, anchor side first.
fn normalize_to_lines(buffer: &mut dyn Buffer) {
    let selection = buffer.selection();
    let (anchor, head) = if selection.is_empty() {
        let cursor = buffer.cursor();
        (cursor, cursor)
    } else {
        (selection.anchor, selection.head)
    };
    let anchor_line = buffer.char_to_line(anchor);
    let head_line = buffer.char_to_line(head);
    let normalized = if anchor <= head {
        Selection::new(
            buffer.line_to_char(anchor_line),
            buffer.line_end(head_line),
            SelectionKind::Lines,
        )
    } else {
        Selection::new(
            buffer.line_end(anchor_line),
            buffer.line_to_char(head_line),
            SelectionKind::Lines,
        )
    };
    buffer.set_selection(normalized);
}
