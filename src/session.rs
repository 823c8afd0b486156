//! `Session`: one buffer being edited, with its mode and macro recorder.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::buffer::Buffer;
use crate::cmd_result::CmdResult;
use crate::context::ExContext;
use crate::exec_context::ExecutionContext;
use crate::frontend::Frontend;
use crate::macros::MacroRecorder;
use crate::mode::{Mode, ModeEvent, ModeHooks, ModeMachine};
use crate::register::RegisterStore;
use crate::store::MacroStore;

pub struct Session {
    pub(crate) buffer: Box<dyn Buffer>,
    pub(crate) frontend: Box<dyn Frontend>,
    pub(crate) modes: ModeMachine,
    pub(crate) recorder: MacroRecorder,
    pub(crate) filename: Option<PathBuf>,
    pub(crate) cwd: PathBuf,
    pub(crate) syntax: bool,
    /// Searches made while jumping to a tag do not become the last search.
    pub(crate) tag_jump: bool,
    /// Text typed since insert mode was entered.
    inserted: String,
}

impl Session {
    pub fn new(buffer: impl Buffer + 'static, frontend: impl Frontend + 'static) -> Self {
        Self {
            buffer: Box::new(buffer),
            frontend: Box::new(frontend),
            modes: ModeMachine::new(),
            recorder: MacroRecorder::new(),
            filename: None,
            cwd: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            syntax: true,
            tag_jump: false,
            inserted: String::new(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn buffer(&self) -> &dyn Buffer {
        self.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> &mut dyn Buffer {
        self.buffer.as_mut()
    }

    pub fn frontend_mut(&mut self) -> &mut dyn Frontend {
        self.frontend.as_mut()
    }

    /// Lines of the buffer without terminators.
    pub fn lines(&self) -> Vec<String> {
        let count = self.buffer.line_count().unwrap_or(0);
        (0..count).map(|line| self.buffer.line_text(line)).collect()
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn recorder(&self) -> &MacroRecorder {
        &self.recorder
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn syntax_enabled(&self) -> bool {
        self.syntax
    }

    pub fn set_tag_jump(&mut self, tag_jump: bool) {
        self.tag_jump = tag_jump;
    }

    /// Run one command line. The result message, if any, goes to the frontend.
    ///
    /// While a macro is recording, the line is recorded unless it started or
    /// stopped the recording.
    pub fn execute(&mut self, ctx: &mut ExContext, line: &str) -> CmdResult {
        ctx.reset_cancel();
        let was_recording = self.recorder.is_recording();
        let result = {
            let mut ectx = ExecutionContext::new(self, ctx);
            ectx.run_line(line)
        };
        if was_recording && self.recorder.is_recording() && result.is_success() {
            self.recorder.record(line, true);
        }
        debug!(line, ?result, "executed");
        if let Some(message) = result.message() {
            self.frontend.message(&message);
        }
        result
    }

    /// Feed a mode event. Returns true if the mode changed.
    pub fn handle_mode_event(&mut self, ctx: &mut ExContext, event: ModeEvent) -> bool {
        let mut hooks = InsertHooks {
            registers: &mut ctx.registers,
            store: &mut ctx.store,
            inserted: &mut self.inserted,
        };
        self.modes.handle(event, self.buffer.as_mut(), &mut hooks)
    }

    /// Type `text` at the cursor. Only valid in an insert mode; returns
    /// false otherwise.
    pub fn type_text(&mut self, text: &str) -> bool {
        if !self.modes.mode().is_insert() {
            return false;
        }
        let cursor = self.buffer.cursor();
        if self.modes.is_overtype() {
            let line = self.buffer.char_to_line(cursor);
            let room = self.buffer.line_end(line) - cursor;
            let replaced = text.chars().take_while(|c| *c != '\n').count().min(room);
            self.buffer.replace(cursor, cursor + replaced, text);
        } else {
            self.buffer.insert(cursor, text);
        }
        self.buffer.set_cursor(cursor + text.chars().count());
        self.inserted.push_str(text);
        true
    }

    /// Record keystrokes typed outside the command line; `complete` is
    /// false while a command is still being typed.
    pub fn record_keys(&mut self, keys: &str, complete: bool) {
        self.recorder.record(keys, complete);
    }
}

/// Saves the typed text into the `.` register when insert mode ends.
struct InsertHooks<'a> {
    registers: &'a mut RegisterStore,
    store: &'a mut MacroStore,
    inserted: &'a mut String,
}

impl ModeHooks for InsertHooks<'_> {
    fn setup_insert(&mut self, _mode: Mode) {
        self.inserted.clear();
    }

    fn restore_command(&mut self) {
        if !self.inserted.is_empty() {
            self.registers.inserted(self.store, self.inserted);
        }
    }
}
