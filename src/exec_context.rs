//! `ExecutionContext`: a session plus the shared context, for one command.
//!
//! Nested execution (macros, `:source`, `:global`) reuses the same context,
//! which carries the in-progress sets that reject recursion.

use std::path::PathBuf;

use crate::address::{AddressRange, Resolver};
use crate::buffer::Buffer;
use crate::cmd_result::{CmdFailure, CmdResult};
use crate::context::ExContext;
use crate::interpreter;
use crate::session::Session;
use crate::variable::{self, ExpandEnv};

pub struct ExecutionContext<'a> {
    pub session: &'a mut Session,
    pub ctx: &'a mut ExContext,
    /// Scripts currently being sourced, outermost first.
    pub(crate) sourcing: Vec<PathBuf>,
    /// Command lines currently executing, outermost first.
    pub(crate) invoking: Vec<String>,
    /// Macros currently playing.
    pub(crate) playing: Vec<String>,
    pub(crate) in_global: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(session: &'a mut Session, ctx: &'a mut ExContext) -> Self {
        Self {
            session,
            ctx,
            sourcing: Vec::new(),
            invoking: Vec::new(),
            playing: Vec::new(),
            in_global: false,
        }
    }

    pub fn buffer(&self) -> &dyn Buffer {
        self.session.buffer.as_ref()
    }

    pub fn buffer_mut(&mut self) -> &mut dyn Buffer {
        self.session.buffer.as_mut()
    }

    /// Send a message to the frontend.
    pub fn message(&mut self, text: &str) {
        self.session.frontend.message(text);
    }

    /// Execute one command line, nested inside whatever is running.
    pub fn run_line(&mut self, line: &str) -> CmdResult {
        self.invoking.push(line.to_string());
        self.session.buffer.begin_undo_action();
        let result = interpreter::execute_line(self, line);
        self.session.buffer.end_undo_action();
        self.invoking.pop();
        result
    }

    pub fn resolver(&mut self) -> Resolver<'_> {
        Resolver {
            buffer: self.session.buffer.as_ref(),
            settings: &self.ctx.settings,
            last_search: &mut self.ctx.last_search,
            remember_search: !self.session.tag_jump,
        }
    }

    /// Resolve range text; `default` is used when the text is empty.
    pub fn resolve_range(&mut self, text: &str, default: &str) -> Result<AddressRange, CmdFailure> {
        let text = if text.trim().is_empty() { default } else { text };
        Resolver::resolve_range(
            self.session.buffer.as_mut(),
            &self.ctx.settings,
            &mut self.ctx.last_search,
            !self.session.tag_jump,
            text,
        )
    }

    /// Expand the variable `name` to text.
    pub fn expand_variable(&mut self, name: &str) -> Result<String, CmdFailure> {
        let ctx = &mut *self.ctx;
        let session = &mut *self.session;
        let mut env = ExpandEnv {
            store: &mut ctx.store,
            settings: &ctx.settings,
            frontend: session.frontend.as_mut(),
            runner: ctx.runner.as_mut(),
            filename: session.filename.as_deref(),
            cwd: &session.cwd,
        };
        variable::expand_named(&mut env, name)
    }

    /// Expand `name` and insert the result at the cursor.
    pub fn insert_variable(&mut self, name: &str) -> CmdResult {
        if !self.buffer().is_editable() {
            return CmdFailure::ReadOnlyOrBinary.into();
        }
        match self.expand_variable(name) {
            Ok(text) => {
                let buffer = self.buffer_mut();
                let cursor = buffer.cursor();
                buffer.insert(cursor, &text);
                buffer.set_cursor(cursor + text.chars().count());
                CmdResult::Success
            }
            Err(failure) => failure.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::frontend::ScriptedFrontend;
    use crate::variable::{Variable, VariableKind};

    #[test]
    fn insert_fixed_variable_at_cursor() {
        let mut session = Session::new(Frame::from_lines(&["ab"]), ScriptedFrontend::new());
        session.buffer_mut().set_cursor(1);
        let mut ctx = ExContext::in_memory();
        ctx.store
            .set_variable(Variable::new("who", VariableKind::Fixed).with_value("XY"));
        let mut ectx = ExecutionContext::new(&mut session, &mut ctx);
        assert_eq!(ectx.insert_variable("who"), CmdResult::Success);
        assert_eq!(ectx.buffer().cursor(), 3);
        assert_eq!(session.lines(), vec!["aXYb"]);
    }

    #[test]
    fn builtin_filename_comes_from_session() {
        let mut session = Session::new(Frame::new(), ScriptedFrontend::new())
            .with_filename("/tmp/dir/notes.txt");
        let mut ctx = ExContext::in_memory();
        let mut ectx = ExecutionContext::new(&mut session, &mut ctx);
        assert_eq!(ectx.expand_variable("Filename").as_deref(), Ok("notes.txt"));
        assert_eq!(ectx.expand_variable("Path").as_deref(), Ok("/tmp/dir"));
    }

    #[test]
    fn insert_into_read_only_fails() {
        let frame = Frame::from_lines(&["ab"]).with_read_only(true);
        let mut session = Session::new(frame, ScriptedFrontend::new());
        let mut ctx = ExContext::in_memory();
        let mut ectx = ExecutionContext::new(&mut session, &mut ctx);
        assert_eq!(
            ectx.insert_variable("Year"),
            CmdResult::Failure(CmdFailure::ReadOnlyOrBinary)
        );
    }

    #[test]
    fn empty_range_text_uses_default() {
        let mut session = Session::new(Frame::from_lines(&["a", "b", "c"]), ScriptedFrontend::new());
        let mut ctx = ExContext::in_memory();
        let mut ectx = ExecutionContext::new(&mut session, &mut ctx);
        let range = ectx.resolve_range("", "%").unwrap();
        assert_eq!((range.begin.line, range.end.line), (1, 3));
        let range = ectx.resolve_range("2", "%").unwrap();
        assert_eq!((range.begin.line, range.end.line), (2, 2));
    }
}
