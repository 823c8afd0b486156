//! A vi/ex command language engine over a line-oriented text buffer.
//!
//! Command lines such as `1,3s/alpha/gamma/g`, `.,.+2m0` or `g/TODO/d` are
//! parsed, their addresses resolved against a [`Buffer`], and the verb run
//! inside one undo group. Registers, macros, abbreviations, maps and typed
//! variables live in a shared [`ExContext`] that persists to a JSON store.
//!
//! # Example
//!
//! ```rust
//! use vicmd::{CmdResult, ExContext, Frame, ScriptedFrontend, Session};
//!
//! let mut session = Session::new(
//!     Frame::from_lines(&["alpha", "beta", "alpha beta"]),
//!     ScriptedFrontend::new(),
//! );
//! let mut ctx = ExContext::in_memory();
//!
//! let result = session.execute(&mut ctx, "%s/alpha/gamma/g");
//! assert_eq!(
//!     result,
//!     CmdResult::Message("Replaced: 2 occurrences of: alpha".into())
//! );
//! assert_eq!(session.lines(), vec!["gamma", "beta", "gamma beta"]);
//!
//! session.execute(&mut ctx, "2m0");
//! assert_eq!(session.lines(), vec!["beta", "gamma", "gamma beta"]);
//! ```

mod address;
mod buffer;
mod calc;
mod cmd_result;
mod config;
mod context;
mod exec_context;
mod frame;
mod frontend;
mod interpreter;
mod macros;
mod marks;
mod mode;
mod parse_cmd;
mod position;
mod process;
mod range;
mod register;
mod session;
mod store;
mod substitute;
mod variable;

pub use address::{Address, AddressRange, Resolver};
pub use buffer::{Buffer, Selection, SelectionKind};
pub use calc::evaluate;
pub use cmd_result::{CmdFailure, CmdResult};
pub use config::Settings;
pub use context::ExContext;
pub use exec_context::ExecutionContext;
pub use frame::Frame;
pub use frontend::{BatchFrontend, Confirm, Frontend, ScriptedFrontend};
pub use interpreter::execute_line;
pub use macros::{MacroRecorder, RecorderState, play};
pub use marks::{MarkId, MarkSet};
pub use mode::{InsertCommand, Mode, ModeEvent, ModeHooks, ModeMachine, NoHooks, transition};
pub use parse_cmd::{ParsedCommand, Verb, parse};
pub use position::Position;
pub use process::{ProcessOutput, ProcessRunner, ShellRunner};
pub use register::{RegisterName, RegisterStore};
pub use session::Session;
pub use store::{MacroStore, MapKind};
pub use substitute::{SubstituteFlags, SubstituteOutcome, Substitution};
pub use variable::{ExpandEnv, Variable, VariableKind, expand_variable};
