//! Macro recording and playback.
//!
//! Recording is a two-state machine owned by the session. Playback runs a
//! stored macro through the interpreter and refuses to start a macro that is
//! being recorded or is already playing.

use tracing::{debug, warn};

use crate::cmd_result::{CmdFailure, CmdResult, parse_error};
use crate::exec_context::ExecutionContext;
use crate::register::RegisterName;
use crate::store::MacroStore;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording {
        name: String,
        /// Append to the existing content instead of replacing it.
        append: bool,
        commands: Vec<String>,
        /// The last entry is still being typed.
        open: bool,
    },
}

#[derive(Debug, Default)]
pub struct MacroRecorder {
    state: RecorderState,
}

/// A single letter or digit names a register; longer names are scripts.
fn is_register_name(name: &str) -> bool {
    name.chars().count() == 1
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    /// Name of the macro being recorded, after case folding.
    pub fn recording_name(&self) -> Option<&str> {
        match &self.state {
            RecorderState::Recording { name, .. } => Some(name),
            RecorderState::Idle => None,
        }
    }

    /// Start recording into `name`. A single upper-case letter appends to
    /// the lower-case register; any other name starts from empty.
    pub fn start(&mut self, store: &mut MacroStore, name: &str) -> Result<(), CmdFailure> {
        if let Some(current) = self.recording_name() {
            return Err(parse_error(format!("already recording {current}")));
        }
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(parse_error(format!("invalid macro name: {name}")));
        }
        let single_upper = is_register_name(name) && name.chars().all(|c| c.is_ascii_uppercase());
        let name = if single_upper {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        if !single_upper {
            store.remove_macro(&name);
        }
        debug!(%name, append = single_upper, "recording started");
        self.state = RecorderState::Recording {
            name,
            append: single_upper,
            commands: Vec::new(),
            open: false,
        };
        Ok(())
    }

    /// Stop recording. Saves the recorded commands, or drops the macro
    /// entirely if nothing was recorded. Returns the name and command count.
    pub fn stop(&mut self, store: &mut MacroStore) -> Option<(String, usize)> {
        let RecorderState::Recording {
            name,
            append,
            commands,
            ..
        } = std::mem::take(&mut self.state)
        else {
            return None;
        };
        let count = commands.len();
        // Registers hold text; each command becomes one line of it.
        let commands: Vec<String> = if is_register_name(&name) {
            commands.into_iter().map(|c| format!("{c}\n")).collect()
        } else {
            commands
        };
        if commands.is_empty() {
            if !append {
                store.remove_macro(&name);
            }
        } else if append {
            for command in commands {
                store.append_macro(&name, command);
            }
        } else {
            store.set_macro(&name, commands);
        }
        debug!(%name, count, "recording stopped");
        Some((name, count))
    }

    /// Record one command. A lone space is recorded as `l`; an incomplete
    /// command is joined onto the previous incomplete one.
    pub fn record(&mut self, command: &str, complete: bool) {
        let RecorderState::Recording { commands, open, .. } = &mut self.state else {
            return;
        };
        let command = if command == " " { "l" } else { command };
        match commands.last_mut() {
            Some(last) if *open => last.push_str(command),
            _ => commands.push(command.to_string()),
        }
        *open = !complete;
    }
}

/// The commands stored under `name`, one per entry.
fn macro_commands(ectx: &ExecutionContext, name: &str) -> Option<Vec<String>> {
    if is_register_name(name) {
        let c = name.chars().next()?;
        let register = RegisterName::parse(c)?;
        let text = ectx.ctx.registers.get(&ectx.ctx.store, register);
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        (!lines.is_empty()).then_some(lines)
    } else {
        ectx.ctx.store.macro_commands(name).map(<[String]>::to_vec)
    }
}

/// Play macro `name` `count` times. A count of zero or less does nothing.
pub fn play(ectx: &mut ExecutionContext, name: &str, count: i64) -> CmdResult {
    if count <= 0 {
        return CmdResult::Success;
    }
    let name = if is_register_name(name) {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    };
    if ectx.session.recorder.recording_name() == Some(name.as_str()) {
        warn!(%name, "refusing to play the macro being recorded");
        return CmdFailure::RecursionDetected(format!("macro {name} is being recorded")).into();
    }
    if ectx.playing.contains(&name) {
        warn!(%name, "refusing to play a macro from itself");
        return CmdFailure::RecursionDetected(format!("macro {name} is already playing")).into();
    }
    let Some(commands) = macro_commands(ectx, &name) else {
        return CmdFailure::Parse(format!("no macro named {name}")).into();
    };

    ectx.playing.push(name.clone());
    ectx.buffer_mut().begin_undo_action();
    let mut result = CmdResult::Success;
    'repeat: for _ in 0..count {
        for command in &commands {
            if ectx.ctx.is_cancelled() {
                result = CmdFailure::Cancelled.into();
                break 'repeat;
            }
            let outcome = ectx.run_line(command);
            if outcome.is_failure() {
                ectx.message(&format!("macro {name} failed at: {command}"));
                result = outcome;
                break 'repeat;
            }
        }
    }
    ectx.buffer_mut().end_undo_action();
    ectx.playing.pop();
    result
}
