//! Command dispatch.
//!
//! [`execute_line`] parses one command line, resolves its range and hands
//! it to the verb. Range verbs live in [`crate::range`]; the verbs that take
//! no range (directory, scripts, settings, maps, recording) live here.

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, info};

use crate::address::AddressRange;
use crate::buffer::Selection;
use crate::calc;
use crate::cmd_result::{CmdFailure, CmdResult, parse_error};
use crate::exec_context::ExecutionContext;
use crate::macros;
use crate::parse_cmd::{self, ParsedCommand, Verb};
use crate::range::TextPlacement;
use crate::store::MapKind;

/// Parse and execute one command line.
pub fn execute_line(ectx: &mut ExecutionContext, line: &str) -> CmdResult {
    let command = match parse_cmd::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return CmdResult::Success,
        Err(failure) => return failure.into(),
    };
    debug!(range = command.range, verb = ?command.verb, text = command.text, "dispatch");
    if !command.verb.takes_range() && !command.range.is_empty() {
        return parse_error(format!("{:?} does not take a range", command.verb)).into();
    }
    dispatch(ectx, &command)
}

/// Resolve the range text, or `default` when none was given.
fn with_range(
    ectx: &mut ExecutionContext,
    command: &ParsedCommand,
    default: &str,
    verb: impl FnOnce(&mut ExecutionContext, &AddressRange) -> CmdResult,
) -> CmdResult {
    match ectx.resolve_range(command.range, default) {
        Ok(range) => verb(ectx, &range),
        Err(failure) => failure.into(),
    }
}

/// Resolve a copy/move destination; `0` means before the first line.
fn destination(ectx: &mut ExecutionContext, text: &str) -> Result<usize, CmdFailure> {
    let text = text.trim();
    if text.is_empty() {
        return Err(parse_error("missing destination"));
    }
    ectx.resolver().resolve_destination(text)
}

fn dispatch(ectx: &mut ExecutionContext, command: &ParsedCommand) -> CmdResult {
    let text = command.text;
    match command.verb {
        Verb::Goto => with_range(ectx, command, ".", |e, r| e.cmd_goto(r)),
        Verb::Append | Verb::Insert if command.range == "0" => {
            let first = AddressRange::lines(1, 1, ectx.buffer());
            ectx.cmd_text(&first, TextPlacement::Insert, text)
        }
        Verb::Append => with_range(ectx, command, ".", |e, r| e.cmd_text(r, TextPlacement::Append, text)),
        Verb::Insert => with_range(ectx, command, ".", |e, r| e.cmd_text(r, TextPlacement::Insert, text)),
        Verb::Change => with_range(ectx, command, ".", |e, r| e.cmd_text(r, TextPlacement::Change, text)),
        Verb::Delete => with_range(ectx, command, ".", |e, r| e.cmd_delete(r, text)),
        Verb::Yank => with_range(ectx, command, ".", |e, r| e.cmd_yank(r, text)),
        Verb::Put if command.range == "0" => ectx.cmd_put(0, text),
        Verb::Put => with_range(ectx, command, ".", |e, r| match r.checked() {
            Ok(_) => e.cmd_put(r.end.line, text),
            Err(failure) => failure.into(),
        }),
        Verb::Copy => with_range(ectx, command, ".", |e, r| match destination(e, text) {
            Ok(dest) => e.cmd_copy(r, dest),
            Err(failure) => failure.into(),
        }),
        Verb::Move => with_range(ectx, command, ".", |e, r| match destination(e, text) {
            Ok(dest) => e.cmd_move(r, dest),
            Err(failure) => failure.into(),
        }),
        Verb::Join => with_range(ectx, command, ".", |e, r| e.cmd_join(r, command.bang)),
        Verb::Print => with_range(ectx, command, ".", |e, r| e.cmd_print(r, false)),
        Verb::Number => with_range(ectx, command, ".", |e, r| e.cmd_print(r, true)),
        Verb::LineNumber => with_range(ectx, command, "$", |e, r| e.cmd_line_number(r)),
        Verb::Mark => with_range(ectx, command, ".", |e, r| e.cmd_mark(r, text)),
        Verb::Shift { forward, count } => {
            with_range(ectx, command, ".", |e, r| e.cmd_shift(r, forward, count))
        }
        Verb::Sort => with_range(ectx, command, "%", |e, r| e.cmd_sort(r, text)),
        Verb::Bang if command.range.is_empty() => run_shell(ectx, text),
        Verb::Bang => with_range(ectx, command, ".", |e, r| e.cmd_filter(r, text)),
        Verb::Substitute => with_range(ectx, command, ".", |e, r| e.cmd_substitute(r, text)),
        Verb::RepeatSubstitute { keep_flags } => with_range(ectx, command, ".", |e, r| {
            e.cmd_repeat_substitute(r, text, keep_flags)
        }),
        Verb::RepeatWithSearch => with_range(ectx, command, ".", |e, r| e.cmd_repeat_with_search(r, text)),
        Verb::Global { invert } => with_range(ectx, command, "%", |e, r| e.cmd_global(r, text, invert)),
        Verb::Play => play(ectx, command.range, text),
        Verb::Cd => change_directory(ectx, text),
        Verb::Pwd => CmdResult::Message(ectx.session.cwd.display().to_string()),
        Verb::Source => source(ectx, text),
        Verb::Syntax => syntax(ectx, text),
        Verb::Registers => list_registers(ectx),
        Verb::Marks => list_marks(ectx),
        Verb::Set => {
            let args = if text.trim().is_empty() { "all" } else { text };
            match ectx.ctx.settings.apply(args) {
                Ok(Some(listing)) => CmdResult::Message(listing),
                Ok(None) => CmdResult::Success,
                Err(failure) => failure.into(),
            }
        }
        Verb::Abbreviate => abbreviate(ectx, text),
        Verb::Unabbreviate => {
            let name = text.trim();
            if ectx.ctx.store.remove_abbreviation(name) {
                CmdResult::Success
            } else {
                parse_error(format!("no such abbreviation: {name}")).into()
            }
        }
        Verb::Map => map(ectx, text),
        Verb::Unmap => {
            let name = text.trim();
            if ectx.ctx.store.remove_map(name) {
                CmdResult::Success
            } else {
                parse_error(format!("no such mapping: {name}")).into()
            }
        }
        Verb::Undo => {
            if ectx.buffer_mut().undo() {
                CmdResult::Success
            } else {
                CmdResult::Message("already at oldest change".into())
            }
        }
        Verb::NoHighlight => {
            let buffer = ectx.buffer_mut();
            let cursor = buffer.cursor();
            buffer.set_selection(Selection::caret(cursor));
            CmdResult::Success
        }
        Verb::Record => {
            let name = text.trim();
            let session = &mut *ectx.session;
            match session.recorder.start(&mut ectx.ctx.store, name) {
                Ok(()) => {
                    let name = session.recorder.recording_name().unwrap_or(name);
                    CmdResult::Message(format!("recording {name}"))
                }
                Err(failure) => failure.into(),
            }
        }
        Verb::Stop => match ectx.session.recorder.stop(&mut ectx.ctx.store) {
            Some((name, count)) => {
                info!(%name, count, "macro recorded");
                CmdResult::Message(format!("recorded {count} commands into {name}"))
            }
            None => parse_error("not recording").into(),
        },
    }
}

/// `[count]@x`
fn play(ectx: &mut ExecutionContext, count: &str, name: &str) -> CmdResult {
    let name = name.trim();
    if name.is_empty() {
        return parse_error("missing macro name").into();
    }
    let count = if count.is_empty() {
        1
    } else {
        match calc::evaluate(count, ectx.buffer()) {
            Ok(count) => count,
            Err(failure) => return failure.into(),
        }
    };
    macros::play(ectx, name, count)
}

/// `!cmd` without a range: run it and show its output.
fn run_shell(ectx: &mut ExecutionContext, command: &str) -> CmdResult {
    let command = command.trim();
    if command.is_empty() {
        return parse_error("missing shell command").into();
    }
    match ectx.ctx.runner.run(command, &ectx.session.cwd) {
        Ok(output) => match output.failure_text() {
            Some(failure) => CmdFailure::ExternalProcess(failure).into(),
            None if output.stdout.trim_end().is_empty() => CmdResult::Success,
            None => CmdResult::Message(output.stdout.trim_end().to_string()),
        },
        Err(err) => CmdFailure::ExternalProcess(format!("{err:#}")).into(),
    }
}

fn change_directory(ectx: &mut ExecutionContext, text: &str) -> CmdResult {
    let text = text.trim();
    let target = if text.is_empty() {
        match dirs::home_dir() {
            Some(home) => home,
            None => return parse_error("no home directory").into(),
        }
    } else {
        ectx.session.cwd.join(text)
    };
    if !target.is_dir() {
        return CmdFailure::Io(format!("not a directory: {}", target.display())).into();
    }
    let target = target.canonicalize().unwrap_or(target);
    debug!(cwd = %target.display(), "directory changed");
    ectx.session.cwd = target;
    CmdResult::Success
}

/// Canonical path of a script, for the recursion check.
fn script_path(cwd: &Path, name: &str) -> PathBuf {
    let path = cwd.join(name);
    path.canonicalize().unwrap_or(path)
}

/// `so file`: run every line of a script, stopping at the first failure.
fn source(ectx: &mut ExecutionContext, text: &str) -> CmdResult {
    let name = text.trim();
    if name.is_empty() {
        return parse_error("missing script name").into();
    }
    let path = script_path(&ectx.session.cwd, name);
    if ectx.sourcing.contains(&path) {
        return CmdFailure::RecursionDetected(format!("{} is already being sourced", path.display())).into();
    }
    let script = match fs::read_to_string(&path) {
        Ok(script) => script,
        Err(err) => return CmdFailure::Io(format!("{}: {err}", path.display())).into(),
    };
    debug!(path = %path.display(), "sourcing");

    ectx.sourcing.push(path);
    let mut result = CmdResult::Success;
    for line in script.lines() {
        let line = line.trim();
        let line = line.strip_prefix(':').unwrap_or(line).trim_start();
        if line.is_empty() || line.starts_with('"') {
            continue;
        }
        if ectx.invoking.iter().any(|running| running.trim().trim_start_matches(':').trim() == line) {
            result = CmdFailure::RecursionDetected(format!("script runs itself: {line}")).into();
            break;
        }
        if ectx.ctx.is_cancelled() {
            result = CmdFailure::Cancelled.into();
            break;
        }
        match ectx.run_line(line) {
            CmdResult::Success => {}
            CmdResult::Message(message) => ectx.message(&message),
            failure @ CmdResult::Failure(_) => {
                result = failure;
                break;
            }
        }
    }
    ectx.sourcing.pop();
    result
}

fn syntax(ectx: &mut ExecutionContext, text: &str) -> CmdResult {
    match text.trim() {
        "on" => ectx.session.syntax = true,
        "off" => ectx.session.syntax = false,
        "" => {
            let state = if ectx.session.syntax { "on" } else { "off" };
            return CmdResult::Message(format!("syntax {state}"));
        }
        other => return parse_error(format!("syntax: expected on or off, got {other}")).into(),
    }
    CmdResult::Success
}

/// Register contents on one line each, line breaks shown as `^J`.
fn list_registers(ectx: &mut ExecutionContext) -> CmdResult {
    let listing = ectx.ctx.registers.listing(&ectx.ctx.store);
    if listing.is_empty() {
        return CmdResult::Message("no registers".into());
    }
    CmdResult::Message(
        listing
            .into_iter()
            .map(|(name, text)| format!("\"{name}   {}", text.replace('\n', "^J")))
            .join("\n"),
    )
}

fn list_marks(ectx: &mut ExecutionContext) -> CmdResult {
    let buffer = ectx.buffer();
    let marks = buffer.named_marks();
    if marks.is_empty() {
        return CmdResult::Message("no marks set".into());
    }
    CmdResult::Message(
        marks
            .into_iter()
            .map(|(name, offset)| format!("{name} {:>6}", buffer.char_to_line(offset) + 1))
            .join("\n"),
    )
}

fn split_definition(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((lhs, rhs)) => (lhs, rhs.trim_start()),
        None => (text, ""),
    }
}

/// `ab lhs rhs`; with no arguments, list the abbreviations.
fn abbreviate(ectx: &mut ExecutionContext, text: &str) -> CmdResult {
    let (lhs, rhs) = split_definition(text);
    if lhs.is_empty() {
        let abbreviations = ectx.ctx.store.abbreviations();
        if abbreviations.is_empty() {
            return CmdResult::Message("no abbreviations".into());
        }
        return CmdResult::Message(abbreviations.iter().map(|(l, r)| format!("{l}  {r}")).join("\n"));
    }
    if rhs.is_empty() {
        return parse_error(format!("abbreviate: missing expansion for {lhs}")).into();
    }
    ectx.ctx.store.set_abbreviation(lhs, rhs);
    CmdResult::Success
}

/// `map lhs rhs`; with no arguments, list every mapping.
fn map(ectx: &mut ExecutionContext, text: &str) -> CmdResult {
    let (lhs, rhs) = split_definition(text);
    if lhs.is_empty() {
        let store = &ectx.ctx.store;
        let listing = [MapKind::Map, MapKind::Alt, MapKind::Control, MapKind::Key]
            .into_iter()
            .filter_map(|kind| store.maps(kind))
            .flatten()
            .map(|(l, r)| format!("{l}  {r}"))
            .join("\n");
        if listing.is_empty() {
            return CmdResult::Message("no mappings".into());
        }
        return CmdResult::Message(listing);
    }
    if rhs.is_empty() {
        return parse_error(format!("map: missing right-hand side for {lhs}")).into();
    }
    ectx.ctx.store.set_map(lhs, rhs);
    CmdResult::Success
}
