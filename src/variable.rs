//! Typed variables expanded into buffer text.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cmd_result::{CmdFailure, parse_error};
use crate::config::Settings;
use crate::frontend::Frontend;
use crate::process::ProcessRunner;
use crate::store::MacroStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableKind {
    /// Computed from the session: dates, file names, comment delimiters.
    Builtin,
    /// Process environment variable named by the value (or the name).
    Environment,
    /// The stored value, verbatim.
    Fixed,
    /// Asked every time; never cached.
    Input,
    /// Asked until a non-empty answer is captured.
    InputOnce,
    /// Asked every time; the answer becomes the next default.
    InputSave,
    /// Output of the command held in the value.
    Process,
    /// File named by the value, with `@name@` tokens expanded.
    Template,
}

impl VariableKind {
    /// Whether expansion results are written back to the store.
    pub fn is_cached(self) -> bool {
        matches!(self, VariableKind::InputOnce | VariableKind::InputSave)
    }

    /// Whether the record itself belongs in the persisted store.
    pub fn is_persistent(self) -> bool {
        !matches!(
            self,
            VariableKind::Builtin | VariableKind::Input | VariableKind::Process
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VariableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default = "default_ask", rename = "ask-for-input")]
    pub ask_for_input: bool,
}

fn default_ask() -> bool {
    true
}

const BUILTINS: &[&str] = &[
    "Cb", "Ce", "Cl", "Date", "Datetime", "Filename", "Fullname", "Path", "Time", "Year",
];

impl Variable {
    pub fn new(name: &str, kind: VariableKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value: None,
            format: None,
            prefix: None,
            ask_for_input: true,
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// The variable a first reference to `name` creates.
    pub fn first_reference(name: &str) -> Self {
        if BUILTINS.contains(&name) {
            Variable::new(name, VariableKind::Builtin)
        } else {
            Variable::new(name, VariableKind::Input)
        }
    }
}

/// What expansion may consult and mutate.
pub struct ExpandEnv<'a> {
    pub store: &'a mut MacroStore,
    pub settings: &'a Settings,
    pub frontend: &'a mut dyn Frontend,
    pub runner: &'a mut dyn ProcessRunner,
    pub filename: Option<&'a Path>,
    pub cwd: &'a Path,
}

/// Expand the variable called `name`, creating it on first reference.
pub fn expand_named(env: &mut ExpandEnv, name: &str) -> Result<String, CmdFailure> {
    expand_nested(env, name, &mut Vec::new())
}

fn expand_nested(
    env: &mut ExpandEnv,
    name: &str,
    visiting: &mut Vec<String>,
) -> Result<String, CmdFailure> {
    if visiting.iter().any(|n| n == name) {
        return Err(CmdFailure::RecursionDetected(format!(
            "variable {name} ({})",
            visiting.join(" -> ")
        )));
    }
    let known = env.store.variable(name).cloned();
    let is_new = known.is_none();
    let mut variable = known.unwrap_or_else(|| Variable::first_reference(name));

    visiting.push(name.to_string());
    let expanded = expand_variable(env, &mut variable, visiting);
    visiting.pop();
    let expanded = expanded?;

    if variable.kind.is_cached() || (is_new && variable.kind.is_persistent()) {
        env.store.set_variable(variable.clone());
    }
    debug!(name, kind = ?variable.kind, "variable expanded");
    Ok(apply_prefix(&variable, expanded))
}

/// Expand one variable; `INPUT_ONCE`/`INPUT_SAVE` update `variable` in place.
pub fn expand_variable(
    env: &mut ExpandEnv,
    variable: &mut Variable,
    visiting: &mut Vec<String>,
) -> Result<String, CmdFailure> {
    match variable.kind {
        VariableKind::Builtin => expand_builtin(env, variable),
        VariableKind::Environment => {
            let key = variable.value.as_deref().unwrap_or(&variable.name);
            std::env::var(key)
                .map_err(|_| CmdFailure::Io(format!("environment variable {key} is not set")))
        }
        VariableKind::Fixed => Ok(variable.value.clone().unwrap_or_default()),
        VariableKind::Input | VariableKind::InputOnce | VariableKind::InputSave => {
            if !variable.ask_for_input {
                return Ok(variable.value.clone().unwrap_or_default());
            }
            let default = variable.value.clone().unwrap_or_default();
            let answer = env
                .frontend
                .input(&variable.name, &default)
                .ok_or(CmdFailure::Cancelled)?;
            if variable.kind.is_cached() {
                variable.value = Some(answer.clone());
            }
            if variable.kind == VariableKind::InputOnce && !answer.is_empty() {
                variable.ask_for_input = false;
            }
            Ok(answer)
        }
        VariableKind::Process => {
            let command = variable
                .value
                .as_deref()
                .ok_or_else(|| parse_error(format!("variable {} has no command", variable.name)))?;
            let output = env
                .runner
                .run(command, env.cwd)
                .map_err(|err| CmdFailure::ExternalProcess(format!("{err:#}")))?;
            if let Some(failure) = output.failure_text() {
                return Err(CmdFailure::ExternalProcess(failure));
            }
            Ok(output.stdout.trim_end_matches(['\n', '\r']).to_string())
        }
        VariableKind::Template => {
            let file = variable
                .value
                .as_deref()
                .ok_or_else(|| parse_error(format!("variable {} has no template", variable.name)))?;
            let path = template_path(env.settings, env.cwd, file);
            let text = fs::read_to_string(&path)
                .map_err(|err| CmdFailure::Io(format!("{}: {err}", path.display())))?;
            expand_template(env, &text, visiting)
        }
    }
}

fn template_path(settings: &Settings, cwd: &Path, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        settings.template_dir.as_deref().unwrap_or(cwd).join(file)
    }
}

/// Replace `@name@` tokens; `@@` is a literal `@`.
fn expand_template(
    env: &mut ExpandEnv,
    text: &str,
    visiting: &mut Vec<String>,
) -> Result<String, CmdFailure> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('@') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('@')
            .ok_or_else(|| parse_error(format!("unterminated @ in template: {}", after.trim_end())))?;
        let name = &after[..end];
        if name.is_empty() {
            out.push('@');
        } else {
            out.push_str(&expand_nested(env, name, visiting)?);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn expand_builtin(env: &ExpandEnv, variable: &Variable) -> Result<String, CmdFailure> {
    let now = || {
        let default = match variable.name.as_str() {
            "Date" => "%Y-%m-%d",
            "Datetime" => "%Y-%m-%d %H:%M:%S",
            "Time" => "%H:%M:%S",
            _ => "%Y",
        };
        let format = variable.format.as_deref().unwrap_or(default);
        Local::now().format(format).to_string()
    };
    let file_part = |f: fn(&Path) -> Option<String>| env.filename.and_then(f).unwrap_or_default();
    let value = match variable.name.as_str() {
        "Date" | "Datetime" | "Time" | "Year" => now(),
        "Filename" => file_part(|p| p.file_name().map(|n| n.to_string_lossy().into_owned())),
        "Fullname" => file_part(|p| Some(p.display().to_string())),
        "Path" => file_part(|p| p.parent().map(|d| d.display().to_string())),
        "Cb" => env.settings.comment_begin.clone(),
        "Ce" => env.settings.comment_end.clone(),
        "Cl" => {
            let begin = &env.settings.comment_begin;
            let end = &env.settings.comment_end;
            if end.is_empty() {
                begin.clone()
            } else {
                format!("{begin} {end}")
            }
        }
        other => return Err(parse_error(format!("unknown builtin variable: {other}"))),
    };
    Ok(value)
}

fn apply_prefix(variable: &Variable, text: String) -> String {
    match variable.prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => text
            .split_inclusive('\n')
            .map(|line| format!("{prefix}{line}"))
            .collect(),
        _ => text,
    }
}
