//! Range verbs: every operation that acts on an [`AddressRange`].
//!
//! Each verb checks the range first; an invalid range changes nothing and
//! reports `InvalidRange`. Mutating verbs also refuse read-only and binary
//! buffers.

use std::cmp::Ordering;
use std::io::Write as _;

use itertools::Itertools;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::address::{AddressRange, find_delimiter, search_regex};
use crate::buffer::{Buffer, SelectionKind};
use crate::cmd_result::{CmdFailure, CmdResult, parse_error, plural};
use crate::exec_context::ExecutionContext;
use crate::marks::MarkId;
use crate::position::Position;
use crate::register::RegisterName;
use crate::substitute::{SubstituteFlags, SubstituteIo, Substitution, substitute_lines};

/// Where `a`, `i` and `c` put their text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPlacement {
    Append,
    Insert,
    Change,
}

/// Optional register name and count, as taken by `d`, `y` and `pu`.
fn register_and_count(text: &str) -> Result<(Option<RegisterName>, Option<usize>), CmdFailure> {
    let text = text.trim();
    let mut rest = text;
    let mut register = None;
    if let Some(c) = text.chars().next()
        && !c.is_ascii_digit()
    {
        register = Some(
            RegisterName::parse(c).ok_or_else(|| parse_error(format!("invalid register: {c}")))?,
        );
        rest = text[c.len_utf8()..].trim_start();
    }
    let count = if rest.is_empty() {
        None
    } else {
        let count = rest
            .parse::<usize>()
            .map_err(|_| parse_error(format!("trailing characters: {rest}")))?;
        Some(count).filter(|&n| n > 0)
    };
    Ok((register, count))
}

/// Replace whole words that are abbreviations.
fn expand_abbreviations(text: &str, ectx: &ExecutionContext) -> String {
    let abbreviations = ectx.ctx.store.abbreviations();
    if abbreviations.is_empty() {
        return text.to_string();
    }
    text.split_inclusive(char::is_whitespace)
        .map(|piece| {
            let word = piece.trim_end();
            match abbreviations.get(word) {
                Some(expansion) => format!("{expansion}{}", &piece[word.len()..]),
                None => piece.to_string(),
            }
        })
        .collect()
}

/// Leading whitespace chars covering up to `columns` columns.
fn outdent_len(line: &str, columns: usize, tab_width: usize) -> usize {
    let mut used = 0;
    let mut count = 0;
    for c in line.chars() {
        let width = match c {
            ' ' => 1,
            '\t' => tab_width.max(1),
            _ => break,
        };
        if used + width > columns && used > 0 {
            break;
        }
        used += width;
        count += 1;
        if used >= columns {
            break;
        }
    }
    count
}

/// Sort options: `u`, `r` and an optional `start[,length]` column window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SortOptions {
    unique: bool,
    reverse: bool,
    /// 0-based first column of the key.
    start: usize,
    length: Option<usize>,
}

impl SortOptions {
    fn parse(text: &str) -> Result<SortOptions, CmdFailure> {
        let mut options = SortOptions::default();
        let mut numbers = String::new();
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            match c {
                'u' => options.unique = true,
                'r' => options.reverse = true,
                '0'..='9' | ',' => numbers.push(c),
                other => return Err(parse_error(format!("unsupported sort flag: {other}"))),
            }
        }
        if !numbers.is_empty() {
            let (start, length) = match numbers.split_once(',') {
                Some((start, length)) => (start, Some(length)),
                None => (numbers.as_str(), None),
            };
            let number = |s: &str| {
                s.parse::<usize>()
                    .map_err(|_| parse_error(format!("bad sort column: {numbers}")))
            };
            options.start = number(start)?.saturating_sub(1);
            options.length = length.map(number).transpose()?;
        }
        Ok(options)
    }

    fn key<'s>(&self, line: &'s str) -> &'s str {
        let mut indices = line.char_indices().map(|(i, _)| i).chain(std::iter::once(line.len()));
        let Some(begin) = indices.nth(self.start) else {
            return "";
        };
        match self.length {
            Some(length) => {
                let end = line[begin..]
                    .char_indices()
                    .nth(length)
                    .map_or(line.len(), |(i, _)| begin + i);
                &line[begin..end]
            }
            None => &line[begin..],
        }
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let ordering = self.key(a).cmp(self.key(b));
        if self.reverse { ordering.reverse() } else { ordering }
    }
}

impl ExecutionContext<'_> {
    fn editable_range(&self, range: &AddressRange) -> Result<(usize, usize), CmdFailure> {
        let lines = range.checked()?;
        if !self.buffer().is_editable() {
            return Err(CmdFailure::ReadOnlyOrBinary);
        }
        Ok(lines)
    }

    /// `count` lines starting at the last line of `range`.
    fn counted(&self, range: &AddressRange, count: Option<usize>) -> AddressRange {
        match count {
            Some(count) if range.is_valid() => {
                let begin = range.end.line;
                AddressRange::lines(begin, begin.saturating_add(count - 1), self.buffer())
            }
            _ => range.clone(),
        }
    }

    fn set_cursor_line(&mut self, line: usize) {
        let buffer: &mut dyn Buffer = self.buffer_mut();
        let offset = buffer.line_to_char(line);
        buffer.set_cursor(offset);
    }

    /// A range without a verb: go to its last line.
    pub(crate) fn cmd_goto(&mut self, range: &AddressRange) -> CmdResult {
        match range.checked() {
            Ok((_, last)) => {
                self.set_cursor_line(last);
                CmdResult::Success
            }
            Err(failure) => failure.into(),
        }
    }

    /// `d [x] [count]`
    pub(crate) fn cmd_delete(&mut self, range: &AddressRange, args: &str) -> CmdResult {
        let (register, count) = match register_and_count(args) {
            Ok(parsed) => parsed,
            Err(failure) => return failure.into(),
        };
        let range = self.counted(range, count);
        let (first, last) = match self.editable_range(&range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let (start, end) = self.buffer().lines_span(first, last);
        let text = self.buffer().slice(start, end);
        let ctx = &mut *self.ctx;
        ctx.registers.delete(&mut ctx.store, register, &text);

        let buffer = self.buffer_mut();
        let (start, end) = buffer.deletion_span(first, last);
        buffer.clear_marks_within(start, end);
        buffer.delete(start, end);
        let line = first.min(buffer.line_count().unwrap_or(1).saturating_sub(1));
        self.set_cursor_line(line);

        let lines = last - first + 1;
        if lines > 1 {
            CmdResult::Message(format!("{} deleted", plural(lines, "line")))
        } else {
            CmdResult::Success
        }
    }

    /// `y [x] [count]`
    pub(crate) fn cmd_yank(&mut self, range: &AddressRange, args: &str) -> CmdResult {
        let (register, count) = match register_and_count(args) {
            Ok(parsed) => parsed,
            Err(failure) => return failure.into(),
        };
        let range = self.counted(range, count);
        let (first, last) = match range.checked() {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let (start, end) = self.buffer().lines_span(first, last);
        let text = self.buffer().slice(start, end);
        let ctx = &mut *self.ctx;
        ctx.registers.yank(&mut ctx.store, register, &text);
        let lines = last - first + 1;
        if lines > 1 {
            CmdResult::Message(format!("{} yanked", plural(lines, "line")))
        } else {
            CmdResult::Success
        }
    }

    /// `pu [x]`: put register text after `line` (0 puts before the first line).
    pub(crate) fn cmd_put(&mut self, line: usize, args: &str) -> CmdResult {
        let (register, _) = match register_and_count(args) {
            Ok(parsed) => parsed,
            Err(failure) => return failure.into(),
        };
        if !self.buffer().is_editable() {
            return CmdFailure::ReadOnlyOrBinary.into();
        }
        let register = register.unwrap_or(RegisterName::Clipboard);
        let text = self.ctx.registers.get(&self.ctx.store, register);
        if text.is_empty() {
            return parse_error("nothing to put").into();
        }
        let count = self.buffer_mut().put_lines(line, &text);
        self.set_cursor_line(line.saturating_add(count).saturating_sub(1));
        if count > 1 {
            CmdResult::Message(format!("{} put", plural(count, "line")))
        } else {
            CmdResult::Success
        }
    }

    /// `a text`, `i text`, `c text`.
    pub(crate) fn cmd_text(
        &mut self,
        range: &AddressRange,
        placement: TextPlacement,
        text: &str,
    ) -> CmdResult {
        let (first, last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let text = expand_abbreviations(text, self);
        let ctx = &mut *self.ctx;
        ctx.registers.inserted(&mut ctx.store, &text);

        let buffer = self.buffer_mut();
        let eol = buffer.eol().to_string();
        let after = match placement {
            TextPlacement::Append => last + 1,
            TextPlacement::Insert => first,
            TextPlacement::Change => {
                let (start, end) = buffer.deletion_span(first, last);
                buffer.clear_marks_within(start, end);
                buffer.delete(start, end);
                if buffer.len_chars() == 0 { 0 } else { first }
            }
        };
        buffer.put_lines(after, &format!("{text}{eol}"));
        self.set_cursor_line(after);
        CmdResult::Success
    }

    /// `co dest` / `t dest`
    pub(crate) fn cmd_copy(&mut self, range: &AddressRange, dest: usize) -> CmdResult {
        let (first, last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let buffer = self.buffer_mut();
        let (start, end) = buffer.lines_span(first, last);
        let text = buffer.slice(start, end);
        let count = buffer.put_lines(dest, &text);
        self.set_cursor_line(dest.saturating_add(count).saturating_sub(1));
        if count > 1 {
            CmdResult::Message(format!("{} copied", plural(count, "line")))
        } else {
            CmdResult::Success
        }
    }

    /// `m dest`. Refused when `dest` lies inside the range.
    pub(crate) fn cmd_move(&mut self, range: &AddressRange, dest: usize) -> CmdResult {
        let (first, last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        if (range.begin.line..=range.end.line).contains(&dest) {
            return CmdFailure::InvalidRange.into();
        }
        let buffer = self.buffer_mut();
        let (start, end) = buffer.lines_span(first, last);
        let text = buffer.slice(start, end);
        let (start, end) = buffer.deletion_span(first, last);
        buffer.delete(start, end);
        let count = last - first + 1;
        let dest = if dest > range.end.line { dest - count } else { dest };
        buffer.put_lines(dest, &text);
        self.set_cursor_line(dest.saturating_add(count).saturating_sub(1));
        debug!(first, last, dest, "lines moved");
        if count > 1 {
            CmdResult::Message(format!("{} moved", plural(count, "line")))
        } else {
            CmdResult::Success
        }
    }

    /// `j[!]`: join the range, or the line and the next one.
    pub(crate) fn cmd_join(&mut self, range: &AddressRange, raw: bool) -> CmdResult {
        let (first, mut last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let line_count = self.buffer().line_count().unwrap_or(last + 1);
        if first == last {
            last += 1;
        }
        if last >= line_count {
            return CmdFailure::InvalidRange.into();
        }
        let buffer = self.buffer_mut();
        let mut joined = buffer.line_text(first);
        for line in first + 1..=last {
            let text = buffer.line_text(line);
            if raw {
                joined.push_str(&text);
                continue;
            }
            let text = text.trim_start();
            if text.is_empty() {
                continue;
            }
            if !joined.is_empty() && !joined.ends_with(char::is_whitespace) && !text.starts_with(')') {
                joined.push(' ');
            }
            joined.push_str(text);
        }
        let start = buffer.line_to_char(first);
        let end = buffer.line_end(last);
        buffer.replace(start, end, &joined);
        self.set_cursor_line(first);
        CmdResult::Success
    }

    /// `p` and `nu`/`#`.
    pub(crate) fn cmd_print(&mut self, range: &AddressRange, numbered: bool) -> CmdResult {
        let (first, last) = match range.checked() {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let buffer = self.buffer();
        let text = (first..=last)
            .map(|line| {
                let text = buffer.line_text(line);
                if numbered {
                    format!("{:>6} {text}", line + 1)
                } else {
                    text
                }
            })
            .join("\n");
        self.set_cursor_line(last);
        CmdResult::Message(text)
    }

    /// `=`: the number of the range's last line.
    pub(crate) fn cmd_line_number(&mut self, range: &AddressRange) -> CmdResult {
        match range.checked() {
            Ok((_, last)) => CmdResult::Message((last + 1).to_string()),
            Err(failure) => failure.into(),
        }
    }

    /// `k x` / `ma x`
    pub(crate) fn cmd_mark(&mut self, range: &AddressRange, name: &str) -> CmdResult {
        let (_, last) = match range.checked() {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let mut chars = name.trim().chars();
        let id = match (chars.next(), chars.next()) {
            (Some(c), None) => MarkId::named(c),
            _ => None,
        };
        let Some(id) = id else {
            return parse_error(format!("invalid mark name: {}", name.trim())).into();
        };
        let buffer = self.buffer_mut();
        let offset = buffer.line_to_char(last);
        buffer.set_mark(id, offset);
        CmdResult::Success
    }

    /// `>` / `<`, repeated `count` times. Empty lines are not indented.
    pub(crate) fn cmd_shift(&mut self, range: &AddressRange, forward: bool, count: usize) -> CmdResult {
        let (first, last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let unit = self.ctx.settings.indent_unit().repeat(count);
        let columns = self.ctx.settings.shift_width * count;
        let tab_width = self.ctx.settings.shift_width;
        let buffer = self.buffer_mut();
        buffer.begin_undo_action();
        for line in first..=last {
            let start = buffer.line_to_char(line);
            let text = buffer.line_text(line);
            if forward {
                if !text.is_empty() {
                    buffer.insert(start, &unit);
                }
            } else {
                let remove = outdent_len(&text, columns, tab_width);
                if remove > 0 {
                    buffer.delete(start, start + remove);
                }
            }
        }
        buffer.end_undo_action();
        self.set_cursor_line(last);
        let lines = last - first + 1;
        if lines > 1 {
            CmdResult::Message(format!("{} shifted", plural(lines, "line")))
        } else {
            CmdResult::Success
        }
    }

    /// `sor[t] [u][r][start[,length]]`. With a block selection only the
    /// selected columns are sorted.
    pub(crate) fn cmd_sort(&mut self, range: &AddressRange, args: &str) -> CmdResult {
        let options = match SortOptions::parse(args) {
            Ok(options) => options,
            Err(failure) => return failure.into(),
        };
        let (first, last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let buffer = self.buffer_mut();
        let lines: Vec<String> = (first..=last).map(|line| buffer.line_text(line)).collect();
        let selection = buffer.selection();

        let sorted: Vec<String> = if selection.kind == SelectionKind::Block && !selection.is_empty() {
            let (left, right) = {
                let a = Position::of(&*buffer, selection.anchor).column;
                let b = Position::of(&*buffer, selection.head).column;
                (a.min(b), a.max(b) + 1)
            };
            let split = |line: &str| -> (String, String, String) {
                let chars: Vec<char> = line.chars().collect();
                let l = left.min(chars.len());
                let r = right.min(chars.len());
                (
                    chars[..l].iter().collect(),
                    chars[l..r].iter().collect(),
                    chars[r..].iter().collect(),
                )
            };
            let parts: Vec<(String, String, String)> = lines.iter().map(|l| split(l)).collect();
            let blocks: Vec<String> = parts
                .iter()
                .map(|(_, block, _)| block.clone())
                .sorted_by(|a, b| options.compare(a, b))
                .collect();
            parts
                .into_iter()
                .zip(blocks)
                .map(|((before, _, after), block)| format!("{before}{block}{after}"))
                .collect()
        } else {
            let sorted = lines.iter().cloned().sorted_by(|a, b| options.compare(a, b));
            if options.unique {
                sorted.dedup_by(|a, b| options.key(a) == options.key(b)).collect()
            } else {
                sorted.collect()
            }
        };

        let eol = buffer.eol().to_string();
        let start = buffer.line_to_char(first);
        let end = buffer.line_end(last);
        buffer.replace(start, end, &sorted.join(&eol));
        self.set_cursor_line(first);
        let removed = lines.len() - sorted.len();
        if removed > 0 {
            CmdResult::Message(format!("{} removed", plural(removed, "duplicate line")))
        } else {
            CmdResult::Success
        }
    }

    /// `!cmd` with a range: pipe the lines through `cmd file`.
    pub(crate) fn cmd_filter(&mut self, range: &AddressRange, command: &str) -> CmdResult {
        let (first, last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let command = command.trim();
        if command.is_empty() {
            return parse_error("missing filter command").into();
        }
        let (start, end) = self.buffer().lines_span(first, last);
        let text = self.buffer().slice(start, end);

        let mut file = match NamedTempFile::new() {
            Ok(file) => file,
            Err(err) => return CmdFailure::Io(format!("temporary file: {err}")).into(),
        };
        if let Err(err) = file.write_all(text.as_bytes()).and_then(|()| file.flush()) {
            return CmdFailure::Io(format!("temporary file: {err}")).into();
        }
        let full = format!("{command} {}", file.path().display());
        let output = match self.ctx.runner.run(&full, &self.session.cwd) {
            Ok(output) => output,
            Err(err) => return CmdFailure::ExternalProcess(format!("{err:#}")).into(),
        };
        if let Some(failure) = output.failure_text() {
            return CmdFailure::ExternalProcess(failure).into();
        }

        let mut replacement = output.stdout;
        let ends_with_eol = text.ends_with('\n') || text.ends_with('\r');
        if ends_with_eol && !replacement.is_empty() && !replacement.ends_with('\n') {
            replacement.push_str(self.buffer().eol());
        }
        let buffer = self.buffer_mut();
        buffer.replace(start, end, &replacement);
        self.set_cursor_line(first);
        CmdResult::Message(format!("{} filtered", plural(last - first + 1, "line")))
    }

    /// `s/pattern/replacement/flags`; with no text, repeat the last one.
    pub(crate) fn cmd_substitute(&mut self, range: &AddressRange, text: &str) -> CmdResult {
        if text.trim().is_empty() {
            return self.cmd_repeat_substitute(range, "", false);
        }
        match Substitution::parse(text, self.ctx.last_substitution.as_ref()) {
            Ok(substitution) => self.run_substitution(range, substitution),
            Err(failure) => failure.into(),
        }
    }

    /// `&[flags]` and `&&`.
    pub(crate) fn cmd_repeat_substitute(
        &mut self,
        range: &AddressRange,
        flags: &str,
        keep_flags: bool,
    ) -> CmdResult {
        let Some(mut substitution) = self.ctx.last_substitution.clone() else {
            return parse_error("no previous substitution").into();
        };
        if !keep_flags {
            substitution.flags = match SubstituteFlags::parse(flags) {
                Ok(flags) => flags,
                Err(failure) => return failure.into(),
            };
        }
        self.run_substitution(range, substitution)
    }

    /// `~[flags]`: the last substitution applied to the last search pattern.
    pub(crate) fn cmd_repeat_with_search(&mut self, range: &AddressRange, flags: &str) -> CmdResult {
        let Some(mut substitution) = self.ctx.last_substitution.clone() else {
            return parse_error("no previous substitution").into();
        };
        let Some(pattern) = self.ctx.last_search.clone() else {
            return parse_error("no previous search pattern").into();
        };
        substitution.pattern = pattern;
        substitution.flags = match SubstituteFlags::parse(flags) {
            Ok(flags) => flags,
            Err(failure) => return failure.into(),
        };
        self.run_substitution(range, substitution)
    }

    fn run_substitution(&mut self, range: &AddressRange, substitution: Substitution) -> CmdResult {
        let (first, last) = match self.editable_range(range) {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let regex = match substitution.regex(self.ctx.settings.ignore_case) {
            Ok(regex) => regex,
            Err(failure) => return failure.into(),
        };
        let outcome = {
            let ctx = &*self.ctx;
            let session = &mut *self.session;
            let is_cancelled = || ctx.is_cancelled();
            let mut io = SubstituteIo {
                frontend: session.frontend.as_mut(),
                is_cancelled: &is_cancelled,
            };
            substitute_lines(session.buffer.as_mut(), &mut io, &regex, &substitution, first, last)
        };
        let message = format!(
            "Replaced: {} occurrences of: {}",
            outcome.count, substitution.pattern
        );
        if !self.session.tag_jump {
            self.ctx.last_search = Some(substitution.pattern.clone());
        }
        self.ctx.last_substitution = Some(substitution);
        CmdResult::Message(message)
    }

    /// `g/re/cmd` and `v/re/cmd`: run `cmd` on each (non-)matching line.
    ///
    /// Lines are marked first; a line deleted by an earlier command loses
    /// its mark and is skipped.
    pub(crate) fn cmd_global(&mut self, range: &AddressRange, text: &str, invert: bool) -> CmdResult {
        if self.in_global {
            return parse_error("global cannot be nested").into();
        }
        let (first, last) = match range.checked() {
            Ok(lines) => lines,
            Err(failure) => return failure.into(),
        };
        let Some(delimiter) = text.chars().next().filter(|c| !c.is_alphanumeric() && *c != '\\') else {
            return parse_error("global: missing pattern").into();
        };
        let body = &text[delimiter.len_utf8()..];
        let (pattern, command) = match find_delimiter(body, 0, delimiter) {
            Some(close) => (&body[..close], body[close + delimiter.len_utf8()..].trim()),
            None => (body, ""),
        };
        let pattern = if pattern.is_empty() {
            match self.ctx.last_search.clone() {
                Some(pattern) => pattern,
                None => return parse_error("no previous search pattern").into(),
            }
        } else {
            pattern.replace(&format!("\\{delimiter}"), &delimiter.to_string())
        };
        let command = if command.is_empty() { "p" } else { command };
        let regex = match search_regex(&pattern, self.ctx.settings.ignore_case) {
            Ok(regex) => regex,
            Err(failure) => return failure.into(),
        };

        let buffer = self.buffer_mut();
        let mut marked = Vec::new();
        for line in first..=last {
            if regex.is_match(&buffer.line_text(line)) != invert {
                let offset = buffer.line_to_char(line);
                buffer.set_mark(MarkId::Line(line), offset);
                marked.push(line);
            }
        }
        if !self.session.tag_jump {
            self.ctx.last_search = Some(pattern.clone());
        }
        if marked.is_empty() {
            return CmdFailure::AddressUnresolved(format!("pattern not found: {pattern}")).into();
        }
        debug!(%pattern, invert, lines = marked.len(), command, "global");

        self.in_global = true;
        self.buffer_mut().begin_undo_action();
        let mut result = CmdResult::Success;
        for &line in &marked {
            if self.ctx.is_cancelled() {
                result = CmdFailure::Cancelled.into();
                break;
            }
            let Some(offset) = self.buffer().mark(MarkId::Line(line)) else {
                continue;
            };
            let buffer = self.buffer_mut();
            buffer.clear_mark(MarkId::Line(line));
            buffer.set_cursor(offset);
            let outcome = self.run_line(command);
            match outcome {
                CmdResult::Failure(_) => {
                    result = outcome;
                    break;
                }
                CmdResult::Message(text) => self.message(&text),
                CmdResult::Success => {}
            }
        }
        for &line in &marked {
            self.buffer_mut().clear_mark(MarkId::Line(line));
        }
        self.buffer_mut().end_undo_action();
        self.in_global = false;
        result
    }
}
