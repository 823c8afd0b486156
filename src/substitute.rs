//! `:s/pattern/replacement/flags` over a line range.
//!
//! The range is tracked with [`MarkId::RangeBegin`] and [`MarkId::RangeEnd`]
//! so that replacements adding or removing lines keep the window correct.
//! The end of the window is re-read from its mark after every line.

use regex::{Captures, Regex, RegexBuilder};
use tracing::debug;

use crate::buffer::{Buffer, Selection, SelectionKind, byte_to_char};
use crate::cmd_result::{CmdFailure, parse_error};
use crate::frontend::{Confirm, Frontend};
use crate::marks::MarkId;

/// Stands in for an escaped delimiter while the command text is split.
const SENTINEL: char = '\x01';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubstituteFlags {
    /// `g`: every match on a line, not just the first.
    pub global: bool,
    /// `c`: ask before each replacement.
    pub confirm: bool,
    /// `i`: ignore case.
    pub ignore_case: bool,
}

impl SubstituteFlags {
    pub fn parse(text: &str) -> Result<SubstituteFlags, CmdFailure> {
        let mut flags = SubstituteFlags::default();
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            match c {
                'g' => flags.global = true,
                'c' => flags.confirm = true,
                'i' => flags.ignore_case = true,
                other => return Err(parse_error(format!("unsupported substitute flag: {other}"))),
            }
        }
        Ok(flags)
    }
}

/// A parsed substitute command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
    pub flags: SubstituteFlags,
}

impl Substitution {
    /// Parse `/pattern/replacement/flags`. A replacement of `~` reuses the
    /// replacement of `previous`.
    pub fn parse(text: &str, previous: Option<&Substitution>) -> Result<Substitution, CmdFailure> {
        let mut chars = text.chars();
        let delimiter = match chars.next() {
            Some(c) if !c.is_alphanumeric() && !c.is_whitespace() && c != '\\' => c,
            _ => return Err(parse_error("substitute: missing /")),
        };
        let escaped = format!("\\{delimiter}");
        let body = chars.as_str().replace(&escaped, &SENTINEL.to_string());
        let mut fields = body.splitn(3, delimiter);
        let restore = |field: &str| field.replace(SENTINEL, &delimiter.to_string());

        let pattern = restore(fields.next().unwrap_or_default());
        let replacement = fields
            .next()
            .map(restore)
            .ok_or_else(|| parse_error(format!("substitute: missing {delimiter}")))?;
        let flags = SubstituteFlags::parse(fields.next().unwrap_or_default())?;

        if pattern.is_empty() {
            return Err(parse_error("pattern is empty"));
        }
        let replacement = if replacement == "~" {
            previous
                .map(|p| p.replacement.clone())
                .ok_or_else(|| parse_error("no previous substitution"))?
        } else {
            replacement
        };
        Ok(Substitution {
            pattern,
            replacement,
            flags,
        })
    }

    pub fn regex(&self, ignore_case: bool) -> Result<Regex, CmdFailure> {
        RegexBuilder::new(&self.pattern)
            .case_insensitive(ignore_case || self.flags.ignore_case)
            .build()
            .map_err(|err| parse_error(format!("bad pattern {}: {err}", self.pattern)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseMode {
    AsIs,
    Upper,
    Lower,
}

fn push_cased(out: &mut String, text: &str, mode: CaseMode) {
    match mode {
        CaseMode::AsIs => out.push_str(text),
        CaseMode::Upper => out.extend(text.chars().flat_map(char::to_uppercase)),
        CaseMode::Lower => out.extend(text.chars().flat_map(char::to_lowercase)),
    }
}

/// Build the replacement for one match.
///
/// `&` and `\0` insert the whole match, `\1`..`\9` a group, `\U` and `\L`
/// switch everything after them to upper or lower case, `\E` switches back
/// and `\\` is a backslash. Any other escaped char stands for itself.
pub fn expand_replacement(replacement: &str, caps: &Captures) -> String {
    let mut out = String::new();
    let mut mode = CaseMode::AsIs;
    let group = |n: usize| caps.get(n).map_or("", |m| m.as_str());
    let mut chars = replacement.chars();
    while let Some(c) = chars.next() {
        match c {
            '&' => push_cased(&mut out, group(0), mode),
            '\\' => match chars.next() {
                Some(d @ '0'..='9') => {
                    let n = d as usize - '0' as usize;
                    push_cased(&mut out, group(n), mode);
                }
                Some('U') => mode = CaseMode::Upper,
                Some('L') => mode = CaseMode::Lower,
                Some('E' | 'e') => mode = CaseMode::AsIs,
                Some(other) => push_cased(&mut out, &other.to_string(), mode),
                None => out.push('\\'),
            },
            _ => push_cased(&mut out, &c.to_string(), mode),
        }
    }
    out
}

/// How a substitute run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubstituteOutcome {
    /// Replacements applied.
    pub count: usize,
    /// Stopped early by a cancelled confirmation or the cancel flag.
    pub cancelled: bool,
}

/// Where a substitute gets its answers and cancellation from.
pub struct SubstituteIo<'a> {
    pub frontend: &'a mut dyn Frontend,
    pub is_cancelled: &'a dyn Fn() -> bool,
}

/// Replace matches of `regex` in lines `first..=last` (0-based).
pub fn substitute_lines(
    buffer: &mut dyn Buffer,
    io: &mut SubstituteIo,
    regex: &Regex,
    substitution: &Substitution,
    first: usize,
    last: usize,
) -> SubstituteOutcome {
    let mut outcome = SubstituteOutcome::default();
    buffer.set_mark(MarkId::RangeBegin, buffer.line_to_char(first));
    buffer.set_mark(MarkId::RangeEnd, buffer.line_end(last));
    buffer.begin_undo_action();

    let mut line = first;
    let mut last_changed = None;
    'lines: loop {
        let Some(end) = buffer.mark(MarkId::RangeEnd) else {
            break;
        };
        if line > buffer.char_to_line(end) {
            break;
        }
        let text = buffer.line_text(line);
        let line_start = buffer.line_to_char(line);
        let mut rebuilt = String::with_capacity(text.len());
        let mut copied_to = 0;
        let mut applied = 0;

        for caps in regex.captures_iter(&text) {
            if (io.is_cancelled)() {
                outcome.cancelled = true;
            }
            let Some(m) = caps.get(0) else { continue };
            if !outcome.cancelled {
                let replacement = expand_replacement(&substitution.replacement, &caps);
                let answer = if substitution.flags.confirm {
                    let start = line_start + byte_to_char(&text, m.start());
                    let end = line_start + byte_to_char(&text, m.end());
                    buffer.set_selection(Selection::new(start, end, SelectionKind::Stream));
                    io.frontend.confirm(&format!("Replace with {replacement}?"))
                } else {
                    Confirm::Yes
                };
                match answer {
                    Confirm::Yes => {
                        rebuilt.push_str(&text[copied_to..m.start()]);
                        rebuilt.push_str(&replacement);
                        copied_to = m.end();
                        applied += 1;
                    }
                    Confirm::No => {}
                    Confirm::Cancel => outcome.cancelled = true,
                }
            }
            if outcome.cancelled || !substitution.flags.global {
                break;
            }
        }

        let mut next = line + 1;
        if applied > 0 {
            rebuilt.push_str(&text[copied_to..]);
            let line_end = line_start + text.chars().count();
            buffer.replace(line_start, line_end, &rebuilt);
            outcome.count += applied;
            next += rebuilt.matches('\n').count();
            last_changed = Some(line);
        }
        if outcome.cancelled {
            break 'lines;
        }
        line = next;
    }

    buffer.end_undo_action();
    buffer.clear_mark(MarkId::RangeBegin);
    buffer.clear_mark(MarkId::RangeEnd);
    if let Some(line) = last_changed {
        buffer.set_cursor(buffer.line_to_char(line));
    }
    buffer.set_selection(Selection::caret(buffer.cursor()));
    debug!(pattern = %substitution.pattern, count = outcome.count, cancelled = outcome.cancelled, "substitute finished");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::frontend::ScriptedFrontend;

    fn parse(text: &str) -> Result<Substitution, CmdFailure> {
        Substitution::parse(text, None)
    }

    fn expand(replacement: &str, pattern: &str, hay: &str) -> String {
        let regex = Regex::new(pattern).unwrap();
        let caps = regex.captures(hay).unwrap();
        expand_replacement(replacement, &caps)
    }

    fn run(frame: &mut Frame, text: &str, frontend: &mut dyn Frontend) -> SubstituteOutcome {
        let substitution = parse(text).unwrap();
        let regex = substitution.regex(false).unwrap();
        let never = || false;
        let mut io = SubstituteIo {
            frontend,
            is_cancelled: &never,
        };
        let last = frame.line_count().unwrap() - 1;
        substitute_lines(frame, &mut io, &regex, &substitution, 0, last)
    }

    #[test]
    fn parse_fields_and_flags() {
        let sub = parse("/a\\/b/c/gi").unwrap();
        assert_eq!(sub.pattern, "a/b");
        assert_eq!(sub.replacement, "c");
        assert!(sub.flags.global && sub.flags.ignore_case && !sub.flags.confirm);

        let sub = parse("#x#y#").unwrap();
        assert_eq!((sub.pattern.as_str(), sub.replacement.as_str()), ("x", "y"));

        let sub = parse("/x/").unwrap();
        assert_eq!(sub.replacement, "");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse("//x/"), Err(parse_error("pattern is empty")));
        assert!(matches!(parse("/x"), Err(CmdFailure::Parse(_))));
        assert!(matches!(parse("x/y/"), Err(CmdFailure::Parse(_))));
        assert_eq!(
            parse("/x/y/gq"),
            Err(parse_error("unsupported substitute flag: q"))
        );
    }

    #[test]
    fn tilde_reuses_previous_replacement() {
        let previous = parse("/a/zz/").unwrap();
        let sub = Substitution::parse("/b/~/", Some(&previous)).unwrap();
        assert_eq!(sub.replacement, "zz");
        assert!(Substitution::parse("/b/~/", None).is_err());
    }

    #[test]
    fn backreferences() {
        assert_eq!(expand("\\U&\\L rest", "Foo", "Foo"), "FOO rest");
        assert_eq!(expand("[\\0]", "o+", "foo"), "[oo]");
        assert_eq!(expand("\\2-\\1", "(a)(b)", "ab"), "b-a");
        assert_eq!(expand("a\\\\b", "x", "x"), "a\\b");
        assert_eq!(expand("\\LMiXeD\\E Case", "x", "x"), "mixed Case");
        assert_eq!(expand("\\q&", "x", "x"), "qx");
    }

    #[test]
    fn without_g_replaces_first_match_per_line() {
        let mut frame = Frame::from_lines(&["aaa", "bab"]);
        let outcome = run(&mut frame, "/a/x/", &mut ScriptedFrontend::new());
        assert_eq!(outcome.count, 2);
        assert_eq!(frame.lines(), vec!["xaa", "bxb"]);
    }

    #[test]
    fn with_g_replaces_every_match() {
        let mut frame = Frame::from_lines(&["aaa", "bab"]);
        let outcome = run(&mut frame, "/a/x/g", &mut ScriptedFrontend::new());
        assert_eq!(outcome.count, 4);
        assert_eq!(frame.lines(), vec!["xxx", "bxb"]);
        assert_eq!(frame.mark(MarkId::RangeBegin), None);
        assert_eq!(frame.mark(MarkId::RangeEnd), None);
    }

    #[test]
    fn replacement_does_not_rematch() {
        let mut frame = Frame::from_lines(&["ab"]);
        let outcome = run(&mut frame, "/a/aa/g", &mut ScriptedFrontend::new());
        assert_eq!(outcome.count, 1);
        assert_eq!(frame.lines(), vec!["aab"]);
    }

    #[test]
    fn empty_matches_advance() {
        let mut frame = Frame::from_lines(&["ab"]);
        let outcome = run(&mut frame, "/x*/-/g", &mut ScriptedFrontend::new());
        assert_eq!(outcome.count, 3);
        assert_eq!(frame.lines(), vec!["-a-b-"]);
    }

    #[test]
    fn confirm_yes_no_cancel() {
        let mut frame = Frame::from_lines(&["a a a", "a"]);
        let mut frontend = ScriptedFrontend::new();
        frontend
            .push_confirm(Confirm::Yes)
            .push_confirm(Confirm::No)
            .push_confirm(Confirm::Cancel);
        let outcome = run(&mut frame, "/a/b/gc", &mut frontend);
        assert_eq!(outcome, SubstituteOutcome { count: 1, cancelled: true });
        assert_eq!(frame.lines(), vec!["b a a", "a"]);
        assert_eq!(frontend.questions().len(), 3);
        assert!(frame.selection().is_empty());
    }

    #[test]
    fn multi_line_replacement_keeps_window() {
        let mut frame = Frame::from_lines(&["a", "a", "c"]);
        let substitution = parse("/a/x\ny/").unwrap();
        let regex = substitution.regex(false).unwrap();
        let never = || false;
        let mut frontend = ScriptedFrontend::new();
        let mut io = SubstituteIo {
            frontend: &mut frontend,
            is_cancelled: &never,
        };
        let outcome = substitute_lines(&mut frame, &mut io, &regex, &substitution, 0, 1);
        assert_eq!(outcome.count, 2);
        assert_eq!(frame.lines(), vec!["x", "y", "x", "y", "c"]);
    }

    #[test]
    fn cancel_flag_stops_between_matches() {
        let mut frame = Frame::from_lines(&["a", "a"]);
        let substitution = parse("/a/b/").unwrap();
        let regex = substitution.regex(false).unwrap();
        let cancelled = || true;
        let mut frontend = ScriptedFrontend::new();
        let mut io = SubstituteIo {
            frontend: &mut frontend,
            is_cancelled: &cancelled,
        };
        let outcome = substitute_lines(&mut frame, &mut io, &regex, &substitution, 0, 1);
        assert_eq!(outcome, SubstituteOutcome { count: 0, cancelled: true });
        assert_eq!(frame.lines(), vec!["a", "a"]);
    }

    #[test]
    fn case_insensitive_flag() {
        let mut frame = Frame::from_lines(&["Alpha"]);
        let outcome = run(&mut frame, "/alpha/beta/i", &mut ScriptedFrontend::new());
        assert_eq!(outcome.count, 1);
        assert_eq!(frame.lines(), vec!["beta"]);
    }
}
