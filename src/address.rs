//! Address resolution: one line reference, or a pair of them, to line numbers.
//!
//! Addresses are 1-based. Searches (`/re/`, `?re?`) run from a start line,
//! wrap once when `wrapscan` is set, and take an optional `+N`/`-N` offset.
//! Everything else goes to the [calculator](crate::calc).

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::buffer::Buffer;
use crate::calc;
use crate::cmd_result::{CmdFailure, parse_error};
use crate::config::Settings;

/// A line reference. `line == 0` means unresolved (or "before the first
/// line" for a destination).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    pub expr: Option<String>,
    pub line: usize,
}

impl Address {
    /// An address for a known line, clamped to the buffer.
    pub fn at(line: usize, buffer: &dyn Buffer) -> Address {
        Address {
            expr: None,
            line: clamp(i64::try_from(line).unwrap_or(i64::MAX), buffer, false),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.line > 0
    }
}

/// Two addresses delimiting the lines a range verb acts on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressRange {
    pub begin: Address,
    pub end: Address,
}

impl AddressRange {
    pub fn new(begin: Address, end: Address) -> AddressRange {
        AddressRange { begin, end }
    }

    /// A range covering `begin..=end` (1-based).
    pub fn lines(begin: usize, end: usize, buffer: &dyn Buffer) -> AddressRange {
        AddressRange::new(Address::at(begin, buffer), Address::at(end, buffer))
    }

    pub fn is_valid(&self) -> bool {
        self.begin.is_resolved() && self.end.is_resolved() && self.begin.line <= self.end.line
    }

    /// `Ok((first, last))` as 0-based line indexes, or `InvalidRange`.
    pub fn checked(&self) -> Result<(usize, usize), CmdFailure> {
        if self.is_valid() {
            Ok((self.begin.line - 1, self.end.line - 1))
        } else {
            Err(CmdFailure::InvalidRange)
        }
    }

    pub fn len(&self) -> usize {
        if self.is_valid() {
            self.end.line - self.begin.line + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clamp a 1-based line. Results below the first line become 1 (or 0 for
/// destinations); results past the end become the last line unless the
/// buffer cannot tell how many lines it has.
fn clamp(line: i64, buffer: &dyn Buffer, allow_zero: bool) -> usize {
    let floor = if allow_zero { 0 } else { 1 };
    let line = line.max(floor);
    match buffer.line_count() {
        Some(count) => (line as usize).min(count.max(1)),
        None => line as usize,
    }
}

/// Whether a `/` at `index` of `expr` starts a search rather than dividing.
pub(crate) fn starts_search(expr: &str, index: usize, at_part_start: bool) -> bool {
    match expr[index..].chars().next() {
        Some('?') => true,
        Some('/') => {
            at_part_start
                || !matches!(
                    expr[index + 1..].chars().next(),
                    Some(c) if c.is_ascii_digit() || matches!(c, '.' | '$' | '\'' | '(')
                )
        }
        _ => false,
    }
}

/// Byte index of the `delimiter` closing a pattern that starts at `start`.
/// Backslash escapes are skipped.
pub(crate) fn find_delimiter(text: &str, start: usize, delimiter: char) -> Option<usize> {
    let mut chars = text[start..].char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == delimiter {
            return Some(start + i);
        }
    }
    None
}

/// Resolves address expressions against one buffer.
pub struct Resolver<'a> {
    pub buffer: &'a dyn Buffer,
    pub settings: &'a Settings,
    /// Read by empty patterns, written by successful searches.
    pub last_search: &'a mut Option<String>,
    /// False inside a tag jump, where searches leave the search history alone.
    pub remember_search: bool,
}

impl Resolver<'_> {
    /// Resolve one address to a clamped 1-based line.
    pub fn resolve(&mut self, expr: &str) -> Result<usize, CmdFailure> {
        self.resolve_clamped(expr, false)
    }

    /// Resolve a destination for move, copy or put; `0` is allowed.
    pub fn resolve_destination(&mut self, expr: &str) -> Result<usize, CmdFailure> {
        self.resolve_clamped(expr, true)
    }

    fn resolve_clamped(&mut self, expr: &str, allow_zero: bool) -> Result<usize, CmdFailure> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(self.buffer.cursor_line() + 1);
        }
        let search_at = expr
            .char_indices()
            .find(|&(i, c)| matches!(c, '/' | '?') && starts_search(expr, i, i == 0))
            .map(|(i, _)| i);
        let line = match search_at {
            Some(i) => self.search(&expr[..i], &expr[i..])?,
            None => calc::evaluate(expr, self.buffer)?,
        };
        Ok(clamp(line, self.buffer, allow_zero))
    }

    /// `prefix` picks the start line; `rest` is `/pattern/offset` or `?pattern?offset`.
    fn search(&mut self, prefix: &str, rest: &str) -> Result<i64, CmdFailure> {
        let start = if prefix.trim().is_empty() {
            self.buffer.cursor_line()
        } else {
            (clamp(calc::evaluate(prefix, self.buffer)?, self.buffer, false)) - 1
        };
        let delimiter = rest.chars().next().unwrap_or('/');
        let (pattern, after) = match find_delimiter(rest, 1, delimiter) {
            Some(close) => (&rest[1..close], &rest[close + 1..]),
            None => (&rest[1..], ""),
        };
        let pattern = pattern.replace(&format!("\\{delimiter}"), &delimiter.to_string());
        let offset = parse_offset(after)?;

        let pattern = if pattern.is_empty() {
            self.last_search
                .clone()
                .ok_or_else(|| parse_error("no previous search pattern"))?
        } else {
            pattern
        };
        let regex = search_regex(&pattern, self.settings.ignore_case)?;
        let found = if delimiter == '?' {
            self.search_backward(&regex, start)
        } else {
            self.search_forward(&regex, start)
        };
        let Some(line) = found else {
            debug!(%pattern, "search failed");
            return Err(CmdFailure::AddressUnresolved(format!("pattern not found: {pattern}")));
        };
        if self.remember_search {
            *self.last_search = Some(pattern);
        }
        (line as i64 + 1)
            .checked_add(offset)
            .ok_or_else(|| parse_error("number too large"))
    }

    fn search_forward(&self, regex: &Regex, start: usize) -> Option<usize> {
        let buffer = self.buffer;
        let from = buffer.line_to_char(start + 1);
        let hit = buffer.find_in_range(regex, from, buffer.len_chars()).or_else(|| {
            if self.settings.wrap_scan {
                buffer.find_in_range(regex, 0, from)
            } else {
                None
            }
        });
        hit.map(|(offset, _)| buffer.char_to_line(offset))
    }

    fn search_backward(&self, regex: &Regex, start: usize) -> Option<usize> {
        let buffer = self.buffer;
        let to = buffer.line_to_char(start);
        let hit = buffer.rfind_in_range(regex, 0, to).or_else(|| {
            if self.settings.wrap_scan {
                buffer.rfind_in_range(regex, to, buffer.len_chars())
            } else {
                None
            }
        });
        hit.map(|(offset, _)| buffer.char_to_line(offset))
    }

    /// Resolve a range such as `%`, `*`, `.,$`, `3;+2` or `/a/,/b/`.
    ///
    /// A part followed by `;` moves the cursor to its line before the next
    /// part is resolved. With more than two parts the last two count.
    pub fn resolve_range(
        buffer: &mut dyn Buffer,
        settings: &Settings,
        last_search: &mut Option<String>,
        remember_search: bool,
        text: &str,
    ) -> Result<AddressRange, CmdFailure> {
        let text = text.trim();
        let whole = |b: &dyn Buffer| {
            let last = b
                .line_count()
                .unwrap_or_else(|| b.char_to_line(b.len_chars()) + 1);
            AddressRange::lines(1, last, b)
        };
        match text {
            "" => {
                let line = buffer.cursor_line() + 1;
                return Ok(AddressRange::lines(line, line, buffer));
            }
            "%" => return Ok(whole(buffer)),
            "*" => {
                let first = buffer.first_visible_line() + 1;
                let last = first + buffer.lines_on_screen().max(1) - 1;
                return Ok(AddressRange::lines(first, last, buffer));
            }
            _ => {}
        }

        let mut addresses: Vec<Address> = Vec::new();
        for (part, separator) in split_range(text) {
            let line = {
                let mut resolver = Resolver {
                    buffer: &*buffer,
                    settings,
                    last_search: &mut *last_search,
                    remember_search,
                };
                resolver.resolve(part)?
            };
            if separator == Some(';') {
                buffer.set_cursor(buffer.line_to_char(line - 1));
            }
            addresses.push(Address {
                expr: Some(part.trim().to_string()).filter(|e| !e.is_empty()),
                line,
            });
        }
        let end = addresses.pop().unwrap_or_default();
        let begin = addresses.pop().unwrap_or_else(|| end.clone());
        Ok(AddressRange::new(begin, end))
    }
}

/// Split range text at top-level `,` and `;`, keeping the separator that
/// follows each part.
fn split_range(text: &str) -> Vec<(&str, Option<char>)> {
    let mut parts = Vec::new();
    let mut part_start = 0;
    let mut depth = 0usize;
    let mut i = 0;
    while i < text.len() {
        let Some(c) = text[i..].chars().next() else { break };
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '\'' => {
                i += 1;
                if let Some(name) = text[i..].chars().next() {
                    i += name.len_utf8();
                }
                continue;
            }
            '/' | '?' if starts_search(text, i, text[part_start..i].trim().is_empty()) => {
                i = find_delimiter(text, i + 1, c).map_or(text.len(), |close| close + 1);
                continue;
            }
            ',' | ';' if depth == 0 => {
                parts.push((&text[part_start..i], Some(c)));
                part_start = i + 1;
            }
            _ => {}
        }
        i += c.len_utf8();
    }
    parts.push((&text[part_start..], None));
    parts
}

/// Offsets after a search: `+`, `-N`, `+2+1`. A bare number counts as `+N`.
fn parse_offset(text: &str) -> Result<i64, CmdFailure> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    let mut total = 0i64;
    let mut chars = text.chars().filter(|c| !c.is_whitespace()).peekable();
    while let Some(&c) = chars.peek() {
        let sign = match c {
            '+' => {
                chars.next();
                1
            }
            '-' => {
                chars.next();
                -1
            }
            _ if c.is_ascii_digit() => 1,
            other => return Err(parse_error(format!("bad search offset: {other}"))),
        };
        let mut digits = String::new();
        while let Some(d) = chars.next_if(char::is_ascii_digit) {
            digits.push(d);
        }
        let amount = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<i64>()
                .map_err(|_| parse_error(format!("number too large: {digits}")))?
        };
        total = total
            .checked_add(sign * amount)
            .ok_or_else(|| parse_error("number too large"))?;
    }
    Ok(total)
}

/// Compile a search pattern; `^` and `$` match at line boundaries.
pub(crate) fn search_regex(pattern: &str, ignore_case: bool) -> Result<Regex, CmdFailure> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .multi_line(true)
        .crlf(true)
        .build()
        .map_err(|err| parse_error(format!("bad pattern {pattern}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::marks::MarkId;

    fn frame_at(lines: &[&str], line: usize) -> Frame {
        let mut frame = Frame::from_lines(lines);
        frame.set_cursor(frame.line_to_char(line - 1));
        frame
    }

    fn resolve(frame: &Frame, expr: &str) -> Result<usize, CmdFailure> {
        let settings = Settings::default();
        let mut last = None;
        Resolver {
            buffer: frame,
            settings: &settings,
            last_search: &mut last,
            remember_search: true,
        }
        .resolve(expr)
    }

    fn range(frame: &mut Frame, text: &str) -> Result<(usize, usize), CmdFailure> {
        let settings = Settings::default();
        let mut last = None;
        let range = Resolver::resolve_range(frame, &settings, &mut last, true, text)?;
        range.checked().map(|(b, e)| (b + 1, e + 1))
    }

    const ABC: [&str; 3] = ["alpha", "beta", "alpha"];

    #[test]
    fn forward_and_backward_search() {
        assert_eq!(resolve(&frame_at(&ABC, 1), "/beta/"), Ok(2));
        assert_eq!(resolve(&frame_at(&ABC, 2), "?alpha?"), Ok(1));
        assert_eq!(resolve(&frame_at(&ABC, 1), "/alpha"), Ok(3));
    }

    #[test]
    fn search_wraps_once() {
        assert_eq!(resolve(&frame_at(&ABC, 3), "/beta/"), Ok(2));
        assert_eq!(resolve(&frame_at(&ABC, 1), "?beta?"), Ok(2));
        assert_eq!(resolve(&frame_at(&ABC, 2), "/beta/"), Ok(2));
    }

    #[test]
    fn search_without_wrap_fails_at_boundary() {
        let frame = frame_at(&ABC, 3);
        let settings = Settings {
            wrap_scan: false,
            ..Settings::default()
        };
        let mut last = None;
        let result = Resolver {
            buffer: &frame,
            settings: &settings,
            last_search: &mut last,
            remember_search: true,
        }
        .resolve("/beta/");
        assert!(matches!(result, Err(CmdFailure::AddressUnresolved(_))));
        assert_eq!(last, None);
    }

    #[test]
    fn search_offsets_and_prefix() {
        let frame = frame_at(&["a", "b", "c", "b", "e"], 1);
        assert_eq!(resolve(&frame, "/b/+1"), Ok(3));
        assert_eq!(resolve(&frame, "/b/-"), Ok(1));
        assert_eq!(resolve(&frame, "3/b/"), Ok(4));
        assert_eq!(resolve(&frame, "/b/+10"), Ok(5));
    }

    #[test]
    fn empty_pattern_reuses_last_search() {
        let frame = frame_at(&ABC, 1);
        let settings = Settings::default();
        let mut last = None;
        let mut resolver = Resolver {
            buffer: &frame,
            settings: &settings,
            last_search: &mut last,
            remember_search: true,
        };
        assert!(matches!(resolver.resolve("//"), Err(CmdFailure::Parse(_))));
        assert_eq!(resolver.resolve("/alp/"), Ok(3));
        assert_eq!(resolver.resolve("//"), Ok(3));
        assert_eq!(last.as_deref(), Some("alp"));
    }

    #[test]
    fn tag_jump_leaves_last_search() {
        let frame = frame_at(&ABC, 1);
        let settings = Settings::default();
        let mut last = Some("old".to_string());
        let mut resolver = Resolver {
            buffer: &frame,
            settings: &settings,
            last_search: &mut last,
            remember_search: false,
        };
        assert_eq!(resolver.resolve("/beta/"), Ok(2));
        assert_eq!(last.as_deref(), Some("old"));
    }

    #[test]
    fn ignore_case_setting() {
        let frame = frame_at(&["x", "BETA"], 1);
        assert!(resolve(&frame, "/beta/").is_err());
        let settings = Settings {
            ignore_case: true,
            ..Settings::default()
        };
        let mut last = None;
        let found = Resolver {
            buffer: &frame,
            settings: &settings,
            last_search: &mut last,
            remember_search: true,
        }
        .resolve("/beta/");
        assert_eq!(found, Ok(2));
    }

    #[test]
    fn calculator_results_are_clamped() {
        let frame = frame_at(&["a", "b", "c"], 2);
        assert_eq!(resolve(&frame, ".-5"), Ok(1));
        assert_eq!(resolve(&frame, "$+4"), Ok(3));
        assert_eq!(resolve(&frame, "$/2"), Ok(1));
        assert_eq!(resolve(&frame, ""), Ok(2));
    }

    #[test]
    fn destinations_allow_zero() {
        let frame = frame_at(&["a", "b"], 2);
        let settings = Settings::default();
        let mut last = None;
        let mut resolver = Resolver {
            buffer: &frame,
            settings: &settings,
            last_search: &mut last,
            remember_search: true,
        };
        assert_eq!(resolver.resolve_destination("0"), Ok(0));
        assert_eq!(resolver.resolve_destination("$"), Ok(2));
        assert_eq!(resolver.resolve("0"), Ok(1));
    }

    #[test]
    fn ranges() {
        let lines = ["a", "b", "c", "d", "e"];
        let mut frame = frame_at(&lines, 2);
        assert_eq!(range(&mut frame, ""), Ok((2, 2)));
        assert_eq!(range(&mut frame, "%"), Ok((1, 5)));
        assert_eq!(range(&mut frame, ".,.+2"), Ok((2, 4)));
        assert_eq!(range(&mut frame, "/c/,/e/"), Ok((3, 5)));
        assert_eq!(range(&mut frame, "4,2"), Err(CmdFailure::InvalidRange));
        assert_eq!(range(&mut frame, "1,2,3"), Ok((2, 3)));
        assert_eq!(range(&mut frame, ",3"), Ok((2, 3)));
    }

    #[test]
    fn semicolon_moves_cursor_first() {
        let lines = ["a", "b", "c", "d", "e"];
        let mut frame = frame_at(&lines, 1);
        assert_eq!(range(&mut frame, "3;+1"), Ok((3, 4)));
        assert_eq!(frame.cursor_line(), 2);
        let mut frame = frame_at(&lines, 1);
        assert_eq!(range(&mut frame, "3,+1"), Err(CmdFailure::InvalidRange));
    }

    #[test]
    fn visible_range() {
        let lines = ["a", "b", "c", "d", "e", "f"];
        let mut frame = frame_at(&lines, 1);
        frame.set_view(1, 3);
        assert_eq!(range(&mut frame, "*"), Ok((2, 4)));
        frame.set_view(4, 10);
        assert_eq!(range(&mut frame, "*"), Ok((5, 6)));
    }

    #[test]
    fn mark_ranges() {
        let mut frame = frame_at(&["a", "b", "c", "d"], 1);
        frame.set_mark(MarkId::Named('<'), frame.line_to_char(1));
        frame.set_mark(MarkId::Named('>'), frame.line_to_char(2) + 1);
        assert_eq!(range(&mut frame, "'<,'>"), Ok((2, 3)));
        assert!(matches!(
            range(&mut frame, "'a,'b"),
            Err(CmdFailure::AddressUnresolved(_))
        ));
    }

    #[test]
    fn split_respects_patterns_and_marks() {
        assert_eq!(
            split_range("/a,b/,'x;$"),
            vec![("/a,b/", Some(',')), ("'x", Some(';')), ("$", None)]
        );
        assert_eq!(split_range("(1,2)"), vec![("(1,2)", None)]);
    }

    #[test]
    fn offsets() {
        assert_eq!(parse_offset(""), Ok(0));
        assert_eq!(parse_offset("+"), Ok(1));
        assert_eq!(parse_offset("-2+1"), Ok(-1));
        assert_eq!(parse_offset("3"), Ok(3));
        assert!(parse_offset("x").is_err());
        assert!(matches!(
            parse_offset("+9223372036854775807+1"),
            Err(CmdFailure::Parse(_))
        ));
    }
}
