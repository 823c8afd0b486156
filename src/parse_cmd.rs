//! Split an ex command line into range text, verb and argument text.
//!
//! Word verbs may be abbreviated down to a minimum length (`s`, `de`, `co`),
//! an exact name always wins. Symbol verbs (`&`, `&&`, `~`, `<`, `>`, `!`,
//! `=`, `#`, `@`) are matched directly.

use phf::{Map, phf_map};

use crate::address::{find_delimiter, starts_search};
use crate::cmd_result::{CmdFailure, parse_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// A range with no verb: move the cursor to its last line.
    Goto,
    Append,
    Insert,
    Change,
    Delete,
    Yank,
    Put,
    Copy,
    Move,
    Join,
    Print,
    Number,
    LineNumber,
    Mark,
    Shift { forward: bool, count: usize },
    Sort,
    /// `!cmd`: filter the range, or just run `cmd` without one.
    Bang,
    Substitute,
    /// `&` (drop flags) or `&&` (keep flags).
    RepeatSubstitute { keep_flags: bool },
    /// `~`: repeat the last substitute with the last search pattern.
    RepeatWithSearch,
    Global { invert: bool },
    Cd,
    Pwd,
    Source,
    Syntax,
    Registers,
    Marks,
    Set,
    Abbreviate,
    Unabbreviate,
    Map,
    Unmap,
    Play,
    Undo,
    NoHighlight,
    Record,
    Stop,
}

impl Verb {
    /// Whether the verb acts on lines and so accepts a range.
    pub fn takes_range(self) -> bool {
        !matches!(
            self,
            Verb::Cd
                | Verb::Pwd
                | Verb::Source
                | Verb::Syntax
                | Verb::Registers
                | Verb::Marks
                | Verb::Set
                | Verb::Abbreviate
                | Verb::Unabbreviate
                | Verb::Map
                | Verb::Unmap
                | Verb::Undo
                | Verb::NoHighlight
                | Verb::Record
                | Verb::Stop
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct VerbInfo {
    verb: Verb,
    /// Shortest accepted abbreviation.
    min_len: usize,
}

const fn info(verb: Verb, min_len: usize) -> VerbInfo {
    VerbInfo { verb, min_len }
}

const VERBS: Map<&'static str, VerbInfo> = phf_map! {
    "append" => info(Verb::Append, 1),
    "insert" => info(Verb::Insert, 1),
    "change" => info(Verb::Change, 1),
    "delete" => info(Verb::Delete, 1),
    "yank" => info(Verb::Yank, 1),
    "put" => info(Verb::Put, 2),
    "copy" => info(Verb::Copy, 2),
    "t" => info(Verb::Copy, 1),
    "move" => info(Verb::Move, 1),
    "join" => info(Verb::Join, 1),
    "print" => info(Verb::Print, 1),
    "number" => info(Verb::Number, 2),
    "k" => info(Verb::Mark, 1),
    "mark" => info(Verb::Mark, 2),
    "sort" => info(Verb::Sort, 3),
    "substitute" => info(Verb::Substitute, 1),
    "global" => info(Verb::Global { invert: false }, 1),
    "vglobal" => info(Verb::Global { invert: true }, 1),
    "cd" => info(Verb::Cd, 2),
    "chdir" => info(Verb::Cd, 3),
    "pwd" => info(Verb::Pwd, 2),
    "source" => info(Verb::Source, 2),
    "syntax" => info(Verb::Syntax, 2),
    "registers" => info(Verb::Registers, 3),
    "display" => info(Verb::Registers, 2),
    "marks" => info(Verb::Marks, 5),
    "set" => info(Verb::Set, 2),
    "abbreviate" => info(Verb::Abbreviate, 2),
    "unabbreviate" => info(Verb::Unabbreviate, 3),
    "map" => info(Verb::Map, 3),
    "unmap" => info(Verb::Unmap, 3),
    "undo" => info(Verb::Undo, 1),
    "nohlsearch" => info(Verb::NoHighlight, 3),
    "record" => info(Verb::Record, 3),
    "stop" => info(Verb::Stop, 4),
};

/// A command line split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    /// Range text before the verb, trimmed; empty if none was given.
    pub range: &'a str,
    pub verb: Verb,
    /// Argument text after the verb, leading blanks removed.
    pub text: &'a str,
    /// A `!` directly after a word verb.
    pub bang: bool,
}

/// Parse a command line (a leading `:` is allowed). `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<ParsedCommand<'_>>, CmdFailure> {
    let line = line.trim_start().trim_start_matches(':').trim_start();
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    let range_end = scan_range(line);
    let range = line[..range_end].trim();
    let rest = &line[range_end..];
    let unknown = || parse_error(format!("unknown command: {}", line.trim()));

    let Some(first) = rest.chars().next() else {
        return Ok(Some(ParsedCommand {
            range,
            verb: Verb::Goto,
            text: "",
            bang: false,
        }));
    };

    let (verb, consumed, bang) = if first.is_ascii_alphabetic() {
        let word_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let word = &rest[..word_len];
        let (verb, used) = match lookup(word) {
            Some(verb) => (verb, word_len),
            // `ka`: mark with the name run on.
            None if word.starts_with('k') && word.len() == 2 => (Verb::Mark, 1),
            None => return Err(unknown()),
        };
        let bang = rest[used..].starts_with('!');
        (verb, used + usize::from(bang), bang)
    } else {
        match first {
            '&' if rest.starts_with("&&") => (Verb::RepeatSubstitute { keep_flags: true }, 2, false),
            '&' => (Verb::RepeatSubstitute { keep_flags: false }, 1, false),
            '~' => (Verb::RepeatWithSearch, 1, false),
            '>' | '<' => {
                let count = rest.chars().take_while(|&c| c == first).count();
                (Verb::Shift { forward: first == '>', count }, count, false)
            }
            '!' => (Verb::Bang, 1, false),
            '=' => (Verb::LineNumber, 1, false),
            '#' => (Verb::Number, 1, false),
            '@' => (Verb::Play, 1, false),
            _ => return Err(unknown()),
        }
    };

    let verb = match verb {
        Verb::Global { .. } if bang => Verb::Global { invert: true },
        other => other,
    };
    Ok(Some(ParsedCommand {
        range,
        verb,
        text: rest[consumed..].trim_start(),
        bang,
    }))
}

/// Exact name, else the unique abbreviation.
fn lookup(word: &str) -> Option<Verb> {
    if let Some(info) = VERBS.get(word)
        && word.len() >= info.min_len
    {
        return Some(info.verb);
    }
    VERBS
        .entries()
        .filter(|(name, info)| word.len() >= info.min_len && name.starts_with(word))
        .min_by_key(|(name, info)| (info.min_len, **name))
        .map(|(_, info)| info.verb)
}

/// Byte length of the leading range text.
fn scan_range(line: &str) -> usize {
    let mut i = 0;
    let mut part_start = 0;
    while i < line.len() {
        let Some(c) = line[i..].chars().next() else { break };
        match c {
            '0'..='9' | '.' | '$' | '%' | '*' | '+' | '-' | '(' | ')' | ' ' | '\t' => {}
            ',' | ';' => part_start = i + 1,
            '\'' => {
                i += 1;
                match line[i..].chars().next() {
                    Some(name) => i += name.len_utf8(),
                    None => return i,
                }
                continue;
            }
            '/' | '?' if starts_search(line, i, line[part_start..i].trim().is_empty()) => {
                i = find_delimiter(line, i + 1, c).map_or(line.len(), |close| close + 1);
                continue;
            }
            // Division inside an expression.
            '/' => {}
            _ => return i,
        }
        i += c.len_utf8();
    }
    line.len()
}
