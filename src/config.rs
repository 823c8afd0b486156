//! Session-wide options, changed with `:set`.

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::cmd_result::{CmdFailure, parse_error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Default case sensitivity for searches and substitutes.
    pub ignore_case: bool,
    /// Searches wrap around the buffer boundary once.
    pub wrap_scan: bool,
    pub shift_width: usize,
    /// Indent with spaces instead of tabs.
    pub expand_tab: bool,
    pub comment_begin: String,
    pub comment_end: String,
    /// Directory template variables are read from.
    pub template_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ignore_case: false,
            wrap_scan: true,
            shift_width: 4,
            expand_tab: true,
            comment_begin: "//".into(),
            comment_end: String::new(),
            template_dir: None,
        }
    }
}

impl Settings {
    /// The text one indent step inserts.
    pub fn indent_unit(&self) -> String {
        if self.expand_tab {
            " ".repeat(self.shift_width)
        } else {
            "\t".into()
        }
    }

    /// Apply `:set` arguments. Returns a listing for `:set all`.
    pub fn apply(&mut self, args: &str) -> Result<Option<String>, CmdFailure> {
        let mut listing = None;
        for arg in args.split_whitespace() {
            let (name, value) = match arg.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (arg, None),
            };
            match (name, value) {
                ("all", None) => listing = Some(self.describe()),
                ("ic" | "ignorecase", None) => self.ignore_case = true,
                ("noic" | "noignorecase", None) => self.ignore_case = false,
                ("ws" | "wrapscan", None) => self.wrap_scan = true,
                ("nows" | "nowrapscan", None) => self.wrap_scan = false,
                ("et" | "expandtab", None) => self.expand_tab = true,
                ("noet" | "noexpandtab", None) => self.expand_tab = false,
                ("sw" | "shiftwidth", Some(value)) => {
                    self.shift_width = value
                        .parse()
                        .ok()
                        .filter(|width| *width > 0)
                        .ok_or_else(|| parse_error(format!("invalid shiftwidth: {value}")))?;
                }
                ("cb" | "commentbegin", Some(value)) => self.comment_begin = value.into(),
                ("ce" | "commentend", Some(value)) => self.comment_end = value.into(),
                ("td" | "templatedir", Some(value)) => self.template_dir = Some(value.into()),
                _ => return Err(parse_error(format!("unknown option: {arg}"))),
            }
        }
        Ok(listing)
    }

    fn describe(&self) -> String {
        let flag = |on: bool, name: &str| if on { name.to_string() } else { format!("no{name}") };
        let mut out = String::new();
        let _ = write!(
            out,
            "{} {} {} shiftwidth={} commentbegin={}",
            flag(self.ignore_case, "ignorecase"),
            flag(self.wrap_scan, "wrapscan"),
            flag(self.expand_tab, "expandtab"),
            self.shift_width,
            self.comment_begin,
        );
        if !self.comment_end.is_empty() {
            let _ = write!(out, " commentend={}", self.comment_end);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_flags_and_values() {
        let mut settings = Settings::default();
        settings.apply("ic nows sw=2").unwrap();
        assert!(settings.ignore_case);
        assert!(!settings.wrap_scan);
        assert_eq!(settings.indent_unit(), "  ");
        settings.apply("noet").unwrap();
        assert_eq!(settings.indent_unit(), "\t");
    }

    #[test]
    fn set_rejects_unknown_and_bad_values() {
        let mut settings = Settings::default();
        assert!(settings.apply("bogus").is_err());
        assert!(settings.apply("sw=0").is_err());
        assert!(settings.apply("sw=x").is_err());
    }

    #[test]
    fn set_all_lists_options() {
        let mut settings = Settings::default();
        let listing = settings.apply("all").unwrap().unwrap();
        assert!(listing.contains("noignorecase"));
        assert!(listing.contains("shiftwidth=4"));
    }
}
