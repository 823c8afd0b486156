//! Registers: single-character text slots.
//!
//! Letters, digits and `.` live in the [`MacroStore`] as one-character
//! macros, so they persist. `"` and `*` share the clipboard slot held here;
//! `_` discards writes and reads empty.

use crate::store::MacroStore;

/// A parsed register name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterName {
    /// `a`..`z`.
    Named(char),
    /// `A`..`Z`: append to the lower-case register.
    Append(char),
    /// `1`..`9`: delete history.
    Numbered(u8),
    /// `0`: last yank.
    Yank,
    /// `.`: last inserted text.
    LastInsert,
    /// `"` or `*`.
    Clipboard,
    /// `_`.
    BlackHole,
}

impl RegisterName {
    pub fn parse(name: char) -> Option<RegisterName> {
        match name {
            'a'..='z' => Some(RegisterName::Named(name)),
            'A'..='Z' => Some(RegisterName::Append(name.to_ascii_lowercase())),
            '0' => Some(RegisterName::Yank),
            '1'..='9' => Some(RegisterName::Numbered(name as u8 - b'0')),
            '.' => Some(RegisterName::LastInsert),
            '"' | '*' => Some(RegisterName::Clipboard),
            '_' => Some(RegisterName::BlackHole),
            _ => None,
        }
    }

    /// The macro slot backing this register, if it persists.
    fn slot(self) -> Option<String> {
        match self {
            RegisterName::Named(c) | RegisterName::Append(c) => Some(c.to_string()),
            RegisterName::Numbered(n) => Some(n.to_string()),
            RegisterName::Yank => Some("0".into()),
            RegisterName::LastInsert => Some(".".into()),
            RegisterName::Clipboard | RegisterName::BlackHole => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RegisterStore {
    clipboard: String,
}

impl RegisterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of a register, fragments concatenated.
    pub fn get(&self, store: &MacroStore, name: RegisterName) -> String {
        match name {
            RegisterName::Clipboard => self.clipboard.clone(),
            RegisterName::BlackHole => String::new(),
            _ => name
                .slot()
                .and_then(|slot| store.macro_commands(&slot).map(|fragments| fragments.concat()))
                .unwrap_or_default(),
        }
    }

    /// Write `text`, appending a fragment for upper-case names.
    pub fn set(&mut self, store: &mut MacroStore, name: RegisterName, text: &str) {
        match name {
            RegisterName::Clipboard => self.clipboard = text.to_string(),
            RegisterName::BlackHole => {}
            RegisterName::Append(c) => store.append_macro(&c.to_string(), text.to_string()),
            _ => {
                if let Some(slot) = name.slot() {
                    store.set_macro(&slot, vec![text.to_string()]);
                }
            }
        }
    }

    /// Store yanked text: explicit register, or `0` and the clipboard.
    pub fn yank(&mut self, store: &mut MacroStore, name: Option<RegisterName>, text: &str) {
        match name {
            Some(name) => self.set(store, name, text),
            None => {
                self.set(store, RegisterName::Yank, text);
                self.clipboard = text.to_string();
            }
        }
    }

    /// Store deleted text: explicit register, or shift the `1`..`9` history
    /// and mirror into the clipboard.
    pub fn delete(&mut self, store: &mut MacroStore, name: Option<RegisterName>, text: &str) {
        match name {
            Some(name) => self.set(store, name, text),
            None => {
                for n in (1..9u8).rev() {
                    let older = store.macro_commands(&n.to_string()).map(<[String]>::to_vec);
                    match older {
                        Some(fragments) => store.set_macro(&(n + 1).to_string(), fragments),
                        None => {
                            store.remove_macro(&(n + 1).to_string());
                        }
                    }
                }
                self.set(store, RegisterName::Numbered(1), text);
                self.clipboard = text.to_string();
            }
        }
    }

    /// Record the last inserted text in `.`.
    pub fn inserted(&mut self, store: &mut MacroStore, text: &str) {
        self.set(store, RegisterName::LastInsert, text);
    }

    pub fn clipboard(&self) -> &str {
        &self.clipboard
    }

    /// Non-empty registers in display order.
    pub fn listing(&self, store: &MacroStore) -> Vec<(char, String)> {
        let mut out = Vec::new();
        if !self.clipboard.is_empty() {
            out.push(('"', self.clipboard.clone()));
        }
        let names = ('0'..='9').chain('a'..='z').chain(std::iter::once('.'));
        for c in names {
            if let Some(name) = RegisterName::parse(c) {
                let text = self.get(store, name);
                if !text.is_empty() {
                    out.push((c, text));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(c: char) -> RegisterName {
        RegisterName::parse(c).unwrap()
    }

    #[test]
    fn parse_names() {
        assert_eq!(reg('a'), RegisterName::Named('a'));
        assert_eq!(reg('Q'), RegisterName::Append('q'));
        assert_eq!(reg('0'), RegisterName::Yank);
        assert_eq!(reg('7'), RegisterName::Numbered(7));
        assert_eq!(reg('*'), RegisterName::Clipboard);
        assert_eq!(RegisterName::parse('#'), None);
    }

    #[test]
    fn upper_case_appends_fragment() {
        let mut store = MacroStore::in_memory();
        let mut registers = RegisterStore::new();
        registers.set(&mut store, reg('a'), "one\n");
        registers.set(&mut store, reg('A'), "two\n");
        assert_eq!(registers.get(&store, reg('a')), "one\ntwo\n");
        assert_eq!(store.macro_commands("a").unwrap().len(), 2);
        registers.set(&mut store, reg('a'), "three\n");
        assert_eq!(registers.get(&store, reg('a')), "three\n");
    }

    #[test]
    fn deletes_rotate_history() {
        let mut store = MacroStore::in_memory();
        let mut registers = RegisterStore::new();
        registers.delete(&mut store, None, "first");
        registers.delete(&mut store, None, "second");
        assert_eq!(registers.get(&store, reg('1')), "second");
        assert_eq!(registers.get(&store, reg('2')), "first");
        assert_eq!(registers.clipboard(), "second");
        for i in 0..12 {
            registers.delete(&mut store, None, &i.to_string());
        }
        assert_eq!(registers.get(&store, reg('9')), "3");
    }

    #[test]
    fn yank_goes_to_zero_and_clipboard() {
        let mut store = MacroStore::in_memory();
        let mut registers = RegisterStore::new();
        registers.yank(&mut store, None, "text");
        assert_eq!(registers.get(&store, reg('0')), "text");
        assert_eq!(registers.get(&store, reg('"')), "text");
        registers.yank(&mut store, Some(reg('b')), "bee");
        assert_eq!(registers.get(&store, reg('b')), "bee");
        assert_eq!(registers.clipboard(), "text");
    }

    #[test]
    fn black_hole_discards() {
        let mut store = MacroStore::in_memory();
        let mut registers = RegisterStore::new();
        registers.delete(&mut store, Some(reg('_')), "gone");
        assert_eq!(registers.get(&store, reg('_')), "");
        assert!(registers.listing(&store).is_empty());
    }
}
