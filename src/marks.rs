//! Mark system for tracking positions in the buffer.
//!
//! Marks are char offsets that automatically update when the buffer is modified.

use std::collections::HashMap;

/// A unique identifier for a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkId {
    /// User marks set with `k`/`ma`, `'a`..`'z` plus `'<` and `'>`.
    Named(char),
    /// Start of the window a range operation is scanning.
    RangeBegin,
    /// End of the window a range operation is scanning.
    RangeEnd,
    /// Per-line marks used by `:global`.
    Line(usize),
}

impl MarkId {
    /// Returns the mark for a user mark name, if the name is valid.
    pub fn named(name: char) -> Option<MarkId> {
        if name.is_ascii_lowercase() || matches!(name, '<' | '>') {
            Some(MarkId::Named(name))
        } else {
            None
        }
    }
}

/// Manages all marks in a buffer.
#[derive(Debug, Default, Clone)]
pub struct MarkSet {
    marks: HashMap<MarkId, usize>,
}

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a mark by ID.
    pub fn get(&self, id: MarkId) -> Option<usize> {
        self.marks.get(&id).copied()
    }

    /// Set the offset of a mark.
    pub fn set(&mut self, id: MarkId, offset: usize) {
        self.marks.insert(id, offset);
    }

    /// Unset a mark.
    pub fn unset(&mut self, id: MarkId) {
        self.marks.remove(&id);
    }

    /// All user marks, sorted by name.
    pub fn named(&self) -> Vec<(char, usize)> {
        let mut named: Vec<(char, usize)> = self
            .marks
            .iter()
            .filter_map(|(id, offset)| match id {
                MarkId::Named(c) => Some((*c, *offset)),
                _ => None,
            })
            .collect();
        named.sort();
        named
    }

    /// Clamp every mark to `len` (used after wholesale text replacement).
    pub fn clamp(&mut self, len: usize) {
        for offset in self.marks.values_mut() {
            *offset = (*offset).min(len);
        }
    }

    /// Update all marks after an insertion of `len` chars at `at`.
    ///
    /// Marks at or after the insertion point move right.
    pub fn update_after_insert(&mut self, at: usize, len: usize) {
        for offset in self.marks.values_mut() {
            if *offset >= at {
                *offset += len;
            }
        }
    }

    /// Update all marks after a deletion of `from..to`.
    ///
    /// Marks inside the deleted text collapse to `from`.
    pub fn update_after_delete(&mut self, from: usize, to: usize) {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        for offset in self.marks.values_mut() {
            if *offset <= from {
                continue;
            }
            if *offset < to {
                *offset = from;
            } else {
                *offset -= to - from;
            }
        }
    }

    /// Remove user and line marks lying inside `from..to`.
    pub fn clear_named_within(&mut self, from: usize, to: usize) {
        self.marks.retain(|id, offset| {
            !(matches!(id, MarkId::Named(_) | MarkId::Line(_)) && *offset >= from && *offset < to)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_creation() {
        let mut marks = MarkSet::new();
        let id = MarkId::Named('a');
        assert_eq!(marks.get(id), None);
        marks.set(id, 10);
        assert_eq!(marks.get(id), Some(10));
        marks.unset(id);
        assert_eq!(marks.get(id), None);
    }

    #[test]
    fn test_named_validation() {
        assert_eq!(MarkId::named('q'), Some(MarkId::Named('q')));
        assert_eq!(MarkId::named('<'), Some(MarkId::Named('<')));
        assert_eq!(MarkId::named('Q'), None);
        assert_eq!(MarkId::named('1'), None);
    }

    #[test]
    fn test_insert_updates_marks() {
        let mut marks = MarkSet::new();
        marks.set(MarkId::Named('a'), 3);
        marks.set(MarkId::Named('b'), 10);
        marks.set(MarkId::RangeEnd, 5);

        marks.update_after_insert(5, 4);

        assert_eq!(marks.get(MarkId::Named('a')), Some(3));
        assert_eq!(marks.get(MarkId::RangeEnd), Some(9));
        assert_eq!(marks.get(MarkId::Named('b')), Some(14));
    }

    #[test]
    fn test_delete_updates_marks() {
        let mut marks = MarkSet::new();
        marks.set(MarkId::Named('a'), 2);
        marks.set(MarkId::Named('b'), 7);
        marks.set(MarkId::Named('c'), 12);

        marks.update_after_delete(5, 10);

        assert_eq!(marks.get(MarkId::Named('a')), Some(2));
        assert_eq!(marks.get(MarkId::Named('b')), Some(5));
        assert_eq!(marks.get(MarkId::Named('c')), Some(7));
    }

    #[test]
    fn test_clear_named_within() {
        let mut marks = MarkSet::new();
        marks.set(MarkId::Named('a'), 2);
        marks.set(MarkId::Named('b'), 7);
        marks.set(MarkId::RangeBegin, 7);
        marks.set(MarkId::Line(3), 8);
        marks.clear_named_within(5, 10);
        assert_eq!(marks.named(), vec![('a', 2)]);
        assert_eq!(marks.get(MarkId::Line(3)), None);
        assert_eq!(marks.get(MarkId::RangeBegin), Some(7));
    }
}
