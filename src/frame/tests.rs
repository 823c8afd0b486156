use super::*;
use crate::buffer::SelectionKind;
use regex::Regex;

#[test]
fn test_new_frame() {
    let frame = Frame::new();
    assert_eq!(frame.to_string(), "");
    assert_eq!(frame.line_count(), Some(1));
    assert_eq!(frame.cursor(), 0);
}

#[test]
fn test_line_count_ignores_trailing_terminator() {
    assert_eq!(Frame::from_str("a\nb\nc").line_count(), Some(3));
    assert_eq!(Frame::from_str("a\nb\nc\n").line_count(), Some(3));
    assert_eq!(Frame::from_str("a\n\n").line_count(), Some(2));
}

#[test]
fn test_from_lines() {
    let frame = Frame::from_lines(&["alpha", "beta"]);
    assert_eq!(frame.to_string(), "alpha\nbeta\n");
    assert_eq!(frame.lines(), vec!["alpha", "beta"]);
}

#[test]
fn test_crlf_detected() {
    let frame = Frame::from_str("a\r\nb\r\n");
    assert_eq!(frame.eol(), "\r\n");
    assert_eq!(frame.line_text(0), "a");
    assert_eq!(frame.line_count(), Some(2));
}

#[test]
fn test_insert_in_middle() {
    let mut frame = Frame::from_str("helloworld");
    frame.set_cursor(5);
    frame.insert(5, " ");
    assert_eq!(frame.to_string(), "hello world");
    assert_eq!(frame.cursor(), 6);
}

#[test]
fn test_delete_across_lines() {
    let mut frame = Frame::from_str("hello\nworld\n");
    frame.delete(3, 8);
    assert_eq!(frame.to_string(), "helrld\n");
}

#[test]
fn test_replace() {
    let mut frame = Frame::from_str("hello world");
    frame.replace(6, 11, "there");
    assert_eq!(frame.to_string(), "hello there");
}

#[test]
fn test_marks_update_on_edits() {
    let mut frame = Frame::from_str("hello world");
    frame.set_mark(MarkId::Named('a'), 11);
    frame.insert(5, " beautiful");
    assert_eq!(frame.mark(MarkId::Named('a')), Some(21));
    frame.delete(0, 6);
    assert_eq!(frame.mark(MarkId::Named('a')), Some(15));
}

#[test]
fn test_find_in_range_uses_char_offsets() {
    let frame = Frame::from_str("héllo\nwörld\n");
    let re = Regex::new("w.r").unwrap();
    assert_eq!(frame.find_in_range(&re, 0, frame.len_chars()), Some((6, 9)));
    assert_eq!(frame.find_in_range(&re, 0, 6), None);
}

#[test]
fn test_rfind_in_range_returns_last() {
    let frame = Frame::from_lines(&["ab", "ab", "cd"]);
    let re = Regex::new("ab").unwrap();
    assert_eq!(frame.rfind_in_range(&re, 0, frame.len_chars()), Some((3, 5)));
}

#[test]
fn test_undo_group() {
    let mut frame = Frame::from_str("one\n");
    frame.begin_undo_action();
    frame.insert(0, "zero\n");
    frame.insert(frame.len_chars(), "two\n");
    frame.end_undo_action();
    assert_eq!(frame.to_string(), "zero\none\ntwo\n");
    assert!(frame.undo());
    assert_eq!(frame.to_string(), "one\n");
    assert!(!frame.undo());
}

#[test]
fn test_deletion_span_unterminated_last_line() {
    let frame = Frame::from_str("a\nb\nc");
    assert_eq!(frame.deletion_span(2, 2), (3, 5));
    assert_eq!(frame.deletion_span(1, 1), (2, 4));
    assert_eq!(frame.deletion_span(0, 2), (0, 5));
}

#[test]
fn test_put_lines() {
    let mut frame = Frame::from_str("a\nb");
    frame.put_lines(2, "c");
    assert_eq!(frame.to_string(), "a\nb\nc");
    frame.put_lines(0, "z");
    assert_eq!(frame.to_string(), "z\na\nb\nc");

    let mut frame = Frame::from_str("a\n");
    frame.put_lines(1, "b\n");
    assert_eq!(frame.to_string(), "a\nb\n");

    // The empty buffer still has one empty line to put after.
    let mut frame = Frame::new();
    frame.put_lines(1, "b");
    assert_eq!(frame.to_string(), "\nb");
}

#[test]
fn test_selection_is_clamped() {
    let mut frame = Frame::from_str("abc");
    frame.set_selection(Selection::new(1, 99, SelectionKind::Block));
    assert_eq!(frame.selection(), Selection::new(1, 3, SelectionKind::Block));
}
