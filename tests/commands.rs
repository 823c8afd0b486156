//! End-to-end command scenarios through the public `Session` API.

use std::fs;
use std::path::Path;

use anyhow::Result;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

use vicmd::{
    CmdFailure, CmdResult, Confirm, ExContext, Frame, MacroStore, ProcessOutput, ProcessRunner,
    ScriptedFrontend, Session,
};

fn session(lines: &[&str]) -> (Session, ScriptedFrontend) {
    let frontend = ScriptedFrontend::new();
    (Session::new(Frame::from_lines(lines), frontend.clone()), frontend)
}

fn run_all(session: &mut Session, ctx: &mut ExContext, commands: &[&str]) -> CmdResult {
    let mut result = CmdResult::Success;
    for command in commands {
        result = session.execute(ctx, command);
    }
    result
}

/// Upper-cases the file named by the last word of the command.
struct UpperCaseRunner;

impl ProcessRunner for UpperCaseRunner {
    fn run(&mut self, command: &str, _cwd: &Path) -> Result<ProcessOutput> {
        let path = command.split_whitespace().last().unwrap_or_default();
        Ok(ProcessOutput {
            stdout: fs::read_to_string(path)?.to_uppercase(),
            stderr: String::new(),
            success: true,
        })
    }
}

struct FailingRunner;

impl ProcessRunner for FailingRunner {
    fn run(&mut self, _command: &str, _cwd: &Path) -> Result<ProcessOutput> {
        Ok(ProcessOutput {
            stdout: "partial".into(),
            stderr: "boom".into(),
            success: false,
        })
    }
}

#[test]
fn substitute_over_a_range() {
    let (mut session, _) = session(&["alpha", "beta", "alpha beta", "alpha"]);
    let mut ctx = ExContext::in_memory();
    let result = session.execute(&mut ctx, "1,3s/alpha/gamma/g");
    assert_eq!(result, CmdResult::Message("Replaced: 2 occurrences of: alpha".into()));
    assert_eq!(session.lines(), vec!["gamma", "beta", "gamma beta", "alpha"]);
    assert_eq!(ctx.last_search.as_deref(), Some("alpha"));
}

#[test]
fn substitute_with_backreferences() {
    let (mut session, _) = session(&["john smith", "jane doe"]);
    let mut ctx = ExContext::in_memory();
    session.execute(&mut ctx, r"%s/(\w+) (\w+)/\U\2\E, \1/");
    assert_eq!(session.lines(), vec!["SMITH, john", "DOE, jane"]);
}

#[test]
fn substitute_confirms_each_match() {
    let (mut session, frontend) = session(&["aaa"]);
    frontend.push_confirm(Confirm::Yes).push_confirm(Confirm::No).push_confirm(Confirm::Yes);
    let mut ctx = ExContext::in_memory();
    let result = session.execute(&mut ctx, "s/a/b/gc");
    assert_eq!(result, CmdResult::Message("Replaced: 2 occurrences of: a".into()));
    assert_eq!(session.lines(), vec!["bab"]);
    assert_eq!(frontend.questions().len(), 3);
}

#[test]
fn search_addresses() {
    let (mut session, _) = session(&["alpha", "beta", "gamma", "beta"]);
    let mut ctx = ExContext::in_memory();
    assert_eq!(run_all(&mut session, &mut ctx, &["/beta/", ".="]), CmdResult::Message("2".into()));
    assert_eq!(run_all(&mut session, &mut ctx, &["//", ".="]), CmdResult::Message("4".into()));
    assert_eq!(run_all(&mut session, &mut ctx, &["?alpha?", ".="]), CmdResult::Message("1".into()));
    let result = session.execute(&mut ctx, "/delta/");
    assert!(matches!(result, CmdResult::Failure(CmdFailure::AddressUnresolved(_))));
}

#[test]
fn relative_move_to_top() {
    let (mut session, _) = session(&["l1", "l2", "l3", "l4", "l5"]);
    let mut ctx = ExContext::in_memory();
    let result = run_all(&mut session, &mut ctx, &["3", ".,.+2m0"]);
    assert_eq!(result, CmdResult::Message("3 lines moved".into()));
    assert_eq!(session.lines(), vec!["l3", "l4", "l5", "l1", "l2"]);
}

#[test]
fn read_only_buffer_refuses_edits() {
    let frontend = ScriptedFrontend::new();
    let mut session = Session::new(Frame::from_lines(&["a", "b"]).with_read_only(true), frontend);
    let mut ctx = ExContext::in_memory();
    assert_eq!(
        session.execute(&mut ctx, "1d"),
        CmdResult::Failure(CmdFailure::ReadOnlyOrBinary)
    );
    assert!(session.execute(&mut ctx, "%y").is_success());
    assert_eq!(session.lines(), vec!["a", "b"]);
}

#[test]
fn global_runs_command_on_matching_lines() {
    let (mut session, frontend) = session(&["x1", "y", "x2"]);
    let mut ctx = ExContext::in_memory();
    assert!(session.execute(&mut ctx, "g/x/p").is_success());
    assert_eq!(frontend.messages(), vec!["x1", "x2"]);
    session.execute(&mut ctx, "g/x/s/x/z/");
    assert_eq!(session.lines(), vec!["z1", "y", "z2"]);
}

#[test]
fn recorded_macro_plays_back() {
    let (mut session, _) = session(&["a", "a", "a", "a"]);
    let mut ctx = ExContext::in_memory();
    let result = run_all(&mut session, &mut ctx, &["rec fix", "s/a/b/", "+", "stop"]);
    assert_eq!(result, CmdResult::Message("recorded 2 commands into fix".into()));
    assert_eq!(session.lines(), vec!["b", "a", "a", "a"]);
    assert!(session.execute(&mut ctx, "2@fix").is_success());
    assert_eq!(session.lines(), vec!["b", "b", "b", "a"]);
}

#[test]
fn self_playing_macro_is_detected() {
    let (mut session, frontend) = session(&["a"]);
    let mut ctx = ExContext::in_memory();
    ctx.store.set_macro("loop", vec!["@loop".into()]);
    let result = session.execute(&mut ctx, "@loop");
    assert!(matches!(result, CmdResult::Failure(CmdFailure::RecursionDetected(_))));
    assert!(frontend.messages().iter().any(|m| m == "macro loop failed at: @loop"));
}

#[test]
fn macros_persist_in_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("macros.json");
    {
        let mut ctx = ExContext::new(MacroStore::new(&path));
        ctx.load().unwrap();
        let (mut session, _) = session(&["a"]);
        run_all(&mut session, &mut ctx, &["rec q", "1d", "stop", "ab teh the"]);
        ctx.flush().unwrap();
    }
    let mut ctx = ExContext::new(MacroStore::new(&path));
    ctx.load().unwrap();
    assert_eq!(ctx.store.macro_commands("q"), Some(&["1d\n".to_string()][..]));
    assert_eq!(ctx.store.abbreviations().get("teh").map(String::as_str), Some("the"));
}

#[test]
fn source_runs_script_and_rejects_recursion() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("setup.vi"), "\" comment\n\n:2d\n$s/c/C/\n").unwrap();
    fs::write(dir.path().join("loop.vi"), "1d\nso loop.vi\n").unwrap();

    let frontend = ScriptedFrontend::new();
    let mut session =
        Session::new(Frame::from_lines(&["a", "b", "c"]), frontend.clone()).with_cwd(dir.path());
    let mut ctx = ExContext::in_memory();
    assert!(session.execute(&mut ctx, "so setup.vi").is_success());
    assert_eq!(session.lines(), vec!["a", "C"]);

    let result = session.execute(&mut ctx, "so loop.vi");
    assert!(matches!(result, CmdResult::Failure(CmdFailure::RecursionDetected(_))));
    assert_eq!(session.lines(), vec!["C"]);

    let result = session.execute(&mut ctx, "so missing.vi");
    assert!(matches!(result, CmdResult::Failure(CmdFailure::Io(_))));
}

#[test]
fn filter_replaces_lines_with_command_output() {
    let (mut session, _) = session(&["one", "two", "three"]);
    let mut ctx = ExContext::in_memory().with_runner(Box::new(UpperCaseRunner));
    let result = session.execute(&mut ctx, "1,2!upcase");
    assert_eq!(result, CmdResult::Message("2 lines filtered".into()));
    assert_eq!(session.lines(), vec!["ONE", "TWO", "three"]);
}

#[test]
fn failed_filter_leaves_buffer_alone() {
    let (mut session, _) = session(&["one"]);
    let mut ctx = ExContext::in_memory().with_runner(Box::new(FailingRunner));
    let result = session.execute(&mut ctx, "%!whatever");
    assert_eq!(result, CmdResult::Failure(CmdFailure::ExternalProcess("boom".into())));
    assert_eq!(session.lines(), vec!["one"]);
}

#[test]
fn cd_and_pwd() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let (session, _) = session(&["a"]);
    let mut session = session.with_cwd(dir.path());
    let mut ctx = ExContext::in_memory();
    assert!(session.execute(&mut ctx, "cd sub").is_success());
    assert!(session.cwd().ends_with("sub"));
    assert!(session.execute(&mut ctx, "cd nowhere").is_failure());
    let CmdResult::Message(pwd) = session.execute(&mut ctx, "pwd") else {
        panic!("pwd gives a message");
    };
    assert!(pwd.ends_with("sub"));
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn delete_then_put_restores_buffer(
        lines in proptest::collection::vec("[a-z]{0,6}", 1..12),
        a in 0usize..64,
        b in 0usize..64,
    ) {
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let count = lines.len();
        let (first, last) = {
            let (x, y) = (a % count + 1, b % count + 1);
            (x.min(y), x.max(y))
        };
        let (mut session, _) = session(&lines);
        let mut ctx = ExContext::in_memory();
        let original = session.buffer().text();

        let delete_cmd = format!("{first},{last}d");
        prop_assert!(session.execute(&mut ctx, &delete_cmd).is_success());
        prop_assert_eq!(session.lines().len().max(1), (count - (last - first + 1)).max(1));
        let put_cmd = format!("{}pu", first - 1);
        prop_assert!(session.execute(&mut ctx, &put_cmd).is_success());
        prop_assert_eq!(session.buffer().text(), original);
    }

    #[test]
    fn yank_then_put_duplicates_lines(
        lines in proptest::collection::vec("[a-z]{1,6}", 1..12),
        a in 0usize..64,
        b in 0usize..64,
    ) {
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let count = lines.len();
        let (first, last) = {
            let (x, y) = (a % count + 1, b % count + 1);
            (x.min(y), x.max(y))
        };
        let (mut session, _) = session(&lines);
        let mut ctx = ExContext::in_memory();

        session.execute(&mut ctx, &format!("{first},{last}y"));
        session.execute(&mut ctx, &format!("{last}pu"));
        let mut expected: Vec<&str> = lines[..last].to_vec();
        expected.extend_from_slice(&lines[first - 1..last]);
        expected.extend_from_slice(&lines[last..]);
        prop_assert_eq!(session.lines(), expected);
    }
}
