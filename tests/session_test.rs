//! End-to-end session tests against a real `/bin/sh`

#![cfg(unix)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use devterm::core::{SessionOptions, SessionState, ShellCommand, ShellKind, TerminalSession};
use devterm::{HistoryDirection, TerminalError, TickOutcome};

const WAIT: Duration = Duration::from_secs(10);

fn sh_options(cwd: PathBuf) -> SessionOptions {
    SessionOptions {
        shell: ShellCommand::new(ShellKind::Bash)
            .with_program("sh")
            .with_args(Vec::<String>::new()),
        project_root: Some(cwd),
        exit_drain: Duration::from_millis(200),
        ..SessionOptions::default()
    }
}

/// Tick until `done` holds or the wait runs out
async fn tick_until(session: &mut TerminalSession, done: impl Fn(&TerminalSession) -> bool) -> bool {
    let start = Instant::now();
    loop {
        session.tick();
        if done(session) {
            return true;
        }
        if start.elapsed() > WAIT {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_banner_and_command_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TerminalSession::open(sh_options(dir.path().to_path_buf()));

    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.transcript().starts_with("Console Terminal ready.\n"));
    assert!(session
        .transcript()
        .contains(&format!("Working directory: {}\n", dir.path().display())));

    session.set_input("echo hello");
    assert!(session.submit().unwrap());
    assert_eq!(session.input(), "");
    assert!(session.transcript().contains("> echo hello\n"));

    assert!(tick_until(&mut session, |s| s.transcript().contains("\nhello\n")).await);
    assert_eq!(session.cursor_position(), session.transcript().chars().count() - 1);

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stdout_and_stderr_share_the_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TerminalSession::open(sh_options(dir.path().to_path_buf()));

    session.submit_command("echo to-stderr 1>&2").unwrap();
    session.submit_command("echo to-stdout").unwrap();

    assert!(
        tick_until(&mut session, |s| {
            s.transcript().contains("to-stderr\n") && s.transcript().contains("to-stdout\n")
        })
        .await
    );

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_working_directory_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let expected = std::fs::canonicalize(dir.path()).unwrap();
    let mut session = TerminalSession::open(sh_options(expected.clone()));

    session.submit_command("pwd").unwrap();
    let line = format!("\n{}\n", expected.display());
    assert!(tick_until(&mut session, |s| s.transcript().contains(&line)).await);

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_history_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TerminalSession::open(sh_options(dir.path().to_path_buf()));

    for command in ["ls", "pwd", "echo hi"] {
        session.set_input(command);
        assert!(session.submit().unwrap());
    }
    // Blank input is not recorded
    session.set_input("  ");
    assert!(!session.submit().unwrap());
    assert_eq!(session.history().len(), 3);

    session.navigate_history(HistoryDirection::Older);
    assert_eq!(session.input(), "echo hi");
    session.navigate_history(HistoryDirection::Older);
    assert_eq!(session.input(), "pwd");
    session.navigate_history(HistoryDirection::Older);
    assert_eq!(session.input(), "ls");
    session.navigate_history(HistoryDirection::Older);
    assert_eq!(session.input(), "ls");

    session.navigate_history(HistoryDirection::Newer);
    assert_eq!(session.input(), "pwd");
    session.navigate_history(HistoryDirection::Newer);
    assert_eq!(session.input(), "echo hi");
    session.navigate_history(HistoryDirection::Newer);
    assert_eq!(session.input(), "");

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exit_terminates_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TerminalSession::open(sh_options(dir.path().to_path_buf()));

    session.submit_command("echo bye; exit 7").unwrap();
    assert!(tick_until(&mut session, |s| s.is_terminated()).await);

    assert_eq!(session.exit_code(), Some(7));
    assert!(session.transcript().contains("bye\n"));
    assert!(session.transcript().ends_with("(exit code 7)\n"));
    assert!(!session.accepts_input());

    // No further polling or dispatching
    let before = session.transcript().to_string();
    assert_eq!(session.tick(), TickOutcome::default());
    assert!(matches!(
        session.submit_command("ls"),
        Err(TerminalError::ChannelClosed)
    ));
    assert_eq!(session.transcript(), before);

    session.close();
    session.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_job_holding_pipes_does_not_hang_exit() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TerminalSession::open(sh_options(dir.path().to_path_buf()));

    // The sleeper inherits stdout/stderr, so the streams stay open after exit
    session.submit_command("sleep 30 & exit 0").unwrap();
    let start = Instant::now();
    assert!(tick_until(&mut session, |s| s.is_terminated()).await);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(session.transcript().ends_with("(exit code 0)\n"));

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transcript_stays_within_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = sh_options(dir.path().to_path_buf());
    options.max_output_length = 200;
    let mut session = TerminalSession::open(options);

    session
        .submit_command("i=0; while [ $i -lt 100 ]; do echo line$i; i=$((i+1)); done")
        .unwrap();
    assert!(tick_until(&mut session, |s| s.transcript().contains("line99\n")).await);

    let text = session.transcript();
    assert!(text.chars().count() <= 200);
    assert!(!text.contains("line0\n"));
    // Trimming keeps whole lines
    assert!(text.starts_with("line"));

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TerminalSession::open(sh_options(dir.path().to_path_buf()));
    assert!(session.process().pid().is_some());

    session.close();
    assert!(session.is_terminated());
    session.close();
    assert_eq!(session.tick(), TickOutcome::default());
    session.shutdown().await;
}

#[tokio::test]
async fn test_launch_failure_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = sh_options(dir.path().to_path_buf());
    options.shell = options.shell.with_program("devterm-no-such-shell");
    let session = TerminalSession::open(options);

    assert_eq!(session.state(), SessionState::Terminated);
    assert!(session.transcript().starts_with("Error: "));
    assert!(session.transcript().contains("devterm-no-such-shell"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_disposes_a_running_shell() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TerminalSession::open(sh_options(dir.path().to_path_buf()));
    assert_eq!(session.state(), SessionState::Ready);

    // No close() first: shutdown alone kills the shell and waits for its exit
    tokio::time::timeout(Duration::from_secs(5), session.shutdown())
        .await
        .unwrap();
    assert!(session.is_terminated());
    assert!(session.process().is_closed());
    assert!(session.process().has_terminated());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pseudo_terminal_session() {
    let dir = tempfile::tempdir().unwrap();
    let options = SessionOptions {
        shell: ShellCommand::new(ShellKind::PseudoTerminal)
            .with_program("sh")
            .with_args(Vec::<String>::new()),
        ..sh_options(dir.path().to_path_buf())
    };
    let mut session = TerminalSession::open(options);
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.transcript().contains("Shell: pty\n"));

    session.submit_command("echo hi; exit 0").unwrap();
    assert!(tick_until(&mut session, |s| s.is_terminated()).await);

    let text = session.transcript();
    assert!(text.contains("\nhi\n"), "{:?}", text);
    assert!(!text.contains('\r'));
    assert!(!text.contains('\x1b'));
    assert!(text.ends_with("(exit code 0)\n"), "{:?}", text);
    assert_eq!(session.exit_code(), Some(0));

    session.close();
    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pseudo_terminal_close_kills_shell() {
    let dir = tempfile::tempdir().unwrap();
    let options = SessionOptions {
        shell: ShellCommand::new(ShellKind::PseudoTerminal)
            .with_program("sh")
            .with_args(Vec::<String>::new()),
        ..sh_options(dir.path().to_path_buf())
    };
    let mut session = TerminalSession::open(options);
    assert!(session.process().pid().is_some());

    tokio::time::timeout(Duration::from_secs(5), session.shutdown())
        .await
        .unwrap();
    assert!(session.process().has_terminated());
}
