//! Shell command execution with timeouts.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Build a [`Command`] that executes `cmd_str` via the system shell.
///
/// - Unix: `sh -c "{cmd_str}"`
/// - Windows: `cmd /C "{cmd_str}"`
pub fn shell_command(cmd_str: &str) -> Command {
    #[cfg(windows)]
    {
        let mut c = Command::new("cmd");
        c.args(["/C", cmd_str]);
        c
    }
    #[cfg(not(windows))]
    {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_str);
        c
    }
}

/// How a supervised command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Exited(ExitStatus),
    /// Killed after exceeding its timeout.
    TimedOut,
}

impl Exit {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(status) if status.success())
    }
}

/// Wait for `child`, killing it once `timeout` elapses.
fn supervise(mut child: Child, timeout: Duration) -> io::Result<Exit> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Exit::Exited(status));
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), ?timeout, "command timed out, killing it");
            // The child may exit between try_wait and kill.
            let _ = child.kill();
            child.wait()?;
            return Ok(Exit::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Run `command` with stdout and stderr written to `log_path`.
pub fn run_logged(mut command: Command, log_path: &Path, timeout: Duration) -> io::Result<Exit> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = File::create(log_path)?;
    let child = command
        .stdin(Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log)
        .spawn()?;
    supervise(child, timeout)
}

/// Output of a captured command.
#[derive(Debug, Clone)]
pub struct Captured {
    pub exit: Exit,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` capturing its output.
///
/// Pipes are drained on helper threads so a chatty child cannot block on a
/// full pipe while we poll for its exit.
pub fn run_captured(mut command: Command, timeout: Duration) -> io::Result<Captured> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let exit = supervise(child, timeout)?;
    if exit == Exit::TimedOut {
        // Grandchildren may still hold the pipes; leave the readers detached.
        return Ok(Captured {
            exit,
            stdout: String::new(),
            stderr: String::new(),
        });
    }

    let collect = |handle: Option<thread::JoinHandle<String>>| {
        handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    };
    Ok(Captured {
        exit,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = reader.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn logged_output_lands_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs/step.log");
        let exit = run_logged(
            shell_command("echo out; echo err >&2"),
            &log,
            Duration::from_secs(10),
        )
        .unwrap();
        assert!(exit.success());
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("out"));
        assert!(content.contains("err"));
    }

    #[test]
    fn nonzero_exit_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let exit = run_logged(
            shell_command("exit 3"),
            &dir.path().join("x.log"),
            Duration::from_secs(10),
        )
        .unwrap();
        assert!(!exit.success());
        assert!(matches!(exit, Exit::Exited(status) if status.code() == Some(3)));
    }

    #[test]
    fn slow_command_is_killed() {
        let started = Instant::now();
        let mut sleep = Command::new("sleep");
        sleep.arg("30");
        let captured = run_captured(sleep, Duration::from_millis(200)).unwrap();
        assert_eq!(captured.exit, Exit::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn captured_output_is_returned() {
        let captured =
            run_captured(shell_command("echo Python 3.12.1"), Duration::from_secs(10)).unwrap();
        assert!(captured.exit.success());
        assert_eq!(captured.stdout.trim(), "Python 3.12.1");
    }
}
