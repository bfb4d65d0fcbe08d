//! Blocking execution of external tools with a hard time limit.

use crate::utils::errors::ProcessError;
use log::{debug, trace};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What the child sees on stdin.
#[derive(Debug, Clone, Default)]
pub enum StdinSource {
    /// Nothing; stdin is closed
    #[default]
    Null,
    /// Bytes written by a helper thread
    Bytes(Vec<u8>),
    /// Contents of a file
    File(PathBuf),
}

/// Captured result of a finished child.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit status
    pub status: ExitStatus,
    /// Everything written to stdout
    pub stdout: String,
    /// Everything written to stderr
    pub stderr: String,
    /// Wall-clock time spent waiting for the child
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// Whether the child exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `command` to completion, killing it once `limit` has passed.
///
/// Output of a killed child is discarded.
pub fn run_with_timeout(
    command: &mut Command,
    stdin: StdinSource,
    limit: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let program = command.get_program().to_string_lossy().into_owned();
    trace!("spawning {:?}", command);

    let stdin_cfg = match &stdin {
        StdinSource::Null => Stdio::null(),
        StdinSource::Bytes(_) => Stdio::piped(),
        StdinSource::File(path) => Stdio::from(File::open(path)?),
    };

    let start = Instant::now();
    let mut child = command
        .stdin(stdin_cfg)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    let writer = match (stdin, child.stdin.take()) {
        (StdinSource::Bytes(bytes), Some(mut pipe)) => Some(thread::spawn(move || {
            // A child that exits early closes the pipe; that is not our error.
            let _ = pipe.write_all(&bytes);
        })),
        _ => None,
    };
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let deadline = start + limit;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            debug!("`{}` exceeded {:?}, killing", program, limit);
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::TimedOut { program, limit });
        }
        thread::sleep(POLL_INTERVAL);
    };

    if let Some(handle) = writer {
        let _ = handle.join();
    }
    let stdout = stdout_reader.map(join_reader).unwrap_or_default();
    let stderr = stderr_reader.map(join_reader).unwrap_or_default();

    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        elapsed: start.elapsed(),
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout() {
        let out = run_with_timeout(
            Command::new("sh").args(["-c", "echo hello"]),
            StdinSource::Null,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_feeds_stdin() {
        let out = run_with_timeout(
            &mut Command::new("cat"),
            StdinSource::Bytes(b"int x;".to_vec()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(out.stdout, "int x;");
    }

    #[test]
    fn test_kills_on_timeout() {
        let err = run_with_timeout(
            Command::new("sh").args(["-c", "sleep 5"]),
            StdinSource::Null,
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[test]
    fn test_missing_program() {
        let err = run_with_timeout(
            &mut Command::new("definitely-not-a-real-tool-xyz"),
            StdinSource::Null,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
