//! Wall-clock bounded execution of external commands.
//!
//! Output goes to temporary files rather than pipes so a chatty child can
//! never block on a full pipe while we poll it for exit.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use prv_core::TimeoutError;
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), ..Self::default() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }

    /// Shell-ish rendering for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut s = String::with_capacity(self.stdout.len() + self.stderr.len());
        s.push_str(&self.stdout);
        s.push_str(&self.stderr);
        s
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("spawn `{program}` failed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("waiting on `{program}` failed: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("capturing output failed: {0}")]
    Capture(#[from] std::io::Error),
    #[error(transparent)]
    TimedOut(#[from] TimeoutError),
}

/// Run `spec` to completion or until `timeout` elapses, whichever is first.
///
/// A non-zero exit is not an error; callers inspect `exit_code`. Exceeding the
/// limit always yields `ExecError::TimedOut`, whatever the child would have
/// returned had it been allowed to finish.
pub fn run_bounded(spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, ExecError> {
    let mut stdout_file = tempfile::tempfile()?;
    let mut stderr_file = tempfile::tempfile()?;

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdout(Stdio::from(stdout_file.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .stdin(if spec.stdin.is_some() { Stdio::piped() } else { Stdio::null() });
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    debug!(command = %spec.display(), timeout_secs = timeout.as_secs(), "spawning");
    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn { program: spec.program.clone(), source })?;

    // Feed stdin from a separate thread so a child that never reads it
    // cannot hold us past the deadline.
    if let (Some(bytes), Some(mut stdin)) = (spec.stdin.clone(), child.stdin.take()) {
        thread::spawn(move || {
            let _ = stdin.write_all(&bytes);
        });
    }

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                let output = read_all(&mut stdout_file)? + &read_all(&mut stderr_file)?;
                warn!(command = %spec.display(), timeout_secs = timeout.as_secs(), "command timed out");
                return Err(TimeoutError { command: spec.display(), limit: timeout, output }.into());
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(ExecError::Wait { program: spec.program.clone(), source }),
        }
    };

    let output = CommandOutput {
        exit_code: status.code(),
        stdout: read_all(&mut stdout_file)?,
        stderr: read_all(&mut stderr_file)?,
        elapsed: started.elapsed(),
    };
    debug!(command = %spec.display(), exit_code = ?output.exit_code, elapsed_ms = output.elapsed.as_millis() as u64, "finished");
    Ok(output)
}

/// Like `run_bounded`, but a non-zero exit becomes an error string carrying
/// both streams. Returns trimmed stdout on success.
pub fn run_checked(spec: &CommandSpec, timeout: Duration) -> Result<String, String> {
    let out = run_bounded(spec, timeout).map_err(|e| e.to_string())?;
    if !out.success() {
        return Err(format!(
            "command failed: {} (exit={:?})\nstdout:{}\nstderr:{}",
            spec.display(),
            out.exit_code,
            out.stdout,
            out.stderr
        ));
    }
    Ok(out.stdout.trim().to_string())
}

fn read_all(file: &mut File) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
