//! Running the external preprocessor.
//!
//! The pipeline talks to the preprocessor through [`CommandRunner`], so tests can swap
//! in an in-process implementation. [`SystemRunner`] is the real one.

use std::env;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::encoding::TextEncoding;
use crate::error::ProcessError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// How to decode stdout; stderr is always read as UTF-8. `None` means UTF-8.
    pub output_encoding: Option<TextEncoding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    /// Run to completion. A non-zero exit is an error carrying the exit code and stderr.
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ProcessOutput, ProcessError>;
}

/// Shared flag for aborting a running invocation from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs commands with `std::process`, polling for exit so cancellation can kill the
/// child.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ProcessOutput, ProcessError> {
        if !invocation.working_dir.is_dir() {
            return Err(ProcessError::MissingWorkingDirectory(invocation.working_dir.clone()));
        }
        let program = which::which_in(&invocation.program, env::var_os("PATH"), &invocation.working_dir)
            .map_err(|source| ProcessError::CommandNotFound {
                program: invocation.program.clone(),
                source,
            })?;
        let spawn_error = |source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        tracing::debug!(program = %program.display(), args = ?invocation.args, "spawning preprocessor");
        let mut child = Command::new(&program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let stdout = child.stdout.take().map(read_to_end);
        let stderr = child.stderr.take().map(read_to_end);

        let status = loop {
            if cancel.is_cancelled() {
                tracing::debug!(pid = child.id(), "cancelled; killing preprocessor");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Cancelled);
            }
            match child.try_wait().map_err(spawn_error)? {
                Some(status) => break status,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        // An interrupt from the terminal can reach the child before the token is set.
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }
        let stdout = collect(stdout);
        let stderr = String::from_utf8_lossy(&collect(stderr)).into_owned();
        if !status.success() {
            return Err(ProcessError::NonZeroExit {
                code: status.code().unwrap_or(-1),
                stderr,
            });
        }
        Ok(ProcessOutput {
            stdout: decode_output(&stdout, invocation.output_encoding),
            stderr,
        })
    }
}

fn read_to_end<R: Read + Send + 'static>(mut source: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = source.read_to_end(&mut bytes);
        bytes
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Lossy decode of captured output. A byte order mark, if present, overrides
/// `encoding` and is dropped.
pub fn decode_output(bytes: &[u8], encoding: Option<TextEncoding>) -> String {
    let encoding = encoding.unwrap_or(TextEncoding::Utf8).as_encoding();
    encoding.decode(bytes).0.into_owned()
}
