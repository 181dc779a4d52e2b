//! External Process Execution
//!
//! The dispatcher never spawns processes directly; it goes through the
//! [`ProcessRunner`] trait so that hosts and tests can substitute their own
//! implementation. [`SystemProcessRunner`] uses `std::process`.
//!
//! Output is streamed chunk by chunk into the caller's writers so that a
//! pipeline stage sees its upstream's output while it is still running.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

/// Exit status reported for a command killed by an interrupt.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const READ_CHUNK: usize = 8192;

/// Shared cancellation flag set by the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything needed to start a child process.
#[derive(Debug, Clone)]
pub struct ProcessRequest<'a> {
    pub program: &'a Path,
    pub args: &'a [String],
    pub cwd: &'a Path,
    pub env: &'a HashMap<String, String>,
}

/// Spawns external programs for the dispatcher.
pub trait ProcessRunner: Send + Sync {
    /// Run the program to completion, copying `stdin` into it and its output
    /// into `stdout`/`stderr`. Returns the exit status.
    fn run(
        &self,
        request: &ProcessRequest<'_>,
        stdin: &mut (dyn Read + Send),
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        interrupt: &InterruptFlag,
    ) -> io::Result<i32>;
}

enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// [`ProcessRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        request: &ProcessRequest<'_>,
        stdin: &mut (dyn Read + Send),
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        interrupt: &InterruptFlag,
    ) -> io::Result<i32> {
        debug!(program = %request.program.display(), args = ?request.args, "spawning process");

        let mut child = Command::new(request.program)
            .args(request.args)
            .current_dir(request.cwd)
            .env_clear()
            .envs(request.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let child_stdin = child.stdin.take();
        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let (tx, rx) = mpsc::channel::<Chunk>();

        // Readers are detached: a killed child's own children may keep the
        // pipes open after it is gone.
        if let Some(mut source) = child_stdout {
            let tx = tx.clone();
            std::thread::spawn(move || forward_chunks(&mut source, &tx, Chunk::Stdout));
        }
        if let Some(mut source) = child_stderr {
            let tx = tx.clone();
            std::thread::spawn(move || forward_chunks(&mut source, &tx, Chunk::Stderr));
        }
        drop(tx);

        let status = std::thread::scope(|scope| {
            scope.spawn(move || {
                if let Some(mut sink) = child_stdin {
                    // The child may exit without reading its input
                    let _ = io::copy(stdin, &mut sink);
                }
            });

            let mut killed = false;
            let mut stdout_open = true;
            loop {
                if interrupt.is_set() && !killed {
                    debug!("interrupt received, killing child process");
                    let _ = child.kill();
                    killed = true;
                }
                if killed && matches!(child.try_wait(), Ok(Some(_))) {
                    break;
                }
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(Chunk::Stdout(data)) => {
                        if stdout_open && stdout.write_all(&data).is_err() {
                            // downstream closed; keep draining
                            stdout_open = false;
                        }
                    }
                    Ok(Chunk::Stderr(data)) => {
                        let _ = stderr.write_all(&data);
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            let _ = stdout.flush();

            child.wait().map(|status| (status, killed))
        });

        let (status, killed) = status?;
        if killed {
            return Ok(INTERRUPTED_EXIT_CODE);
        }
        Ok(exit_code_of(status))
    }
}

fn forward_chunks(source: &mut dyn Read, tx: &mpsc::Sender<Chunk>, wrap: fn(Vec<u8>) -> Chunk) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(wrap(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "error reading child output");
                break;
            }
        }
    }
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
