//! Blocking execution of FFmpeg/ffprobe child processes.
//!
//! Each invocation runs under an optional deadline and an optional shared
//! cancel flag. Output streams are drained on background threads while the
//! calling thread polls the child, so a hung engine can be killed without
//! waiting on its pipes.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use parking_lot::Mutex;

use crate::error::AppError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Keep only the last N bytes of stderr to avoid unbounded memory growth.
const MAX_STDERR_BYTES: usize = 64 * 1024;
/// ffprobe JSON for a single file stays far below this.
const MAX_STDOUT_BYTES: usize = 4 * 1024 * 1024;
#[cfg(unix)]
const ETXTBSY: i32 = 26;
const SPAWN_ATTEMPTS: usize = 5;

/// Cooperative cancellation shared between a batch and its engine calls.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolLimits {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelFlag>,
}

impl ToolLimits {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    pub fn cancellable(mut self, cancel: Option<CancelFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

enum Capture {
    Head(usize),
    Tail(usize),
}

fn drain<R: Read + Send + 'static>(
    mut reader: R,
    buffer: Arc<Mutex<Vec<u8>>>,
    capture: Capture,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let mut guard = buffer.lock();
            match capture {
                Capture::Head(limit) => {
                    let room = limit.saturating_sub(guard.len());
                    guard.extend_from_slice(&chunk[..n.min(room)]);
                }
                Capture::Tail(limit) => {
                    guard.extend_from_slice(&chunk[..n]);
                    if guard.len() > limit {
                        let excess = guard.len() - limit;
                        guard.drain(..excess);
                    }
                }
            }
        }
    })
}

fn spawn(program: &Path, args: &[String]) -> std::io::Result<Child> {
    let mut attempt = 0;
    loop {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
        match cmd.spawn() {
            Ok(child) => return Ok(child),
            // A freshly written binary can still be open for writing in a
            // concurrently forked process.
            #[cfg(unix)]
            Err(e) if e.raw_os_error() == Some(ETXTBSY) && attempt + 1 < SPAWN_ATTEMPTS => {
                attempt += 1;
                thread::sleep(POLL_INTERVAL * attempt as u32);
            }
            Err(e) => return Err(e),
        }
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_with_limits(child: &mut Child, limits: &ToolLimits) -> Result<ExitStatus, AppError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if limits.is_cancelled() {
            kill(child);
            return Err(AppError::aborted());
        }
        if let Some(timeout) = limits.timeout
            && started.elapsed() >= timeout
        {
            kill(child);
            return Err(AppError::TimedOut {
                secs: timeout.as_secs().max(1),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Run `program` to completion. Non-zero exit becomes `FfmpegFailed`
/// carrying the stderr tail; spawn failure uses code -1.
pub fn run_tool(
    program: &Path,
    args: &[String],
    limits: &ToolLimits,
) -> Result<ToolOutput, AppError> {
    if limits.is_cancelled() {
        return Err(AppError::aborted());
    }
    let mut child = spawn(program, args).map_err(|e| {
        AppError::ffmpeg_failed(-1, format!("Failed to spawn {}: {}", program.display(), e))
    })?;

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let readers: Vec<_> = [
        child
            .stdout
            .take()
            .map(|s| drain(s, Arc::clone(&stdout_buf), Capture::Head(MAX_STDOUT_BYTES))),
        child
            .stderr
            .take()
            .map(|s| drain(s, Arc::clone(&stderr_buf), Capture::Tail(MAX_STDERR_BYTES))),
    ]
    .into_iter()
    .flatten()
    .collect();

    // On kill the reader threads are left to finish on their own; a
    // grandchild holding the pipe must not block the caller.
    let status = wait_with_limits(&mut child, limits)?;
    for reader in readers {
        let _ = reader.join();
    }

    let stdout = String::from_utf8_lossy(&stdout_buf.lock()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_buf.lock()).into_owned();
    if status.success() {
        Ok(ToolOutput { stdout, stderr })
    } else {
        Err(AppError::FfmpegFailed {
            code: status.code().unwrap_or(-1),
            stderr,
        })
    }
}

/// Run FFmpeg and block until it exits, times out or is cancelled.
pub fn run_ffmpeg_blocking(
    ffmpeg: &Path,
    args: &[String],
    limits: &ToolLimits,
) -> Result<(), AppError> {
    let input_arg = args
        .iter()
        .position(|a| a == "-i")
        .and_then(|i| args.get(i + 1));
    log::debug!(
        target: "clipforge::ffmpeg::runner",
        "Spawning FFmpeg: path={}, input={:?}, output={:?}",
        ffmpeg.display(),
        input_arg,
        args.last()
    );

    match run_tool(ffmpeg, args, limits) {
        Ok(_) => {
            log::debug!(
                target: "clipforge::ffmpeg::runner",
                "FFmpeg completed successfully: output={:?}",
                args.last()
            );
            Ok(())
        }
        Err(AppError::FfmpegFailed { code, stderr }) => {
            let err_preview = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .join("; ");
            log::debug!(
                target: "clipforge::ffmpeg::runner",
                "FFmpeg failed (code={}): {}",
                code,
                err_preview
            );
            Err(AppError::FfmpegFailed { code, stderr })
        }
        Err(other) => Err(other),
    }
}
