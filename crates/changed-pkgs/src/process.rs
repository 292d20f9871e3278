use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::ChangedPkgsError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared flag used to abort in-flight child processes.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
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

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Renders a command the way a user would type it.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Runs `cmd` to completion, killing it if `token` is cancelled first.
///
/// A non-zero exit status is not an error here; see [`run_checked`].
pub fn run_command(
    mut cmd: Command,
    token: &CancellationToken,
) -> Result<CommandOutput, ChangedPkgsError> {
    if token.is_cancelled() {
        return Err(ChangedPkgsError::Cancelled);
    }

    let command = describe(&cmd);
    tracing::trace!(%command, "spawning");
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ChangedPkgsError::Command {
            command: command.clone(),
            message: format!("failed to start: {err}"),
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if token.is_cancelled() {
            tracing::debug!(%command, "cancelled; killing child process");
            let _ = child.kill();
            let _ = child.wait();
            // readers finish on their own once every holder of the pipes exits
            drop(stdout);
            drop(stderr);
            return Err(ChangedPkgsError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    };
    // the interrupt that cancelled us may also have been what ended the child
    if token.is_cancelled() {
        return Err(ChangedPkgsError::Cancelled);
    }

    Ok(CommandOutput {
        status,
        stdout: collect(stdout, &command)?,
        stderr: collect(stderr, &command)?,
    })
}

/// Like [`run_command`], but fails when the command exits unsuccessfully. The error
/// carries the command line and its stderr.
pub fn run_checked(cmd: Command, token: &CancellationToken) -> Result<Vec<u8>, ChangedPkgsError> {
    let command = describe(&cmd);
    let output = run_command(cmd, token)?;
    if !output.status.success() {
        return Err(ChangedPkgsError::Command {
            command,
            message: format!("{}\nstderr: {}", output.status, output.stderr_lossy()),
        });
    }
    Ok(output.stdout)
}

fn drain<R: Read + Send + 'static>(
    source: Option<R>,
) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    source.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    command: &str,
) -> Result<Vec<u8>, ChangedPkgsError> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| ChangedPkgsError::Command {
                command: command.to_string(),
                message: "output reader panicked".into(),
            })?
            .map_err(ChangedPkgsError::from),
    }
}
