//! Command executor - runs one command line as a child process

use bytes::Bytes;
use relay_shared::{CommandLine, EmptyCommand};
use std::borrow::Cow;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Outcome of one command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Combined output, or diagnostic text when the command failed
    pub output: Bytes,
    /// True only when the process started and exited with status 0
    pub success: bool,
}

impl ExecutionResult {
    fn failure(text: String) -> Self {
        Self {
            output: Bytes::from(text),
            success: false,
        }
    }

    /// Output decoded as UTF-8 (lossy)
    pub fn output_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

/// Runs commands received over the control channel
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    /// Create a new command executor
    pub fn new() -> Self {
        Self
    }

    /// Parse raw message bytes and execute them. Empty input spawns nothing.
    pub async fn execute_raw(&self, raw: &[u8]) -> Result<ExecutionResult, EmptyCommand> {
        let command = CommandLine::try_parse(raw)?;
        Ok(self.execute(&command).await)
    }

    /// Execute a command and wait for it to finish.
    ///
    /// Never fails: launch errors and non-zero exits are folded into the
    /// returned output as text.
    pub async fn execute(&self, command: &CommandLine) -> ExecutionResult {
        info!(program = %command.program, args = command.args.len(), "Executing command");
        let start = Instant::now();

        let mut child = match Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %command.program, "Failed to start command: {}", e);
                return ExecutionResult::failure(format!(
                    "failed to start {}: {}",
                    command.program, e
                ));
            }
        };
        debug!("Spawned process with PID: {:?}", child.id());

        let output = match capture_combined(&mut child).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to read output of {}: {}", command.program, e);
                return ExecutionResult::failure(format!(
                    "failed to read output of {}: {}",
                    command.program, e
                ));
            }
        };

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return ExecutionResult::failure(format!(
                    "failed to wait for {}: {}",
                    command.program, e
                ));
            }
        };

        info!(
            program = %command.program,
            %status,
            bytes = output.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Command finished"
        );

        if status.success() {
            return ExecutionResult {
                output: Bytes::from(output),
                success: true,
            };
        }

        // The captured output is discarded, only the status is reported
        debug!(discarded = output.len(), "Replacing output with exit status");
        ExecutionResult::failure(status_text(status))
    }
}

/// Describe a non-zero exit the way the collector expects it: `exit status N`,
/// or the terminating signal when there is no exit code
fn status_text(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {code}"),
        None => status.to_string(),
    }
}

/// Drain stdout and stderr into one buffer in the order chunks arrive
async fn capture_combined(child: &mut Child) -> io::Result<Vec<u8>> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    let mut combined = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            n = read_chunk(&mut stdout, &mut out_buf), if stdout.is_some() => {
                match n? {
                    0 => stdout = None,
                    n => combined.extend_from_slice(&out_buf[..n]),
                }
            }
            n = read_chunk(&mut stderr, &mut err_buf), if stderr.is_some() => {
                match n? {
                    0 => stderr = None,
                    n => combined.extend_from_slice(&err_buf[..n]),
                }
            }
        }
    }

    Ok(combined)
}

async fn read_chunk<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => Ok(0),
    }
}
