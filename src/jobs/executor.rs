use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use super::command::CommandArgs;
use super::registry::OutputWriter;
use crate::errors::{FanoutError, Result};

/// Default external tool.
pub const DEFAULT_TOOL: &str = "multi-gitter";

/// Longest line kept from the tool's output; the rest of a longer line is dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Abstraction over spawning the external tool, for testability.
/// Real implementation: `ProcessExecutor`. Tests use recording doubles.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Start the tool with `args` and stream its output into `output`.
    ///
    /// Returns as soon as the process is running. The writer must be closed
    /// once the process has exited and all of its output has been pushed.
    async fn launch(&self, args: CommandArgs, output: OutputWriter) -> Result<()>;
}

/// Runs the external tool as a child process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    tool: String,
}

impl ProcessExecutor {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn launch(&self, args: CommandArgs, output: OutputWriter) -> Result<()> {
        let spawn_failed = |source| FanoutError::SpawnFailed {
            tool: self.tool.clone(),
            source,
        };

        let mut child = Command::new(&self.tool)
            .args(args.as_slice())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            if let Err(e) = child.kill().await {
                tracing::warn!(tool = %self.tool, error = %e, "failed to kill process without pipes");
            }
            return Err(spawn_failed(std::io::Error::other(
                "output pipes were not attached",
            )));
        };

        tracing::debug!(tool = %self.tool, pid = ?child.id(), "process started");
        tokio::spawn(supervise(self.tool.clone(), child, stdout, stderr, output));
        Ok(())
    }
}

/// Drive both readers and the process wait, then close the queue.
///
/// The close happens here and nowhere else, after all three have finished.
async fn supervise(
    tool: String,
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    output: OutputWriter,
) {
    let (stdout_lines, stderr_lines, status) = tokio::join!(
        pump_lines(BufReader::new(stdout), &output, "stdout"),
        pump_lines(BufReader::new(stderr), &output, "stderr"),
        child.wait(),
    );

    match status {
        Ok(status) if status.success() => {
            tracing::info!(tool = %tool, stdout_lines, stderr_lines, "process finished");
        }
        Ok(status) => {
            let err = FanoutError::ProcessRuntime(describe_exit(status));
            tracing::warn!(tool = %tool, stdout_lines, stderr_lines, error = %err, "process failed");
        }
        Err(e) => {
            let err = FanoutError::ProcessRuntime(e.to_string());
            tracing::warn!(tool = %tool, error = %err, "failed to wait for process");
        }
    }

    output.close();
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => status.to_string(),
    }
}

/// Copy lines from one pipe into the queue, preserving their order.
///
/// Invalid UTF-8 is replaced rather than ending the stream. Lines longer than
/// `MAX_LINE_BYTES` are cut short. If the consumer has gone away the pipe is
/// still read to EOF so the process never blocks on a full pipe.
async fn pump_lines<R>(mut reader: R, output: &OutputWriter, stream: &'static str) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut pushed = 0;
    let mut consumer_gone = false;
    loop {
        match read_capped_line(&mut reader, &mut buf, MAX_LINE_BYTES).await {
            Ok(None) => break,
            Ok(Some(truncated)) => {
                if consumer_gone {
                    continue;
                }
                if truncated {
                    tracing::warn!(stream, max_bytes = MAX_LINE_BYTES, "output line truncated");
                }
                let line = trim_line_ending(&buf);
                if output.push(String::from_utf8_lossy(line).into_owned()).await {
                    pushed += 1;
                } else {
                    tracing::debug!(stream, "output queue dropped; discarding remaining lines");
                    consumer_gone = true;
                }
            }
            Err(e) => {
                let err = FanoutError::ProcessRuntime(e.to_string());
                tracing::warn!(stream, error = %err, "error reading pipe");
                break;
            }
        }
    }
    pushed
}

/// Read one line of at most `max` bytes into `buf`, skipping the remainder of
/// a longer line up to its newline.
///
/// Returns `None` at EOF, otherwise whether bytes were skipped.
async fn read_capped_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader).take(max as u64).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.ends_with(b"\n") || read < max {
        return Ok(Some(false));
    }

    let mut skipped = 0;
    let mut rest = Vec::new();
    loop {
        rest.clear();
        let n = (&mut *reader).take(max as u64).read_until(b'\n', &mut rest).await?;
        skipped += trim_line_ending(&rest).len();
        if n == 0 || rest.ends_with(b"\n") {
            break;
        }
    }
    Ok(Some(skipped > 0))
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
