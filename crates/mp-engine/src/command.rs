//! Builder for executing external tool commands with timeout support.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of trailing stderr lines quoted in failure messages.
const STDERR_TAIL_LINES: usize = 5;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use mp_engine::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> mp_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run the process with the given working directory.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`mp_core::Error::Engine`] if spawning fails, the process
    /// times out, or it exits with a non-zero status (the message quotes the
    /// tail of stderr).
    pub async fn execute(&self) -> mp_core::Result<ToolOutput> {
        self.execute_with_stderr_callback(|_| {}).await
    }

    /// Execute the command, handing every stderr line to `on_line` as it
    /// arrives. Used to follow ffmpeg's `-progress pipe:2` stream.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
    ) -> mp_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| mp_core::Error::engine(&program_name, format!("failed to spawn: {e}")))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let read_stdout = async {
                let mut buf = Vec::new();
                if let Some(mut out) = stdout {
                    out.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(buf)
            };

            let read_stderr = async {
                let mut collected = String::new();
                if let Some(err) = stderr {
                    let mut segments = BufReader::new(err).split(b'\n');
                    while let Some(segment) = segments.next_segment().await? {
                        let line = String::from_utf8_lossy(&segment);
                        let line = line.trim_end_matches('\r');
                        on_line(line);
                        collected.push_str(line);
                        collected.push('\n');
                    }
                }
                Ok::<_, std::io::Error>(collected)
            };

            let (out, err) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok((status, stdout, stderr))) => {
                let tool_output = ToolOutput {
                    status,
                    stdout: String::from_utf8_lossy(&stdout).to_string(),
                    stderr,
                };

                if !status.success() {
                    return Err(mp_core::Error::engine(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            status,
                            stderr_tail(&tool_output.stderr)
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(mp_core::Error::engine(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // The child is killed when dropped (`kill_on_drop`).
            Err(_elapsed) => Err(mp_core::Error::engine(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

/// Last few meaningful stderr lines, joined with `" | "`. ffmpeg
/// `-progress` key=value lines are skipped.
fn stderr_tail(stderr: &str) -> String {
    let mut tail: VecDeque<&str> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    for line in stderr.lines() {
        let line = line.trim();
        if line.is_empty() || is_progress_line(line) {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join(" | ")
}

fn is_progress_line(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}
