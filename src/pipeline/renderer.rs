//! Invocation of the external "render URL to file" tool.
//!
//! [`CommandRenderer`] runs `<program> [prefix..] <url> <output> [args..]` as a
//! child process with piped output and a hard deadline. On unix the child
//! leads its own process group, and the whole group (browser included) is
//! killed once the render ends, by exit or by deadline; `kill_on_drop` covers
//! every other exit path for the direct child. Failures never escape as
//! errors: they become a [`RenderOutcome`].

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ArchiveError;

/// Deadline for the `--version` check.
const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to keep draining stdout/stderr once the child has exited.
/// Grandchildren (the headless browser) may hold the pipes open.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Raw result of one renderer invocation, before the output is inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Exit code, `None` if the process could not be run or was killed.
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Spawn or wait failure.
    pub error_text: Option<String>,
    /// Set when the deadline passed and the process was killed.
    pub timed_out_after: Option<Duration>,
}

impl RenderOutcome {
    pub fn exited(code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_status: Some(code),
            stdout,
            stderr,
            ..Self::default()
        }
    }

    pub fn failed_to_run(error: impl Into<String>) -> Self {
        Self {
            error_text: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn timed_out(deadline: Duration) -> Self {
        Self {
            error_text: Some(format!("timed out after {}s", deadline.as_secs_f64())),
            timed_out_after: Some(deadline),
            ..Self::default()
        }
    }

    pub fn is_clean_exit(&self) -> bool {
        self.exit_status == Some(0) && self.error_text.is_none() && self.timed_out_after.is_none()
    }

    /// Best available description of what went wrong: the spawn error, then
    /// stderr, then stdout.
    pub fn error_message(&self) -> String {
        if let Some(err) = &self.error_text {
            return err.clone();
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        "unknown error".to_string()
    }
}

/// Something that can turn a URL into an HTML file on disk.
pub trait Renderer: Send + Sync + 'static {
    /// One-shot health check. Returns the tool's version banner.
    fn check(&self) -> impl Future<Output = Result<String, ArchiveError>> + Send;

    /// Renders `url` into `output_path`, giving up after `deadline`.
    fn render(
        &self,
        url: &str,
        output_path: &Path,
        deadline: Duration,
    ) -> impl Future<Output = RenderOutcome> + Send;
}

/// Renderer backed by an external executable such as `single-file`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    prefix_args: Vec<String>,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            args,
        }
    }

    /// Arguments placed before the URL, e.g. `npx` with `single-file`.
    pub fn with_prefix_args(mut self, prefix_args: Vec<String>) -> Self {
        self.prefix_args = prefix_args;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.prefix_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

impl Renderer for CommandRenderer {
    async fn check(&self) -> Result<String, ArchiveError> {
        let mut command = self.command();
        command.arg("--version");

        let output = match timeout(CHECK_TIMEOUT, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ArchiveError::ToolUnavailable(format!("{}: {e}", self.program)));
            }
            Err(_) => {
                return Err(ArchiveError::ToolUnavailable(format!(
                    "{}: --version did not answer within {}s",
                    self.program,
                    CHECK_TIMEOUT.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArchiveError::ToolUnavailable(format!(
                "{}: --version exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn render(&self, url: &str, output_path: &Path, deadline: Duration) -> RenderOutcome {
        let mut command = self.command();
        command.arg(url).arg(output_path).args(&self.args);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return RenderOutcome::failed_to_run(format!("{}: {e}", self.program)),
        };

        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let pgid = child.id();

        match timeout(deadline, child.wait()).await {
            Ok(Ok(status)) => {
                // Stragglers left by a clean exit must not write after verification.
                kill_process_group(pgid);
                let stdout = drain(stdout_task).await;
                let stderr = drain(stderr_task).await;
                debug!(url, %status, "renderer exited");
                // A signal-terminated child has no code.
                RenderOutcome::exited(status.code().unwrap_or(-1), stdout, stderr)
            }
            Ok(Err(e)) => {
                kill_process_group(pgid);
                stdout_task.abort();
                stderr_task.abort();
                RenderOutcome::failed_to_run(format!("failed to wait for renderer: {e}"))
            }
            Err(_) => {
                kill_process_group(pgid);
                if let Err(e) = child.kill().await {
                    warn!(url, error = %e, "failed to kill timed-out renderer");
                }
                stdout_task.abort();
                stderr_task.abort();
                RenderOutcome::timed_out(deadline)
            }
        }
    }
}

/// Sends SIGKILL to every process in the renderer's group.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    let Some(pgid) = pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // ESRCH just means the group is already gone.
    let _ = unsafe { libc::killpg(pgid, libc::SIGKILL) };
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let Some(mut stream) = stream else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn drain(task: JoinHandle<String>) -> String {
    let abort = task.abort_handle();
    match timeout(DRAIN_GRACE, task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            abort.abort();
            String::new()
        }
    }
}
