//! Process management module
//!
//! Spawns a recon job as a child process and exposes its output streams.
//! Stdout is read lazily line by line. Stderr is drained in the background
//! from the moment of launch so a noisy script cannot stall on a full pipe
//! while its stdout is still being relayed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Job identifier
pub type JobId = String;

/// Options applied to every process started by a launcher
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Working directory for the child; inherits the server's when unset
    pub working_dir: Option<PathBuf>,
}

/// Starts the configured executable with positional arguments
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    command: PathBuf,
    options: LaunchOptions,
}

impl ProcessLauncher {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            options: LaunchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LaunchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Spawn the command immediately with `args` as separate argv entries.
    ///
    /// Must be called from within a tokio runtime. The child is killed if the
    /// returned handle is dropped before it exits.
    pub fn launch(&self, args: &[String]) -> Result<ProcessHandle, ProcessError> {
        let job_id = Uuid::new_v4().to_string();
        let command_display = self.command.display().to_string();

        let mut command = Command::new(&self.command);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.options.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| {
            error!(job_id = %job_id, command = %command_display, error = %source, "Failed to spawn job");
            ProcessError::Launch {
                command: command_display.clone(),
                source,
            }
        })?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::MissingPipe("stderr"))?;

        info!(job_id = %job_id, pid = ?pid, command = %command_display, args = ?args, "Job spawned");

        Ok(ProcessHandle {
            job_id,
            args: args.to_vec(),
            pid,
            child,
            stdout: BufReader::new(stdout),
            stderr: StderrCapture::Draining(tokio::spawn(drain(stderr))),
        })
    }
}

async fn drain(mut stderr: ChildStderr) -> std::io::Result<Vec<u8>> {
    let mut content = Vec::new();
    stderr.read_to_end(&mut content).await?;
    Ok(content)
}

#[derive(Debug)]
enum StderrCapture {
    Draining(JoinHandle<std::io::Result<Vec<u8>>>),
    Captured(String),
}

/// One running external command, owned by the request that started it
#[derive(Debug)]
pub struct ProcessHandle {
    job_id: JobId,
    args: Vec<String>,
    pid: Option<u32>,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: StderrCapture,
}

impl ProcessHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next stdout line without its terminator, or `None` once stdout closes.
    ///
    /// The trailing `\n` (and a `\r` before it) is removed; every other byte
    /// is returned untouched, so output that is not valid UTF-8 still flows.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>, ProcessError> {
        let mut line = Vec::new();
        let read = self.stdout.read_until(b'\n', &mut line).await?;
        if read == 0 {
            debug!(job_id = %self.job_id, "End of stdout");
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Complete stderr content, decoded lossily as UTF-8.
    ///
    /// Resolves once the child has closed stderr; later calls return the
    /// same content.
    pub async fn read_stderr(&mut self) -> Result<String, ProcessError> {
        let task = match std::mem::replace(
            &mut self.stderr,
            StderrCapture::Captured(String::new()),
        ) {
            StderrCapture::Captured(content) => {
                self.stderr = StderrCapture::Captured(content.clone());
                return Ok(content);
            }
            StderrCapture::Draining(task) => task,
        };

        let bytes = task
            .await
            .map_err(|e| ProcessError::StderrCapture(e.to_string()))??;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        self.stderr = StderrCapture::Captured(content.clone());
        Ok(content)
    }

    /// Wait for the child to exit. `None` means it was terminated by a signal.
    pub async fn wait(&mut self) -> Result<Option<i32>, ProcessError> {
        let status = self.child.wait().await?;
        debug!(job_id = %self.job_id, status = %status, "Job exited");
        Ok(status.code())
    }

    pub async fn kill(&mut self) -> Result<(), ProcessError> {
        warn!(job_id = %self.job_id, pid = ?self.pid, "Killing job");
        self.child
            .kill()
            .await
            .map_err(|e| ProcessError::KillFailed(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Child process has no piped {0}")]
    MissingPipe(&'static str),

    #[error("Kill failed: {0}")]
    KillFailed(String),

    #[error("Stderr capture failed: {0}")]
    StderrCapture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> (ProcessLauncher, Vec<String>) {
        (
            ProcessLauncher::new("/bin/sh"),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    async fn collect_lines(handle: &mut ProcessHandle) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        while let Some(line) = handle.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_launch_missing_executable() {
        let launcher = ProcessLauncher::new("/definitely/not/here/recon.sh");
        let err = launcher
            .launch(&["example.com".to_string(), "whois".to_string()])
            .unwrap_err();

        match &err {
            ProcessError::Launch { command, source } => {
                assert_eq!(command, "/definitely/not/here/recon.sh");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("/definitely/not/here/recon.sh"));
    }

    #[tokio::test]
    async fn test_lines_and_exit_code() {
        let (launcher, args) = shell("printf 'a\\nb\\n'");
        let mut handle = launcher.launch(&args).unwrap();

        assert!(!handle.job_id().is_empty());
        assert_eq!(handle.args(), args.as_slice());
        assert_eq!(collect_lines(&mut handle).await, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(handle.wait().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_line_terminators_are_stripped() {
        let (launcher, args) = shell("printf 'crlf\\r\\n\\nlast'");
        let mut handle = launcher.launch(&args).unwrap();

        assert_eq!(
            collect_lines(&mut handle).await,
            vec![b"crlf".to_vec(), Vec::new(), b"last".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_non_utf8_bytes_pass_through() {
        let (launcher, args) = shell("printf '\\377ok\\n'");
        let mut handle = launcher.launch(&args).unwrap();

        assert_eq!(collect_lines(&mut handle).await, vec![vec![0xff, b'o', b'k']]);
    }

    #[tokio::test]
    async fn test_stderr_and_failure_code() {
        let (launcher, args) = shell("echo partial; echo boom >&2; exit 3");
        let mut handle = launcher.launch(&args).unwrap();

        assert_eq!(collect_lines(&mut handle).await, vec![b"partial".to_vec()]);
        assert_eq!(handle.wait().await.unwrap(), Some(3));
        assert_eq!(handle.read_stderr().await.unwrap(), "boom\n");
        // cached after the first read
        assert_eq!(handle.read_stderr().await.unwrap(), "boom\n");
    }

    #[tokio::test]
    async fn test_positional_args_are_not_shell_expanded() {
        let launcher = ProcessLauncher::new("/bin/echo");
        let args = vec!["example.com; rm -rf /".to_string(), "$(whoami)".to_string()];
        let mut handle = launcher.launch(&args).unwrap();

        assert_eq!(
            collect_lines(&mut handle).await,
            vec![b"example.com; rm -rf / $(whoami)".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_working_dir_option() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let launcher = ProcessLauncher::new("/bin/sh").with_options(LaunchOptions {
            working_dir: Some(dir.path().to_path_buf()),
        });
        let mut handle = launcher
            .launch(&["-c".to_string(), "pwd -P".to_string()])
            .unwrap();

        let lines = collect_lines(&mut handle).await;
        assert_eq!(lines, vec![expected.to_string_lossy().as_bytes().to_vec()]);
    }

    #[tokio::test]
    async fn test_kill_running_job() {
        let (launcher, args) = shell("exec sleep 30");
        let mut handle = launcher.launch(&args).unwrap();
        assert!(handle.pid().is_some());

        handle.kill().await.unwrap();
        assert_eq!(handle.wait().await.unwrap(), None);
    }
}
