//! Output streaming module
//!
//! Relays a running job's stdout to an output channel one line at a time and
//! reports a failed exit in-band as a trailing `Error: <stderr>` line.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::process::{ProcessError, ProcessHandle};

/// Destination for relayed output, usually an HTTP response body
#[async_trait::async_trait]
pub trait LineSink: Send {
    /// Deliver one chunk to the client without waiting for more output
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), BridgeError>;
}

/// Feeds a channel whose receiver backs a streaming response body
#[async_trait::async_trait]
impl LineSink for mpsc::Sender<Result<Bytes, std::io::Error>> {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), BridgeError> {
        self.send(Ok(chunk))
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Upper bound on a whole job, covering stdout reads and the final wait.
    /// `None` waits for the script indefinitely.
    pub timeout: Option<Duration>,
}

/// Summary of a job that ran to completion
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOutcome {
    pub job_id: String,
    pub lines_forwarded: u64,
    pub exit_code: Option<i32>,
}

impl BridgeOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to read job output: {0}")]
    Read(#[source] ProcessError),

    #[error("Failed to wait for job: {0}")]
    Wait(#[source] ProcessError),

    #[error("Output channel closed")]
    ChannelClosed,

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),
}

impl BridgeError {
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::Read(_) => "read_failure",
            BridgeError::Wait(_) => "wait_failure",
            BridgeError::ChannelClosed => "channel_closed",
            BridgeError::Timeout(_) => "timeout",
        }
    }
}

/// Drives one [`ProcessHandle`] to completion
#[derive(Debug, Clone, Default)]
pub struct StreamingBridge {
    config: BridgeConfig,
}

impl StreamingBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Forward every stdout line followed by a single `\n`, then wait for the
    /// exit code and append `Error: <stderr>` unless it is zero.
    ///
    /// Nothing is written after the error line. Output already delivered is
    /// never retracted when this returns an error.
    pub async fn run<S>(
        &self,
        mut handle: ProcessHandle,
        sink: &mut S,
    ) -> Result<BridgeOutcome, BridgeError>
    where
        S: LineSink + ?Sized,
    {
        let deadline = self.config.timeout.map(|timeout| Instant::now() + timeout);
        let mut lines_forwarded = 0u64;

        loop {
            let next = bounded(deadline, handle.next_line()).await;
            let next = match next {
                Some(next) => next.map_err(BridgeError::Read)?,
                None => return self.expire(handle, sink).await,
            };
            let Some(mut line) = next else {
                break;
            };

            line.push(b'\n');
            sink.write_chunk(Bytes::from(line)).await?;
            lines_forwarded += 1;
        }

        let exit_code = bounded(deadline, handle.wait()).await;
        let exit_code = match exit_code {
            Some(exit_code) => exit_code.map_err(BridgeError::Wait)?,
            None => return self.expire(handle, sink).await,
        };

        if exit_code != Some(0) {
            let stderr = bounded(deadline, handle.read_stderr()).await;
            let stderr = match stderr {
                Some(stderr) => stderr.map_err(BridgeError::Read)?,
                None => return self.expire(handle, sink).await,
            };
            warn!(
                job_id = %handle.job_id(),
                exit_code = ?exit_code,
                stderr_bytes = stderr.len(),
                "Job failed"
            );
            sink.write_chunk(error_line(&stderr)).await?;
        } else {
            info!(job_id = %handle.job_id(), lines_forwarded, "Job completed");
        }

        Ok(BridgeOutcome {
            job_id: handle.job_id().to_string(),
            lines_forwarded,
            exit_code,
        })
    }

    async fn expire<S>(
        &self,
        mut handle: ProcessHandle,
        sink: &mut S,
    ) -> Result<BridgeOutcome, BridgeError>
    where
        S: LineSink + ?Sized,
    {
        let timeout = self.config.timeout.unwrap_or_default();
        warn!(job_id = %handle.job_id(), timeout = ?timeout, "Job exceeded its time limit");

        if let Err(e) = handle.kill().await {
            error!(job_id = %handle.job_id(), error = %e, "Failed to kill timed out job");
        }

        let line = format!("Error: job timed out after {timeout:?}\n");
        sink.write_chunk(Bytes::from(line)).await?;
        Err(BridgeError::Timeout(timeout))
    }
}

async fn bounded<F: Future>(deadline: Option<Instant>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

fn error_line(stderr: &str) -> Bytes {
    let detail = stderr.trim_end_matches(['\r', '\n']);
    debug!(detail_len = detail.len(), "Appending stderr to response");
    Bytes::from(format!("Error: {detail}\n"))
}
