//! Recon Executor
//!
//! Launches the external recon script for a job and relays its output.
//!
//! - [`process`] spawns the child and exposes its stdout lines, stderr
//!   content and exit code.
//! - [`bridge`] forwards stdout line by line into a [`LineSink`] and appends
//!   the stderr content when the script fails.

pub mod bridge;
pub mod process;

pub use bridge::{BridgeConfig, BridgeError, BridgeOutcome, LineSink, StreamingBridge};
pub use process::{JobId, LaunchOptions, ProcessError, ProcessHandle, ProcessLauncher};
