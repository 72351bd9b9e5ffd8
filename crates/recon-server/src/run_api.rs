//! Job Run API Module
//!
//! `POST /run` starts the recon script for a domain and task and streams its
//! output back as `text/plain` while it runs.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use recon_executor::{
    BridgeConfig, BridgeError, LaunchOptions, ProcessHandle, ProcessLauncher, StreamingBridge,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::error::ApiResult;
use crate::validation::{RunRequest, ValidationError};

// ===== Application State =====

/// Application state for the Run API
#[derive(Debug, Clone)]
pub struct RunApiAppState {
    pub launcher: Arc<ProcessLauncher>,
    pub bridge: StreamingBridge,
    pub strict_arguments: bool,
    pub stream_buffer: usize,
}

impl RunApiAppState {
    pub fn new(config: &RunnerConfig) -> Self {
        let launcher = ProcessLauncher::new(config.script_path.clone()).with_options(LaunchOptions {
            working_dir: config.working_dir.clone(),
        });
        let bridge = StreamingBridge::new(BridgeConfig {
            timeout: config.job_timeout(),
        });

        Self {
            launcher: Arc::new(launcher),
            bridge,
            strict_arguments: config.strict_arguments,
            stream_buffer: config.stream_buffer.max(1),
        }
    }
}

// ===== Routes =====

/// Create job run routes
pub fn run_api_routes(state: RunApiAppState) -> Router {
    Router::new()
        .route("/run", post(run_job_handler))
        .with_state(state)
}

// ===== API Handlers =====

pub async fn run_job_handler(
    State(state): State<RunApiAppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let request = match payload {
        Ok(Json(body)) => RunRequest::from_json(&body)?,
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "Unreadable job request body");
            return Err(ValidationError::MissingFields.into());
        }
    };

    if state.strict_arguments {
        request.check_format()?;
    }

    let handle = state.launcher.launch(&request.args())?;
    info!(
        job_id = %handle.job_id(),
        domain = %request.domain,
        task = %request.task,
        "Streaming job output"
    );

    let (tx, rx) = mpsc::channel(state.stream_buffer);
    tokio::spawn(relay(state.bridge.clone(), handle, tx));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

/// Run the bridge for one job. Read failures abort the response body so the
/// client sees a truncated stream rather than a clean end.
async fn relay(
    bridge: StreamingBridge,
    handle: ProcessHandle,
    mut tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
) {
    let job_id = handle.job_id().to_string();

    match bridge.run(handle, &mut tx).await {
        Ok(outcome) => {
            info!(
                job_id = %job_id,
                exit_code = ?outcome.exit_code,
                lines = outcome.lines_forwarded,
                success = outcome.succeeded(),
                "Job stream finished"
            );
        }
        Err(BridgeError::ChannelClosed) => {
            warn!(job_id = %job_id, "Client disconnected, job stopped");
        }
        Err(e @ BridgeError::Timeout(_)) => {
            warn!(job_id = %job_id, error_type = e.error_type(), error = %e, "Job stream finished");
        }
        Err(e) => {
            error!(job_id = %job_id, error_type = e.error_type(), error = %e, "Job stream aborted");
            let _ = tx.send(Err(std::io::Error::other(e.to_string()))).await;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use std::path::{Path, PathBuf};
    use tower::ServiceExt;

    fn state_for(script_path: PathBuf) -> RunApiAppState {
        RunApiAppState::new(&RunnerConfig {
            script_path,
            ..RunnerConfig::default()
        })
    }

    fn post_run(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/run")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_state_from_config() {
        let state = RunApiAppState::new(&RunnerConfig {
            script_path: PathBuf::from("/opt/recon.sh"),
            strict_arguments: true,
            stream_buffer: 4,
            ..RunnerConfig::default()
        });

        assert_eq!(state.launcher.command(), Path::new("/opt/recon.sh"));
        assert!(state.strict_arguments);
        assert_eq!(state.stream_buffer, 4);
    }

    #[tokio::test]
    async fn test_malformed_body_is_missing_fields() {
        let app = run_api_routes(state_for(PathBuf::from("/bin/true")));

        let response = app.oneshot(post_run("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            serde_json::json!({"error": "Domain and task are required!"})
        );
    }

    #[tokio::test]
    async fn test_strict_arguments_rejects_flag_like_domain() {
        let mut state = state_for(PathBuf::from("/bin/echo"));
        state.strict_arguments = true;
        let app = run_api_routes(state);

        let response = app
            .oneshot(post_run(r#"{"domain": "--help", "task": "whois"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_streams_echoed_arguments() {
        let app = run_api_routes(state_for(PathBuf::from("/bin/echo")));

        let response = app
            .oneshot(post_run(r#"{"domain": "example.com", "task": "whois"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert_eq!(&body[..], b"example.com whois\n");
    }
}
