//! Test helpers for driving the router against fake recon scripts

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{Request, Response};
use recon_server::{AppConfig, create_api_router};
use tower::ServiceExt;

/// Write an executable `/bin/sh` script into `dir`
pub fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("recon.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");

    let mut permissions = std::fs::metadata(&path)
        .expect("Failed to stat script")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("Failed to chmod script");
    path
}

/// Config pointing the runner at `script_path`
pub fn config_for(script_path: PathBuf) -> AppConfig {
    let mut config = AppConfig::default();
    config.runner.script_path = script_path;
    config
}

pub fn run_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/run")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Send one `POST /run` through a fresh router
pub async fn post_run(config: &AppConfig, body: &str) -> Response<Body> {
    create_api_router(config)
        .oneshot(run_request(body))
        .await
        .expect("Router is infallible")
}

/// Read the whole response body as text
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 4 * 1024 * 1024)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
