// src/server/http.rs

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::server::livereload::client_script;

/// Bind the preview server and serve `base_dir` in the background.
///
/// Binding happens before this returns, so a port clash is reported to the
/// caller. Returns the bound address.
pub async fn start_preview(
    host: &str,
    port: u16,
    base_dir: PathBuf,
    reload_port: u16,
) -> Result<SocketAddr> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding preview server on {host}:{port}"))?;
    let addr = listener.local_addr()?;

    let router = router(base_dir.clone(), reload_port);

    info!(url = %format!("http://{addr}/"), dir = ?base_dir, "preview server started");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("preview server stopped: {e}");
        }
    });

    Ok(addr)
}

fn router(base_dir: PathBuf, reload_port: u16) -> Router {
    let script = client_script(reload_port);

    Router::new()
        .route(
            "/livereload.js",
            get(move || {
                let script = script.clone();
                async move { ([(header::CONTENT_TYPE, "application/javascript")], script).into_response() }
            }),
        )
        .fallback_service(ServeDir::new(base_dir))
}
