//! Static asset HTTP server
//!
//! Serves the viewer page and its client script:
//!
//! | Path          | Response                                  |
//! |---------------|-------------------------------------------|
//! | `/`           | 301 to `/index.html`                      |
//! | `/index.html` | templated page, `text/html; charset=utf-8`|
//! | `/jsmpg.js`   | client script, `application/javascript`   |
//! | anything else | 404                                       |
//!
//! HEAD is answered by the GET handlers; axum strips the body and keeps the
//! headers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use super::assets::{render_template, StaticAssets};
use super::config::{ServerConfig, Theme};
use crate::protocol::constants::CLIENT_SCRIPT_PATH;

const HTML: &str = "text/html; charset=utf-8";
const JAVASCRIPT: &str = "application/javascript";

struct AssetState {
    assets: StaticAssets,
    theme: Theme,
    width: u16,
    height: u16,
    stream_port: u16,
    fallback_host: String,
}

/// HTTP server for the viewer page
#[derive(Clone)]
pub struct StaticAssetServer {
    state: Arc<AssetState>,
}

impl StaticAssetServer {
    /// Build from the server configuration
    ///
    /// `stream_addr` is the bound streaming listener; its port goes into the
    /// page so viewers connect to the right place.
    pub fn new(config: &ServerConfig, stream_addr: SocketAddr) -> Self {
        let fallback_host = if stream_addr.ip().is_unspecified() {
            "localhost".to_string()
        } else {
            match stream_addr {
                SocketAddr::V4(addr) => addr.ip().to_string(),
                SocketAddr::V6(addr) => format!("[{}]", addr.ip()),
            }
        };

        Self {
            state: Arc::new(AssetState {
                assets: config.assets.clone(),
                theme: config.theme.clone(),
                width: config.capture.width,
                height: config.capture.height,
                stream_port: stream_addr.port(),
                fallback_host,
            }),
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(redirect_to_index))
            .route("/index.html", get(index_page))
            .route(CLIENT_SCRIPT_PATH, get(client_script))
            .fallback(not_found)
            .with_state(Arc::clone(&self.state))
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, "HTTP server listening");
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Current time as an HTTP date (IMF-fixdate)
pub fn http_date_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Host part of a `Host` header value, without the port
fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or(host)
    }
}

/// Hostnames, IPv4 and bracketed IPv6 literals only
fn is_plain_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '[' | ']' | ':'))
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response {
    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (header::CONTENT_LENGTH, body.len().to_string()),
        (header::LAST_MODIFIED, http_date_now()),
    ];

    (status, headers, body).into_response()
}

async fn redirect_to_index() -> Response {
    let mut response = respond(StatusCode::MOVED_PERMANENTLY, HTML, String::new());
    response.headers_mut().insert(
        header::LOCATION,
        header::HeaderValue::from_static("/index.html"),
    );
    response
}

async fn index_page(State(state): State<Arc<AssetState>>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(host_without_port)
        .filter(|h| is_plain_host(h))
        .unwrap_or(state.fallback_host.as_str());

    let vars = [
        ("ADDRESS", format!("{}:{}", host, state.stream_port)),
        ("WIDTH", state.width.to_string()),
        ("HEIGHT", state.height.to_string()),
        ("COLOR", state.theme.color.clone()),
        ("BGCOLOR", state.theme.bgcolor.clone()),
    ];

    let body = render_template(state.assets.index_template(), &vars);
    respond(StatusCode::OK, HTML, body)
}

async fn client_script(State(state): State<Arc<AssetState>>) -> Response {
    respond(
        StatusCode::OK,
        JAVASCRIPT,
        state.assets.client_script().to_string(),
    )
}

async fn not_found() -> Response {
    tracing::debug!("Asset not found");
    respond(StatusCode::NOT_FOUND, HTML, "File not found".to_string())
}
