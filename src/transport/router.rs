//! HTTP routes.
//!
//! - `GET /` serves the chat page.
//! - `GET /static/{type}/{filename}` serves an asset from the static root.
//! - `GET /socket` upgrades to a WebSocket and hands it to the connection
//!   handler.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path as UrlPath, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::StreamExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use super::handler::{Relay, handle_connection};
use crate::broker::Connector;

const HOME_PAGE: &str = "html/home.html";

pub struct AppState<C: Connector> {
    pub relay: Relay<C>,
    pub static_root: Arc<PathBuf>,
}

impl<C: Connector> AppState<C> {
    pub fn new(relay: Relay<C>, static_root: impl Into<PathBuf>) -> Self {
        Self {
            relay,
            static_root: Arc::new(static_root.into()),
        }
    }
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
            static_root: Arc::clone(&self.static_root),
        }
    }
}

pub fn create_router<C: Connector>(state: AppState<C>) -> Router {
    Router::new()
        .route("/", get(home::<C>))
        .route("/static/:type/:filename", get(asset::<C>))
        .route("/socket", get(socket::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home<C: Connector>(State(state): State<AppState<C>>, request: Request) -> Response {
    serve_file(state.static_root.join(HOME_PAGE), request).await
}

async fn asset<C: Connector>(
    State(state): State<AppState<C>>,
    UrlPath((kind, filename)): UrlPath<(String, String)>,
    request: Request,
) -> Response {
    match confine(&state.static_root, &kind, &filename) {
        Some(path) => serve_file(path, request).await,
        None => {
            tracing::warn!(%kind, %filename, "rejected static path");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn socket<C: Connector>(ws: WebSocketUpgrade, State(state): State<AppState<C>>) -> Response {
    ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            handle_connection(state.relay, sink, stream).await;
        })
}

async fn serve_file(path: PathBuf, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Joins `kind/filename` onto `root`, accepting only single plain path
/// segments so the result cannot leave `root`.
pub fn confine(root: &Path, kind: &str, filename: &str) -> Option<PathBuf> {
    fn is_plain_segment(segment: &str) -> bool {
        let mut components = Path::new(segment).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !segment.contains(['/', '\\'])
    }

    (is_plain_segment(kind) && is_plain_segment(filename)).then(|| root.join(kind).join(filename))
}

