use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use super::router::{AppState, create_router};
use crate::broker::Connector;

/// Serves the relay on `listener` until `shutdown` resolves.
pub async fn serve<C, F>(listener: TcpListener, state: AppState<C>, shutdown: F) -> io::Result<()>
where
    C: Connector,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("chat relay listening on http://{addr}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Binds `addr` and spawns the relay in the background, returning the bound
/// address. The server runs until the runtime shuts down.
pub async fn spawn<C: Connector>(addr: &str, state: AppState<C>) -> io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = serve(listener, state, std::future::pending()).await {
            tracing::error!(error = %e, "chat relay stopped");
        }
    });
    Ok(local)
}
