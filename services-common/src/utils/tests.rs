use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

pub fn logger_setup() {
    let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Serves `router` on an ephemeral local port and returns its base url.
pub async fn spawn_router(router: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!("test server on {addr} stopped: {err}");
        }
    });
    Ok(format!("http://{addr}"))
}
