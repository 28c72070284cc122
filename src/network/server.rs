use std::{future::Future, sync::Arc};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::{AppState, ConnectionConfig, ConnectionManager};
use crate::config::ServerSettings;

/// Слушает `settings.listen_address` до завершения `shutdown`.
pub async fn run_tcp_server<F>(
    settings: &ServerSettings,
    state: AppState,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let addr = settings.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    serve(listener, ConnectionConfig::from(settings), state, shutdown).await
}

/// Цикл приёма на уже привязанном listener-е.
///
/// После `shutdown` новые соединения не принимаются, все подписки
/// закрываются, а активные соединения получают время на завершение.
pub async fn serve<F>(
    listener: TcpListener,
    config: ConnectionConfig,
    state: AppState,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let shutdown_timeout = config.shutdown_timeout;
    let manager = Arc::new(ConnectionManager::new(config));
    info!(
        addr = %listener.local_addr()?,
        max_connections = manager.config().max_connections,
        "listening"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, addr)) => {
                    let manager = manager.clone();
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = manager.handle_connection(socket, addr, state).await {
                            debug!(client = %addr, error = %e, "connection task finished with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            },
        }
    }

    drop(listener);
    manager.shutdown();
    let closed = state.registry.close_all();
    info!(closed_subscriptions = closed, "stopped accepting connections");

    if let Err(e) = manager.wait_for_shutdown(shutdown_timeout).await {
        warn!(error = %e, "forcing shutdown");
    }
    Ok(())
}
