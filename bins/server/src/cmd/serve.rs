use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use frame_engine::FrameRegistry;
use ingest::run_session;
use weir_api::Limits;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("weir-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Shared state ---
    let registry = Arc::new(FrameRegistry::new());
    let token = CancellationToken::new();

    // --- Bind ingest listener ---
    let listener = TcpListener::bind(&config.listen)
        .map_err(|e| ServerError::Bind { addr: config.listen.clone(), source: e })?;
    tracing::info!(listen = %config.listen, "ingest listening");

    // Blocking acceptor thread → connection channel
    let (conn_tx, mut conn_rx) = mpsc::channel::<TcpStream>(config.conn_buffer);
    tokio::task::spawn_blocking(move || {
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    tracing::info!(peer = %addr, "client connected");
                    if conn_tx.blocking_send(stream).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    });

    // Connection receiver: one blocking session task per connection.
    // Sessions are strictly sequential over their own stream; only the
    // registry is shared.
    let sess_registry = registry.clone();
    let sess_limits = config.limits.clone();
    let conn_token = token.clone();
    let conn_handle: JoinHandle<()> = tokio::spawn(async move {
        loop {
            tokio::select! {
                stream = conn_rx.recv() => {
                    match stream {
                        Some(stream) => {
                            let registry = sess_registry.clone();
                            let limits = sess_limits.clone();
                            tokio::task::spawn_blocking(move || {
                                handle_connection(stream, &registry, &limits);
                            });
                        }
                        None => break,
                    }
                }
                _ = conn_token.cancelled() => break,
            }
        }
    });

    tracing::info!("server ready");

    // --- Wait for Ctrl+C ---
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");

    // Signal tasks to stop cooperatively, give in-flight sessions a
    // moment to reach a command boundary, then abort what remains.
    token.cancel();
    tokio::time::sleep(Duration::from_secs(5)).await;
    if !conn_handle.is_finished() {
        conn_handle.abort();
    }
    let _ = conn_handle.await;

    // Report what this node holds.
    for key in registry.frames() {
        if let Some(frame) = registry.get(&key) {
            let s = frame.summary();
            tracing::info!(
                frame = %key,
                columns = s.columns,
                chunks = s.chunks,
                rows = s.rows,
                finalized = s.finalized,
                "frame state at shutdown"
            );
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// One session over one connection, blocking until the peer closes the
/// stream or a fatal decode error tears it down.
fn handle_connection(stream: TcpStream, registry: &FrameRegistry, limits: &Limits) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    let reader = match stream.try_clone() {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(%peer, error = %e, "cannot clone stream");
            return;
        }
    };
    match run_session(&peer, BufReader::new(reader), stream, registry, limits) {
        Ok(()) => tracing::info!(%peer, "session closed"),
        Err(e) => tracing::error!(%peer, error = ?e, "session error, disconnecting"),
    }
}
