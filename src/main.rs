//! Signaling server binary entry point.
//!
//! Starts the WebSocket signaling server on the port given by `PORT`
//! (default `3002`), and exits promptly on `SIGINT`/`SIGTERM` (§6).

use std::net::SocketAddr;

use drpl_signal::SignalingServer;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 3002;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse().unwrap_or_else(|e| {
        eprintln!("invalid port '{port}': {e}");
        std::process::exit(1);
    });

    let server = match SignalingServer::bind(addr).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("server error: {e}");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, exiting");
            std::process::exit(0);
        }
    }
}

/// Resolve when either `SIGINT` or `SIGTERM` is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
