use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use translate_gateway::config::Args;
use translate_gateway::engine::EngineClient;
use translate_gateway::state::AppState;
use translate_gateway::{GENERATION_QUEUE_DEPTH, build_router, tls, with_root_path, worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let engine = EngineClient::new(&args.engine)?;

    let (queue_tx, queue_rx) = mpsc::channel(GENERATION_QUEUE_DEPTH);
    tokio::spawn(worker::generation_worker(queue_rx, engine.clone()));

    let state = Arc::new(AppState { engine, queue_tx });
    let app = with_root_path(build_router(state), args.root_path.as_deref());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .to_socket_addrs()
        .context("resolving bind address")?
        .next()
        .context("bind address resolved to nothing")?;

    info!("gateway listening on {}", addr);
    info!("forwarding to engine at {}", args.engine.engine_url);

    match tls::rustls_config(&args)? {
        Some(tls_config) => {
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
