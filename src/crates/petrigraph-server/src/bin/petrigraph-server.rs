//! petrigraph server binary.
//!
//! Standalone REST service exposing the build/validate/simulate/project
//! pipeline.

use clap::Parser;
use petrigraph_server::create_router;
use std::net::SocketAddr;

#[derive(Debug, Parser)]
#[command(name = "petrigraph-server", about = "Petri-net workflow verification service")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "PETRIGRAPH_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PETRIGRAPH_PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let app = create_router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "petrigraph server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown requested");
}
