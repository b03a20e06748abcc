//! minicoin node binary
//!
//! Starts the wallet, the chain, the peer listener, and the HTTP control
//! surface, in that order. Configuration comes from flags or the
//! `HTTP_PORT`, `P2P_PORT`, and `PRIVATE_KEY` environment variables.

use clap::Parser;
use minicoin::api::{create_router, ApiState};
use minicoin::network::Node;
use minicoin::wallet::Wallet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "minicoin")]
#[command(version)]
#[command(about = "A minimal proof-of-work cryptocurrency node", long_about = None)]
struct Cli {
    /// Port for the HTTP control API
    #[arg(long, env = "HTTP_PORT", default_value_t = 3000)]
    http_port: u16,

    /// Port for peer-to-peer gossip
    #[arg(long, env = "P2P_PORT", default_value_t = 5000)]
    p2p_port: u16,

    /// Path to the wallet private key file (created on first start)
    #[arg(long, env = "PRIVATE_KEY", default_value = "wallet/private_key")]
    key_file: PathBuf,

    /// Peer to dial on startup (host:port); may be given multiple times
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let wallet = Wallet::load_or_create(&cli.key_file)?;
    log::info!("wallet address: {}", wallet.address());

    let node = Arc::new(Node::new(wallet, cli.p2p_port));

    let p2p = node.clone();
    tokio::spawn(async move {
        if let Err(e) = p2p.start().await {
            log::error!("p2p node failed: {}", e);
        }
    });

    for peer in &cli.peers {
        if let Err(e) = node.connect_to(peer).await {
            log::warn!("failed to connect to {}: {}", peer, e);
        }
    }

    let app = create_router(ApiState { node });
    let addr = format!("0.0.0.0:{}", cli.http_port);
    log::info!("http api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
