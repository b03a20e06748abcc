//! HTTP route configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Build the control-surface router
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // chain queries
        .route("/blocks", get(handlers::get_blocks))
        .route("/block/{hash}", get(handlers::get_block_by_hash))
        .route("/transaction/{id}", get(handlers::get_transaction))
        .route(
            "/unspentTransactionOutputs",
            get(handlers::get_unspent_tx_outs),
        )
        .route(
            "/myUnspentTransactionOutputs",
            get(handlers::get_my_unspent_tx_outs),
        )
        // wallet queries
        .route("/balance", get(handlers::get_balance))
        .route("/address", get(handlers::get_address))
        // pool and peers
        .route("/transactionPool", get(handlers::get_transaction_pool))
        .route("/peers", get(handlers::get_peers))
        // commands
        .route("/mineBlock", post(handlers::mine_block))
        .route("/mineRawBlock", post(handlers::mine_raw_block))
        .route("/mineTransaction", post(handlers::mine_transaction))
        .route("/sendTransaction", post(handlers::send_transaction))
        .route("/addPeer", post(handlers::add_peer))
        .route("/stop", post(handlers::stop))
        .with_state(state)
        .layer(cors)
}
