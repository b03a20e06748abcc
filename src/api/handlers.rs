//! HTTP handlers for the node's control commands

use crate::core::{Block, Transaction, UnspentTxOut};
use crate::network::{Node, NodeError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Shared state for the API handlers
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<Node>,
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub balance: u64,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub address: String,
}

#[derive(Deserialize)]
pub struct SendTransactionRequest {
    pub address: String,
    pub amount: u64,
}

#[derive(Deserialize)]
pub struct MineRawBlockRequest {
    pub data: Option<Vec<Transaction>>,
}

#[derive(Deserialize)]
pub struct AddPeerRequest {
    pub peer: String,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub msg: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// Map a node error to an HTTP status: client input problems are 400,
/// everything else is 500
fn error_response(error: NodeError) -> (StatusCode, Json<ApiError>) {
    let status = if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Query handlers
// ============================================================================

/// GET /blocks - the full chain
pub async fn get_blocks(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.node.blocks().await)
}

/// GET /block/{hash} - one block, or null
pub async fn get_block_by_hash(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> Json<Option<Block>> {
    Json(state.node.block_by_hash(&hash).await)
}

/// GET /transaction/{id} - a confirmed or pooled transaction, or null
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Json<Option<Transaction>> {
    Json(state.node.transaction_by_id(&id).await)
}

/// GET /unspentTransactionOutputs - the live UTXO set
pub async fn get_unspent_tx_outs(State(state): State<ApiState>) -> Json<Vec<UnspentTxOut>> {
    Json(state.node.unspent_tx_outs().await)
}

/// GET /myUnspentTransactionOutputs - this wallet's unspent outputs
pub async fn get_my_unspent_tx_outs(State(state): State<ApiState>) -> Json<Vec<UnspentTxOut>> {
    Json(state.node.my_unspent_tx_outs().await)
}

/// GET /balance - this wallet's balance
pub async fn get_balance(State(state): State<ApiState>) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        balance: state.node.balance().await,
    })
}

/// GET /address - this wallet's address
pub async fn get_address(State(state): State<ApiState>) -> Json<AddressResponse> {
    Json(AddressResponse {
        address: state.node.address(),
    })
}

/// GET /transactionPool - the pending transactions
pub async fn get_transaction_pool(State(state): State<ApiState>) -> Json<Vec<Transaction>> {
    Json(state.node.pool_transactions().await)
}

/// GET /peers - connected peers as host:port
pub async fn get_peers(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.node.peers().await)
}

// ============================================================================
// Command handlers
// ============================================================================

/// POST /mineBlock - mine the pool into the next block
pub async fn mine_block(State(state): State<ApiState>) -> ApiResult<Block> {
    state
        .node
        .mine_block()
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /mineRawBlock - mine a block with caller-supplied transactions
pub async fn mine_raw_block(
    State(state): State<ApiState>,
    Json(request): Json<MineRawBlockRequest>,
) -> ApiResult<Block> {
    let Some(transactions) = request.data else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: "data parameter is missing".to_string(),
            }),
        ));
    };
    state
        .node
        .mine_raw_block(transactions)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /mineTransaction - build a spend and mine it immediately
pub async fn mine_transaction(
    State(state): State<ApiState>,
    Json(request): Json<SendTransactionRequest>,
) -> ApiResult<Block> {
    state
        .node
        .mine_transaction(&request.address, request.amount)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /sendTransaction - build a spend and pool it
pub async fn send_transaction(
    State(state): State<ApiState>,
    Json(request): Json<SendTransactionRequest>,
) -> ApiResult<Transaction> {
    state
        .node
        .send_transaction(&request.address, request.amount)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /addPeer - dial a peer
pub async fn add_peer(
    State(state): State<ApiState>,
    Json(request): Json<AddPeerRequest>,
) -> ApiResult<AckResponse> {
    state
        .node
        .connect_to(&request.peer)
        .await
        .map(|()| {
            Json(AckResponse {
                msg: format!("connecting to {}", request.peer),
            })
        })
        .map_err(error_response)
}

/// POST /stop - acknowledge, then terminate the process
pub async fn stop() -> Json<AckResponse> {
    log::info!("stop requested, shutting down");
    tokio::spawn(async {
        // let the response flush first
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::process::exit(0);
    });
    Json(AckResponse {
        msg: "stopping server".to_string(),
    })
}
