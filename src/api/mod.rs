//! HTTP control surface
//!
//! A thin axum binding over the node's command set.
//!
//! # Endpoints
//!
//! ## Queries
//! - `GET /blocks` - the full chain
//! - `GET /block/{hash}` - one block
//! - `GET /transaction/{id}` - a confirmed or pooled transaction
//! - `GET /unspentTransactionOutputs` - the live UTXO set
//! - `GET /myUnspentTransactionOutputs` - this wallet's unspent outputs
//! - `GET /balance` - this wallet's balance
//! - `GET /address` - this wallet's address
//! - `GET /transactionPool` - pending transactions
//! - `GET /peers` - connected peers
//!
//! ## Commands
//! - `POST /mineBlock` - mine the pool into the next block
//! - `POST /mineRawBlock` - mine caller-supplied transactions
//! - `POST /mineTransaction` - build a spend and mine it
//! - `POST /sendTransaction` - build a spend and pool it
//! - `POST /addPeer` - dial a peer
//! - `POST /stop` - terminate the node

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
