//! minicoin: a minimal proof-of-work cryptocurrency node
//!
//! This crate provides an educational blockchain featuring:
//! - An unspent-transaction-output (UTXO) ledger
//! - ECDSA-signed transfers (secp256k1, DER signatures)
//! - Proof-of-work mining with difficulty retargeting
//! - A transaction pool pruned against the live UTXO set
//! - Gossip over persistent peer connections with longest-chain
//!   reconciliation
//! - An HTTP control surface for mining, sending, and inspecting state
//!
//! # Example
//!
//! ```no_run
//! use minicoin::crypto::KeyPair;
//! use minicoin::network::Node;
//! use minicoin::wallet::Wallet;
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let wallet = Wallet::from_key_pair(KeyPair::generate());
//! let node = Arc::new(Node::new(wallet, 5000));
//! tokio::spawn(node.clone().start());
//!
//! let block = node.mine_block().await.unwrap();
//! println!("mined block {} with hash {}", block.index, block.hash);
//! println!("balance: {}", node.balance().await);
//! # }
//! ```

pub mod api;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod network;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Block, Blockchain, Transaction, TxIn, TxOut, UnspentTxOut, COINBASE_AMOUNT};
pub use crypto::KeyPair;
pub use mining::Mempool;
pub use network::{Message, Node, PeerManager};
pub use wallet::Wallet;
