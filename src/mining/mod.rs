//! Mining and the pending-transaction pool
//!
//! Provides the mempool (admission and pruning against the live UTXO set)
//! and block assembly with the proof-of-work search.

pub mod mempool;
pub mod miner;

pub use mempool::{Mempool, MempoolError};
pub use miner::MiningTemplate;
