//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model, signed inputs)
//! - Blocks (with proof of work)
//! - The chain aggregate and its derived UTXO set

pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod utxo;

pub use block::{now_ms, Block, GENESIS_ADDRESS};
pub use blockchain::{
    Blockchain, BlockchainError, BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL,
    TIMESTAMP_TOLERANCE_MS,
};
pub use transaction::{
    OutPoint, Transaction, TransactionError, TxIn, TxOut, UnspentTxOut, COINBASE_AMOUNT,
};
pub use utxo::{process_transactions, validate_coinbase, validate_transaction, UtxoSet};
