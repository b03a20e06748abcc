//! Transaction model for the UTXO ledger
//!
//! Transactions spend previous outputs and create new ones. The id is a
//! SHA-256 digest over the inputs' references and the outputs, so input
//! signatures can sign the id without covering themselves.

use crate::crypto::{is_valid_address, sha256_hex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reward issued by each block's coinbase transaction
pub const COINBASE_AMOUNT: u64 = 50;

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error("invalid signature on input {index} of transaction {id}")]
    InvalidSignature { id: String, index: usize },
    #[error("referenced output {tx_out_id}:{tx_out_index} is not unspent")]
    UnknownUtxo { tx_out_id: String, tx_out_index: u32 },
    #[error("input total {input} does not equal output total {output}")]
    ConservationViolation { input: u64, output: u64 },
    #[error("invalid coinbase: {0}")]
    BadCoinbase(String),
    #[error("output {tx_out_id}:{tx_out_index} is spent twice within one block")]
    DoubleSpendInBlock { tx_out_id: String, tx_out_index: u32 },
}

/// Reference to a transaction output, the identity key of a coin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub tx_out_id: String,
    pub tx_out_index: u32,
}

/// Transaction input: a reference to a previous output plus a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    pub tx_out_id: String,
    pub tx_out_index: u32,
    /// Hex DER signature over the transaction id; empty on coinbase inputs
    pub signature: String,
}

impl TxIn {
    /// The output this input consumes
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_out_id: self.tx_out_id.clone(),
            tx_out_index: self.tx_out_index,
        }
    }
}

/// Transaction output: an amount locked to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    pub address: String,
    pub amount: u64,
}

/// An unspent transaction output in the live set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentTxOut {
    pub tx_out_id: String,
    pub tx_out_index: u32,
    pub address: String,
    pub amount: u64,
}

impl UnspentTxOut {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_out_id: self.tx_out_id.clone(),
            tx_out_index: self.tx_out_index,
        }
    }
}

/// A ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
}

impl Transaction {
    /// Create a transaction from inputs and outputs, deriving its id
    pub fn new(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Self {
        let mut tx = Self {
            id: String::new(),
            tx_ins,
            tx_outs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Create the coinbase transaction for a block
    ///
    /// One synthetic input carrying the block index, one reward output.
    pub fn coinbase(address: &str, block_index: u64) -> Self {
        let tx_ins = vec![TxIn {
            tx_out_id: String::new(),
            tx_out_index: block_index as u32,
            signature: String::new(),
        }];
        let tx_outs = vec![TxOut {
            address: address.to_string(),
            amount: COINBASE_AMOUNT,
        }];
        Self::new(tx_ins, tx_outs)
    }

    /// Derive the transaction id
    ///
    /// SHA-256 over the concatenation of `{txOutId}{txOutIndex}` per input
    /// followed by `{address}{amount}` per output. Signatures are excluded.
    pub fn compute_id(&self) -> String {
        let ins: String = self
            .tx_ins
            .iter()
            .map(|tx_in| format!("{}{}", tx_in.tx_out_id, tx_in.tx_out_index))
            .collect();
        let outs: String = self
            .tx_outs
            .iter()
            .map(|tx_out| format!("{}{}", tx_out.address, tx_out.amount))
            .collect();
        sha256_hex(&format!("{}{}", ins, outs))
    }

    /// Structural validation: output addresses and amounts
    ///
    /// Field presence and scalar kinds are enforced at parse time; what
    /// remains is the address predicate and amount positivity.
    pub fn validate_structure(&self) -> Result<(), TransactionError> {
        for tx_out in &self.tx_outs {
            if !is_valid_address(&tx_out.address) {
                return Err(TransactionError::Malformed(format!(
                    "invalid output address: {}",
                    tx_out.address
                )));
            }
            if tx_out.amount == 0 {
                return Err(TransactionError::Malformed(
                    "output amount must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Sum of output amounts
    pub fn total_output(&self) -> u64 {
        self.tx_outs.iter().map(|tx_out| tx_out.amount).sum()
    }
}
