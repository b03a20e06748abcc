//! Block structure and proof-of-work search
//!
//! A block's hash covers its index, parentage, timestamp, transactions,
//! difficulty, and proof. Transactions enter the hash through the
//! concatenation of their ids.

use crate::core::transaction::{Transaction, TxIn, TxOut, COINBASE_AMOUNT};
use crate::crypto::{hash_matches_difficulty, sha256_hex};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Timestamp of the fixed genesis block, milliseconds since epoch
const GENESIS_TIMESTAMP: u64 = 1734667274522;

/// Hash of the fixed genesis block
///
/// A protocol literal: the genesis block predates this chain's hash
/// serialization and its hash is compared, never recomputed.
const GENESIS_HASH: &str = "45dcbece109d098f2764e371d20e29c5ef3dcc10d985c6bc8d563d1fbdc82d9e";

/// Id of the genesis coinbase transaction
const GENESIS_TX_ID: &str = "e655f6a5f26dc9b4cac6e46f52336428287759cf81ef5ff10854f69d68f43fa3";

/// Address funded by the genesis coinbase
pub const GENESIS_ADDRESS: &str = "04bfcab8722991ae774db48f934ca79cfb7dd991229153b9f732ba5334aafcd8e7266e47076996b55a14bf9913ee3145ce0cfc1372ada8ada74bd287450313534a";

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    /// Milliseconds since epoch, captured when the proof search began
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    /// Parent hash; empty for genesis
    pub previous_hash: String,
    pub hash: String,
    /// Required leading zero bits in the binary expansion of `hash`
    pub difficulty: u32,
    /// The nonce varied during mining
    pub proof: u64,
}

impl Block {
    /// The fixed genesis block, byte-identical across peers
    pub fn genesis() -> Self {
        let coinbase = Transaction {
            id: GENESIS_TX_ID.to_string(),
            tx_ins: vec![TxIn {
                tx_out_id: String::new(),
                tx_out_index: 0,
                signature: String::new(),
            }],
            tx_outs: vec![TxOut {
                address: GENESIS_ADDRESS.to_string(),
                amount: COINBASE_AMOUNT,
            }],
        };
        Self {
            index: 0,
            timestamp: GENESIS_TIMESTAMP,
            transactions: vec![coinbase],
            previous_hash: String::new(),
            hash: GENESIS_HASH.to_string(),
            difficulty: 0,
            proof: 0,
        }
    }

    /// Mine a block: search proofs from 0 until the hash meets `difficulty`
    pub fn find(
        index: u64,
        previous_hash: String,
        timestamp: u64,
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Self {
        let mut proof: u64 = 0;
        loop {
            let hash = hash_for(
                index,
                &previous_hash,
                timestamp,
                &transactions,
                difficulty,
                proof,
            );
            if hash_matches_difficulty(&hash, difficulty) {
                return Self {
                    index,
                    timestamp,
                    transactions,
                    previous_hash,
                    hash,
                    difficulty,
                    proof,
                };
            }
            proof += 1;
        }
    }

    /// Recompute this block's hash from its contents
    pub fn compute_hash(&self) -> String {
        hash_for(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            self.difficulty,
            self.proof,
        )
    }

    /// Check that the stored hash satisfies the stated difficulty
    pub fn satisfies_difficulty(&self) -> bool {
        hash_matches_difficulty(&self.hash, self.difficulty)
    }
}

/// Serialize a transaction list for hashing: the ids, concatenated
fn serialize_transactions(transactions: &[Transaction]) -> String {
    transactions.iter().map(|tx| tx.id.as_str()).collect()
}

/// The block hash: SHA-256 over the ASCII concatenation of the fields
pub fn hash_for(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    transactions: &[Transaction],
    difficulty: u32,
    proof: u64,
) -> String {
    sha256_hex(&format!(
        "{}{}{}{}{}{}",
        index,
        previous_hash,
        timestamp,
        serialize_transactions(transactions),
        difficulty,
        proof
    ))
}

/// Current wall-clock time in milliseconds since epoch
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_genesis_literal() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.timestamp, GENESIS_TIMESTAMP);
        assert_eq!(genesis.previous_hash, "");
        assert_eq!(genesis.hash, GENESIS_HASH);
        assert_eq!(genesis.difficulty, 0);
        assert_eq!(genesis.proof, 0);
        assert_eq!(genesis.transactions.len(), 1);
        assert_eq!(genesis.transactions[0].id, GENESIS_TX_ID);
        // two constructions are byte-identical
        assert_eq!(Block::genesis(), Block::genesis());
    }

    #[test]
    fn test_find_meets_difficulty() {
        let kp = KeyPair::generate();
        let coinbase = Transaction::coinbase(&kp.address(), 1);
        let block = Block::find(1, GENESIS_HASH.to_string(), now_ms(), vec![coinbase], 4);

        assert!(block.satisfies_difficulty());
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn test_difficulty_zero_accepts_first_proof() {
        let kp = KeyPair::generate();
        let coinbase = Transaction::coinbase(&kp.address(), 1);
        let block = Block::find(1, GENESIS_HASH.to_string(), now_ms(), vec![coinbase], 0);
        assert_eq!(block.proof, 0);
    }

    #[test]
    fn test_hash_binds_transactions() {
        let kp = KeyPair::generate();
        let coinbase = Transaction::coinbase(&kp.address(), 1);
        let mut block = Block::find(1, GENESIS_HASH.to_string(), now_ms(), vec![coinbase], 0);

        block.transactions[0].id = "00".repeat(32);
        assert_ne!(block.hash, block.compute_hash());
    }

    #[test]
    fn test_hash_binds_proof() {
        let kp = KeyPair::generate();
        let coinbase = Transaction::coinbase(&kp.address(), 1);
        let mut block = Block::find(1, GENESIS_HASH.to_string(), now_ms(), vec![coinbase], 0);

        block.proof += 1;
        assert_ne!(block.hash, block.compute_hash());
    }

    #[test]
    fn test_json_round_trip() {
        let block = Block::genesis();
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"previousHash\""));
        let parsed: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, block);
    }
}
