//! Chain management
//!
//! The `Blockchain` aggregate owns the ordered block list and the UTXO set
//! derived from it. Appending and whole-chain replacement are all-or-nothing:
//! the set only advances together with the blocks that produced it.

use crate::core::block::{now_ms, Block};
use crate::core::transaction::{Transaction, TransactionError, UnspentTxOut};
use crate::core::utxo::{process_transactions, UtxoSet};
use thiserror::Error;

/// Target seconds per block
pub const BLOCK_GENERATION_INTERVAL: u64 = 10;

/// Number of blocks between difficulty adjustments
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;

/// Allowed clock skew on block timestamps, in milliseconds
pub const TIMESTAMP_TOLERANCE_MS: u64 = 60_000;

/// Blockchain-related errors
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("invalid block structure: {0}")]
    BadStructure(String),
    #[error("bad linkage: {0}")]
    BadLinkage(String),
    #[error("timestamp {timestamp} is out of bounds")]
    BadTimestamp { timestamp: u64 },
    #[error("stored hash {0} does not match the block contents")]
    BadHash(String),
    #[error("hash {hash} does not satisfy difficulty {difficulty}")]
    BadPow { hash: String, difficulty: u32 },
    #[error("candidate genesis differs from the local genesis block")]
    BadGenesis,
    #[error("candidate chain is not strictly heavier and longer")]
    WeakerChain,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// The chain of blocks plus its derived UTXO set
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    utxo_set: UtxoSet,
}

impl Blockchain {
    /// Create a chain holding the genesis block and its UTXO set
    pub fn new() -> Self {
        let genesis = Block::genesis();
        let utxo_set = process_transactions(&genesis.transactions, &UtxoSet::new(), 0)
            .expect("genesis block carries a valid coinbase");
        Self {
            blocks: vec![genesis],
            utxo_set,
        }
    }

    /// All blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The chain tip
    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds at least the genesis block")
    }

    /// Look up a block by its hash
    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.hash == hash)
    }

    /// Look up a confirmed transaction by id
    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .find(|tx| tx.id == id)
    }

    /// The live UTXO set
    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    /// The live UTXO set as a list
    pub fn unspent_tx_outs(&self) -> Vec<UnspentTxOut> {
        self.utxo_set.values().cloned().collect()
    }

    /// Unspent outputs owned by an address
    pub fn utxos_for_address(&self, address: &str) -> Vec<UnspentTxOut> {
        self.utxo_set
            .values()
            .filter(|unspent| unspent.address == address)
            .cloned()
            .collect()
    }

    /// Total unspent amount owned by an address
    pub fn balance_of(&self, address: &str) -> u64 {
        self.utxos_for_address(address)
            .iter()
            .map(|unspent| unspent.amount)
            .sum()
    }

    /// Cumulative proof-of-work weight: `Σ 2^difficulty`
    pub fn weight(&self) -> u128 {
        chain_weight(&self.blocks)
    }

    /// Difficulty prescribed for the next block
    ///
    /// Retargets when the tip index is a nonzero multiple of the adjustment
    /// interval, otherwise carries the tip's difficulty forward.
    pub fn next_difficulty(&self) -> u32 {
        let latest = self.latest_block();
        if latest.index % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 && latest.index != 0 {
            let adjustment =
                &self.blocks[(latest.index - DIFFICULTY_ADJUSTMENT_INTERVAL) as usize];
            retarget(adjustment, latest)
        } else {
            latest.difficulty
        }
    }

    /// Validate a block against the tip and append it
    ///
    /// Check order: structure, index, parent hash, timestamp, hash,
    /// proof-of-work, then transaction semantics. Nothing mutates unless
    /// every check passes.
    pub fn add_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        validate_next_block(&block, self.latest_block(), now_ms())?;
        let next_utxo = process_transactions(&block.transactions, &self.utxo_set, block.index)?;

        log::info!(
            "appended block {} with {} transaction(s), difficulty {}",
            block.index,
            block.transactions.len(),
            block.difficulty
        );
        self.blocks.push(block);
        self.utxo_set = next_utxo;
        Ok(())
    }

    /// Replace the whole chain with a heavier, longer, fully valid candidate
    ///
    /// The candidate must share our genesis byte for byte and replay cleanly
    /// from an empty UTXO set. On success the chain and the UTXO set are both
    /// swapped; the caller is expected to prune its pool and announce the tip.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), BlockchainError> {
        let utxo_set = validate_candidate(&candidate)?;

        let candidate_weight = chain_weight(&candidate);
        if candidate_weight <= self.weight() || candidate.len() <= self.blocks.len() {
            return Err(BlockchainError::WeakerChain);
        }

        log::info!(
            "replacing chain: {} blocks (weight {}) -> {} blocks (weight {})",
            self.blocks.len(),
            self.weight(),
            candidate.len(),
            candidate_weight
        );
        self.blocks = candidate;
        self.utxo_set = utxo_set;
        Ok(())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative weight of a block list
fn chain_weight(blocks: &[Block]) -> u128 {
    blocks
        .iter()
        .map(|block| 1u128 << block.difficulty.min(127))
        .sum()
}

/// Recompute the difficulty from the block one adjustment interval back
///
/// Faster than half the expected pace raises it by one, slower than twice
/// lowers it by one (floored at zero), anything in between keeps it.
fn retarget(adjustment: &Block, latest: &Block) -> u32 {
    let expected = BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL;
    let taken = (latest.timestamp / 1000).saturating_sub(adjustment.timestamp / 1000);

    let next = if taken < expected / 2 {
        adjustment.difficulty + 1
    } else if taken > expected * 2 {
        adjustment.difficulty.saturating_sub(1)
    } else {
        adjustment.difficulty
    };
    if next != adjustment.difficulty {
        log::info!(
            "difficulty retarget: {}s taken for {} blocks (expected {}s), {} -> {}",
            taken,
            DIFFICULTY_ADJUSTMENT_INTERVAL,
            expected,
            adjustment.difficulty,
            next
        );
    }
    next
}

/// Timestamp rule: within one minute behind the parent, and at most one
/// minute ahead of the local wall clock
fn is_valid_timestamp(block: &Block, previous: &Block, now: u64) -> bool {
    previous.timestamp.saturating_sub(TIMESTAMP_TOLERANCE_MS) < block.timestamp
        && block.timestamp.saturating_sub(TIMESTAMP_TOLERANCE_MS) < now
}

fn validate_block_structure(block: &Block) -> Result<(), BlockchainError> {
    if block.hash.len() != 64 || !block.hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BlockchainError::BadStructure(
            "hash is not a 64-character hex string".to_string(),
        ));
    }
    if block.transactions.is_empty() {
        return Err(BlockchainError::BadStructure(
            "block carries no transactions".to_string(),
        ));
    }
    Ok(())
}

/// Header-level validation of a block against its parent
fn validate_next_block(block: &Block, previous: &Block, now: u64) -> Result<(), BlockchainError> {
    validate_block_structure(block)?;

    if block.index != previous.index + 1 {
        return Err(BlockchainError::BadLinkage(format!(
            "expected index {}, got {}",
            previous.index + 1,
            block.index
        )));
    }
    if block.previous_hash != previous.hash {
        return Err(BlockchainError::BadLinkage(format!(
            "parent hash {} does not match tip {}",
            block.previous_hash, previous.hash
        )));
    }
    if !is_valid_timestamp(block, previous, now) {
        return Err(BlockchainError::BadTimestamp {
            timestamp: block.timestamp,
        });
    }
    if block.hash != block.compute_hash() {
        return Err(BlockchainError::BadHash(block.hash.clone()));
    }
    if !block.satisfies_difficulty() {
        return Err(BlockchainError::BadPow {
            hash: block.hash.clone(),
            difficulty: block.difficulty,
        });
    }
    Ok(())
}

/// Validate a candidate chain by replaying it from an empty UTXO set
///
/// Block 0 must equal the local genesis literal; every later block is
/// validated against its predecessor. Returns the derived UTXO set.
fn validate_candidate(chain: &[Block]) -> Result<UtxoSet, BlockchainError> {
    if chain.first() != Some(&Block::genesis()) {
        return Err(BlockchainError::BadGenesis);
    }

    let now = now_ms();
    let mut utxo_set = UtxoSet::new();
    for (i, block) in chain.iter().enumerate() {
        if i > 0 {
            validate_next_block(block, &chain[i - 1], now)?;
        }
        utxo_set = process_transactions(&block.transactions, &utxo_set, block.index)?;
    }
    Ok(utxo_set)
}
