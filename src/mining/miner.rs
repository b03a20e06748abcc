//! Block assembly and mining
//!
//! The miner turns a chain snapshot and a transaction list into a mined
//! block. Snapshots are taken under a read lock, the proof search runs
//! without any lock, and the result goes back through the normal append
//! validation, so a stale snapshot simply fails to attach.

use crate::core::{now_ms, Block, Blockchain, Transaction};
use std::time::Instant;

/// Snapshot of the chain tip used to assemble the next block
#[derive(Debug, Clone)]
pub struct MiningTemplate {
    pub index: u64,
    pub previous_hash: String,
    pub difficulty: u32,
    pub transactions: Vec<Transaction>,
}

impl MiningTemplate {
    /// Template for a block carrying the given transactions verbatim
    pub fn raw(chain: &Blockchain, transactions: Vec<Transaction>) -> Self {
        let latest = chain.latest_block();
        Self {
            index: latest.index + 1,
            previous_hash: latest.hash.clone(),
            difficulty: chain.next_difficulty(),
            transactions,
        }
    }

    /// Template with a coinbase for `reward_address` prepended
    pub fn with_coinbase(
        chain: &Blockchain,
        reward_address: &str,
        transactions: Vec<Transaction>,
    ) -> Self {
        let latest = chain.latest_block();
        let coinbase = Transaction::coinbase(reward_address, latest.index + 1);
        let mut all = vec![coinbase];
        all.extend(transactions);
        Self::raw(chain, all)
    }

    /// Run the proof-of-work search
    ///
    /// The timestamp is captured once, before the search begins. This is a
    /// synchronous CPU loop; callers must not hold chain locks across it.
    pub fn mine(self) -> Block {
        let started = Instant::now();
        log::info!(
            "mining block {} at difficulty {}...",
            self.index,
            self.difficulty
        );

        let block = Block::find(
            self.index,
            self.previous_hash,
            now_ms(),
            self.transactions,
            self.difficulty,
        );

        log::info!(
            "mined block {} in {}ms ({} proofs tried)",
            block.index,
            started.elapsed().as_millis(),
            block.proof + 1
        );
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_mine_with_coinbase() {
        let mut chain = Blockchain::new();
        let miner = KeyPair::generate();

        let block = MiningTemplate::with_coinbase(&chain, &miner.address(), vec![]).mine();
        assert_eq!(block.index, 1);
        assert_eq!(block.transactions.len(), 1);
        assert!(block.satisfies_difficulty());

        chain.add_block(block).unwrap();
        assert_eq!(chain.balance_of(&miner.address()), 50);
    }

    #[test]
    fn test_raw_template_leaves_transactions_alone() {
        let chain = Blockchain::new();
        let miner = KeyPair::generate();
        let coinbase = Transaction::coinbase(&miner.address(), 1);

        let template = MiningTemplate::raw(&chain, vec![coinbase.clone()]);
        assert_eq!(template.transactions, vec![coinbase]);
        assert_eq!(template.previous_hash, chain.latest_block().hash);
    }

    #[test]
    fn test_stale_template_fails_to_attach() {
        let mut chain = Blockchain::new();
        let miner = KeyPair::generate();

        let stale = MiningTemplate::with_coinbase(&chain, &miner.address(), vec![]);
        let first = MiningTemplate::with_coinbase(&chain, &miner.address(), vec![]).mine();
        chain.add_block(first).unwrap();

        // the snapshot no longer matches the tip
        assert!(chain.add_block(stale.mine()).is_err());
        assert_eq!(chain.latest_block().index, 1);
    }
}
