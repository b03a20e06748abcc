//! Transaction pool
//!
//! Pending transactions waiting to be mined. Admission validates against
//! the live UTXO set and rejects anything touching an output a pooled
//! transaction already spends; pruning runs after every ledger advance.

use crate::core::{validate_transaction, OutPoint, Transaction, TransactionError, TxIn, UtxoSet};
use std::collections::HashSet;
use thiserror::Error;

/// Mempool errors
#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("input {tx_out_id}:{tx_out_index} is already spent by a pooled transaction")]
    DoubleSpendInPool { tx_out_id: String, tx_out_index: u32 },
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Pool of pending transactions, in insertion order
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a transaction
    ///
    /// It must validate against the live UTXO set, and none of its inputs
    /// may collide with an input already in the pool.
    pub fn add(&mut self, tx: Transaction, utxo_set: &UtxoSet) -> Result<(), MempoolError> {
        validate_transaction(&tx, utxo_set)?;

        for pooled in &self.transactions {
            for pooled_in in &pooled.tx_ins {
                if tx
                    .tx_ins
                    .iter()
                    .any(|tx_in| tx_in.outpoint() == pooled_in.outpoint())
                {
                    return Err(MempoolError::DoubleSpendInPool {
                        tx_out_id: pooled_in.tx_out_id.clone(),
                        tx_out_index: pooled_in.tx_out_index,
                    });
                }
            }
        }

        log::info!("pooled transaction {}", tx.id);
        self.transactions.push(tx);
        Ok(())
    }

    /// Drop every pooled transaction whose inputs are no longer all unspent
    ///
    /// Called whenever a block is appended or the chain is replaced.
    pub fn update(&mut self, utxo_set: &UtxoSet) {
        let before = self.transactions.len();
        self.transactions.retain(|tx| {
            tx.tx_ins
                .iter()
                .all(|tx_in| utxo_set.contains_key(&tx_in.outpoint()))
        });
        let dropped = before - self.transactions.len();
        if dropped > 0 {
            log::info!("dropped {} stale transaction(s) from the pool", dropped);
        }
    }

    /// The pooled transactions, oldest first
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Look up a pooled transaction by id
    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// Every output currently consumed by a pooled transaction
    pub fn consumed_outpoints(&self) -> HashSet<OutPoint> {
        self.transactions
            .iter()
            .flat_map(|tx| tx.tx_ins.iter().map(TxIn::outpoint))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxOut, UnspentTxOut};
    use crate::crypto::KeyPair;

    fn funded_set(kp: &KeyPair, amount: u64) -> (UtxoSet, UnspentTxOut) {
        let unspent = UnspentTxOut {
            tx_out_id: "cd".repeat(32),
            tx_out_index: 0,
            address: kp.address(),
            amount,
        };
        let mut set = UtxoSet::new();
        set.insert(unspent.outpoint(), unspent.clone());
        (set, unspent)
    }

    fn spend(kp: &KeyPair, unspent: &UnspentTxOut, receiver: &str) -> Transaction {
        let mut tx = Transaction::new(
            vec![TxIn {
                tx_out_id: unspent.tx_out_id.clone(),
                tx_out_index: unspent.tx_out_index,
                signature: String::new(),
            }],
            vec![TxOut {
                address: receiver.to_string(),
                amount: unspent.amount,
            }],
        );
        tx.tx_ins[0].signature = kp.sign_id(&tx.id).unwrap();
        tx
    }

    #[test]
    fn test_admission() {
        let kp = KeyPair::generate();
        let receiver = KeyPair::generate();
        let (set, unspent) = funded_set(&kp, 50);
        let mut pool = Mempool::new();

        pool.add(spend(&kp, &unspent, &receiver.address()), &set)
            .unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_transaction() {
        let kp = KeyPair::generate();
        let receiver = KeyPair::generate();
        let (_, unspent) = funded_set(&kp, 50);
        let mut pool = Mempool::new();

        // the referenced output is not in the live set
        let result = pool.add(spend(&kp, &unspent, &receiver.address()), &UtxoSet::new());
        assert!(matches!(result, Err(MempoolError::Transaction(_))));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_rejects_double_spend_in_pool() {
        let kp = KeyPair::generate();
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let (set, unspent) = funded_set(&kp, 50);
        let mut pool = Mempool::new();

        pool.add(spend(&kp, &unspent, &a.address()), &set).unwrap();
        let second = spend(&kp, &unspent, &b.address());
        assert!(matches!(
            pool.add(second, &set),
            Err(MempoolError::DoubleSpendInPool { .. })
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_update_prunes_spent_inputs() {
        let kp = KeyPair::generate();
        let receiver = KeyPair::generate();
        let (set, unspent) = funded_set(&kp, 50);
        let mut pool = Mempool::new();

        pool.add(spend(&kp, &unspent, &receiver.address()), &set)
            .unwrap();

        // the referenced output disappears from the ledger
        pool.update(&UtxoSet::new());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_update_keeps_live_transactions() {
        let kp = KeyPair::generate();
        let receiver = KeyPair::generate();
        let (set, unspent) = funded_set(&kp, 50);
        let mut pool = Mempool::new();

        pool.add(spend(&kp, &unspent, &receiver.address()), &set)
            .unwrap();
        pool.update(&set);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_consumed_outpoints() {
        let kp = KeyPair::generate();
        let receiver = KeyPair::generate();
        let (set, unspent) = funded_set(&kp, 50);
        let mut pool = Mempool::new();

        assert!(pool.consumed_outpoints().is_empty());
        pool.add(spend(&kp, &unspent, &receiver.address()), &set)
            .unwrap();
        assert!(pool.consumed_outpoints().contains(&unspent.outpoint()));
    }
}
