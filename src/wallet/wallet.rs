//! Wallet: key file handling and transaction building
//!
//! The wallet owns the node's key pair, loaded from a single-line hex file
//! (created on first start), and builds signed spend transactions out of
//! the owner's unspent outputs.

use crate::core::{Transaction, TxIn, TxOut, UnspentTxOut, UtxoSet};
use crate::crypto::{KeyError, KeyPair};
use crate::mining::Mempool;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The node's wallet
pub struct Wallet {
    key_pair: KeyPair,
}

impl Wallet {
    /// Wrap an existing key pair
    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }

    /// Load the private key from `path`, generating the file if absent
    ///
    /// The file holds one line of hex encoding the secp256k1 scalar.
    pub fn load_or_create(path: &Path) -> Result<Self, WalletError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let key_pair = KeyPair::from_private_key_hex(contents.trim())?;
            log::info!("loaded wallet key from {}", path.display());
            return Ok(Self { key_pair });
        }

        let key_pair = KeyPair::generate();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, key_pair.private_key_hex())?;
        log::info!("created new wallet key at {}", path.display());
        Ok(Self { key_pair })
    }

    /// The wallet's address (uncompressed public key hex)
    pub fn address(&self) -> String {
        self.key_pair.address()
    }

    /// Unspent outputs owned by this wallet
    pub fn utxos(&self, utxo_set: &UtxoSet) -> Vec<UnspentTxOut> {
        let address = self.address();
        utxo_set
            .values()
            .filter(|unspent| unspent.address == address)
            .cloned()
            .collect()
    }

    /// Total unspent amount owned by this wallet
    pub fn balance(&self, utxo_set: &UtxoSet) -> u64 {
        self.utxos(utxo_set).iter().map(|u| u.amount).sum()
    }

    /// Build and sign a transaction sending `amount` to `receiver`
    ///
    /// Outputs already consumed by a pooled transaction are off limits, so
    /// two spends built back to back cannot double-spend the same coin.
    /// Selection is greedy; a change output is added only when nonzero.
    pub fn create_transaction(
        &self,
        receiver: &str,
        amount: u64,
        pool: &Mempool,
        utxo_set: &UtxoSet,
    ) -> Result<Transaction, WalletError> {
        let own_address = self.address();
        let pending = pool.consumed_outpoints();
        let spendable: Vec<UnspentTxOut> = self
            .utxos(utxo_set)
            .into_iter()
            .filter(|unspent| !pending.contains(&unspent.outpoint()))
            .collect();

        let mut selected: Vec<UnspentTxOut> = Vec::new();
        let mut accumulated: u64 = 0;
        for unspent in &spendable {
            if accumulated >= amount {
                break;
            }
            accumulated += unspent.amount;
            selected.push(unspent.clone());
        }
        if accumulated < amount {
            return Err(WalletError::InsufficientFunds {
                have: spendable.iter().map(|u| u.amount).sum(),
                need: amount,
            });
        }

        let tx_ins: Vec<TxIn> = selected
            .iter()
            .map(|unspent| TxIn {
                tx_out_id: unspent.tx_out_id.clone(),
                tx_out_index: unspent.tx_out_index,
                signature: String::new(),
            })
            .collect();

        let mut tx_outs = vec![TxOut {
            address: receiver.to_string(),
            amount,
        }];
        let change = accumulated - amount;
        if change > 0 {
            tx_outs.push(TxOut {
                address: own_address,
                amount: change,
            });
        }

        let mut tx = Transaction::new(tx_ins, tx_outs);
        let id = tx.id.clone();
        for tx_in in tx.tx_ins.iter_mut() {
            tx_in.signature = self.key_pair.sign_id(&id)?;
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validate_transaction;

    fn wallet() -> Wallet {
        Wallet::from_key_pair(KeyPair::generate())
    }

    fn fund(set: &mut UtxoSet, address: &str, tx_out_id: &str, amount: u64) {
        let unspent = UnspentTxOut {
            tx_out_id: tx_out_id.to_string(),
            tx_out_index: 0,
            address: address.to_string(),
            amount,
        };
        set.insert(unspent.outpoint(), unspent);
    }

    #[test]
    fn test_load_or_create_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("private_key");

        let created = Wallet::load_or_create(&path).unwrap();
        assert!(path.exists());
        let loaded = Wallet::load_or_create(&path).unwrap();
        assert_eq!(created.address(), loaded.address());
    }

    #[test]
    fn test_spend_with_change() {
        let w = wallet();
        let receiver = wallet();
        let mut set = UtxoSet::new();
        fund(&mut set, &w.address(), &"ab".repeat(32), 50);

        let tx = w
            .create_transaction(&receiver.address(), 30, &Mempool::new(), &set)
            .unwrap();

        assert_eq!(tx.tx_outs.len(), 2);
        assert_eq!(tx.tx_outs[0].address, receiver.address());
        assert_eq!(tx.tx_outs[0].amount, 30);
        assert_eq!(tx.tx_outs[1].address, w.address());
        assert_eq!(tx.tx_outs[1].amount, 20);
        assert!(validate_transaction(&tx, &set).is_ok());
    }

    #[test]
    fn test_exact_spend_has_no_change() {
        let w = wallet();
        let receiver = wallet();
        let mut set = UtxoSet::new();
        fund(&mut set, &w.address(), &"ab".repeat(32), 50);

        let tx = w
            .create_transaction(&receiver.address(), 50, &Mempool::new(), &set)
            .unwrap();
        assert_eq!(tx.tx_outs.len(), 1);
        assert!(validate_transaction(&tx, &set).is_ok());
    }

    #[test]
    fn test_selects_multiple_outputs() {
        let w = wallet();
        let receiver = wallet();
        let mut set = UtxoSet::new();
        fund(&mut set, &w.address(), &"ab".repeat(32), 50);
        fund(&mut set, &w.address(), &"cd".repeat(32), 50);

        let tx = w
            .create_transaction(&receiver.address(), 80, &Mempool::new(), &set)
            .unwrap();
        assert_eq!(tx.tx_ins.len(), 2);
        assert!(validate_transaction(&tx, &set).is_ok());
    }

    #[test]
    fn test_insufficient_funds() {
        let w = wallet();
        let receiver = wallet();
        let mut set = UtxoSet::new();
        fund(&mut set, &w.address(), &"ab".repeat(32), 50);

        let result = w.create_transaction(&receiver.address(), 10_000, &Mempool::new(), &set);
        assert!(matches!(
            result,
            Err(WalletError::InsufficientFunds {
                have: 50,
                need: 10_000
            })
        ));
    }

    #[test]
    fn test_pending_outputs_excluded() {
        let w = wallet();
        let receiver = wallet();
        let mut set = UtxoSet::new();
        fund(&mut set, &w.address(), &"ab".repeat(32), 50);

        let mut pool = Mempool::new();
        let first = w
            .create_transaction(&receiver.address(), 30, &pool, &set)
            .unwrap();
        pool.add(first, &set).unwrap();

        // the only output is tied up by the pooled spend
        let second = w.create_transaction(&receiver.address(), 10, &pool, &set);
        assert!(matches!(
            second,
            Err(WalletError::InsufficientFunds { have: 0, need: 10 })
        ));
    }
}
