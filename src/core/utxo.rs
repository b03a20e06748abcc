//! Semantic transaction validation and UTXO set transitions
//!
//! A block's transaction list is validated as a unit against the live set
//! and, on success, produces the next set. The transition is pure: the
//! caller's set is never touched on failure.

use crate::core::transaction::{
    OutPoint, Transaction, TransactionError, UnspentTxOut, COINBASE_AMOUNT,
};
use crate::crypto::{is_valid_address, verify_id};
use std::collections::{HashMap, HashSet};

/// The live set of unspent outputs, keyed by `(txOutId, txOutIndex)`
pub type UtxoSet = HashMap<OutPoint, UnspentTxOut>;

/// Validate a regular (non-coinbase) transaction against the live set
///
/// Checks structure, id derivation, that every input references a live
/// output whose owner signed this transaction's id, and that value is
/// conserved.
pub fn validate_transaction(tx: &Transaction, utxo_set: &UtxoSet) -> Result<(), TransactionError> {
    tx.validate_structure()?;

    if tx.id != tx.compute_id() {
        return Err(TransactionError::Malformed(format!(
            "transaction id {} does not match its contents",
            tx.id
        )));
    }

    let mut input_total: u64 = 0;
    for (index, tx_in) in tx.tx_ins.iter().enumerate() {
        let referenced =
            utxo_set
                .get(&tx_in.outpoint())
                .ok_or_else(|| TransactionError::UnknownUtxo {
                    tx_out_id: tx_in.tx_out_id.clone(),
                    tx_out_index: tx_in.tx_out_index,
                })?;

        if !verify_id(&referenced.address, &tx.id, &tx_in.signature) {
            return Err(TransactionError::InvalidSignature {
                id: tx.id.clone(),
                index,
            });
        }
        input_total += referenced.amount;
    }

    let output_total = tx.total_output();
    if input_total != output_total {
        return Err(TransactionError::ConservationViolation {
            input: input_total,
            output: output_total,
        });
    }

    Ok(())
}

/// Validate the coinbase transaction of the block at `block_index`
pub fn validate_coinbase(tx: &Transaction, block_index: u64) -> Result<(), TransactionError> {
    if tx.id != tx.compute_id() {
        return Err(TransactionError::BadCoinbase(
            "id does not match contents".to_string(),
        ));
    }
    if tx.tx_ins.len() != 1 {
        return Err(TransactionError::BadCoinbase(
            "must have exactly one input".to_string(),
        ));
    }
    let tx_in = &tx.tx_ins[0];
    if !tx_in.tx_out_id.is_empty() {
        return Err(TransactionError::BadCoinbase(
            "input must not reference an output".to_string(),
        ));
    }
    if u64::from(tx_in.tx_out_index) != block_index {
        return Err(TransactionError::BadCoinbase(format!(
            "input index {} does not match block index {}",
            tx_in.tx_out_index, block_index
        )));
    }
    if !tx_in.signature.is_empty() {
        return Err(TransactionError::BadCoinbase(
            "input must be unsigned".to_string(),
        ));
    }
    if tx.tx_outs.len() != 1 {
        return Err(TransactionError::BadCoinbase(
            "must have exactly one output".to_string(),
        ));
    }
    if !is_valid_address(&tx.tx_outs[0].address) {
        return Err(TransactionError::BadCoinbase(format!(
            "invalid output address: {}",
            tx.tx_outs[0].address
        )));
    }
    if tx.tx_outs[0].amount != COINBASE_AMOUNT {
        return Err(TransactionError::BadCoinbase(format!(
            "output amount {} is not the reward {}",
            tx.tx_outs[0].amount, COINBASE_AMOUNT
        )));
    }
    Ok(())
}

/// Validate a block's transactions and return the UTXO set after them
///
/// Block-level checks in order: the first transaction is a valid coinbase
/// for `block_index`, no output is consumed twice within the block, and
/// every other transaction validates against the live set. Any failure
/// rejects the whole list.
pub fn process_transactions(
    transactions: &[Transaction],
    utxo_set: &UtxoSet,
    block_index: u64,
) -> Result<UtxoSet, TransactionError> {
    let coinbase = transactions.first().ok_or_else(|| {
        TransactionError::BadCoinbase("block carries no transactions".to_string())
    })?;
    validate_coinbase(coinbase, block_index)?;

    let mut consumed: HashSet<OutPoint> = HashSet::new();
    for tx in transactions {
        for tx_in in &tx.tx_ins {
            if !consumed.insert(tx_in.outpoint()) {
                return Err(TransactionError::DoubleSpendInBlock {
                    tx_out_id: tx_in.tx_out_id.clone(),
                    tx_out_index: tx_in.tx_out_index,
                });
            }
        }
    }

    for tx in &transactions[1..] {
        validate_transaction(tx, utxo_set)?;
    }

    let mut next = utxo_set.clone();
    for tx in transactions {
        for tx_in in &tx.tx_ins {
            next.remove(&tx_in.outpoint());
        }
        for (index, tx_out) in tx.tx_outs.iter().enumerate() {
            let unspent = UnspentTxOut {
                tx_out_id: tx.id.clone(),
                tx_out_index: index as u32,
                address: tx_out.address.clone(),
                amount: tx_out.amount,
            };
            next.insert(unspent.outpoint(), unspent);
        }
    }
    Ok(next)
}
