//! Transaction pool for pending transactions
//!
//! A staging area for transactions waiting to be included in a block. Nothing
//! is validated on insertion; validity is decided when a block carrying the
//! transaction is added to the ledger.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::crypto::Hash;
use std::collections::{BTreeMap, HashMap};

/// Pending transactions keyed by hash, remembered in arrival order
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    /// Transactions indexed by hash, with their arrival sequence
    entries: HashMap<Hash, (u64, Transaction)>,
    /// Arrival sequence to hash
    by_time: BTreeMap<u64, Hash>,
    next_seq: u64,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx`; returns `false` if a transaction with its hash is present
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_time.insert(seq, hash);
        self.entries.insert(hash, (seq, tx));
        true
    }

    pub fn remove_transaction(&mut self, hash: &Hash) -> Option<Transaction> {
        let (seq, tx) = self.entries.remove(hash)?;
        self.by_time.remove(&seq);
        Some(tx)
    }

    /// Drop every transaction confirmed by `block`
    pub fn remove_block_transactions(&mut self, block: &Block) -> usize {
        block
            .transactions()
            .iter()
            .filter(|tx| self.remove_transaction(&tx.hash()).is_some())
            .count()
    }

    pub fn get_transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.entries.get(hash).map(|(_, tx)| tx)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Pending transactions in arrival order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.by_time
            .values()
            .filter_map(|h| self.entries.get(h).map(|(_, tx)| tx.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::Value;
    use crate::crypto::KeyPair;

    fn tx(value: i64, kp: &KeyPair) -> Transaction {
        Transaction::coinbase(Value::from(value), kp.public_key)
    }

    #[test]
    fn test_add_keeps_arrival_order() {
        let kp = KeyPair::generate();
        let mut pool = TransactionPool::new();
        let (a, b, c) = (tx(3, &kp), tx(1, &kp), tx(2, &kp));

        assert!(pool.add_transaction(a.clone()));
        assert!(pool.add_transaction(b.clone()));
        assert!(pool.add_transaction(c.clone()));
        assert_eq!(pool.transactions(), vec![a, b, c]);
    }

    #[test]
    fn test_duplicate_is_ignored() {
        let kp = KeyPair::generate();
        let mut pool = TransactionPool::new();
        assert!(pool.add_transaction(tx(1, &kp)));
        assert!(!pool.add_transaction(tx(1, &kp)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_no_validation_on_insert() {
        let kp = KeyPair::generate();
        let mut pool = TransactionPool::new();
        let mut bogus = Transaction::new();
        bogus
            .add_input(Hash::digest(b"nowhere"), 3)
            .add_output(Value::from(-5), kp.public_key);
        assert!(pool.add_transaction(bogus.clone()));
        assert!(pool.contains(&bogus.hash()));
    }

    #[test]
    fn test_remove_block_transactions() {
        let kp = KeyPair::generate();
        let mut pool = TransactionPool::new();
        let (a, b, c) = (tx(1, &kp), tx(2, &kp), tx(3, &kp));
        pool.add_transaction(a.clone());
        pool.add_transaction(b.clone());

        let mut block = Block::new(None, kp.public_key, Value::from(9));
        block.add_transaction(b.clone());
        block.add_transaction(c);

        assert_eq!(pool.remove_block_transactions(&block), 1);
        assert_eq!(pool.transactions(), vec![a.clone()]);
        assert!(pool.get_transaction(&b.hash()).is_none());

        assert!(pool.remove_transaction(&a.hash()).is_some());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_removal_keeps_order_of_the_rest() {
        let kp = KeyPair::generate();
        let mut pool = TransactionPool::new();
        let txs: Vec<Transaction> = (1..=5).map(|v| tx(v, &kp)).collect();
        for t in &txs {
            pool.add_transaction(t.clone());
        }

        assert!(pool.remove_transaction(&txs[1].hash()).is_some());
        assert!(pool.remove_transaction(&txs[3].hash()).is_some());
        assert!(pool.remove_transaction(&txs[3].hash()).is_none());

        // A re-added transaction goes to the back
        assert!(pool.add_transaction(txs[1].clone()));
        assert_eq!(
            pool.transactions(),
            vec![txs[0].clone(), txs[2].clone(), txs[4].clone(), txs[1].clone()]
        );
        assert_eq!(pool.len(), 4);
    }
}
