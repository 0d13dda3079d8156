//! Block implementation for the ledger
//!
//! A block links to its parent by hash and carries a coinbase plus an ordered
//! list of transactions. Its hash is only set by `finalize`; any later
//! mutation clears it again, and the ledger refuses unfinalized blocks.

use crate::core::transaction::{Transaction, Value};
use crate::crypto::Hash;
use rust_decimal::Decimal;
use secp256k1::PublicKey;
use serde::Serialize;

/// Default block reward minted by a coinbase
pub const BLOCK_REWARD: Value = Decimal::from_parts(25, 0, 0, false, 0);

/// A block in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Hash of the parent block, absent for a genesis block
    prev_hash: Option<Hash>,
    /// Minting transaction, applied after every other transaction
    coinbase: Transaction,
    /// Transactions in block order
    transactions: Vec<Transaction>,
    /// Set by `finalize`
    hash: Option<Hash>,
}

impl Block {
    /// Create an unfinalized block on `prev_hash` paying `reward` to `owner`
    pub fn new(prev_hash: Option<Hash>, owner: PublicKey, reward: Value) -> Self {
        Self::with_coinbase(prev_hash, Transaction::coinbase(reward, owner))
    }

    /// Create an unfinalized block with an explicit coinbase
    pub fn with_coinbase(prev_hash: Option<Hash>, coinbase: Transaction) -> Self {
        Self {
            prev_hash,
            coinbase,
            transactions: Vec::new(),
            hash: None,
        }
    }

    /// Create the finalized genesis block minting `reward` to `owner`
    pub fn genesis(owner: PublicKey, reward: Value) -> Self {
        let mut block = Self::new(None, owner, reward);
        block.finalize();
        block
    }

    pub fn hash(&self) -> Option<Hash> {
        self.hash
    }

    pub fn prev_hash(&self) -> Option<Hash> {
        self.prev_hash
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.coinbase
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Append a transaction; the block must be finalized again
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
        self.hash = None;
    }

    /// Compute and store the block hash
    pub fn finalize(&mut self) -> Hash {
        let hash = self.compute_hash();
        self.hash = Some(hash);
        hash
    }

    /// Double SHA-256 over the serialized block content
    pub fn compute_hash(&self) -> Hash {
        Hash::double_digest(&self.raw_block())
    }

    /// Serialized form: parent hash, coinbase hash, each transaction hash
    pub fn raw_block(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 32 * (self.transactions.len() + 3));
        match &self.prev_hash {
            Some(prev) => {
                buf.push(1);
                buf.extend_from_slice(prev.as_bytes());
            }
            None => buf.push(0),
        }
        buf.extend_from_slice(self.coinbase.hash().as_bytes());
        buf.extend_from_slice(&(self.transactions.len() as u32).to_be_bytes());
        for tx in &self.transactions {
            buf.extend_from_slice(tx.hash().as_bytes());
        }
        buf
    }
}
