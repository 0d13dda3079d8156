//! Blockchain implementation
//!
//! The single-threaded ledger: a block tree plus the pool of transactions
//! waiting for a block. See `SharedBlockChain` for concurrent callers.

use crate::core::block::Block;
use crate::core::block_tree::{BlockError, BlockStatus, BlockTree, LedgerConfig};
use crate::core::transaction::Transaction;
use crate::core::transaction_pool::TransactionPool;
use crate::core::utxo::UtxoPool;
use crate::crypto::{Secp256k1Verifier, SignatureVerifier};
use log::debug;

/// The main ledger structure
#[derive(Debug, Clone)]
pub struct BlockChain<V = Secp256k1Verifier> {
    tree: BlockTree<V>,
    transaction_pool: TransactionPool,
}

impl BlockChain {
    /// Create a ledger holding only `genesis`
    pub fn new(genesis: Block) -> Self {
        Self::from_tree(BlockTree::new(genesis))
    }
}

impl<V: SignatureVerifier> BlockChain<V> {
    pub fn with_config(genesis: Block, config: LedgerConfig, verifier: V) -> Self {
        Self::from_tree(BlockTree::with_config(genesis, config, verifier))
    }

    fn from_tree(tree: BlockTree<V>) -> Self {
        Self {
            tree,
            transaction_pool: TransactionPool::new(),
        }
    }

    /// Add `block` if it is valid, returning whether it is now retained
    pub fn add_block(&mut self, block: Block) -> bool {
        match self.try_add_block(block) {
            Ok(_) => true,
            Err(err) => {
                debug!("Rejected block: {}", err);
                false
            }
        }
    }

    /// Add `block`, reporting why it was refused. Confirmed transactions
    /// leave the pool.
    pub fn try_add_block(&mut self, block: Block) -> Result<BlockStatus, BlockError> {
        let status = self.tree.insert(block)?;
        if let BlockStatus::Added { hash, .. } = status {
            if let Some(block) = self.tree.get_block(&hash) {
                self.transaction_pool.remove_block_transactions(block);
            }
        }
        Ok(status)
    }

    /// Get the maximum height block
    pub fn get_max_height_block(&self) -> &Block {
        self.tree.max_height_block()
    }

    /// Get the UTXO pool for building a new block on the maximum height block
    pub fn get_max_height_utxo_pool(&self) -> &UtxoPool {
        self.tree.max_height_utxo_pool()
    }

    /// Get the transaction pool to build a new block
    pub fn get_transaction_pool(&self) -> &TransactionPool {
        &self.transaction_pool
    }

    /// Add a transaction to the pool, unvalidated
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transaction_pool.add_transaction(tx);
    }

    /// Read access to the retained blocks
    pub fn tree(&self) -> &BlockTree<V> {
        &self.tree
    }

    pub fn max_height(&self) -> u64 {
        self.tree.max_height()
    }

    pub fn into_parts(self) -> (BlockTree<V>, TransactionPool) {
        (self.tree, self.transaction_pool)
    }
}
