//! Ledger handle for concurrent callers
//!
//! The block tree sits behind one `RwLock` that `add_block` holds in write
//! mode for the whole insertion, so tip readers always see a state in which
//! replay, pruning and tip selection have all completed. The transaction pool
//! has its own `Mutex`; `add_block` takes it, after the tree lock, only to
//! drop confirmed transactions.

use crate::core::block::Block;
use crate::core::block_tree::{BlockError, BlockStatus, BlockTree, LedgerConfig};
use crate::core::blockchain::BlockChain;
use crate::core::transaction::Transaction;
use crate::core::transaction_pool::TransactionPool;
use crate::core::utxo::UtxoPool;
use crate::crypto::{Hash, Secp256k1Verifier, SignatureVerifier};
use log::debug;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Consistent view of the canonical tip
#[derive(Debug, Clone)]
pub struct TipSnapshot {
    pub hash: Hash,
    pub height: u64,
    pub block: Block,
    pub utxo_pool: UtxoPool,
}

/// Cloneable, thread-safe ledger handle
pub struct SharedBlockChain<V = Secp256k1Verifier> {
    tree: Arc<RwLock<BlockTree<V>>>,
    transaction_pool: Arc<Mutex<TransactionPool>>,
}

impl<V> Clone for SharedBlockChain<V> {
    fn clone(&self) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
            transaction_pool: Arc::clone(&self.transaction_pool),
        }
    }
}

impl SharedBlockChain {
    pub fn new(genesis: Block) -> Self {
        Self::from(BlockChain::new(genesis))
    }
}

impl<V: SignatureVerifier> SharedBlockChain<V> {
    pub fn with_config(genesis: Block, config: LedgerConfig, verifier: V) -> Self {
        Self::from(BlockChain::with_config(genesis, config, verifier))
    }

    pub async fn add_block(&self, block: Block) -> bool {
        match self.try_add_block(block).await {
            Ok(_) => true,
            Err(err) => {
                debug!("Rejected block: {}", err);
                false
            }
        }
    }

    pub async fn try_add_block(&self, block: Block) -> Result<BlockStatus, BlockError> {
        let mut tree = self.tree.write().await;
        let status = tree.insert(block)?;
        if let BlockStatus::Added { hash, .. } = status {
            if let Some(block) = tree.get_block(&hash) {
                self.transaction_pool
                    .lock()
                    .await
                    .remove_block_transactions(block);
            }
        }
        Ok(status)
    }

    pub async fn get_max_height_block(&self) -> Block {
        self.tree.read().await.max_height_block().clone()
    }

    pub async fn get_max_height_utxo_pool(&self) -> UtxoPool {
        self.tree.read().await.max_height_utxo_pool().clone()
    }

    /// Tip block and its pool, read under one lock acquisition
    pub async fn tip_snapshot(&self) -> TipSnapshot {
        let tree = self.tree.read().await;
        TipSnapshot {
            hash: tree.max_height_block_hash(),
            height: tree.max_height(),
            block: tree.max_height_block().clone(),
            utxo_pool: tree.max_height_utxo_pool().clone(),
        }
    }

    /// Pool of an arbitrary retained block, for building on a side branch
    pub async fn utxo_pool_at(&self, hash: &Hash) -> Option<UtxoPool> {
        self.tree.read().await.utxo_pool_at(hash).cloned()
    }

    pub async fn max_height(&self) -> u64 {
        self.tree.read().await.max_height()
    }

    pub async fn add_transaction(&self, tx: Transaction) {
        self.transaction_pool.lock().await.add_transaction(tx);
    }

    /// Copy of the pending pool
    pub async fn get_transaction_pool(&self) -> TransactionPool {
        self.transaction_pool.lock().await.clone()
    }

    /// Run `f` with read access to the block tree
    pub async fn with_tree<R>(&self, f: impl FnOnce(&BlockTree<V>) -> R) -> R {
        let tree = self.tree.read().await;
        f(&tree)
    }
}

impl<V> From<BlockChain<V>> for SharedBlockChain<V>
where
    V: SignatureVerifier,
{
    fn from(chain: BlockChain<V>) -> Self {
        let (tree, transaction_pool) = chain.into_parts();
        Self {
            tree: Arc::new(RwLock::new(tree)),
            transaction_pool: Arc::new(Mutex::new(transaction_pool)),
        }
    }
}
