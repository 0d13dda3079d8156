//! Fork-aware block tree with a bounded retention window
//!
//! Every retained block is stored with the UTXO pool it produces, its height
//! and the order in which it arrived. The canonical tip is the highest block;
//! among blocks of equal height the first to arrive wins. Blocks that fall
//! more than `cut_off_age` below the tip are pruned together with their
//! pools, after which nothing can be attached to them.

use crate::core::block::Block;
use crate::core::tx_handler::apply_txs;
use crate::core::utxo::UtxoPool;
use crate::crypto::{Hash, Secp256k1Verifier, SignatureVerifier};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default retention window, in blocks below the tip
pub const CUT_OFF_AGE: u64 = 10;

/// Height of the genesis block
pub const GENESIS_HEIGHT: u64 = 1;

/// Ledger configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Blocks at height `h` are retained while `h >= max_height - cut_off_age`
    /// and accepted while `h > max_height - cut_off_age`
    pub cut_off_age: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cut_off_age: CUT_OFF_AGE,
        }
    }
}

/// Reasons a block is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block is not finalized")]
    MissingHash,
    #[error("Block has no parent hash")]
    MissingParentHash,
    #[error("Parent {0} is unknown or pruned")]
    UnknownParent(Hash),
    #[error("Only {accepted} of {submitted} transactions are valid")]
    InvalidTransactions { accepted: usize, submitted: usize },
    /// Only reachable from a parent below the floor, which pruning never retains
    #[error("Height {height} is at or below the retention floor {floor}")]
    BelowRetentionFloor { height: u64, floor: u64 },
}

/// Outcome of a successful insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Stored at `height`; `new_tip` when it raised the maximum height
    Added {
        hash: Hash,
        height: u64,
        new_tip: bool,
    },
    /// Already retained, nothing changed
    Duplicate,
}

/// A retained block and the state it leads to
#[derive(Debug, Clone)]
struct BlockNode {
    block: Block,
    utxo_pool: UtxoPool,
    height: u64,
    arrival: u64,
}

/// Retained blocks keyed by hash
#[derive(Debug, Clone)]
pub struct BlockTree<V = Secp256k1Verifier> {
    config: LedgerConfig,
    verifier: V,
    nodes: HashMap<Hash, BlockNode>,
    genesis_hash: Hash,
    max_height: u64,
    /// Earliest-arrived block at `max_height`
    tip: Hash,
    /// Arrival sequence number of the last stored block
    clock: u64,
}

impl BlockTree {
    /// Build a tree holding only `genesis`, with the default configuration
    pub fn new(genesis: Block) -> Self {
        Self::with_config(genesis, LedgerConfig::default(), Secp256k1Verifier::new())
    }
}

impl<V: SignatureVerifier> BlockTree<V> {
    /// Build a tree holding only `genesis`.
    ///
    /// The genesis block is trusted: its transactions are applied to an empty
    /// pool (so any that spend something are dropped) and its coinbase is
    /// minted. An unfinalized genesis is finalized here.
    pub fn with_config(mut genesis: Block, config: LedgerConfig, verifier: V) -> Self {
        let genesis_hash = match genesis.hash() {
            Some(hash) => hash,
            None => genesis.finalize(),
        };

        let mut utxo_pool = UtxoPool::new();
        let accepted = apply_txs(genesis.transactions(), &mut utxo_pool, &verifier).len();
        if accepted < genesis.transactions().len() {
            debug!(
                "Genesis dropped {} of {} transactions",
                genesis.transactions().len() - accepted,
                genesis.transactions().len()
            );
        }
        mint_coinbase(&genesis, &mut utxo_pool);

        let mut nodes = HashMap::new();
        nodes.insert(
            genesis_hash,
            BlockNode {
                block: genesis,
                utxo_pool,
                height: GENESIS_HEIGHT,
                arrival: 0,
            },
        );

        info!("Ledger initialised at genesis {}", genesis_hash.short());

        Self {
            config,
            verifier,
            nodes,
            genesis_hash,
            max_height: GENESIS_HEIGHT,
            tip: genesis_hash,
            clock: 0,
        }
    }

    /// Attach `block` to its parent.
    ///
    /// Every transaction in the block must apply in order on top of the
    /// parent's pool; a single invalid one refuses the whole block.
    pub fn insert(&mut self, block: Block) -> Result<BlockStatus, BlockError> {
        let hash = block.hash().ok_or(BlockError::MissingHash)?;
        let parent_hash = block.prev_hash().ok_or(BlockError::MissingParentHash)?;
        let parent = self
            .nodes
            .get(&parent_hash)
            .ok_or(BlockError::UnknownParent(parent_hash))?;

        if self.nodes.contains_key(&hash) {
            return Ok(BlockStatus::Duplicate);
        }

        let mut utxo_pool = parent.utxo_pool.clone();
        let submitted = block.transactions().len();
        let accepted = apply_txs(block.transactions(), &mut utxo_pool, &self.verifier).len();
        if accepted != submitted {
            return Err(BlockError::InvalidTransactions {
                accepted,
                submitted,
            });
        }

        let height = parent.height + 1;
        if let Some(floor) = self.max_height.checked_sub(self.config.cut_off_age) {
            if height <= floor {
                return Err(BlockError::BelowRetentionFloor { height, floor });
            }
        }

        mint_coinbase(&block, &mut utxo_pool);

        self.clock += 1;
        self.nodes.insert(
            hash,
            BlockNode {
                block,
                utxo_pool,
                height,
                arrival: self.clock,
            },
        );

        let new_tip = height > self.max_height;
        if new_tip {
            self.max_height = height;
            self.tip = hash;
            self.prune();
        }

        info!(
            "Added block {} at height {} ({} transactions{})",
            hash.short(),
            height,
            submitted,
            if new_tip { ", new tip" } else { "" }
        );

        Ok(BlockStatus::Added {
            hash,
            height,
            new_tip,
        })
    }

    /// Remove every block below `max_height - cut_off_age`
    fn prune(&mut self) {
        let Some(floor) = self.max_height.checked_sub(self.config.cut_off_age) else {
            return;
        };
        let before = self.nodes.len();
        self.nodes.retain(|_, node| node.height >= floor);
        let pruned = before - self.nodes.len();
        if pruned > 0 {
            info!("Pruned {} block(s) below height {}", pruned, floor);
        }
    }

    /// The canonical tip: highest, then earliest arrived
    pub fn max_height_block(&self) -> &Block {
        &self.tip_node().block
    }

    /// The pool to build the next block on top of the tip
    pub fn max_height_utxo_pool(&self) -> &UtxoPool {
        &self.tip_node().utxo_pool
    }

    pub fn max_height_block_hash(&self) -> Hash {
        self.tip
    }

    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_hash
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Number of retained blocks
    pub fn block_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_block(&self, hash: &Hash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn get_block(&self, hash: &Hash) -> Option<&Block> {
        self.nodes.get(hash).map(|n| &n.block)
    }

    pub fn height_of(&self, hash: &Hash) -> Option<u64> {
        self.nodes.get(hash).map(|n| n.height)
    }

    pub fn utxo_pool_at(&self, hash: &Hash) -> Option<&UtxoPool> {
        self.nodes.get(hash).map(|n| &n.utxo_pool)
    }

    /// Retained block hashes with their heights, lowest height then arrival
    pub fn retained(&self) -> Vec<(Hash, u64)> {
        let mut nodes: Vec<&BlockNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| (n.height, n.arrival));
        nodes
            .into_iter()
            .filter_map(|n| n.block.hash().map(|h| (h, n.height)))
            .collect()
    }

    fn tip_node(&self) -> &BlockNode {
        self.nodes
            .get(&self.tip)
            .expect("tip block is never pruned")
    }
}

/// Add the block's coinbase outputs without validation
fn mint_coinbase(block: &Block, utxo_pool: &mut UtxoPool) {
    let coinbase = block.coinbase();
    for (index, output) in coinbase.outputs().iter().enumerate() {
        utxo_pool.add_utxo(coinbase.output_ref(index as u32), output.clone());
    }
}
