//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions and the outputs they create (UTXO model)
//! - The unspent output pool and transaction validation
//! - Blocks and the fork-aware, window-bounded block tree
//! - The pending transaction pool
//! - Single-threaded and shared ledger handles

pub mod block;
pub mod block_tree;
pub mod blockchain;
pub mod shared;
pub mod transaction;
pub mod transaction_pool;
pub mod tx_handler;
pub mod utxo;

pub use block::{Block, BLOCK_REWARD};
pub use block_tree::{
    BlockError, BlockStatus, BlockTree, LedgerConfig, CUT_OFF_AGE, GENESIS_HEIGHT,
};
pub use blockchain::BlockChain;
pub use shared::{SharedBlockChain, TipSnapshot};
pub use transaction::{Output, Transaction, TransactionError, TxInput, Value};
pub use transaction_pool::TransactionPool;
pub use tx_handler::{apply_txs, check_tx, TxError, TxHandler};
pub use utxo::{OutputRef, UtxoPool};
