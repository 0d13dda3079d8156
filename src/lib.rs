//! UTXO Ledger: a fork-aware, bounded-memory ledger engine in Rust
//!
//! This crate provides:
//! - UTXO-based transactions with per-input ECDSA signatures (secp256k1)
//! - A validator enforcing ownership, no double spend and value conservation
//! - A block tree that keeps competing branches inside a retention window
//! - First-arrival fork choice among blocks of equal height
//! - A pending transaction pool and a block producer that draws from it
//! - A lock-guarded ledger handle for concurrent producers
//!
//! # Example
//!
//! ```rust
//! use utxo_ledger::core::{Block, BlockChain, Transaction, Value};
//! use utxo_ledger::crypto::KeyPair;
//!
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//!
//! // Genesis pays 10 to alice
//! let genesis = Block::genesis(alice.public_key, Value::from(10));
//! let parent = genesis.hash().unwrap();
//! let mut chain = BlockChain::new(genesis.clone());
//!
//! // Alice pays 9 to bob, leaving 1 as fee
//! let mut tx = Transaction::new();
//! tx.add_input(genesis.coinbase().hash(), 0)
//!     .add_output(Value::from(9), bob.public_key);
//! tx.sign(&alice).unwrap();
//!
//! let mut block = Block::new(Some(parent), bob.public_key, Value::from(5));
//! block.add_transaction(tx);
//! block.finalize();
//!
//! assert!(chain.add_block(block));
//! assert_eq!(chain.max_height(), 2);
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;

// Re-export commonly used types
pub use core::{
    Block, BlockChain, BlockError, BlockStatus, LedgerConfig, OutputRef, SharedBlockChain,
    Transaction, TxError, TxHandler, UtxoPool, Value, BLOCK_REWARD, CUT_OFF_AGE,
};
pub use crypto::{Hash, KeyPair, Secp256k1Verifier, SignatureVerifier};
pub use mining::BlockProducer;
