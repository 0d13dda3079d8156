//! Block production from the pending transaction pool

pub mod producer;

pub use producer::{BlockProducer, ProductionStats, DEFAULT_MAX_BLOCK_TXS};
