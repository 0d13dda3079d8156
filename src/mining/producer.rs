//! Block production
//!
//! Assembles the next block on top of the canonical tip from the pending
//! pool. There is no proof of work: a block is finished once it is finalized.

use crate::core::{
    apply_txs, Block, BlockChain, BlockError, SharedBlockChain, Transaction, UtxoPool, Value,
    BLOCK_REWARD,
};
use crate::crypto::{Hash, SignatureVerifier};
use log::info;
use secp256k1::PublicKey;
use std::time::Instant;

/// Default cap on transactions per produced block
pub const DEFAULT_MAX_BLOCK_TXS: usize = 100;

/// Production statistics
#[derive(Debug, Clone)]
pub struct ProductionStats {
    /// Pending transactions considered
    pub candidates: usize,
    /// Transactions placed in the block
    pub included: usize,
    /// Time taken in milliseconds
    pub time_ms: u128,
}

/// Producer of candidate blocks
#[derive(Debug, Clone)]
pub struct BlockProducer {
    /// Coinbase value of each block
    pub reward: Value,
    pub max_transactions: usize,
}

impl BlockProducer {
    pub fn new() -> Self {
        Self::with_reward(BLOCK_REWARD)
    }

    pub fn with_reward(reward: Value) -> Self {
        Self {
            reward,
            max_transactions: DEFAULT_MAX_BLOCK_TXS,
        }
    }

    pub fn with_max_transactions(mut self, max_transactions: usize) -> Self {
        self.max_transactions = max_transactions;
        self
    }

    /// Build a finalized block on `parent_hash`.
    ///
    /// `candidates` are filtered with a trial application against a copy of
    /// `parent_pool`, so the block holds only transactions that will replay
    /// cleanly in order. The coinbase pays `owner`; since a coinbase's hash is
    /// its content, callers should use a fresh owner key per block.
    pub fn build_block<V: SignatureVerifier + ?Sized>(
        &self,
        parent_hash: Hash,
        parent_pool: &UtxoPool,
        candidates: &[Transaction],
        owner: PublicKey,
        verifier: &V,
    ) -> (Block, ProductionStats) {
        let start = Instant::now();

        let mut scratch = parent_pool.clone();
        let accepted = apply_txs(candidates, &mut scratch, verifier);

        let mut block = Block::new(Some(parent_hash), owner, self.reward);
        for tx in accepted.into_iter().take(self.max_transactions) {
            block.add_transaction(tx.clone());
        }
        let hash = block.finalize();

        let stats = ProductionStats {
            candidates: candidates.len(),
            included: block.transactions().len(),
            time_ms: start.elapsed().as_millis(),
        };

        info!(
            "Built block {} on {} with {}/{} pending transactions",
            hash.short(),
            parent_hash.short(),
            stats.included,
            stats.candidates
        );

        (block, stats)
    }

    /// Build on the tip of `chain` from its pool and add the result
    pub fn produce<V: SignatureVerifier>(
        &self,
        chain: &mut BlockChain<V>,
        owner: PublicKey,
    ) -> Result<(Block, ProductionStats), BlockError> {
        let candidates = chain.get_transaction_pool().transactions();
        let tree = chain.tree();
        let (block, stats) = self.build_block(
            tree.max_height_block_hash(),
            tree.max_height_utxo_pool(),
            &candidates,
            owner,
            tree.verifier(),
        );
        chain.try_add_block(block.clone())?;
        Ok((block, stats))
    }

    /// Shared-ledger variant of `produce`. The block is built under a read
    /// lock and added under the write lock; if the tip moved in between, the
    /// block lands as a side branch.
    pub async fn produce_shared<V: SignatureVerifier>(
        &self,
        chain: &SharedBlockChain<V>,
        owner: PublicKey,
    ) -> Result<(Block, ProductionStats), BlockError> {
        let candidates = chain.get_transaction_pool().await.transactions();
        let (block, stats) = chain
            .with_tree(|tree| {
                self.build_block(
                    tree.max_height_block_hash(),
                    tree.max_height_utxo_pool(),
                    &candidates,
                    owner,
                    tree.verifier(),
                )
            })
            .await;
        chain.try_add_block(block.clone()).await?;
        Ok((block, stats))
    }
}

impl Default for BlockProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn pay(from: &KeyPair, prev: &Transaction, value: i64, to: &KeyPair) -> Transaction {
        let mut tx = Transaction::new();
        tx.add_input(prev.hash(), 0)
            .add_output(Value::from(value), to.public_key);
        tx.sign(from).unwrap();
        tx
    }

    #[test]
    fn test_produce_filters_pool() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let genesis = Block::genesis(alice.public_key, Value::from(10));
        let mut chain = BlockChain::new(genesis.clone());

        let good = pay(&alice, genesis.coinbase(), 9, &bob);
        let conflicting = pay(&alice, genesis.coinbase(), 8, &alice);
        let follow_up = pay(&bob, &good, 9, &alice);
        chain.add_transaction(good.clone());
        chain.add_transaction(conflicting.clone());
        chain.add_transaction(follow_up.clone());

        let producer = BlockProducer::new();
        let (block, stats) = producer
            .produce(&mut chain, KeyPair::generate().public_key)
            .unwrap();

        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.included, 2);
        assert_eq!(block.transactions(), &[good, follow_up]);
        assert_eq!(chain.max_height(), 2);

        // The loser of the conflict stays pending and can never land
        let pending = chain.get_transaction_pool().transactions();
        assert_eq!(pending, vec![conflicting]);
    }

    #[test]
    fn test_max_transactions_keeps_prefix() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let genesis = Block::genesis(alice.public_key, Value::from(10));
        let mut chain = BlockChain::new(genesis.clone());

        let first = pay(&alice, genesis.coinbase(), 10, &bob);
        let second = pay(&bob, &first, 10, &alice);
        chain.add_transaction(first.clone());
        chain.add_transaction(second.clone());

        let producer = BlockProducer::with_reward(Value::from(7)).with_max_transactions(1);
        let (block, _) = producer
            .produce(&mut chain, KeyPair::generate().public_key)
            .unwrap();
        assert_eq!(block.transactions(), &[first]);
        assert_eq!(chain.get_transaction_pool().transactions(), vec![second]);
    }

    #[tokio::test]
    async fn test_produce_shared() {
        let alice = KeyPair::generate();
        let genesis = Block::genesis(alice.public_key, Value::from(10));
        let chain = SharedBlockChain::new(genesis);

        let producer = BlockProducer::new();
        for _ in 0..3 {
            producer
                .produce_shared(&chain, KeyPair::generate().public_key)
                .await
                .unwrap();
        }
        let tip = chain.tip_snapshot().await;
        assert_eq!(tip.height, 4);
        assert_eq!(
            tip.utxo_pool.total_value(),
            Some(Value::from(10) + BLOCK_REWARD * Value::from(3))
        );
    }
}
