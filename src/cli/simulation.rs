//! Multi-producer ledger simulation
//!
//! Producers run as tokio tasks over one `SharedBlockChain`. Each round a
//! producer spends some outputs it holds keys for, then builds a block either
//! on the tip or, at `fork_rate`, on the tip's parent, so competing branches,
//! fork choice and window pruning all get exercised.

use crate::core::{
    Block, BlockStatus, LedgerConfig, OutputRef, Output, SharedBlockChain, Transaction,
    TransactionError, UtxoPool, Value, BLOCK_REWARD,
};
use crate::crypto::{KeyPair, Secp256k1Verifier};
use crate::mining::BlockProducer;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use secp256k1::PublicKey;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Simulation errors
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Producer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Rounds run by each producer
    pub rounds: u64,
    pub producers: usize,
    pub cut_off_age: u64,
    /// Probability of building on the tip's parent instead of the tip
    pub fork_rate: f64,
    /// Outputs each producer tries to spend per round
    pub spends_per_round: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: 20,
            producers: 1,
            cut_off_age: LedgerConfig::default().cut_off_age,
            fork_rate: 0.2,
            spends_per_round: 2,
            seed: 42,
        }
    }
}

/// Final state of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub rounds: u64,
    pub producers: usize,
    pub cut_off_age: u64,
    pub blocks_added: u64,
    pub blocks_rejected: u64,
    pub fork_attempts: u64,
    pub transactions_submitted: u64,
    pub tip_height: u64,
    pub tip_hash: String,
    pub retained_blocks: usize,
    pub lowest_retained_height: u64,
    pub genesis_retained: bool,
    pub utxo_count: usize,
    pub utxo_total: Value,
    pub pending_transactions: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    added: u64,
    rejected: u64,
    forks: u64,
    submitted: u64,
}

impl Tally {
    fn merge(&mut self, other: Tally) {
        self.added += other.added;
        self.rejected += other.rejected;
        self.forks += other.forks;
        self.submitted += other.submitted;
    }
}

/// Keys the simulation can sign with
#[derive(Default)]
struct KeyRing {
    keys: HashMap<PublicKey, KeyPair>,
}

impl KeyRing {
    fn fresh(&mut self, rng: &mut StdRng) -> PublicKey {
        let kp = KeyPair::generate_with(rng);
        let public_key = kp.public_key;
        self.keys.insert(public_key, kp);
        public_key
    }

    fn get(&self, public_key: &PublicKey) -> Option<&KeyPair> {
        self.keys.get(public_key)
    }
}

/// Run the simulation to completion
pub async fn run(config: SimulationConfig) -> Result<SimulationReport, SimulationError> {
    if config.producers == 0 {
        return Err(SimulationError::InvalidConfig(
            "at least one producer is required".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.fork_rate) {
        return Err(SimulationError::InvalidConfig(format!(
            "fork rate {} is not a probability",
            config.fork_rate
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let keyring = Arc::new(Mutex::new(KeyRing::default()));
    let genesis_owner = keyring.lock().await.fresh(&mut rng);
    let genesis = Block::genesis(genesis_owner, BLOCK_REWARD);
    let genesis_hash = genesis.compute_hash();

    let ledger_config = LedgerConfig {
        cut_off_age: config.cut_off_age,
    };
    let chain = SharedBlockChain::with_config(genesis, ledger_config, Secp256k1Verifier::new());

    info!(
        "Simulating {} round(s) with {} producer(s), window {}",
        config.rounds, config.producers, config.cut_off_age
    );

    let mut handles = Vec::with_capacity(config.producers);
    for id in 0..config.producers {
        let chain = chain.clone();
        let keyring = Arc::clone(&keyring);
        let config = config.clone();
        handles.push(tokio::spawn(run_producer(id, chain, keyring, config)));
    }

    let mut tally = Tally::default();
    for handle in handles {
        tally.merge(handle.await??);
    }

    let pending_transactions = chain.get_transaction_pool().await.len();
    let report = chain
        .with_tree(|tree| {
            let retained = tree.retained();
            let pool = tree.max_height_utxo_pool();
            SimulationReport {
                rounds: config.rounds,
                producers: config.producers,
                cut_off_age: config.cut_off_age,
                blocks_added: tally.added,
                blocks_rejected: tally.rejected,
                fork_attempts: tally.forks,
                transactions_submitted: tally.submitted,
                tip_height: tree.max_height(),
                tip_hash: tree.max_height_block_hash().to_hex(),
                retained_blocks: retained.len(),
                lowest_retained_height: retained.first().map(|(_, h)| *h).unwrap_or_default(),
                genesis_retained: tree.contains_block(&genesis_hash),
                utxo_count: pool.len(),
                utxo_total: pool.total_value().unwrap_or_default(),
                pending_transactions,
            }
        })
        .await;

    Ok(report)
}

async fn run_producer(
    id: usize,
    chain: SharedBlockChain,
    keyring: Arc<Mutex<KeyRing>>,
    config: SimulationConfig,
) -> Result<Tally, SimulationError> {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(id as u64 + 1));
    let producer = BlockProducer::new();
    let mut tally = Tally::default();

    for round in 0..config.rounds {
        let tip = chain.tip_snapshot().await;
        let spends = build_spends(&keyring, &tip.utxo_pool, config.spends_per_round, &mut rng).await?;
        tally.submitted += spends.len() as u64;
        for tx in spends {
            chain.add_transaction(tx).await;
        }

        let owner = keyring.lock().await.fresh(&mut rng);
        let fork_parent = if rng.gen_bool(config.fork_rate) {
            tip.block.prev_hash()
        } else {
            None
        };

        match fork_parent {
            Some(parent) => {
                tally.forks += 1;
                let candidates = chain.get_transaction_pool().await.transactions();
                let built = chain
                    .with_tree(|tree| {
                        tree.utxo_pool_at(&parent).map(|pool| {
                            producer.build_block(parent, pool, &candidates, owner, tree.verifier())
                        })
                    })
                    .await;
                let Some((block, _)) = built else {
                    debug!("Producer {} round {}: fork parent already pruned", id, round);
                    tally.rejected += 1;
                    continue;
                };
                match chain.try_add_block(block).await {
                    Ok(BlockStatus::Added { .. }) => tally.added += 1,
                    Ok(BlockStatus::Duplicate) => {}
                    Err(err) => {
                        debug!("Producer {} round {}: {}", id, round, err);
                        tally.rejected += 1;
                    }
                }
            }
            None => match producer.produce_shared(&chain, owner).await {
                Ok(_) => tally.added += 1,
                Err(err) => {
                    debug!("Producer {} round {}: {}", id, round, err);
                    tally.rejected += 1;
                }
            },
        }

        tokio::task::yield_now().await;
    }

    Ok(tally)
}

/// Spend up to `count` outputs held by the key ring, each into two fresh keys
async fn build_spends(
    keyring: &Mutex<KeyRing>,
    utxo_pool: &UtxoPool,
    count: usize,
    rng: &mut StdRng,
) -> Result<Vec<Transaction>, SimulationError> {
    let mut keys = keyring.lock().await;

    let mut owned: Vec<(OutputRef, Output)> = utxo_pool
        .iter()
        .filter(|(_, output)| keys.get(&output.owner).is_some())
        .map(|(utxo, output)| (*utxo, output.clone()))
        .collect();
    owned.sort_by(|a, b| a.0.cmp(&b.0));

    let chosen: Vec<(OutputRef, Output)> = owned.choose_multiple(rng, count).cloned().collect();
    let mut spends = Vec::with_capacity(chosen.len());
    for (utxo, output) in chosen {
        let Some((first, second)) = split_value(output.value) else {
            continue;
        };
        let to_first = keys.fresh(rng);
        let to_second = keys.fresh(rng);

        let mut tx = Transaction::new();
        tx.add_input(utxo.tx_hash, utxo.index)
            .add_output(first, to_first)
            .add_output(second, to_second);
        if let Some(signer) = keys.get(&output.owner) {
            tx.sign(signer)?;
            spends.push(tx);
        }
    }

    Ok(spends)
}

/// Split `value` less a 0.01 fee 60/40, `None` if nothing would remain
fn split_value(value: Value) -> Option<(Value, Value)> {
    let spendable = value - Value::new(1, 2);
    if spendable <= Value::ZERO {
        return None;
    }
    let first = (spendable * Value::new(6, 1)).round_dp(4);
    Some((first, spendable - first))
}
