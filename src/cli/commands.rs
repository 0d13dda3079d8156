//! CLI commands for the ledger
//!
//! Implements the command handlers behind the `ledger` binary.

use crate::cli::simulation::SimulationReport;
use crate::core::{Block, BlockChain, Transaction, Value};
use crate::crypto::{public_key_to_address, KeyPair};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Print a finished simulation, as JSON when `json` is set
pub fn cmd_simulate_report(report: &SimulationReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("✅ Simulation finished");
    println!(
        "   ├─ Producers: {} x {} round(s)",
        report.producers, report.rounds
    );
    println!(
        "   ├─ Blocks added: {} ({} rejected, {} fork attempts)",
        report.blocks_added, report.blocks_rejected, report.fork_attempts
    );
    println!("   ├─ Transactions submitted: {}", report.transactions_submitted);
    println!("   ├─ Tip: height {} ({})", report.tip_height, &report.tip_hash[..16]);
    println!(
        "   ├─ Retained blocks: {} from height {} (window {})",
        report.retained_blocks, report.lowest_retained_height, report.cut_off_age
    );
    if !report.genesis_retained {
        println!("   ├─ Genesis pruned");
    }
    println!(
        "   ├─ Unspent outputs at tip: {} worth {}",
        report.utxo_count, report.utxo_total
    );
    println!("   └─ Pending transactions: {}", report.pending_transactions);

    Ok(())
}

/// Replay the reference genesis, valid-spend and inflating-spend scenario
pub fn cmd_scenario() -> CliResult<()> {
    let k1 = KeyPair::generate();
    let k2 = KeyPair::generate();
    let k3 = KeyPair::generate();

    let genesis = Block::genesis(k1.public_key, Value::from(10));
    let g = genesis.hash().ok_or("genesis is not finalized")?;
    let o1 = genesis.coinbase().output_ref(0);
    let mut chain = BlockChain::new(genesis);

    println!("📦 Genesis {} at height 1", g.short());
    println!("   └─ Coinbase output {} worth 10 to K1", o1);
    for (label, key) in [("K1", &k1), ("K2", &k2), ("K3", &k3)] {
        println!("   {} 📍 {}", label, public_key_to_address(&key.public_key));
    }

    let spend = |outputs: &[(i64, &KeyPair)]| -> CliResult<Transaction> {
        let mut tx = Transaction::new();
        tx.add_input(o1.tx_hash, o1.index);
        for (value, owner) in outputs {
            tx.add_output(Value::from(*value), owner.public_key);
        }
        tx.sign(&k1)?;
        Ok(tx)
    };

    // B2 first, so the ledger it is refused by is exactly the genesis state
    let mut b2 = Block::new(Some(g), k1.public_key, Value::from(5));
    b2.add_transaction(spend(&[(8, &k2), (3, &k3)])?);
    b2.finalize();
    let before = chain.get_max_height_utxo_pool().clone();
    match chain.try_add_block(b2) {
        Ok(status) => println!("\n⚠️  B2 unexpectedly accepted: {:?}", status),
        Err(err) => println!("\n❌ B2 (outputs sum to 11) rejected: {}", err),
    }
    let unchanged = chain.get_max_height_utxo_pool() == &before && chain.max_height() == 1;
    println!("   └─ Ledger unchanged: {}", unchanged);

    let mut b1 = Block::new(Some(g), k1.public_key, Value::from(5));
    b1.add_transaction(spend(&[(6, &k2), (3, &k3)])?);
    let h1 = b1.finalize();
    let spent = b1.transactions()[0].hash();
    let accepted = chain.add_block(b1);
    println!("\n✅ B1 {} accepted: {}", h1.short(), accepted);

    let pool = chain.get_max_height_utxo_pool();
    println!("   ├─ Tip height: {}", chain.max_height());
    println!("   ├─ O1 still unspent: {}", pool.contains(&o1));
    for utxo in pool.all_utxos() {
        let Some(output) = pool.get(&utxo) else {
            continue;
        };
        let label = if utxo.tx_hash == spent {
            "spend"
        } else {
            "coinbase"
        };
        println!("   ├─ {} {} worth {}", label, utxo, output.value);
    }
    println!(
        "   └─ Total at tip: {}",
        pool.total_value().unwrap_or_default()
    );

    Ok(())
}
