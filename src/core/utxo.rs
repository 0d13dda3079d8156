//! Unspent transaction outputs
//!
//! `UtxoPool` maps an output reference to the output it names. One pool is a
//! complete snapshot of what is spendable at a single point in the chain.

use crate::core::transaction::{Output, Value};
use crate::crypto::Hash;
use secp256k1::PublicKey;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Identifies one output: the creating transaction's hash and the output's
/// position in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OutputRef {
    pub tx_hash: Hash,
    pub index: u32,
}

impl OutputRef {
    pub fn new(tx_hash: Hash, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash.short(), self.index)
    }
}

/// The set of unspent outputs at one point in the chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoPool {
    utxos: HashMap<OutputRef, Output>,
}

impl UtxoPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the output named by `utxo`
    pub fn add_utxo(&mut self, utxo: OutputRef, output: Output) {
        self.utxos.insert(utxo, output);
    }

    pub fn remove_utxo(&mut self, utxo: &OutputRef) -> Option<Output> {
        self.utxos.remove(utxo)
    }

    pub fn get(&self, utxo: &OutputRef) -> Option<&Output> {
        self.utxos.get(utxo)
    }

    pub fn contains(&self, utxo: &OutputRef) -> bool {
        self.utxos.contains_key(utxo)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutputRef, &Output)> {
        self.utxos.iter()
    }

    /// All output references, sorted for deterministic traversal
    pub fn all_utxos(&self) -> Vec<OutputRef> {
        let mut refs: Vec<OutputRef> = self.utxos.keys().copied().collect();
        refs.sort();
        refs
    }

    /// Outputs locked to `owner`, sorted by reference
    pub fn utxos_for_owner(&self, owner: &PublicKey) -> Vec<(OutputRef, Output)> {
        let mut owned: Vec<(OutputRef, Output)> = self
            .utxos
            .iter()
            .filter(|(_, output)| output.is_owned_by(owner))
            .map(|(utxo, output)| (*utxo, output.clone()))
            .collect();
        owned.sort_by(|a, b| a.0.cmp(&b.0));
        owned
    }

    /// Sum of every unspent value, `None` on overflow
    pub fn total_value(&self) -> Option<Value> {
        self.utxos
            .values()
            .try_fold(Value::ZERO, |acc, o| acc.checked_add(o.value))
    }
}
