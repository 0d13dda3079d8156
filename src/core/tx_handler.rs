//! Transaction validation against a UTXO pool
//!
//! `check_tx` decides whether one transaction may be applied to a pool;
//! `apply_txs` folds a batch into a pool in the order given, keeping the
//! transactions that validate against the state left by the ones before them.
//!
//! The batch pass is greedy: when two transactions claim the same output, the
//! one that comes first wins. No search for a larger compatible subset is
//! made, so reordering a conflicting batch can change the accepted set.

use crate::core::transaction::{Transaction, Value};
use crate::core::utxo::{OutputRef, UtxoPool};
use crate::crypto::{Secp256k1Verifier, SignatureVerifier};
use log::debug;
use std::collections::HashSet;
use thiserror::Error;

/// Reasons a transaction is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("Input claims unknown output {0}")]
    MissingOutput(OutputRef),
    #[error("Output {0} claimed more than once")]
    DoubleClaim(OutputRef),
    #[error("Input {0} is not signed")]
    MissingSignature(usize),
    #[error("Input {0} has an invalid signature")]
    BadSignature(usize),
    #[error("Claimed output {0} has a negative value")]
    NegativeInput(OutputRef),
    #[error("Output {0} has a negative value")]
    NegativeOutput(usize),
    #[error("Value overflow")]
    ValueOverflow,
    #[error("Outputs ({outputs}) exceed inputs ({inputs})")]
    Inflation { inputs: Value, outputs: Value },
}

/// Validate `tx` against `pool`, returning the fee (inputs minus outputs).
///
/// Per input, in order: the output exists, it was not already claimed by an
/// earlier input, the owner's signature verifies, its value is non-negative.
/// Then every declared output is non-negative and outputs do not exceed
/// inputs.
pub fn check_tx<V: SignatureVerifier + ?Sized>(
    tx: &Transaction,
    pool: &UtxoPool,
    verifier: &V,
) -> Result<Value, TxError> {
    let mut claimed: HashSet<OutputRef> = HashSet::with_capacity(tx.num_inputs());
    let mut input_sum = Value::ZERO;

    for (index, input) in tx.inputs().iter().enumerate() {
        let output = pool
            .get(&input.prev)
            .ok_or(TxError::MissingOutput(input.prev))?;

        if !claimed.insert(input.prev) {
            return Err(TxError::DoubleClaim(input.prev));
        }

        let signature = input
            .signature
            .as_deref()
            .ok_or(TxError::MissingSignature(index))?;
        if !verifier.verify(&output.owner, &tx.raw_data_to_sign(index), signature) {
            return Err(TxError::BadSignature(index));
        }

        if output.value < Value::ZERO {
            return Err(TxError::NegativeInput(input.prev));
        }
        input_sum = input_sum
            .checked_add(output.value)
            .ok_or(TxError::ValueOverflow)?;
    }

    let mut output_sum = Value::ZERO;
    for (index, output) in tx.outputs().iter().enumerate() {
        if output.value < Value::ZERO {
            return Err(TxError::NegativeOutput(index));
        }
        output_sum = output_sum
            .checked_add(output.value)
            .ok_or(TxError::ValueOverflow)?;
    }

    if output_sum > input_sum {
        return Err(TxError::Inflation {
            inputs: input_sum,
            outputs: output_sum,
        });
    }

    Ok(input_sum - output_sum)
}

/// Apply `txs` to `pool` in order, returning the ones accepted.
///
/// Each accepted transaction removes the outputs it claims and adds its own
/// outputs keyed by its hash. Rejected transactions are dropped silently.
pub fn apply_txs<'a, V: SignatureVerifier + ?Sized>(
    txs: &'a [Transaction],
    pool: &mut UtxoPool,
    verifier: &V,
) -> Vec<&'a Transaction> {
    let mut accepted = Vec::with_capacity(txs.len());

    for tx in txs {
        if let Err(err) = check_tx(tx, pool, verifier) {
            debug!("Dropping transaction {}: {}", tx.hash().short(), err);
            continue;
        }

        for input in tx.inputs() {
            pool.remove_utxo(&input.prev);
        }
        for (index, output) in tx.outputs().iter().enumerate() {
            pool.add_utxo(tx.output_ref(index as u32), output.clone());
        }
        accepted.push(tx);
    }

    accepted
}

/// Stand-alone validator owning its UTXO pool
#[derive(Debug, Clone)]
pub struct TxHandler<V = Secp256k1Verifier> {
    utxo_pool: UtxoPool,
    verifier: V,
}

impl TxHandler {
    pub fn new(utxo_pool: UtxoPool) -> Self {
        Self::with_verifier(utxo_pool, Secp256k1Verifier::new())
    }
}

impl<V: SignatureVerifier> TxHandler<V> {
    pub fn with_verifier(utxo_pool: UtxoPool, verifier: V) -> Self {
        Self {
            utxo_pool,
            verifier,
        }
    }

    /// Validate against the current pool, reporting the cause on failure
    pub fn check_tx(&self, tx: &Transaction) -> Result<Value, TxError> {
        check_tx(tx, &self.utxo_pool, &self.verifier)
    }

    pub fn is_valid_tx(&self, tx: &Transaction) -> bool {
        self.check_tx(tx).is_ok()
    }

    /// Apply a batch of proposed transactions, updating the pool
    pub fn handle_txs(&mut self, possible_txs: &[Transaction]) -> Vec<Transaction> {
        apply_txs(possible_txs, &mut self.utxo_pool, &self.verifier)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn utxo_pool(&self) -> &UtxoPool {
        &self.utxo_pool
    }

    pub fn into_utxo_pool(self) -> UtxoPool {
        self.utxo_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    struct Fixture {
        alice: KeyPair,
        bob: KeyPair,
        funding: Transaction,
        pool: UtxoPool,
    }

    /// Alice owns two outputs: 10 at index 0 and 4 at index 1
    fn fixture() -> Fixture {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let mut funding = Transaction::new();
        funding
            .add_output(Value::from(10), alice.public_key)
            .add_output(Value::from(4), alice.public_key);

        let mut pool = UtxoPool::new();
        for (i, output) in funding.outputs().iter().enumerate() {
            pool.add_utxo(funding.output_ref(i as u32), output.clone());
        }
        Fixture {
            alice,
            bob,
            funding,
            pool,
        }
    }

    fn spend(
        from: &KeyPair,
        prev: &Transaction,
        indices: &[u32],
        outputs: &[(i64, &KeyPair)],
    ) -> Transaction {
        let mut tx = Transaction::new();
        for &i in indices {
            tx.add_input(prev.hash(), i);
        }
        for (value, owner) in outputs {
            tx.add_output(Value::from(*value), owner.public_key);
        }
        tx.sign(from).unwrap();
        tx
    }

    #[test]
    fn test_valid_transaction_reports_fee() {
        let f = fixture();
        let tx = spend(&f.alice, &f.funding, &[0], &[(6, &f.bob), (3, &f.alice)]);
        let handler = TxHandler::new(f.pool);
        assert_eq!(handler.check_tx(&tx), Ok(Value::ONE));
        assert!(handler.is_valid_tx(&tx));
    }

    #[test]
    fn test_missing_output() {
        let f = fixture();
        let tx = spend(&f.alice, &f.funding, &[7], &[(1, &f.bob)]);
        let handler = TxHandler::new(f.pool);
        assert_eq!(
            handler.check_tx(&tx),
            Err(TxError::MissingOutput(f.funding.output_ref(7)))
        );
    }

    #[test]
    fn test_double_claim_within_transaction() {
        let f = fixture();
        let tx = spend(&f.alice, &f.funding, &[0, 0], &[(1, &f.bob)]);
        let handler = TxHandler::new(f.pool);
        assert_eq!(
            handler.check_tx(&tx),
            Err(TxError::DoubleClaim(f.funding.output_ref(0)))
        );
    }

    #[test]
    fn test_double_claim_detected_regardless_of_second_signature() {
        let f = fixture();
        let mut tx = Transaction::new();
        tx.add_input(f.funding.hash(), 0)
            .add_input(f.funding.hash(), 0)
            .add_output(Value::ONE, f.bob.public_key);
        tx.sign_input(0, &f.alice).unwrap();
        tx.add_signature(1, vec![0u8; 64]).unwrap();

        let handler = TxHandler::new(f.pool);
        assert_eq!(
            handler.check_tx(&tx),
            Err(TxError::DoubleClaim(f.funding.output_ref(0)))
        );
    }

    #[test]
    fn test_signature_gating() {
        let f = fixture();
        // Bob signs for Alice's output
        let tx = spend(&f.bob, &f.funding, &[0], &[(1, &f.bob)]);
        let handler = TxHandler::new(f.pool.clone());
        assert_eq!(handler.check_tx(&tx), Err(TxError::BadSignature(0)));

        let mut unsigned = Transaction::new();
        unsigned
            .add_input(f.funding.hash(), 0)
            .add_output(Value::ONE, f.bob.public_key);
        assert_eq!(handler.check_tx(&unsigned), Err(TxError::MissingSignature(0)));
    }

    #[test]
    fn test_signature_covers_outputs() {
        let f = fixture();
        let mut tx = spend(&f.alice, &f.funding, &[0], &[(5, &f.alice)]);
        // Redirect funds after signing
        tx.add_output(Value::from(5), f.bob.public_key);
        let handler = TxHandler::new(f.pool);
        assert_eq!(handler.check_tx(&tx), Err(TxError::BadSignature(0)));
    }

    #[test]
    fn test_negative_output_rejected() {
        let f = fixture();
        let tx = spend(&f.alice, &f.funding, &[0], &[(12, &f.bob), (-3, &f.alice)]);
        let handler = TxHandler::new(f.pool);
        assert_eq!(handler.check_tx(&tx), Err(TxError::NegativeOutput(1)));
    }

    #[test]
    fn test_negative_input_rejected() {
        let f = fixture();
        let mut pool = f.pool.clone();
        let bad = f.funding.output_ref(9);
        pool.add_utxo(
            bad,
            crate::core::Output::new(Value::from(-1), f.alice.public_key),
        );
        let tx = spend(&f.alice, &f.funding, &[9], &[(0, &f.bob)]);
        let handler = TxHandler::new(pool);
        assert_eq!(handler.check_tx(&tx), Err(TxError::NegativeInput(bad)));
    }

    #[test]
    fn test_inflation_rejected() {
        let f = fixture();
        let tx = spend(&f.alice, &f.funding, &[0], &[(11, &f.bob)]);
        let handler = TxHandler::new(f.pool);
        assert_eq!(
            handler.check_tx(&tx),
            Err(TxError::Inflation {
                inputs: Value::from(10),
                outputs: Value::from(11),
            })
        );
    }

    #[test]
    fn test_exact_spend_and_fractional_values() {
        let f = fixture();
        let mut tx = Transaction::new();
        tx.add_input(f.funding.hash(), 1)
            .add_output(Value::new(25, 1), f.bob.public_key)
            .add_output(Value::new(15, 1), f.alice.public_key);
        tx.sign(&f.alice).unwrap();
        let handler = TxHandler::new(f.pool);
        assert_eq!(handler.check_tx(&tx), Ok(Value::ZERO));
    }

    #[test]
    fn test_zero_input_transaction_cannot_mint() {
        let f = fixture();
        let mint = Transaction::coinbase(Value::from(50), f.alice.public_key);
        let handler = TxHandler::new(f.pool);
        assert!(matches!(handler.check_tx(&mint), Err(TxError::Inflation { .. })));
    }

    #[test]
    fn test_handle_txs_updates_pool() {
        let f = fixture();
        let tx = spend(&f.alice, &f.funding, &[0], &[(6, &f.bob), (3, &f.alice)]);
        let mut handler = TxHandler::new(f.pool);

        let accepted = handler.handle_txs(std::slice::from_ref(&tx));
        assert_eq!(accepted, vec![tx.clone()]);

        let pool = handler.utxo_pool();
        assert!(!pool.contains(&f.funding.output_ref(0)));
        assert!(pool.contains(&f.funding.output_ref(1)));
        assert_eq!(pool.get(&tx.output_ref(0)).unwrap().value, Value::from(6));
        assert_eq!(pool.get(&tx.output_ref(1)).unwrap().value, Value::from(3));
    }

    #[test]
    fn test_handle_txs_chains_within_batch() {
        let f = fixture();
        let first = spend(&f.alice, &f.funding, &[0], &[(10, &f.bob)]);
        let second = spend(&f.bob, &first, &[0], &[(9, &f.alice)]);

        // Child before parent is dropped, parent then child both land
        let mut handler = TxHandler::new(f.pool.clone());
        let accepted = handler.handle_txs(&[second.clone(), first.clone()]);
        assert_eq!(accepted, vec![first.clone()]);

        let mut handler = TxHandler::new(f.pool);
        let accepted = handler.handle_txs(&[first.clone(), second.clone()]);
        assert_eq!(accepted, vec![first, second]);
    }

    #[test]
    fn test_conflicts_resolved_by_order() {
        let f = fixture();
        let to_bob = spend(&f.alice, &f.funding, &[0], &[(10, &f.bob)]);
        let to_self = spend(&f.alice, &f.funding, &[0], &[(9, &f.alice)]);

        let mut handler = TxHandler::new(f.pool.clone());
        assert_eq!(
            handler.handle_txs(&[to_bob.clone(), to_self.clone()]),
            vec![to_bob.clone()]
        );

        let mut handler = TxHandler::new(f.pool);
        assert_eq!(
            handler.handle_txs(&[to_self.clone(), to_bob]),
            vec![to_self]
        );
    }

    #[test]
    fn test_invalid_transactions_silently_dropped() {
        let f = fixture();
        let good = spend(&f.alice, &f.funding, &[1], &[(4, &f.bob)]);
        let bad = spend(&f.alice, &f.funding, &[0], &[(20, &f.bob)]);
        let mut handler = TxHandler::new(f.pool);

        let accepted = handler.handle_txs(&[bad, good.clone()]);
        assert_eq!(accepted, vec![good]);
        assert!(handler.utxo_pool().contains(&f.funding.output_ref(0)));
    }

    #[test]
    fn test_custom_verifier() {
        struct RejectAll;
        impl SignatureVerifier for RejectAll {
            fn verify(&self, _: &secp256k1::PublicKey, _: &[u8], _: &[u8]) -> bool {
                false
            }
        }

        let f = fixture();
        let tx = spend(&f.alice, &f.funding, &[0], &[(1, &f.bob)]);
        let handler = TxHandler::with_verifier(f.pool, RejectAll);
        assert_eq!(handler.check_tx(&tx), Err(TxError::BadSignature(0)));
        assert!(handler.into_utxo_pool().contains(&f.funding.output_ref(0)));
    }
}
