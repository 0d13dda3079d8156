//! Transaction handling for the ledger
//!
//! Implements a UTXO-based transaction model with digital signatures.
//! A transaction's identity is the SHA-256 of its serialized form: every
//! mutation recomputes it, and nothing outside this module assigns it.

use crate::core::utxo::OutputRef;
use crate::crypto::{Hash, KeyError, KeyPair};
use rust_decimal::Decimal;
use secp256k1::PublicKey;
use serde::Serialize;
use thiserror::Error;

/// Monetary amount carried by an output.
///
/// Signed so that a negative declared value can be represented and rejected
/// by validation rather than by the type system.
pub type Value = Decimal;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction construction errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Input index {0} out of range")]
    InputIndexOutOfRange(usize),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output: an amount locked to an owner key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    pub value: Value,
    pub owner: PublicKey,
}

impl Output {
    pub fn new(value: Value, owner: PublicKey) -> Self {
        Self { value, owner }
    }

    /// Check if this output belongs to the given key
    pub fn is_owned_by(&self, owner: &PublicKey) -> bool {
        self.owner == *owner
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.serialize());
        buf.extend_from_slice(&self.owner.serialize());
    }
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (reference to a previous output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxInput {
    /// The output being spent
    pub prev: OutputRef,
    /// Signature by the output's owner over `raw_data_to_sign(position)`
    pub signature: Option<Vec<u8>>,
}

impl TxInput {
    fn write_ref_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.prev.tx_hash.as_bytes());
        buf.extend_from_slice(&self.prev.index.to_be_bytes());
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A ledger transaction
///
/// A transaction without inputs is a coinbase: it only mints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    inputs: Vec<TxInput>,
    outputs: Vec<Output>,
    hash: Hash,
}

impl Transaction {
    /// Create an empty transaction
    pub fn new() -> Self {
        let mut tx = Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            hash: Hash::from_bytes([0u8; 32]),
        };
        tx.rehash();
        tx
    }

    /// Create a coinbase transaction minting `value` to `owner`
    pub fn coinbase(value: Value, owner: PublicKey) -> Self {
        let mut tx = Self::new();
        tx.add_output(value, owner);
        tx
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn input(&self, index: usize) -> Option<&TxInput> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&Output> {
        self.outputs.get(index)
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Reference to this transaction's output at `index`
    pub fn output_ref(&self, index: u32) -> OutputRef {
        OutputRef::new(self.hash, index)
    }

    /// Spend the output `index` of transaction `prev_tx_hash` (unsigned)
    pub fn add_input(&mut self, prev_tx_hash: Hash, index: u32) -> &mut Self {
        self.inputs.push(TxInput {
            prev: OutputRef::new(prev_tx_hash, index),
            signature: None,
        });
        self.rehash();
        self
    }

    pub fn add_output(&mut self, value: Value, owner: PublicKey) -> &mut Self {
        self.outputs.push(Output::new(value, owner));
        self.rehash();
        self
    }

    pub fn remove_input(&mut self, index: usize) -> Option<TxInput> {
        if index >= self.inputs.len() {
            return None;
        }
        let removed = self.inputs.remove(index);
        self.rehash();
        Some(removed)
    }

    /// Attach a signature to the input at `index`
    pub fn add_signature(
        &mut self,
        index: usize,
        signature: Vec<u8>,
    ) -> Result<(), TransactionError> {
        let input = self
            .inputs
            .get_mut(index)
            .ok_or(TransactionError::InputIndexOutOfRange(index))?;
        input.signature = Some(signature);
        self.rehash();
        Ok(())
    }

    /// Sign the input at `index` with `key_pair`
    pub fn sign_input(&mut self, index: usize, key_pair: &KeyPair) -> Result<(), TransactionError> {
        if index >= self.inputs.len() {
            return Err(TransactionError::InputIndexOutOfRange(index));
        }
        let signature = key_pair.sign(&self.raw_data_to_sign(index))?;
        self.add_signature(index, signature)
    }

    /// Sign every input with the same key pair
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        for index in 0..self.inputs.len() {
            self.sign_input(index, key_pair)?;
        }
        Ok(())
    }

    /// The message signed by input `index`: every input reference and every
    /// output, followed by the input position.
    ///
    /// Signatures are excluded, so signing one input never invalidates another.
    pub fn raw_data_to_sign(&self, index: usize) -> Vec<u8> {
        let mut buf = self.unsigned_content();
        buf.extend_from_slice(&(index as u64).to_be_bytes());
        buf
    }

    /// Full serialized form, signatures included
    pub fn raw_tx(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.inputs.len() * 110 + self.outputs.len() * 49);
        buf.extend_from_slice(&(self.inputs.len() as u32).to_be_bytes());
        for input in &self.inputs {
            input.write_ref_to(&mut buf);
            match &input.signature {
                Some(sig) => {
                    buf.extend_from_slice(&(sig.len() as u32).to_be_bytes());
                    buf.extend_from_slice(sig);
                }
                None => buf.extend_from_slice(&u32::MAX.to_be_bytes()),
            }
        }
        buf.extend_from_slice(&(self.outputs.len() as u32).to_be_bytes());
        for output in &self.outputs {
            output.write_to(&mut buf);
        }
        buf
    }

    /// Sum of declared output values, `None` on overflow
    pub fn total_output(&self) -> Option<Value> {
        self.outputs
            .iter()
            .try_fold(Value::ZERO, |acc, o| acc.checked_add(o.value))
    }

    fn unsigned_content(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.inputs.len() * 36 + self.outputs.len() * 49);
        buf.extend_from_slice(&(self.inputs.len() as u32).to_be_bytes());
        for input in &self.inputs {
            input.write_ref_to(&mut buf);
        }
        buf.extend_from_slice(&(self.outputs.len() as u32).to_be_bytes());
        for output in &self.outputs {
            output.write_to(&mut buf);
        }
        buf
    }

    fn rehash(&mut self) {
        self.hash = Hash::digest(&self.raw_tx());
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_transaction() {
        let kp = KeyPair::generate();
        let tx = Transaction::coinbase(Value::from(25), kp.public_key);
        assert!(tx.is_coinbase());
        assert_eq!(tx.num_outputs(), 1);
        assert_eq!(tx.total_output(), Some(Value::from(25)));
        assert!(tx.output(0).unwrap().is_owned_by(&kp.public_key));
    }

    #[test]
    fn test_hash_tracks_content() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::new();
        let empty = tx.hash();

        tx.add_input(Hash::digest(b"prev"), 0);
        let with_input = tx.hash();
        assert_ne!(empty, with_input);

        tx.add_output(Value::from(3), kp.public_key);
        let with_output = tx.hash();
        assert_ne!(with_input, with_output);

        tx.sign_input(0, &kp).unwrap();
        assert_ne!(with_output, tx.hash());

        tx.remove_input(0).unwrap();
        assert!(tx.is_coinbase());
    }

    #[test]
    fn test_identical_content_identical_hash() {
        let kp = KeyPair::generate();
        let a = Transaction::coinbase(Value::from(5), kp.public_key);
        let b = Transaction::coinbase(Value::from(5), kp.public_key);
        let c = Transaction::coinbase(Value::from(6), kp.public_key);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_signing_data_binds_position_not_signatures() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::new();
        tx.add_input(Hash::digest(b"a"), 0)
            .add_input(Hash::digest(b"b"), 1)
            .add_output(Value::from(1), kp.public_key);

        let first = tx.raw_data_to_sign(0);
        assert_ne!(first, tx.raw_data_to_sign(1));

        tx.sign_input(1, &kp).unwrap();
        assert_eq!(first, tx.raw_data_to_sign(0));
    }

    #[test]
    fn test_sign_out_of_range() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::coinbase(Value::ONE, kp.public_key);
        assert!(matches!(
            tx.sign_input(0, &kp),
            Err(TransactionError::InputIndexOutOfRange(0))
        ));
        assert!(tx.add_signature(3, vec![1, 2]).is_err());
        assert!(tx.remove_input(0).is_none());
    }

    #[test]
    fn test_total_output_overflow() {
        let kp = KeyPair::generate();
        let mut tx = Transaction::new();
        tx.add_output(Value::MAX, kp.public_key)
            .add_output(Value::MAX, kp.public_key);
        assert_eq!(tx.total_output(), None);
    }
}
