//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the content digest type
//! - ECDSA key management (secp256k1)
//! - The signature verification service used by transaction validation

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, sha256, sha256_hex, Hash, HASH_LEN};
pub use keys::{
    public_key_from_hex, public_key_to_address, sign_message, KeyError, KeyPair,
    Secp256k1Verifier, SignatureVerifier,
};
