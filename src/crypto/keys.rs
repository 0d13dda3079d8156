//! ECDSA key management for the ledger
//!
//! Provides key pair generation, signing, and the signature verification
//! service consumed by transaction validation, using the secp256k1 curve
//! (same as Bitcoin).

use rand::rngs::OsRng;
use rand::Rng;
use ripemd::Ripemd160;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey, VerifyOnly};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::hash::sha256;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Checks that `signature` authorizes `message` for `public_key`.
///
/// A `false` is final: implementations never report transient failures.
pub trait SignatureVerifier {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool;
}

/// ECDSA/secp256k1 verifier over SHA-256 message digests
#[derive(Debug, Clone)]
pub struct Secp256k1Verifier {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Verifier {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for Secp256k1Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
        let Ok(sig) = ecdsa::Signature::from_compact(signature) else {
            return false;
        };
        let Ok(message) = Message::from_digest_slice(&sha256(message)) else {
            return false;
        };
        self.secp.verify_ecdsa(&message, &sig, public_key).is_ok()
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a key pair from a caller-supplied RNG (seeded simulations)
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(rng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Base58Check address of the public key
    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key)
    }

    /// Sign a message with the private key
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_message(&self.secret_key, message)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Convert a public key to a display address
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let sha256_hash = sha256(&public_key.serialize());

    let mut ripemd = Ripemd160::new();
    ripemd.update(&sha256_hash);
    let ripemd_hash = ripemd.finalize();

    // Version byte 0x00, as for Bitcoin mainnet
    let mut address_bytes = vec![0x00];
    address_bytes.extend_from_slice(&ripemd_hash);

    // First 4 bytes of double SHA256
    let checksum = Sha256::digest(Sha256::digest(&address_bytes));
    address_bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(address_bytes).into_string()
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign the SHA-256 digest of `message`, returning a 64-byte compact signature
pub fn sign_message(secret_key: &SecretKey, message: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(&sha256(message))?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(signature.serialize_compact().to_vec())
}
