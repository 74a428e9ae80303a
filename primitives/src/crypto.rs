//! Cryptographic operations for the ledger.
//!
//! - Ed25519 for transaction input signatures
//! - BLAKE3 for transaction hashes, addresses and state commitments
//! - SHA-256 for block header hashing
//!
//! All operations are deterministic. Key generation is the only source of
//! randomness and is never reachable from the execution path.

use crate::types::{Address, Hash, ADDRESS_LEN};

/// Compute BLAKE3 hash of the input data.
pub fn hash_blake3(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Compute SHA-256 hash of the input data.
pub fn hash_sha256(data: &[u8]) -> Hash {
    use sha2::Digest;
    let result = sha2::Sha256::digest(data);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Derive an account address: the last 20 bytes of `BLAKE3(public_key)`.
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    let digest = hash_blake3(public_key);
    let mut addr = [0u8; ADDRESS_LEN];
    addr.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
    addr
}

/// Verify an Ed25519 signature.
///
/// Returns `false` for malformed public keys rather than erroring.
pub fn verify_ed25519(message: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = Signature::from_bytes(signature);
    verifying_key.verify(message, &sig).is_ok()
}

/// Sign a message with an Ed25519 private key.
pub fn sign_ed25519(message: &[u8], secret_key: &ed25519_dalek::SigningKey) -> [u8; 64] {
    use ed25519_dalek::Signer;
    secret_key.sign(message).to_bytes()
}

/// Generate an Ed25519 keypair from OS randomness.
///
/// For tests and wallets only. NEVER used inside the execution engine.
#[cfg(feature = "keygen")]
pub fn generate_keypair() -> (ed25519_dalek::VerifyingKey, ed25519_dalek::SigningKey) {
    let mut rng = rand::rngs::OsRng;
    let signing_key = ed25519_dalek::SigningKey::generate(&mut rng);
    let verifying_key = signing_key.verifying_key();
    (verifying_key, signing_key)
}
