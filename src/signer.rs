//! The public-key signing boundary
//!
//! The core treats the signature scheme as opaque: anything that can sign
//! bytes, verify bytes, and name its key qualifies. Ed25519 is the provided
//! implementation.

use crate::{Error, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::collections::HashMap;

/// An opaque signing primitive with a stable key identifier
pub trait SigningPrimitive: Send + Sync {
    /// Sign a payload
    fn sign(&self, payload: &[u8]) -> Vec<u8>;

    /// Verify a signature produced by this key
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;

    /// Stable identifier for this key, carried in every blob
    fn signer_id(&self) -> &[u8];
}

/// Resolves signer identifiers to verification on the receiving side
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` over `payload` for the key named `signer`
    ///
    /// An unknown signer is an invalid signature, reported as data, never as
    /// an error.
    fn verify(&self, signer: &[u8], payload: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 signing key
pub struct Ed25519Signer {
    key: SigningKey,
    id: Vec<u8>,
}

impl Ed25519Signer {
    /// Derive a key deterministically from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let id = key.verifying_key().as_bytes().to_vec();
        Ed25519Signer { key, id }
    }

    /// The verification half of this key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl SigningPrimitive for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.key.sign(payload).to_bytes().to_vec()
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        verify_ed25519(&self.key.verifying_key(), payload, signature)
    }

    fn signer_id(&self) -> &[u8] {
        &self.id
    }
}

/// A set of known verifying keys indexed by signer identifier
#[derive(Default)]
pub struct Keyring {
    keys: HashMap<Vec<u8>, VerifyingKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Keyring::default()
    }

    /// Register a verifying key under its own byte identity
    pub fn insert(&mut self, key: VerifyingKey) {
        self.keys.insert(key.as_bytes().to_vec(), key);
    }

    /// Register a verifying key from raw bytes
    pub fn insert_bytes(&mut self, bytes: &[u8; 32]) -> Result<()> {
        let key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        self.insert(key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl SignatureVerifier for Keyring {
    fn verify(&self, signer: &[u8], payload: &[u8], signature: &[u8]) -> bool {
        match self.keys.get(signer) {
            Some(key) => verify_ed25519(key, payload, signature),
            None => false,
        }
    }
}

fn verify_ed25519(key: &VerifyingKey, payload: &[u8], signature: &[u8]) -> bool {
    match Signature::from_slice(signature) {
        Ok(signature) => key.verify(payload, &signature).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = Ed25519Signer::from_seed([1u8; 32]);
        let sig = signer.sign(b"payload");
        assert!(signer.verify(b"payload", &sig));
        assert!(!signer.verify(b"other payload", &sig));
    }

    #[test]
    fn test_keyring_resolution() {
        let signer = Ed25519Signer::from_seed([2u8; 32]);
        let mut keyring = Keyring::new();
        keyring.insert(signer.verifying_key());

        let sig = signer.sign(b"hello");
        assert!(keyring.verify(signer.signer_id(), b"hello", &sig));
        // Unknown signer is just an invalid signature.
        assert!(!keyring.verify(b"nobody", b"hello", &sig));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let signer = Ed25519Signer::from_seed([3u8; 32]);
        assert!(!signer.verify(b"payload", b"short"));
        assert!(!signer.verify(b"payload", &[0u8; 64]));
    }
}
