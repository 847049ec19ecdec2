//! Ed25519 signing of record payloads.
//!
//! Key material is the 64-byte keypair encoding (seed followed by public key)
//! carried hex-encoded in the job file.

use crate::job::error::KeyError;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey, KEYPAIR_LENGTH, SIGNATURE_LENGTH};

pub struct SecretKey {
    inner: SigningKey,
}

impl SecretKey {
    pub fn from_hex(secret_key_hex: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret_key_hex.trim()).map_err(KeyError::InvalidHex)?;
        let keypair: [u8; KEYPAIR_LENGTH] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| KeyError::InvalidLength {
                    expected: KEYPAIR_LENGTH,
                    actual: bytes.len(),
                })?;
        let inner = SigningKey::from_keypair_bytes(&keypair).map_err(KeyError::Mismatched)?;
        Ok(Self { inner })
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.inner.sign(message).to_bytes()
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.inner.verifying_key()
    }
}

/// Decodes `secret_key_hex` and signs `message` with it.
pub fn sign(secret_key_hex: &str, message: &[u8]) -> Result<[u8; SIGNATURE_LENGTH], KeyError> {
    Ok(SecretKey::from_hex(secret_key_hex)?.sign(message))
}
