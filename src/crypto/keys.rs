//! ECDSA key management
//!
//! Key pair generation, signing, and verification on the secp256k1 curve.
//! Addresses are uncompressed public keys in hex; signatures are
//! DER-serialized and sign the 32-byte transaction id directly.

use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid message digest")]
    InvalidMessage,
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the address: the uncompressed public key as hex
    pub fn address(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    /// Sign a hex-encoded 32-byte id, returning a DER signature in hex
    pub fn sign_id(&self, id_hex: &str) -> Result<String, KeyError> {
        let digest = hex::decode(id_hex).map_err(|_| KeyError::InvalidMessage)?;
        let message =
            Message::from_digest_slice(&digest).map_err(|_| KeyError::InvalidMessage)?;
        let secp = Secp256k1::new();
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(signature.serialize_der()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the secret half
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish()
    }
}

/// Verify a hex DER signature over a hex-encoded 32-byte id
///
/// The address is the signer's uncompressed public key. Any parse failure
/// counts as a failed verification.
pub fn verify_id(address: &str, id_hex: &str, signature_hex: &str) -> bool {
    let Ok(key_bytes) = hex::decode(address) else {
        return false;
    };
    let Ok(public_key) = PublicKey::from_slice(&key_bytes) else {
        return false;
    };
    let Ok(digest) = hex::decode(id_hex) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(&digest) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    let secp = Secp256k1::new();
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}
