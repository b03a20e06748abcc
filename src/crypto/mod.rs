//! Cryptographic primitives for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and hex/binary conversion
//! - ECDSA key management (secp256k1, DER signatures)
//! - The address predicate (uncompressed public key hex)

pub mod hash;
pub mod keys;

pub use hash::{hash_matches_difficulty, hex_to_binary, is_valid_address, sha256_hex};
pub use keys::{verify_id, KeyError, KeyPair};
