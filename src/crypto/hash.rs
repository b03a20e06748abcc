//! SHA-256 hashing and hex utilities
//!
//! Block hashes and transaction ids are SHA-256 digests over ASCII
//! concatenations, and proof-of-work is judged on the binary expansion
//! of the hex digest.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of a string and returns it as lowercase hex
pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Expands a hex string into its binary-digit representation
///
/// Each hex digit becomes four `0`/`1` characters. Returns `None` if the
/// input contains a non-hex character.
pub fn hex_to_binary(hex_str: &str) -> Option<String> {
    let mut binary = String::with_capacity(hex_str.len() * 4);
    for c in hex_str.chars() {
        let nibble = c.to_digit(16)?;
        for shift in (0..4).rev() {
            binary.push(if nibble >> shift & 1 == 1 { '1' } else { '0' });
        }
    }
    Some(binary)
}

/// Checks whether a hex hash starts with `difficulty` zero bits
pub fn hash_matches_difficulty(hash: &str, difficulty: u32) -> bool {
    match hex_to_binary(hash) {
        Some(binary) => {
            binary.len() >= difficulty as usize
                && binary.bytes().take(difficulty as usize).all(|b| b == b'0')
        }
        None => false,
    }
}

/// Validates an address: an uncompressed secp256k1 public key in hex
///
/// 130 characters, `04` prefix, hex digits only.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == 130
        && address.starts_with("04")
        && address.chars().all(|c| c.is_ascii_hexdigit())
}
