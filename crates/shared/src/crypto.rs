//! Cryptographic utilities for API key hashing.

use sha2::{Digest, Sha256};

/// Prefix carried by every API key issued for this service.
pub const API_KEY_PREFIX: &str = "fl_";

/// Minimum key length: prefix plus an 8 character identifier.
pub const MIN_API_KEY_LENGTH: usize = 11;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extracts the display prefix from an API key (first 8 characters after "fl_").
pub fn extract_key_prefix(key: &str) -> Option<&str> {
    if key.starts_with(API_KEY_PREFIX) && key.len() >= MIN_API_KEY_LENGTH {
        key.get(API_KEY_PREFIX.len()..MIN_API_KEY_LENGTH)
    } else {
        None
    }
}

/// Returns true if the key has the expected shape before any database lookup.
pub fn is_well_formed_key(key: &str) -> bool {
    extract_key_prefix(key).is_some()
}
