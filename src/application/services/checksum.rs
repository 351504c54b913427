use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256, the form stored for file checksums, reset tokens and cache keys.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
