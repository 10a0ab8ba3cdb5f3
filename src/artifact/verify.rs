use sha2::{Digest, Sha256};

use crate::error::ServiceError;

/// Lowercase hexadecimal SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Returns `bytes` unchanged when its digest equals `expected`.
pub fn verify_digest(name: &str, bytes: Vec<u8>, expected: &str) -> Result<Vec<u8>, ServiceError> {
    let actual = sha256_hex(&bytes);
    if actual != expected {
        return Err(ServiceError::Integrity {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(bytes)
}
