//! Shared-secret handling
//!
//! Agents authenticate to the relay with a single pre-shared secret. The
//! relay compares it in constant time; `generate_secret` produces a fresh
//! value for operators to distribute.

/// Length of a generated secret in bytes (before hex encoding)
pub const SECRET_BYTES: usize = 32;

/// Generate a new random secret.
///
/// Returns a 64-character hex string (32 random bytes)
pub fn generate_secret() -> String {
    let bytes: [u8; SECRET_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Validate a supplied token against the configured secret.
///
/// Uses constant-time comparison over the token bytes. An empty configured
/// secret never matches, so a relay without a secret rejects every agent.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    if expected.is_empty() || provided.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a, b) in provided.bytes().zip(expected.bytes()) {
        result |= a ^ b;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_BYTES * 2);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_secret_unique() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn test_validate_token() {
        let token = "abc123def456";
        assert!(validate_token(token, token));
        assert!(!validate_token(token, "different"));
        assert!(!validate_token(token, "abc123def45"));
        assert!(!validate_token("abc123def457", token));
    }

    #[test]
    fn test_empty_secret_never_matches() {
        assert!(!validate_token("", ""));
        assert!(!validate_token("anything", ""));
    }
}
