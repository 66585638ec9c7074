//! Signing-secret strength validation
//!
//! Rejects weak shared secrets before a codec is ever built from them.

use thiserror::Error;

/// Minimum secret length: 32 bytes (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Recommended secret length: 64 bytes (512 bits).
pub const RECOMMENDED_SECRET_BYTES: usize = 64;

/// Minimum number of distinct byte values a secret must contain.
///
/// Catches degenerate secrets ("aaaa...", "01010101...") that satisfy the
/// length check while carrying almost no entropy.
const MIN_DISTINCT_BYTES: usize = 8;

/// Secret strength classification for secrets that pass validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    /// Meets the 256-bit minimum
    Acceptable,
    /// Meets the 512-bit recommendation
    Strong,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("signing secret is {length} bytes; minimum is {minimum} bytes")]
    TooShort { length: usize, minimum: usize },

    #[error("signing secret has too little variation to be a real key")]
    LowEntropy,
}

/// Validate a shared signing secret.
///
/// Returns the strength classification, or an error for secrets that must
/// never be used. Callers should treat `Acceptable` as worth a startup
/// warning and `Strong` as silence.
pub fn validate_secret(secret: &str) -> Result<SecretStrength, SecretError> {
    let bytes = secret.as_bytes();

    if bytes.len() < MIN_SECRET_BYTES {
        return Err(SecretError::TooShort {
            length: bytes.len(),
            minimum: MIN_SECRET_BYTES,
        });
    }

    let mut seen = [false; 256];
    let mut distinct = 0usize;
    for &b in bytes {
        if !seen[b as usize] {
            seen[b as usize] = true;
            distinct += 1;
        }
    }
    if distinct < MIN_DISTINCT_BYTES {
        return Err(SecretError::LowEntropy);
    }

    if bytes.len() >= RECOMMENDED_SECRET_BYTES {
        Ok(SecretStrength::Strong)
    } else {
        Ok(SecretStrength::Acceptable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_secret_rejected() {
        let result = validate_secret("0123456789abcdef");
        assert_eq!(
            result,
            Err(SecretError::TooShort {
                length: 16,
                minimum: MIN_SECRET_BYTES
            })
        );
    }

    #[test]
    fn test_repetitive_secret_rejected() {
        // 40 bytes long but only two distinct values
        let secret = "ababababababababababababababababababab";
        assert_eq!(validate_secret(secret), Err(SecretError::LowEntropy));
    }

    #[test]
    fn test_acceptable_secret() {
        let secret = "a-reasonable-development-secret-0123456789";
        assert_eq!(validate_secret(secret), Ok(SecretStrength::Acceptable));
    }

    #[test]
    fn test_strong_secret() {
        let secret =
            "Yx7rT2mQv9KfLz4WnB8cHd1PgJ6sEa3UoI5yRk0tNq/Xw+ZbCe2VhM7jDl9uFp4S";
        assert_eq!(validate_secret(secret), Ok(SecretStrength::Strong));
    }
}
