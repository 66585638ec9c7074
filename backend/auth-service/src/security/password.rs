//! Password policy, hashing, and verification
//!
//! Policy and mechanism are separate: `PasswordPolicy` decides what counts
//! as an acceptable password, Argon2id turns an accepted one into a PHC
//! string for storage.

use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zxcvbn::zxcvbn;

/// Acceptance rules applied before any password is hashed.
///
/// Composition requirements (each character class present) plus a zxcvbn
/// score floor, so "Password123!" style strings fail on guessability even
/// though they tick every class box.
pub struct PasswordPolicy {
    min_length: usize,
    min_score: u8,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_score: 3,
        }
    }
}

impl PasswordPolicy {
    const CHARACTER_CLASSES: [(&'static str, fn(char) -> bool); 4] = [
        ("an uppercase letter", char::is_uppercase),
        ("a lowercase letter", char::is_lowercase),
        ("a digit", |c| c.is_ascii_digit()),
        ("a special character", |c| !c.is_alphanumeric()),
    ];

    pub fn check(&self, candidate: &str) -> Result<()> {
        if candidate.len() < self.min_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }

        for (requirement, class) in Self::CHARACTER_CLASSES {
            if !candidate.chars().any(class) {
                return Err(AuthError::WeakPassword(format!(
                    "Password must contain {requirement}"
                )));
            }
        }

        let estimate = zxcvbn(candidate, &[]).map_err(|e| {
            AuthError::Internal(format!("Password strength estimation failed: {e}"))
        })?;
        if estimate.score() < self.min_score {
            return Err(AuthError::WeakPassword(
                "Password is too guessable".to_string(),
            ));
        }

        Ok(())
    }
}

/// Check the password against the default policy, then hash it with Argon2id
/// and a fresh random salt. Returns a PHC-formatted string.
pub fn hash_password(password: &str) -> Result<String> {
    PasswordPolicy::default().check(password)?;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {e}")))
}

/// Verify a candidate against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; only corrupt hash material is an error.
pub fn verify_password(candidate: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::Internal(format!("Stored hash is not PHC-formatted: {e}")))?;

    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Internal(format!(
            "Password verification failed: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let password = "Tr4verse!Planet";
        let hash = hash_password(password).expect("strong password should hash");

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("Tr4verse!Planets", &hash).unwrap());
    }

    #[test]
    fn test_policy_rejects_each_missing_requirement() {
        let policy = PasswordPolicy::default();

        for weak in [
            "Sh0r!t",           // too short
            "lowercase123!",    // no uppercase
            "UPPERCASE123!",    // no lowercase
            "NoDigitsHere!",    // no digit
            "NoSpecials123",    // no special character
            "Password123!",     // guessable
        ] {
            let result = policy.check(weak);
            assert!(
                matches!(result, Err(AuthError::WeakPassword(_))),
                "{weak:?} should be rejected"
            );
        }

        assert!(policy.check("Tr4verse!Planet").is_ok());
    }

    #[test]
    fn test_hashing_enforces_the_policy() {
        // The policy gate sits in front of the hasher itself.
        let result = hash_password("Password123!");
        assert!(matches!(result, Err(AuthError::WeakPassword(_))));
    }

    #[test]
    fn test_verify_rejects_corrupt_hash() {
        let result = verify_password("whatever", "not-a-phc-string");
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
