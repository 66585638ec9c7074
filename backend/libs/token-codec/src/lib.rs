//! Stateless signing and verification of Storefront auth tokens
//!
//! This library owns the token wire format shared by every service that
//! issues or checks credentials: a compact three-part signed structure
//! (header, flat claim payload, signature) verifiable by any holder of the
//! shared secret, independently of the issuing process's memory.
//!
//! ## Security Design
//!
//! - **HS256 only**: one symmetric algorithm, no negotiation, no confusion
//!   attacks
//! - **No weak secrets**: the codec refuses to construct with a secret under
//!   256 bits, so key strength is a startup invariant rather than a per-call
//!   check
//! - **Separable checks**: `verify` answers only "authentic and unexpired";
//!   business-level validity (role set, token version) is the caller's
//!   second step

use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod secret;

pub use secret::{validate_secret, SecretError, SecretStrength};

/// Signing/verification algorithm for all Storefront tokens.
const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claim set carried by access and refresh tokens.
///
/// Access tokens carry the full set. Refresh tokens carry only
/// `sub`/`iat`/`exp`: omitting `roles` and `tv` forces the refresh path to
/// re-derive both from the credential store, so a refresh token can never
/// smuggle stale authority past a credential change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account username)
    pub sub: String,
    /// Role-authority names (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Account token-version snapshot (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tv: Option<i32>,
    /// Issued at (Unix timestamp, seconds)
    pub iat: i64,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
}

impl Claims {
    /// Whether this claim set belongs to an access token.
    ///
    /// Refresh tokens never carry a token-version snapshot.
    pub fn is_access(&self) -> bool {
        self.tv.is_some()
    }
}

/// Verification and signing failures.
///
/// `Expired` is distinct from `InvalidSignature` and `Malformed` because
/// callers treat them differently: an expired token presented at logout is
/// already moot, while a bad signature never enters the revocation store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("token is expired")]
    Expired,

    #[error("failed to sign claims: {0}")]
    Signing(String),
}

/// Stateless HS256 codec over a shared symmetric secret.
///
/// Keys are derived once at construction and immutable thereafter; the codec
/// is cheap to clone and safe to share across request handlers.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    /// Build a codec from the configured shared secret.
    ///
    /// Rejects secrets shorter than 256 bits. Call this once at startup and
    /// fail fast: a service must never come up with a weak signing key.
    pub fn new(secret: &str) -> Result<Self, SecretError> {
        match secret::validate_secret(secret)? {
            SecretStrength::Acceptable | SecretStrength::Strong => {}
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Serialize and sign a claim set.
    ///
    /// Never fails for well-formed claims; an encoding failure indicates a
    /// broken runtime, not bad input.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(TOKEN_ALGORITHM), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// Succeeds for any authentic, unexpired token regardless of whether its
    /// business semantics (token version, revocation) will later reject it.
    /// No expiry leeway: a token whose `exp` has passed is expired.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => Err(match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const TEST_SECRET: &str = "an-integration-test-secret-of-sufficient-length";

    fn codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET).expect("test secret should be accepted")
    }

    fn access_claims(now: i64) -> Claims {
        Claims {
            sub: "alice".to_string(),
            roles: Some(vec!["USER".to_string(), "ADMIN".to_string()]),
            tv: Some(3),
            iat: now,
            exp: now + 900,
        }
    }

    #[test]
    fn test_sign_verify_round_trip() {
        // GIVEN: A full access claim set
        let now = chrono::Utc::now().timestamp();
        let claims = access_claims(now);

        // WHEN: We sign and then verify before expiry
        let token = codec().sign(&claims).unwrap();
        let decoded = codec().verify(&token).unwrap();

        // THEN: The claims survive the round trip exactly
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        // GIVEN: A token whose exp is in the past
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            exp: now - 120,
            ..access_claims(now - 1000)
        };
        let token = codec().sign(&claims).unwrap();

        // THEN: Verification fails with Expired, not any other kind
        assert_eq!(codec().verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        // GIVEN: A token signed under a different secret
        let other =
            TokenCodec::new("a-completely-different-secret-also-long-enough").unwrap();
        let now = chrono::Utc::now().timestamp();
        let token = other.sign(&access_claims(now)).unwrap();

        // THEN: Our codec flags the signature
        assert_eq!(codec().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert_eq!(
            codec().verify("not-even-a-token"),
            Err(TokenError::Malformed)
        );
        assert_eq!(codec().verify("a.b.c"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tampered_payload_fails_signature_check() {
        // GIVEN: A valid token with one payload byte flipped
        let now = chrono::Utc::now().timestamp();
        let token = codec().sign(&access_claims(now)).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();

        let mut payload = URL_SAFE_NO_PAD.decode(&parts[1]).unwrap();
        let idx = payload.len() / 2;
        payload[idx] ^= 0x01;
        parts[1] = URL_SAFE_NO_PAD.encode(&payload);
        let tampered = parts.join(".");

        // THEN: Verification does not return Ok
        assert!(codec().verify(&tampered).is_err());
    }

    #[test]
    fn test_refresh_claims_omit_roles_and_version_on_wire() {
        // GIVEN: Refresh-shaped claims (no roles, no tv)
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "alice".to_string(),
            roles: None,
            tv: None,
            iat: now,
            exp: now + 86_400,
        };
        let token = codec().sign(&claims).unwrap();

        // WHEN: We inspect the raw payload segment
        let payload_b64 = token.split('.').nth(1).unwrap();
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        // THEN: The keys are absent entirely, not null
        assert!(json.get("roles").is_none());
        assert!(json.get("tv").is_none());
        assert!(!claims.is_access());
    }

    #[test]
    fn test_weak_secret_rejected_at_construction() {
        let result = TokenCodec::new("too-short");
        assert!(matches!(result, Err(SecretError::TooShort { .. })));
    }
}
