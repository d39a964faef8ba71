//! HMAC-signed bearer tokens.
//!
//! Tokens are a hex-encoded JSON claims payload joined to an HMAC-SHA256
//! signature computed with a key derived from the configured secret via
//! HKDF. Verification uses constant-time comparison.

use crate::auth::store::Role;
use crate::auth::AuthError;
use chrono::{Duration, Utc};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default bearer-token lifetime.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// Context string for deriving the token signing key.
const TOKEN_SIGNATURE_INFO: &[u8] = b"pw-bearer-token-v1";

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject username.
    pub sub: String,
    /// Role granted at login time.
    pub role: Role,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Issues and verifies bearer tokens for the API.
#[derive(Clone)]
pub struct TokenSigner {
    signing_key: [u8; 32],
    ttl_minutes: i64,
}

impl TokenSigner {
    /// Creates a signer from the configured secret.
    pub fn new(secret: &[u8]) -> Self {
        let hk = Hkdf::<Sha256>::new(None, secret);
        let mut signing_key = [0u8; 32];
        // Expand cannot fail for a 32-byte output.
        hk.expand(TOKEN_SIGNATURE_INFO, &mut signing_key)
            .unwrap_or_default();
        Self {
            signing_key,
            ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }

    /// Creates a signer with a random ephemeral secret (mock mode).
    pub fn ephemeral() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret)
    }

    /// Overrides the token lifetime.
    pub fn with_ttl_minutes(mut self, ttl_minutes: i64) -> Self {
        self.ttl_minutes = ttl_minutes;
        self
    }

    /// Issues a token for a user.
    pub fn issue(&self, username: &str, role: Role) -> Result<String, AuthError> {
        let claims = Claims {
            sub: username.to_string(),
            role,
            exp: (Utc::now() + Duration::minutes(self.ttl_minutes)).timestamp(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;
        let signature = self.sign(&payload);
        Ok(format!("{}.{}", hex::encode(payload), signature))
    }

    /// Verifies a token's signature and expiry, returning its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload_hex, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = hex::decode(payload_hex).map_err(|_| AuthError::InvalidToken)?;

        let expected = self.sign(&payload);
        if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            return Err(AuthError::InvalidToken);
        }

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;
        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("HMAC accepts any key length");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let signer = TokenSigner::new(b"test-secret");
        let token = signer.issue("alice", Role::Analyst).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::Analyst);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = TokenSigner::new(b"test-secret");
        let token = signer.issue("alice", Role::Analyst).unwrap();

        let (payload_hex, signature) = token.split_once('.').unwrap();
        let mut payload = hex::decode(payload_hex).unwrap();
        // Flip one byte of the claims payload.
        payload[0] ^= 0x01;
        let forged = format!("{}.{}", hex::encode(payload), signature);

        assert!(signer.verify(&forged).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signer = TokenSigner::new(b"secret-one");
        let other = TokenSigner::new(b"secret-two");
        let token = signer.issue("alice", Role::Admin).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = TokenSigner::new(b"test-secret").with_ttl_minutes(-1);
        let token = signer.issue("alice", Role::Analyst).unwrap();
        assert!(matches!(signer.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_tokens_rejected() {
        let signer = TokenSigner::new(b"test-secret");
        assert!(signer.verify("").is_err());
        assert!(signer.verify("no-dot-here").is_err());
        assert!(signer.verify("abc.def").is_err());
    }

    #[test]
    fn test_ephemeral_signers_are_independent() {
        let a = TokenSigner::ephemeral();
        let b = TokenSigner::ephemeral();
        let token = a.issue("alice", Role::Analyst).unwrap();
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }
}
