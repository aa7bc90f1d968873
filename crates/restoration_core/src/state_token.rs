//! crates/restoration_core/src/state_token.rs
//!
//! Stateless CSRF protection for the OAuth redirect. A token is
//! `"{unix_ts}.{nonce}.{hex(hmac_sha256(secret, "{unix_ts}.{nonce}"))}"`, so the
//! callback can be checked without storing anything server-side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// How long an issued state token stays valid.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(5 * 60);

/// Why a state token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTokenError {
    #[error("state token is malformed")]
    Malformed,
    #[error("state token signature does not match")]
    BadSignature,
    #[error("state token has expired")]
    Expired,
}

/// Issues and verifies signed, time-limited OAuth `state` values.
#[derive(Clone)]
pub struct StateTokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for StateTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTokenSigner")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl StateTokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token stamped with the current time.
    pub fn issue(&self) -> String {
        self.issue_at(Utc::now().timestamp())
    }

    /// Issues a token stamped with `issued_at` (Unix seconds).
    pub fn issue_at(&self, issued_at: i64) -> String {
        let nonce_bytes: [u8; 8] = rand::rng().random();
        let nonce = URL_SAFE_NO_PAD.encode(nonce_bytes);
        let raw = format!("{}.{}", issued_at, nonce);
        let signature = hex::encode(self.mac(&raw).finalize().into_bytes());
        format!("{}.{}", raw, signature)
    }

    /// Verifies `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<(), StateTokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verifies `token` as if the current time were `now` (Unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<(), StateTokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [timestamp, nonce, signature] = parts.as_slice() else {
            return Err(StateTokenError::Malformed);
        };
        if timestamp.is_empty() || nonce.is_empty() {
            return Err(StateTokenError::Malformed);
        }

        // Only the exact lowercase spelling produced by `issue_at` is accepted.
        if !is_canonical_hex(signature) {
            return Err(StateTokenError::BadSignature);
        }
        let signature = hex::decode(signature).map_err(|_| StateTokenError::BadSignature)?;
        self.mac(&format!("{}.{}", timestamp, nonce))
            .verify_slice(&signature)
            .map_err(|_| StateTokenError::BadSignature)?;

        let issued_at: i64 = timestamp.parse().map_err(|_| StateTokenError::Malformed)?;
        let age = now.saturating_sub(issued_at);
        if age > self.ttl.as_secs() as i64 {
            return Err(StateTokenError::Expired);
        }
        Ok(())
    }

    fn mac(&self, message: &str) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        mac
    }
}

/// Hex-encoded HMAC-SHA-256 output length.
const SIGNATURE_HEX_LEN: usize = 64;

fn is_canonical_hex(signature: &str) -> bool {
    signature.len() == SIGNATURE_HEX_LEN
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> StateTokenSigner {
        StateTokenSigner::new("test-secret-value", DEFAULT_STATE_TTL)
    }

    #[test]
    fn test_fresh_token_verifies() {
        let signer = signer();
        let token = signer.issue();
        assert_eq!(signer.verify(&token), Ok(()));
    }

    #[test]
    fn test_token_has_three_url_safe_parts() {
        let token = signer().issue_at(1_700_000_000);
        let parts: Vec<&str> = token.split('.').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "1700000000");
        assert_eq!(parts[1].len(), 11);
        assert_eq!(parts[2].len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_tokens_are_unique() {
        let signer = signer();
        assert_ne!(signer.issue_at(100), signer.issue_at(100));
    }

    #[test]
    fn test_altered_signature_is_rejected() {
        let signer = signer();
        let mut token = signer.issue();
        let last = token.pop().unwrap();
        token.push(if last == '0' { '1' } else { '0' });

        assert_eq!(signer.verify(&token), Err(StateTokenError::BadSignature));
    }

    #[test]
    fn test_altered_timestamp_is_rejected() {
        let signer = signer();
        let token = signer.issue_at(1_000);
        let forged = token.replacen("1000", "2000", 1);

        assert_eq!(signer.verify_at(&forged, 2_000), Err(StateTokenError::BadSignature));
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = signer().issue();
        let other = StateTokenSigner::new("another-secret", DEFAULT_STATE_TTL);

        assert_eq!(other.verify(&token), Err(StateTokenError::BadSignature));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = signer();
        let issued_at = 1_700_000_000;
        let token = signer.issue_at(issued_at);

        assert_eq!(signer.verify_at(&token, issued_at + 300), Ok(()));
        assert_eq!(
            signer.verify_at(&token, issued_at + 301),
            Err(StateTokenError::Expired)
        );
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let signer = signer();
        for token in ["", "abc", "1.2", "1.2.3.4", ".nonce.sig", "1..sig"] {
            assert_eq!(
                signer.verify(token),
                Err(StateTokenError::Malformed),
                "token {:?} should be malformed",
                token
            );
        }
    }

    #[test]
    fn test_non_numeric_timestamp_with_valid_signature_is_malformed() {
        let signer = signer();
        let raw = "yesterday.abc";
        let signature = hex::encode(signer.mac(raw).finalize().into_bytes());
        let token = format!("{}.{}", raw, signature);

        assert_eq!(signer.verify(&token), Err(StateTokenError::Malformed));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", signer());
        assert!(!rendered.contains("test-secret-value"));
    }

    #[test]
    fn test_uppercase_signature_is_rejected() {
        let signer = signer();
        let token = signer.issue_at(1_700_000_000);
        let (raw, signature) = token.rsplit_once('.').unwrap();
        let upper = format!("{}.{}", raw, signature.to_ascii_uppercase());
        assert_ne!(upper, token);

        assert_eq!(
            signer.verify_at(&upper, 1_700_000_010),
            Err(StateTokenError::BadSignature)
        );
        assert_eq!(signer.verify_at(&token, 1_700_000_010), Ok(()));
    }

    #[test]
    fn test_truncated_signature_is_rejected() {
        let signer = signer();
        let token = signer.issue_at(1_700_000_000);
        assert_eq!(
            signer.verify_at(&token[..token.len() - 2], 1_700_000_010),
            Err(StateTokenError::BadSignature)
        );
    }
}
