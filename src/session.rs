//! Dashboard session tokens.
//!
//! A token is `base64(JSON{random, exp})` followed by `.` and the lowercase
//! hex SHA-256 of the base64 segment concatenated with the session secret.
//! Tokens are stateless and expire seven days after issue; they are never
//! refreshed.
//!
//! Two verifiers share the format. [`SessionTokens`] runs in the full server
//! runtime. [`EdgeSessionVerifier`] is restricted to an injected async digest
//! and an explicit clock so it can run inside the edge guard.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Session lifetime (7 days).
pub const SESSION_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Session lifetime in seconds, used for the cookie `Max-Age`.
pub const SESSION_TTL_SECS: i64 = SESSION_TTL_MS / 1000;

#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    random: String,
    exp: i64,
}

/// Wall clock in milliseconds since the Unix epoch.
pub fn system_clock_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Split on the first `.`; both halves must be non-empty.
fn split_token(token: &str) -> Option<(&str, &str)> {
    let (payload, signature) = token.split_once('.')?;
    if payload.is_empty() || signature.is_empty() {
        return None;
    }
    Some((payload, signature))
}

fn signature_matches(expected_hex: &str, provided: &str) -> bool {
    expected_hex.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Decodes the payload segment and checks the expiry. Only called after the
/// signature has been verified.
fn payload_is_current(payload_segment: &str, now_ms: i64) -> bool {
    let Ok(bytes) = BASE64.decode(payload_segment) else {
        return false;
    };
    let Ok(payload) = serde_json::from_slice::<SessionPayload>(&bytes) else {
        return false;
    };
    payload.exp > now_ms
}

/// Issues and verifies session tokens in the full runtime.
#[derive(Clone)]
pub struct SessionTokens {
    secret: Arc<Zeroizing<String>>,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").finish_non_exhaustive()
    }
}

impl SessionTokens {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(Zeroizing::new(secret.into())),
        }
    }

    fn sign(&self, payload_segment: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload_segment.as_bytes());
        hasher.update(self.secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Mint a token valid for [`SESSION_TTL_MS`] from now.
    pub fn create(&self) -> String {
        self.create_with_expiry(system_clock_ms() + SESSION_TTL_MS)
    }

    /// Mint a token with an explicit expiry (ms since epoch).
    pub fn create_with_expiry(&self, exp_ms: i64) -> String {
        let mut random = [0u8; 32];
        OsRng.fill_bytes(&mut random);

        let payload = SessionPayload {
            random: hex::encode(random),
            exp: exp_ms,
        };
        // Serializing a struct of a String and an i64 cannot fail
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        let payload_segment = BASE64.encode(json);
        let signature = self.sign(&payload_segment);

        format!("{payload_segment}.{signature}")
    }

    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, system_clock_ms())
    }

    pub fn verify_at(&self, token: &str, now_ms: i64) -> bool {
        let Some((payload_segment, signature)) = split_token(token) else {
            return false;
        };
        if !signature_matches(&self.sign(payload_segment), signature) {
            return false;
        }
        payload_is_current(payload_segment, now_ms)
    }

    /// Edge verifier sharing this secret, using the default digest and wall clock.
    pub fn edge_verifier(&self) -> EdgeSessionVerifier {
        EdgeSessionVerifier {
            secret: Arc::clone(&self.secret),
            digest: Arc::new(Sha256Digest),
            clock: system_clock_ms,
        }
    }
}

/// Async digest primitive available to the edge guard.
#[async_trait]
pub trait EdgeDigest: Send + Sync {
    async fn sha256(&self, data: &[u8]) -> Vec<u8>;
}

/// Default [`EdgeDigest`] backed by `sha2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

#[async_trait]
impl EdgeDigest for Sha256Digest {
    async fn sha256(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }
}

/// Session verification restricted to an injected digest and clock.
#[derive(Clone)]
pub struct EdgeSessionVerifier {
    secret: Arc<Zeroizing<String>>,
    digest: Arc<dyn EdgeDigest>,
    clock: fn() -> i64,
}

impl std::fmt::Debug for EdgeSessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeSessionVerifier").finish_non_exhaustive()
    }
}

impl EdgeSessionVerifier {
    pub fn new(secret: impl Into<String>, digest: Arc<dyn EdgeDigest>, clock: fn() -> i64) -> Self {
        Self {
            secret: Arc::new(Zeroizing::new(secret.into())),
            digest,
            clock,
        }
    }

    pub async fn verify(&self, token: &str) -> bool {
        self.verify_at(token, (self.clock)()).await
    }

    pub async fn verify_at(&self, token: &str, now_ms: i64) -> bool {
        let Some((payload_segment, signature)) = split_token(token) else {
            return false;
        };

        let mut message = Zeroizing::new(Vec::with_capacity(payload_segment.len() + self.secret.len()));
        message.extend_from_slice(payload_segment.as_bytes());
        message.extend_from_slice(self.secret.as_bytes());
        let expected = hex::encode(self.digest.sha256(&message).await);

        if !signature_matches(&expected, signature) {
            return false;
        }
        payload_is_current(payload_segment, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-session-secret";

    fn tokens() -> SessionTokens {
        SessionTokens::new(SECRET)
    }

    fn tamper_payload(token: &str) -> String {
        let (payload, signature) = token.split_once('.').unwrap();
        let mut decoded: serde_json::Value =
            serde_json::from_slice(&BASE64.decode(payload).unwrap()).unwrap();
        decoded["exp"] = serde_json::json!(decoded["exp"].as_i64().unwrap() + 1);
        format!("{}.{}", BASE64.encode(decoded.to_string()), signature)
    }

    #[tokio::test]
    async fn fresh_token_verifies_under_both_runtimes() {
        let tokens = tokens();
        let token = tokens.create();

        assert!(tokens.verify(&token));
        assert!(tokens.edge_verifier().verify(&token).await);
    }

    #[tokio::test]
    async fn independently_built_edge_verifier_accepts_token() {
        let token = tokens().create();
        let edge = EdgeSessionVerifier::new(SECRET, Arc::new(Sha256Digest), system_clock_ms);

        assert!(edge.verify(&token).await);
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected_by_both() {
        let tokens = tokens();
        let tampered = tamper_payload(&tokens.create());

        assert!(!tokens.verify(&tampered));
        assert!(!tokens.edge_verifier().verify(&tampered).await);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_by_both() {
        let tokens = tokens();
        let expired = tokens.create_with_expiry(system_clock_ms() - 1_000);

        assert!(!tokens.verify(&expired));
        assert!(!tokens.edge_verifier().verify(&expired).await);
    }

    #[tokio::test]
    async fn expiry_boundary_is_exclusive() {
        let tokens = tokens();
        let token = tokens.create_with_expiry(10_000);

        assert!(tokens.verify_at(&token, 9_999));
        assert!(!tokens.verify_at(&token, 10_000));
        assert!(tokens.edge_verifier().verify_at(&token, 9_999).await);
        assert!(!tokens.edge_verifier().verify_at(&token, 10_000).await);
    }

    #[tokio::test]
    async fn malformed_tokens_are_rejected_without_panicking() {
        let tokens = tokens();
        let edge = tokens.edge_verifier();

        for token in ["", "invalid", "abc.def", ".", "abc.", ".def", "!!!.abc"] {
            assert!(!tokens.verify(token), "{token:?} should be rejected");
            assert!(!edge.verify(token).await, "{token:?} should be rejected at the edge");
        }
    }

    #[tokio::test]
    async fn signed_but_malformed_payload_is_rejected() {
        let tokens = tokens();
        let payload = BASE64.encode(b"{\"random\":\"x\"}");
        let token = format!("{payload}.{}", tokens.sign(&payload));

        assert!(!tokens.verify(&token));
        assert!(!tokens.edge_verifier().verify(&token).await);
    }

    #[tokio::test]
    async fn token_from_other_secret_is_rejected() {
        let token = SessionTokens::new("some-other-secret").create();

        assert!(!tokens().verify(&token));
        assert!(!tokens().edge_verifier().verify(&token).await);
    }

    #[test]
    fn tokens_are_unique() {
        let tokens = tokens();
        assert_ne!(tokens.create(), tokens.create());
    }

    struct InjectedDigest;

    #[async_trait]
    impl EdgeDigest for InjectedDigest {
        async fn sha256(&self, data: &[u8]) -> Vec<u8> {
            Sha256::digest(data).to_vec()
        }
    }

    #[tokio::test]
    async fn edge_verifier_uses_injected_clock() {
        fn far_future() -> i64 {
            i64::MAX
        }

        let token = tokens().create();
        let edge = EdgeSessionVerifier::new(SECRET, Arc::new(InjectedDigest), far_future);

        assert!(!edge.verify(&token).await);
    }
}
