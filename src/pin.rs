//! PIN hashing and verification (bcrypt).

use thiserror::Error;

/// Work factor used for every stored PIN hash.
pub const PIN_HASH_COST: u32 = 12;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("PIN must not be empty")]
    Empty,
    #[error("failed to hash PIN: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hash a PIN with bcrypt at the production cost. Each call uses a fresh salt.
pub fn hash_pin(pin: &str) -> Result<String, PinError> {
    hash_pin_with_cost(pin, PIN_HASH_COST)
}

/// Hash with an explicit cost. Tests use a low cost to stay fast.
pub fn hash_pin_with_cost(pin: &str, cost: u32) -> Result<String, PinError> {
    if pin.is_empty() {
        return Err(PinError::Empty);
    }
    Ok(bcrypt::hash(pin, cost)?)
}

/// Check `pin` against a stored bcrypt hash.
///
/// A malformed hash is reported as a mismatch, never as a panic.
pub fn verify_pin(pin: &str, hash: &str) -> bool {
    match bcrypt::verify(pin, hash) {
        Ok(matches) => matches,
        Err(error) => {
            tracing::warn!(error = %error, "Stored PIN hash is malformed");
            false
        }
    }
}

/// [`hash_pin`] on the blocking pool.
pub async fn hash_pin_blocking(pin: String) -> Result<String, PinError> {
    tokio::task::spawn_blocking(move || hash_pin(&pin)).await?
}

/// [`verify_pin`] on the blocking pool. A panicked task counts as a mismatch.
pub async fn verify_pin_blocking(pin: String, hash: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_pin(&pin, &hash)).await {
        Ok(matches) => matches,
        Err(error) => {
            tracing::error!(error = %error, "PIN verification task failed");
            false
        }
    }
}
