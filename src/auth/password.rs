use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use axum::extract::FromRef;
use rand::rngs::OsRng;
use tracing::error;

use crate::{config::HashConfig, state::AppState};

/// Upper bound on plaintext length; anything longer is rejected before
/// it reaches the hash function.
const MAX_PASSWORD_BYTES: usize = 512;

/// Salted argon2id hashing with a configured work factor. The cost is a
/// design parameter: verification is supposed to be slow.
#[derive(Clone)]
pub struct PasswordHasher {
    inner: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(config: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, 1, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        Ok(Self {
            inner: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        anyhow::ensure!(!plain.is_empty(), "password must not be empty");
        anyhow::ensure!(
            plain.len() <= MAX_PASSWORD_BYTES,
            "password exceeds {} bytes",
            MAX_PASSWORD_BYTES
        );
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .inner
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// False on mismatch; errors only when the stored hash itself is
    /// unparseable (data corruption).
    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self.inner.verify_password(plain.as_bytes(), &parsed).is_ok())
    }
}

impl FromRef<AppState> for PasswordHasher {
    fn from_ref(state: &AppState) -> Self {
        state.hasher.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_hasher() -> PasswordHasher {
        PasswordHasher::new(&HashConfig {
            memory_kib: 1024,
            iterations: 1,
        })
        .expect("hasher should construct")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = cheap_hasher();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = cheap_hasher();
        let hash = hasher
            .hash("correct-horse-Battery-1")
            .expect("hashing should succeed");
        assert!(!hasher
            .verify("wrong-password", &hash)
            .expect("verify should not error"));
    }

    #[test]
    fn verify_is_case_sensitive() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("TestPassword123").expect("hashing should succeed");
        assert!(!hasher
            .verify("testpassword123", &hash)
            .expect("verify should not error"));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = cheap_hasher();
        let a = hasher.hash("TestPassword123").expect("hash");
        let b = hasher.hash("TestPassword123").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_rejects_empty_password() {
        let hasher = cheap_hasher();
        assert!(hasher.hash("").is_err());
    }

    #[test]
    fn hash_rejects_oversized_password() {
        let hasher = cheap_hasher();
        let long = "a".repeat(MAX_PASSWORD_BYTES + 1);
        assert!(hasher.hash(&long).is_err());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let hasher = cheap_hasher();
        let err = hasher.verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
