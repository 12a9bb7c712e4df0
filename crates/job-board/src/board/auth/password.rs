use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::board::error::BoardError;

/// Argon2id hashing for account passwords.
#[derive(Clone, Default)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// Memory cost in KiB, iterations and lanes; tests use small values.
    pub fn with_cost(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, BoardError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|err| BoardError::Credential(err.to_string()))?;
        Ok(Self { params })
    }

    fn engine(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> Result<String, BoardError> {
        let salt = SaltString::generate(&mut OsRng);
        self.engine()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| BoardError::Credential(err.to_string()))
    }

    /// Parameters are read back from the stored PHC string.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// `hash` on the blocking pool so request workers keep serving while Argon2 runs.
    pub async fn hash_blocking(&self, password: String) -> Result<String, BoardError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| BoardError::Credential(err.to_string()))?
    }

    /// `verify` on the blocking pool. A panicked or cancelled check counts as a mismatch.
    pub async fn verify_blocking(&self, password: String, stored: String) -> bool {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .unwrap_or(false)
    }
}
