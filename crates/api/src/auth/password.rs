//! Password hashing with Argon2

use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Longest secret accepted for hashing, in bytes
pub const MAX_PASSWORD_BYTES: usize = 128;

/// Argon2id hasher shared by registration and login
///
/// Cheap to clone; holds only the cost parameters. Hashing and verification
/// are CPU-bound and should be driven from a blocking thread.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Build a hasher with explicit cost parameters
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    /// Minimal-cost hasher for tests; never use outside them
    pub fn insecure_for_tests() -> Result<Self, PasswordError> {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(Self::with_params(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret into a self-describing PHC string with a fresh salt
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong);
        }

        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Verify a secret against a stored hash
    ///
    /// A malformed stored hash verifies as `false`; callers never learn
    /// which of the two happened.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        // Parameters come from the stored hash, not from self
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Hash of a random secret nobody knows
    ///
    /// Used as the comparison target when a login identifier resolves to no
    /// account, and for service accounts that never log in with a password.
    pub fn impossible_hash(&self) -> Result<String, PasswordError> {
        let mut random_bytes = [0u8; 48];
        OsRng.fill_bytes(&mut random_bytes);
        let random_password = hex::encode(random_bytes);

        // 96 hex chars stays under MAX_PASSWORD_BYTES
        self.hash(&random_password)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Password must be at most {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
}
