//! Secret generation, hashing and verification.
//!
//! Secrets are random alphanumeric strings handed to the bearer exactly once.
//! Only their Argon2id hash (PHC string form, salt and parameters embedded)
//! is persisted. Verification re-derives the hash with the stored salt and
//! compares the raw outputs in constant time.

use crate::config::CredentialConfig;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, Version,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroizing;

/// Shortest secret ever minted, regardless of configuration.
pub const MIN_SECRET_LENGTH: usize = 20;

/// Secret minting and verification with a fixed Argon2id cost.
#[derive(Clone)]
pub struct Credentials {
    argon2: Argon2<'static>,
    secret_length: usize,
}

impl Credentials {
    /// Build from configuration. Fails if the Argon2 parameters are out of range.
    pub fn new(config: &CredentialConfig) -> Result<Self, argon2::Error> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            None,
        )?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            secret_length: config.secret_length.max(MIN_SECRET_LENGTH),
        })
    }

    /// Length of secrets produced by [`generate_secret`](Self::generate_secret).
    pub fn secret_length(&self) -> usize {
        self.secret_length
    }

    /// Mint a new random secret from the OS-seeded thread RNG.
    pub fn generate_secret(&self) -> Zeroizing<String> {
        Zeroizing::new(
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(self.secret_length)
                .map(char::from)
                .collect(),
        )
    }

    /// Hash a secret with a fresh random salt.
    pub fn hash_secret(&self, secret: &str) -> Result<String, password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .argon2
            .hash_password(secret.as_bytes(), &salt)?
            .to_string())
    }

    /// Check a candidate secret against a stored PHC hash.
    ///
    /// The hash is recomputed with the salt, algorithm and cost recorded in
    /// `stored`, so records minted under older parameters keep verifying.
    /// An unparseable stored hash never verifies.
    pub fn verify_secret(&self, secret: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored secret hash is not a valid PHC string");
                return false;
            }
        };

        let (Some(expected), Some(salt)) = (parsed.hash, parsed.salt) else {
            warn!("Stored secret hash is missing its salt or output");
            return false;
        };

        let params = match Params::try_from(&parsed) {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "Stored secret hash has unusable parameters");
                return false;
            }
        };

        let candidate = match self.argon2.hash_password_customized(
            secret.as_bytes(),
            Some(parsed.algorithm),
            parsed.version,
            params,
            salt,
        ) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(error = %e, "Failed to re-derive secret hash");
                return false;
            }
        };

        match candidate.hash {
            Some(output) => output.as_bytes().ct_eq(expected.as_bytes()).into(),
            None => false,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_length", &self.secret_length)
            .finish_non_exhaustive()
    }
}
