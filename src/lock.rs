//! Password protection for embedded documents.
//!
//! A locked document stores a password digest in its `password` field. The
//! digest is an Argon2id PHC string, so the salt and cost parameters travel
//! with it and verification never needs outside configuration. bcrypt
//! digests (`$2a$`, `$2b$`, ...) found in existing headers still verify; the
//! next `lock` replaces them with Argon2id.
//!
//! Hashing sits behind [`SecretHasher`] so the session never depends on a
//! particular algorithm.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

use crate::document::Document;

/// Error type for lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// The supplied secret does not match the stored digest.
    #[error("incorrect password")]
    Mismatch,

    /// An empty secret was supplied for a new lock.
    #[error("password must not be empty")]
    EmptySecret,

    /// The hashing backend failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Outcome of a successful [`unlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlocked {
    /// The digest was removed.
    Removed,
    /// There was no digest to remove.
    NotLocked,
}

/// Hashing capability used to protect documents.
pub trait SecretHasher {
    /// Produce a digest for `secret`.
    fn hash(&self, secret: &str) -> Result<String, LockError>;

    /// Check `secret` against a digest produced by [`SecretHasher::hash`].
    ///
    /// Unparseable digests never verify.
    fn verify(&self, secret: &str, digest: &str) -> bool;
}

/// Argon2id hasher producing PHC strings.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Hasher {
    /// Hasher with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Hash`] if Argon2 rejects the parameters.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, LockError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| LockError::Hash(format!("argon2 params: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, LockError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| LockError::Hash(format!("argon2 hash: {e}")))?;
        Ok(digest.to_string())
    }

    fn verify(&self, secret: &str, digest: &str) -> bool {
        // Headers written by older tools carry bcrypt digests
        if digest.starts_with("$2") {
            return bcrypt::verify(secret, digest).unwrap_or_else(|e| {
                log::debug!("Stored bcrypt digest is invalid: {}", e);
                false
            });
        }

        let Ok(parsed) = PasswordHash::new(digest) else {
            log::debug!("Stored digest is not a PHC string");
            return false;
        };
        self.argon2()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Check `secret` against the document's digest.
///
/// An unlocked document accepts any secret.
pub fn verify(hasher: &dyn SecretHasher, document: &Document, secret: &str) -> bool {
    match &document.password {
        Some(digest) => hasher.verify(secret, digest),
        None => true,
    }
}

/// Protect `document` with `new_secret`.
///
/// A document that is already locked requires its `current` secret.
///
/// # Errors
///
/// Returns [`LockError::Mismatch`] if the current secret is missing or wrong,
/// [`LockError::EmptySecret`] for an empty new secret, and
/// [`LockError::Hash`] on hashing failure. The document is unchanged on error.
pub fn lock(
    hasher: &dyn SecretHasher,
    document: &mut Document,
    current: Option<&str>,
    new_secret: &str,
) -> Result<(), LockError> {
    if let Some(digest) = &document.password {
        let current = current.ok_or(LockError::Mismatch)?;
        if !hasher.verify(current, digest) {
            return Err(LockError::Mismatch);
        }
    }
    replace_secret(hasher, document, new_secret)
}

/// Store a digest of `new_secret` without checking the current secret.
///
/// For callers that have already authenticated against the existing digest.
///
/// # Errors
///
/// Returns [`LockError::EmptySecret`] for an empty secret and
/// [`LockError::Hash`] on hashing failure. The document is unchanged on error.
pub fn replace_secret(
    hasher: &dyn SecretHasher,
    document: &mut Document,
    new_secret: &str,
) -> Result<(), LockError> {
    if new_secret.is_empty() {
        return Err(LockError::EmptySecret);
    }
    document.password = Some(hasher.hash(new_secret)?);
    Ok(())
}

/// Remove the protection from `document`.
///
/// # Errors
///
/// Returns [`LockError::Mismatch`] if `secret` does not match; the digest is
/// kept.
pub fn unlock(
    hasher: &dyn SecretHasher,
    document: &mut Document,
    secret: &str,
) -> Result<Unlocked, LockError> {
    let Some(digest) = &document.password else {
        return Ok(Unlocked::NotLocked);
    };
    if !hasher.verify(secret, digest) {
        return Err(LockError::Mismatch);
    }
    document.password = None;
    Ok(Unlocked::Removed)
}
