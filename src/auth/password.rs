//! PBKDF2-HMAC-SHA256 password hashing.
//!
//! Encoded form: `pbkdf2-sha256$<iterations>$<salt>$<hash>` with standard
//! base64 (no padding). The iteration count travels with the hash so it can
//! be raised later without invalidating existing accounts.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::errors::{AuthError, AuthResult};

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Password hasher with a fixed work factor for new hashes.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    /// Create a hasher using `iterations` PBKDF2 rounds.
    #[must_use]
    pub const fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Hash `password` with a fresh random salt.
    ///
    /// # Errors
    /// Returns [`AuthError::WeakPassword`] if the password is too short.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::WeakPassword(format!(
                "must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let mut salt = [0_u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut derived = [0_u8; HASH_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, self.iterations, &mut derived);

        Ok(format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(derived)
        ))
    }

    /// Check `password` against an encoded hash.
    ///
    /// # Errors
    /// Returns [`AuthError::MalformedHash`] if `encoded` cannot be parsed.
    pub fn verify(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        verify_password(password, encoded)
    }
}

/// Check `password` against an encoded hash in constant time.
///
/// # Errors
/// Returns [`AuthError::MalformedHash`] if `encoded` cannot be parsed.
pub fn verify_password(password: &str, encoded: &str) -> AuthResult<bool> {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AuthError::MalformedHash);
    };

    if scheme != SCHEME {
        return Err(AuthError::MalformedHash);
    }

    let iterations: u32 = iterations.parse().map_err(|_| AuthError::MalformedHash)?;
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| AuthError::MalformedHash)?;
    let expected = STANDARD_NO_PAD
        .decode(expected)
        .map_err(|_| AuthError::MalformedHash)?;
    if iterations == 0 || expected.is_empty() {
        return Err(AuthError::MalformedHash);
    }

    let mut derived = vec![0_u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);

    Ok(derived.ct_eq(&expected).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: PasswordHasher = PasswordHasher::new(1_000);

    #[test]
    fn test_hash_and_verify() {
        let hash = FAST.hash("correct horse").unwrap();
        assert!(hash.starts_with("pbkdf2-sha256$1000$"));
        assert!(FAST.verify("correct horse", &hash).unwrap());
        assert!(!FAST.verify("wrong horse!", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = FAST.hash("same password").unwrap();
        let b = FAST.hash("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_uses_stored_iterations() {
        let hash = PasswordHasher::new(1_500).hash("long enough").unwrap();
        assert!(FAST.verify("long enough", &hash).unwrap());
    }

    #[test]
    fn test_short_password_is_rejected() {
        assert!(matches!(FAST.hash("short"), Err(AuthError::WeakPassword(_))));
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            verify_password("whatever", "plaintext"),
            Err(AuthError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("whatever", "bcrypt$10$abc$def"),
            Err(AuthError::MalformedHash)
        ));
    }
}
