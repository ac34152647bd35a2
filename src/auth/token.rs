//! HS256 bearer tokens.
//!
//! Tokens are compact JWTs: `base64url(header).base64url(claims).base64url(mac)`
//! with no padding, signed with HMAC-SHA256 over the first two segments.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::auth::errors::{AuthError, AuthResult};
use crate::auth::roles::Role;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Claims carried by an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub user_id: i64,
    /// Account email.
    pub email: String,
    /// Account role.
    pub role: Role,
    /// Expiry as unix seconds.
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Issues and verifies access tokens with a shared secret.
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: TimeDelta,
}

impl TokenSigner {
    /// Create a signer for tokens valid `ttl_minutes` after issue.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidTtl`] if the lifetime is not positive or overflows.
    pub fn new(secret: &str, ttl_minutes: i64) -> AuthResult<Self> {
        let ttl = TimeDelta::try_minutes(ttl_minutes).ok_or(AuthError::InvalidTtl)?;
        if ttl <= TimeDelta::zero() {
            return Err(AuthError::InvalidTtl);
        }
        Ok(Self {
            key: secret.as_bytes().to_vec(),
            ttl,
        })
    }

    /// Issue a token for the given account, expiring from now.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, user_id: i64, email: &str, role: Role) -> AuthResult<String> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_at(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        let expires_at = now.checked_add_signed(self.ttl).ok_or(AuthError::InvalidTtl)?;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            exp: expires_at.timestamp(),
        };
        let header = TokenHeader {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] or [`AuthError::TokenExpired`].
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] or [`AuthError::TokenExpired`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken);
        };

        let signature = decode_segment(signature)?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let header: TokenHeader = serde_json::from_slice(&decode_segment(header)?)
            .map_err(|_| AuthError::InvalidToken)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::InvalidToken);
        }

        let claims: Claims = serde_json::from_slice(&decode_segment(payload)?)
            .map_err(|_| AuthError::InvalidToken)?;
        if claims.exp <= now.timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    fn mac(&self) -> AuthResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| AuthError::InvalidToken)
    }
}

impl core::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn decode_segment(segment: &str) -> AuthResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken)
}
