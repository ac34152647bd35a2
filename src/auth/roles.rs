//! User roles and the role gate.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::auth::errors::{AuthError, AuthResult};
use crate::auth::token::Claims;

/// Account role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns records and grants access to them.
    Patient,
    /// Reads records of patients who granted access.
    Doctor,
}

impl Role {
    /// String representation for storage and tokens.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "doctor" => Ok(Self::Doctor),
            other => Err(AuthError::InvalidRole(other.to_string())),
        }
    }
}

/// Allow the call only if the token's role is in `allowed`.
///
/// # Errors
/// Returns [`AuthError::Forbidden`] naming the accepted roles.
pub fn require_role(claims: &Claims, allowed: &[Role]) -> AuthResult<()> {
    if allowed.contains(&claims.role) {
        return Ok(());
    }

    let names = allowed
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Err(AuthError::Forbidden(names))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> Claims {
        Claims {
            user_id: 1,
            email: "a@b.test".to_string(),
            role,
            exp: 0,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("patient".parse::<Role>().unwrap(), Role::Patient);
        assert_eq!(" Doctor ".parse::<Role>().unwrap(), Role::Doctor);
        assert!(matches!("nurse".parse::<Role>(), Err(AuthError::InvalidRole(_))));
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Doctor).unwrap(), "\"doctor\"");
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&claims(Role::Doctor), &[Role::Doctor]).is_ok());
        assert!(require_role(&claims(Role::Patient), &[Role::Patient, Role::Doctor]).is_ok());

        let err = require_role(&claims(Role::Patient), &[Role::Doctor]).unwrap_err();
        assert_eq!(err.to_string(), "requires one of roles: doctor");
    }
}
