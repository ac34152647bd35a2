//! Authentication: password hashing, access tokens and role checks.

pub mod errors;
pub mod password;
pub mod roles;
pub mod token;

pub use errors::{AuthError, AuthResult};
pub use password::{MIN_PASSWORD_CHARS, PasswordHasher, verify_password};
pub use roles::{Role, require_role};
pub use token::{Claims, TokenSigner};
