//! Persisted entities.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::storage::errors::StoreError;

/// Registered account, as exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Row id.
    pub id: i64,
    /// Login email, stored lowercase.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Account role.
    pub role: Role,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Account together with its password hash. Never serialized.
#[derive(Clone, Debug)]
pub struct StoredUser {
    /// Public account fields.
    pub user: User,
    /// Encoded PBKDF2 hash.
    pub password_hash: String,
}

/// Input for account creation.
#[derive(Clone, Debug)]
pub struct NewUser {
    /// Login email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Account role.
    pub role: Role,
    /// Encoded PBKDF2 hash.
    pub password_hash: String,
}

/// Uploaded clinical document owned by a patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Row id.
    pub id: i64,
    /// Owning patient account.
    pub patient_id: i64,
    /// Original upload name, if any.
    pub file_name: Option<String>,
    /// Record text as uploaded.
    pub original_text: String,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
}

/// Input for record creation.
#[derive(Clone, Debug)]
pub struct NewRecord {
    /// Owning patient account.
    pub patient_id: i64,
    /// Original upload name, if any.
    pub file_name: Option<String>,
    /// Record text.
    pub original_text: String,
}

/// Stored summary of one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// Summarized record.
    pub record_id: i64,
    /// Summary text.
    pub summary: String,
    /// Medications found in the record.
    pub medications: Vec<String>,
    /// Allergies found in the record.
    pub allergies: Vec<String>,
    /// Risk labels found in the record.
    pub risks: Vec<String>,
    /// Time the summary was (re)generated.
    pub created_at: DateTime<Utc>,
}

/// Level of access a patient grants a doctor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// View records and summaries.
    #[default]
    Read,
    /// View and annotate.
    Write,
}

impl AccessLevel {
    /// String representation for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            other => Err(StoreError::InvalidRecord(format!(
                "unknown access level: {other}"
            ))),
        }
    }
}

/// Doctor access to one patient's records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Doctor account.
    pub doctor_id: i64,
    /// Patient account.
    pub patient_id: i64,
    /// Granted level.
    pub access_level: AccessLevel,
    /// Time of the latest grant.
    pub granted_at: DateTime<Utc>,
}

/// Normalize an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_parsing() {
        assert_eq!("read".parse::<AccessLevel>().unwrap(), AccessLevel::Read);
        assert_eq!("write".parse::<AccessLevel>().unwrap(), AccessLevel::Write);
        assert!("admin".parse::<AccessLevel>().is_err());
        assert_eq!(AccessLevel::default(), AccessLevel::Read);
    }

    #[test]
    fn test_user_serialization_has_no_hash() {
        let user = User {
            id: 1,
            email: "p@x.test".to_string(),
            full_name: "Pat".to_string(),
            role: Role::Patient,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "patient");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Doc@Clinic.TEST "), "doc@clinic.test");
    }
}
