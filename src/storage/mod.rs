//! Persistent storage for accounts, records, summaries and access grants.

pub mod ehr_store;
pub mod errors;
pub mod models;

pub use ehr_store::{EhrStore, SqliteEhrStore, StoreFuture};
pub use errors::{StoreError, StoreResult};
pub use models::{
    AccessGrant, AccessLevel, HealthSummary, NewRecord, NewUser, PatientRecord, StoredUser, User,
    normalize_email,
};
