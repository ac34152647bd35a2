//! `SQLite` store for accounts, records, summaries and access grants.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::auth::Role;
use crate::storage::errors::{StoreError, StoreResult};
use crate::storage::models::{
    AccessGrant, AccessLevel, HealthSummary, NewRecord, NewUser, PatientRecord, StoredUser, User,
    normalize_email,
};
use crate::summary::SummaryResult;

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('patient', 'doctor')),
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS patient_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        file_name TEXT,
        original_text TEXT NOT NULL,
        uploaded_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_patient_records_patient
        ON patient_records(patient_id);
    CREATE TABLE IF NOT EXISTS health_summaries (
        record_id INTEGER PRIMARY KEY REFERENCES patient_records(id) ON DELETE CASCADE,
        summary TEXT NOT NULL,
        medications TEXT NOT NULL,
        allergies TEXT NOT NULL,
        risks TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS doctor_patient_access (
        doctor_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        patient_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        access_level TEXT NOT NULL CHECK (access_level IN ('read', 'write')),
        granted_at INTEGER NOT NULL,
        PRIMARY KEY (doctor_id, patient_id)
    );
";

const INSERT_RECORD: &str = "
    INSERT INTO patient_records (patient_id, file_name, original_text, uploaded_at)
    VALUES (?1, ?2, ?3, ?4)";

const UPSERT_SUMMARY: &str = "
    INSERT INTO health_summaries
        (record_id, summary, medications, allergies, risks, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(record_id) DO UPDATE SET
        summary = excluded.summary,
        medications = excluded.medications,
        allergies = excluded.allergies,
        risks = excluded.risks,
        created_at = excluded.created_at";

const USER_COLUMNS: &str = "id, email, full_name, role, password_hash, created_at";
const RECORD_COLUMNS: &str = "id, patient_id, file_name, original_text, uploaded_at";

/// Persistence operations used by the HTTP layer.
pub trait EhrStore: Send + Sync {
    /// Create an account. Emails are unique after normalization.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateEmail`] if the email is taken.
    fn create_user(&self, user: NewUser) -> StoreFuture<'_, StoreResult<User>>;

    /// Look up an account and its password hash by email.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_user_by_email(&self, email: &str) -> StoreFuture<'_, StoreResult<Option<StoredUser>>>;

    /// Look up an account by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_user(&self, user_id: i64) -> StoreFuture<'_, StoreResult<Option<User>>>;

    /// Store an uploaded record.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn create_record(&self, record: NewRecord) -> StoreFuture<'_, StoreResult<PatientRecord>>;

    /// Store an uploaded record together with its summary, atomically.
    ///
    /// # Errors
    /// Returns an error if either write fails; nothing is stored in that case.
    fn create_record_with_summary(
        &self,
        record: NewRecord,
        result: &SummaryResult,
    ) -> StoreFuture<'_, StoreResult<(PatientRecord, HealthSummary)>>;

    /// Records owned by a patient, newest first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_records_for_patient(
        &self,
        patient_id: i64,
    ) -> StoreFuture<'_, StoreResult<Vec<PatientRecord>>>;

    /// Look up a record by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_record(&self, record_id: i64) -> StoreFuture<'_, StoreResult<Option<PatientRecord>>>;

    /// Store the summary of a record, replacing any previous one.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the record does not exist.
    fn save_summary(
        &self,
        record_id: i64,
        result: &SummaryResult,
    ) -> StoreFuture<'_, StoreResult<HealthSummary>>;

    /// Summary of a record, if one was stored.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_summary(&self, record_id: i64) -> StoreFuture<'_, StoreResult<Option<HealthSummary>>>;

    /// Grant (or update) a doctor's access to a patient's records.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn grant_access(
        &self,
        doctor_id: i64,
        patient_id: i64,
        level: AccessLevel,
    ) -> StoreFuture<'_, StoreResult<AccessGrant>>;

    /// Whether a doctor may read a patient's records.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn has_access(&self, doctor_id: i64, patient_id: i64) -> StoreFuture<'_, StoreResult<bool>>;

    /// Patients who granted access to a doctor, by name.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_patients_for_doctor(&self, doctor_id: i64) -> StoreFuture<'_, StoreResult<Vec<User>>>;
}

/// `SQLite` implementation of [`EhrStore`].
pub struct SqliteEhrStore {
    conn: Connection,
}

impl SqliteEhrStore {
    /// Open (or create) the database file and initialize the schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await?;
        info!(path = %path.display(), "opened sqlite store");
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StoreResult<Self> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        debug!("ehr schema ready");

        Ok(Self { conn })
    }
}

struct UserRow {
    id: i64,
    email: String,
    full_name: String,
    role: String,
    password_hash: String,
    created_at: i64,
}

impl UserRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            role: row.get(3)?,
            password_hash: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_stored(self) -> StoreResult<StoredUser> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| StoreError::InvalidRecord(format!("unknown role: {}", self.role)))?;
        Ok(StoredUser {
            user: User {
                id: self.id,
                email: self.email,
                full_name: self.full_name,
                role,
                created_at: from_millis(self.created_at)?,
            },
            password_hash: self.password_hash,
        })
    }

    fn into_user(self) -> StoreResult<User> {
        self.into_stored().map(|stored| stored.user)
    }
}

struct RecordRow {
    id: i64,
    patient_id: i64,
    file_name: Option<String>,
    original_text: String,
    uploaded_at: i64,
}

impl RecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            file_name: row.get(2)?,
            original_text: row.get(3)?,
            uploaded_at: row.get(4)?,
        })
    }

    fn into_record(self) -> StoreResult<PatientRecord> {
        Ok(PatientRecord {
            id: self.id,
            patient_id: self.patient_id,
            file_name: self.file_name,
            original_text: self.original_text,
            uploaded_at: from_millis(self.uploaded_at)?,
        })
    }
}

struct SummaryRow {
    record_id: i64,
    summary: String,
    medications: String,
    allergies: String,
    risks: String,
    created_at: i64,
}

impl SummaryRow {
    fn into_summary(self) -> StoreResult<HealthSummary> {
        Ok(HealthSummary {
            record_id: self.record_id,
            summary: self.summary,
            medications: serde_json::from_str(&self.medications)?,
            allergies: serde_json::from_str(&self.allergies)?,
            risks: serde_json::from_str(&self.risks)?,
            created_at: from_millis(self.created_at)?,
        })
    }
}

/// Summary fields encoded for the `health_summaries` row.
struct SummaryColumns {
    summary: String,
    medications: String,
    allergies: String,
    risks: String,
}

impl SummaryColumns {
    fn encode(result: &SummaryResult) -> StoreResult<Self> {
        Ok(Self {
            summary: result.summary.clone(),
            medications: serde_json::to_string(&result.entities.medications)?,
            allergies: serde_json::to_string(&result.entities.allergies)?,
            risks: serde_json::to_string(&result.entities.risks)?,
        })
    }

    fn upsert(
        &self,
        conn: &rusqlite::Connection,
        record_id: i64,
        created_at: i64,
    ) -> rusqlite::Result<()> {
        conn.execute(
            UPSERT_SUMMARY,
            params![
                record_id,
                self.summary,
                self.medications,
                self.allergies,
                self.risks,
                created_at
            ],
        )?;
        Ok(())
    }
}

fn summary_from_result(
    record_id: i64,
    result: SummaryResult,
    created_at: i64,
) -> StoreResult<HealthSummary> {
    Ok(HealthSummary {
        record_id,
        summary: result.summary,
        medications: result.entities.medications,
        allergies: result.entities.allergies,
        risks: result.entities.risks,
        created_at: from_millis(created_at)?,
    })
}

fn from_millis(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidRecord(format!("timestamp out of range: {millis}")))
}

impl EhrStore for SqliteEhrStore {
    fn create_user(&self, user: NewUser) -> StoreFuture<'_, StoreResult<User>> {
        Box::pin(async move {
            let email = normalize_email(&user.email);
            let role = user.role.as_str();
            let created_at = Utc::now().timestamp_millis();

            let inserted = self
                .conn
                .call(move |conn| {
                    let taken: bool = conn.query_row(
                        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                        params![email],
                        |row| row.get(0),
                    )?;
                    if taken {
                        return Ok(None);
                    }

                    conn.execute(
                        "INSERT INTO users (email, full_name, role, password_hash, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![email, user.full_name, role, user.password_hash, created_at],
                    )?;
                    Ok(Some(UserRow {
                        id: conn.last_insert_rowid(),
                        email,
                        full_name: user.full_name,
                        role: role.to_string(),
                        password_hash: user.password_hash,
                        created_at,
                    }))
                })
                .await?;

            let row = inserted.ok_or(StoreError::DuplicateEmail)?;
            debug!(user_id = row.id, role = %row.role, "created user");
            row.into_user()
        })
    }

    fn find_user_by_email(&self, email: &str) -> StoreFuture<'_, StoreResult<Option<StoredUser>>> {
        let email = normalize_email(email);
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                            params![email],
                            UserRow::from_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(UserRow::into_stored).transpose()
        })
    }

    fn get_user(&self, user_id: i64) -> StoreFuture<'_, StoreResult<Option<User>>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                            params![user_id],
                            UserRow::from_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(UserRow::into_user).transpose()
        })
    }

    fn create_record(&self, record: NewRecord) -> StoreFuture<'_, StoreResult<PatientRecord>> {
        Box::pin(async move {
            let uploaded_at = Utc::now().timestamp_millis();

            let row = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        INSERT_RECORD,
                        params![
                            record.patient_id,
                            record.file_name,
                            record.original_text,
                            uploaded_at
                        ],
                    )?;
                    Ok(RecordRow {
                        id: conn.last_insert_rowid(),
                        patient_id: record.patient_id,
                        file_name: record.file_name,
                        original_text: record.original_text,
                        uploaded_at,
                    })
                })
                .await?;

            debug!(
                record_id = row.id,
                patient_id = row.patient_id,
                chars = row.original_text.chars().count(),
                "stored record"
            );
            row.into_record()
        })
    }

    fn create_record_with_summary(
        &self,
        record: NewRecord,
        result: &SummaryResult,
    ) -> StoreFuture<'_, StoreResult<(PatientRecord, HealthSummary)>> {
        let result = result.clone();
        Box::pin(async move {
            let columns = SummaryColumns::encode(&result)?;
            let now = Utc::now().timestamp_millis();

            let row = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        INSERT_RECORD,
                        params![record.patient_id, record.file_name, record.original_text, now],
                    )?;
                    let record_id = tx.last_insert_rowid();
                    columns.upsert(&tx, record_id, now)?;
                    tx.commit()?;

                    Ok(RecordRow {
                        id: record_id,
                        patient_id: record.patient_id,
                        file_name: record.file_name,
                        original_text: record.original_text,
                        uploaded_at: now,
                    })
                })
                .await?;

            debug!(
                record_id = row.id,
                patient_id = row.patient_id,
                chars = row.original_text.chars().count(),
                "stored record with summary"
            );
            let summary = summary_from_result(row.id, result, now)?;
            Ok((row.into_record()?, summary))
        })
    }

    fn list_records_for_patient(
        &self,
        patient_id: i64,
    ) -> StoreFuture<'_, StoreResult<Vec<PatientRecord>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {RECORD_COLUMNS} FROM patient_records
                         WHERE patient_id = ?1
                         ORDER BY uploaded_at DESC, id DESC"
                    ))?;
                    let rows = stmt
                        .query_map(params![patient_id], RecordRow::from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(RecordRow::into_record).collect()
        })
    }

    fn get_record(&self, record_id: i64) -> StoreFuture<'_, StoreResult<Option<PatientRecord>>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!("SELECT {RECORD_COLUMNS} FROM patient_records WHERE id = ?1"),
                            params![record_id],
                            RecordRow::from_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(RecordRow::into_record).transpose()
        })
    }

    fn save_summary(
        &self,
        record_id: i64,
        result: &SummaryResult,
    ) -> StoreFuture<'_, StoreResult<HealthSummary>> {
        let result = result.clone();
        Box::pin(async move {
            let columns = SummaryColumns::encode(&result)?;
            let created_at = Utc::now().timestamp_millis();

            let saved = self
                .conn
                .call(move |conn| {
                    let exists: bool = conn.query_row(
                        "SELECT EXISTS(SELECT 1 FROM patient_records WHERE id = ?1)",
                        params![record_id],
                        |row| row.get(0),
                    )?;
                    if !exists {
                        return Ok(false);
                    }

                    columns.upsert(conn, record_id, created_at)?;
                    Ok(true)
                })
                .await?;

            if !saved {
                return Err(StoreError::NotFound("record"));
            }

            summary_from_result(record_id, result, created_at)
        })
    }

    fn get_summary(&self, record_id: i64) -> StoreFuture<'_, StoreResult<Option<HealthSummary>>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT record_id, summary, medications, allergies, risks, created_at
                             FROM health_summaries WHERE record_id = ?1",
                            params![record_id],
                            |row| {
                                Ok(SummaryRow {
                                    record_id: row.get(0)?,
                                    summary: row.get(1)?,
                                    medications: row.get(2)?,
                                    allergies: row.get(3)?,
                                    risks: row.get(4)?,
                                    created_at: row.get(5)?,
                                })
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(SummaryRow::into_summary).transpose()
        })
    }

    fn grant_access(
        &self,
        doctor_id: i64,
        patient_id: i64,
        level: AccessLevel,
    ) -> StoreFuture<'_, StoreResult<AccessGrant>> {
        Box::pin(async move {
            let granted_at = Utc::now().timestamp_millis();
            let level_str = level.as_str();

            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO doctor_patient_access
                            (doctor_id, patient_id, access_level, granted_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(doctor_id, patient_id) DO UPDATE SET
                            access_level = excluded.access_level,
                            granted_at = excluded.granted_at",
                        params![doctor_id, patient_id, level_str, granted_at],
                    )?;
                    Ok(())
                })
                .await?;

            info!(doctor_id, patient_id, level = %level, "granted record access");
            Ok(AccessGrant {
                doctor_id,
                patient_id,
                access_level: level,
                granted_at: from_millis(granted_at)?,
            })
        })
    }

    fn has_access(&self, doctor_id: i64, patient_id: i64) -> StoreFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let allowed = self
                .conn
                .call(move |conn| {
                    let allowed: bool = conn.query_row(
                        "SELECT EXISTS(
                            SELECT 1 FROM doctor_patient_access
                            WHERE doctor_id = ?1 AND patient_id = ?2
                        )",
                        params![doctor_id, patient_id],
                        |row| row.get(0),
                    )?;
                    Ok(allowed)
                })
                .await?;

            Ok(allowed)
        })
    }

    fn list_patients_for_doctor(&self, doctor_id: i64) -> StoreFuture<'_, StoreResult<Vec<User>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT u.id, u.email, u.full_name, u.role, u.password_hash, u.created_at
                         FROM users u
                         JOIN doctor_patient_access a ON a.patient_id = u.id
                         WHERE a.doctor_id = ?1
                         ORDER BY u.full_name, u.id",
                    )?;
                    let rows = stmt
                        .query_map(params![doctor_id], UserRow::from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(UserRow::into_user).collect()
        })
    }
}
