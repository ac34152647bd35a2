//! HTTP route handlers for the EHR summarizer API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::info;

use crate::auth::{AuthError, Role};
use crate::storage::{
    AccessGrant, AccessLevel, HealthSummary, NewRecord, NewUser, PatientRecord, User,
    normalize_email,
};
use crate::summary::SummaryResult;

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .route("/summarize", post(summarize))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/records", post(upload_record).get(list_records))
        .route("/api/records/{id}", get(get_record))
        .route("/api/access", post(grant_access))
        .route("/api/doctor/patients", get(doctor_patients))
        .route("/api/doctor/patients/{id}/records", get(doctor_patient_records))
        .fallback_service(static_files)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "service": "ehr-summarizer",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Anonymous summarization request.
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    /// Clinical text.
    #[serde(default)]
    pub text: Option<String>,
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<Json<SummaryResult>> {
    let Json(request) = payload?;
    let text = request
        .text
        .ok_or_else(|| ApiError::BadRequest("Missing medical text".to_string()))?;

    Ok(Json(state.summarize(text).await?))
}

/// Account registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Login email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Plain password, hashed before storage.
    pub password: String,
    /// `patient` or `doctor`.
    pub role: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plain password.
    pub password: String,
}

/// Issued access token with the account it belongs to.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Signed bearer token.
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: &'static str,
    /// Authenticated account.
    pub user: User,
}

impl TokenResponse {
    fn issue(state: &AppState, user: User) -> ApiResult<Self> {
        let access_token = state.tokens.issue(user.id, &user.email, user.role)?;
        Ok(Self {
            access_token,
            token_type: "bearer",
            user,
        })
    }
}

async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let Json(request) = payload?;
    let email = normalize_email(&request.email);
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    let full_name = request.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("Full name is required".to_string()));
    }
    let role: Role = request.role.parse()?;

    let passwords = state.passwords;
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || passwords.hash(&password)).await??;

    let user = state
        .store
        .create_user(NewUser {
            email,
            full_name,
            role,
            password_hash,
        })
        .await?;
    info!(user_id = user.id, role = %user.role, "registered account");

    Ok((StatusCode::CREATED, Json(TokenResponse::issue(&state, user)?)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(request) = payload?;
    let stored = state
        .store
        .find_user_by_email(&request.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let passwords = state.passwords;
    let password = request.password;
    let hash = stored.password_hash;
    let valid = tokio::task::spawn_blocking(move || passwords.verify(&password, &hash)).await??;
    if !valid {
        return Err(AuthError::InvalidCredentials.into());
    }

    Ok(Json(TokenResponse::issue(&state, stored.user)?))
}

async fn me(State(state): State<Arc<AppState>>, caller: AuthUser) -> ApiResult<Json<User>> {
    let user = state
        .store
        .get_user(caller.0.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
    Ok(Json(user))
}

/// Record upload request.
#[derive(Debug, Deserialize)]
pub struct UploadRecordRequest {
    /// Original file name, if the text came from a file.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Clinical text.
    pub text: String,
}

/// A record together with its stored summary.
#[derive(Debug, Serialize)]
pub struct RecordWithSummary {
    /// The record.
    pub record: PatientRecord,
    /// Its summary, if one was stored.
    pub summary: Option<HealthSummary>,
}

async fn upload_record(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    payload: Result<Json<UploadRecordRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RecordWithSummary>)> {
    caller.require(&[Role::Patient])?;
    let Json(request) = payload?;

    // Summarize first so a rejected or failed summary leaves nothing behind.
    let result = state.summarize(request.text.clone()).await?;

    let (record, summary) = state
        .store
        .create_record_with_summary(
            NewRecord {
                patient_id: caller.0.user_id,
                file_name: request.file_name,
                original_text: request.text,
            },
            &result,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordWithSummary {
            record,
            summary: Some(summary),
        }),
    ))
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<RecordWithSummary>>> {
    caller.require(&[Role::Patient])?;
    Ok(Json(records_with_summaries(&state, caller.0.user_id).await?))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(record_id): Path<i64>,
) -> ApiResult<Json<RecordWithSummary>> {
    let record = state
        .store
        .get_record(record_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Record not found".to_string()))?;

    let allowed = match caller.0.role {
        Role::Patient => record.patient_id == caller.0.user_id,
        Role::Doctor => {
            state
                .store
                .has_access(caller.0.user_id, record.patient_id)
                .await?
        }
    };
    if !allowed {
        return Err(ApiError::Forbidden("No access to this record".to_string()));
    }

    let summary = state.store.get_summary(record.id).await?;
    Ok(Json(RecordWithSummary { record, summary }))
}

/// Request to share records with a doctor.
#[derive(Debug, Deserialize)]
pub struct GrantAccessRequest {
    /// Email of the doctor's account.
    pub doctor_email: String,
    /// Defaults to read.
    #[serde(default)]
    pub access_level: AccessLevel,
}

async fn grant_access(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    payload: Result<Json<GrantAccessRequest>, JsonRejection>,
) -> ApiResult<Json<AccessGrant>> {
    caller.require(&[Role::Patient])?;
    let Json(request) = payload?;

    let doctor = state
        .store
        .find_user_by_email(&request.doctor_email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".to_string()))?
        .user;
    if doctor.role != Role::Doctor {
        return Err(ApiError::BadRequest("User is not a doctor".to_string()));
    }

    let grant = state
        .store
        .grant_access(doctor.id, caller.0.user_id, request.access_level)
        .await?;
    Ok(Json(grant))
}

async fn doctor_patients(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<User>>> {
    caller.require(&[Role::Doctor])?;
    Ok(Json(
        state.store.list_patients_for_doctor(caller.0.user_id).await?,
    ))
}

async fn doctor_patient_records(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<RecordWithSummary>>> {
    caller.require(&[Role::Doctor])?;
    if !state.store.has_access(caller.0.user_id, patient_id).await? {
        return Err(ApiError::Forbidden(
            "No access to this patient's records".to_string(),
        ));
    }
    Ok(Json(records_with_summaries(&state, patient_id).await?))
}

async fn records_with_summaries(
    state: &AppState,
    patient_id: i64,
) -> ApiResult<Vec<RecordWithSummary>> {
    let records = state.store.list_records_for_patient(patient_id).await?;
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let summary = state.store.get_summary(record.id).await?;
        out.push(RecordWithSummary { record, summary });
    }
    Ok(out)
}

fn is_plausible_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::storage::SqliteEhrStore;

    async fn app() -> Router {
        let mut config = AppConfig::default();
        config.auth.pbkdf2_iterations = 1_000;
        let store = Arc::new(SqliteEhrStore::open_in_memory().await.unwrap());
        create_router(AppState::new(config, store).unwrap())
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn register(app: &Router, email: &str, role: &str) -> (String, i64) {
        let (status, body) = send(
            app,
            post_json(
                "/api/auth/register",
                None,
                &json!({
                    "email": email,
                    "full_name": format!("{role} {email}"),
                    "password": "s3cure-password",
                    "role": role,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["token_type"], "bearer");
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["service"], "ehr-summarizer");
    }

    #[tokio::test]
    async fn test_summarize_local() {
        let app = app().await;
        let text = "Type 2 diabetes, smoker. Takes metformin. Allergy to penicillin.";
        let (status, body) = send(&app, post_json("/summarize", None, &json!({ "text": text }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], format!("MOCK SUMMARY: {text}"));
        assert_eq!(body["medications"], json!(["metformin"]));
        assert_eq!(body["allergies"], json!(["penicillin"]));
        assert_eq!(body["risks"], json!(["diabetes", "smoking"]));
    }

    #[tokio::test]
    async fn test_summarize_missing_or_empty_text() {
        let app = app().await;

        let (status, body) = send(&app, post_json("/summarize", None, &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Missing medical text");

        let (status, _) = send(&app, post_json("/summarize", None, &json!({ "text": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::post("/summarize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let app = app().await;
        let (token, user_id) = register(&app, "pat@example.test", "patient").await;

        let (status, body) = send(&app, get_with("/api/auth/me", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user_id);
        assert_eq!(body["role"], "patient");
        assert!(body.get("password_hash").is_none());

        let (status, body) = send(
            &app,
            post_json(
                "/api/auth/login",
                None,
                &json!({ "email": "PAT@example.test", "password": "s3cure-password" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], user_id);

        let (status, _) = send(
            &app,
            post_json(
                "/api/auth/login",
                None,
                &json!({ "email": "pat@example.test", "password": "wrong-password" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = app().await;
        register(&app, "dup@example.test", "patient").await;

        let mut payload = json!({
            "email": "dup@example.test",
            "full_name": "Dup",
            "password": "s3cure-password",
            "role": "patient",
        });
        let (status, _) = send(&app, post_json("/api/auth/register", None, &payload)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        payload["email"] = json!("new@example.test");
        payload["role"] = json!("nurse");
        let (status, _) = send(&app, post_json("/api/auth/register", None, &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        payload["role"] = json!("patient");
        payload["password"] = json!("short");
        let (status, _) = send(&app, post_json("/api/auth/register", None, &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_incomplete_bodies_get_detail_400() {
        let app = app().await;
        let (patient, _) = register(&app, "p@example.test", "patient").await;

        for (uri, token) in [
            ("/api/auth/register", None),
            ("/api/auth/login", None),
            ("/api/records", Some(patient.as_str())),
            ("/api/access", Some(patient.as_str())),
        ] {
            let (status, body) = send(&app, post_json(uri, token, &json!({}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["detail"].is_string(), "{uri}: {body}");
        }

        let request = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        let app = app().await;
        let request = Request::get("/api/records").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, get_with("/api/auth/me", "not.a.token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_patient_doctor_flow() {
        let app = app().await;
        let (patient, patient_id) = register(&app, "p@example.test", "patient").await;
        let (doctor, _) = register(&app, "d@example.test", "doctor").await;

        let (status, body) = send(
            &app,
            post_json(
                "/api/records",
                Some(&patient),
                &json!({
                    "file_name": "visit.txt",
                    "text": "Hypertension. Takes lisinopril. Allergies: latex.",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let record_id = body["record"]["id"].as_i64().unwrap();
        assert_eq!(body["summary"]["medications"], json!(["lisinopril"]));
        assert_eq!(body["summary"]["allergies"], json!(["latex"]));
        assert_eq!(body["summary"]["risks"], json!(["hypertension"]));

        // Doctors cannot upload and cannot read before access is granted.
        let (status, _) = send(
            &app,
            post_json("/api/records", Some(&doctor), &json!({ "text": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/records/{record_id}");
        let (status, _) = send(&app, get_with(&uri, &doctor)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            post_json(
                "/api/access",
                Some(&patient),
                &json!({ "doctor_email": "d@example.test" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["access_level"], "read");

        let (status, body) = send(&app, get_with("/api/doctor/patients", &doctor)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], patient_id);

        let uri = format!("/api/doctor/patients/{patient_id}/records");
        let (status, body) = send(&app, get_with(&uri, &doctor)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["record"]["id"], record_id);
        assert_eq!(body[0]["summary"]["risks"], json!(["hypertension"]));

        let uri = format!("/api/records/{record_id}");
        let (status, _) = send(&app, get_with(&uri, &doctor)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get_with("/api/records", &patient)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, get_with("/api/doctor/patients", &patient)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_empty_upload_stores_nothing() {
        let app = app().await;
        let (patient, _) = register(&app, "p@example.test", "patient").await;

        let (status, _) = send(
            &app,
            post_json("/api/records", Some(&patient), &json!({ "text": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, get_with("/api/records", &patient)).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_grant_requires_doctor_account() {
        let app = app().await;
        let (patient, _) = register(&app, "p@example.test", "patient").await;
        register(&app, "other@example.test", "patient").await;

        let (status, _) = send(
            &app,
            post_json(
                "/api/access",
                Some(&patient),
                &json!({ "doctor_email": "other@example.test" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            post_json(
                "/api/access",
                Some(&patient),
                &json!({ "doctor_email": "ghost@example.test" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_is_plausible_email() {
        assert!(is_plausible_email("a@b.test"));
        assert!(!is_plausible_email("a@localhost"));
        assert!(!is_plausible_email("@b.test"));
        assert!(!is_plausible_email("plain"));
    }
}
