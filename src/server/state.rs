//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenSigner};
use crate::config::AppConfig;
use crate::extraction::EntityExtractor;
use crate::storage::EhrStore;
use crate::summary::{SummaryComposer, SummaryResult};

use super::error::ApiResult;

/// Shared application state.
pub struct AppState {
    /// Resolved configuration.
    pub config: AppConfig,
    /// Persistence backend.
    pub store: Arc<dyn EhrStore>,
    /// Compiled entity extractor.
    pub extractor: EntityExtractor,
    /// Password hasher for registration and login.
    pub passwords: PasswordHasher,
    /// Access token signer.
    pub tokens: TokenSigner,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    /// Returns an error if the extractor patterns or token settings are invalid.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn EhrStore>,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let extractor = EntityExtractor::new()
            .map_err(|e| format!("Failed to compile extractor patterns: {e}"))?;
        let tokens = TokenSigner::new(&config.auth.secret_key, config.auth.token_ttl_minutes)?;
        let passwords = PasswordHasher::new(config.auth.pbkdf2_iterations);

        Ok(Arc::new(Self {
            config,
            store,
            extractor,
            passwords,
            tokens,
        }))
    }

    /// Summarize `text` on the blocking pool.
    ///
    /// # Errors
    /// Returns a 400 for empty text and a 502 if the external service fails.
    pub async fn summarize(self: &Arc<Self>, text: String) -> ApiResult<SummaryResult> {
        let state = Arc::clone(self);
        let result = tokio::task::spawn_blocking(move || {
            SummaryComposer::new(&state.extractor).summarize(&text, &state.config.summarizer)
        })
        .await??;
        Ok(result)
    }
}
