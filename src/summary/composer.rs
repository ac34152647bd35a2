//! Combines entity extraction with a prose summary.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SummarizerConfig;
use crate::extraction::{EntityExtractor, ExtractionResult, shared_extractor};
use crate::summary::azure::{AzureChatClient, ExternalTarget};
use crate::summary::errors::{SummaryError, SummaryResultOf};
use crate::summary::mock::mock_summary;

/// Summary plus extracted entities, serialized as one flat object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    /// Model-generated or local fallback prose.
    pub summary: String,
    /// Medications, allergies and risks.
    #[serde(flatten)]
    pub entities: ExtractionResult,
}

/// How the prose summary is produced, decided once per call.
#[derive(Clone, Copy, Debug)]
pub enum SummaryStrategy<'a> {
    /// Delegate to the configured generative-text service.
    External(ExternalTarget<'a>),
    /// Deterministic truncation of the input.
    LocalFallback,
}

impl<'a> SummaryStrategy<'a> {
    /// Pick the external service when fully configured, the local fallback otherwise.
    #[must_use]
    pub fn select(config: &'a SummarizerConfig) -> Self {
        ExternalTarget::from_config(config).map_or(Self::LocalFallback, Self::External)
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::External(_) => "external",
            Self::LocalFallback => "local_fallback",
        }
    }
}

/// Produces a [`SummaryResult`] for a piece of clinical text.
#[derive(Clone, Copy)]
pub struct SummaryComposer<'a> {
    extractor: &'a EntityExtractor,
}

impl<'a> SummaryComposer<'a> {
    /// Compose summaries using `extractor`.
    #[must_use]
    pub const fn new(extractor: &'a EntityExtractor) -> Self {
        Self { extractor }
    }

    /// Extract entities and summarize `text`.
    ///
    /// An external failure is returned as-is; there is no fallback to the
    /// local summary once the external strategy has been selected.
    ///
    /// # Errors
    /// Returns [`SummaryError::InvalidInput`] for empty text and
    /// [`SummaryError::UpstreamSummary`] when the external call fails.
    pub fn summarize(
        &self,
        text: &str,
        config: &SummarizerConfig,
    ) -> SummaryResultOf<SummaryResult> {
        if text.is_empty() {
            return Err(SummaryError::InvalidInput(
                "medical text must be a non-empty string".to_string(),
            ));
        }

        let entities = self.extractor.extract(text);
        let strategy = SummaryStrategy::select(config);
        info!(
            strategy = strategy.name(),
            text_chars = text.chars().count(),
            "composing summary"
        );

        let summary = match strategy {
            SummaryStrategy::External(target) => AzureChatClient::new(&target)?.summarize(text)?,
            SummaryStrategy::LocalFallback => mock_summary(text),
        };

        Ok(SummaryResult { summary, entities })
    }
}

/// Summarize `text` with the shared extractor.
///
/// # Errors
/// See [`SummaryComposer::summarize`].
pub fn summarize(text: &str, config: &SummarizerConfig) -> SummaryResultOf<SummaryResult> {
    SummaryComposer::new(shared_extractor()).summarize(text, config)
}
