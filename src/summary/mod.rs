//! Summary composition: extraction plus external or local prose summary.
//!
//! - `composer`: strategy selection and result assembly
//! - `azure`: blocking Azure `OpenAI` chat-completions client
//! - `mock`: deterministic local fallback
//! - `errors`: `InvalidInput` / upstream failures

pub mod azure;
pub mod composer;
pub mod errors;
pub mod mock;

pub use azure::{AzureChatClient, ExternalTarget, SYSTEM_INSTRUCTION};
pub use composer::{SummaryComposer, SummaryResult, SummaryStrategy, summarize};
pub use errors::{SummaryError, SummaryResultOf, UpstreamError};
pub use mock::{MOCK_SUMMARY_PREFIX, mock_summary};
