//! Clinical note summarization backend: entity extraction, summary composition,
//! patient record storage and a role-aware HTTP API.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]
// Clippy
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::shadow_unrelated)]
#![deny(clippy::too_many_arguments)]
#![deny(overflowing_literals)]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::shadow_unrelated
    )
)]

/// Accounts, password hashing, access tokens and role checks.
pub mod auth;
/// Runtime configuration loaded from the environment.
pub mod config;
/// Medication, allergy and risk extraction from free text.
pub mod extraction;
/// HTTP server and API routes.
#[allow(clippy::missing_errors_doc, clippy::unused_async)]
pub mod server;
/// Entry helpers to start the EHR summarizer.
pub mod start_ehr_summarizer;
/// `SQLite` persistence for accounts, records, summaries and grants.
pub mod storage;
/// Summary composition with external and local strategies.
pub mod summary;
