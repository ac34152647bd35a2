//! EHR summarizer HTTP server.
//! Run with: cargo run --bin ehr-summarizer

use std::process::ExitCode;

use ehr_summarizer::start_ehr_summarizer;

fn main() -> ExitCode {
    start_ehr_summarizer::run()
}
