//! Rule-based extraction of medications, allergies and risk factors.
//!
//! - `vocabulary`: closed, hand-maintained term and pattern tables
//! - `entity_extractor`: compiled extractor running the three passes

pub mod entity_extractor;
pub mod vocabulary;

pub use entity_extractor::{EntityExtractor, ExtractionResult, extract, shared_extractor};
pub use vocabulary::{ALLERGY_KEYWORDS, MEDICATIONS, REACTION_STOPLIST, RISK_PATTERNS};
