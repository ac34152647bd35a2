//! Rule-based medical entity extraction.
//!
//! Three independent passes over the same text:
//! - medications: whole-word match against [`MEDICATIONS`], lower-cased and sorted
//! - allergies: "allergy to ..." phrase, "Allergies: ..." list, then known allergen keywords
//! - risks: [`RISK_PATTERNS`] scanned in declaration order, first pattern per label wins
//!
//! Extraction is total: any string (including the empty one) yields a result,
//! absence of matches is an empty collection.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::vocabulary::{ALLERGY_KEYWORDS, MEDICATIONS, REACTION_STOPLIST, RISK_PATTERNS};

/// Structured entities mined from one piece of clinical text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Lower-cased medication names, sorted ascending, unique.
    pub medications: Vec<String>,
    /// Allergens in discovery order, unique by exact string.
    pub allergies: Vec<String>,
    /// Risk labels in vocabulary declaration order.
    pub risks: Vec<String>,
}

impl ExtractionResult {
    /// True when none of the passes found anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.medications.is_empty() && self.allergies.is_empty() && self.risks.is_empty()
    }
}

struct RiskRule {
    label: &'static str,
    patterns: Vec<Regex>,
}

/// Pattern-based extractor for medications, allergies and risk factors.
///
/// Holds only compiled patterns; [`EntityExtractor::extract`] takes `&self`
/// and can be shared freely across threads.
pub struct EntityExtractor {
    medication_pattern: Regex,
    allergy_phrase: Regex,
    allergy_colon_list: Regex,
    phrase_splitter: Regex,
    list_splitter: Regex,
    parenthetical: Regex,
    dangling_parenthetical: Regex,
    allergy_keywords: Vec<(&'static str, Regex)>,
    risk_rules: Vec<RiskRule>,
}

impl EntityExtractor {
    /// Compile the vocabulary tables into an extractor.
    ///
    /// # Errors
    /// Returns an error if any vocabulary pattern is invalid.
    pub fn new() -> Result<Self, regex::Error> {
        let alternation = MEDICATIONS
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");

        let allergy_keywords = ALLERGY_KEYWORDS
            .iter()
            .map(|keyword| {
                let pattern = format!(
                    r"(?i)(?:allerg(?:y|ies)\s+to\s+)?{}",
                    regex::escape(keyword)
                );
                Regex::new(&pattern).map(|re| (*keyword, re))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let risk_rules = RISK_PATTERNS
            .iter()
            .map(|(label, patterns)| {
                let patterns = patterns
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){p}")))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RiskRule { label, patterns })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            medication_pattern: Regex::new(&format!(r"(?i)\b({alternation})\b"))?,
            // List runs to the first sentence or clause terminator.
            allergy_phrase: Regex::new(r"(?i)allerg(?:y|ies)\s+to\s+([\w\s,()]+?)(?:\.|,|;|$)")?,
            // List runs to the end of the line or the first period.
            allergy_colon_list: Regex::new(r"(?i)allerg(?:y|ies):\s+([\w\s,()\-]+?)(?:\.|\n|$)")?,
            phrase_splitter: Regex::new(r"(?i),|;|\band\b")?,
            list_splitter: Regex::new(r"(?i),|\band\b")?,
            parenthetical: Regex::new(r"\s*\([^)]*\)")?,
            dangling_parenthetical: Regex::new(r"\s*\(.*$")?,
            allergy_keywords,
            risk_rules,
        })
    }

    /// Run all three passes over `text`.
    #[must_use]
    pub fn extract(&self, text: &str) -> ExtractionResult {
        let result = ExtractionResult {
            medications: self.extract_medications(text),
            allergies: self.extract_allergies(text),
            risks: self.extract_risks(text),
        };

        debug!(
            text_chars = text.chars().count(),
            medications = result.medications.len(),
            allergies = result.allergies.len(),
            risks = result.risks.len(),
            "entity extraction complete"
        );

        result
    }

    /// Medication pass: whole-word, case-insensitive, lower-cased, sorted, unique.
    #[must_use]
    pub fn extract_medications(&self, text: &str) -> Vec<String> {
        let found: BTreeSet<String> = self
            .medication_pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        found.into_iter().collect()
    }

    /// Allergy pass: phrase rule, colon-list rule, then keyword rule.
    #[must_use]
    pub fn extract_allergies(&self, text: &str) -> Vec<String> {
        let mut allergies = Vec::new();

        if let Some(list) = self.allergy_phrase.captures(text).and_then(|c| c.get(1)) {
            for item in self.split_items(list.as_str(), &self.phrase_splitter) {
                if !is_reaction_descriptor(&item) {
                    push_unique(&mut allergies, item);
                }
            }
        }

        if let Some(list) = self.allergy_colon_list.captures(text).and_then(|c| c.get(1)) {
            for item in self.split_items(list.as_str(), &self.list_splitter) {
                if item.chars().count() > 1 {
                    push_unique(&mut allergies, item);
                }
            }
        }

        for (keyword, pattern) in &self.allergy_keywords {
            if pattern.is_match(text) {
                push_unique(&mut allergies, (*keyword).to_string());
            }
        }

        allergies
    }

    /// Risk pass: labels in declaration order, each at most once.
    #[must_use]
    pub fn extract_risks(&self, text: &str) -> Vec<String> {
        self.risk_rules
            .iter()
            .filter(|rule| rule.patterns.iter().any(|p| p.is_match(text)))
            .map(|rule| rule.label.to_string())
            .collect()
    }

    fn split_items(&self, list: &str, splitter: &Regex) -> Vec<String> {
        let without_notes = self.parenthetical.replace_all(list, "");
        splitter
            .split(&without_notes)
            .map(|item| {
                self.dangling_parenthetical
                    .replace(item, "")
                    .trim_matches(|c: char| c.is_whitespace() || c == ')')
                    .to_string()
            })
            .filter(|item| !item.is_empty())
            .collect()
    }
}

impl Default for EntityExtractor {
    /// Creates an extractor from the built-in vocabulary.
    ///
    /// # Panics
    /// Panics if the built-in patterns are invalid (covered by tests).
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new().expect("built-in extraction patterns should be valid")
    }
}

/// Process-wide extractor, compiled on first use.
#[must_use]
pub fn shared_extractor() -> &'static EntityExtractor {
    static SHARED: OnceLock<EntityExtractor> = OnceLock::new();
    SHARED.get_or_init(EntityExtractor::default)
}

/// Extract medications, allergies and risks from `text` using the shared extractor.
#[must_use]
pub fn extract(text: &str) -> ExtractionResult {
    shared_extractor().extract(text)
}

fn is_reaction_descriptor(item: &str) -> bool {
    REACTION_STOPLIST
        .iter()
        .any(|word| word.eq_ignore_ascii_case(item))
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> EntityExtractor {
        EntityExtractor::new().unwrap()
    }

    #[test]
    fn test_medication_extraction_basic() {
        let result =
            extractor().extract("Patient on metformin 500mg BID, lisinopril 10mg daily, atorvastatin 20mg.");
        assert_eq!(
            result.medications,
            vec!["atorvastatin", "lisinopril", "metformin"]
        );
    }

    #[test]
    fn test_medication_extraction_expanded() {
        let result = extractor().extract("Prescribed amoxicillin 500mg, warfarin 5mg, metoprolol 50mg BID.");
        assert!(result.medications.contains(&"amoxicillin".to_string()));
        assert!(result.medications.contains(&"warfarin".to_string()));
        assert!(result.medications.contains(&"metoprolol".to_string()));
    }

    #[test]
    fn test_medication_case_insensitive_and_deduplicated() {
        let result = extractor().extract("Metformin increased. Continue METFORMIN and metformin.");
        assert_eq!(result.medications, vec!["metformin"]);
    }

    #[test]
    fn test_medication_requires_whole_word() {
        let result = extractor().extract("Trial drug metforminol and pre-aspirinate compound.");
        assert!(result.medications.is_empty());
    }

    #[test]
    fn test_allergy_phrase_rule() {
        let result = extractor().extract("Allergies to penicillin and sulfa drugs.");
        assert!(result.allergies.contains(&"penicillin".to_string()));
        assert!(result.allergies.contains(&"sulfa drugs".to_string()));
        // Keyword rule still contributes the bare allergen.
        assert!(result.allergies.contains(&"sulfa".to_string()));
    }

    #[test]
    fn test_allergy_strips_parenthetical_reaction() {
        let result = extractor().extract("Known allergy to penicillin (anaphylaxis).");
        assert_eq!(result.allergies, vec!["penicillin"]);
    }

    #[test]
    fn test_allergy_phrase_drops_reaction_descriptors() {
        let result = extractor().extract("Allergy to rash and shellfish; otherwise well.");
        assert_eq!(result.allergies, vec!["shellfish"]);
    }

    #[test]
    fn test_allergy_colon_list_with_reactions() {
        let result =
            extractor().extract("Allergies: penicillin (anaphylaxis), ibuprofen (GI upset), latex.");
        assert_eq!(result.allergies, vec!["penicillin", "ibuprofen", "latex"]);
        assert!(!result.allergies.iter().any(|a| a.contains("anaphylaxis")));
    }

    #[test]
    fn test_allergy_colon_format_keeps_exact_match_dedup() {
        let result = extractor().extract("Allergies: codeine, NSAIDs (rash), ace inhibitors.");
        assert_eq!(
            result.allergies,
            vec!["codeine", "NSAIDs", "ace inhibitors", "nsaids"]
        );
    }

    #[test]
    fn test_allergy_colon_list_stops_at_line_end() {
        let result = extractor().extract("Allergy: shellfish\nPlan: continue aspirin");
        assert_eq!(result.allergies, vec!["shellfish"]);
    }

    #[test]
    fn test_allergy_parenthetical_with_commas_stays_intact() {
        let result = extractor().extract("Allergies: latex (hives, wheeze) and eggs.");
        assert_eq!(result.allergies, vec!["latex", "eggs"]);
    }

    #[test]
    fn test_allergy_unclosed_parenthetical_is_dropped() {
        let result = extractor().extract("Allergy to penicillin (hives, wheeze.");
        assert_eq!(result.allergies, vec!["penicillin"]);
    }

    #[test]
    fn test_risk_extraction_cardiac() {
        let result = extractor().extract("PMH: CAD s/p MI 2018, hypertension, atrial fibrillation.");
        assert_eq!(
            result.risks,
            vec!["hypertension", "heart attack", "CAD", "angina", "arrhythmia"]
        );
    }

    #[test]
    fn test_risk_extraction_diabetes_smoking_order() {
        let result = extractor().extract("Patient has type 2 diabetes, smoking history 20 pack-years.");
        assert_eq!(result.risks, vec!["diabetes", "smoking"]);
        assert!(result.medications.is_empty());
        assert!(result.allergies.is_empty());
    }

    #[test]
    fn test_risk_extraction_comprehensive() {
        let result =
            extractor().extract("PMH: diabetes type 2, hypertension, stroke (2015), asthma, COPD, obesity.");
        assert_eq!(
            result.risks,
            vec!["diabetes", "hypertension", "stroke", "obesity", "asthma", "COPD"]
        );
    }

    #[test]
    fn test_chest_pain_alone_is_not_angina() {
        let result = extractor().extract("Patient reports normal appetite and sleep. No chest pain or dyspnea.");
        assert!(result.is_empty());
    }

    #[test]
    fn test_cad_with_chest_symptoms_is_angina() {
        let result = extractor().extract("Known CAD, now with chest tightness on exertion.");
        assert_eq!(result.risks, vec!["CAD", "angina"]);
    }

    #[test]
    fn test_abbreviations_need_word_boundaries() {
        // "admitted" contains "dm" and "mi", "BMI" contains "mi".
        let result = extractor().extract("Admitted overnight, BMI 24, initial labs unremarkable.");
        assert!(result.risks.is_empty());
    }

    #[test]
    fn test_stems_only_match_at_word_start() {
        // Prefixed forms are different findings, not the stem's risk.
        let result = extractor().extract("History of prediabetes; nonsmoker; hypertensive crisis");
        assert_eq!(result.risks, vec!["hypertension"]);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let result = extractor().extract(
            "Patient on metformin 500mg BID, lisinopril 10mg daily. Allergies: penicillin (anaphylaxis), latex. PMH: CAD s/p MI 2018, hypertension.",
        );
        assert_eq!(result.medications, vec!["lisinopril", "metformin"]);
        assert_eq!(result.allergies, vec!["penicillin", "latex"]);
        let hypertension = result.risks.iter().position(|r| r == "hypertension").unwrap();
        let cad = result.risks.iter().position(|r| r == "CAD").unwrap();
        assert!(hypertension < cad);
    }

    #[test]
    fn test_empty_and_irrelevant_text() {
        assert!(extractor().extract("").is_empty());
        assert!(extractor().extract("Lorem ipsum dolor sit amet.").is_empty());
    }

    #[test]
    fn test_extract_is_idempotent() {
        let text = "Allergies: latex. On warfarin for afib. Obese, asthma.";
        let shared = shared_extractor();
        assert_eq!(shared.extract(text), shared.extract(text));
        assert_eq!(extract(text), extractor().extract(text));
    }

    #[test]
    fn test_unicode_text_does_not_panic() {
        let result = extractor().extract("Allergie à la pénicilline — patiente diabétique, métformine.");
        assert!(result.medications.is_empty());
    }

    #[derive(Deserialize)]
    struct SampleRecord {
        id: String,
        text: String,
    }

    fn sample_records() -> Vec<SampleRecord> {
        serde_json::from_str(include_str!("../../data/sample_ehr_records.json")).unwrap()
    }

    #[test]
    fn test_sample_routine_follow_up() {
        let records = sample_records();
        let result = extractor().extract(&records[0].text);
        assert_eq!(
            result.medications,
            vec!["atorvastatin", "lisinopril", "metformin"]
        );
        assert!(result.allergies.contains(&"penicillin".to_string()));
        assert!(result.allergies.contains(&"sulfa".to_string()));
        assert_eq!(result.risks, vec!["diabetes", "hypertension"]);
    }

    #[test]
    fn test_sample_acute_cardiac_event() {
        let records = sample_records();
        let result = extractor().extract(&records[1].text);
        assert_eq!(
            result.medications,
            vec!["aspirin", "atorvastatin", "metoprolol"]
        );
        assert_eq!(result.allergies, vec!["latex"]);
        assert_eq!(result.risks, vec!["smoking", "heart attack", "CAD"]);
    }

    #[test]
    fn test_sample_infection_with_allergy_history() {
        let records = sample_records();
        let result = extractor().extract(&records[4].text);
        assert_eq!(result.allergies, vec!["amoxicillin", "azithromycin"]);
        assert_eq!(result.risks, vec!["asthma"]);
    }

    #[test]
    fn test_sample_ids_are_unique() {
        let records = sample_records();
        let ids: BTreeSet<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), records.len());
        assert!(records.len() >= 5);
    }
}
