//! Closed vocabularies driving the rule-based extractor.
//!
//! Every table here is plain data so it can be audited and tested without
//! touching the matching code. Regex fragments are compiled case-insensitively
//! by [`super::EntityExtractor`].

/// Medication names recognised by the medication pass (matched whole-word).
pub const MEDICATIONS: &[&str] = &[
    // analgesics / NSAIDs
    "aspirin",
    "ibuprofen",
    "naproxen",
    "acetaminophen",
    "tramadol",
    "oxycodone",
    "morphine",
    "gabapentin",
    // diabetes
    "metformin",
    "insulin",
    "glipizide",
    "glyburide",
    // hypertension / cardiac
    "lisinopril",
    "atorvastatin",
    "metoprolol",
    "carvedilol",
    "diltiazem",
    "amlodipine",
    // anticoagulants
    "warfarin",
    "apixaban",
    "rivaroxaban",
    "dabigatran",
    // antibiotics
    "amoxicillin",
    "ciprofloxacin",
    "azithromycin",
    // gastric
    "omeprazole",
    "ranitidine",
    // psychiatric
    "sertraline",
    "fluoxetine",
    "amitriptyline",
];

/// Well-known allergens picked up anywhere in the text.
pub const ALLERGY_KEYWORDS: &[&str] = &[
    "latex",
    "penicillin",
    "sulfa",
    "codeine",
    "nsaids",
    "ace inhibitors",
];

/// Reaction descriptors that are never allergens on their own.
pub const REACTION_STOPLIST: &[&str] = &["reaction", "anaphylaxis", "gi upset", "rash", "swelling"];

/// Risk label and the patterns that assert it, in output order.
///
/// The first pattern that matches wins; a label is emitted at most once.
pub const RISK_PATTERNS: &[(&str, &[&str])] = &[
    ("diabetes", &[r"\bdiabet", r"\bdm\b", r"\btype\s*[12]\b"]),
    ("smoking", &[r"\bsmok", r"\btobacco", r"\bcigarette"]),
    (
        "hypertension",
        &[r"\bhypertens", r"high blood pressure", r"\bhbp\b", r"\bhtn\b"],
    ),
    ("stroke", &[r"\bstroke", r"\bcva\b", r"\btia\b"]),
    (
        "heart attack",
        &[r"heart attack", r"\bmi\b", r"myocardial infarction"],
    ),
    ("CAD", &[r"\bcad\b", r"coronary artery disease"]),
    // Plain "chest pain" must not assert angina.
    ("angina", &[r"\bangina", r"\bs/p\s+mi\b", r"\bcad\b.*\bchest"]),
    (
        "arrhythmia",
        &[r"\barrhythmia", r"\bafib\b", r"atrial fibrillation"],
    ),
    ("obesity", &[r"\bobesity", r"\bobese\b"]),
    ("asthma", &[r"\basthma", r"reactive airway"]),
    ("COPD", &[r"\bcopd\b", r"chronic obstructive"]),
];
