//! Canonical symptom vocabulary.
//!
//! Extraction output is only ever accepted through [`SymptomVocabulary::filter`]:
//! tokens that do not name a canonical symptom are dropped, one by one, and
//! never replaced by a guess.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::SymptomSet;

/// The 131 canonical symptom tokens understood by the diagnosis resolvers.
pub const CANONICAL_SYMPTOMS: &[&str] = &[
    "unsteadiness",
    "puffy_face_and_eyes",
    "brittle_nails",
    "enlarged_thyroid",
    "muscle_weakness",
    "redness_of_eyes",
    "fluid_overload",
    "bloody_stool",
    "cough",
    "yellowing_of_eyes",
    "high_fever",
    "irregular_sugar_level",
    "swollen_blood_vessels",
    "headache",
    "pain_in_anal_region",
    "irritability",
    "extra_marital_contacts",
    "shivering",
    "diarrhoea",
    "irritation_in_anus",
    "weakness_in_limbs",
    "movement_stiffness",
    "obesity",
    "itching",
    "swelling_of_stomach",
    "acute_liver_failure",
    "blood_in_sputum",
    "patches_in_throat",
    "dischromic patches",
    "ulcers_on_tongue",
    "excessive_hunger",
    "muscle_pain",
    "palpitations",
    "stomach_bleeding",
    "yellow_crust_ooze",
    "receiving_unsterile_injections",
    "skin_rash",
    "joint_pain",
    "skin_peeling",
    "small_dents_in_nails",
    "acidity",
    "cramps",
    "red_sore_around_nose",
    "polyuria",
    "bladder_discomfort",
    "congestion",
    "loss_of_balance",
    "altered_sensorium",
    "mood_swings",
    "coma",
    "weight_gain",
    "sunken_eyes",
    "pus_filled_pimples",
    "bruising",
    "hip_joint_pain",
    "restlessness",
    "depression",
    "continuous_sneezing",
    "chest_pain",
    "sinus_pressure",
    "muscle_wasting",
    "yellowish_skin",
    "spinning_movements",
    "scurring",
    "visual_disturbances",
    "runny_nose",
    "back_pain",
    "swelling_joints",
    "blister",
    "foul_smell_of urine",
    "stomach_pain",
    "fast_heart_rate",
    "dark_urine",
    "indigestion",
    "loss_of_appetite",
    "distention_of_abdomen",
    "painful_walking",
    "yellow_urine",
    "increased_appetite",
    "breathlessness",
    "drying_and_tingling_lips",
    "toxic_look(typhos)",
    "receiving_blood_transfusion",
    "slurred_speech",
    "blurred_and_distorted_vision",
    "anxiety",
    "dehydration",
    "pain_behind_the_eyes",
    "red_spots_over_body",
    "knee_pain",
    "lethargy",
    "sweating",
    "swollen_legs",
    "abnormal_menstruation",
    "fatigue",
    "swollen_extremeties",
    "inflammatory_nails",
    "mild_fever",
    "belly_pain",
    "abdominal_pain",
    "loss_of_smell",
    "stiff_neck",
    "vomiting",
    "throat_irritation",
    "family_history",
    "cold_hands_and_feets",
    "watering_from_eyes",
    "malaise",
    "dizziness",
    "continuous_feel_of_urine",
    "history_of_alcohol_consumption",
    "phlegm",
    "nausea",
    "silver_like_dusting",
    "chills",
    "constipation",
    "nodal_skin_eruptions",
    "blackheads",
    "swelled_lymph_nodes",
    "prominent_veins_on_calf",
    "rusty_sputum",
    "passage_of_gases",
    "weight_loss",
    "spotting_ urination",
    "lack_of_concentration",
    "internal_itching",
    "neck_pain",
    "pain_during_bowel_movements",
    "mucoid_sputum",
    "burning_micturition",
    "weakness_of_one_body_side",
];

/// Result of filtering raw extractor tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Canonical tokens, in first-seen order.
    pub accepted: SymptomSet,
    /// Raw tokens that matched nothing (after trimming; blanks are not reported).
    pub rejected: Vec<String>,
}

/// A fixed, immutable set of symptom tokens.
#[derive(Debug, Clone)]
pub struct SymptomVocabulary {
    tokens: Vec<String>,
    index: HashSet<String>,
}

impl SymptomVocabulary {
    /// Build a vocabulary from arbitrary tokens. Entries are trimmed and
    /// lowercased; blanks and duplicates are skipped.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Vec::new();
        let mut index = HashSet::new();
        for token in tokens {
            let token = token.as_ref().trim().to_ascii_lowercase();
            if token.is_empty() || !index.insert(token.clone()) {
                continue;
            }
            list.push(token);
        }
        Self {
            tokens: list,
            index,
        }
    }

    /// The shared canonical vocabulary.
    pub fn canonical() -> &'static SymptomVocabulary {
        static CANONICAL: OnceLock<SymptomVocabulary> = OnceLock::new();
        CANONICAL.get_or_init(|| SymptomVocabulary::new(CANONICAL_SYMPTOMS))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens in declaration order (used to build extraction prompts).
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Map a raw token to its canonical spelling, if it names one.
    ///
    /// Surrounding whitespace, quotes and brackets are stripped and the
    /// comparison is ASCII case-insensitive. No synonym mapping happens here.
    pub fn canonicalize(&self, raw: &str) -> Option<&str> {
        let cleaned = clean_token(raw).to_ascii_lowercase();
        self.index.get(cleaned.as_str()).map(String::as_str)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.canonicalize(raw).is_some()
    }

    /// Keep only canonical tokens.
    pub fn filter<I, S>(&self, raw_tokens: I) -> FilterOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = FilterOutcome::default();
        for raw in raw_tokens {
            let raw = raw.as_ref();
            match self.canonicalize(raw) {
                Some(token) => {
                    outcome.accepted.insert(token);
                }
                None => {
                    let cleaned = clean_token(raw);
                    if !cleaned.is_empty() {
                        outcome.rejected.push(cleaned.to_string());
                    }
                }
            }
        }
        outcome
    }

    /// Split free text on commas and newlines, then [`filter`](Self::filter).
    pub fn filter_delimited(&self, text: &str) -> FilterOutcome {
        self.filter(text.split([',', '\n']))
    }
}

fn clean_token(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '[' || c == ']' || c == '`')
        .trim()
}
