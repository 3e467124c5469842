use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned instant, always UTC.
pub type Timestamp = DateTime<Utc>;

// =============================================================================
// Enums
// =============================================================================

/// Who produced a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The assistant asking questions.
    Ai,
    /// The person being consulted.
    User,
}

impl Speaker {
    /// Prefix used when the transcript is replayed into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Ai => "AI",
            Speaker::User => "You",
        }
    }
}

/// Lifecycle phase of a consultation session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Created but `start()` not called yet.
    #[default]
    NotStarted,
    /// Waiting for the user's answer to the current question.
    AwaitingAnswer,
    /// A prompt is being played back; capture is suspended.
    Speaking,
    /// The transcript is with the symptom extractor.
    Extracting,
    /// The symptom set is with the diagnosis resolver.
    Diagnosing,
    /// Finished, either normally or through `end()`.
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::NotStarted => write!(f, "NotStarted"),
            Phase::AwaitingAnswer => write!(f, "AwaitingAnswer"),
            Phase::Speaking => write!(f, "Speaking"),
            Phase::Extracting => write!(f, "Extracting"),
            Phase::Diagnosing => write!(f, "Diagnosing"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

impl Phase {
    /// Returns whether a transition from `self` to `target` is valid.
    ///
    /// `Complete` is reachable from every phase (early termination) except
    /// itself.
    pub fn can_transition_to(&self, target: &Phase) -> bool {
        matches!(
            (self, target),
            (Phase::NotStarted, Phase::AwaitingAnswer)
                | (Phase::AwaitingAnswer, Phase::AwaitingAnswer)
                | (Phase::AwaitingAnswer, Phase::Speaking)
                | (Phase::Speaking, Phase::AwaitingAnswer)
                | (Phase::AwaitingAnswer, Phase::Extracting)
                | (Phase::Extracting, Phase::Diagnosing)
                | (Phase::Diagnosing, Phase::Complete)
                // Early termination
                | (Phase::NotStarted, Phase::Complete)
                | (Phase::AwaitingAnswer, Phase::Complete)
                | (Phase::Speaking, Phase::Complete)
                | (Phase::Extracting, Phase::Complete)
        )
    }

    /// Whether extraction or diagnosis is outstanding.
    pub fn is_downstream(&self) -> bool {
        matches!(self, Phase::Extracting | Phase::Diagnosing)
    }
}

// =============================================================================
// Transcript
// =============================================================================

/// One line of the consultation, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptEntry {
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Ai,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker.label(), self.text)
    }
}

/// Render a transcript as `AI: ...` / `You: ...` lines joined by newlines.
pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Symptoms and diagnosis
// =============================================================================

/// Canonical symptom tokens, insertion-ordered with duplicates collapsed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomSet(Vec<String>);

impl SymptomSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a token. Returns `false` if it was already present.
    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if self.0.contains(&token) {
            return false;
        }
        self.0.push(token);
        true
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t == token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for SymptomSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SymptomSet::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

/// Resolver output: the wire shape `{"disease", "description", "precautions"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub disease: String,
    pub description: String,
    pub precautions: String,
}

impl Diagnosis {
    pub const UNKNOWN_DISEASE: &'static str = "Unknown";

    /// The "consult a professional" sentinel returned when nothing can be inferred.
    pub fn unknown() -> Self {
        Self {
            disease: Self::UNKNOWN_DISEASE.to_string(),
            description: "Unable to determine based on provided symptoms.".to_string(),
            precautions: "Consult a healthcare professional.".to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.disease.eq_ignore_ascii_case(Self::UNKNOWN_DISEASE)
    }
}

// =============================================================================
// Consultation records
// =============================================================================

/// Durable summary of one completed session, as handed to the persistence sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub session_id: Uuid,
    pub symptoms: SymptomSet,
    pub diagnosis: Diagnosis,
}

/// A record as stored, with the server-assigned timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConsultation {
    pub id: Uuid,
    pub user_id: String,
    pub record: ConsultationRecord,
    pub timestamp: Timestamp,
}

/// Per-user history document: `{diagnosis, description, precautions, symptoms, timestamp}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationDocument {
    pub diagnosis: String,
    pub description: String,
    pub precautions: String,
    pub symptoms: SymptomSet,
    pub timestamp: Timestamp,
}

impl From<&StoredConsultation> for ConsultationDocument {
    fn from(stored: &StoredConsultation) -> Self {
        Self {
            diagnosis: stored.record.diagnosis.disease.clone(),
            description: stored.record.diagnosis.description.clone(),
            precautions: stored.record.diagnosis.precautions.clone(),
            symptoms: stored.record.symptoms.clone(),
            timestamp: stored.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::NotStarted.to_string(), "NotStarted");
        assert_eq!(Phase::AwaitingAnswer.to_string(), "AwaitingAnswer");
        assert_eq!(Phase::Speaking.to_string(), "Speaking");
        assert_eq!(Phase::Extracting.to_string(), "Extracting");
        assert_eq!(Phase::Diagnosing.to_string(), "Diagnosing");
        assert_eq!(Phase::Complete.to_string(), "Complete");
    }

    #[test]
    fn test_forward_transitions() {
        assert!(Phase::NotStarted.can_transition_to(&Phase::AwaitingAnswer));
        assert!(Phase::AwaitingAnswer.can_transition_to(&Phase::AwaitingAnswer));
        assert!(Phase::AwaitingAnswer.can_transition_to(&Phase::Extracting));
        assert!(Phase::Extracting.can_transition_to(&Phase::Diagnosing));
        assert!(Phase::Diagnosing.can_transition_to(&Phase::Complete));
        assert!(Phase::AwaitingAnswer.can_transition_to(&Phase::Speaking));
        assert!(Phase::Speaking.can_transition_to(&Phase::AwaitingAnswer));
    }

    #[test]
    fn test_every_live_phase_can_terminate() {
        for phase in [
            Phase::NotStarted,
            Phase::AwaitingAnswer,
            Phase::Speaking,
            Phase::Extracting,
            Phase::Diagnosing,
        ] {
            assert!(phase.can_transition_to(&Phase::Complete), "{phase}");
        }
        assert!(!Phase::Complete.can_transition_to(&Phase::Complete));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!Phase::NotStarted.can_transition_to(&Phase::Extracting));
        assert!(!Phase::Extracting.can_transition_to(&Phase::AwaitingAnswer));
        assert!(!Phase::Diagnosing.can_transition_to(&Phase::Extracting));
        assert!(!Phase::Speaking.can_transition_to(&Phase::Extracting));
        assert!(!Phase::Complete.can_transition_to(&Phase::AwaitingAnswer));
        assert!(!Phase::Complete.can_transition_to(&Phase::NotStarted));
    }

    #[test]
    fn test_is_downstream() {
        assert!(Phase::Extracting.is_downstream());
        assert!(Phase::Diagnosing.is_downstream());
        assert!(!Phase::AwaitingAnswer.is_downstream());
        assert!(!Phase::Complete.is_downstream());
    }

    #[test]
    fn test_render_transcript_alternates_labels() {
        let entries = vec![
            TranscriptEntry::ai("How are you feeling?"),
            TranscriptEntry::user("I feel ok"),
            TranscriptEntry::ai("What symptoms?"),
            TranscriptEntry::user("My stomach hurts"),
        ];
        assert_eq!(
            render_transcript(&entries),
            "AI: How are you feeling?\nYou: I feel ok\nAI: What symptoms?\nYou: My stomach hurts"
        );
    }

    #[test]
    fn test_render_empty_transcript() {
        assert_eq!(render_transcript(&[]), "");
    }

    #[test]
    fn test_symptom_set_collapses_duplicates_and_keeps_order() {
        let set: SymptomSet = ["headache", "fatigue", "headache"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice(), &["headache".to_string(), "fatigue".to_string()]);
        assert!(set.contains("fatigue"));
        assert!(!set.contains("cough"));
    }

    #[test]
    fn test_symptom_set_serializes_as_array() {
        let set: SymptomSet = ["stomach_pain", "headache"].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["stomach_pain","headache"]"#);
    }

    #[test]
    fn test_unknown_diagnosis_sentinel() {
        let d = Diagnosis::unknown();
        assert_eq!(d.disease, "Unknown");
        assert_eq!(d.precautions, "Consult a healthcare professional.");
        assert!(d.is_unknown());

        let gastritis = Diagnosis {
            disease: "Gastritis".to_string(),
            description: "Inflamed stomach lining".to_string(),
            precautions: "Avoid spicy food".to_string(),
        };
        assert!(!gastritis.is_unknown());
    }

    #[test]
    fn test_diagnosis_wire_field_names() {
        let value = serde_json::to_value(Diagnosis::unknown()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert!(obj.contains_key("disease"));
        assert!(obj.contains_key("description"));
        assert!(obj.contains_key("precautions"));
    }

    #[test]
    fn test_consultation_document_field_names() {
        let stored = StoredConsultation {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            record: ConsultationRecord {
                session_id: Uuid::new_v4(),
                symptoms: ["headache"].into_iter().collect(),
                diagnosis: Diagnosis::unknown(),
            },
            timestamp: Utc::now(),
        };
        let doc = ConsultationDocument::from(&stored);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["diagnosis"], "Unknown");
        assert_eq!(
            value["description"],
            "Unable to determine based on provided symptoms."
        );
        assert_eq!(value["symptoms"][0], "headache");
        assert!(value.get("timestamp").is_some());
        assert!(value.get("disease").is_none());
    }
}
