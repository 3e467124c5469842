use serde::{Deserialize, Serialize};
use uuid::Uuid;

use consult_core::types::{
    ConsultationRecord, Diagnosis, Phase, SymptomSet, Timestamp, TranscriptEntry,
};

/// State of one consultation, as held by the controller.
///
/// Observers get clones through
/// [`ConsultationController::snapshot`](crate::controller::ConsultationController::snapshot);
/// the controller owns the only mutable copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub phase: Phase,
    /// Index of the question currently being answered. Equals
    /// `question_count` once the last answer is in.
    pub turn_index: usize,
    pub question_count: usize,
    pub transcript: Vec<TranscriptEntry>,
    /// Live text of the answer being spoken or typed.
    pub current_answer_draft: String,
    pub symptoms: Option<SymptomSet>,
    pub diagnosis: Option<Diagnosis>,
    /// Set when `end()` was called before the interview completed.
    pub ended_early: bool,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, question_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            phase: Phase::NotStarted,
            turn_index: 0,
            question_count,
            transcript: Vec::new(),
            current_answer_draft: String::new(),
            symptoms: None,
            diagnosis: None,
            ended_early: false,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Whether the answer being collected is for the last question.
    pub fn on_last_question(&self) -> bool {
        self.turn_index + 1 >= self.question_count
    }

    /// Symptoms and diagnosis, once the diagnosis is known.
    pub fn outcome(&self) -> Option<ConsultationRecord> {
        let diagnosis = self.diagnosis.clone()?;
        Some(ConsultationRecord {
            session_id: self.id,
            symptoms: self.symptoms.clone().unwrap_or_default(),
            diagnosis,
        })
    }
}

/// Why a controller call had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The answer was empty after trimming.
    EmptyAnswer,
    /// `start()` has not been called.
    NotStarted,
    /// `start()` was called on a session that is already running.
    AlreadyStarted,
    /// Extraction or diagnosis is outstanding.
    Busy,
    /// A prompt is being played back.
    Speaking,
    /// The session is complete.
    Finished,
}

impl IgnoreReason {
    /// The reason an answer submitted in `phase` would be ignored, if any.
    pub fn for_answer_in(phase: Phase) -> Option<Self> {
        match phase {
            Phase::NotStarted => Some(IgnoreReason::NotStarted),
            Phase::AwaitingAnswer => None,
            Phase::Speaking => Some(IgnoreReason::Speaking),
            Phase::Extracting | Phase::Diagnosing => Some(IgnoreReason::Busy),
            Phase::Complete => Some(IgnoreReason::Finished),
        }
    }
}

/// Result of `start`, `submit_answer` and `submit_draft`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing changed.
    Ignored(IgnoreReason),
    /// The session advanced; this question is now awaiting an answer.
    NextQuestion(String),
    /// The last answer was processed and the record is final.
    Completed(ConsultationRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("user-1", 3);
        assert_eq!(session.phase, Phase::NotStarted);
        assert_eq!(session.turn_index, 0);
        assert!(session.transcript.is_empty());
        assert!(session.outcome().is_none());
        assert!(!session.on_last_question());
    }

    #[test]
    fn test_on_last_question() {
        let mut session = Session::new("user-1", 2);
        session.turn_index = 1;
        assert!(session.on_last_question());

        let single = Session::new("user-1", 1);
        assert!(single.on_last_question());
    }

    #[test]
    fn test_outcome_without_symptoms_uses_empty_set() {
        let mut session = Session::new("user-1", 1);
        session.diagnosis = Some(Diagnosis::unknown());
        let record = session.outcome().unwrap();
        assert_eq!(record.session_id, session.id);
        assert!(record.symptoms.is_empty());
        assert!(record.diagnosis.is_unknown());
    }

    #[test]
    fn test_ignore_reason_per_phase() {
        assert_eq!(
            IgnoreReason::for_answer_in(Phase::NotStarted),
            Some(IgnoreReason::NotStarted)
        );
        assert_eq!(IgnoreReason::for_answer_in(Phase::AwaitingAnswer), None);
        assert_eq!(
            IgnoreReason::for_answer_in(Phase::Speaking),
            Some(IgnoreReason::Speaking)
        );
        assert_eq!(
            IgnoreReason::for_answer_in(Phase::Extracting),
            Some(IgnoreReason::Busy)
        );
        assert_eq!(
            IgnoreReason::for_answer_in(Phase::Diagnosing),
            Some(IgnoreReason::Busy)
        );
        assert_eq!(
            IgnoreReason::for_answer_in(Phase::Complete),
            Some(IgnoreReason::Finished)
        );
    }
}
