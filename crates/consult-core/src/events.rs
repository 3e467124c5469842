use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ConsultationRecord, Phase, Timestamp, TranscriptEntry};

/// Everything an observer can see happen to a consultation session.
///
/// Emitted by the session controller after each state change and consumed by:
/// - The speech/console front end (to render the transcript live)
/// - Logging and audit listeners
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// The session moved from one phase to another.
    PhaseChanged {
        session_id: Uuid,
        from: Phase,
        to: Phase,
        timestamp: Timestamp,
    },

    /// A line was appended to the transcript.
    TranscriptAppended {
        session_id: Uuid,
        index: usize,
        entry: TranscriptEntry,
        timestamp: Timestamp,
    },

    /// The live answer draft changed.
    DraftUpdated {
        session_id: Uuid,
        text: String,
        timestamp: Timestamp,
    },

    /// Extraction finished and the symptoms were filtered.
    SymptomsExtracted {
        session_id: Uuid,
        accepted: usize,
        rejected: usize,
        timestamp: Timestamp,
    },

    /// The consultation record is final (emitted once per session, possibly after `end()`).
    ConsultationRecorded {
        session_id: Uuid,
        record: ConsultationRecord,
        timestamp: Timestamp,
    },

    /// `end()` was called before the interview finished.
    SessionEnded {
        session_id: Uuid,
        turn_index: usize,
        timestamp: Timestamp,
    },
}

impl SessionEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::PhaseChanged { session_id, .. }
            | SessionEvent::TranscriptAppended { session_id, .. }
            | SessionEvent::DraftUpdated { session_id, .. }
            | SessionEvent::SymptomsExtracted { session_id, .. }
            | SessionEvent::ConsultationRecorded { session_id, .. }
            | SessionEvent::SessionEnded { session_id, .. } => *session_id,
        }
    }

    /// Short machine-readable name, used as the `event` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::PhaseChanged { .. } => "phase_changed",
            SessionEvent::TranscriptAppended { .. } => "transcript_appended",
            SessionEvent::DraftUpdated { .. } => "draft_updated",
            SessionEvent::SymptomsExtracted { .. } => "symptoms_extracted",
            SessionEvent::ConsultationRecorded { .. } => "consultation_recorded",
            SessionEvent::SessionEnded { .. } => "session_ended",
        }
    }
}
