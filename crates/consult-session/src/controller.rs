//! Consultation controller managing the interview lifecycle.
//!
//! The `ConsultationController` walks a fixed question sequence, gates
//! progress on non-empty answers, and on the last answer runs the
//! extract-then-diagnose pipeline exactly once. All session state sits behind
//! a `std::sync::Mutex` that is never held across an `.await`, so the
//! controller is `Send + Sync` and can be shared through `Arc`. The pipeline
//! runs on its own task: a caller that stops waiting (timeout, cancellation)
//! does not leave the session stuck in `Extracting`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use consult_core::config::InterviewConfig;
use consult_core::error::ConsultError;
use consult_core::events::SessionEvent;
use consult_core::types::{
    render_transcript, ConsultationRecord, Diagnosis, Phase, SymptomSet, TranscriptEntry,
};
use consult_core::vocabulary::SymptomVocabulary;

use crate::payload::sanitize_diagnosis;
use crate::ports::{DiagnosisResolver, ExtractedSymptoms, PersistenceSink, SymptomExtractor};
use crate::session::{IgnoreReason, Session, TurnOutcome};

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The three downstream services a controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn SymptomExtractor>,
    pub resolver: Arc<dyn DiagnosisResolver>,
    pub sink: Arc<dyn PersistenceSink>,
}

impl Collaborators {
    pub fn new(
        extractor: Arc<dyn SymptomExtractor>,
        resolver: Arc<dyn DiagnosisResolver>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            extractor,
            resolver,
            sink,
        }
    }
}

/// Drives one consultation session.
pub struct ConsultationController {
    questions: Vec<String>,
    shared: Arc<Shared>,
}

/// State reachable from the pipeline task. The task owns an `Arc` of it, so
/// the pipeline finishes even if the caller stops waiting.
struct Shared {
    closing_message: String,
    vocabulary: &'static SymptomVocabulary,
    collaborators: Collaborators,
    session: Mutex<Session>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for ConsultationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsultationController")
            .field("questions", &self.questions.len())
            .field("extractor", &self.shared.collaborators.extractor.name())
            .field("resolver", &self.shared.collaborators.resolver.name())
            .field("session", &self.shared.session)
            .finish()
    }
}

impl ConsultationController {
    /// Create a controller for `user_id`.
    ///
    /// Fails with [`ConsultError::Config`] if `questions` is empty or contains
    /// a blank question.
    pub fn new(
        user_id: impl Into<String>,
        questions: Vec<String>,
        closing_message: impl Into<String>,
        collaborators: Collaborators,
    ) -> Result<Self, ConsultError> {
        if questions.is_empty() {
            return Err(ConsultError::Config(
                "interview needs at least one question".to_string(),
            ));
        }
        if let Some(pos) = questions.iter().position(|q| q.trim().is_empty()) {
            return Err(ConsultError::Config(format!(
                "interview question {} is blank",
                pos + 1
            )));
        }

        let session = Session::new(user_id, questions.len());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        debug!(
            session_id = %session.id,
            questions = questions.len(),
            "Consultation controller created"
        );

        Ok(Self {
            questions,
            shared: Arc::new(Shared {
                closing_message: closing_message.into(),
                vocabulary: SymptomVocabulary::canonical(),
                collaborators,
                session: Mutex::new(session),
                events,
            }),
        })
    }

    /// Create a controller from the `[interview]` configuration section.
    pub fn from_config(
        user_id: impl Into<String>,
        interview: &InterviewConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ConsultError> {
        Self::new(
            user_id,
            interview.questions.clone(),
            interview.closing_message.clone(),
            collaborators,
        )
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn session_id(&self) -> Uuid {
        self.shared.lock().id
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn closing_message(&self) -> &str {
        &self.shared.closing_message
    }

    /// A copy of the current session state.
    pub fn snapshot(&self) -> Session {
        self.shared.lock().clone()
    }

    /// Symptoms and diagnosis once the diagnosis is known.
    pub fn outcome(&self) -> Option<ConsultationRecord> {
        self.shared.lock().outcome()
    }

    /// Subscribe to session events. Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    // -------------------------------------------------------------------------
    // Interview
    // -------------------------------------------------------------------------

    /// Start the interview by asking the first question.
    pub fn start(&self) -> TurnOutcome {
        let mut events = Vec::new();
        let outcome = {
            let mut session = self.shared.lock();
            match session.phase {
                Phase::NotStarted => {
                    session.started_at = Some(Utc::now());
                    set_phase(&mut session, Phase::AwaitingAnswer, &mut events);
                    let question = self.questions[0].clone();
                    push_entry(&mut session, TranscriptEntry::ai(&question), &mut events);
                    info!(session_id = %session.id, user_id = %session.user_id, "Consultation started");
                    TurnOutcome::NextQuestion(question)
                }
                Phase::Complete => TurnOutcome::Ignored(IgnoreReason::Finished),
                _ => TurnOutcome::Ignored(IgnoreReason::AlreadyStarted),
            }
        };
        self.shared.publish(events);
        outcome
    }

    /// Submit the answer to the current question.
    ///
    /// Blank answers are ignored. The answer to the last question runs
    /// extraction and diagnosis before returning.
    pub async fn submit_answer(&self, text: &str) -> TurnOutcome {
        let answer = text.trim();
        let mut events = Vec::new();
        let transcript = {
            let mut session = self.shared.lock();
            if let Some(reason) = IgnoreReason::for_answer_in(session.phase) {
                debug!(session_id = %session.id, phase = %session.phase, ?reason, "Answer ignored");
                return TurnOutcome::Ignored(reason);
            }
            if answer.is_empty() {
                return TurnOutcome::Ignored(IgnoreReason::EmptyAnswer);
            }

            push_entry(&mut session, TranscriptEntry::user(answer), &mut events);
            session.current_answer_draft.clear();
            let last = session.on_last_question();
            session.turn_index += 1;

            if !last {
                let question = self.questions[session.turn_index].clone();
                set_phase(&mut session, Phase::AwaitingAnswer, &mut events);
                push_entry(&mut session, TranscriptEntry::ai(&question), &mut events);
                debug!(session_id = %session.id, turn = session.turn_index, "Advanced to next question");
                drop(session);
                self.shared.publish(events);
                return TurnOutcome::NextQuestion(question);
            }

            set_phase(&mut session, Phase::Extracting, &mut events);
            render_transcript(&session.transcript)
        };
        self.shared.publish(events);

        let task = tokio::spawn(Arc::clone(&self.shared).run_pipeline(transcript));
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session_id = %self.session_id(), error = %e, "Consultation pipeline task failed");
                self.shared.complete_with_fallback()
            }
        }
    }

    /// Submit the current draft as the answer.
    pub async fn submit_draft(&self) -> TurnOutcome {
        let draft = self.shared.lock().current_answer_draft.clone();
        self.submit_answer(&draft).await
    }

    /// Replace the live answer draft. Ignored unless an answer is awaited.
    pub fn update_draft(&self, text: &str) -> bool {
        let event = {
            let mut session = self.shared.lock();
            if session.phase != Phase::AwaitingAnswer {
                return false;
            }
            session.current_answer_draft = text.to_string();
            SessionEvent::DraftUpdated {
                session_id: session.id,
                text: text.to_string(),
                timestamp: Utc::now(),
            }
        };
        self.shared.publish(vec![event]);
        true
    }

    /// Mark a prompt as playing. Answers are ignored until
    /// [`finish_speaking`](Self::finish_speaking).
    pub fn begin_speaking(&self) -> bool {
        self.swap_phase(Phase::AwaitingAnswer, Phase::Speaking)
    }

    pub fn finish_speaking(&self) -> bool {
        self.swap_phase(Phase::Speaking, Phase::AwaitingAnswer)
    }

    /// Terminate the session from any phase.
    ///
    /// Returns `false` if the session was already complete. A pipeline that is
    /// already running still records its result, but nothing more is added to
    /// the transcript.
    pub fn end(&self) -> bool {
        let mut events = Vec::new();
        {
            let mut session = self.shared.lock();
            if session.is_complete() {
                return false;
            }
            let from = session.phase;
            session.ended_early = true;
            session.completed_at = Some(Utc::now());
            set_phase(&mut session, Phase::Complete, &mut events);
            events.push(SessionEvent::SessionEnded {
                session_id: session.id,
                turn_index: session.turn_index,
                timestamp: Utc::now(),
            });
            info!(
                session_id = %session.id,
                phase = %from,
                turn = session.turn_index,
                pipeline_in_flight = from.is_downstream(),
                "Consultation ended early"
            );
        }
        self.shared.publish(events);
        true
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn swap_phase(&self, from: Phase, to: Phase) -> bool {
        let mut events = Vec::new();
        {
            let mut session = self.shared.lock();
            if session.phase != from {
                return false;
            }
            set_phase(&mut session, to, &mut events);
        }
        self.shared.publish(events);
        true
    }
}

impl Shared {
    // -------------------------------------------------------------------------
    // Pipeline
    // -------------------------------------------------------------------------

    async fn run_pipeline(self: Arc<Self>, transcript: String) -> TurnOutcome {
        let session_id = self.lock().id;

        let symptoms = self.extract(session_id, &transcript).await;
        {
            let mut events = Vec::new();
            let mut session = self.lock();
            session.symptoms = Some(symptoms.clone());
            if session.phase == Phase::Extracting {
                set_phase(&mut session, Phase::Diagnosing, &mut events);
            }
            drop(session);
            self.publish(events);
        }

        let diagnosis = self.diagnose(session_id, &symptoms).await;
        let record = ConsultationRecord {
            session_id,
            symptoms,
            diagnosis,
        };
        let user_id = {
            let mut session = self.lock();
            session.diagnosis = Some(record.diagnosis.clone());
            session.user_id.clone()
        };
        self.publish(vec![SessionEvent::ConsultationRecorded {
            session_id,
            record: record.clone(),
            timestamp: Utc::now(),
        }]);

        match self.collaborators.sink.append(&user_id, &record).await {
            Ok(()) => info!(
                session_id = %session_id,
                disease = %record.diagnosis.disease,
                symptom_count = record.symptoms.len(),
                "Consultation recorded"
            ),
            Err(e) => warn!(session_id = %session_id, error = %e, "Failed to persist consultation"),
        }

        let mut events = Vec::new();
        {
            let mut session = self.lock();
            if session.phase == Phase::Diagnosing {
                session.completed_at = Some(Utc::now());
                set_phase(&mut session, Phase::Complete, &mut events);
                push_entry(
                    &mut session,
                    TranscriptEntry::ai(&self.closing_message),
                    &mut events,
                );
            }
        }
        self.publish(events);

        TurnOutcome::Completed(record)
    }

    async fn extract(&self, session_id: Uuid, transcript: &str) -> SymptomSet {
        let extractor = &self.collaborators.extractor;
        let extracted = match extractor.extract(transcript).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    extractor = extractor.name(),
                    error = %e,
                    "Symptom extraction failed, continuing with no symptoms"
                );
                ExtractedSymptoms::empty()
            }
        };

        let filtered = match extracted {
            ExtractedSymptoms::Structured(tokens) => self.vocabulary.filter(tokens),
            ExtractedSymptoms::Delimited(text) => self.vocabulary.filter_delimited(&text),
        };
        if !filtered.rejected.is_empty() {
            debug!(
                session_id = %session_id,
                rejected = ?filtered.rejected,
                "Dropped tokens outside the symptom vocabulary"
            );
        }
        self.publish(vec![SessionEvent::SymptomsExtracted {
            session_id,
            accepted: filtered.accepted.len(),
            rejected: filtered.rejected.len(),
            timestamp: Utc::now(),
        }]);
        info!(
            session_id = %session_id,
            symptom_count = filtered.accepted.len(),
            "Symptoms extracted"
        );
        filtered.accepted
    }

    async fn diagnose(&self, session_id: Uuid, symptoms: &SymptomSet) -> Diagnosis {
        let resolver = &self.collaborators.resolver;
        match resolver.resolve(symptoms).await {
            Ok(diagnosis) => sanitize_diagnosis(diagnosis),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    resolver = resolver.name(),
                    error = %e,
                    "Diagnosis failed, recording Unknown"
                );
                Diagnosis::unknown()
            }
        }
    }

    /// Settle a session whose pipeline task died: missing results fall back
    /// to an empty symptom set and `Unknown`.
    fn complete_with_fallback(&self) -> TurnOutcome {
        let mut events = Vec::new();
        let record = {
            let mut session = self.lock();
            let symptoms = session.symptoms.get_or_insert_with(SymptomSet::new).clone();
            let diagnosis = session.diagnosis.get_or_insert_with(Diagnosis::unknown).clone();
            if session.phase.is_downstream() {
                session.completed_at = Some(Utc::now());
                set_phase(&mut session, Phase::Complete, &mut events);
            }
            ConsultationRecord {
                session_id: session.id,
                symptoms,
                diagnosis,
            }
        };
        self.publish(events);
        TurnOutcome::Completed(record)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, events: Vec<SessionEvent>) {
        for event in events {
            // No receivers is fine.
            let _ = self.events.send(event);
        }
    }
}

/// Move `session` to `to` if the transition is valid. Self-transitions are
/// silent.
fn set_phase(session: &mut Session, to: Phase, events: &mut Vec<SessionEvent>) -> bool {
    let from = session.phase;
    if from == to {
        return true;
    }
    if !from.can_transition_to(&to) {
        warn!(session_id = %session.id, %from, %to, "Rejected invalid phase transition");
        return false;
    }
    session.phase = to;
    debug!(session_id = %session.id, "Consultation phase: {} -> {}", from, to);
    events.push(SessionEvent::PhaseChanged {
        session_id: session.id,
        from,
        to,
        timestamp: Utc::now(),
    });
    true
}

fn push_entry(session: &mut Session, entry: TranscriptEntry, events: &mut Vec<SessionEvent>) {
    let index = session.transcript.len();
    session.transcript.push(entry.clone());
    events.push(SessionEvent::TranscriptAppended {
        session_id: session.id,
        index,
        entry,
        timestamp: Utc::now(),
    });
}

// =============================================================================
// Tests
// =============================================================================
