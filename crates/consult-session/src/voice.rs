//! Voice turn-taking on top of a [`ConsultationController`].
//!
//! Playback and capture never overlap: each prompt is spoken with the session
//! in `Speaking`, and capture starts only after playback resolves.

use tracing::{debug, info, warn};

use consult_core::error::ConsultError;

use crate::controller::ConsultationController;
use crate::ports::{CaptureEvent, SpeechIo};
use crate::session::{IgnoreReason, Session, TurnOutcome};

/// How a capture turn finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heard {
    EndOfTurn,
    Hangup,
    /// The capture channel closed without an end-of-turn.
    Closed,
}

/// Runs a whole consultation over a [`SpeechIo`].
#[derive(Debug)]
pub struct VoiceConsultation<S> {
    speech: S,
}

impl<S: SpeechIo> VoiceConsultation<S> {
    pub fn new(speech: S) -> Self {
        Self { speech }
    }

    pub fn speech(&self) -> &S {
        &self.speech
    }

    /// Drive `controller` until the session is complete.
    ///
    /// A hangup or a closed capture stream ends the session. Speech failures
    /// also end it and are returned to the caller.
    pub async fn run(&self, controller: &ConsultationController) -> Result<Session, ConsultError> {
        let mut prompt = match controller.start() {
            TurnOutcome::NextQuestion(question) => question,
            other => {
                debug!(?other, "Consultation not started by voice driver");
                return Ok(controller.snapshot());
            }
        };

        if let Err(e) = self.converse(controller, &mut prompt).await {
            warn!(session_id = %controller.session_id(), error = %e, "Speech failed, ending consultation");
            controller.end();
            let _ = self.speech.stop_capture().await;
            return Err(e);
        }

        Ok(controller.snapshot())
    }

    async fn converse(
        &self,
        controller: &ConsultationController,
        prompt: &mut String,
    ) -> Result<(), ConsultError> {
        loop {
            self.say(controller, prompt).await?;

            // Listen until the answer advances the session.
            loop {
                match self.listen(controller).await? {
                    Heard::Hangup | Heard::Closed => {
                        info!(session_id = %controller.session_id(), "Caller left, ending consultation");
                        controller.end();
                        return Ok(());
                    }
                    Heard::EndOfTurn => {}
                }

                match controller.submit_draft().await {
                    TurnOutcome::NextQuestion(next) => {
                        *prompt = next;
                        break;
                    }
                    TurnOutcome::Completed(_) => {
                        if !controller.snapshot().ended_early {
                            self.speech.speak(controller.closing_message()).await?;
                        }
                        return Ok(());
                    }
                    TurnOutcome::Ignored(IgnoreReason::EmptyAnswer) => {
                        debug!("Empty answer, listening again");
                    }
                    TurnOutcome::Ignored(reason) => {
                        debug!(?reason, "Answer not taken, stopping voice loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn say(&self, controller: &ConsultationController, text: &str) -> Result<(), ConsultError> {
        controller.begin_speaking();
        let result = self.speech.speak(text).await;
        controller.finish_speaking();
        result
    }

    async fn listen(&self, controller: &ConsultationController) -> Result<Heard, ConsultError> {
        let mut rx = self.speech.start_capture().await?;
        let mut heard = Heard::Closed;
        while let Some(event) = rx.recv().await {
            match event {
                CaptureEvent::Transcript(text) => {
                    controller.update_draft(&text);
                }
                CaptureEvent::EndOfTurn => {
                    heard = Heard::EndOfTurn;
                    break;
                }
                CaptureEvent::Hangup => {
                    heard = Heard::Hangup;
                    break;
                }
            }
        }
        self.speech.stop_capture().await?;
        Ok(heard)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use consult_core::types::{Diagnosis, Phase, TranscriptEntry};

    use super::*;
    use crate::controller::Collaborators;
    use crate::mock::{MemorySink, MockDiagnosisResolver, MockSpeech, MockSymptomExtractor};

    fn controller(sink: MemorySink) -> ConsultationController {
        ConsultationController::new(
            "caller-1",
            vec!["How are you feeling?".to_string(), "What symptoms?".to_string()],
            "Thank you, goodbye.",
            Collaborators::new(
                Arc::new(MockSymptomExtractor::structured(["cough", "high_fever"])),
                Arc::new(MockDiagnosisResolver::returning(Diagnosis {
                    disease: "Bronchitis".to_string(),
                    description: "Inflamed airways".to_string(),
                    precautions: "Rest, fluids".to_string(),
                })),
                Arc::new(sink),
            ),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_voice_consultation_completes() {
        let sink = MemorySink::new();
        let controller = controller(sink.clone());
        let speech = MockSpeech::new()
            .answer(["Not", "Not great"])
            .answer(["I have a cough and a fever"]);
        let driver = VoiceConsultation::new(speech.clone());

        let session = driver.run(&controller).await.unwrap();

        assert_eq!(session.phase, Phase::Complete);
        assert_eq!(session.transcript.len(), 5);
        assert_eq!(session.transcript[1], TranscriptEntry::user("Not great"));
        assert_eq!(
            speech.spoken(),
            vec!["How are you feeling?", "What symptoms?", "Thank you, goodbye."]
        );
        assert_eq!(speech.overlaps(), 0);
        assert!(!speech.is_capturing());
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_restarts_capture_without_reprompting() {
        let controller = controller(MemorySink::new());
        let speech = MockSpeech::new()
            .turn(vec![CaptureEvent::EndOfTurn])
            .answer(["fine"])
            .answer(["cough"]);
        let driver = VoiceConsultation::new(speech.clone());

        let session = driver.run(&controller).await.unwrap();

        assert_eq!(session.phase, Phase::Complete);
        assert_eq!(speech.spoken().len(), 3);
        assert_eq!(session.transcript[1], TranscriptEntry::user("fine"));
    }

    #[tokio::test]
    async fn test_hangup_ends_session() {
        let sink = MemorySink::new();
        let controller = controller(sink.clone());
        let speech = MockSpeech::new()
            .answer(["fine"])
            .turn(vec![CaptureEvent::Transcript("I".into()), CaptureEvent::Hangup]);
        let driver = VoiceConsultation::new(speech.clone());

        let session = driver.run(&controller).await.unwrap();

        assert_eq!(session.phase, Phase::Complete);
        assert!(session.ended_early);
        assert_eq!(session.transcript.len(), 3);
        assert!(sink.records().is_empty());
        assert_eq!(speech.spoken(), vec!["How are you feeling?", "What symptoms?"]);
    }

    #[tokio::test]
    async fn test_exhausted_capture_ends_session() {
        let controller = controller(MemorySink::new());
        let speech = MockSpeech::new();
        let driver = VoiceConsultation::new(speech);

        let session = driver.run(&controller).await.unwrap();

        assert!(session.ended_early);
        assert_eq!(session.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_playback_failure_ends_session_and_errors() {
        let controller = controller(MemorySink::new());
        let driver = VoiceConsultation::new(MockSpeech::new().failing_playback());

        let result = driver.run(&controller).await;

        assert!(matches!(result, Err(ConsultError::Speech(_))));
        assert_eq!(controller.phase(), Phase::Complete);
    }
}
