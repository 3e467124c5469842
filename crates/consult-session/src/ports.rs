//! Collaborator seams of the consultation controller.
//!
//! The extractor, resolver and sink are held as `Arc<dyn Trait>` so one
//! controller type serves every backend combination. Speech is consumed by the
//! [`VoiceConsultation`](crate::voice::VoiceConsultation) driver, which is
//! generic over its [`SpeechIo`] and therefore uses plain `impl Future`.

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::mpsc;

use consult_core::error::ConsultError;
use consult_core::types::{ConsultationRecord, Diagnosis, SymptomSet};

// =============================================================================
// Extraction
// =============================================================================

/// Raw output of a symptom extractor, before vocabulary filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedSymptoms {
    /// Individual tokens, e.g. the `symptoms` array of a JSON reply.
    Structured(Vec<String>),
    /// Free text to be split on commas and newlines.
    Delimited(String),
}

impl ExtractedSymptoms {
    pub fn empty() -> Self {
        ExtractedSymptoms::Structured(Vec::new())
    }
}

/// Turns a rendered transcript into candidate symptom tokens.
#[async_trait]
pub trait SymptomExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Extract candidate symptoms. An empty result is valid.
    async fn extract(&self, transcript: &str) -> Result<ExtractedSymptoms, ConsultError>;
}

// =============================================================================
// Diagnosis
// =============================================================================

/// Maps a filtered symptom set to a diagnosis.
///
/// Implementations return [`Diagnosis::unknown`] when nothing can be inferred;
/// an `Err` is reserved for transport or configuration failures.
#[async_trait]
pub trait DiagnosisResolver: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve(&self, symptoms: &SymptomSet) -> Result<Diagnosis, ConsultError>;
}

// =============================================================================
// Persistence
// =============================================================================

/// Append-only store of completed consultations, keyed by user.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn append(&self, user_id: &str, record: &ConsultationRecord)
        -> Result<(), ConsultError>;
}

// =============================================================================
// Speech
// =============================================================================

/// Something heard while capture is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Running transcript of the current answer (replaces earlier text).
    Transcript(String),
    /// The speaker finished their turn.
    EndOfTurn,
    /// The remote party left; the session should end.
    Hangup,
}

/// Two-way speech channel: playback and capture never overlap.
pub trait SpeechIo: Send + Sync {
    /// Play `text`. Resolves once playback has finished.
    fn speak(&self, text: &str) -> impl Future<Output = Result<(), ConsultError>> + Send;

    /// Begin capturing the user's answer.
    ///
    /// The returned channel closes when capture stops or the source goes away.
    fn start_capture(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<CaptureEvent>, ConsultError>> + Send;

    /// Stop capturing. Safe to call when capture is not running.
    fn stop_capture(&self) -> impl Future<Output = Result<(), ConsultError>> + Send;
}
