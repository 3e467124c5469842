//! In-memory collaborators for tests and offline runs.
//!
//! Every mock is cheaply cloneable and shares its recorded calls between
//! clones, so a test can keep one handle while the controller owns another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use consult_core::error::ConsultError;
use consult_core::types::{ConsultationRecord, Diagnosis, SymptomSet};

use crate::ports::{
    CaptureEvent, DiagnosisResolver, ExtractedSymptoms, PersistenceSink, SpeechIo,
    SymptomExtractor,
};

// =============================================================================
// Extractor
// =============================================================================

/// Extractor returning a fixed reply.
#[derive(Debug, Clone)]
pub struct MockSymptomExtractor {
    reply: Result<ExtractedSymptoms, String>,
    transcripts: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Notify>>,
}

impl MockSymptomExtractor {
    pub fn structured<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_reply(Ok(ExtractedSymptoms::Structured(
            tokens.into_iter().map(Into::into).collect(),
        )))
    }

    pub fn delimited(text: impl Into<String>) -> Self {
        Self::with_reply(Ok(ExtractedSymptoms::Delimited(text.into())))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_reply(Err(message.into()))
    }

    fn with_reply(reply: Result<ExtractedSymptoms, String>) -> Self {
        Self {
            reply,
            transcripts: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Hold every `extract` call until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Transcripts received so far.
    pub fn transcripts(&self) -> Vec<String> {
        self.transcripts.lock().expect("mock mutex poisoned").clone()
    }
}

#[async_trait]
impl SymptomExtractor for MockSymptomExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, transcript: &str) -> Result<ExtractedSymptoms, ConsultError> {
        self.transcripts
            .lock()
            .expect("mock mutex poisoned")
            .push(transcript.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.clone().map_err(ConsultError::Extraction)
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolver returning a fixed diagnosis.
#[derive(Debug, Clone)]
pub struct MockDiagnosisResolver {
    reply: Result<Diagnosis, String>,
    received: Arc<Mutex<Vec<SymptomSet>>>,
    gate: Option<Arc<Notify>>,
}

impl MockDiagnosisResolver {
    pub fn returning(diagnosis: Diagnosis) -> Self {
        Self::with_reply(Ok(diagnosis))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_reply(Err(message.into()))
    }

    fn with_reply(reply: Result<Diagnosis, String>) -> Self {
        Self {
            reply,
            received: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Hold every `resolve` call until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Symptom sets received so far.
    pub fn received(&self) -> Vec<SymptomSet> {
        self.received.lock().expect("mock mutex poisoned").clone()
    }
}

#[async_trait]
impl DiagnosisResolver for MockDiagnosisResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(&self, symptoms: &SymptomSet) -> Result<Diagnosis, ConsultError> {
        self.received
            .lock()
            .expect("mock mutex poisoned")
            .push(symptoms.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.clone().map_err(ConsultError::Diagnosis)
    }
}

// =============================================================================
// Sink
// =============================================================================

/// Sink that keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(String, ConsultationRecord)>>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(user_id, record)` pairs in write order.
    pub fn records(&self) -> Vec<(String, ConsultationRecord)> {
        self.records.lock().expect("mock mutex poisoned").clone()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn append(&self, user_id: &str, record: &ConsultationRecord) -> Result<(), ConsultError> {
        if self.fail {
            return Err(ConsultError::Storage("memory sink is read-only".to_string()));
        }
        self.records
            .lock()
            .expect("mock mutex poisoned")
            .push((user_id.to_string(), record.clone()));
        Ok(())
    }
}

// =============================================================================
// Speech
// =============================================================================

/// Scripted speech channel.
///
/// Each `start_capture` call replays the next scripted turn and then closes
/// the channel. Once the script runs out the channel closes immediately.
/// Speaking while capture is active is counted as an overlap.
#[derive(Debug, Clone, Default)]
pub struct MockSpeech {
    script: Arc<Mutex<VecDeque<Vec<CaptureEvent>>>>,
    spoken: Arc<Mutex<Vec<String>>>,
    capturing: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    fail_speak: bool,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn that ends with `EndOfTurn` after streaming `partials`.
    pub fn answer<I, S>(self, partials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<CaptureEvent> = partials
            .into_iter()
            .map(|p| CaptureEvent::Transcript(p.into()))
            .collect();
        events.push(CaptureEvent::EndOfTurn);
        self.turn(events)
    }

    /// Add a raw turn.
    pub fn turn(self, events: Vec<CaptureEvent>) -> Self {
        self.script
            .lock()
            .expect("mock mutex poisoned")
            .push_back(events);
        self
    }

    /// Make every `speak` call fail.
    pub fn failing_playback(mut self) -> Self {
        self.fail_speak = true;
        self
    }

    /// Everything spoken, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().expect("mock mutex poisoned").clone()
    }

    /// Number of `speak` calls made while capture was running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

impl SpeechIo for MockSpeech {
    async fn speak(&self, text: &str) -> Result<(), ConsultError> {
        if self.capturing.load(Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_speak {
            return Err(ConsultError::Speech("playback device unavailable".to_string()));
        }
        self.spoken
            .lock()
            .expect("mock mutex poisoned")
            .push(text.to_string());
        Ok(())
    }

    async fn start_capture(&self) -> Result<mpsc::Receiver<CaptureEvent>, ConsultError> {
        let events = self
            .script
            .lock()
            .expect("mock mutex poisoned")
            .pop_front()
            .unwrap_or_default();
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers the whole turn.
            let _ = tx.try_send(event);
        }
        self.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop_capture(&self) -> Result<(), ConsultError> {
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }
}
