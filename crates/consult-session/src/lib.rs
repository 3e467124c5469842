//! Consultation session engine.
//!
//! Sequences a scripted medical interview, hands the finished transcript to a
//! symptom extractor and the filtered symptoms to a diagnosis resolver, and
//! records the result through a persistence sink. Collaborators are injected
//! as trait objects; in-memory versions live in [`mock`].

pub mod controller;
pub mod mock;
pub mod payload;
pub mod ports;
pub mod session;
pub mod voice;

pub use controller::{Collaborators, ConsultationController};
pub use ports::{
    CaptureEvent, DiagnosisResolver, ExtractedSymptoms, PersistenceSink, SpeechIo,
    SymptomExtractor,
};
pub use session::{IgnoreReason, Session, TurnOutcome};
pub use voice::VoiceConsultation;
