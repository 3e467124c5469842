pub mod config;
pub mod error;
pub mod events;
pub mod types;
pub mod vocabulary;

pub use config::ConsultConfig;
pub use error::{ConsultError, Result};
pub use events::SessionEvent;
pub use types::*;
pub use vocabulary::{FilterOutcome, SymptomVocabulary, CANONICAL_SYMPTOMS};
