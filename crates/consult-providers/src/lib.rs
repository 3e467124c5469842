//! Concrete symptom extractors and diagnosis resolvers.
//!
//! - [`GeminiSymptomExtractor`] and [`GeminiDiagnosisResolver`] talk to the
//!   Gemini `generateContent` API through a shared [`GeminiClient`].
//! - [`CatalogResolver`] scores symptoms against a local disease catalog.

pub mod catalog;
pub mod extractor;
pub mod gemini;
pub mod prompts;
pub mod resolver;

pub use catalog::{CatalogResolver, DiseaseCatalog, DiseaseEntry};
pub use extractor::GeminiSymptomExtractor;
pub use gemini::GeminiClient;
pub use resolver::GeminiDiagnosisResolver;
