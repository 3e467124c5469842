use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use consult_core::error::ConsultError;
use consult_core::vocabulary::SymptomVocabulary;
use consult_session::payload::parse_extraction_reply;
use consult_session::{ExtractedSymptoms, SymptomExtractor};

use crate::gemini::GeminiClient;
use crate::prompts::extraction_instruction;

/// Symptom extraction through Gemini.
///
/// The vocabulary is sent as the system instruction and the transcript as
/// the user turn.
#[derive(Debug, Clone)]
pub struct GeminiSymptomExtractor {
    client: Arc<GeminiClient>,
    instruction: String,
}

impl GeminiSymptomExtractor {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self::with_vocabulary(client, SymptomVocabulary::canonical())
    }

    pub fn with_vocabulary(client: Arc<GeminiClient>, vocabulary: &SymptomVocabulary) -> Self {
        Self {
            client,
            instruction: extraction_instruction(vocabulary),
        }
    }
}

#[async_trait]
impl SymptomExtractor for GeminiSymptomExtractor {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, transcript: &str) -> Result<ExtractedSymptoms, ConsultError> {
        let reply = self
            .client
            .generate(Some(&self.instruction), transcript)
            .await
            .map_err(|e| ConsultError::Extraction(e.to_string()))?;
        debug!(reply_chars = reply.len(), "Extraction reply received");
        Ok(parse_extraction_reply(&reply))
    }
}
