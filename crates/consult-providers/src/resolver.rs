use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use consult_core::error::ConsultError;
use consult_core::types::{Diagnosis, SymptomSet};
use consult_session::payload::diagnosis_or_unknown;
use consult_session::DiagnosisResolver;

use crate::gemini::GeminiClient;
use crate::prompts::diagnosis_prompt;

/// Diagnosis through Gemini.
///
/// An empty symptom set resolves to `Unknown` without a request.
#[derive(Debug, Clone)]
pub struct GeminiDiagnosisResolver {
    client: Arc<GeminiClient>,
}

impl GeminiDiagnosisResolver {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiagnosisResolver for GeminiDiagnosisResolver {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn resolve(&self, symptoms: &SymptomSet) -> Result<Diagnosis, ConsultError> {
        if symptoms.is_empty() {
            debug!("No symptoms to diagnose");
            return Ok(Diagnosis::unknown());
        }
        let reply = self
            .client
            .generate(None, &diagnosis_prompt(symptoms))
            .await
            .map_err(|e| ConsultError::Diagnosis(e.to_string()))?;
        Ok(diagnosis_or_unknown(&reply))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn resolver(server: &MockServer) -> GeminiDiagnosisResolver {
        let client = GeminiClient::new("k", "m", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri());
        GeminiDiagnosisResolver::new(Arc::new(client))
    }

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[tokio::test]
    async fn test_resolve_parses_diagnosis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Symptoms: stomach_pain, headache"))
            .respond_with(reply(
                r#"Here you go: {"disease": "Gastritis", "description": "Inflamed stomach lining", "precautions": "Avoid spicy food"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let symptoms: SymptomSet = ["stomach_pain", "headache"].into_iter().collect();
        let diagnosis = resolver(&server).resolve(&symptoms).await.unwrap();
        assert_eq!(diagnosis.disease, "Gastritis");
        assert_eq!(diagnosis.precautions, "Avoid spicy food");
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("I am not able to provide medical advice."))
            .mount(&server)
            .await;

        let symptoms: SymptomSet = ["cough"].into_iter().collect();
        let diagnosis = resolver(&server).resolve(&symptoms).await.unwrap();
        assert_eq!(diagnosis, Diagnosis::unknown());
    }

    #[tokio::test]
    async fn test_empty_symptoms_skip_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("{}"))
            .expect(0)
            .mount(&server)
            .await;

        let diagnosis = resolver(&server).resolve(&SymptomSet::new()).await.unwrap();
        assert!(diagnosis.is_unknown());
    }

    #[tokio::test]
    async fn test_http_failure_is_diagnosis_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let symptoms: SymptomSet = ["cough"].into_iter().collect();
        let result = resolver(&server).resolve(&symptoms).await;
        assert!(matches!(result, Err(ConsultError::Diagnosis(_))));
    }
}
