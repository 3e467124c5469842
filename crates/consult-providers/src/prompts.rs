//! Prompt text for the language-model providers.

use consult_core::types::SymptomSet;
use consult_core::vocabulary::SymptomVocabulary;

/// System instruction for symptom extraction. Lists every accepted token.
pub fn extraction_instruction(vocabulary: &SymptomVocabulary) -> String {
    let tokens = vocabulary.tokens().collect::<Vec<_>>().join(", ");
    format!(
        r#"A patient is describing their symptoms in a consultation transcript. Extract only the relevant symptoms. Follow these strict guidelines:

Only extract symptoms present in this predefined list:
{tokens}

If a symptom is described with a synonym or similar phrase, map it to the closest matching term from the list.
Example: "My stomach hurts" -> "stomach_pain"
Example: "I feel weak" -> "fatigue"
Do not invent or assume symptoms that are not clearly mentioned. Ignore the interviewer's questions.

Output format (strict JSON):
{{"symptoms": ["symptom1", "symptom2"]}}

If no symptoms are detected, return:
{{"symptoms": []}}"#
    )
}

/// Diagnosis request for a filtered symptom set.
pub fn diagnosis_prompt(symptoms: &SymptomSet) -> String {
    let listed = symptoms.iter().collect::<Vec<_>>().join(", ");
    format!(
        r#"You are a medical assistant. Based on the following symptoms, provide:
- The most likely diagnosis (disease name)
- A brief description of the disease
- Recommended precautions

Symptoms: {listed}

Output format (strict JSON):
{{"disease": "disease_name", "description": "short description", "precautions": "recommended precautions"}}

If you cannot diagnose, return:
{{"disease": "Unknown", "description": "Unable to determine based on provided symptoms.", "precautions": "Consult a healthcare professional."}}"#
    )
}
