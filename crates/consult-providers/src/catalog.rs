//! Rules-based diagnosis from a local disease catalog.
//!
//! The catalog is TOML:
//!
//! ```toml
//! [[disease]]
//! name = "Migraine"
//! symptoms = ["headache", "visual_disturbances"]
//! description = "..."
//! precautions = ["meditation", "reduce stress"]
//! ```
//!
//! The disease sharing the most symptoms with the patient wins; ties go to
//! the entry listed first. No overlap at all yields `Unknown`.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use consult_core::error::ConsultError;
use consult_core::types::{Diagnosis, SymptomSet};
use consult_core::vocabulary::SymptomVocabulary;
use consult_session::DiagnosisResolver;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.toml");

/// One disease and the symptoms that point to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseEntry {
    pub name: String,
    pub symptoms: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub precautions: Vec<String>,
}

impl DiseaseEntry {
    /// Number of `symptoms` this disease lists.
    pub fn overlap(&self, symptoms: &SymptomSet) -> usize {
        self.symptoms.iter().filter(|s| symptoms.contains(s)).count()
    }

    pub fn to_diagnosis(&self) -> Diagnosis {
        Diagnosis {
            disease: self.name.clone(),
            description: self.description.clone(),
            precautions: self.precautions.join(", "),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    disease: Vec<DiseaseEntry>,
}

/// An ordered list of diseases.
#[derive(Debug, Clone)]
pub struct DiseaseCatalog {
    entries: Vec<DiseaseEntry>,
}

impl DiseaseCatalog {
    /// The catalog shipped with this crate.
    pub fn builtin() -> Result<Self, ConsultError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, ConsultError> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_toml_str(&content)?;
        info!(
            "Disease catalog loaded from {} ({} diseases)",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Parse a catalog. Symptom tokens are canonicalised; tokens outside the
    /// vocabulary are dropped with a warning.
    pub fn from_toml_str(content: &str) -> Result<Self, ConsultError> {
        let file: CatalogFile = toml::from_str(content)?;
        let vocabulary = SymptomVocabulary::canonical();

        let mut entries = Vec::with_capacity(file.disease.len());
        for mut entry in file.disease {
            entry.name = entry.name.trim().to_string();
            if entry.name.is_empty() {
                return Err(ConsultError::Config(
                    "disease catalog entry has an empty name".to_string(),
                ));
            }
            let filtered = vocabulary.filter(&entry.symptoms);
            if !filtered.rejected.is_empty() {
                warn!(
                    disease = %entry.name,
                    rejected = ?filtered.rejected,
                    "Catalog symptoms outside the vocabulary were dropped"
                );
            }
            entry.symptoms = filtered.accepted.as_slice().to_vec();
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(ConsultError::Config(
                "disease catalog has no entries".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DiseaseEntry] {
        &self.entries
    }

    /// The entry with the largest symptom overlap, if any overlaps at all.
    pub fn best_match(&self, symptoms: &SymptomSet) -> Option<(&DiseaseEntry, usize)> {
        let mut best: Option<(&DiseaseEntry, usize)> = None;
        for entry in &self.entries {
            let score = entry.overlap(symptoms);
            if score == 0 {
                continue;
            }
            // Strictly greater keeps the earliest entry on ties.
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry, score));
            }
        }
        best
    }
}

/// [`DiagnosisResolver`] backed by a [`DiseaseCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    catalog: DiseaseCatalog,
}

impl CatalogResolver {
    pub fn new(catalog: DiseaseCatalog) -> Self {
        Self { catalog }
    }

    /// Resolver over the built-in catalog.
    pub fn builtin() -> Result<Self, ConsultError> {
        Ok(Self::new(DiseaseCatalog::builtin()?))
    }

    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }

    /// Synchronous form of [`DiagnosisResolver::resolve`].
    pub fn diagnose(&self, symptoms: &SymptomSet) -> Diagnosis {
        match self.catalog.best_match(symptoms) {
            Some((entry, score)) => {
                debug!(disease = %entry.name, score, "Catalog match");
                entry.to_diagnosis()
            }
            None => Diagnosis::unknown(),
        }
    }
}

#[async_trait]
impl DiagnosisResolver for CatalogResolver {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn resolve(&self, symptoms: &SymptomSet) -> Result<Diagnosis, ConsultError> {
        Ok(self.diagnose(symptoms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn set(tokens: &[&str]) -> SymptomSet {
        tokens.iter().copied().collect()
    }

    const SMALL: &str = r#"
[[disease]]
name = "Alpha"
symptoms = ["headache", "nausea"]
description = "First"
precautions = ["rest", "water"]

[[disease]]
name = "Beta"
symptoms = ["headache", "cough", "high_fever"]
description = "Second"
precautions = ["see a doctor"]
"#;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = DiseaseCatalog::builtin().unwrap();
        assert!(catalog.len() >= 15);
        let vocab = SymptomVocabulary::canonical();
        for entry in catalog.entries() {
            assert!(!entry.symptoms.is_empty(), "{}", entry.name);
            assert!(entry.symptoms.iter().all(|s| vocab.contains(s)), "{}", entry.name);
            assert!(!entry.precautions.is_empty(), "{}", entry.name);
        }
    }

    #[test]
    fn test_best_overlap_wins() {
        let catalog = DiseaseCatalog::from_toml_str(SMALL).unwrap();
        let (entry, score) = catalog
            .best_match(&set(&["headache", "cough", "high_fever"]))
            .unwrap();
        assert_eq!(entry.name, "Beta");
        assert_eq!(score, 3);
    }

    #[test]
    fn test_ties_go_to_catalog_order() {
        let catalog = DiseaseCatalog::from_toml_str(SMALL).unwrap();
        let (entry, score) = catalog.best_match(&set(&["headache"])).unwrap();
        assert_eq!(entry.name, "Alpha");
        assert_eq!(score, 1);
    }

    #[test]
    fn test_no_overlap_is_unknown() {
        let resolver = CatalogResolver::new(DiseaseCatalog::from_toml_str(SMALL).unwrap());
        assert!(resolver.diagnose(&set(&["itching"])).is_unknown());
        assert!(resolver.diagnose(&SymptomSet::new()).is_unknown());
    }

    #[test]
    fn test_precautions_are_comma_joined() {
        let resolver = CatalogResolver::new(DiseaseCatalog::from_toml_str(SMALL).unwrap());
        let diagnosis = resolver.diagnose(&set(&["nausea"]));
        assert_eq!(diagnosis.disease, "Alpha");
        assert_eq!(diagnosis.description, "First");
        assert_eq!(diagnosis.precautions, "rest, water");
    }

    #[test]
    fn test_builtin_hypertension_entry() {
        let catalog = DiseaseCatalog::builtin().unwrap();
        let entry = catalog
            .entries()
            .iter()
            .find(|e| e.name == "Hypertension")
            .unwrap();
        assert!(entry.description.contains("140/90"));
    }

    #[test]
    fn test_unknown_catalog_symptoms_are_dropped() {
        let catalog = DiseaseCatalog::from_toml_str(
            r#"
[[disease]]
name = "Gamma"
symptoms = ["Cough", "levitation"]
description = "Third"
"#,
        )
        .unwrap();
        assert_eq!(catalog.entries()[0].symptoms, vec!["cough".to_string()]);
        assert!(catalog.entries()[0].precautions.is_empty());
    }

    #[test]
    fn test_empty_or_invalid_catalog_rejected() {
        assert!(matches!(
            DiseaseCatalog::from_toml_str(""),
            Err(ConsultError::Config(_))
        ));
        assert!(matches!(
            DiseaseCatalog::from_toml_str("[[disease]]\nname = \" \"\nsymptoms = []\ndescription = \"x\"\n"),
            Err(ConsultError::Config(_))
        ));
        assert!(DiseaseCatalog::from_toml_str("not = [valid").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();
        let catalog = DiseaseCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(DiseaseCatalog::load(Path::new("/nonexistent/catalog.toml")).is_err());
    }

    #[tokio::test]
    async fn test_builtin_resolver_diagnoses_gastritis() {
        let resolver = CatalogResolver::builtin().unwrap();
        let diagnosis = resolver
            .resolve(&set(&["stomach_pain", "acidity", "indigestion", "nausea"]))
            .await
            .unwrap();
        assert_eq!(diagnosis.disease, "Gastritis");
        assert!(diagnosis.precautions.contains("eat smaller meals"));
    }
}
