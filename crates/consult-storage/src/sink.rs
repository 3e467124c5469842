use std::sync::Arc;

use async_trait::async_trait;

use consult_core::error::ConsultError;
use consult_core::types::ConsultationRecord;
use consult_session::PersistenceSink;

use crate::db::Database;
use crate::repository::ConsultationRepository;

/// [`PersistenceSink`] writing to the consultations table.
///
/// SQLite calls are blocking, so each append runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteConsultationSink {
    repo: ConsultationRepository,
}

impl SqliteConsultationSink {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            repo: ConsultationRepository::new(db),
        }
    }

    pub fn repository(&self) -> &ConsultationRepository {
        &self.repo
    }
}

#[async_trait]
impl PersistenceSink for SqliteConsultationSink {
    async fn append(&self, user_id: &str, record: &ConsultationRecord) -> Result<(), ConsultError> {
        let repo = self.repo.clone();
        let user_id = user_id.to_string();
        let record = record.clone();
        tokio::task::spawn_blocking(move || repo.append(&user_id, &record))
            .await
            .map_err(|e| ConsultError::Storage(format!("Storage task panicked: {}", e)))??;
        Ok(())
    }
}
