//! Per-user consultation history.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use consult_core::error::ConsultError;
use consult_core::types::{
    ConsultationRecord, Diagnosis, StoredConsultation, SymptomSet, Timestamp,
};

use crate::db::Database;

/// Repository for completed consultations.
#[derive(Debug, Clone)]
pub struct ConsultationRepository {
    db: Arc<Database>,
}

impl ConsultationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store `record` for `user_id` with a server-assigned timestamp.
    ///
    /// Timestamps are strictly increasing per user: a write landing in the
    /// same millisecond as (or earlier than) the previous one is placed one
    /// millisecond after it.
    pub fn append(
        &self,
        user_id: &str,
        record: &ConsultationRecord,
    ) -> Result<StoredConsultation, ConsultError> {
        self.append_at(user_id, record, Utc::now())
    }

    /// Like [`append`](Self::append) with an explicit clock reading.
    pub fn append_at(
        &self,
        user_id: &str,
        record: &ConsultationRecord,
        now: Timestamp,
    ) -> Result<StoredConsultation, ConsultError> {
        let symptoms = serde_json::to_string(&record.symptoms)?;
        let id = Uuid::new_v4();

        let millis = self.db.with_conn(|conn| {
            let millis = next_timestamp(conn, user_id, now.timestamp_millis())?;
            conn.execute(
                "INSERT INTO consultations (id, user_id, session_id, symptoms, disease, description, precautions, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.to_string(),
                    user_id,
                    record.session_id.to_string(),
                    symptoms,
                    record.diagnosis.disease,
                    record.diagnosis.description,
                    record.diagnosis.precautions,
                    millis,
                ],
            )
            .map_err(|e| ConsultError::Storage(format!("Failed to save consultation: {}", e)))?;
            Ok(millis)
        })?;

        debug!(user_id, consultation_id = %id, timestamp_ms = millis, "Consultation stored");
        Ok(StoredConsultation {
            id,
            user_id: user_id.to_string(),
            record: record.clone(),
            timestamp: from_millis(millis),
        })
    }

    /// The newest `limit` consultations for `user_id`, newest first.
    pub fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<StoredConsultation>, ConsultError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, session_id, symptoms, disease, description, precautions, timestamp
                     FROM consultations
                     WHERE user_id = ?1
                     ORDER BY timestamp DESC
                     LIMIT ?2",
                )
                .map_err(|e| ConsultError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(row_to_consultation(row))
                })
                .map_err(|e| ConsultError::Storage(e.to_string()))?;

            let mut consultations = Vec::new();
            for row in rows {
                let consultation = row.map_err(|e| ConsultError::Storage(e.to_string()))??;
                consultations.push(consultation);
            }
            Ok(consultations)
        })
    }

    /// Find a stored consultation by its ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<StoredConsultation>, ConsultError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    "SELECT id, user_id, session_id, symptoms, disease, description, precautions, timestamp
                     FROM consultations WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| Ok(row_to_consultation(row)),
                )
                .optional()
                .map_err(|e| ConsultError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    pub fn count_for_user(&self, user_id: &str) -> Result<u64, ConsultError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM consultations WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )
                .map_err(|e| ConsultError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn next_timestamp(conn: &Connection, user_id: &str, now_ms: i64) -> Result<i64, ConsultError> {
    let last: Option<i64> = conn
        .query_row(
            "SELECT MAX(timestamp) FROM consultations WHERE user_id = ?1",
            rusqlite::params![user_id],
            |row| row.get(0),
        )
        .map_err(|e| ConsultError::Storage(e.to_string()))?;
    Ok(match last {
        Some(last) if last >= now_ms => last + 1,
        _ => now_ms,
    })
}

fn from_millis(millis: i64) -> Timestamp {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

// ============================================================================
// Row conversion
// ============================================================================

fn row_to_consultation(row: &rusqlite::Row<'_>) -> Result<StoredConsultation, ConsultError> {
    let get_string = |idx: usize| -> Result<String, ConsultError> {
        row.get(idx)
            .map_err(|e| ConsultError::Storage(e.to_string()))
    };
    let id_str = get_string(0)?;
    let user_id = get_string(1)?;
    let session_str = get_string(2)?;
    let symptoms_json = get_string(3)?;
    let disease = get_string(4)?;
    let description = get_string(5)?;
    let precautions = get_string(6)?;
    let timestamp_ms: i64 = row
        .get(7)
        .map_err(|e| ConsultError::Storage(e.to_string()))?;

    let symptoms: SymptomSet = serde_json::from_str(&symptoms_json)?;

    Ok(StoredConsultation {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| ConsultError::Storage(format!("Invalid UUID: {}", e)))?,
        user_id,
        record: ConsultationRecord {
            session_id: Uuid::parse_str(&session_str)
                .map_err(|e| ConsultError::Storage(format!("Invalid UUID: {}", e)))?,
            symptoms,
            diagnosis: Diagnosis {
                disease,
                description,
                precautions,
            },
        },
        timestamp: from_millis(timestamp_ms),
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
