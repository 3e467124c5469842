//! SQLite persistence for completed consultations.
//!
//! Provides a WAL-mode database with migrations, a per-user consultation
//! repository, and the [`SqliteConsultationSink`] that plugs it into the
//! session controller.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod sink;

pub use db::Database;
pub use repository::ConsultationRepository;
pub use sink::SqliteConsultationSink;
