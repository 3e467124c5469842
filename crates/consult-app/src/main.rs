//! consult application binary - composition root.
//!
//! 1. Parse the command line and load configuration from TOML
//! 2. Open the consultation database
//! 3. Wire the extractor, resolver and sink into a session controller
//! 4. Run the interview on the terminal, or print stored history

mod cli;
mod console;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use consult_core::config::{ConsultConfig, DiagnosisConfig, ResolverKind};
use consult_core::types::{ConsultationDocument, StoredConsultation};
use consult_core::vocabulary::SymptomVocabulary;
use consult_core::SessionEvent;
use consult_providers::{
    CatalogResolver, DiseaseCatalog, GeminiClient, GeminiDiagnosisResolver,
    GeminiSymptomExtractor,
};
use consult_session::{
    Collaborators, ConsultationController, DiagnosisResolver, Session, VoiceConsultation,
};
use consult_storage::{ConsultationRepository, Database, SqliteConsultationSink};

use cli::{expand_home, CliArgs, Command};
use console::ConsoleSpeech;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing exists, so a load failure is reported
    // once the subscriber is installed.
    let config_file = args.resolve_config_path();
    let (config, load_error) = if config_file.exists() {
        match ConsultConfig::load(&config_file) {
            Ok(config) => (config, None),
            Err(e) => (ConsultConfig::default(), Some(e)),
        }
    } else {
        (ConsultConfig::default(), None)
    };

    // Tracing goes to stderr; stdout carries the conversation.
    let filter = match args.resolve_log_level() {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting consult v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::debug!(path = %config_file.display(), "Configuration resolved"),
    }

    let data_dir = args.resolve_data_dir(&config.general.data_dir);

    match args.command {
        Command::Run { ref user, resolver } => {
            let db = open_database(&data_dir, &config)?;
            let kind = resolver.map(ResolverKind::from).unwrap_or(config.diagnosis.resolver);
            run_consultation(user, &config, kind, db).await?;
        }
        Command::History {
            ref user,
            limit,
            json,
        } => {
            let db = open_database(&data_dir, &config)?;
            let repo = ConsultationRepository::new(db);
            let limit = limit.unwrap_or(config.storage.history_limit);
            let history = repo.list_for_user(user, limit)?;
            if json {
                let documents: Vec<ConsultationDocument> =
                    history.iter().map(ConsultationDocument::from).collect();
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else {
                print_history(user, &history);
            }
        }
        Command::Vocabulary => {
            for token in SymptomVocabulary::canonical().tokens() {
                println!("{token}");
            }
        }
    }

    Ok(())
}

fn open_database(
    data_dir: &Path,
    config: &ConsultConfig,
) -> Result<Arc<Database>, Box<dyn std::error::Error>> {
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join(&config.storage.database_file);
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");
    Ok(Arc::new(db))
}

fn build_resolver(
    kind: ResolverKind,
    diagnosis: &DiagnosisConfig,
    client: &Arc<GeminiClient>,
) -> Result<Arc<dyn DiagnosisResolver>, Box<dyn std::error::Error>> {
    Ok(match kind {
        ResolverKind::Llm => Arc::new(GeminiDiagnosisResolver::new(Arc::clone(client))),
        ResolverKind::Catalog => {
            let catalog = match diagnosis.catalog_path {
                Some(ref path) => DiseaseCatalog::load(&expand_home(path))?,
                None => DiseaseCatalog::builtin()?,
            };
            Arc::new(CatalogResolver::new(catalog))
        }
    })
}

async fn run_consultation(
    user: &str,
    config: &ConsultConfig,
    kind: ResolverKind,
    db: Arc<Database>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(GeminiClient::from_config(&config.llm)?);
    let extractor = Arc::new(GeminiSymptomExtractor::new(Arc::clone(&client)));
    let resolver = build_resolver(kind, &config.diagnosis, &client)?;
    tracing::info!(model = client.model(), resolver = resolver.name(), "Providers ready");

    let controller = ConsultationController::from_config(
        user,
        &config.interview,
        Collaborators::new(extractor, resolver, Arc::new(SqliteConsultationSink::new(db))),
    )?;

    let events = tokio::spawn(log_events(controller.subscribe()));

    let driver = VoiceConsultation::new(ConsoleSpeech::stdio());
    let result = driver.run(&controller).await;
    events.abort();

    let session = result?;
    print_summary(&session);
    Ok(())
}

/// Mirror session events into the log until the controller goes away.
async fn log_events(mut rx: tokio::sync::broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::PhaseChanged { from, to, .. }) => {
                tracing::debug!(event = "phase_changed", %from, %to, "Session phase changed");
            }
            Ok(SessionEvent::ConsultationRecorded { record, .. }) => {
                tracing::info!(
                    event = "consultation_recorded",
                    disease = %record.diagnosis.disease,
                    symptoms = record.symptoms.len(),
                    "Consultation recorded"
                );
            }
            Ok(event) => tracing::trace!(event = event.kind(), session_id = %event.session_id()),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event listener lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_summary(session: &Session) {
    println!();
    match session.outcome() {
        Some(record) => {
            let symptoms = record.symptoms.iter().collect::<Vec<_>>().join(", ");
            if symptoms.is_empty() {
                println!("Symptoms:    none recognised");
            } else {
                println!("Symptoms:    {symptoms}");
            }
            println!("Diagnosis:   {}", record.diagnosis.disease);
            println!("About:       {}", record.diagnosis.description);
            println!("Precautions: {}", record.diagnosis.precautions);
        }
        None if session.ended_early => {
            println!("Consultation ended before all questions were answered. Nothing was recorded.");
        }
        None => println!("Consultation did not complete."),
    }
}

fn print_history(user: &str, history: &[StoredConsultation]) {
    if history.is_empty() {
        println!("No consultations recorded for {user}.");
        return;
    }
    println!("{:<20}  {:<24}  SYMPTOMS", "WHEN", "DIAGNOSIS");
    for stored in history {
        let when = stored
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        let symptoms = stored.record.symptoms.iter().collect::<Vec<_>>().join(", ");
        println!("{:<20}  {:<24}  {}", when, stored.record.diagnosis.disease, symptoms);
    }
}

