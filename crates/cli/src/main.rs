use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use nutrilog_core::{
    ClinicalResult, CoreConfig, JournalService, JsonFileStore, NewAdjustment, NewConsultation,
    PatientContext, PatientFilter, PatientSummary, RecordId, TimelineEntry, TimelineEvent,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nutrilog")]
#[command(about = "Nutrilog consultation journal CLI")]
struct Cli {
    /// Journal data directory (defaults to NUTRILOG_DATA_DIR, then journal_data)
    #[arg(long, global = true)]
    data_dir: Option<String>,
    /// Practitioner name recorded on new events (defaults to NUTRILOG_DOCTOR_NAME)
    #[arg(long, global = true)]
    doctor: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List patients, most recently active first
    List {
        /// Name fragment to search for
        #[arg(long)]
        query: Option<String>,
        /// Only patients with activity on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Show one patient
    Show {
        /// Patient identifier
        patient_id: String,
    },
    /// Show a patient's timeline with adjustments under their consultation
    Timeline {
        /// Patient identifier
        patient_id: String,
    },
    /// Record a finalised consultation
    Consult {
        /// Patient name as spoken or typed
        #[arg(long)]
        patient: String,
        /// Consultation transcript
        #[arg(long, default_value = "")]
        transcript: String,
        /// Analysis result as JSON, or @path to a JSON file
        #[arg(long)]
        result: String,
        /// Patient context as JSON (goals, trainingRoutine, ...)
        #[arg(long)]
        context: Option<String>,
        /// Occurrence time (RFC 3339), defaults to now
        #[arg(long)]
        date: Option<String>,
    },
    /// Record a plan adjustment for a patient
    Adjust {
        /// Patient identifier
        patient_id: String,
        /// Adjustment note
        note: String,
        /// Plan before the adjustment
        #[arg(long)]
        previous_plan: Option<String>,
        /// Plan after the adjustment
        #[arg(long)]
        new_plan: Option<String>,
        /// Occurrence time (RFC 3339), defaults to now
        #[arg(long)]
        date: Option<String>,
    },
    /// Replace the note of an adjustment
    EditNote {
        /// Adjustment event identifier
        event_id: String,
        /// New note
        note: String,
    },
    /// Delete an adjustment
    DeleteAdjustment {
        /// Adjustment event identifier
        event_id: String,
    },
    /// Rename a patient
    Rename {
        /// Patient identifier
        patient_id: String,
        /// New name
        name: String,
    },
    /// Report what the startup migration and name normalisation did
    MigrateStatus,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nutrilog_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("No command given. Run with --help to see the available commands.");
        return Ok(());
    };

    let cfg = CoreConfig::from_values(
        cli.data_dir.or_else(|| std::env::var("NUTRILOG_DATA_DIR").ok()),
        cli.doctor
            .or_else(|| std::env::var("NUTRILOG_DOCTOR_NAME").ok()),
    )?;
    let service = JournalService::open(&cfg, Arc::new(JsonFileStore::from_config(&cfg)))?;

    match command {
        Commands::List { query, date } => {
            let filter = PatientFilter {
                name_query: query,
                date: date.as_deref().map(parse_day).transpose()?,
            };
            let patients = service.read(|j| j.patient_summaries(&filter))?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for summary in &patients {
                    println!("{}", format_summary(summary));
                }
            }
        }
        Commands::Show { patient_id } => {
            let id = RecordId::parse(&patient_id)?;
            let (patient, last_visit) = service.read(|j| -> nutrilog_core::JournalResult<_> {
                Ok((j.get_patient(&id)?.clone(), j.last_visit(&id)?))
            })??;
            println!("{}", serde_json::to_string_pretty(&patient)?);
            match last_visit {
                Some(date) => println!("Last visit: {}", date.to_rfc3339()),
                None => println!("Last visit: none"),
            }
        }
        Commands::Timeline { patient_id } => {
            let id = RecordId::parse(&patient_id)?;
            let entries = service.read(|j| j.grouped_timeline(&id))??;
            if entries.is_empty() {
                println!("No events recorded.");
            }
            for entry in &entries {
                for line in format_entry(entry) {
                    println!("{line}");
                }
            }
        }
        Commands::Consult {
            patient,
            transcript,
            result,
            context,
            date,
        } => {
            let result = ClinicalResult::new(read_json_arg(&result)?)?;
            let context = context
                .as_deref()
                .map(|raw| serde_json::from_str::<PatientContext>(raw))
                .transpose()
                .context("invalid patient context")?;
            let input = NewConsultation {
                patient_name: patient,
                context,
                transcript,
                result,
                date: date.as_deref().map(parse_timestamp).transpose()?,
            };
            let event = service.mutate(|j| j.record_consultation(input).cloned())?;
            println!(
                "Recorded {} consultation {} for patient {}",
                event.event_type(),
                event.id,
                event.patient_id
            );
        }
        Commands::Adjust {
            patient_id,
            note,
            previous_plan,
            new_plan,
            date,
        } => {
            let input = NewAdjustment {
                patient_id: RecordId::parse(&patient_id)?,
                note,
                previous_plan,
                new_plan,
                date: date.as_deref().map(parse_timestamp).transpose()?,
            };
            let event = service.mutate(|j| j.record_adjustment(input).cloned())?;
            println!("Recorded adjustment {}", event.id);
        }
        Commands::EditNote { event_id, note } => {
            let id = RecordId::parse(&event_id)?;
            if service.mutate(|j| j.edit_adjustment(&id, &note))? {
                println!("Updated adjustment {id}");
            } else {
                println!("No adjustment with id {id}; nothing changed.");
            }
        }
        Commands::DeleteAdjustment { event_id } => {
            let id = RecordId::parse(&event_id)?;
            if service.mutate(|j| Ok(j.delete_adjustment(&id)))? {
                println!("Deleted adjustment {id}");
            } else {
                println!("No adjustment with id {id}; nothing deleted.");
            }
        }
        Commands::Rename { patient_id, name } => {
            let id = RecordId::parse(&patient_id)?;
            let changed = service.mutate(|j| j.rename_patient(&id, &name))?;
            let current = service.read(|j| j.get_patient(&id).map(|p| p.name.clone()))??;
            if changed {
                println!("Renamed patient {id} to {current}");
            } else {
                println!("Patient {id} is already named {current}");
            }
        }
        Commands::MigrateStatus => {
            let report = service.startup_report()?;
            match report.migration {
                Some(m) => println!(
                    "Migrated {} legacy consultations into {} patients",
                    m.events, m.patients
                ),
                None => println!("No legacy migration was needed."),
            }
            println!(
                "Name normalisation: {} renamed, {} merged, {} retyped",
                report.normalization.renamed,
                report.normalization.merged,
                report.normalization.retyped
            );
            println!("Data directory: {}", cfg.data_dir().display());
        }
    }

    let status = service.persistence_status()?;
    if let Some(err) = status.last_error {
        eprintln!("Warning: journal storage problem: {err}");
    }
    if status.saves_suspended {
        eprintln!("Warning: changes are not being saved until the journal file is repaired.");
    }

    Ok(())
}

fn parse_day(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid date '{raw}', expected RFC 3339"))
}

/// Parses a JSON argument given inline or as `@path`.
fn read_json_arg(raw: &str) -> anyhow::Result<serde_json::Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(PathBuf::from(path))
            .with_context(|| format!("failed to read {path}"))?,
        None => raw.to_owned(),
    };
    serde_json::from_str(&text).context("analysis result is not valid JSON")
}

fn format_summary(summary: &PatientSummary) -> String {
    let last = summary
        .last_event_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "never".into());
    format!(
        "ID: {}, Name: {}, Consultations: {}, Last visit: {}",
        summary.patient.id, summary.patient.name, summary.consultation_count, last
    )
}

fn format_event(event: &TimelineEvent) -> String {
    let date = event.date.format("%Y-%m-%d %H:%M");
    match (event.consultation(), event.adjustment()) {
        (Some(consultation), _) => format!(
            "{date} [{}] {} ({})",
            event.event_type(),
            consultation.result.assessment().unwrap_or("no assessment"),
            event.id
        ),
        (None, Some(adjustment)) => {
            format!("{date} [adjustment] {} ({})", adjustment.adjustment_note, event.id)
        }
        (None, None) => format!("{date} [{}] ({})", event.event_type(), event.id),
    }
}

fn format_entry(entry: &TimelineEntry) -> Vec<String> {
    match entry {
        TimelineEntry::Group(group) => std::iter::once(format_event(&group.consultation))
            .chain(
                group
                    .adjustments
                    .iter()
                    .map(|a| format!("    {}", format_event(a))),
            )
            .collect(),
        TimelineEntry::Standalone { event } => vec![format!("* {}", format_event(event))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilog_core::{Journal, NonEmptyText};

    fn journal_with_timeline() -> (Journal, RecordId) {
        let mut journal = Journal::new(NonEmptyText::new("Dra. Helena").expect("valid name"));
        let patient_id = journal
            .record_consultation(NewConsultation {
                patient_name: "Ana".into(),
                context: None,
                transcript: String::new(),
                result: ClinicalResult::new(serde_json::json!({"nutritionalAssessment": "Fadiga"}))
                    .expect("valid result"),
                date: Some(parse_timestamp("2024-03-01T10:00:00Z").expect("valid date")),
            })
            .expect("recorded")
            .patient_id
            .clone();
        journal
            .record_adjustment(NewAdjustment {
                patient_id: patient_id.clone(),
                note: "mais água".into(),
                previous_plan: None,
                new_plan: None,
                date: Some(parse_timestamp("2024-03-02T10:00:00Z").expect("valid date")),
            })
            .expect("recorded");
        (journal, patient_id)
    }

    #[test]
    fn test_format_entry_indents_adjustments() {
        let (journal, patient_id) = journal_with_timeline();
        let entries = journal.grouped_timeline(&patient_id).expect("patient exists");

        let lines = format_entry(&entries[0]);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2024-03-01 10:00 [initial] Fadiga"));
        assert!(lines[1].starts_with("    2024-03-02 10:00 [adjustment] mais água"));
    }

    #[test]
    fn test_format_summary() {
        let (journal, _) = journal_with_timeline();
        let summaries = journal.patient_summaries(&PatientFilter::default());

        let line = format_summary(&summaries[0]);

        assert!(line.contains("Name: Ana"));
        assert!(line.contains("Consultations: 1"));
        assert!(line.ends_with("Last visit: 2024-03-02"));
    }

    #[test]
    fn test_parse_day_rejects_other_formats() {
        assert!(parse_day("2024-03-01").is_ok());
        assert!(parse_day("01/03/2024").is_err());
    }

    #[test]
    fn test_read_json_arg_inline() {
        let value = read_json_arg(r#"{"diagnosis": "x"}"#).expect("valid json");
        assert_eq!(value["diagnosis"], "x");
        assert!(read_json_arg("not json").is_err());
    }

    #[test]
    fn test_read_json_arg_from_file() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("result.json");
        std::fs::write(&path, r#"{"nutritionalAssessment": "Anemia"}"#)
            .expect("write should succeed");

        let value = read_json_arg(&format!("@{}", path.display())).expect("valid json file");
        assert_eq!(value["nutritionalAssessment"], "Anemia");

        let missing = temp_dir.path().join("missing.json");
        assert!(read_json_arg(&format!("@{}", missing.display())).is_err());
    }

    #[test]
    fn test_parse_timestamp_requires_rfc3339() {
        let parsed = parse_timestamp(" 2024-03-01T10:00:00-03:00 ").expect("valid timestamp");
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T13:00:00+00:00");
        assert!(parse_timestamp("2024-03-01").is_err());
    }

    #[test]
    fn test_format_event_and_standalone_entry() {
        let (mut journal, patient_id) = journal_with_timeline();
        journal
            .record_adjustment(NewAdjustment {
                patient_id: patient_id.clone(),
                note: "antes da consulta".into(),
                previous_plan: None,
                new_plan: None,
                date: Some(parse_timestamp("2024-02-01T09:30:00Z").expect("valid date")),
            })
            .expect("recorded");
        journal
            .record_consultation(NewConsultation {
                patient_name: "Ana".into(),
                context: None,
                transcript: String::new(),
                result: ClinicalResult::new(serde_json::json!({"notes": "sem título"}))
                    .expect("valid result"),
                date: Some(parse_timestamp("2024-04-01T08:00:00Z").expect("valid date")),
            })
            .expect("recorded");

        let events = journal.list_events(&patient_id).expect("patient exists");
        assert!(format_event(events[0]).starts_with("2024-04-01 08:00 [followup] no assessment"));

        let entries = journal.grouped_timeline(&patient_id).expect("patient exists");
        let last = entries.last().expect("timeline has entries");
        assert_eq!(
            format_entry(last),
            vec![format!(
                "* 2024-02-01 09:30 [adjustment] antes da consulta ({})",
                last.as_standalone().expect("standalone").id
            )]
        );
    }

    #[test]
    fn test_cli_parses_consult() {
        let cli = Cli::try_parse_from([
            "nutrilog",
            "--data-dir",
            "/tmp/journal",
            "consult",
            "--patient",
            "Ana",
            "--result",
            "{}",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/journal"));
        assert!(matches!(cli.command, Some(Commands::Consult { .. })));
    }
}
