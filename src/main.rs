use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use moodmate_risk::config::{AppConfig, Settings, DEFAULT_LOG_FILTER};
use moodmate_risk::models::{Patient, PatientAssessment, RiskAssessment};
use moodmate_risk::report::ReportOptions;
use moodmate_risk::risk::BASELINE_WINDOW_DAYS;
use moodmate_risk::{alert, db, report, risk, trends};

#[derive(Parser)]
#[command(name = "moodmate-risk")]
#[command(about = "Patient risk assessment and alerts for MoodMate clinicians", long_about = None)]
struct Cli {
    /// Path to a JSON config file (default: ./moodmate.config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo patients with activity relative to now
    ///
    /// Re-seeding keeps imported mood entries but rebuilds the demo patients'
    /// sessions, tasks and chat logs.
    Seed,
    /// Import mood entries from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score patients, most at risk first
    Score {
        #[arg(long)]
        email: Option<String>,
        /// Assess as of this RFC 3339 timestamp instead of now
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print assessments as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show active risk alerts
    Alerts {
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Dismiss the current alert for a patient
    DismissAlert {
        #[arg(long)]
        email: String,
    },
    /// Generate a markdown report for one patient
    Report {
        #[arg(long)]
        email: String,
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = AppConfig::load(cli.config.as_deref())?.resolve()?;

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the MoodMate Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    tracing::debug!(max_connections = settings.max_connections, "connected to Postgres");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            tracing::info!(inserted, path = %csv.display(), "import finished");
            println!("Inserted {inserted} mood entries from {}.", csv.display());
        }
        Commands::Score {
            email,
            as_of,
            limit,
            json,
        } => {
            let as_of = as_of.unwrap_or_else(Utc::now);
            let patients = db::fetch_patients(&pool, email.as_deref()).await?;
            let mut scored = assess_patients(&pool, patients, as_of, &settings).await?;
            scored.truncate(limit);

            if json {
                println!("{}", serde_json::to_string_pretty(&scored)?);
                return Ok(());
            }

            if scored.is_empty() {
                println!("No patients found.");
                return Ok(());
            }

            println!("Patients by wellness score (lowest first):");
            for entry in &scored {
                println!(
                    "- {} ({}) score {:.1} level {}",
                    entry.patient.full_name,
                    entry.patient.email,
                    entry.assessment.score,
                    entry.assessment.level.as_str()
                );
            }
        }
        Commands::Alerts { as_of } => {
            let as_of = as_of.unwrap_or_else(Utc::now);
            let patients = db::fetch_patients(&pool, None).await?;
            let scored = assess_patients(&pool, patients, as_of, &settings).await?;

            let mut shown = 0usize;
            for entry in &scored {
                let Some(risk_alert) = alert::build_alert(&entry.patient, &entry.assessment) else {
                    continue;
                };
                let dismissal = db::latest_dismissal(&pool, entry.patient.id).await?;
                if alert::is_snoozed(
                    dismissal.as_ref(),
                    risk_alert.level,
                    as_of,
                    settings.alert_snooze_hours,
                ) {
                    tracing::debug!(email = %entry.patient.email, "alert snoozed");
                    continue;
                }
                print!("{}", alert::render_banner(&risk_alert));
                shown += 1;
            }

            if shown == 0 {
                println!("No active risk alerts.");
            }
        }
        Commands::DismissAlert { email } => {
            let now = Utc::now();
            let patient = db::fetch_patient(&pool, &email).await?;
            let assessment = assess_patient(&pool, &patient, now, &settings).await?;

            match alert::build_alert(&patient, &assessment) {
                Some(risk_alert) => {
                    db::record_dismissal(&pool, patient.id, risk_alert.level, now).await?;
                    tracing::info!(email = %patient.email, level = risk_alert.level.as_str(), "alert dismissed");
                    println!(
                        "Dismissed {} alert for {} for {} hours.",
                        risk_alert.level.as_str(),
                        patient.full_name,
                        settings.alert_snooze_hours
                    );
                }
                None => println!("No active alert for {}.", patient.full_name),
            }
        }
        Commands::Report { email, as_of, out } => {
            let as_of = as_of.unwrap_or_else(Utc::now);
            let patient = db::fetch_patient(&pool, &email).await?;
            let data = db::fetch_patient_data(
                &pool,
                patient.id,
                as_of - Duration::days(BASELINE_WINDOW_DAYS),
                as_of,
            )
            .await?;
            let assessment = risk::assess(&data, as_of, &settings.weights);
            let mood_days = db::fetch_mood_days(&pool, patient.id, as_of).await?;
            let streak = trends::streak_ending_at(mood_days, as_of);
            let content = report::build_report(
                &patient,
                &data,
                &assessment,
                streak,
                as_of,
                ReportOptions {
                    limit: settings.report_limit,
                    mood_drop_threshold: settings.mood_drop_threshold,
                },
            );
            std::fs::write(&out, content)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn assess_patient(
    pool: &PgPool,
    patient: &Patient,
    as_of: DateTime<Utc>,
    settings: &Settings,
) -> anyhow::Result<RiskAssessment> {
    let data = db::fetch_patient_data(
        pool,
        patient.id,
        as_of - Duration::days(BASELINE_WINDOW_DAYS),
        as_of,
    )
    .await?;
    Ok(risk::assess(&data, as_of, &settings.weights))
}

/// Assesses every patient and orders them lowest score (highest risk) first.
async fn assess_patients(
    pool: &PgPool,
    patients: Vec<Patient>,
    as_of: DateTime<Utc>,
    settings: &Settings,
) -> anyhow::Result<Vec<PatientAssessment>> {
    let mut scored = Vec::with_capacity(patients.len());
    for patient in patients {
        let assessment = assess_patient(pool, &patient, as_of, settings).await?;
        scored.push(PatientAssessment {
            patient,
            assessment,
        });
    }

    scored.sort_by(|a, b| {
        a.assessment
            .score
            .partial_cmp(&b.assessment.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    tracing::info!(patients = scored.len(), %as_of, "assessed patients");
    Ok(scored)
}
