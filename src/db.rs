use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AlertDismissal, ChatLogEntry, MoodEntry, Patient, PatientData, RiskLevel, Session,
    SessionStatus, Task,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct SeedPatient {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    /// (days ago, score, triggers)
    moods: &'static [(i64, i32, &'static [&'static str])],
    /// (days ago, status)
    sessions: &'static [(i64, &'static str)],
    /// (days ago, title, completed)
    tasks: &'static [(i64, &'static str, bool)],
    chats_per_day: i64,
}

const SEED_PATIENTS: &[SeedPatient] = &[
    SeedPatient {
        id: "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
        name: "Avery Lee",
        email: "avery.lee@moodmate.app",
        moods: &[
            (0, 8, &[]),
            (2, 8, &[]),
            (4, 7, &["work"]),
            (9, 6, &[]),
            (11, 6, &["sleep"]),
        ],
        sessions: &[(3, "completed"), (10, "completed")],
        tasks: &[
            (1, "Evening gratitude journal", true),
            (4, "Ten minute walk", true),
        ],
        chats_per_day: 3,
    },
    SeedPatient {
        id: "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
        name: "Jules Moreno",
        email: "jules.moreno@moodmate.app",
        moods: &[
            (0, 2, &["work", "sleep", "conflict"]),
            (1, 3, &["work", "sleep"]),
            (3, 3, &["finances"]),
            (8, 8, &[]),
            (10, 7, &[]),
        ],
        sessions: &[(2, "no_show"), (5, "cancelled")],
        tasks: &[
            (1, "Breathing exercise", false),
            (3, "Thought record", false),
            (6, "Call a friend", true),
        ],
        chats_per_day: 0,
    },
    SeedPatient {
        id: "d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2",
        name: "Kiara Patel",
        email: "kiara.patel@moodmate.app",
        moods: &[
            (1, 5, &["school"]),
            (3, 6, &["school", "sleep"]),
            (9, 6, &[]),
        ],
        sessions: &[(4, "completed"), (6, "cancelled")],
        tasks: &[
            (2, "Sleep log", true),
            (5, "Worry time", false),
        ],
        chats_per_day: 1,
    },
];

const SEED_KEY_PREFIX: &str = "seed-";

const DELETE_SEEDED_MOODS: &str =
    "DELETE FROM moodmate.mood_entries WHERE patient_id = $1 AND source_key LIKE 'seed-%'";

fn seed_source_key(email: &str, index: usize) -> String {
    format!("{SEED_KEY_PREFIX}{email}-{index}")
}

/// Inserts demo patients and replaces their activity with data relative to now.
/// Imported mood entries are kept; sessions, tasks and chat logs are rebuilt.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for patient in SEED_PATIENTS {
        let patient_id: Uuid = sqlx::query(
            r#"
            INSERT INTO moodmate.patients (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(Uuid::parse_str(patient.id)?)
        .bind(patient.name)
        .bind(patient.email)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        sqlx::query(DELETE_SEEDED_MOODS)
        .bind(patient_id)
        .execute(&mut *tx)
        .await?;

        for table in ["sessions", "tasks", "ai_chat_logs"] {
            sqlx::query(&format!(
                "DELETE FROM moodmate.{table} WHERE patient_id = $1"
            ))
            .bind(patient_id)
            .execute(&mut *tx)
            .await?;
        }

        for (index, (days_ago, score, triggers)) in patient.moods.iter().enumerate() {
            let triggers: Vec<String> = triggers.iter().map(|t| t.to_string()).collect();
            sqlx::query(
                r#"
                INSERT INTO moodmate.mood_entries
                (id, patient_id, mood_score, triggers, created_at, source_key)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(patient_id)
            .bind(*score)
            .bind(triggers)
            .bind(now - Duration::days(*days_ago) - Duration::hours(2))
            .bind(seed_source_key(patient.email, index))
            .execute(&mut *tx)
            .await?;
        }

        for (days_ago, status) in patient.sessions {
            sqlx::query(
                r#"
                INSERT INTO moodmate.sessions (id, patient_id, scheduled_time, status)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(patient_id)
            .bind(now - Duration::days(*days_ago) - Duration::hours(3))
            .bind(*status)
            .execute(&mut *tx)
            .await?;
        }

        for (days_ago, title, completed) in patient.tasks {
            sqlx::query(
                r#"
                INSERT INTO moodmate.tasks (id, patient_id, title, due_date, completed)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(patient_id)
            .bind(*title)
            .bind(now - Duration::days(*days_ago) - Duration::hours(4))
            .bind(*completed)
            .execute(&mut *tx)
            .await?;
        }

        for day in 0..7 {
            for n in 0..patient.chats_per_day {
                sqlx::query(
                    r#"
                    INSERT INTO moodmate.ai_chat_logs (id, patient_id, message, created_at)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(patient_id)
                .bind("Check-in with companion")
                .bind(now - Duration::days(day) - Duration::hours(n + 1))
                .execute(&mut *tx)
                .await?;
            }
        }

        tracing::debug!(email = patient.email, "seeded patient");
    }

    tx.commit().await?;
    tracing::info!(patients = SEED_PATIENTS.len(), "seed complete");
    Ok(())
}

pub async fn fetch_patients(pool: &PgPool, email: Option<&str>) -> anyhow::Result<Vec<Patient>> {
    let mut query = String::from("SELECT id, full_name, email FROM moodmate.patients");
    if email.is_some() {
        query.push_str(" WHERE email = $1");
    }
    query.push_str(" ORDER BY full_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = email {
        rows = rows.bind(value);
    }

    let patients = rows
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| Patient {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
        })
        .collect();

    Ok(patients)
}

pub async fn fetch_patient(pool: &PgPool, email: &str) -> anyhow::Result<Patient> {
    fetch_patients(pool, Some(email))
        .await?
        .into_iter()
        .next()
        .with_context(|| format!("no patient with email {email}"))
}

/// Loads the four streams for `(since, as_of]`, plus the latest mood entry at
/// or before `as_of` even when it is older than `since`.
pub async fn fetch_patient_data(
    pool: &PgPool,
    patient_id: Uuid,
    since: DateTime<Utc>,
    as_of: DateTime<Utc>,
) -> anyhow::Result<PatientData> {
    let mood_entries: Vec<MoodEntry> = sqlx::query(
        r#"
        SELECT mood_score, triggers, created_at
        FROM moodmate.mood_entries
        WHERE patient_id = $1
          AND created_at <= $3
          AND (created_at > $2 OR created_at = (
              SELECT MAX(created_at) FROM moodmate.mood_entries
              WHERE patient_id = $1 AND created_at <= $3
          ))
        ORDER BY created_at
        "#,
    )
    .bind(patient_id)
    .bind(since)
    .bind(as_of)
    .fetch_all(pool)
    .await
    .context("failed to load mood entries")?
    .into_iter()
    .map(|row| MoodEntry {
        mood_score: row.get("mood_score"),
        triggers: row.get("triggers"),
        created_at: row.get("created_at"),
    })
    .collect();

    let sessions: Vec<Session> = sqlx::query(
        r#"
        SELECT scheduled_time, status FROM moodmate.sessions
        WHERE patient_id = $1 AND scheduled_time > $2 AND scheduled_time <= $3
        "#,
    )
    .bind(patient_id)
    .bind(since)
    .bind(as_of)
    .fetch_all(pool)
    .await
    .context("failed to load sessions")?
    .into_iter()
    .map(|row| Session {
        scheduled_time: row.get("scheduled_time"),
        status: SessionStatus::from_db(row.get::<String, _>("status").as_str()),
    })
    .collect();

    let tasks: Vec<Task> = sqlx::query(
        r#"
        SELECT due_date, completed FROM moodmate.tasks
        WHERE patient_id = $1 AND due_date > $2 AND due_date <= $3
        "#,
    )
    .bind(patient_id)
    .bind(since)
    .bind(as_of)
    .fetch_all(pool)
    .await
    .context("failed to load tasks")?
    .into_iter()
    .map(|row| Task {
        due_date: row.get("due_date"),
        completed: row.get("completed"),
    })
    .collect();

    let chat_logs: Vec<ChatLogEntry> = sqlx::query(
        r#"
        SELECT created_at FROM moodmate.ai_chat_logs
        WHERE patient_id = $1 AND created_at > $2 AND created_at <= $3
        "#,
    )
    .bind(patient_id)
    .bind(since)
    .bind(as_of)
    .fetch_all(pool)
    .await
    .context("failed to load chat logs")?
    .into_iter()
    .map(|row| ChatLogEntry {
        created_at: row.get("created_at"),
    })
    .collect();

    Ok(PatientData {
        mood_entries,
        sessions,
        tasks,
        chat_logs,
    })
}

/// Distinct UTC days with a mood entry at or before `as_of`, newest first.
/// Unbounded in the past so long logging streaks are not clipped.
pub async fn fetch_mood_days(
    pool: &PgPool,
    patient_id: Uuid,
    as_of: DateTime<Utc>,
) -> anyhow::Result<Vec<NaiveDate>> {
    let days = sqlx::query(
        r#"
        SELECT DISTINCT (created_at AT TIME ZONE 'UTC')::date AS day
        FROM moodmate.mood_entries
        WHERE patient_id = $1 AND created_at <= $2
        ORDER BY day DESC
        "#,
    )
    .bind(patient_id)
    .bind(as_of)
    .fetch_all(pool)
    .await
    .context("failed to load mood days")?
    .into_iter()
    .map(|row| row.get("day"))
    .collect();

    Ok(days)
}

pub async fn record_dismissal(
    pool: &PgPool,
    patient_id: Uuid,
    level: RiskLevel,
    dismissed_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO moodmate.risk_alert_dismissals (id, patient_id, level, dismissed_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(patient_id)
    .bind(level.as_str())
    .bind(dismissed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest_dismissal(
    pool: &PgPool,
    patient_id: Uuid,
) -> anyhow::Result<Option<AlertDismissal>> {
    let row = sqlx::query(
        r#"
        SELECT level, dismissed_at FROM moodmate.risk_alert_dismissals
        WHERE patient_id = $1
        ORDER BY dismissed_at DESC
        LIMIT 1
        "#,
    )
    .bind(patient_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let level: String = row.get("level");
    match RiskLevel::from_db(&level) {
        Some(level) => Ok(Some(AlertDismissal {
            level,
            dismissed_at: row.get("dismissed_at"),
        })),
        None => {
            tracing::warn!(%patient_id, level = %level, "ignoring dismissal with unknown level");
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MoodCsvRow {
    pub full_name: String,
    pub email: String,
    pub mood_score: i32,
    #[serde(default)]
    pub triggers: String,
    pub created_at: DateTime<Utc>,
    pub source_key: Option<String>,
}

impl MoodCsvRow {
    /// Triggers are `;`-separated in the file.
    pub fn trigger_list(&self) -> Vec<String> {
        self.triggers
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub fn parse_mood_csv<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<MoodCsvRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<MoodCsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid CSV row at line {line}"))?;
        if !(1..=10).contains(&row.mood_score) {
            anyhow::bail!(
                "mood_score {} at line {line} is outside 1-10",
                row.mood_score
            );
        }
        rows.push(row);
    }

    Ok(rows)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = parse_mood_csv(file)?;
    let mut inserted = 0usize;
    let mut tx = pool.begin().await?;

    for row in rows {
        let patient_id: Uuid = sqlx::query(
            r#"
            INSERT INTO moodmate.patients (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.email)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        let triggers = row.trigger_list();
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO moodmate.mood_entries
            (id, patient_id, mood_score, triggers, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(row.mood_score)
        .bind(triggers)
        .bind(row.created_at)
        .bind(&source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        } else {
            tracing::debug!(source_key = %source_key, "skipping duplicate mood entry");
        }
    }

    tx.commit().await?;
    Ok(inserted)
}
