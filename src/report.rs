use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{Patient, PatientData, RiskAssessment};
use crate::risk::{BASELINE_WINDOW_DAYS, RECENT_WINDOW_DAYS};
use crate::trends;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub limit: usize,
    pub mood_drop_threshold: i32,
}

pub fn build_report(
    patient: &Patient,
    data: &PatientData,
    assessment: &RiskAssessment,
    logging_streak: u32,
    as_of: DateTime<Utc>,
    options: ReportOptions,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Patient Risk Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}) as of {}",
        patient.full_name,
        patient.email,
        as_of.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Assessment");
    let _ = writeln!(
        output,
        "- Wellness score: {:.1}/100",
        assessment.score
    );
    let _ = writeln!(output, "- Risk level: {}", assessment.level.as_str());
    let _ = writeln!(output);

    let factors = &assessment.factors;
    let _ = writeln!(output, "| Factor | Value |");
    let _ = writeln!(output, "| --- | ---: |");
    for (name, value) in [
        ("Mood trend", factors.mood_trend),
        ("Session attendance", factors.session_attendance),
        ("Task completion", factors.task_completion),
        ("Communication frequency", factors.communication_frequency),
        ("Last mood score", factors.last_mood_score),
        ("Trigger stability", factors.trigger_frequency),
    ] {
        let _ = writeln!(output, "| {} | {:.1} |", name, value);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    for recommendation in &assessment.recommendations {
        let _ = writeln!(output, "- {}", recommendation);
    }

    let history: Vec<_> = data
        .mood_entries
        .iter()
        .filter(|entry| trends::within_window(entry.created_at, as_of, BASELINE_WINDOW_DAYS, 0))
        .cloned()
        .collect();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Mood Drops (last {} days)", BASELINE_WINDOW_DAYS);
    let drops = trends::detect_mood_drops(&history, options.mood_drop_threshold);
    if drops.is_empty() {
        let _ = writeln!(output, "No significant drops recorded.");
    } else {
        for drop in drops.iter().take(options.limit) {
            let _ = writeln!(
                output,
                "- {} -> {} (-{}) between {} and {}",
                drop.from_score,
                drop.to_score,
                drop.magnitude(),
                drop.from_at.format("%Y-%m-%d"),
                drop.to_at.format("%Y-%m-%d")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Logging Streak");
    let _ = writeln!(
        output,
        "{} consecutive day{} with a mood entry.",
        logging_streak,
        if logging_streak == 1 { "" } else { "s" }
    );

    let recent = trends::entries_in_window(&data.mood_entries, as_of, RECENT_WINDOW_DAYS, 0);
    let triggers = trends::trigger_frequency(recent.iter().copied());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Triggers (last {} days)", RECENT_WINDOW_DAYS);
    if triggers.is_empty() {
        let _ = writeln!(output, "No triggers reported.");
    } else {
        for trigger in triggers.iter().take(options.limit) {
            let _ = writeln!(output, "- {}: {}", trigger.trigger, trigger.count);
        }
    }

    let mut latest = history;
    latest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Mood Entries");
    if latest.is_empty() {
        let _ = writeln!(output, "No mood entries recorded for this window.");
    } else {
        for entry in latest.iter().take(options.limit) {
            let tags = if entry.triggers.is_empty() {
                "no triggers".to_string()
            } else {
                entry.triggers.join(", ")
            };
            let _ = writeln!(
                output,
                "- {}: {}/10 ({})",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                entry.mood_score,
                tags
            );
        }
    }

    output
}
