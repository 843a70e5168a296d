//! Patient risk assessment.
//!
//! Folds the four patient streams into a 0-100 wellness score. The score runs
//! opposite to the level names: 100 is the healthiest and maps to `low` risk.
//!
//! The calculator is pure. "Now" is always passed in as `as_of`, and records
//! stamped after it are ignored.

use chrono::{DateTime, Utc};

use crate::models::{
    ChatLogEntry, MoodEntry, PatientData, RiskAssessment, RiskFactors, RiskLevel, Session,
    SessionStatus, Task,
};
use crate::trends::{self, NEUTRAL_MOOD};

pub const RECENT_WINDOW_DAYS: i64 = 7;
pub const BASELINE_WINDOW_DAYS: i64 = 14;

pub const MOOD_DECLINE_ADVICE: &str =
    "Mood has declined over the past week. Consider scheduling a check-in session.";
pub const LOW_ATTENDANCE_ADVICE: &str =
    "Session attendance is below 70%. Follow up on missed appointments.";
pub const LOW_TASK_COMPLETION_ADVICE: &str =
    "Fewer than half of this week's tasks were completed. Review task load and difficulty.";
pub const LOW_ENGAGEMENT_ADVICE: &str =
    "Engagement with the chat companion is low. Encourage regular check-ins.";
pub const LOW_MOOD_ADVICE: &str =
    "The most recent mood score is very low. Consider reaching out promptly.";
pub const FREQUENT_TRIGGERS_ADVICE: &str =
    "Many triggers were reported this week. Explore coping strategies for recurring triggers.";
pub const POSITIVE_PROGRESS: &str =
    "Patient is showing positive progress. Continue the current care plan.";

/// Weights for the six factors. The defaults sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskWeights {
    pub mood_trend: f64,
    pub session_attendance: f64,
    pub task_completion: f64,
    pub communication_frequency: f64,
    pub last_mood_score: f64,
    pub trigger_frequency: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights {
            mood_trend: 0.30,
            session_attendance: 0.20,
            task_completion: 0.20,
            communication_frequency: 0.15,
            last_mood_score: 0.10,
            trigger_frequency: 0.05,
        }
    }
}

impl RiskWeights {
    pub fn apply(&self, factors: &RiskFactors) -> f64 {
        self.mood_trend * factors.mood_trend
            + self.session_attendance * factors.session_attendance
            + self.task_completion * factors.task_completion
            + self.communication_frequency * factors.communication_frequency
            + self.last_mood_score * factors.last_mood_score
            + self.trigger_frequency * factors.trigger_frequency
    }
}

/// Assess a patient with the default weights.
pub fn calculate_risk_score(
    mood_entries: &[MoodEntry],
    sessions: &[Session],
    tasks: &[Task],
    chat_logs: &[ChatLogEntry],
    as_of: DateTime<Utc>,
) -> RiskAssessment {
    calculate_weighted(
        mood_entries,
        sessions,
        tasks,
        chat_logs,
        as_of,
        &RiskWeights::default(),
    )
}

pub fn assess(data: &PatientData, as_of: DateTime<Utc>, weights: &RiskWeights) -> RiskAssessment {
    calculate_weighted(
        &data.mood_entries,
        &data.sessions,
        &data.tasks,
        &data.chat_logs,
        as_of,
        weights,
    )
}

pub fn calculate_weighted(
    mood_entries: &[MoodEntry],
    sessions: &[Session],
    tasks: &[Task],
    chat_logs: &[ChatLogEntry],
    as_of: DateTime<Utc>,
    weights: &RiskWeights,
) -> RiskAssessment {
    let factors = compute_factors(mood_entries, sessions, tasks, chat_logs, as_of);
    let score = weights.apply(&factors).clamp(0.0, 100.0);
    let level = RiskLevel::from_score(score);
    let recommendations = recommendations_for(&factors);

    tracing::debug!(score, level = level.as_str(), ?factors, "computed risk assessment");

    RiskAssessment {
        score,
        level,
        factors,
        recommendations,
        last_updated: as_of,
    }
}

pub fn compute_factors(
    mood_entries: &[MoodEntry],
    sessions: &[Session],
    tasks: &[Task],
    chat_logs: &[ChatLogEntry],
    as_of: DateTime<Utc>,
) -> RiskFactors {
    let recent = trends::entries_in_window(mood_entries, as_of, RECENT_WINDOW_DAYS, 0);
    let older = trends::entries_in_window(
        mood_entries,
        as_of,
        BASELINE_WINDOW_DAYS,
        RECENT_WINDOW_DAYS,
    );

    let recent_avg = trends::average_mood(recent.iter().copied()).unwrap_or(NEUTRAL_MOOD);
    let older_avg = trends::average_mood(older.iter().copied()).unwrap_or(NEUTRAL_MOOD);
    let mood_trend = ((recent_avg - older_avg) / 10.0) * 100.0;

    let recent_sessions: Vec<&Session> = sessions
        .iter()
        .filter(|session| trends::within_window(session.scheduled_time, as_of, RECENT_WINDOW_DAYS, 0))
        .collect();
    let attended = recent_sessions
        .iter()
        .filter(|session| session.status == SessionStatus::Completed)
        .count();
    let session_attendance = percentage(attended, recent_sessions.len());

    let due_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|task| trends::within_window(task.due_date, as_of, RECENT_WINDOW_DAYS, 0))
        .collect();
    let done = due_tasks.iter().filter(|task| task.completed).count();
    let task_completion = percentage(done, due_tasks.len());

    let chat_count = chat_logs
        .iter()
        .filter(|log| trends::within_window(log.created_at, as_of, RECENT_WINDOW_DAYS, 0))
        .count();
    let communication_frequency = (chat_count as f64 / 7.0 * 10.0).min(100.0);

    let last_mood_score = trends::latest_entry(mood_entries, as_of)
        .map(|entry| entry.mood_score as f64 * 10.0)
        .unwrap_or(50.0);

    let trigger_count = trends::count_triggers(recent.iter().copied());
    let trigger_frequency = (100.0 - trigger_count as f64 * 10.0).max(0.0);

    RiskFactors {
        mood_trend,
        session_attendance,
        task_completion,
        communication_frequency,
        last_mood_score,
        trigger_frequency,
    }
}

/// Share of `part` in `total` as a percentage; an empty total is not penalized.
fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn recommendations_for(factors: &RiskFactors) -> Vec<String> {
    let checks = [
        (factors.mood_trend < -20.0, MOOD_DECLINE_ADVICE),
        (factors.session_attendance < 70.0, LOW_ATTENDANCE_ADVICE),
        (factors.task_completion < 50.0, LOW_TASK_COMPLETION_ADVICE),
        (factors.communication_frequency < 30.0, LOW_ENGAGEMENT_ADVICE),
        (factors.last_mood_score < 30.0, LOW_MOOD_ADVICE),
        (factors.trigger_frequency < 50.0, FREQUENT_TRIGGERS_ADVICE),
    ];

    let mut recommendations: Vec<String> = checks
        .iter()
        .filter(|(triggered, _)| *triggered)
        .map(|(_, advice)| advice.to_string())
        .collect();

    if recommendations.is_empty() {
        recommendations.push(POSITIVE_PROGRESS.to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).unwrap()
    }

    fn mood(days_ago: i64, mood_score: i32, triggers: &[&str]) -> MoodEntry {
        MoodEntry {
            mood_score,
            created_at: as_of() - Duration::days(days_ago) - Duration::hours(1),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn session(days_ago: i64, status: SessionStatus) -> Session {
        Session {
            scheduled_time: as_of() - Duration::days(days_ago) - Duration::hours(1),
            status,
        }
    }

    fn task(days_ago: i64, completed: bool) -> Task {
        Task {
            due_date: as_of() - Duration::days(days_ago) - Duration::hours(1),
            completed,
        }
    }

    fn chats(count: usize) -> Vec<ChatLogEntry> {
        (0..count)
            .map(|i| ChatLogEntry {
                created_at: as_of() - Duration::hours(i as i64 + 1),
            })
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_inputs_give_neutral_baseline() {
        let result = calculate_risk_score(&[], &[], &[], &[], as_of());

        assert_eq!(result.factors.mood_trend, 0.0);
        assert_eq!(result.factors.session_attendance, 100.0);
        assert_eq!(result.factors.task_completion, 100.0);
        assert_eq!(result.factors.communication_frequency, 0.0);
        assert_eq!(result.factors.last_mood_score, 50.0);
        assert_eq!(result.factors.trigger_frequency, 100.0);
        assert!(approx(result.score, 50.0));
        assert_eq!(result.level, RiskLevel::High);
        assert_eq!(result.last_updated, as_of());
    }

    #[test]
    fn single_top_mood_adds_five_points() {
        let entries = vec![mood(0, 10, &[])];
        let result = calculate_risk_score(&entries, &[], &[], &[], as_of());

        assert_eq!(result.factors.last_mood_score, 100.0);
        // recent average 10 against the neutral 5 also lifts the trend
        assert!(approx(result.factors.mood_trend, 50.0));
    }

    #[test]
    fn single_top_mood_outside_trend_windows_scores_55() {
        let entries = vec![mood(20, 10, &[])];
        let result = calculate_risk_score(&entries, &[], &[], &[], as_of());

        assert_eq!(result.factors.mood_trend, 0.0);
        assert_eq!(result.factors.last_mood_score, 100.0);
        assert!(approx(result.score, 55.0));
        assert_eq!(result.level, RiskLevel::High);
    }

    #[test]
    fn mood_trend_compares_recent_against_prior_week() {
        let entries = vec![mood(1, 3, &[]), mood(2, 5, &[]), mood(9, 8, &[]), mood(10, 8, &[])];
        let factors = compute_factors(&entries, &[], &[], &[], as_of());
        assert!(approx(factors.mood_trend, -40.0));
    }

    #[test]
    fn attendance_and_completion_only_count_last_week() {
        let sessions = vec![
            session(1, SessionStatus::Completed),
            session(3, SessionStatus::Cancelled),
            session(4, SessionStatus::NoShow),
            session(5, SessionStatus::Completed),
            session(10, SessionStatus::Cancelled),
        ];
        let tasks = vec![task(0, true), task(2, false), task(30, false)];
        let factors = compute_factors(&[], &sessions, &tasks, &[], as_of());

        assert!(approx(factors.session_attendance, 50.0));
        assert!(approx(factors.task_completion, 50.0));
    }

    #[test]
    fn communication_frequency_saturates() {
        let factors = compute_factors(&[], &[], &[], &chats(14), as_of());
        assert!(approx(factors.communication_frequency, 20.0));

        let factors = compute_factors(&[], &[], &[], &chats(200), as_of());
        assert_eq!(factors.communication_frequency, 100.0);
    }

    #[test]
    fn triggers_reduce_stability_and_floor_at_zero() {
        let entries = vec![mood(1, 6, &["work", "sleep", "family"]), mood(12, 6, &["work"])];
        let factors = compute_factors(&entries, &[], &[], &[], as_of());
        assert!(approx(factors.trigger_frequency, 70.0));

        let many: Vec<&str> = vec!["noise"; 15];
        let entries = vec![mood(0, 6, &many)];
        let factors = compute_factors(&entries, &[], &[], &[], as_of());
        assert_eq!(factors.trigger_frequency, 0.0);
    }

    #[test]
    fn future_records_are_ignored() {
        let future = as_of() + Duration::hours(2);
        let entries = vec![MoodEntry {
            mood_score: 1,
            created_at: future,
            triggers: vec!["work".into()],
        }];
        let sessions = vec![Session {
            scheduled_time: future,
            status: SessionStatus::Cancelled,
        }];
        let result = calculate_risk_score(&entries, &sessions, &[], &[], as_of());
        let baseline = calculate_risk_score(&[], &[], &[], &[], as_of());
        assert_eq!(result, baseline);
    }

    #[test]
    fn struggling_patient_is_critical_with_specific_advice() {
        let entries = vec![
            mood(0, 2, &["work", "sleep", "conflict"]),
            mood(2, 2, &["work", "sleep", "money"]),
            mood(9, 8, &[]),
        ];
        let sessions = vec![session(2, SessionStatus::NoShow), session(4, SessionStatus::Cancelled)];
        let tasks = vec![task(1, false), task(3, false), task(5, true)];

        let result = calculate_risk_score(&entries, &sessions, &tasks, &[], as_of());

        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(
            result.recommendations,
            vec![
                MOOD_DECLINE_ADVICE.to_string(),
                LOW_ATTENDANCE_ADVICE.to_string(),
                LOW_TASK_COMPLETION_ADVICE.to_string(),
                LOW_ENGAGEMENT_ADVICE.to_string(),
                LOW_MOOD_ADVICE.to_string(),
                FREQUENT_TRIGGERS_ADVICE.to_string(),
            ]
        );
    }

    #[test]
    fn thriving_patient_gets_positive_message() {
        let entries = vec![mood(0, 9, &[]), mood(3, 8, &[]), mood(10, 6, &[])];
        let sessions = vec![session(2, SessionStatus::Completed)];
        let tasks = vec![task(1, true), task(4, true)];

        let result = calculate_risk_score(&entries, &sessions, &tasks, &chats(25), as_of());

        assert_eq!(result.recommendations, vec![POSITIVE_PROGRESS.to_string()]);
        assert!(result.score >= 60.0);
    }

    #[test]
    fn score_is_clamped_to_range() {
        let weights = RiskWeights {
            mood_trend: 5.0,
            ..RiskWeights::default()
        };
        let up = vec![mood(0, 10, &[]), mood(10, 1, &[])];
        let high = calculate_weighted(&up, &[], &[], &[], as_of(), &weights);
        assert_eq!(high.score, 100.0);
        assert_eq!(high.level, RiskLevel::Low);

        let down = vec![mood(0, 1, &[]), mood(10, 10, &[])];
        let low = calculate_weighted(&down, &[], &[], &[], as_of(), &weights);
        assert_eq!(low.score, 0.0);
        assert_eq!(low.level, RiskLevel::Critical);
    }

    #[test]
    fn recomputation_is_identical() {
        let entries = vec![mood(1, 4, &["work"]), mood(8, 6, &[])];
        let sessions = vec![session(2, SessionStatus::Completed)];
        let first = calculate_risk_score(&entries, &sessions, &[], &chats(3), as_of());
        let second = calculate_risk_score(&entries, &sessions, &[], &chats(3), as_of());

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn serialized_assessment_uses_camel_case_fields() {
        let result = calculate_risk_score(&[], &[], &[], &[], as_of());
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["level"], "high");
        assert!(value["lastUpdated"].is_string());
        assert_eq!(value["factors"]["sessionAttendance"], 100.0);
        assert_eq!(value["factors"]["lastMoodScore"], 50.0);
    }

    fn factors_at_thresholds() -> RiskFactors {
        RiskFactors {
            mood_trend: -20.0,
            session_attendance: 70.0,
            task_completion: 50.0,
            communication_frequency: 30.0,
            last_mood_score: 30.0,
            trigger_frequency: 50.0,
        }
    }

    #[test]
    fn thresholds_are_exclusive() {
        assert_eq!(
            recommendations_for(&factors_at_thresholds()),
            vec![POSITIVE_PROGRESS.to_string()]
        );
    }

    #[test]
    fn each_factor_just_below_threshold_adds_its_advice() {
        let eps = 0.01;
        let cases: [(fn(&mut RiskFactors, f64), &str); 6] = [
            (|f, e| f.mood_trend -= e, MOOD_DECLINE_ADVICE),
            (|f, e| f.session_attendance -= e, LOW_ATTENDANCE_ADVICE),
            (|f, e| f.task_completion -= e, LOW_TASK_COMPLETION_ADVICE),
            (|f, e| f.communication_frequency -= e, LOW_ENGAGEMENT_ADVICE),
            (|f, e| f.last_mood_score -= e, LOW_MOOD_ADVICE),
            (|f, e| f.trigger_frequency -= e, FREQUENT_TRIGGERS_ADVICE),
        ];

        for (nudge, advice) in cases {
            let mut factors = factors_at_thresholds();
            nudge(&mut factors, eps);
            assert_eq!(recommendations_for(&factors), vec![advice.to_string()]);
        }
    }
}
