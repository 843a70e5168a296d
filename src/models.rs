use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub mood_score: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
    Other,
}

impl SessionStatus {
    /// Maps a stored status string; anything unrecognised becomes `Other`.
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => SessionStatus::Scheduled,
            "completed" => SessionStatus::Completed,
            "cancelled" | "canceled" => SessionStatus::Cancelled,
            "no_show" | "no-show" => SessionStatus::NoShow,
            _ => SessionStatus::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub scheduled_time: DateTime<Utc>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub due_date: DateTime<Utc>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub created_at: DateTime<Utc>,
}

/// Everything the calculator needs for one patient.
#[derive(Debug, Clone, Default)]
pub struct PatientData {
    pub mood_entries: Vec<MoodEntry>,
    pub sessions: Vec<Session>,
    pub tasks: Vec<Task>,
    pub chat_logs: Vec<ChatLogEntry>,
}

/// Risk level derived from the wellness score.
///
/// The ordering is by severity: `Low < Medium < High < Critical`, which is the
/// reverse of the score direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Low
        } else if score >= 60.0 {
            RiskLevel::Medium
        } else if score >= 40.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactors {
    pub mood_trend: f64,
    pub session_attendance: f64,
    pub task_completion: f64,
    pub communication_frequency: f64,
    pub last_mood_score: f64,
    pub trigger_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Wellness score in `[0, 100]`. Higher means healthier, so a low score
    /// maps to a severe risk level.
    pub score: f64,
    pub level: RiskLevel,
    pub factors: RiskFactors,
    pub recommendations: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientAssessment {
    pub patient: Patient,
    pub assessment: RiskAssessment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoodDrop {
    pub from_score: i32,
    pub to_score: i32,
    pub from_at: DateTime<Utc>,
    pub to_at: DateTime<Utc>,
}

impl MoodDrop {
    pub fn magnitude(&self) -> i32 {
        self.from_score - self.to_score
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCount {
    pub trigger: String,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct AlertDismissal {
    pub level: RiskLevel,
    pub dismissed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_thresholds_use_inclusive_lower_bounds() {
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(79.99), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59.99), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(39.99), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Critical);
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn unknown_session_status_is_not_completed() {
        assert_eq!(SessionStatus::from_db("Completed"), SessionStatus::Completed);
        assert_eq!(SessionStatus::from_db("canceled"), SessionStatus::Cancelled);
        assert_eq!(SessionStatus::from_db("rescheduled"), SessionStatus::Other);
    }

    #[test]
    fn level_round_trips_through_db_text() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical] {
            assert_eq!(RiskLevel::from_db(level.as_str()), Some(level));
        }
        assert_eq!(RiskLevel::from_db("severe"), None);
    }
}
