//! Runtime configuration.
//!
//! Values come from an optional JSON file: the `--config` path if given,
//! otherwise `moodmate.config.json` in the working directory when it exists.
//! Every field is optional. `DATABASE_URL` and `RUST_LOG` stay in the
//! environment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::risk::RiskWeights;

pub const DEFAULT_CONFIG_FILE: &str = "moodmate.config.json";
pub const DEFAULT_LOG_FILTER: &str = "moodmate_risk=info";
/// One year.
pub const MAX_ALERT_SNOOZE_HOURS: i64 = 8760;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("weight `{name}` must be a finite, non-negative number (got {value})")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("{name} must be between {min} and {max} (got {value})")]
    OutOfRange {
        name: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Postgres pool size (default: 5)
    #[serde(default)]
    pub max_connections: Option<u32>,

    /// Hours a dismissed alert stays hidden (default: 24)
    #[serde(default)]
    pub alert_snooze_hours: Option<i64>,

    /// Rows shown in report lists (default: 5)
    #[serde(default)]
    pub report_limit: Option<usize>,

    /// Minimum point drop between consecutive moods to flag (default: 3)
    #[serde(default)]
    pub mood_drop_threshold: Option<i32>,

    /// Partial override of the factor weights
    #[serde(default)]
    pub weights: Option<WeightConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightConfig {
    pub mood_trend: Option<f64>,
    pub session_attendance: Option<f64>,
    pub task_completion: Option<f64>,
    pub communication_frequency: Option<f64>,
    pub last_mood_score: Option<f64>,
    pub trigger_frequency: Option<f64>,
}

/// Fully resolved settings with defaults applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_connections: u32,
    pub alert_snooze_hours: i64,
    pub report_limit: usize,
    pub mood_drop_threshold: i32,
    pub weights: RiskWeights,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_connections: 5,
            alert_snooze_hours: 24,
            report_limit: 5,
            mood_drop_threshold: 3,
            weights: RiskWeights::default(),
        }
    }
}

impl AppConfig {
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !candidate.exists() {
                    tracing::debug!("no config file found, using defaults");
                    return Ok(AppConfig::default());
                }
                candidate
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let defaults = Settings::default();

        let max_connections = self.max_connections.unwrap_or(defaults.max_connections);
        if max_connections == 0 {
            return Err(ConfigError::MustBePositive("max_connections"));
        }
        let alert_snooze_hours = self.alert_snooze_hours.unwrap_or(defaults.alert_snooze_hours);
        if alert_snooze_hours <= 0 {
            return Err(ConfigError::MustBePositive("alert_snooze_hours"));
        }
        if alert_snooze_hours > MAX_ALERT_SNOOZE_HOURS {
            return Err(ConfigError::OutOfRange {
                name: "alert_snooze_hours",
                min: 1,
                max: MAX_ALERT_SNOOZE_HOURS,
                value: alert_snooze_hours,
            });
        }
        let mood_drop_threshold = self.mood_drop_threshold.unwrap_or(defaults.mood_drop_threshold);
        if mood_drop_threshold <= 0 {
            return Err(ConfigError::MustBePositive("mood_drop_threshold"));
        }

        let weights = match &self.weights {
            Some(overrides) => overrides.merge(defaults.weights)?,
            None => defaults.weights,
        };

        Ok(Settings {
            max_connections,
            alert_snooze_hours,
            report_limit: self.report_limit.unwrap_or(defaults.report_limit),
            mood_drop_threshold,
            weights,
        })
    }
}

impl WeightConfig {
    fn merge(&self, base: RiskWeights) -> Result<RiskWeights, ConfigError> {
        let pick = |name: &'static str, value: Option<f64>, fallback: f64| match value {
            Some(v) if !v.is_finite() || v < 0.0 => Err(ConfigError::InvalidWeight { name, value: v }),
            Some(v) => Ok(v),
            None => Ok(fallback),
        };

        Ok(RiskWeights {
            mood_trend: pick("mood_trend", self.mood_trend, base.mood_trend)?,
            session_attendance: pick(
                "session_attendance",
                self.session_attendance,
                base.session_attendance,
            )?,
            task_completion: pick("task_completion", self.task_completion, base.task_completion)?,
            communication_frequency: pick(
                "communication_frequency",
                self.communication_frequency,
                base.communication_frequency,
            )?,
            last_mood_score: pick("last_mood_score", self.last_mood_score, base.last_mood_score)?,
            trigger_frequency: pick(
                "trigger_frequency",
                self.trigger_frequency,
                base.trigger_frequency,
            )?,
        })
    }
}
