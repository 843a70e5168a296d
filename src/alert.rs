use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};

use crate::models::{AlertDismissal, Patient, RiskAssessment, RiskLevel};

#[derive(Debug, Clone, PartialEq)]
pub struct RiskAlert {
    pub patient_name: String,
    pub patient_email: String,
    pub level: RiskLevel,
    pub score: f64,
    pub headline: String,
    pub recommendations: Vec<String>,
}

/// Only `high` and `critical` assessments raise an alert.
pub fn build_alert(patient: &Patient, assessment: &RiskAssessment) -> Option<RiskAlert> {
    if assessment.level < RiskLevel::High {
        return None;
    }

    let headline = match assessment.level {
        RiskLevel::Critical => format!(
            "Critical risk: {} scored {:.0}/100 and needs immediate attention",
            patient.full_name, assessment.score
        ),
        _ => format!(
            "High risk: {} scored {:.0}/100",
            patient.full_name, assessment.score
        ),
    };

    Some(RiskAlert {
        patient_name: patient.full_name.clone(),
        patient_email: patient.email.clone(),
        level: assessment.level,
        score: assessment.score,
        headline,
        recommendations: assessment.recommendations.clone(),
    })
}

/// A dismissed alert stays hidden for `snooze_hours` unless the level got worse.
pub fn is_snoozed(
    dismissal: Option<&AlertDismissal>,
    level: RiskLevel,
    as_of: DateTime<Utc>,
    snooze_hours: i64,
) -> bool {
    match dismissal {
        Some(dismissal) => {
            // an end that does not fit in a timestamp never expires
            let expired = Duration::try_hours(snooze_hours)
                .and_then(|span| dismissal.dismissed_at.checked_add_signed(span))
                .is_some_and(|until| as_of >= until);
            dismissal.dismissed_at <= as_of && !expired && level <= dismissal.level
        }
        None => false,
    }
}

pub fn render_banner(alert: &RiskAlert) -> String {
    let mut output = String::new();
    let marker = match alert.level {
        RiskLevel::Critical => "!!",
        _ => "!",
    };

    let _ = writeln!(output, "[{}] {}", marker, alert.headline);
    let _ = writeln!(output, "    patient: {}", alert.patient_email);
    for recommendation in &alert.recommendations {
        let _ = writeln!(output, "    - {}", recommendation);
    }
    let _ = writeln!(
        output,
        "    dismiss with: moodmate-risk dismiss-alert --email {}",
        alert.patient_email
    );
    output
}
