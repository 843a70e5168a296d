use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{MoodEntry, MoodDrop, TriggerCount};

/// Midpoint of the 1-10 mood scale, used when a window has no entries.
pub const NEUTRAL_MOOD: f64 = 5.0;

/// True when `ts` falls in `(as_of - from_days_ago, as_of - to_days_ago]`.
pub fn within_window(
    ts: DateTime<Utc>,
    as_of: DateTime<Utc>,
    from_days_ago: i64,
    to_days_ago: i64,
) -> bool {
    ts > as_of - Duration::days(from_days_ago) && ts <= as_of - Duration::days(to_days_ago)
}

pub fn entries_in_window<'a>(
    entries: &'a [MoodEntry],
    as_of: DateTime<Utc>,
    from_days_ago: i64,
    to_days_ago: i64,
) -> Vec<&'a MoodEntry> {
    entries
        .iter()
        .filter(|entry| within_window(entry.created_at, as_of, from_days_ago, to_days_ago))
        .collect()
}

pub fn average_mood<'a, I>(entries: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a MoodEntry>,
{
    let (sum, count) = entries
        .into_iter()
        .fold((0i64, 0usize), |(sum, count), entry| {
            (sum + entry.mood_score as i64, count + 1)
        });

    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

/// Most recent entry at or before `as_of`.
pub fn latest_entry(entries: &[MoodEntry], as_of: DateTime<Utc>) -> Option<&MoodEntry> {
    entries
        .iter()
        .filter(|entry| entry.created_at <= as_of)
        .max_by_key(|entry| entry.created_at)
}

pub fn count_triggers<'a, I>(entries: I) -> usize
where
    I: IntoIterator<Item = &'a MoodEntry>,
{
    entries.into_iter().map(|entry| entry.triggers.len()).sum()
}

/// Consecutive entries (chronological) whose score fell by at least `min_drop`.
pub fn detect_mood_drops(entries: &[MoodEntry], min_drop: i32) -> Vec<MoodDrop> {
    let mut ordered: Vec<&MoodEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.created_at);

    ordered
        .windows(2)
        .filter_map(|pair| {
            let (before, after) = (pair[0], pair[1]);
            if before.mood_score - after.mood_score >= min_drop.max(1) {
                Some(MoodDrop {
                    from_score: before.mood_score,
                    to_score: after.mood_score,
                    from_at: before.created_at,
                    to_at: after.created_at,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Days in a row (UTC calendar days) with at least one entry. The streak may
/// end today or yesterday, so a patient who has not logged yet today keeps it.
pub fn logging_streak(entries: &[MoodEntry], as_of: DateTime<Utc>) -> u32 {
    streak_ending_at(
        entries
            .iter()
            .filter(|entry| entry.created_at <= as_of)
            .map(|entry| entry.created_at.date_naive()),
        as_of,
    )
}

/// Same rule as [`logging_streak`], over days already reduced to dates.
/// Dates after `as_of` are ignored.
pub fn streak_ending_at<I>(days: I, as_of: DateTime<Utc>) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let today = as_of.date_naive();
    let days: BTreeSet<NaiveDate> = days.into_iter().filter(|day| *day <= today).collect();

    let mut day = today;
    if !days.contains(&day) {
        day -= Duration::days(1);
    }

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

pub fn trigger_frequency<'a, I>(entries: I) -> Vec<TriggerCount>
where
    I: IntoIterator<Item = &'a MoodEntry>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        for trigger in &entry.triggers {
            let normalized = trigger.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            *counts.entry(normalized).or_insert(0) += 1;
        }
    }

    let mut values: Vec<TriggerCount> = counts
        .into_iter()
        .map(|(trigger, count)| TriggerCount { trigger, count })
        .collect();
    values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.trigger.cmp(&b.trigger)));
    values
}
