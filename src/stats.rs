// src/stats.rs
use crate::model::{minutes_from_duration, Workout};
use crate::streak::{current_streak, StreakDays};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter, EnumString};

const TOP_IMPROVEMENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    #[default]
    Month,
    Year,
}

impl Period {
    /// First date inside the period ending `today`.
    pub fn start(self, today: NaiveDate) -> NaiveDate {
        let start = match self {
            Self::Week => today.checked_sub_days(Days::new(7)),
            Self::Month => today.checked_sub_months(Months::new(1)),
            Self::Year => today.checked_sub_months(Months::new(12)),
        };
        start.unwrap_or(NaiveDate::MIN)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightProgress {
    pub machine: String,
    pub improvement: f64,
    pub percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub period: Period,
    pub total_completed: usize,
    pub average_duration: u32,
    /// Logged time of completed cardio blocks, rounded to whole minutes.
    pub cardio_minutes: u32,
    pub completion_rate: u32,
    pub current_streak: u32,
    pub weight_progress: Vec<WeightProgress>,
    pub by_type: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionCount {
    pub completed: usize,
    pub total: usize,
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// Figures for the history screen. The completion rate compares completed
/// workouts inside the period with every stored workout.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn summarize(
    workouts: &[Workout],
    period: Period,
    today: NaiveDate,
    streak_days: StreakDays,
) -> ProgressSummary {
    let start = period.start(today);
    let mut in_period: Vec<&Workout> = workouts.iter().filter(|w| w.date >= start).collect();
    in_period.sort_by_key(|w| w.date);
    let completed: Vec<&Workout> = in_period.iter().copied().filter(|w| w.completed).collect();

    let total_duration: u32 = completed.iter().filter_map(|w| w.duration).sum();
    let average_duration = if completed.is_empty() {
        0
    } else {
        (f64::from(total_duration) / completed.len() as f64).round() as u32
    };

    let cardio_minutes: f64 = completed
        .iter()
        .filter_map(|w| w.cardio.as_ref())
        .filter(|c| c.completed)
        .filter_map(|c| c.duration.as_deref().and_then(minutes_from_duration))
        .sum();

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for workout in &in_period {
        *by_type.entry(workout.workout_type.as_str()).or_default() += 1;
    }
    let mut by_type: Vec<(String, usize)> = by_type
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    by_type.sort_by(|a, b| b.1.cmp(&a.1));

    ProgressSummary {
        period,
        total_completed: completed.len(),
        average_duration,
        cardio_minutes: cardio_minutes.round() as u32,
        completion_rate: percent(completed.len(), workouts.len()),
        current_streak: current_streak(workouts, streak_days, today),
        weight_progress: weight_progress(&completed),
        by_type,
    }
}

/// Heaviest set of the first and the last session per machine, improvements
/// only, largest first.
#[allow(clippy::cast_possible_truncation)]
fn weight_progress(completed: &[&Workout]) -> Vec<WeightProgress> {
    let mut sessions: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for workout in completed {
        for exercise in &workout.exercises {
            let max = exercise.max_weight();
            sessions
                .entry(exercise.machine.as_str())
                .and_modify(|(_, last)| *last = max)
                .or_insert((max, max));
        }
    }

    let mut progress: Vec<WeightProgress> = sessions
        .into_iter()
        .filter_map(|(machine, (first, last))| {
            let improvement = last - first;
            (improvement > 0.0).then(|| WeightProgress {
                machine: machine.to_string(),
                improvement,
                percentage: if first > 0.0 {
                    ((improvement / first) * 100.0).round() as i64
                } else {
                    0
                },
            })
        })
        .collect();
    progress.sort_by(|a, b| b.improvement.total_cmp(&a.improvement));
    progress.truncate(TOP_IMPROVEMENTS);
    progress
}

fn count(workouts: &[Workout], mut within: impl FnMut(NaiveDate) -> bool) -> CompletionCount {
    let matching = workouts.iter().filter(|w| within(w.date));
    let (completed, total) = matching.fold((0, 0), |(done, all), w| {
        (done + usize::from(w.completed), all + 1)
    });
    CompletionCount { completed, total }
}

pub fn month_counts(workouts: &[Workout], year: i32, month: u32) -> CompletionCount {
    count(workouts, |d| d.year() == year && d.month() == month)
}

/// Counts for the Sunday-started week containing `date`.
pub fn week_counts(workouts: &[Workout], date: NaiveDate) -> CompletionCount {
    let sunday = date - Days::new(u64::from(date.weekday().num_days_from_sunday()));
    let saturday = sunday + Days::new(6);
    count(workouts, |d| d >= sunday && d <= saturday)
}
