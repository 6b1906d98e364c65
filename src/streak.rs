// src/streak.rs
use crate::model::Workout;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// How far back the current streak is searched.
const MAX_LOOKBACK_DAYS: u32 = 365;

/// Weekdays on which a missed workout breaks the streak.
///
/// Persisted as day indices with Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakDays {
    days: [bool; 7],
}

impl StreakDays {
    pub const fn all() -> Self {
        Self { days: [true; 7] }
    }

    pub const fn none() -> Self {
        Self { days: [false; 7] }
    }

    pub fn from_weekdays<I: IntoIterator<Item = Weekday>>(weekdays: I) -> Self {
        let mut days = Self::none();
        for day in weekdays {
            days.insert(day);
        }
        days
    }

    /// Indices outside 0-6 are ignored.
    pub fn from_indices<I: IntoIterator<Item = u32>>(indices: I) -> Self {
        let mut days = Self::none();
        for idx in indices {
            if let Some(slot) = usize::try_from(idx).ok().and_then(|i| days.days.get_mut(i)) {
                *slot = true;
            }
        }
        days
    }

    pub fn insert(&mut self, day: Weekday) {
        self.days[day.num_days_from_sunday() as usize] = true;
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.days[day.num_days_from_sunday() as usize]
    }

    pub fn is_empty(&self) -> bool {
        !self.days.iter().any(|d| *d)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn indices(&self) -> Vec<u32> {
        self.days
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(idx, _)| idx as u32)
            .collect()
    }

    /// Selected weekdays starting from Sunday.
    pub fn weekdays(&self) -> Vec<Weekday> {
        let mut day = Weekday::Sun;
        let mut out = Vec::new();
        for on in self.days {
            if on {
                out.push(day);
            }
            day = day.succ();
        }
        out
    }
}

impl Default for StreakDays {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for StreakDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.weekdays().iter().map(ToString::to_string).collect();
        if names.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

impl Serialize for StreakDays {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.indices().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StreakDays {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<u32>::deserialize(deserializer).map(Self::from_indices)
    }
}

fn completion_by_date(workouts: &[Workout]) -> HashMap<NaiveDate, bool> {
    let mut map = HashMap::new();
    for workout in workouts {
        *map.entry(workout.date).or_insert(false) |= workout.completed;
    }
    map
}

/// Consecutive completed days ending at today (or at the latest completed
/// date, if that lies in the future). Missing a non-streak day is allowed;
/// missing a streak day ends the run.
pub fn current_streak(workouts: &[Workout], streak_days: StreakDays, today: NaiveDate) -> u32 {
    let completed = completion_by_date(workouts);
    let latest = workouts.iter().filter(|w| w.completed).map(|w| w.date).max();
    let mut date = match latest {
        Some(latest) if latest > today => latest,
        _ => today,
    };

    let mut streak = 0;
    for _ in 0..MAX_LOOKBACK_DAYS {
        let done = completed.get(&date).copied().unwrap_or(false);
        if done {
            streak += 1;
        } else if streak_days.contains(date.weekday()) {
            break;
        }
        match date.checked_sub_days(Days::new(1)) {
            Some(prev) => date = prev,
            None => break,
        }
    }
    streak
}

/// Longest run between the earliest workout and today (or the latest
/// workout, if later), using the same rules as [`current_streak`].
pub fn longest_streak(workouts: &[Workout], streak_days: StreakDays, today: NaiveDate) -> u32 {
    let Some(start) = workouts.iter().map(|w| w.date).min() else {
        return 0;
    };
    let end = workouts
        .iter()
        .map(|w| w.date)
        .max()
        .map_or(today, |latest| latest.max(today));
    let completed = completion_by_date(workouts);

    let mut longest = 0;
    let mut running = 0;
    for date in start.iter_days().take_while(|d| *d <= end) {
        if completed.get(&date).copied().unwrap_or(false) {
            running += 1;
            longest = longest.max(running);
        } else if streak_days.contains(date.weekday()) {
            running = 0;
        }
    }
    longest
}
