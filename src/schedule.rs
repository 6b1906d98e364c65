// src/schedule.rs
use crate::catalog::DEFAULT_CYCLE;
use crate::clock::Clock;
use crate::model::CustomWorkoutTemplate;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid month: {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Calendar days since 1970-01-01. Negative before the epoch.
pub fn day_offset(date: NaiveDate) -> i64 {
    // NaiveDate::default() is 1970-01-01
    date.signed_duration_since(NaiveDate::default()).num_days()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub workout_type: Option<String>,
}

/// An ordered rotation of workout types, indexed by day offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    entries: Vec<String>,
}

impl Cycle {
    /// The default rotation restricted to `selection` (all of it when the
    /// selection is empty), followed by the custom templates that take part:
    /// the ones flagged for auto-schedule when nothing is selected, otherwise
    /// the ones named in the selection.
    pub fn build(selection: &[String], custom: &[CustomWorkoutTemplate]) -> Self {
        let selected = |name: &str| selection.iter().any(|s| s == name);
        let mut entries: Vec<String> = DEFAULT_CYCLE
            .iter()
            .filter(|name| selection.is_empty() || selected(**name))
            .map(|name| (*name).to_string())
            .collect();
        entries.extend(
            custom
                .iter()
                .filter(|t| {
                    if selection.is_empty() {
                        t.include_in_auto_schedule
                    } else {
                        selected(&t.name)
                    }
                })
                .map(|t| t.name.clone()),
        );
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn cycle_index_for_date(&self, date: NaiveDate) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        Some(day_offset(date).rem_euclid(self.entries.len() as i64) as usize)
    }

    /// `None` means no workout is scheduled.
    pub fn workout_for(&self, date: NaiveDate) -> Option<&str> {
        self.cycle_index_for_date(date)
            .map(|idx| self.entries[idx].as_str())
    }

    pub fn todays_type(&self, clock: &dyn Clock) -> Option<&str> {
        self.workout_for(clock.today())
    }

    /// One entry per calendar day of the month, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidMonth`] if `month` is not 1-12 or the
    /// year is out of range.
    pub fn schedule_for_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(ScheduleError::InvalidMonth { year, month })?;
        Ok(first
            .iter_days()
            .take_while(|d| d.month() == month)
            .map(|date| ScheduleEntry {
                date,
                workout_type: self.workout_for(date).map(str::to_string),
            })
            .collect())
    }
}

impl Default for Cycle {
    fn default() -> Self {
        Self::build(&[], &[])
    }
}
