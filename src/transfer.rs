// src/transfer.rs
//! Backup export (JSON, CSV) and JSON import.
use crate::model::{CustomWorkoutTemplate, Workout};
use crate::preferences::UserPreferences;
use crate::repository::WorkoutRepository;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn default_file_name(self, date: NaiveDate) -> String {
        match self {
            Self::Json => json_file_name(date),
            Self::Csv => csv_file_name(date),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Backup is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error during export/import")]
    Io(#[from] io::Error),
}

/// Everything a backup holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub workouts: Vec<Workout>,
    pub preferences: UserPreferences,
    /// Absent in backups made before custom templates existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_templates: Option<Vec<CustomWorkoutTemplate>>,
}

impl ExportBundle {
    pub fn snapshot(repo: &mut WorkoutRepository) -> Self {
        Self {
            workouts: repo.all(),
            preferences: repo.preferences(),
            custom_templates: Some(repo.custom_templates()),
        }
    }

    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, TransferError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns [`TransferError::Json`] if `raw` is not a backup.
    pub fn from_json(raw: &str) -> Result<Self, TransferError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Overwrites workouts and preferences (and custom templates, when the
    /// backup has them). Not atomic: a failure midway leaves a partial import.
    pub fn restore(self, repo: &mut WorkoutRepository) {
        info!(workouts = self.workouts.len(), "importing backup");
        repo.replace_workouts(&self.workouts);
        repo.store_mut()
            .write_json(crate::storage::keys::PREFERENCES, &self.preferences);
        if let Some(templates) = self.custom_templates {
            repo.replace_custom_templates(&templates);
        }
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: i64,
    date: NaiveDate,
    #[serde(rename = "type")]
    workout_type: &'a str,
    completed: bool,
    duration: Option<u32>,
}

/// One row per workout: `id,date,type,completed,duration`.
///
/// # Errors
///
/// Returns [`TransferError`] if writing to `writer` fails.
pub fn write_workouts_csv<W: io::Write>(writer: W, workouts: &[Workout]) -> Result<(), TransferError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for workout in workouts {
        wtr.serialize(CsvRow {
            id: workout.id,
            date: workout.date,
            workout_type: &workout.workout_type,
            completed: workout.completed,
            duration: workout.duration,
        })?;
    }
    // An empty export still gets its header.
    if workouts.is_empty() {
        wtr.write_record(["id", "date", "type", "completed", "duration"])?;
    }
    wtr.flush()?;
    Ok(())
}

/// # Errors
///
/// See [`write_workouts_csv`].
pub fn workouts_to_csv(workouts: &[Workout]) -> Result<String, TransferError> {
    let mut buf = Vec::new();
    write_workouts_csv(&mut buf, workouts)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn json_file_name(date: NaiveDate) -> String {
    format!("ironpup-data-{}.json", date.format("%Y-%m-%d"))
}

pub fn csv_file_name(date: NaiveDate) -> String {
    format!("ironpup-workouts-{}.csv", date.format("%Y-%m-%d"))
}
