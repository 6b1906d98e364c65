// src/history.rs
//! Per-machine memory of the last fully logged session.
use crate::model::{Exercise, HistoryEntry};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Machine name -> last fully logged sets.
pub type ExerciseHistory = BTreeMap<String, HistoryEntry>;

/// Records every exercise whose sets all carry weight, reps and a rest.
/// Exercises with a pending or blank value (or no sets) leave their entry
/// untouched. Returns how many entries were written.
pub fn capture(history: &mut ExerciseHistory, exercises: &[Exercise], date: NaiveDate) -> usize {
    let mut written = 0;
    for exercise in exercises {
        if exercise.sets.is_empty() || !exercise.sets.iter().all(|s| s.is_fully_logged()) {
            continue;
        }
        debug!(machine = %exercise.machine, %date, "captured exercise history");
        history.insert(
            exercise.machine.clone(),
            HistoryEntry {
                sets: exercise.sets.clone(),
                date,
            },
        );
        written += 1;
    }
    written
}

/// Copies weight, reps and rest from history into matching exercises.
/// Set `i` takes history set `i`, or the last history set when the exercise
/// has more sets than were logged. Completion flags are not touched.
pub fn prefill(exercises: &mut [Exercise], history: &ExerciseHistory) {
    for exercise in exercises {
        let Some(entry) = history.get(&exercise.machine) else {
            continue;
        };
        let Some(last) = entry.sets.last() else {
            continue;
        };
        for (idx, set) in exercise.sets.iter_mut().enumerate() {
            let source = entry.sets.get(idx).unwrap_or(last);
            set.weight = source.weight;
            set.reps = source.reps;
            set.rest.clone_from(&source.rest);
        }
    }
}
