// src/model.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

/// Rest used when a set is completed without one.
pub const DEFAULT_REST: &str = "1:00";

const MINUTES_PER_EXERCISE: u32 = 5;
const MINUTES_PER_ABS: u32 = 2;
const CARDIO_MINUTES: u32 = 15;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Enter weight and reps before completing the set.")]
    MissingWeightOrReps,
    #[error("Complete all exercises, abs and cardio before completing the workout.")]
    IncompleteWorkout,
    #[error("A custom workout named '{0}' already exists (case-insensitive).")]
    DuplicateTemplateName(String),
    #[error("Template name cannot be empty.")]
    EmptyTemplateName,
    #[error("Unknown workout template: '{0}'")]
    UnknownTemplate(String),
    #[error("Exercise '{0}' is not part of this workout.")]
    UnknownExercise(String),
    #[error("Set {index} does not exist ('{machine}' has {count} set(s)).")]
    SetIndexOutOfRange {
        machine: String,
        index: usize,
        count: usize,
    },
    #[error("Abs item {index} does not exist (workout has {count}).")]
    AbsIndexOutOfRange { index: usize, count: usize },
}

/// A value the user has either entered or not yet entered.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Logged<T> {
    #[default]
    Pending,
    Recorded(T),
}

impl<T> Logged<T> {
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    pub const fn as_option(&self) -> Option<&T> {
        match self {
            Self::Recorded(v) => Some(v),
            Self::Pending => None,
        }
    }
}

impl<T: Copy> Logged<T> {
    pub const fn value(&self) -> Option<T> {
        match self {
            Self::Recorded(v) => Some(*v),
            Self::Pending => None,
        }
    }
}

impl<T> From<Option<T>> for Logged<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Pending, Self::Recorded)
    }
}

impl<T: Serialize> Serialize for Logged<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_option().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Logged<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Equipment {
    #[default]
    Machine,
    Freeweight,
    Both,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Feel {
    Light,
    #[default]
    Medium,
    Hard,
    Heavy,
    #[serde(rename = "N/A")]
    #[strum(serialize = "N/A")]
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum CardioType {
    Treadmill,
    Bike,
    Elliptical,
    Rowing,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExerciseSet {
    #[serde(default)]
    pub weight: Logged<f64>,
    #[serde(default)]
    pub reps: Logged<u32>,
    #[serde(default)]
    pub rest: String,
    #[serde(default)]
    pub completed: bool,
}

impl ExerciseSet {
    pub fn new(weight: f64, reps: u32, rest: &str) -> Self {
        Self {
            weight: Logged::Recorded(weight),
            reps: Logged::Recorded(reps),
            rest: rest.to_string(),
            completed: false,
        }
    }

    /// Weight and reps are both entered.
    pub const fn is_logged(&self) -> bool {
        self.weight.is_recorded() && self.reps.is_recorded()
    }

    /// Weight, reps and a non-blank rest are all present.
    pub fn is_fully_logged(&self) -> bool {
        self.is_logged() && !self.rest.trim().is_empty()
    }

    /// Marks the set done. Rejected while weight or reps are pending; a blank
    /// rest becomes [`DEFAULT_REST`].
    pub fn mark_completed(&mut self) -> Result<(), ValidationError> {
        if !self.is_logged() {
            return Err(ValidationError::MissingWeightOrReps);
        }
        if self.rest.trim().is_empty() {
            self.rest = DEFAULT_REST.to_string();
        }
        self.completed = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightDelta {
    Up(f64),
    Down(f64),
    Same,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub machine: String,
    pub region: String,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default)]
    pub feel: Feel,
    pub sets: Vec<ExerciseSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_reps: Option<u32>,
    #[serde(default)]
    pub completed: bool,
}

impl Exercise {
    pub fn all_sets_completed(&self) -> bool {
        self.sets.iter().all(|s| s.completed)
    }

    pub fn recompute_completed(&mut self) -> bool {
        self.completed = self.all_sets_completed();
        self.completed
    }

    /// Completes one set and refreshes the exercise's own flag.
    pub fn complete_set(&mut self, index: usize) -> Result<(), ValidationError> {
        let count = self.sets.len();
        let set = self
            .sets
            .get_mut(index)
            .ok_or_else(|| ValidationError::SetIndexOutOfRange {
                machine: self.machine.clone(),
                index,
                count,
            })?;
        set.mark_completed()?;
        self.recompute_completed();
        Ok(())
    }

    /// Heaviest weight entered this session, 0 when nothing is entered.
    pub fn max_weight(&self) -> f64 {
        self.sets
            .iter()
            .filter_map(|s| s.weight.value())
            .fold(0.0, f64::max)
    }

    /// Today's heaviest set against the stored best weight.
    pub fn weight_delta(&self) -> WeightDelta {
        let difference = self.max_weight() - self.best_weight.unwrap_or(0.0);
        if difference > 0.0 {
            WeightDelta::Up(difference)
        } else if difference < 0.0 {
            WeightDelta::Down(difference.abs())
        } else {
            WeightDelta::Same
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsExercise {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl AbsExercise {
    /// What to show as the target: time wins over reps.
    pub fn target(&self) -> String {
        match (&self.time, self.reps) {
            (Some(time), _) => time.clone(),
            (None, Some(reps)) => format!("{reps} reps"),
            (None, None) => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cardio {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CardioType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Cardio {
    /// The block a preset workout starts with.
    pub fn treadmill() -> Self {
        Self {
            kind: Some(CardioType::Treadmill),
            duration: Some(String::new()),
            distance: Some(String::new()),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub workout_type: String,
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub abs: Vec<AbsExercise>,
    #[serde(default)]
    pub cardio: Option<Cardio>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub duration: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed_items: usize,
    pub total_items: usize,
    pub percentage: u32,
}

impl Workout {
    /// True iff every exercise, every abs item and the cardio block are done.
    /// A workout without cardio is never complete.
    pub fn parts_completed(&self) -> bool {
        self.exercises.iter().all(Exercise::all_sets_completed)
            && self.abs.iter().all(|a| a.completed)
            && self.cardio.as_ref().is_some_and(|c| c.completed)
    }

    pub fn recompute_completed(&mut self) -> bool {
        for exercise in &mut self.exercises {
            exercise.recompute_completed();
        }
        self.completed = self.parts_completed();
        self.completed
    }

    /// Fixed heuristic, not measured time.
    #[allow(clippy::cast_possible_truncation)]
    pub fn estimated_duration(&self) -> u32 {
        MINUTES_PER_EXERCISE * self.exercises.len() as u32
            + MINUTES_PER_ABS * self.abs.len() as u32
            + CARDIO_MINUTES
    }

    /// Marks the whole workout complete and stamps the estimated duration.
    pub fn complete(&mut self) -> Result<(), ValidationError> {
        if !self.parts_completed() {
            return Err(ValidationError::IncompleteWorkout);
        }
        self.completed = true;
        self.duration = Some(self.estimated_duration());
        Ok(())
    }

    pub fn exercise_mut(&mut self, machine: &str) -> Result<&mut Exercise, ValidationError> {
        self.exercises
            .iter_mut()
            .find(|e| e.machine == machine)
            .ok_or_else(|| ValidationError::UnknownExercise(machine.to_string()))
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn progress(&self) -> Progress {
        let done_exercises = self.exercises.iter().filter(|e| e.completed).count();
        let done_abs = self.abs.iter().filter(|a| a.completed).count();
        let done_cardio = usize::from(self.cardio.as_ref().is_some_and(|c| c.completed));
        // cardio always counts as one item
        let total_items = self.exercises.len() + self.abs.len() + 1;
        let completed_items = done_exercises + done_abs + done_cardio;
        Progress {
            completed_items,
            total_items,
            percentage: ((completed_items as f64 / total_items as f64) * 100.0).round() as u32,
        }
    }
}

/// Everything about a workout the caller chooses; id and timestamps are
/// assigned by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub workout_type: String,
    pub exercises: Vec<Exercise>,
    pub abs: Vec<AbsExercise>,
    pub cardio: Option<Cardio>,
    pub completed: bool,
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkoutPatch {
    pub date: Option<NaiveDate>,
    pub workout_type: Option<String>,
    pub exercises: Option<Vec<Exercise>>,
    pub abs: Option<Vec<AbsExercise>>,
    pub cardio: Option<Option<Cardio>>,
    pub completed: Option<bool>,
    pub duration: Option<Option<u32>>,
}

impl WorkoutPatch {
    /// The fields an editing session saves: everything the user can touch.
    pub fn session(workout: &Workout) -> Self {
        Self {
            exercises: Some(workout.exercises.clone()),
            abs: Some(workout.abs.clone()),
            cardio: Some(workout.cardio.clone()),
            completed: Some(workout.completed),
            duration: Some(workout.duration),
            ..Default::default()
        }
    }

    pub fn apply_to(self, workout: &mut Workout) {
        if let Some(date) = self.date {
            workout.date = date;
        }
        if let Some(workout_type) = self.workout_type {
            workout.workout_type = workout_type;
        }
        if let Some(exercises) = self.exercises {
            workout.exercises = exercises;
        }
        if let Some(abs) = self.abs {
            workout.abs = abs;
        }
        if let Some(cardio) = self.cardio {
            workout.cardio = cardio;
        }
        if let Some(completed) = self.completed {
            workout.completed = completed;
        }
        if let Some(duration) = self.duration {
            workout.duration = duration;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomWorkoutTemplate {
    pub id: i64,
    pub name: String,
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub abs: Vec<AbsExercise>,
    #[serde(default)]
    pub include_in_auto_schedule: bool,
}

impl CustomWorkoutTemplate {
    /// Fresh exercises and abs for a new workout, every flag cleared.
    pub fn instantiate(&self, date: NaiveDate) -> NewWorkout {
        NewWorkout {
            date,
            workout_type: self.name.clone(),
            exercises: reset_exercises(&self.exercises),
            abs: reset_abs(&self.abs),
            cardio: Some(Cardio::default()),
            completed: false,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomTemplate {
    pub name: String,
    pub exercises: Vec<Exercise>,
    pub abs: Vec<AbsExercise>,
    pub include_in_auto_schedule: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomTemplatePatch {
    pub name: Option<String>,
    pub exercises: Option<Vec<Exercise>>,
    pub abs: Option<Vec<AbsExercise>>,
    pub include_in_auto_schedule: Option<bool>,
}

/// The last fully logged session of one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sets: Vec<ExerciseSet>,
    pub date: NaiveDate,
}

pub(crate) fn reset_exercises(exercises: &[Exercise]) -> Vec<Exercise> {
    exercises
        .iter()
        .cloned()
        .map(|mut e| {
            e.completed = false;
            for set in &mut e.sets {
                set.completed = false;
            }
            e
        })
        .collect()
}

pub(crate) fn reset_abs(abs: &[AbsExercise]) -> Vec<AbsExercise> {
    abs.iter()
        .cloned()
        .map(|mut a| {
            a.completed = false;
            a
        })
        .collect()
}

/// Formats typed rest digits as `M:SS` ("130" -> "1:30", "5" -> "0:05").
/// Non-digits are ignored.
pub fn format_rest_digits(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => String::new(),
        1 | 2 => format!("0:{digits:0>2}"),
        n => {
            let (minutes, seconds) = digits.split_at(n - 2);
            let minutes: u64 = minutes.parse().unwrap_or(0);
            format!("{minutes}:{seconds}")
        }
    }
}

/// Parses "MM:SS" or plain minutes into fractional minutes.
pub fn minutes_from_duration(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u32 = minutes.trim().parse().ok()?;
            let seconds: u32 = seconds.trim().parse().ok()?;
            Some(f64::from(minutes) + f64::from(seconds) / 60.0)
        }
        None => trimmed.parse::<f64>().ok().filter(|m| m.is_finite() && *m >= 0.0),
    }
}
