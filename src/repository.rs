// src/repository.rs
use crate::clock::Clock;
use crate::history::{self, ExerciseHistory};
use crate::model::{
    CustomTemplatePatch, CustomWorkoutTemplate, ExerciseSet, NewCustomTemplate, NewWorkout,
    Workout, WorkoutPatch,
};
use crate::preferences::{self, PreferencesPatch, UserPreferences};
use crate::storage::{keys, Decoded, StorageAdapter};
use crate::streak::StreakDays;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Workouts, custom templates, history and small settings, all kept as JSON
/// values in one [`StorageAdapter`]. Every call reads the current stored
/// state, so several repositories over the same backend see each other's
/// writes (last write wins).
pub struct WorkoutRepository {
    store: StorageAdapter,
    clock: Box<dyn Clock>,
}

impl WorkoutRepository {
    pub fn new(store: StorageAdapter, clock: Box<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub const fn store(&self) -> &StorageAdapter {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StorageAdapter {
        &mut self.store
    }

    fn read_or_default<T: DeserializeOwned + Default>(&mut self, key: &str) -> T {
        let decoded = self.store.read_json::<T>(key);
        if decoded.is_corrupted() {
            warn!(key, "ignoring unreadable stored value");
        }
        decoded.or_default()
    }

    // ---- Workouts ----

    pub fn all(&mut self) -> Vec<Workout> {
        self.read_or_default(keys::WORKOUTS)
    }

    fn save_workouts(&mut self, workouts: &[Workout]) {
        self.store.write_json(keys::WORKOUTS, workouts);
    }

    /// The id the next created workout will receive.
    fn next_id(&mut self, workouts: &[Workout]) -> i64 {
        let fallback = workouts.iter().map(|w| w.id).max().unwrap_or(0) + 1;
        match self.store.get(keys::CURRENT_ID) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "current id is not a number, deriving it from stored workouts");
                fallback
            }),
            None => fallback,
        }
    }

    fn set_next_id(&mut self, id: i64) {
        self.store.set(keys::CURRENT_ID, &id.to_string());
    }

    /// Stores a new workout with the next id. History pre-fill is the
    /// caller's business.
    pub fn create(&mut self, new: NewWorkout) -> Workout {
        let mut workouts = self.all();
        let id = self.next_id(&workouts);
        let now = self.clock.now();
        let workout = Workout {
            id,
            date: new.date,
            workout_type: new.workout_type,
            exercises: new.exercises,
            abs: new.abs,
            cardio: new.cardio,
            completed: new.completed,
            duration: new.duration,
            created_at: now,
            updated_at: now,
        };
        debug!(id, date = %workout.date, kind = %workout.workout_type, "creating workout");
        workouts.push(workout.clone());
        self.save_workouts(&workouts);
        self.set_next_id(id + 1);
        workout
    }

    /// First workout stored for `date`.
    pub fn get_by_date(&mut self, date: NaiveDate) -> Option<Workout> {
        self.all().into_iter().find(|w| w.date == date)
    }

    pub fn get_by_id(&mut self, id: i64) -> Option<Workout> {
        self.all().into_iter().find(|w| w.id == id)
    }

    /// Workouts with `start <= date <= end`, ascending by date.
    pub fn get_by_range(&mut self, start: NaiveDate, end: NaiveDate) -> Vec<Workout> {
        let mut workouts: Vec<Workout> = self
            .all()
            .into_iter()
            .filter(|w| w.date >= start && w.date <= end)
            .collect();
        workouts.sort_by_key(|w| w.date);
        workouts
    }

    /// Merges the patch into the stored workout. When the patch carries
    /// exercises, fully logged ones are written to the exercise history.
    pub fn update(&mut self, id: i64, patch: WorkoutPatch) -> Option<Workout> {
        let mut workouts = self.all();
        let Some(workout) = workouts.iter_mut().find(|w| w.id == id) else {
            debug!(id, "update of unknown workout ignored");
            return None;
        };
        let captures_history = patch.exercises.is_some();
        patch.apply_to(workout);
        workout.updated_at = self.clock.now();
        let updated = workout.clone();
        self.save_workouts(&workouts);

        if captures_history {
            let mut history = self.exercise_history();
            if history::capture(&mut history, &updated.exercises, updated.date) > 0 {
                self.store.write_json(keys::EXERCISE_HISTORY, &history);
            }
        }
        Some(updated)
    }

    pub fn delete(&mut self, id: i64) -> bool {
        let mut workouts = self.all();
        let before = workouts.len();
        workouts.retain(|w| w.id != id);
        if workouts.len() == before {
            return false;
        }
        self.save_workouts(&workouts);
        true
    }

    /// Replaces every workout and points the id counter past the largest
    /// imported id.
    pub fn replace_workouts(&mut self, workouts: &[Workout]) {
        let max_id = workouts.iter().map(|w| w.id).max().unwrap_or(0);
        self.save_workouts(workouts);
        self.set_next_id(max_id + 1);
    }

    // ---- Exercise history ----

    pub fn exercise_history(&mut self) -> ExerciseHistory {
        self.read_or_default(keys::EXERCISE_HISTORY)
    }

    pub fn last_completed_sets(&mut self, machine: &str) -> Option<Vec<ExerciseSet>> {
        self.exercise_history().remove(machine).map(|entry| entry.sets)
    }

    // ---- Custom templates ----

    pub fn custom_templates(&mut self) -> Vec<CustomWorkoutTemplate> {
        self.read_or_default(keys::CUSTOM_TEMPLATES)
    }

    pub fn replace_custom_templates(&mut self, templates: &[CustomWorkoutTemplate]) {
        self.store.write_json(keys::CUSTOM_TEMPLATES, templates);
    }

    pub fn add_custom_template(&mut self, new: NewCustomTemplate) -> CustomWorkoutTemplate {
        let mut templates = self.custom_templates();
        let id = templates.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let template = CustomWorkoutTemplate {
            id,
            name: new.name,
            exercises: new.exercises,
            abs: new.abs,
            include_in_auto_schedule: new.include_in_auto_schedule,
        };
        templates.push(template.clone());
        self.replace_custom_templates(&templates);
        template
    }

    pub fn update_custom_template(
        &mut self,
        id: i64,
        patch: CustomTemplatePatch,
    ) -> Option<CustomWorkoutTemplate> {
        let mut templates = self.custom_templates();
        let template = templates.iter_mut().find(|t| t.id == id)?;
        if let Some(name) = patch.name {
            template.name = name;
        }
        if let Some(exercises) = patch.exercises {
            template.exercises = exercises;
        }
        if let Some(abs) = patch.abs {
            template.abs = abs;
        }
        if let Some(include) = patch.include_in_auto_schedule {
            template.include_in_auto_schedule = include;
        }
        let updated = template.clone();
        self.replace_custom_templates(&templates);
        Some(updated)
    }

    /// Workouts created from the template keep their own copy.
    pub fn delete_custom_template(&mut self, id: i64) -> bool {
        let mut templates = self.custom_templates();
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return false;
        }
        self.replace_custom_templates(&templates);
        true
    }

    // ---- Settings ----

    /// Workout names taking part in the rotation. Empty means the default.
    pub fn auto_schedule_selection(&mut self) -> Vec<String> {
        self.read_or_default(keys::AUTO_SCHEDULE)
    }

    pub fn set_auto_schedule_selection(&mut self, names: &[String]) {
        self.store.write_json(keys::AUTO_SCHEDULE, names);
    }

    pub fn hidden_presets(&mut self) -> BTreeMap<String, bool> {
        self.read_or_default(keys::HIDDEN_PRESETS)
    }

    pub fn set_preset_hidden(&mut self, name: &str, hidden: bool) {
        let mut hidden_presets = self.hidden_presets();
        hidden_presets.insert(name.to_string(), hidden);
        self.store.write_json(keys::HIDDEN_PRESETS, &hidden_presets);
    }

    /// Presets for which the user asked to be prompted before starting.
    pub fn preset_prompts(&mut self) -> BTreeMap<String, bool> {
        self.read_or_default(keys::PRESET_PROMPTS)
    }

    pub fn set_preset_prompt(&mut self, name: &str, prompt: bool) {
        let mut prompts = self.preset_prompts();
        prompts.insert(name.to_string(), prompt);
        self.store.write_json(keys::PRESET_PROMPTS, &prompts);
    }

    /// Every weekday when nothing (or something unreadable) is stored.
    pub fn streak_days(&mut self) -> StreakDays {
        match self.store.read_json::<StreakDays>(keys::STREAK_DAYS) {
            Decoded::Value(days) => days,
            Decoded::Missing | Decoded::Corrupted { .. } => StreakDays::all(),
        }
    }

    pub fn set_streak_days(&mut self, days: StreakDays) {
        self.store.write_json(keys::STREAK_DAYS, &days);
    }

    // ---- Preferences ----

    pub fn preferences(&mut self) -> UserPreferences {
        preferences::load(&mut self.store)
    }

    pub fn update_preferences(&mut self, patch: PreferencesPatch) -> UserPreferences {
        let now = self.clock.now();
        preferences::update(&mut self.store, patch, now)
    }

    /// Removes all user data. The schema marker survives so the store is
    /// not treated as foreign on the next start.
    pub fn clear_all(&mut self) {
        for key in self.store.keys() {
            if key != keys::SCHEMA_VERSION {
                self.store.remove(&key);
            }
        }
    }
}

impl std::fmt::Debug for WorkoutRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkoutRepository")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
