use anyhow::{bail, Context, Result};
// Use anyhow::Result as standard Result for service layer
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// --- Declare modules ---
pub mod autosave;
pub mod catalog;
pub mod clock;
mod config;
pub mod history;
pub mod migration;
pub mod model;
pub mod preferences;
pub mod repository;
pub mod schedule;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod transfer;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util,
    load_config as load_config_util,
    parse_color,
    save_config as save_config_util,
    Config,
    ConfigError,
    StandardColor,
    StorageConfig,
    ThemeConfig,
    Units,
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use migration::{Migration, MigrationOutcome, VersionGate};
pub use model::{
    AbsExercise, Cardio, CardioType, CustomTemplatePatch, CustomWorkoutTemplate, Exercise,
    ExerciseSet, Logged, NewCustomTemplate, NewWorkout, ValidationError, Workout, WorkoutPatch,
};
pub use preferences::{PreferencesPatch, UserPreferences};
pub use repository::WorkoutRepository;
pub use schedule::{Cycle, ScheduleEntry};
pub use stats::{CompletionCount, Period, ProgressSummary};
pub use storage::{
    get_db_path as get_db_path_util, KeyValueStore, Notice, NoticeBoard, SqliteStore,
    StorageAdapter, StorageUsage, StoreError,
};
pub use streak::StreakDays;
pub use transfer::{ExportBundle, ExportFormat, TransferError};

/// Values typed for one set. `None` leaves the stored value as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetEntry {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    /// Digits or `M:SS`; normalised to `M:SS`.
    pub rest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardioEntry {
    pub kind: Option<CardioType>,
    pub duration: Option<String>,
    pub distance: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakInfo {
    pub current: u32,
    pub longest: u32,
    pub streak_days: StreakDays,
}

pub struct AppService {
    pub config: Config,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub migration: MigrationOutcome,
    repo: WorkoutRepository,
    notices: NoticeBoard,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination or config loading fails.
    /// A database that cannot be opened is not an error: the service runs
    /// from memory and reports [`Notice::StorageUnavailable`].
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = storage::get_db_path().context("Failed to determine database path")?;
        let backend: Box<dyn KeyValueStore> = match SqliteStore::open(&db_path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!(path = %db_path.display(), error = %e, "could not open database");
                Box::new(storage::UnavailableStore::new(e.to_string()))
            }
        };

        Self::with_backend(config, backend, Box::new(SystemClock), config_path, db_path)
    }

    /// A service over a fresh in-memory store. Nothing touches the filesystem.
    /// # Errors
    /// Returns an error if the storage settings in `config` are invalid.
    pub fn in_memory(config: Config, clock: Box<dyn Clock>) -> Result<Self> {
        Self::with_backend(
            config,
            Box::new(storage::MemoryStore::new()),
            clock,
            PathBuf::new(),
            PathBuf::from(":memory:"),
        )
    }

    /// # Errors
    /// Returns an error if the storage settings in `config` are invalid.
    pub fn with_backend(
        config: Config,
        backend: Box<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
        config_path: PathBuf,
        db_path: PathBuf,
    ) -> Result<Self> {
        let policy = config
            .storage
            .quota_policy()
            .context("Invalid storage settings in config")?;
        let notices = NoticeBoard::new();
        let mut store = StorageAdapter::new(
            backend,
            config.storage.namespace.clone(),
            policy,
            Box::new(notices.clone()),
        );
        let migration = VersionGate::new(config.storage.schema_version.clone()).run(&mut store);
        if let MigrationOutcome::Wiped { ref from } = migration {
            info!(?from, "stored data was from another schema version and has been cleared");
        }

        Ok(Self {
            config,
            db_path,
            config_path,
            migration,
            repo: WorkoutRepository::new(store, clock),
            notices,
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save_config(&self.config_path, &self.config)
    }

    /// Sets the header color used for tables.
    /// # Errors
    /// Returns `ConfigError::InvalidColor` for unknown names, or a save error.
    pub fn set_header_color(&mut self, color: &str) -> Result<(), ConfigError> {
        let parsed = parse_color(color)?;
        self.config.theme.header_color = format!("{parsed:?}");
        self.save_config()
    }

    pub fn set_units(&mut self, units: Units) -> Result<(), ConfigError> {
        self.config.units = units;
        self.save_config()
    }

    pub fn repository(&mut self) -> &mut WorkoutRepository {
        &mut self.repo
    }

    pub fn today(&self) -> NaiveDate {
        self.repo.clock().today()
    }

    /// Storage notices raised since the last call.
    pub fn take_notices(&self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub const fn is_storage_degraded(&self) -> bool {
        self.repo.store().is_degraded()
    }

    pub fn storage_usage(&mut self) -> StorageUsage {
        self.repo.store_mut().usage()
    }

    /// A debouncer with the configured auto-save delay.
    pub fn save_debouncer(&self) -> autosave::SaveDebouncer {
        autosave::SaveDebouncer::new(self.config.autosave_delay_ms)
    }

    // --- Workouts ---

    /// Builds a workout for `date` from a custom template (checked first) or
    /// a preset, carries forward the last logged sets and stores it.
    /// # Errors
    /// `ValidationError::UnknownTemplate` if no template has that name.
    pub fn create_workout_from_template(&mut self, date: NaiveDate, name: &str) -> Result<Workout> {
        let custom = self
            .repo
            .custom_templates()
            .into_iter()
            .find(|t| t.name == name);
        let mut new = match (custom, catalog::template(name)) {
            (Some(custom), _) => custom.instantiate(date),
            (None, Some(preset)) => preset.instantiate(date),
            (None, None) => return Err(ValidationError::UnknownTemplate(name.to_string()).into()),
        };
        let history = self.repo.exercise_history();
        history::prefill(&mut new.exercises, &history);
        Ok(self.repo.create(new))
    }

    /// The workout already stored for `date`, or a new one. Without a
    /// template name the scheduled type for that date is used.
    /// # Errors
    /// Fails if nothing is scheduled and no template was given, or the
    /// template is unknown.
    pub fn start_workout(&mut self, date: NaiveDate, template: Option<&str>) -> Result<Workout> {
        if let Some(existing) = self.repo.get_by_date(date) {
            return Ok(existing);
        }
        let name = match template {
            Some(name) => name.to_string(),
            None => match self.scheduled_type(date) {
                Some(name) => name,
                None => bail!("No workout is scheduled for {date}. Pass a template name."),
            },
        };
        self.create_workout_from_template(date, &name)
    }

    pub fn workout_by_date(&mut self, date: NaiveDate) -> Option<Workout> {
        self.repo.get_by_date(date)
    }

    pub fn workout_by_id(&mut self, id: i64) -> Option<Workout> {
        self.repo.get_by_id(id)
    }

    /// All workouts ascending by date, optionally limited to a range.
    pub fn list_workouts(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Vec<Workout> {
        self.repo
            .get_by_range(from.unwrap_or(NaiveDate::MIN), to.unwrap_or(NaiveDate::MAX))
    }

    pub fn delete_workout(&mut self, id: i64) -> bool {
        self.repo.delete(id)
    }

    /// Applies `edit` to a copy of the workout, recomputes completion and
    /// saves the editable fields. Saving exercises records history.
    fn edit_workout<F>(&mut self, id: i64, edit: F) -> Result<Workout>
    where
        F: FnOnce(&mut Workout) -> Result<(), ValidationError>,
    {
        let Some(mut workout) = self.repo.get_by_id(id) else {
            bail!("Workout with ID {id} not found.");
        };
        let was_completed = workout.completed;
        edit(&mut workout)?;
        workout.recompute_completed();
        if was_completed && !workout.completed {
            workout.duration = None;
        } else if !was_completed && workout.completed {
            workout.duration = Some(workout.estimated_duration());
        }
        self.repo
            .update(id, WorkoutPatch::session(&workout))
            .with_context(|| format!("Workout with ID {id} disappeared while saving"))
    }

    /// Enters weight, reps and rest for one set.
    /// # Errors
    /// Unknown workout, exercise or set index.
    pub fn record_set(
        &mut self,
        id: i64,
        machine: &str,
        set_index: usize,
        entry: SetEntry,
    ) -> Result<Workout> {
        self.edit_workout(id, |workout| {
            let exercise = workout.exercise_mut(machine)?;
            let count = exercise.sets.len();
            let set = exercise.sets.get_mut(set_index).ok_or_else(|| {
                ValidationError::SetIndexOutOfRange {
                    machine: machine.to_string(),
                    index: set_index,
                    count,
                }
            })?;
            if let Some(weight) = entry.weight {
                set.weight = Logged::Recorded(weight);
            }
            if let Some(reps) = entry.reps {
                set.reps = Logged::Recorded(reps);
            }
            if let Some(rest) = entry.rest {
                set.rest = if rest.contains(':') {
                    rest.trim().to_string()
                } else {
                    model::format_rest_digits(&rest)
                };
            }
            Ok(())
        })
    }

    /// Marks a set done.
    /// # Errors
    /// `ValidationError::MissingWeightOrReps` while weight or reps are pending.
    pub fn complete_set(&mut self, id: i64, machine: &str, set_index: usize) -> Result<Workout> {
        self.edit_workout(id, |workout| {
            workout.exercise_mut(machine)?.complete_set(set_index)
        })
    }

    /// # Errors
    /// Unknown workout or abs index.
    pub fn set_abs_completed(&mut self, id: i64, index: usize, completed: bool) -> Result<Workout> {
        self.edit_workout(id, |workout| {
            let count = workout.abs.len();
            let abs = workout
                .abs
                .get_mut(index)
                .ok_or(ValidationError::AbsIndexOutOfRange { index, count })?;
            abs.completed = completed;
            Ok(())
        })
    }

    /// Creates the cardio block if missing and applies the entry.
    /// # Errors
    /// Unknown workout.
    pub fn set_cardio(&mut self, id: i64, entry: CardioEntry) -> Result<Workout> {
        self.edit_workout(id, |workout| {
            let cardio = workout.cardio.get_or_insert_with(Cardio::treadmill);
            if let Some(kind) = entry.kind {
                cardio.kind = Some(kind);
            }
            if entry.duration.is_some() {
                cardio.duration = entry.duration;
            }
            if entry.distance.is_some() {
                cardio.distance = entry.distance;
            }
            if let Some(completed) = entry.completed {
                cardio.completed = completed;
            }
            Ok(())
        })
    }

    /// Completes the workout and stamps its estimated duration.
    /// # Errors
    /// `ValidationError::IncompleteWorkout` unless every part is done.
    pub fn complete_workout(&mut self, id: i64) -> Result<Workout> {
        self.edit_workout(id, Workout::complete)
    }

    pub fn exercise_history(&mut self) -> history::ExerciseHistory {
        self.repo.exercise_history()
    }

    /// Sets from the last session where every set of `machine` was logged.
    pub fn last_completed_sets(&mut self, machine: &str) -> Option<Vec<ExerciseSet>> {
        self.repo.last_completed_sets(machine)
    }

    // --- Custom templates ---

    fn validate_template_name(&mut self, name: &str, except_id: Option<i64>) -> Result<String, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTemplateName);
        }
        let lower = trimmed.to_lowercase();
        let duplicate = self
            .repo
            .custom_templates()
            .iter()
            .any(|t| Some(t.id) != except_id && t.name.to_lowercase() == lower);
        if duplicate {
            return Err(ValidationError::DuplicateTemplateName(trimmed.to_string()));
        }
        Ok(trimmed.to_string())
    }

    /// # Errors
    /// `EmptyTemplateName` or `DuplicateTemplateName` (case-insensitive).
    pub fn add_custom_template(&mut self, mut new: NewCustomTemplate) -> Result<CustomWorkoutTemplate> {
        new.name = self.validate_template_name(&new.name, None)?;
        Ok(self.repo.add_custom_template(new))
    }

    /// # Errors
    /// Name validation as for [`Self::add_custom_template`], or unknown id.
    pub fn update_custom_template(
        &mut self,
        id: i64,
        mut patch: CustomTemplatePatch,
    ) -> Result<CustomWorkoutTemplate> {
        if let Some(name) = patch.name.take() {
            patch.name = Some(self.validate_template_name(&name, Some(id))?);
        }
        self.repo
            .update_custom_template(id, patch)
            .with_context(|| format!("Custom template with ID {id} not found."))
    }

    pub fn delete_custom_template(&mut self, id: i64) -> bool {
        self.repo.delete_custom_template(id)
    }

    pub fn custom_templates(&mut self) -> Vec<CustomWorkoutTemplate> {
        self.repo.custom_templates()
    }

    /// Preset names minus the ones the user hid.
    pub fn visible_presets(&mut self) -> Vec<&'static str> {
        let hidden = self.repo.hidden_presets();
        catalog::preset_names()
            .into_iter()
            .filter(|name| !hidden.get(*name).copied().unwrap_or(false))
            .collect()
    }

    /// # Errors
    /// `ValidationError::UnknownTemplate` if `name` is not a preset.
    pub fn set_preset_hidden(&mut self, name: &str, hidden: bool) -> Result<()> {
        if catalog::template(name).is_none() {
            return Err(ValidationError::UnknownTemplate(name.to_string()).into());
        }
        self.repo.set_preset_hidden(name, hidden);
        Ok(())
    }

    pub fn preset_prompts(&mut self) -> BTreeMap<String, bool> {
        self.repo.preset_prompts()
    }

    pub fn set_preset_prompt(&mut self, name: &str, prompt: bool) {
        self.repo.set_preset_prompt(name, prompt);
    }

    // --- Schedule ---

    /// The rotation built from the saved selection and custom templates.
    pub fn cycle(&mut self) -> Cycle {
        let selection = self.repo.auto_schedule_selection();
        let custom = self.repo.custom_templates();
        Cycle::build(&selection, &custom)
    }

    pub fn scheduled_type(&mut self, date: NaiveDate) -> Option<String> {
        self.cycle().workout_for(date).map(str::to_string)
    }

    pub fn todays_type(&mut self) -> Option<String> {
        let cycle = self.cycle();
        cycle.todays_type(self.repo.clock()).map(str::to_string)
    }

    /// # Errors
    /// Invalid month.
    pub fn month_schedule(&mut self, year: i32, month: u32) -> Result<Vec<ScheduleEntry>> {
        Ok(self.cycle().schedule_for_month(year, month)?)
    }

    pub fn rotation_selection(&mut self) -> Vec<String> {
        self.repo.auto_schedule_selection()
    }

    /// Saves which workouts take part in the rotation. An empty list
    /// restores the default rotation.
    /// # Errors
    /// `ValidationError::UnknownTemplate` for a name that is neither a preset
    /// nor a custom template.
    pub fn set_rotation_selection(&mut self, names: &[String]) -> Result<()> {
        let custom = self.repo.custom_templates();
        if let Some(unknown) = names
            .iter()
            .find(|n| catalog::template(n).is_none() && !custom.iter().any(|t| &t.name == *n))
        {
            return Err(ValidationError::UnknownTemplate(unknown.clone()).into());
        }
        self.repo.set_auto_schedule_selection(names);
        Ok(())
    }

    // --- Streaks & stats ---

    pub fn streak_days(&mut self) -> StreakDays {
        self.repo.streak_days()
    }

    pub fn set_streak_days(&mut self, days: StreakDays) {
        self.repo.set_streak_days(days);
    }

    pub fn streak_info(&mut self) -> StreakInfo {
        let workouts = self.repo.all();
        let streak_days = self.repo.streak_days();
        let today = self.today();
        StreakInfo {
            current: streak::current_streak(&workouts, streak_days, today),
            longest: streak::longest_streak(&workouts, streak_days, today),
            streak_days,
        }
    }

    pub fn progress_summary(&mut self, period: Period) -> ProgressSummary {
        let workouts = self.repo.all();
        let streak_days = self.repo.streak_days();
        stats::summarize(&workouts, period, self.today(), streak_days)
    }

    pub fn month_counts(&mut self, year: i32, month: u32) -> CompletionCount {
        stats::month_counts(&self.repo.all(), year, month)
    }

    pub fn week_counts(&mut self, date: NaiveDate) -> CompletionCount {
        stats::week_counts(&self.repo.all(), date)
    }

    // --- Export / import ---

    pub fn export_bundle(&mut self) -> ExportBundle {
        ExportBundle::snapshot(&mut self.repo)
    }

    /// # Errors
    /// Serialization failure.
    pub fn export_string(&mut self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => Ok(self.export_bundle().to_json_pretty()?),
            ExportFormat::Csv => Ok(transfer::workouts_to_csv(&self.repo.all())?),
        }
    }

    /// Writes an export to `path`, or to the default file name in the
    /// current directory.
    /// # Errors
    /// Serialization or I/O failure.
    pub fn export_to_file(&mut self, format: ExportFormat, path: Option<&Path>) -> Result<PathBuf> {
        let target = path.map_or_else(
            || PathBuf::from(format.default_file_name(self.today())),
            Path::to_path_buf,
        );
        let content = self.export_string(format)?;
        fs::write(&target, content)
            .with_context(|| format!("Failed to write export to {target:?}"))?;
        info!(path = %target.display(), %format, "exported data");
        Ok(target)
    }

    /// Replaces stored data with a JSON backup. Returns the number of
    /// imported workouts.
    /// # Errors
    /// `TransferError::Json` if `raw` is not a backup; nothing is changed then.
    pub fn import_json(&mut self, raw: &str) -> Result<usize> {
        let bundle = ExportBundle::from_json(raw).context("Failed to read backup")?;
        let count = bundle.workouts.len();
        bundle.restore(&mut self.repo);
        Ok(count)
    }

    /// # Errors
    /// I/O failure or an invalid backup.
    pub fn import_from_file(&mut self, path: &Path) -> Result<usize> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read backup file {path:?}"))?;
        self.import_json(&raw)
    }

    // --- Preferences ---

    pub fn preferences(&mut self) -> UserPreferences {
        self.repo.preferences()
    }

    pub fn update_preferences(&mut self, patch: PreferencesPatch) -> UserPreferences {
        self.repo.update_preferences(patch)
    }

    /// Deletes every workout, template, history entry and setting.
    pub fn clear_all_data(&mut self) {
        warn!("clearing all stored data");
        self.repo.clear_all();
    }
}
