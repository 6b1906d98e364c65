use anyhow::Result;
use chrono::{NaiveDate, Weekday};
use ironpup_lib::model::{Equipment, Feel};
use ironpup_lib::storage::{keys, Decoded, MemoryStore, QuotaPolicy};
use ironpup_lib::{
    AbsExercise, AppService, Cardio, CardioEntry, Config, CustomTemplatePatch, Exercise, ExerciseSet,
    FixedClock, KeyValueStore, Logged, MigrationOutcome, NewCustomTemplate, NewWorkout, Notice,
    NoticeBoard, Period, PreferencesPatch, SetEntry, SqliteStore, StorageAdapter, StoreError,
    StreakDays, ValidationError, Workout,
};
use std::path::PathBuf;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// Helper function to create a test service with an in-memory store
fn create_test_service() -> Result<AppService> {
    create_test_service_on(date(2024, 1, 8))
}

fn create_test_service_on(today: NaiveDate) -> Result<AppService> {
    AppService::in_memory(Config::default(), Box::new(FixedClock::on_date(today)))
}

fn pending_exercise(machine: &str, sets: usize) -> Exercise {
    Exercise {
        code: None,
        machine: machine.to_string(),
        region: "Chest".to_string(),
        equipment: Equipment::Freeweight,
        feel: Feel::Medium,
        sets: vec![ExerciseSet::default(); sets],
        best_weight: None,
        best_reps: None,
        completed: false,
    }
}

fn logged_exercise(machine: &str, weights: &[f64]) -> Exercise {
    Exercise {
        sets: weights.iter().map(|w| ExerciseSet::new(*w, 8, "1:00")).collect(),
        ..pending_exercise(machine, 0)
    }
}

fn add_bench_template(service: &mut AppService) -> Result<i64> {
    let template = service.add_custom_template(NewCustomTemplate {
        name: "Bench Only".to_string(),
        exercises: vec![pending_exercise("Bench Press", 1)],
        abs: vec![AbsExercise {
            name: "Plank".to_string(),
            reps: None,
            time: Some("1:00".to_string()),
            completed: false,
        }],
        include_in_auto_schedule: false,
    })?;
    Ok(template.id)
}

fn plain_workout(day: NaiveDate, kind: &str, completed: bool) -> NewWorkout {
    NewWorkout {
        date: day,
        workout_type: kind.to_string(),
        exercises: vec![],
        abs: vec![],
        cardio: None,
        completed,
        duration: None,
    }
}

fn validation_error(err: &anyhow::Error) -> Option<&ValidationError> {
    err.downcast_ref::<ValidationError>()
}

// --- Backends used to simulate storage failures ---

/// Reads work, every write fails.
struct ReadOnlyStore(MemoryStore);

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.0.get(key)
    }
    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only".to_string()))
    }
    fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read-only".to_string()))
    }
    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.0.keys()
    }
}

/// Refuses writes that would push the total size over `cap` bytes.
struct CappedStore {
    inner: MemoryStore,
    cap: usize,
}

impl KeyValueStore for CappedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut total = key.len() + value.len();
        for other in self.inner.keys()? {
            if other != key {
                total += other.len() + self.inner.get(&other)?.map_or(0, |v| v.len());
            }
        }
        if total > self.cap {
            return Err(StoreError::QuotaExceeded(key.to_string()));
        }
        self.inner.set(key, value)
    }
    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.keys()
    }
}

fn padded_workouts_json(dates: &[&str]) -> String {
    let pad = "x".repeat(120);
    let items: Vec<serde_json::Value> = dates
        .iter()
        .map(|d| serde_json::json!({ "date": d, "pad": pad }))
        .collect();
    serde_json::to_string(&items).unwrap()
}

fn stored_dates(store: &mut StorageAdapter) -> Vec<String> {
    let items: Vec<serde_json::Value> = store.read_json(keys::WORKOUTS).or_default();
    items
        .iter()
        .filter_map(|v| v.get("date").and_then(|d| d.as_str()).map(str::to_string))
        .collect()
}

fn temp_db_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ironpup-test-{}-{name}.sqlite", std::process::id()))
}

// --- Schedule ---

#[test]
fn test_schedule_is_deterministic() -> Result<()> {
    let mut first = create_test_service()?;
    let mut second = create_test_service_on(date(2030, 6, 1))?;

    for day in date(2024, 1, 1).iter_days().take(60) {
        assert_eq!(first.scheduled_type(day), second.scheduled_type(day));
    }
    assert_eq!(first.scheduled_type(date(2024, 1, 1)).as_deref(), Some("Back & Biceps"));
    assert_eq!(first.scheduled_type(date(1970, 1, 1)).as_deref(), Some("Chest Day"));
    // 2024-01-08 is index 4 of the rotation
    assert_eq!(first.todays_type().as_deref(), Some("Chest & Shoulders"));
    Ok(())
}

#[test]
fn test_month_schedule_covers_every_day() -> Result<()> {
    let mut service = create_test_service()?;
    for (year, month, days) in [(2024, 2, 29), (2023, 2, 28), (2024, 4, 30), (2024, 12, 31)] {
        let entries = service.month_schedule(year, month)?;
        assert_eq!(entries.len(), days);
        assert_eq!(entries[0].date, date(year, month, 1));
        for pair in entries.windows(2) {
            assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date));
        }
        assert!(entries.iter().all(|e| e.workout_type.is_some()));
    }
    assert!(service.month_schedule(2024, 0).is_err());
    Ok(())
}

#[test]
fn test_rotation_selection_and_custom_templates() -> Result<()> {
    let mut service = create_test_service()?;
    service.add_custom_template(NewCustomTemplate {
        name: "Arms".to_string(),
        exercises: vec![pending_exercise("Preacher Curl", 2)],
        abs: vec![],
        include_in_auto_schedule: true,
    })?;
    assert_eq!(service.cycle().len(), 15);

    service.set_rotation_selection(&["Leg Day".to_string()])?;
    assert_eq!(service.cycle().entries(), ["Leg Day", "Leg Day"]);
    assert_eq!(service.scheduled_type(date(2024, 3, 3)).as_deref(), Some("Leg Day"));

    let err = service
        .set_rotation_selection(&["Cardio Only".to_string()])
        .unwrap_err();
    assert_eq!(
        validation_error(&err),
        Some(&ValidationError::UnknownTemplate("Cardio Only".to_string()))
    );

    service.set_rotation_selection(&[])?;
    assert_eq!(service.cycle().len(), 15);
    Ok(())
}

// --- Workouts ---

#[test]
fn test_workout_completion_invariant() -> Result<()> {
    let mut service = create_test_service()?;
    let template_id = add_bench_template(&mut service)?;
    assert_eq!(template_id, 1);
    let base = service.create_workout_from_template(date(2024, 1, 8), "Bench Only")?;

    for mask in 0..8u8 {
        let mut workout: Workout = base.clone();
        let exercise_done = mask & 1 != 0;
        let abs_done = mask & 2 != 0;
        let cardio_done = mask & 4 != 0;
        workout.exercises[0].sets[0] = ExerciseSet {
            completed: exercise_done,
            ..ExerciseSet::new(100.0, 8, "1:00")
        };
        workout.abs[0].completed = abs_done;
        workout.cardio.as_mut().unwrap().completed = cardio_done;
        assert_eq!(
            workout.recompute_completed(),
            exercise_done && abs_done && cardio_done,
            "mask {mask:03b}"
        );
    }

    let mut no_cardio = base;
    no_cardio.cardio = None;
    no_cardio.abs.clear();
    no_cardio.exercises.clear();
    assert!(!no_cardio.recompute_completed());
    Ok(())
}

#[test]
fn test_set_completion_requires_weight_and_reps() -> Result<()> {
    let mut service = create_test_service()?;
    add_bench_template(&mut service)?;
    let workout = service.create_workout_from_template(date(2024, 1, 8), "Bench Only")?;

    let err = service.complete_set(workout.id, "Bench Press", 0).unwrap_err();
    assert_eq!(validation_error(&err), Some(&ValidationError::MissingWeightOrReps));
    let stored = service.workout_by_id(workout.id).unwrap();
    assert!(!stored.exercises[0].sets[0].completed);

    service.record_set(
        workout.id,
        "Bench Press",
        0,
        SetEntry { weight: Some(100.0), ..Default::default() },
    )?;
    let err = service.complete_set(workout.id, "Bench Press", 0).unwrap_err();
    assert_eq!(validation_error(&err), Some(&ValidationError::MissingWeightOrReps));

    service.record_set(
        workout.id,
        "Bench Press",
        0,
        SetEntry { reps: Some(8), ..Default::default() },
    )?;
    let updated = service.complete_set(workout.id, "Bench Press", 0)?;
    let set = &updated.exercises[0].sets[0];
    assert!(set.completed);
    assert_eq!(set.rest, "1:00");
    assert!(updated.exercises[0].completed);

    let err = service.complete_set(workout.id, "Bench Press", 3).unwrap_err();
    assert!(matches!(
        validation_error(&err),
        Some(ValidationError::SetIndexOutOfRange { index: 3, count: 1, .. })
    ));
    Ok(())
}

#[test]
fn test_rest_digits_are_formatted_when_logged() -> Result<()> {
    let mut service = create_test_service()?;
    add_bench_template(&mut service)?;
    let workout = service.create_workout_from_template(date(2024, 1, 8), "Bench Only")?;
    let updated = service.record_set(
        workout.id,
        "Bench Press",
        0,
        SetEntry { rest: Some("130".to_string()), ..Default::default() },
    )?;
    assert_eq!(updated.exercises[0].sets[0].rest, "1:30");
    Ok(())
}

#[test]
fn test_complete_workout_sets_estimated_duration() -> Result<()> {
    let mut service = create_test_service()?;
    add_bench_template(&mut service)?;
    let workout = service.create_workout_from_template(date(2024, 1, 8), "Bench Only")?;
    let id = workout.id;

    service.record_set(
        id,
        "Bench Press",
        0,
        SetEntry { weight: Some(100.0), reps: Some(8), rest: None },
    )?;
    service.complete_set(id, "Bench Press", 0)?;
    service.set_abs_completed(id, 0, true)?;

    let err = service.complete_workout(id).unwrap_err();
    assert_eq!(validation_error(&err), Some(&ValidationError::IncompleteWorkout));

    let updated = service.set_cardio(
        id,
        CardioEntry {
            duration: Some("20:00".to_string()),
            completed: Some(true),
            ..Default::default()
        },
    )?;
    assert!(updated.completed);
    assert_eq!(updated.duration, Some(22));

    let done = service.complete_workout(id)?;
    assert!(done.completed);
    // 5 per exercise + 2 per abs item + 15 for cardio
    assert_eq!(done.duration, Some(22));

    // Undoing a part clears completion again
    let reopened = service.set_abs_completed(id, 0, false)?;
    assert!(!reopened.completed);
    assert_eq!(reopened.duration, None);
    Ok(())
}

#[test]
fn test_finishing_last_part_stamps_duration() -> Result<()> {
    let mut service = create_test_service()?;
    let workout = service.create_workout_from_template(date(2024, 1, 8), "Leg Day")?;
    let id = workout.id;
    for exercise in &workout.exercises {
        for set in 0..exercise.sets.len() {
            service.complete_set(id, &exercise.machine, set)?;
        }
    }
    for item in 0..workout.abs.len() {
        service.set_abs_completed(id, item, true)?;
    }
    let finished = service.set_cardio(
        id,
        CardioEntry { completed: Some(true), ..Default::default() },
    )?;

    // 7 exercises, 4 abs items, cardio
    assert!(finished.completed);
    assert_eq!(finished.duration, Some(58));
    assert_eq!(service.workout_by_date(date(2024, 1, 8)), Some(finished));

    let csv = service.export_string(ironpup_lib::ExportFormat::Csv)?;
    assert_eq!(csv.lines().nth(1), Some("1,2024-01-08,Leg Day,true,58"));
    assert_eq!(service.progress_summary(Period::Week).average_duration, 58);
    Ok(())
}

#[test]
fn test_unknown_template_is_rejected() -> Result<()> {
    let mut service = create_test_service()?;
    let err = service
        .create_workout_from_template(date(2024, 1, 8), "Yoga")
        .unwrap_err();
    assert_eq!(
        validation_error(&err),
        Some(&ValidationError::UnknownTemplate("Yoga".to_string()))
    );
    assert!(service.list_workouts(None, None).is_empty());
    Ok(())
}

#[test]
fn test_start_workout_uses_schedule_and_resumes() -> Result<()> {
    let mut service = create_test_service()?;
    let started = service.start_workout(date(2024, 1, 4), None)?;
    assert_eq!(started.workout_type, "Chest Day");
    assert_eq!(started.exercises.len(), 7);
    assert!(started.exercises.iter().all(|e| !e.completed));

    let resumed = service.start_workout(date(2024, 1, 4), Some("Leg Day"))?;
    assert_eq!(resumed.id, started.id);
    assert_eq!(service.list_workouts(None, None).len(), 1);
    Ok(())
}

#[test]
fn test_ids_are_monotonic_and_rebased_after_import() -> Result<()> {
    let mut service = create_test_service()?;
    let repo = service.repository();
    let a = repo.create(plain_workout(date(2024, 1, 1), "Chest Day", false));
    let b = repo.create(plain_workout(date(2024, 1, 2), "Leg Day", false));
    let c = repo.create(plain_workout(date(2024, 1, 3), "Leg Day", false));
    assert_eq!((a.id, b.id, c.id), (1, 2, 3));

    assert!(repo.delete(c.id));
    assert!(!repo.delete(c.id));
    let d = repo.create(plain_workout(date(2024, 1, 4), "Leg Day", false));
    assert_eq!(d.id, 4);

    let mut bundle = service.export_bundle();
    bundle.workouts[0].id = 10;
    bundle.workouts.truncate(2);
    service.import_json(&bundle.to_json_pretty()?)?;
    let next = service
        .repository()
        .create(plain_workout(date(2024, 1, 5), "Chest Day", false));
    assert_eq!(next.id, 11);

    bundle.workouts.clear();
    service.import_json(&bundle.to_json_pretty()?)?;
    let first = service
        .repository()
        .create(plain_workout(date(2024, 1, 6), "Chest Day", false));
    assert_eq!(first.id, 1);
    Ok(())
}

#[test]
fn test_get_by_range_is_inclusive_and_sorted() -> Result<()> {
    let mut service = create_test_service()?;
    let repo = service.repository();
    repo.create(plain_workout(date(2024, 1, 5), "Leg Day", false));
    repo.create(plain_workout(date(2024, 1, 1), "Chest Day", false));
    repo.create(plain_workout(date(2024, 1, 3), "Back & Biceps", false));
    repo.create(plain_workout(date(2024, 1, 9), "Leg Day", false));

    let range = repo.get_by_range(date(2024, 1, 1), date(2024, 1, 5));
    let dates: Vec<NaiveDate> = range.iter().map(|w| w.date).collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 3), date(2024, 1, 5)]);
    assert_eq!(repo.get_by_date(date(2024, 1, 3)).unwrap().workout_type, "Back & Biceps");
    assert!(repo.get_by_date(date(2024, 1, 2)).is_none());
    assert!(repo.update(99, Default::default()).is_none());
    Ok(())
}

// --- History ---

#[test]
fn test_history_prefills_next_session() -> Result<()> {
    let mut service = create_test_service()?;
    add_bench_template(&mut service)?;
    let first = service.create_workout_from_template(date(2024, 1, 1), "Bench Only")?;
    service.record_set(
        first.id,
        "Bench Press",
        0,
        SetEntry {
            weight: Some(100.0),
            reps: Some(8),
            rest: Some("1:00".to_string()),
        },
    )?;

    let history = service.exercise_history();
    let entry = history.get("Bench Press").expect("history captured");
    assert_eq!(entry.date, date(2024, 1, 1));
    assert_eq!(entry.sets.len(), 1);

    let next = service.create_workout_from_template(date(2024, 1, 8), "Bench Only")?;
    let set = &next.exercises[0].sets[0];
    assert_eq!(set.weight, Logged::Recorded(100.0));
    assert_eq!(set.reps, Logged::Recorded(8));
    assert_eq!(set.rest, "1:00");
    assert!(!set.completed);
    assert!(!next.exercises[0].completed);
    Ok(())
}

#[test]
fn test_partially_logged_exercise_keeps_old_history() -> Result<()> {
    let mut service = create_test_service()?;
    add_bench_template(&mut service)?;
    let first = service.create_workout_from_template(date(2024, 1, 1), "Bench Only")?;
    service.record_set(
        first.id,
        "Bench Press",
        0,
        SetEntry { weight: Some(90.0), reps: Some(10), rest: Some("45".to_string()) },
    )?;

    let second = service.create_workout_from_template(date(2024, 1, 8), "Bench Only")?;
    let mut exercises = second.exercises.clone();
    exercises[0].sets[0].rest.clear();
    exercises[0].sets[0].weight = Logged::Recorded(120.0);
    service.repository().update(
        second.id,
        ironpup_lib::WorkoutPatch { exercises: Some(exercises), ..Default::default() },
    );

    let sets = service
        .last_completed_sets("Bench Press")
        .expect("history kept");
    assert_eq!(sets[0].weight, Logged::Recorded(90.0));
    assert_eq!(sets[0].rest, "0:45");
    Ok(())
}

// --- Streaks ---

#[test]
fn test_current_streak_counts_consecutive_days() -> Result<()> {
    let mut service = create_test_service_on(date(2024, 1, 3))?;
    let repo = service.repository();
    for day in 1..=3 {
        repo.create(plain_workout(date(2024, 1, day), "Chest Day", true));
    }
    assert_eq!(service.streak_info().current, 3);

    let mut broken = create_test_service_on(date(2024, 1, 3))?;
    let repo = broken.repository();
    repo.create(plain_workout(date(2024, 1, 1), "Chest Day", true));
    repo.create(plain_workout(date(2024, 1, 2), "Chest Day", false));
    repo.create(plain_workout(date(2024, 1, 3), "Chest Day", true));
    assert_eq!(broken.streak_info().current, 1);
    Ok(())
}

#[test]
fn test_weekend_gap_does_not_break_weekday_streak() -> Result<()> {
    // 2024-01-08 is a Monday
    let mut service = create_test_service_on(date(2024, 1, 8))?;
    let repo = service.repository();
    for day in [4, 5, 8] {
        repo.create(plain_workout(date(2024, 1, day), "Chest Day", true));
    }
    service.set_streak_days(StreakDays::from_weekdays([
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]));
    let info = service.streak_info();
    assert_eq!(info.current, 3);
    assert_eq!(info.longest, 3);

    service.set_streak_days(StreakDays::all());
    let info = service.streak_info();
    assert_eq!(info.current, 1);
    assert_eq!(info.longest, 2);
    Ok(())
}

#[test]
fn test_current_streak_stops_after_a_year() -> Result<()> {
    let today = date(2024, 1, 8);
    let mut service = create_test_service_on(today)?;
    let repo = service.repository();
    for back in 0..400 {
        let day = today - chrono::Days::new(back);
        repo.create(plain_workout(day, "Chest Day", true));
    }
    let info = service.streak_info();
    assert_eq!(info.current, 365);
    assert_eq!(info.longest, 400);
    Ok(())
}

#[test]
fn test_longest_streak_and_missing_streak_days() -> Result<()> {
    let mut service = create_test_service_on(date(2024, 1, 10))?;
    assert_eq!(service.streak_days(), StreakDays::all());
    let repo = service.repository();
    for day in [1, 2, 3, 4, 6, 7] {
        repo.create(plain_workout(date(2024, 1, day), "Chest Day", true));
    }
    let info = service.streak_info();
    assert_eq!(info.longest, 4);
    assert_eq!(info.current, 0);
    Ok(())
}

#[test]
fn test_future_completed_workout_anchors_current_streak() -> Result<()> {
    let mut service = create_test_service_on(date(2024, 1, 3))?;
    let repo = service.repository();
    for day in 3..=5 {
        repo.create(plain_workout(date(2024, 1, day), "Chest Day", true));
    }
    assert_eq!(service.streak_info().current, 3);
    Ok(())
}

// --- Storage ---

#[test]
fn test_failed_write_is_served_from_memory() -> Result<()> {
    let board = NoticeBoard::new();
    let mut store = StorageAdapter::new(
        Box::new(ReadOnlyStore(MemoryStore::new())),
        "t_",
        QuotaPolicy::default(),
        Box::new(board.clone()),
    );
    store.set(keys::CURRENT_ID, "5");
    assert!(store.is_degraded());
    assert_eq!(store.get(keys::CURRENT_ID).as_deref(), Some("5"));
    store.set(keys::PREFERENCES, "{}");
    store.remove(keys::CURRENT_ID);
    assert_eq!(store.get(keys::CURRENT_ID), None);

    let notices = board.drain();
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0], Notice::StorageUnavailable { .. }));
    Ok(())
}

#[test]
fn test_service_keeps_working_when_storage_fails() -> Result<()> {
    let mut service = AppService::with_backend(
        Config::default(),
        Box::new(ReadOnlyStore(MemoryStore::new())),
        Box::new(FixedClock::on_date(date(2024, 1, 4))),
        PathBuf::new(),
        PathBuf::from(":memory:"),
    )?;
    let workout = service.start_workout(date(2024, 1, 4), None)?;
    assert_eq!(service.workout_by_id(workout.id).map(|w| w.id), Some(workout.id));
    assert!(service.is_storage_degraded());

    let notices = service.take_notices();
    assert_eq!(
        notices
            .iter()
            .filter(|n| matches!(n, Notice::StorageUnavailable { .. }))
            .count(),
        1
    );
    Ok(())
}

#[test]
fn test_quota_warning_is_sent_once() -> Result<()> {
    let board = NoticeBoard::new();
    let mut store = StorageAdapter::new(
        Box::new(MemoryStore::new()),
        "t_",
        QuotaPolicy { limit_bytes: 1000, warn_ratio: 0.5 },
        Box::new(board.clone()),
    );
    store.set(keys::PREFERENCES, &"x".repeat(100));
    assert!(board.is_empty());

    store.set(keys::PREFERENCES, &"x".repeat(600));
    store.set(keys::PREFERENCES, &"x".repeat(650));
    let notices = board.drain();
    assert_eq!(
        notices,
        vec![Notice::QuotaWarning { used_bytes: 613, limit_bytes: 1000 }]
    );
    assert_eq!(store.usage().used_bytes, 663);
    Ok(())
}

#[test]
fn test_eviction_removes_oldest_workouts_first() -> Result<()> {
    let board = NoticeBoard::new();
    let mut store = StorageAdapter::new(
        Box::new(MemoryStore::new()),
        "t_",
        QuotaPolicy { limit_bytes: 400, warn_ratio: 0.5 },
        Box::new(board.clone()),
    );
    let raw = padded_workouts_json(&["2024-01-03", "2024-01-01", "2024-01-02"]);
    store.set(keys::WORKOUTS, &raw);

    assert_eq!(stored_dates(&mut store), vec!["2024-01-03".to_string()]);
    let notices = board.drain();
    assert!(matches!(notices[0], Notice::QuotaWarning { .. }));
    assert_eq!(notices[1], Notice::DataEvicted { removed: 2 });
    assert!(store.usage().used_bytes < 200);
    Ok(())
}

#[test]
fn test_quota_exceeded_write_is_retried_after_eviction() -> Result<()> {
    let board = NoticeBoard::new();
    let mut store = StorageAdapter::new(
        Box::new(CappedStore { inner: MemoryStore::new(), cap: 600 }),
        "t_",
        QuotaPolicy { limit_bytes: 1000, warn_ratio: 0.5 },
        Box::new(board.clone()),
    );
    store.set(
        keys::WORKOUTS,
        &padded_workouts_json(&["2024-01-02", "2024-01-03", "2024-01-01"]),
    );
    assert!(board.is_empty());

    let prefs = "y".repeat(200);
    store.set(keys::PREFERENCES, &prefs);

    assert!(!store.is_degraded());
    assert_eq!(store.get(keys::PREFERENCES), Some(prefs));
    assert_eq!(stored_dates(&mut store), vec!["2024-01-03".to_string()]);
    assert_eq!(board.drain(), vec![Notice::DataEvicted { removed: 2 }]);
    Ok(())
}

#[test]
fn test_corrupted_values_are_detected_and_ignored() -> Result<()> {
    let mut service = create_test_service()?;
    service
        .repository()
        .store_mut()
        .set(keys::WORKOUTS, "{not valid json");

    let decoded = service
        .repository()
        .store_mut()
        .read_json::<Vec<Workout>>(keys::WORKOUTS);
    assert!(decoded.is_corrupted());
    assert!(matches!(decoded, Decoded::Corrupted { ref key, .. } if key == keys::WORKOUTS));
    assert!(service.list_workouts(None, None).is_empty());
    assert_eq!(service.streak_info().current, 0);

    service.repository().store_mut().set(keys::STREAK_DAYS, "oops");
    assert_eq!(service.streak_days(), StreakDays::all());
    Ok(())
}

#[test]
fn test_namespaces_are_isolated() -> Result<()> {
    let mut store = StorageAdapter::in_memory("a_");
    store.set("k", "1");
    assert_eq!(store.keys(), vec!["k".to_string()]);
    assert_eq!(store.namespace(), "a_");
    store.clear_namespace();
    assert!(store.keys().is_empty());
    Ok(())
}

#[test]
fn test_sqlite_store_roundtrip() -> Result<()> {
    let mut store = SqliteStore::open_in_memory()?;
    store.set("b", "2")?;
    store.set("a", "1")?;
    store.set("a", "3")?;
    assert_eq!(store.get("a")?.as_deref(), Some("3"));
    assert_eq!(store.keys()?, vec!["a".to_string(), "b".to_string()]);
    store.remove("a")?;
    assert_eq!(store.get("a")?, None);
    Ok(())
}

#[test]
fn test_version_gate_wipes_old_data_on_disk() -> Result<()> {
    let path = temp_db_path("version-gate");
    let _ = std::fs::remove_file(&path);
    let clock = FixedClock::on_date(date(2024, 1, 4));

    {
        let mut service = AppService::with_backend(
            Config::default(),
            Box::new(SqliteStore::open(&path)?),
            Box::new(clock),
            PathBuf::new(),
            path.clone(),
        )?;
        assert_eq!(service.migration, MigrationOutcome::Initialized);
        service.start_workout(date(2024, 1, 4), None)?;
    }
    {
        let mut service = AppService::with_backend(
            Config::default(),
            Box::new(SqliteStore::open(&path)?),
            Box::new(clock),
            PathBuf::new(),
            path.clone(),
        )?;
        assert_eq!(service.migration, MigrationOutcome::UpToDate);
        assert_eq!(service.list_workouts(None, None).len(), 1);
    }

    let mut config = Config::default();
    config.storage.schema_version = "2".to_string();
    let mut service = AppService::with_backend(
        config,
        Box::new(SqliteStore::open(&path)?),
        Box::new(clock),
        PathBuf::new(),
        path.clone(),
    )?;
    assert_eq!(
        service.migration,
        MigrationOutcome::Wiped { from: Some("1".to_string()) }
    );
    assert!(service.list_workouts(None, None).is_empty());

    drop(service);
    std::fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn test_repositories_share_a_backend() -> Result<()> {
    let path = temp_db_path("shared");
    let _ = std::fs::remove_file(&path);
    let clock = FixedClock::on_date(date(2024, 1, 4));

    let mut writer = AppService::with_backend(
        Config::default(),
        Box::new(SqliteStore::open(&path)?),
        Box::new(clock),
        PathBuf::new(),
        path.clone(),
    )?;
    let mut reader = AppService::with_backend(
        Config::default(),
        Box::new(SqliteStore::open(&path)?),
        Box::new(clock),
        PathBuf::new(),
        path.clone(),
    )?;
    let created = writer.start_workout(date(2024, 1, 4), None)?;
    assert_eq!(reader.workout_by_id(created.id).map(|w| w.workout_type), Some("Chest Day".to_string()));

    drop(writer);
    drop(reader);
    std::fs::remove_file(&path)?;
    Ok(())
}

// --- Custom templates ---

#[test]
fn test_custom_template_names_are_unique_case_insensitively() -> Result<()> {
    let mut service = create_test_service()?;
    let arms = service.add_custom_template(NewCustomTemplate {
        name: "Arms".to_string(),
        exercises: vec![pending_exercise("Preacher Curl", 2)],
        abs: vec![],
        include_in_auto_schedule: false,
    })?;
    let legs = service.add_custom_template(NewCustomTemplate {
        name: "  Legs ".to_string(),
        exercises: vec![],
        abs: vec![],
        include_in_auto_schedule: false,
    })?;
    assert_eq!(legs.name, "Legs");
    assert_eq!(legs.id, arms.id + 1);

    let dup = service
        .add_custom_template(NewCustomTemplate {
            name: " arms ".to_string(),
            exercises: vec![],
            abs: vec![],
            include_in_auto_schedule: false,
        })
        .unwrap_err();
    assert_eq!(
        validation_error(&dup),
        Some(&ValidationError::DuplicateTemplateName("arms".to_string()))
    );

    let empty = service
        .add_custom_template(NewCustomTemplate {
            name: "   ".to_string(),
            exercises: vec![],
            abs: vec![],
            include_in_auto_schedule: false,
        })
        .unwrap_err();
    assert_eq!(validation_error(&empty), Some(&ValidationError::EmptyTemplateName));

    let rename = CustomTemplatePatch { name: Some("ARMS".to_string()), ..Default::default() };
    assert!(service.update_custom_template(legs.id, rename.clone()).is_err());
    let renamed = service.update_custom_template(arms.id, rename)?;
    assert_eq!(renamed.name, "ARMS");
    assert_eq!(service.custom_templates().len(), 2);
    Ok(())
}

#[test]
fn test_deleting_template_keeps_workouts() -> Result<()> {
    let mut service = create_test_service()?;
    let id = add_bench_template(&mut service)?;
    let workout = service.create_workout_from_template(date(2024, 1, 8), "Bench Only")?;
    assert!(service.delete_custom_template(id));
    assert!(!service.delete_custom_template(id));
    let kept = service.workout_by_id(workout.id).unwrap();
    assert_eq!(kept.exercises[0].machine, "Bench Press");
    Ok(())
}

#[test]
fn test_hidden_presets() -> Result<()> {
    let mut service = create_test_service()?;
    assert_eq!(service.visible_presets().len(), 7);
    service.set_preset_hidden("Leg Day", true)?;
    assert!(!service.visible_presets().contains(&"Leg Day"));
    assert!(service.set_preset_hidden("Nope", true).is_err());
    service.set_preset_hidden("Leg Day", false)?;
    assert_eq!(service.visible_presets().len(), 7);
    Ok(())
}

// --- Export / import ---

#[test]
fn test_export_import_roundtrip() -> Result<()> {
    let mut source = create_test_service()?;
    add_bench_template(&mut source)?;
    let workout = source.create_workout_from_template(date(2024, 1, 1), "Bench Only")?;
    source.record_set(
        workout.id,
        "Bench Press",
        0,
        SetEntry { weight: Some(100.0), reps: Some(8), rest: None },
    )?;
    source.start_workout(date(2024, 1, 4), None)?;
    source.update_preferences(PreferencesPatch { dark_mode: Some(true), ..Default::default() });

    let json = source.export_string(ironpup_lib::ExportFormat::Json)?;
    let mut target = create_test_service_on(date(2025, 5, 5))?;
    assert_eq!(target.import_json(&json)?, 2);

    assert_eq!(target.export_bundle(), source.export_bundle());
    assert!(target.preferences().dark_mode);
    Ok(())
}

#[test]
fn test_import_rejects_invalid_json() -> Result<()> {
    let mut service = create_test_service()?;
    service.start_workout(date(2024, 1, 4), None)?;
    assert!(service.import_json("{\"workouts\": 5}").is_err());
    assert_eq!(service.list_workouts(None, None).len(), 1);
    Ok(())
}

#[test]
fn test_csv_export_quotes_fields() -> Result<()> {
    let mut service = create_test_service()?;
    let repo = service.repository();
    let mut workout = plain_workout(date(2024, 1, 1), "Chest, Shoulders, and Back", true);
    workout.duration = Some(45);
    repo.create(workout);
    repo.create(plain_workout(date(2024, 1, 2), "Leg Day", false));

    let csv = service.export_string(ironpup_lib::ExportFormat::Csv)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "id,date,type,completed,duration");
    assert_eq!(lines[1], "1,2024-01-01,\"Chest, Shoulders, and Back\",true,45");
    assert_eq!(lines[2], "2,2024-01-02,Leg Day,false,");

    let empty = create_test_service()?.export_string(ironpup_lib::ExportFormat::Csv)?;
    assert_eq!(empty.trim_end(), "id,date,type,completed,duration");
    Ok(())
}

#[test]
fn test_export_file_names() {
    assert_eq!(
        ironpup_lib::ExportFormat::Json.default_file_name(date(2024, 3, 9)),
        "ironpup-data-2024-03-09.json"
    );
    assert_eq!(
        ironpup_lib::ExportFormat::Csv.default_file_name(date(2024, 3, 9)),
        "ironpup-workouts-2024-03-09.csv"
    );
}

// --- Preferences, stats, reset ---

#[test]
fn test_preferences_defaults_and_update() -> Result<()> {
    let mut service = create_test_service()?;
    let prefs = service.preferences();
    assert_eq!(prefs.id, 1);
    assert!(!prefs.dark_mode);
    assert!(!prefs.auto_increment);
    assert!(prefs.notifications);

    let updated = service.update_preferences(PreferencesPatch {
        auto_increment: Some(true),
        ..Default::default()
    });
    assert!(updated.auto_increment);
    assert_eq!(updated.updated_at.date_naive(), date(2024, 1, 8));
    assert_eq!(service.preferences(), updated);
    Ok(())
}

#[test]
fn test_progress_summary_figures() -> Result<()> {
    let mut service = create_test_service_on(date(2024, 1, 31))?;
    let repo = service.repository();
    let session = |day: NaiveDate, weight: f64, duration: u32| NewWorkout {
        exercises: vec![logged_exercise("Bench Press", &[weight - 10.0, weight])],
        duration: Some(duration),
        ..plain_workout(day, "Chest Day", true)
    };
    repo.create(session(date(2024, 1, 20), 110.0, 50));
    repo.create(session(date(2024, 1, 10), 100.0, 40));
    repo.create(plain_workout(date(2024, 1, 25), "Leg Day", false));
    repo.create(session(date(2023, 11, 1), 80.0, 30));

    let summary = service.progress_summary(Period::Month);
    assert_eq!(summary.total_completed, 2);
    assert_eq!(summary.average_duration, 45);
    assert_eq!(summary.completion_rate, 50);
    assert_eq!(
        summary.by_type,
        vec![("Chest Day".to_string(), 2), ("Leg Day".to_string(), 1)]
    );
    assert_eq!(summary.weight_progress.len(), 1);
    assert_eq!(summary.weight_progress[0].machine, "Bench Press");
    assert!((summary.weight_progress[0].improvement - 10.0).abs() < f64::EPSILON);
    assert_eq!(summary.weight_progress[0].percentage, 10);

    let month = service.month_counts(2024, 1);
    assert_eq!((month.completed, month.total), (2, 3));
    // Sunday 2024-01-21 .. Saturday 2024-01-27
    let week = service.week_counts(date(2024, 1, 24));
    assert_eq!((week.completed, week.total), (0, 1));
    Ok(())
}

#[test]
fn test_progress_summary_cardio_minutes() -> Result<()> {
    let mut service = create_test_service_on(date(2024, 1, 31))?;
    let repo = service.repository();
    let with_cardio = |day: NaiveDate, duration: &str, cardio_done: bool, completed: bool| {
        NewWorkout {
            cardio: Some(Cardio {
                duration: Some(duration.to_string()),
                completed: cardio_done,
                ..Cardio::treadmill()
            }),
            ..plain_workout(day, "Leg Day", completed)
        }
    };
    repo.create(with_cardio(date(2024, 1, 10), "20:30", true, true));
    repo.create(with_cardio(date(2024, 1, 12), "15", true, true));
    // not counted: cardio skipped, workout open, malformed, out of period
    repo.create(with_cardio(date(2024, 1, 14), "30:00", false, true));
    repo.create(with_cardio(date(2024, 1, 16), "30:00", true, false));
    repo.create(with_cardio(date(2024, 1, 18), "half an hour", true, true));
    repo.create(with_cardio(date(2023, 11, 1), "30:00", true, true));

    let summary = service.progress_summary(Period::Month);
    assert_eq!(summary.cardio_minutes, 36);
    assert_eq!(service.progress_summary(Period::Week).cardio_minutes, 0);
    Ok(())
}

#[test]
fn test_clear_all_data() -> Result<()> {
    let mut service = create_test_service()?;
    service.start_workout(date(2024, 1, 4), None)?;
    add_bench_template(&mut service)?;
    service.set_streak_days(StreakDays::none());

    service.clear_all_data();
    assert!(service.list_workouts(None, None).is_empty());
    assert!(service.custom_templates().is_empty());
    assert_eq!(service.streak_days(), StreakDays::all());
    assert_eq!(
        service.repository().store_mut().keys(),
        vec![keys::SCHEMA_VERSION.to_string()]
    );

    let fresh = service.start_workout(date(2024, 1, 5), Some("Leg Day"))?;
    assert_eq!(fresh.id, 1);
    Ok(())
}

#[test]
fn test_save_debouncer_uses_configured_delay() -> Result<()> {
    let mut config = Config::default();
    config.autosave_delay_ms = 500;
    let service = AppService::in_memory(config, Box::new(FixedClock::on_date(date(2024, 1, 1))))?;
    let mut debouncer = service.save_debouncer();
    let start = chrono::DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")?.with_timezone(&chrono::Utc);
    debouncer.touch(start);
    assert!(!debouncer.poll(start + chrono::Duration::milliseconds(499)));
    assert!(debouncer.poll(start + chrono::Duration::milliseconds(500)));
    assert!(!debouncer.poll(start + chrono::Duration::milliseconds(501)));
    Ok(())
}
