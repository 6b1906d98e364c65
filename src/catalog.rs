// src/catalog.rs
//! Built-in workout templates and the exercise/abs libraries derived from them.
use crate::model::{
    reset_abs, reset_exercises, AbsExercise, Cardio, Equipment, Exercise, ExerciseSet, Feel,
    NewWorkout,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::OnceLock;

/// The default rotation. Seven presets, each appearing twice.
pub const DEFAULT_CYCLE: [&str; 14] = [
    "Chest Day",
    "Back and Legs",
    "Chest & Triceps",
    "Back & Biceps",
    "Chest & Shoulders",
    "Leg Day",
    "Chest, Shoulders, and Back",
    "Back and Legs",
    "Chest Day",
    "Leg Day",
    "Chest & Triceps",
    "Back & Biceps",
    "Chest, Shoulders, and Back",
    "Chest & Shoulders",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: &'static str,
    pub exercises: Vec<Exercise>,
    pub abs: Vec<AbsExercise>,
}

impl Template {
    /// A new workout for `date` seeded from this template, nothing completed.
    pub fn instantiate(&self, date: NaiveDate) -> NewWorkout {
        NewWorkout {
            date,
            workout_type: self.name.to_string(),
            exercises: reset_exercises(&self.exercises),
            abs: reset_abs(&self.abs),
            cardio: Some(Cardio::treadmill()),
            completed: false,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseOption {
    pub machine: String,
    pub region: String,
    pub equipment: Equipment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbsOption {
    pub name: String,
    pub reps: Option<u32>,
    pub time: Option<String>,
}

pub fn templates() -> &'static [Template] {
    static TEMPLATES: OnceLock<Vec<Template>> = OnceLock::new();
    TEMPLATES.get_or_init(build_templates)
}

pub fn template(name: &str) -> Option<&'static Template> {
    templates().iter().find(|t| t.name == name)
}

/// Preset names in order of first appearance in the default rotation.
pub fn preset_names() -> Vec<&'static str> {
    let mut seen = HashSet::new();
    DEFAULT_CYCLE
        .iter()
        .copied()
        .filter(|name| seen.insert(*name))
        .collect()
}

/// Every template exercise once (first occurrence by machine), grouped by region.
pub fn exercise_library() -> &'static [ExerciseOption] {
    static LIBRARY: OnceLock<Vec<ExerciseOption>> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        let mut seen = HashSet::new();
        let mut options: Vec<ExerciseOption> = templates()
            .iter()
            .flat_map(|t| t.exercises.iter())
            .filter(|e| seen.insert(e.machine.clone()))
            .map(|e| ExerciseOption {
                machine: e.machine.clone(),
                region: e.region.clone(),
                equipment: e.equipment,
            })
            .collect();
        options.sort_by(|a, b| a.region.cmp(&b.region));
        options
    })
}

/// Every template abs item once (first occurrence by name), alphabetical.
pub fn abs_library() -> &'static [AbsOption] {
    static LIBRARY: OnceLock<Vec<AbsOption>> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        let mut seen = HashSet::new();
        let mut options: Vec<AbsOption> = templates()
            .iter()
            .flat_map(|t| t.abs.iter())
            .filter(|a| seen.insert(a.name.clone()))
            .map(|a| AbsOption {
                name: a.name.clone(),
                reps: a.reps,
                time: a.time.clone(),
            })
            .collect();
        options.sort_by(|a, b| a.name.cmp(&b.name));
        options
    })
}

/// Maps free-form region labels onto a small set used for grouping.
pub fn canonical_region(region: &str) -> &'static str {
    let lower = region.to_lowercase();
    if lower.contains("pec") || lower.contains("chest") {
        "Chest"
    } else if lower.contains("tricep") {
        "Triceps"
    } else if lower.contains("bicep") {
        "Biceps"
    } else if lower.contains("shoulder") || lower.contains("delt") {
        "Shoulders"
    } else if lower.contains("back") || lower.contains("lat") || lower.contains("trap") {
        "Back"
    } else if ["leg", "quad", "ham", "thigh", "glute", "calve", "calf"]
        .iter()
        .any(|part| lower.contains(part))
    {
        "Legs"
    } else {
        "Other"
    }
}

fn exercise(
    code: &str,
    machine: &str,
    region: &str,
    equipment: Equipment,
    feel: Feel,
    sets: &[(f64, u32, &str)],
) -> Exercise {
    let sets: Vec<ExerciseSet> = sets
        .iter()
        .map(|&(weight, reps, rest)| ExerciseSet::new(weight, reps, rest))
        .collect();
    let best = sets
        .iter()
        .filter_map(|s| Some((s.weight.value()?, s.reps.value()?)))
        .fold(None, |best: Option<(f64, u32)>, (w, r)| match best {
            Some((bw, _)) if bw > w => best,
            _ => Some((w, r)),
        });
    Exercise {
        code: Some(code.to_string()),
        machine: machine.to_string(),
        region: region.to_string(),
        equipment,
        feel,
        sets,
        best_weight: best.map(|(w, _)| w),
        best_reps: best.map(|(_, r)| r),
        completed: false,
    }
}

fn abs_reps(name: &str, reps: u32) -> AbsExercise {
    AbsExercise {
        name: name.to_string(),
        reps: Some(reps),
        time: None,
        completed: false,
    }
}

fn abs_time(name: &str, time: &str) -> AbsExercise {
    AbsExercise {
        name: name.to_string(),
        reps: None,
        time: Some(time.to_string()),
        completed: false,
    }
}

#[allow(clippy::too_many_lines)]
fn build_templates() -> Vec<Template> {
    use Equipment::{Both, Freeweight, Machine};
    use Feel::{Hard, Heavy, Light, Medium, NotApplicable};

    vec![
        Template {
            name: "Chest Day",
            exercises: vec![
                exercise("S24", "Adjustable Cable Crossover", "Chest Pecs", Machine, Medium,
                    &[(60.0, 15, "1:00"), (70.0, 15, "1:00"), (90.0, 15, "1:00")]),
                exercise("S5", "Converging Chest Press", "Chest Pecs", Machine, Medium,
                    &[(100.0, 15, "1:00"), (115.0, 10, "1:30"), (115.0, 10, "1:00")]),
                exercise("S4", "Rear Delt / Pec Fly", "Outer Pecs", Machine, Medium,
                    &[(160.0, 15, "1:00"), (160.0, 15, "1:00"), (165.0, 15, "1:00")]),
                exercise("S12", "Lateral Raise", "Shoulders", Machine, Medium,
                    &[(60.0, 15, "1:00"), (70.0, 10, "1:00"), (70.0, 10, "1:00")]),
                exercise("S33", "90-Degree Utility Seat", "Shoulders", Freeweight, Light,
                    &[(25.0, 15, "1:00"), (25.0, 15, "1:00"), (25.0, 15, "1:00")]),
                exercise("S25", "Adj. Hi/Low Pulley", "Triceps", Machine, Medium,
                    &[(100.0, 15, "1:00"), (120.0, 10, "1:30"), (120.0, 10, "1:00")]),
                exercise("S8", "Seated Dip", "Outer Triceps", Machine, Medium,
                    &[(125.0, 15, "1:00"), (140.0, 10, "1:00"), (140.0, 10, "1:00")]),
            ],
            abs: vec![
                abs_reps("Crunch with Legs Elevated", 30),
                abs_reps("Jack Knife", 30),
                abs_reps("Side Oblique Crunch with Legs Vertical", 30),
                abs_reps("Decline 90 Degree Reverse Crunch", 30),
                abs_reps("Side Oblique Crunch with Arms Extended", 30),
            ],
        },
        Template {
            name: "Back and Legs",
            exercises: vec![
                exercise("S36", "Seated Leg Press", "Legs (Warm Up)", Machine, NotApplicable,
                    &[(180.0, 10, "1:00"), (220.0, 15, "1:00"), (230.0, 15, "1:00")]),
                exercise("S22", "45 Degree Leg Press", "Quads / Hams", Machine, Heavy,
                    &[(400.0, 10, "1:30"), (450.0, 10, "1:00")]),
                exercise("N/A", "Body Squat", "Legs", Freeweight, Medium,
                    &[(0.0, 20, "1:00"), (0.0, 20, "1:00")]),
                exercise("S14", "Seated Leg Curl", "Hamstrings", Machine, Medium,
                    &[(165.0, 15, "1:30"), (175.0, 10, "1:00")]),
                exercise("S9", "Lat Pulldown", "Back Lats", Machine, Medium,
                    &[(120.0, 12, "1:00"), (130.0, 10, "1:00"), (140.0, 8, "1:30")]),
                exercise("S10", "Seated Row", "Mid Back", Machine, Medium,
                    &[(110.0, 12, "1:00"), (120.0, 10, "1:00")]),
                exercise("S3", "Standing Calf Raise (1-DB)", "Calves", Freeweight, Medium,
                    &[(45.0, 20, "1:00")]),
            ],
            abs: vec![
                abs_reps("Crunch with Heel Push", 30),
                abs_reps("Knee Raise (Vertical Chair)", 30),
                abs_reps("Decline Side Oblique Crunch (Floor)", 30),
                abs_reps("Reverse Crunch", 30),
                abs_reps("Side Oblique Ab Wheel", 30),
                abs_reps("90 Degree Crunch", 30),
            ],
        },
        Template {
            name: "Chest & Triceps",
            exercises: vec![
                exercise("S5", "Converging Chest Press", "Chest Pecs", Machine, Medium,
                    &[(100.0, 15, "1:00"), (115.0, 10, "1:30"), (120.0, 8, "1:30")]),
                exercise("FW1", "Dumbbell Bench Press", "Chest Pecs", Freeweight, Hard,
                    &[(50.0, 12, "1:30"), (55.0, 10, "1:30"), (60.0, 8, "2:00")]),
                exercise("S6", "Incline Chest Press", "Upper Pecs", Machine, Medium,
                    &[(90.0, 12, "1:00"), (100.0, 10, "1:00")]),
                exercise("S25", "Adj. Hi/Low Pulley", "Triceps", Machine, Medium,
                    &[(100.0, 15, "1:00"), (120.0, 10, "1:30"), (120.0, 10, "1:00")]),
                exercise("S8", "Seated Dip", "Outer Triceps", Machine, Hard,
                    &[(130.0, 12, "1:00"), (145.0, 10, "1:00"), (145.0, 10, "1:00")]),
                exercise("FW2", "Overhead Dumbbell Extension", "Triceps", Freeweight, Medium,
                    &[(35.0, 12, "1:00"), (40.0, 10, "1:00")]),
            ],
            abs: vec![
                abs_reps("Crunch with Legs Elevated", 30),
                abs_reps("Bicycle Crunch", 40),
                abs_time("Plank", "1:00"),
                abs_reps("Reverse Crunch", 30),
            ],
        },
        Template {
            name: "Back & Biceps",
            exercises: vec![
                exercise("S9", "Lat Pulldown", "Back Lats", Machine, Medium,
                    &[(120.0, 12, "1:00"), (130.0, 10, "1:00"), (140.0, 8, "1:30")]),
                exercise("S10", "Seated Row", "Mid Back", Machine, Medium,
                    &[(110.0, 12, "1:00"), (120.0, 10, "1:00"), (125.0, 10, "1:00")]),
                exercise("S11", "Assisted Pull-Up", "Back Lats", Machine, Hard,
                    &[(70.0, 10, "1:30"), (60.0, 8, "1:30")]),
                exercise("FW3", "Dumbbell Shrug", "Traps", Freeweight, Medium,
                    &[(50.0, 15, "1:00"), (55.0, 12, "1:00")]),
                exercise("S19", "Preacher Curl", "Biceps", Machine, Medium,
                    &[(60.0, 12, "1:00"), (70.0, 10, "1:00"), (70.0, 10, "1:00")]),
                exercise("FW4", "Hammer Curl", "Biceps / Forearms", Both, Medium,
                    &[(25.0, 12, "1:00"), (30.0, 10, "1:00")]),
            ],
            abs: vec![
                abs_reps("Crunch with Heel Push", 30),
                abs_reps("Knee Raise (Vertical Chair)", 30),
                abs_time("Side Plank", "0:45"),
                abs_reps("90 Degree Crunch", 30),
            ],
        },
        Template {
            name: "Chest & Shoulders",
            exercises: vec![
                exercise("S24", "Adjustable Cable Crossover", "Chest Pecs", Machine, Medium,
                    &[(60.0, 15, "1:00"), (70.0, 15, "1:00"), (90.0, 12, "1:00")]),
                exercise("S4", "Rear Delt / Pec Fly", "Outer Pecs", Machine, Medium,
                    &[(160.0, 15, "1:00"), (165.0, 12, "1:00")]),
                exercise("S13", "Shoulder Press", "Shoulders", Machine, Hard,
                    &[(80.0, 12, "1:00"), (90.0, 10, "1:30"), (95.0, 8, "1:30")]),
                exercise("S12", "Lateral Raise", "Shoulders", Machine, Medium,
                    &[(60.0, 15, "1:00"), (70.0, 10, "1:00"), (70.0, 10, "1:00")]),
                exercise("FW5", "Dumbbell Front Raise", "Front Delts", Freeweight, Light,
                    &[(15.0, 15, "1:00"), (20.0, 12, "1:00")]),
            ],
            abs: vec![
                abs_reps("Jack Knife", 30),
                abs_reps("Side Oblique Crunch with Arms Extended", 30),
                abs_time("Plank", "1:00"),
                abs_reps("Decline 90 Degree Reverse Crunch", 30),
            ],
        },
        Template {
            name: "Leg Day",
            exercises: vec![
                exercise("S36", "Seated Leg Press", "Legs (Warm Up)", Machine, NotApplicable,
                    &[(180.0, 10, "1:00"), (220.0, 15, "1:00")]),
                exercise("S15", "Seated Leg Extension", "Quads", Machine, Medium,
                    &[(160.0, 15, "1:00"), (170.0, 15, "1:00"), (185.0, 15, "1:00")]),
                exercise("S14", "Seated Leg Curl", "Hamstrings", Machine, Medium,
                    &[(165.0, 15, "1:30"), (175.0, 10, "1:00")]),
                exercise("S16", "Adductor", "Inner Thighs", Machine, Medium,
                    &[(150.0, 10, "1:00"), (150.0, 10, "1:00")]),
                exercise("S18", "Abductor", "Outer Thighs", Machine, Medium,
                    &[(155.0, 10, "1:00"), (155.0, 10, "1:00")]),
                exercise("S17", "Glute Machine", "Glutes", Machine, Medium,
                    &[(135.0, 10, "1:00"), (140.0, 10, "1:00")]),
                exercise("FW6", "Goblet Squat", "Quads / Glutes", Freeweight, Hard,
                    &[(50.0, 12, "1:30"), (60.0, 10, "1:30")]),
            ],
            abs: vec![
                abs_reps("Reverse Crunch", 30),
                abs_reps("Side Oblique Ab Wheel", 30),
                abs_reps("Decline Side Oblique Crunch (Floor)", 30),
                abs_time("Hollow Hold", "0:45"),
            ],
        },
        Template {
            name: "Chest, Shoulders, and Back",
            exercises: vec![
                exercise("S5", "Converging Chest Press", "Chest Pecs", Machine, Medium,
                    &[(100.0, 15, "1:00"), (115.0, 10, "1:30")]),
                exercise("S13", "Shoulder Press", "Shoulders", Machine, Medium,
                    &[(80.0, 12, "1:00"), (90.0, 10, "1:30")]),
                exercise("S9", "Lat Pulldown", "Back Lats", Machine, Medium,
                    &[(120.0, 12, "1:00"), (130.0, 10, "1:00")]),
                exercise("S10", "Seated Row", "Mid Back", Machine, Medium,
                    &[(110.0, 12, "1:00"), (120.0, 10, "1:00")]),
                exercise("S4", "Rear Delt / Pec Fly", "Rear Delts", Machine, Light,
                    &[(90.0, 15, "1:00"), (100.0, 12, "1:00")]),
                exercise("FW7", "Dumbbell Pullover", "Chest / Lats", Both, Medium,
                    &[(40.0, 12, "1:00"), (45.0, 10, "1:00")]),
            ],
            abs: vec![
                abs_reps("Crunch with Legs Elevated", 30),
                abs_reps("Bicycle Crunch", 40),
                abs_time("Side Plank", "0:45"),
                abs_reps("Jack Knife", 30),
            ],
        },
    ]
}
