// src/cli.rs
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Schedule, log and track gym workouts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print tables as CSV instead
    #[arg(long, global = true)]
    pub csv: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeriodCli {
    Week,
    Month,
    Year,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormatCli {
    Json,
    Csv,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardioTypeCli {
    Treadmill,
    Bike,
    Elliptical,
    Rowing,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitsCli {
    Lbs,
    Kg,
}

/// Selects a workout by date (default: today) or id.
#[derive(Args, Debug, Clone)]
pub struct WorkoutSelector {
    /// Workout date (YYYY-MM-DD). Defaults to today.
    #[arg(short, long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,
    /// Workout ID (takes precedence over --date)
    #[arg(long)]
    pub id: Option<i64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show today's scheduled workout and progress
    Today,
    /// Show the rotation for a month
    Schedule {
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long)]
        month: Option<u32>,
    },
    /// Start (or resume) the workout for a date
    Start {
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Template name; defaults to the scheduled workout
        #[arg(short, long)]
        template: Option<String>,
    },
    /// Show one workout in detail
    Show {
        #[command(flatten)]
        which: WorkoutSelector,
    },
    /// List stored workouts
    List {
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
    },
    /// Enter weight, reps and rest for a set
    LogSet {
        #[command(flatten)]
        which: WorkoutSelector,
        /// Machine / exercise name
        #[arg(short, long)]
        exercise: String,
        /// Set number, starting at 1
        #[arg(short, long)]
        set: usize,
        #[arg(short, long)]
        weight: Option<f64>,
        #[arg(short, long)]
        reps: Option<u32>,
        /// Rest as digits ("130") or M:SS
        #[arg(long)]
        rest: Option<String>,
    },
    /// Mark a set as completed
    CompleteSet {
        #[command(flatten)]
        which: WorkoutSelector,
        #[arg(short, long)]
        exercise: String,
        /// Set number, starting at 1
        #[arg(short, long)]
        set: usize,
    },
    /// Mark an abs item done (or not done with --undo)
    Abs {
        #[command(flatten)]
        which: WorkoutSelector,
        /// Abs item number, starting at 1
        index: usize,
        #[arg(long)]
        undo: bool,
    },
    /// Update the cardio block
    Cardio {
        #[command(flatten)]
        which: WorkoutSelector,
        #[arg(short = 't', long = "type", value_enum)]
        kind: Option<CardioTypeCli>,
        /// Duration (MM:SS or minutes)
        #[arg(long)]
        duration: Option<String>,
        #[arg(long)]
        distance: Option<String>,
        #[arg(long)]
        done: bool,
    },
    /// Complete the workout once every part is done
    Complete {
        #[command(flatten)]
        which: WorkoutSelector,
    },
    /// Delete a workout by ID
    Delete { id: i64 },
    /// Show the last fully logged sets for an exercise
    Last {
        /// Machine / exercise name
        exercise: String,
    },
    /// Show current and longest streak
    Streak,
    /// Progress statistics for a period
    Stats {
        #[arg(short, long, value_enum, default_value_t = PeriodCli::Month)]
        period: PeriodCli,
    },
    /// List preset templates
    Templates {
        /// Include hidden presets
        #[arg(long)]
        all: bool,
    },
    /// Hide or show a preset template
    Preset {
        name: String,
        #[arg(long, conflicts_with = "show")]
        hide: bool,
        #[arg(long)]
        show: bool,
        /// Ask for confirmation before starting this preset
        #[arg(long)]
        prompt: Option<bool>,
    },
    /// Browse the exercise and abs libraries
    Library {
        /// Only exercises whose region matches (e.g. "chest")
        #[arg(short, long)]
        region: Option<String>,
        /// Show the abs library instead
        #[arg(long)]
        abs: bool,
    },
    /// Manage custom workout templates
    #[command(subcommand)]
    Custom(CustomCommands),
    /// Show or change which workouts rotate
    #[command(subcommand)]
    Rotation(RotationCommands),
    /// Show or change which weekdays count for streaks
    #[command(subcommand)]
    StreakDays(StreakDaysCommands),
    /// Show or change preferences
    #[command(subcommand)]
    Prefs(PrefsCommands),
    /// Export data to a file
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormatCli::Json)]
        format: ExportFormatCli,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace stored data with a JSON backup
    Import { file: PathBuf },
    /// Delete all stored data
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show storage location and usage
    DbPath,
    /// Set the table header color
    SetColor { color: String },
    /// Set display units
    SetUnits {
        #[arg(value_enum)]
        units: UnitsCli,
    },
    /// Generate shell completion scripts
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum CustomCommands {
    /// Create a template from library exercises
    Add {
        name: String,
        /// Comma-separated machine names from the exercise library
        #[arg(short, long)]
        exercises: String,
        /// Comma-separated abs names from the abs library
        #[arg(short, long)]
        abs: Option<String>,
        /// Include in the auto-schedule rotation
        #[arg(long)]
        rotate: bool,
    },
    List,
    Rename { id: i64, name: String },
    Delete { id: i64 },
    /// Include or exclude a template from the rotation
    Include {
        id: i64,
        #[arg(action = clap::ArgAction::Set)]
        include: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RotationCommands {
    /// Show the current rotation
    Show,
    /// Set the rotation; no names restores the default
    Set { names: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum StreakDaysCommands {
    Show,
    /// Weekdays, e.g. "mon tue wed thu fri"
    Set {
        #[arg(value_parser = parse_weekday, required = true)]
        days: Vec<chrono::Weekday>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommands {
    Show,
    Set {
        #[arg(long)]
        dark_mode: Option<bool>,
        #[arg(long)]
        auto_increment: Option<bool>,
        #[arg(long)]
        notifications: Option<bool>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    match s.to_lowercase().as_str() {
        "today" => Ok(chrono::Local::now().date_naive()),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date '{s}', expected YYYY-MM-DD or 'today'")),
    }
}

fn parse_weekday(s: &str) -> Result<chrono::Weekday, String> {
    s.parse::<chrono::Weekday>()
        .map_err(|_| format!("Invalid weekday '{s}'"))
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
