//src/main.rs
mod cli;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdin, stdout, Write};
use tracing_subscriber::EnvFilter;

use ironpup_lib::catalog;
use ironpup_lib::model::{CardioType, WeightDelta, Workout};
use ironpup_lib::{
    AppService, CardioEntry, ExportFormat, NewCustomTemplate, Period, PreferencesPatch, SetEntry,
    StreakDays, Units,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli_args = cli::parse_args();
    let csv_output = cli_args.csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {shell}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    let mut service = AppService::initialize().context("Failed to initialize application service")?;
    let header_color = ironpup_lib::parse_color(&service.config.theme.header_color)
        .map(Color::from)
        .unwrap_or(Color::Green);
    let units = service.config.units;

    let result = run(&mut service, cli_args.command, header_color, units, csv_output);

    // Storage problems are reported even when the command itself failed.
    for notice in service.take_notices() {
        eprintln!("Notice: {notice}");
    }
    result
}

#[allow(clippy::too_many_lines)]
fn run(
    service: &mut AppService,
    command: cli::Commands,
    header_color: Color,
    units: Units,
    csv_output: bool,
) -> Result<()> {
    match command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Today => {
            let today = service.today();
            match service.workout_by_date(today) {
                Some(workout) => print_workout_detail(&workout, header_color, units),
                None => match service.todays_type() {
                    Some(kind) => println!(
                        "Today ({today}) is {kind}. Run 'ironpup start' to begin."
                    ),
                    None => println!("No workout scheduled for today ({today})."),
                },
            }
        }
        cli::Commands::Schedule { year, month } => {
            let today = service.today();
            let year = year.unwrap_or_else(|| today.year());
            let month = month.unwrap_or_else(|| today.month());
            let entries = service.month_schedule(year, month)?;
            let counts = service.month_counts(year, month);
            let done: Vec<NaiveDate> = service
                .list_workouts(entries.first().map(|e| e.date), entries.last().map(|e| e.date))
                .into_iter()
                .filter(|w| w.completed)
                .map(|w| w.date)
                .collect();
            if csv_output {
                let mut writer = csv::Writer::from_writer(io::stdout());
                writer.write_record(["Date", "Workout", "Completed"])?;
                for entry in &entries {
                    writer.write_record([
                        entry.date.to_string(),
                        entry.workout_type.clone().unwrap_or_default(),
                        done.contains(&entry.date).to_string(),
                    ])?;
                }
                writer.flush()?;
            } else {
                let mut table = new_table(&["Date", "Day", "Workout", "Done"], header_color);
                for entry in entries {
                    table.add_row(vec![
                        Cell::new(entry.date.to_string()),
                        Cell::new(entry.date.weekday().to_string()),
                        Cell::new(entry.workout_type.as_deref().unwrap_or("-")),
                        Cell::new(if done.contains(&entry.date) { "✓" } else { "" }),
                    ]);
                }
                println!("{table}");
                println!("{}/{} workouts completed this month.", counts.completed, counts.total);
            }
        }
        cli::Commands::Start { date, template } => {
            let date = date.unwrap_or_else(|| service.today());
            if let Some(name) = template.as_deref() {
                if service.preset_prompts().get(name).copied().unwrap_or(false)
                    && !confirm(&format!("Start '{name}' on {date}?"))?
                {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let workout = service.start_workout(date, template.as_deref())?;
            println!("Workout ID {} ({}) on {}.", workout.id, workout.workout_type, workout.date);
            print_workout_detail(&workout, header_color, units);
        }
        cli::Commands::Show { which } => {
            let workout = resolve_workout(service, &which)?;
            print_workout_detail(&workout, header_color, units);
        }
        cli::Commands::List { from, to } => {
            let workouts = service.list_workouts(from, to);
            if csv_output {
                ironpup_lib::transfer::write_workouts_csv(io::stdout(), &workouts)?;
            } else if workouts.is_empty() {
                println!("No workouts found.");
            } else {
                print_workout_table(&workouts, header_color);
            }
        }
        cli::Commands::LogSet { which, exercise, set, weight, reps, rest } => {
            let id = resolve_workout(service, &which)?.id;
            let entry = SetEntry { weight, reps, rest };
            let workout = service.record_set(id, &exercise, set_index(set)?, entry)?;
            println!("Logged set {set} of '{exercise}'.");
            print_exercise_line(&workout, &exercise, units);
        }
        cli::Commands::CompleteSet { which, exercise, set } => {
            let id = resolve_workout(service, &which)?.id;
            let workout = service.complete_set(id, &exercise, set_index(set)?)?;
            println!("Completed set {set} of '{exercise}'.");
            print_progress(&workout);
        }
        cli::Commands::Abs { which, index, undo } => {
            let id = resolve_workout(service, &which)?.id;
            let workout = service.set_abs_completed(id, set_index(index)?, !undo)?;
            print_progress(&workout);
        }
        cli::Commands::Cardio { which, kind, duration, distance, done } => {
            let id = resolve_workout(service, &which)?.id;
            let entry = CardioEntry {
                kind: kind.map(cli_cardio_to_lib),
                duration,
                distance,
                completed: done.then_some(true),
            };
            let workout = service.set_cardio(id, entry)?;
            print_progress(&workout);
        }
        cli::Commands::Complete { which } => {
            let id = resolve_workout(service, &which)?.id;
            let workout = service.complete_workout(id)?;
            println!(
                "Workout complete! Estimated duration: {} min.",
                workout.duration.unwrap_or_default()
            );
            let streak = service.streak_info();
            println!("Current streak: {} day(s).", streak.current);
        }
        cli::Commands::Delete { id } => {
            if service.delete_workout(id) {
                println!("Deleted workout ID {id}.");
            } else {
                bail!("Workout with ID {id} not found.");
            }
        }
        cli::Commands::Last { exercise } => {
            let Some(sets) = service.last_completed_sets(&exercise) else {
                println!("No fully logged session of '{exercise}' yet.");
                return Ok(());
            };
            let weight_header = format!("Weight ({units})");
            let mut table = new_table(&["Set", weight_header.as_str(), "Reps", "Rest"], header_color);
            for (idx, set) in sets.iter().enumerate() {
                table.add_row(vec![
                    Cell::new((idx + 1).to_string()),
                    Cell::new(set.weight.value().map_or("-".to_string(), |w| format!("{w}"))),
                    Cell::new(set.reps.value().map_or("-".to_string(), |r| r.to_string())),
                    Cell::new(&set.rest),
                ]);
            }
            println!("{table}");
        }
        cli::Commands::Streak => {
            let streak = service.streak_info();
            println!("Current streak: {} day(s)", streak.current);
            println!("Longest streak: {} day(s)", streak.longest);
            println!("Streak days: {}", streak.streak_days);
        }
        cli::Commands::Stats { period } => {
            let summary = service.progress_summary(cli_period_to_lib(period));
            println!("Period: last {}", summary.period);
            println!("Completed workouts: {}", summary.total_completed);
            println!("Average duration: {} min", summary.average_duration);
            println!("Cardio time: {} min", summary.cardio_minutes);
            println!("Completion rate: {}%", summary.completion_rate);
            println!("Current streak: {} day(s)", summary.current_streak);
            if !summary.weight_progress.is_empty() {
                let mut table = new_table(&["Exercise", "Improvement", "%"], header_color);
                for p in &summary.weight_progress {
                    table.add_row(vec![
                        Cell::new(&p.machine),
                        Cell::new(format!("+{:.1} {units}", p.improvement)),
                        Cell::new(format!("{}%", p.percentage)),
                    ]);
                }
                println!("{table}");
            }
            for (kind, count) in &summary.by_type {
                println!("  {kind}: {count}");
            }
        }
        cli::Commands::Templates { all } => {
            let visible = service.visible_presets();
            let mut table = new_table(&["Template", "Exercises", "Abs", "Hidden"], header_color);
            for template in catalog::templates() {
                let hidden = !visible.contains(&template.name);
                if hidden && !all {
                    continue;
                }
                table.add_row(vec![
                    Cell::new(template.name),
                    Cell::new(template.exercises.len().to_string()),
                    Cell::new(template.abs.len().to_string()),
                    Cell::new(if hidden { "yes" } else { "" }),
                ]);
            }
            println!("{table}");
        }
        cli::Commands::Preset { name, hide, show, prompt } => {
            if hide || show {
                service.set_preset_hidden(&name, hide)?;
                println!("Preset '{name}' is now {}.", if hide { "hidden" } else { "visible" });
            }
            if let Some(prompt) = prompt {
                service.set_preset_prompt(&name, prompt);
                println!("Confirmation prompt for '{name}': {prompt}.");
            }
        }
        cli::Commands::Library { region, abs } => {
            if abs {
                let mut table = new_table(&["Abs", "Target"], header_color);
                for option in catalog::abs_library() {
                    let target = option
                        .time
                        .clone()
                        .or_else(|| option.reps.map(|r| format!("{r} reps")))
                        .unwrap_or_else(|| "-".to_string());
                    table.add_row(vec![Cell::new(&option.name), Cell::new(target)]);
                }
                println!("{table}");
            } else {
                let filter = region.map(|r| r.to_lowercase());
                let mut table = new_table(&["Group", "Region", "Machine", "Equipment"], header_color);
                for option in catalog::exercise_library() {
                    let group = catalog::canonical_region(&option.region);
                    if let Some(ref f) = filter {
                        if !group.to_lowercase().contains(f.as_str())
                            && !option.region.to_lowercase().contains(f.as_str())
                        {
                            continue;
                        }
                    }
                    table.add_row(vec![
                        Cell::new(group),
                        Cell::new(&option.region),
                        Cell::new(&option.machine),
                        Cell::new(option.equipment.to_string()),
                    ]);
                }
                println!("{table}");
            }
        }
        cli::Commands::Custom(cmd) => run_custom(service, cmd, header_color)?,
        cli::Commands::Rotation(cmd) => match cmd {
            cli::RotationCommands::Show => {
                let selection = service.rotation_selection();
                if selection.is_empty() {
                    println!("Using the default rotation.");
                }
                for (idx, name) in service.cycle().entries().iter().enumerate() {
                    println!("{:>2}. {name}", idx + 1);
                }
            }
            cli::RotationCommands::Set { names } => {
                service.set_rotation_selection(&names)?;
                println!("Rotation now has {} entries.", service.cycle().len());
            }
        },
        cli::Commands::StreakDays(cmd) => match cmd {
            cli::StreakDaysCommands::Show => println!("Streak days: {}", service.streak_days()),
            cli::StreakDaysCommands::Set { days } => {
                let days = StreakDays::from_weekdays(days);
                service.set_streak_days(days);
                println!("Streak days set to: {days}");
            }
        },
        cli::Commands::Prefs(cmd) => {
            let prefs = match cmd {
                cli::PrefsCommands::Show => service.preferences(),
                cli::PrefsCommands::Set { dark_mode, auto_increment, notifications } => {
                    let patch = PreferencesPatch { dark_mode, auto_increment, notifications };
                    if patch.is_empty() {
                        bail!("Nothing to update. Pass at least one preference flag.");
                    }
                    service.update_preferences(patch)
                }
            };
            println!("Dark mode: {}", prefs.dark_mode);
            println!("Auto increment: {}", prefs.auto_increment);
            println!("Notifications: {}", prefs.notifications);
        }
        cli::Commands::Export { format, output } => {
            let format = match format {
                cli::ExportFormatCli::Json => ExportFormat::Json,
                cli::ExportFormatCli::Csv => ExportFormat::Csv,
            };
            let path = service.export_to_file(format, output.as_deref())?;
            println!("Exported to {}", path.display());
        }
        cli::Commands::Import { file } => {
            let count = service.import_from_file(&file)?;
            println!("Imported {count} workout(s) from {}.", file.display());
        }
        cli::Commands::Reset { yes } => {
            if !yes && !confirm("Delete ALL workouts, templates and settings?")? {
                println!("Cancelled.");
                return Ok(());
            }
            service.clear_all_data();
            println!("All data cleared.");
        }
        cli::Commands::DbPath => {
            println!("Database: {}", service.get_db_path().display());
            println!("Config: {}", service.get_config_path().display());
            let usage = service.storage_usage();
            println!("Storage used: {} of {} bytes", usage.used_bytes, usage.limit_bytes);
            if service.is_storage_degraded() {
                println!("Storage is unavailable; running from memory.");
            }
        }
        cli::Commands::SetColor { color } => {
            service.set_header_color(&color)?;
            println!("Header color set to {}.", service.config.theme.header_color);
        }
        cli::Commands::SetUnits { units } => {
            let units = match units {
                cli::UnitsCli::Lbs => Units::Lbs,
                cli::UnitsCli::Kg => Units::Kg,
            };
            service.set_units(units)?;
            println!("Units set to {units}.");
        }
    }
    Ok(())
}

fn run_custom(service: &mut AppService, cmd: cli::CustomCommands, header_color: Color) -> Result<()> {
    match cmd {
        cli::CustomCommands::Add { name, exercises, abs, rotate } => {
            let exercises = split_list(&exercises)
                .map(|machine| library_exercise(&machine))
                .collect::<Result<Vec<_>>>()?;
            let abs = abs
                .as_deref()
                .map(split_list)
                .into_iter()
                .flatten()
                .map(|item| library_abs(&item))
                .collect::<Result<Vec<_>>>()?;
            let template = service.add_custom_template(NewCustomTemplate {
                name,
                exercises,
                abs,
                include_in_auto_schedule: rotate,
            })?;
            println!("Created custom template '{}' (ID {}).", template.name, template.id);
        }
        cli::CustomCommands::List => {
            let templates = service.custom_templates();
            if templates.is_empty() {
                println!("No custom templates.");
                return Ok(());
            }
            let mut table = new_table(&["ID", "Name", "Exercises", "Abs", "In rotation"], header_color);
            for t in templates {
                let machines: Vec<&str> = t.exercises.iter().map(|e| e.machine.as_str()).collect();
                table.add_row(vec![
                    Cell::new(t.id.to_string()),
                    Cell::new(&t.name),
                    Cell::new(machines.join(", ")),
                    Cell::new(t.abs.len().to_string()),
                    Cell::new(if t.include_in_auto_schedule { "yes" } else { "no" }),
                ]);
            }
            println!("{table}");
        }
        cli::CustomCommands::Rename { id, name } => {
            let patch = ironpup_lib::CustomTemplatePatch { name: Some(name), ..Default::default() };
            let template = service.update_custom_template(id, patch)?;
            println!("Renamed template {id} to '{}'.", template.name);
        }
        cli::CustomCommands::Delete { id } => {
            if !service.delete_custom_template(id) {
                bail!("Custom template with ID {id} not found.");
            }
            println!("Deleted custom template {id}.");
        }
        cli::CustomCommands::Include { id, include } => {
            let patch = ironpup_lib::CustomTemplatePatch {
                include_in_auto_schedule: Some(include),
                ..Default::default()
            };
            service.update_custom_template(id, patch)?;
            println!("Template {id} in rotation: {include}.");
        }
    }
    Ok(())
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// A template exercise copied from the first preset that has the machine.
fn library_exercise(machine: &str) -> Result<ironpup_lib::Exercise> {
    catalog::templates()
        .iter()
        .flat_map(|t| t.exercises.iter())
        .find(|e| e.machine.eq_ignore_ascii_case(machine))
        .cloned()
        .with_context(|| format!("'{machine}' is not in the exercise library (see 'ironpup library')"))
}

fn library_abs(name: &str) -> Result<ironpup_lib::AbsExercise> {
    catalog::templates()
        .iter()
        .flat_map(|t| t.abs.iter())
        .find(|a| a.name.eq_ignore_ascii_case(name))
        .cloned()
        .with_context(|| format!("'{name}' is not in the abs library (see 'ironpup library --abs')"))
}

fn resolve_workout(service: &mut AppService, which: &cli::WorkoutSelector) -> Result<Workout> {
    if let Some(id) = which.id {
        return service
            .workout_by_id(id)
            .with_context(|| format!("Workout with ID {id} not found."));
    }
    let date = which.date.unwrap_or_else(|| service.today());
    service
        .workout_by_date(date)
        .with_context(|| format!("No workout on {date}. Run 'ironpup start --date {date}' first."))
}

fn set_index(number: usize) -> Result<usize> {
    match number.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("Numbers start at 1."),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    stdout().flush()?;
    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

const fn cli_period_to_lib(period: cli::PeriodCli) -> Period {
    match period {
        cli::PeriodCli::Week => Period::Week,
        cli::PeriodCli::Month => Period::Month,
        cli::PeriodCli::Year => Period::Year,
    }
}

const fn cli_cardio_to_lib(kind: cli::CardioTypeCli) -> CardioType {
    match kind {
        cli::CardioTypeCli::Treadmill => CardioType::Treadmill,
        cli::CardioTypeCli::Bike => CardioType::Bike,
        cli::CardioTypeCli::Elliptical => CardioType::Elliptical,
        cli::CardioTypeCli::Rowing => CardioType::Rowing,
    }
}

// --- Table Printing Functions ---

fn new_table(headers: &[&str], header_color: Color) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(header_color)));
    table
}

fn print_workout_table(workouts: &[Workout], header_color: Color) {
    let mut table = new_table(&["ID", "Date", "Type", "Progress", "Completed", "Duration (min)"], header_color);
    for workout in workouts {
        let progress = workout.progress();
        table.add_row(vec![
            Cell::new(workout.id.to_string()),
            Cell::new(workout.date.to_string()),
            Cell::new(&workout.workout_type),
            Cell::new(format!("{}/{}", progress.completed_items, progress.total_items)),
            Cell::new(if workout.completed { "yes" } else { "no" }),
            Cell::new(workout.duration.map_or("-".to_string(), |v| v.to_string())),
        ]);
    }
    println!("{table}");
}

fn print_workout_detail(workout: &Workout, header_color: Color, units: Units) {
    println!("{} - {} (ID {})", workout.date, workout.workout_type, workout.id);
    let weight_header = format!("Weight ({units})");
    let mut table = new_table(
        &["Exercise", "Region", "Set", weight_header.as_str(), "Reps", "Rest", "Done"],
        header_color,
    );
    for exercise in &workout.exercises {
        for (idx, set) in exercise.sets.iter().enumerate() {
            table.add_row(vec![
                Cell::new(if idx == 0 { exercise.machine.as_str() } else { "" }),
                Cell::new(if idx == 0 { exercise.region.as_str() } else { "" }),
                Cell::new((idx + 1).to_string()),
                Cell::new(set.weight.value().map_or("-".to_string(), |w| format!("{w}"))),
                Cell::new(set.reps.value().map_or("-".to_string(), |r| r.to_string())),
                Cell::new(if set.rest.is_empty() { "-" } else { set.rest.as_str() }),
                Cell::new(if set.completed { "✓" } else { "" }),
            ]);
        }
    }
    println!("{table}");

    if !workout.abs.is_empty() {
        let mut abs_table = new_table(&["#", "Abs", "Target", "Done"], header_color);
        for (idx, abs) in workout.abs.iter().enumerate() {
            abs_table.add_row(vec![
                Cell::new((idx + 1).to_string()),
                Cell::new(&abs.name),
                Cell::new(abs.target()),
                Cell::new(if abs.completed { "✓" } else { "" }),
            ]);
        }
        println!("{abs_table}");
    }

    match &workout.cardio {
        Some(cardio) => println!(
            "Cardio: {} {} {}{}",
            cardio.kind.map_or("-".to_string(), |k| k.to_string()),
            cardio.duration.as_deref().unwrap_or(""),
            cardio.distance.as_deref().unwrap_or(""),
            if cardio.completed { " ✓" } else { "" }
        ),
        None => println!("Cardio: not set"),
    }
    print_progress(workout);
}

fn print_exercise_line(workout: &Workout, machine: &str, units: Units) {
    let Some(exercise) = workout.exercises.iter().find(|e| e.machine == machine) else {
        return;
    };
    match exercise.weight_delta() {
        WeightDelta::Up(d) => println!("  {machine}: +{d} {units} over best"),
        WeightDelta::Down(d) => println!("  {machine}: -{d} {units} under best"),
        WeightDelta::Same => println!("  {machine}: matching best"),
    }
}

fn print_progress(workout: &Workout) {
    let progress = workout.progress();
    println!(
        "Progress: {}/{} ({}%){}",
        progress.completed_items,
        progress.total_items,
        progress.percentage,
        if workout.completed { " - completed" } else { "" }
    );
}
