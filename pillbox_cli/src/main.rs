use chrono::Local;
use clap::{Parser, Subcommand};
use pillbox_core::collaborators::NoNotifications;
use pillbox_core::config::DataConfig;
use pillbox_core::ledger::TakeOutcome;
use pillbox_core::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pillbox")]
#[command(about = "Medication schedule and dose reminder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new medication regimen
    Add {
        /// Medication name
        #[arg(long)]
        name: String,

        /// Dose label (e.g. "500mg")
        #[arg(long)]
        dose: String,

        /// Hours between doses
        #[arg(long, allow_hyphen_values = true)]
        every: String,

        /// First dose time of day, HH:MM (defaults to now)
        #[arg(long)]
        start: Option<String>,

        /// Number of days the course runs
        #[arg(long, allow_hyphen_values = true)]
        days: String,
    },

    /// Show today's dose timeline (default)
    Today {
        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a dose from today's timeline as taken
    Take {
        /// Dose id as shown by `today`
        instance_id: String,
    },

    /// Poll for due doses and raise alerts
    Watch {
        /// Stop after this many checks
        #[arg(long)]
        ticks: Option<usize>,

        /// Override the poll interval in seconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,
    },

    /// Show taken and missed doses over recent days
    History {
        /// Window size in days, today included
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also export one row per dose to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    pillbox_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Add {
            name,
            dose,
            every,
            start,
            days,
        }) => {
            let draft = RegimenDraft {
                name,
                dose,
                freq_hours: every,
                start_time: start
                    .unwrap_or_else(|| TimeOfDay::of(&Local::now().naive_local()).to_string()),
                duration_days: days,
            };
            cmd_add(&data_dir, &config, draft)
        }
        Some(Commands::Today { json }) => cmd_today(&data_dir, &config, json),
        Some(Commands::Take { instance_id }) => cmd_take(&data_dir, &config, &instance_id),
        Some(Commands::Watch {
            ticks,
            interval_secs,
        }) => cmd_watch(&data_dir, &config, ticks, interval_secs),
        Some(Commands::History { days, json, csv }) => {
            cmd_history(&data_dir, &config, days, json, csv.as_deref())
        }
        None => cmd_today(&data_dir, &config, false),
    }
}

fn open_reminder(data_dir: &Path, config: &Config) -> Reminder {
    let store = RegimenStore::open_file(DataConfig::store_path(data_dir));
    Reminder::new(store, config)
}

fn cmd_add(data_dir: &Path, config: &Config, draft: RegimenDraft) -> Result<()> {
    let mut reminder = open_reminder(data_dir, config);

    let regimen = match reminder.add_regimen(&draft, Local::now()) {
        Ok(regimen) => regimen,
        Err(e) => {
            eprintln!("✗ {}", e);
            return Err(e);
        }
    };

    println!("✓ {} scheduled!", regimen.name);
    println!(
        "  {} every {}h from {} for {} days",
        regimen.dose, regimen.freq_hours, regimen.start_time, regimen.duration_days
    );
    Ok(())
}

fn cmd_today(data_dir: &Path, config: &Config, json: bool) -> Result<()> {
    let reminder = open_reminder(data_dir, config);
    let now = Local::now();
    let schedule = reminder.today_schedule(now);

    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    println!("\n{}", now.format("%A, %B %-d, %Y"));
    print_timeline(&schedule);
    Ok(())
}

fn cmd_take(data_dir: &Path, config: &Config, instance_id: &str) -> Result<()> {
    let mut reminder = open_reminder(data_dir, config);
    let now = Local::now();

    let Some(dose) = reminder
        .today_schedule(now)
        .into_iter()
        .find(|d| d.instance_id == instance_id)
    else {
        eprintln!("No dose {:?} on today's schedule - nothing recorded.", instance_id);
        return Ok(());
    };

    match reminder.mark_taken(&dose.regimen_id, &dose.instance_id, now) {
        TakeOutcome::Recorded => println!("✓ {} ({}) marked as taken", dose.name, dose.dose),
        TakeOutcome::AlreadyTaken => println!("{} at {} was already taken", dose.name, dose.time_string),
        TakeOutcome::UnknownRegimen => eprintln!("Regimen for {:?} no longer exists", instance_id),
    }
    Ok(())
}

fn cmd_watch(
    data_dir: &Path,
    config: &Config,
    max_ticks: Option<usize>,
    interval_secs: Option<u64>,
) -> Result<()> {
    let interval = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.alerts.poll_interval());

    let mut reminder = open_reminder(data_dir, config)
        .with_surface(TerminalSurface)
        .with_chime(TerminalBell)
        .with_notifier(NoNotifications);
    reminder.start(Local::now());

    println!("Watching for due doses every {}s (Ctrl-C to stop)", interval.as_secs());

    let (mut timer, ticks) = PollTimer::spawn(interval);
    let mut seen = 0;
    for tick in ticks.iter() {
        reminder.tick(tick.at);
        seen += 1;
        if max_ticks.map(|max| seen >= max).unwrap_or(false) {
            break;
        }
    }
    timer.stop();

    Ok(())
}

fn cmd_history(
    data_dir: &Path,
    config: &Config,
    days: u32,
    json: bool,
    csv: Option<&Path>,
) -> Result<()> {
    let reminder = open_reminder(data_dir, config);
    let report = adherence_report(reminder.regimens(), days, Local::now().naive_local());

    if let Some(path) = csv {
        let rows = pillbox_core::adherence::export_csv(&report, path)?;
        eprintln!("✓ Exported {} doses to {}", rows, path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.by_regimen.is_empty() {
        println!("No doses scheduled in the last {} days.", days);
        return Ok(());
    }

    let stats = &report.stats;
    println!(
        "Adherence {} to {}: {}/{} due doses taken ({:.0}%)",
        report.from,
        report.to,
        stats.taken,
        stats.taken + stats.missed,
        stats.adherence_rate * 100.0
    );

    for regimen in &report.by_regimen {
        println!(
            "\n  {} · {}  ({} taken, {} missed)",
            regimen.name, regimen.dose, regimen.stats.taken, regimen.stats.missed
        );
        for day in &regimen.days {
            let missed = day.missed_times();
            let mut line = format!(
                "    {}  {}/{} taken",
                day.date.format("%a %b %d"),
                day.stats.taken,
                day.stats.scheduled
            );
            if !missed.is_empty() {
                line.push_str(&format!("  missed {}", missed.join(", ")));
            }
            if day.stats.upcoming > 0 {
                line.push_str(&format!("  {} upcoming", day.stats.upcoming));
            }
            println!("{}", line);
        }
    }
    println!();
    Ok(())
}

fn print_timeline(schedule: &[DoseInstance]) {
    if schedule.is_empty() {
        println!("\n  No doses scheduled for today.\n");
        return;
    }

    println!();
    for dose in schedule {
        let mark = if dose.is_taken { "✓" } else { " " };
        println!("  {}  [{}] {} · {}", dose.time_string, mark, dose.name, dose.dose);
        println!("           {}", dose.instance_id);
    }
    println!();
}

/// Prints the timeline and alerts to the terminal
struct TerminalSurface;

impl AlertSurface for TerminalSurface {
    fn render_timeline(&mut self, schedule: &[DoseInstance]) {
        print_timeline(schedule);
    }

    fn render_alert(&mut self, dose: &DoseInstance) {
        println!("\n╭─────────────────────────────────────────╮");
        println!("│  TIME FOR YOUR MEDICINE  {}", dose.time_string);
        println!("╰─────────────────────────────────────────╯");
        println!("  {} · {}", dose.name, dose.dose);
        println!("  Run `pillbox take \"{}\"` when done.\n", dose.instance_id);
    }

    fn clear_alert(&mut self) {}
}

/// Rings the terminal bell twice
struct TerminalBell;

impl Chime for TerminalBell {
    fn play(&mut self) -> Result<()> {
        let mut stderr = io::stderr();
        stderr.write_all(b"\x07")?;
        std::thread::sleep(Duration::from_millis(150));
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}
