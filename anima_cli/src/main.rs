use anima_core::*;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "anima")]
#[command(about = "Daily wellness rituals, breath sessions and garden progression", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true, hide = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show XP, level, streak and collectibles (default)
    Status,

    /// Record a completed activity
    Log {
        /// journal, breathwork, meditation, recipe or plant
        kind: ActivityKind,
    },

    /// Adjust XP directly (negative values allowed)
    Award {
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },

    /// Wipe all progress
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// List the built-in breath patterns
    Patterns,

    /// Run a guided breath session
    Breathe {
        /// Pattern id (see `patterns`)
        pattern: String,

        /// Override the pattern's cycle count
        #[arg(long)]
        cycles: Option<u32>,

        /// Run on virtual time instead of waiting in real time
        #[arg(long)]
        simulate: bool,

        /// End the session early after this many seconds
        #[arg(long)]
        stop_after: Option<u64>,
    },

    /// Show which rituals were completed on recent days
    History {
        /// Number of days to show
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Export the activity journal to CSV
    Export {
        /// Destination CSV file
        path: PathBuf,
    },
}

/// Where the CLI keeps its files under the data directory
struct Paths {
    store_dir: PathBuf,
    journal: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        Self {
            store_dir: data_dir.join("store"),
            journal: data_dir.join("activity.jsonl"),
        }
    }

    fn store(&self) -> FileStore {
        FileStore::new(&self.store_dir)
    }
}

fn main() -> Result<()> {
    // Keep user-facing output clean; RUST_LOG still overrides
    anima_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!(
        "Using data dir {:?}, config {:?}",
        data_dir,
        cli.config
            .clone()
            .unwrap_or_else(Config::default_config_path)
    );
    let paths = Paths::new(&data_dir);
    let command = cli.command.unwrap_or(Commands::Status);

    match cli.today {
        Some(today) => run(command, &paths, &config, FixedClock::new(today)),
        None => run(command, &paths, &config, SystemClock),
    }
}

fn run<C: Clock>(command: Commands, paths: &Paths, config: &Config, clock: C) -> Result<()> {
    match command {
        Commands::Status => cmd_status(paths, clock),
        Commands::Log { kind } => cmd_log(paths, clock, kind),
        Commands::Award { amount } => cmd_award(paths, clock, amount),
        Commands::Reset { yes } => cmd_reset(paths, clock, yes),
        Commands::Patterns => cmd_patterns(),
        Commands::Breathe {
            pattern,
            cycles,
            simulate,
            stop_after,
        } => cmd_breathe(paths, config, clock, &pattern, cycles, simulate, stop_after),
        Commands::History { days } => cmd_history(paths, clock, days),
        Commands::Export { path } => cmd_export(paths, &path),
    }
}

fn cmd_status<C: Clock>(paths: &Paths, clock: C) -> Result<()> {
    let mut welcome_store = paths.store();
    if check_daily_welcome(&mut welcome_store, &clock) {
        println!("Welcome back to your sanctuary.");
        println!();
    }

    let engine = ProgressionEngine::new(paths.store(), clock);
    display_progress(&engine);
    Ok(())
}

fn cmd_log<C: Clock>(paths: &Paths, clock: C, kind: ActivityKind) -> Result<()> {
    let mut engine = ProgressionEngine::new(paths.store(), clock);
    credit_activity(&mut engine, paths, kind)
}

fn cmd_award<C: Clock>(paths: &Paths, clock: C, amount: i64) -> Result<()> {
    let mut engine = ProgressionEngine::new(paths.store(), clock);
    let previous_level = engine.level();
    engine.award_xp(amount);

    println!("✓ Adjusted XP by {}", amount);
    announce_level_change(previous_level, engine.level());
    display_progress(&engine);
    Ok(())
}

fn cmd_reset<C: Clock>(paths: &Paths, clock: C, yes: bool) -> Result<()> {
    if !yes {
        return Err(Error::Other(
            "refusing to reset progress without --yes".into(),
        ));
    }

    let mut engine = ProgressionEngine::new(paths.store(), clock);
    engine.reset_progress();
    println!("✓ Progress reset. Your garden starts again from a seed.");
    Ok(())
}

fn cmd_patterns() -> Result<()> {
    let catalog = get_default_catalog();
    catalog.validate()?;

    for pattern in &catalog.patterns {
        println!(
            "{:<18} {:<18} {:?} x {} ({}s)",
            pattern.id,
            pattern.name,
            pattern.pattern,
            pattern.cycles,
            pattern.cycle_secs() * pattern.cycles
        );
        println!("  {}", pattern.description);
    }
    Ok(())
}

fn cmd_breathe<C: Clock>(
    paths: &Paths,
    config: &Config,
    clock: C,
    pattern_id: &str,
    cycles: Option<u32>,
    simulate: bool,
    stop_after: Option<u64>,
) -> Result<()> {
    let mut pattern = get_default_catalog()
        .get(pattern_id)
        .cloned()
        .ok_or_else(|| Error::Catalog(format!("unknown breath pattern: {}", pattern_id)))?;
    if let Some(cycles) = cycles {
        pattern.cycles = cycles;
    }

    let tick = Duration::from_millis(config.breath.tick_interval_ms);
    let outcome = if simulate {
        let timer = BreathTimer::new(pattern, ManualScheduler::new()).with_tick_interval(tick);
        run_session(timer, stop_after, false)?
    } else {
        let timer = BreathTimer::new(pattern, SystemScheduler::new()).with_tick_interval(tick);
        run_session(timer, stop_after, true)?
    };

    match outcome {
        SessionOutcome::Completed => println!("\n✓ Session complete"),
        SessionOutcome::Cancelled { cycles_completed } => {
            println!("\nSession ended early after {} cycles", cycles_completed)
        }
    }

    if credits_activity(outcome, &config.breath) {
        let mut engine = ProgressionEngine::new(paths.store(), clock);
        credit_activity(&mut engine, paths, ActivityKind::Breathwork)?;
    } else {
        println!("  Not credited as breathwork.");
    }
    Ok(())
}

/// Run a session to completion or until `stop_after` seconds pass
fn run_session<S: TimerSource>(
    mut timer: BreathTimer<S>,
    stop_after: Option<u64>,
    live: bool,
) -> Result<SessionOutcome> {
    let pattern = timer.pattern().clone();
    let limit = match stop_after {
        Some(secs) => Duration::from_secs(secs),
        // Whole session plus a margin for the final flush
        None => Duration::from_secs(
            u64::from(pattern.cycle_secs()) * (u64::from(pattern.cycles) + 1),
        ),
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", pattern.name.to_uppercase());
    println!("╰─────────────────────────────────────────╯");
    println!("  {}", pattern.instructions);
    println!();

    let mut outcome = None;
    let mut handle = |event: &BreathEvent| {
        if let Some(o) = SessionOutcome::from_event(event) {
            outcome = Some(o);
        }
        display_event(event, pattern.cycles, live);
    };

    for event in timer.start()? {
        handle(&event);
    }
    timer.drive(limit, &mut handle)?;
    if timer.is_started() {
        for event in timer.stop() {
            handle(&event);
        }
    }

    outcome.ok_or_else(|| Error::Other("breath session ended without an outcome".into()))
}

fn cmd_history<C: Clock>(paths: &Paths, clock: C, days: i64) -> Result<()> {
    let records = anima_core::journal::read_records(&paths.journal)?;
    let summaries = anima_core::history::daily_summaries(&records, clock.today(), days);

    for day in &summaries {
        println!(
            "{}  {} journal  {} breathwork  {} meditation{}",
            day.date,
            mark(day.journal_complete),
            mark(day.breathwork_complete),
            mark(day.meditation_complete),
            if day.is_ritual_day() { "  ritual" } else { "" }
        );
    }

    let streak = anima_core::history::ritual_streak(&summaries);
    println!("\nRitual streak: {} days", streak);
    Ok(())
}

fn cmd_export(paths: &Paths, csv_path: &Path) -> Result<()> {
    let count = anima_core::export::export_journal(&paths.journal, csv_path)?;

    println!("✓ Exported {} activities to CSV", count);
    println!("  CSV: {}", csv_path.display());
    Ok(())
}

/// Record an activity, append it to the journal and report the result
fn credit_activity<S: KeyValueStore, C: Clock>(
    engine: &mut ProgressionEngine<S, C>,
    paths: &Paths,
    kind: ActivityKind,
) -> Result<()> {
    let previous_level = engine.level();
    let record = engine.record_activity(kind);

    let mut journal = JsonlJournal::new(&paths.journal);
    journal.append(&record)?;

    println!("✓ {} logged (+{} XP)", kind, record.xp_gained);
    println!("  Streak: {} days", record.streak);
    announce_level_change(previous_level, engine.level());
    Ok(())
}

fn announce_level_change(previous: u8, current: u8) {
    if current > previous {
        println!(
            "  ✦ Your garden grew to level {}: {}",
            current,
            anima_core::progression::level_title(current)
        );
    } else if current < previous {
        println!(
            "  Level is now {}: {}",
            current,
            anima_core::progression::level_title(current)
        );
    }
}

fn display_progress<S: KeyValueStore, C: Clock>(engine: &ProgressionEngine<S, C>) {
    println!("  Level {}: {}", engine.level(), engine.level_title());
    println!("  XP: {}", engine.xp());
    println!(
        "  Progress to next level: {:.0}%",
        engine.progress_to_next() * 100.0
    );
    println!("  Streak: {} days", engine.streak());
    println!("  Collectibles: {}", engine.collectibles());
}

fn display_event(event: &BreathEvent, cycles: u32, live: bool) {
    match event {
        BreathEvent::PhaseChanged { phase, cycle } => {
            if live {
                println!();
            }
            println!(
                "  Cycle {}/{}  {:<6}  {}",
                cycle + 1,
                cycles,
                phase,
                phase.instruction()
            );
        }
        BreathEvent::Tick { seconds_left } if live => {
            print!("\r    {:>3}s ", seconds_left);
            let _ = io::stdout().flush();
        }
        BreathEvent::Tick { .. } => {}
        BreathEvent::Paused => println!("  Paused"),
        BreathEvent::Resumed => println!("  Resumed"),
        BreathEvent::Completed | BreathEvent::Cancelled { .. } => {}
    }
}

fn mark(done: bool) -> &'static str {
    if done {
        "✓"
    } else {
        "·"
    }
}
