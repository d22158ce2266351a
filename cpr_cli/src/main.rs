use chrono::Utc;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use cpr_core::algorithm::antiarrhythmic_limit_reached;
use cpr_core::format::{format_clock, format_countdown};
use cpr_core::suggestions::build_digest;
use cpr_core::*;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cprtrack")]
#[command(about = "Resuscitation code tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the code console, reading commands from stdin (default)
    Run {
        /// Only advance time on `tick` (for scripts and tests)
        #[arg(long)]
        scripted: bool,
    },

    /// Show the stored session without modifying it
    Status,

    /// List finished codes
    History,

    /// Print a finished code by id, or `last`
    Show { record: RecordSelector },
}

/// One console line
#[derive(Parser)]
#[command(no_binary_name = true, name = "console")]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand)]
enum ConsoleCommand {
    /// Start a new code
    Start,

    /// Log an event (compressions, shock, epinephrine, amiodarone, lidocaine,
    /// medication, note, rosc, pulseless)
    Log {
        kind: EventKind,

        /// Who performed it
        #[arg(long = "by")]
        actor: Option<String>,

        /// Medication name for `medication` events
        #[arg(long)]
        med: Option<String>,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        details: Vec<String>,
    },

    /// Deliver a shock, at the next energy on the ladder unless given
    Shock { energy: Option<String> },

    /// Delete a logged event by id
    Delete { id: EventId },

    /// Acknowledge an alert (rhythm, prepare, epi)
    Dismiss { alert: AlertKind },

    /// Classify the presenting rhythm (shockable, non-shockable)
    Path { path: AlgorithmPath },

    /// Toggle one of the H's and T's
    Cause { cause: ReversibleCause },

    /// Change a countdown interval (rhythm, epi)
    Timer { timer: TimerKind, seconds: u32 },

    /// Update patient details
    Patient {
        #[arg(long)]
        hn: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        sex: Option<String>,
        #[arg(long)]
        history: Option<String>,
        #[arg(long)]
        diagnosis: Option<String>,
    },

    /// Advance the clock by whole seconds
    Tick {
        #[arg(default_value_t = 1)]
        seconds: u32,
    },

    /// Revert the last logged change
    Undo,

    /// End the code and save it to history
    End,

    /// Discard the current code
    Reset,

    /// Show timers, totals and alerts
    Status,

    /// Show the event log, newest first
    Events,

    /// Show the H's and T's checklist
    Causes,

    /// Print the summary sent to the suggestion service
    Digest,

    /// Open a finished code read-only
    View { record: RecordSelector },

    /// Close the record being viewed
    Close,

    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

enum Flow {
    Continue,
    Quit,
}

fn main() -> Result<()> {
    cpr_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data_dir().to_path_buf());

    match cli.command {
        Some(Commands::Run { scripted }) => cmd_run(&data_dir, &config, scripted),
        Some(Commands::Status) => cmd_status(&data_dir),
        Some(Commands::History) => cmd_history(&data_dir),
        Some(Commands::Show { record }) => cmd_show(&data_dir, record),
        None => cmd_run(&data_dir, &config, false),
    }
}

fn cmd_run(data_dir: &Path, config: &Config, scripted: bool) -> Result<()> {
    let store = FileStore::new(data_dir);
    if scripted {
        let clock = ManualClock::new(Utc::now());
        let tracker = Tracker::open(store, &clock, config)?;
        console(tracker, Some(&clock))
    } else {
        let tracker = Tracker::open(store, SystemClock, config)?;
        console(tracker, None)
    }
}

fn console<C: Clock>(mut tracker: Tracker<FileStore, C>, manual: Option<&ManualClock>) -> Result<()> {
    match tracker.session().status {
        SessionStatus::Active => println!(
            "Resumed code in progress ({} elapsed).",
            format_clock(tracker.session().elapsed_seconds as i64)
        ),
        SessionStatus::Review => println!("Resumed ended code awaiting reset."),
        _ => println!("No code in progress. Type `start` to begin, `help` for commands."),
    }

    let mut seen_alerts = tracker.session().alerts;
    let mut seen_prompt = None;
    print_prompt()?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            print_prompt()?;
            continue;
        }

        if manual.is_none() {
            let ticks = tracker.catch_up_ticks()?;
            if ticks > 0 {
                tracing::debug!("Caught up {} ticks before `{}`", ticks, words[0]);
            }
        }

        let flow = match ConsoleLine::try_parse_from(words) {
            Ok(parsed) => run_command(&mut tracker, parsed.command, manual)?,
            Err(e) => {
                match e.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                        print!("{}", e.render())
                    }
                    _ => eprint!("{}", e.render()),
                }
                Flow::Continue
            }
        };
        if let Flow::Quit = flow {
            break;
        }

        announce(&mut tracker, &mut seen_alerts, &mut seen_prompt)?;
        print_prompt()?;
    }

    println!();
    Ok(())
}

fn print_prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

fn run_command<C: Clock>(
    tracker: &mut Tracker<FileStore, C>,
    command: ConsoleCommand,
    manual: Option<&ManualClock>,
) -> Result<Flow> {
    match command {
        ConsoleCommand::Start => {
            if tracker.session().status != SessionStatus::Inactive {
                println!("A code is already open. `end` and `reset` it first.");
            } else {
                if let Some(started) = tracker.start()?.started_at {
                    println!("✓ Code started at {}", started.format("%H:%M:%S"));
                }
            }
        }
        ConsoleCommand::Log {
            kind,
            actor,
            med,
            details,
        } => {
            if antiarrhythmic_limit_reached(&tracker.session().summary_counts, kind) {
                println!("Note: cumulative {} dose has reached its maximum.", kind.label());
            }
            let mut event = NewEvent::new(kind);
            if !details.is_empty() {
                event = event.with_details(details.join(" "));
            }
            if let Some(actor) = actor {
                event = event.with_actor(actor);
            }
            if let Some(med) = med {
                event = event.with_medication(med);
            }
            log_event(tracker, event)?;
        }
        ConsoleCommand::Shock { energy } => {
            let energy = energy.unwrap_or_else(|| {
                let joules = next_shock_energy(tracker.session().last_shock_energy.as_deref());
                format!("{}J", joules)
            });
            log_event(tracker, NewEvent::new(EventKind::ShockDelivered).with_details(energy))?;
        }
        ConsoleCommand::Delete { id } => {
            let before = tracker.session().event_log.len();
            tracker.dispatch(Action::DeleteEvent(id))?;
            if tracker.session().event_log.len() < before {
                println!("✓ Deleted event {}", id);
            } else {
                println!("No event {} in the log.", id);
            }
        }
        ConsoleCommand::Dismiss { alert } => {
            tracker.dispatch(Action::DismissAlert(alert))?;
        }
        ConsoleCommand::Path { path } => {
            if tracker.session().algorithm.path.is_some() {
                println!("Rhythm already classified.");
            } else {
                tracker.dispatch(Action::SetPath(path))?;
                println!("✓ {}", path.classification());
            }
        }
        ConsoleCommand::Cause { cause } => {
            if !tracker.session().is_active() {
                println!("No code in progress.");
            } else {
                tracker.dispatch(Action::ToggleCause(cause))?;
                let considered = tracker.session().reversible_causes.is_considered(cause);
                log_event(tracker, NewEvent::checklist_update(cause, considered))?;
            }
        }
        ConsoleCommand::Timer { timer, seconds } => {
            if seconds == 0 {
                println!("Interval must be greater than zero.");
            } else {
                tracker.dispatch(Action::UpdateTimerSetting { timer, seconds })?;
            }
        }
        ConsoleCommand::Patient {
            hn,
            name,
            age,
            sex,
            history,
            diagnosis,
        } => {
            tracker.dispatch(Action::UpdatePatient(PatientUpdate {
                hn,
                name,
                age,
                sex,
                history,
                diagnosis,
            }))?;
        }
        ConsoleCommand::Tick { seconds } => match manual {
            Some(clock) => {
                clock.advance(seconds as i64);
                tracker.catch_up_ticks()?;
            }
            None => {
                tracker.tick(seconds)?;
            }
        },
        ConsoleCommand::Undo => {
            if tracker.session().can_undo() && tracker.session().is_active() {
                tracker.dispatch(Action::Undo)?;
                println!("✓ Undone");
            } else {
                println!("Nothing to undo.");
            }
        }
        ConsoleCommand::End => {
            if tracker.session().is_active() {
                tracker.dispatch(Action::End)?;
                println!(
                    "✓ Code ended after {}. Saved to history.",
                    format_clock(tracker.session().elapsed_seconds as i64)
                );
            } else {
                println!("No code in progress.");
            }
        }
        ConsoleCommand::Reset => {
            tracker.dispatch(Action::Reset)?;
            println!("✓ Session cleared");
        }
        ConsoleCommand::Status => print_session(tracker.session()),
        ConsoleCommand::Events => print_events(tracker.session().event_log.iter()),
        ConsoleCommand::Causes => print_causes(&tracker.session().reversible_causes),
        ConsoleCommand::Digest => print!("{}", build_digest(tracker.session())),
        ConsoleCommand::View { record } => {
            if tracker.session().status != SessionStatus::Inactive {
                println!("Finish the current code before viewing history.");
            } else {
                let history = tracker.history()?;
                match find_record(&history, record) {
                    Some(found) => {
                        tracker.dispatch(Action::ViewHistory(Box::new(found.clone())))?;
                        print_record(found);
                    }
                    None => println!("No matching record."),
                }
            }
        }
        ConsoleCommand::Close => {
            tracker.dispatch(Action::CloseHistory)?;
        }
        ConsoleCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn log_event<C: Clock>(tracker: &mut Tracker<FileStore, C>, event: NewEvent) -> Result<()> {
    if !tracker.session().is_active() {
        println!("No code in progress.");
        return Ok(());
    }
    tracker.dispatch(Action::LogEvent(event))?;
    if let Some(logged) = tracker.session().latest_event() {
        println!(
            "✓ [{}] {} {}{}",
            logged.id,
            format_clock(logged.occurred_at_elapsed_seconds as i64),
            logged.kind.label(),
            logged
                .details
                .as_deref()
                .map(|d| format!(" - {}", d))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Print newly raised alerts and handle a freshly opened prompt
fn announce<C: Clock>(
    tracker: &mut Tracker<FileStore, C>,
    seen_alerts: &mut Alerts,
    seen_prompt: &mut Option<Prompt>,
) -> Result<()> {
    let alerts = tracker.session().alerts;
    if alerts.rhythm_check_due && !seen_alerts.rhythm_check_due {
        println!("! RHYTHM CHECK DUE");
    }
    if alerts.prepare_epinephrine && !seen_alerts.prepare_epinephrine {
        println!("! PREPARE EPINEPHRINE");
    }
    if alerts.epinephrine_due && !seen_alerts.epinephrine_due {
        println!("! EPINEPHRINE DUE");
    }
    if alerts.no_flow && !seen_alerts.no_flow {
        println!("! NO FLOW: resume compressions");
    }
    *seen_alerts = alerts;

    let prompt = tracker.session().pending_prompt;
    if prompt != *seen_prompt {
        match prompt {
            Some(Prompt::InitialRhythm) => {
                println!("Classify the rhythm: `path shockable` or `path non-shockable`")
            }
            Some(Prompt::Recommendation) => {
                if let Some(rec) = recommend(&tracker.session().algorithm) {
                    println!("→ {}: {}", rec.title, rec.description);
                }
                tracker.dispatch(Action::ClosePrompt)?;
            }
            None => {}
        }
    }
    *seen_prompt = tracker.session().pending_prompt;
    Ok(())
}

fn cmd_status(data_dir: &Path) -> Result<()> {
    let store = FileStore::new(data_dir);
    match store.load_snapshot()? {
        Some(snapshot) => {
            let session = apply(&Session::default(), Action::Load(Box::new(snapshot)), Utc::now());
            print_session(&session);
        }
        None => println!("No code in progress."),
    }
    Ok(())
}

fn cmd_history(data_dir: &Path) -> Result<()> {
    let history = FileStore::new(data_dir).load_history()?;
    if history.is_empty() {
        println!("No finished codes recorded.");
        return Ok(());
    }
    for record in history.iter().rev() {
        println!(
            "{}  {}  {}  {:<7}  shocks {}  epi {}",
            record.id,
            record.started_at.format("%Y-%m-%d %H:%M"),
            format_clock(record.elapsed_seconds as i64),
            record.outcome.label(),
            record.summary_counts.shocks,
            record.summary_counts.epinephrine,
        );
    }
    Ok(())
}

fn cmd_show(data_dir: &Path, selector: RecordSelector) -> Result<()> {
    let history = FileStore::new(data_dir).load_history()?;
    let record = find_record(&history, selector)
        .ok_or_else(|| Error::Store("No matching record in history".into()))?;
    print_record(record);
    Ok(())
}

fn print_session(session: &Session) {
    println!("Status: {:?}", session.status);
    if session.status == SessionStatus::Inactive {
        return;
    }
    if let Some(record) = &session.viewing {
        print_record(record);
        return;
    }

    let countdown = |t: Option<u32>| match t {
        Some(secs) => format_countdown(secs as i64),
        None => "off".to_string(),
    };
    let counts = &session.summary_counts;

    println!("Elapsed: {}", format_clock(session.elapsed_seconds as i64));
    println!("Rhythm check: {}", countdown(session.timers.rhythm_check_remaining));
    println!("Epinephrine: {}", countdown(session.timers.epinephrine_remaining));
    println!(
        "Shocks: {} (last {}, next {}J)",
        counts.shocks,
        session.last_shock_energy.as_deref().unwrap_or("none"),
        next_shock_energy(session.last_shock_energy.as_deref())
    );
    println!("Epinephrine doses: {}", counts.epinephrine);
    println!("Amiodarone: {} mg", counts.amiodarone_mg);
    println!("Lidocaine: {} mg", counts.lidocaine_mg);
    for (name, n) in &counts.other_medications {
        println!("{}: x{}", name, n);
    }

    match (session.algorithm.path, recommend(&session.algorithm)) {
        (Some(path), Some(rec)) => println!(
            "Algorithm: {:?} step {} - {}",
            path, session.algorithm.step, rec.title
        ),
        _ => println!("Algorithm: rhythm not classified"),
    }

    let causes = session.reversible_causes.considered();
    if !causes.is_empty() {
        let labels: Vec<&str> = causes.iter().map(|c| c.label()).collect();
        println!("Causes considered: {}", labels.join(", "));
    }

    let alerts = session.alerts;
    if alerts.rhythm_check_due {
        println!("ALERT: rhythm check due");
    }
    if alerts.prepare_epinephrine {
        println!("ALERT: prepare epinephrine");
    }
    if alerts.epinephrine_due {
        println!("ALERT: epinephrine due");
    }
    if alerts.no_flow {
        println!("ALERT: no flow");
    }
    if session.can_undo() {
        println!("Undo available");
    }
}

fn print_events<'a>(events: impl Iterator<Item = &'a EventRecord>) {
    let mut any = false;
    for event in events {
        any = true;
        println!(
            "[{}] {}  {}{}  ({})",
            event.id,
            format_clock(event.occurred_at_elapsed_seconds as i64),
            event.kind.label(),
            event
                .details
                .as_deref()
                .map(|d| format!(" - {}", d))
                .unwrap_or_default(),
            event.actor
        );
    }
    if !any {
        println!("No events logged.");
    }
}

fn print_causes(causes: &ReversibleCauses) {
    for cause in ReversibleCause::ALL {
        let mark = if causes.is_considered(cause) { "x" } else { " " };
        println!("[{}] {}", mark, cause.label());
    }
}

fn print_record(record: &SavedRecord) {
    println!("Record {}", record.id);
    println!(
        "Started: {}  Duration: {}  Outcome: {}",
        record.started_at.format("%Y-%m-%d %H:%M:%S"),
        format_clock(record.elapsed_seconds as i64),
        record.outcome.label()
    );
    if !record.patient.name.is_empty() || !record.patient.hn.is_empty() {
        println!("Patient: {} (HN {})", record.patient.name, record.patient.hn);
    }
    println!(
        "Shocks {}  Epinephrine {}  Amiodarone {} mg  Lidocaine {} mg",
        record.summary_counts.shocks,
        record.summary_counts.epinephrine,
        record.summary_counts.amiodarone_mg,
        record.summary_counts.lidocaine_mg
    );
    print_events(record.events.iter());
}
