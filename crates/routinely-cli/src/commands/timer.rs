use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use routinely_core::achievements::COMPLETED_TASKS_KEY;
use routinely_core::{
    Config, CountdownDriver, Database, Event, Routine, StreakTracker, SystemClock,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use super::{print_json, refresh_achievements, require_routine, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Count down a routine's tasks in the foreground.
    ///
    /// Prints one JSON snapshot per change. Control it by typing a command
    /// and Enter: p(ause), r(esume), n(ext), b(ack), x (reset), q(uit).
    Run {
        /// Routine ID
        routine_id: String,
    },
}

pub fn run(action: TimerAction, config: &Config) -> CliResult {
    match action {
        TimerAction::Run { routine_id } => {
            let db = Arc::new(Database::open()?);
            let routine = require_routine(&db, &routine_id)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(run_routine(db, routine, config));
            // Stdin is read on a blocking thread that cannot be cancelled.
            runtime.shutdown_timeout(Duration::from_millis(100));
            result
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Stopped,
}

async fn run_routine(db: Arc<Database>, routine: Routine, config: &Config) -> CliResult {
    let tracker = Arc::new(
        StreakTracker::new(Arc::clone(&db), SystemClock)
            .with_default_goal(config.streak.default_goal),
    );
    let on_complete = Arc::clone(&tracker);
    let mut driver = CountdownDriver::new()
        .with_intervals(config.timer.poll_interval(), config.timer.tick_length())
        .on_routine_complete(move |routine_id| match on_complete.mark_completed(routine_id) {
            Ok(recorded) => info!(routine_id, recorded, "routine completion recorded"),
            Err(e) => error!(routine_id, error = %e, "failed to record routine completion"),
        });

    let mut events = driver.events().subscribe();
    let mut snapshots = driver.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let has_tasks = !routine.tasks.is_empty();
    let routine_id = routine.id.clone();
    let mut completed_tasks = 0u64;

    driver.start(routine);
    let outcome = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Outcome::Stopped;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                println!("{}", serde_json::to_string(&snapshot)?);
            }
            event = events.recv() => match event {
                Ok(Event::TaskAdvanced { .. }) => completed_tasks += 1,
                Ok(Event::RoutineCompleted { .. }) => {
                    if has_tasks {
                        completed_tasks += 1;
                    }
                    break Outcome::Completed;
                }
                Ok(Event::TimerStopped { .. }) | Err(RecvError::Closed) => break Outcome::Stopped,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "timer events lagged"),
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => apply_command(&mut driver, line.trim()),
                None => stdin_open = false,
            },
        }
    };

    if completed_tasks > 0 {
        db.kv_increment(COMPLETED_TASKS_KEY, completed_tasks)?;
    }
    refresh_achievements(&db)?;

    print_json(&json!({
        "outcome": match outcome {
            Outcome::Completed => "completed",
            Outcome::Stopped => "stopped",
        },
        "completed_tasks": completed_tasks,
        "streak": tracker.streak(&routine_id)?,
    }))
}

fn apply_command(driver: &mut CountdownDriver, command: &str) {
    match command {
        "p" | "pause" => driver.pause(),
        "r" | "resume" => driver.resume(),
        "n" | "next" => driver.move_to_next(),
        "b" | "back" => driver.move_to_previous(),
        "x" | "reset" => driver.reset(),
        "q" | "quit" | "stop" => driver.stop(),
        "" => {}
        other => eprintln!("unknown command: {other} (p, r, n, b, x, q)"),
    }
}
