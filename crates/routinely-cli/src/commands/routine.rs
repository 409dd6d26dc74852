use clap::Subcommand;
use routinely_core::streak::StreakStore;
use routinely_core::{Database, Routine, Task};

use super::{print_json, refresh_achievements, require_routine, CliResult};

#[derive(Subcommand)]
pub enum RoutineAction {
    /// Create a routine
    Add {
        /// Routine title
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Append a task to a routine
    AddTask {
        /// Routine ID
        routine_id: String,
        /// Task title
        title: String,
        /// Countdown length in minutes
        #[arg(long, conflicts_with = "seconds")]
        minutes: Option<u32>,
        /// Countdown length in seconds
        #[arg(long)]
        seconds: Option<u32>,
    },
    /// List all routines
    List,
    /// Show a routine with its tasks
    Show {
        /// Routine ID
        id: String,
    },
    /// Delete a routine and all of its streak data
    Delete {
        /// Routine ID
        id: String,
    },
}

pub fn run(action: RoutineAction) -> CliResult {
    let db = Database::open()?;
    match action {
        RoutineAction::Add { title, description } => {
            let mut routine = Routine::new(title);
            routine.description = description;
            db.insert_routine(&routine)?;
            refresh_achievements(&db)?;
            print_json(&routine)?;
        }
        RoutineAction::AddTask {
            routine_id,
            title,
            minutes,
            seconds,
        } => {
            let mut routine = require_routine(&db, &routine_id)?;
            let task = match (minutes, seconds) {
                (Some(m), _) => Task::with_minutes(title, m),
                (None, s) => Task::new(title, s.unwrap_or(0)),
            };
            routine.tasks.push(task);
            routine.timer_enabled = routine.tasks.iter().any(|t| t.duration_secs() > 0);
            db.update_routine(&routine)?;
            print_json(&routine)?;
        }
        RoutineAction::List => {
            print_json(&db.list_routines()?)?;
        }
        RoutineAction::Show { id } => {
            let routine = require_routine(&db, &id)?;
            let streak = db.streak(&id)?;
            print_json(&serde_json::json!({
                "routine": routine,
                "total_duration_secs": routine.total_duration_secs(),
                "streak": streak,
            }))?;
        }
        RoutineAction::Delete { id } => {
            if !db.delete_routine(&id)? {
                return Err(format!("routine not found: {id}").into());
            }
            println!("ok");
        }
    }
    Ok(())
}
