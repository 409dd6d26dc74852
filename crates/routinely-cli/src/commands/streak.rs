use std::sync::Arc;

use chrono::NaiveDate;
use clap::Subcommand;
use routinely_core::streak::{milestones, next_milestone, StreakRecord};
use routinely_core::{Clock, Config, Database, FixedClock, StreakTracker, SystemClock};
use serde_json::json;

use super::{print_json, refresh_achievements, require_routine, CliResult};

#[derive(Subcommand)]
pub enum StreakAction {
    /// Mark a routine completed for today
    Complete {
        /// Routine ID
        routine_id: String,
        /// Override today's date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Cover a single missed day with the streak saver
    Saver {
        /// Routine ID
        routine_id: String,
        /// Override today's date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Make the streak saver available again
    ResetSaver {
        /// Routine ID
        routine_id: String,
    },
    /// Set the streak goal in days
    Goal {
        /// Routine ID
        routine_id: String,
        /// Goal in days (must be positive)
        days: i32,
    },
    /// Show streak status
    Show {
        /// Routine ID
        routine_id: String,
        /// Override today's date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List completion records, newest first
    History {
        /// Routine ID
        routine_id: String,
    },
    /// Show one month of completions
    Calendar {
        /// Routine ID
        routine_id: String,
        year: i32,
        month: u32,
    },
    /// Show reached and upcoming milestones
    Milestones {
        /// Routine ID
        routine_id: String,
    },
}

type Tracker = StreakTracker<Arc<Database>, Arc<dyn Clock>>;

fn tracker(db: &Arc<Database>, config: &Config, date: Option<NaiveDate>) -> Tracker {
    let clock: Arc<dyn Clock> = match date {
        Some(date) => Arc::new(FixedClock::new(date)),
        None => Arc::new(SystemClock),
    };
    StreakTracker::new(Arc::clone(db), clock).with_default_goal(config.streak.default_goal)
}

fn status(tracker: &Tracker, routine_id: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let record = tracker.streak(routine_id)?;
    Ok(json!({
        "streak": record,
        "progress": record.as_ref().map(StreakRecord::progress_fraction).unwrap_or(0.0),
        "is_streak_active": tracker.is_streak_active(routine_id)?,
        "can_use_streak_saver": tracker.can_use_streak_saver(routine_id)?,
        "completions": tracker.completion_counts(routine_id)?,
    }))
}

pub fn run(action: StreakAction, config: &Config) -> CliResult {
    let db = Arc::new(Database::open()?);
    match action {
        StreakAction::Complete { routine_id, date } => {
            require_routine(&db, &routine_id)?;
            let tracker = tracker(&db, config, date);
            let recorded = tracker.mark_completed(&routine_id)?;
            if recorded {
                refresh_achievements(&db)?;
            }
            print_json(&json!({
                "recorded": recorded,
                "streak": tracker.streak(&routine_id)?,
            }))?;
        }
        StreakAction::Saver { routine_id, date } => {
            require_routine(&db, &routine_id)?;
            let tracker = tracker(&db, config, date);
            let applied = tracker.use_streak_saver(&routine_id)?;
            print_json(&json!({
                "applied": applied,
                "streak": tracker.streak(&routine_id)?,
            }))?;
        }
        StreakAction::ResetSaver { routine_id } => {
            require_routine(&db, &routine_id)?;
            tracker(&db, config, None).reset_streak_saver_availability(&routine_id)?;
            println!("ok");
        }
        StreakAction::Goal { routine_id, days } => {
            if days <= 0 {
                return Err(format!("goal must be a positive number of days, got {days}").into());
            }
            require_routine(&db, &routine_id)?;
            let record = tracker(&db, config, None).set_goal(&routine_id, days)?;
            print_json(&record)?;
        }
        StreakAction::Show { routine_id, date } => {
            require_routine(&db, &routine_id)?;
            print_json(&status(&tracker(&db, config, date), &routine_id)?)?;
        }
        StreakAction::History { routine_id } => {
            require_routine(&db, &routine_id)?;
            print_json(&tracker(&db, config, None).history(&routine_id)?)?;
        }
        StreakAction::Calendar {
            routine_id,
            year,
            month,
        } => {
            require_routine(&db, &routine_id)?;
            let calendar = tracker(&db, config, None).month_calendar(&routine_id, year, month)?;
            print_json(&calendar)?;
        }
        StreakAction::Milestones { routine_id } => {
            require_routine(&db, &routine_id)?;
            let record = tracker(&db, config, None)
                .streak(&routine_id)?
                .unwrap_or_else(|| StreakRecord::new(&routine_id, config.streak.default_goal));
            let entries: Vec<_> = milestones()
                .iter()
                .map(|m| {
                    json!({
                        "days": m.days,
                        "title": m.title,
                        "description": m.description,
                        "achieved": m.is_achieved(&record),
                    })
                })
                .collect();
            print_json(&json!({
                "longest_streak": record.longest_streak,
                "milestones": entries,
                "next": next_milestone(&record),
            }))?;
        }
    }
    Ok(())
}
