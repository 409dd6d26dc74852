pub mod achievements;
pub mod config;
pub mod routine;
pub mod streak;
pub mod timer;

use std::error::Error;

use chrono::Utc;
use routinely_core::{check_and_update, AchievementMetrics, Database, Event, Routine, ValidationError};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn Error>>;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load a routine or fail with a not-found error.
pub fn require_routine(db: &Database, id: &str) -> Result<Routine, Box<dyn Error>> {
    db.get_routine(id)?.ok_or_else(|| {
        ValidationError::NotFound {
            entity: "routine".into(),
            id: id.to_string(),
        }
        .into()
    })
}

/// Re-evaluate achievements and report new unlocks on stderr.
pub fn refresh_achievements(db: &Database) -> Result<Vec<Event>, Box<dyn Error>> {
    let metrics = AchievementMetrics::collect(db)?;
    let unlocked = check_and_update(db, &metrics, Utc::now())?;
    for event in &unlocked {
        if let Event::AchievementUnlocked { title, .. } = event {
            eprintln!("Achievement unlocked: {title}");
        }
    }
    Ok(unlocked)
}
