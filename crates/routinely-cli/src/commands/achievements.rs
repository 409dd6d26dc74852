use clap::Subcommand;
use routinely_core::achievements::catalogue;
use routinely_core::{AchievementMetrics, Database};
use serde_json::json;

use super::{print_json, refresh_achievements, CliResult};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// List achievements with unlock state
    List,
    /// Re-evaluate thresholds and unlock anything newly earned
    Check,
}

pub fn run(action: AchievementsAction) -> CliResult {
    let db = Database::open()?;
    match action {
        AchievementsAction::List => {
            db.seed_achievements(catalogue())?;
            print_json(&db.achievements()?)?;
        }
        AchievementsAction::Check => {
            let unlocked = refresh_achievements(&db)?;
            print_json(&json!({
                "metrics": AchievementMetrics::collect(&db)?,
                "unlocked": unlocked,
            }))?;
        }
    }
    Ok(())
}
