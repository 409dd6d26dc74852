//! App-wide achievements.
//!
//! The catalogue is fixed; the database stores unlock state. Each
//! achievement unlocks at most once and keeps its first unlock time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::events::Event;
use crate::storage::Database;

/// kv key for the lifetime count of tasks finished through the timer.
pub const COMPLETED_TASKS_KEY: &str = "stats.completed_tasks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Routines,
    CompletedTasks,
    ConsecutiveDays,
}

/// Catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDef {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub metric: Metric,
    pub threshold: u64,
}

const CATALOGUE: [AchievementDef; 4] = [
    AchievementDef {
        id: "first_routine",
        title: "First Steps",
        description: "Create your first routine",
        metric: Metric::Routines,
        threshold: 1,
    },
    AchievementDef {
        id: "task_master",
        title: "Task Master",
        description: "Complete 10 tasks",
        metric: Metric::CompletedTasks,
        threshold: 10,
    },
    AchievementDef {
        id: "organisation_pro",
        title: "Organisation Pro",
        description: "Create 5 routines",
        metric: Metric::Routines,
        threshold: 5,
    },
    AchievementDef {
        id: "consistency",
        title: "Consistency",
        description: "Complete a routine 7 days in a row",
        metric: Metric::ConsecutiveDays,
        threshold: 7,
    },
];

pub fn catalogue() -> &'static [AchievementDef] {
    &CATALOGUE
}

/// Stored achievement with unlock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Counters the catalogue thresholds are measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AchievementMetrics {
    pub routines: u64,
    pub completed_tasks: u64,
    /// Best streak across all routines.
    pub consecutive_days: u64,
}

impl AchievementMetrics {
    /// Read the current counters from the database.
    pub fn collect(db: &Database) -> Result<Self> {
        let completed_tasks = db
            .kv_get(COMPLETED_TASKS_KEY)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(Self {
            routines: db.routine_count()?,
            completed_tasks,
            consecutive_days: u64::from(db.max_longest_streak()?),
        })
    }

    fn value(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Routines => self.routines,
            Metric::CompletedTasks => self.completed_tasks,
            Metric::ConsecutiveDays => self.consecutive_days,
        }
    }
}

impl AchievementDef {
    pub fn is_met(&self, metrics: &AchievementMetrics) -> bool {
        metrics.value(self.metric) >= self.threshold
    }
}

/// Seed the catalogue, then unlock every achievement whose threshold is met.
///
/// Returns an [`Event::AchievementUnlocked`] for each newly unlocked entry.
pub fn check_and_update(
    db: &Database,
    metrics: &AchievementMetrics,
    now: DateTime<Utc>,
) -> Result<Vec<Event>> {
    db.seed_achievements(catalogue())?;

    let mut unlocked = Vec::new();
    for def in catalogue().iter().filter(|d| d.is_met(metrics)) {
        if db.unlock_achievement(def.id, now)? {
            info!(achievement = def.id, "achievement unlocked");
            unlocked.push(Event::AchievementUnlocked {
                id: def.id.to_string(),
                title: def.title.to_string(),
                at: now,
            });
        }
    }
    Ok(unlocked)
}
