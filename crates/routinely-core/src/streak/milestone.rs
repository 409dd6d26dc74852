use serde::Serialize;

use super::record::StreakRecord;

/// A habit-formation checkpoint measured against the longest streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub days: u32,
    pub title: &'static str,
    pub description: &'static str,
}

const MILESTONES: [Milestone; 5] = [
    Milestone {
        days: 7,
        title: "One Week Streak",
        description: "Completed 7 consecutive days",
    },
    Milestone {
        days: 21,
        title: "Habit Forming",
        description: "21 days is a great start for habit formation",
    },
    Milestone {
        days: 30,
        title: "Monthly Dedication",
        description: "Completed a full month!",
    },
    Milestone {
        days: 66,
        title: "Habit Mastery",
        description: "Research suggests 66 days to form stable habits",
    },
    Milestone {
        days: 100,
        title: "Century Club",
        description: "Triple digits achievement",
    },
];

/// All milestones in ascending day order.
pub fn milestones() -> &'static [Milestone] {
    &MILESTONES
}

impl Milestone {
    pub fn is_achieved(&self, record: &StreakRecord) -> bool {
        record.longest_streak >= self.days
    }
}

pub fn achieved_milestones(record: &StreakRecord) -> Vec<Milestone> {
    MILESTONES
        .iter()
        .copied()
        .filter(|m| m.is_achieved(record))
        .collect()
}

/// The first milestone not yet reached, if any remain.
pub fn next_milestone(record: &StreakRecord) -> Option<Milestone> {
    MILESTONES.iter().copied().find(|m| !m.is_achieved(record))
}
