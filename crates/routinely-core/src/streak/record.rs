use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Goal used when a routine has never had one set.
pub const DEFAULT_STREAK_GOAL: i32 = 30;

/// Per-routine streak bookkeeping.
///
/// Invariants maintained by [`StreakRecord::apply_completion`]:
/// `current_streak <= longest_streak`, and `days_completed` never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub routine_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// `None` means the routine has never been completed.
    pub last_completed_date: Option<NaiveDate>,
    /// Target day count. Not validated here; non-positive goals yield zero progress.
    pub streak_goal: i32,
    pub streak_saver_used: bool,
    pub streak_saver_available: bool,
    /// Lifetime count of genuine completions.
    pub days_completed: u32,
}

/// Which branch a completion took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// First completion of a record that had no last date.
    Started,
    /// Completed the day after the previous completion.
    Extended,
    /// Last completion is already today; streak fields untouched.
    AlreadyCounted,
    /// A gap of two or more days; streak restarts at one.
    Restarted,
    /// `today` is earlier than the last completion; nothing changes.
    Stale,
}

impl StreakRecord {
    /// A record for a routine that has never been completed.
    pub fn new(routine_id: impl Into<String>, streak_goal: i32) -> Self {
        Self {
            routine_id: routine_id.into(),
            current_streak: 0,
            longest_streak: 0,
            last_completed_date: None,
            streak_goal,
            streak_saver_used: false,
            streak_saver_available: true,
            days_completed: 0,
        }
    }

    /// The record synthesized for a routine's very first completion.
    ///
    /// `last_completed_date` is set to the day before `today`, so the first
    /// completion continues into a one-day streak.
    pub fn first_completion(routine_id: impl Into<String>, streak_goal: i32, today: NaiveDate) -> Self {
        Self {
            last_completed_date: days_before(today, 1),
            ..Self::new(routine_id, streak_goal)
        }
    }

    /// Apply a genuine completion on `today` to the streak fields.
    pub fn apply_completion(&mut self, today: NaiveDate) -> CompletionOutcome {
        let Some(last) = self.last_completed_date else {
            self.current_streak = 1;
            self.longest_streak = self.longest_streak.max(1);
            self.days_completed = 1;
            self.last_completed_date = Some(today);
            return CompletionOutcome::Started;
        };

        if Some(last) == days_before(today, 1) {
            self.current_streak = self.current_streak.saturating_add(1);
            self.longest_streak = self.longest_streak.max(self.current_streak);
            self.days_completed = self.days_completed.saturating_add(1);
            self.last_completed_date = Some(today);
            CompletionOutcome::Extended
        } else if last == today {
            CompletionOutcome::AlreadyCounted
        } else if today < last {
            CompletionOutcome::Stale
        } else {
            self.current_streak = 1;
            self.days_completed = self.days_completed.saturating_add(1);
            self.last_completed_date = Some(today);
            debug_assert!(self.current_streak <= self.longest_streak);
            CompletionOutcome::Restarted
        }
    }

    /// `current_streak / streak_goal`, or 0.0 for a non-positive goal.
    pub fn progress_fraction(&self) -> f64 {
        if self.streak_goal <= 0 {
            return 0.0;
        }
        f64::from(self.current_streak) / f64::from(self.streak_goal)
    }

    /// True when the last completion was today or yesterday.
    pub fn is_streak_active(&self, today: NaiveDate) -> bool {
        match self.last_completed_date {
            Some(last) => last == today || Some(last) == days_before(today, 1),
            None => false,
        }
    }

    /// True when the grace token can rescue a streak that missed exactly yesterday.
    pub fn can_use_streak_saver(&self, today: NaiveDate) -> bool {
        if !self.streak_saver_available || self.streak_saver_used {
            return false;
        }
        match self.last_completed_date {
            Some(last) => Some(last) == days_before(today, 2),
            None => false,
        }
    }
}

/// A persisted marker that a routine was completed (or saver-covered) on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub routine_id: String,
    pub completed_date: NaiveDate,
    #[serde(default)]
    pub is_streak_saver: bool,
}

impl CompletionRecord {
    pub fn genuine(routine_id: impl Into<String>, completed_date: NaiveDate) -> Self {
        Self {
            routine_id: routine_id.into(),
            completed_date,
            is_streak_saver: false,
        }
    }

    pub fn streak_saver(routine_id: impl Into<String>, completed_date: NaiveDate) -> Self {
        Self {
            routine_id: routine_id.into(),
            completed_date,
            is_streak_saver: true,
        }
    }
}

pub(crate) fn days_before(date: NaiveDate, days: u64) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(days))
}
