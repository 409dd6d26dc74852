//! Streak tracker.
//!
//! Applies "routine completed" events to a routine's streak record and
//! implements the one-shot streak saver. Every read-modify-write of a
//! routine's record runs under that routine's lock, so concurrent calls for
//! the same routine cannot lose updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use super::calendar::MonthCalendar;
use super::record::{
    days_before, CompletionOutcome, CompletionRecord, StreakRecord, DEFAULT_STREAK_GOAL,
};
use super::store::StreakStore;
use crate::clock::Clock;
use crate::error::Result;
use crate::events::{Event, EventBus};

/// Lifetime completion totals for a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionCounts {
    /// Every completion record, saver-covered days included.
    pub total: u32,
    /// Completions the user actually performed.
    pub genuine: u32,
}

pub struct StreakTracker<S, C> {
    store: S,
    clock: C,
    default_goal: i32,
    events: EventBus,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: StreakStore, C: Clock> StreakTracker<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            default_goal: DEFAULT_STREAK_GOAL,
            events: EventBus::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Goal given to records created implicitly by a first completion.
    pub fn with_default_goal(mut self, goal: i32) -> Self {
        self.default_goal = goal;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn routine_lock(&self, routine_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(routine_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Mark the routine completed on the clock's current date.
    pub fn mark_completed(&self, routine_id: &str) -> Result<bool> {
        self.mark_completed_on(routine_id, self.clock.today())
    }

    /// Mark the routine completed on `today`.
    ///
    /// Returns `false` without side effects when a completion already exists
    /// for that date or `today` is earlier than the last completion.
    pub fn mark_completed_on(&self, routine_id: &str, today: NaiveDate) -> Result<bool> {
        let lock = self.routine_lock(routine_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        if self.store.completion_on(routine_id, today)?.is_some() {
            debug!(routine_id, %today, "routine already completed today");
            return Ok(false);
        }

        let mut record = match self.store.streak(routine_id)? {
            Some(record) => record,
            None => StreakRecord::first_completion(routine_id, self.default_goal, today),
        };
        let outcome = record.apply_completion(today);
        if outcome == CompletionOutcome::Stale {
            debug!(routine_id, %today, last = ?record.last_completed_date, "completion predates last completion");
            return Ok(false);
        }

        let completion = CompletionRecord::genuine(routine_id, today);
        self.store.record_completion(&completion, &record)?;

        info!(
            routine_id,
            %today,
            ?outcome,
            current = record.current_streak,
            longest = record.longest_streak,
            "routine completed"
        );
        self.events.publish(Event::CompletionRecorded { record: completion });
        self.events.publish(Event::StreakUpdated { record });
        Ok(true)
    }

    /// Apply the streak saver using the clock's current date.
    pub fn use_streak_saver(&self, routine_id: &str) -> Result<bool> {
        self.use_streak_saver_on(routine_id, self.clock.today())
    }

    /// Cover yesterday with the grace token.
    ///
    /// Succeeds only when the token is available and unused and the last
    /// completion was exactly two days before `today`. Streak counts are
    /// left alone; the next genuine completion extends the streak.
    pub fn use_streak_saver_on(&self, routine_id: &str, today: NaiveDate) -> Result<bool> {
        let lock = self.routine_lock(routine_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let Some(mut record) = self.store.streak(routine_id)? else {
            debug!(routine_id, "no streak record, saver not applicable");
            return Ok(false);
        };
        if !record.can_use_streak_saver(today) {
            debug!(routine_id, %today, "streak saver not applicable");
            return Ok(false);
        }
        let Some(yesterday) = days_before(today, 1) else {
            return Ok(false);
        };

        record.last_completed_date = Some(yesterday);
        record.streak_saver_used = true;
        record.streak_saver_available = false;

        let completion = CompletionRecord::streak_saver(routine_id, yesterday);
        self.store.record_completion(&completion, &record)?;

        info!(routine_id, covered = %yesterday, "streak saver used");
        self.events.publish(Event::CompletionRecorded { record: completion });
        self.events.publish(Event::StreakSaverUsed {
            routine_id: routine_id.to_string(),
            covered_date: yesterday,
        });
        self.events.publish(Event::StreakUpdated { record });
        Ok(true)
    }

    /// Make the grace token available again. No-op without a record.
    pub fn reset_streak_saver_availability(&self, routine_id: &str) -> Result<()> {
        let lock = self.routine_lock(routine_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let Some(mut record) = self.store.streak(routine_id)? else {
            return Ok(());
        };
        record.streak_saver_available = true;
        self.store.upsert_streak(&record)?;

        debug!(routine_id, "streak saver availability reset");
        self.events.publish(Event::StreakUpdated { record });
        Ok(())
    }

    /// Set the streak goal, creating a never-completed record if needed.
    ///
    /// The goal is stored as given; callers validate positivity.
    pub fn set_goal(&self, routine_id: &str, goal: i32) -> Result<StreakRecord> {
        let lock = self.routine_lock(routine_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut record = self
            .store
            .streak(routine_id)?
            .unwrap_or_else(|| StreakRecord::new(routine_id, goal));
        record.streak_goal = goal;
        self.store.upsert_streak(&record)?;

        info!(routine_id, goal, "streak goal updated");
        self.events.publish(Event::StreakUpdated {
            record: record.clone(),
        });
        Ok(record)
    }

    /// Drop all streak data for a deleted routine.
    pub fn delete_routine_data(&self, routine_id: &str) -> Result<()> {
        {
            let lock = self.routine_lock(routine_id);
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            self.store.delete_streak_data(routine_id)?;
        }
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(routine_id);
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn streak(&self, routine_id: &str) -> Result<Option<StreakRecord>> {
        self.store.streak(routine_id)
    }

    pub fn can_use_streak_saver(&self, routine_id: &str) -> Result<bool> {
        let today = self.clock.today();
        Ok(self
            .store
            .streak(routine_id)?
            .is_some_and(|r| r.can_use_streak_saver(today)))
    }

    pub fn is_streak_active(&self, routine_id: &str) -> Result<bool> {
        let today = self.clock.today();
        Ok(self
            .store
            .streak(routine_id)?
            .is_some_and(|r| r.is_streak_active(today)))
    }

    /// Completion records, newest first.
    pub fn history(&self, routine_id: &str) -> Result<Vec<CompletionRecord>> {
        self.store.completions(routine_id)
    }

    pub fn completion_counts(&self, routine_id: &str) -> Result<CompletionCounts> {
        let records = self.store.completions(routine_id)?;
        let genuine = records.iter().filter(|r| !r.is_streak_saver).count();
        Ok(CompletionCounts {
            total: u32::try_from(records.len()).unwrap_or(u32::MAX),
            genuine: u32::try_from(genuine).unwrap_or(u32::MAX),
        })
    }

    pub fn month_calendar(&self, routine_id: &str, year: i32, month: u32) -> Result<MonthCalendar> {
        let (first, last) = super::calendar::month_bounds(year, month)?;
        let records = self.store.completions_between(routine_id, first, last)?;
        Ok(MonthCalendar::build(routine_id, year, month, &records)?)
    }
}
