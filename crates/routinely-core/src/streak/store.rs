//! Persistence seam for streak bookkeeping.
//!
//! [`crate::storage::Database`] is the SQLite backend; [`MemoryStreakStore`]
//! keeps everything in process and backs tests and embedders without a disk.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use super::record::{CompletionRecord, StreakRecord};
use crate::error::Result;

/// Storage operations the streak tracker needs, keyed by routine id.
pub trait StreakStore: Send + Sync {
    /// The streak record for a routine, if one exists.
    fn streak(&self, routine_id: &str) -> Result<Option<StreakRecord>>;

    /// Insert or replace the record keyed by `record.routine_id`.
    fn upsert_streak(&self, record: &StreakRecord) -> Result<()>;

    /// Insert a completion, replacing any record for the same `(routine_id, date)`.
    fn insert_completion(&self, record: &CompletionRecord) -> Result<()>;

    /// Write a completion and the streak record it produced as one unit.
    ///
    /// The default writes the streak first, so a failed completion insert
    /// leaves a record whose `last_completed_date` already covers the day
    /// and a retry only re-inserts the completion.
    fn record_completion(&self, completion: &CompletionRecord, streak: &StreakRecord) -> Result<()> {
        self.upsert_streak(streak)?;
        self.insert_completion(completion)
    }

    fn completion_on(&self, routine_id: &str, date: NaiveDate) -> Result<Option<CompletionRecord>>;

    /// All completion records for a routine, newest first.
    fn completions(&self, routine_id: &str) -> Result<Vec<CompletionRecord>>;

    /// Completion records with `from <= date <= to`, newest first.
    fn completions_between(
        &self,
        routine_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletionRecord>> {
        Ok(self
            .completions(routine_id)?
            .into_iter()
            .filter(|r| r.completed_date >= from && r.completed_date <= to)
            .collect())
    }

    /// Remove the streak record and all completion records of a routine.
    fn delete_streak_data(&self, routine_id: &str) -> Result<()>;
}

impl<S: StreakStore + ?Sized> StreakStore for Arc<S> {
    fn streak(&self, routine_id: &str) -> Result<Option<StreakRecord>> {
        (**self).streak(routine_id)
    }

    fn upsert_streak(&self, record: &StreakRecord) -> Result<()> {
        (**self).upsert_streak(record)
    }

    fn insert_completion(&self, record: &CompletionRecord) -> Result<()> {
        (**self).insert_completion(record)
    }

    fn record_completion(&self, completion: &CompletionRecord, streak: &StreakRecord) -> Result<()> {
        (**self).record_completion(completion, streak)
    }

    fn completion_on(&self, routine_id: &str, date: NaiveDate) -> Result<Option<CompletionRecord>> {
        (**self).completion_on(routine_id, date)
    }

    fn completions(&self, routine_id: &str) -> Result<Vec<CompletionRecord>> {
        (**self).completions(routine_id)
    }

    fn completions_between(
        &self,
        routine_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletionRecord>> {
        (**self).completions_between(routine_id, from, to)
    }

    fn delete_streak_data(&self, routine_id: &str) -> Result<()> {
        (**self).delete_streak_data(routine_id)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    streaks: HashMap<String, StreakRecord>,
    completions: HashMap<String, BTreeMap<NaiveDate, CompletionRecord>>,
}

/// In-process [`StreakStore`].
#[derive(Debug, Default)]
pub struct MemoryStreakStore {
    state: Mutex<MemoryState>,
}

impl MemoryStreakStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StreakStore for MemoryStreakStore {
    fn streak(&self, routine_id: &str) -> Result<Option<StreakRecord>> {
        Ok(self.state().streaks.get(routine_id).cloned())
    }

    fn upsert_streak(&self, record: &StreakRecord) -> Result<()> {
        self.state()
            .streaks
            .insert(record.routine_id.clone(), record.clone());
        Ok(())
    }

    fn insert_completion(&self, record: &CompletionRecord) -> Result<()> {
        self.state()
            .completions
            .entry(record.routine_id.clone())
            .or_default()
            .insert(record.completed_date, record.clone());
        Ok(())
    }

    fn record_completion(&self, completion: &CompletionRecord, streak: &StreakRecord) -> Result<()> {
        let mut state = self.state();
        state
            .completions
            .entry(completion.routine_id.clone())
            .or_default()
            .insert(completion.completed_date, completion.clone());
        state.streaks.insert(streak.routine_id.clone(), streak.clone());
        Ok(())
    }

    fn completion_on(&self, routine_id: &str, date: NaiveDate) -> Result<Option<CompletionRecord>> {
        Ok(self
            .state()
            .completions
            .get(routine_id)
            .and_then(|by_date| by_date.get(&date))
            .cloned())
    }

    fn completions(&self, routine_id: &str) -> Result<Vec<CompletionRecord>> {
        Ok(self
            .state()
            .completions
            .get(routine_id)
            .map(|by_date| by_date.values().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn delete_streak_data(&self, routine_id: &str) -> Result<()> {
        let mut state = self.state();
        state.streaks.remove(routine_id);
        state.completions.remove(routine_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn completions_are_newest_first_and_replace_on_conflict() {
        let store = MemoryStreakStore::new();
        store.insert_completion(&CompletionRecord::genuine("r", date(3))).unwrap();
        store.insert_completion(&CompletionRecord::genuine("r", date(5))).unwrap();
        store.insert_completion(&CompletionRecord::streak_saver("r", date(4))).unwrap();
        store.insert_completion(&CompletionRecord::genuine("r", date(4))).unwrap();

        let all = store.completions("r").unwrap();
        let dates: Vec<_> = all.iter().map(|r| r.completed_date).collect();
        assert_eq!(dates, vec![date(5), date(4), date(3)]);
        assert!(!all[1].is_streak_saver);
    }

    #[test]
    fn range_query_is_inclusive() {
        let store = MemoryStreakStore::new();
        for d in 1..=6 {
            store.insert_completion(&CompletionRecord::genuine("r", date(d))).unwrap();
        }
        let ranged = store.completions_between("r", date(2), date(4)).unwrap();
        assert_eq!(ranged.len(), 3);
    }

    #[test]
    fn delete_removes_everything_for_routine() {
        let store = MemoryStreakStore::new();
        store.upsert_streak(&StreakRecord::new("r", 30)).unwrap();
        store.insert_completion(&CompletionRecord::genuine("r", date(1))).unwrap();
        store.upsert_streak(&StreakRecord::new("other", 30)).unwrap();

        store.delete_streak_data("r").unwrap();
        assert!(store.streak("r").unwrap().is_none());
        assert!(store.completions("r").unwrap().is_empty());
        assert!(store.streak("other").unwrap().is_some());
    }
}
