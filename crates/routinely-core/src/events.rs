use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::streak::{CompletionRecord, StreakRecord};

/// Every state change in the system produces an Event.
/// The CLI prints them; other front ends subscribe through [`EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        routine_id: String,
        task_index: usize,
        task_title: String,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        task_index: usize,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        at: DateTime<Utc>,
    },
    /// The active task ran out and the next one started automatically.
    TaskAdvanced {
        routine_id: String,
        from_task: usize,
        to_task: usize,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// The user moved to an adjacent task by hand.
    TaskSkipped {
        from_task: usize,
        to_task: usize,
        at: DateTime<Utc>,
    },
    RoutineCompleted {
        routine_id: String,
        at: DateTime<Utc>,
    },
    CompletionRecorded {
        record: CompletionRecord,
    },
    StreakUpdated {
        record: StreakRecord,
    },
    StreakSaverUsed {
        routine_id: String,
        covered_date: NaiveDate,
    },
    AchievementUnlocked {
        id: String,
        title: String,
        at: DateTime<Utc>,
    },
}

/// Fan-out of [`Event`]s to any number of subscribers.
///
/// Publishing with no subscribers is not an error; slow subscribers observe
/// `RecvError::Lagged` and skip ahead.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: Event) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
