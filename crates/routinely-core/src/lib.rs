//! # Routinely Core Library
//!
//! Core logic for the Routinely habit tracker: daily streaks for routines
//! and a sequential countdown over a routine's tasks. Everything is usable
//! from the standalone `routinely` CLI.
//!
//! ## Architecture
//!
//! - **Streaks**: per-routine streak bookkeeping with a one-shot streak saver,
//!   driven by an injected [`Clock`]
//! - **Timer**: a synchronous state machine plus a tokio driver that ticks it
//!   against real time
//! - **Storage**: SQLite persistence and TOML-based configuration
//! - **Events**: every state change is published on an [`EventBus`]
//!
//! ## Key Components
//!
//! - [`StreakTracker`]: streak operations over any [`StreakStore`]
//! - [`SequentialTimer`] / [`CountdownDriver`]: task countdown
//! - [`Database`]: routines, streaks, completions and achievements
//! - [`Config`]: application configuration management

pub mod achievements;
pub mod clock;
pub mod error;
pub mod events;
pub mod routine;
pub mod storage;
pub mod streak;
pub mod timer;

pub use achievements::{check_and_update, Achievement, AchievementMetrics};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{Event, EventBus};
pub use routine::{Routine, Task};
pub use storage::{Config, Database};
pub use streak::{
    CompletionRecord, MemoryStreakStore, MonthCalendar, StreakRecord, StreakStore, StreakTracker,
};
pub use timer::{CountdownDriver, SequentialTimer, TimerSnapshot, TimerState};
