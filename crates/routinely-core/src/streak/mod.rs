mod calendar;
mod milestone;
mod record;
mod store;
mod tracker;

pub use calendar::{month_bounds, CalendarDay, MonthCalendar};
pub use milestone::{achieved_milestones, milestones, next_milestone, Milestone};
pub use record::{CompletionOutcome, CompletionRecord, StreakRecord, DEFAULT_STREAK_GOAL};
pub use store::{MemoryStreakStore, StreakStore};
pub use tracker::{CompletionCounts, StreakTracker};
