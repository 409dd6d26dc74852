//! Sequential task timer.
//!
//! Counts down one task of a routine at a time and advances automatically.
//! Like the rest of the core it owns no thread: [`SequentialTimer::tick`]
//! is a single one-second decrement and the caller decides when a second
//! has passed (see [`super::CountdownDriver`]).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -start-> Running -pause-> Paused -resume-> Running
//! Running -tick (last second of last task)-> Completed
//! Running | Paused -reset-> Paused (current task, full duration)
//! Running | Paused | Completed -stop-> Idle
//! ```
//!
//! Commands that do not apply in the current state return `None`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::Event;
use crate::routine::{Routine, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Point-in-time view of the timer, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub routine_id: Option<String>,
    pub task_index: Option<usize>,
    pub task_title: Option<String>,
    pub task_count: usize,
    pub remaining_secs: u64,
    /// Full duration of the current task; what `reset` restores.
    pub original_duration_secs: u64,
    /// Remaining seconds of the current task plus every later task.
    pub routine_remaining_secs: u64,
    pub is_running: bool,
}

#[derive(Debug, Clone)]
pub struct SequentialTimer {
    routine: Option<Routine>,
    state: TimerState,
    task_index: usize,
    remaining_secs: u64,
    original_duration_secs: u64,
}

impl SequentialTimer {
    pub fn new() -> Self {
        Self {
            routine: None,
            state: TimerState::Idle,
            task_index: 0,
            remaining_secs: 0,
            original_duration_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn original_duration_secs(&self) -> u64 {
        self.original_duration_secs
    }

    pub fn routine(&self) -> Option<&Routine> {
        self.routine.as_ref()
    }

    /// Index of the active task while Running or Paused.
    pub fn task_index(&self) -> Option<usize> {
        match self.state {
            TimerState::Running | TimerState::Paused => Some(self.task_index),
            _ => None,
        }
    }

    pub fn current_task(&self) -> Option<&Task> {
        let index = self.task_index()?;
        self.routine.as_ref()?.tasks.get(index)
    }

    fn tasks(&self) -> &[Task] {
        self.routine.as_ref().map(|r| r.tasks.as_slice()).unwrap_or(&[])
    }

    fn routine_id(&self) -> String {
        self.routine.as_ref().map(|r| r.id.clone()).unwrap_or_default()
    }

    pub fn routine_remaining_secs(&self) -> u64 {
        match self.task_index() {
            Some(index) => self.tasks()[index + 1..]
                .iter()
                .map(Task::duration_secs)
                .fold(self.remaining_secs, u64::saturating_add),
            None => 0,
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: self.state,
            routine_id: self.routine.as_ref().map(|r| r.id.clone()),
            task_index: self.task_index(),
            task_title: self.current_task().map(|t| t.title.clone()),
            task_count: self.tasks().len(),
            remaining_secs: self.remaining_secs,
            original_duration_secs: self.original_duration_secs,
            routine_remaining_secs: self.routine_remaining_secs(),
            is_running: self.is_running(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin the routine from its first task, discarding any current run.
    ///
    /// Zero-length tasks are passed over. A routine with nothing to count
    /// down completes immediately.
    pub fn start(&mut self, routine: Routine) -> Option<Event> {
        self.routine = Some(routine);
        let Some(first) = self.first_timed_task(0) else {
            return Some(self.complete());
        };
        self.enter_task(first);
        self.state = TimerState::Running;
        let task = self.current_task()?;
        Some(Event::TimerStarted {
            routine_id: self.routine_id(),
            task_index: first,
            task_title: task.title.clone(),
            duration_secs: self.original_duration_secs,
            at: Utc::now(),
        })
    }

    /// Count down one second. Returns the advance or completion event when
    /// the current task runs out.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        if self.remaining_secs > 1 {
            self.remaining_secs -= 1;
            debug!(remaining = self.remaining_secs, "timer tick");
            return None;
        }

        let from = self.task_index;
        match self.first_timed_task(from + 1) {
            Some(next) => {
                self.enter_task(next);
                Some(Event::TaskAdvanced {
                    routine_id: self.routine_id(),
                    from_task: from,
                    to_task: next,
                    duration_secs: self.original_duration_secs,
                    at: Utc::now(),
                })
            }
            None => Some(self.complete()),
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.state = TimerState::Paused;
        Some(Event::TimerPaused {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Continue from the frozen remaining time. No-op when nothing remains.
    pub fn resume(&mut self) -> Option<Event> {
        if self.state != TimerState::Paused {
            return None;
        }
        if self.remaining_secs == 0 {
            debug!("cannot resume timer, no time remaining");
            return None;
        }
        self.state = TimerState::Running;
        Some(Event::TimerResumed {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Restore the current task's full duration without starting it.
    pub fn reset(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running | TimerState::Paused => {
                self.remaining_secs = self.original_duration_secs;
                self.state = TimerState::Paused;
                Some(Event::TimerReset {
                    task_index: self.task_index,
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Clear all transient state.
    pub fn stop(&mut self) -> Option<Event> {
        if self.state == TimerState::Idle {
            return None;
        }
        *self = Self::new();
        Some(Event::TimerStopped { at: Utc::now() })
    }

    pub fn move_to_next(&mut self) -> Option<Event> {
        let from = self.task_index()?;
        if from + 1 >= self.tasks().len() {
            return None;
        }
        Some(self.jump_to(from, from + 1))
    }

    pub fn move_to_previous(&mut self) -> Option<Event> {
        let from = self.task_index()?;
        if from == 0 {
            return None;
        }
        Some(self.jump_to(from, from - 1))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn jump_to(&mut self, from: usize, to: usize) -> Event {
        self.enter_task(to);
        self.state = TimerState::Running;
        Event::TaskSkipped {
            from_task: from,
            to_task: to,
            at: Utc::now(),
        }
    }

    fn first_timed_task(&self, from: usize) -> Option<usize> {
        self.tasks()
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, t)| t.duration_secs() > 0)
            .map(|(i, _)| i)
    }

    fn enter_task(&mut self, index: usize) {
        let duration = self.tasks().get(index).map(Task::duration_secs).unwrap_or(0);
        self.task_index = index;
        self.remaining_secs = duration;
        self.original_duration_secs = duration;
    }

    fn complete(&mut self) -> Event {
        self.state = TimerState::Completed;
        self.remaining_secs = 0;
        Event::RoutineCompleted {
            routine_id: self.routine_id(),
            at: Utc::now(),
        }
    }
}

impl Default for SequentialTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routine(durations: &[u32]) -> Routine {
        let tasks = durations
            .iter()
            .enumerate()
            .map(|(i, d)| Task::new(format!("Task {}", i + 1), *d))
            .collect();
        Routine::new("Morning").with_tasks(tasks)
    }

    #[test]
    fn runs_routine_to_completion() {
        let mut timer = SequentialTimer::new();
        assert!(matches!(
            timer.start(routine(&[5, 3, 4])),
            Some(Event::TimerStarted { task_index: 0, duration_secs: 5, .. })
        ));

        let mut advances = 0;
        let mut completions = 0;
        for _ in 0..12 {
            match timer.tick() {
                Some(Event::TaskAdvanced { .. }) => advances += 1,
                Some(Event::RoutineCompleted { .. }) => completions += 1,
                Some(other) => panic!("unexpected event: {other:?}"),
                None => {}
            }
        }
        assert_eq!(advances, 2);
        assert_eq!(completions, 1);
        assert_eq!(timer.state(), TimerState::Completed);
        assert!(!timer.is_running());

        assert!(timer.tick().is_none());
    }

    #[test]
    fn advance_happens_on_last_second() {
        let mut timer = SequentialTimer::new();
        timer.start(routine(&[2, 3]));
        assert!(timer.tick().is_none());
        assert_eq!(timer.remaining_secs(), 1);
        assert!(matches!(
            timer.tick(),
            Some(Event::TaskAdvanced { from_task: 0, to_task: 1, duration_secs: 3, .. })
        ));
        assert_eq!(timer.remaining_secs(), 3);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let mut timer = SequentialTimer::new();
        timer.start(routine(&[10]));
        timer.tick();
        timer.tick();
        assert!(timer.pause().is_some());
        assert!(timer.tick().is_none());
        assert_eq!(timer.remaining_secs(), 8);

        assert!(timer.resume().is_some());
        timer.tick();
        assert_eq!(timer.remaining_secs(), 7);
    }

    #[test]
    fn reset_restores_current_task_without_running() {
        let mut timer = SequentialTimer::new();
        timer.start(routine(&[4, 6]));
        for _ in 0..6 {
            timer.tick();
        }
        assert_eq!(timer.task_index(), Some(1));
        assert_eq!(timer.remaining_secs(), 4);

        assert!(matches!(
            timer.reset(),
            Some(Event::TimerReset { task_index: 1, remaining_secs: 6, .. })
        ));
        assert_eq!(timer.state(), TimerState::Paused);
        assert!(!timer.is_running());
        assert!(timer.tick().is_none());
    }

    #[test]
    fn stop_clears_everything() {
        let mut timer = SequentialTimer::new();
        assert!(timer.stop().is_none());
        timer.start(routine(&[4]));
        assert!(timer.stop().is_some());
        let snap = timer.snapshot();
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.routine_id, None);
        assert_eq!(snap.remaining_secs, 0);
    }

    #[test]
    fn manual_moves_are_bounded() {
        let mut timer = SequentialTimer::new();
        assert!(timer.move_to_next().is_none());

        timer.start(routine(&[5, 3]));
        assert!(timer.move_to_previous().is_none());
        assert!(matches!(
            timer.move_to_next(),
            Some(Event::TaskSkipped { from_task: 0, to_task: 1, .. })
        ));
        assert_eq!(timer.remaining_secs(), 3);
        assert!(timer.move_to_next().is_none());

        timer.pause();
        assert!(timer.move_to_previous().is_some());
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.remaining_secs(), 5);
    }

    #[test]
    fn empty_routine_completes_immediately() {
        let mut timer = SequentialTimer::new();
        assert!(matches!(
            timer.start(routine(&[])),
            Some(Event::RoutineCompleted { .. })
        ));
        assert_eq!(timer.state(), TimerState::Completed);
    }

    #[test]
    fn zero_length_tasks_are_passed_over() {
        let mut timer = SequentialTimer::new();
        timer.start(routine(&[0, 2, 0, 1]));
        assert_eq!(timer.task_index(), Some(1));
        timer.tick();
        assert!(matches!(
            timer.tick(),
            Some(Event::TaskAdvanced { from_task: 1, to_task: 3, .. })
        ));
        assert!(matches!(timer.tick(), Some(Event::RoutineCompleted { .. })));
    }

    #[test]
    fn resume_requires_paused_with_time_left() {
        let mut timer = SequentialTimer::new();
        assert!(timer.resume().is_none());
        timer.start(routine(&[3]));
        assert!(timer.resume().is_none());
    }

    #[test]
    fn snapshot_reports_routine_remaining() {
        let mut timer = SequentialTimer::new();
        timer.start(routine(&[5, 3, 4]));
        timer.tick();
        let snap = timer.snapshot();
        assert_eq!(snap.remaining_secs, 4);
        assert_eq!(snap.routine_remaining_secs, 11);
        assert_eq!(snap.task_count, 3);
        assert_eq!(snap.task_title.as_deref(), Some("Task 1"));
        assert!(snap.is_running);
    }
}
