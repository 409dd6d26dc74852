//! Wall-clock driver for [`SequentialTimer`].
//!
//! A spawned tokio task sleeps in short increments and calls `tick` once a
//! full tick length of real time has passed since the previous decrement.
//! Every control call cancels that task before touching the timer. Each
//! countdown task carries the generation it was spawned with and checks it
//! under the timer lock, so once a control call returns no stale task can
//! decrement.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::sequence::{SequentialTimer, TimerSnapshot, TimerState};
use crate::events::{Event, EventBus};
use crate::routine::Routine;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_TICK_LENGTH: Duration = Duration::from_millis(1000);

/// Invoked with the routine id when a run completes.
pub type CompletionCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct Shared {
    timer: SequentialTimer,
    generation: u64,
}

#[derive(Clone)]
struct Outputs {
    snapshots: Arc<watch::Sender<TimerSnapshot>>,
    events: EventBus,
    on_complete: Option<CompletionCallback>,
}

impl Outputs {
    fn emit(&self, event: Option<Event>) {
        let Some(event) = event else {
            return;
        };
        if let Event::RoutineCompleted { routine_id, .. } = &event {
            info!(routine_id = %routine_id, "routine completed");
            if let Some(callback) = &self.on_complete {
                callback(routine_id);
            }
        }
        self.events.publish(event);
    }
}

/// Runs a [`SequentialTimer`] against real time.
///
/// Control methods spawn onto the ambient runtime and must be called from
/// within a Tokio runtime.
pub struct CountdownDriver {
    shared: Arc<Mutex<Shared>>,
    outputs: Outputs,
    task: Option<JoinHandle<()>>,
    poll_interval: Duration,
    tick_length: Duration,
}

impl CountdownDriver {
    pub fn new() -> Self {
        let timer = SequentialTimer::new();
        let (snapshots, _) = watch::channel(timer.snapshot());
        Self {
            shared: Arc::new(Mutex::new(Shared {
                timer,
                generation: 0,
            })),
            outputs: Outputs {
                snapshots: Arc::new(snapshots),
                events: EventBus::new(),
                on_complete: None,
            },
            task: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            tick_length: DEFAULT_TICK_LENGTH,
        }
    }

    /// Zero durations fall back to the defaults.
    pub fn with_intervals(mut self, poll_interval: Duration, tick_length: Duration) -> Self {
        if !poll_interval.is_zero() {
            self.poll_interval = poll_interval;
        }
        if !tick_length.is_zero() {
            self.tick_length = tick_length;
        }
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.outputs.events = events;
        self
    }

    pub fn on_routine_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.outputs.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.outputs.events
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.outputs.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.lock().timer.snapshot()
    }

    // ── Controls ─────────────────────────────────────────────────────

    pub fn start(&mut self, routine: Routine) {
        info!(routine_id = %routine.id, tasks = routine.tasks.len(), "starting routine timer");
        self.control(|timer| timer.start(routine));
    }

    pub fn pause(&mut self) {
        self.control(SequentialTimer::pause);
    }

    pub fn resume(&mut self) {
        self.control(SequentialTimer::resume);
    }

    pub fn reset(&mut self) {
        self.control(SequentialTimer::reset);
    }

    pub fn stop(&mut self) {
        self.control(SequentialTimer::stop);
    }

    pub fn move_to_next(&mut self) {
        self.control(SequentialTimer::move_to_next);
    }

    pub fn move_to_previous(&mut self) {
        self.control(SequentialTimer::move_to_previous);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancel, apply the command, then restart the countdown if running.
    fn control<F>(&mut self, command: F)
    where
        F: FnOnce(&mut SequentialTimer) -> Option<Event>,
    {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        // Snapshots are published under the lock so a stale tick can never
        // overwrite a newer state.
        let (event, running, generation) = {
            let mut shared = self.lock();
            shared.generation += 1;
            let event = command(&mut shared.timer);
            self.outputs.snapshots.send_replace(shared.timer.snapshot());
            (event, shared.timer.is_running(), shared.generation)
        };
        self.outputs.emit(event);
        if running {
            self.spawn_countdown(generation);
        }
    }

    fn spawn_countdown(&mut self, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let outputs = self.outputs.clone();
        let poll_interval = self.poll_interval;
        let tick_length = self.tick_length;
        let started = Instant::now();
        debug!(generation, "spawning countdown");
        self.task = Some(tokio::spawn(async move {
            countdown(shared, outputs, generation, started, poll_interval, tick_length).await;
        }));
    }
}

impl Default for CountdownDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CountdownDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn countdown(
    shared: Arc<Mutex<Shared>>,
    outputs: Outputs,
    generation: u64,
    started: Instant,
    poll_interval: Duration,
    tick_length: Duration,
) {
    let mut last_tick = started;
    loop {
        tokio::time::sleep(poll_interval).await;
        if last_tick.elapsed() < tick_length {
            continue;
        }
        // Advance by exactly one tick so polling jitter does not accumulate.
        last_tick += tick_length;

        let (event, finished) = {
            let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
            if guard.generation != generation {
                return;
            }
            let event = guard.timer.tick();
            outputs.snapshots.send_replace(guard.timer.snapshot());
            (event, guard.timer.state() != TimerState::Running)
        };
        outputs.emit(event);
        if finished {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::routine::Task;

    fn routine(durations: &[u32]) -> Routine {
        let tasks = durations
            .iter()
            .enumerate()
            .map(|(i, d)| Task::new(format!("Task {}", i + 1), *d))
            .collect();
        Routine::new("Evening").with_tasks(tasks)
    }

    fn counting_driver() -> (CountdownDriver, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let driver = CountdownDriver::new().on_routine_complete(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (driver, count)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn completes_routine_once() {
        let (mut driver, completions) = counting_driver();
        let mut events = driver.events().subscribe();
        driver.start(routine(&[5, 3, 4]));

        advance(12_050).await;
        assert_eq!(driver.snapshot().state, TimerState::Completed);
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        advance(5_000).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        let mut advanced = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, Event::TaskAdvanced { .. }) {
                advanced += 1;
            }
        }
        assert_eq!(advanced, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn decrements_once_per_second() {
        let mut driver = CountdownDriver::new();
        driver.start(routine(&[10]));

        advance(950).await;
        assert_eq!(driver.snapshot().remaining_secs, 10);
        advance(100).await;
        assert_eq!(driver.snapshot().remaining_secs, 9);
        advance(2_000).await;
        assert_eq!(driver.snapshot().remaining_secs, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_remaining_time() {
        let mut driver = CountdownDriver::new();
        driver.start(routine(&[10]));
        advance(3_500).await;
        driver.pause();
        assert_eq!(driver.snapshot().remaining_secs, 7);

        advance(10_000).await;
        assert_eq!(driver.snapshot().remaining_secs, 7);
        assert_eq!(driver.snapshot().state, TimerState::Paused);

        driver.resume();
        advance(1_050).await;
        assert_eq!(driver.snapshot().remaining_secs, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_and_stop_never_complete() {
        let (mut driver, completions) = counting_driver();
        driver.start(routine(&[3]));
        advance(2_500).await;
        driver.reset();
        assert_eq!(driver.snapshot().remaining_secs, 3);

        advance(10_000).await;
        assert_eq!(driver.snapshot().remaining_secs, 3);

        driver.resume();
        advance(1_050).await;
        driver.stop();
        advance(10_000).await;
        assert_eq!(driver.snapshot().state, TimerState::Idle);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_previous_countdown() {
        let (mut driver, completions) = counting_driver();
        driver.start(routine(&[2]));
        advance(1_500).await;
        driver.start(routine(&[4]));

        advance(2_050).await;
        assert_eq!(driver.snapshot().remaining_secs, 2);
        assert_eq!(completions.load(Ordering::SeqCst), 0);

        advance(2_000).await;
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_are_published() {
        let mut driver = CountdownDriver::new();
        let mut rx = driver.subscribe();
        driver.start(routine(&[5, 5]));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().remaining_secs, 5);

        driver.move_to_next();
        assert_eq!(rx.borrow_and_update().task_index, Some(1));

        advance(1_050).await;
        assert_eq!(rx.borrow_and_update().remaining_secs, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_routine_fires_completion() {
        let (mut driver, completions) = counting_driver();
        driver.start(routine(&[]));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(driver.snapshot().state, TimerState::Completed);
    }
}
