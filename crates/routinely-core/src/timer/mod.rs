mod countdown;
mod sequence;

pub use countdown::{
    CompletionCallback, CountdownDriver, DEFAULT_POLL_INTERVAL, DEFAULT_TICK_LENGTH,
};
pub use sequence::{SequentialTimer, TimerSnapshot, TimerState};
