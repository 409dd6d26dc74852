use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Duration in minutes, used when `duration_seconds` is zero.
    #[serde(default)]
    pub duration_minutes: u32,
    /// Explicit duration in seconds; takes precedence when positive.
    #[serde(default)]
    pub duration_seconds: u32,
    #[serde(default)]
    pub timer_enabled: bool,
}

impl Task {
    pub fn new(title: impl Into<String>, duration_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            duration_minutes: 0,
            duration_seconds,
            timer_enabled: duration_seconds > 0,
        }
    }

    pub fn with_minutes(title: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            duration_seconds: 0,
            timer_enabled: duration_minutes > 0,
            ..Self::new(title, 0)
        }
    }

    /// Countdown length for this task.
    ///
    /// `duration_seconds` wins when positive, otherwise minutes are
    /// converted with saturating arithmetic.
    pub fn duration_secs(&self) -> u64 {
        if self.duration_seconds > 0 {
            u64::from(self.duration_seconds)
        } else {
            u64::from(self.duration_minutes).saturating_mul(60)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub timer_enabled: bool,
}

impl Routine {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            tasks: Vec::new(),
            timer_enabled: false,
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.timer_enabled = tasks.iter().any(|t| t.duration_secs() > 0);
        self.tasks = tasks;
        self
    }

    /// Sum of all task durations; the routine-level countdown total.
    pub fn total_duration_secs(&self) -> u64 {
        self.tasks
            .iter()
            .map(Task::duration_secs)
            .fold(0u64, u64::saturating_add)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "routine title must not be empty".into(),
            });
        }
        if let Some(task) = self.tasks.iter().find(|t| t.title.trim().is_empty()) {
            return Err(ValidationError::InvalidValue {
                field: "tasks.title".into(),
                message: format!("task {} has an empty title", task.id),
            });
        }
        Ok(())
    }
}
