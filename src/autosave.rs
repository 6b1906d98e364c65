// src/autosave.rs
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_DELAY_MS: u64 = 2000;

/// Coalesces edits into a single pending save. Each edit pushes the
/// deadline back; `poll` reports the save once the deadline has passed.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    delay: Duration,
    deadline: Option<DateTime<Utc>>,
}

impl SaveDebouncer {
    pub fn new(delay_ms: u64) -> Self {
        let delay = i64::try_from(delay_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX);
        Self {
            delay,
            deadline: None,
        }
    }

    /// A deadline past the representable range is clamped, so the save
    /// stays pending without ever firing.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let deadline = now.checked_add_signed(self.delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.deadline = Some(deadline);
    }

    /// True once per pending save, when its deadline is reached.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for SaveDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MS)
    }
}
