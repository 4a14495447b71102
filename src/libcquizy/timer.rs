use std::time::Duration;

/// Cumulative study time. Only whole seconds are counted; the remainder of
/// an `advance` call is carried to the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyTimer {
    seconds: u64,
    active: bool,
    carry: Duration,
}

impl StudyTimer {
    pub fn restore(seconds: u64, active: bool) -> Self {
        Self {
            seconds,
            active,
            carry: Duration::ZERO,
        }
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns whether the second counter changed.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        if !self.active {
            return false;
        }
        let total = self.carry + elapsed;
        let whole = total.as_secs();
        self.carry = total - Duration::from_secs(whole);
        self.seconds += whole;
        whole > 0
    }

    pub fn toggle(&mut self) -> bool {
        self.active = !self.active;
        self.carry = Duration::ZERO;
        self.active
    }

    pub fn pause(&mut self) {
        self.active = false;
        self.carry = Duration::ZERO;
    }

    pub fn reset(&mut self) {
        self.seconds = 0;
        self.pause();
    }

    pub fn format(&self) -> String {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let seconds = self.seconds % 60;

        if hours > 0 {
            format!("{hours:02}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes:02}:{seconds:02}")
        }
    }
}
