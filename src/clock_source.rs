use anyhow::{Context, Result};
use chrono::Local;

use crate::quart::clock::{MinuteOfDay, format_clock_string, minute_of_day, parse_clock_string};

/// Supplies the current local minute of day. Date and timezone never leave this seam.
pub trait ClockSource: Send + Sync {
    fn minute_of_day(&self) -> MinuteOfDay;
}

pub struct LocalClock;

impl ClockSource for LocalClock {
    fn minute_of_day(&self) -> MinuteOfDay {
        minute_of_day(&Local::now())
    }
}

pub struct FixedClock {
    minute: MinuteOfDay,
}

impl FixedClock {
    pub fn new(minute: MinuteOfDay) -> Self {
        Self { minute }
    }
}

impl ClockSource for FixedClock {
    fn minute_of_day(&self) -> MinuteOfDay {
        self.minute
    }
}

pub struct SelectedClock {
    pub clock: Box<dyn ClockSource>,
    pub label: String,
}

/// Uses the local wall clock unless `fixed_at` pins the time as `HH:MM`.
pub fn select_clock(fixed_at: Option<&str>) -> Result<SelectedClock> {
    match fixed_at {
        Some(text) => {
            let minute =
                parse_clock_string(text).with_context(|| format!("invalid --at value '{text}'"))?;
            Ok(SelectedClock {
                clock: Box::new(FixedClock::new(minute)),
                label: format!("FIXED {}", format_clock_string(minute)),
            })
        }
        None => Ok(SelectedClock {
            clock: Box::new(LocalClock),
            label: "LOCAL".to_string(),
        }),
    }
}
