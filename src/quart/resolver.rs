use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::QuartError;
use crate::quart::clock::{MINUTES_PER_DAY, MinuteOfDay};
use crate::quart::model::{Quart, Schedule};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(10);

/// First quart in list order whose range holds `now`.
pub fn find_active_index(quarts: &[Quart], now: MinuteOfDay) -> Option<usize> {
    quarts.iter().position(|quart| quart.contains(now))
}

/// Percent of `quart` elapsed at `now`, saturating at 100.
pub fn compute_progress(quart: &Quart, now: MinuteOfDay) -> Result<f64, QuartError> {
    let start = i32::from(quart.start());
    let day = i32::from(MINUTES_PER_DAY);
    let end = if quart.wraps_midnight() {
        i32::from(quart.end()) + day
    } else {
        i32::from(quart.end())
    };
    let now = if now >= quart.start() {
        i32::from(now)
    } else {
        i32::from(now) + day
    };

    let total = end - start;
    if total <= 0 {
        return Err(QuartError::DegenerateInterval {
            start: quart.start(),
            end: quart.end(),
        });
    }
    let elapsed = now - start;
    Ok((100.0 * f64::from(elapsed) / f64::from(total)).min(100.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Active {
        index: usize,
        progress_percent: f64,
    },
    /// The active quart's range has no length; progress is not defined.
    Degenerate { index: usize },
    /// Nothing covers the current minute.
    Gap { last_known: Option<usize> },
}

impl Resolution {
    pub fn active_index(&self) -> Option<usize> {
        match self {
            Resolution::Active { index, .. } | Resolution::Degenerate { index } => Some(*index),
            Resolution::Gap { .. } => None,
        }
    }

    /// Index to show: the active quart, else the last one seen active.
    pub fn display_index(&self) -> Option<usize> {
        match self {
            Resolution::Gap { last_known } => *last_known,
            _ => self.active_index(),
        }
    }

    pub fn progress_percent(&self) -> f64 {
        match self {
            Resolution::Active {
                progress_percent, ..
            } => *progress_percent,
            _ => 0.0,
        }
    }
}

pub fn resolve(
    schedule: &Schedule,
    now: MinuteOfDay,
    last_known: Option<usize>,
) -> Resolution {
    let quarts = schedule.quarts();
    let Some(index) = find_active_index(quarts, now) else {
        return Resolution::Gap {
            last_known: last_known.filter(|index| *index < quarts.len()),
        };
    };
    match compute_progress(&quarts[index], now) {
        Ok(progress_percent) => Resolution::Active {
            index,
            progress_percent,
        },
        Err(err) => {
            warn!("cannot compute progress: {err}");
            Resolution::Degenerate { index }
        }
    }
}

fn same_quart(a: &Quart, b: &Quart) -> bool {
    a.name == b.name && a.start() == b.start() && a.end() == b.end()
}

/// Holds a read-only view of the committed schedule and recomputes the active quart
/// on load, on every schedule change, and once per tick period.
pub struct Resolver {
    schedule: Arc<Schedule>,
    period: Duration,
    next_tick: Option<Instant>,
    now_minutes: MinuteOfDay,
    resolution: Resolution,
}

impl Resolver {
    pub fn new(schedule: Arc<Schedule>, period: Duration, now: MinuteOfDay) -> Self {
        let resolution = resolve(&schedule, now, None);
        Self {
            schedule,
            period,
            next_tick: None,
            now_minutes: now,
            resolution,
        }
    }

    pub fn start(&mut self, at: Instant) {
        self.next_tick = Some(at + self.period);
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn refresh(&mut self, now: MinuteOfDay) -> Resolution {
        let last_known = self.resolution.display_index();
        self.now_minutes = now;
        self.resolution = resolve(&self.schedule, now, last_known);
        self.resolution
    }

    /// Swaps in `schedule` and recomputes. The last shown quart carries over only if the
    /// new schedule still holds it (same name and range); its position may differ.
    pub fn set_schedule(&mut self, schedule: Arc<Schedule>, now: MinuteOfDay) -> Resolution {
        debug!(quarts = schedule.len(), "resolver picked up new schedule");
        let last_known = self.display_quart().and_then(|(_, shown)| {
            schedule
                .quarts()
                .iter()
                .position(|candidate| same_quart(candidate, shown))
        });
        self.schedule = schedule;
        self.now_minutes = now;
        self.resolution = resolve(&self.schedule, now, last_known);
        self.resolution
    }

    /// Recomputes when the tick deadline has passed. Returns whether a refresh happened.
    pub fn tick(&mut self, at: Instant, now: MinuteOfDay) -> bool {
        let Some(deadline) = self.next_tick else {
            return false;
        };
        if at < deadline {
            return false;
        }
        let mut next = deadline;
        while next <= at {
            next += self.period;
        }
        self.next_tick = Some(next);
        self.refresh(now);
        true
    }

    pub fn time_until_tick(&self, at: Instant) -> Option<Duration> {
        self.next_tick
            .map(|deadline| deadline.saturating_duration_since(at))
    }

    pub fn schedule(&self) -> &Arc<Schedule> {
        &self.schedule
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn now_minutes(&self) -> MinuteOfDay {
        self.now_minutes
    }

    pub fn display_quart(&self) -> Option<(usize, &Quart)> {
        let index = self.resolution.display_index()?;
        self.schedule.get(index).map(|quart| (index, quart))
    }
}
