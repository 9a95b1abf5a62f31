use chrono::{NaiveTime, Timelike};

use crate::error::QuartError;

/// Minutes since local midnight, `0..MINUTES_PER_DAY`.
pub type MinuteOfDay = u16;

pub const MINUTES_PER_DAY: MinuteOfDay = 1_440;

/// Parses a picker value such as `"07:15"` into minutes since midnight.
pub fn parse_clock_string(input: &str) -> Result<MinuteOfDay, QuartError> {
    let trimmed = input.trim();
    let time = NaiveTime::parse_from_str(trimmed, "%H:%M").map_err(|_| QuartError::Format {
        input: input.to_string(),
    })?;
    Ok((time.hour() * 60 + time.minute()) as MinuteOfDay)
}

pub fn format_clock_string(minutes: MinuteOfDay) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Renders `start` and `end` as `HHhMM – HHhMM`. Wrapping ranges are shown as stored.
pub fn format_display_range(start: MinuteOfDay, end: MinuteOfDay) -> String {
    format!(
        "{:02}h{:02} \u{2013} {:02}h{:02}",
        start / 60,
        start % 60,
        end / 60,
        end % 60
    )
}

pub fn minute_of_day<T: Timelike>(time: &T) -> MinuteOfDay {
    (time.hour() * 60 + time.minute()) as MinuteOfDay
}
