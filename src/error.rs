use thiserror::Error;

use crate::quart::clock::MinuteOfDay;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuartError {
    #[error("invalid time '{input}', expected HH:MM")]
    Format { input: String },

    #[error("invalid hex color '{input}', expected #rgb or #rrggbb")]
    InvalidHex { input: String },

    #[error("{0}")]
    Invariant(String),

    #[error("quart {start}-{end} has zero length")]
    DegenerateInterval { start: MinuteOfDay, end: MinuteOfDay },

    #[error("quart index {index} out of range (schedule has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no edit session is open")]
    NoEditSession,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = QuartError::Format {
            input: "25:00".to_string(),
        };
        assert_eq!(err.to_string(), "invalid time '25:00', expected HH:MM");

        let err = QuartError::IndexOutOfRange { index: 9, len: 7 };
        assert!(err.to_string().contains("out of range"));
    }
}
