use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::QuartError;
use crate::quart::clock::{MINUTES_PER_DAY, MinuteOfDay, format_display_range};
use crate::quart::color::{
    PaletteEntry, TextMode, derive_text_mode, is_valid_hex, legacy_palette_lookup,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorSource {
    Palette { id: String },
    Custom,
}

/// Rendered color of a quart. `hex` is always a valid hex string; `hex_input` mirrors the
/// user's raw field and may be incomplete while typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuartColor {
    source: ColorSource,
    hex: String,
    hex_input: String,
    text_mode: TextMode,
}

impl QuartColor {
    pub fn from_palette(entry: &PaletteEntry) -> Self {
        Self::palette_id(entry.id, entry.hex)
    }

    pub fn custom(hex: &str) -> Result<Self, QuartError> {
        let text_mode = derive_text_mode(hex)?;
        Ok(Self {
            source: ColorSource::Custom,
            hex: hex.to_string(),
            hex_input: hex.to_string(),
            text_mode,
        })
    }

    fn palette_id(id: &str, hex: &str) -> Self {
        Self {
            source: ColorSource::Palette { id: id.to_string() },
            hex: hex.to_string(),
            hex_input: hex.to_string(),
            text_mode: text_mode_for(hex),
        }
    }

    /// Applies a literal hex from a live input field. Returns whether the rendered color changed.
    pub fn apply_hex_input(&mut self, value: &str) -> bool {
        self.hex_input = value.to_string();
        match derive_text_mode(value) {
            Ok(text_mode) => {
                self.source = ColorSource::Custom;
                self.hex = value.to_string();
                self.text_mode = text_mode;
                true
            }
            Err(_) => false,
        }
    }

    pub fn source(&self) -> &ColorSource {
        &self.source
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    pub fn hex_input(&self) -> &str {
        &self.hex_input
    }

    pub fn use_black_text(&self) -> bool {
        self.text_mode.use_black_text
    }

    fn stored_identifier(&self) -> String {
        match &self.source {
            ColorSource::Palette { id } => id.clone(),
            ColorSource::Custom => self.hex.clone(),
        }
    }
}

fn text_mode_for(hex: &str) -> TextMode {
    derive_text_mode(hex).unwrap_or(TextMode {
        use_black_text: false,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quart {
    pub name: String,
    pub description: String,
    start: MinuteOfDay,
    end: MinuteOfDay,
    color: QuartColor,
    display_time: String,
}

impl Quart {
    /// Fails with `Invariant` when either minute falls outside the day.
    pub fn new(
        name: impl Into<String>,
        start: MinuteOfDay,
        end: MinuteOfDay,
        color: QuartColor,
        description: impl Into<String>,
    ) -> Result<Self, QuartError> {
        for minute in [start, end] {
            if minute >= MINUTES_PER_DAY {
                return Err(QuartError::Invariant(format!(
                    "minute {minute} is outside 0..{MINUTES_PER_DAY}"
                )));
            }
        }
        Ok(Self::new_unchecked(name, start, end, color, description))
    }

    /// Skips the range check. Only for the built-in constants and fixtures that need
    /// out-of-range minutes.
    pub(crate) fn new_unchecked(
        name: impl Into<String>,
        start: MinuteOfDay,
        end: MinuteOfDay,
        color: QuartColor,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            start,
            end,
            color,
            display_time: format_display_range(start, end),
        }
    }

    pub fn start(&self) -> MinuteOfDay {
        self.start
    }

    pub fn end(&self) -> MinuteOfDay {
        self.end
    }

    pub fn color(&self) -> &QuartColor {
        &self.color
    }

    pub fn display_time(&self) -> &str {
        &self.display_time
    }

    /// `end <= start` means the quart runs past midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, now: MinuteOfDay) -> bool {
        if self.start < self.end {
            now >= self.start && now < self.end
        } else {
            now >= self.start || now < self.end
        }
    }

    pub fn set_start(&mut self, start: MinuteOfDay) {
        debug_assert!(start < MINUTES_PER_DAY);
        self.start = start;
        self.display_time = format_display_range(self.start, self.end);
    }

    pub fn set_end(&mut self, end: MinuteOfDay) {
        debug_assert!(end < MINUTES_PER_DAY);
        self.end = end;
        self.display_time = format_display_range(self.start, self.end);
    }

    pub fn set_color(&mut self, color: QuartColor) {
        self.color = color;
    }

    pub(crate) fn color_mut(&mut self) -> &mut QuartColor {
        &mut self.color
    }
}

/// Ordered, never-empty list of quarts.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    quarts: Vec<Quart>,
}

impl Schedule {
    pub fn new(quarts: Vec<Quart>) -> Result<Self, QuartError> {
        if quarts.is_empty() {
            return Err(QuartError::Invariant(
                "a schedule needs at least one quart".to_string(),
            ));
        }
        Ok(Self { quarts })
    }

    /// Stable sort by start minute; equal starts keep their relative order.
    pub fn sorted_by_start(mut quarts: Vec<Quart>) -> Result<Self, QuartError> {
        quarts.sort_by_key(Quart::start);
        Self::new(quarts)
    }

    pub fn quarts(&self) -> &[Quart] {
        &self.quarts
    }

    pub fn get(&self, index: usize) -> Option<&Quart> {
        self.quarts.get(index)
    }

    pub fn len(&self) -> usize {
        self.quarts.len()
    }

    pub fn to_vec(&self) -> Vec<Quart> {
        self.quarts.clone()
    }
}

struct DefaultQuart {
    name: &'static str,
    start: MinuteOfDay,
    end: MinuteOfDay,
    color_id: &'static str,
    hex: &'static str,
    description: &'static str,
}

const DEFAULT_QUARTS: [DefaultQuart; 7] = [
    DefaultQuart {
        name: "Quart Alpha",
        start: 360,
        end: 510,
        color_id: "bg-red-900",
        hex: "#7f1d1d",
        description: "Réveil, préparation, calme",
    },
    DefaultQuart {
        name: "Quart Bravo",
        start: 510,
        end: 720,
        color_id: "bg-gray-300",
        hex: "#d1d5db",
        description: "Exécution, focus total",
    },
    DefaultQuart {
        name: "Quart Charlie",
        start: 720,
        end: 780,
        color_id: "bg-blue-900",
        hex: "#1e3a8a",
        description: "Pause, récupération",
    },
    DefaultQuart {
        name: "Quart Delta",
        start: 780,
        end: 1_020,
        color_id: "bg-gray-300",
        hex: "#d1d5db",
        description: "Reprise offensive, clarté",
    },
    DefaultQuart {
        name: "Quart Echo",
        start: 1_020,
        end: 1_200,
        color_id: "bg-amber-800",
        hex: "#92400e",
        description: "Décompression, analyse",
    },
    DefaultQuart {
        name: "Quart Foxtrot",
        start: 1_200,
        end: 1_380,
        color_id: "bg-red-800",
        hex: "#991b1b",
        description: "Travail calme, création",
    },
    DefaultQuart {
        name: "Quart Silence",
        start: 1_380,
        end: 360,
        color_id: "bg-black",
        hex: "#000000",
        description: "Repos, silence total",
    },
];

/// The built-in seven-quart day, used as the load fallback and the reset target.
pub fn default_schedule() -> Schedule {
    let quarts = DEFAULT_QUARTS
        .iter()
        .map(|seed| {
            Quart::new_unchecked(
                seed.name,
                seed.start,
                seed.end,
                QuartColor::palette_id(seed.color_id, seed.hex),
                seed.description,
            )
        })
        .collect();
    Schedule { quarts }
}

pub fn parse_schedule_text(content: &str) -> Result<Schedule> {
    let raw = serde_json::from_str::<Vec<QuartFile>>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;
    if raw.is_empty() {
        bail!("stored schedule contains no quarts");
    }

    let mut quarts = Vec::with_capacity(raw.len());
    for (index, record) in raw.into_iter().enumerate() {
        let start = checked_minute(record.start)
            .with_context(|| format!("quart #{index} '{}' has invalid start", record.name))?;
        let end = checked_minute(record.end)
            .with_context(|| format!("quart #{index} '{}' has invalid end", record.name))?;
        let color = resolve_stored_color(&record.color, record.hex_color.as_deref())
            .with_context(|| format!("quart #{index} '{}' has no usable color", record.name))?;
        quarts.push(Quart::new(
            record.name,
            start,
            end,
            color,
            record.description,
        )?);
    }
    Ok(Schedule::new(quarts)?)
}

pub fn schedule_to_json(schedule: &Schedule) -> Result<String> {
    let records = schedule
        .quarts()
        .iter()
        .map(|quart| QuartRecord {
            name: &quart.name,
            time: quart.display_time(),
            start: quart.start(),
            end: quart.end(),
            color: quart.color().stored_identifier(),
            hex_color: quart.color().hex_input(),
            description: &quart.description,
        })
        .collect::<Vec<_>>();
    Ok(serde_json::to_string_pretty(&records)?)
}

fn checked_minute(value: u32) -> Result<MinuteOfDay> {
    if value >= u32::from(MINUTES_PER_DAY) {
        bail!("minute {value} is outside 0..{MINUTES_PER_DAY}");
    }
    Ok(value as MinuteOfDay)
}

/// Accepts palette identifiers (optionally followed by a text class), bracketed
/// `bg-[#hex]` classes and bare hex strings. `hexColor` wins when valid.
fn resolve_stored_color(color: &str, hex_color: Option<&str>) -> Result<QuartColor> {
    let base = color.split_whitespace().next().unwrap_or_default();
    let (palette_id, fallback_hex) = if let Some(hex) = legacy_palette_lookup(base) {
        (Some(base), Some(hex.to_string()))
    } else if let Some(inner) = base
        .strip_prefix("bg-[")
        .and_then(|rest| rest.strip_suffix(']'))
    {
        (None, is_valid_hex(inner).then(|| inner.to_string()))
    } else {
        (None, is_valid_hex(base).then(|| base.to_string()))
    };

    let hex_input = hex_color
        .map(str::to_string)
        .or_else(|| fallback_hex.clone())
        .unwrap_or_default();
    let rendered = if is_valid_hex(&hex_input) {
        hex_input.clone()
    } else {
        match fallback_hex.clone() {
            Some(hex) => hex,
            None => bail!("color '{color}' and hexColor '{hex_input}' are both unusable"),
        }
    };

    let source = match palette_id {
        Some(id) if fallback_hex.as_deref() == Some(rendered.as_str()) => ColorSource::Palette {
            id: id.to_string(),
        },
        _ => ColorSource::Custom,
    };
    Ok(QuartColor {
        source,
        text_mode: text_mode_for(&rendered),
        hex: rendered,
        hex_input,
    })
}

#[derive(Debug, Deserialize)]
struct QuartFile {
    name: String,
    start: u32,
    end: u32,
    #[serde(default)]
    color: String,
    #[serde(rename = "hexColor", default)]
    hex_color: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize)]
struct QuartRecord<'a> {
    name: &'a str,
    time: &'a str,
    start: MinuteOfDay,
    end: MinuteOfDay,
    color: String,
    #[serde(rename = "hexColor")]
    hex_color: &'a str,
    description: &'a str,
}
