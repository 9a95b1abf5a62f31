use serde::Serialize;

use crate::error::QuartError;

/// Brightness strictly below this reads as a dark background.
pub const DARK_THRESHOLD: f64 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub hex: &'static str,
}

pub static PALETTE: [PaletteEntry; 8] = [
    PaletteEntry {
        id: "bg-red-900",
        name: "Red",
        hex: "#7f1d1d",
    },
    PaletteEntry {
        id: "bg-gray-300",
        name: "Light Gray",
        hex: "#d1d5db",
    },
    PaletteEntry {
        id: "bg-blue-900",
        name: "Blue",
        hex: "#1e3a8a",
    },
    PaletteEntry {
        id: "bg-amber-800",
        name: "Amber",
        hex: "#92400e",
    },
    PaletteEntry {
        id: "bg-black",
        name: "Black",
        hex: "#000000",
    },
    PaletteEntry {
        id: "bg-green-800",
        name: "Green",
        hex: "#166534",
    },
    PaletteEntry {
        id: "bg-purple-900",
        name: "Purple",
        hex: "#581c87",
    },
    PaletteEntry {
        id: "bg-teal-800",
        name: "Teal",
        hex: "#115e59",
    },
];

pub static DEFAULT_NEW_QUART_COLOR: &PaletteEntry = &PALETTE[2];

const LEGACY_COLORS: [(&str, &str); 9] = [
    ("bg-red-900", "#7f1d1d"),
    ("bg-gray-300", "#d1d5db"),
    ("bg-blue-900", "#1e3a8a"),
    ("bg-amber-800", "#92400e"),
    ("bg-black", "#000000"),
    ("bg-green-800", "#166534"),
    ("bg-purple-900", "#581c87"),
    ("bg-teal-800", "#115e59"),
    ("bg-red-800", "#991b1b"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextMode {
    pub use_black_text: bool,
}

pub fn is_valid_hex(input: &str) -> bool {
    let Some(digits) = input.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|ch| ch.is_ascii_hexdigit())
}

/// Parses `#rgb` or `#rrggbb` into channel values; 3-digit input is expanded first.
pub fn parse_rgb(hex: &str) -> Result<[u8; 3], QuartError> {
    if !is_valid_hex(hex) {
        return Err(QuartError::InvalidHex {
            input: hex.to_string(),
        });
    }
    let digits = &hex[1..];
    let expanded: String = if digits.len() == 3 {
        digits.chars().flat_map(|ch| [ch, ch]).collect()
    } else {
        digits.to_string()
    };
    let channel = |offset: usize| {
        u8::from_str_radix(&expanded[offset..offset + 2], 16).map_err(|_| QuartError::InvalidHex {
            input: hex.to_string(),
        })
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

pub fn brightness(hex: &str) -> Result<f64, QuartError> {
    let [r, g, b] = parse_rgb(hex)?;
    Ok((f64::from(r) * 299.0 + f64::from(g) * 587.0 + f64::from(b) * 114.0) / 1_000.0)
}

pub fn is_dark(hex: &str) -> Result<bool, QuartError> {
    Ok(brightness(hex)? < DARK_THRESHOLD)
}

pub fn derive_text_mode(hex: &str) -> Result<TextMode, QuartError> {
    Ok(TextMode {
        use_black_text: !is_dark(hex)?,
    })
}

/// Maps a legacy palette identifier (first token of the stored class string) to its hex.
pub fn legacy_palette_lookup(name: &str) -> Option<&'static str> {
    let base = name.split_whitespace().next()?;
    LEGACY_COLORS
        .iter()
        .find(|(id, _)| *id == base)
        .map(|(_, hex)| *hex)
}

pub fn palette_entry_for_hex(hex: &str) -> Option<&'static PaletteEntry> {
    PALETTE
        .iter()
        .find(|entry| entry.hex.eq_ignore_ascii_case(hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_validation_accepts_three_and_six_digits_only() {
        assert!(is_valid_hex("#fff"));
        assert!(is_valid_hex("#A1b2C3"));
        assert!(!is_valid_hex("fff"));
        assert!(!is_valid_hex("#ffff"));
        assert!(!is_valid_hex("#12"));
        assert!(!is_valid_hex("#gggggg"));
        assert!(!is_valid_hex("#1234567"));
    }

    #[test]
    fn brightness_boundary_at_128_is_not_dark() {
        assert_eq!(brightness("#808080").expect("gray"), 128.0);
        assert!(!is_dark("#808080").expect("gray"));
        assert!(is_dark("#000000").expect("black"));
        assert!(!is_dark("#ffffff").expect("white"));
    }

    #[test]
    fn short_hex_is_expanded_before_weighting() {
        assert_eq!(parse_rgb("#abc").expect("short"), [0xaa, 0xbb, 0xcc]);
        assert_eq!(
            brightness("#fff").expect("short white"),
            brightness("#ffffff").expect("white")
        );
    }

    #[test]
    fn light_backgrounds_get_black_text() {
        assert!(derive_text_mode("#d1d5db").expect("gray").use_black_text);
        assert!(!derive_text_mode("#7f1d1d").expect("red").use_black_text);
        assert!(derive_text_mode("#12").is_err());
    }

    #[test]
    fn legacy_lookup_uses_base_class_token() {
        assert_eq!(legacy_palette_lookup("bg-red-800"), Some("#991b1b"));
        assert_eq!(
            legacy_palette_lookup("bg-gray-300 text-black"),
            Some("#d1d5db")
        );
        assert_eq!(legacy_palette_lookup("bg-pink-500"), None);
        assert_eq!(legacy_palette_lookup(""), None);
    }

    #[test]
    fn palette_lookup_by_hex_ignores_case() {
        let entry = palette_entry_for_hex("#1E3A8A").expect("blue");
        assert_eq!(entry.name, "Blue");
        assert_eq!(DEFAULT_NEW_QUART_COLOR.id, "bg-blue-900");
    }
}
