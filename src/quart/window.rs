use crate::quart::model::Quart;

pub const DEFAULT_RADIUS: usize = 3;
const FALLOFF_PER_STEP: f32 = 0.25;

#[derive(Debug, Clone, Copy)]
pub struct WindowSlot<'a> {
    pub offset: isize,
    pub index: usize,
    pub quart: &'a Quart,
    pub opacity: f32,
}

impl WindowSlot<'_> {
    pub fn is_current(&self) -> bool {
        self.offset == 0
    }
}

/// Circular slice of `2 * radius + 1` quarts centred on `active_index`, ordered from
/// `-radius` to `+radius`. Short schedules repeat entries.
pub fn visible_window(quarts: &[Quart], active_index: usize, radius: usize) -> Vec<WindowSlot<'_>> {
    if quarts.is_empty() {
        return Vec::new();
    }
    let len = quarts.len() as isize;
    let radius = radius as isize;
    let center = active_index as isize;
    (-radius..=radius)
        .map(|offset| {
            let index = (center + offset).rem_euclid(len) as usize;
            WindowSlot {
                offset,
                index,
                quart: &quarts[index],
                opacity: opacity_for_offset(offset),
            }
        })
        .collect()
}

pub fn opacity_for_offset(offset: isize) -> f32 {
    (1.0 - offset.unsigned_abs() as f32 * FALLOFF_PER_STEP).clamp(0.0, 1.0)
}
