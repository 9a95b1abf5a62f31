use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::error::QuartError;
use crate::quart::clock::{MINUTES_PER_DAY, parse_clock_string};
use crate::quart::color::{DEFAULT_NEW_QUART_COLOR, PaletteEntry};
use crate::quart::model::{Quart, QuartColor, Schedule, parse_schedule_text, schedule_to_json};
use crate::store::ScheduleStore;

const NEW_QUART_OFFSET_MINUTES: u16 = 30;
const NEW_QUART_LENGTH_MINUTES: u16 = 60;
const NEW_QUART_DESCRIPTION: &str = "New quart";

/// One edit to a single quart in the working copy.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    SetName(String),
    SetDescription(String),
    SetPaletteColor(&'static PaletteEntry),
    /// Raw text from the hex field; incomplete values only update the field itself.
    SetHexColor(String),
    /// `HH:MM` from a time picker.
    SetStart(String),
    SetEnd(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

/// Owns the committed schedule and, while the settings panel is open, a working copy.
pub struct ScheduleEditor<S: ScheduleStore> {
    store: S,
    defaults: Arc<Schedule>,
    committed: Arc<Schedule>,
    working: Option<Vec<Quart>>,
}

impl<S: ScheduleStore> ScheduleEditor<S> {
    /// Reads the stored slot; absent or unreadable content falls back to `defaults`
    /// without writing anything back.
    pub fn load(store: S, defaults: Arc<Schedule>) -> Self {
        let committed = match store.read_slot() {
            Ok(Some(content)) => match parse_schedule_text(&content) {
                Ok(schedule) => {
                    info!(quarts = schedule.len(), "loaded stored schedule");
                    Arc::new(schedule)
                }
                Err(err) => {
                    warn!("discarding stored schedule: {err:#}");
                    Arc::clone(&defaults)
                }
            },
            Ok(None) => Arc::clone(&defaults),
            Err(err) => {
                warn!("schedule store unavailable, using defaults: {err:#}");
                Arc::clone(&defaults)
            }
        };
        Self {
            store,
            defaults,
            committed,
            working: None,
        }
    }

    pub fn schedule(&self) -> Arc<Schedule> {
        Arc::clone(&self.committed)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_editing(&self) -> bool {
        self.working.is_some()
    }

    /// Opens a session on a fresh copy of the committed schedule.
    pub fn begin(&mut self) {
        self.working = Some(self.committed.to_vec());
    }

    pub fn cancel(&mut self) {
        self.working = None;
    }

    pub fn working(&self) -> Result<&[Quart], QuartError> {
        self.working.as_deref().ok_or(QuartError::NoEditSession)
    }

    fn working_mut(&mut self) -> Result<&mut Vec<Quart>, QuartError> {
        self.working.as_mut().ok_or(QuartError::NoEditSession)
    }

    /// Appends a one-hour quart starting 30 minutes after the last quart's start.
    pub fn add(&mut self) -> Result<usize, QuartError> {
        let working = self.working_mut()?;
        let Some(last) = working.last() else {
            return Err(QuartError::Invariant(
                "working copy is unexpectedly empty".to_string(),
            ));
        };
        let start = (last.start() + NEW_QUART_OFFSET_MINUTES) % MINUTES_PER_DAY;
        let end = (start + NEW_QUART_LENGTH_MINUTES) % MINUTES_PER_DAY;
        let quart = Quart::new(
            format!("Quart {}", working.len() + 1),
            start,
            end,
            QuartColor::from_palette(DEFAULT_NEW_QUART_COLOR),
            NEW_QUART_DESCRIPTION,
        )?;
        working.push(quart);
        Ok(working.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Result<Quart, QuartError> {
        let working = self.working_mut()?;
        if working.len() <= 1 {
            return Err(QuartError::Invariant(
                "You must have at least one quart".to_string(),
            ));
        }
        if index >= working.len() {
            return Err(QuartError::IndexOutOfRange {
                index,
                len: working.len(),
            });
        }
        Ok(working.remove(index))
    }

    /// Applies `op` to the quart at `index`. On error the working copy is untouched.
    pub fn apply(&mut self, index: usize, op: EditOp) -> Result<(), QuartError> {
        let working = self.working_mut()?;
        let len = working.len();
        let quart = working
            .get_mut(index)
            .ok_or(QuartError::IndexOutOfRange { index, len })?;
        match op {
            EditOp::SetName(name) => quart.name = name,
            EditOp::SetDescription(description) => quart.description = description,
            EditOp::SetPaletteColor(entry) => quart.set_color(QuartColor::from_palette(entry)),
            EditOp::SetHexColor(value) => {
                quart.color_mut().apply_hex_input(&value);
            }
            EditOp::SetStart(text) => quart.set_start(parse_clock_string(&text)?),
            EditOp::SetEnd(text) => quart.set_end(parse_clock_string(&text)?),
        }
        Ok(())
    }

    /// Sorts the working copy by start, persists it, and makes it the committed schedule.
    /// A failed write leaves both the committed schedule and the session as they were.
    pub fn save(&mut self) -> Result<Arc<Schedule>> {
        let working = self.working()?.to_vec();
        let sorted = Schedule::sorted_by_start(working)?;
        let content = schedule_to_json(&sorted)?;
        self.store.write_slot(&content)?;
        self.committed = Arc::new(sorted);
        self.working = None;
        info!(quarts = self.committed.len(), "schedule saved");
        Ok(self.schedule())
    }

    /// Restores and persists the default schedule. Does nothing unless confirmed.
    pub fn reset(&mut self, confirmation: Confirmation) -> Result<Option<Arc<Schedule>>> {
        if confirmation != Confirmation::Confirmed {
            return Ok(None);
        }
        let content = schedule_to_json(&self.defaults)?;
        self.store.write_slot(&content)?;
        self.committed = Arc::clone(&self.defaults);
        self.working = None;
        info!("schedule reset to defaults");
        Ok(Some(self.schedule()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quart::color::PALETTE;
    use crate::quart::model::default_schedule;
    use crate::quart::resolver::{DEFAULT_TICK_PERIOD, Resolution, Resolver};
    use crate::store::MemoryStore;

    fn editor_with(store: MemoryStore) -> ScheduleEditor<MemoryStore> {
        ScheduleEditor::load(store, Arc::new(default_schedule()))
    }

    fn editing() -> ScheduleEditor<MemoryStore> {
        let mut editor = editor_with(MemoryStore::default());
        editor.begin();
        editor
    }

    #[test]
    fn load_falls_back_without_persisting() {
        let editor = editor_with(MemoryStore::default());
        assert_eq!(*editor.schedule(), default_schedule());
        assert_eq!(editor.store().writes(), 0);

        let editor = editor_with(MemoryStore::with_content("{ broken"));
        assert_eq!(*editor.schedule(), default_schedule());
        assert_eq!(editor.store().writes(), 0);
        assert_eq!(editor.store().content(), Some("{ broken"));
    }

    #[test]
    fn load_prefers_stored_schedule() {
        let stored = r##"[{ "name": "Only", "start": 0, "end": 0, "color": "bg-black", "hexColor": "#000000" }]"##;
        let editor = editor_with(MemoryStore::with_content(stored));
        assert_eq!(editor.schedule().len(), 1);
        assert_eq!(editor.schedule().quarts()[0].name, "Only");
    }

    #[test]
    fn operations_require_an_open_session() {
        let mut editor = editor_with(MemoryStore::default());
        assert_eq!(editor.add(), Err(QuartError::NoEditSession));
        assert!(editor.save().is_err());
        assert_eq!(editor.store().writes(), 0);
    }

    #[test]
    fn add_places_new_quart_after_last_start() {
        let mut editor = editing();
        let index = editor.add().expect("add");
        let added = &editor.working().expect("working")[index];
        assert_eq!(index, 7);
        assert_eq!(added.name, "Quart 8");
        assert_eq!(added.start(), 1_410);
        assert_eq!(added.end(), 30);
        assert_eq!(added.color().hex(), "#1e3a8a");
        assert_eq!(added.description, "New quart");
        assert_eq!(added.display_time(), "23h30 \u{2013} 00h30");
    }

    #[test]
    fn removing_last_quart_is_refused() {
        let mut editor = editing();
        for _ in 0..6 {
            editor.remove(0).expect("remove");
        }
        let before = editor.working().expect("working").to_vec();
        let err = editor.remove(0).expect_err("last quart");
        assert!(matches!(err, QuartError::Invariant(_)));
        assert_eq!(editor.working().expect("working"), before.as_slice());
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut editor = editing();
        let removed = editor.remove(1).expect("remove bravo");
        assert_eq!(removed.name, "Quart Bravo");
        let names: Vec<_> = editor
            .working()
            .expect("working")
            .iter()
            .map(|quart| quart.name.clone())
            .collect();
        assert_eq!(names[..2], ["Quart Alpha", "Quart Charlie"]);
        assert_eq!(
            editor.remove(42),
            Err(QuartError::IndexOutOfRange { index: 42, len: 6 })
        );
    }

    #[test]
    fn time_edits_recompute_display_time() {
        let mut editor = editing();
        editor
            .apply(0, EditOp::SetStart("05:45".to_string()))
            .expect("start");
        editor
            .apply(0, EditOp::SetEnd("09:00".to_string()))
            .expect("end");
        let alpha = &editor.working().expect("working")[0];
        assert_eq!((alpha.start(), alpha.end()), (345, 540));
        assert_eq!(alpha.display_time(), "05h45 \u{2013} 09h00");
    }

    #[test]
    fn invalid_time_leaves_quart_unchanged() {
        let mut editor = editing();
        let err = editor
            .apply(0, EditOp::SetEnd("25:99".to_string()))
            .expect_err("bad time");
        assert!(matches!(err, QuartError::Format { .. }));
        assert_eq!(editor.working().expect("working")[0].end(), 510);
    }

    #[test]
    fn partial_hex_updates_field_but_not_rendering() {
        let mut editor = editing();
        editor
            .apply(0, EditOp::SetHexColor("#ab".to_string()))
            .expect("partial");
        let color = editor.working().expect("working")[0].color().clone();
        assert_eq!(color.hex_input(), "#ab");
        assert_eq!(color.hex(), "#7f1d1d");
        assert!(!color.use_black_text());

        editor
            .apply(0, EditOp::SetHexColor("#abcdef".to_string()))
            .expect("complete");
        let color = editor.working().expect("working")[0].color().clone();
        assert_eq!(color.hex(), "#abcdef");
        assert!(color.use_black_text());
    }

    #[test]
    fn palette_color_sets_hex_and_text_mode() {
        let mut editor = editing();
        let gray = &PALETTE[1];
        editor
            .apply(2, EditOp::SetPaletteColor(gray))
            .expect("palette");
        let color = editor.working().expect("working")[2].color().clone();
        assert_eq!(color.hex(), "#d1d5db");
        assert_eq!(color.hex_input(), "#d1d5db");
        assert!(color.use_black_text());
    }

    #[test]
    fn name_and_description_are_raw_assignments() {
        let mut editor = editing();
        editor
            .apply(3, EditOp::SetName(String::new()))
            .expect("name");
        editor
            .apply(3, EditOp::SetDescription("  spaced  ".to_string()))
            .expect("description");
        let delta = &editor.working().expect("working")[3];
        assert_eq!(delta.name, "");
        assert_eq!(delta.description, "  spaced  ");
    }

    #[test]
    fn edits_stay_private_until_save() {
        let mut editor = editing();
        editor
            .apply(0, EditOp::SetName("Renamed".to_string()))
            .expect("rename");
        assert_eq!(editor.schedule().quarts()[0].name, "Quart Alpha");
        editor.cancel();
        assert!(!editor.is_editing());
        assert_eq!(editor.store().writes(), 0);
    }

    #[test]
    fn save_sorts_persists_and_closes_session() {
        let mut editor = editing();
        editor
            .apply(6, EditOp::SetStart("00:00".to_string()))
            .expect("move silence");
        let committed = editor.save().expect("save");
        assert!(!editor.is_editing());
        assert_eq!(committed.quarts()[0].name, "Quart Silence");
        let starts: Vec<_> = committed.quarts().iter().map(Quart::start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
        assert_eq!(editor.store().writes(), 1);
    }

    #[test]
    fn saving_twice_writes_identical_content() {
        let mut editor = editing();
        editor.add().expect("add");
        editor.save().expect("first save");
        let first = editor.store().content().map(str::to_string);

        editor.begin();
        editor.save().expect("second save");
        let second = editor.store().content().map(str::to_string);
        assert_eq!(first, second);
        assert_eq!(editor.store().writes(), 2);
    }

    #[test]
    fn saved_removal_leaves_no_stale_quart_on_display() {
        let mut editor = editing();
        let mut resolver = Resolver::new(editor.schedule(), DEFAULT_TICK_PERIOD, 435);
        assert_eq!(resolver.resolution().active_index(), Some(0));

        let removed = editor.remove(0).expect("remove alpha");
        assert_eq!(removed.name, "Quart Alpha");
        let committed = editor.save().expect("save");

        let resolution = resolver.set_schedule(committed, 435);
        assert_eq!(resolution, Resolution::Gap { last_known: None });
        assert!(resolver.display_quart().is_none());
    }

    #[test]
    fn reset_needs_confirmation() {
        let mut editor = editing();
        editor.remove(0).expect("remove");
        editor.save().expect("save");
        editor.begin();

        let outcome = editor.reset(Confirmation::Cancelled).expect("cancelled");
        assert!(outcome.is_none());
        assert_eq!(editor.schedule().len(), 6);
        assert!(editor.is_editing());
        assert_eq!(editor.store().writes(), 1);

        let restored = editor
            .reset(Confirmation::Confirmed)
            .expect("confirmed")
            .expect("schedule");
        assert_eq!(*restored, default_schedule());
        assert!(!editor.is_editing());
        assert_eq!(editor.store().writes(), 2);

        let reloaded = editor_with(editor.store().clone());
        assert_eq!(*reloaded.schedule(), default_schedule());
    }
}
