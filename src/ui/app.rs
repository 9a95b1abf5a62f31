use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use eframe::egui::{
    self, Align, Align2, Color32, ComboBox, Layout, ProgressBar, RichText, ScrollArea, Sense,
    TextEdit, Ui,
};
use tracing::{debug, warn};

use crate::api::{ApiSharedState, RuntimeSnapshot};
use crate::clock_source::SelectedClock;
use crate::error::QuartError;
use crate::idle::IdleTracker;
use crate::quart::clock::format_clock_string;
use crate::quart::color::{PALETTE, palette_entry_for_hex, parse_rgb};
use crate::quart::editor::{Confirmation, EditOp, ScheduleEditor};
use crate::quart::model::Quart;
use crate::quart::resolver::{Resolution, Resolver};
use crate::quart::window::{DEFAULT_RADIUS, visible_window};
use crate::store::FileStore;

const API_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);
const MAX_REPAINT_WAIT: Duration = Duration::from_secs(1);
const NEIGHBOR_SLOT_HEIGHT: f32 = 96.0;
const NO_QUART_FILL: Color32 = Color32::from_rgb(8, 16, 26);
const CUSTOM_COLOR_LABEL: &str = "Custom";

pub struct DashboardOptions {
    pub tick_period: Duration,
    pub idle_timeout: Duration,
    pub api_state: Option<Arc<Mutex<ApiSharedState>>>,
    pub api_url: Option<String>,
}

pub fn run_gui(
    clock: SelectedClock,
    editor: ScheduleEditor<FileStore>,
    options: DashboardOptions,
) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("QuartClock")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    let app = QuartClockApp::new(clock, editor, options);

    eframe::run_native(
        "QuartClock",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch QuartClock GUI: {err}"))?;

    Ok(())
}

fn configure_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = NO_QUART_FILL;
    visuals.window_fill = Color32::from_rgb(12, 20, 32);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(16, 24, 38);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(26, 42, 62);
    visuals.widgets.active.bg_fill = Color32::from_rgb(34, 60, 88);
    visuals.selection.bg_fill = Color32::from_rgb(43, 148, 178);
    ctx.set_visuals(visuals);
}

/// Start/end text as typed, applied to the working copy when the field loses focus.
#[derive(Debug, Clone)]
struct TimeDraft {
    start: String,
    end: String,
}

impl TimeDraft {
    fn from_quart(quart: &Quart) -> Self {
        Self {
            start: format_clock_string(quart.start()),
            end: format_clock_string(quart.end()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TimeField {
    Start,
    End,
}

struct QuartRow {
    name: String,
    description: String,
    hex_input: String,
    display_time: String,
    palette_label: &'static str,
    fill: Color32,
}

impl QuartRow {
    fn from_quart(quart: &Quart) -> Self {
        Self {
            name: quart.name.clone(),
            description: quart.description.clone(),
            hex_input: quart.color().hex_input().to_string(),
            display_time: quart.display_time().to_string(),
            palette_label: palette_entry_for_hex(quart.color().hex())
                .map(|entry| entry.name)
                .unwrap_or(CUSTOM_COLOR_LABEL),
            fill: quart_fill(quart),
        }
    }
}

struct QuartClockApp {
    clock: SelectedClock,
    editor: ScheduleEditor<FileStore>,
    resolver: Resolver,
    idle: IdleTracker,
    status_message: Option<(String, Instant)>,
    confirm_reset: bool,
    time_drafts: Vec<TimeDraft>,
    api_state: Option<Arc<Mutex<ApiSharedState>>>,
    api_url: Option<String>,
    next_api_publish: Instant,
}

impl QuartClockApp {
    fn new(
        clock: SelectedClock,
        editor: ScheduleEditor<FileStore>,
        options: DashboardOptions,
    ) -> Self {
        let now = Instant::now();
        let mut resolver = Resolver::new(
            editor.schedule(),
            options.tick_period,
            clock.clock.minute_of_day(),
        );
        resolver.start(now);
        Self {
            clock,
            editor,
            resolver,
            idle: IdleTracker::new(options.idle_timeout, now),
            status_message: None,
            confirm_reset: false,
            time_drafts: Vec::new(),
            api_state: options.api_state,
            api_url: options.api_url,
            next_api_publish: now,
        }
    }

    fn set_status(&mut self, text: impl Into<String>, ttl: Duration) {
        self.status_message = Some((text.into(), Instant::now() + ttl));
    }

    fn sync_time_drafts(&mut self) {
        self.time_drafts = match self.editor.working() {
            Ok(working) => working.iter().map(TimeDraft::from_quart).collect(),
            Err(_) => Vec::new(),
        };
    }

    fn open_settings(&mut self) {
        self.editor.begin();
        self.sync_time_drafts();
    }

    fn close_settings(&mut self) {
        self.editor.cancel();
        self.time_drafts.clear();
        self.confirm_reset = false;
    }

    fn commit_schedule_change(&mut self) {
        let schedule = self.editor.schedule();
        self.resolver
            .set_schedule(schedule, self.clock.clock.minute_of_day());
        self.time_drafts.clear();
        self.publish_api_state();
    }

    fn publish_api_state(&mut self) {
        let Some(shared) = &self.api_state else {
            return;
        };
        let snapshot =
            RuntimeSnapshot::capture(&self.resolver, &self.clock.label, self.idle.is_active());
        match shared.lock() {
            Ok(mut guard) => guard.publish(snapshot),
            Err(_) => warn!("failed to lock API state"),
        }
        self.next_api_publish = Instant::now() + API_PUBLISH_INTERVAL;
    }

    fn observe_activity(&mut self, ctx: &egui::Context, now: Instant) {
        let active = ctx.input(|input| input.events.iter().any(is_activity_event));
        if active {
            self.idle.signal(now);
        }
        self.idle.poll(now);
    }

    fn show_neighbors(&self, ui: &mut Ui) {
        let Some((index, _)) = self.resolver.display_quart() else {
            return;
        };
        let schedule = self.resolver.schedule();
        let slots = visible_window(schedule.quarts(), index, DEFAULT_RADIUS);
        let progress = self.resolver.resolution().progress_percent() as f32 / 100.0;

        ScrollArea::vertical()
            .id_salt("neighbor_column")
            .vertical_scroll_offset(progress * NEIGHBOR_SLOT_HEIGHT)
            .scroll_bar_visibility(egui::scroll_area::ScrollBarVisibility::AlwaysHidden)
            .show(ui, |ui| {
                for slot in &slots {
                    let fill = quart_fill(slot.quart).gamma_multiply(slot.opacity);
                    let text = text_color(slot.quart).gamma_multiply(slot.opacity);
                    egui::Frame::default()
                        .fill(fill)
                        .inner_margin(10.0)
                        .corner_radius(6.0)
                        .show(ui, |ui| {
                            ui.set_min_size(egui::vec2(ui.available_width(), NEIGHBOR_SLOT_HEIGHT - 20.0));
                            let mut name = RichText::new(&slot.quart.name).color(text).size(20.0);
                            if slot.is_current() {
                                name = name.strong();
                            }
                            ui.label(name);
                            ui.label(
                                RichText::new(slot.quart.display_time())
                                    .color(text)
                                    .size(15.0),
                            );
                        });
                    ui.add_space(4.0);
                }
            });
    }

    fn show_active(&self, ui: &mut Ui) {
        let resolution = self.resolver.resolution();
        let Some((_, quart)) = self.resolver.display_quart() else {
            ui.add_space(ui.available_height() * 0.35);
            ui.label(
                RichText::new("No active quart")
                    .size(48.0)
                    .color(Color32::from_rgb(161, 180, 201)),
            );
            ui.label(
                RichText::new(format_clock_string(self.resolver.now_minutes()))
                    .size(28.0)
                    .color(Color32::from_rgb(161, 180, 201)),
            );
            return;
        };

        let text = text_color(quart);
        ui.add_space(ui.available_height() * 0.25);
        if let Resolution::Gap { .. } = resolution {
            ui.label(
                RichText::new("No active quart")
                    .size(18.0)
                    .color(text.gamma_multiply(0.7)),
            );
        }
        ui.label(RichText::new(&quart.name).size(72.0).strong().color(text));
        ui.label(RichText::new(quart.display_time()).size(36.0).color(text));
        ui.add_space(12.0);
        ui.label(RichText::new(&quart.description).size(24.0).color(text));
        ui.add_space(24.0);
        match resolution {
            Resolution::Active {
                progress_percent, ..
            } => {
                ui.add(
                    ProgressBar::new(progress_percent as f32 / 100.0)
                        .desired_width(ui.available_width() * 0.6)
                        .text(format!("{progress_percent:.0}%")),
                );
            }
            Resolution::Degenerate { .. } => {
                ui.label(RichText::new("Progress unavailable").color(text));
            }
            Resolution::Gap { .. } => {}
        }
    }

    fn show_settings_trigger(&mut self, ctx: &egui::Context) {
        if !self.idle.is_active() && !self.editor.is_editing() {
            return;
        }
        egui::Area::new(egui::Id::new("settings_trigger"))
            .anchor(Align2::RIGHT_TOP, [-16.0, 16.0])
            .show(ctx, |ui| {
                let label = if self.editor.is_editing() {
                    "Close settings"
                } else {
                    "\u{2699} Settings"
                };
                if ui.button(RichText::new(label).size(18.0)).clicked() {
                    if self.editor.is_editing() {
                        self.close_settings();
                    } else {
                        self.open_settings();
                    }
                }
            });
    }

    fn show_settings(&mut self, ctx: &egui::Context) {
        let mut rows: Vec<QuartRow> = match self.editor.working() {
            Ok(working) => working.iter().map(QuartRow::from_quart).collect(),
            Err(_) => return,
        };
        if self.time_drafts.len() != rows.len() {
            self.sync_time_drafts();
        }

        let mut ops: Vec<(usize, EditOp)> = Vec::new();
        let mut time_commits: Vec<(usize, TimeField)> = Vec::new();
        let mut remove_index: Option<usize> = None;
        let mut add = false;
        let mut save = false;
        let mut cancel = false;
        let mut ask_reset = false;
        let drafts = &mut self.time_drafts;

        egui::Window::new("Quart settings")
            .collapsible(false)
            .resizable(true)
            .default_width(620.0)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Add quart").clicked() {
                        add = true;
                    }
                    if ui.button("Reset to defaults").clicked() {
                        ask_reset = true;
                    }
                });
                ui.separator();

                ScrollArea::vertical()
                    .id_salt("quart_settings_scroll")
                    .max_height(480.0)
                    .show(ui, |ui| {
                        for (index, (row, draft)) in rows.iter_mut().zip(drafts.iter_mut()).enumerate() {
                            ui.group(|ui| {
                                ui.horizontal(|ui| {
                                    ui.label("Name");
                                    if ui.text_edit_singleline(&mut row.name).changed() {
                                        ops.push((index, EditOp::SetName(row.name.clone())));
                                    }
                                    ui.label(RichText::new(&row.display_time).weak());
                                });
                                ui.horizontal(|ui| {
                                    ui.label("Start");
                                    let start = ui.add(
                                        TextEdit::singleline(&mut draft.start).desired_width(64.0),
                                    );
                                    if start.lost_focus() {
                                        time_commits.push((index, TimeField::Start));
                                    }
                                    ui.label("End");
                                    let end = ui.add(
                                        TextEdit::singleline(&mut draft.end).desired_width(64.0),
                                    );
                                    if end.lost_focus() {
                                        time_commits.push((index, TimeField::End));
                                    }
                                });
                                ui.horizontal(|ui| {
                                    ui.label("Color");
                                    ComboBox::from_id_salt(("quart_palette", index))
                                        .selected_text(row.palette_label)
                                        .show_ui(ui, |ui| {
                                            for entry in PALETTE.iter() {
                                                let selected = row.palette_label == entry.name;
                                                if ui.selectable_label(selected, entry.name).clicked() {
                                                    ops.push((index, EditOp::SetPaletteColor(entry)));
                                                }
                                            }
                                        });
                                    let hex = ui.add(
                                        TextEdit::singleline(&mut row.hex_input)
                                            .desired_width(90.0)
                                            .hint_text("#rrggbb"),
                                    );
                                    if hex.changed() {
                                        ops.push((index, EditOp::SetHexColor(row.hex_input.clone())));
                                    }
                                    let (rect, _) =
                                        ui.allocate_exact_size(egui::vec2(22.0, 22.0), Sense::hover());
                                    ui.painter().rect_filled(rect, 4.0, row.fill);
                                });
                                ui.label("Description");
                                if ui
                                    .add(TextEdit::multiline(&mut row.description).desired_rows(2))
                                    .changed()
                                {
                                    ops.push((index, EditOp::SetDescription(row.description.clone())));
                                }
                                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                                    if ui.button("Remove").clicked() {
                                        remove_index = Some(index);
                                    }
                                });
                            });
                            ui.add_space(6.0);
                        }
                    });

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                    if ui.button(RichText::new("Save").strong()).clicked() {
                        save = true;
                    }
                });
            });

        for (index, op) in ops {
            if let Err(err) = self.editor.apply(index, op) {
                self.set_status(err.to_string(), Duration::from_secs(4));
            }
        }
        for (index, field) in time_commits {
            self.commit_time_draft(index, field);
        }
        if let Some(index) = remove_index {
            match self.editor.remove(index) {
                Ok(removed) => debug!(name = %removed.name, "quart removed"),
                Err(QuartError::Invariant(message)) => {
                    self.set_status(message, Duration::from_secs(4));
                }
                Err(err) => self.set_status(err.to_string(), Duration::from_secs(4)),
            }
            self.sync_time_drafts();
        }
        if add {
            match self.editor.add() {
                Ok(_) => self.sync_time_drafts(),
                Err(err) => self.set_status(err.to_string(), Duration::from_secs(4)),
            }
        }
        if ask_reset {
            self.confirm_reset = true;
        }
        if cancel {
            self.close_settings();
        } else if save {
            match self.editor.save() {
                Ok(_) => {
                    self.commit_schedule_change();
                    self.set_status("Schedule saved.", Duration::from_secs(3));
                }
                Err(err) => self.set_status(format!("Save failed: {err:#}"), Duration::from_secs(4)),
            }
        }
    }

    fn commit_time_draft(&mut self, index: usize, field: TimeField) {
        let Some(draft) = self.time_drafts.get(index) else {
            return;
        };
        let op = match field {
            TimeField::Start => EditOp::SetStart(draft.start.clone()),
            TimeField::End => EditOp::SetEnd(draft.end.clone()),
        };
        if let Err(err) = self.editor.apply(index, op) {
            self.set_status(err.to_string(), Duration::from_secs(4));
        }
        // Show the canonical value, or restore the previous one after a rejected edit.
        if let Ok(working) = self.editor.working()
            && let Some(quart) = working.get(index)
            && let Some(draft) = self.time_drafts.get_mut(index)
        {
            *draft = TimeDraft::from_quart(quart);
        }
    }

    fn show_reset_confirmation(&mut self, ctx: &egui::Context) {
        let mut answer: Option<Confirmation> = None;
        egui::Window::new("Reset schedule")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Replace every quart with the default schedule?");
                ui.horizontal(|ui| {
                    if ui.button("Keep my quarts").clicked() {
                        answer = Some(Confirmation::Cancelled);
                    }
                    if ui.button(RichText::new("Reset").strong()).clicked() {
                        answer = Some(Confirmation::Confirmed);
                    }
                });
            });

        let Some(confirmation) = answer else {
            return;
        };
        self.confirm_reset = false;
        match self.editor.reset(confirmation) {
            Ok(Some(_)) => {
                self.commit_schedule_change();
                self.set_status("Schedule reset to defaults.", Duration::from_secs(3));
            }
            Ok(None) => {}
            Err(err) => self.set_status(format!("Reset failed: {err:#}"), Duration::from_secs(4)),
        }
    }

    fn show_footer(&self, ui: &mut Ui, text: Color32) {
        ui.horizontal_wrapped(|ui| {
            ui.label(
                RichText::new(format!(
                    "{} | {}",
                    format_clock_string(self.resolver.now_minutes()),
                    self.clock.label
                ))
                .color(text.gamma_multiply(0.6)),
            );
            if let Some(url) = &self.api_url {
                ui.separator();
                ui.label(RichText::new(url).color(text.gamma_multiply(0.6)));
            }
            if let Some((message, _)) = &self.status_message {
                ui.separator();
                ui.label(
                    RichText::new(message)
                        .color(Color32::from_rgb(255, 190, 106))
                        .strong(),
                );
            }
        });
    }
}

impl eframe::App for QuartClockApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if let Some((_, expires_at)) = &self.status_message
            && now >= *expires_at
        {
            self.status_message = None;
        }

        self.observe_activity(ctx, now);
        self.resolver.tick(now, self.clock.clock.minute_of_day());
        if self.api_state.is_some() && now >= self.next_api_publish {
            self.publish_api_state();
        }

        let (background, text) = match self.resolver.display_quart() {
            Some((_, quart)) => (quart_fill(quart), text_color(quart)),
            None => (NO_QUART_FILL, Color32::WHITE),
        };

        egui::TopBottomPanel::bottom("footer")
            .resizable(false)
            .frame(egui::Frame::default().fill(background).inner_margin(8.0))
            .show(ctx, |ui| self.show_footer(ui, text));

        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(background).inner_margin(24.0))
            .show(ctx, |ui| {
                ui.horizontal_top(|ui| {
                    let height = ui.available_height();
                    ui.allocate_ui_with_layout(
                        egui::vec2(280.0, height),
                        Layout::top_down(Align::Min),
                        |ui| self.show_neighbors(ui),
                    );
                    ui.add_space(24.0);
                    ui.allocate_ui_with_layout(
                        egui::vec2(ui.available_width(), height),
                        Layout::top_down(Align::Center),
                        |ui| self.show_active(ui),
                    );
                });
            });

        self.show_settings_trigger(ctx);
        if self.editor.is_editing() {
            self.show_settings(ctx);
        }
        if self.confirm_reset {
            self.show_reset_confirmation(ctx);
        }

        let now = Instant::now();
        let wait = [
            self.resolver.time_until_tick(now),
            self.idle.time_until_idle(now),
            Some(MAX_REPAINT_WAIT),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(MAX_REPAINT_WAIT);
        ctx.request_repaint_after(wait);
    }
}

impl Drop for QuartClockApp {
    /// The API thread outlives the window briefly; stop it serving a frozen dashboard.
    fn drop(&mut self) {
        self.resolver.stop();
        self.idle.cancel();
        if let Some(shared) = &self.api_state {
            match shared.lock() {
                Ok(mut guard) => guard.clear(),
                Err(_) => warn!("failed to lock API state"),
            }
        }
        debug!("dashboard torn down");
    }
}

fn is_activity_event(event: &egui::Event) -> bool {
    match event {
        egui::Event::PointerMoved(_) => true,
        egui::Event::PointerButton { pressed, .. } => *pressed,
        egui::Event::Key { pressed, .. } => *pressed,
        egui::Event::Touch { phase, .. } => *phase == egui::TouchPhase::Start,
        _ => false,
    }
}

fn quart_fill(quart: &Quart) -> Color32 {
    match parse_rgb(quart.color().hex()) {
        Ok([r, g, b]) => Color32::from_rgb(r, g, b),
        Err(_) => NO_QUART_FILL,
    }
}

fn text_color(quart: &Quart) -> Color32 {
    if quart.color().use_black_text() {
        Color32::BLACK
    } else {
        Color32::WHITE
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::clock_source::select_clock;
    use crate::quart::model::{QuartColor, default_schedule};

    fn dashboard(api_state: Option<Arc<Mutex<ApiSharedState>>>) -> QuartClockApp {
        let dir = tempdir().expect("tempdir");
        let editor = ScheduleEditor::load(
            FileStore::new(dir.path().join("quarts.json")),
            Arc::new(default_schedule()),
        );
        QuartClockApp::new(
            select_clock(Some("07:15")).expect("fixed clock"),
            editor,
            DashboardOptions {
                tick_period: Duration::from_secs(10),
                idle_timeout: Duration::from_secs(10),
                api_state,
                api_url: None,
            },
        )
    }

    #[test]
    fn dropping_the_dashboard_withdraws_the_published_state() {
        let shared = Arc::new(Mutex::new(ApiSharedState::default()));
        let mut app = dashboard(Some(Arc::clone(&shared)));
        app.publish_api_state();
        let published = shared
            .lock()
            .expect("lock")
            .runtime
            .as_ref()
            .and_then(|runtime| runtime.active.as_ref())
            .map(|active| active.name.clone());
        assert_eq!(published.as_deref(), Some("Quart Alpha"));

        drop(app);
        assert!(shared.lock().expect("lock").runtime.is_none());
    }

    #[test]
    fn dashboard_without_api_drops_cleanly() {
        let mut app = dashboard(None);
        assert!(app.resolver.is_running());
        app.publish_api_state();
        drop(app);
    }

    #[test]
    fn activity_events_are_pointer_key_and_touch_starts() {
        assert!(is_activity_event(&egui::Event::PointerMoved(egui::pos2(
            1.0, 2.0
        ))));
        assert!(!is_activity_event(&egui::Event::PointerGone));
        assert!(!is_activity_event(&egui::Event::Copy));
    }

    #[test]
    fn quart_fill_uses_rendered_hex() {
        let schedule = default_schedule();
        assert_eq!(
            quart_fill(&schedule.quarts()[0]),
            Color32::from_rgb(0x7f, 0x1d, 0x1d)
        );
        assert_eq!(text_color(&schedule.quarts()[1]), Color32::BLACK);
        assert_eq!(text_color(&schedule.quarts()[6]), Color32::WHITE);
    }

    #[test]
    fn settings_row_labels_unmatched_hex_as_custom() {
        let palette = Quart::new("p", 0, 60, QuartColor::from_palette(&PALETTE[3]), "")
            .expect("palette quart");
        assert_eq!(QuartRow::from_quart(&palette).palette_label, "Amber");
        let custom = Quart::new("c", 0, 60, QuartColor::custom("#123456").expect("hex"), "")
            .expect("custom quart");
        assert_eq!(QuartRow::from_quart(&custom).palette_label, CUSTOM_COLOR_LABEL);
    }

    #[test]
    fn time_draft_formats_both_ends() {
        let schedule = default_schedule();
        let draft = TimeDraft::from_quart(&schedule.quarts()[6]);
        assert_eq!(draft.start, "23:00");
        assert_eq!(draft.end, "06:00");
    }
}
