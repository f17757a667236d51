//! ZooInspector - A native GUI application for browsing and editing ZooKeeper node data.
//!
//! The window is a thin layer over [`ViewerController`]: it forwards clicks and
//! keys to the controller and renders the controller's read-only views. All
//! store I/O runs on the controller's data worker thread, so the egui frame
//! loop never blocks.

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use egui::text::{CCursor, CCursorRange, LayoutJob};
use egui::text_edit::TextEditOutput;
use egui::{Color32, FontId, Margin, RichText, TextFormat};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use zooinspector::controller::search_tooltip;
use zooinspector::{
    AlertLevel, ConnectionState, DataProvider, InMemoryProvider, NodePath, PayloadOrigin,
    ViewerConfig, ViewerController, ViewerKey, ViewerPhase,
};

/// Command line options
#[derive(Parser, Debug)]
#[command(name = "zooinspector", version, about = "Browse and edit ZooKeeper node data")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// ZooKeeper connect string, overrides the configuration file
    #[arg(long)]
    connect: Option<String>,

    /// Browse a built-in sample tree instead of a live ensemble
    #[arg(long)]
    demo: bool,
}

/// Color scheme for the ZooInspector UI.
/// Provides both light and dark mode color palettes.
#[cfg_attr(test, derive(Debug))]
pub struct InspectorColors;
impl InspectorColors {
    // Light mode colors
    pub const BACKGROUND: Color32 = Color32::from_rgb(248, 248, 248);
    pub const PRIMARY: Color32 = Color32::from_rgb(0, 122, 255);
    pub const PRIMARY_HOVER: Color32 = Color32::from_rgb(0, 102, 217);
    pub const SUCCESS: Color32 = Color32::from_rgb(52, 199, 89);
    pub const WARNING: Color32 = Color32::from_rgb(255, 149, 0);
    pub const ERROR: Color32 = Color32::from_rgb(255, 59, 48);
    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(28, 28, 30);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(99, 99, 102);
    /// Search hits, in both modes
    pub const HIGHLIGHT: Color32 = Color32::from_rgb(255, 214, 10);

    // Dark mode colors
    pub const DARK_BACKGROUND: Color32 = Color32::from_rgb(45, 45, 45);
    pub const DARK_PRIMARY: Color32 = Color32::from_rgb(10, 132, 255);
    pub const DARK_PRIMARY_HOVER: Color32 = Color32::from_rgb(64, 156, 255);
    pub const DARK_TEXT_PRIMARY: Color32 = Color32::from_rgb(255, 255, 255);
    pub const DARK_TEXT_SECONDARY: Color32 = Color32::from_rgb(180, 180, 180);
}

fn connection_color(state: ConnectionState) -> Color32 {
    match state {
        ConnectionState::Connected => InspectorColors::SUCCESS,
        ConnectionState::Connecting | ConnectionState::ConnectedReadOnly => InspectorColors::WARNING,
        ConnectionState::Disconnected | ConnectionState::Expired | ConnectionState::Closed => {
            InspectorColors::ERROR
        }
    }
}

/// Application entry point.
/// Initializes logging, loads configuration, and launches the GUI.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("ZooInspector starting...");

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if let Some(connect) = args.connect {
        config.connect_string = connect;
    }

    let provider = build_provider(&config, args.demo)?;
    let controller = ViewerController::new(provider, config).context("failed to start viewer")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([640.0, 400.0])
            .with_title("ZooInspector"),
        ..Default::default()
    };

    info!("Launching eframe application...");
    eframe::run_native(
        "ZooInspector",
        options,
        Box::new(move |_cc| Ok(Box::new(ZooInspectorApp::new(controller)))),
    )
    .map_err(|e| anyhow::anyhow!("window error: {}", e))
}

fn build_provider(config: &ViewerConfig, demo: bool) -> Result<Arc<dyn DataProvider>> {
    if demo {
        info!("Using the built-in sample tree");
        return Ok(Arc::new(demo_store()?));
    }

    #[cfg(feature = "zookeeper")]
    let provider: Arc<dyn DataProvider> = Arc::new(zooinspector::ZooKeeperProvider::new(
        config.connect_string.clone(),
    ));

    #[cfg(not(feature = "zookeeper"))]
    let provider: Arc<dyn DataProvider> = {
        warn!(
            "Built without ZooKeeper support, showing the sample tree instead of {}",
            config.connect_string
        );
        Arc::new(demo_store()?)
    };

    Ok(provider)
}

fn demo_store() -> Result<InMemoryProvider> {
    let store = InMemoryProvider::new()
        .with_node(NodePath::root(), "")
        .with_node(NodePath::new("/zookeeper")?, "")
        .with_node(NodePath::new("/zookeeper/quota")?, "")
        .with_node(
            NodePath::new("/app/config")?,
            r#"{"name":"orders","replicas":3,"endpoints":["10.0.0.1:8080","10.0.0.2:8080"],"feature_flags":{"beta":true}}"#,
        )
        .with_node(NodePath::new("/app/leader")?, "orders-7f9c4d-2")
        .with_node(NodePath::new("/app/notes")?, "not json {{{ but still searchable");
    Ok(store)
}

/// Main application state for ZooInspector.
struct ZooInspectorApp {
    controller: ViewerController,
    path_input: String,
    path_error: Option<String>,
    search_input: String,
    /// Hit count of the last search run from the find dialog
    find_result: Option<usize>,
    /// Mirror of the controller's text while editing
    edit_buffer: String,
    /// Last selection seen in the data area, as a byte range
    last_selection: Option<Range<usize>>,
    /// Move the text cursor to the controller's caret on the next frame
    scroll_to_caret: bool,
    dark_mode: bool,
}

impl ZooInspectorApp {
    fn new(controller: ViewerController) -> Self {
        let dark_mode = controller.config().dark_mode;
        Self {
            controller,
            path_input: "/".to_string(),
            path_error: None,
            search_input: String::new(),
            find_result: None,
            edit_buffer: String::new(),
            last_selection: None,
            scroll_to_caret: false,
            dark_mode,
        }
    }

    fn background_color(&self) -> Color32 {
        if self.dark_mode {
            InspectorColors::DARK_BACKGROUND
        } else {
            InspectorColors::BACKGROUND
        }
    }

    fn text_color(&self) -> Color32 {
        if self.dark_mode {
            InspectorColors::DARK_TEXT_PRIMARY
        } else {
            InspectorColors::TEXT_PRIMARY
        }
    }

    fn secondary_text_color(&self) -> Color32 {
        if self.dark_mode {
            InspectorColors::DARK_TEXT_SECONDARY
        } else {
            InspectorColors::TEXT_SECONDARY
        }
    }

    fn apply_theme(&self, ctx: &egui::Context) {
        ctx.set_visuals(if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });
        ctx.style_mut(|style| {
            let (fill, hover) = if self.dark_mode {
                (InspectorColors::DARK_PRIMARY, InspectorColors::DARK_PRIMARY_HOVER)
            } else {
                (InspectorColors::PRIMARY, InspectorColors::PRIMARY_HOVER)
            };
            style.visuals.widgets.inactive.weak_bg_fill = fill;
            style.visuals.widgets.hovered.weak_bg_fill = hover;
            style.visuals.widgets.active.weak_bg_fill = hover;
            style.visuals.widgets.inactive.fg_stroke.color = Color32::WHITE;
            style.visuals.widgets.hovered.fg_stroke.color = Color32::WHITE;
            style.visuals.widgets.active.fg_stroke.color = Color32::WHITE;
        });
    }

    /// Ctrl/Cmd+F opens the find dialog, Escape clears highlights.
    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (find, escape) = ctx.input(|i| {
            (
                (i.modifiers.command || i.modifiers.ctrl) && i.key_pressed(egui::Key::F),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if find {
            self.controller.handle_key(ViewerKey::Find);
        }
        if escape {
            self.controller.handle_key(ViewerKey::Escape);
            self.find_result = None;
        }
    }

    fn open_path(&mut self) {
        match NodePath::new(self.path_input.trim()) {
            Ok(path) => {
                self.path_error = None;
                self.last_selection = None;
                if let Err(e) = self.controller.select_node(path) {
                    error!("Failed to request node data: {}", e);
                }
            }
            Err(e) => self.path_error = Some(e.to_string()),
        }
    }

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Path:");
            let response = ui.text_edit_singleline(&mut self.path_input);
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Open").clicked() || submitted {
                self.open_path();
            }

            let parent = self.controller.selected().and_then(NodePath::parent);
            if ui.add_enabled(parent.is_some(), egui::Button::new("⬆")).on_hover_text("Parent node").clicked() {
                if let Some(parent) = parent {
                    self.path_input = parent.to_string();
                    self.open_path();
                }
            }

            ui.separator();

            if ui
                .add_enabled(self.controller.can_save(), egui::Button::new("💾 Save"))
                .clicked()
            {
                if let Err(e) = self.controller.request_save() {
                    error!("Cannot save: {}", e);
                }
            }

            if ui
                .selectable_label(self.controller.is_editable(), "✏ Edit")
                .clicked()
            {
                if let Err(e) = self.controller.toggle_edit_mode() {
                    debug!("Edit toggle ignored: {}", e);
                }
            }

            if ui.button("🔍").on_hover_text(search_tooltip()).clicked() {
                self.controller.open_search();
            }

            let format_hint = match self.controller.payload() {
                Some(payload) if !payload.structured => "Format data (not JSON, shown as-is)",
                _ => "Format data",
            };
            if ui
                .selectable_label(self.controller.is_formatted(), "{ } Format")
                .on_hover_text(format_hint)
                .clicked()
            {
                if let Err(e) = self.controller.toggle_format() {
                    debug!("Format toggle ignored: {}", e);
                }
            }

            ui.separator();

            if let Some(path) = self.controller.selected() {
                ui.label(RichText::new(path.as_str()).strong().size(14.0));
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button(if self.dark_mode { "☀" } else { "🌙" }).clicked() {
                    self.dark_mode = !self.dark_mode;
                }
            });
        });

        if let Some(ref err) = self.path_error {
            ui.colored_label(InspectorColors::ERROR, err);
        }
    }

    fn show_status_bar(&mut self, ui: &mut egui::Ui) {
        let secondary = self.secondary_text_color();
        ui.horizontal(|ui| {
            let state = self.controller.connection_state();
            ui.label(RichText::new(format!("● {}", state)).color(connection_color(state)));

            if let Some(err) = self.controller.connection_error() {
                ui.label(RichText::new(err).color(InspectorColors::ERROR).small());
            }

            if !self.controller.worker_healthy() {
                ui.separator();
                ui.label(
                    RichText::new("⚠ Worker Unresponsive")
                        .color(InspectorColors::ERROR)
                        .small(),
                );
            }

            ui.separator();
            ui.label(RichText::new(self.controller.phase().to_string()).color(secondary).small());

            if let Some(payload) = self.controller.payload() {
                ui.separator();
                let verb = match payload.origin {
                    PayloadOrigin::Read => "read",
                    PayloadOrigin::Saved => "saved",
                };
                ui.label(
                    RichText::new(format!(
                        "{} {} bytes at {}",
                        verb,
                        payload.text.len(),
                        payload.updated_at.format("%H:%M:%S%.3f")
                    ))
                    .color(secondary)
                    .small(),
                );
                if payload.binary {
                    ui.label(
                        RichText::new("binary, read-only")
                            .color(InspectorColors::WARNING)
                            .small(),
                    );
                }
            }

            if self.controller.is_saving() {
                ui.separator();
                ui.spinner();
                ui.label(RichText::new("Saving...").small());
            }

            let mut dismiss = false;
            if let Some(alert) = self.controller.alert() {
                ui.separator();
                let color = match alert.level {
                    AlertLevel::Info => InspectorColors::SUCCESS,
                    AlertLevel::Error => InspectorColors::ERROR,
                };
                ui.label(RichText::new(&alert.message).color(color));
                dismiss = ui.small_button("✖").clicked();
            }
            if dismiss {
                self.controller.dismiss_alert();
            }
        });
    }

    /// Mirror of the Find dialog: query field, hit count, closes on Escape.
    fn show_find_dialog(&mut self, ctx: &egui::Context) {
        let mut open = true;
        egui::Window::new("Find")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let response = ui.text_edit_singleline(&mut self.search_input);
                    let submitted =
                        response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if ui.button("Find").clicked() || submitted {
                        let hits = self.controller.search(&self.search_input).len();
                        self.find_result = Some(hits);
                        self.scroll_to_caret = hits > 0;
                    }
                });
                if let Some(hits) = self.find_result {
                    ui.label(format!("{} matches", hits));
                }
            });
        if !open {
            self.controller.escape();
            self.find_result = None;
        }
    }

    fn show_save_confirmation(&mut self, ctx: &egui::Context) {
        let Some(prompt) = self.controller.save_prompt().cloned() else {
            return;
        };
        let mut decision = None;
        egui::Window::new(prompt.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new("⚠").color(InspectorColors::WARNING).size(20.0));
                    ui.label(prompt.message);
                });
                ui.label(RichText::new(prompt.path.as_str()).strong());
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        decision = Some(true);
                    }
                    if ui.button("No").clicked() {
                        decision = Some(false);
                    }
                });
            });
        match decision {
            Some(true) => {
                if let Err(e) = self.controller.confirm_save() {
                    error!("Save not started: {}", e);
                }
            }
            Some(false) => self.controller.cancel_save(),
            None => {}
        }
    }

    fn show_data_area(&mut self, ui: &mut egui::Ui) {
        match self.controller.phase() {
            ViewerPhase::Idle => {
                ui.label(
                    RichText::new("Enter a node path above to view its data.")
                        .italics()
                        .color(self.secondary_text_color()),
                );
                return;
            }
            ViewerPhase::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    if let Some(path) = self.controller.requested_node() {
                        ui.label(format!("Loading {}", path));
                    }
                });
            }
            ViewerPhase::Displaying | ViewerPhase::Editing => {}
        }

        let spans: Vec<Range<usize>> = self.controller.highlights().iter().map(|s| s.range()).collect();
        let text_color = self.text_color();
        let mut layouter = move |ui: &egui::Ui, text: &str, wrap_width: f32| {
            let mut job = highlighted_job(text, &spans, text_color, InspectorColors::HIGHLIGHT);
            job.wrap.max_width = wrap_width;
            ui.fonts(|f| f.layout_job(job))
        };

        let mut selection = None;
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                if self.controller.is_editable() {
                    if self.edit_buffer != self.controller.text() {
                        self.edit_buffer = self.controller.text().to_string();
                    }
                    let output = egui::TextEdit::multiline(&mut self.edit_buffer)
                        .code_editor()
                        .desired_width(f32::INFINITY)
                        .layouter(&mut layouter)
                        .show(ui);
                    if output.response.changed() {
                        if let Err(e) = self.controller.edit_text(self.edit_buffer.clone()) {
                            warn!("Edit rejected: {}", e);
                        }
                    }
                    selection = output.cursor_range.map(|c| c.as_sorted_char_range());
                    self.place_caret(ui, &output);
                } else {
                    let mut text: &str = self.controller.text();
                    let output = egui::TextEdit::multiline(&mut text)
                        .code_editor()
                        .desired_width(f32::INFINITY)
                        .layouter(&mut layouter)
                        .show(ui);
                    selection = output.cursor_range.map(|c| c.as_sorted_char_range());
                    self.place_caret(ui, &output);
                }
            });

        if let Some(chars) = selection {
            let text = self.controller.text();
            let bytes = char_to_byte(text, chars.start)..char_to_byte(text, chars.end);
            if self.last_selection.as_ref() != Some(&bytes) {
                self.last_selection = Some(bytes.clone());
                self.controller.highlight_selection(bytes);
            }
        }
    }
}

impl ZooInspectorApp {
    /// Puts the text cursor on the controller's caret (the first search hit)
    /// and scrolls it into view.
    fn place_caret(&mut self, ui: &egui::Ui, output: &TextEditOutput) {
        if !std::mem::take(&mut self.scroll_to_caret) {
            return;
        }
        let caret = self.controller.caret();
        let ccursor = CCursor::new(byte_to_char(self.controller.text(), caret));

        let mut state = output.state.clone();
        state.cursor.set_char_range(Some(CCursorRange::one(ccursor)));
        state.store(ui.ctx(), output.response.id);

        let rect = output
            .galley
            .pos_from_ccursor(ccursor)
            .translate(output.galley_pos.to_vec2());
        ui.scroll_to_rect(rect, Some(egui::Align::Center));

        // The collapsed cursor must not clear the search highlights next frame
        self.last_selection = Some(caret..caret);
    }
}

fn byte_to_char(text: &str, byte_index: usize) -> usize {
    text.get(..byte_index)
        .map_or_else(|| text.chars().count(), |prefix| prefix.chars().count())
}

fn char_to_byte(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(byte, _)| byte)
}

/// Lays out `text` with every span painted as a search hit.
fn highlighted_job(text: &str, spans: &[Range<usize>], color: Color32, highlight: Color32) -> LayoutJob {
    let plain = TextFormat {
        font_id: FontId::monospace(13.0),
        color,
        ..Default::default()
    };
    let marked = TextFormat {
        background: highlight,
        color: Color32::BLACK,
        ..plain.clone()
    };

    let mut job = LayoutJob::default();
    let mut pos = 0;
    for span in spans {
        // Spans computed for another revision of the text are skipped
        if span.start < pos
            || span.end > text.len()
            || !text.is_char_boundary(span.start)
            || !text.is_char_boundary(span.end)
        {
            continue;
        }
        if span.start > pos {
            job.append(&text[pos..span.start], 0.0, plain.clone());
        }
        job.append(&text[span.clone()], 0.0, marked.clone());
        pos = span.end;
    }
    if pos < text.len() || job.sections.is_empty() {
        job.append(&text[pos..], 0.0, plain);
    }
    job
}

/// Implementation of the eframe App trait for the main application.
/// This is called on each frame to update the UI.
impl eframe::App for ZooInspectorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply completions from the data worker before drawing
        self.controller.process_events();

        self.apply_theme(ctx);
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.show_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.show_status_bar(ui);
        });

        if self.controller.is_search_open() {
            self.show_find_dialog(ctx);
        }
        if self.controller.save_prompt().is_some() {
            self.show_save_confirmation(ctx);
        }

        egui::CentralPanel::default()
            .frame(
                egui::Frame::default()
                    .fill(self.background_color())
                    .inner_margin(Margin::same(8.0)),
            )
            .show(ctx, |ui| {
                self.show_data_area(ui);
            });

        // Keep polling the worker while nothing else triggers a repaint
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
