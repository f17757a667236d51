//! The node data viewer's state machine.
//!
//! [`ViewerController`] is the only owner of [`DisplayState`]. It runs on the
//! UI thread, hands blocking store calls to the data worker and applies the
//! worker's completions when the UI drains them with
//! [`ViewerController::process_events`]. Each request is tagged with an id;
//! a completion whose id is no longer the outstanding one is discarded, so a
//! late answer for a superseded selection never reaches the display.

use std::fmt;
use std::ops::Range;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::{FormatTogglePolicy, ViewerConfig};
use crate::error::{ProviderError, ViewerError};
use crate::format::{format, is_structured, unformat};
use crate::highlight::{find_matches, Matches};
use crate::node::NodePath;
use crate::provider::{ConnectionState, DataProvider, NodeData};
use crate::worker::{spawn_data_worker, DataCommand, DataEvent};

pub const SAVE_CONFIRM_TITLE: &str = "Confirm Save";
pub const SAVE_CONFIRM_MESSAGE: &str =
    "Are you sure you want to save this node? (this action cannot be reverted)";

/// Tooltip for the search button, naming the platform shortcut.
pub fn search_tooltip() -> &'static str {
    if cfg!(target_os = "macos") {
        "Find (^/⌘F)"
    } else {
        "Find (^F)"
    }
}

/// Where the viewer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerPhase {
    /// No node selected yet
    Idle,
    /// A fetch is in flight
    Loading,
    /// Text rendered read-only
    Displaying,
    /// Text mutable, save enabled
    Editing,
}

impl fmt::Display for ViewerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewerPhase::Idle => "idle",
            ViewerPhase::Loading => "loading",
            ViewerPhase::Displaying => "displaying",
            ViewerPhase::Editing => "editing",
        })
    }
}

/// What the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub selected: Option<NodePath>,
    pub text: String,
    pub formatted: bool,
    pub editable: bool,
}

/// How the cached payload was last obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOrigin {
    Read,
    Saved,
}

/// The last payload read from (or written to) the store for the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePayload {
    pub path: NodePath,
    pub text: String,
    /// The stored bytes are not UTF-8; `text` is lossy and never written back
    pub binary: bool,
    /// `text` parses as JSON, so the format toggle changes it
    pub structured: bool,
    pub origin: PayloadOrigin,
    pub updated_at: DateTime<Utc>,
}

impl NodePayload {
    fn read(path: NodePath, data: NodeData) -> Self {
        Self {
            path,
            structured: is_structured(&data.text),
            text: data.text,
            binary: data.binary,
            origin: PayloadOrigin::Read,
            updated_at: Utc::now(),
        }
    }

    fn saved(path: NodePath, text: String) -> Self {
        Self {
            path,
            structured: is_structured(&text),
            text,
            binary: false,
            origin: PayloadOrigin::Saved,
            updated_at: Utc::now(),
        }
    }
}

/// A save waiting for the user's yes/no.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePrompt {
    pub path: NodePath,
    pub title: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Error,
}

/// A message for the user surface (status bar or dialog).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Info,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Error,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    /// Ctrl+F / Cmd+F
    Find,
    Escape,
}

#[derive(Debug)]
struct PendingFetch {
    request_id: u64,
    path: NodePath,
    /// Value of the format toggle once this fetch lands
    formatted: bool,
}

#[derive(Debug)]
struct PendingSave {
    request_id: u64,
    path: NodePath,
}

pub struct ViewerController {
    config: ViewerConfig,
    provider: Arc<dyn DataProvider>,
    state: DisplayState,
    payload: Option<NodePayload>,
    pending_fetch: Option<PendingFetch>,
    pending_save: Option<PendingSave>,
    save_prompt: Option<SavePrompt>,
    search_query: String,
    search_open: bool,
    highlights: Matches,
    caret: usize,
    alert: Option<Alert>,
    last_error: Option<ViewerError>,
    connection_error: Option<String>,
    next_request_id: u64,
    stale_completions: u64,
    command_sender: Sender<DataCommand>,
    event_receiver: Receiver<DataEvent>,
    last_ping: Instant,
    last_pong: Instant,
    worker_healthy: bool,
}

impl ViewerController {
    /// Creates a viewer and spawns its data worker.
    pub fn new(provider: Arc<dyn DataProvider>, config: ViewerConfig) -> Result<Self, ViewerError> {
        let channels = spawn_data_worker(Arc::clone(&provider), &config).map_err(|e| {
            error!("Failed to spawn data worker: {}", e);
            ViewerError::WorkerUnavailable
        })?;

        info!("Viewer initialized with data worker");

        let now = Instant::now();
        Ok(Self {
            state: DisplayState {
                formatted: config.format_by_default,
                ..DisplayState::default()
            },
            config,
            provider,
            payload: None,
            pending_fetch: None,
            pending_save: None,
            save_prompt: None,
            search_query: String::new(),
            search_open: false,
            highlights: Matches::default(),
            caret: 0,
            alert: None,
            last_error: None,
            connection_error: None,
            next_request_id: 1,
            stale_completions: 0,
            command_sender: channels.command_sender,
            event_receiver: channels.event_receiver,
            last_ping: now,
            last_pong: now,
            worker_healthy: true,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn display_state(&self) -> &DisplayState {
        &self.state
    }

    pub fn phase(&self) -> ViewerPhase {
        if self.pending_fetch.is_some() {
            ViewerPhase::Loading
        } else if self.state.selected.is_none() {
            ViewerPhase::Idle
        } else if self.state.editable {
            ViewerPhase::Editing
        } else {
            ViewerPhase::Displaying
        }
    }

    pub fn text(&self) -> &str {
        &self.state.text
    }

    pub fn selected(&self) -> Option<&NodePath> {
        self.state.selected.as_ref()
    }

    /// The node a fetch is currently in flight for.
    pub fn requested_node(&self) -> Option<&NodePath> {
        self.pending_fetch.as_ref().map(|p| &p.path)
    }

    pub fn payload(&self) -> Option<&NodePayload> {
        self.payload.as_ref()
    }

    pub fn is_formatted(&self) -> bool {
        self.state.formatted
    }

    pub fn is_editable(&self) -> bool {
        self.state.editable
    }

    pub fn is_saving(&self) -> bool {
        self.pending_save.is_some()
    }

    /// Whether the save button should be enabled.
    pub fn can_save(&self) -> bool {
        self.phase() == ViewerPhase::Editing && self.pending_save.is_none()
    }

    pub fn highlights(&self) -> &Matches {
        &self.highlights
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn is_search_open(&self) -> bool {
        self.search_open
    }

    /// Caret offset: 0 after a fetch, first hit after a search.
    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn save_prompt(&self) -> Option<&SavePrompt> {
        self.save_prompt.as_ref()
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn last_error(&self) -> Option<&ViewerError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<ViewerError> {
        self.last_error.take()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.provider.connection_state()
    }

    /// Error reported by the worker when connecting, if any.
    pub fn connection_error(&self) -> Option<&str> {
        self.connection_error.as_deref()
    }

    /// Completions dropped because a newer request superseded them.
    pub fn stale_completions(&self) -> u64 {
        self.stale_completions
    }

    pub fn worker_healthy(&self) -> bool {
        self.worker_healthy
    }

    /// Selects a node and starts reading its data.
    ///
    /// The display keeps showing the previous node until the read lands. Any
    /// fetch still in flight loses its right to update the display.
    pub fn select_node(&mut self, path: NodePath) -> Result<(), ViewerError> {
        if self.state.editable {
            debug!("Selection changed, leaving edit mode");
            self.leave_edit_mode();
        }
        self.save_prompt = None;
        let formatted = self.state.formatted;
        self.issue_fetch(path, formatted)
    }

    /// Flips between formatted and raw display.
    ///
    /// While displaying, the toggle works on the cached payload (or re-reads
    /// the node under [`FormatTogglePolicy::Refetch`]); un-formatting restores
    /// the payload byte for byte. While editing it transforms the edited text.
    pub fn toggle_format(&mut self) -> Result<(), ViewerError> {
        let target = !self.state.formatted;
        match self.phase() {
            ViewerPhase::Displaying => match self.config.format_toggle {
                FormatTogglePolicy::Local => {
                    let payload = self.payload.as_ref().ok_or(ViewerError::NoSelection)?;
                    let text = if target {
                        format(&payload.text)
                    } else {
                        payload.text.clone()
                    };
                    self.state.formatted = target;
                    self.set_text(text);
                    Ok(())
                }
                FormatTogglePolicy::Refetch => {
                    let path = self.state.selected.clone().ok_or(ViewerError::NoSelection)?;
                    self.issue_fetch(path, target)
                }
            },
            ViewerPhase::Editing => {
                if self.pending_save.is_some() {
                    return Err(ViewerError::SaveInFlight);
                }
                let text = if target {
                    format(&self.state.text)
                } else {
                    unformat(&self.state.text)
                };
                self.state.formatted = target;
                self.set_text(text);
                Ok(())
            }
            phase => Err(ViewerError::InvalidPhase {
                action: "toggle format",
                phase,
            }),
        }
    }

    /// Makes the text editable. Has no effect unless the session is connected
    /// and the payload is text.
    pub fn enter_edit_mode(&mut self) -> Result<(), ViewerError> {
        let connection = self.provider.connection_state();
        if !connection.is_connected() {
            debug!("Refusing edit mode while {}", connection);
            return Err(ViewerError::NotConnected);
        }
        match self.phase() {
            ViewerPhase::Displaying => {
                if let Some(payload) = self.payload.as_ref().filter(|p| p.binary) {
                    return Err(ViewerError::BinaryPayload(payload.path.clone()));
                }
                self.state.editable = true;
                Ok(())
            }
            ViewerPhase::Editing => Ok(()),
            phase => Err(ViewerError::InvalidPhase {
                action: "enter edit mode",
                phase,
            }),
        }
    }

    /// Drops edit mode and any unsaved edits.
    pub fn leave_edit_mode(&mut self) {
        if !self.state.editable {
            return;
        }
        self.state.editable = false;
        self.save_prompt = None;
        self.restore_payload_view();
    }

    /// The edit button. Entering needs a connected session; leaving never fails.
    pub fn toggle_edit_mode(&mut self) -> Result<(), ViewerError> {
        if self.state.editable {
            self.leave_edit_mode();
            Ok(())
        } else {
            self.enter_edit_mode()
        }
    }

    /// Replaces the displayed text with the user's edit. The buffer is frozen
    /// while a save of it is in flight.
    pub fn edit_text(&mut self, text: String) -> Result<(), ViewerError> {
        match self.phase() {
            ViewerPhase::Editing if self.pending_save.is_some() => Err(ViewerError::SaveInFlight),
            ViewerPhase::Editing => {
                self.set_text(text);
                Ok(())
            }
            phase => Err(ViewerError::InvalidPhase {
                action: "edit text",
                phase,
            }),
        }
    }

    /// First step of a save: asks for confirmation.
    pub fn request_save(&mut self) -> Result<&SavePrompt, ViewerError> {
        let phase = self.phase();
        if phase != ViewerPhase::Editing {
            return Err(ViewerError::InvalidPhase {
                action: "save",
                phase,
            });
        }
        if self.pending_save.is_some() {
            return Err(ViewerError::SaveInFlight);
        }
        let path = self.state.selected.clone().ok_or(ViewerError::NoSelection)?;
        Ok(&*self.save_prompt.insert(SavePrompt {
            path,
            title: SAVE_CONFIRM_TITLE,
            message: SAVE_CONFIRM_MESSAGE,
        }))
    }

    /// The user answered yes: writes the text to the store.
    ///
    /// Formatted text is compacted before it is written.
    pub fn confirm_save(&mut self) -> Result<(), ViewerError> {
        let prompt = self
            .save_prompt
            .take()
            .ok_or(ViewerError::NoPendingConfirmation)?;
        let phase = self.phase();
        if phase != ViewerPhase::Editing {
            return Err(ViewerError::InvalidPhase {
                action: "save",
                phase,
            });
        }
        if self.pending_save.is_some() {
            return Err(ViewerError::SaveInFlight);
        }

        let text = if self.state.formatted {
            unformat(&self.state.text)
        } else {
            self.state.text.clone()
        };
        let request_id = self.take_request_id();
        info!("Saving node {} (request #{})", prompt.path, request_id);
        self.send(DataCommand::Save {
            request_id,
            path: prompt.path.clone(),
            text,
        })?;
        self.pending_save = Some(PendingSave {
            request_id,
            path: prompt.path,
        });
        Ok(())
    }

    /// The user answered no.
    pub fn cancel_save(&mut self) {
        if self.save_prompt.take().is_some() {
            debug!("Save cancelled by user");
        }
    }

    /// Highlights every case-insensitive hit of `query` and moves the caret
    /// to the first one. Display State is not touched.
    pub fn search(&mut self, query: &str) -> &Matches {
        self.apply_query(query);
        if let Some(first) = self.highlights.first_start() {
            self.caret = first;
        }
        &self.highlights
    }

    /// Highlights the text under a selection; a collapsed selection clears
    /// all highlights.
    pub fn highlight_selection(&mut self, selection: Range<usize>) {
        if selection.is_empty() {
            self.clear_highlights();
            return;
        }
        match self.state.text.get(selection).map(str::to_string) {
            Some(selected) => {
                self.search(&selected);
            }
            None => self.clear_highlights(),
        }
    }

    pub fn open_search(&mut self) {
        self.search_open = true;
    }

    /// Clears every highlight and closes the search prompt.
    pub fn escape(&mut self) {
        self.clear_highlights();
        self.search_open = false;
    }

    pub fn handle_key(&mut self, key: ViewerKey) {
        match key {
            ViewerKey::Find => self.open_search(),
            ViewerKey::Escape => self.escape(),
        }
    }

    /// Applies every completion the worker has delivered so far.
    /// Called once per frame; never blocks.
    pub fn process_events(&mut self) -> usize {
        let mut events = Vec::new();
        while let Ok(event) = self.event_receiver.try_recv() {
            debug!("Received event from worker: {:?}", event);
            events.push(event);
        }
        let count = events.len();
        for event in events {
            self.apply_event(event);
        }
        self.check_worker_health();
        count
    }

    /// Blocks up to `timeout` for one completion and applies it.
    pub fn wait_for_event(&mut self, timeout: Duration) -> bool {
        match self.event_receiver.recv_timeout(timeout) {
            Ok(event) => {
                debug!("Received event from worker: {:?}", event);
                self.apply_event(event);
                true
            }
            Err(_) => false,
        }
    }

    fn apply_event(&mut self, event: DataEvent) {
        match event {
            DataEvent::Connected => {
                info!("Data provider reported connected");
                self.connection_error = None;
            }
            DataEvent::ConnectionError(message) => {
                error!("Data provider connection failed: {}", message);
                self.alert = Some(Alert::error(format!("Connection failed: {}", message)));
                self.connection_error = Some(message);
            }
            DataEvent::DataFetched {
                request_id,
                path,
                result,
            } => self.on_fetched(request_id, path, result),
            DataEvent::DataSaved {
                request_id,
                path,
                text,
                result,
            } => self.on_saved(request_id, path, text, result),
            DataEvent::Pong => {
                self.worker_healthy = true;
                self.last_pong = Instant::now();
            }
        }
    }

    fn on_fetched(
        &mut self,
        request_id: u64,
        path: NodePath,
        result: Result<NodeData, ProviderError>,
    ) {
        let is_current = self
            .pending_fetch
            .as_ref()
            .is_some_and(|pending| pending.request_id == request_id);
        if !is_current {
            debug!("Discarding stale fetch #{} for {}", request_id, path);
            self.stale_completions += 1;
            return;
        }
        let Some(pending) = self.pending_fetch.take() else {
            return;
        };

        match result {
            Ok(data) => {
                let display = if pending.formatted {
                    format(&data.text)
                } else {
                    data.text.clone()
                };
                self.payload = Some(NodePayload::read(path.clone(), data));
                self.state.selected = Some(path);
                self.state.formatted = pending.formatted;
                self.state.editable = false;
                self.set_text(display);
                self.caret = 0;
            }
            Err(source) => {
                // Display keeps the last good node and text
                self.raise(ViewerError::Fetch { path, source });
            }
        }
    }

    fn on_saved(
        &mut self,
        request_id: u64,
        path: NodePath,
        text: String,
        result: Result<(), ProviderError>,
    ) {
        let is_current = self
            .pending_save
            .as_ref()
            .is_some_and(|pending| pending.request_id == request_id);
        if !is_current {
            warn!("Ignoring completion of unknown save #{} for {}", request_id, path);
            self.stale_completions += 1;
            return;
        }
        self.pending_save = None;

        match result {
            Ok(()) => {
                info!("Node {} saved", path);
                // The display follows the new payload even if edit mode was
                // already left while the write was in flight
                if self.state.selected.as_ref() == Some(&path) {
                    self.payload = Some(NodePayload::saved(path.clone(), text));
                    self.state.editable = false;
                    self.restore_payload_view();
                }
                self.alert = Some(Alert::info(format!("Saved {}", path)));
            }
            Err(source) => {
                // Stay in edit mode so the user can retry
                self.raise(ViewerError::Save { path, source });
            }
        }
    }

    fn check_worker_health(&mut self) {
        if self.last_ping.elapsed() > self.config.health_check_interval() {
            debug!("Sending health check ping");
            self.last_ping = Instant::now();
            if let Err(e) = self.command_sender.send(DataCommand::Ping) {
                error!("Failed to send ping: {:?}", e);
                self.worker_healthy = false;
            }
        }
        if self.last_pong.elapsed() > self.config.health_check_grace() {
            self.worker_healthy = false;
        }
    }

    fn issue_fetch(&mut self, path: NodePath, formatted: bool) -> Result<(), ViewerError> {
        let request_id = self.take_request_id();
        self.send(DataCommand::Fetch {
            request_id,
            path: path.clone(),
        })?;
        if let Some(superseded) = self.pending_fetch.replace(PendingFetch {
            request_id,
            path,
            formatted,
        }) {
            debug!(
                "Fetch #{} for {} superseded by #{}",
                superseded.request_id, superseded.path, request_id
            );
        }
        Ok(())
    }

    fn send(&mut self, command: DataCommand) -> Result<(), ViewerError> {
        match self.command_sender.send(command) {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to send command to data worker: {:?}", e.0);
                self.worker_healthy = false;
                Err(ViewerError::WorkerUnavailable)
            }
        }
    }

    fn take_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn raise(&mut self, err: ViewerError) {
        error!("{}", err);
        self.alert = Some(Alert::error(err.to_string()));
        self.last_error = Some(err);
    }

    /// Re-renders the cached payload under the current format toggle.
    fn restore_payload_view(&mut self) {
        let text = match &self.payload {
            Some(payload) if self.state.formatted => format(&payload.text),
            Some(payload) => payload.text.clone(),
            None => String::new(),
        };
        self.set_text(text);
    }

    /// Every text change re-runs the active query so spans never go stale.
    fn set_text(&mut self, text: String) {
        self.state.text = text;
        if self.caret > self.state.text.len() {
            self.caret = 0;
        }
        let query = std::mem::take(&mut self.search_query);
        self.apply_query(&query);
    }

    fn apply_query(&mut self, query: &str) {
        self.search_query = query.to_string();
        self.highlights = find_matches(&self.state.text, query);
        debug!("{} matches for {:?}", self.highlights.len(), query);
    }

    fn clear_highlights(&mut self) {
        self.search_query.clear();
        self.highlights = Matches::default();
    }
}

impl Drop for ViewerController {
    fn drop(&mut self) {
        let _ = self.command_sender.send(DataCommand::Shutdown);
    }
}
