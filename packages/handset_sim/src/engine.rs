//! Client-side state reconciliation.
//!
//! The backend offers no push channel, so the engine keeps three views
//! current purely through request/response calls and a polling timer: the
//! device registry, the selected device's conversation, and the global
//! outbox. User actions and poll ticks both land here; the engine calls the
//! transport, resolves view models, and pushes them to the sink.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::Transport;
use crate::error::{Result, SimError};
use crate::phone;
use crate::types::{Device, DeviceKey, OutboxEntry, sorted_newest_first};
use crate::view::{ConversationView, MessageView, OutboxItemView, ViewSink};

struct EngineState {
    selected: Option<DeviceKey>,
    /// Mirror of the conversation pane, so a successful send can append its
    /// two receipt messages without a refetch.
    conversation: Vec<MessageView>,
    /// Last registry snapshot, plus any provisional entries added locally.
    known_devices: Vec<Device>,
    last_outbox_size: usize,
    poll: Option<CancellationToken>,
}

pub struct Engine {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ViewSink>,
    country_code: String,
    state: Mutex<EngineState>,
    /// Bumped on every selection change and reset. A conversation fetch
    /// carries the generation active at dispatch; a response arriving under
    /// a newer generation is stale and gets discarded instead of
    /// overwriting the current view.
    generation: AtomicU64,
    send_in_flight: AtomicBool,
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>, sink: Arc<dyn ViewSink>) -> Self {
        Self {
            transport,
            sink,
            country_code: phone::DEFAULT_COUNTRY_CODE.to_string(),
            state: Mutex::new(EngineState {
                selected: None,
                conversation: Vec::new(),
                known_devices: Vec::new(),
                last_outbox_size: 0,
                poll: None,
            }),
            generation: AtomicU64::new(0),
            send_in_flight: AtomicBool::new(false),
        }
    }

    /// Overrides the country calling code used when normalizing raw input
    /// in [`Engine::add_device`].
    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // Never held across an await; a poisoned lock means a panic already
        // happened under it.
        self.state.lock().expect("engine state lock poisoned")
    }

    pub fn selected_device(&self) -> Option<DeviceKey> {
        self.state().selected.clone()
    }

    pub fn known_devices(&self) -> Vec<Device> {
        self.state().known_devices.clone()
    }

    /// Initial load: registry first, then the outbox, matching what a
    /// frontend shows on startup. Callers start polling afterwards.
    pub async fn bootstrap(&self) {
        self.refresh_devices().await;
        self.refresh_outbox().await;
    }

    /// Changes the active device. `None` clears the conversation pane
    /// without a fetch; `Some` triggers a conversation refresh.
    pub async fn select_device(&self, key: Option<DeviceKey>) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        match key {
            None => {
                {
                    let mut state = self.state();
                    state.selected = None;
                    state.conversation.clear();
                }
                self.sink.conversation(ConversationView::Empty);
            }
            Some(key) => {
                self.state().selected = Some(key.clone());
                self.refresh_conversation(&key).await;
            }
        }
    }

    /// Normalizes raw user input, selects the resulting key, and makes sure
    /// the device list shows it. Unknown devices get a provisional
    /// zero-message entry until the next registry fetch replaces the list.
    pub async fn add_device(&self, raw: &str) {
        let key = phone::normalize_with(raw, &self.country_code);

        let devices = {
            let mut state = self.state();
            if !state.known_devices.iter().any(|d| d.phone_number == key) {
                state.known_devices.push(Device::provisional(key.clone()));
            }
            state.known_devices.clone()
        };
        self.sink.devices(&devices);

        self.select_device(Some(key)).await;
    }

    /// Sends a message from the selected device.
    ///
    /// Validation failures (no selection, empty body, a send already in
    /// flight) never reach the transport. On success the two receipt
    /// messages are appended to the conversation pane in order, then the
    /// outbox and registry are refreshed. On failure the pane is left
    /// untouched and the error is surfaced as a notice.
    pub async fn send_message(&self, body: &str) -> Result<()> {
        let body = body.trim();
        let Some(device) = self.selected_device() else {
            return Err(SimError::validation("no device selected"));
        };
        if body.is_empty() {
            return Err(SimError::validation("message body is empty"));
        }
        if self
            .send_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SimError::validation("a send is already in flight"));
        }

        let result = self.transport.send(&device, body).await;
        self.send_in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(receipt) => {
                let pane = {
                    let mut state = self.state();
                    // Selection may have moved while the send was in
                    // flight; only append to the pane it belongs to.
                    if state.selected.as_ref() == Some(&device) {
                        state
                            .conversation
                            .push(MessageView::from_message(&receipt.user_message));
                        state
                            .conversation
                            .push(MessageView::from_message(&receipt.system_response));
                        Some(state.conversation.clone())
                    } else {
                        None
                    }
                };
                if let Some(messages) = pane {
                    self.sink.conversation(ConversationView::Messages(messages));
                }

                self.refresh_outbox().await;
                self.refresh_devices().await;
                Ok(())
            }
            Err(err) => {
                self.sink.notice(&format!("Failed to send message: {err}"));
                Err(err)
            }
        }
    }

    /// Fetches and wholesale-replaces the conversation pane for `device`.
    /// A stale response (selection changed mid-flight) is discarded.
    pub async fn refresh_conversation(&self, device: &DeviceKey) {
        let dispatched = self.generation.load(Ordering::SeqCst);
        self.sink.conversation(ConversationView::Loading);

        match self.transport.fetch_conversation(device).await {
            Ok(conversation) => {
                let messages: Vec<MessageView> = conversation
                    .messages
                    .iter()
                    .map(MessageView::from_message)
                    .collect();

                let current = {
                    let mut state = self.state();
                    if self.generation.load(Ordering::SeqCst) == dispatched {
                        state.conversation = messages.clone();
                        true
                    } else {
                        false
                    }
                };
                if current {
                    self.sink.conversation(ConversationView::Messages(messages));
                } else {
                    debug!(device = %device, "discarding stale conversation fetch");
                }
            }
            Err(err) => {
                if self.generation.load(Ordering::SeqCst) == dispatched {
                    self.sink.conversation(ConversationView::Failed(format!(
                        "Failed to load conversation: {err}"
                    )));
                } else {
                    debug!(device = %device, "discarding stale conversation failure: {err}");
                }
            }
        }
    }

    /// Fetches and wholesale-replaces the device list. The current
    /// selection is untouched either way: a selected device missing from
    /// the new list may simply have no messages yet. Failures are logged
    /// and skipped.
    pub async fn refresh_devices(&self) {
        match self.transport.fetch_devices().await {
            Ok(devices) => {
                let devices = {
                    let mut state = self.state();
                    state.known_devices = devices;
                    state.known_devices.clone()
                };
                self.sink.devices(&devices);
            }
            Err(err) => {
                warn!("failed to refresh device list: {err}");
            }
        }
    }

    /// Fetches the outbox and renders it newest-first. Explicit calls
    /// always render, even when the size is unchanged; only the poll path
    /// short-circuits.
    pub async fn refresh_outbox(&self) {
        match self.transport.fetch_outbox().await {
            Ok(entries) => {
                let items = Self::resolve_outbox(entries);
                self.state().last_outbox_size = items.len();
                self.sink.outbox(&items);
            }
            Err(err) => {
                warn!("failed to refresh outbox: {err}");
            }
        }
    }

    /// Clears all conversations and the outbox server-side. On success the
    /// local state is emptied and empty views are emitted; on failure state
    /// is untouched and the error is surfaced.
    pub async fn reset(&self) -> Result<()> {
        match self.transport.reset().await {
            Ok(receipt) => {
                self.generation.fetch_add(1, Ordering::SeqCst);
                {
                    let mut state = self.state();
                    state.selected = None;
                    state.conversation.clear();
                    state.known_devices.clear();
                    state.last_outbox_size = 0;
                }
                self.sink.conversation(ConversationView::Empty);
                self.sink.devices(&[]);
                self.sink.outbox(&[]);
                debug!(status = %receipt.status, "simulator reset: {}", receipt.message);
                Ok(())
            }
            Err(err) => {
                self.sink.notice(&format!("Failed to reset: {err}"));
                Err(err)
            }
        }
    }

    /// One change-detection pass, decoupled from the wall-clock timer so
    /// tick sequences can be driven deterministically.
    ///
    /// Compares the outbox message count to the last known count. Equal
    /// counts mean no rendering and no further fetches. A changed count
    /// renders the outbox and, when a device is selected, re-fetches that
    /// conversation before refreshing the registry. Count comparison is a
    /// heuristic: an add paired with a remove between ticks looks like no
    /// change, since the server exposes no change token.
    pub async fn poll_tick(&self) {
        let entries = match self.transport.fetch_outbox().await {
            Ok(entries) => entries,
            Err(err) => {
                // Best-effort; tried again at the next interval.
                debug!("poll tick failed: {err}");
                return;
            }
        };

        if self.state().last_outbox_size == entries.len() {
            return;
        }

        let items = Self::resolve_outbox(entries);
        self.state().last_outbox_size = items.len();
        self.sink.outbox(&items);

        let selected = self.selected_device();
        if let Some(device) = selected {
            self.refresh_conversation(&device).await;
        }
        self.refresh_devices().await;
    }

    /// Starts the polling timer. Idempotent: starting while running cancels
    /// the previous timer first, so at most one is ever active. Requires a
    /// tokio runtime.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) {
        let token = CancellationToken::new();
        let previous = self.state().poll.replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first interval tick fires immediately; skip it so the
            // cadence starts one interval after start_polling.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("outbox poller cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        engine.poll_tick().await;
                    }
                }
            }
        });
    }

    /// Stops the polling timer. Idempotent.
    pub fn stop_polling(&self) {
        if let Some(token) = self.state().poll.take() {
            token.cancel();
        }
    }

    fn resolve_outbox(entries: Vec<OutboxEntry>) -> Vec<OutboxItemView> {
        sorted_newest_first(entries)
            .into_iter()
            .map(OutboxItemView::from_entry)
            .collect()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(token) = state.poll.take() {
                token.cancel();
            }
        }
    }
}
