//! View models and the sink seam.
//!
//! The engine resolves everything a frontend needs (ordering, direction,
//! RTL hints) and pushes it through [`ViewSink`]. The sink consumes view
//! models; it never produces engine state.

use chrono::{DateTime, Utc};

use crate::script;
use crate::types::{Device, DeviceKey, Direction, Message, OutboxEntry};

/// One chat message, ready to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub direction: Direction,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    /// Render right-to-left (Arabic-dominant body).
    pub rtl: bool,
}

impl MessageView {
    pub fn from_message(message: &Message) -> Self {
        Self {
            direction: message.direction,
            rtl: script::is_rtl(&message.body),
            body: message.body.clone(),
            timestamp: message.timestamp,
        }
    }
}

/// The conversation pane's full state.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationView {
    /// No device selected.
    Empty,
    /// A fetch is in flight.
    Loading,
    Messages(Vec<MessageView>),
    Failed(String),
}

/// One outbox row, newest-first ordering decided by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxItemView {
    pub phone_number: DeviceKey,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub rtl: bool,
}

impl OutboxItemView {
    pub fn from_entry(entry: OutboxEntry) -> Self {
        Self {
            rtl: script::is_rtl(&entry.body),
            phone_number: entry.phone_number,
            body: entry.body,
            timestamp: entry.timestamp,
        }
    }
}

/// Receives fully-resolved view models from the engine.
///
/// Implementations paint; they must not call back into the engine from
/// within these methods. `notice` carries user-facing error text for
/// user-initiated operations (send, reset); background refresh failures are
/// only logged.
pub trait ViewSink: Send + Sync {
    fn conversation(&self, view: ConversationView);
    fn devices(&self, devices: &[Device]);
    fn outbox(&self, items: &[OutboxItemView]);
    fn notice(&self, message: &str);
}
