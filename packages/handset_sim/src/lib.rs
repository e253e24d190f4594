//! # Handset Sim
//!
//! A library for driving an SMS-gateway simulator backend as if from a real
//! handset, without telephony hardware. The backend exposes a small HTTP
//! API (send, per-device conversation, device registry, global outbox,
//! reset) and no push channel, so this crate keeps client-side views
//! current through request/response calls and time-based polling.
//!
//! ## Pieces
//!
//! - [`phone`] — canonicalizes user-entered phone strings into one stable
//!   device key
//! - [`script`] — right-to-left rendering classification for message bodies
//! - [`GatewayClient`] — the HTTP transport, one request per operation
//! - [`Engine`] — the reconciliation core: selection, sends, refreshes,
//!   and outbox change detection on a poll timer
//! - [`ViewSink`] — the seam a frontend implements to paint resolved view
//!   models
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use handset_sim::{Engine, GatewayClient, ViewSink, ConversationView, Device, OutboxItemView};
//!
//! struct Printer;
//!
//! impl ViewSink for Printer {
//!     fn conversation(&self, view: ConversationView) { println!("{view:?}"); }
//!     fn devices(&self, devices: &[Device]) { println!("{devices:?}"); }
//!     fn outbox(&self, items: &[OutboxItemView]) { println!("{items:?}"); }
//!     fn notice(&self, message: &str) { eprintln!("{message}"); }
//! }
//!
//! # async fn run() {
//! let client = GatewayClient::new("http://127.0.0.1:8080/api/simulator");
//! let engine = Arc::new(Engine::new(Arc::new(client), Arc::new(Printer)));
//!
//! engine.bootstrap().await;
//! engine.start_polling(Duration::from_millis(2000));
//!
//! engine.add_device("0912345678").await;
//! engine.send_message("HELP").await.unwrap();
//! # }
//! ```
//!
//! The engine is a best-effort observer of server state, not a source of
//! truth: the registry and a conversation are fetched independently and may
//! transiently disagree, and outbox change detection compares message
//! counts because the server exposes no change token.

pub mod client;
pub mod engine;
pub mod error;
pub mod phone;
pub mod script;
pub mod types;
pub mod view;

pub use client::{GatewayClient, Transport};
pub use engine::Engine;
pub use error::{Result, SimError};
pub use types::{
    Conversation, Device, DeviceKey, Direction, Message, OutboxEntry, ResetReceipt, SendReceipt,
};
pub use view::{ConversationView, MessageView, OutboxItemView, ViewSink};
