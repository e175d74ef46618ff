//! Message channel to one compute module instance
//!
//! A channel carries request envelopes out via [`ModuleChannel::post`] and
//! reports everything that happens on the module side as [`ChannelEvent`]s
//! on an mpsc receiver handed to the transport at construction.

use safelight_common::{RequestEnvelope, Result};
use tokio::sync::mpsc;

/// Inbound event from a module channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The module finished loading and accepts requests
    Ready,
    /// The module could not be loaded
    LoadError(String),
    /// The module went away after loading
    Crashed(String),
    /// One JSON message from the module
    Message(serde_json::Value),
}

/// Sending half of a channel's event stream
pub type EventSender = mpsc::UnboundedSender<ChannelEvent>;

/// Receiving half of a channel's event stream
pub type EventReceiver = mpsc::UnboundedReceiver<ChannelEvent>;

/// Outbound half of a module channel
///
/// Implementations must not block: `post` hands the envelope off and
/// returns. Dropping the end of the event stream is treated as a crash.
pub trait ModuleChannel: Send {
    /// Whether the host environment can support this channel at all
    ///
    /// Called once by the transport shortly after construction.
    fn probe(&self) -> bool;

    /// Send one request envelope to the module
    fn post(&mut self, envelope: &RequestEnvelope) -> Result<()>;

    /// Tear the channel down; no events are expected afterwards
    fn close(&mut self);
}
