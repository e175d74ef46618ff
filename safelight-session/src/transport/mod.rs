//! Module transport
//!
//! A [`Transport`] owns one [`ModuleChannel`] and correlates requests with
//! responses by id. It starts out Pending; requests issued before the module
//! signals readiness are queued and dispatched in submission order once it
//! does.
//!
//! ```text
//! Pending --Ready--> Loaded --unload()--> Failed
//!    |                  |
//!    +--LoadError/------+--Crashed/stream end--> Failed
//!       probe failure
//! ```
//!
//! Failed is terminal: every queued request and every outstanding response
//! fails with [`TransportError::LoadFailed`], and later requests fail
//! immediately without touching the channel.

pub mod channel;
pub mod factory;
pub mod process;

pub use channel::{ChannelEvent, EventReceiver, EventSender, ModuleChannel};
pub use factory::{ProcessTransportFactory, TransportFactory};
pub use process::ProcessChannel;

use safelight_common::{RequestEnvelope, ResponseEnvelope};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Process-wide transport id counter; ids are never reused
static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Successful module reply
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleReply {
    pub success: serde_json::Value,
    pub log: String,
}

/// Failed module request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The module never loaded, crashed, or was unloaded
    #[error("Load failed")]
    LoadFailed,

    /// The module answered with a failure
    #[error("{failure}")]
    Rejected { failure: String, log: String },
}

impl TransportError {
    /// Captured module log, if the module got far enough to produce one
    pub fn log(&self) -> &str {
        match self {
            TransportError::LoadFailed => "",
            TransportError::Rejected { log, .. } => log,
        }
    }
}

pub type TransportResult = std::result::Result<ModuleReply, TransportError>;

type ReplySender = oneshot::Sender<TransportResult>;

/// Load state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed,
}

struct Inner {
    id: u64,
    next_request: u64,
    load_state: LoadState,
    pending_requests: VecDeque<(RequestEnvelope, ReplySender)>,
    pending_responses: HashMap<String, ReplySender>,
    channel: Option<Box<dyn ModuleChannel>>,
}

impl Inner {
    fn dispatch(&mut self, envelope: RequestEnvelope, reply: ReplySender) {
        let Some(channel) = self.channel.as_mut() else {
            let _ = reply.send(Err(TransportError::LoadFailed));
            return;
        };
        match channel.post(&envelope) {
            Ok(()) => {
                debug!(transport = self.id, id = %envelope.id, verb = %envelope.verb, "Dispatched request");
                self.pending_responses.insert(envelope.id, reply);
            }
            Err(e) => {
                warn!(transport = self.id, id = %envelope.id, "Failed to post request: {}", e);
                let _ = reply.send(Err(TransportError::Rejected {
                    failure: e.to_string(),
                    log: String::new(),
                }));
            }
        }
    }

    fn mark_loaded(&mut self) {
        if self.load_state != LoadState::Pending {
            return;
        }
        self.load_state = LoadState::Loaded;
        debug!(
            transport = self.id,
            queued = self.pending_requests.len(),
            "Module loaded"
        );
        while let Some((envelope, reply)) = self.pending_requests.pop_front() {
            self.dispatch(envelope, reply);
        }
    }

    fn fail(&mut self, reason: &str) {
        if self.load_state == LoadState::Failed {
            return;
        }
        debug!(transport = self.id, "Transport failed: {}", reason);
        self.load_state = LoadState::Failed;
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        for (_, reply) in self.pending_requests.drain(..) {
            let _ = reply.send(Err(TransportError::LoadFailed));
        }
        for (_, reply) in self.pending_responses.drain() {
            let _ = reply.send(Err(TransportError::LoadFailed));
        }
    }

    fn complete(&mut self, response: ResponseEnvelope) {
        let Some(reply) = self.pending_responses.remove(&response.id) else {
            debug!(transport = self.id, id = %response.id, "Ignoring response with unknown id");
            return;
        };
        let log = response.log.unwrap_or_default();
        let result = match response.success {
            Some(success) => Ok(ModuleReply { success, log }),
            None => Err(TransportError::Rejected {
                failure: response.failure.unwrap_or_default(),
                log,
            }),
        };
        let _ = reply.send(result);
    }
}

/// Correlated request/response transport to one compute module
///
/// Cloning yields another handle to the same transport.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Mutex<Inner>>,
}

impl Transport {
    /// Wrap a channel and start processing its events
    ///
    /// Must be called within a tokio runtime. The capability probe runs on
    /// the event task after the first yield.
    pub fn new(channel: Box<dyn ModuleChannel>, events: EventReceiver) -> Self {
        let id = NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::new(Mutex::new(Inner {
            id,
            next_request: 0,
            load_state: LoadState::Pending,
            pending_requests: VecDeque::new(),
            pending_responses: HashMap::new(),
            channel: Some(channel),
        }));
        tokio::spawn(pump_events(Arc::downgrade(&inner), events));
        Self { inner }
    }

    pub fn id(&self) -> u64 {
        self.lock().id
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load_state
    }

    /// Send `verb` with `data` to the module
    ///
    /// The envelope is queued, dispatched, or failed before this returns;
    /// the returned future only waits for the outcome.
    pub fn request(
        &self,
        verb: &str,
        data: serde_json::Value,
    ) -> impl Future<Output = TransportResult> + Send + 'static {
        let (reply, outcome) = oneshot::channel();
        {
            let mut inner = self.lock();
            inner.next_request += 1;
            let envelope = RequestEnvelope {
                verb: verb.to_string(),
                id: format!("{}_{}", inner.id, inner.next_request),
                data,
            };
            match inner.load_state {
                LoadState::Pending => inner.pending_requests.push_back((envelope, reply)),
                LoadState::Loaded => inner.dispatch(envelope, reply),
                LoadState::Failed => {
                    let _ = reply.send(Err(TransportError::LoadFailed));
                }
            }
        }
        async move { outcome.await.unwrap_or(Err(TransportError::LoadFailed)) }
    }

    /// Close the channel and fail everything outstanding
    pub fn unload(&self) {
        self.lock().fail("unloaded");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drive one transport from its channel's events until it fails or is dropped
async fn pump_events(inner: Weak<Mutex<Inner>>, mut events: EventReceiver) {
    tokio::task::yield_now().await;

    {
        let Some(strong) = inner.upgrade() else { return };
        let mut state = lock_inner(&strong);
        if state.load_state == LoadState::Failed {
            return;
        }
        let supported = state.channel.as_ref().map(|c| c.probe()).unwrap_or(false);
        if !supported {
            warn!(transport = state.id, "Module channel is not supported here");
            state.fail("capability probe failed");
            return;
        }
    }

    while let Some(event) = events.recv().await {
        let Some(strong) = inner.upgrade() else { return };
        let mut state = lock_inner(&strong);
        match event {
            ChannelEvent::Ready => state.mark_loaded(),
            ChannelEvent::LoadError(reason) => {
                warn!(transport = state.id, "Module failed to load: {}", reason);
                state.fail(&reason);
            }
            ChannelEvent::Crashed(reason) => {
                if state.load_state != LoadState::Failed {
                    warn!(transport = state.id, "Module crashed: {}", reason);
                }
                state.fail(&reason);
            }
            ChannelEvent::Message(message) => match ResponseEnvelope::parse(&message) {
                Some(response) => state.complete(response),
                None => debug!(transport = state.id, "Ignoring non-response message"),
            },
        }
        if state.load_state == LoadState::Failed {
            return;
        }
    }

    if let Some(strong) = inner.upgrade() {
        lock_inner(&strong).fail("event stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NullChannel;

    impl ModuleChannel for NullChannel {
        fn probe(&self) -> bool {
            true
        }
        fn post(&mut self, _envelope: &RequestEnvelope) -> safelight_common::Result<()> {
            Ok(())
        }
        fn close(&mut self) {}
    }

    #[tokio::test]
    async fn test_request_ids_are_scoped_to_transport() {
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let a = Transport::new(Box::new(NullChannel), rx);
        let (_tx2, rx2) = tokio::sync::mpsc::unbounded_channel();
        let b = Transport::new(Box::new(NullChannel), rx2);
        assert_ne!(a.id(), b.id());

        let _first = a.request("describe", json!({}));
        let _second = a.request("describe", json!({}));
        let inner = a.lock();
        let ids: Vec<_> = inner.pending_requests.iter().map(|(e, _)| e.id.clone()).collect();
        assert_eq!(ids, vec![format!("{}_1", inner.id), format!("{}_2", inner.id)]);
    }

    #[tokio::test]
    async fn test_unload_is_terminal() {
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let t = Transport::new(Box::new(NullChannel), rx);
        let queued = t.request("describe", json!({}));
        t.unload();
        assert_eq!(t.load_state(), LoadState::Failed);
        assert_eq!(queued.await, Err(TransportError::LoadFailed));
        assert_eq!(t.request("call", json!({})).await, Err(TransportError::LoadFailed));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TransportError::LoadFailed.to_string(), "Load failed");
        let rejected = TransportError::Rejected {
            failure: "bad input".to_string(),
            log: "trace".to_string(),
        };
        assert_eq!(rejected.to_string(), "bad input");
        assert_eq!(rejected.log(), "trace");
    }
}
