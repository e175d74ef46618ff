//! Shared test helpers
//!
//! - [`MockChannel`]: records posted envelopes and optionally answers them
//! - [`MockFactory`]: a [`TransportFactory`] handing out mock-backed transports
//! - fixtures for argument dictionaries and module replies

#![allow(dead_code)]

use safelight_common::{Buffer, RequestEnvelope, TypeCode, WireForm};
use safelight_session::remote::RemoteDevice;
use safelight_session::transport::{
    ChannelEvent, EventSender, LoadState, ModuleChannel, Transport, TransportFactory,
    TransportResult,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Computes the reply for one request: `Ok(success)` or `Err(failure)`
pub type Responder = Arc<dyn Fn(&str, &Value) -> Result<Value, String> + Send + Sync>;

/// Wrap a closure as a [`Responder`]
pub fn responder(
    f: impl Fn(&str, &Value) -> Result<Value, String> + Send + Sync + 'static,
) -> Responder {
    Arc::new(f)
}

pub const MODULE_LOG: &str = "Here is the log from running the filter.";

pub struct MockChannel {
    posted: Arc<Mutex<Vec<RequestEnvelope>>>,
    closed: Arc<AtomicBool>,
    events: EventSender,
    responder: Option<Responder>,
    probe_ok: bool,
}

impl ModuleChannel for MockChannel {
    fn probe(&self) -> bool {
        self.probe_ok
    }

    fn post(&mut self, envelope: &RequestEnvelope) -> safelight_common::Result<()> {
        self.posted.lock().unwrap().push(envelope.clone());
        if let Some(responder) = &self.responder {
            let reply = match responder(&envelope.verb, &envelope.data) {
                Ok(success) => json!({
                    "verb": "$response", "id": envelope.id, "success": success, "log": MODULE_LOG
                }),
                Err(failure) => json!({
                    "verb": "$response", "id": envelope.id, "failure": failure, "log": MODULE_LOG
                }),
            };
            let _ = self.events.send(ChannelEvent::Message(reply));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A transport wired to a mock channel, with the test's side of the channel
pub struct MockModule {
    pub transport: Transport,
    pub events: EventSender,
    pub posted: Arc<Mutex<Vec<RequestEnvelope>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockModule {
    pub fn new(probe_ok: bool, responder: Option<Responder>) -> Self {
        let (events, rx) = tokio::sync::mpsc::unbounded_channel();
        let posted = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let channel = MockChannel {
            posted: Arc::clone(&posted),
            closed: Arc::clone(&closed),
            events: events.clone(),
            responder,
            probe_ok,
        };
        let transport = Transport::new(Box::new(channel), rx);
        Self {
            transport,
            events,
            posted,
            closed,
        }
    }

    pub fn send(&self, event: ChannelEvent) {
        self.events.send(event).unwrap();
    }

    pub fn posted_ids(&self) -> Vec<String> {
        self.posted.lock().unwrap().iter().map(|e| e.id.clone()).collect()
    }

    pub fn posted_verbs(&self) -> Vec<String> {
        self.posted.lock().unwrap().iter().map(|e| e.verb.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Give spawned tasks a chance to drain their queues
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Factory whose modules become ready immediately and answer via a responder
pub struct MockFactory {
    responder: Mutex<Responder>,
    silent: AtomicBool,
    pub loaded_paths: Mutex<Vec<String>>,
    pub modules: Mutex<Vec<MockModule>>,
}

impl MockFactory {
    pub fn new(responder: Responder) -> Arc<Self> {
        Arc::new(Self {
            responder: Mutex::new(responder),
            silent: AtomicBool::new(false),
            loaded_paths: Mutex::new(Vec::new()),
            modules: Mutex::new(Vec::new()),
        })
    }

    pub fn set_responder(&self, responder: Responder) {
        *self.responder.lock().unwrap() = responder;
    }

    /// Modules loaded while silent never answer on their own
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    /// Deliver `event` to module `index`, even after its transport failed
    pub fn inject(&self, index: usize, event: ChannelEvent) {
        let _ = self.modules.lock().unwrap()[index].events.send(event);
    }

    pub fn posted_ids(&self, index: usize) -> Vec<String> {
        self.modules.lock().unwrap()[index].posted_ids()
    }

    pub fn load_state(&self, index: usize) -> LoadState {
        self.modules.lock().unwrap()[index].transport.load_state()
    }

    pub fn module_closed(&self, index: usize) -> bool {
        self.modules.lock().unwrap()[index].is_closed()
    }

    pub fn posted_verbs(&self, index: usize) -> Vec<String> {
        self.modules.lock().unwrap()[index].posted_verbs()
    }

    pub fn last_call_data(&self) -> Option<Value> {
        let modules = self.modules.lock().unwrap();
        let posted = modules.last()?.posted.lock().unwrap();
        let data = posted.iter().rev().find(|e| e.verb == "call").map(|e| e.data.clone());
        data
    }
}

impl TransportFactory for MockFactory {
    fn load(&self, module_path: &str) -> Transport {
        self.loaded_paths.lock().unwrap().push(module_path.to_string());
        let responder = if self.silent.load(Ordering::SeqCst) {
            None
        } else {
            Some(Arc::clone(&*self.responder.lock().unwrap()))
        };
        let module = MockModule::new(true, responder);
        module.send(ChannelEvent::Ready);
        let transport = module.transport.clone();
        self.modules.lock().unwrap().push(module);
        transport
    }
}

/// Remote device that must never be reached
pub struct NoRemote;

#[async_trait::async_trait]
impl RemoteDevice for NoRemote {
    async fn deploy(&self, device: &str, _signature: &str, _target: &str) -> TransportResult {
        panic!("unexpected deploy to {}", device);
    }

    async fn run(&self, device: &str, _num_threads: u32, _inputs: Value) -> TransportResult {
        panic!("unexpected run on {}", device);
    }
}

pub fn scalar(name: &str, type_code: &str, type_bits: u32) -> Value {
    json!({"name": name, "kind": 0, "type_code": type_code, "type_bits": type_bits})
}

pub fn input_buffer(name: &str) -> Value {
    json!({"name": name, "kind": 1, "dimensions": 3, "type_code": "uint", "type_bits": 8})
}

pub fn output_buffer(name: &str) -> Value {
    json!({"name": name, "kind": 2, "dimensions": 3, "type_code": "uint", "type_bits": 8})
}

/// Describe success with the description as JSON text
pub fn describe_success(arguments: Vec<Value>) -> Value {
    json!({
        "description": json!({"version": 0, "name": "foo", "arguments": arguments}).to_string()
    })
}

/// A `side` x `side` uint8 output buffer
pub fn output_buffer_value(side: i32) -> Buffer {
    Buffer {
        host: vec![7; (side * side * 4) as usize],
        extent: [side, side, 4, 0],
        stride: [1, side, side * side, 0],
        min: [0; 4],
        elem_size: 1,
        dimensions: 3,
        type_code: TypeCode::Uint,
    }
}

/// Module answering describe with `arguments` and call with `outputs`
pub fn filter_responder(arguments: Vec<Value>, outputs: Vec<(&'static str, Buffer)>) -> Responder {
    responder(move |verb, _data| match verb {
        "describe" => Ok(describe_success(arguments.clone())),
        "call" => {
            let mut encoded = serde_json::Map::new();
            for (name, buffer) in &outputs {
                encoded.insert(name.to_string(), buffer.to_wire(WireForm::Raw).unwrap());
            }
            Ok(json!({"outputs": encoded, "time_usec": 42}))
        }
        other => Err(format!("Unknown verb: {}", other)),
    })
}
