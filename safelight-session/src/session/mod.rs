//! Filter session
//!
//! A [`FilterSession`] holds the one active filter: where it runs, its
//! argument schema, and the live value map. It loads filters through a
//! [`TransportFactory`] (local modules) or a [`RemoteDevice`], reconciles
//! values across reloads, runs the filter, and notifies two listener
//! streams:
//! - schema listeners get the full argument list whenever it is replaced
//! - value listeners get the changed entries whenever values change
//!
//! While a filter is loaded, the value map's keys are exactly the argument
//! names plus `$log`, `$time_usec` and `$pixels_processed`. With no filter
//! loaded both the argument list and the value map are empty.

pub mod listeners;
pub mod reconcile;

pub use listeners::{Listener, ListenerHandle, ListenerRegistry};

use safelight_common::argument::json_to_number;
use safelight_common::default_values::MAX_SIDE_LENGTH;
use safelight_common::values::{LOG_KEY, PIXELS_PROCESSED_KEY, TIME_USEC_KEY};
use safelight_common::wire::{CALL_VERB, DESCRIBE_VERB};
use safelight_common::{
    Argument, Buffer, BuildInfo, FilterDescription, Value, ValueMap, WireForm,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::remote::RemoteDevice;
use crate::transport::{ModuleReply, Transport, TransportError, TransportFactory};

/// Default side length of synthesized input buffers
pub const DEFAULT_BUFFER_SIDE_LENGTH: i32 = 64;

/// Where the active filter runs
enum ActiveTarget {
    Unloaded,
    Local(Transport),
    Remote(String),
}

/// The single active filter session
pub struct FilterSession {
    transports: Arc<dyn TransportFactory>,
    remote: Arc<dyn RemoteDevice>,
    active: ActiveTarget,
    arguments: Vec<Argument>,
    values: ValueMap,
    default_buffer_side_length: i32,
    schema_listeners: ListenerRegistry<[Argument]>,
    values_listeners: ListenerRegistry<ValueMap>,
}

impl FilterSession {
    pub fn new(transports: Arc<dyn TransportFactory>, remote: Arc<dyn RemoteDevice>) -> Self {
        Self {
            transports,
            remote,
            active: ActiveTarget::Unloaded,
            arguments: Vec::new(),
            values: ValueMap::new(),
            default_buffer_side_length: DEFAULT_BUFFER_SIDE_LENGTH,
            schema_listeners: ListenerRegistry::new(),
            values_listeners: ListenerRegistry::new(),
        }
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    /// Device of the active filter, or `None` when nothing is loaded
    pub fn active_device(&self) -> Option<&str> {
        match &self.active {
            ActiveTarget::Unloaded => None,
            ActiveTarget::Local(_) => Some(safelight_common::wire::LOCAL_DEVICE),
            ActiveTarget::Remote(device) => Some(device.as_str()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.arguments.is_empty()
    }

    pub fn default_buffer_side_length(&self) -> i32 {
        self.default_buffer_side_length
    }

    /// Side length for buffers synthesized by later loads, clamped to
    /// `1..=MAX_SIDE_LENGTH`
    pub fn set_default_buffer_side_length(&mut self, len: i32) {
        self.default_buffer_side_length = len.clamp(1, MAX_SIDE_LENGTH);
    }

    pub fn add_schema_listener(&mut self, listener: Listener<[Argument]>) -> ListenerHandle {
        self.schema_listeners.add(listener)
    }

    pub fn remove_schema_listener(&mut self, handle: &ListenerHandle) -> bool {
        self.schema_listeners.remove(handle)
    }

    pub fn add_values_listener(&mut self, listener: Listener<ValueMap>) -> ListenerHandle {
        self.values_listeners.add(listener)
    }

    pub fn remove_values_listener(&mut self, handle: &ListenerHandle) -> bool {
        self.values_listeners.remove(handle)
    }

    /// Load the filter for a completed build and return its signature
    ///
    /// The previous transport is detached before anything is awaited, so a
    /// late reply from it can never reach this session. Previous arguments
    /// and values stay visible until the new description arrives; on any
    /// failure the session is fully unloaded.
    pub async fn load_filter(&mut self, build: Option<&BuildInfo>) -> Result<String> {
        let Some(build) = build else {
            return Err(SessionError::InvalidBuildInfo);
        };
        self.detach();

        let reply = if build.is_local() {
            let transport = self.transports.load(&build.module_path());
            self.active = ActiveTarget::Local(transport.clone());
            transport.request(DESCRIBE_VERB, json!({})).await
        } else {
            self.active = ActiveTarget::Remote(build.device.clone());
            self.remote
                .deploy(&build.device, &build.signature, &build.target)
                .await
        };

        let described = reply
            .map_err(SessionError::from)
            .and_then(|reply| parse_description(&reply.success));
        match described {
            Ok(description) => {
                info!(
                    signature = %build.signature,
                    target = %build.target,
                    device = %build.device,
                    arguments = description.arguments.len(),
                    "Loaded filter"
                );
                self.process_description(description.arguments);
                Ok(build.signature.clone())
            }
            Err(e) => {
                warn!(signature = %build.signature, device = %build.device, "Failed to load filter: {}", e);
                self.unload();
                Err(e)
            }
        }
    }

    /// Unload the active filter, clearing the schema and all values
    pub fn unload(&mut self) {
        self.detach();
        self.arguments = Vec::new();
        self.values = ValueMap::new();
        self.schema_listeners.notify(&self.arguments);
        self.values_listeners.notify(&self.values);
    }

    /// Replace the schema from a described argument list
    ///
    /// Both the argument list and the value map are swapped in at once, then
    /// schema listeners and value listeners (with the full map) are called.
    pub fn process_description(&mut self, described: Vec<Argument>) {
        let (arguments, values) = reconcile::reconcile(
            &self.arguments,
            &self.values,
            described,
            self.default_buffer_side_length,
        );
        self.arguments = arguments;
        self.values = values;
        self.schema_listeners.notify(&self.arguments);
        self.values_listeners.notify(&self.values);
    }

    /// Merge changed values into the value map
    ///
    /// Only names already present are overwritten; unknown names are ignored.
    /// Value listeners receive `changed` as given.
    pub fn on_values_changed(&mut self, changed: ValueMap) {
        for (name, value) in &changed {
            if let Some(slot) = self.values.get_mut(name) {
                *slot = value.clone();
            }
        }
        self.values_listeners.notify(&changed);
    }

    /// Run the active filter with the current input values
    ///
    /// On success the outputs, `$log`, `$time_usec` and `$pixels_processed`
    /// are merged and the full value map is returned. On failure the outputs
    /// are nulled and `$log` carries the failure; the filter stays loaded.
    pub async fn run(&mut self, num_threads: u32) -> Result<ValueMap> {
        if self.arguments.is_empty() {
            return Err(SessionError::NoActiveFilter);
        }

        let (form, outcome) = match &self.active {
            ActiveTarget::Unloaded => return Err(SessionError::NoActiveFilter),
            ActiveTarget::Local(transport) => {
                let inputs = self.inputs(WireForm::Raw)?;
                let request = transport.request(
                    CALL_VERB,
                    json!({ "num_threads": num_threads, "inputs": inputs }),
                );
                (WireForm::Raw, request.await)
            }
            ActiveTarget::Remote(device) => {
                let inputs = self.inputs(WireForm::Base64)?;
                (WireForm::Base64, self.remote.run(device, num_threads, inputs).await)
            }
        };

        match outcome {
            Ok(reply) => self.apply_run_result(form, reply),
            Err(e) => {
                self.apply_run_failure(&e);
                Err(e.into())
            }
        }
    }

    /// Current input values in wire form, keyed by argument name
    fn inputs(&self, form: WireForm) -> Result<serde_json::Value> {
        let mut inputs = serde_json::Map::new();
        for argument in self.arguments.iter().filter(|a| a.is_input()) {
            let value = match self.values.get(&argument.name) {
                Some(value) => value
                    .to_wire(form)
                    .map_err(|e| SessionError::Rejected(e.to_string()))?,
                None => serde_json::Value::Null,
            };
            inputs.insert(argument.name.clone(), value);
        }
        Ok(serde_json::Value::Object(inputs))
    }

    fn apply_run_result(&mut self, form: WireForm, reply: ModuleReply) -> Result<ValueMap> {
        let outputs = reply
            .success
            .get("outputs")
            .and_then(|o| o.as_object())
            .ok_or(SessionError::MalformedResult)?;

        let mut changed = ValueMap::new();
        let mut pixels_processed = 0u64;
        for (name, dict) in outputs {
            if !self.values.contains_key(name) {
                return Err(SessionError::UnknownOutput(name.clone()));
            }
            let buffer = Buffer::from_wire(form, dict).map_err(|e| {
                debug!(output = %name, "Failed to decode output: {}", e);
                SessionError::MalformedResult
            })?;
            pixels_processed += buffer.pixel_count();
            changed.insert(name.clone(), Value::Buffer(buffer));
        }

        let time_usec = reply
            .success
            .get("time_usec")
            .and_then(json_to_number)
            .unwrap_or(0.0);
        changed.insert(LOG_KEY.to_string(), Value::Text(reply.log));
        changed.insert(TIME_USEC_KEY.to_string(), Value::Number(time_usec));
        changed.insert(
            PIXELS_PROCESSED_KEY.to_string(),
            Value::Number(pixels_processed as f64),
        );

        debug!(time_usec, pixels_processed, "Run completed");
        self.on_values_changed(changed);
        Ok(self.values.clone())
    }

    fn apply_run_failure(&mut self, error: &TransportError) {
        warn!("Run failed: {}", error);
        let mut changed = ValueMap::new();
        changed.insert(LOG_KEY.to_string(), Value::Text(error.to_string()));
        changed.insert(TIME_USEC_KEY.to_string(), Value::Number(0.0));
        changed.insert(PIXELS_PROCESSED_KEY.to_string(), Value::Number(0.0));
        for argument in self.arguments.iter().filter(|a| !a.is_input()) {
            changed.insert(argument.name.clone(), Value::Null);
        }
        self.on_values_changed(changed);
    }

    /// Drop the active target without touching arguments or values
    fn detach(&mut self) {
        if let ActiveTarget::Local(transport) =
            std::mem::replace(&mut self.active, ActiveTarget::Unloaded)
        {
            debug!(transport = transport.id(), "Unloading previous module");
            transport.unload();
        }
    }
}

/// Decode the `description` of a describe result
///
/// The description may arrive as JSON text or as an object.
fn parse_description(success: &serde_json::Value) -> Result<FilterDescription> {
    let description = success
        .get("description")
        .ok_or(SessionError::DescriptionParseFailure)?;
    let parsed = match description {
        serde_json::Value::String(text) => serde_json::from_str(text),
        other => serde_json::from_value(other.clone()),
    };
    parsed.map_err(|e| {
        debug!("Failed to parse description: {}", e);
        SessionError::DescriptionParseFailure
    })
}
