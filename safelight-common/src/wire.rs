//! Request/response envelopes exchanged with compute modules
//!
//! A host posts
//!
//! ```text
//! { "verb": "describe", "id": "3_1", "data": { ... } }
//! ```
//!
//! and the module answers exactly once per id with
//!
//! ```text
//! { "verb": "$response", "id": "3_1", "success": { ... }, "log": "..." }
//! { "verb": "$response", "id": "3_1", "failure": "error message" }
//! ```
//!
//! The same success/failure/log shape is returned by remote devices over HTTP.

use serde::{Deserialize, Serialize};

use crate::argument::{json_truthy, Argument};

/// Verb reserved for responses
pub const RESPONSE_VERB: &str = "$response";
/// Verb asking a module for its argument description
pub const DESCRIBE_VERB: &str = "describe";
/// Verb asking a module to run the filter
pub const CALL_VERB: &str = "call";
/// Device name for filters executed by a local module
pub const LOCAL_DEVICE: &str = "chrome";

/// One request to a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub verb: String,
    pub id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// One response from a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub verb: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(id: impl Into<String>, success: serde_json::Value, log: &str) -> Self {
        Self {
            verb: RESPONSE_VERB.to_string(),
            id: id.into(),
            success: Some(success),
            failure: None,
            log: (!log.is_empty()).then(|| log.to_string()),
        }
    }

    pub fn failure(id: impl Into<String>, failure: impl Into<String>, log: &str) -> Self {
        Self {
            verb: RESPONSE_VERB.to_string(),
            id: id.into(),
            success: None,
            failure: Some(failure.into()),
            log: (!log.is_empty()).then(|| log.to_string()),
        }
    }

    /// Interpret an inbound message as a response
    ///
    /// Returns `None` unless the verb is [`RESPONSE_VERB`] and an id is present.
    /// A falsy `success` (null, false, 0, "") selects the failure branch.
    pub fn parse(message: &serde_json::Value) -> Option<Self> {
        if message.get("verb").and_then(|v| v.as_str()) != Some(RESPONSE_VERB) {
            return None;
        }
        let id = match message.get("id")? {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let success = message.get("success").filter(|v| json_truthy(v)).cloned();
        let failure = message.get("failure").and_then(|f| match f {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });
        let log = message.get("log").and_then(|l| l.as_str()).map(str::to_string);
        Some(Self {
            verb: RESPONSE_VERB.to_string(),
            id,
            success,
            failure,
            log,
        })
    }
}

/// Identifies one completed build artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub signature: String,
    pub target: String,
    pub device: String,
}

impl BuildInfo {
    pub fn new(
        signature: impl Into<String>,
        target: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            target: target.into(),
            device: device.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.device == LOCAL_DEVICE
    }

    /// Module path for this build, relative to the module directory
    pub fn module_path(&self) -> String {
        format!("safelight_{}_{}", self.signature, self.target)
    }
}

/// Decoded `description` payload of a describe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub arguments: Vec<Argument>,
}
