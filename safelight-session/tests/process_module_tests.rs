//! End-to-end tests against the real `brighten-module` executable
//!
//! The binary is copied into a temporary module directory under the name
//! a build would give it, then loaded through [`ProcessTransportFactory`].
//! Tests run serially so no spawn inherits a copy still open for writing.

use safelight_common::values::{LOG_KEY, PIXELS_PROCESSED_KEY};
use safelight_common::wire::LOCAL_DEVICE;
use safelight_common::{BuildInfo, Value, ValueMap};
use safelight_session::module::brighten::{brighten, OUTPUT_NAME};
use safelight_session::transport::{LoadState, TransportError};
use safelight_session::{
    FilterSession, HttpRemoteDevice, ProcessTransportFactory, SessionError, TransportFactory,
};
use serde_json::json;
use serial_test::serial;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SIG: &str = "C0FFEE";
const TARGET: &str = "x86-64-linux";

fn build() -> BuildInfo {
    BuildInfo::new(SIG, TARGET, LOCAL_DEVICE)
}

/// Module directory holding the brighten module under this build's name
fn module_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join(build().module_path());
    std::fs::copy(env!("CARGO_BIN_EXE_brighten-module"), &target).unwrap();
    dir
}

fn session_in(dir: &Path) -> FilterSession {
    // Unused: every build here is local.
    let remote = HttpRemoteDevice::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    FilterSession::new(
        Arc::new(ProcessTransportFactory::new(dir)),
        Arc::new(remote),
    )
}

#[tokio::test]
#[serial]
async fn test_load_and_run_module_process() {
    let dir = module_dir();
    let mut session = session_in(dir.path());
    session.set_default_buffer_side_length(8);

    assert_eq!(session.load_filter(Some(&build())).await, Ok(SIG.to_string()));
    assert_eq!(session.arguments().len(), 3);
    assert_eq!(session.values()["brightness_level"], Value::Number(1.5));

    let mut changed = ValueMap::new();
    changed.insert("brightness_level".to_string(), Value::Number(2.0));
    session.on_values_changed(changed);

    let input = session.values()["input"].as_buffer().unwrap().clone();
    let values = session.run(3).await.unwrap();
    assert_eq!(values[OUTPUT_NAME], Value::Buffer(brighten(&input, 2.0)));
    assert_eq!(values[PIXELS_PROCESSED_KEY], Value::Number(64.0));
    assert_eq!(
        values[LOG_KEY],
        Value::Text("brightness_level = 2, num_threads = 3\n".to_string())
    );

    // A second run reuses the same process.
    assert!(session.run(1).await.is_ok());
    session.unload();
}

#[tokio::test]
#[serial]
async fn test_missing_executable_fails_load() {
    let dir = TempDir::new().unwrap();
    let mut session = session_in(dir.path());

    assert_eq!(
        session.load_filter(Some(&build())).await,
        Err(SessionError::TransportLoadFailed)
    );
    assert!(session.values().is_empty());
}

#[tokio::test]
#[serial]
async fn test_unknown_verb_is_rejected_by_module() {
    let dir = module_dir();
    let factory = ProcessTransportFactory::new(dir.path());
    let transport = factory.load(&build().module_path());

    let err = transport.request("resize", json!({})).await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Rejected {
            failure: "Unknown verb: resize".to_string(),
            log: String::new()
        }
    );
    assert_eq!(transport.load_state(), LoadState::Loaded);

    transport.unload();
    assert_eq!(transport.load_state(), LoadState::Failed);
    assert_eq!(
        transport.request("describe", json!({})).await,
        Err(TransportError::LoadFailed)
    );
}
