//! # Safelight Session Library (safelight-session)
//!
//! Runs compiled image filters and keeps their parameter values consistent
//! while the filter's shape changes underneath a live session.
//!
//! **Architecture:**
//! - [`transport`]: correlated request/response channel to one compute module
//! - [`remote`]: deploy and run on remote devices over HTTP
//! - [`session`]: the active filter, its schema and values, and listeners
//! - [`module`]: the module side of the protocol, plus a reference filter

pub mod error;
pub mod module;
pub mod remote;
pub mod session;
pub mod transport;

pub use error::{Result, SessionError};
pub use remote::{HttpRemoteDevice, RemoteDevice};
pub use session::{FilterSession, ListenerHandle};
pub use transport::{ProcessTransportFactory, Transport, TransportError, TransportFactory};

/// Build identification: git hash and profile
pub fn build_id() -> String {
    format!(
        "{} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("SAFELIGHT_GIT_HASH"),
        env!("SAFELIGHT_BUILD_PROFILE")
    )
}
