//! Transport construction

use std::path::PathBuf;
use tracing::debug;

use super::{ProcessChannel, Transport};

/// Creates a transport for a module path
pub trait TransportFactory: Send + Sync {
    /// Start loading the module at `module_path` and return its transport
    ///
    /// The transport is returned Pending; load failures surface through
    /// its requests.
    fn load(&self, module_path: &str) -> Transport;
}

/// Runs modules as child processes from a module directory
#[derive(Debug, Clone)]
pub struct ProcessTransportFactory {
    module_dir: PathBuf,
}

impl ProcessTransportFactory {
    pub fn new(module_dir: impl Into<PathBuf>) -> Self {
        Self {
            module_dir: module_dir.into(),
        }
    }

    /// Executable path for a module path
    pub fn executable(&self, module_path: &str) -> PathBuf {
        self.module_dir.join(module_path)
    }
}

impl TransportFactory for ProcessTransportFactory {
    fn load(&self, module_path: &str) -> Transport {
        let path = self.executable(module_path);
        debug!("Loading module from {}", path.display());
        let (channel, events) = ProcessChannel::spawn(path);
        Transport::new(Box::new(channel), events)
    }
}
