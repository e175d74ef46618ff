//! Error types for safelight-session
//!
//! Every session failure renders to a human-readable message; that message
//! is what callers show to the user.

use thiserror::Error;

use crate::transport::TransportError;

/// Failure of a filter session operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// `load_filter` was called without a build descriptor
    #[error("Invalid buildInfo.")]
    InvalidBuildInfo,

    /// The describe result had no usable `description`
    #[error("Description parse failed")]
    DescriptionParseFailure,

    /// The module transport failed or was unloaded
    #[error("Load failed")]
    TransportLoadFailed,

    /// A run produced an output the current schema does not declare
    #[error("Saw unknown output: {0}")]
    UnknownOutput(String),

    /// A run result had no `outputs`, or an output did not decode
    #[error("Malformed result")]
    MalformedResult,

    /// No filter is loaded
    #[error("There is no filter ready to run")]
    NoActiveFilter,

    /// The module or remote device reported a failure
    #[error("{0}")]
    Rejected(String),
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::LoadFailed => SessionError::TransportLoadFailed,
            TransportError::Rejected { failure, .. } => SessionError::Rejected(failure),
        }
    }
}

/// Convenience Result type using SessionError
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(SessionError::InvalidBuildInfo.to_string(), "Invalid buildInfo.");
        assert_eq!(
            SessionError::UnknownOutput("blur".to_string()).to_string(),
            "Saw unknown output: blur"
        );
        assert_eq!(SessionError::NoActiveFilter.to_string(), "There is no filter ready to run");
    }

    #[test]
    fn test_from_transport_error() {
        assert_eq!(
            SessionError::from(TransportError::LoadFailed),
            SessionError::TransportLoadFailed
        );
        let rejected = TransportError::Rejected {
            failure: "out of memory".to_string(),
            log: String::new(),
        };
        assert_eq!(
            SessionError::from(rejected),
            SessionError::Rejected("out of memory".to_string())
        );
    }
}
