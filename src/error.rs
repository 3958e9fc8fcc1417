//! Error types for the telemetry bridge
//!
//! Each module carries its own error enum; this aggregate is what the
//! binary entrypoint and the lifecycle controller surface.

use thiserror::Error;

/// Aggregate error for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] crate::auth::CredentialError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] crate::bridge::commands::DispatchError),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialError;
    use crate::transport::TransportError;

    #[test]
    fn test_credential_error_converts() {
        let error: BridgeError =
            CredentialError::UnsupportedAlgorithm("HS256".to_string()).into();
        assert!(matches!(error, BridgeError::Credential(_)));
        assert!(error.to_string().contains("HS256"));
    }

    #[test]
    fn test_transport_error_converts() {
        let error: BridgeError = TransportError::Link("socket reset".to_string()).into();
        assert!(matches!(error, BridgeError::Transport(_)));
        assert!(error.to_string().contains("socket reset"));
    }
}
