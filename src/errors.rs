use thiserror::Error;

/// Errors that can occur on a node (worker or master).
#[derive(Error, Debug)]
pub enum NodeError {
    /// IO error (socket operations, config files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid thresholds, data size mismatch, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error (peer unreachable, connection lost, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol violation (misaddressed block, oversize chunk, etc.)
    ///
    /// These indicate transport or peer-id corruption and terminate the node.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Data source error
    #[error("Data source error: {0}")]
    Source(String),

    /// Data sink error
    #[error("Data sink error: {0}")]
    Sink(String),
}

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

// Implement From for TOML serialization errors
impl From<toml::ser::Error> for NodeError {
    fn from(e: toml::ser::Error) -> Self {
        NodeError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for NodeError {
    fn from(e: toml::de::Error) -> Self {
        NodeError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodeError::Config("data size must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: data size must be positive"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let node_err: NodeError = io_err.into();
        assert!(node_err.to_string().contains("IO error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }

        assert_eq!(returns_result().unwrap(), 42);
    }
}
