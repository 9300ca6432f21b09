//! Error types for the wire protocol and the gateway process.

use thiserror::Error;

/// Failures tied to a single frame.
///
/// These never escape a connection: the gateway logs them and drops the
/// offending frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,
    #[error("connection closed")]
    ConnectionClosed,
}

/// Failures of the listener, a connection's transport, or startup configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ServerError {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        assert_eq!(
            ProtocolError::Deserialization("expected value".into()).to_string(),
            "deserialization error: expected value"
        );
        assert_eq!(ProtocolError::InvalidUtf8.to_string(), "binary frame is not valid UTF-8");
    }

    #[test]
    fn test_server_error_from_io() {
        let err: ServerError = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken").into();
        assert!(matches!(err, ServerError::Io(_)));
        assert!(err.to_string().contains("taken"));
    }
}
