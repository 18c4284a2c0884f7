//! Error types for the VSP client stack

use thiserror::Error;

/// Every failure the transport, codec, hierarchy and session layers can raise
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VspError {
    // Transport errors
    #[error("failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("not connected")]
    NotConnected,

    #[error("failed to send command '{payload}'")]
    SendFailed { payload: String },

    #[error("failed to receive response")]
    ReceiveFailed,

    #[error("response length exceeds limit of {limit} bytes")]
    Overflow { limit: usize },

    #[error("timed out waiting for peer")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    // Protocol errors
    #[error("failed to parse response: empty response")]
    EmptyResponse,

    /// Error text reported by the peer itself
    #[error("{0}")]
    Peer(String),

    #[error("unexpected response to {command} command: {response:?}")]
    UnexpectedResponse {
        command: String,
        response: Vec<String>,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    // Hierarchy errors
    #[error("no such {kind}: {path}")]
    NotFound { kind: &'static str, path: String },

    #[error("no such target: {0}")]
    NoSuchTarget(String),

    #[error("invalid hierarchy document: {0}")]
    InvalidDocument(String),

    #[error("unexpected hierarchy node: {0}")]
    UnexpectedNode(String),

    #[error("{0} is disconnected")]
    Disconnected(String),

    // Session errors
    #[error("invalid breakpoint id in response: {0}")]
    InvalidBreakpointId(String),

    #[error("need {required} argument(s) for {command}, have {given}")]
    MissingArguments {
        command: String,
        required: usize,
        given: usize,
    },

    #[error("run monitor failed: {0}")]
    Monitor(String),

    #[error("unknown command '{0}', try 'help'")]
    UnknownVerb(String),
}

impl From<std::io::Error> for VspError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => VspError::Timeout,
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::NotConnected => VspError::NotConnected,
            _ => VspError::Io(err.to_string()),
        }
    }
}

/// Result type for VSP operations
pub type VspResult<T> = Result<T, VspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_error_is_verbatim() {
        let err = VspError::Peer("unknown attribute, sim.cpu.foo".into());
        assert_eq!(err.to_string(), "unknown attribute, sim.cpu.foo");
    }

    #[test]
    fn test_io_error_mapping() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(VspError::from(eof), VspError::NotConnected);

        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(VspError::from(timeout), VspError::Timeout);

        let other = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert!(matches!(VspError::from(other), VspError::Io(_)));
    }

    #[test]
    fn test_missing_arguments_message() {
        let err = VspError::MissingArguments {
            command: "reset".into(),
            required: 2,
            given: 1,
        };
        assert_eq!(err.to_string(), "need 2 argument(s) for reset, have 1");
    }
}
