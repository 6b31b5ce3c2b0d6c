//! Error types for the uplink.
//!
//! Three layers, matching where each failure is handled:
//! - `SubmitError`: producer path. Non-fatal, the reading is dropped and counted.
//! - `TransportError`: connect/send. Non-fatal to the transmitter, the cycle is aborted.
//! - `UplinkError`: crate boundary. Configuration and startup failures are fatal.

use std::{io, time::Duration};
use thiserror::Error;

/// Convenience alias for results using the crate-level error type.
pub type UplinkResult<T> = std::result::Result<T, UplinkError>;

#[derive(Debug, Error)]
pub enum UplinkError {
    /// Configuration parsed but is semantically invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A timer, queue or task could not be created. Fatal at startup.
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Rejection of a reading on the producer path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("queue full (capacity {capacity}); reading from device {device_id} dropped")]
    QueueFull { capacity: usize, device_id: i32 },

    #[error("non-finite value {value} from device {device_id}")]
    NonFiniteValue { value: f32, device_id: i32 },

    #[error("non-finite reference {value} refused")]
    NonFiniteReference { value: f32 },
}

/// Failure reported by a `Transport` or one of its connections.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// The sink refused the operation without an OS-level error.
    #[error("sink rejected operation: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Maps an I/O error from a bounded socket operation, folding the
    /// platform's timeout kinds into `Timeout`.
    pub fn from_io(op: &'static str, after: Duration, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                TransportError::Timeout { op, after }
            }
            _ => TransportError::Send(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uplink_error_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no route");
        let err = UplinkError::from(io_err);
        assert!(matches!(err, UplinkError::Io(_)));
        assert!(err.to_string().contains("no route"));
    }

    #[test]
    fn uplink_error_from_transport_error() {
        let err = UplinkError::from(TransportError::Rejected("closed".into()));
        assert!(matches!(err, UplinkError::Transport(_)));
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn queue_full_names_device_and_capacity() {
        let err = SubmitError::QueueFull { capacity: 5, device_id: 7 };
        let msg = err.to_string();
        assert!(msg.contains("capacity 5"));
        assert!(msg.contains("device 7"));
    }

    #[test]
    fn write_timeout_kinds_become_timeout() {
        let after = Duration::from_millis(250);
        let err = TransportError::from_io(
            "send",
            after,
            io::Error::new(io::ErrorKind::WouldBlock, "eagain"),
        );
        assert!(matches!(err, TransportError::Timeout { op: "send", .. }));

        let err = TransportError::from_io(
            "send",
            after,
            io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        );
        assert!(matches!(err, TransportError::Send(_)));
    }
}
