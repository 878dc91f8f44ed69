//! Error types for arplearnd

use thiserror::Error;

/// Errors that can occur in arplearnd
#[derive(Debug, Error)]
pub enum ArpLearnError {
    /// Invalid command line or derived configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Interface name did not resolve to a live interface
    #[error("Interface not found: {name}")]
    InterfaceNotFound {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Loading the classifier object into the kernel failed
    #[error("Failed to load classifier object: {0}")]
    Load(String),

    /// Program lookup or program load failed
    #[error("Classifier program error: {0}")]
    Program(String),

    /// Queueing discipline or filter installation failed on an interface
    #[error("Failed to attach classifier to {interface}: {reason}")]
    Attach { interface: String, reason: String },

    /// Event map lookup or conversion failed
    #[error("Event map error: {0}")]
    Map(String),

    /// Event record could not be decoded
    #[error("Malformed event record: expected {expected} bytes, got {got}")]
    Decode { expected: usize, got: usize },

    /// Netlink socket or neighbor-table request error
    #[error("Netlink error: {0}")]
    Netlink(String),

    /// Network-layer address failed to parse
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    /// Link-layer address failed to parse
    #[error("Invalid MAC address: {0}")]
    InvalidHardwareAddress(String),

    /// Event source read failure
    #[error("Event source error: {0}")]
    EventSource(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArpLearnError {
    /// Setup failures stop the daemon; everything else is handled per event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InterfaceNotFound { .. }
                | Self::Load(_)
                | Self::Program(_)
                | Self::Attach { .. }
                | Self::Map(_)
        )
    }
}

/// Result type alias for arplearnd operations
pub type Result<T> = std::result::Result<T, ArpLearnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ArpLearnError::Config("missing --attach-to".into()).is_fatal());
        assert!(
            ArpLearnError::Attach {
                interface: "eth0".into(),
                reason: "EPERM".into()
            }
            .is_fatal()
        );
        assert!(!ArpLearnError::Decode { expected: 16, got: 0 }.is_fatal());
        assert!(!ArpLearnError::Netlink("EINVAL".into()).is_fatal());
        assert!(!ArpLearnError::EventSource("EINTR".into()).is_fatal());
    }

    #[test]
    fn test_decode_message() {
        let err = ArpLearnError::Decode { expected: 16, got: 3 };
        assert_eq!(err.to_string(), "Malformed event record: expected 16 bytes, got 3");
    }
}
