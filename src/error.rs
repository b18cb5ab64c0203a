use thiserror::Error;

/// Errors that can occur when driving ANT channels
///
/// Protocol-level failures reported by the radio (failed transfers, dropped
/// channels) are not represented here: the channel state machine absorbs them.
#[derive(Error, Debug)]
pub enum AntError {
    /// The channel is already bound to a sensor or scanner
    #[error("Channel {channel} is already attached")]
    AlreadyAttached {
        /// Channel index
        channel: u8,
    },

    /// The transport refused to grant the channel slot
    #[error("Transport refused to grant channel {channel}")]
    AttachRefused {
        /// Channel index
        channel: u8,
    },

    /// The transport does not support receive-scan mode
    #[error("Transport cannot scan")]
    ScanUnsupported,

    /// The transport refused to release the channel slot
    #[error("Transport refused to release channel {channel}")]
    DetachRefused {
        /// Channel index
        channel: u8,
    },

    /// No sensor is bound to the channel
    #[error("Channel {channel} is not attached")]
    NotAttached {
        /// Channel index
        channel: u8,
    },

    /// Invalid command parameters
    #[error("Invalid command parameters: {0}")]
    InvalidParameters(String),

    /// Frame parsing failed
    #[error("Failed to parse frame: {0}")]
    ParseError(String),

    /// The transport went away
    #[error("Transport disconnected")]
    Disconnected,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ANT operations
pub type Result<T> = std::result::Result<T, AntError>;

impl AntError {
    /// Check if this error is a violated precondition of `attach`/`scan`/`detach`
    ///
    /// These are programmer errors and must not be retried blindly.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyAttached { .. }
                | Self::AttachRefused { .. }
                | Self::ScanUnsupported
                | Self::DetachRefused { .. }
                | Self::NotAttached { .. }
        )
    }

    /// Check if this error indicates a transport issue
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Io(_))
    }

    /// Check if this error is recoverable
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ParseError(_) | Self::InvalidParameters(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let attached = AntError::AlreadyAttached { channel: 1 };
        assert!(attached.is_precondition());
        assert!(!attached.is_connection_error());
        assert!(!attached.is_recoverable());

        let disconnected = AntError::Disconnected;
        assert!(!disconnected.is_precondition());
        assert!(disconnected.is_connection_error());

        let parse = AntError::ParseError("bad checksum".to_string());
        assert!(parse.is_recoverable());
        assert!(!parse.is_precondition());
    }

    #[test]
    fn test_error_display() {
        let error = AntError::DetachRefused { channel: 3 };
        let error_string = format!("{error}");
        assert!(error_string.contains("release channel 3"));

        let error = AntError::InvalidParameters("power out of range".to_string());
        assert!(format!("{error}").contains("power out of range"));
    }
}
