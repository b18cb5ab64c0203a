//! Notifications delivered to the caller.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{profiles::Telemetry, types::SignalStrength};

/// Notification emitted by a [`Session`](crate::Session)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SensorEvent {
    /// The channel finished its handshake and is streaming
    Attached {
        /// Channel index
        channel: u8,
    },
    /// The channel was unassigned
    Detached {
        /// Channel index
        channel: u8,
    },
    /// A channel event the state machine did not consume
    EventData {
        /// Channel index
        channel: u8,
        /// Status message id
        message: u8,
        /// Status code
        code: u8,
    },
    /// Decoded telemetry, carrying the device's full current state
    Telemetry {
        /// Channel index
        channel: u8,
        /// Signal strength of the last frame, scan mode only
        signal: Option<SignalStrength>,
        /// Current state of the device
        telemetry: Telemetry,
    },
}

impl SensorEvent {
    /// Channel the event belongs to
    #[must_use]
    pub const fn channel(&self) -> u8 {
        match self {
            Self::Attached { channel }
            | Self::Detached { channel }
            | Self::EventData { channel, .. }
            | Self::Telemetry { channel, .. } => *channel,
        }
    }
}

/// Receiver of session notifications
///
/// Called once the processing step that produced the notifications has
/// finished, never from inside frame routing.
pub trait Observer: Send {
    /// Handle one notification
    fn notify(&mut self, event: SensorEvent);
}

impl Observer for Vec<SensorEvent> {
    fn notify(&mut self, event: SensorEvent) {
        self.push(event);
    }
}

impl Observer for mpsc::UnboundedSender<SensorEvent> {
    fn notify(&mut self, event: SensorEvent) {
        if self.send(event).is_err() {
            debug!("Observer channel closed, dropping notification");
        }
    }
}
