use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ANT_PLUS_FREQUENCY, DEFAULT_SEARCH_TIMEOUT};

/// Channel type requested when assigning a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelType {
    /// Bidirectional slave channel
    #[default]
    Receive,
    /// Receive-only slave channel
    ReceiveOnly,
    /// Shared bidirectional slave channel
    ReceiveShared,
    /// Bidirectional master channel
    Transmit,
    /// Transmit-only master channel
    TransmitOnly,
    /// Shared bidirectional master channel
    TransmitShared,
}

impl ChannelType {
    /// Wire code used by the assign-channel command
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Receive => 0x00,
            Self::ReceiveOnly => 0x40,
            Self::ReceiveShared => 0x20,
            Self::Transmit => 0x10,
            Self::TransmitOnly => 0x50,
            Self::TransmitShared => 0x30,
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receive => write!(f, "receive"),
            Self::ReceiveOnly => write!(f, "receive_only"),
            Self::ReceiveShared => write!(f, "receive_shared"),
            Self::Transmit => write!(f, "transmit"),
            Self::TransmitOnly => write!(f, "transmit_only"),
            Self::TransmitShared => write!(f, "transmit_shared"),
        }
    }
}

/// Parameters handed to the radio while bringing a channel up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel index
    pub channel: u8,
    /// Channel type for the assign command
    pub channel_type: ChannelType,
    /// Device number, 0 matches any device
    pub device_id: u16,
    /// Device type code of the profile, 0 matches any
    pub device_type: u8,
    /// Transmission type, 0 matches any
    pub transmission_type: u8,
    /// Search timeout in protocol units (2.5 s each, 255 = infinite)
    pub search_timeout: u8,
    /// Message period in 1/32768 s units
    pub period: u16,
    /// RF frequency offset from 2400 MHz
    pub frequency: u8,
}

impl ChannelConfig {
    /// Configuration for a channel directed at one device
    #[must_use]
    pub const fn attach(channel: u8, device_type: u8, device_id: u16, period: u16) -> Self {
        Self {
            channel,
            channel_type: ChannelType::Receive,
            device_id,
            device_type,
            transmission_type: 0,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            period,
            frequency: ANT_PLUS_FREQUENCY,
        }
    }

    /// Configuration for the receive-scan channel
    ///
    /// Device id, type and transmission type are wildcards so every device in
    /// range is captured.
    #[must_use]
    pub const fn scan(device_type: u8, frequency: u8) -> Self {
        Self {
            channel: 0,
            channel_type: ChannelType::Receive,
            device_id: 0,
            device_type,
            transmission_type: 0,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            period: 0,
            frequency,
        }
    }

    /// Set the transmission type
    #[must_use]
    pub const fn with_transmission_type(mut self, transmission_type: u8) -> Self {
        self.transmission_type = transmission_type;
        self
    }

    /// Set the search timeout
    #[must_use]
    pub const fn with_search_timeout(mut self, search_timeout: u8) -> Self {
        self.search_timeout = search_timeout;
        self
    }

    /// Set the RF frequency
    #[must_use]
    pub const fn with_frequency(mut self, frequency: u8) -> Self {
        self.frequency = frequency;
        self
    }
}

/// A `(status message, status code)` pair carried by a channel event frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Message id being answered, or 0x01 for RF events
    pub message: u8,
    /// Response or event code
    pub code: u8,
}

impl ChannelStatus {
    /// Create a new status pair
    #[must_use]
    pub const fn new(message: u8, code: u8) -> Self {
        Self { message, code }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg={:02X} code={:02X}", self.message, self.code)
    }
}

/// Signal strength reported in extended scan data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalStrength {
    /// Received signal strength in dBm
    pub rssi: i8,
    /// Search threshold in dBm
    pub threshold: i8,
}

/// Battery condition shared by every profile's battery page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    /// Battery is new
    New,
    /// Battery is good
    Good,
    /// Battery is ok
    Ok,
    /// Battery is low
    Low,
    /// Battery is critical
    Critical,
    /// Status bits carried a reserved or invalid value
    Invalid,
}

impl BatteryStatus {
    /// Decode the 3-bit battery status field
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::New,
            2 => Self::Good,
            3 => Self::Ok,
            4 => Self::Low,
            5 => Self::Critical,
            _ => Self::Invalid,
        }
    }

    /// Whether a voltage reading accompanying this status is meaningful
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Good => write!(f, "Good"),
            Self::Ok => write!(f, "Ok"),
            Self::Low => write!(f, "Low"),
            Self::Critical => write!(f, "Critical"),
            Self::Invalid => write!(f, "Invalid"),
        }
    }
}

/// A raw measurement that may carry one of the sensor's sentinel codes
///
/// Serializes as the bare number, or as the sentinel's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReadingRepr", into = "ReadingRepr")]
pub enum Reading {
    /// Numeric reading in the field's native unit
    Value(u16),
    /// The sensor is saturated by ambient light
    AmbientLightTooHigh,
    /// The sensor reports no valid reading
    Invalid,
}

impl Reading {
    /// Map a raw field against its two sentinel codes
    #[must_use]
    pub const fn with_sentinels(raw: u16, ambient_light: u16, invalid: u16) -> Self {
        if raw == ambient_light {
            Self::AmbientLightTooHigh
        } else if raw == invalid {
            Self::Invalid
        } else {
            Self::Value(raw)
        }
    }

    /// The numeric value, if any
    #[must_use]
    pub const fn value(self) -> Option<u16> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ReadingRepr {
    Value(u16),
    Sentinel(Sentinel),
}

#[derive(Serialize, Deserialize)]
enum Sentinel {
    AmbientLightTooHigh,
    Invalid,
}

impl From<Reading> for ReadingRepr {
    fn from(reading: Reading) -> Self {
        match reading {
            Reading::Value(v) => Self::Value(v),
            Reading::AmbientLightTooHigh => Self::Sentinel(Sentinel::AmbientLightTooHigh),
            Reading::Invalid => Self::Sentinel(Sentinel::Invalid),
        }
    }
}

impl From<ReadingRepr> for Reading {
    fn from(repr: ReadingRepr) -> Self {
        match repr {
            ReadingRepr::Value(v) => Self::Value(v),
            ReadingRepr::Sentinel(Sentinel::AmbientLightTooHigh) => Self::AmbientLightTooHigh,
            ReadingRepr::Sentinel(Sentinel::Invalid) => Self::Invalid,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::AmbientLightTooHigh => write!(f, "AmbientLightTooHigh"),
            Self::Invalid => write!(f, "Invalid"),
        }
    }
}
