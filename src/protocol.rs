use crate::{
    error::{AntError, Result},
    types::{ChannelStatus, ChannelType, SignalStrength},
};
use bytes::{BufMut, Bytes, BytesMut};

/// Sync byte opening every frame
pub const SYNC: u8 = 0xA4;

/// Index of the payload length byte
pub const INDEX_LENGTH: usize = 1;
/// Index of the message type byte
pub const INDEX_MSG_TYPE: usize = 2;
/// Index of the channel number byte
pub const INDEX_CHANNEL: usize = 3;
/// Index of the first data byte after the channel number
pub const INDEX_MSG_DATA: usize = 4;
/// Index of the extended data flag byte in broadcast frames
pub const INDEX_EXT_MSG_BEGIN: usize = 12;

/// Size of a data page
pub const PAGE_SIZE: usize = 8;

/// Status message value used by RF events in channel event frames
pub const MESSAGE_RF: u8 = 0x01;

/// Lib config flags: channel id, RSSI and timestamp extensions
pub const LIB_CONFIG_EXTENDED: u8 = 0xE0;

/// Extended data flag: channel id follows
pub const EXT_FLAG_CHANNEL_ID: u8 = 0x80;
/// Extended data flag: RSSI measurement follows
pub const EXT_FLAG_RSSI: u8 = 0x40;

/// Message ids of the serial protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    /// Channel event or channel response
    ChannelEvent = 0x40,
    /// Unassign channel
    ChannelUnassign = 0x41,
    /// Assign channel
    ChannelAssign = 0x42,
    /// Set channel period
    ChannelPeriod = 0x43,
    /// Set search timeout
    ChannelSearchTimeout = 0x44,
    /// Set RF frequency
    ChannelFrequency = 0x45,
    /// Set network key
    NetworkKey = 0x46,
    /// Reset system
    SystemReset = 0x4A,
    /// Open channel
    ChannelOpen = 0x4B,
    /// Close channel
    ChannelClose = 0x4C,
    /// Request message
    ChannelRequest = 0x4D,
    /// Broadcast data page
    BroadcastData = 0x4E,
    /// Acknowledged data page
    AcknowledgedData = 0x4F,
    /// Burst data packet
    BurstData = 0x50,
    /// Channel id (set or response)
    ChannelId = 0x51,
    /// Channel status response
    ChannelStatus = 0x52,
    /// Capabilities response
    Capabilities = 0x54,
    /// Open channel in receive-scan mode
    OpenRxScan = 0x5B,
    /// Enable extended receive messages
    EnableRxExt = 0x66,
    /// Lib config
    LibConfig = 0x6E,
    /// Startup notification
    Startup = 0x6F,
}

impl MessageId {
    /// Convert from u8
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x40 => Some(Self::ChannelEvent),
            0x41 => Some(Self::ChannelUnassign),
            0x42 => Some(Self::ChannelAssign),
            0x43 => Some(Self::ChannelPeriod),
            0x44 => Some(Self::ChannelSearchTimeout),
            0x45 => Some(Self::ChannelFrequency),
            0x46 => Some(Self::NetworkKey),
            0x4A => Some(Self::SystemReset),
            0x4B => Some(Self::ChannelOpen),
            0x4C => Some(Self::ChannelClose),
            0x4D => Some(Self::ChannelRequest),
            0x4E => Some(Self::BroadcastData),
            0x4F => Some(Self::AcknowledgedData),
            0x50 => Some(Self::BurstData),
            0x51 => Some(Self::ChannelId),
            0x52 => Some(Self::ChannelStatus),
            0x54 => Some(Self::Capabilities),
            0x5B => Some(Self::OpenRxScan),
            0x66 => Some(Self::EnableRxExt),
            0x6E => Some(Self::LibConfig),
            0x6F => Some(Self::Startup),
            _ => None,
        }
    }

    /// Whether frames of this type carry a data page for the profile decoder
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(
            self,
            Self::BroadcastData | Self::AcknowledgedData | Self::BurstData
        )
    }
}

/// Response and event codes carried in channel event frames
pub mod code {
    /// Command accepted
    pub const RESPONSE_NO_ERROR: u8 = 0x00;
    /// Search timed out
    pub const EVENT_RX_SEARCH_TIMEOUT: u8 = 0x01;
    /// A receive period passed without a message
    pub const EVENT_RX_FAIL: u8 = 0x02;
    /// Broadcast transmitted
    pub const EVENT_TX: u8 = 0x03;
    /// Burst or acknowledged receive failed
    pub const EVENT_TRANSFER_RX_FAILED: u8 = 0x04;
    /// Acknowledged transfer completed
    pub const EVENT_TRANSFER_TX_COMPLETED: u8 = 0x05;
    /// Acknowledged transfer failed
    pub const EVENT_TRANSFER_TX_FAILED: u8 = 0x06;
    /// Channel closed
    pub const EVENT_CHANNEL_CLOSED: u8 = 0x07;
    /// Channel dropped back to search
    pub const EVENT_RX_FAIL_GO_TO_SEARCH: u8 = 0x08;
    /// Channel collision
    pub const EVENT_CHANNEL_COLLISION: u8 = 0x09;
    /// Burst transfer started
    pub const EVENT_TRANSFER_TX_START: u8 = 0x0A;
    /// Command not valid in the channel's current state
    pub const CHANNEL_IN_WRONG_STATE: u8 = 0x15;
    /// Channel not opened
    pub const CHANNEL_NOT_OPENED: u8 = 0x16;
    /// Channel id not set
    pub const CHANNEL_ID_NOT_SET: u8 = 0x18;
    /// All channels closed
    pub const CLOSE_ALL_CHANNELS: u8 = 0x19;
    /// A transfer is still in progress
    pub const TRANSFER_IN_PROGRESS: u8 = 0x1F;
    /// Burst sequence number error
    pub const TRANSFER_SEQUENCE_NUMBER_ERROR: u8 = 0x20;
    /// Transfer error
    pub const TRANSFER_IN_ERROR: u8 = 0x21;
    /// Invalid message
    pub const INVALID_MESSAGE: u8 = 0x28;
    /// Transmit attempted on a scanning channel
    pub const INVALID_SCAN_TX_CHANNEL: u8 = 0x31;
    /// Invalid parameter
    pub const INVALID_PARAMETER_PROVIDED: u8 = 0x33;
    /// Event queue overflowed
    pub const EVENT_QUEUE_OVERFLOW: u8 = 0x35;
}

/// Outbound protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message ID
    pub id: MessageId,
    /// Payload data, channel number first where the command has one
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a new message
    #[must_use]
    pub const fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }

    /// Reset the radio
    #[must_use]
    pub fn system_reset() -> Self {
        Self::new(MessageId::SystemReset, vec![0x00])
    }

    /// Load a network key
    #[must_use]
    pub fn set_network_key(network: u8, key: &[u8; 8]) -> Self {
        let mut payload = Vec::with_capacity(9);
        payload.push(network);
        payload.extend_from_slice(key);
        Self::new(MessageId::NetworkKey, payload)
    }

    /// Assign a channel on a network
    #[must_use]
    pub fn assign_channel(channel: u8, channel_type: ChannelType, network: u8) -> Self {
        Self::new(
            MessageId::ChannelAssign,
            vec![channel, channel_type.code(), network],
        )
    }

    /// Set the channel id the channel pairs with
    #[must_use]
    pub fn set_channel_id(
        channel: u8,
        device_id: u16,
        device_type: u8,
        transmission_type: u8,
    ) -> Self {
        let [lo, hi] = device_id.to_le_bytes();
        Self::new(
            MessageId::ChannelId,
            vec![channel, lo, hi, device_type, transmission_type],
        )
    }

    /// Set the search timeout
    #[must_use]
    pub fn set_search_timeout(channel: u8, timeout: u8) -> Self {
        Self::new(MessageId::ChannelSearchTimeout, vec![channel, timeout])
    }

    /// Set the RF frequency
    #[must_use]
    pub fn set_frequency(channel: u8, frequency: u8) -> Self {
        Self::new(MessageId::ChannelFrequency, vec![channel, frequency])
    }

    /// Set the message period
    #[must_use]
    pub fn set_period(channel: u8, period: u16) -> Self {
        let [lo, hi] = period.to_le_bytes();
        Self::new(MessageId::ChannelPeriod, vec![channel, lo, hi])
    }

    /// Enable extended receive messages
    #[must_use]
    pub fn enable_rx_ext() -> Self {
        Self::new(MessageId::EnableRxExt, vec![0x00, 0x01])
    }

    /// Configure which extensions are appended to received data
    ///
    /// The setting is radio-wide; the channel byte only routes the response.
    #[must_use]
    pub fn lib_config(channel: u8, flags: u8) -> Self {
        Self::new(MessageId::LibConfig, vec![channel, flags])
    }

    /// Open a channel
    #[must_use]
    pub fn open_channel(channel: u8) -> Self {
        Self::new(MessageId::ChannelOpen, vec![channel])
    }

    /// Open channel 0 in continuous receive-scan mode
    #[must_use]
    pub fn open_rx_scan() -> Self {
        Self::new(MessageId::OpenRxScan, vec![0x00, 0x01])
    }

    /// Close a channel
    #[must_use]
    pub fn close_channel(channel: u8) -> Self {
        Self::new(MessageId::ChannelClose, vec![channel])
    }

    /// Unassign a channel
    #[must_use]
    pub fn unassign_channel(channel: u8) -> Self {
        Self::new(MessageId::ChannelUnassign, vec![channel])
    }

    /// Ask the radio to send a message of the given type for a channel
    #[must_use]
    pub fn request_message(channel: u8, requested: MessageId) -> Self {
        Self::new(MessageId::ChannelRequest, vec![channel, requested as u8])
    }

    /// Wrap a data page in an acknowledged-data message
    #[must_use]
    pub fn acknowledged_data(channel: u8, page: &[u8; PAGE_SIZE]) -> Self {
        let mut payload = Vec::with_capacity(PAGE_SIZE + 1);
        payload.push(channel);
        payload.extend_from_slice(page);
        Self::new(MessageId::AcknowledgedData, payload)
    }

    /// Serialize message to a framed byte buffer
    ///
    /// Layout: sync, payload length, message id, payload, XOR checksum.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 4);

        buf.put_u8(SYNC);
        #[allow(clippy::cast_possible_truncation)]
        buf.put_u8(self.payload.len() as u8);
        buf.put_u8(self.id as u8);
        buf.extend_from_slice(&self.payload);

        let checksum = checksum(&buf);
        buf.put_u8(checksum);

        buf.freeze()
    }
}

/// XOR of every byte
#[must_use]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Channel id appended to scan-mode data frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedData {
    /// Device number of the transmitter
    pub device_id: u16,
    /// Device type of the transmitter
    pub device_type: u8,
    /// Transmission type of the transmitter
    pub transmission_type: u8,
    /// Signal strength, when RSSI extensions are enabled
    pub signal: Option<SignalStrength>,
}

/// A validated inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Parse a frame, checking sync byte, length and checksum
    ///
    /// # Errors
    ///
    /// Returns [`AntError::ParseError`] if the frame is truncated, does not start
    /// with the sync byte or fails its checksum.
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        let bytes: Bytes = data.into();

        if bytes.len() < INDEX_MSG_DATA + 1 {
            return Err(AntError::ParseError(format!(
                "Frame too short: {} bytes",
                bytes.len()
            )));
        }

        if bytes[0] != SYNC {
            return Err(AntError::ParseError(format!(
                "Bad sync byte: {:02X}",
                bytes[0]
            )));
        }

        let length = usize::from(bytes[INDEX_LENGTH]);
        let total = length + 4;
        if length == 0 || bytes.len() < total {
            return Err(AntError::ParseError(format!(
                "Length field {length} does not fit {} bytes",
                bytes.len()
            )));
        }

        let expected = checksum(&bytes[..total - 1]);
        if bytes[total - 1] != expected {
            return Err(AntError::ParseError(format!(
                "Checksum mismatch: got {:02X}, expected {expected:02X}",
                bytes[total - 1]
            )));
        }

        Ok(Self {
            bytes: bytes.slice(..total),
        })
    }

    /// Raw message type byte
    #[must_use]
    pub fn message_type(&self) -> u8 {
        self.bytes[INDEX_MSG_TYPE]
    }

    /// Decoded message id, if known
    #[must_use]
    pub fn message_id(&self) -> Option<MessageId> {
        MessageId::from_u8(self.message_type())
    }

    /// Channel number
    #[must_use]
    pub fn channel(&self) -> u8 {
        self.bytes[INDEX_CHANNEL]
    }

    /// Payload bytes following the channel number
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.bytes[INDEX_MSG_DATA..self.bytes.len() - 1]
    }

    /// The 8-byte data page, if the frame carries one
    #[must_use]
    pub fn page(&self) -> Option<&[u8; PAGE_SIZE]> {
        self.data().get(..PAGE_SIZE)?.try_into().ok()
    }

    /// Status pair of a channel event frame
    #[must_use]
    pub fn channel_status(&self) -> Option<ChannelStatus> {
        if self.message_id() != Some(MessageId::ChannelEvent) {
            return None;
        }
        match self.data() {
            [message, code, ..] => Some(ChannelStatus::new(*message, *code)),
            _ => None,
        }
    }

    /// Extended channel id and RSSI appended to a data page
    #[must_use]
    pub fn extended(&self) -> Option<ExtendedData> {
        let ext = self.data().get(PAGE_SIZE..)?;
        let (&flags, rest) = ext.split_first()?;
        if flags & EXT_FLAG_CHANNEL_ID == 0 {
            return None;
        }

        let (id, rest) = rest.split_at_checked(4)?;
        let device_id = u16::from_le_bytes([id[0], id[1]]);

        let signal = if flags & EXT_FLAG_RSSI == 0 {
            None
        } else {
            // measurement type, rssi, threshold
            match rest {
                [_, rssi, threshold, ..] => Some(SignalStrength {
                    rssi: i8::from_le_bytes([*rssi]),
                    threshold: i8::from_le_bytes([*threshold]),
                }),
                _ => None,
            }
        };

        Some(ExtendedData {
            device_id,
            device_type: id[2],
            transmission_type: id[3],
            signal,
        })
    }

    /// The whole frame
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex rendering for logs
    #[must_use]
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;

        self.bytes.iter().fold(String::new(), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
    }
}
