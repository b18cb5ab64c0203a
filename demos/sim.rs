//! Simulated ANT radio shared by the demos.
//!
//! Answers every setup command the session writes the way a USB stick does,
//! acknowledges data writes and injects the data frames a demo asks for on a
//! fixed tick.

#![allow(dead_code)]

use std::time::Duration;

use antlers::{
    protocol::{code, MESSAGE_RF},
    Frame, LoopbackHandle, Message, MessageId,
};
use bytes::Bytes;
use tokio::time::interval;
use tracing::debug;

/// Time between broadcast ticks
pub const TICK: Duration = Duration::from_millis(250);

/// Radio side of a loopback transport
pub struct SimulatedRadio {
    radio: LoopbackHandle,
    device_id: u16,
    device_type: u8,
}

impl SimulatedRadio {
    /// Radio reporting `device_id` when asked which device a channel found
    pub const fn new(radio: LoopbackHandle, device_id: u16, device_type: u8) -> Self {
        Self {
            radio,
            device_id,
            device_type,
        }
    }

    /// Run for `ticks` ticks, injecting whatever `broadcast` returns each tick
    ///
    /// The inbound side is closed afterwards, which ends the session's run
    /// loop.
    pub async fn run<F>(mut self, ticks: u32, mut broadcast: F)
    where
        F: FnMut(u32) -> Vec<Bytes>,
    {
        let mut ticker = interval(TICK);
        let mut tick = 0;

        while tick < ticks {
            tokio::select! {
                Some(frame) = self.radio.written() => {
                    for reply in self.answer(frame) {
                        if self.radio.inject(reply).is_err() {
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    for frame in broadcast(tick) {
                        if self.radio.inject(frame).is_err() {
                            return;
                        }
                    }
                    tick += 1;
                }
            }
        }

        self.radio.close();
    }

    fn answer(&self, data: Bytes) -> Vec<Bytes> {
        let Ok(frame) = Frame::parse(data) else {
            return Vec::new();
        };
        let channel = frame.channel();
        debug!("Radio received {}", frame.to_hex());

        match frame.message_id() {
            Some(MessageId::AcknowledgedData) => {
                vec![event(channel, MESSAGE_RF, code::EVENT_TRANSFER_TX_COMPLETED)]
            }
            Some(MessageId::ChannelRequest) => {
                let [lo, hi] = self.device_id.to_le_bytes();
                vec![Message::new(
                    MessageId::ChannelId,
                    vec![channel, lo, hi, self.device_type, 0x01],
                )
                .to_bytes()]
            }
            Some(MessageId::ChannelClose) => vec![
                event(channel, MessageId::ChannelClose as u8, code::RESPONSE_NO_ERROR),
                event(channel, MESSAGE_RF, code::EVENT_CHANNEL_CLOSED),
            ],
            Some(MessageId::SystemReset | MessageId::NetworkKey) | None => Vec::new(),
            Some(id) => vec![event(channel, id as u8, code::RESPONSE_NO_ERROR)],
        }
    }
}

fn event(channel: u8, message: u8, code: u8) -> Bytes {
    Message::new(MessageId::ChannelEvent, vec![channel, message, code]).to_bytes()
}

/// Broadcast data frame
pub fn broadcast(channel: u8, page: [u8; 8]) -> Bytes {
    let mut payload = vec![channel];
    payload.extend_from_slice(&page);
    Message::new(MessageId::BroadcastData, payload).to_bytes()
}

/// Broadcast data frame with the channel id and RSSI a scanning radio appends
pub fn scan_broadcast(page: [u8; 8], device_id: u16, device_type: u8, rssi: i8) -> Bytes {
    let [lo, hi] = device_id.to_le_bytes();
    let mut payload = vec![0];
    payload.extend_from_slice(&page);
    payload.extend_from_slice(&[0xC0, lo, hi, device_type, 0x01, 0x20]);
    payload.extend_from_slice(&rssi.to_le_bytes());
    payload.extend_from_slice(&(-96i8).to_le_bytes());
    Message::new(MessageId::BroadcastData, payload).to_bytes()
}
