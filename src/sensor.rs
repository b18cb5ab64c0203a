//! Directed sensors and broadcast scanners.
//!
//! A [`Sensor`] is bound to one device on its own channel. A [`Scanner`] owns
//! the radio's receive-scan channel and keeps a state record per device id it
//! has seen, using the channel id the radio appends to every scan frame.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::{
    event::SensorEvent,
    profiles::{DeviceState, Profile},
    protocol::{Frame, Message, MessageId},
    router::{DataSink, Dispatch},
    types::SignalStrength,
};

/// Device type bits of a channel id; bit 7 is the pairing flag
const DEVICE_TYPE_MASK: u8 = 0x7F;

/// Sensor attached to a single device
#[derive(Debug)]
pub struct Sensor<P: Profile> {
    profile: P,
    channel: u8,
    device_id: u16,
    transmission_type: u8,
    state: P::State,
}

impl<P: Profile> Sensor<P> {
    /// Create a sensor for `device_id` on `channel`
    ///
    /// A device id of 0 pairs with the first matching device found; the
    /// actual id is requested from the radio once data arrives.
    pub fn new(profile: P, channel: u8, device_id: u16, transmission_type: u8) -> Self {
        let state = profile.new_state(device_id);
        Self {
            profile,
            channel,
            device_id,
            transmission_type,
            state,
        }
    }

    /// Device number, 0 until learned for a wildcard attach
    #[must_use]
    pub const fn device_id(&self) -> u16 {
        self.device_id
    }

    /// Transmission type
    #[must_use]
    pub const fn transmission_type(&self) -> u8 {
        self.transmission_type
    }

    /// Current telemetry state
    #[must_use]
    pub const fn state(&self) -> &P::State {
        &self.state
    }

    fn learn_channel_id(&mut self, frame: &Frame) {
        let [lo, hi, _device_type, transmission_type, ..] = *frame.data() else {
            warn!("Short channel id response on channel {}: {}", self.channel, frame.to_hex());
            return;
        };
        self.device_id = u16::from_le_bytes([lo, hi]);
        self.transmission_type = transmission_type;
        self.state.set_device_id(self.device_id);
        info!(
            "Channel {} paired with {} device {}",
            self.channel,
            P::NAME,
            self.device_id
        );
    }
}

impl<P: Profile> DataSink for Sensor<P> {
    fn handle_frame(&mut self, frame: &Frame, dispatch: &mut Dispatch) {
        match frame.message_id() {
            Some(MessageId::ChannelId) => self.learn_channel_id(frame),
            Some(id) if id.is_data() => {
                if self.device_id == 0 {
                    dispatch.write(Message::request_message(self.channel, MessageId::ChannelId).to_bytes());
                }

                let Some(page) = frame.page() else {
                    warn!("Short data frame on channel {}: {}", self.channel, frame.to_hex());
                    return;
                };

                if self.profile.decode(&mut self.state, page) {
                    dispatch.notify(SensorEvent::Telemetry {
                        channel: self.channel,
                        signal: None,
                        telemetry: P::telemetry(&self.state),
                    });
                }
            }
            _ => debug!(
                "Ignoring message {:02X} on channel {}",
                frame.message_type(),
                self.channel
            ),
        }
    }

    fn device_type(&self) -> u8 {
        P::DEVICE_TYPE
    }

    fn telemetry(&self) -> Vec<crate::profiles::Telemetry> {
        vec![P::telemetry(&self.state)]
    }
}

#[derive(Debug)]
struct ScannedDevice<S> {
    state: S,
    signal: Option<SignalStrength>,
}

/// Scanner collecting every device of one profile in range
#[derive(Debug)]
pub struct Scanner<P: Profile> {
    profile: P,
    channel: u8,
    devices: HashMap<u16, ScannedDevice<P::State>>,
}

impl<P: Profile> Scanner<P> {
    /// Create a scanner on `channel`
    pub fn new(profile: P, channel: u8) -> Self {
        Self {
            profile,
            channel,
            devices: HashMap::new(),
        }
    }

    /// Current state of a seen device
    #[must_use]
    pub fn state(&self, device_id: u16) -> Option<&P::State> {
        self.devices.get(&device_id).map(|d| &d.state)
    }

    /// Last signal strength of a seen device
    #[must_use]
    pub fn signal(&self, device_id: u16) -> Option<SignalStrength> {
        self.devices.get(&device_id).and_then(|d| d.signal)
    }

    /// Ids of every device seen so far, ascending
    #[must_use]
    pub fn device_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.devices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl<P: Profile> DataSink for Scanner<P> {
    fn handle_frame(&mut self, frame: &Frame, dispatch: &mut Dispatch) {
        if !frame.message_id().is_some_and(MessageId::is_data) {
            debug!(
                "Ignoring message {:02X} on scan channel",
                frame.message_type()
            );
            return;
        }

        let Some(ext) = frame.extended() else {
            debug!("Dropping scan frame without channel id: {}", frame.to_hex());
            return;
        };
        if ext.device_type & DEVICE_TYPE_MASK != P::DEVICE_TYPE {
            return;
        }
        let Some(page) = frame.page() else {
            return;
        };

        let profile = &self.profile;
        let device = self.devices.entry(ext.device_id).or_insert_with(|| {
            info!("Found {} device {}", P::NAME, ext.device_id);
            ScannedDevice {
                state: profile.new_state(ext.device_id),
                signal: None,
            }
        });
        if ext.signal.is_some() {
            device.signal = ext.signal;
        }

        if profile.decode(&mut device.state, page) {
            dispatch.notify(SensorEvent::Telemetry {
                channel: self.channel,
                signal: device.signal,
                telemetry: P::telemetry(&device.state),
            });
        }
    }

    fn device_type(&self) -> u8 {
        P::DEVICE_TYPE
    }

    fn telemetry(&self) -> Vec<crate::profiles::Telemetry> {
        self.device_ids()
            .into_iter()
            .filter_map(|id| self.devices.get(&id))
            .map(|d| P::telemetry(&d.state))
            .collect()
    }
}
