//! ANT+ device profiles.
//!
//! Each profile owns a typed state record and decodes the profile's 8-byte
//! data pages into it. [`Profile::decode`] reports whether the page carried a
//! change worth a notification: pages with a primary event counter only
//! notify when that counter moves, so retransmitted broadcasts stay silent.

use serde::Serialize;
use std::fmt;

use crate::{protocol::PAGE_SIZE, types::ChannelConfig};

macro_rules! device_state {
    ($($state:ty),+ $(,)?) => {
        $(
            impl $crate::profiles::DeviceState for $state {
                fn device_id(&self) -> u16 {
                    self.device_id
                }

                fn set_device_id(&mut self, device_id: u16) {
                    self.device_id = device_id;
                }
            }
        )+
    };
}
pub(crate) use device_state;

pub mod common;
pub mod environment;
pub mod fitness_equipment;
pub mod heart_rate;
pub mod muscle_oxygen;
pub mod power;
pub mod speed_cadence;
pub mod stride;

pub use common::CommonPages;
pub use environment::{Environment, EnvironmentState};
pub use fitness_equipment::{FitnessEquipment, FitnessEquipmentState};
pub use heart_rate::{HeartRate, HeartRateState};
pub use muscle_oxygen::{MuscleOxygen, MuscleOxygenState};
pub use power::{Power, PowerState};
pub use speed_cadence::{
    Cadence, CadenceState, Speed, SpeedCadence, SpeedCadenceState, SpeedState,
};
pub use stride::{Stride, StrideState};

/// A data page
pub type Page = [u8; PAGE_SIZE];

/// State record that belongs to one device
pub trait DeviceState {
    /// Device number
    fn device_id(&self) -> u16;

    /// Set the device number once it is learned
    fn set_device_id(&mut self, device_id: u16);
}

/// Decoder for one device class
pub trait Profile: Send + 'static {
    /// Telemetry state of one device
    type State: DeviceState + Clone + fmt::Debug + Send + Serialize;

    /// Human-readable profile name for logs
    const NAME: &'static str;
    /// Device type code
    const DEVICE_TYPE: u8;
    /// Channel period in 1/32768 s units
    const PERIOD: u16;

    /// Fresh state for a device
    fn new_state(&self, device_id: u16) -> Self::State;

    /// Decode a page into `state`, returning whether to notify
    fn decode(&self, state: &mut Self::State, page: &Page) -> bool;

    /// Wrap a state snapshot
    fn telemetry(state: &Self::State) -> Telemetry;

    /// Channel configuration to attach to a device of this profile
    #[must_use]
    fn attach_config(channel: u8, device_id: u16) -> ChannelConfig
    where
        Self: Sized,
    {
        ChannelConfig::attach(channel, Self::DEVICE_TYPE, device_id, Self::PERIOD)
    }
}

/// Snapshot of a device's state, tagged by profile
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "profile", content = "state", rename_all = "snake_case")]
pub enum Telemetry {
    /// Heart rate monitor
    HeartRate(HeartRateState),
    /// Combined bike speed and cadence sensor
    SpeedCadence(SpeedCadenceState),
    /// Bike speed sensor
    Speed(SpeedState),
    /// Bike cadence sensor
    Cadence(CadenceState),
    /// Bicycle power meter
    Power(PowerState),
    /// Fitness equipment
    FitnessEquipment(FitnessEquipmentState),
    /// Muscle oxygen monitor
    MuscleOxygen(MuscleOxygenState),
    /// Environment (temperature) sensor
    Environment(EnvironmentState),
    /// Stride-based speed and distance monitor
    Stride(StrideState),
}

impl Telemetry {
    /// Device number of the snapshot
    #[must_use]
    pub fn device_id(&self) -> u16 {
        match self {
            Self::HeartRate(s) => s.device_id,
            Self::SpeedCadence(s) => s.device_id,
            Self::Speed(s) => s.device_id,
            Self::Cadence(s) => s.device_id,
            Self::Power(s) => s.device_id,
            Self::FitnessEquipment(s) => s.device_id,
            Self::MuscleOxygen(s) => s.device_id,
            Self::Environment(s) => s.device_id,
            Self::Stride(s) => s.device_id,
        }
    }
}

/// Tracks the toggle bit of legacy-compatible page numbers
///
/// Older sensors leave bit 7 of byte 0 fixed and only ever send the legacy
/// layout; the background pages are trusted once the bit has been seen to
/// change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PageToggle {
    last: Option<u8>,
    toggled: bool,
}

impl PageToggle {
    pub(crate) const MASK: u8 = 0x80;

    /// Feed byte 0 of a page, returning the page number if background pages
    /// can be trusted
    pub(crate) fn observe(&mut self, first: u8) -> Option<u8> {
        let toggle = first & Self::MASK;
        if self.last.is_some_and(|last| last != toggle) {
            self.toggled = true;
        }
        self.last = Some(toggle);
        self.toggled.then_some(first & !Self::MASK)
    }
}

pub(crate) const fn u16_le(page: &Page, at: usize) -> u16 {
    u16::from_le_bytes([page[at], page[at + 1]])
}

pub(crate) const fn u16_be(page: &Page, at: usize) -> u16 {
    u16::from_be_bytes([page[at], page[at + 1]])
}

pub(crate) const fn u24_le(page: &Page, at: usize) -> u32 {
    u32::from_le_bytes([page[at], page[at + 1], page[at + 2], 0])
}

pub(crate) const fn u32_le(page: &Page, at: usize) -> u32 {
    u32::from_le_bytes([page[at], page[at + 1], page[at + 2], page[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_helpers() {
        let page = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(u16_le(&page, 0), 0x0201);
        assert_eq!(u16_be(&page, 0), 0x0102);
        assert_eq!(u24_le(&page, 1), 0x0004_0302);
        assert_eq!(u32_le(&page, 4), 0x0807_0605);
    }

    #[test]
    fn test_page_toggle() {
        let mut toggle = PageToggle::default();
        assert_eq!(toggle.observe(0x03), None);
        assert_eq!(toggle.observe(0x03), None);
        assert_eq!(toggle.observe(0x84), Some(4));
        assert_eq!(toggle.observe(0x84), Some(4));
    }

    #[test]
    fn test_attach_config_uses_profile_constants() {
        let config = HeartRate::attach_config(3, 12345);
        assert_eq!(config.channel, 3);
        assert_eq!(config.device_type, 0x78);
        assert_eq!(config.period, 8070);
        assert_eq!(config.device_id, 12345);
    }

    #[test]
    fn test_telemetry_device_id() {
        let state = HeartRate.new_state(42);
        assert_eq!(HeartRate::telemetry(&state).device_id(), 42);
    }
}
