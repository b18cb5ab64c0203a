//! Environment sensor profile (temperature).

use serde::Serialize;

use super::{common::CommonPages, device_state, Page, Profile, Telemetry};
use crate::rollover::RolloverCounter;

const PAGE_GENERAL: u8 = 0x00;
const PAGE_TEMPERATURE: u8 = 0x01;

/// Environment sensor
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

/// Environment telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentState {
    /// Device number
    pub device_id: u16,
    /// Unwrapped event count
    pub event_count: Option<u64>,
    /// Transmission rate in Hz
    pub transmission_rate: Option<f64>,
    /// Current temperature in degrees Celsius
    pub temperature: Option<f64>,
    /// Lowest temperature of the last 24 hours
    pub temperature_low: Option<f64>,
    /// Highest temperature of the last 24 hours
    pub temperature_high: Option<f64>,
    /// Common pages
    #[serde(flatten)]
    pub common: CommonPages,
    #[serde(skip)]
    events: RolloverCounter,
}

device_state!(EnvironmentState);

/// Sign-extend a 12-bit two's complement field
#[allow(clippy::cast_possible_wrap)]
const fn signed_12(raw: u16) -> i16 {
    ((raw << 4) as i16) >> 4
}

impl Profile for Environment {
    type State = EnvironmentState;

    const NAME: &'static str = "environment";
    const DEVICE_TYPE: u8 = 0x19;
    const PERIOD: u16 = 8192;

    fn new_state(&self, device_id: u16) -> EnvironmentState {
        EnvironmentState {
            device_id,
            event_count: None,
            transmission_rate: None,
            temperature: None,
            temperature_low: None,
            temperature_high: None,
            common: CommonPages::default(),
            events: RolloverCounter::u8(),
        }
    }

    fn decode(&self, state: &mut EnvironmentState, page: &Page) -> bool {
        match page[0] {
            PAGE_GENERAL => {
                state.transmission_rate = match page[3] & 0x03 {
                    1 => Some(0.5),
                    2 => Some(4.0),
                    _ => None,
                };
                true
            }
            PAGE_TEMPERATURE => {
                let event = u64::from(page[1]);
                let fresh = state.events.is_new(event);
                state.event_count = Some(state.events.update(event));

                let low = u16::from(page[2]) | (u16::from(page[3] & 0x0F) << 8);
                let high = u16::from(page[3] >> 4) | (u16::from(page[4]) << 4);
                state.temperature_low = Some(f64::from(signed_12(low)) / 10.0);
                state.temperature_high = Some(f64::from(signed_12(high)) / 10.0);
                state.temperature =
                    Some(f64::from(i16::from_le_bytes([page[6], page[7]])) / 100.0);

                fresh
            }
            _ => state.common.decode(page),
        }
    }

    fn telemetry(state: &EnvironmentState) -> Telemetry {
        Telemetry::Environment(state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn temperature_page(event: u8, low: i16, high: i16, current: i16) -> Page {
        let (low, high) = ((low as u16) & 0x0FFF, (high as u16) & 0x0FFF);
        let [c0, c1] = current.to_le_bytes();
        [
            PAGE_TEMPERATURE,
            event,
            (low & 0xFF) as u8,
            ((low >> 8) as u8) | (((high & 0x0F) as u8) << 4),
            (high >> 4) as u8,
            0xFF,
            c0,
            c1,
        ]
    }

    #[test]
    fn test_temperature_page() {
        let profile = Environment;
        let mut state = profile.new_state(1);

        assert!(profile.decode(&mut state, &temperature_page(1, -52, 287, 2150)));

        assert_eq!(state.temperature, Some(21.5));
        assert_eq!(state.temperature_low, Some(-5.2));
        assert_eq!(state.temperature_high, Some(28.7));
    }

    #[test]
    fn test_temperature_dedup() {
        let profile = Environment;
        let mut state = profile.new_state(1);
        let page = temperature_page(4, 0, 0, -125);

        assert!(profile.decode(&mut state, &page));
        assert!(!profile.decode(&mut state, &page));
        assert_eq!(state.temperature, Some(-1.25));
        assert!(profile.decode(&mut state, &temperature_page(5, 0, 0, -100)));
    }

    #[test]
    fn test_general_page() {
        let profile = Environment;
        let mut state = profile.new_state(1);

        assert!(profile.decode(&mut state, &[0x00, 0xFF, 0xFF, 0x02, 0, 0, 0, 0]));
        assert_eq!(state.transmission_rate, Some(4.0));
    }

    #[test]
    fn test_signed_12() {
        assert_eq!(signed_12(0x7FF), 2047);
        assert_eq!(signed_12(0x800), -2048);
        assert_eq!(signed_12(0xFCC), -52);
    }
}
