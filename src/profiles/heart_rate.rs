//! Heart rate monitor profile.
//!
//! Every page carries the last heart beat event time, beat count and
//! computed heart rate in bytes 4-7. Bit 7 of the page number toggles every
//! four messages on monitors that send the extended background pages; legacy
//! monitors never toggle it and fill bytes 1-3 with manufacturer data.

use serde::Serialize;

use super::{device_state, u16_le, u24_le, Page, PageToggle, Profile, Telemetry};
use crate::{rollover::RolloverCounter, types::BatteryStatus};

const PAGE_OPERATING_TIME: u8 = 1;
const PAGE_MANUFACTURER: u8 = 2;
const PAGE_PRODUCT: u8 = 3;
const PAGE_PREVIOUS_BEAT: u8 = 4;
const PAGE_CAPABILITIES: u8 = 6;
const PAGE_BATTERY: u8 = 7;
const PAGE_DEVICE_INFO: u8 = 9;

/// Heart rate monitor
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartRate;

/// Heart rate telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartRateState {
    /// Device number
    pub device_id: u16,
    /// Time of the last beat in seconds, unwrapped
    pub beat_time: Option<f64>,
    /// Unwrapped beat count
    pub beat_count: Option<u64>,
    /// Computed heart rate in beats per minute
    pub computed_heart_rate: Option<u8>,
    /// Interval between the last two beats in milliseconds
    pub rr_interval: Option<f64>,
    /// Cumulative operating time in seconds
    pub operating_time: Option<u32>,
    /// Manufacturer id
    pub manufacturer_id: Option<u8>,
    /// Upper 16 bits of the serial number
    pub serial_number: Option<u16>,
    /// Hardware version
    pub hw_version: Option<u8>,
    /// Software version
    pub sw_version: Option<u8>,
    /// Model number
    pub model_number: Option<u8>,
    /// Supported feature bits
    pub features_supported: Option<u8>,
    /// Enabled feature bits
    pub features_enabled: Option<u8>,
    /// Battery level in percent
    pub battery_level: Option<u8>,
    /// Battery voltage in volts
    pub battery_voltage: Option<f64>,
    /// Battery condition
    pub battery_status: Option<BatteryStatus>,
    /// Heart beat event type: 0 measured, 1 computed
    pub beat_event_type: Option<u8>,
    #[serde(skip)]
    beats: RolloverCounter,
    #[serde(skip)]
    beat_times: RolloverCounter,
    #[serde(skip)]
    toggle: PageToggle,
}

device_state!(HeartRateState);

impl Profile for HeartRate {
    type State = HeartRateState;

    const NAME: &'static str = "heart rate";
    const DEVICE_TYPE: u8 = 0x78;
    const PERIOD: u16 = 8070;

    fn new_state(&self, device_id: u16) -> HeartRateState {
        HeartRateState {
            device_id,
            beat_time: None,
            beat_count: None,
            computed_heart_rate: None,
            rr_interval: None,
            operating_time: None,
            manufacturer_id: None,
            serial_number: None,
            hw_version: None,
            sw_version: None,
            model_number: None,
            features_supported: None,
            features_enabled: None,
            battery_level: None,
            battery_voltage: None,
            battery_status: None,
            beat_event_type: None,
            beats: RolloverCounter::u8(),
            beat_times: RolloverCounter::u16(),
            toggle: PageToggle::default(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(&self, state: &mut HeartRateState, page: &Page) -> bool {
        if let Some(number) = state.toggle.observe(page[0]) {
            decode_background(state, number, page);
        }

        let beat_count = u64::from(page[6]);
        let fresh = state.beats.is_new(beat_count);
        state.beat_count = Some(state.beats.update(beat_count));
        let beat_time = state.beat_times.update(u64::from(u16_le(page, 4)));
        state.beat_time = Some(beat_time as f64 / 1024.0);
        state.computed_heart_rate = Some(page[7]);

        fresh
    }

    fn telemetry(state: &HeartRateState) -> Telemetry {
        Telemetry::HeartRate(state.clone())
    }
}

fn decode_background(state: &mut HeartRateState, number: u8, page: &Page) {
    match number {
        PAGE_OPERATING_TIME => state.operating_time = Some(u24_le(page, 1) * 2),
        PAGE_MANUFACTURER => {
            state.manufacturer_id = Some(page[1]);
            state.serial_number = Some(u16_le(page, 2));
        }
        PAGE_PRODUCT => {
            state.hw_version = Some(page[1]);
            state.sw_version = Some(page[2]);
            state.model_number = Some(page[3]);
        }
        PAGE_PREVIOUS_BEAT => {
            let previous = u16_le(page, 2);
            let current = u16_le(page, 4);
            let delta = current.wrapping_sub(previous);
            state.rr_interval = Some(f64::from(delta) * 1000.0 / 1024.0);
        }
        PAGE_CAPABILITIES => {
            state.features_supported = Some(page[2]);
            state.features_enabled = Some(page[3]);
        }
        PAGE_BATTERY => {
            let descriptive = page[3];
            let status = BatteryStatus::from_bits((descriptive & 0x70) >> 4);
            state.battery_level = (page[1] != 0xFF).then_some(page[1]);
            state.battery_status = Some(status);
            state.battery_voltage = status
                .is_valid()
                .then(|| f64::from(descriptive & 0x0F) + f64::from(page[2]) / 256.0);
        }
        PAGE_DEVICE_INFO => state.beat_event_type = Some(page[1] & 0x03),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u8, extra: [u8; 3], beat_time: u16, count: u8, rate: u8) -> Page {
        let [t0, t1] = beat_time.to_le_bytes();
        [number, extra[0], extra[1], extra[2], t0, t1, count, rate]
    }

    #[test]
    fn test_beat_data() {
        let profile = HeartRate;
        let mut state = profile.new_state(7);

        assert!(profile.decode(&mut state, &page(0, [0; 3], 2048, 10, 72)));
        assert_eq!(state.computed_heart_rate, Some(72));
        assert_eq!(state.beat_count, Some(10));
        assert_eq!(state.beat_time, Some(2.0));
    }

    #[test]
    fn test_repeated_beat_count_does_not_notify() {
        let profile = HeartRate;
        let mut state = profile.new_state(7);
        let data = page(0, [0; 3], 2048, 10, 72);

        assert!(profile.decode(&mut state, &data));
        assert!(!profile.decode(&mut state, &data));
        assert!(profile.decode(&mut state, &page(0, [0; 3], 2900, 11, 73)));
    }

    #[test]
    fn test_beat_count_rollover() {
        let profile = HeartRate;
        let mut state = profile.new_state(7);

        for count in [254u8, 255, 0, 1] {
            profile.decode(&mut state, &page(0, [0; 3], u16::from(count) * 100, count, 70));
        }
        assert_eq!(state.beat_count, Some(257));
    }

    #[test]
    fn test_background_pages_need_toggle() {
        let profile = HeartRate;
        let mut state = profile.new_state(7);

        // legacy layout before the toggle bit has moved
        profile.decode(&mut state, &page(PAGE_PRODUCT, [1, 2, 3], 0, 1, 60));
        assert_eq!(state.hw_version, None);

        profile.decode(&mut state, &page(0x80 | PAGE_PRODUCT, [1, 2, 3], 0, 1, 60));
        assert_eq!(state.hw_version, Some(1));
        assert_eq!(state.sw_version, Some(2));
        assert_eq!(state.model_number, Some(3));
    }

    #[test]
    fn test_rr_interval() {
        let profile = HeartRate;
        let mut state = profile.new_state(7);

        profile.decode(&mut state, &page(PAGE_PREVIOUS_BEAT, [0; 3], 0, 1, 60));
        let [p0, p1] = 1024u16.to_le_bytes();
        profile.decode(
            &mut state,
            &page(0x80 | PAGE_PREVIOUS_BEAT, [0xFF, p0, p1], 2048, 2, 60),
        );

        assert_eq!(state.rr_interval, Some(1000.0));
    }

    #[test]
    fn test_battery_page() {
        let profile = HeartRate;
        let mut state = profile.new_state(7);

        profile.decode(&mut state, &page(0, [0; 3], 0, 1, 60));
        profile.decode(&mut state, &page(0x80 | PAGE_BATTERY, [80, 0x40, 0x23], 0, 1, 60));

        assert_eq!(state.battery_level, Some(80));
        assert_eq!(state.battery_status, Some(BatteryStatus::Good));
        assert_eq!(state.battery_voltage, Some(3.25));
    }
}
