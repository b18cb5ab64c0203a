//! Bike speed and cadence profiles: the combined sensor and the two
//! single-measurement sensors.
//!
//! All three report cumulative revolution counts stamped with a 1/1024 s
//! event time. Speed and cadence are computed from the difference between
//! two consecutive events.

use serde::Serialize;

use super::{device_state, u16_le, u24_le, Page, PageToggle, Profile, Telemetry};
use crate::{rollover::RolloverCounter, types::BatteryStatus};

/// Wheel circumference in meters used when none is configured
pub const DEFAULT_WHEEL_CIRCUMFERENCE: f64 = 2.199;

const PAGE_OPERATING_TIME: u8 = 1;
const PAGE_MANUFACTURER: u8 = 2;
const PAGE_PRODUCT: u8 = 3;
const PAGE_BATTERY: u8 = 4;
const PAGE_MOTION: u8 = 5;

/// Revolutions and event times of one measurement, unwrapped
#[derive(Debug, Clone, PartialEq)]
struct RevolutionTracker {
    times: RolloverCounter,
    revolutions: RolloverCounter,
}

impl RevolutionTracker {
    const fn new() -> Self {
        Self {
            times: RolloverCounter::u16(),
            revolutions: RolloverCounter::u16(),
        }
    }

    /// Feed an event, returning `(revolutions, seconds)` since the last one
    #[allow(clippy::cast_precision_loss)]
    fn advance(&mut self, time: u16, revolutions: u16) -> Option<(f64, f64)> {
        let dt = self.times.advance(u64::from(time));
        let dr = self.revolutions.advance(u64::from(revolutions));
        match (dt, dr) {
            (Some(dt), Some(dr)) if dt > 0 => Some((dr as f64, dt as f64 / 1024.0)),
            _ => None,
        }
    }

    fn is_new(&self, time: u16) -> bool {
        self.times.is_new(u64::from(time))
    }

    fn total_revolutions(&self) -> Option<u64> {
        self.revolutions.value()
    }
}

/// Fields of the background pages of the single-measurement sensors
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BikeSensorInfo {
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
    /// Battery voltage in volts
    pub battery_voltage: Option<f64>,
    /// Battery condition
    pub battery_status: Option<BatteryStatus>,
}

impl BikeSensorInfo {
    fn decode(&mut self, number: u8, page: &Page) {
        match number {
            PAGE_OPERATING_TIME => self.operating_time = Some(u24_le(page, 1) * 2),
            PAGE_MANUFACTURER => {
                self.manufacturer_id = Some(page[1]);
                self.serial_number = Some(u16_le(page, 2));
            }
            PAGE_PRODUCT => {
                self.hw_version = Some(page[1]);
                self.sw_version = Some(page[2]);
                self.model_number = Some(page[3]);
            }
            PAGE_BATTERY => {
                let descriptive = page[3];
                let status = BatteryStatus::from_bits((descriptive & 0x70) >> 4);
                self.battery_status = Some(status);
                self.battery_voltage = status
                    .is_valid()
                    .then(|| f64::from(descriptive & 0x0F) + f64::from(page[2]) / 256.0);
            }
            _ => {}
        }
    }
}

/// Combined speed and cadence sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedCadence {
    /// Wheel circumference in meters
    pub wheel_circumference: f64,
}

impl Default for SpeedCadence {
    fn default() -> Self {
        Self {
            wheel_circumference: DEFAULT_WHEEL_CIRCUMFERENCE,
        }
    }
}

/// Combined speed and cadence telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedCadenceState {
    /// Device number
    pub device_id: u16,
    /// Crank cadence in revolutions per minute
    pub cadence: Option<f64>,
    /// Wheel speed in meters per second
    pub speed: Option<f64>,
    /// Unwrapped crank revolutions
    pub cumulative_cadence_revolutions: Option<u64>,
    /// Unwrapped wheel revolutions
    pub cumulative_speed_revolutions: Option<u64>,
    /// Distance covered in meters
    pub distance: Option<f64>,
    #[serde(skip)]
    crank: RevolutionTracker,
    #[serde(skip)]
    wheel: RevolutionTracker,
}

device_state!(SpeedCadenceState);

impl Profile for SpeedCadence {
    type State = SpeedCadenceState;

    const NAME: &'static str = "speed/cadence";
    const DEVICE_TYPE: u8 = 0x79;
    const PERIOD: u16 = 8086;

    fn new_state(&self, device_id: u16) -> SpeedCadenceState {
        SpeedCadenceState {
            device_id,
            cadence: None,
            speed: None,
            cumulative_cadence_revolutions: None,
            cumulative_speed_revolutions: None,
            distance: None,
            crank: RevolutionTracker::new(),
            wheel: RevolutionTracker::new(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(&self, state: &mut SpeedCadenceState, page: &Page) -> bool {
        let cadence_time = u16_le(page, 0);
        let cadence_revolutions = u16_le(page, 2);
        let speed_time = u16_le(page, 4);
        let speed_revolutions = u16_le(page, 6);

        let fresh = state.crank.is_new(cadence_time) || state.wheel.is_new(speed_time);

        if let Some((revolutions, seconds)) = state.crank.advance(cadence_time, cadence_revolutions) {
            state.cadence = Some(60.0 * revolutions / seconds);
        }
        if let Some((revolutions, seconds)) = state.wheel.advance(speed_time, speed_revolutions) {
            state.speed = Some(self.wheel_circumference * revolutions / seconds);
        }

        state.cumulative_cadence_revolutions = state.crank.total_revolutions();
        state.cumulative_speed_revolutions = state.wheel.total_revolutions();
        state.distance = state
            .cumulative_speed_revolutions
            .map(|revolutions| revolutions as f64 * self.wheel_circumference);

        fresh
    }

    fn telemetry(state: &SpeedCadenceState) -> Telemetry {
        Telemetry::SpeedCadence(state.clone())
    }
}

/// Speed-only sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed {
    /// Wheel circumference in meters
    pub wheel_circumference: f64,
}

impl Default for Speed {
    fn default() -> Self {
        Self {
            wheel_circumference: DEFAULT_WHEEL_CIRCUMFERENCE,
        }
    }
}

/// Speed sensor telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedState {
    /// Device number
    pub device_id: u16,
    /// Wheel speed in meters per second
    pub speed: Option<f64>,
    /// Unwrapped wheel revolutions
    pub cumulative_speed_revolutions: Option<u64>,
    /// Distance covered in meters
    pub distance: Option<f64>,
    /// The wheel has stopped
    pub stopped: Option<bool>,
    /// Background pages
    #[serde(flatten)]
    pub info: BikeSensorInfo,
    #[serde(skip)]
    wheel: RevolutionTracker,
    #[serde(skip)]
    toggle: PageToggle,
}

device_state!(SpeedState);

impl Profile for Speed {
    type State = SpeedState;

    const NAME: &'static str = "speed";
    const DEVICE_TYPE: u8 = 0x7B;
    const PERIOD: u16 = 8118;

    fn new_state(&self, device_id: u16) -> SpeedState {
        SpeedState {
            device_id,
            speed: None,
            cumulative_speed_revolutions: None,
            distance: None,
            stopped: None,
            info: BikeSensorInfo::default(),
            wheel: RevolutionTracker::new(),
            toggle: PageToggle::default(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(&self, state: &mut SpeedState, page: &Page) -> bool {
        match state.toggle.observe(page[0]) {
            Some(PAGE_MOTION) => state.stopped = Some(page[1] & 0x01 != 0),
            Some(number) => state.info.decode(number, page),
            None => {}
        }

        let time = u16_le(page, 4);
        let fresh = state.wheel.is_new(time);
        if let Some((revolutions, seconds)) = state.wheel.advance(time, u16_le(page, 6)) {
            state.speed = Some(self.wheel_circumference * revolutions / seconds);
        }
        state.cumulative_speed_revolutions = state.wheel.total_revolutions();
        state.distance = state
            .cumulative_speed_revolutions
            .map(|revolutions| revolutions as f64 * self.wheel_circumference);

        fresh
    }

    fn telemetry(state: &SpeedState) -> Telemetry {
        Telemetry::Speed(state.clone())
    }
}

/// Cadence-only sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cadence;

/// Cadence sensor telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadenceState {
    /// Device number
    pub device_id: u16,
    /// Crank cadence in revolutions per minute
    pub cadence: Option<f64>,
    /// Unwrapped crank revolutions
    pub cumulative_cadence_revolutions: Option<u64>,
    /// Background pages
    #[serde(flatten)]
    pub info: BikeSensorInfo,
    #[serde(skip)]
    crank: RevolutionTracker,
    #[serde(skip)]
    toggle: PageToggle,
}

device_state!(CadenceState);

impl Profile for Cadence {
    type State = CadenceState;

    const NAME: &'static str = "cadence";
    const DEVICE_TYPE: u8 = 0x7A;
    const PERIOD: u16 = 8102;

    fn new_state(&self, device_id: u16) -> CadenceState {
        CadenceState {
            device_id,
            cadence: None,
            cumulative_cadence_revolutions: None,
            info: BikeSensorInfo::default(),
            crank: RevolutionTracker::new(),
            toggle: PageToggle::default(),
        }
    }

    fn decode(&self, state: &mut CadenceState, page: &Page) -> bool {
        if let Some(number) = state.toggle.observe(page[0]) {
            state.info.decode(number, page);
        }

        let time = u16_le(page, 4);
        let fresh = state.crank.is_new(time);
        if let Some((revolutions, seconds)) = state.crank.advance(time, u16_le(page, 6)) {
            state.cadence = Some(60.0 * revolutions / seconds);
        }
        state.cumulative_cadence_revolutions = state.crank.total_revolutions();

        fresh
    }

    fn telemetry(state: &CadenceState) -> Telemetry {
        Telemetry::Cadence(state.clone())
    }
}
