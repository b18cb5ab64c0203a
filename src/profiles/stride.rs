//! Stride-based speed and distance monitor profile.

use serde::Serialize;

use super::{common::CommonPages, device_state, Page, Profile, Telemetry};
use crate::{rollover::RolloverCounter, types::BatteryStatus};

const PAGE_DISTANCE: u8 = 0x01;
const PAGE_SPEED: u8 = 0x02;
const PAGE_CALORIES: u8 = 0x03;

/// Seconds wrap at 256 with 1/200 s resolution
const TIME_MODULUS: u64 = 256 * 200;

/// Where the monitor is worn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Location {
    /// Laces
    Laces,
    /// Midsole
    Midsole,
    /// Chest, wrist or elsewhere
    Other,
    /// Ankle
    Ankle,
}

/// Self-reported health of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Health {
    /// Working
    Ok,
    /// Failed
    Error,
    /// Degraded
    Warning,
    /// Reserved code
    Reserved,
}

/// Status byte of the speed page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrideStatus {
    /// The wearer is moving
    pub active: bool,
    /// Monitor health
    pub health: Health,
    /// Battery condition
    pub battery: BatteryStatus,
    /// Where the monitor is worn
    pub location: Location,
}

impl StrideStatus {
    const fn from_byte(byte: u8) -> Self {
        Self {
            active: byte & 0x03 == 1,
            health: match (byte >> 2) & 0x03 {
                0 => Health::Ok,
                1 => Health::Error,
                2 => Health::Warning,
                _ => Health::Reserved,
            },
            battery: match (byte >> 4) & 0x03 {
                0 => BatteryStatus::New,
                1 => BatteryStatus::Good,
                2 => BatteryStatus::Ok,
                _ => BatteryStatus::Low,
            },
            location: match byte >> 6 {
                0 => Location::Laces,
                1 => Location::Midsole,
                2 => Location::Other,
                _ => Location::Ankle,
            },
        }
    }
}

/// Stride-based speed and distance monitor
#[derive(Debug, Clone, Copy, Default)]
pub struct Stride;

/// Stride monitor telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrideState {
    /// Device number
    pub device_id: u16,
    /// Elapsed time in seconds, unwrapped
    pub time_elapsed: Option<f64>,
    /// Distance in meters, unwrapped
    pub distance: Option<f64>,
    /// Speed in meters per second
    pub speed: Option<f64>,
    /// Unwrapped stride count
    pub stride_count: Option<u64>,
    /// Update latency in seconds
    pub update_latency: Option<f64>,
    /// Cadence in strides per minute
    pub cadence: Option<f64>,
    /// Unwrapped calories burned
    pub calories: Option<u64>,
    /// Monitor status
    pub status: Option<StrideStatus>,
    /// Common pages
    #[serde(flatten)]
    pub common: CommonPages,
    #[serde(skip)]
    times: RolloverCounter,
    #[serde(skip)]
    distances: RolloverCounter,
    #[serde(skip)]
    strides: RolloverCounter,
    #[serde(skip)]
    calorie_counter: RolloverCounter,
}

device_state!(StrideState);

fn speed(page: &Page) -> f64 {
    f64::from(page[4] & 0x0F) + f64::from(page[5]) / 256.0
}

fn cadence(page: &Page) -> f64 {
    f64::from(page[3]) + f64::from(page[4] >> 4) / 16.0
}

impl Profile for Stride {
    type State = StrideState;

    const NAME: &'static str = "stride";
    const DEVICE_TYPE: u8 = 0x7C;
    const PERIOD: u16 = 8134;

    fn new_state(&self, device_id: u16) -> StrideState {
        StrideState {
            device_id,
            time_elapsed: None,
            distance: None,
            speed: None,
            stride_count: None,
            update_latency: None,
            cadence: None,
            calories: None,
            status: None,
            common: CommonPages::default(),
            times: RolloverCounter::with_modulus(TIME_MODULUS),
            distances: RolloverCounter::new(12),
            strides: RolloverCounter::u8(),
            calorie_counter: RolloverCounter::u8(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(&self, state: &mut StrideState, page: &Page) -> bool {
        match page[0] {
            PAGE_DISTANCE => {
                let strides = u64::from(page[6]);
                let fresh = state.strides.is_new(strides);
                state.stride_count = Some(state.strides.update(strides));

                let time = u64::from(page[2]) * 200 + u64::from(page[1]);
                state.time_elapsed = Some(state.times.update(time) as f64 / 200.0);
                let distance = u64::from(page[3]) * 16 + u64::from(page[4] >> 4);
                state.distance = Some(state.distances.update(distance) as f64 / 16.0);
                state.speed = Some(speed(page));
                state.update_latency = Some(f64::from(page[7]) / 32.0);

                fresh
            }
            PAGE_SPEED => {
                state.cadence = Some(cadence(page));
                state.speed = Some(speed(page));
                state.status = Some(StrideStatus::from_byte(page[7]));
                true
            }
            PAGE_CALORIES => {
                state.cadence = Some(cadence(page));
                state.speed = Some(speed(page));
                state.calories = Some(state.calorie_counter.update(u64::from(page[6])));
                true
            }
            _ => state.common.decode(page),
        }
    }

    fn telemetry(state: &StrideState) -> Telemetry {
        Telemetry::Stride(state.clone())
    }
}
