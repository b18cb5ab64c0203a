//! Muscle oxygen monitor profile.

use serde::Serialize;

use super::{common::CommonPages, device_state, u16_le, Page, Profile, Telemetry};
use crate::{rollover::RolloverCounter, types::Reading};

const PAGE_DATA: u8 = 0x01;

const TOTAL_AMBIENT_LIGHT: u16 = 0xFFE;
const TOTAL_INVALID: u16 = 0xFFF;
const SATURATION_AMBIENT_LIGHT: u16 = 0x3FE;
const SATURATION_INVALID: u16 = 0x3FF;

/// Muscle oxygen monitor
#[derive(Debug, Clone, Copy, Default)]
pub struct MuscleOxygen;

/// Muscle oxygen telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuscleOxygenState {
    /// Device number
    pub device_id: u16,
    /// Unwrapped measurement event count
    pub event_count: Option<u64>,
    /// The monitor asks for the current UTC time
    pub utc_time_required: Option<bool>,
    /// The monitor supports ANT-FS
    pub supports_ant_fs: Option<bool>,
    /// Measurement interval in seconds
    pub measurement_interval: Option<f64>,
    /// Total hemoglobin concentration in 0.01 g/dL
    pub total_hemoglobin_concentration: Option<Reading>,
    /// Previous saturated hemoglobin percentage in 0.1 %
    pub previous_saturated_hemoglobin_percentage: Option<Reading>,
    /// Current saturated hemoglobin percentage in 0.1 %
    pub current_saturated_hemoglobin_percentage: Option<Reading>,
    /// Common pages
    #[serde(flatten)]
    pub common: CommonPages,
    #[serde(skip)]
    events: RolloverCounter,
}

device_state!(MuscleOxygenState);

fn measurement_interval(capabilities: u16) -> Option<f64> {
    match (capabilities >> 1) & 0x7 {
        1 => Some(0.25),
        2 => Some(0.5),
        3 => Some(1.0),
        4 => Some(2.0),
        _ => None,
    }
}

impl Profile for MuscleOxygen {
    type State = MuscleOxygenState;

    const NAME: &'static str = "muscle oxygen";
    const DEVICE_TYPE: u8 = 0x1F;
    const PERIOD: u16 = 8192;

    fn new_state(&self, device_id: u16) -> MuscleOxygenState {
        MuscleOxygenState {
            device_id,
            event_count: None,
            utc_time_required: None,
            supports_ant_fs: None,
            measurement_interval: None,
            total_hemoglobin_concentration: None,
            previous_saturated_hemoglobin_percentage: None,
            current_saturated_hemoglobin_percentage: None,
            common: CommonPages::default(),
            events: RolloverCounter::u8(),
        }
    }

    fn decode(&self, state: &mut MuscleOxygenState, page: &Page) -> bool {
        if page[0] != PAGE_DATA {
            return state.common.decode(page);
        }

        let event = u64::from(page[1]);
        let fresh = state.events.is_new(event);
        state.event_count = Some(state.events.update(event));

        let notifications = page[2];
        let capabilities = u16_le(page, 3);
        state.utc_time_required = Some(notifications & 0x01 != 0);
        state.supports_ant_fs = Some(capabilities & 0x01 != 0);
        state.measurement_interval = measurement_interval(capabilities);

        let total = u16_le(page, 4) & 0xFFF;
        let previous = (u16_le(page, 5) >> 4) & 0x3FF;
        let current = (u16_le(page, 6) >> 6) & 0x3FF;

        state.total_hemoglobin_concentration =
            Some(Reading::with_sentinels(total, TOTAL_AMBIENT_LIGHT, TOTAL_INVALID));
        state.previous_saturated_hemoglobin_percentage = Some(Reading::with_sentinels(
            previous,
            SATURATION_AMBIENT_LIGHT,
            SATURATION_INVALID,
        ));
        state.current_saturated_hemoglobin_percentage = Some(Reading::with_sentinels(
            current,
            SATURATION_AMBIENT_LIGHT,
            SATURATION_INVALID,
        ));

        fresh
    }

    fn telemetry(state: &MuscleOxygenState) -> Telemetry {
        Telemetry::MuscleOxygen(state.clone())
    }
}
