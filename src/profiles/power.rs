//! Bicycle power profile.
//!
//! Supports the power-only page (0x10) and the crank torque frequency page
//! (0x20). Crank torque frequency meters report torque as a tick frequency
//! whose zero offset comes from a calibration page; power is derived from the
//! offset-corrected frequency, the meter's slope and the measured cadence.

use serde::Serialize;
use std::f64::consts::PI;

use super::{common::CommonPages, device_state, u16_be, u16_le, Page, Profile, Telemetry};
use crate::rollover::RolloverCounter;

const PAGE_CALIBRATION: u8 = 0x01;
const PAGE_POWER_ONLY: u8 = 0x10;
const PAGE_CRANK_TORQUE_FREQUENCY: u8 = 0x20;

const CALIBRATION_CTF: u8 = 0x10;
const CTF_ZERO_OFFSET: u8 = 0x01;

const NOT_AVAILABLE: u8 = 0xFF;
const PEDAL_RIGHT: u8 = 0x80;

/// Seconds per crank torque frequency timestamp tick
const CTF_TICK: f64 = 0.0005;

/// Bicycle power meter
#[derive(Debug, Clone, Copy, Default)]
pub struct Power;

/// Power meter telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerState {
    /// Device number
    pub device_id: u16,
    /// Unwrapped update event count of the last data page
    pub event_count: Option<u64>,
    /// Pedal power contribution in percent
    pub pedal_power: Option<u8>,
    /// Right pedal contribution in percent, when the meter knows the side
    pub right_pedal_power: Option<u8>,
    /// Left pedal contribution in percent, when the meter knows the side
    pub left_pedal_power: Option<u8>,
    /// Crank cadence in revolutions per minute
    pub cadence: Option<f64>,
    /// Unwrapped accumulated power in watts
    pub accumulated_power: Option<u64>,
    /// Instantaneous power in watts
    pub power: Option<f64>,
    /// Average power over the last update events in watts
    pub average_power: Option<f64>,
    /// Crank torque in newton meters
    pub torque: Option<f64>,
    /// Crank torque frequency slope in 1/10 Nm/Hz
    pub slope: Option<u16>,
    /// Crank torque frequency zero offset in Hz
    pub ctf_offset: Option<u16>,
    /// Common pages
    #[serde(flatten)]
    pub common: CommonPages,
    #[serde(skip)]
    events: RolloverCounter,
    #[serde(skip)]
    accumulated: RolloverCounter,
    #[serde(skip)]
    ctf_events: RolloverCounter,
    #[serde(skip)]
    ctf_times: RolloverCounter,
    #[serde(skip)]
    ctf_ticks: RolloverCounter,
}

device_state!(PowerState);

impl Profile for Power {
    type State = PowerState;

    const NAME: &'static str = "power";
    const DEVICE_TYPE: u8 = 0x0B;
    const PERIOD: u16 = 8182;

    fn new_state(&self, device_id: u16) -> PowerState {
        PowerState {
            device_id,
            event_count: None,
            pedal_power: None,
            right_pedal_power: None,
            left_pedal_power: None,
            cadence: None,
            accumulated_power: None,
            power: None,
            average_power: None,
            torque: None,
            slope: None,
            ctf_offset: None,
            common: CommonPages::default(),
            events: RolloverCounter::u8(),
            accumulated: RolloverCounter::u16(),
            ctf_events: RolloverCounter::u8(),
            ctf_times: RolloverCounter::u16(),
            ctf_ticks: RolloverCounter::u16(),
        }
    }

    fn decode(&self, state: &mut PowerState, page: &Page) -> bool {
        match page[0] {
            PAGE_CALIBRATION => {
                if page[1] == CALIBRATION_CTF && page[2] == CTF_ZERO_OFFSET {
                    state.ctf_offset = Some(u16_be(page, 6));
                }
                true
            }
            PAGE_POWER_ONLY => decode_power_only(state, page),
            PAGE_CRANK_TORQUE_FREQUENCY => decode_crank_torque_frequency(state, page),
            _ => state.common.decode(page),
        }
    }

    fn telemetry(state: &PowerState) -> Telemetry {
        Telemetry::Power(state.clone())
    }
}

#[allow(clippy::cast_precision_loss)]
fn decode_power_only(state: &mut PowerState, page: &Page) -> bool {
    let event = u64::from(page[1]);
    let fresh = state.events.is_new(event);

    let events = state.events.advance(event);
    let accumulated = state.accumulated.advance(u64::from(u16_le(page, 4)));
    if let (Some(events), Some(watts)) = (events, accumulated) {
        if events > 0 {
            state.average_power = Some(watts as f64 / events as f64);
        }
    }
    state.event_count = state.events.value();
    state.accumulated_power = state.accumulated.value();

    let pedal = page[2];
    if pedal == NOT_AVAILABLE {
        state.pedal_power = None;
        state.right_pedal_power = None;
        state.left_pedal_power = None;
    } else {
        let share = pedal & !PEDAL_RIGHT;
        state.pedal_power = Some(share);
        if pedal & PEDAL_RIGHT == 0 {
            state.right_pedal_power = None;
            state.left_pedal_power = None;
        } else {
            state.right_pedal_power = Some(share);
            state.left_pedal_power = Some(100u8.saturating_sub(share));
        }
    }

    state.cadence = (page[3] != NOT_AVAILABLE).then(|| f64::from(page[3]));
    state.power = Some(f64::from(u16_le(page, 6)));

    fresh
}

#[allow(clippy::cast_precision_loss)]
fn decode_crank_torque_frequency(state: &mut PowerState, page: &Page) -> bool {
    let event = u64::from(page[1]);
    let slope = u16_be(page, 2);
    let timestamp = u16_be(page, 4);
    let ticks = u16_be(page, 6);

    let fresh = state.ctf_events.is_new(event);
    let events = state.ctf_events.advance(event);
    let elapsed = state.ctf_times.advance(u64::from(timestamp));
    let torque_ticks = state.ctf_ticks.advance(u64::from(ticks));
    state.event_count = state.ctf_events.value();
    state.slope = Some(slope);

    let (Some(events), Some(elapsed), Some(torque_ticks)) = (events, elapsed, torque_ticks) else {
        return fresh;
    };
    if events == 0 || elapsed == 0 {
        return fresh;
    }

    let elapsed = elapsed as f64 * CTF_TICK;
    let cadence = (60.0 * events as f64 / elapsed).round();
    state.cadence = Some(cadence);

    if slope != 0 {
        let offset = f64::from(state.ctf_offset.unwrap_or(0));
        let torque_frequency = torque_ticks as f64 / elapsed - offset;
        let torque = torque_frequency / (f64::from(slope) / 10.0);
        state.torque = Some(torque);
        state.power = Some(torque * cadence * PI / 30.0);
    }

    fresh
}
