//! Fitness equipment profile.
//!
//! Treadmills, ellipticals, rowers, climbers, nordic skiers and trainers all
//! share the general pages (0x10-0x12); each type adds its own data page.
//! Trainers also accept control pages sent as acknowledged data, built with
//! [`Command`].

use serde::Serialize;

use super::{common::CommonPages, device_state, u16_le, Page, Profile, Telemetry};
use crate::{
    error::{AntError, Result},
    protocol::PAGE_SIZE,
    rollover::RolloverCounter,
};

const PAGE_CALIBRATION: u8 = 0x01;
const PAGE_GENERAL: u8 = 0x10;
const PAGE_SETTINGS: u8 = 0x11;
const PAGE_METABOLIC: u8 = 0x12;
const PAGE_TREADMILL: u8 = 0x13;
const PAGE_ELLIPTICAL: u8 = 0x14;
const PAGE_ROWER: u8 = 0x16;
const PAGE_CLIMBER: u8 = 0x17;
const PAGE_NORDIC_SKIER: u8 = 0x18;
const PAGE_TRAINER: u8 = 0x19;
const PAGE_TRAINER_TORQUE: u8 = 0x1A;

const INCLINE_INVALID: i16 = 0x7FFF;
const U8_INVALID: u8 = 0xFF;
const U16_INVALID: u16 = 0xFFFF;

/// Kind of fitness equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EquipmentType {
    /// Treadmill
    Treadmill,
    /// Elliptical
    Elliptical,
    /// Reserved type code
    Reserved,
    /// Rower
    Rower,
    /// Climber
    Climber,
    /// Nordic skier
    NordicSkier,
    /// Trainer or stationary bike
    Trainer,
    /// General fitness equipment
    General,
}

impl EquipmentType {
    const fn from_code(code: u8) -> Self {
        match code & 0x1F {
            19 => Self::Treadmill,
            20 => Self::Elliptical,
            21 => Self::Reserved,
            22 => Self::Rower,
            23 => Self::Climber,
            24 => Self::NordicSkier,
            25 => Self::Trainer,
            _ => Self::General,
        }
    }
}

/// Source of the heart rate reported by the equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeartRateSource {
    /// Hand contact sensors
    HandContact,
    /// 5 kHz EM strap
    Em,
    /// ANT+ heart rate monitor
    AntPlus,
}

/// Operating state of the equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EquipmentState {
    /// Off
    Off,
    /// Ready to start
    Ready,
    /// In use
    InUse,
    /// Session finished or paused
    Finished,
}

impl EquipmentState {
    const fn from_byte(byte: u8) -> Option<Self> {
        match (byte & 0x70) >> 4 {
            1 => Some(Self::Off),
            2 => Some(Self::Ready),
            3 => Some(Self::InUse),
            4 => Some(Self::Finished),
            _ => None,
        }
    }
}

/// How a trainer tracks its target power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetStatus {
    /// Operating at the target power
    OnTarget,
    /// Speed too low to reach the target power
    LowSpeed,
    /// Speed too high to hold the target power
    HighSpeed,
}

/// Fitness equipment
#[derive(Debug, Clone, Copy, Default)]
pub struct FitnessEquipment;

/// Fitness equipment telemetry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessEquipmentState {
    /// Device number
    pub device_id: u16,
    /// Temperature at calibration in degrees Celsius
    pub temperature: Option<f64>,
    /// Calibration zero offset
    pub zero_offset: Option<u16>,
    /// Calibration spin-down time in milliseconds
    pub spin_down_time: Option<u16>,
    /// Kind of equipment
    pub equipment_type: Option<EquipmentType>,
    /// Elapsed time in seconds, unwrapped
    pub elapsed_time: Option<f64>,
    /// Distance traveled in meters, unwrapped
    pub distance: Option<u64>,
    /// Speed in meters per second
    pub real_speed: Option<f64>,
    /// Virtual speed in meters per second
    pub virtual_speed: Option<f64>,
    /// Heart rate in beats per minute
    pub heart_rate: Option<u8>,
    /// Where the heart rate comes from
    pub heart_rate_source: Option<HeartRateSource>,
    /// Operating state
    pub state: Option<EquipmentState>,
    /// Cycle length in meters
    pub cycle_length: Option<f64>,
    /// Incline in percent
    pub incline: Option<f64>,
    /// Resistance level in percent of maximum
    pub resistance: Option<f64>,
    /// Metabolic equivalents
    pub mets: Option<f64>,
    /// Caloric burn rate in kcal/h
    pub caloric_burn_rate: Option<f64>,
    /// Calories burned, unwrapped
    pub calories: Option<u64>,
    /// Ascended distance in meters
    pub ascended_distance: Option<f64>,
    /// Descended distance in meters
    pub descended_distance: Option<f64>,
    /// Stride count
    pub strides: Option<u64>,
    /// Stroke count
    pub strokes: Option<u64>,
    /// Cadence in strides, strokes or revolutions per minute
    pub cadence: Option<u8>,
    /// Unwrapped accumulated power in watts
    pub accumulated_power: Option<u64>,
    /// Instantaneous power in watts
    pub instantaneous_power: Option<u16>,
    /// Average power over the last update events in watts
    pub average_power: Option<f64>,
    /// Trainer status bits
    pub trainer_status: Option<u8>,
    /// Target power tracking
    pub target_status: Option<TargetStatus>,
    /// Unwrapped wheel ticks
    pub wheel_ticks: Option<u64>,
    /// Accumulated wheel period in seconds
    pub wheel_period: Option<f64>,
    /// Accumulated torque in newton meters
    pub torque: Option<f64>,
    /// Common pages
    #[serde(flatten)]
    pub common: CommonPages,
    #[serde(skip)]
    elapsed: RolloverCounter,
    #[serde(skip)]
    distance_counter: RolloverCounter,
    #[serde(skip)]
    calorie_counter: RolloverCounter,
    #[serde(skip)]
    stride_counter: RolloverCounter,
    #[serde(skip)]
    trainer_events: RolloverCounter,
    #[serde(skip)]
    power_counter: RolloverCounter,
    #[serde(skip)]
    torque_events: RolloverCounter,
    #[serde(skip)]
    tick_counter: RolloverCounter,
}

device_state!(FitnessEquipmentState);

impl Profile for FitnessEquipment {
    type State = FitnessEquipmentState;

    const NAME: &'static str = "fitness equipment";
    const DEVICE_TYPE: u8 = 0x11;
    const PERIOD: u16 = 8192;

    fn new_state(&self, device_id: u16) -> FitnessEquipmentState {
        FitnessEquipmentState {
            device_id,
            temperature: None,
            zero_offset: None,
            spin_down_time: None,
            equipment_type: None,
            elapsed_time: None,
            distance: None,
            real_speed: None,
            virtual_speed: None,
            heart_rate: None,
            heart_rate_source: None,
            state: None,
            cycle_length: None,
            incline: None,
            resistance: None,
            mets: None,
            caloric_burn_rate: None,
            calories: None,
            ascended_distance: None,
            descended_distance: None,
            strides: None,
            strokes: None,
            cadence: None,
            accumulated_power: None,
            instantaneous_power: None,
            average_power: None,
            trainer_status: None,
            target_status: None,
            wheel_ticks: None,
            wheel_period: None,
            torque: None,
            common: CommonPages::default(),
            elapsed: RolloverCounter::u8(),
            distance_counter: RolloverCounter::u8(),
            calorie_counter: RolloverCounter::u8(),
            stride_counter: RolloverCounter::u8(),
            trainer_events: RolloverCounter::u8(),
            power_counter: RolloverCounter::u16(),
            torque_events: RolloverCounter::u8(),
            tick_counter: RolloverCounter::u8(),
        }
    }

    fn decode(&self, state: &mut FitnessEquipmentState, page: &Page) -> bool {
        let number = page[0];
        if (PAGE_GENERAL..=PAGE_TRAINER_TORQUE).contains(&number) {
            if let Some(equipment_state) = EquipmentState::from_byte(page[7]) {
                state.state = Some(equipment_state);
            }
        }

        match number {
            PAGE_CALIBRATION => decode_calibration(state, page),
            PAGE_GENERAL => decode_general(state, page),
            PAGE_SETTINGS => {
                state.cycle_length = (page[3] != U8_INVALID).then(|| f64::from(page[3]) / 100.0);
                let incline = i16::from_le_bytes([page[4], page[5]]);
                state.incline = (incline != INCLINE_INVALID).then(|| f64::from(incline) / 100.0);
                state.resistance = Some(f64::from(page[6]) / 2.0);
            }
            PAGE_METABOLIC => {
                let mets = u16_le(page, 2);
                state.mets = (mets != U16_INVALID).then(|| f64::from(mets) / 100.0);
                let burn_rate = u16_le(page, 4);
                state.caloric_burn_rate =
                    (burn_rate != U16_INVALID).then(|| f64::from(burn_rate) / 10.0);
                state.calories = Some(state.calorie_counter.update(u64::from(page[6])));
            }
            PAGE_TREADMILL => {
                state.cadence = Some(page[4]);
                state.descended_distance = Some(f64::from(page[5]) / 10.0);
                state.ascended_distance = Some(f64::from(page[6]) / 10.0);
            }
            PAGE_ELLIPTICAL | PAGE_CLIMBER | PAGE_NORDIC_SKIER => {
                state.strides = Some(state.stride_counter.update(u64::from(page[3])));
                decode_cadence_and_power(state, page);
            }
            PAGE_ROWER => {
                state.strokes = Some(state.stride_counter.update(u64::from(page[3])));
                decode_cadence_and_power(state, page);
            }
            PAGE_TRAINER => return decode_trainer(state, page),
            PAGE_TRAINER_TORQUE => return decode_trainer_torque(state, page),
            _ => return state.common.decode(page),
        }
        true
    }

    fn telemetry(state: &FitnessEquipmentState) -> Telemetry {
        Telemetry::FitnessEquipment(state.clone())
    }
}

fn decode_calibration(state: &mut FitnessEquipmentState, page: &Page) {
    state.temperature = (page[3] != U8_INVALID).then(|| (f64::from(page[3]) - 25.0) / 2.0);
    let zero_offset = u16_le(page, 4);
    state.zero_offset = (zero_offset != U16_INVALID).then_some(zero_offset);
    let spin_down = u16_le(page, 6);
    state.spin_down_time = (spin_down != U16_INVALID).then_some(spin_down);
}

#[allow(clippy::cast_precision_loss)]
fn decode_general(state: &mut FitnessEquipmentState, page: &Page) {
    let capabilities = page[7] & 0x0F;

    state.equipment_type = Some(EquipmentType::from_code(page[1]));
    state.elapsed_time = Some(state.elapsed.update(u64::from(page[2])) as f64 / 4.0);
    if capabilities & 0x04 != 0 {
        state.distance = Some(state.distance_counter.update(u64::from(page[3])));
    }

    let speed = f64::from(u16_le(page, 4)) / 1000.0;
    if capabilities & 0x08 == 0 {
        state.real_speed = Some(speed);
    } else {
        state.virtual_speed = Some(speed);
    }

    state.heart_rate = (page[6] != U8_INVALID).then_some(page[6]);
    state.heart_rate_source = match capabilities & 0x03 {
        3 => Some(HeartRateSource::HandContact),
        2 => Some(HeartRateSource::Em),
        1 => Some(HeartRateSource::AntPlus),
        _ => None,
    };
}

fn decode_cadence_and_power(state: &mut FitnessEquipmentState, page: &Page) {
    state.cadence = Some(page[4]);
    let power = u16_le(page, 5);
    state.instantaneous_power = (power != U16_INVALID).then_some(power);
}

#[allow(clippy::cast_precision_loss)]
fn decode_trainer(state: &mut FitnessEquipmentState, page: &Page) -> bool {
    let event = u64::from(page[1]);
    let fresh = state.trainer_events.is_new(event);

    let events = state.trainer_events.advance(event);
    let watts = state.power_counter.advance(u64::from(u16_le(page, 3)));
    if let (Some(events), Some(watts)) = (events, watts) {
        if events > 0 {
            state.average_power = Some(watts as f64 / events as f64);
        }
    }

    state.cadence = (page[2] != U8_INVALID).then_some(page[2]);
    state.accumulated_power = state.power_counter.value();
    state.instantaneous_power = Some(u16_le(page, 5) & 0x0FFF);
    state.trainer_status = Some(page[6] >> 4);
    state.target_status = match page[7] & 0x03 {
        0 => Some(TargetStatus::OnTarget),
        1 => Some(TargetStatus::LowSpeed),
        2 => Some(TargetStatus::HighSpeed),
        _ => None,
    };

    fresh
}

fn decode_trainer_torque(state: &mut FitnessEquipmentState, page: &Page) -> bool {
    let event = u64::from(page[1]);
    let fresh = state.torque_events.is_new(event);
    state.torque_events.update(event);

    state.wheel_ticks = Some(state.tick_counter.update(u64::from(page[2])));
    state.wheel_period = Some(f64::from(u16_le(page, 3)) / 2048.0);
    state.torque = Some(f64::from(u16_le(page, 5)) / 32.0);

    fresh
}

/// Control page sent to a trainer as acknowledged data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Resistance in percent of maximum, 0-100
    BasicResistance(f64),
    /// Target power in watts, 0-1000
    TargetPower(f64),
    /// Wind resistance simulation
    WindResistance {
        /// Wind resistance coefficient in kg/m, 0-1.86
        coefficient: f64,
        /// Wind speed in km/h, -127 to 127
        speed: i16,
        /// Drafting factor, 0-1
        drafting_factor: f64,
    },
    /// Track resistance simulation
    TrackResistance {
        /// Grade in percent, -200 to 200
        slope: f64,
        /// Coefficient of rolling resistance, 0-0.0127
        rolling_resistance: f64,
    },
    /// User configuration
    UserConfiguration {
        /// User weight in kg, 0-655.34
        user_weight: f64,
        /// Bike weight in kg, 0-50
        bike_weight: f64,
        /// Wheel diameter in meters, 0-2.54
        wheel_diameter: f64,
        /// Gear ratio, front teeth / rear teeth, 0.03-7.65
        gear_ratio: f64,
    },
}

impl Command {
    /// Encode the control page
    ///
    /// Values outside a field's range are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`AntError::InvalidParameters`] for NaN or infinite values.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_page(&self) -> Result<[u8; PAGE_SIZE]> {
        let mut page = [0xFF; PAGE_SIZE];

        match *self {
            Self::BasicResistance(resistance) => {
                let resistance = finite(resistance, "resistance")?.clamp(0.0, 100.0);
                page[0] = 0x30;
                page[7] = (resistance * 2.0).round() as u8;
            }
            Self::TargetPower(power) => {
                let power = finite(power, "target power")?.clamp(0.0, 1000.0);
                page[0] = 0x31;
                page[6..8].copy_from_slice(&((power * 4.0).round() as u16).to_le_bytes());
            }
            Self::WindResistance {
                coefficient,
                speed,
                drafting_factor,
            } => {
                let coefficient = finite(coefficient, "wind resistance coefficient")?.clamp(0.0, 1.86);
                let drafting_factor = finite(drafting_factor, "drafting factor")?.clamp(0.0, 1.0);
                page[0] = 0x32;
                page[5] = (coefficient * 100.0).round() as u8;
                page[6] = (speed.clamp(-127, 127) + 127) as u8;
                page[7] = (drafting_factor * 100.0).round() as u8;
            }
            Self::TrackResistance {
                slope,
                rolling_resistance,
            } => {
                let slope = finite(slope, "slope")?.clamp(-200.0, 200.0);
                let rolling_resistance =
                    finite(rolling_resistance, "rolling resistance")?.clamp(0.0, 0.0127);
                page[0] = 0x33;
                page[5..7].copy_from_slice(&(((slope + 200.0) / 0.01).round() as u16).to_le_bytes());
                page[7] = (rolling_resistance / 0.000_05).round() as u8;
            }
            Self::UserConfiguration {
                user_weight,
                bike_weight,
                wheel_diameter,
                gear_ratio,
            } => {
                let user_weight = finite(user_weight, "user weight")?.clamp(0.0, 655.34);
                let bike_weight = finite(bike_weight, "bike weight")?.clamp(0.0, 50.0);
                let wheel_diameter = finite(wheel_diameter, "wheel diameter")?.clamp(0.0, 2.54);
                let gear_ratio = finite(gear_ratio, "gear ratio")?.clamp(0.03, 7.65);

                let user = (user_weight * 100.0).round() as u16;
                let bike = (bike_weight * 20.0).round() as u16;
                let wheel_mm = (wheel_diameter * 1000.0).round() as u16;

                page[0] = 0x37;
                page[1..3].copy_from_slice(&user.to_le_bytes());
                page[3] = 0xFF;
                page[4] = ((wheel_mm % 10) as u8 & 0x0F) | (((bike & 0x0F) as u8) << 4);
                page[5] = (bike >> 4) as u8;
                page[6] = (wheel_mm / 10) as u8;
                page[7] = (gear_ratio / 0.03).round() as u8;
            }
        }

        Ok(page)
    }
}

fn finite(value: f64, name: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AntError::InvalidParameters(format!("{name} must be finite, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_page() {
        let profile = FitnessEquipment;
        let mut state = profile.new_state(1);

        // trainer, 10 s, 100 m, 5.5 m/s, hr 140 from ANT+, distance enabled, IN_USE
        let page = [0x10, 25, 40, 100, 0x7C, 0x15, 140, 0x35];
        assert!(profile.decode(&mut state, &page));

        assert_eq!(state.equipment_type, Some(EquipmentType::Trainer));
        assert_eq!(state.elapsed_time, Some(10.0));
        assert_eq!(state.distance, Some(100));
        assert_eq!(state.real_speed, Some(5.5));
        assert_eq!(state.virtual_speed, None);
        assert_eq!(state.heart_rate, Some(140));
        assert_eq!(state.heart_rate_source, Some(HeartRateSource::AntPlus));
        assert_eq!(state.state, Some(EquipmentState::InUse));
    }

    #[test]
    fn test_general_page_rollover_and_virtual_speed() {
        let profile = FitnessEquipment;
        let mut state = profile.new_state(1);

        profile.decode(&mut state, &[0x10, 19, 250, 250, 0xE8, 0x03, 0xFF, 0x0C]);
        profile.decode(&mut state, &[0x10, 19, 6, 4, 0xE8, 0x03, 0xFF, 0x0C]);

        assert_eq!(state.equipment_type, Some(EquipmentType::Treadmill));
        assert_eq!(state.elapsed_time, Some(65.5));
        assert_eq!(state.distance, Some(260));
        assert_eq!(state.virtual_speed, Some(1.0));
        assert_eq!(state.heart_rate, None);
        assert_eq!(state.heart_rate_source, None);
    }

    #[test]
    fn test_settings_and_metabolic_pages() {
        let profile = FitnessEquipment;
        let mut state = profile.new_state(1);

        let [i0, i1] = (-250i16).to_le_bytes();
        profile.decode(&mut state, &[0x11, 0xFF, 0xFF, 150, i0, i1, 40, 0x20]);
        assert_eq!(state.cycle_length, Some(1.5));
        assert_eq!(state.incline, Some(-2.5));
        assert_eq!(state.resistance, Some(20.0));
        assert_eq!(state.state, Some(EquipmentState::Ready));

        profile.decode(&mut state, &[0x11, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F, 40, 0x20]);
        assert_eq!(state.incline, None);
        assert_eq!(state.cycle_length, None);

        profile.decode(&mut state, &[0x12, 0xFF, 0xF4, 0x01, 0xE8, 0x03, 30, 0x30]);
        assert_eq!(state.mets, Some(5.0));
        assert_eq!(state.caloric_burn_rate, Some(100.0));
        assert_eq!(state.calories, Some(30));
    }

    #[test]
    fn test_type_specific_pages() {
        let profile = FitnessEquipment;
        let mut state = profile.new_state(1);

        profile.decode(&mut state, &[0x13, 0xFF, 0xFF, 0xFF, 160, 12, 34, 0x30]);
        assert_eq!(state.cadence, Some(160));
        assert_eq!(state.descended_distance, Some(1.2));
        assert_eq!(state.ascended_distance, Some(3.4));

        profile.decode(&mut state, &[0x16, 0xFF, 0xFF, 42, 28, 0xC8, 0x00, 0x30]);
        assert_eq!(state.strokes, Some(42));
        assert_eq!(state.cadence, Some(28));
        assert_eq!(state.instantaneous_power, Some(200));
    }

    #[test]
    fn test_trainer_page_dedup_and_average() {
        let profile = FitnessEquipment;
        let mut state = profile.new_state(1);

        let first = [0x19, 10, 90, 0x10, 0x27, 0xFA, 0x30, 0x01];
        assert!(profile.decode(&mut state, &first));
        assert!(!profile.decode(&mut state, &first));

        // two events, 500 W accumulated
        let [a0, a1] = 10_500u16.to_le_bytes();
        assert!(profile.decode(&mut state, &[0x19, 12, 91, a0, a1, 0xFA, 0x30, 0x02]));

        assert_eq!(state.cadence, Some(91));
        assert_eq!(state.instantaneous_power, Some(250));
        assert_eq!(state.average_power, Some(250.0));
        assert_eq!(state.trainer_status, Some(0x03));
        assert_eq!(state.target_status, Some(TargetStatus::HighSpeed));
        assert_eq!(state.accumulated_power, Some(10_500));
    }

    #[test]
    fn test_trainer_torque_page() {
        let profile = FitnessEquipment;
        let mut state = profile.new_state(1);
        let [p0, p1] = 4096u16.to_le_bytes();
        let [t0, t1] = 320u16.to_le_bytes();
        let page = [0x1A, 5, 20, p0, p1, t0, t1, 0x30];

        assert!(profile.decode(&mut state, &page));
        assert!(!profile.decode(&mut state, &page));
        assert_eq!(state.wheel_ticks, Some(20));
        assert_eq!(state.wheel_period, Some(2.0));
        assert_eq!(state.torque, Some(10.0));
    }

    #[test]
    fn test_calibration_page() {
        let profile = FitnessEquipment;
        let mut state = profile.new_state(1);

        profile.decode(&mut state, &[0x01, 0x40, 0x00, 75, 0xFF, 0xFF, 0xE8, 0x03]);
        assert_eq!(state.temperature, Some(25.0));
        assert_eq!(state.zero_offset, None);
        assert_eq!(state.spin_down_time, Some(1000));
    }

    #[test]
    fn test_basic_resistance_command() {
        assert_eq!(
            Command::BasicResistance(37.5).to_page().unwrap(),
            [0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 75]
        );
        assert_eq!(Command::BasicResistance(250.0).to_page().unwrap()[7], 200);
    }

    #[test]
    fn test_target_power_command() {
        assert_eq!(
            Command::TargetPower(200.0).to_page().unwrap(),
            [0x31, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x20, 0x03]
        );
        let clamped = Command::TargetPower(5000.0).to_page().unwrap();
        assert_eq!(u16::from_le_bytes([clamped[6], clamped[7]]), 4000);
    }

    #[test]
    fn test_wind_and_track_commands() {
        let wind = Command::WindResistance {
            coefficient: 0.51,
            speed: -10,
            drafting_factor: 1.0,
        };
        assert_eq!(
            wind.to_page().unwrap(),
            [0x32, 0xFF, 0xFF, 0xFF, 0xFF, 51, 117, 100]
        );

        let track = Command::TrackResistance {
            slope: 2.5,
            rolling_resistance: 0.004,
        };
        let page = track.to_page().unwrap();
        assert_eq!(page[0], 0x33);
        assert_eq!(u16::from_le_bytes([page[5], page[6]]), 20_250);
        assert_eq!(page[7], 80);
    }

    #[test]
    fn test_user_configuration_command() {
        let page = Command::UserConfiguration {
            user_weight: 75.0,
            bike_weight: 10.0,
            wheel_diameter: 0.7,
            gear_ratio: 1.5,
        }
        .to_page()
        .unwrap();

        assert_eq!(page[0], 0x37);
        assert_eq!(u16::from_le_bytes([page[1], page[2]]), 7500);
        // bike weight 200 in 0.05 kg units: low nibble 8, high byte 12
        assert_eq!(page[4], 0x80);
        assert_eq!(page[5], 12);
        assert_eq!(page[6], 70);
        assert_eq!(page[7], 50);
    }

    #[test]
    fn test_command_rejects_nan() {
        let result = Command::TargetPower(f64::NAN).to_page();
        assert!(matches!(result, Err(AntError::InvalidParameters(_))));
    }
}
