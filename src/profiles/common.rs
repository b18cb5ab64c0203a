//! Manufacturer, product and battery pages shared by most ANT+ profiles.

use serde::Serialize;

use super::{u16_le, u24_le, u32_le, Page};
use crate::types::BatteryStatus;

/// Manufacturer's information
pub const PAGE_MANUFACTURER: u8 = 0x50;
/// Product information
pub const PAGE_PRODUCT: u8 = 0x51;
/// Battery status
pub const PAGE_BATTERY: u8 = 0x52;

const SERIAL_UNKNOWN: u32 = u32::MAX;
const SW_SUPPLEMENTAL_UNUSED: u8 = 0xFF;

/// Fields decoded from the common pages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommonPages {
    /// Hardware revision
    pub hw_version: Option<u8>,
    /// Manufacturer id
    pub manufacturer_id: Option<u16>,
    /// Model number
    pub model_number: Option<u16>,
    /// Software version, supplemental revision in the thousandths
    pub sw_version: Option<f64>,
    /// Serial number, `None` when the device does not report one
    pub serial_number: Option<u32>,
    /// Cumulative operating time in seconds
    pub operating_time: Option<u32>,
    /// Battery voltage in volts
    pub battery_voltage: Option<f64>,
    /// Battery condition
    pub battery_status: Option<BatteryStatus>,
}

impl CommonPages {
    /// Decode `page` if it is one of the common pages
    ///
    /// Returns `false` for any other page number.
    pub fn decode(&mut self, page: &Page) -> bool {
        match page[0] {
            PAGE_MANUFACTURER => {
                self.hw_version = Some(page[3]);
                self.manufacturer_id = Some(u16_le(page, 4));
                self.model_number = Some(u16_le(page, 6));
            }
            PAGE_PRODUCT => {
                let supplemental = page[2];
                let main = f64::from(page[3]);
                self.sw_version = Some(if supplemental == SW_SUPPLEMENTAL_UNUSED {
                    main
                } else {
                    main + f64::from(supplemental) / 1000.0
                });

                let serial = u32_le(page, 4);
                self.serial_number = (serial != SERIAL_UNKNOWN).then_some(serial);
            }
            PAGE_BATTERY => {
                let fractional = page[6];
                let descriptive = page[7];
                let resolution = if descriptive & 0x80 == 0 { 16 } else { 2 };

                self.operating_time = Some(u24_le(page, 3) * resolution);
                self.set_battery(descriptive, fractional);
            }
            _ => return false,
        }
        true
    }

    /// Apply a battery descriptive byte and fractional voltage
    ///
    /// Bits 0-3 of `descriptive` hold the coarse voltage, bits 4-6 the
    /// status. An unknown status clears the voltage.
    pub fn set_battery(&mut self, descriptive: u8, fractional: u8) {
        let status = BatteryStatus::from_bits((descriptive & 0x70) >> 4);
        self.battery_status = Some(status);
        self.battery_voltage = status
            .is_valid()
            .then(|| f64::from(descriptive & 0x0F) + f64::from(fractional) / 256.0);
    }
}
