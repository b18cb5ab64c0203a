//! Rollover-safe counters.
//!
//! Sensors transmit cumulative values in narrow fields (8-bit event counts,
//! 16-bit event times, 24-bit operating times) that wrap at the field width.
//! [`RolloverCounter`] unwraps them into a logical value that never decreases,
//! assuming fewer than one full wrap happens between two observations.

use serde::{Deserialize, Serialize};

/// Unwraps a fixed-width counter into a monotonically increasing value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverCounter {
    modulus: u64,
    last_raw: Option<u64>,
    total: u64,
}

impl RolloverCounter {
    /// Counter for a field of `bits` width
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self::with_modulus(1 << bits)
    }

    /// Counter for a field that wraps at `modulus`
    ///
    /// For fields combining an integer and a fractional part, such as
    /// seconds plus 1/200 s.
    #[must_use]
    pub const fn with_modulus(modulus: u64) -> Self {
        Self {
            modulus,
            last_raw: None,
            total: 0,
        }
    }

    /// Counter for an 8-bit field
    #[must_use]
    pub const fn u8() -> Self {
        Self::new(8)
    }

    /// Counter for a 16-bit field
    #[must_use]
    pub const fn u16() -> Self {
        Self::new(16)
    }

    /// Feed a raw reading, returning the increase since the previous one
    ///
    /// The first reading seeds the counter and yields `None`.
    pub fn advance(&mut self, raw: u64) -> Option<u64> {
        let raw = raw % self.modulus;
        let delta = self.last_raw.map(|prev| {
            if raw >= prev {
                raw - prev
            } else {
                raw + self.modulus - prev
            }
        });

        match delta {
            Some(delta) => self.total += delta,
            None => self.total = raw,
        }
        self.last_raw = Some(raw);

        delta
    }

    /// Feed a raw reading, returning the unwrapped logical value
    pub fn update(&mut self, raw: u64) -> u64 {
        self.advance(raw);
        self.total
    }

    /// Current logical value, `None` before the first reading
    #[must_use]
    pub const fn value(&self) -> Option<u64> {
        match self.last_raw {
            Some(_) => Some(self.total),
            None => None,
        }
    }

    /// Last raw reading
    #[must_use]
    pub const fn last_raw(&self) -> Option<u64> {
        self.last_raw
    }

    /// Whether `raw` differs from the last raw reading
    #[must_use]
    pub fn is_new(&self, raw: u64) -> bool {
        self.last_raw != Some(raw % self.modulus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eight_bit_rollover_is_monotonic() {
        let mut counter = RolloverCounter::u8();
        let values: Vec<u64> = [250, 251, 252, 253, 254, 255, 0, 1]
            .into_iter()
            .map(|raw| counter.update(raw))
            .collect();

        assert_eq!(values, vec![250, 251, 252, 253, 254, 255, 256, 257]);
        assert!(values.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_advance_reports_deltas() {
        let mut counter = RolloverCounter::u16();
        assert_eq!(counter.advance(65530), None);
        assert_eq!(counter.advance(4), Some(10));
        assert_eq!(counter.advance(4), Some(0));
        assert_eq!(counter.value(), Some(65540));
    }

    #[test]
    fn test_wide_fields_wrap_at_width() {
        let mut counter = RolloverCounter::new(12);
        counter.update(4090);
        assert_eq!(counter.update(5), 4101);
        assert_eq!(counter.last_raw(), Some(5));
    }

    #[test]
    fn test_non_power_of_two_modulus() {
        let mut counter = RolloverCounter::with_modulus(51_200);
        counter.update(51_000);
        assert_eq!(counter.advance(100), Some(300));
    }

    #[test]
    fn test_is_new() {
        let mut counter = RolloverCounter::u8();
        assert!(counter.is_new(7));
        counter.update(7);
        assert!(!counter.is_new(7));
        assert!(counter.is_new(8));
        assert_eq!(RolloverCounter::u8().value(), None);
    }
}
