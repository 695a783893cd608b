//! Half-precision speed values used by the traction protocol.
//!
//! Speeds travel as IEEE 754 binary16 in meters per second; the sign bit
//! carries the direction, so `-0.0` means stopped in reverse.

use std::fmt;

const SIGN: u16 = 0x8000;
const EXPONENT: u16 = 0x7C00;
const MANTISSA: u16 = 0x03FF;
const QUIET_NAN: u16 = 0x0200;

/// IEEE 754 half-precision value kept as its raw bits.
///
/// # Examples
/// ```
/// use openlcb_core::throttle::Float16;
///
/// assert_eq!(Float16::from_f32(1.0).bits(), 0x3C00);
/// assert_eq!(Float16::from_bits(0xC000).to_f32(), -2.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Float16(u16);

impl Float16 {
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn from_be_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub const fn is_reverse(self) -> bool {
        self.0 & SIGN != 0
    }

    /// Round to nearest even; magnitudes past 65504 become infinity.
    pub fn from_f32(value: f32) -> Self {
        let bits = value.to_bits();
        let sign = ((bits >> 16) & u32::from(SIGN)) as u16;
        let exponent = ((bits >> 23) & 0xFF) as i32;
        let mantissa = bits & 0x007F_FFFF;

        if exponent == 0xFF {
            let nan = if mantissa != 0 { QUIET_NAN } else { 0 };
            return Self(sign | EXPONENT | nan);
        }

        let half_exponent = exponent - 127 + 15;
        if half_exponent >= 0x1F {
            return Self(sign | EXPONENT);
        }
        if half_exponent <= 0 {
            if half_exponent < -10 {
                return Self(sign);
            }
            let full = mantissa | 0x0080_0000;
            let shift = (14 - half_exponent) as u32;
            return Self(sign | round_shifted(full, shift) as u16);
        }

        let truncated = ((half_exponent as u32) << 10) | (mantissa >> 13);
        let rest = mantissa & 0x1FFF;
        let rounded = if rest > 0x1000 || (rest == 0x1000 && truncated & 1 == 1) {
            truncated + 1
        } else {
            truncated
        };
        Self(sign | rounded as u16)
    }

    pub fn to_f32(self) -> f32 {
        let sign = u32::from(self.0 & SIGN) << 16;
        let exponent = u32::from((self.0 & EXPONENT) >> 10);
        let mantissa = u32::from(self.0 & MANTISSA);

        let bits = match (exponent, mantissa) {
            (0, 0) => sign,
            (0, mut mantissa) => {
                let mut exponent: u32 = 127 - 15 + 1;
                while mantissa & 0x0400 == 0 {
                    mantissa <<= 1;
                    exponent -= 1;
                }
                sign | (exponent << 23) | ((mantissa & u32::from(MANTISSA)) << 13)
            }
            (0x1F, mantissa) => sign | 0x7F80_0000 | (mantissa << 13),
            (exponent, mantissa) => sign | ((exponent + 127 - 15) << 23) | (mantissa << 13),
        };
        f32::from_bits(bits)
    }
}

fn round_shifted(value: u32, shift: u32) -> u32 {
    let truncated = value >> shift;
    let rest = value & ((1 << shift) - 1);
    let halfway = 1 << (shift - 1);
    if rest > halfway || (rest == halfway && truncated & 1 == 1) {
        truncated + 1
    } else {
        truncated
    }
}

impl From<f32> for Float16 {
    fn from(value: f32) -> Self {
        Self::from_f32(value)
    }
}

impl From<Float16> for f32 {
    fn from(value: Float16) -> Self {
        value.to_f32()
    }
}

impl fmt::Display for Float16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::Float16;

    #[test]
    fn encodes_reference_values() {
        assert_eq!(Float16::from_f32(0.0).bits(), 0x0000);
        assert_eq!(Float16::from_f32(-0.0).bits(), 0x8000);
        assert_eq!(Float16::from_f32(1.0).bits(), 0x3C00);
        assert_eq!(Float16::from_f32(2.0).bits(), 0x4000);
        assert_eq!(Float16::from_f32(-2.0).bits(), 0xC000);
        assert_eq!(Float16::from_f32(65504.0).bits(), 0x7BFF);
        assert_eq!(Float16::from_f32(1.0 / 3.0).bits(), 0x3555);
    }

    #[test]
    fn decodes_reference_values() {
        assert_eq!(Float16::from_bits(0x0000).to_f32(), 0.0);
        assert_eq!(Float16::from_bits(0x3C00).to_f32(), 1.0);
        assert_eq!(Float16::from_bits(0x4000).to_f32(), 2.0);
        assert_eq!(Float16::from_bits(0xC000).to_f32(), -2.0);
        assert_eq!(Float16::from_bits(0x7BFF).to_f32(), 65504.0);
        assert!(Float16::from_bits(0x8000).is_reverse());
    }

    #[test]
    fn overflow_and_nan() {
        assert_eq!(Float16::from_f32(1.0e6).bits(), 0x7C00);
        assert_eq!(Float16::from_f32(-1.0e6).bits(), 0xFC00);
        assert!(Float16::from_f32(f32::NAN).to_f32().is_nan());
        assert_eq!(Float16::from_f32(1.0e-10).bits(), 0x0000);
    }

    #[test]
    fn subnormals() {
        let smallest = Float16::from_bits(0x0001);
        assert_eq!(smallest.to_f32(), 2.0f32.powi(-24));
        assert_eq!(Float16::from_f32(2.0f32.powi(-24)).bits(), 0x0001);
    }

    proptest! {
        #[test]
        fn finite_bits_survive_conversion(bits in 0u16..0x7C00, negative in any::<bool>()) {
            let bits = if negative { bits | 0x8000 } else { bits };
            prop_assert_eq!(Float16::from_f32(Float16::from_bits(bits).to_f32()).bits(), bits);
        }
    }
}
