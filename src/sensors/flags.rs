//! Cycling Power Measurement (0x2A63) flag field decoding.
//!
//! The flag field announces which optional fields follow the fixed header
//! (2 bytes flags + 2 bytes instantaneous power). Optional fields are packed
//! in bit order, so the byte offset of a field depends on every lower flag
//! that is set and must be recomputed for each notification.

/// Length of the fixed header preceding the optional fields.
pub const HEADER_LEN: usize = 4;

/// Number of bits in the flag field.
const FLAG_BITS: usize = 16;

/// Optional fields of the Cycling Power Measurement, in flag bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlag {
    /// Pedal power balance, 1/2 percent (bit 0)
    PedalPowerBalance,
    /// Balance refers to the left pedal (bit 1, no payload)
    PedalPowerBalanceReference,
    /// Accumulated torque, 1/32 Nm (bit 2)
    AccumulatedTorque,
    /// Torque source is the crank (bit 3, no payload)
    AccumulatedTorqueSource,
    /// Cumulative wheel revolutions (u32) + last wheel event time (u16, 1/2048 s) (bit 4)
    WheelRevolutionData,
    /// Cumulative crank revolutions (u16) + last crank event time (u16, 1/1024 s) (bit 5)
    CrankRevolutionData,
    /// Max/min force magnitudes (bit 6)
    ExtremeForceMagnitudes,
    /// Max/min torque magnitudes (bit 7)
    ExtremeTorqueMagnitudes,
    /// Packed 12-bit max/min angles (bit 8)
    ExtremeAngles,
    /// Top dead spot angle (bit 9)
    TopDeadSpotAngle,
    /// Bottom dead spot angle (bit 10)
    BottomDeadSpotAngle,
    /// Accumulated energy, kJ (bit 11)
    AccumulatedEnergy,
    /// Offset compensation indicator (bit 12, no payload)
    OffsetCompensationIndicator,
}

impl FeatureFlag {
    /// All defined flags in bit order. Bits 13-15 are reserved.
    pub const ALL: [FeatureFlag; 13] = [
        FeatureFlag::PedalPowerBalance,
        FeatureFlag::PedalPowerBalanceReference,
        FeatureFlag::AccumulatedTorque,
        FeatureFlag::AccumulatedTorqueSource,
        FeatureFlag::WheelRevolutionData,
        FeatureFlag::CrankRevolutionData,
        FeatureFlag::ExtremeForceMagnitudes,
        FeatureFlag::ExtremeTorqueMagnitudes,
        FeatureFlag::ExtremeAngles,
        FeatureFlag::TopDeadSpotAngle,
        FeatureFlag::BottomDeadSpotAngle,
        FeatureFlag::AccumulatedEnergy,
        FeatureFlag::OffsetCompensationIndicator,
    ];

    /// Bit position in the flag field.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Payload bytes occupied when the flag is set.
    pub fn field_size(self) -> usize {
        match self {
            FeatureFlag::PedalPowerBalance => 1,
            FeatureFlag::PedalPowerBalanceReference => 0,
            FeatureFlag::AccumulatedTorque => 2,
            FeatureFlag::AccumulatedTorqueSource => 0,
            FeatureFlag::WheelRevolutionData => 6,
            FeatureFlag::CrankRevolutionData => 4,
            FeatureFlag::ExtremeForceMagnitudes => 4,
            FeatureFlag::ExtremeTorqueMagnitudes => 4,
            FeatureFlag::ExtremeAngles => 3,
            FeatureFlag::TopDeadSpotAngle => 2,
            FeatureFlag::BottomDeadSpotAngle => 2,
            FeatureFlag::AccumulatedEnergy => 2,
            FeatureFlag::OffsetCompensationIndicator => 0,
        }
    }

    /// Flag at the given bit position, if one is defined there.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Combine the two flag bytes of a notification into the flag value.
///
/// Upstream peripherals are read as `byte0 + byte1 * 100`, not as a
/// little-endian u16. This must stay bit-for-bit compatible.
pub fn combine_flag_bytes(byte0: u8, byte1: u8) -> u32 {
    byte0 as u32 + byte1 as u32 * 100
}

/// Decoded flag field: one boolean per bit, bit 0 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlagSet {
    bits: [bool; FLAG_BITS],
}

impl FeatureFlagSet {
    /// Expand a 16-bit flag value.
    pub fn from_bits(value: u16) -> Self {
        let mut bits = [false; FLAG_BITS];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = (value >> i) & 1 == 1;
        }
        Self { bits }
    }

    /// Expand an unchecked flag value. Anything outside 0..=0xFFFF yields an
    /// empty set.
    pub fn from_raw(value: u32) -> Self {
        match u16::try_from(value) {
            Ok(bits) => Self::from_bits(bits),
            Err(_) => Self::default(),
        }
    }

    /// Re-encode the set into its 16-bit flag value.
    pub fn to_bits(&self) -> u16 {
        self.bits
            .iter()
            .enumerate()
            .fold(0u16, |acc, (i, &set)| if set { acc | (1 << i) } else { acc })
    }

    /// Whether the given field is announced.
    pub fn contains(&self, flag: FeatureFlag) -> bool {
        self.bit(flag.index())
    }

    /// Raw bit lookup; out-of-range indices are unset.
    pub fn bit(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    /// Announced fields in payload order.
    pub fn present(&self) -> impl Iterator<Item = FeatureFlag> + '_ {
        (0..FLAG_BITS)
            .filter(move |&index| self.bit(index))
            .filter_map(FeatureFlag::from_index)
    }

    /// Byte offset of a field inside the payload, or `None` when its flag is unset.
    pub fn payload_offset(&self, flag: FeatureFlag) -> Option<usize> {
        if !self.contains(flag) {
            return None;
        }
        let preceding: usize = self
            .present()
            .take_while(|present| present.index() < flag.index())
            .map(FeatureFlag::field_size)
            .sum();
        Some(HEADER_LEN + preceding)
    }

    /// Payload length required to hold every announced field.
    pub fn payload_len(&self) -> usize {
        HEADER_LEN + self.present().map(FeatureFlag::field_size).sum::<usize>()
    }
}

/// Decode the flag bytes of a Cycling Power Measurement notification.
pub fn decode_flags(byte0: u8, byte1: u8) -> FeatureFlagSet {
    FeatureFlagSet::from_raw(combine_flag_bytes(byte0, byte1))
}
