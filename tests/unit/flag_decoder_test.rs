//! Unit tests for Cycling Power Measurement flag decoding.

use powertrack::sensors::flags::{
    combine_flag_bytes, decode_flags, FeatureFlag, FeatureFlagSet, HEADER_LEN,
};

#[test]
fn test_every_flag_value_re_encodes() {
    for value in 0..=u16::MAX {
        let set = FeatureFlagSet::from_bits(value);
        assert_eq!(set.to_bits(), value, "flag value {:#06x}", value);
    }
}

#[test]
fn test_offsets_at_least_header_and_non_decreasing() {
    for value in (0..=u16::MAX).step_by(7) {
        let set = FeatureFlagSet::from_bits(value);
        let mut previous = HEADER_LEN;
        for flag in FeatureFlag::ALL {
            if let Some(offset) = set.payload_offset(flag) {
                assert!(offset >= previous);
                previous = offset;
            }
        }
    }
}

#[test]
fn test_all_fields_present() {
    let set = FeatureFlagSet::from_bits(0x1FFF);
    // 1 + 0 + 2 + 0 + 6 + 4 + 4 + 4 + 3 + 2 + 2 + 2 + 0
    assert_eq!(set.payload_len(), HEADER_LEN + 30);
    assert_eq!(set.payload_offset(FeatureFlag::WheelRevolutionData), Some(7));
    assert_eq!(set.payload_offset(FeatureFlag::CrankRevolutionData), Some(13));
    assert_eq!(set.payload_offset(FeatureFlag::AccumulatedEnergy), Some(32));
}

#[test]
fn test_reserved_bits_kept_but_take_no_space() {
    let set = FeatureFlagSet::from_bits(0xE020);
    assert!(set.bit(13) && set.bit(14) && set.bit(15));
    assert_eq!(set.present().count(), 1);
    assert_eq!(set.payload_len(), HEADER_LEN + 4);
}

#[test]
fn test_flag_bytes_combined_decimally() {
    // Crank data only: bit 5 = 32
    assert_eq!(combine_flag_bytes(32, 0), 32);
    // Wheel + crank + energy = 2096 = 96 + 20 * 100
    let set = decode_flags(96, 20);
    assert!(set.contains(FeatureFlag::WheelRevolutionData));
    assert!(set.contains(FeatureFlag::CrankRevolutionData));
    assert!(set.contains(FeatureFlag::AccumulatedEnergy));
    assert_eq!(set.present().count(), 3);
}

#[test]
fn test_little_endian_reading_differs() {
    // 0x30 0x01 read little-endian would be 0x0130; decimally it is 148
    let set = decode_flags(0x30, 0x01);
    assert_eq!(set.to_bits(), 148);
}

#[test]
fn test_oversized_combination_is_empty() {
    // 255 + 255 * 100 fits in 16 bits; nothing larger can be produced
    assert_eq!(combine_flag_bytes(255, 255), 25_755);
    assert_eq!(FeatureFlagSet::from_raw(70_000), FeatureFlagSet::default());
}
