//! Mock power meter and heart rate strap.
//!
//! Generates notification payloads the way real peripherals lay them out,
//! including the decimal flag byte encoding, with free-running counters that
//! advance one second per packet.

use chrono::{DateTime, Utc};
use powertrack::sensors::heart_rate::HeartRateDecoder;
use powertrack::sensors::power::PowerMeterDecoder;
use powertrack::sensors::revolution::{wheel_distance_m, wheel_speed_kmh};
use powertrack::sensors::types::{SensorEvent, SensorType};

/// Wheel and crank revolution data present
const FLAGS_REVOLUTIONS: u16 = 0x0030;
/// Wheel, crank and accumulated energy present
const FLAGS_REVOLUTIONS_ENERGY: u16 = 0x0830;

/// Mock Cycling Power peripheral.
pub struct MockBike {
    /// Instantaneous power in watts
    pub power: i16,
    /// Wheel revolutions added per packet
    pub wheel_revs_per_packet: u32,
    /// Crank revolutions added per packet
    pub crank_revs_per_packet: u16,
    /// Reported accumulated energy, if the peripheral sends it
    pub energy_kj: Option<u16>,
    wheel_revs: u32,
    wheel_time: u16,
    crank_revs: u16,
    crank_time: u16,
}

impl Default for MockBike {
    fn default() -> Self {
        Self {
            power: 200,
            // 300 wheel RPM, 60 crank RPM
            wheel_revs_per_packet: 5,
            crank_revs_per_packet: 1,
            energy_kj: None,
            wheel_revs: 1000,
            wheel_time: 0,
            crank_revs: 500,
            crank_time: 0,
        }
    }
}

impl MockBike {
    /// Start the event time counters at the given values.
    pub fn with_event_times(wheel_time: u16, crank_time: u16) -> Self {
        Self {
            wheel_time,
            crank_time,
            ..Self::default()
        }
    }

    /// Cumulative wheel revolutions in the next packet.
    pub fn wheel_revolutions(&self) -> u32 {
        self.wheel_revs
    }

    /// Build the next Cycling Power Measurement and advance one second.
    pub fn next_packet(&mut self) -> Vec<u8> {
        let flags = if self.energy_kj.is_some() {
            FLAGS_REVOLUTIONS_ENERGY
        } else {
            FLAGS_REVOLUTIONS
        };

        let mut data = vec![(flags % 100) as u8, (flags / 100) as u8];
        data.extend_from_slice(&self.power.to_le_bytes());
        data.extend_from_slice(&self.wheel_revs.to_le_bytes());
        data.extend_from_slice(&self.wheel_time.to_le_bytes());
        data.extend_from_slice(&self.crank_revs.to_le_bytes());
        data.extend_from_slice(&self.crank_time.to_le_bytes());
        if let Some(energy) = self.energy_kj {
            data.extend_from_slice(&energy.to_le_bytes());
        }

        self.wheel_revs = self.wheel_revs.wrapping_add(self.wheel_revs_per_packet);
        self.wheel_time = self.wheel_time.wrapping_add(2048);
        self.crank_revs = self.crank_revs.wrapping_add(self.crank_revs_per_packet);
        self.crank_time = self.crank_time.wrapping_add(1024);
        data
    }

    /// Next packet wrapped as a transport notification.
    pub fn notification(&mut self, received_at: DateTime<Utc>) -> SensorEvent {
        SensorEvent::Notification {
            sensor_type: SensorType::PowerMeter,
            data: self.next_packet(),
            received_at,
        }
    }
}

/// Mock heart rate strap.
pub struct MockStrap {
    pub heart_rate: u16,
}

impl Default for MockStrap {
    fn default() -> Self {
        Self { heart_rate: 150 }
    }
}

impl MockStrap {
    /// Heart Rate Measurement, 8-bit when the value fits.
    pub fn packet(&self) -> Vec<u8> {
        match u8::try_from(self.heart_rate) {
            Ok(bpm) => vec![0x00, bpm],
            Err(_) => {
                let mut data = vec![0x01];
                data.extend_from_slice(&self.heart_rate.to_le_bytes());
                data
            }
        }
    }

    pub fn notification(&self, received_at: DateTime<Utc>) -> SensorEvent {
        SensorEvent::Notification {
            sensor_type: SensorType::HeartRate,
            data: self.packet(),
            received_at,
        }
    }
}

#[test]
fn test_mock_bike_packet_layout() {
    let mut bike = MockBike::default();
    let data = bike.next_packet();

    // 0x0030 = 48 encodes as [48, 0]
    assert_eq!(&data[..2], &[48, 0]);
    assert_eq!(data.len(), 14);

    bike.energy_kj = Some(12);
    let data = bike.next_packet();
    // 0x0830 = 2096 encodes as [96, 20]
    assert_eq!(&data[..2], &[96, 20]);
    assert_eq!(data.len(), 16);
}

#[test]
fn test_mock_bike_stream_decoding() {
    let mut bike = MockBike::default();
    let mut decoder = PowerMeterDecoder::new();

    let first = decoder.decode(&bike.next_packet(), 0);
    assert_eq!(first.power, 200.0);
    assert_eq!(first.speed_kmh, 0.0);
    assert_eq!(first.cadence_rpm, 0.0);

    let revs = bike.wheel_revolutions();
    let second = decoder.decode(&bike.next_packet(), 1000);
    assert!((second.speed_kmh - wheel_speed_kmh(300.0)).abs() < 1e-9);
    assert!((second.cadence_rpm - 60.0).abs() < 1e-9);
    assert!((second.accumulated_distance_m - wheel_distance_m(revs)).abs() < 1e-9);
    assert!((second.accumulated_energy_kj - 0.2).abs() < 1e-9);
}

#[test]
fn test_mock_bike_event_time_wrap() {
    let mut bike = MockBike::with_event_times(64_000, 64_800);
    let mut decoder = PowerMeterDecoder::new();

    for i in 0..4 {
        let sample = decoder.decode(&bike.next_packet(), i * 1000);
        if i > 0 {
            assert!((sample.speed_kmh - wheel_speed_kmh(300.0)).abs() < 1e-9);
            assert!((sample.cadence_rpm - 60.0).abs() < 1e-9);
        }
    }
}

#[test]
fn test_mock_bike_reported_energy() {
    let mut bike = MockBike {
        energy_kj: Some(37),
        ..MockBike::default()
    };
    let mut decoder = PowerMeterDecoder::new();

    decoder.decode(&bike.next_packet(), 0);
    decoder.decode(&bike.next_packet(), 1000);
    assert_eq!(decoder.accumulated_energy_kj(), 37.0);
}

#[test]
fn test_mock_strap_decoding() {
    let mut decoder = HeartRateDecoder::new();
    let mut strap = MockStrap::default();

    decoder.decode(&strap.packet(), 0);
    strap.heart_rate = 300;
    let sample = decoder.decode(&strap.packet(), 2000);

    // 150 bpm held for 2 s
    assert_eq!(sample.accumulated_heart_beats, 5);
    assert_eq!(sample.heart_rate_bpm, Some(300));
}
