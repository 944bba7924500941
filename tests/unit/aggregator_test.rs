//! Unit tests for windowed aggregation over a recorded session.

use chrono::{DateTime, Duration, TimeZone, Utc};
use powertrack::metrics::calculator::read_through;
use powertrack::recording::types::{Reading, Scope};
use powertrack::{SessionStore, WindowedAggregator};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, 17, 30, 0).unwrap()
}

/// Ten one-second samples: power steps up by 10 W, distance by 10 m, energy by 0.25 kJ.
fn steady_session() -> SessionStore {
    let mut store = SessionStore::new();
    store.start(t0());
    for i in 0..10 {
        store.sample(
            &Reading {
                power: Some(100.0 + i as f64 * 10.0),
                cadence: Some(90.0),
                speed: Some(36.0),
                accumulated_distance: Some(i as f64 * 10.0),
                accumulated_energy: Some(i as f64 * 0.25),
                heart_rate: None,
                accumulated_heart_beats: None,
            },
            t0() + Duration::seconds(i + 1),
        );
    }
    store
}

#[test]
fn test_total_averages() {
    let store = steady_session();
    let aggregator = WindowedAggregator::new(&store);

    // The last sample closes the window and carries no weight
    let power = aggregator.power(Scope::Total);
    assert_eq!(power.max, 190.0);
    assert!((power.avg - 140.0).abs() < 1e-9);

    let cadence = aggregator.cadence(Scope::Total);
    assert!((cadence.avg - 90.0).abs() < 1e-9);
}

#[test]
fn test_accumulations_per_hour() {
    let store = steady_session();
    let aggregator = WindowedAggregator::new(&store);

    let distance = aggregator.distance(Scope::Total);
    assert!((distance.accumulated - 90.0).abs() < 1e-9);
    // 90 m over 9 s
    assert!((distance.per_hour - 36_000.0).abs() < 1e-6);

    let energy = aggregator.energy(Scope::Total);
    assert!((energy.accumulated - 2.25).abs() < 1e-9);
    assert!((energy.per_hour - 900.0).abs() < 1e-6);
}

#[test]
fn test_missing_column_aggregates_to_zero() {
    let store = steady_session();
    let aggregator = WindowedAggregator::new(&store);

    let heart_rate = aggregator.heart_rate(Scope::Total);
    assert_eq!(heart_rate.max, 0.0);
    assert_eq!(heart_rate.avg, 0.0);
}

#[test]
fn test_lap_scope_starts_at_lap_mark() {
    let mut store = steady_session();
    store.lap(t0() + Duration::milliseconds(10_500));
    for i in 0..3 {
        store.sample(
            &Reading {
                power: Some(300.0),
                accumulated_distance: Some(100.0 + i as f64 * 12.0),
                ..Default::default()
            },
            t0() + Duration::seconds(11 + i),
        );
    }

    let aggregator = WindowedAggregator::new(&store);
    let lap_power = aggregator.power(Scope::Lap);
    assert_eq!(lap_power.max, 300.0);
    assert!((lap_power.avg - 300.0).abs() < 1e-9);

    let lap_distance = aggregator.distance(Scope::Lap);
    assert!((lap_distance.accumulated - 24.0).abs() < 1e-9);

    // Total spans both laps: 0 m at the first sample to 124 m at the last
    let total_distance = aggregator.distance(Scope::Total);
    assert!((total_distance.accumulated - 124.0).abs() < 1e-9);
}

#[test]
fn test_empty_lap_is_zero() {
    let mut store = steady_session();
    store.lap(t0() + Duration::seconds(11));

    let aggregator = WindowedAggregator::new(&store);
    let power = aggregator.power(Scope::Lap);
    assert_eq!(power.max, 0.0);
    assert_eq!(power.avg, 0.0);
    assert_eq!(aggregator.distance(Scope::Lap).per_hour, 0.0);
}

#[test]
fn test_read_through_sub_window() {
    let values = [Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
    let elapsed = [0, 500, 1000, 1500];
    let walk = read_through(&values, &elapsed, 1, 2);

    assert_eq!(walk.start, 2.0);
    assert_eq!(walk.end, 3.0);
    assert!((walk.sum - 1.0).abs() < 1e-9);
    assert!((walk.total_dt - 0.5).abs() < 1e-9);
    assert!((walk.average() - 2.0).abs() < 1e-9);
}
