//! Unit tests for the session store: lap marks, scopes and maxima.

use chrono::{DateTime, Duration, TimeZone, Utc};
use powertrack::recording::types::{Reading, Scope};
use powertrack::SessionStore;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, 17, 30, 0).unwrap()
}

fn reading(power: f64, speed: Option<f64>, heart_rate: Option<f64>) -> Reading {
    Reading {
        power: Some(power),
        speed,
        heart_rate,
        ..Default::default()
    }
}

#[test]
fn test_lap_marks_and_lap_scope() {
    let mut store = SessionStore::new();
    store.start(t0());
    for i in 1..=5 {
        store.sample(&reading(200.0, Some(30.0), None), t0() + Duration::seconds(i));
    }
    store.lap(t0() + Duration::milliseconds(5500));

    assert_eq!(store.lap_marks_ms(), &[0, 5500]);
    assert_eq!(store.laps(), vec![0.0, 5.5]);
    assert_eq!(store.lap_start_index(), 5);
    assert!(store.rows(Scope::Lap).is_empty());

    store.sample(&reading(210.0, Some(31.0), None), t0() + Duration::seconds(6));
    assert_eq!(store.rows(Scope::Lap).len(), 1);
    assert_eq!(store.rows(Scope::Total).len(), 6);
    assert_eq!(store.rows(Scope::Lap)[0].elapsed_ms, 6000);
}

#[test]
fn test_lap_after_stop_is_noop() {
    let mut store = SessionStore::new();
    store.start(t0());
    store.sample(&reading(150.0, None, None), t0() + Duration::seconds(1));
    store.stop(t0() + Duration::seconds(2));
    store.lap(t0() + Duration::seconds(3));

    assert_eq!(store.lap_marks_ms(), &[0]);
    assert_eq!(store.duration_ms(), Some(2000));
}

#[test]
fn test_second_stop_keeps_first_end() {
    let mut store = SessionStore::new();
    store.stop(t0());
    assert_eq!(store.end_time(), None);

    store.start(t0());
    store.stop(t0() + Duration::seconds(10));
    store.stop(t0() + Duration::seconds(20));
    assert_eq!(store.end_time(), Some(t0() + Duration::seconds(10)));
    assert!(!store.is_sampling());
}

#[test]
fn test_maxima_ignore_zero_and_missing() {
    let mut store = SessionStore::new();
    store.start(t0());
    store.sample(&reading(0.0, Some(0.0), None), t0() + Duration::seconds(1));

    let max = store.max(Scope::Total);
    assert_eq!(max.power, 0.0);
    assert_eq!(max.speed, 0.0);
    assert_eq!(max.heart_rate, 0.0);

    store.sample(&reading(320.0, None, Some(171.0)), t0() + Duration::seconds(2));
    store.sample(&reading(280.0, Some(41.5), Some(165.0)), t0() + Duration::seconds(3));

    let max = store.max(Scope::Total);
    assert_eq!(max.power, 320.0);
    assert_eq!(max.speed, 41.5);
    assert_eq!(max.heart_rate, 171.0);
    assert_eq!(max.cadence, 0.0);
}

#[test]
fn test_lap_maxima_scoped_to_lap() {
    let mut store = SessionStore::new();
    store.start(t0());
    store.sample(&reading(400.0, Some(45.0), None), t0() + Duration::seconds(1));
    store.lap(t0() + Duration::seconds(2));
    store.sample(&reading(250.0, Some(33.0), None), t0() + Duration::seconds(3));

    assert_eq!(store.max(Scope::Total).power, 400.0);
    assert_eq!(store.max(Scope::Lap).power, 250.0);
    assert_eq!(store.max(Scope::Lap).speed, 33.0);
}

#[test]
fn test_snapshot_serializes_camel_case() {
    let mut store = SessionStore::new();
    store.start(t0());
    store.sample(
        &Reading {
            power: Some(190.0),
            accumulated_distance: Some(12.5),
            ..Default::default()
        },
        t0() + Duration::seconds(1),
    );

    let value = serde_json::to_value(store.snapshot()).unwrap();
    assert!(value.get("startTime").is_some());
    assert_eq!(value["accumulatedDistance"][0], 12.5);
    assert_eq!(value["time"][0], 1000);
    assert_eq!(value["laps"][0], 0.0);
    assert!(value["heartRate"][0].is_null());
}
