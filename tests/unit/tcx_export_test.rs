//! Unit tests for TCX export of multi-lap sessions.

use chrono::{DateTime, Duration, TimeZone, Utc};
use powertrack::recording::types::{ExportError, Reading};
use powertrack::recording::{export_tcx, export_tcx_to_file};
use powertrack::SessionStore;
use quick_xml::events::Event;
use quick_xml::Reader;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, 17, 30, 0).unwrap()
}

fn sample_at(store: &mut SessionStore, seconds: i64) {
    store.sample(
        &Reading {
            power: Some(200.0),
            cadence: Some(88.0),
            speed: Some(32.0),
            accumulated_distance: Some(seconds as f64 * 10.0),
            accumulated_energy: Some(seconds as f64),
            heart_rate: Some(150.0),
            accumulated_heart_beats: Some(seconds as f64 * 2.5),
        },
        t0() + Duration::seconds(seconds),
    );
}

/// Samples every second from 1 s to 10 s, lap at 5.5 s, stopped at 12 s.
fn two_lap_session() -> SessionStore {
    let mut store = SessionStore::new();
    store.start(t0());
    for i in 1..=5 {
        sample_at(&mut store, i);
    }
    store.lap(t0() + Duration::milliseconds(5500));
    for i in 6..=10 {
        sample_at(&mut store, i);
    }
    store.stop(t0() + Duration::seconds(12));
    store
}

fn element_texts(xml: &str, name: &[u8]) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut texts = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => inside = e.name().as_ref() == name,
            Ok(Event::Text(t)) if inside => {
                texts.push(t.unescape().unwrap().into_owned());
                inside = false;
            }
            Ok(Event::End(_)) => inside = false,
            Ok(Event::Eof) => break,
            Err(e) => panic!("invalid XML at {}: {}", reader.buffer_position(), e),
            _ => {}
        }
    }
    texts
}

#[test]
fn test_lap_times_add_up_to_session() {
    let store = two_lap_session();
    let xml = export_tcx(&store).unwrap();

    let totals: Vec<f64> = element_texts(&xml, b"TotalTimeSeconds")
        .iter()
        .map(|t| t.parse().unwrap())
        .collect();
    assert_eq!(totals, vec![5.5, 6.5]);

    let sum: f64 = totals.iter().sum();
    let duration = store.duration_ms().unwrap() as f64 / 1000.0;
    assert!((sum - duration).abs() <= 1.0);
}

#[test]
fn test_trackpoints_split_by_lap() {
    let xml = export_tcx(&two_lap_session()).unwrap();

    assert_eq!(xml.matches("<Lap ").count(), 2);
    assert_eq!(xml.matches("<Trackpoint>").count(), 10);
    assert!(xml.contains("<Lap StartTime=\"2024-06-02T17:30:05Z\">"));

    // Lap growth: 10 m to 50 m, then 60 m to 100 m
    let distances = element_texts(&xml, b"DistanceMeters");
    assert_eq!(distances[0], "40");
    // Trackpoints restart from 0 in every lap
    assert_eq!(distances.iter().filter(|d| d.as_str() == "0").count(), 2);

    // 4 kJ per lap
    let calories = element_texts(&xml, b"Calories");
    assert_eq!(calories, vec!["1", "1"]);
}

#[test]
fn test_trackpoint_child_order() {
    let xml = export_tcx(&two_lap_session()).unwrap();
    let trackpoint = xml
        .split("<Trackpoint>")
        .nth(1)
        .and_then(|rest| rest.split("</Trackpoint>").next())
        .unwrap();

    let order = ["<Time>", "<DistanceMeters>", "<HeartRateBpm>", "<Cadence>", "<Extensions>"];
    let positions: Vec<usize> = order
        .iter()
        .map(|tag| trackpoint.find(tag).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(trackpoint.contains("<ns3:Watts>200</ns3:Watts>"));
}

#[test]
fn test_empty_lap_has_no_track() {
    let mut store = SessionStore::new();
    store.start(t0());
    sample_at(&mut store, 1);
    store.lap(t0() + Duration::seconds(2));
    store.lap(t0() + Duration::seconds(3));
    sample_at(&mut store, 4);
    store.stop(t0() + Duration::seconds(5));

    let xml = export_tcx(&store).unwrap();
    assert_eq!(xml.matches("<Lap ").count(), 3);
    assert_eq!(xml.matches("<Track>").count(), 2);
    assert_eq!(
        element_texts(&xml, b"TotalTimeSeconds"),
        vec!["2.0", "1.0", "2.0"]
    );
}

#[test]
fn test_samples_past_session_end_are_corrupt() {
    let mut store = SessionStore::new();
    store.start(t0());
    sample_at(&mut store, 20);
    store.stop(t0() + Duration::seconds(10));

    assert!(matches!(
        export_tcx(&store),
        Err(ExportError::CorruptSession(_))
    ));
}

#[test]
fn test_unterminated_session_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ride.tcx");

    let mut store = SessionStore::new();
    store.start(t0());
    sample_at(&mut store, 1);

    let result = export_tcx_to_file(&store, &path);
    assert!(matches!(result, Err(ExportError::NotStopped)));
    assert!(!path.exists());

    store.stop(t0() + Duration::seconds(2));
    export_tcx_to_file(&store, &path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("<TrainingCenterDatabase"));
}
