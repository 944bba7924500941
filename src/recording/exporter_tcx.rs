//! TCX export of a finished session.
//!
//! One `<Lap>` per lap mark. Trackpoints are assigned to laps in stored order
//! while their elapsed time stays within the lap window; trackpoint distance is
//! relative to the lap's first sample. Missing values are left out of the
//! trackpoint.

use crate::metrics::units::joule_to_cal;
use crate::recording::session::SessionStore;
use crate::recording::types::{ExportError, RideSample};
use chrono::{DateTime, Duration, TimeZone, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

/// TCX XML namespaces
const NS_TCX: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const NS_TPX: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2 http://www.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd";

/// UTC timestamp truncated to whole seconds.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn xml_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::XmlError(e.to_string())
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Export a stopped session to TCX.
pub fn export_tcx(store: &SessionStore) -> Result<String, ExportError> {
    let start_time = store.start_time().ok_or(ExportError::NotStarted)?;
    let end_time = store.end_time().ok_or(ExportError::NotStopped)?;
    if store.is_empty() {
        return Err(ExportError::NoData);
    }

    let session_end_ms = (end_time - start_time).num_milliseconds();
    let samples = store.samples();
    let marks = store.lap_marks_ms();

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let mut root = BytesStart::new("TrainingCenterDatabase");
    root.push_attribute(("xmlns", NS_TCX));
    root.push_attribute(("xmlns:ns3", NS_TPX));
    root.push_attribute(("xmlns:xsi", NS_XSI));
    root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    writer.write_event(Event::Start(root)).map_err(xml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("Activities")))
        .map_err(xml_error)?;

    let mut activity = BytesStart::new("Activity");
    activity.push_attribute(("Sport", "Biking"));
    writer.write_event(Event::Start(activity)).map_err(xml_error)?;

    write_element(&mut writer, "Id", &format_time(start_time))?;

    let mut cursor = 0;
    for (i, &lap_start_ms) in marks.iter().enumerate() {
        let lap_end_ms = marks.get(i + 1).copied().unwrap_or(session_end_ms);

        let first = cursor;
        while cursor < samples.len() && samples[cursor].elapsed_ms <= lap_end_ms {
            cursor += 1;
        }

        let window = LapWindow {
            start_time: start_time + Duration::milliseconds(lap_start_ms),
            duration_ms: lap_end_ms - lap_start_ms,
            rows: &samples[first..cursor],
        };
        write_lap(&mut writer, start_time, &window)?;
    }

    if cursor < samples.len() {
        tracing::error!(
            exported = cursor,
            stored = samples.len(),
            "Samples beyond the last lap, aborting export"
        );
        return Err(ExportError::CorruptSession(format!(
            "{} of {} samples fall outside the session",
            samples.len() - cursor,
            samples.len()
        )));
    }

    writer
        .write_event(Event::End(BytesEnd::new("Activity")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("Activities")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("TrainingCenterDatabase")))
        .map_err(xml_error)?;

    let result = writer.into_inner().into_inner();
    let xml = String::from_utf8(result).map_err(xml_error)?;

    tracing::info!(laps = marks.len(), samples = samples.len(), "Session exported to TCX");
    Ok(xml)
}

/// Rows and timing of one lap.
struct LapWindow<'a> {
    start_time: DateTime<Utc>,
    duration_ms: i64,
    rows: &'a [RideSample],
}

impl LapWindow<'_> {
    /// Growth of an accumulating column between the first and last row.
    fn growth(&self, column: impl Fn(&RideSample) -> Option<f64>) -> f64 {
        let start = self.rows.first().and_then(&column);
        let end = self.rows.last().and_then(&column);
        match (start, end) {
            (Some(start), Some(end)) => end - start,
            _ => 0.0,
        }
    }
}

fn write_lap<W: std::io::Write>(
    writer: &mut Writer<W>,
    session_start: DateTime<Utc>,
    lap: &LapWindow<'_>,
) -> Result<(), ExportError> {
    let mut element = BytesStart::new("Lap");
    element.push_attribute(("StartTime", format_time(lap.start_time).as_str()));
    writer.write_event(Event::Start(element)).map_err(xml_error)?;

    let distance = lap.growth(|s| s.accumulated_distance);
    let energy_kj = lap.growth(|s| s.accumulated_energy);

    write_element(
        writer,
        "TotalTimeSeconds",
        &format!("{:.1}", lap.duration_ms as f64 / 1000.0),
    )?;
    write_element(writer, "DistanceMeters", &format!("{}", distance.round()))?;
    write_element(
        writer,
        "Calories",
        &format!("{}", joule_to_cal(energy_kj).round()),
    )?;
    write_element(writer, "Intensity", "Active")?;
    write_element(writer, "TriggerMethod", "Manual")?;

    if !lap.rows.is_empty() {
        let start_distance = lap
            .rows
            .first()
            .and_then(|s| s.accumulated_distance)
            .unwrap_or(0.0);

        writer
            .write_event(Event::Start(BytesStart::new("Track")))
            .map_err(xml_error)?;
        for sample in lap.rows {
            write_trackpoint(writer, session_start, start_distance, sample)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("Track")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("Lap")))
        .map_err(xml_error)?;
    Ok(())
}

fn write_trackpoint<W: std::io::Write>(
    writer: &mut Writer<W>,
    session_start: DateTime<Utc>,
    start_distance: f64,
    sample: &RideSample,
) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new("Trackpoint")))
        .map_err(xml_error)?;

    let time = session_start + Duration::milliseconds(sample.elapsed_ms);
    write_element(writer, "Time", &format_time(time))?;

    if let Some(distance) = sample.accumulated_distance {
        write_element(
            writer,
            "DistanceMeters",
            &format!("{}", (distance - start_distance).floor()),
        )?;
    }

    if let Some(hr) = sample.heart_rate {
        write_heart_rate_element(writer, "HeartRateBpm", hr.round() as u16)?;
    }

    if let Some(cadence) = sample.cadence {
        write_element(writer, "Cadence", &format!("{}", cadence.round()))?;
    }

    writer
        .write_event(Event::Start(BytesStart::new("Extensions")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("ns3:TPX")))
        .map_err(xml_error)?;
    write_element(writer, "ns3:Watts", &format!("{}", sample.power.round()))?;
    writer
        .write_event(Event::End(BytesEnd::new("ns3:TPX")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("Extensions")))
        .map_err(xml_error)?;

    writer
        .write_event(Event::End(BytesEnd::new("Trackpoint")))
        .map_err(xml_error)?;
    Ok(())
}

/// Write a simple element with text content.
fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

/// Write a heart rate element with Value sub-element.
fn write_heart_rate_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: u16,
) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    write_element(writer, "Value", &value.to_string())?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

/// Export a session to TCX and write it to a file. Nothing is written when
/// the export fails.
pub fn export_tcx_to_file(store: &SessionStore, path: &std::path::Path) -> Result<(), ExportError> {
    let content = export_tcx(store)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Default file name for a session export, `YYYY_MM_DD_HHMM_activity.tcx`.
pub fn generate_tcx_filename<Tz: TimeZone>(start: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_activity.tcx", start.format("%Y_%m_%d_%H%M"))
}
