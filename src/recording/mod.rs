//! Recording module for session capture and export.

pub mod exporter_json;
pub mod exporter_tcx;
pub mod recorder;
pub mod runner;
pub mod session;
pub mod types;

pub use exporter_json::{export_json, export_json_to_file};
pub use exporter_tcx::{export_tcx, export_tcx_to_file, generate_tcx_filename};
pub use recorder::RideRecorder;
pub use runner::{SessionCommand, SessionRunner};
pub use session::SessionStore;
pub use types::{
    ExportError, Reading, RecorderError, RecordingStatus, RideSample, Scope, SessionSnapshot,
    SessionStats,
};
