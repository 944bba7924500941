//! Single-writer session loop.
//!
//! One thread owns the [`RideRecorder`]. Sensor events, user commands and the
//! sampling tick are multiplexed with `crossbeam::select!`, so decoder and
//! session state are only ever touched from that thread.

use crate::recording::recorder::RideRecorder;
use crate::recording::types::SessionStats;
use crate::sensors::types::SensorEvent;
use chrono::Utc;
use crossbeam::channel::{Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Default sampling period.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(490);

/// Requests handled by the session loop.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    Lap,
    Stop,
    /// Discard the current session
    NewSession,
    /// Reply with current stats
    Stats(Sender<SessionStats>),
    /// Leave the loop and hand back the recorder
    Shutdown,
}

pub struct SessionRunner;

impl SessionRunner {
    /// Run the loop on the calling thread until `Shutdown` arrives or the
    /// command channel closes. A closed event channel only stops event delivery.
    pub fn run(
        mut recorder: RideRecorder,
        events: Receiver<SensorEvent>,
        commands: Receiver<SessionCommand>,
        period: Duration,
    ) -> RideRecorder {
        let ticker = crossbeam::channel::tick(period);
        let mut events = events;
        let mut events_closed = false;

        tracing::debug!(period_ms = period.as_millis() as u64, "Session loop running");

        loop {
            crossbeam::select! {
                recv(events) -> event => match event {
                    Ok(event) => recorder.handle_event(&event),
                    Err(_) => events_closed = true,
                },
                recv(commands) -> command => match command {
                    Ok(SessionCommand::Shutdown) | Err(_) => break,
                    Ok(command) => Self::apply(&mut recorder, command),
                },
                recv(ticker) -> _ => {
                    recorder.tick(Utc::now());
                }
            }

            if events_closed {
                tracing::info!("Sensor event channel closed");
                events = crossbeam::channel::never();
                events_closed = false;
            }
        }

        tracing::debug!("Session loop stopped");
        recorder
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(
        recorder: RideRecorder,
        events: Receiver<SensorEvent>,
        commands: Receiver<SessionCommand>,
        period: Duration,
    ) -> JoinHandle<RideRecorder> {
        std::thread::spawn(move || Self::run(recorder, events, commands, period))
    }

    fn apply(recorder: &mut RideRecorder, command: SessionCommand) {
        let now = Utc::now();
        let result = match command {
            SessionCommand::Start => recorder.start(now),
            SessionCommand::Pause => recorder.pause(),
            SessionCommand::Resume => recorder.resume(),
            SessionCommand::Lap => recorder.lap(now),
            SessionCommand::Stop => recorder.stop(now),
            SessionCommand::NewSession => {
                recorder.new_session();
                Ok(())
            }
            SessionCommand::Stats(reply) => {
                let _ = reply.send(recorder.stats());
                Ok(())
            }
            SessionCommand::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            tracing::warn!("Session command rejected: {}", e);
        }
    }
}
