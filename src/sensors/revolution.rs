//! Revolution rate estimation from cumulative revolution/event-time counters.
//!
//! Wheel and crank data arrive as a pair of free-running counters: cumulative
//! revolutions and the time of the last revolution event. RPM comes from the
//! delta between two notifications, so the first notification after a
//! (re)connect only primes the estimator.

use std::f64::consts::PI;

/// Wheel radius in meters (700x18c).
pub const WHEEL_RADIUS_M: f64 = 0.311;

/// Wheel event time resolution (1/2048 s).
pub const WHEEL_TIME_RESOLUTION_HZ: u32 = 2048;

/// Crank event time resolution (1/1024 s).
pub const CRANK_TIME_RESOLUTION_HZ: u32 = 1024;

/// Event time counters are 16 bits wide.
const TIME_COUNTER_BITS: u32 = 16;

/// Rotating shaft an estimator tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shaft {
    /// Wheel: 32-bit revolution counter, zero RPM carried forward under load
    Wheel,
    /// Crank: 16-bit revolution counter, anomalies repeat the previous reading
    Crank,
}

impl Shaft {
    fn revolution_counter_bits(self) -> u32 {
        match self {
            Shaft::Wheel => 32,
            Shaft::Crank => 16,
        }
    }
}

/// Counter state kept between notifications for one shaft.
#[derive(Debug, Clone, PartialEq)]
pub struct RevolutionState {
    /// Most recent non-zero RPM
    pub last_non_zero_rpm: f64,
    /// No usable previous observation
    pub is_stale: bool,
    /// Previous cumulative revolution count
    pub prev_rev_count: Option<u32>,
    /// Previous event time count
    pub prev_time_count: Option<u16>,
}

impl Default for RevolutionState {
    fn default() -> Self {
        Self {
            last_non_zero_rpm: 0.0,
            is_stale: true,
            prev_rev_count: None,
            prev_time_count: None,
        }
    }
}

/// Turns successive (revolutions, event time) counter pairs into RPM.
#[derive(Debug, Clone)]
pub struct RevolutionRateEstimator {
    shaft: Shaft,
    state: RevolutionState,
    last_rpm: f64,
}

impl RevolutionRateEstimator {
    /// Create an estimator in the stale state.
    pub fn new(shaft: Shaft) -> Self {
        Self {
            shaft,
            state: RevolutionState::default(),
            last_rpm: 0.0,
        }
    }

    /// Estimator for the wheel.
    pub fn wheel() -> Self {
        Self::new(Shaft::Wheel)
    }

    /// Estimator for the crank.
    pub fn crank() -> Self {
        Self::new(Shaft::Crank)
    }

    /// Feed one counter pair and return the RPM for this notification.
    ///
    /// `under_load` signals that the drivetrain is still producing power; a
    /// zero wheel delta is then replaced by the last non-zero RPM.
    pub fn observe(
        &mut self,
        rev_count: u32,
        time_count: u16,
        time_resolution_hz: u32,
        under_load: bool,
    ) -> f64 {
        let previous = match (self.state.prev_rev_count, self.state.prev_time_count) {
            (Some(revs), Some(time)) if !self.state.is_stale => Some((revs, time)),
            _ => None,
        };

        self.state.prev_rev_count = Some(rev_count);
        self.state.prev_time_count = Some(time_count);

        let Some((prev_revs, prev_time)) = previous else {
            self.state.is_stale = false;
            self.last_rpm = 0.0;
            return 0.0;
        };

        let d_time = counter_delta(prev_time as u32, time_count as u32, TIME_COUNTER_BITS);
        let d_revs = counter_delta(prev_revs, rev_count, self.shaft.revolution_counter_bits());

        let rpm = match self.shaft {
            Shaft::Wheel => self.wheel_rpm(d_revs, d_time, time_resolution_hz, under_load),
            Shaft::Crank => self.crank_rpm(d_revs, d_time, time_resolution_hz),
        };

        self.last_rpm = rpm;
        rpm
    }

    fn wheel_rpm(&mut self, d_revs: i64, d_time: i64, resolution_hz: u32, under_load: bool) -> f64 {
        let mut rpm = 0.0;
        if d_time > 0 && d_revs >= 0 {
            rpm = raw_rpm(d_revs, d_time, resolution_hz);
            if rpm != 0.0 {
                self.state.last_non_zero_rpm = rpm;
            }
        } else if d_revs < 0 {
            tracing::debug!(d_revs, d_time, "Wheel revolution counter regressed");
        }

        if rpm == 0.0 && under_load {
            rpm = self.state.last_non_zero_rpm;
        }
        rpm
    }

    fn crank_rpm(&mut self, d_revs: i64, d_time: i64, resolution_hz: u32) -> f64 {
        if d_time > 0 && d_revs >= 0 {
            let rpm = raw_rpm(d_revs, d_time, resolution_hz);
            if rpm != 0.0 {
                self.state.last_non_zero_rpm = rpm;
            }
            rpm
        } else {
            tracing::debug!(d_revs, d_time, "Crank counter anomaly, keeping previous cadence");
            self.last_rpm
        }
    }

    /// Return to the stale state, forgetting counters and cached RPM.
    pub fn reset(&mut self) {
        self.state = RevolutionState::default();
        self.last_rpm = 0.0;
    }

    /// Current counter state.
    pub fn state(&self) -> &RevolutionState {
        &self.state
    }

    /// RPM returned by the latest observation.
    pub fn last_rpm(&self) -> f64 {
        self.last_rpm
    }

    /// Whether the next observation only primes the estimator.
    pub fn is_stale(&self) -> bool {
        self.state.is_stale
    }

    /// Shaft this estimator tracks.
    pub fn shaft(&self) -> Shaft {
        self.shaft
    }
}

fn raw_rpm(d_revs: i64, d_time: i64, resolution_hz: u32) -> f64 {
    resolution_hz as f64 * 60.0 * d_revs as f64 / d_time as f64
}

/// Signed difference between two readings of a `bits`-wide counter.
///
/// A negative step whose forward (modular) distance is under a quarter of the
/// counter range is a wrap-around; anything else is returned as-is so callers
/// can treat it as a regression.
pub fn counter_delta(prev: u32, current: u32, bits: u32) -> i64 {
    let raw = current as i64 - prev as i64;
    if raw >= 0 {
        return raw;
    }
    let range = 1i64 << bits;
    let forward = raw + range;
    if forward < range / 4 {
        forward
    } else {
        raw
    }
}

/// Convert wheel RPM to km/h.
pub fn wheel_speed_kmh(rpm: f64) -> f64 {
    rpm * 3.0 / 25.0 * PI * WHEEL_RADIUS_M
}

/// Distance covered by a cumulative wheel revolution count, in meters.
pub fn wheel_distance_m(revolutions: u32) -> f64 {
    revolutions as f64 * 2.0 * PI * WHEEL_RADIUS_M
}
