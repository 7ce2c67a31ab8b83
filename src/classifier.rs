// FallGuard - Fall suspicion state machine
//
// Four heuristics are fused per accelerometer sample, in priority order:
//
// 1. free-fall followed by an impact inside a short window,
// 2. a fresh change to a lying posture plus a moderate impact,
// 3. a single very high impact,
// 4. sustained high acceleration variance with fast rotation (tumbling).
//
// The first heuristic that fires moves the machine to
// DetectionState::Suspected; from there the caller runs the immobility
// check and calls FallClassifier::reset with the verdict.

use crate::config::{FallConfig, STANDARD_GRAVITY};
use crate::events::Trigger;
use crate::history::MotionHistory;
use crate::orientation::OrientationTracker;

/// Share of the impact threshold that counts when the posture just changed.
const ORIENTATION_IMPACT_FACTOR: f64 = 0.7;
/// Multiple of the impact threshold that needs no other evidence.
const HIGH_IMPACT_FACTOR: f64 = 1.5;
/// Multiple of the gyro threshold the mean rotation rate must exceed.
const TUMBLING_GYRO_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    Idle,
    InFreeFall { start_ms: u64 },
    AwaitingImpact { freefall_end_ms: u64 },
    Suspected { suspect_ms: u64 },
}

/// Context captured when a heuristic fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suspicion {
    pub trigger: Trigger,
    pub acceleration_magnitude: f64,
    pub gyro_magnitude: f64,
    pub suspect_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FallClassifier {
    free_fall_threshold: f64,
    impact_threshold: f64,
    free_fall_min_duration_ms: u64,
    impact_window_ms: u64,
    tumbling_variance_threshold: f64,
    gyro_threshold: f64,

    state: DetectionState,
    accel_history: MotionHistory,
    gyro_history: MotionHistory,
}

impl FallClassifier {
    pub fn new(config: &FallConfig) -> Self {
        Self {
            free_fall_threshold: config.free_fall_threshold,
            impact_threshold: config.impact_threshold,
            free_fall_min_duration_ms: config.free_fall_min_duration_ms,
            impact_window_ms: config.impact_window_ms,
            tumbling_variance_threshold: config.tumbling_variance_threshold,
            gyro_threshold: config.gyro_threshold,
            state: DetectionState::Idle,
            accel_history: MotionHistory::new(config.history_capacity, STANDARD_GRAVITY),
            gyro_history: MotionHistory::new(config.history_capacity, 0.0),
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Append one accelerometer/gyro pair to the classification window.
    ///
    /// Runs for every accelerometer sample, including those that arrive
    /// during cooldown or verification, so the window is warm afterwards.
    pub fn record(&mut self, accel_magnitude: f64, gyro_magnitude: f64) {
        self.accel_history.push(accel_magnitude);
        self.gyro_history.push(gyro_magnitude);
    }

    /// Run the heuristics on one filtered magnitude `m`.
    ///
    /// Returns the suspicion if one was raised. Never raises while already
    /// suspected; at most one suspicion per sample.
    pub fn evaluate(
        &mut self,
        m: f64,
        gyro_magnitude: f64,
        now_ms: u64,
        orientation: &OrientationTracker,
    ) -> Option<Suspicion> {
        if matches!(self.state, DetectionState::Suspected { .. }) {
            return None;
        }

        // 1. free-fall -> impact
        if let DetectionState::AwaitingImpact { freefall_end_ms } = self.state {
            if now_ms.saturating_sub(freefall_end_ms) > self.impact_window_ms {
                log::debug!("No impact within {}ms of free-fall", self.impact_window_ms);
                self.state = DetectionState::Idle;
            }
        }

        match self.state {
            DetectionState::Idle | DetectionState::AwaitingImpact { .. }
                if m < self.free_fall_threshold =>
            {
                // A second dip while awaiting impact restarts the free-fall.
                self.state = DetectionState::InFreeFall { start_ms: now_ms };
                log::debug!("Free-fall started (mag={:.2})", m);
            }
            DetectionState::InFreeFall { start_ms } if m >= self.free_fall_threshold => {
                let duration = now_ms.saturating_sub(start_ms);
                if duration >= self.free_fall_min_duration_ms {
                    self.state = DetectionState::AwaitingImpact {
                        freefall_end_ms: now_ms,
                    };
                    log::debug!("Free-fall ended after {}ms, watching for impact", duration);
                } else {
                    self.state = DetectionState::Idle;
                }
            }
            _ => {}
        }

        if matches!(self.state, DetectionState::AwaitingImpact { .. }) && m > self.impact_threshold {
            return Some(self.raise(Trigger::FreeFallImpact, m, gyro_magnitude, now_ms));
        }

        // 2. posture change + moderate impact
        if orientation.had_recent_change(now_ms)
            && m > self.impact_threshold * ORIENTATION_IMPACT_FACTOR
        {
            return Some(self.raise(Trigger::OrientationImpact, m, gyro_magnitude, now_ms));
        }

        // 3. very high single impact
        if m > self.impact_threshold * HIGH_IMPACT_FACTOR {
            return Some(self.raise(Trigger::HighImpact, m, gyro_magnitude, now_ms));
        }

        // 4. tumbling
        if self.accel_history.is_full()
            && self.accel_history.variance() > self.tumbling_variance_threshold
            && self.gyro_history.mean() > self.gyro_threshold * TUMBLING_GYRO_FACTOR
        {
            return Some(self.raise(Trigger::Tumbling, m, gyro_magnitude, now_ms));
        }

        None
    }

    fn raise(&mut self, trigger: Trigger, m: f64, gyro_magnitude: f64, now_ms: u64) -> Suspicion {
        log::debug!(
            "Fall suspected via {} (mag={:.2}, gyro={:.2}) - starting immobility check",
            trigger,
            m,
            gyro_magnitude
        );
        self.state = DetectionState::Suspected { suspect_ms: now_ms };
        Suspicion {
            trigger,
            acceleration_magnitude: m,
            gyro_magnitude,
            suspect_ms: now_ms,
        }
    }

    /// Back to `Idle` after a verdict; the classification window is kept.
    pub fn reset(&mut self) {
        self.state = DetectionState::Idle;
    }

    /// Back to `Idle` with empty windows.
    pub fn clear(&mut self) {
        self.state = DetectionState::Idle;
        self.accel_history.clear();
        self.gyro_history.clear();
    }
}
