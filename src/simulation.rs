// FallGuard - Scripted fall signatures
//
// Each script is a 50 Hz sample sequence: an upright baseline, the fall
// signature, then the wearer lying still long enough for the immobility
// check to confirm. Signature levels are derived from the active
// FallConfig, and the builder runs the same SignalFilter the engine
// runs, so a script trips its intended heuristic for any valid config.

use crate::config::{FallConfig, SENSOR_SAMPLE_INTERVAL_MS, STANDARD_GRAVITY};
use crate::events::{magnitude, FallType, Sample};
use crate::filter::SignalFilter;
use crate::history::MotionHistory;

const BASELINE_SAMPLES: usize = 10;
const REST_MARGIN_MS: u64 = 500;
const MAX_PHASE_SAMPLES: usize = 200;
/// Samples per half period of the tumbling square wave.
const TUMBLE_HALF_PERIOD: usize = 5;
const REST_JITTER: f64 = 0.05;

const UPRIGHT: [f64; 3] = [0.0, 0.0, STANDARD_GRAVITY];

/// Build the sample sequence for `fall_type`, first sample at `start_ms`.
pub fn script(fall_type: FallType, config: &FallConfig, start_ms: u64) -> Vec<Sample> {
    let mut s = ScriptBuilder::new(config, start_ms);
    s.hold(UPRIGHT, BASELINE_SAMPLES);

    match fall_type {
        FallType::HighImpact => high_impact(&mut s, config),
        FallType::FreeFall => free_fall(&mut s, config),
        FallType::OrientationChange => orientation_change(&mut s, config),
        FallType::Tumbling => tumbling(&mut s, config),
    }

    s.rest(config.immobility_check_ms + REST_MARGIN_MS);
    s.samples
}

fn high_impact(s: &mut ScriptBuilder, config: &FallConfig) {
    // Reach 1.05x the high-impact bar within three samples.
    let target = config.impact_threshold * 1.5 * 1.05;
    let keep = (1.0 - config.filter_alpha).powi(3);
    let level = STANDARD_GRAVITY + (target - STANDARD_GRAVITY) / (1.0 - keep);
    s.until([0.0, 0.0, level], |m| m > config.impact_threshold * 1.5);
}

fn free_fall(s: &mut ScriptBuilder, config: &FallConfig) {
    let low = [0.0, 0.0, config.free_fall_threshold * 0.25];
    s.until(low, |m| m < config.free_fall_threshold);
    let extra = config.free_fall_min_duration_ms / SENSOR_SAMPLE_INTERVAL_MS + 2;
    s.hold(low, extra as usize);
    s.until([0.0, 0.0, config.impact_threshold * 2.0], |m| {
        m > config.impact_threshold
    });
}

fn orientation_change(s: &mut ScriptBuilder, config: &FallConfig) {
    let ts = s.now_ms;
    s.samples.push(Sample::gravity(UPRIGHT, ts));
    s.samples.push(Sample::gravity(
        [STANDARD_GRAVITY, 0.0, config.horizontal_threshold * 0.3],
        ts,
    ));
    // Sideways impact between the orientation and high-impact bars.
    s.until([config.impact_threshold * 1.1, 0.0, 0.0], |m| {
        m > config.impact_threshold * 0.7
    });
}

fn tumbling(s: &mut ScriptBuilder, config: &FallConfig) {
    let spin = [config.gyro_threshold * 2.0, 0.0, config.gyro_threshold * 0.5];
    let lo = config.free_fall_threshold * 1.5;
    // Stays under the high-impact bar so only the tumbling rule can fire.
    let hi = config.impact_threshold * 4.0 / 3.0;
    let mut window = MotionHistory::new(config.history_capacity, STANDARD_GRAVITY);

    for i in 0..MAX_PHASE_SAMPLES {
        let level = if (i / TUMBLE_HALF_PERIOD) % 2 == 0 { hi } else { lo };
        let ts = s.now_ms;
        s.samples.push(Sample::gyro(spin, ts));
        let m = s.accel([0.0, 0.0, level]);
        window.push(m);
        if window.is_full() && window.variance() > config.tumbling_variance_threshold {
            break;
        }
    }
}

struct ScriptBuilder {
    samples: Vec<Sample>,
    now_ms: u64,
    filter: SignalFilter,
}

impl ScriptBuilder {
    fn new(config: &FallConfig, start_ms: u64) -> Self {
        Self {
            samples: Vec::new(),
            now_ms: start_ms,
            filter: SignalFilter::new(config.filter_alpha),
        }
    }

    /// Push one accelerometer sample; returns the magnitude the engine will see.
    fn accel(&mut self, v: [f64; 3]) -> f64 {
        self.samples.push(Sample::accel(v, self.now_ms));
        self.now_ms += SENSOR_SAMPLE_INTERVAL_MS;
        magnitude(self.filter.apply(v))
    }

    fn hold(&mut self, v: [f64; 3], count: usize) {
        for _ in 0..count {
            self.accel(v);
        }
    }

    /// Repeat `v` until the filtered magnitude satisfies `done`.
    fn until(&mut self, v: [f64; 3], done: impl Fn(f64) -> bool) {
        for _ in 0..MAX_PHASE_SAMPLES {
            if done(self.accel(v)) {
                return;
            }
        }
    }

    /// Lying on the side, nearly still.
    fn rest(&mut self, duration_ms: u64) {
        let count = duration_ms / SENSOR_SAMPLE_INTERVAL_MS;
        for i in 0..count {
            let jitter = if i % 2 == 0 { -REST_JITTER } else { REST_JITTER };
            self.accel([STANDARD_GRAVITY + jitter, 0.0, 0.0]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SensorKind;

    #[test]
    fn scripts_are_time_ordered_per_sensor() {
        let config = FallConfig::default();
        for fall_type in FallType::ALL {
            let samples = script(fall_type, &config, 5_000);
            assert_eq!(samples[0].timestamp_ms, 5_000);
            for kind in [SensorKind::Accelerometer, SensorKind::Gyroscope, SensorKind::Gravity] {
                let ts: Vec<u64> = samples
                    .iter()
                    .filter(|s| s.kind == kind)
                    .map(|s| s.timestamp_ms)
                    .collect();
                assert!(ts.windows(2).all(|w| w[0] <= w[1]), "{fall_type}: {kind:?} out of order");
            }
        }
    }

    #[test]
    fn scripts_cover_the_immobility_window() {
        let config = FallConfig::default();
        for fall_type in FallType::ALL {
            let samples = script(fall_type, &config, 0);
            let last = samples.last().map(|s| s.timestamp_ms).unwrap_or(0);
            assert!(last > config.immobility_check_ms, "{fall_type} too short");
        }
    }

    #[test]
    fn only_tumbling_uses_the_gyroscope() {
        let config = FallConfig::default();
        for fall_type in FallType::ALL {
            let has_gyro = script(fall_type, &config, 0)
                .iter()
                .any(|s| s.kind == SensorKind::Gyroscope);
            assert_eq!(has_gyro, fall_type == FallType::Tumbling);
        }
    }

    #[test]
    fn orientation_script_lies_the_wrist_flat() {
        let config = FallConfig::default();
        let gravity: Vec<_> = script(FallType::OrientationChange, &config, 0)
            .into_iter()
            .filter(|s| s.kind == SensorKind::Gravity)
            .collect();
        assert_eq!(gravity.len(), 2);
        assert!(gravity[1].axis_values[2].abs() < config.horizontal_threshold);
    }
}
