// FallGuard - Public face of the fall detection engine
//
// DetectionController owns every piece of mutable detection state and
// processes one sample at a time to completion:
//
//   accel ──► SignalFilter ──► magnitude ──► FallClassifier ──► ImmobilityVerifier ──► AlertSink
//   gyro  ──► latest gyro magnitude ──────────────┘
//   gravity ► OrientationTracker ─────────────────┘
//
// Bad input (non-finite axes, timestamps going backwards, samples while
// stopped) is dropped without touching state. The alert sink is called at
// most once per confirmed fall and must hand the event off quickly; see
// `tasks::alert` for a channel-backed sink.

use crate::classifier::{DetectionState, FallClassifier, Suspicion};
use crate::clock::{Clock, MonotonicClock};
use crate::config::{FallConfig, STATUS_LOG_INTERVAL};
use crate::events::{magnitude, AlertEvent, DropReason, FallType, FeedOutcome, Sample, SensorKind};
use crate::filter::SignalFilter;
use crate::immobility::{ImmobilityVerifier, Verdict};
use crate::orientation::{OrientationState, OrientationTracker};
use crate::simulation;

/// Receives confirmed falls.
pub trait AlertSink {
    fn on_fall_detected(&mut self, event: AlertEvent);
}

impl<F: FnMut(AlertEvent)> AlertSink for F {
    fn on_fall_detected(&mut self, event: AlertEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    pub last_confirmed_ms: Option<u64>,
}

impl CooldownState {
    pub fn is_active(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        self.last_confirmed_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < cooldown_ms)
    }
}

pub struct DetectionController<S, C = MonotonicClock> {
    config: FallConfig,
    sink: S,
    clock: C,
    running: bool,

    filter: SignalFilter,
    classifier: FallClassifier,
    verifier: ImmobilityVerifier,
    orientation: OrientationTracker,
    cooldown: CooldownState,
    pending: Option<Suspicion>,

    latest_gyro: f64,
    /// Last accepted timestamp per sensor kind.
    last_seen_ms: [Option<u64>; 3],
    accel_count: u64,
}

impl<S: AlertSink> DetectionController<S, MonotonicClock> {
    pub fn new(config: FallConfig, sink: S) -> Self {
        Self::with_clock(config, sink, MonotonicClock::new())
    }
}

impl<S: AlertSink, C: Clock> DetectionController<S, C> {
    pub fn with_clock(config: FallConfig, sink: S, clock: C) -> Self {
        Self {
            filter: SignalFilter::new(config.filter_alpha),
            classifier: FallClassifier::new(&config),
            verifier: ImmobilityVerifier::new(&config),
            orientation: OrientationTracker::new(
                config.vertical_threshold,
                config.horizontal_threshold,
                config.orientation_window_ms,
            ),
            cooldown: CooldownState::default(),
            pending: None,
            latest_gyro: 0.0,
            last_seen_ms: [None; 3],
            accel_count: 0,
            running: false,
            config,
            sink,
            clock,
        }
    }

    /// Begin accepting samples. No-op while already running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.reset_state();
        self.running = true;
        log::info!("Fall detection started");
    }

    /// Stop accepting samples. A verification in progress is discarded.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        if self.pending.is_some() {
            log::debug!("Discarding in-flight fall verification");
        }
        self.running = false;
        self.reset_state();
        log::info!("Fall detection stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> DetectionState {
        self.classifier.state()
    }

    pub fn orientation(&self) -> OrientationState {
        self.orientation.state()
    }

    pub fn cooldown(&self) -> CooldownState {
        self.cooldown
    }

    pub fn config(&self) -> &FallConfig {
        &self.config
    }

    /// Route one sample through the pipeline.
    pub fn feed(&mut self, sample: Sample) -> FeedOutcome {
        if !self.running {
            return FeedOutcome::Dropped(DropReason::NotRunning);
        }
        if !sample.is_finite() {
            log::trace!("Dropping non-finite {:?} sample", sample.kind);
            return FeedOutcome::Dropped(DropReason::NonFinite);
        }

        let slot = &mut self.last_seen_ms[kind_slot(sample.kind)];
        if slot.is_some_and(|last| sample.timestamp_ms < last) {
            log::trace!(
                "Dropping out-of-order {:?} sample at {}ms",
                sample.kind,
                sample.timestamp_ms
            );
            return FeedOutcome::Dropped(DropReason::OutOfOrder);
        }
        *slot = Some(sample.timestamp_ms);

        match sample.kind {
            SensorKind::Gyroscope => {
                self.latest_gyro = sample.magnitude();
                FeedOutcome::Observed
            }
            SensorKind::Gravity => {
                self.orientation
                    .update(sample.axis_values[2], sample.timestamp_ms);
                FeedOutcome::Observed
            }
            SensorKind::Accelerometer => self.on_accel(sample),
        }
    }

    fn on_accel(&mut self, sample: Sample) -> FeedOutcome {
        let now = sample.timestamp_ms;
        let m = magnitude(self.filter.apply(sample.axis_values));
        let gyro = self.latest_gyro;

        self.classifier.record(m, gyro);

        self.accel_count += 1;
        if self.accel_count % STATUS_LOG_INTERVAL == 0 {
            log::debug!(
                "mag={:.2} gyro={:.2} state={:?} vertical={}",
                m,
                gyro,
                self.classifier.state(),
                self.orientation.state().is_vertical
            );
        }

        if let Some(suspicion) = self.pending {
            return match self.verifier.observe(sample.magnitude(), now) {
                Verdict::Pending => FeedOutcome::Verifying,
                Verdict::Confirmed { .. } => self.confirm(suspicion, now),
                Verdict::Dismissed(dismissal) => {
                    self.pending = None;
                    self.classifier.reset();
                    FeedOutcome::Dismissed(dismissal)
                }
            };
        }

        if self.cooldown.is_active(now, self.config.cooldown_ms) {
            return FeedOutcome::CoolingDown;
        }

        match self
            .classifier
            .evaluate(m, gyro, now, &self.orientation)
        {
            Some(suspicion) => {
                self.verifier.begin(now);
                self.pending = Some(suspicion);
                FeedOutcome::Suspected(suspicion.trigger)
            }
            None => FeedOutcome::Observed,
        }
    }

    fn confirm(&mut self, suspicion: Suspicion, now: u64) -> FeedOutcome {
        let event = AlertEvent {
            acceleration_magnitude: suspicion.acceleration_magnitude,
            gyro_magnitude: suspicion.gyro_magnitude,
            trigger: suspicion.trigger,
            suspected_at_ms: suspicion.suspect_ms,
            confirmed_at_ms: now,
        };
        self.pending = None;
        self.classifier.reset();
        self.cooldown.last_confirmed_ms = Some(now);

        log::info!(
            "FALL DETECTED via {} (accel={:.2}, gyro={:.2})",
            event.trigger,
            event.acceleration_magnitude,
            event.gyro_magnitude
        );
        self.sink.on_fall_detected(event);
        FeedOutcome::Confirmed(event)
    }

    /// Reset all state, then run a scripted fall through [`feed`](Self::feed).
    ///
    /// `injected` replaces the built-in script for `fall_type` when non-empty.
    /// Does nothing while stopped.
    pub fn simulate(&mut self, fall_type: FallType, injected: &[Sample]) -> Vec<FeedOutcome> {
        self.simulate_until(fall_type, injected, || false)
    }

    /// Like [`simulate`](Self::simulate), but `cancelled` is polled before
    /// every sample. Once it returns true the rest of the script is skipped
    /// and any verification it started is discarded.
    pub fn simulate_until<F>(&mut self, fall_type: FallType, injected: &[Sample], mut cancelled: F) -> Vec<FeedOutcome>
    where
        F: FnMut() -> bool,
    {
        if !self.running {
            log::warn!("Ignoring {} simulation: detection is stopped", fall_type);
            return Vec::new();
        }
        log::info!("Simulating fall: {}", fall_type);
        self.reset_state();

        let samples = if injected.is_empty() {
            simulation::script(fall_type, &self.config, self.clock.now_ms())
        } else {
            injected.to_vec()
        };

        let mut outcomes = Vec::with_capacity(samples.len());
        for sample in samples {
            if cancelled() {
                log::info!("{} simulation cancelled after {} samples", fall_type, outcomes.len());
                self.reset_state();
                return outcomes;
            }
            outcomes.push(self.feed(sample));
        }

        // Live sensors resume on their own clock.
        self.last_seen_ms = [None; 3];
        outcomes
    }

    fn reset_state(&mut self) {
        self.filter.reset();
        self.classifier.clear();
        self.verifier.cancel();
        self.orientation.reset();
        self.cooldown = CooldownState::default();
        self.pending = None;
        self.latest_gyro = 0.0;
        self.last_seen_ms = [None; 3];
        self.accel_count = 0;
    }
}

fn kind_slot(kind: SensorKind) -> usize {
    match kind {
        SensorKind::Accelerometer => 0,
        SensorKind::Gyroscope => 1,
        SensorKind::Gravity => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::Trigger;

    fn controller() -> DetectionController<impl FnMut(AlertEvent), ManualClock> {
        let mut c = DetectionController::with_clock(
            FallConfig::default(),
            |_: AlertEvent| {},
            ManualClock::new(0),
        );
        c.start();
        c
    }

    #[test]
    fn samples_are_dropped_while_stopped() {
        let mut c = DetectionController::new(FallConfig::default(), |_: AlertEvent| {});
        assert_eq!(
            c.feed(Sample::accel([0.0, 0.0, 9.81], 0)),
            FeedOutcome::Dropped(DropReason::NotRunning)
        );
        c.start();
        assert_eq!(c.feed(Sample::accel([0.0, 0.0, 9.81], 0)), FeedOutcome::Observed);
        c.stop();
        c.stop();
        assert!(!c.is_running());
    }

    #[test]
    fn non_finite_and_out_of_order_samples_leave_state_alone() {
        let mut c = controller();
        c.feed(Sample::accel([0.0, 0.0, 1.0], 100));
        assert_eq!(c.state(), DetectionState::InFreeFall { start_ms: 100 });

        assert_eq!(
            c.feed(Sample::accel([f64::NAN, 0.0, 9.81], 120)),
            FeedOutcome::Dropped(DropReason::NonFinite)
        );
        assert_eq!(
            c.feed(Sample::accel([0.0, 0.0, 9.81], 80)),
            FeedOutcome::Dropped(DropReason::OutOfOrder)
        );
        assert_eq!(c.state(), DetectionState::InFreeFall { start_ms: 100 });
    }

    #[test]
    fn ordering_is_tracked_per_sensor() {
        let mut c = controller();
        c.feed(Sample::accel([0.0, 0.0, 9.81], 1_000));
        // Gravity and gyro streams run on their own timelines.
        assert_eq!(c.feed(Sample::gravity([0.0, 0.0, 9.81], 990)), FeedOutcome::Observed);
        assert_eq!(c.feed(Sample::gyro([0.1, 0.0, 0.0], 995)), FeedOutcome::Observed);
        assert_eq!(
            c.feed(Sample::gravity([0.0, 0.0, 9.81], 980)),
            FeedOutcome::Dropped(DropReason::OutOfOrder)
        );
    }

    #[test]
    fn gravity_samples_drive_orientation() {
        let mut c = controller();
        c.feed(Sample::gravity([9.7, 0.0, 0.8], 500));
        assert_eq!(
            c.orientation(),
            OrientationState {
                is_vertical: false,
                last_change_ms: 500
            }
        );
    }

    #[test]
    fn start_is_idempotent() {
        let mut c = controller();
        c.feed(Sample::accel([0.0, 0.0, 1.0], 100));
        c.start();
        assert_eq!(c.state(), DetectionState::InFreeFall { start_ms: 100 });
    }

    #[test]
    fn stop_discards_pending_verification() {
        let mut c = controller();
        // Unfiltered first sample: a straight high impact.
        assert_eq!(
            c.feed(Sample::accel([0.0, 0.0, 30.0], 0)),
            FeedOutcome::Suspected(Trigger::HighImpact)
        );
        c.stop();
        c.start();
        assert_eq!(c.state(), DetectionState::Idle);
        for i in 1..=200 {
            let outcome = c.feed(Sample::accel([9.81, 0.0, 0.0], i * 20));
            assert!(!matches!(outcome, FeedOutcome::Confirmed(_)));
        }
    }

    #[test]
    fn cooldown_window_is_reported() {
        let state = CooldownState {
            last_confirmed_ms: Some(1_000),
        };
        assert!(state.is_active(1_000, 30_000));
        assert!(state.is_active(30_999, 30_000));
        assert!(!state.is_active(31_000, 30_000));
        assert!(!CooldownState::default().is_active(0, 30_000));
    }

    #[test]
    fn simulate_requires_running_controller() {
        let mut c = controller();
        c.stop();
        assert!(c.simulate(FallType::HighImpact, &[]).is_empty());
    }

    #[test]
    fn cancelled_simulation_raises_no_alert() {
        let alerts = std::cell::Cell::new(0);
        let mut c = DetectionController::with_clock(
            FallConfig::default(),
            |_: AlertEvent| alerts.set(alerts.get() + 1),
            ManualClock::new(0),
        );
        c.start();

        let mut polls = 0;
        let outcomes = c.simulate_until(FallType::HighImpact, &[], || {
            polls += 1;
            polls > 20
        });
        assert_eq!(outcomes.len(), 20);
        assert!(outcomes.contains(&FeedOutcome::Suspected(Trigger::HighImpact)));
        assert!(!outcomes.iter().any(|o| matches!(o, FeedOutcome::Confirmed(_))));
        assert_eq!(c.state(), DetectionState::Idle);
        drop(c);
        assert_eq!(alerts.get(), 0);
    }
}
