// FallGuard - Post-suspicion stillness check
//
// A vigorous arm swing can look like a fall for one sample. A real fall is
// normally followed by the wearer lying still, so after a suspicion the raw
// accelerometer magnitude is collected for a fixed window and its variance
// decides. Too few samples never count as stillness.

use crate::config::{FallConfig, STANDARD_GRAVITY};
use crate::events::Dismissal;
use crate::history::MotionHistory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Pending,
    Confirmed { variance: f64 },
    Dismissed(Dismissal),
}

#[derive(Debug, Clone)]
pub struct ImmobilityVerifier {
    history: MotionHistory,
    settle_ms: u64,
    check_ms: u64,
    sample_min: usize,
    variance_threshold: f64,
    suspect_ms: Option<u64>,
}

impl ImmobilityVerifier {
    pub fn new(config: &FallConfig) -> Self {
        Self {
            history: MotionHistory::new(config.immobility_capacity, STANDARD_GRAVITY),
            settle_ms: config.immobility_settle_ms,
            check_ms: config.immobility_check_ms,
            sample_min: config.immobility_sample_min,
            variance_threshold: config.immobility_variance_threshold,
            suspect_ms: None,
        }
    }

    /// Open a new window starting at `suspect_ms`.
    pub fn begin(&mut self, suspect_ms: u64) {
        self.history.clear();
        self.suspect_ms = Some(suspect_ms);
        log::debug!("Immobility check started ({}ms window)", self.check_ms);
    }

    pub fn is_active(&self) -> bool {
        self.suspect_ms.is_some()
    }

    /// Drop the current window without a verdict.
    pub fn cancel(&mut self) {
        self.suspect_ms = None;
        self.history.clear();
    }

    /// Feed one raw magnitude. Samples in the settling period are ignored.
    pub fn observe(&mut self, magnitude: f64, now_ms: u64) -> Verdict {
        let Some(suspect_ms) = self.suspect_ms else {
            return Verdict::Pending;
        };

        let elapsed = now_ms.saturating_sub(suspect_ms);
        if elapsed < self.settle_ms {
            return Verdict::Pending;
        }
        self.history.push(magnitude);
        if elapsed < self.check_ms {
            return Verdict::Pending;
        }

        self.suspect_ms = None;
        let count = self.history.len();
        if count < self.sample_min {
            log::debug!("Only {} samples after suspected fall - dismissing", count);
            return Verdict::Dismissed(Dismissal::InsufficientSamples { count });
        }

        let variance = self.history.variance();
        if variance < self.variance_threshold {
            log::debug!("Immobility confirmed (variance={:.3})", variance);
            Verdict::Confirmed { variance }
        } else {
            log::debug!("Movement after suspected fall (variance={:.3}) - false positive", variance);
            Verdict::Dismissed(Dismissal::Movement { variance })
        }
    }
}
