// FallGuard - Upright/lying posture from the gravity sensor's z axis
//
// A watch on an upright arm sees most of gravity along z. After a fall the
// forearm usually lies flat and z collapses towards zero. Hysteresis between
// the two thresholds keeps a wrist hovering near the boundary from flapping.
//
// Devices without a gravity sensor never call OrientationTracker::update,
// so the tracker stays upright and never reports a recent change.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationState {
    pub is_vertical: bool,
    /// Time of the last real vertical/horizontal transition.
    pub last_change_ms: u64,
}

#[derive(Debug, Clone)]
pub struct OrientationTracker {
    state: OrientationState,
    vertical_threshold: f64,
    horizontal_threshold: f64,
    window_ms: u64,
}

impl OrientationTracker {
    pub fn new(vertical_threshold: f64, horizontal_threshold: f64, window_ms: u64) -> Self {
        Self {
            state: OrientationState {
                is_vertical: true,
                last_change_ms: 0,
            },
            vertical_threshold,
            horizontal_threshold,
            window_ms,
        }
    }

    /// Feed one gravity z reading. Returns `true` if the posture flipped.
    pub fn update(&mut self, gravity_z: f64, now_ms: u64) -> bool {
        if self.state.is_vertical && gravity_z.abs() < self.horizontal_threshold {
            self.state = OrientationState {
                is_vertical: false,
                last_change_ms: now_ms,
            };
            log::debug!("Orientation: vertical -> horizontal (z={:.2})", gravity_z);
            true
        } else if !self.state.is_vertical && gravity_z > self.vertical_threshold {
            self.state = OrientationState {
                is_vertical: true,
                last_change_ms: now_ms,
            };
            log::debug!("Orientation: horizontal -> vertical (z={:.2})", gravity_z);
            true
        } else {
            false
        }
    }

    /// Lying flat, and only just got there.
    pub fn had_recent_change(&self, now_ms: u64) -> bool {
        !self.state.is_vertical && now_ms.saturating_sub(self.state.last_change_ms) < self.window_ms
    }

    pub fn state(&self) -> OrientationState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = OrientationState {
            is_vertical: true,
            last_change_ms: 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> OrientationTracker {
        OrientationTracker::new(7.0, 3.0, 2_000)
    }

    #[test]
    fn starts_upright_without_signal() {
        let t = tracker();
        assert!(t.state().is_vertical);
        assert!(!t.had_recent_change(0));
        assert!(!t.had_recent_change(10_000));
    }

    #[test]
    fn lying_flat_is_a_recent_change_within_window() {
        let mut t = tracker();
        assert!(t.update(1.2, 5_000));
        assert!(!t.state().is_vertical);
        assert!(t.had_recent_change(5_000));
        assert!(t.had_recent_change(6_999));
        assert!(!t.had_recent_change(7_000));
    }

    #[test]
    fn negative_z_counts_by_absolute_value() {
        let mut t = tracker();
        assert!(!t.update(-8.0, 100));
        assert!(t.update(-2.5, 200));
        assert_eq!(t.state().last_change_ms, 200);
    }

    #[test]
    fn change_time_only_moves_on_transitions() {
        let mut t = tracker();
        t.update(0.5, 1_000);
        t.update(0.4, 1_500);
        t.update(5.0, 1_800); // between thresholds: still horizontal
        assert_eq!(
            t.state(),
            OrientationState {
                is_vertical: false,
                last_change_ms: 1_000
            }
        );

        assert!(t.update(9.5, 2_200));
        assert_eq!(t.state().last_change_ms, 2_200);
        assert!(!t.had_recent_change(2_300));
    }

    #[test]
    fn reset_returns_to_upright() {
        let mut t = tracker();
        t.update(0.0, 100);
        t.reset();
        assert!(t.state().is_vertical);
        assert!(!t.had_recent_change(150));
    }
}
