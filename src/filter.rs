// FallGuard - Exponential smoothing of raw accelerometer vectors
//
// Wrist accelerometers jitter around the gravity baseline even when the
// wearer is idle. Thresholding raw magnitudes trips on that noise, so every
// accelerometer vector passes through this filter first. The weight of the
// newest sample stays high enough that an impact still crosses its threshold
// within one or two samples.

/// Component-wise EMA: `out = α·raw + (1-α)·previous`.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    alpha: f64,
    previous: Option<[f64; 3]>,
}

impl SignalFilter {
    /// `alpha` must lie in (0, 1]; `FallConfig::validate` enforces it.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            previous: None,
        }
    }

    /// Filter one vector. The first call passes `raw` through unchanged.
    pub fn apply(&mut self, raw: [f64; 3]) -> [f64; 3] {
        let out = match self.previous {
            None => raw,
            Some(prev) => {
                let a = self.alpha;
                [
                    a * raw[0] + (1.0 - a) * prev[0],
                    a * raw[1] + (1.0 - a) * prev[1],
                    a * raw[2] + (1.0 - a) * prev[2],
                ]
            }
        };
        self.previous = Some(out);
        out
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut filter = SignalFilter::new(0.2);
        assert_eq!(filter.apply([1.0, -2.0, 9.81]), [1.0, -2.0, 9.81]);
    }

    #[test]
    fn second_sample_is_weighted_by_alpha() {
        let mut filter = SignalFilter::new(0.25);
        filter.apply([0.0, 0.0, 8.0]);
        let out = filter.apply([4.0, 0.0, 0.0]);
        assert_eq!(out, [1.0, 0.0, 6.0]);
    }

    #[test]
    fn constant_input_converges_for_any_alpha() {
        let target = [0.3, -9.7, 1.2];
        for alpha in [0.05, 0.2, 0.5, 1.0] {
            let mut filter = SignalFilter::new(alpha);
            filter.apply([0.0, 0.0, 0.0]);
            let mut out = [0.0; 3];
            for _ in 0..500 {
                out = filter.apply(target);
            }
            for axis in 0..3 {
                assert!(
                    (out[axis] - target[axis]).abs() < 1e-6,
                    "alpha {alpha}: axis {axis} stuck at {}",
                    out[axis]
                );
            }
        }
    }

    #[test]
    fn alpha_one_disables_smoothing() {
        let mut filter = SignalFilter::new(1.0);
        filter.apply([5.0, 5.0, 5.0]);
        assert_eq!(filter.apply([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn reset_forgets_previous_state() {
        let mut filter = SignalFilter::new(0.2);
        filter.apply([10.0, 10.0, 10.0]);
        filter.reset();
        assert_eq!(filter.apply([1.0, 1.0, 1.0]), [1.0, 1.0, 1.0]);
    }
}
