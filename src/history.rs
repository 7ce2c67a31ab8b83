// FallGuard - Fixed-capacity rolling window of magnitudes

use std::collections::VecDeque;

/// Ring buffer of the last `capacity` readings, oldest evicted first.
///
/// Only aggregate statistics are exposed. An empty window reports `baseline`
/// as its mean and zero variance.
#[derive(Debug, Clone)]
pub struct MotionHistory {
    values: VecDeque<f64>,
    capacity: usize,
    baseline: f64,
}

impl MotionHistory {
    pub fn new(capacity: usize, baseline: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            baseline,
        }
    }

    pub fn push(&mut self, magnitude: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(magnitude);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() >= self.capacity
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return self.baseline;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.values.len() as f64
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
