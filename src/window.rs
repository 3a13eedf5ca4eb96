//! Fixed-capacity window of the most recent rewards.

use std::collections::VecDeque;

/// Default number of rewards kept per operator by the sliding-window policies.
pub const DEFAULT_WINDOW_CAP: usize = 10;

/// The last `cap` rewards observed for one operator.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardWindow {
    cap: usize,
    buf: VecDeque<f64>,
}

impl RewardWindow {
    /// Create an empty window with capacity `cap` (minimum 1).
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f64> + '_ {
        self.buf.iter()
    }

    /// Push a reward, evicting the oldest if at capacity.
    pub fn push(&mut self, reward: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(reward);
    }

    /// Mean of the retained rewards (`0.0` when empty).
    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for RewardWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAP)
    }
}
