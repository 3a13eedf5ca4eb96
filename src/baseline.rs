//! Baselines: the oracle every regret curve is measured against, and a uniform picker.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::operator::{OperatorId, OperatorSet, Time};
use crate::policy::{Policy, PolicyRecord};

/// Oracle: always runs the operator with the highest true reward at `time`.
///
/// It reads the operator set directly, so its cumulative reward is the upper bound
/// used for regret.
#[derive(Debug, Clone)]
pub struct Reference {
    ops: Arc<OperatorSet>,
    record: PolicyRecord,
}

impl Reference {
    pub const NAME: &'static str = "reference";

    pub fn new(ops: Arc<OperatorSet>) -> Self {
        let record = PolicyRecord::new(Self::NAME, &ops);
        Self { ops, record }
    }
}

impl Policy for Reference {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn set_duration(&mut self, duration: usize) {
        self.record.set_duration(duration);
    }

    fn select(&mut self, time: Time) -> OperatorId {
        self.ops.best_at(time)
    }

    fn reward(&mut self, step: Time, op: OperatorId, value: f64) {
        self.record.record(step, op, value);
    }

    fn record(&self) -> &PolicyRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut PolicyRecord {
        &mut self.record
    }
}

/// Picks an operator uniformly at random at every step.
#[derive(Debug, Clone)]
pub struct Uniform {
    n: usize,
    rng: StdRng,
    draws: Vec<OperatorId>,
    record: PolicyRecord,
}

impl Uniform {
    pub const NAME: &'static str = "random";

    pub fn new(ops: &OperatorSet) -> Self {
        Self::with_seed(ops, 0)
    }

    pub fn with_seed(ops: &OperatorSet, seed: u64) -> Self {
        Self {
            n: ops.len(),
            rng: StdRng::seed_from_u64(seed),
            draws: Vec::new(),
            record: PolicyRecord::new(Self::NAME, ops),
        }
    }
}

impl Policy for Uniform {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn set_duration(&mut self, duration: usize) {
        self.record.set_duration(duration);
        let (n, rng) = (self.n, &mut self.rng);
        self.draws = (0..duration)
            .map(|_| OperatorId(rng.random_range(0..n)))
            .collect();
    }

    fn select(&mut self, time: Time) -> OperatorId {
        if self.draws.is_empty() {
            return OperatorId(self.rng.random_range(0..self.n));
        }
        self.draws[time % self.draws.len()]
    }

    fn reward(&mut self, step: Time, op: OperatorId, value: f64) {
        self.record.record(step, op, value);
    }

    fn record(&self) -> &PolicyRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut PolicyRecord {
        &mut self.record
    }
}
