//! The `Policy` contract shared by every selection rule, plus the per-run record and
//! per-operator statistics the policies keep.
//!
//! A simulation drives a policy in batches:
//!
//! ```text
//! policy.set_duration(T);
//! for each batch {
//!     policy.before_select();
//!     for step in batch { chosen[step] = policy.select(step); }   // no rewards yet
//!     policy.before_reward();
//!     for step in batch { policy.reward(step, chosen[step], reward_of(chosen[step], step)); }
//! }
//! ```
//!
//! Operators are referred to by [`OperatorId`]. Wherever a rule needs a deterministic
//! tie-break, operators are scanned in lexicographic name order and the first one wins.

use std::collections::BTreeMap;

use crate::drift::{PageHinkley, PageHinkleyAlarm, PageHinkleyConfig};
use crate::operator::{OperatorId, OperatorSet, Time};

/// Event kind logged by whole-policy drift resets.
pub const RESET_EVENT: &str = "reset";

/// Event kind logged when only `operator` is reset.
pub fn reset_event_for(operator: &str) -> String {
    format!("{RESET_EVENT} {operator}")
}

/// A batch-driven operator-selection policy.
pub trait Policy {
    /// Display name (unique per experiment by convention, e.g. `"DMAB"` or `"KRDMAB 5"`).
    fn name(&self) -> &str;

    /// Allocate per-step recording for a run of `duration` steps.
    ///
    /// Must be called before the first `select` of a run. Statistics are kept; only
    /// the recording is reset.
    fn set_duration(&mut self, duration: usize);

    /// Called once per batch before any selection.
    fn before_select(&mut self) {}

    /// Choose the operator to run at `time`.
    fn select(&mut self, time: Time) -> OperatorId;

    /// Called once per batch before its rewards are delivered.
    fn before_reward(&mut self) {}

    /// Deliver the payoff observed for `op`, selected at `step`.
    fn reward(&mut self, step: Time, op: OperatorId, value: f64);

    fn record(&self) -> &PolicyRecord;

    fn record_mut(&mut self) -> &mut PolicyRecord;

    /// Append `step` to the event log under `kind`.
    fn event(&mut self, step: Time, kind: &str) {
        self.record_mut().event(step, kind);
    }
}

/// What one policy did during one run: a dense selection/reward trace and an event log.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicyRecord {
    pub policy: String,
    /// Operator names, indexed by `OperatorId`.
    pub operators: Vec<String>,
    pub selected: Vec<Option<OperatorId>>,
    pub rewards: Vec<Option<f64>>,
    pub events: BTreeMap<String, Vec<Time>>,
}

impl PolicyRecord {
    pub fn new(policy: impl Into<String>, ops: &OperatorSet) -> Self {
        Self {
            policy: policy.into(),
            operators: ops.names(),
            ..Self::default()
        }
    }

    /// Clear the trace and size it for `duration` steps.
    pub fn set_duration(&mut self, duration: usize) {
        self.selected = vec![None; duration];
        self.rewards = vec![None; duration];
        self.events.clear();
    }

    pub fn duration(&self) -> usize {
        self.selected.len()
    }

    /// Store the outcome of `step`. Each step is written once per run.
    pub fn record(&mut self, step: Time, op: OperatorId, reward: f64) {
        if step >= self.selected.len() {
            self.selected.resize(step + 1, None);
            self.rewards.resize(step + 1, None);
        }
        debug_assert!(
            self.selected[step].is_none(),
            "step {step} recorded twice for {}",
            self.policy
        );
        self.selected[step] = Some(op);
        self.rewards[step] = Some(reward);
    }

    pub fn event(&mut self, step: Time, kind: &str) {
        self.events.entry(kind.to_string()).or_default().push(step);
    }

    /// True when every step of the run has been rewarded.
    pub fn is_complete(&self) -> bool {
        self.selected.iter().all(Option::is_some) && self.rewards.iter().all(Option::is_some)
    }

    pub fn selected_name(&self, step: Time) -> Option<&str> {
        let id = (*self.selected.get(step)?)?;
        self.operators.get(id.0).map(String::as_str)
    }

    /// Reward at `step`, `0.0` if the step was never rewarded.
    pub fn reward_at(&self, step: Time) -> f64 {
        self.rewards.get(step).copied().flatten().unwrap_or(0.0)
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().flatten().sum()
    }

    /// How many times each operator (by `OperatorId`) was selected.
    pub fn selection_counts(&self) -> Vec<u64> {
        let mut counts = vec![0u64; self.operators.len()];
        for id in self.selected.iter().flatten() {
            if let Some(c) = counts.get_mut(id.0) {
                *c += 1;
            }
        }
        counts
    }

    /// Total number of events logged (all kinds).
    pub fn event_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}

/// UCB1 score: `mean + c * sqrt(ln(total) / n)`.
///
/// Callers guarantee `n > 0` and `total >= 1` (warm-up handles untried operators).
pub fn ucb_score(mean: f64, c: f64, total: u64, n: u64) -> f64 {
    mean + c * ((total as f64).ln() / n as f64).sqrt()
}

/// Running statistics of one operator for the UCB/Page–Hinkley policies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorStats {
    pub id: OperatorId,
    pub name: String,
    /// Rewarded executions since the last reset.
    pub executions: u64,
    /// Selected in the current batch, not yet rewarded.
    pub pending: u64,
    pub mean_reward: f64,
    pub drift: PageHinkley,
}

impl OperatorStats {
    pub fn new(id: OperatorId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            executions: 0,
            pending: 0,
            mean_reward: 0.0,
            drift: PageHinkley::new(),
        }
    }

    /// Forget everything learned (pending selections stay in flight).
    pub fn reset(&mut self) {
        self.executions = 0;
        self.mean_reward = 0.0;
        self.drift.reset();
    }

    /// Fold one reward into the running mean and the drift accumulator.
    pub fn observe(&mut self, reward: f64, ph: &PageHinkleyConfig) -> Option<PageHinkleyAlarm> {
        let n = self.executions as f64;
        self.mean_reward = (self.mean_reward * n + reward) / (n + 1.0);
        self.executions += 1;
        self.drift.update(ph, self.mean_reward, reward)
    }
}

/// Anything that tracks in-flight work per operator.
pub trait InFlight {
    fn id(&self) -> OperatorId;
    fn executions(&self) -> u64;
    fn pending(&self) -> u64;
    fn in_flight(&self) -> u64 {
        self.executions() + self.pending()
    }
}

impl InFlight for OperatorStats {
    fn id(&self) -> OperatorId {
        self.id
    }
    fn executions(&self) -> u64 {
        self.executions
    }
    fn pending(&self) -> u64 {
        self.pending
    }
}

/// Per-operator rows kept in lexicographic name order, addressable by `OperatorId`.
#[derive(Debug, Clone)]
pub struct OperatorTable<T> {
    rows: Vec<T>,
    position: Vec<usize>,
}

impl<T> OperatorTable<T> {
    pub fn new(ops: &OperatorSet, mut make: impl FnMut(OperatorId, &str) -> T) -> Self {
        let mut position = vec![0; ops.len()];
        let rows = ops
            .lexicographic()
            .iter()
            .enumerate()
            .map(|(pos, &id)| {
                position[id.0] = pos;
                make(id, ops.name(id))
            })
            .collect();
        Self { rows, position }
    }

    /// Rows in lexicographic name order.
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.rows.iter_mut()
    }

    pub fn get(&self, id: OperatorId) -> Option<&T> {
        self.position.get(id.0).map(|&p| &self.rows[p])
    }

    pub fn get_mut(&mut self, id: OperatorId) -> Option<&mut T> {
        let p = *self.position.get(id.0)?;
        self.rows.get_mut(p)
    }
}

impl<T: InFlight> OperatorTable<T> {
    pub fn any_untried(&self) -> bool {
        self.rows.iter().any(|r| r.executions() == 0)
    }

    pub fn total_executions(&self) -> u64 {
        self.rows.iter().map(InFlight::executions).sum()
    }

    /// Operator with the fewest `executions + pending` (first in name order on ties).
    pub fn least_in_flight(&self) -> OperatorId {
        let mut best = &self.rows[0];
        for r in &self.rows[1..] {
            if r.in_flight() < best.in_flight() {
                best = r;
            }
        }
        best.id()
    }

    /// Highest score wins; first in name order on ties.
    pub fn argmax(&self, mut score: impl FnMut(&T) -> f64) -> OperatorId {
        let mut best = self.rows[0].id();
        let mut best_score = f64::NEG_INFINITY;
        for r in &self.rows {
            let s = score(r);
            if s > best_score {
                best_score = s;
                best = r.id();
            }
        }
        best
    }
}
