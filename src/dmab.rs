//! Dynamic multi-armed bandit (UCB1 + Page–Hinkley restarts).
//!
//! One type, [`Dmab`], covers four policies through [`DmabConfig`]:
//!
//! | name       | accounting   | reset scope |
//! |------------|--------------|-------------|
//! | `DMAB`     | sequential   | global      |
//! | `DMAB-LR`  | sequential   | local       |
//! | `PDMAB`    | parallel     | global      |
//! | `PDMAB-LR` | parallel     | local       |
//!
//! *Warm-up*: while some operator has never been rewarded, pick the operator with the
//! fewest `executions + pending`. *Exploitation*: argmax of the UCB1 score. Parallel
//! accounting counts pending selections in the score, so one batch does not pile onto
//! a single operator whose reward has not arrived yet.

use tracing::debug;

use crate::drift::PageHinkleyConfig;
use crate::operator::{OperatorId, OperatorSet, Time};
use crate::policy::{
    reset_event_for, ucb_score, OperatorStats, OperatorTable, Policy, PolicyRecord, RESET_EVENT,
};

/// Default UCB exploration constant.
pub const DEFAULT_EXPLORATION_C: f64 = 1.4;

/// What a drift alarm resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResetScope {
    /// Every operator and the global execution counter.
    #[default]
    Global,
    /// Only the operator whose detector fired.
    Local,
}

/// Whether pending (selected, not yet rewarded) executions count in the UCB score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Accounting {
    #[default]
    Sequential,
    Parallel,
}

/// Configuration for [`Dmab`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmabConfig {
    /// Exploration constant `C`.
    pub c: f64,
    pub page_hinkley: PageHinkleyConfig,
    pub reset: ResetScope,
    pub accounting: Accounting,
}

impl Default for DmabConfig {
    fn default() -> Self {
        Self {
            c: DEFAULT_EXPLORATION_C,
            page_hinkley: PageHinkleyConfig::default(),
            reset: ResetScope::Global,
            accounting: Accounting::Sequential,
        }
    }
}

impl DmabConfig {
    pub fn dmab() -> Self {
        Self::default()
    }

    pub fn dmab_lr() -> Self {
        Self::default().with_reset(ResetScope::Local)
    }

    pub fn pdmab() -> Self {
        Self::default().with_accounting(Accounting::Parallel)
    }

    pub fn pdmab_lr() -> Self {
        Self::pdmab().with_reset(ResetScope::Local)
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_page_hinkley(mut self, ph: PageHinkleyConfig) -> Self {
        self.page_hinkley = ph;
        self
    }

    pub fn with_reset(mut self, reset: ResetScope) -> Self {
        self.reset = reset;
        self
    }

    pub fn with_accounting(mut self, accounting: Accounting) -> Self {
        self.accounting = accounting;
        self
    }

    /// Conventional policy name for this configuration.
    pub fn label(&self) -> &'static str {
        match (self.accounting, self.reset) {
            (Accounting::Sequential, ResetScope::Global) => "DMAB",
            (Accounting::Sequential, ResetScope::Local) => "DMAB-LR",
            (Accounting::Parallel, ResetScope::Global) => "PDMAB",
            (Accounting::Parallel, ResetScope::Local) => "PDMAB-LR",
        }
    }
}

/// Statistics and reward ingestion shared by the UCB-scored policies.
#[derive(Debug, Clone)]
pub(crate) struct UcbState {
    pub(crate) stats: OperatorTable<OperatorStats>,
    pub(crate) total_executions: u64,
    pub(crate) total_pending: u64,
    pub(crate) page_hinkley: PageHinkleyConfig,
    pub(crate) reset: ResetScope,
}

impl UcbState {
    pub(crate) fn new(ops: &OperatorSet, page_hinkley: PageHinkleyConfig, reset: ResetScope) -> Self {
        Self {
            stats: OperatorTable::new(ops, OperatorStats::new),
            total_executions: 0,
            total_pending: 0,
            page_hinkley,
            reset,
        }
    }

    pub(crate) fn clear_pending(&mut self) {
        for s in self.stats.iter_mut() {
            s.pending = 0;
        }
        self.total_pending = 0;
    }

    pub(crate) fn mark_pending(&mut self, op: OperatorId) {
        if let Some(s) = self.stats.get_mut(op) {
            s.pending += 1;
        }
        self.total_pending += 1;
    }

    /// Fold in one reward; on a drift alarm apply the reset and return the event kind.
    pub(crate) fn ingest(&mut self, policy: &str, op: OperatorId, value: f64) -> Option<String> {
        self.total_executions += 1;
        let ph = self.page_hinkley;
        let s = self.stats.get_mut(op)?;
        let alarm = s.observe(value, &ph)?;
        match self.reset {
            ResetScope::Global => {
                debug!(
                    policy,
                    operator = %s.name,
                    score = alarm.max_deviation - alarm.mean_deviation,
                    "page-hinkley alarm; resetting all operators"
                );
                self.reset_all();
                Some(RESET_EVENT.to_string())
            }
            ResetScope::Local => {
                let prior = s.executions;
                debug!(
                    policy,
                    operator = %s.name,
                    executions = prior,
                    "page-hinkley alarm; resetting operator"
                );
                let kind = reset_event_for(&s.name);
                s.reset();
                debug_assert!(
                    prior <= self.total_executions,
                    "execution counter underflow: {prior} > {}",
                    self.total_executions
                );
                self.total_executions = self.total_executions.saturating_sub(prior);
                Some(kind)
            }
        }
    }

    pub(crate) fn reset_all(&mut self) {
        self.total_executions = 0;
        for s in self.stats.iter_mut() {
            s.reset();
        }
    }
}

/// DMAB / DMAB-LR / PDMAB / PDMAB-LR.
#[derive(Debug, Clone)]
pub struct Dmab {
    name: String,
    cfg: DmabConfig,
    state: UcbState,
    record: PolicyRecord,
}

impl Dmab {
    pub fn new(ops: &OperatorSet, cfg: DmabConfig) -> Self {
        let name = cfg.label().to_string();
        Self {
            state: UcbState::new(ops, cfg.page_hinkley, cfg.reset),
            record: PolicyRecord::new(name.clone(), ops),
            name,
            cfg,
        }
    }

    /// Override the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.record.policy = self.name.clone();
        self
    }

    pub fn config(&self) -> &DmabConfig {
        &self.cfg
    }

    /// Per-operator statistics, in lexicographic name order.
    pub fn stats(&self) -> &[OperatorStats] {
        self.state.stats.rows()
    }

    pub fn stats_for(&self, op: OperatorId) -> Option<&OperatorStats> {
        self.state.stats.get(op)
    }

    pub fn total_executions(&self) -> u64 {
        self.state.total_executions
    }

    pub fn total_pending(&self) -> u64 {
        self.state.total_pending
    }

    /// Whether some operator still needs its first reward.
    pub fn in_warm_up(&self) -> bool {
        self.state.stats.any_untried()
    }

    /// The exploitation score of one operator under the current accounting.
    pub fn score(&self, s: &OperatorStats) -> f64 {
        match self.cfg.accounting {
            Accounting::Sequential => {
                ucb_score(s.mean_reward, self.cfg.c, self.state.total_executions, s.executions)
            }
            Accounting::Parallel => ucb_score(
                s.mean_reward,
                self.cfg.c,
                self.state.total_executions + self.state.total_pending,
                s.executions + s.pending,
            ),
        }
    }
}

impl Policy for Dmab {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_duration(&mut self, duration: usize) {
        self.record.set_duration(duration);
    }

    fn before_select(&mut self) {
        self.state.clear_pending();
    }

    fn select(&mut self, _time: Time) -> OperatorId {
        let chosen = if self.in_warm_up() {
            self.state.stats.least_in_flight()
        } else {
            self.state.stats.argmax(|s| self.score(s))
        };
        self.state.mark_pending(chosen);
        chosen
    }

    fn reward(&mut self, step: Time, op: OperatorId, value: f64) {
        self.record.record(step, op, value);
        if let Some(kind) = self.state.ingest(&self.name, op, value) {
            self.record.event(step, &kind);
        }
    }

    fn record(&self) -> &PolicyRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut PolicyRecord {
        &mut self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;

    fn three() -> OperatorSet {
        OperatorSet::new(vec![
            Operator::constant("bad0", 0.1),
            Operator::constant("bad1", 0.2),
            Operator::constant("good", 0.9),
        ])
        .unwrap()
    }

    fn step_seq(p: &mut Dmab, ops: &OperatorSet, t: Time) -> OperatorId {
        p.before_select();
        let op = p.select(t);
        p.before_reward();
        p.reward(t, op, ops.reward(op, t));
        op
    }

    #[test]
    fn labels_follow_configuration() {
        assert_eq!(DmabConfig::dmab().label(), "DMAB");
        assert_eq!(DmabConfig::dmab_lr().label(), "DMAB-LR");
        assert_eq!(DmabConfig::pdmab().label(), "PDMAB");
        assert_eq!(DmabConfig::pdmab_lr().label(), "PDMAB-LR");
    }

    #[test]
    fn warm_up_tries_each_operator_once_in_name_order() {
        let ops = three();
        let mut p = Dmab::new(&ops, DmabConfig::dmab());
        p.set_duration(3);
        let picked: Vec<&str> = (0..3).map(|t| ops.name(step_seq(&mut p, &ops, t))).collect();
        assert_eq!(picked, vec!["bad0", "bad1", "good"]);
        assert!(!p.in_warm_up());
        assert!(p.stats().iter().all(|s| s.executions == 1));
        assert_eq!(p.total_executions(), 3);
    }

    #[test]
    fn warm_up_spreads_a_batch_over_untried_operators() {
        let ops = three();
        let mut p = Dmab::new(&ops, DmabConfig::dmab());
        p.set_duration(6);
        p.before_select();
        let picked: Vec<&str> = (0..6).map(|t| ops.name(p.select(t))).collect();
        assert_eq!(picked, vec!["bad0", "bad1", "good", "bad0", "bad1", "good"]);
        assert_eq!(p.total_pending(), 6);
        p.before_select();
        assert_eq!(p.total_pending(), 0);
        assert!(p.stats().iter().all(|s| s.pending == 0));
    }

    #[test]
    fn sequential_dmab_repeats_within_a_batch_parallel_does_not() {
        let ops = three();
        let mut seq = Dmab::new(&ops, DmabConfig::dmab());
        let mut par = Dmab::new(&ops, DmabConfig::pdmab());
        for p in [&mut seq, &mut par] {
            p.set_duration(13);
            for t in 0..3 {
                step_seq(p, &ops, t);
            }
        }
        seq.before_select();
        par.before_select();
        let s: Vec<OperatorId> = (3..13).map(|t| seq.select(t)).collect();
        let q: Vec<OperatorId> = (3..13).map(|t| par.select(t)).collect();
        assert!(s.iter().all(|&id| id == s[0]));
        assert!(q.iter().any(|&id| id != q[0]));
    }

    #[test]
    fn global_reset_clears_every_operator() {
        let ops = three();
        let mut p = Dmab::new(&ops, DmabConfig::dmab());
        p.set_duration(10);
        let good = ops.id_of("good").unwrap();
        let bad = ops.id_of("bad0").unwrap();
        // A low history on "bad0" followed by a sudden rise trips the detector.
        for t in 0..5 {
            p.reward(t, bad, 0.0);
        }
        p.reward(5, good, 0.5);
        p.reward(6, bad, 1.0);
        assert!(p.record().events.is_empty());
        p.reward(7, bad, 1.0);
        assert_eq!(p.record().events.get(RESET_EVENT), Some(&vec![7]));
        assert_eq!(p.total_executions(), 0);
        assert!(p.stats().iter().all(|s| s.executions == 0));
        assert!(p.in_warm_up());
    }

    #[test]
    fn local_reset_only_touches_the_triggering_operator() {
        let ops = three();
        let mut p = Dmab::new(&ops, DmabConfig::dmab_lr());
        p.set_duration(10);
        let good = ops.id_of("good").unwrap();
        let bad = ops.id_of("bad0").unwrap();
        for t in 0..5 {
            p.reward(t, bad, 0.0);
        }
        p.reward(5, good, 0.5);
        let good_before = p.stats_for(good).unwrap().clone();
        p.reward(6, bad, 1.0);
        p.reward(7, bad, 1.0);
        assert_eq!(p.record().events.get("reset bad0"), Some(&vec![7]));
        assert_eq!(p.stats_for(bad).unwrap().executions, 0);
        assert_eq!(p.stats_for(good).unwrap(), &good_before);
        assert_eq!(p.total_executions(), 1);
        assert_eq!(
            p.total_executions(),
            p.stats().iter().map(|s| s.executions).sum::<u64>()
        );
    }
}
