//! Sliding-window bandits: SMAB (argmax) and RSMAB (sorted roulette with Beta draws).
//!
//! Each operator keeps only its last few rewards; the bounded window is what adapts to
//! non-stationarity, so there is no drift detector and no reset. The global counter
//! counts *selections*, not rewards.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};

use crate::dmab::DEFAULT_EXPLORATION_C;
use crate::error::{Error, Result};
use crate::operator::{OperatorId, OperatorSet, Time};
use crate::policy::{ucb_score, InFlight, OperatorTable, Policy, PolicyRecord};
use crate::wheel::{Slot, Wheel};
use crate::window::{RewardWindow, DEFAULT_WINDOW_CAP};

/// Configuration shared by [`Smab`] and [`Rsmab`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlidingConfig {
    /// Exploration constant `C`.
    pub c: f64,
    /// Rewards kept per operator.
    pub window: usize,
    /// SMAB score of an untried operator, before subtracting its pending count.
    pub untried_score: f64,
}

impl Default for SlidingConfig {
    fn default() -> Self {
        Self {
            c: DEFAULT_EXPLORATION_C,
            window: DEFAULT_WINDOW_CAP,
            untried_score: 1000.0,
        }
    }
}

impl SlidingConfig {
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

/// Per-operator state of the sliding-window policies.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlidingStats {
    pub id: OperatorId,
    pub name: String,
    pub executions: u64,
    pub pending: u64,
    pub rewards: RewardWindow,
}

impl InFlight for SlidingStats {
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

fn sliding_table(ops: &OperatorSet, window: usize) -> OperatorTable<SlidingStats> {
    OperatorTable::new(ops, |id, name| SlidingStats {
        id,
        name: name.to_string(),
        executions: 0,
        pending: 0,
        rewards: RewardWindow::new(window),
    })
}

fn clear_pending(stats: &mut OperatorTable<SlidingStats>) {
    for s in stats.iter_mut() {
        s.pending = 0;
    }
}

fn observe(stats: &mut OperatorTable<SlidingStats>, op: OperatorId, value: f64) {
    if let Some(s) = stats.get_mut(op) {
        s.rewards.push(value);
        s.executions += 1;
    }
}

/// Sliding-window UCB with pending-aware exploration.
#[derive(Debug, Clone)]
pub struct Smab {
    name: String,
    cfg: SlidingConfig,
    stats: OperatorTable<SlidingStats>,
    total_selections: u64,
    record: PolicyRecord,
}

impl Smab {
    pub fn new(ops: &OperatorSet, cfg: SlidingConfig) -> Self {
        let name = "SMAB".to_string();
        Self {
            stats: sliding_table(ops, cfg.window),
            record: PolicyRecord::new(name.clone(), ops),
            name,
            cfg,
            total_selections: 0,
        }
    }

    pub fn stats(&self) -> &[SlidingStats] {
        self.stats.rows()
    }

    pub fn total_selections(&self) -> u64 {
        self.total_selections
    }

    /// Untried operators score high (less so with each pending selection); tried ones
    /// score `window mean + C * sqrt(ln(total) / (executions + pending))`.
    pub fn score(&self, s: &SlidingStats) -> f64 {
        if s.executions == 0 {
            self.cfg.untried_score - s.pending as f64
        } else {
            ucb_score(
                s.rewards.mean(),
                self.cfg.c,
                self.total_selections,
                s.executions + s.pending,
            )
        }
    }
}

impl Policy for Smab {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_duration(&mut self, duration: usize) {
        self.record.set_duration(duration);
    }

    fn before_select(&mut self) {
        clear_pending(&mut self.stats);
    }

    fn select(&mut self, _time: Time) -> OperatorId {
        let chosen = self.stats.argmax(|s| self.score(s));
        self.total_selections += 1;
        if let Some(s) = self.stats.get_mut(chosen) {
            s.pending += 1;
        }
        chosen
    }

    fn reward(&mut self, step: Time, op: OperatorId, value: f64) {
        self.record.record(step, op, value);
        observe(&mut self.stats, op, value);
    }

    fn record(&self) -> &PolicyRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut PolicyRecord {
        &mut self.record
    }
}

/// Sorted roulette over sliding-window UCB scores, spun with `Beta(1, β)` draws.
///
/// `β = 1` is a plain roulette; larger `β` pushes draws toward the front of the
/// descending wheel, i.e. toward the best-scored operator.
#[derive(Debug, Clone)]
pub struct Rsmab {
    name: String,
    cfg: SlidingConfig,
    beta: Beta<f64>,
    stats: OperatorTable<SlidingStats>,
    total_selections: u64,
    rng: StdRng,
    draws: Vec<f64>,
    wheel: Wheel,
    record: PolicyRecord,
}

impl Rsmab {
    /// Create with a deterministic fixed seed (0).
    pub fn new(ops: &OperatorSet, cfg: SlidingConfig, beta: f64) -> Result<Self> {
        Self::with_seed(ops, cfg, beta, 0)
    }

    pub fn with_seed(ops: &OperatorSet, cfg: SlidingConfig, beta: f64, seed: u64) -> Result<Self> {
        let dist = Beta::new(1.0, beta).map_err(|_| Error::InvalidParameter {
            name: "beta",
            value: beta,
        })?;
        let name = format!("RSMAB {beta}");
        Ok(Self {
            stats: sliding_table(ops, cfg.window),
            record: PolicyRecord::new(name.clone(), ops),
            name,
            cfg,
            beta: dist,
            total_selections: 0,
            rng: StdRng::seed_from_u64(seed),
            draws: Vec::new(),
            wheel: Wheel::default(),
        })
    }

    pub fn stats(&self) -> &[SlidingStats] {
        self.stats.rows()
    }

    pub fn total_selections(&self) -> u64 {
        self.total_selections
    }

    pub fn wheel(&self) -> &Wheel {
        &self.wheel
    }

    fn build_wheel(&self) -> Wheel {
        let total = self.total_selections + 1;
        Wheel::sorted_descending(
            self.stats
                .rows()
                .iter()
                .filter(|s| s.executions != 0)
                .map(|s| Slot {
                    op: s.id,
                    score: ucb_score(s.rewards.mean(), self.cfg.c, total, s.executions),
                })
                .collect(),
        )
    }

    fn draw(&mut self, time: Time) -> f64 {
        if self.draws.is_empty() {
            return self.beta.sample(&mut self.rng);
        }
        self.draws[time % self.draws.len()]
    }
}

impl Policy for Rsmab {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_duration(&mut self, duration: usize) {
        self.record.set_duration(duration);
        let (beta, rng) = (&self.beta, &mut self.rng);
        self.draws = (0..duration).map(|_| beta.sample(&mut *rng)).collect();
    }

    fn before_select(&mut self) {
        clear_pending(&mut self.stats);
        self.wheel = self.build_wheel();
    }

    fn select(&mut self, time: Time) -> OperatorId {
        let unseen = self
            .stats
            .rows()
            .iter()
            .find(|s| s.in_flight() == 0)
            .map(|s| s.id);
        let chosen = match unseen {
            Some(id) => id,
            None => {
                let fraction = self.draw(time);
                self.wheel
                    .spin(fraction)
                    .unwrap_or_else(|| self.stats.least_in_flight())
            }
        };
        self.total_selections += 1;
        if let Some(s) = self.stats.get_mut(chosen) {
            s.pending += 1;
        }
        chosen
    }

    fn reward(&mut self, step: Time, op: OperatorId, value: f64) {
        self.record.record(step, op, value);
        observe(&mut self.stats, op, value);
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

    fn ops() -> OperatorSet {
        OperatorSet::new(vec![
            Operator::constant("a", 0.2),
            Operator::constant("b", 0.8),
        ])
        .unwrap()
    }

    #[test]
    fn smab_spreads_untried_operators_within_a_batch() {
        let ops = ops();
        let mut p = Smab::new(&ops, SlidingConfig::default());
        p.set_duration(4);
        p.before_select();
        let picked: Vec<&str> = (0..4).map(|t| ops.name(p.select(t))).collect();
        assert_eq!(picked, vec!["a", "b", "a", "b"]);
        assert_eq!(p.total_selections(), 4);
    }

    #[test]
    fn smab_window_forgets_old_rewards() {
        let ops = ops();
        let mut p = Smab::new(&ops, SlidingConfig::default().with_window(3));
        p.set_duration(10);
        let a = ops.id_of("a").unwrap();
        for (t, r) in [0.0, 0.0, 0.0, 1.0, 1.0, 1.0].into_iter().enumerate() {
            p.reward(t, a, r);
        }
        let s = &p.stats()[0];
        assert_eq!(s.executions, 6);
        assert_eq!(s.rewards.len(), 3);
        assert!((s.rewards.mean() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn smab_settles_on_the_better_operator() {
        let ops = ops();
        let mut p = Smab::new(&ops, SlidingConfig::default().with_c(0.1));
        p.set_duration(200);
        for t in 0..200 {
            p.before_select();
            let op = p.select(t);
            p.reward(t, op, ops.reward(op, t));
        }
        let counts = p.record().selection_counts();
        assert!(counts[1] > 190, "{counts:?}");
    }

    #[test]
    fn rsmab_rejects_invalid_beta() {
        let ops = ops();
        assert!(Rsmab::new(&ops, SlidingConfig::default(), 0.0).is_err());
        assert!(Rsmab::new(&ops, SlidingConfig::default(), f64::NAN).is_err());
    }

    #[test]
    fn rsmab_runs_each_operator_once_then_uses_a_sorted_wheel() {
        let ops = ops();
        let mut p = Rsmab::with_seed(&ops, SlidingConfig::default(), 5.0, 3).unwrap();
        p.set_duration(50);
        p.before_select();
        assert_eq!(ops.name(p.select(0)), "a");
        assert_eq!(ops.name(p.select(1)), "b");
        // Both in flight: the wheel is still empty, fall back to least executed.
        assert_eq!(ops.name(p.select(2)), "a");
        p.reward(0, OperatorId(0), 0.2);
        p.reward(1, OperatorId(1), 0.8);
        p.reward(2, OperatorId(0), 0.2);
        p.before_select();
        let slots = p.wheel().slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].op, OperatorId(1));
        assert!(slots[0].score >= slots[1].score);
    }

    #[test]
    fn large_beta_favours_the_front_of_the_wheel() {
        let ops = ops();
        let run = |beta: f64| {
            let mut p = Rsmab::with_seed(&ops, SlidingConfig::default(), beta, 11).unwrap();
            p.set_duration(2_000);
            for t in 0..2_000 {
                p.before_select();
                let op = p.select(t);
                p.reward(t, op, ops.reward(op, t));
            }
            p.record().selection_counts()[1]
        };
        assert!(run(20.0) > run(1.0));
    }
}
