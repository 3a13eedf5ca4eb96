//! Roulette-wheel DMAB: UCB1 scores used as selection weights instead of an argmax.
//!
//! - `RDMAB`: weights are the raw UCB1 scores.
//! - `KRDMAB κ`: non-positive scores are dropped, the rest are normalized to the best
//!   score and raised to `κ`. `κ = 0` is uniform over tried operators, `κ = 1` is RDMAB,
//!   large `κ` approaches the DMAB argmax.
//! - `KRDMAB-LR κ`: the same wheel with per-operator drift resets.
//!
//! The wheel is rebuilt once per batch in `before_select`; each selection consumes the
//! uniform draw pre-generated for its time step.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dmab::{ResetScope, UcbState, DEFAULT_EXPLORATION_C};
use crate::drift::PageHinkleyConfig;
use crate::error::{check_range, Result};
use crate::operator::{OperatorId, OperatorSet, Time};
use crate::policy::{ucb_score, OperatorStats, Policy, PolicyRecord};
use crate::wheel::{Slot, Wheel};

/// Configuration for [`RouletteDmab`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouletteConfig {
    /// Exploration constant `C`.
    pub c: f64,
    pub page_hinkley: PageHinkleyConfig,
    pub reset: ResetScope,
    /// Exponent applied to normalized scores; `None` uses raw scores (RDMAB).
    pub kappa: Option<f64>,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self {
            c: DEFAULT_EXPLORATION_C,
            page_hinkley: PageHinkleyConfig::default(),
            reset: ResetScope::Global,
            kappa: None,
        }
    }
}

impl RouletteConfig {
    pub fn rdmab() -> Self {
        Self::default()
    }

    pub fn krdmab(kappa: f64) -> Self {
        Self {
            kappa: Some(kappa),
            ..Self::default()
        }
    }

    pub fn krdmab_lr(kappa: f64) -> Self {
        Self::krdmab(kappa).with_reset(ResetScope::Local)
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

    /// Conventional policy name for this configuration.
    pub fn label(&self) -> String {
        let lr = match self.reset {
            ResetScope::Global => "",
            ResetScope::Local => "-LR",
        };
        match self.kappa {
            None => format!("RDMAB{lr}"),
            Some(k) => format!("KRDMAB{lr} {k}"),
        }
    }
}

/// RDMAB / KRDMAB / KRDMAB-LR.
#[derive(Debug, Clone)]
pub struct RouletteDmab {
    name: String,
    cfg: RouletteConfig,
    state: UcbState,
    rng: StdRng,
    draws: Vec<f64>,
    wheel: Wheel,
    record: PolicyRecord,
}

impl RouletteDmab {
    /// Create with a deterministic fixed seed (0).
    pub fn new(ops: &OperatorSet, cfg: RouletteConfig) -> Result<Self> {
        Self::with_seed(ops, cfg, 0)
    }

    /// Create with an explicit seed for the wheel draws.
    ///
    /// Fails with [`Error::InvalidParameter`](crate::Error::InvalidParameter) when `κ` is
    /// negative or not finite.
    pub fn with_seed(ops: &OperatorSet, cfg: RouletteConfig, seed: u64) -> Result<Self> {
        if let Some(kappa) = cfg.kappa {
            check_range("kappa", kappa, 0.0, f64::MAX)?;
        }
        let name = cfg.label();
        Ok(Self {
            state: UcbState::new(ops, cfg.page_hinkley, cfg.reset),
            record: PolicyRecord::new(name.clone(), ops),
            name,
            cfg,
            rng: StdRng::seed_from_u64(seed),
            draws: Vec::new(),
            wheel: Wheel::default(),
        })
    }

    pub fn config(&self) -> &RouletteConfig {
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

    /// The wheel built for the current batch.
    pub fn wheel(&self) -> &Wheel {
        &self.wheel
    }

    fn build_wheel(&self) -> Wheel {
        let total = self.state.total_executions;
        let scored: Vec<Slot> = self
            .state
            .stats
            .rows()
            .iter()
            .filter(|s| s.executions != 0)
            .map(|s| Slot {
                op: s.id,
                score: ucb_score(s.mean_reward, self.cfg.c, total, s.executions),
            })
            .collect();
        let Some(kappa) = self.cfg.kappa else {
            return Wheel::new(scored);
        };
        let positive: Vec<Slot> = scored.into_iter().filter(|s| s.score > 0.0).collect();
        let max = positive
            .iter()
            .map(|s| s.score)
            .fold(f64::NEG_INFINITY, f64::max);
        Wheel::new(
            positive
                .into_iter()
                .map(|s| Slot {
                    op: s.op,
                    score: (s.score / max).powf(kappa),
                })
                .collect(),
        )
    }

    fn draw(&mut self, time: Time) -> f64 {
        if self.draws.is_empty() {
            return self.rng.random();
        }
        self.draws[time % self.draws.len()]
    }
}

impl Policy for RouletteDmab {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_duration(&mut self, duration: usize) {
        self.record.set_duration(duration);
        let rng = &mut self.rng;
        self.draws = (0..duration).map(|_| rng.random::<f64>()).collect();
    }

    fn before_select(&mut self) {
        self.state.clear_pending();
        self.wheel = self.build_wheel();
    }

    fn select(&mut self, time: Time) -> OperatorId {
        let chosen = if self.state.stats.any_untried() {
            self.state.stats.least_in_flight()
        } else {
            let fraction = self.draw(time);
            self.wheel
                .spin(fraction)
                .unwrap_or_else(|| self.state.stats.least_in_flight())
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
