//! Batched simulation and regret bookkeeping.
//!
//! [`Simulation`] drives one policy over one operator set for `horizon` steps with
//! feedback delayed to batch boundaries. [`Experiment`] repeats that over independent
//! runs and averages each policy's cumulative regret against [`Reference`].

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::baseline::Reference;
use crate::error::{Error, Result};
use crate::operator::{OperatorId, OperatorSet, Time};
use crate::policy::{Policy, PolicyRecord};

/// Horizon and batch size (λ) of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Simulation {
    batch: usize,
    horizon: usize,
}

impl Simulation {
    pub fn new(batch: usize, horizon: usize) -> Result<Self> {
        if batch == 0 {
            return Err(Error::ZeroBatch);
        }
        if horizon == 0 {
            return Err(Error::ZeroHorizon);
        }
        Ok(Self { batch, horizon })
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn with_batch(self, batch: usize) -> Result<Self> {
        Self::new(batch, self.horizon)
    }

    pub fn with_horizon(self, horizon: usize) -> Result<Self> {
        Self::new(self.batch, horizon)
    }

    /// Run `policy` from step 0 to `horizon - 1`.
    ///
    /// Selections of a batch are made without any of the batch's rewards. A final
    /// partial batch is still rewarded, so the policy's record is dense afterwards.
    pub fn run<P: Policy + ?Sized>(&self, policy: &mut P, ops: &OperatorSet) {
        policy.set_duration(self.horizon);
        let mut in_flight: Vec<(Time, OperatorId)> = Vec::with_capacity(self.batch);
        for step in 0..self.horizon {
            if step % self.batch == 0 {
                policy.before_select();
            }
            let op = policy.select(step);
            in_flight.push((step, op));
            if in_flight.len() == self.batch {
                deliver(policy, ops, &mut in_flight);
            }
        }
        if !in_flight.is_empty() {
            debug!(
                policy = policy.name(),
                steps = in_flight.len(),
                "flushing partial batch"
            );
            deliver(policy, ops, &mut in_flight);
        }
        let record = policy.record();
        debug!(
            policy = policy.name(),
            total_reward = record.total_reward(),
            events = record.event_count(),
            "run finished"
        );
    }
}

fn deliver<P: Policy + ?Sized>(
    policy: &mut P,
    ops: &OperatorSet,
    in_flight: &mut Vec<(Time, OperatorId)>,
) {
    policy.before_reward();
    for (step, op) in in_flight.drain(..) {
        policy.reward(step, op, ops.reward(op, step));
    }
}

/// Running sum of `reference.reward(t) - policy.reward(t)`.
///
/// Covers the reference's duration; steps the policy never rewarded count as `0`.
pub fn cumulative_regret(reference: &PolicyRecord, policy: &PolicyRecord) -> Vec<f64> {
    let mut acc = 0.0;
    (0..reference.duration())
        .map(|t| {
            acc += reference.reward_at(t) - policy.reward_at(t);
            acc
        })
        .collect()
}

/// Records of one run: the reference first, then the policies in construction order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunRecords {
    pub seed: u64,
    pub reference: PolicyRecord,
    pub policies: Vec<PolicyRecord>,
}

/// Per-policy regret averaged over runs.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExperimentReport {
    /// Policy names, as built by the first run.
    pub policies: Vec<String>,
    /// `mean_regret[i][t]`: mean cumulative regret of policy `i` after step `t`.
    pub mean_regret: Vec<Vec<f64>>,
    pub runs: Vec<RunRecords>,
}

impl ExperimentReport {
    /// `(policy, mean cumulative regret at the last step)`.
    pub fn final_regret(&self) -> Vec<(&str, f64)> {
        self.policies
            .iter()
            .zip(&self.mean_regret)
            .map(|(name, curve)| (name.as_str(), curve.last().copied().unwrap_or(0.0)))
            .collect()
    }

    /// Mean number of logged events per run, per policy.
    pub fn mean_events(&self) -> Vec<(&str, f64)> {
        let n = self.runs.len().max(1) as f64;
        self.policies
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let total: usize = self
                    .runs
                    .iter()
                    .filter_map(|r| r.policies.get(i))
                    .map(PolicyRecord::event_count)
                    .sum();
                (name.as_str(), total as f64 / n)
            })
            .collect()
    }
}

/// Independent repetitions of a [`Simulation`].
///
/// Run `i` uses seed `seed + i` both for the operator set and for the policies, so an
/// experiment is reproducible end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Experiment {
    sim: Simulation,
    runs: usize,
    seed: u64,
}

impl Experiment {
    pub fn new(sim: Simulation, runs: usize) -> Result<Self> {
        if runs == 0 {
            return Err(Error::ZeroRuns);
        }
        Ok(Self { sim, runs, seed: 0 })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Build fresh operators and policies for every run, simulate each policy, and
    /// average cumulative regret.
    ///
    /// Every run must build the same number of policies; they are matched by position.
    pub fn run<O, P>(&self, make_ops: O, make_policies: P) -> Result<ExperimentReport>
    where
        O: Fn(&mut StdRng) -> Result<OperatorSet>,
        P: Fn(&Arc<OperatorSet>, u64) -> Result<Vec<Box<dyn Policy>>>,
    {
        let horizon = self.sim.horizon();
        let mut names: Vec<String> = Vec::new();
        let mut sums: Vec<Vec<f64>> = Vec::new();
        let mut runs = Vec::with_capacity(self.runs);

        for run in 0..self.runs {
            let seed = self.seed.wrapping_add(run as u64);
            let mut rng = StdRng::seed_from_u64(seed);
            let ops = Arc::new(make_ops(&mut rng)?);

            let mut reference = Reference::new(Arc::clone(&ops));
            self.sim.run(&mut reference, &ops);
            let reference = reference.record().clone();

            let mut policies = make_policies(&ops, seed)?;
            if run == 0 {
                names = policies.iter().map(|p| p.name().to_string()).collect();
                sums = vec![vec![0.0; horizon]; policies.len()];
            } else if policies.len() != names.len() {
                return Err(Error::PolicyCountMismatch {
                    run,
                    expected: names.len(),
                    found: policies.len(),
                });
            }

            let mut records = Vec::with_capacity(policies.len());
            for (policy, sum) in policies.iter_mut().zip(sums.iter_mut()) {
                self.sim.run(policy.as_mut(), &ops);
                let regret = cumulative_regret(&reference, policy.record());
                for (acc, r) in sum.iter_mut().zip(regret) {
                    *acc += r;
                }
                records.push(policy.record().clone());
            }
            debug!(run, seed, policies = records.len(), "experiment run finished");
            runs.push(RunRecords {
                seed,
                reference,
                policies: records,
            });
        }

        let n = self.runs as f64;
        let mean_regret = sums
            .into_iter()
            .map(|curve| curve.into_iter().map(|v| v / n).collect())
            .collect();
        Ok(ExperimentReport {
            policies: names,
            mean_regret,
            runs,
        })
    }
}
