//! Reward sources ("operators"): payoff as a pure function of the time step.
//!
//! An [`Operator`] never looks at past selections. Sources that involve randomness
//! draw everything they need at construction time, from an RNG the caller passes in,
//! and then index the drawn table by `time`. Two operators built from the same seed
//! therefore produce the same rewards, whatever policy is querying them.
//!
//! Wrappers ([`Operator::with_noise`], [`Operator::smoothed`], [`Operator::bernoulli`])
//! take ownership of an inner operator and keep its name. They also expose
//! [`Operator::plotable_reward`], the signal without the random distortion, which is
//! what diagnostics want to draw.
//!
//! Precomputed tables cover `[0, horizon)`; later time steps wrap around.

use std::collections::VecDeque;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::error::{check_range, Error, Result};

/// Slow transitions reach this fraction of completion `length` steps from the center.
const SLOW_STEP_COMPLETION: f64 = 0.99;
/// Beyond this logistic exponent the transition is saturated.
const SLOW_STEP_SATURATION: f64 = 100.0;

/// Discrete time index.
pub type Time = usize;

/// Index of an operator inside an [`OperatorSet`] (construction order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorId(pub usize);

/// Logistic transition from `before` to `after`, centered at `step_time`.
#[derive(Debug, Clone, Copy)]
pub struct SlowStep {
    step_time: Time,
    before: f64,
    after: f64,
    rate: f64,
}

impl SlowStep {
    fn new(step_time: Time, before: f64, after: f64, length: f64) -> Result<Self> {
        if !(length.is_finite() && length > 0.0) {
            return Err(Error::InvalidParameter {
                name: "length",
                value: length,
            });
        }
        let k = 1.0 - SLOW_STEP_COMPLETION;
        Ok(Self {
            step_time,
            before,
            after,
            rate: (1.0 / k - 1.0).ln() / length,
        })
    }

    fn reward(&self, time: Time) -> f64 {
        let arg = -self.rate * (time as f64 - self.step_time as f64);
        if arg < -SLOW_STEP_SATURATION {
            self.after
        } else if arg < SLOW_STEP_SATURATION {
            (self.after - self.before) / (1.0 + arg.exp()) + self.before
        } else {
            self.before
        }
    }
}

/// Two slow steps: into the door at `door_begin`, out of it at `door_end`.
#[derive(Debug, Clone, Copy)]
pub struct SlowDoor {
    midpoint: Time,
    enter: SlowStep,
    leave: SlowStep,
}

impl SlowDoor {
    fn reward(&self, time: Time) -> f64 {
        if time < self.midpoint {
            self.enter.reward(time)
        } else {
            self.leave.reward(time)
        }
    }
}

/// How an operator produces its reward.
#[derive(Debug, Clone)]
pub enum Source {
    Constant(f64),
    Step {
        step_time: Time,
        before: f64,
        after: f64,
    },
    SlowStep(SlowStep),
    Door {
        door_begin: Time,
        door_end: Time,
        outside: f64,
        inside: f64,
    },
    SlowDoor(SlowDoor),
    /// Pre-drawn per-step choice between a low and a high payoff.
    Regime(Vec<f64>),
    /// Inner reward plus a pre-drawn zero-mean perturbation, clipped to `[0, 1]`.
    Noise {
        inner: Box<Source>,
        perturbation: Vec<f64>,
    },
    /// Trailing moving average of the inner reward.
    Smooth {
        inner: Box<Source>,
        values: Vec<f64>,
        plot_values: Vec<f64>,
    },
    /// Inner reward read as a probability and quantized to `{0, 1}`.
    Bernoulli {
        inner: Box<Source>,
        draws: Vec<f64>,
    },
}

fn lookup(table: &[f64], time: Time) -> f64 {
    if table.is_empty() {
        0.0
    } else {
        table[time % table.len()]
    }
}

/// Past the end of the table the last value holds.
fn lookup_clamped(table: &[f64], time: Time) -> f64 {
    table.get(time).or(table.last()).copied().unwrap_or(0.0)
}

impl Source {
    fn reward(&self, time: Time) -> f64 {
        match self {
            Source::Constant(v) => *v,
            Source::Step {
                step_time,
                before,
                after,
            } => {
                if time < *step_time {
                    *before
                } else {
                    *after
                }
            }
            Source::SlowStep(s) => s.reward(time),
            Source::Door {
                door_begin,
                door_end,
                outside,
                inside,
            } => {
                if *door_begin < time && time < *door_end {
                    *inside
                } else {
                    *outside
                }
            }
            Source::SlowDoor(d) => d.reward(time),
            Source::Regime(values) => lookup(values, time),
            Source::Noise {
                inner,
                perturbation,
            } => (inner.reward(time) + lookup(perturbation, time)).clamp(0.0, 1.0),
            Source::Smooth { values, .. } => lookup_clamped(values, time),
            Source::Bernoulli { inner, draws } => {
                if lookup(draws, time) < inner.reward(time) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn plotable_reward(&self, time: Time) -> f64 {
        match self {
            Source::Noise { inner, .. } | Source::Bernoulli { inner, .. } => {
                inner.plotable_reward(time)
            }
            Source::Smooth { plot_values, .. } => lookup_clamped(plot_values, time),
            other => other.reward(time),
        }
    }
}

/// A named reward source.
#[derive(Debug, Clone)]
pub struct Operator {
    name: String,
    source: Source,
}

fn check_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        Err(Error::ZeroHorizon)
    } else {
        Ok(())
    }
}

fn moving_average(inner: &Source, window: usize, horizon: usize, plot: bool) -> Vec<f64> {
    let mut sample: VecDeque<f64> = VecDeque::with_capacity(window + 1);
    let mut sum = 0.0;
    let mut out = Vec::with_capacity(horizon);
    for t in 0..horizon {
        let r = if plot {
            inner.plotable_reward(t)
        } else {
            inner.reward(t)
        };
        sample.push_back(r);
        sum += r;
        if sample.len() > window {
            if let Some(old) = sample.pop_front() {
                sum -= old;
            }
        }
        out.push(sum / sample.len() as f64);
    }
    out
}

impl Operator {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Fixed payoff.
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Source::Constant(value))
    }

    /// `before` until `step_time`, `after` from `step_time` on.
    pub fn step(name: impl Into<String>, step_time: Time, before: f64, after: f64) -> Self {
        Self::new(
            name,
            Source::Step {
                step_time,
                before,
                after,
            },
        )
    }

    /// Logistic transition centered at `step_time`, 99% complete `length` steps away
    /// on either side.
    pub fn slow_step(
        name: impl Into<String>,
        step_time: Time,
        before: f64,
        after: f64,
        length: f64,
    ) -> Result<Self> {
        Ok(Self::new(
            name,
            Source::SlowStep(SlowStep::new(step_time, before, after, length)?),
        ))
    }

    /// `inside` strictly between `door_begin` and `door_end`, `outside` elsewhere.
    pub fn door(
        name: impl Into<String>,
        door_begin: Time,
        door_end: Time,
        outside: f64,
        inside: f64,
    ) -> Result<Self> {
        if door_end < door_begin {
            return Err(Error::InvalidParameter {
                name: "door_end",
                value: door_end as f64,
            });
        }
        Ok(Self::new(
            name,
            Source::Door {
                door_begin,
                door_end,
                outside,
                inside,
            },
        ))
    }

    /// A door with logistic edges.
    ///
    /// Each edge may use at most half the door width; a longer `length` is clamped
    /// (with a warning).
    pub fn slow_door(
        name: impl Into<String>,
        door_begin: Time,
        door_end: Time,
        outside: f64,
        inside: f64,
        length: f64,
    ) -> Result<Self> {
        let name = name.into();
        if door_end < door_begin {
            return Err(Error::InvalidParameter {
                name: "door_end",
                value: door_end as f64,
            });
        }
        let max_length = (door_end - door_begin) as f64 / 2.0;
        let length = if length > max_length {
            warn!(
                operator = %name,
                requested = length,
                used = max_length,
                "slow door transition longer than half the door width; clamping"
            );
            max_length
        } else {
            length
        };
        let door = SlowDoor {
            midpoint: door_begin + (door_end - door_begin) / 2,
            enter: SlowStep::new(door_begin, outside, inside, length)?,
            leave: SlowStep::new(door_end, inside, outside, length)?,
        };
        Ok(Self::new(name, Source::SlowDoor(door)))
    }

    /// Independent per-step choice: `high` with probability `p_high`, else `low`.
    pub fn random_regime<R: Rng + ?Sized>(
        name: impl Into<String>,
        low: f64,
        high: f64,
        p_high: f64,
        horizon: usize,
        rng: &mut R,
    ) -> Result<Self> {
        check_horizon(horizon)?;
        let p_high = check_range("p_high", p_high, 0.0, 1.0)?;
        let values = (0..horizon)
            .map(|_| {
                if rng.random::<f64>() < p_high {
                    high
                } else {
                    low
                }
            })
            .collect();
        Ok(Self::new(name, Source::Regime(values)))
    }

    /// Add pre-drawn Gaussian noise with standard deviation `sigma`, clipped to `[0, 1]`.
    pub fn with_noise<R: Rng + ?Sized>(
        self,
        sigma: f64,
        horizon: usize,
        rng: &mut R,
    ) -> Result<Self> {
        check_horizon(horizon)?;
        let sigma = check_range("sigma", sigma, 0.0, f64::MAX)?;
        let normal = Normal::new(0.0, sigma).map_err(|_| Error::InvalidParameter {
            name: "sigma",
            value: sigma,
        })?;
        let perturbation = (0..horizon).map(|_| normal.sample(&mut *rng)).collect();
        Ok(Self::new(
            self.name,
            Source::Noise {
                inner: Box::new(self.source),
                perturbation,
            },
        ))
    }

    /// Replace the reward by its trailing mean over `window` steps.
    pub fn smoothed(self, window: usize, horizon: usize) -> Result<Self> {
        check_horizon(horizon)?;
        if window == 0 {
            return Err(Error::InvalidParameter {
                name: "window",
                value: 0.0,
            });
        }
        let values = moving_average(&self.source, window, horizon, false);
        let plot_values = moving_average(&self.source, window, horizon, true);
        Ok(Self::new(
            self.name,
            Source::Smooth {
                inner: Box::new(self.source),
                values,
                plot_values,
            },
        ))
    }

    /// Quantize to `1` with probability equal to the inner reward, else `0`.
    pub fn bernoulli<R: Rng + ?Sized>(self, horizon: usize, rng: &mut R) -> Result<Self> {
        check_horizon(horizon)?;
        let draws = (0..horizon).map(|_| rng.random::<f64>()).collect();
        Ok(Self::new(
            self.name,
            Source::Bernoulli {
                inner: Box::new(self.source),
                draws,
            },
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Payoff observed when this operator runs at `time`.
    pub fn reward(&self, time: Time) -> f64 {
        self.source.reward(time)
    }

    /// Payoff without random distortion (noise, quantization), for diagnostics.
    pub fn plotable_reward(&self, time: Time) -> f64 {
        self.source.plotable_reward(time)
    }
}

/// The operators of one experiment: non-empty, uniquely named, immutable.
#[derive(Debug, Clone)]
pub struct OperatorSet {
    ops: Vec<Operator>,
    lexicographic: Vec<OperatorId>,
}

impl OperatorSet {
    pub fn new(ops: Vec<Operator>) -> Result<Self> {
        if ops.is_empty() {
            return Err(Error::EmptyOperatorSet);
        }
        let mut lexicographic: Vec<OperatorId> = (0..ops.len()).map(OperatorId).collect();
        lexicographic.sort_by(|a, b| ops[a.0].name.cmp(&ops[b.0].name));
        for pair in lexicographic.windows(2) {
            if ops[pair[0].0].name == ops[pair[1].0].name {
                return Err(Error::DuplicateOperator(ops[pair[0].0].name.clone()));
            }
        }
        Ok(Self { ops, lexicographic })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get(&self, id: OperatorId) -> Option<&Operator> {
        self.ops.get(id.0)
    }

    /// Operator ids sorted by operator name (the tie-break order).
    pub fn lexicographic(&self) -> &[OperatorId] {
        &self.lexicographic
    }

    /// Operator names in construction order.
    pub fn names(&self) -> Vec<String> {
        self.ops.iter().map(|o| o.name.clone()).collect()
    }

    pub fn name(&self, id: OperatorId) -> &str {
        debug_assert!(id.0 < self.ops.len(), "unknown operator {id:?}");
        self.ops.get(id.0).map(|o| o.name.as_str()).unwrap_or("")
    }

    pub fn id_of(&self, name: &str) -> Option<OperatorId> {
        self.ops.iter().position(|o| o.name == name).map(OperatorId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperatorId, &Operator)> + '_ {
        self.ops.iter().enumerate().map(|(i, o)| (OperatorId(i), o))
    }

    pub fn reward(&self, id: OperatorId, time: Time) -> f64 {
        debug_assert!(id.0 < self.ops.len(), "unknown operator {id:?}");
        self.ops.get(id.0).map(|o| o.reward(time)).unwrap_or(0.0)
    }

    /// The operator with the highest reward at `time` (lowest name on ties).
    pub fn best_at(&self, time: Time) -> OperatorId {
        let mut best = self.lexicographic[0];
        let mut best_reward = self.reward(best, time);
        for &id in &self.lexicographic[1..] {
            let r = self.reward(id, time);
            if r > best_reward {
                best = id;
                best_reward = r;
            }
        }
        best
    }
}
