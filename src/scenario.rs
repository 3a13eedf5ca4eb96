//! Named operator environments for experiments.
//!
//! Change points are absolute time steps (most scenarios are laid out for a horizon
//! of 20 000). `horizon` only sizes the pre-drawn noise and regime tables.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::{Error, Result};
use crate::operator::{Operator, OperatorSet, Time};

/// A preset operator environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scenario {
    /// Three poor constant operators and one clearly better.
    OneGood,
    /// Three near-equal good operators and one poor.
    OneBad,
    /// Eleven noisy constants from 0 to 1.
    NoisyLadder,
    /// Twenty doors opening one after another.
    SimpleChanging,
    NoisySimpleChanging,
    /// Seven doors of varying width with logistic edges.
    SlowChanging,
    NoisySlowChanging,
    /// Two constants and one operator that is best inside a door.
    Door,
    NoisyDoor,
    /// Two slow steps crossing each other.
    SlowReplacement,
    NoisySlowReplacement,
    /// A bit of every source kind.
    Everything,
}

const DOOR_WIDTH: Time = 1_000;
const DOOR_NAMES: &str = "abcdefghijklmnopqrst";

/// `(begin, end, length)` of the slow-changing doors.
const SLOW_DOORS: [(Time, Time, f64); 7] = [
    (0, 2_000, 500.0),
    (2_000, 5_000, 600.0),
    (5_000, 7_000, 400.0),
    (7_000, 10_000, 1_000.0),
    (10_000, 15_000, 2_500.0),
    (15_000, 17_000, 500.0),
    (17_000, 250_000, 1_000.0),
];

impl Scenario {
    pub const ALL: [Scenario; 12] = [
        Scenario::OneGood,
        Scenario::OneBad,
        Scenario::NoisyLadder,
        Scenario::SimpleChanging,
        Scenario::NoisySimpleChanging,
        Scenario::SlowChanging,
        Scenario::NoisySlowChanging,
        Scenario::Door,
        Scenario::NoisyDoor,
        Scenario::SlowReplacement,
        Scenario::NoisySlowReplacement,
        Scenario::Everything,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::OneGood => "one good",
            Scenario::OneBad => "one bad",
            Scenario::NoisyLadder => "noisy ladder",
            Scenario::SimpleChanging => "simple changing",
            Scenario::NoisySimpleChanging => "noisy simple changing",
            Scenario::SlowChanging => "slow changing",
            Scenario::NoisySlowChanging => "noisy slow changing",
            Scenario::Door => "door",
            Scenario::NoisyDoor => "noisy door",
            Scenario::SlowReplacement => "slow replacement",
            Scenario::NoisySlowReplacement => "noisy slow replacement",
            Scenario::Everything => "everything",
        }
    }

    /// Build the operators, drawing any randomness from `rng`.
    pub fn build<R: Rng + ?Sized>(self, horizon: usize, rng: &mut R) -> Result<OperatorSet> {
        let ops = match self {
            Scenario::OneGood => vec![
                Operator::constant("bad0", 0.0),
                Operator::constant("bad1", 0.1),
                Operator::constant("bad2", 0.2),
                Operator::constant("good", 0.9),
            ],
            Scenario::OneBad => vec![
                Operator::constant("bad", 0.1),
                Operator::constant("good1", 0.91),
                Operator::constant("good2", 0.92),
                Operator::constant("good3", 0.93),
            ],
            Scenario::NoisyLadder => (0..=10)
                .map(|i| {
                    Operator::constant(format!("step{i}"), i as f64 / 10.0)
                        .with_noise(0.08, horizon, &mut *rng)
                })
                .collect::<Result<Vec<_>>>()?,
            Scenario::SimpleChanging => simple_doors(None, horizon, rng)?,
            Scenario::NoisySimpleChanging => simple_doors(Some(0.2), horizon, rng)?,
            Scenario::SlowChanging => slow_doors(None, horizon, rng)?,
            Scenario::NoisySlowChanging => slow_doors(Some(0.15), horizon, rng)?,
            Scenario::Door => vec![
                Operator::constant("bad", 0.2),
                Operator::constant("bof", 0.5),
                Operator::door("door", 3_000, 12_000, 0.1, 0.8)?,
            ],
            Scenario::NoisyDoor => vec![
                Operator::constant("bad", 0.2).with_noise(0.08, horizon, rng)?,
                Operator::constant("bof", 0.5).with_noise(0.08, horizon, rng)?,
                Operator::door("door", 3_000, 12_000, 0.1, 0.8)?.with_noise(0.08, horizon, rng)?,
            ],
            Scenario::SlowReplacement => vec![
                Operator::constant("bad0", 0.0),
                Operator::slow_step("slowGoodThenBad", 5_000, 0.0, 1.0, 5_000.0)?,
                Operator::slow_step("slowBadThenGood", 5_000, 1.0, 0.0, 5_000.0)?,
            ],
            Scenario::NoisySlowReplacement => vec![
                Operator::constant("bad0", 0.0).with_noise(0.1, horizon, rng)?,
                Operator::constant("bad1", 0.1).with_noise(0.1, horizon, rng)?,
                Operator::constant("bad2", 0.2).with_noise(0.1, horizon, rng)?,
                Operator::slow_step("slowGoodThenBad", 5_000, 0.0, 1.0, 5_000.0)?
                    .with_noise(0.15, horizon, rng)?,
                Operator::slow_step("slowBadThenGood", 5_000, 1.0, 0.0, 5_000.0)?
                    .with_noise(0.15, horizon, rng)?,
            ],
            Scenario::Everything => vec![
                Operator::constant("bad0", 0.0),
                Operator::constant("bad1", 0.01),
                Operator::constant("bad2", 0.02),
                Operator::constant("noisyBad", 0.0).with_noise(0.05, horizon, rng)?,
                Operator::step("goodThenBad", 10_000, 0.0, 0.5),
                Operator::step("badThenGood", 10_000, 0.5, 0.0),
                Operator::slow_step("slowGoodThenBad", 10_000, 0.0, 0.6, 5_000.0)?,
                Operator::slow_step("slowBadThenGood", 10_000, 0.6, 0.0, 5_000.0)?,
                Operator::random_regime("bofBofWow", 0.45, 1.0, 0.1, horizon, rng)?,
                Operator::constant("noisyGood", 0.5).with_noise(0.1, horizon, rng)?,
            ],
        };
        OperatorSet::new(ops)
    }
}

fn simple_doors<R: Rng + ?Sized>(
    sigma: Option<f64>,
    horizon: usize,
    rng: &mut R,
) -> Result<Vec<Operator>> {
    DOOR_NAMES
        .chars()
        .enumerate()
        .map(|(i, name)| {
            let begin = i * DOOR_WIDTH;
            let op = Operator::door(name.to_string(), begin, begin + DOOR_WIDTH, 0.1, 0.9)?;
            match sigma {
                Some(s) => op.with_noise(s, horizon, &mut *rng),
                None => Ok(op),
            }
        })
        .collect()
}

fn slow_doors<R: Rng + ?Sized>(
    sigma: Option<f64>,
    horizon: usize,
    rng: &mut R,
) -> Result<Vec<Operator>> {
    DOOR_NAMES
        .chars()
        .zip(SLOW_DOORS)
        .map(|(name, (begin, end, length))| {
            let op = Operator::slow_door(name.to_string(), begin, end, 0.1, 0.9, length)?;
            match sigma {
                Some(s) => op.with_noise(s, horizon, &mut *rng),
                None => Ok(op),
            }
        })
        .collect()
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace(['-', '_'], " ").to_lowercase();
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == wanted)
            .ok_or_else(|| Error::UnknownScenario(s.to_string()))
    }
}
