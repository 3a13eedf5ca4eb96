//! `dmab`: adaptive operator selection with dynamic multi-armed bandits.
//!
//! The setting: a search algorithm (an evolutionary loop, a portfolio solver) has a
//! small set of *operators* and must repeatedly decide which one to apply. Each
//! application yields a reward in `[0, 1]`, and which operator is best changes over
//! time. Feedback arrives in batches: a whole generation of `λ` selections is made
//! before any of its rewards come back.
//!
//! An [`Operator`] is a reward source indexed by time. A [`Policy`] chooses among the
//! operators of an [`OperatorSet`], and a [`Simulation`] replays the batched loop.
//!
//! **Policies:**
//! - [`Dmab`]: UCB1 with Page–Hinkley restarts. [`DmabConfig`] selects DMAB, DMAB-LR
//!   (local resets), PDMAB (pending-aware scores) and PDMAB-LR.
//! - [`RouletteDmab`]: UCB1 scores as roulette weights (RDMAB), optionally normalized
//!   and sharpened by an exponent κ (KRDMAB, KRDMAB-LR).
//! - [`Smab`] / [`Rsmab`]: sliding-window UCB without drift detection; RSMAB spins a
//!   sorted wheel with `Beta(1, β)` draws.
//! - [`Reference`] (oracle) and [`Uniform`]: baselines for regret.
//!
//! **Determinism:** every random quantity comes from a seeded `StdRng` owned by the
//! operator or policy that uses it. Policies pre-draw one value per time step in
//! [`Policy::set_duration`], so the same seed gives the same run regardless of batch
//! size. Ties are always broken toward the lexicographically smallest operator name.
//!
//! ```
//! use dmab::{Dmab, DmabConfig, Operator, OperatorSet, Policy, Simulation};
//!
//! let ops = OperatorSet::new(vec![
//!     Operator::constant("bad", 0.1),
//!     Operator::constant("good", 0.9),
//! ])?;
//! let mut policy = Dmab::new(&ops, DmabConfig::pdmab());
//! Simulation::new(10, 1_000)?.run(&mut policy, &ops);
//! let counts = policy.record().selection_counts();
//! assert!(counts[1] > counts[0]);
//! # Ok::<(), dmab::Error>(())
//! ```
//!
//! **Non-goals:** no real optimizer integration, no plotting, no persistence beyond
//! the optional `serde` derives.

#![forbid(unsafe_code)]

mod error;
pub use error::{Error, Result};

mod operator;
pub use operator::*;

pub mod drift;
pub use drift::{Direction, PageHinkley, PageHinkleyAlarm, PageHinkleyConfig};

mod window;
pub use window::*;

mod wheel;
pub use wheel::*;

mod policy;
pub use policy::*;

mod dmab;
pub use dmab::{Accounting, Dmab, DmabConfig, ResetScope, DEFAULT_EXPLORATION_C};

mod roulette;
pub use roulette::*;

mod smab;
pub use smab::*;

mod baseline;
pub use baseline::*;

mod simulate;
pub use simulate::*;

mod scenario;
pub use scenario::*;
