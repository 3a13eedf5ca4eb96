//! Page–Hinkley change detection, embedded in reward ingestion.
//!
//! For every observation `r_t` against the running mean `r̄_t` (already updated with
//! `r_t`) the detector accumulates
//!
//! ```text
//!   m_t = m_{t-1} + (r̄_t - r_t + δ)      Direction::Increase (default)
//!   m_t = m_{t-1} + (r_t - r̄_t + δ)      Direction::Decrease
//!   M_t = max(M_{t-1}, m_t)
//! ```
//!
//! and raises an alarm when `M_t - m_t > λ`. `δ` absorbs slow drift so a stationary
//! stream keeps `m` climbing; `λ` sets the alarm level.

/// Which persistent move of the observed rewards raises the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Rewards rising above the running mean by more than `δ`.
    #[default]
    Increase,
    /// Rewards falling below the running mean by more than `δ`.
    Decrease,
}

/// Page–Hinkley parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageHinkleyConfig {
    /// Tolerance `δ` (robustness against slow change).
    pub delta: f64,
    /// Alarm level `λ` (typically 0.5 to 20).
    pub lambda: f64,
    pub direction: Direction,
}

impl Default for PageHinkleyConfig {
    fn default() -> Self {
        Self {
            delta: 0.15,
            lambda: 0.8,
            direction: Direction::Increase,
        }
    }
}

impl PageHinkleyConfig {
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// An alarm level no finite stream can reach.
    pub fn disabled() -> Self {
        Self {
            lambda: f64::INFINITY,
            ..Self::default()
        }
    }
}

/// Output of an update that crossed the alarm level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHinkleyAlarm {
    pub mean_deviation: f64,
    pub max_deviation: f64,
    pub lambda: f64,
}

/// Page–Hinkley accumulator state for one operator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageHinkley {
    mean_deviation: f64,
    max_deviation: f64,
}

impl PageHinkley {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn mean_deviation(&self) -> f64 {
        self.mean_deviation
    }

    pub fn max_deviation(&self) -> f64 {
        self.max_deviation
    }

    /// Current distance below the running maximum.
    pub fn score(&self) -> f64 {
        self.max_deviation - self.mean_deviation
    }

    /// Feed one observation. `mean` must already include `reward`.
    pub fn update(
        &mut self,
        cfg: &PageHinkleyConfig,
        mean: f64,
        reward: f64,
    ) -> Option<PageHinkleyAlarm> {
        let deviation = match cfg.direction {
            Direction::Increase => mean - reward,
            Direction::Decrease => reward - mean,
        };
        self.mean_deviation += deviation + cfg.delta;
        self.max_deviation = self.max_deviation.max(self.mean_deviation);
        if self.score() > cfg.lambda {
            Some(PageHinkleyAlarm {
                mean_deviation: self.mean_deviation,
                max_deviation: self.max_deviation,
                lambda: cfg.lambda,
            })
        } else {
            None
        }
    }
}
