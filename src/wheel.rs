//! Roulette-wheel sampling over scored operators.
//!
//! A [`Wheel`] is built once per batch and spun once per selection with a
//! pre-drawn fraction in `[0, 1)`. The fraction is scaled by the total score and
//! the wheel is walked front to back, subtracting each slot's score until the
//! remainder falls inside a slot.
//!
//! Boundary rules:
//! - a remainder exactly equal to a slot's score selects that slot;
//! - if rounding lets the remainder run past the last slot, the last slot wins;
//! - an empty wheel (or one with no positive mass) yields `None`.

use crate::operator::OperatorId;

/// One wheel slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub op: OperatorId,
    pub score: f64,
}

/// Scores laid out for proportional selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wheel {
    slots: Vec<Slot>,
    total: f64,
}

impl Wheel {
    /// Build a wheel, keeping slot order as given.
    pub fn new(slots: Vec<Slot>) -> Self {
        let total = slots.iter().map(|s| s.score).sum();
        Self { slots, total }
    }

    /// Build a wheel sorted by descending score (stable for equal scores).
    pub fn sorted_descending(mut slots: Vec<Slot>) -> Self {
        slots.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self::new(slots)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Select the slot containing `fraction * total`.
    pub fn spin(&self, fraction: f64) -> Option<OperatorId> {
        if self.slots.is_empty() || !(self.total > 0.0) {
            return None;
        }
        let mut remainder = fraction * self.total;
        for slot in &self.slots {
            if slot.score >= remainder {
                return Some(slot.op);
            }
            remainder -= slot.score;
        }
        // Numerical fallback.
        self.slots.last().map(|s| s.op)
    }
}
