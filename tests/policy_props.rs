//! Property tests for the selection policies and their building blocks.

use std::collections::BTreeSet;
use std::sync::Arc;

use dmab::{
    ucb_score, Dmab, DmabConfig, Operator, OperatorId, OperatorSet, Policy, Reference,
    RouletteConfig, RouletteDmab, Rsmab, SlidingConfig, Simulation, Slot, Smab, Uniform, Wheel,
};
use proptest::prelude::*;

/// One step-change operator per `(before, after, at)`.
fn stepped(levels: &[(f64, f64, usize)]) -> OperatorSet {
    OperatorSet::new(
        levels
            .iter()
            .enumerate()
            .map(|(i, &(before, after, at))| Operator::step(format!("op{i}"), at, before, after))
            .collect(),
    )
    .unwrap()
}

fn constants(values: &[f64]) -> OperatorSet {
    OperatorSet::new(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Operator::constant(format!("op{i}"), v))
            .collect(),
    )
    .unwrap()
}

fn policy(kind: usize, ops: &Arc<OperatorSet>, seed: u64) -> Box<dyn Policy> {
    match kind % 10 {
        0 => Box::new(Dmab::new(ops, DmabConfig::dmab())),
        1 => Box::new(Dmab::new(ops, DmabConfig::dmab_lr())),
        2 => Box::new(Dmab::new(ops, DmabConfig::pdmab())),
        3 => Box::new(Dmab::new(ops, DmabConfig::pdmab_lr())),
        4 => Box::new(RouletteDmab::with_seed(ops, RouletteConfig::rdmab(), seed).unwrap()),
        5 => Box::new(
            RouletteDmab::with_seed(ops, RouletteConfig::krdmab(5.0), seed).unwrap(),
        ),
        6 => Box::new(
            RouletteDmab::with_seed(ops, RouletteConfig::krdmab_lr(10.0), seed).unwrap(),
        ),
        7 => Box::new(Smab::new(ops, SlidingConfig::default())),
        8 => Box::new(Rsmab::with_seed(ops, SlidingConfig::default(), 5.0, seed).unwrap()),
        _ => Box::new(Uniform::with_seed(ops, seed)),
    }
}

proptest! {
    /// Before any operator repeats, every operator has been tried once.
    #[test]
    fn warm_up_tries_every_operator_first(
        values in prop::collection::vec(0.0f64..1.0, 1..8),
        batch in 1usize..10,
        kind in 0usize..9,
        seed in any::<u64>(),
    ) {
        let ops = Arc::new(constants(&values));
        let mut p = policy(kind, &ops, seed);
        Simulation::new(batch, values.len()).unwrap().run(p.as_mut(), &ops);
        let seen: BTreeSet<OperatorId> = p.record().selected.iter().flatten().copied().collect();
        prop_assert_eq!(seen.len(), values.len(), "{}", p.name());
    }

    /// Every step of every run is selected and rewarded exactly once.
    #[test]
    fn records_are_dense(
        levels in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0usize..200), 1..6),
        batch in 1usize..30,
        horizon in 1usize..200,
        kind in 0usize..10,
        seed in any::<u64>(),
    ) {
        let ops = Arc::new(stepped(&levels));
        let mut p = policy(kind, &ops, seed);
        Simulation::new(batch, horizon).unwrap().run(p.as_mut(), &ops);
        let rec = p.record();
        prop_assert!(rec.is_complete());
        prop_assert_eq!(rec.duration(), horizon);
        for t in 0..horizon {
            let op = rec.selected[t].unwrap();
            prop_assert_eq!(rec.rewards[t], Some(ops.reward(op, t)));
        }
    }

    /// The global execution counter always equals the sum over operators, whatever resets
    /// happened along the way.
    #[test]
    fn execution_counter_matches_per_operator_sum(
        levels in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0usize..300), 1..6),
        batch in 1usize..20,
        kind in 0usize..4,
    ) {
        let ops = stepped(&levels);
        let cfg = [
            DmabConfig::dmab(),
            DmabConfig::dmab_lr(),
            DmabConfig::pdmab(),
            DmabConfig::pdmab_lr(),
        ][kind];
        let mut p = Dmab::new(&ops, cfg);
        Simulation::new(batch, 300).unwrap().run(&mut p, &ops);
        let sum: u64 = p.stats().iter().map(|s| s.executions).sum();
        prop_assert_eq!(p.total_executions(), sum);
    }

    /// Stepping batches by hand: outside a reset, no operator's `executions + pending`
    /// ever goes down within a batch, and the global counter matches the per-operator
    /// sum after every selection and every reward.
    #[test]
    fn in_flight_counts_never_shrink_within_a_batch(
        levels in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0usize..300), 1..6),
        batch in 1usize..25,
        kind in 0usize..4,
    ) {
        let ops = stepped(&levels);
        let cfg = [
            DmabConfig::dmab(),
            DmabConfig::dmab_lr(),
            DmabConfig::pdmab(),
            DmabConfig::pdmab_lr(),
        ][kind];
        let horizon = 300;
        let mut p = Dmab::new(&ops, cfg);
        p.set_duration(horizon);

        let in_flight = |p: &Dmab| -> Vec<u64> {
            p.stats().iter().map(|s| s.executions + s.pending).collect()
        };
        let counters_agree = |p: &Dmab| {
            p.total_executions() == p.stats().iter().map(|s| s.executions).sum::<u64>()
                && p.total_pending() == p.stats().iter().map(|s| s.pending).sum::<u64>()
        };

        let mut start = 0;
        while start < horizon {
            let end = (start + batch).min(horizon);
            p.before_select();
            let mut prev = in_flight(&p);
            let mut chosen = Vec::with_capacity(end - start);
            for t in start..end {
                let op = p.select(t);
                chosen.push((t, op));
                let now = in_flight(&p);
                for (before, after) in prev.iter().zip(&now) {
                    prop_assert!(after >= before, "select at {}: {:?} -> {:?}", t, prev, now);
                }
                prop_assert!(counters_agree(&p), "after select at {}", t);
                prev = now;
            }
            p.before_reward();
            for (t, op) in chosen {
                let resets = p.record().event_count();
                p.reward(t, op, ops.reward(op, t));
                let now = in_flight(&p);
                if p.record().event_count() == resets {
                    for (before, after) in prev.iter().zip(&now) {
                        prop_assert!(after >= before, "reward at {}: {:?} -> {:?}", t, prev, now);
                    }
                }
                prop_assert!(counters_agree(&p), "after reward at {}", t);
                prev = now;
            }
            start = end;
        }
        prop_assert!(p.record().is_complete());
    }

    /// Normalized wheels never carry non-positive or oversized weights.
    #[test]
    fn kappa_wheel_weights_stay_in_unit_interval(
        levels in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0usize..200), 1..6),
        kappa in 0.0f64..20.0,
        batch in 1usize..10,
        seed in any::<u64>(),
    ) {
        let ops = stepped(&levels);
        let mut p = RouletteDmab::with_seed(&ops, RouletteConfig::krdmab(kappa), seed).unwrap();
        Simulation::new(batch, 200).unwrap().run(&mut p, &ops);
        p.before_select();
        for s in p.wheel().slots() {
            prop_assert!(s.score > 0.0 && s.score <= 1.0 + 1e-12, "{:?}", s);
        }
    }

    /// The oracle never accumulates less reward than any other policy.
    #[test]
    fn reference_is_an_upper_bound(
        levels in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0usize..150), 1..5),
        batch in 1usize..10,
        kind in 0usize..10,
        seed in any::<u64>(),
    ) {
        let ops = Arc::new(stepped(&levels));
        let sim = Simulation::new(batch, 150).unwrap();
        let mut oracle = Reference::new(Arc::clone(&ops));
        sim.run(&mut oracle, &ops);
        let mut p = policy(kind, &ops, seed);
        sim.run(p.as_mut(), &ops);
        prop_assert!(oracle.record().total_reward() + 1e-9 >= p.record().total_reward());
    }

    #[test]
    fn ucb_score_is_monotone(
        mean in 0.0f64..1.0,
        bump in 0.0f64..1.0,
        c in 0.0f64..3.0,
        total in 1u64..1_000_000,
        n in 1u64..1_000,
    ) {
        let base = ucb_score(mean, c, total, n);
        prop_assert!(ucb_score(mean + bump, c, total, n) >= base);
        prop_assert!(ucb_score(mean, c, total, n + 1) <= base);
        prop_assert!(ucb_score(mean, c, total + 1, n) >= base);
        prop_assert!(base >= mean);
    }

    /// A spin lands on some slot of a wheel with positive mass.
    #[test]
    fn wheel_spin_lands_on_a_slot(
        scores in prop::collection::vec(0.0f64..5.0, 1..10),
        fraction in 0.0f64..1.0,
    ) {
        let wheel = Wheel::sorted_descending(
            scores
                .iter()
                .enumerate()
                .map(|(i, &score)| Slot { op: OperatorId(i), score })
                .collect(),
        );
        match wheel.spin(fraction) {
            Some(op) => prop_assert!(op.0 < scores.len()),
            None => prop_assert!(wheel.total() <= 0.0),
        }
    }

    /// Same seeds, same trajectory.
    #[test]
    fn runs_are_reproducible(
        levels in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0usize..100), 1..5),
        batch in 1usize..10,
        kind in 0usize..10,
        seed in any::<u64>(),
    ) {
        let ops = Arc::new(stepped(&levels));
        let sim = Simulation::new(batch, 100).unwrap();
        let mut a = policy(kind, &ops, seed);
        let mut b = policy(kind, &ops, seed);
        sim.run(a.as_mut(), &ops);
        sim.run(b.as_mut(), &ops);
        prop_assert_eq!(a.record(), b.record());
    }
}
