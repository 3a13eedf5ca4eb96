//! Mean cumulative regret of every policy on one preset environment.
//!
//! Run:
//! `cargo run --example regret_table -- "noisy door" 10 20`
//!
//! Arguments (all optional): scenario name, batch size λ, number of runs.
//! `RUST_LOG=dmab=debug` shows drift resets as they happen.

use std::sync::Arc;

use dmab::{
    Dmab, DmabConfig, Experiment, OperatorSet, Policy, RouletteConfig, RouletteDmab, Rsmab,
    Scenario, SlidingConfig, Simulation, Smab, Uniform,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HORIZON: usize = 20_000;

fn policies(ops: &Arc<OperatorSet>, seed: u64) -> dmab::Result<Vec<Box<dyn Policy>>> {
    let mut out: Vec<Box<dyn Policy>> = vec![
        Box::new(Uniform::with_seed(ops, seed)),
        Box::new(Dmab::new(ops, DmabConfig::dmab())),
        Box::new(Dmab::new(ops, DmabConfig::dmab_lr())),
        Box::new(Dmab::new(ops, DmabConfig::pdmab())),
        Box::new(Dmab::new(ops, DmabConfig::pdmab_lr())),
        Box::new(RouletteDmab::with_seed(ops, RouletteConfig::rdmab(), seed)?),
    ];
    for kappa in [0.0, 5.0, 10.0, 20.0] {
        out.push(Box::new(RouletteDmab::with_seed(
            ops,
            RouletteConfig::krdmab(kappa),
            seed,
        )?));
    }
    out.push(Box::new(RouletteDmab::with_seed(
        ops,
        RouletteConfig::krdmab_lr(10.0),
        seed,
    )?));
    out.push(Box::new(Smab::new(ops, SlidingConfig::default())));
    for beta in [1.0, 5.0, 10.0] {
        out.push(Box::new(Rsmab::with_seed(
            ops,
            SlidingConfig::default(),
            beta,
            seed,
        )?));
    }
    Ok(out)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let scenario: Scenario = args.next().as_deref().unwrap_or("door").parse()?;
    let batch: usize = args.next().map(|s| s.parse::<usize>()).transpose()?.unwrap_or(1);
    let runs: usize = args.next().map(|s| s.parse::<usize>()).transpose()?.unwrap_or(5);

    let sim = Simulation::new(batch, HORIZON)?;
    info!(%scenario, batch, runs, horizon = HORIZON, "running experiment");
    let report = Experiment::new(sim, runs)?
        .with_seed(42)
        .run(|rng| scenario.build(HORIZON, rng), policies)?;

    let events = report.mean_events();
    let mut rows: Vec<(&str, f64, f64)> = report
        .final_regret()
        .into_iter()
        .zip(events)
        .map(|((name, regret), (_, ev))| (name, regret, ev))
        .collect();
    rows.sort_by(|a, b| a.1.total_cmp(&b.1));

    println!("{scenario}, λ={batch}, {runs} runs, T={HORIZON}");
    println!("{:<14} {:>12} {:>10}", "policy", "regret", "resets");
    for (name, regret, ev) in rows {
        println!("{name:<14} {regret:>12.1} {ev:>10.1}");
    }
    Ok(())
}
