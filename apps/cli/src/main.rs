#![deny(warnings)]

//! Headless driver: builds a simulation from a scenario (or the built-in
//! demo), runs it period by period and prints per-company KPIs.

mod scenario;

use anyhow::Result;
use chrono::Utc;
use persistence::SqliteStore;
use scenario::{Scenario, Script};
use sim_core::validate_state;
use sim_runtime::{PeriodReport, SimulationEngine, SimulationFactory};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PERIODS: u32 = 12;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<PathBuf>,
    periods: Option<u32>,
    seed: Option<u64>,
    db: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next().map(PathBuf::from),
            "--periods" => args.periods = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--db" => args.db = it.next(),
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

fn print_kpis(engine: &SimulationEngine, report: &PeriodReport) {
    for id in report.evaluated.iter().chain(&report.idle) {
        let (Some(company), Some(perf)) = (
            engine.company(id),
            engine.company_performance(id, Some(report.period)),
        ) else {
            continue;
        };
        println!(
            "P{:>2} | {:<16} | cash: ${} | revenue: ${} | profit: ${} | share: {:.1}% | brand: {:.1} | roi: {:.2}",
            report.period,
            company.name,
            company.cash_balance.round_dp(0),
            perf.revenue.round_dp(0),
            perf.profit.round_dp(0),
            perf.market_share * 100.0,
            company.brand_value,
            perf.roi,
        );
    }
    if let Some(event) = report.event.as_ref().and_then(|id| {
        engine
            .events(Some(report.period + 1))
            .into_iter()
            .find(|e| &e.id == id)
    }) {
        println!(
            "    event: {} ({}, strength {:.2})",
            event.name,
            event.category.as_str(),
            event.impact_strength
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        ?args,
        "starting CLI"
    );

    let now = Utc::now();
    let (mut engine, mut script) = match &args.scenario {
        Some(path) => {
            let mut scenario = Scenario::load(path)?;
            if let Some(seed) = args.seed {
                scenario.config.rng_seed = seed;
            }
            scenario.build(now)?
        }
        None => {
            let mut state = SimulationFactory::demo(now);
            if let Some(seed) = args.seed {
                state.simulation.config.rng_seed = seed;
            }
            (SimulationEngine::new(state), Script::default())
        }
    };
    validate_state(engine.state())?;

    let store = match &args.db {
        Some(url) => {
            let store = SqliteStore::connect(url).await?;
            store.save_state(engine.state()).await?;
            Some(store)
        }
        None => None,
    };

    let periods = args
        .periods
        .or(engine.state().simulation.config.periods)
        .unwrap_or(DEFAULT_PERIODS);
    let sim = engine.state().simulation.clone();
    println!(
        "Simulation {} ({}) | companies: {} | products: {} | scripted decisions: {} | periods: {}",
        sim.name,
        sim.id,
        engine.state().companies.len(),
        engine.state().products.len(),
        script.len(),
        periods
    );

    for _ in 0..periods {
        let period = engine.current_period();
        for (company, kind) in script.take(period) {
            engine.submit_decision(company, kind, Utc::now());
        }
        let staged = engine.stage_advance(Utc::now());
        if let Some(store) = &store {
            store.save_state(&staged.state).await?;
        }
        let report = engine.publish(staged)?;
        for d in &report.diagnostics {
            warn!(period, diagnostic = ?d, "period diagnostic");
        }
        print_kpis(&engine, &report);
    }

    if let Err(e) = validate_state(engine.state()) {
        warn!(error = %e, "final state breaks an invariant");
    }
    info!(period = engine.current_period(), "run finished");
    Ok(())
}
