//! MATCHPOINT command-line driver.
//!
//! Loads configuration and events, ranks signals, backtests them against
//! known (or synthesised) results and runs a Monte Carlo batch over the
//! signal order.
//!
//! Usage: `matchpoint [events.json] [results.json]`

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tracing::{info, warn};

use matchpoint::backtest::{BacktestEngine, MonteCarloRunner, OutcomeSimulator};
use matchpoint::config::AppConfig;
use matchpoint::storage;
use matchpoint::strategy::detector::SignalFilter;
use matchpoint::strategy::StrategyPipeline;

/// Config file used when `MATCHPOINT_CONFIG` is unset.
const DEFAULT_CONFIG_FILE: &str = "matchpoint.toml";

/// Signals printed in the ranked list.
const TOP_SIGNALS: usize = 15;

fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path = std::env::var("MATCHPOINT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let cfg = if Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        info!(path = %config_path, "No config file found, using defaults");
        AppConfig::default()
    };

    let mut args = std::env::args().skip(1);
    let events_path = args.next().unwrap_or_else(|| storage::DEFAULT_EVENTS_FILE.to_string());
    let results_path = args.next();

    info!(
        config = %config_path,
        events = %events_path,
        results = ?results_path,
        bankroll = cfg.backtest.initial_bankroll,
        trials = cfg.monte_carlo.trials,
        "MATCHPOINT starting up"
    );

    // -- Signals ----------------------------------------------------------

    let events = storage::load_events(&events_path)?;
    let pipeline = StrategyPipeline::from_config(&cfg)?;
    let filter = SignalFilter::from(&cfg.filter);
    let recs = pipeline.recommend(&events, &filter, cfg.backtest.initial_bankroll);

    println!("RANKED SIGNALS ({} of {} detected)", recs.signals.len(), recs.detected);
    for signal in recs.signals.iter().take(TOP_SIGNALS) {
        println!("  {signal}");
    }
    println!();
    println!("{}", recs.portfolio);
    println!();

    if recs.signals.is_empty() {
        warn!("No signals passed the filter; nothing to backtest");
        return Ok(());
    }

    // -- Outcomes ---------------------------------------------------------

    let loaded = match results_path.as_deref() {
        Some(path) => storage::load_outcomes(path)?,
        None => None,
    };
    let outcomes = match loaded {
        Some(outcomes) => outcomes,
        None => {
            let seed = cfg.monte_carlo.seed.unwrap_or_else(rand::random);
            warn!(seed, "No results supplied, synthesising outcomes from market odds");
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            OutcomeSimulator::default().simulate(&events, &mut rng)
        }
    };

    // -- Backtest ---------------------------------------------------------

    let mut engine = BacktestEngine::new(cfg.backtest.clone())?;
    let report = engine.run(&recs.signals, &outcomes)?;
    info!(
        bets = report.summary.total_bets,
        final_bankroll = format!("{:.2}", report.summary.final_bankroll),
        roi = format!("{:+.2}%", report.summary.roi),
        "Backtest complete"
    );
    println!("{report}");
    println!();

    // -- Monte Carlo ------------------------------------------------------

    let runner = MonteCarloRunner::new(cfg.monte_carlo.clone(), cfg.backtest.clone())?;
    let batch = runner.run(&recs.signals, &outcomes)?;
    let stats = &batch.stats;

    println!("MONTE CARLO ({} trials, seed {})", stats.trials, batch.base_seed);
    println!(
        "  Final bankroll: mean {:.2}  std {:.2}  min {:.2}  max {:.2}",
        stats.final_bankroll.mean, stats.final_bankroll.std_dev, stats.final_bankroll.min, stats.final_bankroll.max
    );
    println!(
        "  ROI:            mean {:+.2}%  p5 {:+.2}%  median {:+.2}%  p95 {:+.2}%",
        stats.roi.mean, stats.roi.p5, stats.roi.median, stats.roi.p95
    );
    println!("  Mean drawdown:  {:.2}%", stats.mean_max_drawdown * 100.0);
    println!("  P(profit):      {:.1}%", stats.probability_profit * 100.0);
    println!("  P(breakeven):   {:.1}%", stats.probability_breakeven * 100.0);

    if let Ok(path) = std::env::var("MATCHPOINT_REPORT_OUT") {
        storage::save_json(stats, &path)?;
        info!(path = %path, "Simulation stats written");
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("matchpoint=info"));

    let json_logging = std::env::var("MATCHPOINT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
