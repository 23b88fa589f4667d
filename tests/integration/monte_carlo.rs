use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use matchpoint::backtest::{MonteCarloRunner, OutcomeSimulator, SimulationBatch};
use matchpoint::config::{AppConfig, BacktestConfig, MonteCarloConfig};
use matchpoint::strategy::detector::SignalFilter;
use matchpoint::strategy::StrategyPipeline;
use matchpoint::types::{ConfidenceTier, Outcomes, Signal};

use crate::common::{make_outcomes, make_slate};

fn make_inputs() -> (Vec<Signal>, Outcomes) {
    let slate = make_slate();
    let pipeline = StrategyPipeline::from_config(&AppConfig::default()).unwrap();
    let filter = SignalFilter::new(ConfidenceTier::Low, 0.0, 0.05);
    let recs = pipeline.recommend(&slate, &filter, 10_000.0);
    (recs.signals, make_outcomes(&slate))
}

fn run_batch(trials: usize, seed: u64, workers: usize, signals: &[Signal], outcomes: &Outcomes) -> SimulationBatch {
    let runner = MonteCarloRunner::new(
        MonteCarloConfig {
            trials,
            seed: Some(seed),
            workers: Some(workers),
        },
        BacktestConfig::default(),
    )
    .unwrap();
    runner.run(signals, outcomes).unwrap()
}

#[test]
fn test_five_thousand_trials_reproducible() {
    let (signals, outcomes) = make_inputs();
    let a = run_batch(5_000, 2024, 4, &signals, &outcomes);
    let b = run_batch(5_000, 2024, 4, &signals, &outcomes);

    assert_eq!(a.reports.len(), 5_000);
    assert!((a.stats.final_bankroll.mean - b.stats.final_bankroll.mean).abs() < 1e-9);
    assert!((a.stats.final_bankroll.std_dev - b.stats.final_bankroll.std_dev).abs() < 1e-9);
    assert!((a.stats.roi.mean - b.stats.roi.mean).abs() < 1e-9);
    assert_eq!(a.stats.probability_profit, b.stats.probability_profit);
    assert_eq!(a.stats.probability_breakeven, b.stats.probability_breakeven);
}

#[test]
fn test_results_independent_of_worker_count() {
    let (signals, outcomes) = make_inputs();
    let serial = run_batch(300, 77, 1, &signals, &outcomes);
    let parallel = run_batch(300, 77, 4, &signals, &outcomes);

    assert_eq!(serial.stats, parallel.stats);
    for (x, y) in serial.reports.iter().zip(&parallel.reports) {
        assert_eq!(x.summary.final_bankroll, y.summary.final_bankroll);
    }
}

#[test]
fn test_every_trial_conserves_and_bounds_drawdown() {
    let (signals, outcomes) = make_inputs();
    let batch = run_batch(200, 5, 3, &signals, &outcomes);

    for report in &batch.reports {
        let s = &report.summary;
        assert_eq!(s.pushes, 0);
        let payouts: rust_decimal::Decimal = report.ledger.iter().map(|e| e.payout).sum();
        assert_eq!(s.final_bankroll, s.initial_bankroll + payouts);
        assert!((0.0..=1.0).contains(&s.max_drawdown));
        assert_eq!(s.total_bets, signals.len());
    }
    let stats = &batch.stats;
    assert!(stats.final_bankroll.min <= stats.final_bankroll.median);
    assert!(stats.final_bankroll.median <= stats.final_bankroll.max);
}

#[test]
fn test_different_seeds_shuffle_differently() {
    let (signals, outcomes) = make_inputs();
    let a = run_batch(50, 1, 2, &signals, &outcomes);
    let b = run_batch(50, 2, 2, &signals, &outcomes);

    let order = |batch: &SimulationBatch| -> Vec<String> {
        batch.reports[0].ledger.iter().map(|e| e.event_id.clone()).collect()
    };
    assert_ne!(order(&a), order(&b));
}

#[test]
fn test_batch_over_synthesised_outcomes() {
    let slate = make_slate();
    let (signals, _) = make_inputs();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let outcomes = OutcomeSimulator::default().simulate(&slate, &mut rng);
    assert_eq!(outcomes.len(), slate.len());

    let batch = run_batch(100, 99, 2, &signals, &outcomes);
    assert_eq!(batch.stats.trials, 100);
    assert!(!batch.cancelled);
    assert!(batch.stats.probability_breakeven >= batch.stats.probability_profit);
}
