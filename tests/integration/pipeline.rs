use rust_decimal::Decimal;

use matchpoint::backtest::{BacktestEngine, BetResult};
use matchpoint::config::{AppConfig, BacktestConfig};
use matchpoint::strategy::detector::SignalFilter;
use matchpoint::strategy::StrategyPipeline;
use matchpoint::types::{ConfidenceTier, SignalKind};

use crate::common::{make_outcomes, make_slate};

fn permissive_filter() -> SignalFilter {
    SignalFilter::new(ConfidenceTier::Low, f64::NEG_INFINITY, 1.0)
}

#[test]
fn test_pipeline_detects_value_and_arbitrage() {
    let pipeline = StrategyPipeline::from_config(&AppConfig::default()).unwrap();
    let recs = pipeline.recommend(&make_slate(), &permissive_filter(), 10_000.0);

    assert_eq!(recs.events_scanned, 27);
    assert_eq!(recs.detected, 13);
    assert_eq!(recs.portfolio.value_bets, 12);
    assert_eq!(recs.portfolio.arbitrage, 1);
    // 12 fair-priced events plus two incomplete records
    assert_eq!(recs.skipped, 14);

    // Ranks are contiguous and ordered by confidence
    for (i, pair) in recs.signals.windows(2).enumerate() {
        assert_eq!(pair[0].rank, Some(i + 1));
        assert!(pair[0].confidence_score >= pair[1].confidence_score);
    }
    for signal in &recs.signals {
        if signal.kind == SignalKind::ValueBet {
            assert!(signal.expected_value >= 0.05);
            assert!(signal.stake.max_fraction() <= 0.05 + 1e-12);
        }
    }
}

#[test]
fn test_default_filter_keeps_arbitrage() {
    let cfg = AppConfig::default();
    let pipeline = StrategyPipeline::from_config(&cfg).unwrap();
    let recs = pipeline.recommend(&make_slate(), &SignalFilter::from(&cfg.filter), 10_000.0);
    assert_eq!(recs.filtered_out, 0);
    assert_eq!(recs.portfolio.arbitrage, 1);
}

#[test]
fn test_tight_stake_cap_drops_arbitrage_split() {
    let pipeline = StrategyPipeline::from_config(&AppConfig::default()).unwrap();
    let filter = SignalFilter::new(ConfidenceTier::Low, 0.0, 0.05);
    let recs = pipeline.recommend(&make_slate(), &filter, 10_000.0);

    // Each arbitrage leg is roughly half the bankroll, above the 5% cap
    assert!(recs.signals.iter().all(|s| s.kind == SignalKind::ValueBet));
    assert_eq!(recs.filtered_out, 1);
}

#[test]
fn test_filter_is_idempotent_on_pipeline_output() {
    let pipeline = StrategyPipeline::from_config(&AppConfig::default()).unwrap();
    let recs = pipeline.recommend(&make_slate(), &permissive_filter(), 10_000.0);

    let filter = SignalFilter::new(ConfidenceTier::High, 0.08, 0.05);
    let once = filter.apply(&recs.signals);
    let twice = filter.apply(&once);
    assert_eq!(once, twice);
}

#[test]
fn test_backtest_over_pipeline_signals() {
    let slate = make_slate();
    let outcomes = make_outcomes(&slate);
    let pipeline = StrategyPipeline::from_config(&AppConfig::default()).unwrap();
    let recs = pipeline.recommend(&slate, &permissive_filter(), 10_000.0);

    let mut engine = BacktestEngine::new(BacktestConfig::default()).unwrap();
    let report = engine.run(&recs.signals, &outcomes).unwrap();
    let s = &report.summary;

    assert_eq!(s.total_bets, 13);
    assert_eq!(s.pushes, 1);
    assert_eq!(s.wins + s.losses + s.pushes, s.total_bets);
    assert!((0.0..=1.0).contains(&s.max_drawdown));

    // Pushes pay zero, so conservation holds across the whole ledger
    let payouts: Decimal = report.ledger.iter().map(|e| e.payout).sum();
    assert_eq!(s.final_bankroll, s.initial_bankroll + payouts);

    let arb = report
        .ledger
        .iter()
        .find(|e| e.kind == SignalKind::Arbitrage)
        .unwrap();
    assert_eq!(arb.result, BetResult::Push);

    let tier_bets: usize = report.tiers.iter().map(|t| t.bets).sum();
    assert_eq!(tier_bets, s.total_bets);
    assert!(report.to_string().contains("BACKTEST REPORT"));
}

#[test]
fn test_backtest_skips_events_without_results() {
    let slate = make_slate();
    let pipeline = StrategyPipeline::from_config(&AppConfig::default()).unwrap();
    let recs = pipeline.recommend(&slate, &permissive_filter(), 10_000.0);

    // Results only for the first half of the slate
    let outcomes = make_outcomes(&slate[..12]);
    let mut engine = BacktestEngine::new(BacktestConfig::default()).unwrap();
    let report = engine.run(&recs.signals, &outcomes).unwrap();

    assert_eq!(report.signals_processed, 13);
    assert_eq!(report.summary.total_bets + report.skips.no_outcome, 13);
    assert!(report.skips.no_outcome > 0);
}
