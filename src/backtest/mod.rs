//! Backtesting: bankroll ledger, single-run engine, metrics, Monte Carlo
//! over signal order, and synthetic outcomes.

pub mod engine;
pub mod ledger;
pub mod metrics;
pub mod monte_carlo;
pub mod synthetic;

pub use engine::{BacktestEngine, EngineState, SkipCounts};
pub use ledger::{BankrollState, BetResult, LedgerEntry};
pub use metrics::{BacktestReport, SummaryMetrics, TierBreakdown};
pub use monte_carlo::{CancelHandle, MonteCarloRunner, SimulationBatch, SimulationStats};
pub use synthetic::OutcomeSimulator;
