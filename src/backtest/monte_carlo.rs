//! Monte Carlo over signal order.
//!
//! Every trial replays the same signals in a different shuffled order through
//! a fresh `BacktestEngine`. Trial `i` owns a `ChaCha8Rng` seeded with
//! `base_seed + i`, so a batch is reproducible from its base seed alone and
//! does not depend on how many workers ran it.
//!
//! Trials run on scoped threads over disjoint chunks of a pre-sized slot
//! vector; the shared signals and outcomes are only ever read.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

use super::engine::BacktestEngine;
use super::metrics::BacktestReport;
use crate::config::{BacktestConfig, MonteCarloConfig};
use crate::types::{EngineError, Outcomes, Signal};

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p5: f64,
    pub median: f64,
    pub p95: f64,
}

impl DistributionSummary {
    /// Summary of `values`; all zeros for an empty slice.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Self {
            mean,
            std_dev: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p5: percentile(&sorted, 0.05),
            median: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
        }
    }
}

/// Nearest-rank percentile of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let idx = (p * (n - 1) as f64).round() as usize;
            sorted[idx.min(n - 1)]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    pub trials: usize,
    pub final_bankroll: DistributionSummary,
    pub roi: DistributionSummary,
    pub mean_max_drawdown: f64,
    /// Fraction of trials with ROI > 0.
    pub probability_profit: f64,
    /// Fraction of trials with ROI >= 0.
    pub probability_breakeven: f64,
}

impl SimulationStats {
    pub fn from_reports(reports: &[BacktestReport]) -> Self {
        if reports.is_empty() {
            return Self::default();
        }

        let n = reports.len() as f64;
        let finals: Vec<f64> = reports
            .iter()
            .map(|r| r.summary.final_bankroll.to_f64().unwrap_or(0.0))
            .collect();
        let rois: Vec<f64> = reports.iter().map(|r| r.summary.roi).collect();

        Self {
            trials: reports.len(),
            final_bankroll: DistributionSummary::from_values(&finals),
            roi: DistributionSummary::from_values(&rois),
            mean_max_drawdown: reports.iter().map(|r| r.summary.max_drawdown).sum::<f64>() / n,
            probability_profit: rois.iter().filter(|&&r| r > 0.0).count() as f64 / n,
            probability_breakeven: rois.iter().filter(|&&r| r >= 0.0).count() as f64 / n,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationBatch {
    pub base_seed: u64,
    pub trials_requested: usize,
    /// Completed trial reports in trial order.
    pub reports: Vec<BacktestReport>,
    pub stats: SimulationStats,
    /// Set when the batch stopped early; `reports` then holds only the
    /// trials that finished.
    pub cancelled: bool,
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cloneable flag that stops a running batch before its next trial.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Re-arm the handle so the next batch can run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

type TrialSlot = Option<Result<BacktestReport, EngineError>>;

pub struct MonteCarloRunner {
    config: MonteCarloConfig,
    backtest: BacktestConfig,
    cancel: CancelHandle,
}

impl MonteCarloRunner {
    pub fn new(config: MonteCarloConfig, backtest: BacktestConfig) -> Result<Self, EngineError> {
        config.validate()?;
        // Reject bad backtest settings before any worker starts.
        BacktestEngine::new(backtest.clone())?;
        Ok(Self {
            config,
            backtest,
            cancel: CancelHandle::default(),
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Worker count: configured, else available parallelism, never more
    /// than the trial count.
    pub fn worker_count(&self) -> usize {
        let available = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        self.config
            .workers
            .unwrap_or(available)
            .clamp(1, self.config.trials.max(1))
    }

    /// Run the batch. Trials not started when the handle is cancelled are
    /// dropped from the result.
    pub fn run(&self, signals: &[Signal], outcomes: &Outcomes) -> Result<SimulationBatch, EngineError> {
        let trials = self.config.trials;
        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        let workers = self.worker_count();
        let chunk_size = trials.div_ceil(workers);

        info!(
            trials,
            workers,
            base_seed,
            signals = signals.len(),
            "Starting Monte Carlo batch"
        );

        let mut slots: Vec<TrialSlot> = Vec::with_capacity(trials);
        slots.resize_with(trials, || None);

        thread::scope(|scope| {
            for (chunk_index, chunk) in slots.chunks_mut(chunk_size).enumerate() {
                let start = chunk_index * chunk_size;
                scope.spawn(move || {
                    for (offset, slot) in chunk.iter_mut().enumerate() {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        *slot = Some(self.run_trial(start + offset, base_seed, signals, outcomes));
                    }
                });
            }
        });

        let mut reports = Vec::with_capacity(trials);
        for slot in slots.into_iter().flatten() {
            reports.push(slot?);
        }

        let cancelled = reports.len() < trials;
        let stats = SimulationStats::from_reports(&reports);

        info!(
            completed = reports.len(),
            cancelled,
            mean_final = format!("{:.2}", stats.final_bankroll.mean),
            mean_roi = format!("{:+.2}%", stats.roi.mean),
            p_profit = format!("{:.1}%", stats.probability_profit * 100.0),
            "Monte Carlo batch complete"
        );

        Ok(SimulationBatch {
            base_seed,
            trials_requested: trials,
            reports,
            stats,
            cancelled,
        })
    }

    fn run_trial(
        &self,
        trial: usize,
        base_seed: u64,
        signals: &[Signal],
        outcomes: &Outcomes,
    ) -> Result<BacktestReport, EngineError> {
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(trial as u64));
        let mut order: Vec<&Signal> = signals.iter().collect();
        order.shuffle(&mut rng);

        let mut engine = BacktestEngine::new(self.backtest.clone())?;
        let report = engine.run_sequence(order, outcomes)?;
        debug!(trial, roi = format!("{:+.2}%", report.summary.roi), "Trial complete");
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
