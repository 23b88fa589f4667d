//! End-to-end tests: detection through backtest and Monte Carlo.

mod common;
mod monte_carlo;
mod pipeline;
