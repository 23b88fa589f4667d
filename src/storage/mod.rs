//! JSON file helpers for the CLI.
//!
//! Events and results are read from JSON produced by upstream collectors;
//! signals and reports are written back out as pretty JSON.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{Event, Outcomes};

/// Default events file path.
pub const DEFAULT_EVENTS_FILE: &str = "events.json";

/// Load cleaned events from a JSON array.
pub fn load_events(path: &str) -> Result<Vec<Event>> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read events from {path}"))?;

    let events: Vec<Event> = serde_json::from_str(&json)
        .context(format!("Failed to parse events from {path}"))?;

    info!(
        path,
        events = events.len(),
        with_estimate = events.iter().filter(|e| e.estimate.is_some()).count(),
        "Events loaded"
    );
    Ok(events)
}

/// Load a results map (`event id → {winner, status}`).
/// Returns None if the file doesn't exist.
pub fn load_outcomes(path: &str) -> Result<Option<Outcomes>> {
    if !Path::new(path).exists() {
        info!(path, "No results file found");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read results from {path}"))?;

    let outcomes: Outcomes = serde_json::from_str(&json)
        .context(format!("Failed to parse results from {path}"))?;

    info!(path, results = outcomes.len(), "Results loaded");
    Ok(Some(outcomes))
}

/// Write any serialisable value as pretty JSON.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .context("Failed to serialise value")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write {path}"))?;

    debug!(path, bytes = json.len(), "JSON saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
