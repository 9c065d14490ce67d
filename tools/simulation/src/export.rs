//! Metrics and report export
//!
//! Serializes a finished run to JSON for external consumption.

use std::path::Path;

use serde::{Deserialize, Serialize};
use types::fee::Fee;

use crate::chain::MiniChain;
use crate::metrics::SimMetrics;
use crate::scenarios::ScenarioResult;

/// Combined export containing all simulation outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationExport {
    pub version: String,
    pub metrics: SimMetrics,
    pub final_height: i64,
    /// Hash of the keeper's consensus state; empty if it could not be hashed
    pub state_hash: String,
    pub fee_pool: Fee,
    pub scenarios: Vec<ScenarioResult>,
}

/// Build a complete simulation export.
pub fn build_export(chain: &MiniChain, scenarios: Vec<ScenarioResult>) -> SimulationExport {
    let keeper = chain.keeper();
    SimulationExport {
        version: crate::VERSION.to_string(),
        metrics: chain.metrics().clone(),
        final_height: chain.height(),
        state_hash: keeper.export_dex_state().compute_hash().unwrap_or_default(),
        fee_pool: keeper.fee_pool().total().clone(),
        scenarios,
    }
}

pub fn export_json(export: &SimulationExport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(export)
}

/// Write export to a file path.
pub fn write_to_file(export: &SimulationExport, path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = export_json(export)?;
    std::fs::write(path, json)
}
