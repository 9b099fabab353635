// CLI subcommands

pub mod nodes;
pub mod steps;
pub mod validate;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::debug;

use pipeline_graph::{PipelineGraph, TraceParser};

/// Parse a trace file and build its graph
pub fn load_graph(path: &Path) -> Result<PipelineGraph> {
    if !path.exists() {
        color_eyre::eyre::bail!("Trace file not found: {}", path.display());
    }
    let document = TraceParser::parse_file(path).map_err(|e| eyre!("{}", e))?;
    let graph = PipelineGraph::from_document(document);
    debug!(path = %path.display(), nodes = graph.len(), "loaded trace");
    Ok(graph)
}

/// Current time in epoch milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
