use crate::commands::{load_graph, now_millis};
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

/// List stages and parallel branches of a run
#[derive(Args, Debug)]
pub struct NodesArgs {
    /// Path to the trace file (YAML or JSON)
    pub trace: PathBuf,

    /// Trace of a fuller run; its remaining nodes are appended as placeholders
    #[arg(long, value_name = "TRACE")]
    pub reference: Option<PathBuf>,

    /// Print the nodes as JSON
    #[arg(long)]
    pub json: bool,

    /// Current time in epoch milliseconds (default: system clock)
    #[arg(long, value_name = "MILLIS")]
    pub now: Option<u64>,
}

pub fn execute(args: NodesArgs) -> Result<()> {
    let graph = load_graph(&args.trace)?.with_clock(args.now.unwrap_or_else(now_millis));

    let nodes = match &args.reference {
        Some(reference) => graph.union(&load_graph(reference)?),
        None => graph.nodes(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    output::header(&format!(
        "{} ({} stages, {} branches)",
        args.trace.display(),
        graph.stages().len(),
        graph.parallel_branches().len()
    ));

    if nodes.is_empty() {
        output::info("no stages recorded");
        return Ok(());
    }

    for node in &nodes {
        let status = match (node.result, node.state) {
            (Some(result), Some(state)) => format!("{} {}", result, state),
            _ => "-".to_string(),
        };
        let edges = node.edge_ids().join(", ");
        output::result_row(
            node.result,
            &format!(
                "{:>5}  {:<24} {:<20} {:>8}  -> [{}]",
                node.id,
                node.display_name,
                status,
                output::duration(node.duration_in_millis),
                edges
            ),
        );
    }

    Ok(())
}
