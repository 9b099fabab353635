use crate::commands::{load_graph, now_millis};
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use pipeline_graph::NodeId;

/// List the steps of a stage or parallel branch
#[derive(Args, Debug)]
pub struct StepsArgs {
    /// Path to the trace file (YAML or JSON)
    pub trace: PathBuf,

    /// Id of the stage or branch node
    pub node: u64,

    /// Print the steps as JSON
    #[arg(long)]
    pub json: bool,

    /// Current time in epoch milliseconds (default: system clock)
    #[arg(long, value_name = "MILLIS")]
    pub now: Option<u64>,
}

pub fn execute(args: StepsArgs) -> Result<()> {
    let graph = load_graph(&args.trace)?.with_clock(args.now.unwrap_or_else(now_millis));
    let id = NodeId(args.node);
    let steps = graph.steps(id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    let node = graph.node_by_id(id)?;
    output::header(&format!("{} '{}' ({} steps)", id, node.name(), steps.len()));

    for step in &steps {
        output::result_row(
            step.result,
            &format!(
                "{:>5}  {:<32} {:>8}",
                step.id,
                step.display_name,
                output::duration(step.duration_in_millis)
            ),
        );
    }

    Ok(())
}
