use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use pipeline_graph::{PipelineGraph, TraceParser, TraceValidator};

/// Check a trace file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the trace file (YAML or JSON)
    pub trace: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let trace_path = &args.trace;

    if !trace_path.exists() {
        color_eyre::eyre::bail!("Trace file not found: {}", trace_path.display());
    }

    // Step 1: Parse
    output::status("Validating", &format!("{}", trace_path.display()));

    let document = match TraceParser::parse_file(trace_path) {
        Ok(d) => d,
        Err(e) => {
            output::error(&format!("Parse error: {}", e.message));
            if !e.context.is_empty() {
                eprint!("{}", e.context);
            }
            if let Some(suggestion) = &e.suggestion {
                output::info(&format!("  Suggestion: {}", suggestion));
            }
            std::process::exit(1);
        }
    };

    output::check(&format!("Trace syntax valid ({} nodes)", document.nodes.len()));

    // Step 2: Structure
    if let Err(errors) = TraceValidator::validate(&document) {
        output::error(&format!("{} validation error(s):", errors.len()));
        for error in &errors {
            output::error(&format!("  - [{}] {}", error.path, error.message));
            if let Some(suggestion) = &error.suggestion {
                output::info(&format!("    Suggestion: {}", suggestion));
            }
        }
        std::process::exit(1);
    }

    output::check("Parent links and block ends consistent");

    // Step 3: Graph
    let graph = PipelineGraph::from_document(document);
    let stages = graph.stages().len();
    let branches = graph.parallel_branches().len();
    if stages == 0 && branches == 0 {
        output::warning("No stages recorded; the graph is empty");
    } else {
        output::check(&format!("Graph: {} stages, {} parallel branches", stages, branches));
    }

    println!();
    output::success("Trace is valid");

    Ok(())
}
