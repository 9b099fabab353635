// pgraph
// Command line front end for inspecting pipeline graphs built from execution traces

mod commands;
mod logging;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use pipeline_graph::GraphConfig;

#[derive(Parser, Debug)]
#[command(name = "pgraph", version)]
#[command(about = "Inspect the stage graph of a pipeline run from its execution trace")]
struct Cli {
    /// Config file (default: <config dir>/pipeline-graph/config.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set (e.g. debug, pipeline_graph=trace)
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stages and parallel branches with their edges
    Nodes(commands::nodes::NodesArgs),
    /// List the steps of a stage or parallel branch
    Steps(commands::steps::StepsArgs),
    /// Check a trace file for structural problems
    Validate(commands::validate::ValidateArgs),
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = GraphConfig::resolve(cli.config.as_deref())?;
    logging::init(cli.log_level.as_deref(), &config)?;

    match cli.command {
        Command::Nodes(args) => commands::nodes::execute(args),
        Command::Steps(args) => commands::steps::execute(args),
        Command::Validate(args) => commands::validate::execute(args),
    }
}
