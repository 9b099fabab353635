// Graph module
// Derives the stage/branch graph of a pipeline run from its execution trace

pub mod builder;
pub mod classify;
mod duration;
pub mod status;
mod steps;
mod union;
pub mod view;

pub use builder::PipelineGraph;
pub use classify::{NodeKind, TraceIndex};
pub use status::{NodeRunStatus, RunResult, RunState};
pub use view::{EdgeView, PipelineNodeView, StepView};
