// Pipeline Graph Library
// Derives the stage and parallel-branch graph of a pipeline run from its execution trace

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod trace;

// Re-export commonly used types
pub use error::{GraphError, GraphErrorKind, GraphResult};

// Re-export graph types
pub use graph::{
    EdgeView, NodeKind, NodeRunStatus, PipelineGraph, PipelineNodeView, RunResult, RunState,
    StepView, TraceIndex,
};

// Re-export trace types
pub use trace::{
    FlowNodeType, GenericStatus, NodeId, ParseError, ParseErrorKind, ParseResult, RunInfo,
    TraceDocument, TraceNode, TraceParser, TraceRecorder, TraceValidator, ValidationError,
};

// Re-export cache and config types
pub use cache::{
    BranchMetadata, CacheConfig, CacheError, Caches, JobEvent, MetadataCache, MetadataLoader,
    PullRequestMetadata,
};
pub use config::{CacheSettings, ConfigError, GraphConfig};
