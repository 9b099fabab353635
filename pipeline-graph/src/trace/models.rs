// Trace Models
// Flow node records as emitted by the execution engine, plus run-level metadata

use crate::graph::status::RunResult;

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Node identity
// =============================================================================

/// Identifier of a trace node. Ids are handed out in insertion order, so
/// sorting by id recovers the order in which the engine recorded the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

// =============================================================================
// Trace nodes
// =============================================================================

/// Structural type of a flow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlowNodeType {
    /// First node of every execution
    FlowStart,
    /// Last node of a completed execution
    FlowEnd,
    /// A step without a body (echo, sh, step-form `stage 'x'`)
    StepAtom,
    /// Opens a block (node, stage body, parallel, branch body)
    BlockStart,
    /// Closes the block opened by `start`
    BlockEnd {
        #[serde(rename = "startId")]
        start: NodeId,
    },
}

/// Failure recorded on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeError {
    pub message: String,
    /// Set when the failure is an interruption; carries the outcome the
    /// interruption was recorded with (ABORTED for user aborts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted_with: Option<RunResult>,
}

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            interrupted_with: None,
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            interrupted_with: Some(RunResult::Aborted),
        }
    }

    pub fn is_abort(&self) -> bool {
        self.interrupted_with == Some(RunResult::Aborted)
    }
}

/// Non-fatal outcome recorded on a node (e.g. unstable test results)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWarning {
    pub result: RunResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One recorded point in the execution trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceNode {
    pub id: NodeId,

    #[serde(flatten)]
    pub node_type: FlowNodeType,

    #[serde(default)]
    pub display_name: String,

    /// Immediate predecessors; more than one for joins
    #[serde(default)]
    pub parents: Vec<NodeId>,

    /// Start time in epoch milliseconds, 0 when not started
    #[serde(default)]
    pub start_time: u64,

    #[serde(default)]
    pub running: bool,

    #[serde(default = "default_executed")]
    pub executed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<NodeWarning>,

    /// Explicit stage action (step-form `stage 'name'`)
    #[serde(default)]
    pub stage_marker: bool,

    /// Label action, carried by block-stage bodies and branch bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Thread name action, carried by parallel branch bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

fn default_executed() -> bool {
    true
}

impl TraceNode {
    pub fn new(id: impl Into<NodeId>, node_type: FlowNodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            display_name: String::new(),
            parents: Vec::new(),
            start_time: 0,
            running: false,
            executed: true,
            error: None,
            warning: None,
            stage_marker: false,
            label: None,
            branch: None,
        }
    }

    /// Name shown for this node: branch name for branches, label for stages,
    /// the raw display name otherwise.
    pub fn name(&self) -> &str {
        if self.label.is_some() {
            if let Some(branch) = &self.branch {
                return branch;
            }
        }
        self.label.as_deref().unwrap_or(&self.display_name)
    }

    /// First parent, the one that defines block nesting
    pub fn first_parent(&self) -> Option<NodeId> {
        self.parents.first().copied()
    }

    pub fn has_parent(&self, id: NodeId) -> bool {
        self.parents.contains(&id)
    }

    pub fn is_block_start(&self) -> bool {
        matches!(self.node_type, FlowNodeType::BlockStart)
    }

    pub fn is_step_atom(&self) -> bool {
        matches!(self.node_type, FlowNodeType::StepAtom)
    }

    /// Start node of the block this node closes, if it is a block end
    pub fn block_start(&self) -> Option<NodeId> {
        match self.node_type {
            FlowNodeType::BlockEnd { start } => Some(start),
            _ => None,
        }
    }
}

// =============================================================================
// Run metadata
// =============================================================================

/// Run-level status as reported by the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenericStatus {
    PausedPendingInput,
    Aborted,
    Failure,
    InProgress,
    Unstable,
    Success,
    NotExecuted,
    /// Anything the engine reports that is not listed above
    #[serde(other)]
    Unknown,
}

/// Metadata of the run that produced a trace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    #[serde(default)]
    pub start_time: u64,
    #[serde(default)]
    pub duration_millis: u64,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub status: Option<GenericStatus>,
}

impl RunInfo {
    pub fn completed(start_time: u64, duration_millis: u64, status: GenericStatus) -> Self {
        Self {
            start_time,
            duration_millis,
            complete: true,
            status: Some(status),
        }
    }

    pub fn in_progress(start_time: u64) -> Self {
        Self {
            start_time,
            duration_millis: 0,
            complete: false,
            status: Some(GenericStatus::InProgress),
        }
    }

    /// Epoch millis at which the run ended, when it has
    pub fn end_time(&self) -> Option<u64> {
        self.complete
            .then(|| self.start_time.saturating_add(self.duration_millis))
    }
}

/// A complete trace file: run metadata plus its nodes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceDocument {
    #[serde(default)]
    pub run: RunInfo,
    #[serde(default)]
    pub nodes: Vec<TraceNode>,
}
