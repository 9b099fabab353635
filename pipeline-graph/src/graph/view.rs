// Graph Views
// Serializable node and step records handed to visualization clients

use crate::graph::status::{NodeRunStatus, RunResult, RunState};
use crate::trace::models::TraceNode;

use serde::{Deserialize, Serialize};

/// Outgoing edge of a pipeline node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeView {
    pub id: String,
}

/// A stage or parallel branch as shown in the pipeline graph.
///
/// Every field is always serialized; `null` carries meaning for clients
/// (placeholders and not-executed nodes have no result or state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNodeView {
    pub id: String,
    pub display_name: String,
    pub result: Option<RunResult>,
    pub state: Option<RunState>,
    pub start_time: Option<u64>,
    pub duration_in_millis: Option<u64>,
    pub edges: Vec<EdgeView>,
}

impl PipelineNodeView {
    pub(crate) fn new(
        node: &TraceNode,
        status: Option<NodeRunStatus>,
        duration_in_millis: Option<u64>,
        edges: Vec<EdgeView>,
    ) -> Self {
        Self {
            id: node.id.to_string(),
            display_name: node.name().to_string(),
            result: status.map(|s| s.result),
            state: status.map(|s| s.state),
            start_time: start_time(node),
            duration_in_millis,
            edges,
        }
    }

    /// A node projected from another run
    pub(crate) fn placeholder(node: &TraceNode, edges: Vec<EdgeView>) -> Self {
        Self::new(node, None, None, edges)
    }

    pub fn edge_ids(&self) -> Vec<&str> {
        self.edges.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn status(&self) -> Option<NodeRunStatus> {
        match (self.result, self.state) {
            (Some(result), Some(state)) => Some(NodeRunStatus::new(result, state)),
            _ => None,
        }
    }
}

/// A step owned by a stage or branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub id: String,
    pub display_name: String,
    pub result: Option<RunResult>,
    pub state: Option<RunState>,
    pub start_time: Option<u64>,
    pub duration_in_millis: Option<u64>,
}

impl StepView {
    pub(crate) fn new(
        node: &TraceNode,
        status: Option<NodeRunStatus>,
        duration_in_millis: Option<u64>,
    ) -> Self {
        Self {
            id: node.id.to_string(),
            display_name: node.name().to_string(),
            result: status.map(|s| s.result),
            state: status.map(|s| s.state),
            start_time: start_time(node),
            duration_in_millis,
        }
    }
}

fn start_time(node: &TraceNode) -> Option<u64> {
    (node.start_time > 0).then_some(node.start_time)
}
