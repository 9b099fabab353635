// Trace Recorder
// Builds traces node by node with the id, parent and timing layout an engine produces

use crate::graph::status::RunResult;
use crate::trace::models::{
    FlowNodeType, NodeError, NodeId, NodeWarning, RunInfo, TraceDocument, TraceNode,
};

/// Id of the first node of every execution
pub const FIRST_NODE_ID: u64 = 2;

const DEFAULT_START_TIME: u64 = 1_000;
const DEFAULT_TICK: u64 = 100;

/// Records trace nodes with increasing ids and start times.
///
/// Every recorded node starts `tick` milliseconds after the previous one.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    nodes: Vec<TraceNode>,
    next_id: u64,
    clock: u64,
    tick: u64,
}

/// A recorded parallel branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBranch {
    pub start: NodeId,
    pub steps: Vec<NodeId>,
    pub end: NodeId,
}

/// A recorded parallel block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedParallel {
    pub start: NodeId,
    pub branches: Vec<RecordedBranch>,
    pub end: NodeId,
}

/// A recorded block-form stage: an outer block whose body carries the label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStage {
    pub start: NodeId,
    pub body: NodeId,
    pub steps: Vec<NodeId>,
    pub body_end: NodeId,
    pub end: NodeId,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::starting_at(DEFAULT_START_TIME)
    }

    /// Start a trace whose flow start node begins at `start_time`
    pub fn starting_at(start_time: u64) -> Self {
        let mut recorder = Self {
            nodes: Vec::new(),
            next_id: FIRST_NODE_ID,
            clock: start_time,
            tick: DEFAULT_TICK,
        };
        recorder.record(FlowNodeType::FlowStart, &[], "Start of Pipeline");
        recorder
    }

    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Id of the most recently recorded node
    pub fn head(&self) -> NodeId {
        self.nodes
            .last()
            .map(|n| n.id)
            .unwrap_or(NodeId(FIRST_NODE_ID))
    }

    /// Start time the next recorded node will get
    pub fn now(&self) -> u64 {
        self.clock
    }

    /// Let time pass without recording anything
    pub fn advance(&mut self, millis: u64) {
        self.clock += millis;
    }

    fn record(&mut self, node_type: FlowNodeType, parents: &[NodeId], name: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let mut node = TraceNode::new(id, node_type);
        node.display_name = name.to_string();
        node.parents = parents.to_vec();
        node.start_time = self.clock;
        self.clock += self.tick;

        self.nodes.push(node);
        id
    }

    fn with_node(&mut self, id: NodeId, f: impl FnOnce(&mut TraceNode)) {
        if let Some(node) = self.node_mut(id) {
            f(node);
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TraceNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Atomic step
    pub fn atom(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.record(FlowNodeType::StepAtom, &[parent], name)
    }

    /// Step-form stage (`stage 'name'` without a body)
    pub fn stage_marker(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.record(FlowNodeType::StepAtom, &[parent], &format!("Stage : {}", name));
        self.with_node(id, |n| {
            n.stage_marker = true;
            n.label = Some(name.to_string());
        });
        id
    }

    /// Unlabelled block start (`node`, `dir`, the outer half of a stage)
    pub fn block_start(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.record(FlowNodeType::BlockStart, &[parent], name)
    }

    /// Labelled block start: the body of a block-form stage
    pub fn label_start(&mut self, parent: NodeId, label: &str) -> NodeId {
        let id = self.record(FlowNodeType::BlockStart, &[parent], label);
        self.with_node(id, |n| n.label = Some(label.to_string()));
        id
    }

    /// Body of a parallel branch
    pub fn branch_start(&mut self, parent: NodeId, name: &str) -> NodeId {
        let label = format!("Branch: {}", name);
        let id = self.record(FlowNodeType::BlockStart, &[parent], &label);
        self.with_node(id, |n| {
            n.label = Some(label.clone());
            n.branch = Some(name.to_string());
        });
        id
    }

    /// Close the block opened by `start`
    pub fn block_end(&mut self, start: NodeId, parents: &[NodeId]) -> NodeId {
        let name = self
            .nodes
            .iter()
            .find(|n| n.id == start)
            .map(|n| n.display_name.clone())
            .unwrap_or_default();
        self.record(FlowNodeType::BlockEnd { start }, parents, &name)
    }

    pub fn flow_end(&mut self, parents: &[NodeId]) -> NodeId {
        self.record(FlowNodeType::FlowEnd, parents, "End of Pipeline")
    }

    /// Block-form stage with atomic steps in its body
    pub fn block_stage(&mut self, parent: NodeId, name: &str, steps: &[&str]) -> RecordedStage {
        let start = self.block_start(parent, "Stage : Start");
        let body = self.label_start(start, name);
        let mut last = body;
        let mut recorded = Vec::with_capacity(steps.len());
        for step in steps {
            last = self.atom(last, step);
            recorded.push(last);
        }
        let body_end = self.block_end(body, &[last]);
        let end = self.block_end(start, &[body_end]);
        RecordedStage {
            start,
            body,
            steps: recorded,
            body_end,
            end,
        }
    }

    /// Parallel block. Branch steps are recorded round-robin, the way
    /// concurrently running branches interleave in a trace.
    pub fn parallel(&mut self, parent: NodeId, branches: &[(&str, &[&str])]) -> RecordedParallel {
        let start = self.block_start(parent, "Execute in parallel");
        let starts: Vec<NodeId> = branches
            .iter()
            .map(|(name, _)| self.branch_start(start, name))
            .collect();

        let mut steps: Vec<Vec<NodeId>> = vec![Vec::new(); branches.len()];
        let longest = branches.iter().map(|(_, s)| s.len()).max().unwrap_or(0);
        for round in 0..longest {
            for (i, (_, names)) in branches.iter().enumerate() {
                if let Some(name) = names.get(round) {
                    let parent = steps[i].last().copied().unwrap_or(starts[i]);
                    let id = self.atom(parent, name);
                    steps[i].push(id);
                }
            }
        }

        let mut recorded = Vec::with_capacity(branches.len());
        for (branch_start, branch_steps) in starts.into_iter().zip(steps) {
            let last = branch_steps.last().copied().unwrap_or(branch_start);
            let end = self.block_end(branch_start, &[last]);
            recorded.push(RecordedBranch {
                start: branch_start,
                steps: branch_steps,
                end,
            });
        }

        let ends: Vec<NodeId> = recorded.iter().map(|b| b.end).collect();
        let end = self.block_end(start, &ends);
        RecordedParallel {
            start,
            branches: recorded,
            end,
        }
    }

    /// Record a failure on a node
    pub fn fail(&mut self, id: NodeId, message: &str) {
        self.with_node(id, |n| n.error = Some(NodeError::new(message)));
    }

    /// Record a user abort on a node
    pub fn abort(&mut self, id: NodeId, message: &str) {
        self.with_node(id, |n| n.error = Some(NodeError::aborted(message)));
    }

    pub fn warn(&mut self, id: NodeId, result: RunResult, message: &str) {
        self.with_node(id, |n| {
            n.warning = Some(NodeWarning {
                result,
                message: Some(message.to_string()),
            })
        });
    }

    pub fn mark_running(&mut self, id: NodeId) {
        self.with_node(id, |n| n.running = true);
    }

    pub fn mark_not_executed(&mut self, id: NodeId) {
        self.with_node(id, |n| n.executed = false);
    }

    pub fn finish(self) -> Vec<TraceNode> {
        self.nodes
    }

    pub fn document(self, run: RunInfo) -> TraceDocument {
        TraceDocument {
            run,
            nodes: self.nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_and_times_increase() {
        let mut rec = TraceRecorder::starting_at(5_000).with_tick(10);
        let root = rec.head();
        let a = rec.atom(root, "echo");
        let b = rec.atom(a, "sh");
        let nodes = rec.finish();

        assert_eq!(root, NodeId(2));
        assert_eq!((a, b), (NodeId(3), NodeId(4)));
        // with_tick applies from the second node on
        assert_eq!(nodes[0].start_time, 5_000);
        assert_eq!(nodes[1].start_time, 5_100);
        assert_eq!(nodes[2].start_time, 5_110);
        assert_eq!(nodes[2].parents, vec![a]);
    }

    #[test]
    fn test_block_stage_shape() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let stage = rec.block_stage(root, "Build", &["make", "make test"]);
        let nodes = rec.finish();

        let body = nodes.iter().find(|n| n.id == stage.body).unwrap();
        assert_eq!(body.label.as_deref(), Some("Build"));
        let end = nodes.iter().find(|n| n.id == stage.end).unwrap();
        assert_eq!(end.block_start(), Some(stage.start));
        assert_eq!(end.parents, vec![stage.body_end]);
        assert_eq!(stage.steps.len(), 2);
    }

    #[test]
    fn test_parallel_interleaves_branches() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let par = rec.parallel(root, &[("left", &["a1", "a2"]), ("right", &["b1"])]);
        let nodes = rec.finish();

        let left = &par.branches[0];
        let right = &par.branches[1];
        assert!(left.steps[0] < right.steps[0]);
        assert!(right.steps[0] < left.steps[1]);

        let end = nodes.iter().find(|n| n.id == par.end).unwrap();
        assert_eq!(end.parents, vec![left.end, right.end]);
        let branch = nodes.iter().find(|n| n.id == right.start).unwrap();
        assert_eq!(branch.name(), "right");
    }
}
