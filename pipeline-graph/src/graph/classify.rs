// Node Classification
// Sorted, indexed view of a trace with the predicates that give nodes their roles

use crate::error::{GraphError, GraphResult};
use crate::trace::models::{FlowNodeType, NodeId, TraceNode};

use std::collections::HashMap;
use tracing::{debug, warn};

/// Role a trace node plays in the pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Stage,
    ParallelBranch,
    StepAtomic,
    StepBlockEnd,
    Other,
}

/// Trace nodes sorted by id, with lookups by id and by block start
#[derive(Debug, Clone, Default)]
pub struct TraceIndex {
    nodes: Vec<TraceNode>,
    positions: HashMap<NodeId, usize>,
    /// Block start id -> position of the node closing it
    block_ends: HashMap<NodeId, usize>,
    /// Nearest enclosing block start of each position
    enclosing: Vec<GraphResult<Option<usize>>>,
}

impl TraceIndex {
    /// Sort and index a trace. Duplicate ids keep their first occurrence.
    pub fn new(mut nodes: Vec<TraceNode>) -> Self {
        nodes.sort_by_key(|node| node.id);
        nodes.dedup_by(|later, earlier| {
            let duplicate = later.id == earlier.id;
            if duplicate {
                warn!(id = %later.id, "dropping duplicate trace node");
            }
            duplicate
        });

        let mut positions = HashMap::with_capacity(nodes.len());
        let mut block_ends = HashMap::new();
        for (pos, node) in nodes.iter().enumerate() {
            positions.insert(node.id, pos);
            if let Some(start) = node.block_start() {
                block_ends.entry(start).or_insert(pos);
            }
        }

        let mut index = Self {
            nodes,
            positions,
            block_ends,
            enclosing: Vec::new(),
        };
        // Parents precede their children, so one forward pass resolves every node
        for pos in 0..index.nodes.len() {
            let enclosing = index.resolve_enclosing(pos);
            index.enclosing.push(enclosing);
        }
        index
    }

    /// Nearest enclosing block of `pos`, given that every earlier position is
    /// already resolved.
    fn resolve_enclosing(&self, pos: usize) -> GraphResult<Option<usize>> {
        let node = &self.nodes[pos];
        let Some(parent_id) = node.first_parent() else {
            return Ok(None);
        };
        if parent_id >= node.id {
            return Err(GraphError::inconsistent(format!(
                "parent link '{}' of node '{}' does not point backwards",
                parent_id, node.id
            )));
        }
        let parent_pos = self.position(parent_id).ok_or_else(|| {
            GraphError::inconsistent(format!(
                "node '{}' not found while walking the parents of '{}'",
                parent_id, node.id
            ))
        })?;

        match self.nodes[parent_pos].node_type {
            FlowNodeType::BlockStart => Ok(Some(parent_pos)),
            // A closed sibling block: continue above its start
            FlowNodeType::BlockEnd { start } => match self.position(start) {
                Some(start_pos) if start_pos < parent_pos => self.enclosing[start_pos].clone(),
                Some(_) => Err(GraphError::inconsistent(format!(
                    "block start '{}' does not precede its end '{}'",
                    start, parent_id
                ))),
                None => Err(GraphError::inconsistent(format!(
                    "block start '{}' closed by '{}' not found",
                    start, parent_id
                ))),
            },
            _ => self.enclosing[parent_pos].clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TraceNode] {
        &self.nodes
    }

    /// Node at a position. Positions come from this index, so they are in range.
    pub fn node(&self, pos: usize) -> &TraceNode {
        &self.nodes[pos]
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn get(&self, id: NodeId) -> Option<&TraceNode> {
        self.position(id).map(|pos| &self.nodes[pos])
    }

    pub fn kind(&self, pos: usize) -> NodeKind {
        if self.is_parallel_branch(pos) {
            NodeKind::ParallelBranch
        } else if self.is_stage(pos) {
            NodeKind::Stage
        } else {
            match self.nodes[pos].node_type {
                FlowNodeType::StepAtom => NodeKind::StepAtomic,
                FlowNodeType::BlockEnd { .. } => NodeKind::StepBlockEnd,
                _ => NodeKind::Other,
            }
        }
    }

    pub fn is_stage(&self, pos: usize) -> bool {
        let node = &self.nodes[pos];
        node.stage_marker || (node.label.is_some() && node.branch.is_none())
    }

    pub fn is_parallel_branch(&self, pos: usize) -> bool {
        let node = &self.nodes[pos];
        node.label.is_some() && node.branch.is_some()
    }

    pub fn is_step(&self, pos: usize) -> bool {
        self.nodes[pos].is_step_atom() && !self.is_stage(pos)
    }

    /// A labelled stage without an explicit stage action: a block-form stage
    /// whose status comes from its own end node.
    pub fn is_bare_label(&self, pos: usize) -> bool {
        let node = &self.nodes[pos];
        node.label.is_some() && !node.stage_marker
    }

    /// Nearest block start enclosing the node at `pos`.
    ///
    /// Follows first-parent links. A block end on the way is a closed
    /// sibling block, so the walk jumps over it to that block's start.
    pub fn enclosing_block(&self, pos: usize) -> GraphResult<Option<usize>> {
        self.enclosing[pos].clone()
    }

    /// All block starts enclosing `pos`, innermost first
    pub fn enclosing_blocks(&self, pos: usize) -> GraphResult<Vec<usize>> {
        let mut chain = Vec::new();
        let mut current = pos;
        while let Some(block) = self.enclosing_block(current)? {
            chain.push(block);
            current = block;
        }
        Ok(chain)
    }

    /// Whether any block enclosing `pos` is a parallel branch.
    ///
    /// An unresolvable parent walk is logged and the node is treated as top
    /// level, so it still shows up in the graph.
    pub fn is_nested_in_parallel(&self, pos: usize) -> bool {
        match self.enclosing_blocks(pos) {
            Ok(chain) => chain.iter().any(|&block| self.is_parallel_branch(block)),
            Err(err) => {
                warn!(id = %self.nodes[pos].id, error = %err, "treating node as top level");
                false
            }
        }
    }

    /// The block end closing the block started at `pos`; `None` while the
    /// block is still open.
    pub fn step_end_node(&self, pos: usize) -> Option<usize> {
        self.block_ends.get(&self.nodes[pos].id).copied()
    }

    /// Fallback end of a stage without a block end: the node right before the
    /// next stage.
    pub fn end_node(&self, pos: usize) -> Option<usize> {
        ((pos + 1)..self.nodes.len())
            .find(|&next| self.is_stage(next))
            .map(|next| next - 1)
    }

    /// Whether `candidate` belongs to the block opened at `start` and closed at
    /// `end` (open blocks pass `None`).
    pub fn is_in_block(&self, start: usize, end: Option<usize>, candidate: usize) -> bool {
        let id = self.nodes[candidate].id;
        if id <= self.nodes[start].id {
            return false;
        }
        if let Some(end) = end {
            if id >= self.nodes[end].id {
                return false;
            }
        }

        match self.enclosing_blocks(candidate) {
            Ok(chain) => chain.contains(&start),
            Err(err) => {
                debug!(id = %id, error = %err, "cannot place node in block");
                false
            }
        }
    }

    /// Stage a branch belongs to, found by walking first parents
    pub fn parent_stage_of_branch(&self, pos: usize) -> Option<usize> {
        let mut last = self.nodes[pos].id;
        let mut current = self.nodes[pos].first_parent();
        while let Some(id) = current {
            if id >= last {
                return None;
            }
            let parent_pos = self.position(id)?;
            if self.is_stage(parent_pos) {
                return Some(parent_pos);
            }
            last = id;
            current = self.nodes[parent_pos].first_parent();
        }
        None
    }
}
