// Step Extraction
// Finds the atomic steps owned by a stage or parallel branch

use crate::error::{GraphError, GraphResult};
use crate::graph::builder::PipelineGraph;
use crate::graph::classify::NodeKind;
use crate::graph::status::NodeRunStatus;
use crate::graph::view::StepView;
use crate::trace::models::{NodeId, TraceNode};

impl PipelineGraph {
    /// Steps of a stage or parallel branch, in trace order. Other nodes own
    /// no steps.
    pub fn steps(&self, id: NodeId) -> GraphResult<Vec<StepView>> {
        let positions = self.step_positions(id)?;
        Ok(positions.into_iter().map(|pos| self.step_view(pos)).collect())
    }

    pub fn step_nodes(&self, id: NodeId) -> GraphResult<Vec<&TraceNode>> {
        let positions = self.step_positions(id)?;
        Ok(positions.into_iter().map(|pos| self.trace.node(pos)).collect())
    }

    /// Every atomic step of the trace
    pub fn all_steps(&self) -> Vec<&TraceNode> {
        (0..self.trace.len())
            .filter(|&pos| self.trace.is_step(pos))
            .map(|pos| self.trace.node(pos))
            .collect()
    }

    fn step_positions(&self, id: NodeId) -> GraphResult<Vec<usize>> {
        let pos = self
            .trace
            .position(id)
            .ok_or_else(|| GraphError::not_found(id))?;

        Ok(match self.trace.kind(pos) {
            NodeKind::Stage => self.stage_steps(pos),
            NodeKind::ParallelBranch => self.branch_steps(pos),
            _ => Vec::new(),
        })
    }

    /// Walks forward until a stage outside this stage's block. Steps of
    /// stages nested inside it are included.
    fn stage_steps(&self, stage: usize) -> Vec<usize> {
        let end = self.trace.step_end_node(stage);
        let mut steps = Vec::new();

        for pos in (stage + 1)..self.trace.len() {
            if self.trace.is_stage(pos) && !self.trace.is_in_block(stage, end, pos) {
                break;
            }
            if self.trace.is_step(pos) {
                steps.push(pos);
            }
        }
        steps
    }

    /// Walks forward to the branch's end node. Sibling branches interleave
    /// with this one, so a step is taken only when it is inside the branch
    /// block or continues from the previously taken step.
    fn branch_steps(&self, branch: usize) -> Vec<usize> {
        let end = self.trace.step_end_node(branch);
        let mut previous = self.trace.node(branch).id;
        let mut steps = Vec::new();

        for pos in (branch + 1)..self.trace.len() {
            if Some(pos) == end {
                break;
            }
            if self.trace.is_parallel_branch(pos) {
                continue;
            }
            let node = self.trace.node(pos);
            if !node.has_parent(previous) && !self.trace.is_in_block(branch, end, pos) {
                continue;
            }
            if self.trace.is_step(pos) {
                steps.push(pos);
                previous = node.id;
            }
        }
        steps
    }

    fn step_view(&self, pos: usize) -> StepView {
        let node = self.trace.node(pos);
        if !node.executed {
            return StepView::new(node, None, None);
        }
        let status = NodeRunStatus::from_node(node);
        StepView::new(node, Some(status), self.duration_for_status(pos, status))
    }
}
