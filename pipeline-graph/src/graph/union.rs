// Future Union
// Projects the remaining shape of a reference run onto an incomplete one

use crate::graph::builder::{entry_id, Adjacency, GraphNode, PipelineGraph};
use crate::graph::view::PipelineNodeView;

use tracing::debug;

impl PipelineGraph {
    /// Nodes of this graph followed by placeholders for every node of
    /// `reference` beyond this graph's node count.
    ///
    /// Placeholders keep the reference edges among themselves. The last node
    /// of this graph gets an edge to the first placeholder; when that node is
    /// a parallel branch, every branch of its stage gets the edge. Nothing is
    /// appended unless `reference` has more nodes, and `self` is never
    /// modified.
    pub fn union(&self, reference: &PipelineGraph) -> Vec<PipelineNodeView> {
        let adjacency = self.project(reference);
        self.render(&adjacency)
    }

    fn project(&self, reference: &PipelineGraph) -> Adjacency {
        let mut adjacency = self.adjacency.clone();
        let current = self.adjacency.len();
        let future = reference.adjacency.len();
        if future <= current {
            return adjacency;
        }

        debug!(current, future, "projecting placeholder nodes");

        for index in current..future {
            let reference_entry = &reference.adjacency.entries()[index];
            let node = match &reference_entry.node {
                GraphNode::Active(pos) => reference.trace.node(*pos).clone(),
                GraphNode::Inactive(node) => node.clone(),
            };
            let placeholder = adjacency.push_inactive(node, reference_entry.children.clone());

            if index == current && current > 0 {
                self.attach_seam(&mut adjacency, current - 1, placeholder);
            }
        }

        adjacency
    }

    fn attach_seam(&self, adjacency: &mut Adjacency, latest: usize, placeholder: usize) {
        let GraphNode::Active(pos) = adjacency.entries()[latest].node else {
            return;
        };

        if self.trace.is_stage(pos) {
            adjacency.add_edge(latest, placeholder);
        } else if self.trace.is_parallel_branch(pos) {
            let Some(stage_entry) = self
                .trace
                .parent_stage_of_branch(pos)
                .and_then(|stage| adjacency.entry_of(stage))
            else {
                debug!(
                    id = %entry_id(&self.trace, adjacency, latest),
                    "branch without a stage, placeholder left unattached"
                );
                return;
            };

            let siblings: Vec<usize> = adjacency.entries()[stage_entry]
                .children
                .iter()
                .copied()
                .filter(|&child| match adjacency.entries()[child].node {
                    GraphNode::Active(child_pos) => self.trace.is_parallel_branch(child_pos),
                    GraphNode::Inactive(_) => false,
                })
                .collect();
            for sibling in siblings {
                adjacency.add_edge(sibling, placeholder);
            }
        }
    }
}
