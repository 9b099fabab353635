// Pipeline Graph Builder
// Sweeps a sorted trace once and links stages and parallel branches into a graph

use crate::error::{GraphError, GraphResult};
use crate::graph::classify::TraceIndex;
use crate::graph::status::NodeRunStatus;
use crate::graph::view::{EdgeView, PipelineNodeView};
use crate::trace::models::{NodeId, RunInfo, TraceDocument, TraceNode};

use std::collections::HashMap;
use tracing::{debug, trace};

/// A node of the derived graph
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GraphNode {
    /// Backed by the node at this position of the graph's own trace
    Active(usize),
    /// Projected from a reference graph
    Inactive(TraceNode),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GraphEntry {
    pub node: GraphNode,
    /// Indices of child entries
    pub children: Vec<usize>,
}

/// Insertion-ordered adjacency list over graph entries
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Adjacency {
    entries: Vec<GraphEntry>,
    by_position: HashMap<usize, usize>,
}

impl Adjacency {
    /// Entry for the trace node at `pos`, created on first use
    pub fn register(&mut self, pos: usize) -> usize {
        if let Some(&index) = self.by_position.get(&pos) {
            return index;
        }
        let index = self.entries.len();
        self.entries.push(GraphEntry {
            node: GraphNode::Active(pos),
            children: Vec::new(),
        });
        self.by_position.insert(pos, index);
        index
    }

    pub fn push_inactive(&mut self, node: TraceNode, children: Vec<usize>) -> usize {
        let index = self.entries.len();
        self.entries.push(GraphEntry {
            node: GraphNode::Inactive(node),
            children,
        });
        index
    }

    pub fn add_edge(&mut self, parent: usize, child: usize) {
        let children = &mut self.entries[parent].children;
        if !children.contains(&child) {
            children.push(child);
        }
    }

    pub fn entry_of(&self, pos: usize) -> Option<usize> {
        self.by_position.get(&pos).copied()
    }

    pub fn entries(&self) -> &[GraphEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Trace positions of the active entries, in insertion order
    pub fn active_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().filter_map(|e| match e.node {
            GraphNode::Active(pos) => Some(pos),
            GraphNode::Inactive(_) => None,
        })
    }
}

/// Graph of stages and parallel branches derived from an execution trace.
///
/// Built once from an immutable trace; every query afterwards is read-only.
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    pub(crate) trace: TraceIndex,
    pub(crate) run: RunInfo,
    pub(crate) adjacency: Adjacency,
    /// Statuses assigned during the sweep, keyed by trace position
    pub(crate) statuses: HashMap<usize, NodeRunStatus>,
    /// Wall-clock time used for nodes that are still running
    pub(crate) now: Option<u64>,
}

impl PipelineGraph {
    pub fn build(nodes: Vec<TraceNode>, run: RunInfo) -> Self {
        let mut graph = Self {
            trace: TraceIndex::new(nodes),
            run,
            adjacency: Adjacency::default(),
            statuses: HashMap::new(),
            now: None,
        };
        graph.sweep();
        graph
    }

    pub fn from_document(document: TraceDocument) -> Self {
        Self::build(document.nodes, document.run)
    }

    /// Use `now_millis` as the current time for durations of unfinished nodes
    pub fn with_clock(mut self, now_millis: u64) -> Self {
        self.now = Some(now_millis);
        self
    }

    fn sweep(&mut self) {
        let mut previous_stage: Option<usize> = None;
        let mut previous_branch: Option<usize> = None;

        for pos in 0..self.trace.len() {
            let is_stage = self.trace.is_stage(pos);
            let is_branch = self.trace.is_parallel_branch(pos);
            if !is_stage && !is_branch {
                continue;
            }
            if self.trace.is_nested_in_parallel(pos) {
                trace!(id = %self.trace.node(pos).id, "skipping node nested in a parallel branch");
                continue;
            }

            if is_stage {
                let entry = self.adjacency.register(pos);

                if previous_branch.take().is_some() {
                    // Fan in from every branch of the previous stage
                    match previous_stage.and_then(|p| self.adjacency.entry_of(p)) {
                        Some(stage_entry) => {
                            let branches = self.adjacency.entries()[stage_entry].children.clone();
                            for branch in branches {
                                self.adjacency.add_edge(branch, entry);
                            }
                        }
                        None => debug!(
                            id = %self.trace.node(pos).id,
                            "parallel block without an enclosing stage"
                        ),
                    }
                } else if let Some(previous) =
                    previous_stage.and_then(|p| self.adjacency.entry_of(p))
                {
                    self.adjacency.add_edge(previous, entry);
                }

                if self.trace.is_bare_label(pos) {
                    let end = self
                        .trace
                        .step_end_node(pos)
                        .or_else(|| self.trace.end_node(pos));
                    if let Some(end) = end {
                        let status = NodeRunStatus::from_node(self.trace.node(end));
                        self.statuses.insert(pos, status);
                    }
                } else if let Some(previous) = previous_stage {
                    // The previous stage closes when this one starts
                    if !self.statuses.contains_key(&previous) && pos > 0 {
                        let status = NodeRunStatus::from_node(self.trace.node(pos - 1));
                        self.statuses.insert(previous, status);
                    }
                }

                debug!(id = %self.trace.node(pos).id, name = self.trace.node(pos).name(), "stage");
                previous_stage = Some(pos);
            } else {
                let entry = self.adjacency.register(pos);
                if let Some(stage_entry) = previous_stage.and_then(|p| self.adjacency.entry_of(p)) {
                    self.adjacency.add_edge(stage_entry, entry);
                }

                let status = match self.trace.step_end_node(pos) {
                    Some(end) => NodeRunStatus::from_node(self.trace.node(end)),
                    None => NodeRunStatus::running(),
                };
                self.statuses.insert(pos, status);

                debug!(
                    id = %self.trace.node(pos).id,
                    name = self.trace.node(pos).name(),
                    "parallel branch"
                );
                previous_branch = Some(pos);
            }
        }

        if let Some(last_stage) = self.last_stage() {
            self.statuses
                .insert(last_stage, NodeRunStatus::from_generic(self.run.status));
        }

        debug!(nodes = self.adjacency.len(), "pipeline graph built");
    }

    fn last_stage(&self) -> Option<usize> {
        self.adjacency
            .active_positions()
            .filter(|&pos| self.trace.is_stage(pos))
            .last()
    }

    pub fn trace(&self) -> &TraceIndex {
        &self.trace
    }

    pub fn run(&self) -> &RunInfo {
        &self.run
    }

    /// Number of graph nodes
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.len() == 0
    }

    /// Any node of the trace, graph node or not
    pub fn node_by_id(&self, id: NodeId) -> GraphResult<&TraceNode> {
        self.trace.get(id).ok_or_else(|| GraphError::not_found(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph_entry(id).is_ok()
    }

    /// Stages in graph order
    pub fn stages(&self) -> Vec<&TraceNode> {
        self.adjacency
            .active_positions()
            .filter(|&pos| self.trace.is_stage(pos))
            .map(|pos| self.trace.node(pos))
            .collect()
    }

    /// Top-level parallel branches in graph order
    pub fn parallel_branches(&self) -> Vec<&TraceNode> {
        self.adjacency
            .active_positions()
            .filter(|&pos| self.trace.is_parallel_branch(pos))
            .map(|pos| self.trace.node(pos))
            .collect()
    }

    /// Ids of the graph nodes `id` has edges to
    pub fn children(&self, id: NodeId) -> GraphResult<Vec<NodeId>> {
        let entry = self.graph_entry(id)?;
        Ok(self.adjacency.entries()[entry]
            .children
            .iter()
            .map(|&child| entry_id(&self.trace, &self.adjacency, child))
            .collect())
    }

    /// Status of a graph node as rendered, `None` for not-executed nodes
    pub fn status(&self, id: NodeId) -> GraphResult<Option<NodeRunStatus>> {
        let entry = self.graph_entry(id)?;
        Ok(self.resolve_status(&self.adjacency, entry))
    }

    /// All graph nodes in insertion order
    pub fn nodes(&self) -> Vec<PipelineNodeView> {
        self.render(&self.adjacency)
    }

    pub fn node_view(&self, id: NodeId) -> GraphResult<PipelineNodeView> {
        let entry = self.graph_entry(id)?;
        Ok(self.render_entry(&self.adjacency, entry))
    }

    fn graph_entry(&self, id: NodeId) -> GraphResult<usize> {
        self.trace
            .position(id)
            .and_then(|pos| self.adjacency.entry_of(pos))
            .ok_or_else(|| GraphError::not_found(id))
    }

    pub(crate) fn render(&self, adjacency: &Adjacency) -> Vec<PipelineNodeView> {
        (0..adjacency.len())
            .map(|entry| self.render_entry(adjacency, entry))
            .collect()
    }

    fn render_entry(&self, adjacency: &Adjacency, entry: usize) -> PipelineNodeView {
        let graph_entry = &adjacency.entries()[entry];
        let edges = graph_entry
            .children
            .iter()
            .map(|&child| EdgeView {
                id: entry_id(&self.trace, adjacency, child).to_string(),
            })
            .collect();

        match &graph_entry.node {
            GraphNode::Inactive(node) => PipelineNodeView::placeholder(node, edges),
            GraphNode::Active(pos) => {
                let status = self.resolve_status(adjacency, entry);
                let duration = status.and_then(|s| self.duration_for_status(*pos, s));
                PipelineNodeView::new(self.trace.node(*pos), status, duration, edges)
            }
        }
    }

    /// Sweep status, else the aggregate of the branch children
    fn resolve_status(&self, adjacency: &Adjacency, entry: usize) -> Option<NodeRunStatus> {
        let pos = match adjacency.entries()[entry].node {
            GraphNode::Active(pos) => pos,
            GraphNode::Inactive(_) => return None,
        };
        if !self.trace.node(pos).executed {
            return None;
        }
        if let Some(status) = self.statuses.get(&pos) {
            return Some(*status);
        }

        let branches: Vec<NodeRunStatus> = adjacency.entries()[entry]
            .children
            .iter()
            .filter_map(|&child| match adjacency.entries()[child].node {
                GraphNode::Active(child_pos) if self.trace.is_parallel_branch(child_pos) => {
                    self.statuses.get(&child_pos).copied()
                }
                _ => None,
            })
            .collect();
        Some(NodeRunStatus::aggregate(&branches))
    }
}

/// Node id of an adjacency entry
pub(crate) fn entry_id(trace: &TraceIndex, adjacency: &Adjacency, entry: usize) -> NodeId {
    match &adjacency.entries()[entry].node {
        GraphNode::Active(pos) => trace.node(*pos).id,
        GraphNode::Inactive(node) => node.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::status::{RunResult, RunState};
    use crate::trace::models::GenericStatus;
    use crate::trace::recorder::TraceRecorder;

    fn ids(views: &[PipelineNodeView]) -> Vec<&str> {
        views.iter().map(|v| v.id.as_str()).collect()
    }

    fn find<'a>(views: &'a [PipelineNodeView], name: &str) -> &'a PipelineNodeView {
        views.iter().find(|v| v.display_name == name).unwrap()
    }

    /// dev -> Build -> test{firstBranch, secondBranch} -> deploy
    fn scripted_pipeline(rec: &mut TraceRecorder) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = rec.head();
        let dev = rec.block_stage(root, "dev", &["echo dev"]);
        let build = rec.block_stage(dev.end, "Build", &["sh make"]);
        let test_outer = rec.block_start(build.end, "Stage : Start");
        let test = rec.label_start(test_outer, "test");
        let par = rec.parallel(
            test,
            &[("firstBranch", &["echo first"]), ("secondBranch", &["echo second"])],
        );
        let test_end = rec.block_end(test, &[par.end]);
        let test_outer_end = rec.block_end(test_outer, &[test_end]);
        let deploy = rec.block_stage(test_outer_end, "deploy", &["echo deploy"]);
        rec.flow_end(&[deploy.end]);
        (dev.body, build.body, test, deploy.body)
    }

    #[test]
    fn test_successful_pipeline_shape() {
        let mut rec = TraceRecorder::new();
        scripted_pipeline(&mut rec);
        let nodes = rec.finish();
        let end = nodes.last().unwrap().start_time;
        let graph = PipelineGraph::build(
            nodes,
            RunInfo::completed(1_000, end - 1_000, GenericStatus::Success),
        );

        let views = graph.nodes();
        let names: Vec<&str> = views.iter().map(|v| v.display_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["dev", "Build", "test", "firstBranch", "secondBranch", "deploy"]
        );

        let dev = find(&views, "dev");
        let build = find(&views, "Build");
        let test = find(&views, "test");
        let first = find(&views, "firstBranch");
        let second = find(&views, "secondBranch");
        let deploy = find(&views, "deploy");

        assert_eq!(dev.edge_ids(), vec![build.id.as_str()]);
        assert_eq!(build.edge_ids(), vec![test.id.as_str()]);
        assert_eq!(test.edge_ids(), vec![first.id.as_str(), second.id.as_str()]);
        assert_eq!(first.edge_ids(), vec![deploy.id.as_str()]);
        assert_eq!(second.edge_ids(), vec![deploy.id.as_str()]);
        assert!(deploy.edges.is_empty());

        for view in &views {
            assert_eq!(view.result, Some(RunResult::Success), "{}", view.display_name);
            assert_eq!(view.state, Some(RunState::Finished), "{}", view.display_name);
        }
    }

    #[test]
    fn test_failed_branch_skips_next_stage() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let test_outer = rec.block_start(root, "Stage : Start");
        let test = rec.label_start(test_outer, "test");
        let par = rec.parallel(test, &[("first", &["echo ok"]), ("second", &["sh exit 1"])]);
        let test_end = rec.block_end(test, &[par.end]);
        let test_outer_end = rec.block_end(test_outer, &[test_end]);
        let deploy = rec.block_stage(test_outer_end, "deploy", &[]);

        let failed = &par.branches[1];
        rec.fail(failed.steps[0], "script returned exit code 1");
        rec.fail(failed.end, "script returned exit code 1");
        rec.fail(par.end, "script returned exit code 1");
        rec.fail(test_end, "script returned exit code 1");
        rec.mark_not_executed(deploy.body);

        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 5_000, GenericStatus::Failure),
        );
        let views = graph.nodes();

        let test_view = find(&views, "test");
        assert_eq!(test_view.result, Some(RunResult::Failure));
        assert_eq!(find(&views, "first").result, Some(RunResult::Success));
        assert_eq!(find(&views, "second").result, Some(RunResult::Failure));

        let deploy_view = find(&views, "deploy");
        assert_eq!(deploy_view.result, None);
        assert_eq!(deploy_view.state, None);
        assert_eq!(deploy_view.duration_in_millis, None);
    }

    #[test]
    fn test_running_single_stage() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let outer = rec.block_start(root, "Stage : Start");
        let build = rec.label_start(outer, "build");
        let step = rec.atom(build, "sh make");
        rec.mark_running(step);

        let graph = PipelineGraph::build(rec.finish(), RunInfo::in_progress(1_000));
        let views = graph.nodes();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].status(), Some(NodeRunStatus::running()));
        assert_eq!(views[0].duration_in_millis, None);
    }

    #[test]
    fn test_empty_trace() {
        let graph = PipelineGraph::build(Vec::new(), RunInfo::default());
        assert!(graph.is_empty());
        assert!(graph.nodes().is_empty());

        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let step = rec.atom(root, "echo hello");
        rec.flow_end(&[step]);
        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 300, GenericStatus::Success),
        );
        assert!(graph.nodes().is_empty());
    }

    #[test]
    fn test_step_form_stages_are_backfilled() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let checkout = rec.stage_marker(root, "checkout");
        let fetch = rec.atom(checkout, "git");
        let compile = rec.stage_marker(fetch, "compile");
        rec.atom(compile, "sh make");
        rec.fail(fetch, "repository not found");

        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 1_000, GenericStatus::Unstable),
        );
        let views = graph.nodes();
        assert_eq!(ids(&views), vec![checkout.to_string(), compile.to_string()]);
        assert_eq!(views[0].edge_ids(), vec![compile.to_string()]);

        // Closed by the node recorded right before the next stage
        assert_eq!(views[0].result, Some(RunResult::Failure));
        // The last stage always carries the run status
        assert_eq!(
            views[1].status(),
            Some(NodeRunStatus::new(RunResult::Unstable, RunState::Finished))
        );
    }

    #[test]
    fn test_bare_label_stage_uses_its_own_end() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let first = rec.block_stage(root, "first", &["echo 1"]);
        rec.warn(first.body_end, RunResult::Unstable, "flaky tests");
        let second = rec.block_stage(first.end, "second", &["echo 2"]);
        rec.flow_end(&[second.end]);

        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 2_000, GenericStatus::Unstable),
        );
        assert_eq!(
            graph.status(first.body).unwrap(),
            Some(NodeRunStatus::new(RunResult::Unstable, RunState::Finished))
        );
    }

    #[test]
    fn test_step_form_stage_followed_by_parallel_aggregates() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let checks = rec.stage_marker(root, "checks");
        let par = rec.parallel(checks, &[("lint", &["lint"]), ("unit", &["cargo test"])]);
        rec.warn(par.branches[0].end, RunResult::Unstable, "warnings");
        let ship = rec.block_stage(par.end, "ship", &["publish"]);
        rec.flow_end(&[ship.end]);

        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 3_000, GenericStatus::Success),
        );
        // Not closed by backfill: the next stage is a bare label
        assert_eq!(
            graph.status(checks).unwrap(),
            Some(NodeRunStatus::new(RunResult::Unstable, RunState::Finished))
        );
        assert_eq!(
            graph.children(checks).unwrap(),
            vec![par.branches[0].start, par.branches[1].start]
        );
        assert_eq!(graph.children(par.branches[1].start).unwrap(), vec![ship.body]);
    }

    #[test]
    fn test_running_branch() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let outer = rec.block_start(root, "Stage : Start");
        let test = rec.label_start(outer, "test");
        let par = rec.block_start(test, "Execute in parallel");
        let left = rec.branch_start(par, "left");
        let right = rec.branch_start(par, "right");
        let left_step = rec.atom(left, "echo");
        let _right_step = rec.atom(right, "sleep 60");
        rec.block_end(left, &[left_step]);

        let graph = PipelineGraph::build(rec.finish(), RunInfo::in_progress(1_000));
        assert_eq!(graph.status(right).unwrap(), Some(NodeRunStatus::running()));
        assert_eq!(
            graph.status(left).unwrap(),
            Some(NodeRunStatus::new(RunResult::Success, RunState::Finished))
        );
        assert_eq!(graph.status(test).unwrap(), Some(NodeRunStatus::running()));
        assert_eq!(graph.parallel_branches().len(), 2);
        assert_eq!(graph.stages().len(), 1);
    }

    #[test]
    fn test_nested_stages_are_not_graph_nodes() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let outer = rec.block_start(root, "Stage : Start");
        let test = rec.label_start(outer, "test");
        let par = rec.block_start(test, "Execute in parallel");
        let branch = rec.branch_start(par, "linux");
        let nested = rec.block_stage(branch, "unit", &["cargo test"]);
        let branch_end = rec.block_end(branch, &[nested.end]);
        let par_end = rec.block_end(par, &[branch_end]);
        let test_end = rec.block_end(test, &[par_end]);
        rec.block_end(outer, &[test_end]);

        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 2_000, GenericStatus::Success),
        );
        assert_eq!(graph.len(), 2);
        assert!(!graph.contains(nested.body));
        assert!(graph.node_by_id(nested.body).is_ok());
        assert!(graph.node_view(nested.body).unwrap_err().is_not_found());
    }

    #[test]
    fn test_parallel_without_stage_has_no_fan_in() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let par = rec.parallel(root, &[("left", &["l1"]), ("right", &["r1"])]);
        let after = rec.block_stage(par.end, "after", &["echo"]);
        rec.flow_end(&[after.end]);

        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 2_000, GenericStatus::Success),
        );
        assert_eq!(graph.len(), 3);
        for branch in &par.branches {
            assert!(graph.children(branch.start).unwrap().is_empty());
        }

        let after_id = after.body.to_string();
        let views = graph.nodes();
        assert!(views.iter().all(|v| !v.edge_ids().contains(&after_id.as_str())));
        assert_eq!(
            graph.status(after.body).unwrap(),
            Some(NodeRunStatus::new(RunResult::Success, RunState::Finished))
        );
    }

    #[test]
    fn test_branches_nested_in_branches_are_not_graph_nodes() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let outer = rec.block_start(root, "Stage : Start");
        let test = rec.label_start(outer, "test");
        let par = rec.block_start(test, "Execute in parallel");
        let left = rec.branch_start(par, "left");
        let right = rec.branch_start(par, "right");
        let inner = rec.parallel(left, &[("left-a", &["a"]), ("left-b", &["b"])]);
        let left_end = rec.block_end(left, &[inner.end]);
        let r1 = rec.atom(right, "r1");
        let right_end = rec.block_end(right, &[r1]);
        let par_end = rec.block_end(par, &[left_end, right_end]);
        let test_end = rec.block_end(test, &[par_end]);
        rec.block_end(outer, &[test_end]);

        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 2_000, GenericStatus::Success),
        );
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.parallel_branches().len(), 2);
        assert_eq!(graph.children(test).unwrap(), vec![left, right]);
        for branch in &inner.branches {
            assert!(!graph.contains(branch.start));
        }
        assert_eq!(graph.step_nodes(left).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let mut rec = TraceRecorder::new();
        scripted_pipeline(&mut rec);
        let graph = PipelineGraph::build(rec.finish(), RunInfo::in_progress(1_000));

        assert!(graph.node_by_id(NodeId(999)).unwrap_err().is_not_found());
        assert!(graph.children(NodeId(999)).unwrap_err().is_not_found());
        assert!(graph.status(NodeId(2)).unwrap_err().is_not_found());
    }
}
