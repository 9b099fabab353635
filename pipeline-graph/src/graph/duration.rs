// Duration Calculation
// Elapsed time of stages, branches and steps from the start times of their neighbours

use crate::error::{GraphError, GraphResult};
use crate::graph::builder::PipelineGraph;
use crate::graph::status::{NodeRunStatus, RunState};
use crate::trace::models::NodeId;

impl PipelineGraph {
    /// Duration of any trace node in milliseconds.
    ///
    /// - stage: until the next stage of the graph starts
    /// - parallel branch: until its end node starts
    /// - atomic step: until the next trace node starts
    ///
    /// Anything without such a boundary runs until the end of the run, or
    /// until now while the run is in progress. `None` for nodes that never
    /// started or when no clock was supplied for a running run.
    pub fn duration_in_millis(&self, id: NodeId) -> GraphResult<Option<u64>> {
        let pos = self
            .trace
            .position(id)
            .ok_or_else(|| GraphError::not_found(id))?;
        Ok(self.duration_at(pos))
    }

    pub(crate) fn duration_at(&self, pos: usize) -> Option<u64> {
        let start = self.trace.node(pos).start_time;
        if start == 0 {
            return None;
        }

        let boundary = if self.trace.is_stage(pos) {
            self.adjacency
                .active_positions()
                .skip_while(|&p| p != pos)
                .skip(1)
                .find(|&p| self.trace.is_stage(p))
        } else if self.trace.is_parallel_branch(pos) {
            self.trace.step_end_node(pos)
        } else if self.trace.node(pos).is_step_atom() {
            Some(pos + 1).filter(|&next| next < self.trace.len())
        } else {
            None
        };

        match boundary {
            Some(next) => Some(self.trace.node(next).start_time.saturating_sub(start)),
            None => self.until_run_end(start),
        }
    }

    /// Duration shown next to a status: measured for finished nodes, elapsed
    /// for running ones, absent otherwise
    pub(crate) fn duration_for_status(&self, pos: usize, status: NodeRunStatus) -> Option<u64> {
        match status.state {
            RunState::Finished => self.duration_at(pos),
            RunState::Running => {
                let start = self.trace.node(pos).start_time;
                if start == 0 {
                    return None;
                }
                self.elapsed_since(start)
            }
            _ => None,
        }
    }

    fn until_run_end(&self, start: u64) -> Option<u64> {
        match self.run.end_time() {
            Some(end) => Some(end.saturating_sub(start)),
            None => self.elapsed_since(start),
        }
    }

    fn elapsed_since(&self, start: u64) -> Option<u64> {
        self.now.map(|now| now.saturating_sub(start))
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::builder::PipelineGraph;
    use crate::trace::models::{GenericStatus, NodeId, RunInfo};
    use crate::trace::recorder::TraceRecorder;

    #[test]
    fn test_stage_runs_until_next_stage() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let first = rec.block_stage(root, "first", &["echo 1", "echo 2"]);
        let second = rec.block_stage(first.end, "second", &["echo 3"]);
        rec.flow_end(&[second.end]);
        let nodes = rec.finish();
        let start_of = |id: NodeId| nodes.iter().find(|n| n.id == id).unwrap().start_time;
        let (first_start, second_start) = (start_of(first.body), start_of(second.body));

        let graph = PipelineGraph::build(
            nodes.clone(),
            RunInfo::completed(1_000, 5_000, GenericStatus::Success),
        );
        assert_eq!(
            graph.duration_in_millis(first.body).unwrap(),
            Some(second_start - first_start)
        );
        // Last stage runs until the end of the run
        assert_eq!(
            graph.duration_in_millis(second.body).unwrap(),
            Some(6_000 - second_start)
        );
        let view = graph.node_view(first.body).unwrap();
        assert_eq!(view.duration_in_millis, Some(second_start - first_start));
    }

    #[test]
    fn test_branch_and_step_durations() {
        let mut rec = TraceRecorder::new().with_tick(50);
        let root = rec.head();
        let outer = rec.block_start(root, "Stage : Start");
        let test = rec.label_start(outer, "test");
        let par = rec.parallel(test, &[("left", &["echo"]), ("right", &["sleep 1"])]);
        let nodes = rec.finish();
        let start_of = |id: NodeId| nodes.iter().find(|n| n.id == id).unwrap().start_time;

        let graph = PipelineGraph::build(nodes.clone(), RunInfo::in_progress(1_000));
        let left = &par.branches[0];
        assert_eq!(
            graph.duration_in_millis(left.start).unwrap(),
            Some(start_of(left.end) - start_of(left.start))
        );
        // Steps end when the next recorded node starts, whichever branch it belongs to
        assert_eq!(graph.duration_in_millis(left.steps[0]).unwrap(), Some(50));
    }

    #[test]
    fn test_running_durations_need_a_clock() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let outer = rec.block_start(root, "Stage : Start");
        let build = rec.label_start(outer, "build");
        rec.atom(build, "sh make");
        let nodes = rec.finish();
        let build_start = nodes.iter().find(|n| n.id == build).unwrap().start_time;

        let graph = PipelineGraph::build(nodes.clone(), RunInfo::in_progress(1_000));
        assert_eq!(graph.duration_in_millis(build).unwrap(), None);
        assert_eq!(graph.node_view(build).unwrap().duration_in_millis, None);

        let graph = graph.with_clock(build_start + 750);
        assert_eq!(graph.duration_in_millis(build).unwrap(), Some(750));
        assert_eq!(graph.node_view(build).unwrap().duration_in_millis, Some(750));
    }

    #[test]
    fn test_unstarted_nodes_have_no_duration() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let stage = rec.block_stage(root, "build", &[]);
        if let Some(node) = rec.node_mut(stage.body) {
            node.start_time = 0;
        }
        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 100, GenericStatus::Success),
        );

        assert_eq!(graph.duration_in_millis(stage.body).unwrap(), None);
        let view = graph.node_view(stage.body).unwrap();
        assert_eq!(view.start_time, None);
        assert_eq!(view.duration_in_millis, None);
        assert!(graph.duration_in_millis(NodeId(404)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_durations_never_go_negative() {
        let mut rec = TraceRecorder::starting_at(10_000);
        let root = rec.head();
        let stage = rec.block_stage(root, "build", &["make"]);
        // Run metadata claims the run ended before the stage started
        let graph = PipelineGraph::build(
            rec.finish(),
            RunInfo::completed(1_000, 10, GenericStatus::Success),
        );
        assert_eq!(graph.duration_in_millis(stage.body).unwrap(), Some(0));
    }
}
