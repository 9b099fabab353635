// Run Status Resolution
// Maps node and run metadata onto the (result, state) pairs shown to clients

use crate::trace::models::{GenericStatus, TraceNode};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a node or run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResult {
    Success,
    Unstable,
    Failure,
    Aborted,
    Unknown,
    NotBuilt,
}

/// Lifecycle position of a node or run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Queued,
    Running,
    Paused,
    Finished,
    NotBuilt,
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunResult::Success => "SUCCESS",
            RunResult::Unstable => "UNSTABLE",
            RunResult::Failure => "FAILURE",
            RunResult::Aborted => "ABORTED",
            RunResult::Unknown => "UNKNOWN",
            RunResult::NotBuilt => "NOT_BUILT",
        };
        f.write_str(s)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Queued => "QUEUED",
            RunState::Running => "RUNNING",
            RunState::Paused => "PAUSED",
            RunState::Finished => "FINISHED",
            RunState::NotBuilt => "NOT_BUILT",
        };
        f.write_str(s)
    }
}

/// A (result, state) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRunStatus {
    pub result: RunResult,
    pub state: RunState,
}

impl NodeRunStatus {
    pub const fn new(result: RunResult, state: RunState) -> Self {
        Self { result, state }
    }

    /// Status of a branch whose end node has not been recorded yet
    pub const fn running() -> Self {
        Self::new(RunResult::Unknown, RunState::Running)
    }

    /// Resolve the status carried by a single node, usually the end node of
    /// a block. Errors win over liveness, liveness over execution.
    pub fn from_node(node: &TraceNode) -> Self {
        if let Some(error) = &node.error {
            let result = if error.is_abort() {
                RunResult::Aborted
            } else {
                RunResult::Failure
            };
            let state = if node.running {
                RunState::Running
            } else {
                RunState::Finished
            };
            return Self::new(result, state);
        }

        if node.running {
            return Self::running();
        }

        if node.executed {
            let result = match node.warning.as_ref().map(|w| w.result) {
                Some(RunResult::Unstable) => RunResult::Unstable,
                Some(RunResult::Failure) => RunResult::Failure,
                _ => RunResult::Success,
            };
            return Self::new(result, RunState::Finished);
        }

        Self::new(RunResult::NotBuilt, RunState::Queued)
    }

    /// Resolve a run-level status. The table is shared with the
    /// visualization client and must not drift.
    pub fn from_generic(status: Option<GenericStatus>) -> Self {
        let Some(status) = status else {
            return Self::new(RunResult::NotBuilt, RunState::Queued);
        };

        match status {
            GenericStatus::PausedPendingInput => Self::new(RunResult::Unknown, RunState::Paused),
            GenericStatus::Aborted => Self::new(RunResult::Aborted, RunState::Finished),
            GenericStatus::Failure => Self::new(RunResult::Failure, RunState::Finished),
            GenericStatus::InProgress => Self::new(RunResult::Unknown, RunState::Running),
            GenericStatus::Unstable => Self::new(RunResult::Unstable, RunState::Finished),
            GenericStatus::Success => Self::new(RunResult::Success, RunState::Finished),
            GenericStatus::NotExecuted => Self::new(RunResult::NotBuilt, RunState::NotBuilt),
            GenericStatus::Unknown => Self::new(RunResult::NotBuilt, RunState::Queued),
        }
    }

    /// Derive the status of a stage from the statuses of its parallel
    /// branches.
    ///
    /// The first FAILURE or UNSTABLE branch decides the result; later ones
    /// do not override it. Without such a branch, any UNKNOWN branch makes the
    /// result UNKNOWN. The state is FINISHED unless a branch is elsewhere, and
    /// once RUNNING it stays RUNNING.
    pub fn aggregate<'a>(branches: impl IntoIterator<Item = &'a NodeRunStatus>) -> Self {
        let mut result = RunResult::Success;
        let mut state = RunState::Finished;
        let mut branch_did_not_succeed = false;
        let mut branch_is_unknown = false;

        for status in branches {
            if !branch_did_not_succeed
                && matches!(status.result, RunResult::Failure | RunResult::Unstable)
            {
                branch_did_not_succeed = true;
                result = status.result;
            }

            if status.result == RunResult::Unknown {
                branch_is_unknown = true;
            }

            if status.state != RunState::Finished && state != RunState::Running {
                state = status.state;
            }
        }

        if !branch_did_not_succeed && branch_is_unknown {
            result = RunResult::Unknown;
        }

        Self::new(result, state)
    }
}
