// Graph Errors
// The two conditions the graph builder reports instead of degrading

use crate::trace::models::NodeId;

use thiserror::Error;

/// Error type for graph operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("graph error: {message}")]
pub struct GraphError {
    pub message: String,
    pub kind: GraphErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Requested node id is not part of the graph
    NodeNotFound,
    /// Parent links do not lead where the trace structure says they should
    InconsistentTrace,
}

impl GraphError {
    pub fn not_found(id: NodeId) -> Self {
        Self {
            message: format!("node '{}' not found", id),
            kind: GraphErrorKind::NodeNotFound,
        }
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::InconsistentTrace,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == GraphErrorKind::NodeNotFound
    }
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = GraphError::not_found(NodeId(42));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "graph error: node '42' not found");
    }

    #[test]
    fn test_inconsistent_kind() {
        let err = GraphError::inconsistent("parent '3' of node '9' is missing");
        assert_eq!(err.kind, GraphErrorKind::InconsistentTrace);
        assert!(!err.is_not_found());
    }
}
