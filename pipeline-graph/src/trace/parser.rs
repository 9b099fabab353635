// Trace Parser
// Loads trace documents from YAML or JSON and checks their structure

use crate::trace::error::{ParseError, ParseResult, ValidationError};
use crate::trace::models::{NodeId, TraceDocument};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parser for trace documents
pub struct TraceParser;

impl TraceParser {
    /// Parse a trace from a string. JSON is valid YAML, so both formats load.
    pub fn parse(content: &str) -> ParseResult<TraceDocument> {
        let document: TraceDocument =
            serde_yaml::from_str(content).map_err(|e| ParseError::from_yaml_error(&e, content))?;

        debug!(nodes = document.nodes.len(), "parsed trace");
        Ok(document)
    }

    /// Parse a trace from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<TraceDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ParseError::io(format!("failed to read {}: {}", path.display(), e)))?;

        Self::parse(&content)
    }
}

/// Structural checks on a parsed trace. The graph builder tolerates every
/// problem reported here; validation only explains odd graphs.
pub struct TraceValidator;

impl TraceValidator {
    pub fn validate(document: &TraceDocument) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for node in &document.nodes {
            if !seen.insert(node.id) {
                errors.push(
                    ValidationError::new(format!("duplicate node id '{}'", node.id), path(node.id))
                        .with_suggestion("only the first node with this id is used"),
                );
            }
        }

        let mut closed: HashMap<NodeId, NodeId> = HashMap::new();
        for node in &document.nodes {
            for parent in &node.parents {
                if !seen.contains(parent) {
                    errors.push(
                        ValidationError::new(
                            format!("parent '{}' does not exist", parent),
                            path(node.id),
                        )
                        .with_suggestion("remove the parent or add the missing node"),
                    );
                } else if *parent >= node.id {
                    errors.push(ValidationError::new(
                        format!("parent '{}' was not recorded before its child", parent),
                        path(node.id),
                    ));
                }
            }

            if let Some(start) = node.block_start() {
                let start_is_block = document
                    .nodes
                    .iter()
                    .any(|n| n.id == start && n.is_block_start());
                if !start_is_block {
                    errors.push(ValidationError::new(
                        format!("closes '{}', which is not a block start", start),
                        path(node.id),
                    ));
                } else if let Some(first) = closed.insert(start, node.id) {
                    errors.push(ValidationError::new(
                        format!("block '{}' is already closed by '{}'", start, first),
                        path(node.id),
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn path(id: NodeId) -> String {
    format!("nodes[id={}]", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::error::ParseErrorKind;
    use crate::trace::models::{FlowNodeType, GenericStatus, TraceNode};
    use crate::trace::recorder::TraceRecorder;
    use std::io::Write;

    const TRACE: &str = r#"
run:
  startTime: 1000
  durationMillis: 900
  complete: true
  status: SUCCESS
nodes:
  - id: 2
    type: flowStart
    startTime: 1000
  - id: 3
    type: blockStart
    displayName: "Stage : Start"
    parents: [2]
    startTime: 1100
  - id: 4
    type: blockStart
    displayName: build
    label: build
    parents: [3]
    startTime: 1200
  - id: 5
    type: stepAtom
    displayName: make
    parents: [4]
    startTime: 1300
  - id: 6
    type: blockEnd
    startId: 4
    parents: [5]
    startTime: 1400
    warning:
      result: UNSTABLE
      message: flaky
"#;

    #[test]
    fn test_parse_yaml_trace() {
        let document = TraceParser::parse(TRACE).unwrap();
        assert_eq!(document.run.status, Some(GenericStatus::Success));
        assert_eq!(document.nodes.len(), 5);
        assert_eq!(document.nodes[2].label.as_deref(), Some("build"));
        assert_eq!(
            document.nodes[4].node_type,
            FlowNodeType::BlockEnd { start: NodeId(4) }
        );
        assert!(document.nodes[4].warning.is_some());
        assert!(TraceValidator::validate(&document).is_ok());
    }

    #[test]
    fn test_parse_json_trace() {
        let json = r#"{"run": {"complete": false, "status": "IN_PROGRESS"},
            "nodes": [{"id": 2, "type": "flowStart"}, {"id": 3, "type": "stepAtom", "parents": [2], "executed": false}]}"#;
        let document = TraceParser::parse(json).unwrap();
        assert_eq!(document.nodes.len(), 2);
        assert!(!document.nodes[1].executed);
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRACE.as_bytes()).unwrap();
        let document = TraceParser::parse_file(file.path()).unwrap();
        assert_eq!(document.nodes.len(), 5);

        let err = TraceParser::parse_file("/nonexistent/trace.yaml").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::IoError);
    }

    #[test]
    fn test_missing_start_id() {
        let yaml = "nodes:\n  - id: 2\n    type: blockEnd\n";
        let err = TraceParser::parse(yaml).unwrap_err();
        assert!(err.message.contains("startId"));
        assert_eq!(err.kind, ParseErrorKind::InvalidSchema);
    }

    #[test]
    fn test_validator_reports_structural_problems() {
        let mut rec = TraceRecorder::new();
        let root = rec.head();
        let block = rec.block_start(root, "node");
        let step = rec.atom(block, "echo");
        rec.block_end(block, &[step]);
        let mut nodes = rec.finish();

        let mut duplicate = TraceNode::new(step, FlowNodeType::StepAtom);
        duplicate.parents = vec![block];
        nodes.push(duplicate);

        let mut orphan = TraceNode::new(20, FlowNodeType::StepAtom);
        orphan.parents = vec![NodeId(15)];
        nodes.push(orphan);

        let mut forward = TraceNode::new(21, FlowNodeType::StepAtom);
        forward.parents = vec![NodeId(21)];
        nodes.push(forward);

        nodes.push(TraceNode::new(22, FlowNodeType::BlockEnd { start: block }));
        nodes.push(TraceNode::new(23, FlowNodeType::BlockEnd { start: step }));

        let errors = TraceValidator::validate(&TraceDocument {
            run: Default::default(),
            nodes,
        })
        .unwrap_err();
        let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();

        assert!(messages.iter().any(|m| m.starts_with("duplicate node id")));
        assert!(messages.iter().any(|m| m == "parent '15' does not exist"));
        assert!(messages.iter().any(|m| m.contains("not recorded before")));
        assert!(messages.iter().any(|m| m.contains("already closed")));
        assert!(messages.iter().any(|m| m.contains("not a block start")));
        assert!(errors.iter().any(|e| e.path == "nodes[id=20]"));
    }
}
