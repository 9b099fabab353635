// Trace module
// Execution trace records, their parser and validator, and a recorder for building traces

pub mod error;
pub mod models;
pub mod parser;
pub mod recorder;

pub use error::{ParseError, ParseErrorKind, ParseResult, ValidationError};
pub use models::*;
pub use parser::{TraceParser, TraceValidator};
pub use recorder::{RecordedBranch, RecordedParallel, RecordedStage, TraceRecorder};
