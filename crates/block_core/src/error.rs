use thiserror::Error;

use crate::node::{NodeKind, Path};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("position {pos} is outside the document (content size {size})")]
    OutOfRange { pos: usize, size: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node kind: {0:?}")]
pub struct UnknownKind(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid indentation {0:?}, expected one of left, center, right")]
pub struct InvalidIndentation(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid key chord: {0:?}")]
pub struct InvalidKeyChord(pub String);

/// A primitive edit could not be applied. The draft it was issued against
/// must be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: Path, reason: String },
    #[error("position {0} is not inside a textblock")]
    NotATextblock(usize),
    #[error("no node starts at position {0}")]
    NoNodeAt(usize),
    #[error("cannot insert {kind} at position {pos}")]
    InvalidInsert { pos: usize, kind: NodeKind },
    #[error("unsupported range {from}..{to}: {reason}")]
    UnsupportedRange {
        from: usize,
        to: usize,
        reason: &'static str,
    },
    #[error("cannot change {from} into {to}")]
    InvalidMarkup { from: NodeKind, to: NodeKind },
    #[error("draft was taken at version {draft} but the editor is at version {editor}")]
    StaleDraft { draft: u64, editor: u64 },
    #[error("normalization did not converge after {0} iterations")]
    NormalizeDidNotConverge(usize),
}

impl StepError {
    pub(crate) fn invalid_path(path: &[usize], reason: impl Into<String>) -> Self {
        StepError::InvalidPath {
            path: path.to_vec(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    #[error("not applicable: {0}")]
    NotApplicable(String),
    #[error("transaction aborted: {0}")]
    Aborted(#[from] StepError),
}

impl CommandError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CommandError::InvalidOperand(message.into())
    }

    pub fn not_applicable(message: impl Into<String>) -> Self {
        CommandError::NotApplicable(message.into())
    }
}

impl From<PositionError> for CommandError {
    fn from(value: PositionError) -> Self {
        CommandError::Aborted(value.into())
    }
}

impl From<InvalidIndentation> for CommandError {
    fn from(value: InvalidIndentation) -> Self {
        CommandError::InvalidOperand(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown query: {0}")]
    Unknown(String),
    #[error("invalid query arguments: {0}")]
    InvalidArgs(String),
    #[error("failed to decode query result: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A document violates the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation at {path:?}: {message}")]
pub struct SchemaViolation {
    pub path: Path,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ExternalFormatError {
    #[error("unrecognized element <{0}>")]
    UnknownTag(String),
    #[error("attribute {attr:?} on <{tag}>: {reason}")]
    InvalidAttr {
        tag: String,
        attr: String,
        reason: String,
    },
    #[error("unsupported document format {schema:?} revision {version}")]
    UnsupportedEnvelope { schema: String, version: u32 },
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate plugin id: {0}")]
    DuplicatePlugin(String),
    #[error("duplicate command id: {0}")]
    DuplicateCommand(String),
    #[error("duplicate query id: {0}")]
    DuplicateQuery(String),
}
