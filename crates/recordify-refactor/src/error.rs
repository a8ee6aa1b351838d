use std::fmt;

use recordify_syntax::NodeId;
use serde::Serialize;
use thiserror::Error;

/// The tree breaks an assumption the conversion relies on. Reported for the
/// affected class only; the class is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralAssumptionViolation {
    #[error("node {id} does not exist in the tree")]
    UnknownNode { id: NodeId },
    #[error("node {id} ({node_kind}) cannot appear in a class body")]
    NotAMember { id: NodeId, node_kind: String },
    #[error("member {id} is listed more than once")]
    DuplicateMember { id: NodeId },
    #[error("field `{field}` has position {position}, which is out of declaration order")]
    FieldOutOfOrder { field: String, position: usize },
    #[error("body of `{member}` is not a well-formed braced block")]
    MalformedBody { member: String },
    #[error("conversion panicked: {message}")]
    Panicked { message: String },
}

/// Review notes that never block a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A retained accessor-shaped method is not public.
    NonPublicAccessor { method: String },
    /// Several constructors have the canonical shape; the first one is used.
    AmbiguousCanonicalConstructor { candidates: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NonPublicAccessor { method } => {
                write!(f, "accessor `{method}()` is retained but not public")
            }
            Diagnostic::AmbiguousCanonicalConstructor { candidates } => write!(
                f,
                "{candidates} constructors match the canonical shape; the first declared is used"
            ),
        }
    }
}

pub(crate) fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "<non-string panic payload>".to_string())
}
