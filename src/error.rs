//! Error types for the semantic model core
//!
//! One thiserror enum per concern, aggregated into [`CoreError`] for
//! callers that want a single error type. Data-quality problems found
//! during assembly are never surfaced through these types; they become
//! [`ValidationEvent`](crate::validation::ValidationEvent)s instead.

use thiserror::Error;

use crate::shapes::ShapeId;

/// Top-level error type for the core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Node parse error: {0}")]
    NodeParse(#[from] NodeParseError),

    #[error("Shape id error: {0}")]
    ShapeId(#[from] ShapeIdError),

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Trait decode error: {0}")]
    TraitDecode(#[from] TraitDecodeError),

    #[error("Selector syntax error: {0}")]
    SelectorSyntax(#[from] SelectorSyntaxError),
}

/// Errors from the JSON node-tree parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeParseError {
    #[error("Syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Incomplete input: expected more content")]
    Incomplete,
}

/// A shape id that does not conform to `namespace#Name$member`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid shape id '{text}': {reason}")]
pub struct ShapeIdError {
    pub text: String,
    pub reason: String,
}

/// Graph-level problems that prevent a shape from entering the model
///
/// All of these are fatal for the affected shape and reported at ERROR
/// severity; the assembler still returns the best-effort graph built
/// from the remaining shapes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("Unresolved shape id `{target}` referenced from `{referrer}`")]
    UnresolvedShapeId { referrer: ShapeId, target: ShapeId },

    #[error("Cyclic mixin chain involving `{shape}`")]
    CyclicMixin { shape: ShapeId },

    #[error("Conflicting definitions for member `{member}` of `{shape}`")]
    ConflictingMember { shape: ShapeId, member: String },

    #[error("Structure `{shape}` contains itself without list, map, or union indirection")]
    InvalidStructuralCycle { shape: ShapeId },

    #[error("Conflicting redefinition of shape `{shape}`")]
    ConflictingDefinition { shape: ShapeId },

    #[error("Conflicting values for trait `{trait_id}` inherited by `{shape}`")]
    ConflictingTrait { shape: ShapeId, trait_id: ShapeId },
}

impl StructuralError {
    /// Stable event id used when the error is reported as a ValidationEvent
    pub fn event_id(&self) -> &'static str {
        match self {
            StructuralError::UnresolvedShapeId { .. } => "UnresolvedShapeId",
            StructuralError::CyclicMixin { .. } => "CyclicMixin",
            StructuralError::ConflictingMember { .. } => "ConflictingMember",
            StructuralError::InvalidStructuralCycle { .. } => "InvalidStructuralCycle",
            StructuralError::ConflictingDefinition { .. } => "ConflictingDefinition",
            StructuralError::ConflictingTrait { .. } => "ConflictingTrait",
        }
    }

    /// The shape the error should be reported against
    pub fn shape(&self) -> &ShapeId {
        match self {
            StructuralError::UnresolvedShapeId { referrer, .. } => referrer,
            StructuralError::CyclicMixin { shape }
            | StructuralError::ConflictingMember { shape, .. }
            | StructuralError::InvalidStructuralCycle { shape }
            | StructuralError::ConflictingDefinition { shape }
            | StructuralError::ConflictingTrait { shape, .. } => shape,
        }
    }
}

/// A trait payload that does not decode to its declared structural shape
///
/// Contained locally: the offending (shape, trait) pair is reported and
/// the trait treated as absent; unrelated shapes are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraitDecodeError {
    #[error("Trait `{trait_id}` expects {expected}, found {found}")]
    WrongShape {
        trait_id: ShapeId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Trait `{trait_id}`: {message}")]
    Invalid { trait_id: ShapeId, message: String },
}

/// Selector compile errors, each carrying the offending byte offset
///
/// Raised only by [`Selector::parse`](crate::selector::Selector::parse);
/// evaluation of a compiled selector cannot fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorSyntaxError {
    #[error("Unexpected token at offset {position}: {message}")]
    UnexpectedToken { position: usize, message: String },

    #[error("Unknown shape kind `{name}` at offset {position}")]
    UnknownKind { name: String, position: usize },

    #[error("Unknown relationship `{name}` at offset {position}")]
    UnknownRelationship { name: String, position: usize },

    #[error("Unknown selector function `:{name}` at offset {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("Malformed trait test at offset {position}: {message}")]
    MalformedTraitTest { position: usize, message: String },

    #[error("Empty selector")]
    Empty,
}

impl SelectorSyntaxError {
    /// Byte offset of the offending token, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            SelectorSyntaxError::UnexpectedToken { position, .. }
            | SelectorSyntaxError::UnknownKind { position, .. }
            | SelectorSyntaxError::UnknownRelationship { position, .. }
            | SelectorSyntaxError::UnknownFunction { position, .. }
            | SelectorSyntaxError::MalformedTraitTest { position, .. } => Some(*position),
            SelectorSyntaxError::Empty => None,
        }
    }
}
