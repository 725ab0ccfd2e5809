//! idl-core: semantic model, trait system, selector engine, and
//! validation for an interface-definition-language toolchain
//!
//! This crate contains the pure semantic backbone with NO I/O
//! dependencies:
//! - Node value layer (lossless literal trees with provenance)
//! - Shape graph (immutable, cross-referenced model of typed nodes)
//! - Trait system (typed metadata with mixin-aware merge rules)
//! - Selector engine (compiled declarative queries over the graph)
//! - Validation framework (pluggable rules, structured diagnostics,
//!   suppression)
//! - Model assembler tying the pieces together
//!
//! ## Pipeline
//!
//! ```text
//! JSON fragments → Node trees → raw shapes → merge → mixin resolution
//!                                          → trait resolution → Model
//!                                          → validators → events
//! ```
//!
//! The CLI, build orchestration, and code generators live elsewhere and
//! consume this crate only through [`Assembler::assemble`],
//! [`Selector::select`], and the [`Model`] query surface.
//!
//! # Example
//!
//! ```
//! use idl_core::{Assembler, Selector};
//!
//! let fragment = r#"{
//!     "shapes": {
//!         "example#City": {
//!             "type": "structure",
//!             "members": {
//!                 "name": {"target": "idl.api#String",
//!                          "traits": {"required": {}}}
//!             },
//!             "traits": {"documentation": "A city record"}
//!         }
//!     }
//! }"#;
//!
//! let result = Assembler::new().assemble_sources(&[fragment]);
//! let model = result.value().unwrap();
//!
//! let selector = Selector::parse("structure [trait|documentation]").unwrap();
//! let matched = selector.select(model);
//! assert_eq!(matched.len(), 1);
//! ```

pub mod assembler;
pub mod error;
pub mod model;
pub mod node;
pub mod node_parser;
pub mod selector;
pub mod shapes;
pub mod traits;
pub mod validation;

// Re-export commonly used types
pub use assembler::Assembler;
pub use error::{
    CoreError, NodeParseError, SelectorSyntaxError, ShapeIdError, StructuralError,
    TraitDecodeError,
};
pub use model::{prelude, Model, Relationship};
pub use node::{Node, NodeValue, SourceLocation};
pub use node_parser::parse_node;
pub use selector::Selector;
pub use shapes::{Shape, ShapeBody, ShapeBuilder, ShapeId, ShapeKind};
pub use traits::{known, MergePolicy, TestCase, TraitFactory, TraitRegistry, TraitValue};
pub use validation::{
    apply_suppressions, NodeChecker, Severity, TestCasesValidator, UndocumentedShapesValidator,
    ValidatedResult, ValidationEvent, Validator, ValidatorRegistry,
};
