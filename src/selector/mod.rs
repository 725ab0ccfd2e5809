//! Selector engine
//!
//! A selector is a small declarative query over the shape graph,
//! compiled once into an expression tree and evaluated against any
//! number of models. Compilation catches every grammar problem up front
//! (unknown kinds, unknown relationships, malformed predicates) with the
//! byte offset of the offending token; evaluation of a compiled selector
//! cannot fail and always yields a set of shape ids.
//!
//! ## Grammar
//!
//! ```text
//! selector   := pipeline ("," pipeline)*          union (set merge)
//! pipeline   := step ((">" | ws) step)*           ws = descendant-or-self,
//!                                                 ">" = direct edges only
//! step       := kind-test                         structure, operation, *, ...
//!             | "[trait|" id ("=" string)? "]"    trait presence / value
//!             | "-[" rel "]->" | "<-[" rel "]-"   relationship traversal
//!             | ":not(" selector ")"
//!             | ":recursive"
//! ```

mod eval;
mod parser;

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::SelectorSyntaxError;
use crate::model::Model;
use crate::shapes::ShapeId;

use parser::{SelectorExpr, SelectorParser};

/// A compiled, reusable selector
///
/// Stateless after compilation; the same instance may be evaluated
/// against many models, concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    expr: SelectorExpr,
    source: String,
}

impl Selector {
    /// Compile a selector expression
    pub fn parse(text: &str) -> Result<Selector, SelectorSyntaxError> {
        let expr = SelectorParser::new(text).parse()?;
        Ok(Selector {
            expr,
            source: text.to_string(),
        })
    }

    /// Evaluate against a model, producing the set of matching shape ids
    ///
    /// The result is a set; iteration order is `ShapeId`'s total order.
    /// An empty set is a valid, non-error result.
    pub fn select(&self, model: &Model) -> BTreeSet<ShapeId> {
        eval::eval(&self.expr, model)
    }

    /// The original selector text
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Selector {
    type Err = SelectorSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}
