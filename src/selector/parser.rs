//! Selector grammar parser
//!
//! Compiles selector text into an expression tree. All grammar problems
//! are caught here, at compile time, with the byte offset of the
//! offending token; the evaluator never sees an invalid tree.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::SelectorSyntaxError;
use crate::model::Relationship;
use crate::shapes::{ShapeId, ShapeKind};

/// Namespace used to resolve relative trait names like `[trait|error]`
const RELATIVE_TRAIT_NAMESPACE: &str = "idl.api";

// =============================================================================
// EXPRESSION TREE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorExpr {
    pub alternatives: Vec<Pipeline>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pipeline {
    pub steps: Vec<PipelineStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PipelineStep {
    pub composition: Composition,
    pub step: Step,
}

/// How a step receives its candidate set from the previous step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Composition {
    /// First step: every shape in the model
    Initial,
    /// Whitespace: the previous matches plus everything reachable from them
    DescendantOrSelf,
    /// `>`: only shapes one relationship edge away
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KindTest {
    Any,
    Kind(ShapeKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Kind(KindTest),
    TraitTest {
        trait_id: ShapeId,
        value: Option<String>,
    },
    Relationship {
        rel: Relationship,
        direction: Direction,
    },
    Not(Box<SelectorExpr>),
    Recursive,
}

// =============================================================================
// PARSER
// =============================================================================

pub(crate) struct SelectorParser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> SelectorParser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    pub fn parse(mut self) -> Result<SelectorExpr, SelectorSyntaxError> {
        self.skip_whitespace();
        if self.peek_char().is_none() {
            return Err(SelectorSyntaxError::Empty);
        }
        let expr = self.parse_union()?;
        self.skip_whitespace();
        if let Some(ch) = self.peek_char() {
            return Err(self.unexpected(format!("unexpected '{ch}'")));
        }
        Ok(expr)
    }

    fn parse_union(&mut self) -> Result<SelectorExpr, SelectorSyntaxError> {
        let mut alternatives = vec![self.parse_pipeline()?];
        loop {
            self.skip_whitespace();
            if self.peek_char() == Some(',') {
                self.chars.next();
                alternatives.push(self.parse_pipeline()?);
            } else {
                break;
            }
        }
        Ok(SelectorExpr { alternatives })
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, SelectorSyntaxError> {
        let first = self.parse_step()?;
        let mut steps = vec![PipelineStep {
            composition: Composition::Initial,
            step: first,
        }];

        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None | Some(',') | Some(')') => break,
                Some('>') => {
                    self.chars.next();
                    let step = self.parse_step()?;
                    steps.push(PipelineStep {
                        composition: Composition::Direct,
                        step,
                    });
                }
                Some(_) => {
                    let step = self.parse_step()?;
                    steps.push(PipelineStep {
                        composition: Composition::DescendantOrSelf,
                        step,
                    });
                }
            }
        }

        Ok(Pipeline { steps })
    }

    fn parse_step(&mut self) -> Result<Step, SelectorSyntaxError> {
        self.skip_whitespace();
        match self.peek_char() {
            None => Err(self.unexpected("expected a selector step".to_string())),
            Some('*') => {
                self.chars.next();
                Ok(Step::Kind(KindTest::Any))
            }
            Some('[') => self.parse_trait_test(),
            Some('-') => self.parse_relationship(Direction::Forward),
            Some('<') => self.parse_relationship(Direction::Reverse),
            Some(':') => self.parse_function(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_kind_test(),
            Some(c) => Err(self.unexpected(format!("unexpected '{c}'"))),
        }
    }

    // =========================================================================
    // Step parsers
    // =========================================================================

    fn parse_kind_test(&mut self) -> Result<Step, SelectorSyntaxError> {
        let position = self.current_pos();
        let name = self.read_identifier();
        match ShapeKind::from_lexical_name(&name) {
            Some(kind) => Ok(Step::Kind(KindTest::Kind(kind))),
            None => Err(SelectorSyntaxError::UnknownKind { name, position }),
        }
    }

    fn parse_trait_test(&mut self) -> Result<Step, SelectorSyntaxError> {
        let position = self.current_pos();
        self.chars.next(); // consume [
        self.skip_whitespace();

        let keyword = self.read_identifier();
        if keyword != "trait" {
            return Err(SelectorSyntaxError::MalformedTraitTest {
                position,
                message: format!("expected 'trait', found '{keyword}'"),
            });
        }

        self.skip_whitespace();
        if self.peek_char() != Some('|') {
            return Err(SelectorSyntaxError::MalformedTraitTest {
                position,
                message: "expected '|' after 'trait'".to_string(),
            });
        }
        self.chars.next();
        self.skip_whitespace();

        let id_position = self.current_pos();
        let id_text = self.read_shape_id_chars();
        let absolute = if id_text.contains('#') {
            id_text
        } else {
            format!("{RELATIVE_TRAIT_NAMESPACE}#{id_text}")
        };
        let trait_id =
            ShapeId::parse(&absolute).map_err(|e| SelectorSyntaxError::MalformedTraitTest {
                position: id_position,
                message: e.to_string(),
            })?;

        self.skip_whitespace();
        let value = if self.peek_char() == Some('=') {
            self.chars.next();
            self.skip_whitespace();
            Some(self.read_quoted_string()?)
        } else {
            None
        };

        self.skip_whitespace();
        if self.peek_char() != Some(']') {
            return Err(SelectorSyntaxError::MalformedTraitTest {
                position,
                message: "missing closing ']'".to_string(),
            });
        }
        self.chars.next();

        Ok(Step::TraitTest { trait_id, value })
    }

    fn parse_relationship(&mut self, direction: Direction) -> Result<Step, SelectorSyntaxError> {
        match direction {
            // -[rel]->
            Direction::Forward => {
                self.expect('-')?;
                self.expect('[')?;
            }
            // <-[rel]-
            Direction::Reverse => {
                self.expect('<')?;
                self.expect('-')?;
                self.expect('[')?;
            }
        }

        let position = self.current_pos();
        let name = self.read_identifier();
        let rel = Relationship::from_lexical_name(&name)
            .ok_or(SelectorSyntaxError::UnknownRelationship {
                name: name.clone(),
                position,
            })?;

        self.expect(']')?;
        self.expect('-')?;
        if direction == Direction::Forward {
            self.expect('>')?;
        }

        Ok(Step::Relationship { rel, direction })
    }

    fn parse_function(&mut self) -> Result<Step, SelectorSyntaxError> {
        self.chars.next(); // consume :
        let position = self.current_pos();
        let name = self.read_identifier();
        match name.as_str() {
            "not" => {
                self.skip_whitespace();
                self.expect('(')?;
                let inner = self.parse_union()?;
                self.skip_whitespace();
                self.expect(')')?;
                Ok(Step::Not(Box::new(inner)))
            }
            "recursive" => Ok(Step::Recursive),
            _ => Err(SelectorSyntaxError::UnknownFunction { name, position }),
        }
    }

    // =========================================================================
    // Lexing helpers
    // =========================================================================

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn current_pos(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(p, _)| *p)
            .unwrap_or(self.source.len())
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SelectorSyntaxError> {
        match self.peek_char() {
            Some(c) if c == expected => {
                self.chars.next();
                Ok(())
            }
            _ => Err(self.unexpected(format!("expected '{expected}'"))),
        }
    }

    fn unexpected(&mut self, message: String) -> SelectorSyntaxError {
        SelectorSyntaxError::UnexpectedToken {
            position: self.current_pos(),
            message,
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    fn read_shape_id_chars(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '#' | '$') {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    fn read_quoted_string(&mut self) -> Result<String, SelectorSyntaxError> {
        let position = self.current_pos();
        if self.peek_char() != Some('"') {
            return Err(SelectorSyntaxError::MalformedTraitTest {
                position,
                message: "expected a quoted value".to_string(),
            });
        }
        self.chars.next();

        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(out),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c @ ('"' | '\\'))) => out.push(c),
                    _ => {
                        return Err(SelectorSyntaxError::MalformedTraitTest {
                            position,
                            message: "invalid escape in quoted value".to_string(),
                        })
                    }
                },
                Some((_, c)) => out.push(c),
                None => {
                    return Err(SelectorSyntaxError::MalformedTraitTest {
                        position,
                        message: "unclosed quoted value".to_string(),
                    })
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<SelectorExpr, SelectorSyntaxError> {
        SelectorParser::new(text).parse()
    }

    #[test]
    fn test_single_kind_test() {
        let expr = parse("structure").unwrap();
        assert_eq!(expr.alternatives.len(), 1);
        assert_eq!(
            expr.alternatives[0].steps[0].step,
            Step::Kind(KindTest::Kind(ShapeKind::Structure))
        );
    }

    #[test]
    fn test_wildcard() {
        let expr = parse("*").unwrap();
        assert_eq!(expr.alternatives[0].steps[0].step, Step::Kind(KindTest::Any));
    }

    #[test]
    fn test_whitespace_composition() {
        let expr = parse("structure [trait|error]").unwrap();
        let steps = &expr.alternatives[0].steps;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].composition, Composition::Initial);
        assert_eq!(steps[1].composition, Composition::DescendantOrSelf);
    }

    #[test]
    fn test_direct_composition() {
        let expr = parse("operation > structure").unwrap();
        let steps = &expr.alternatives[0].steps;
        assert_eq!(steps[1].composition, Composition::Direct);
    }

    #[test]
    fn test_trait_test_relative_name() {
        let expr = parse("[trait|error]").unwrap();
        match &expr.alternatives[0].steps[0].step {
            Step::TraitTest { trait_id, value } => {
                assert_eq!(trait_id.to_string(), "idl.api#error");
                assert!(value.is_none());
            }
            other => panic!("expected trait test, got {other:?}"),
        }
    }

    #[test]
    fn test_trait_test_absolute_name_with_value() {
        let expr = parse(r#"[trait|example.custom#stage = "beta"]"#).unwrap();
        match &expr.alternatives[0].steps[0].step {
            Step::TraitTest { trait_id, value } => {
                assert_eq!(trait_id.to_string(), "example.custom#stage");
                assert_eq!(value.as_deref(), Some("beta"));
            }
            other => panic!("expected trait test, got {other:?}"),
        }
    }

    #[test]
    fn test_relationship_forward() {
        let expr = parse("-[input]->").unwrap();
        assert_eq!(
            expr.alternatives[0].steps[0].step,
            Step::Relationship {
                rel: Relationship::Input,
                direction: Direction::Forward
            }
        );
    }

    #[test]
    fn test_relationship_reverse() {
        let expr = parse("<-[member]-").unwrap();
        assert_eq!(
            expr.alternatives[0].steps[0].step,
            Step::Relationship {
                rel: Relationship::Member,
                direction: Direction::Reverse
            }
        );
    }

    #[test]
    fn test_union() {
        let expr = parse("structure, union").unwrap();
        assert_eq!(expr.alternatives.len(), 2);
    }

    #[test]
    fn test_not_function() {
        let expr = parse("structure :not([trait|documentation])").unwrap();
        let steps = &expr.alternatives[0].steps;
        assert!(matches!(steps[1].step, Step::Not(_)));
    }

    #[test]
    fn test_recursive_function() {
        let expr = parse("structure :recursive").unwrap();
        assert_eq!(expr.alternatives[0].steps[1].step, Step::Recursive);
    }

    #[test]
    fn test_unknown_kind_has_position() {
        let err = parse("structure uniom").unwrap_err();
        assert_eq!(
            err,
            SelectorSyntaxError::UnknownKind {
                name: "uniom".to_string(),
                position: 10
            }
        );
    }

    #[test]
    fn test_unknown_relationship_has_position() {
        let err = parse("-[inputs]->").unwrap_err();
        match err {
            SelectorSyntaxError::UnknownRelationship { name, position } => {
                assert_eq!(name, "inputs");
                assert_eq!(position, 2);
            }
            other => panic!("expected unknown relationship, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_function() {
        let err = parse(":frobnicate").unwrap_err();
        assert!(matches!(err, SelectorSyntaxError::UnknownFunction { .. }));
    }

    #[test]
    fn test_malformed_trait_test() {
        assert!(matches!(
            parse("[traits|error]").unwrap_err(),
            SelectorSyntaxError::MalformedTraitTest { .. }
        ));
        assert!(matches!(
            parse("[trait|error").unwrap_err(),
            SelectorSyntaxError::MalformedTraitTest { .. }
        ));
        assert!(matches!(
            parse("[trait|error = beta]").unwrap_err(),
            SelectorSyntaxError::MalformedTraitTest { .. }
        ));
    }

    #[test]
    fn test_empty_selector() {
        assert_eq!(parse("").unwrap_err(), SelectorSyntaxError::Empty);
        assert_eq!(parse("   ").unwrap_err(), SelectorSyntaxError::Empty);
    }

    #[test]
    fn test_dangling_close_paren() {
        assert!(matches!(
            parse("structure)").unwrap_err(),
            SelectorSyntaxError::UnexpectedToken { .. }
        ));
    }
}
