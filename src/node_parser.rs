//! Nom-based parser for node trees
//!
//! Parses JSON text into [`Node`] trees. Unlike a generic JSON reader,
//! this parser keeps numbers exact (`i64` or `Decimal`, never `f64`),
//! preserves object member order, and tags every node with its
//! line/column for diagnostics. There is no type coercion on decode.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, cut, map, map_opt, opt, recognize, value},
    error::{context, ContextError, ParseError as NomParseError, VerboseError},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    IResult,
};
use nom_locate::LocatedSpan;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::NodeParseError;
use crate::node::{Node, NodeValue, SourceLocation};

type Span<'a> = LocatedSpan<&'a str>;

// ============================================================================
// Public API
// ============================================================================

/// Parse a complete node tree from JSON text
///
/// # Example
/// ```
/// use idl_core::parse_node;
///
/// let node = parse_node(r#"{"name": "Weather", "version": 2}"#).unwrap();
/// assert_eq!(node.get("version").and_then(|n| n.as_integer()), Some(2));
/// ```
pub fn parse_node(input: &str) -> Result<Node, NodeParseError> {
    let span = Span::new(input);
    match all_consuming(delimited(
        multispace0,
        json_value::<VerboseError<Span>>,
        multispace0,
    ))(span)
    {
        Ok((_, node)) => Ok(node),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = e
                .errors
                .first()
                .map(|(s, _)| s.location_offset())
                .unwrap_or(0);
            let flattened = VerboseError {
                errors: e
                    .errors
                    .into_iter()
                    .map(|(s, kind)| (*s.fragment(), kind))
                    .collect(),
            };
            Err(NodeParseError::Syntax {
                position,
                message: nom::error::convert_error(input, flattened),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(NodeParseError::Incomplete),
    }
}

// ============================================================================
// Internal Parsers
// ============================================================================

fn position(span: &Span) -> SourceLocation {
    SourceLocation::new(span.location_line(), span.get_utf8_column() as u32)
}

fn json_value<'a, E: NomParseError<Span<'a>> + ContextError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, Node, E> {
    let location = position(&input);
    let (input, val) = alt((
        value(NodeValue::Null, tag("null")),
        value(NodeValue::Boolean(true), tag("true")),
        value(NodeValue::Boolean(false), tag("false")),
        map(string_literal, NodeValue::String),
        number_literal,
        array_literal,
        object_literal,
    ))(input)?;
    Ok((input, Node::new(val, location)))
}

fn ws_value<'a, E: NomParseError<Span<'a>> + ContextError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, Node, E> {
    preceded(multispace0, json_value)(input)
}

// ============================================================================
// Strings
// ============================================================================

enum Fragment<'a> {
    Literal(&'a str),
    Escaped(char),
}

fn string_literal<'a, E: NomParseError<Span<'a>> + ContextError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, String, E> {
    delimited(
        char('"'),
        fold_many0(string_fragment, String::new, |mut acc, frag| {
            match frag {
                Fragment::Literal(s) => acc.push_str(s),
                Fragment::Escaped(c) => acc.push(c),
            }
            acc
        }),
        cut(context("closing quote", char('"'))),
    )(input)
}

fn string_fragment<'a, E: NomParseError<Span<'a>> + ContextError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, Fragment<'a>, E> {
    alt((
        map(is_not("\"\\"), |s: Span<'a>| Fragment::Literal(*s.fragment())),
        map(preceded(char('\\'), escape_char), Fragment::Escaped),
    ))(input)
}

fn escape_char<'a, E: NomParseError<Span<'a>>>(input: Span<'a>) -> IResult<Span<'a>, char, E> {
    alt((
        value('"', char('"')),
        value('\\', char('\\')),
        value('/', char('/')),
        value('\u{8}', char('b')),
        value('\u{c}', char('f')),
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        preceded(
            char('u'),
            map_opt(take(4usize), |hex: Span<'a>| {
                u32::from_str_radix(hex.fragment(), 16)
                    .ok()
                    .and_then(char::from_u32)
            }),
        ),
    ))(input)
}

// ============================================================================
// Numbers
// ============================================================================

fn number_literal<'a, E: NomParseError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, NodeValue, E> {
    let (remaining, matched) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let text: &str = matched.fragment();
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text).ok().map(NodeValue::Decimal)
    } else if text.contains('.') {
        Decimal::from_str(text).ok().map(NodeValue::Decimal)
    } else {
        match text.parse::<i64>() {
            Ok(i) => Some(NodeValue::Integer(i)),
            // Out of i64 range, keep it exact as a decimal
            Err(_) => Decimal::from_str(text).ok().map(NodeValue::Decimal),
        }
    };

    match parsed {
        Some(v) => Ok((remaining, v)),
        None => Err(nom::Err::Error(E::from_error_kind(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

// ============================================================================
// Containers
// ============================================================================

fn array_literal<'a, E: NomParseError<Span<'a>> + ContextError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, NodeValue, E> {
    map(
        delimited(
            char('['),
            separated_list0(preceded(multispace0, char(',')), ws_value),
            preceded(multispace0, cut(context("closing bracket", char(']')))),
        ),
        NodeValue::Array,
    )(input)
}

fn object_literal<'a, E: NomParseError<Span<'a>> + ContextError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, NodeValue, E> {
    map(
        delimited(
            char('{'),
            separated_list0(preceded(multispace0, char(',')), object_entry),
            preceded(multispace0, cut(context("closing brace", char('}')))),
        ),
        NodeValue::Object,
    )(input)
}

fn object_entry<'a, E: NomParseError<Span<'a>> + ContextError<Span<'a>>>(
    input: Span<'a>,
) -> IResult<Span<'a>, (String, Node), E> {
    separated_pair(
        preceded(multispace0, string_literal),
        preceded(multispace0, cut(context("colon", char(':')))),
        ws_value,
    )(input)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_node("null").unwrap(), Node::null());
        assert_eq!(parse_node("true").unwrap(), Node::boolean(true));
        assert_eq!(parse_node("false").unwrap(), Node::boolean(false));
        assert_eq!(parse_node("42").unwrap(), Node::integer(42));
        assert_eq!(parse_node("-17").unwrap(), Node::integer(-17));
        assert_eq!(parse_node("\"hi\"").unwrap(), Node::string("hi"));
    }

    #[test]
    fn test_decimal_exact() {
        let node = parse_node("3.14").unwrap();
        assert_eq!(node, Node::decimal(Decimal::from_str("3.14").unwrap()));
        // Trailing zeros survive
        assert_eq!(parse_node("1.10").unwrap().to_json_string(), "1.10");
    }

    #[test]
    fn test_integer_out_of_i64_range_stays_exact() {
        let node = parse_node("92233720368547758080").unwrap();
        assert!(matches!(node.value, NodeValue::Decimal(_)));
        assert_eq!(node.to_json_string(), "92233720368547758080");
    }

    #[test]
    fn test_scientific_notation() {
        let node = parse_node("1.5e3").unwrap();
        assert_eq!(node.as_decimal(), Some(Decimal::from_str("1500").unwrap()));
    }

    #[test]
    fn test_object_order_round_trip() {
        let text = r#"{"zebra":1,"alpha":{"nested":[1,2.5,"x"]},"mid":null}"#;
        let node = parse_node(text).unwrap();
        assert_eq!(node.to_json_string(), text);
    }

    #[test]
    fn test_round_trip_equality() {
        let text = r#"{"a": [true, false, null], "b": {"c": "d\ne"}, "n": -0.25}"#;
        let node = parse_node(text).unwrap();
        let reparsed = parse_node(&node.to_json_string()).unwrap();
        assert_eq!(node, reparsed);
    }

    #[test]
    fn test_escape_sequences() {
        let node = parse_node(r#""line1\nline2\ttab A""#).unwrap();
        assert_eq!(node.as_str(), Some("line1\nline2\ttab A"));
    }

    #[test]
    fn test_locations_recorded() {
        let node = parse_node("{\n  \"a\": 1\n}").unwrap();
        let member = node.get("a").unwrap();
        assert_eq!(member.location.line, 2);
        assert_eq!(member.location.column, 8);
    }

    #[test]
    fn test_no_coercion() {
        // A quoted number is a string, not a number
        let node = parse_node(r#""42""#).unwrap();
        assert_eq!(node.as_str(), Some("42"));
        assert_eq!(node.as_integer(), None);
    }

    #[test]
    fn test_unclosed_object_is_error() {
        let err = parse_node(r#"{"a": 1"#).unwrap_err();
        assert!(matches!(err, NodeParseError::Syntax { .. }));
    }

    #[test]
    fn test_unclosed_string_is_error() {
        assert!(parse_node(r#"{"a": "oops}"#).is_err());
    }

    #[test]
    fn test_trailing_garbage_is_error() {
        assert!(parse_node("1 2").is_err());
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(parse_node("[]").unwrap(), Node::array(vec![]));
        assert_eq!(parse_node("{}").unwrap(), Node::object(vec![]));
    }

    #[test]
    fn test_syntax_error_carries_offset() {
        let err = parse_node(r#"{"a": }"#).unwrap_err();
        match err {
            NodeParseError::Syntax { position, .. } => assert!(position > 0),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }
}
