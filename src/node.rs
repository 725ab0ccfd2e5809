//! Untyped node value layer
//!
//! The wire representation for trait payloads and for raw model fragments
//! before semantic resolution. A [`Node`] is a literal value tree tagged
//! with provenance; the tag is carried for diagnostics but excluded from
//! equality, so two trees parsed from different positions in a file still
//! compare equal when their values do.
//!
//! Numbers are kept exact: integers as `i64`, decimals as
//! [`rust_decimal::Decimal`]. Object members preserve insertion order so
//! a tree survives a serialize/parse round trip byte-for-byte in meaning.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Line/column provenance for a parsed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Sentinel for programmatically built nodes
    pub fn none() -> Self {
        Self { line: 0, column: 0 }
    }

    pub fn is_none(&self) -> bool {
        self.line == 0 && self.column == 0
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A literal value with provenance
#[derive(Debug, Clone)]
pub struct Node {
    pub value: NodeValue,
    pub location: SourceLocation,
}

/// The value part of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Array(Vec<Node>),
    /// Key/value entries in insertion order
    Object(Vec<(String, Node)>),
}

// Location is provenance, not identity.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Node {}

impl Node {
    pub fn new(value: NodeValue, location: SourceLocation) -> Self {
        Self { value, location }
    }

    pub fn null() -> Self {
        Self::new(NodeValue::Null, SourceLocation::none())
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(NodeValue::Boolean(value), SourceLocation::none())
    }

    pub fn integer(value: i64) -> Self {
        Self::new(NodeValue::Integer(value), SourceLocation::none())
    }

    pub fn decimal(value: Decimal) -> Self {
        Self::new(NodeValue::Decimal(value), SourceLocation::none())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(NodeValue::String(value.into()), SourceLocation::none())
    }

    pub fn array(items: Vec<Node>) -> Self {
        Self::new(NodeValue::Array(items), SourceLocation::none())
    }

    pub fn object(entries: Vec<(String, Node)>) -> Self {
        Self::new(NodeValue::Object(entries), SourceLocation::none())
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_null(&self) -> bool {
        matches!(self.value, NodeValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            NodeValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            NodeValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self.value {
            NodeValue::Decimal(d) => Some(d),
            NodeValue::Integer(i) => Some(Decimal::from(i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            NodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match &self.value {
            NodeValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Node)]> {
        match &self.value {
            NodeValue::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up an object member by key (first match)
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_object()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Human-readable name of the value kind, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match &self.value {
            NodeValue::Null => "null",
            NodeValue::Boolean(_) => "boolean",
            NodeValue::Integer(_) => "integer",
            NodeValue::Decimal(_) => "decimal",
            NodeValue::String(_) => "string",
            NodeValue::Array(_) => "array",
            NodeValue::Object(_) => "object",
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Render the tree as JSON text
    ///
    /// Member order and number representation are preserved exactly, so
    /// `parse_node(n.to_json_string()) == n` for any node.
    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        self.write_json(&mut out);
        out
    }

    fn write_json(&self, out: &mut String) {
        match &self.value {
            NodeValue::Null => out.push_str("null"),
            NodeValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            NodeValue::Integer(i) => out.push_str(&i.to_string()),
            NodeValue::Decimal(d) => out.push_str(&d.to_string()),
            NodeValue::String(s) => write_json_string(s, out),
            NodeValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_json(out);
                }
                out.push(']');
            }
            NodeValue::Object(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_json_string(key, out);
                    out.push(':');
                    value.write_json(out);
                }
                out.push('}');
            }
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_equality_ignores_location() {
        let a = Node::string("hello");
        let b = Node::string("hello").with_location(SourceLocation::new(3, 14));
        assert_eq!(a, b);
    }

    #[test]
    fn test_object_order_preserved() {
        let node = Node::object(vec![
            ("z".to_string(), Node::integer(1)),
            ("a".to_string(), Node::integer(2)),
        ]);
        assert_eq!(node.to_json_string(), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn test_get_member() {
        let node = Node::object(vec![
            ("name".to_string(), Node::string("Test")),
            ("count".to_string(), Node::integer(3)),
        ]);
        assert_eq!(node.get("name").and_then(|n| n.as_str()), Some("Test"));
        assert_eq!(node.get("count").and_then(|n| n.as_integer()), Some(3));
        assert!(node.get("missing").is_none());
    }

    #[test]
    fn test_decimal_preserves_scale() {
        let d = Decimal::from_str("1.10").unwrap();
        assert_eq!(Node::decimal(d).to_json_string(), "1.10");
    }

    #[test]
    fn test_string_escaping() {
        let node = Node::string("line1\nline2\t\"quoted\"");
        assert_eq!(node.to_json_string(), r#""line1\nline2\t\"quoted\"""#);
    }

    #[test]
    fn test_integer_and_decimal_are_distinct() {
        assert_ne!(Node::integer(1), Node::decimal(Decimal::from(1)));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Node::null().kind_name(), "null");
        assert_eq!(Node::array(vec![]).kind_name(), "array");
        assert_eq!(Node::object(vec![]).kind_name(), "object");
    }
}
