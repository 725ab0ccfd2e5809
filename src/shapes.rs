//! Shape identifiers and shape definitions
//!
//! A [`ShapeId`] names a node in the semantic graph as
//! `namespace#Name` with an optional `$member` suffix. A [`Shape`] pairs
//! an id with a [`ShapeBody`] (the kind-specific payload) and its
//! resolved traits. Shapes are produced by [`ShapeBuilder`] and are
//! immutable once inside a [`Model`](crate::model::Model).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ShapeIdError;
use crate::traits::TraitValue;

// =============================================================================
// SHAPE ID
// =============================================================================

/// Globally unique shape identifier: `namespace#Name` or `namespace#Name$member`
///
/// Total order is lexicographic over (namespace, name, member) so that
/// iteration over id-keyed collections is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId {
    namespace: String,
    name: String,
    member: Option<String>,
}

impl ShapeId {
    /// Parse an absolute shape id
    pub fn parse(text: &str) -> Result<ShapeId, ShapeIdError> {
        let err = |reason: &str| ShapeIdError {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let (namespace, rest) = text
            .split_once('#')
            .ok_or_else(|| err("missing '#' between namespace and name"))?;

        if namespace.is_empty() || !namespace.split('.').all(is_identifier) {
            return Err(err("namespace must be dot-separated identifiers"));
        }

        let (name, member) = match rest.split_once('$') {
            Some((name, member)) => (name, Some(member)),
            None => (rest, None),
        };

        if !is_identifier(name) {
            return Err(err("shape name must be an identifier"));
        }
        if let Some(m) = member {
            if !is_identifier(m) {
                return Err(err("member name must be an identifier"));
            }
        }

        Ok(ShapeId {
            namespace: namespace.to_string(),
            name: name.to_string(),
            member: member.map(str::to_string),
        })
    }

    /// Build an id from parts known to be valid identifiers
    ///
    /// Used for compiled-in ids; invalid parts are a programming error.
    pub(crate) fn from_parts(namespace: &str, name: &str) -> ShapeId {
        debug_assert!(namespace.split('.').all(is_identifier));
        debug_assert!(is_identifier(name));
        ShapeId {
            namespace: namespace.to_string(),
            name: name.to_string(),
            member: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member_name(&self) -> Option<&str> {
        self.member.as_deref()
    }

    pub fn is_member(&self) -> bool {
        self.member.is_some()
    }

    /// Derive the id of a member of this shape
    pub fn with_member(&self, member: &str) -> ShapeId {
        ShapeId {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            member: Some(member.to_string()),
        }
    }

    /// The container id of a member id (identity for non-member ids)
    pub fn without_member(&self) -> ShapeId {
        ShapeId {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            member: None,
        }
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.namespace, self.name)?;
        if let Some(member) = &self.member {
            write!(f, "${}", member)?;
        }
        Ok(())
    }
}

impl FromStr for ShapeId {
    type Err = ShapeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeId::parse(s)
    }
}

// Serialized as the absolute string form; this is part of the stable
// machine-readable diagnostic contract.
impl Serialize for ShapeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ShapeId::parse(&text).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// SHAPE KIND
// =============================================================================

/// The closed set of shape kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    String,
    Blob,
    Timestamp,
    Enum,
    List,
    Map,
    Structure,
    Union,
    Member,
    Operation,
    Resource,
    Service,
}

impl ShapeKind {
    /// The kind's name in selector and fragment syntax
    pub fn lexical_name(&self) -> &'static str {
        match self {
            ShapeKind::Boolean => "boolean",
            ShapeKind::Byte => "byte",
            ShapeKind::Short => "short",
            ShapeKind::Integer => "integer",
            ShapeKind::Long => "long",
            ShapeKind::Float => "float",
            ShapeKind::Double => "double",
            ShapeKind::BigInteger => "bigInteger",
            ShapeKind::BigDecimal => "bigDecimal",
            ShapeKind::String => "string",
            ShapeKind::Blob => "blob",
            ShapeKind::Timestamp => "timestamp",
            ShapeKind::Enum => "enum",
            ShapeKind::List => "list",
            ShapeKind::Map => "map",
            ShapeKind::Structure => "structure",
            ShapeKind::Union => "union",
            ShapeKind::Member => "member",
            ShapeKind::Operation => "operation",
            ShapeKind::Resource => "resource",
            ShapeKind::Service => "service",
        }
    }

    /// Look up a kind by its lexical name
    pub fn from_lexical_name(name: &str) -> Option<ShapeKind> {
        ALL_KINDS.iter().copied().find(|k| k.lexical_name() == name)
    }

    /// Simple kinds hold no members and act as leaf targets
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            ShapeKind::Boolean
                | ShapeKind::Byte
                | ShapeKind::Short
                | ShapeKind::Integer
                | ShapeKind::Long
                | ShapeKind::Float
                | ShapeKind::Double
                | ShapeKind::BigInteger
                | ShapeKind::BigDecimal
                | ShapeKind::String
                | ShapeKind::Blob
                | ShapeKind::Timestamp
        )
    }
}

const ALL_KINDS: [ShapeKind; 21] = [
    ShapeKind::Boolean,
    ShapeKind::Byte,
    ShapeKind::Short,
    ShapeKind::Integer,
    ShapeKind::Long,
    ShapeKind::Float,
    ShapeKind::Double,
    ShapeKind::BigInteger,
    ShapeKind::BigDecimal,
    ShapeKind::String,
    ShapeKind::Blob,
    ShapeKind::Timestamp,
    ShapeKind::Enum,
    ShapeKind::List,
    ShapeKind::Map,
    ShapeKind::Structure,
    ShapeKind::Union,
    ShapeKind::Member,
    ShapeKind::Operation,
    ShapeKind::Resource,
    ShapeKind::Service,
];

// =============================================================================
// SHAPE BODY
// =============================================================================

/// Kind-specific payload of a shape
///
/// Aggregate bodies hold ordered member ids; pattern matching over this
/// enum is exhaustive by construction, so adding a kind is a compile
/// error everywhere it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeBody {
    /// One of the simple kinds (boolean through timestamp)
    Simple(ShapeKind),
    Enum { members: Vec<ShapeId> },
    List { member: ShapeId },
    Map { key: ShapeId, value: ShapeId },
    Structure { members: Vec<ShapeId> },
    Union { members: Vec<ShapeId> },
    Member { container: ShapeId, target: ShapeId },
    Operation {
        input: Option<ShapeId>,
        output: Option<ShapeId>,
        errors: Vec<ShapeId>,
    },
    Resource { operations: Vec<ShapeId> },
    Service {
        version: String,
        operations: Vec<ShapeId>,
        resources: Vec<ShapeId>,
    },
}

impl ShapeBody {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeBody::Simple(kind) => *kind,
            ShapeBody::Enum { .. } => ShapeKind::Enum,
            ShapeBody::List { .. } => ShapeKind::List,
            ShapeBody::Map { .. } => ShapeKind::Map,
            ShapeBody::Structure { .. } => ShapeKind::Structure,
            ShapeBody::Union { .. } => ShapeKind::Union,
            ShapeBody::Member { .. } => ShapeKind::Member,
            ShapeBody::Operation { .. } => ShapeKind::Operation,
            ShapeBody::Resource { .. } => ShapeKind::Resource,
            ShapeBody::Service { .. } => ShapeKind::Service,
        }
    }

    /// Ordered member ids for aggregate bodies, empty otherwise
    pub fn members(&self) -> Vec<&ShapeId> {
        match self {
            ShapeBody::Enum { members }
            | ShapeBody::Structure { members }
            | ShapeBody::Union { members } => members.iter().collect(),
            ShapeBody::List { member } => vec![member],
            ShapeBody::Map { key, value } => vec![key, value],
            _ => vec![],
        }
    }
}

// =============================================================================
// SHAPE
// =============================================================================

/// A node in the semantic graph
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    id: ShapeId,
    body: ShapeBody,
    traits: BTreeMap<ShapeId, TraitValue>,
    mixins: Vec<ShapeId>,
}

impl Shape {
    pub fn builder(id: ShapeId, body: ShapeBody) -> ShapeBuilder {
        ShapeBuilder {
            shape: Shape {
                id,
                body,
                traits: BTreeMap::new(),
                mixins: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &ShapeId {
        &self.id
    }

    pub fn kind(&self) -> ShapeKind {
        self.body.kind()
    }

    pub fn body(&self) -> &ShapeBody {
        &self.body
    }

    /// Mixins as declared, in declaration order
    pub fn mixins(&self) -> &[ShapeId] {
        &self.mixins
    }

    /// Ordered member ids (empty for non-aggregate shapes)
    pub fn members(&self) -> Vec<&ShapeId> {
        self.body.members()
    }

    pub fn get_trait(&self, trait_id: &ShapeId) -> Option<&TraitValue> {
        self.traits.get(trait_id)
    }

    pub fn has_trait(&self, trait_id: &ShapeId) -> bool {
        self.traits.contains_key(trait_id)
    }

    /// All resolved traits in trait-id order
    pub fn traits(&self) -> impl Iterator<Item = (&ShapeId, &TraitValue)> {
        self.traits.iter()
    }

    /// Member target, for member shapes
    pub fn target(&self) -> Option<&ShapeId> {
        match &self.body {
            ShapeBody::Member { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Builder for a [`Shape`] prior to graph insertion
#[derive(Debug, Clone)]
pub struct ShapeBuilder {
    shape: Shape,
}

impl ShapeBuilder {
    pub fn with_trait(mut self, trait_id: ShapeId, value: TraitValue) -> Self {
        self.shape.traits.insert(trait_id, value);
        self
    }

    pub fn with_mixin(mut self, mixin: ShapeId) -> Self {
        self.shape.mixins.push(mixin);
        self
    }

    pub fn build(self) -> Shape {
        self.shape
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_id() {
        let id = ShapeId::parse("example.weather#GetForecast").unwrap();
        assert_eq!(id.namespace(), "example.weather");
        assert_eq!(id.name(), "GetForecast");
        assert_eq!(id.member_name(), None);
        assert_eq!(id.to_string(), "example.weather#GetForecast");
    }

    #[test]
    fn test_parse_member_id() {
        let id = ShapeId::parse("ns#Foo$bar").unwrap();
        assert!(id.is_member());
        assert_eq!(id.member_name(), Some("bar"));
        assert_eq!(id.without_member(), ShapeId::parse("ns#Foo").unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ShapeId::parse("NoNamespace").is_err());
        assert!(ShapeId::parse("#Name").is_err());
        assert!(ShapeId::parse("ns#").is_err());
        assert!(ShapeId::parse("ns#Name$").is_err());
        assert!(ShapeId::parse("bad ns#Name").is_err());
        assert!(ShapeId::parse("ns#Na me").is_err());
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let mut ids = vec![
            ShapeId::parse("b#X").unwrap(),
            ShapeId::parse("a#Z$m").unwrap(),
            ShapeId::parse("a#Z").unwrap(),
            ShapeId::parse("a#A").unwrap(),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, vec!["a#A", "a#Z", "a#Z$m", "b#X"]);
    }

    #[test]
    fn test_with_member() {
        let id = ShapeId::parse("ns#Foo").unwrap();
        assert_eq!(id.with_member("bar").to_string(), "ns#Foo$bar");
    }

    #[test]
    fn test_kind_lexical_round_trip() {
        for kind in ALL_KINDS {
            assert_eq!(ShapeKind::from_lexical_name(kind.lexical_name()), Some(kind));
        }
        assert_eq!(ShapeKind::from_lexical_name("structur"), None);
    }

    #[test]
    fn test_body_members() {
        let container = ShapeId::parse("ns#S").unwrap();
        let body = ShapeBody::Structure {
            members: vec![container.with_member("a"), container.with_member("b")],
        };
        assert_eq!(body.kind(), ShapeKind::Structure);
        assert_eq!(body.members().len(), 2);
        assert!(ShapeBody::Simple(ShapeKind::String).members().is_empty());
    }

    #[test]
    fn test_builder() {
        let id = ShapeId::parse("ns#S").unwrap();
        let shape = Shape::builder(
            id.clone(),
            ShapeBody::Structure { members: vec![] },
        )
        .with_mixin(ShapeId::parse("ns#M").unwrap())
        .build();
        assert_eq!(shape.id(), &id);
        assert_eq!(shape.kind(), ShapeKind::Structure);
        assert_eq!(shape.mixins().len(), 1);
        assert!(!shape.has_trait(&ShapeId::parse("ns#t").unwrap()));
    }

    #[test]
    fn test_id_serde_string_form() {
        let id = ShapeId::parse("ns#Foo$bar").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ns#Foo$bar\"");
        let back: ShapeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
