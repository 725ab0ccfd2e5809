//! Trait system
//!
//! Traits are typed metadata attached to shapes, identified by their own
//! namespaced [`ShapeId`]. A [`TraitRegistry`] maps trait ids to decode
//! functions that turn a raw [`Node`] payload into a [`TraitValue`], plus
//! a merge policy used when the same trait reaches a shape through more
//! than one mixin. Unregistered trait ids decode as free-form documents.
//!
//! Every factory satisfies the round-trip law
//! `decode(value.to_node()) == value` for any value it produces.

use std::collections::HashMap;

use crate::error::TraitDecodeError;
use crate::node::{Node, NodeValue};
use crate::shapes::ShapeId;

/// Ids of the built-in trait catalog
pub mod known {
    use crate::shapes::ShapeId;
    use once_cell::sync::Lazy;

    /// `idl.api#suppress` — event ids (or `"*"`) exempted on a shape
    pub static SUPPRESS: Lazy<ShapeId> = Lazy::new(|| ShapeId::from_parts("idl.api", "suppress"));

    /// `idl.api#required` — marks a member that must be present
    pub static REQUIRED: Lazy<ShapeId> = Lazy::new(|| ShapeId::from_parts("idl.api", "required"));

    /// `idl.api#error` — marks a structure as an operation error
    pub static ERROR: Lazy<ShapeId> = Lazy::new(|| ShapeId::from_parts("idl.api", "error"));

    /// `idl.api#documentation` — free-text documentation
    pub static DOCUMENTATION: Lazy<ShapeId> =
        Lazy::new(|| ShapeId::from_parts("idl.api", "documentation"));

    /// `idl.api#tags` — arbitrary labels; concatenates across mixins
    pub static TAGS: Lazy<ShapeId> = Lazy::new(|| ShapeId::from_parts("idl.api", "tags"));

    /// `idl.api#enumValue` — wire value of an enum member
    pub static ENUM_VALUE: Lazy<ShapeId> =
        Lazy::new(|| ShapeId::from_parts("idl.api", "enumValue"));

    /// `idl.test#cases` — example request parameter bags for an operation
    pub static TEST_CASES: Lazy<ShapeId> = Lazy::new(|| ShapeId::from_parts("idl.test", "cases"));
}

// =============================================================================
// TRAIT VALUES
// =============================================================================

/// A decoded trait payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitValue {
    /// Marker trait with no payload (encodes as an empty object)
    Annotation,
    String(String),
    StringList(Vec<String>),
    /// Decoded `idl.test#cases` payload
    TestCases(Vec<TestCase>),
    /// Free-form document, used for unregistered trait ids
    Node(Node),
}

impl TraitValue {
    /// Encode back to the wire representation
    pub fn to_node(&self) -> Node {
        match self {
            TraitValue::Annotation => Node::object(vec![]),
            TraitValue::String(s) => Node::string(s.clone()),
            TraitValue::StringList(items) => {
                Node::array(items.iter().map(|s| Node::string(s.clone())).collect())
            }
            TraitValue::TestCases(cases) => {
                Node::array(cases.iter().map(TestCase::to_node).collect())
            }
            TraitValue::Node(node) => node.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TraitValue::String(s) => Some(s),
            TraitValue::Node(n) => n.as_str(),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            TraitValue::StringList(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_test_cases(&self) -> Option<&[TestCase]> {
        match self {
            TraitValue::TestCases(cases) => Some(cases),
            _ => None,
        }
    }
}

/// One example case from an `idl.test#cases` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: String,
    pub documentation: Option<String>,
    /// Parameter bag validated against the operation's input structure
    pub params: Node,
}

impl TestCase {
    fn to_node(&self) -> Node {
        let mut entries = vec![("id".to_string(), Node::string(self.id.clone()))];
        if let Some(docs) = &self.documentation {
            entries.push(("documentation".to_string(), Node::string(docs.clone())));
        }
        entries.push(("params".to_string(), self.params.clone()));
        Node::object(entries)
    }
}

// =============================================================================
// FACTORIES
// =============================================================================

/// How multiple mixin-inherited attachments of one trait combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Inherited values must be structurally identical
    RejectConflicts,
    /// List values concatenate, deduplicated and sorted (order-independent)
    ConcatLists,
}

type DecodeFn = Box<dyn Fn(&Node) -> Result<TraitValue, TraitDecodeError> + Send + Sync>;

/// Decoder + merge policy for one trait id
pub struct TraitFactory {
    id: ShapeId,
    decode: DecodeFn,
    merge: MergePolicy,
}

impl TraitFactory {
    pub fn new(
        id: ShapeId,
        decode: impl Fn(&Node) -> Result<TraitValue, TraitDecodeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            decode: Box::new(decode),
            merge: MergePolicy::RejectConflicts,
        }
    }

    pub fn with_merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }

    pub fn id(&self) -> &ShapeId {
        &self.id
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge
    }

    pub fn decode(&self, node: &Node) -> Result<TraitValue, TraitDecodeError> {
        (self.decode)(node)
    }

    /// Marker trait: payload must be an empty object (or `true`/null)
    pub fn annotation(id: ShapeId) -> Self {
        let trait_id = id.clone();
        Self::new(id, move |node| match &node.value {
            NodeValue::Null | NodeValue::Boolean(true) => Ok(TraitValue::Annotation),
            NodeValue::Object(entries) if entries.is_empty() => Ok(TraitValue::Annotation),
            _ => Err(TraitDecodeError::WrongShape {
                trait_id: trait_id.clone(),
                expected: "an empty object",
                found: node.kind_name(),
            }),
        })
    }

    /// String-valued trait
    pub fn string(id: ShapeId) -> Self {
        let trait_id = id.clone();
        Self::new(id, move |node| match &node.value {
            NodeValue::String(s) => Ok(TraitValue::String(s.clone())),
            _ => Err(TraitDecodeError::WrongShape {
                trait_id: trait_id.clone(),
                expected: "a string",
                found: node.kind_name(),
            }),
        })
    }

    /// List-of-strings trait
    pub fn string_list(id: ShapeId) -> Self {
        let trait_id = id.clone();
        Self::new(id, move |node| {
            let items = node.as_array().ok_or_else(|| TraitDecodeError::WrongShape {
                trait_id: trait_id.clone(),
                expected: "an array of strings",
                found: node.kind_name(),
            })?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => out.push(s.to_string()),
                    None => {
                        return Err(TraitDecodeError::WrongShape {
                            trait_id: trait_id.clone(),
                            expected: "an array of strings",
                            found: item.kind_name(),
                        })
                    }
                }
            }
            Ok(TraitValue::StringList(out))
        })
    }

    /// `idl.test#cases`-style trait: array of example case objects
    pub fn test_cases(id: ShapeId) -> Self {
        let trait_id = id.clone();
        Self::new(id, move |node| {
            let items = node.as_array().ok_or_else(|| TraitDecodeError::WrongShape {
                trait_id: trait_id.clone(),
                expected: "an array of test case objects",
                found: node.kind_name(),
            })?;
            let mut cases = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                cases.push(decode_test_case(&trait_id, index, item)?);
            }
            Ok(TraitValue::TestCases(cases))
        })
    }
}

fn decode_test_case(
    trait_id: &ShapeId,
    index: usize,
    node: &Node,
) -> Result<TestCase, TraitDecodeError> {
    if node.as_object().is_none() {
        return Err(TraitDecodeError::WrongShape {
            trait_id: trait_id.clone(),
            expected: "a test case object",
            found: node.kind_name(),
        });
    }

    let id = node
        .get("id")
        .and_then(|n| n.as_str())
        .ok_or_else(|| TraitDecodeError::Invalid {
            trait_id: trait_id.clone(),
            message: format!("test case {index} is missing a string `id`"),
        })?
        .to_string();

    let documentation = match node.get("documentation") {
        None => None,
        Some(n) => Some(
            n.as_str()
                .ok_or_else(|| TraitDecodeError::Invalid {
                    trait_id: trait_id.clone(),
                    message: format!("test case `{id}`: `documentation` must be a string"),
                })?
                .to_string(),
        ),
    };

    let params = match node.get("params") {
        None => Node::object(vec![]),
        Some(n) if n.as_object().is_some() => n.clone(),
        Some(n) => {
            return Err(TraitDecodeError::Invalid {
                trait_id: trait_id.clone(),
                message: format!(
                    "test case `{id}`: `params` must be an object, found {}",
                    n.kind_name()
                ),
            })
        }
    };

    Ok(TestCase {
        id,
        documentation,
        params,
    })
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Maps trait ids to their factories
///
/// Constructed by the host and handed to the
/// [`Assembler`](crate::assembler::Assembler); there is no process-global
/// registry. New traits register without touching core graph code.
pub struct TraitRegistry {
    factories: HashMap<ShapeId, TraitFactory>,
}

impl TraitRegistry {
    /// Empty registry (unregistered traits still decode as documents)
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in catalog
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TraitFactory::string_list(known::SUPPRESS.clone()));
        registry.register(TraitFactory::annotation(known::REQUIRED.clone()));
        registry.register(TraitFactory::string(known::ERROR.clone()));
        registry.register(TraitFactory::string(known::DOCUMENTATION.clone()));
        registry.register(
            TraitFactory::string_list(known::TAGS.clone()).with_merge(MergePolicy::ConcatLists),
        );
        registry.register(TraitFactory::string(known::ENUM_VALUE.clone()));
        registry.register(TraitFactory::test_cases(known::TEST_CASES.clone()));
        registry
    }

    pub fn register(&mut self, factory: TraitFactory) {
        self.factories.insert(factory.id().clone(), factory);
    }

    pub fn contains(&self, trait_id: &ShapeId) -> bool {
        self.factories.contains_key(trait_id)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Decode a raw payload for the given trait id
    ///
    /// Unregistered ids decode as [`TraitValue::Node`] documents.
    pub fn decode(&self, trait_id: &ShapeId, node: &Node) -> Result<TraitValue, TraitDecodeError> {
        match self.factories.get(trait_id) {
            Some(factory) => factory.decode(node),
            None => Ok(TraitValue::Node(node.clone())),
        }
    }

    pub fn merge_policy(&self, trait_id: &ShapeId) -> MergePolicy {
        self.factories
            .get(trait_id)
            .map(|f| f.merge_policy())
            .unwrap_or(MergePolicy::RejectConflicts)
    }

    /// Combine mixin-inherited values of one trait into one value
    ///
    /// Identical values always merge. Non-identical values merge only
    /// under [`MergePolicy::ConcatLists`], producing a deduplicated,
    /// sorted list so the result is independent of mixin order. Returns
    /// `None` on an unresolvable conflict.
    pub fn merge_inherited(
        &self,
        trait_id: &ShapeId,
        values: Vec<TraitValue>,
    ) -> Option<TraitValue> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let rest: Vec<TraitValue> = iter.collect();

        if rest.iter().all(|v| *v == first) {
            return Some(first);
        }

        if self.merge_policy(trait_id) == MergePolicy::ConcatLists {
            let mut combined: Vec<String> = Vec::new();
            for value in std::iter::once(&first).chain(rest.iter()) {
                combined.extend(value.as_string_list()?.iter().cloned());
            }
            combined.sort();
            combined.dedup();
            return Some(TraitValue::StringList(combined));
        }

        None
    }
}

impl Default for TraitRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_parser::parse_node;

    fn registry() -> TraitRegistry {
        TraitRegistry::builtin()
    }

    #[test]
    fn test_builtin_catalog_registered() {
        let reg = registry();
        assert!(reg.contains(&known::SUPPRESS));
        assert!(reg.contains(&known::REQUIRED));
        assert!(reg.contains(&known::TAGS));
        assert!(reg.contains(&known::TEST_CASES));
        assert!(!reg.is_empty());
    }

    #[test]
    fn test_annotation_decode() {
        let reg = registry();
        let value = reg.decode(&known::REQUIRED, &Node::object(vec![])).unwrap();
        assert_eq!(value, TraitValue::Annotation);
        let err = reg.decode(&known::REQUIRED, &Node::string("x")).unwrap_err();
        assert!(matches!(err, TraitDecodeError::WrongShape { .. }));
    }

    #[test]
    fn test_string_decode_rejects_object() {
        let reg = registry();
        let err = reg
            .decode(&known::DOCUMENTATION, &Node::object(vec![]))
            .unwrap_err();
        assert!(err.to_string().contains("expects a string"));
    }

    #[test]
    fn test_unregistered_decodes_as_document() {
        let reg = registry();
        let custom = ShapeId::parse("example#custom").unwrap();
        let payload = parse_node(r#"{"anything": [1, 2]}"#).unwrap();
        let value = reg.decode(&custom, &payload).unwrap();
        assert_eq!(value, TraitValue::Node(payload));
    }

    #[test]
    fn test_round_trip_law() {
        let reg = registry();
        let values = vec![
            (known::REQUIRED.clone(), TraitValue::Annotation),
            (
                known::DOCUMENTATION.clone(),
                TraitValue::String("Gets the forecast".to_string()),
            ),
            (
                known::TAGS.clone(),
                TraitValue::StringList(vec!["internal".to_string(), "beta".to_string()]),
            ),
            (
                known::TEST_CASES.clone(),
                TraitValue::TestCases(vec![TestCase {
                    id: "basic".to_string(),
                    documentation: Some("happy path".to_string()),
                    params: parse_node(r#"{"city": "Lisbon"}"#).unwrap(),
                }]),
            ),
        ];
        for (trait_id, value) in values {
            let decoded = reg.decode(&trait_id, &value.to_node()).unwrap();
            assert_eq!(decoded, value, "round trip failed for {trait_id}");
        }
    }

    #[test]
    fn test_test_cases_decode() {
        let reg = registry();
        let payload = parse_node(
            r#"[{"id": "t1", "params": {"a": 1}}, {"id": "t2"}]"#,
        )
        .unwrap();
        let value = reg.decode(&known::TEST_CASES, &payload).unwrap();
        let cases = value.as_test_cases().unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "t1");
        assert_eq!(cases[1].params, Node::object(vec![]));
    }

    #[test]
    fn test_test_cases_missing_id_is_error() {
        let reg = registry();
        let payload = parse_node(r#"[{"params": {}}]"#).unwrap();
        let err = reg.decode(&known::TEST_CASES, &payload).unwrap_err();
        assert!(err.to_string().contains("missing a string `id`"));
    }

    #[test]
    fn test_merge_identical_values() {
        let reg = registry();
        let v = TraitValue::String("same".to_string());
        let merged = reg.merge_inherited(&known::DOCUMENTATION, vec![v.clone(), v.clone()]);
        assert_eq!(merged, Some(v));
    }

    #[test]
    fn test_merge_conflicting_values_rejected() {
        let reg = registry();
        let merged = reg.merge_inherited(
            &known::DOCUMENTATION,
            vec![
                TraitValue::String("one".to_string()),
                TraitValue::String("two".to_string()),
            ],
        );
        assert_eq!(merged, None);
    }

    #[test]
    fn test_tags_concatenate_order_independent() {
        let reg = registry();
        let a = TraitValue::StringList(vec!["x".to_string(), "y".to_string()]);
        let b = TraitValue::StringList(vec!["y".to_string(), "z".to_string()]);
        let ab = reg.merge_inherited(&known::TAGS, vec![a.clone(), b.clone()]);
        let ba = reg.merge_inherited(&known::TAGS, vec![b, a]);
        assert_eq!(ab, ba);
        assert_eq!(
            ab,
            Some(TraitValue::StringList(vec![
                "x".to_string(),
                "y".to_string(),
                "z".to_string()
            ]))
        );
    }
}
