//! The frozen shape graph
//!
//! A [`Model`] is an immutable mapping from [`ShapeId`] to [`Shape`],
//! produced in one atomic step by the
//! [`Assembler`](crate::assembler::Assembler). Once frozen it is a
//! read-only structure safe to share across threads; validators and
//! selector evaluations never observe a partially built graph.
//!
//! Iteration surfaces are keyed by `ShapeId`'s total order so results
//! are deterministic regardless of construction order.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use once_cell::sync::Lazy;

use crate::shapes::{Shape, ShapeBody, ShapeId, ShapeKind};

/// Named relationship kinds between shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    /// Aggregate shape to its member shapes
    Member,
    /// Member shape to its target
    Target,
    /// Shape to a mixin it declares
    Mixin,
    /// Operation to its input structure
    Input,
    /// Operation to its output structure
    Output,
    /// Operation to an error structure
    Error,
    /// Service or resource to an operation it binds
    Operation,
    /// Service to a resource it binds
    Resource,
    /// Operation or resource to the service/resource that binds it
    Bound,
}

impl Relationship {
    pub fn lexical_name(&self) -> &'static str {
        match self {
            Relationship::Member => "member",
            Relationship::Target => "target",
            Relationship::Mixin => "mixin",
            Relationship::Input => "input",
            Relationship::Output => "output",
            Relationship::Error => "error",
            Relationship::Operation => "operation",
            Relationship::Resource => "resource",
            Relationship::Bound => "bound",
        }
    }

    pub fn from_lexical_name(name: &str) -> Option<Relationship> {
        const ALL: [Relationship; 9] = [
            Relationship::Member,
            Relationship::Target,
            Relationship::Mixin,
            Relationship::Input,
            Relationship::Output,
            Relationship::Error,
            Relationship::Operation,
            Relationship::Resource,
            Relationship::Bound,
        ];
        ALL.iter().copied().find(|r| r.lexical_name() == name)
    }
}

// =============================================================================
// MODEL
// =============================================================================

/// The shape graph
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    shapes: BTreeMap<ShapeId, Shape>,
}

impl Model {
    pub(crate) fn from_shapes(shapes: BTreeMap<ShapeId, Shape>) -> Model {
        Model { shapes }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    pub fn get_shape(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    /// Fetch a shape that the caller knows must exist
    ///
    /// Panics if the shape is absent. Use only where absence is a
    /// programming error, never for data-quality checks.
    pub fn expect_shape(&self, id: &ShapeId) -> &Shape {
        match self.shapes.get(id) {
            Some(shape) => shape,
            None => panic!("expected shape `{id}` to be present in the model"),
        }
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.shapes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// All shapes in id order
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    /// All shape ids in id order
    pub fn shape_ids(&self) -> impl Iterator<Item = &ShapeId> {
        self.shapes.keys()
    }

    /// Shapes of one kind, in id order
    pub fn shapes_of_kind(&self, kind: ShapeKind) -> impl Iterator<Item = &Shape> {
        self.shapes.values().filter(move |s| s.kind() == kind)
    }

    /// Ids of shapes of one kind
    pub fn shape_ids_of_kind(&self, kind: ShapeKind) -> BTreeSet<ShapeId> {
        self.shapes_of_kind(kind).map(|s| s.id().clone()).collect()
    }

    // =========================================================================
    // RELATIONSHIP QUERIES
    // =========================================================================

    /// Member shapes of an aggregate shape, in declaration order
    pub fn members_of(&self, id: &ShapeId) -> Vec<&Shape> {
        match self.shapes.get(id) {
            Some(shape) => shape
                .members()
                .into_iter()
                .filter_map(|m| self.shapes.get(m))
                .collect(),
            None => vec![],
        }
    }

    /// Target shape of a member
    pub fn member_target(&self, member_id: &ShapeId) -> Option<&Shape> {
        let member = self.shapes.get(member_id)?;
        self.shapes.get(member.target()?)
    }

    /// Operations bound to a service or resource, in declaration order
    pub fn operations_bound_to(&self, id: &ShapeId) -> Vec<&Shape> {
        let ids = match self.shapes.get(id).map(Shape::body) {
            Some(ShapeBody::Service { operations, .. }) => operations.clone(),
            Some(ShapeBody::Resource { operations }) => operations.clone(),
            _ => vec![],
        };
        ids.iter().filter_map(|o| self.shapes.get(o)).collect()
    }

    /// Input structure of an operation, if it declares one
    pub fn operation_input(&self, op_id: &ShapeId) -> Option<&Shape> {
        match self.shapes.get(op_id).map(Shape::body) {
            Some(ShapeBody::Operation {
                input: Some(input), ..
            }) => self.shapes.get(input),
            _ => None,
        }
    }

    /// Shapes reached from `id` along one relationship kind
    pub fn related(&self, id: &ShapeId, rel: Relationship) -> BTreeSet<ShapeId> {
        // `bound` is the reverse binding edge and needs a scan.
        if rel == Relationship::Bound {
            return self
                .shapes
                .keys()
                .filter(|binder| {
                    self.forward_edges(binder).iter().any(|(r, t)| {
                        matches!(r, Relationship::Operation | Relationship::Resource) && t == id
                    })
                })
                .cloned()
                .collect();
        }

        self.forward_edges(id)
            .into_iter()
            .filter(|(r, _)| *r == rel)
            .map(|(_, t)| t)
            .filter(|t| self.shapes.contains_key(t))
            .collect()
    }

    /// Shapes from which `id` is reached along one relationship kind
    pub fn related_reverse(&self, id: &ShapeId, rel: Relationship) -> BTreeSet<ShapeId> {
        self.shapes
            .keys()
            .filter(|source| self.related(source, rel).contains(id))
            .cloned()
            .collect()
    }

    /// Direct forward neighbors across every relationship kind
    pub fn neighbors(&self, id: &ShapeId) -> BTreeSet<ShapeId> {
        self.forward_edges(id)
            .into_iter()
            .map(|(_, t)| t)
            .filter(|t| self.shapes.contains_key(t))
            .collect()
    }

    /// Transitive forward closure of `id`, including `id` itself
    pub fn reachable_from(&self, id: &ShapeId) -> BTreeSet<ShapeId> {
        let mut seen: BTreeSet<ShapeId> = BTreeSet::new();
        if !self.shapes.contains_key(id) {
            return seen;
        }
        let mut queue: VecDeque<ShapeId> = VecDeque::new();
        seen.insert(id.clone());
        queue.push_back(id.clone());
        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(&current) {
                if seen.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Whether `id` can reach itself through at least one forward edge
    pub fn is_recursive(&self, id: &ShapeId) -> bool {
        let mut seen: HashSet<ShapeId> = HashSet::new();
        let mut queue: VecDeque<ShapeId> = self.neighbors(id).into_iter().collect();
        while let Some(current) = queue.pop_front() {
            if &current == id {
                return true;
            }
            if seen.insert(current.clone()) {
                queue.extend(self.neighbors(&current));
            }
        }
        false
    }

    fn forward_edges(&self, id: &ShapeId) -> Vec<(Relationship, ShapeId)> {
        let shape = match self.shapes.get(id) {
            Some(shape) => shape,
            None => return vec![],
        };

        let mut edges: Vec<(Relationship, ShapeId)> = Vec::new();
        for member in shape.members() {
            edges.push((Relationship::Member, member.clone()));
        }
        for mixin in shape.mixins() {
            edges.push((Relationship::Mixin, mixin.clone()));
        }
        match shape.body() {
            ShapeBody::Member { target, .. } => {
                edges.push((Relationship::Target, target.clone()));
            }
            ShapeBody::Operation {
                input,
                output,
                errors,
            } => {
                if let Some(input) = input {
                    edges.push((Relationship::Input, input.clone()));
                }
                if let Some(output) = output {
                    edges.push((Relationship::Output, output.clone()));
                }
                for error in errors {
                    edges.push((Relationship::Error, error.clone()));
                }
            }
            ShapeBody::Service {
                operations,
                resources,
                ..
            } => {
                for op in operations {
                    edges.push((Relationship::Operation, op.clone()));
                }
                for res in resources {
                    edges.push((Relationship::Resource, res.clone()));
                }
            }
            ShapeBody::Resource { operations } => {
                for op in operations {
                    edges.push((Relationship::Operation, op.clone()));
                }
            }
            _ => {}
        }
        edges
    }
}

// =============================================================================
// PRELUDE
// =============================================================================

/// Built-in simple shapes installed into every assembled model
static PRELUDE: Lazy<Vec<Shape>> = Lazy::new(|| {
    let simple = [
        ("Boolean", ShapeKind::Boolean),
        ("Byte", ShapeKind::Byte),
        ("Short", ShapeKind::Short),
        ("Integer", ShapeKind::Integer),
        ("Long", ShapeKind::Long),
        ("Float", ShapeKind::Float),
        ("Double", ShapeKind::Double),
        ("BigInteger", ShapeKind::BigInteger),
        ("BigDecimal", ShapeKind::BigDecimal),
        ("String", ShapeKind::String),
        ("Blob", ShapeKind::Blob),
        ("Timestamp", ShapeKind::Timestamp),
    ];
    let mut shapes: Vec<Shape> = simple
        .iter()
        .map(|(name, kind)| {
            Shape::builder(ShapeId::from_parts("idl.api", name), ShapeBody::Simple(*kind)).build()
        })
        .collect();
    // Unit is the default enum member target
    shapes.push(
        Shape::builder(
            ShapeId::from_parts("idl.api", "Unit"),
            ShapeBody::Structure { members: vec![] },
        )
        .build(),
    );
    shapes
});

/// The prelude shapes (`idl.api#String` and friends)
pub fn prelude() -> &'static [Shape] {
    &PRELUDE
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(text: &str) -> ShapeId {
        ShapeId::parse(text).unwrap()
    }

    /// Structure S { name: String }, operation Op(input: S), service Svc
    fn sample_model() -> Model {
        let string_id = id("idl.api#String");
        let s_id = id("ns#S");
        let member_id = s_id.with_member("name");
        let op_id = id("ns#Op");
        let svc_id = id("ns#Svc");

        let mut shapes = BTreeMap::new();
        for shape in prelude() {
            shapes.insert(shape.id().clone(), shape.clone());
        }
        shapes.insert(
            s_id.clone(),
            Shape::builder(
                s_id.clone(),
                ShapeBody::Structure {
                    members: vec![member_id.clone()],
                },
            )
            .build(),
        );
        shapes.insert(
            member_id.clone(),
            Shape::builder(
                member_id.clone(),
                ShapeBody::Member {
                    container: s_id.clone(),
                    target: string_id,
                },
            )
            .build(),
        );
        shapes.insert(
            op_id.clone(),
            Shape::builder(
                op_id.clone(),
                ShapeBody::Operation {
                    input: Some(s_id.clone()),
                    output: None,
                    errors: vec![],
                },
            )
            .build(),
        );
        shapes.insert(
            svc_id.clone(),
            Shape::builder(
                svc_id.clone(),
                ShapeBody::Service {
                    version: "2026-08-01".to_string(),
                    operations: vec![op_id.clone()],
                    resources: vec![],
                },
            )
            .build(),
        );
        Model::from_shapes(shapes)
    }

    #[test]
    fn test_lookup() {
        let model = sample_model();
        assert!(model.get_shape(&id("ns#S")).is_some());
        assert!(model.get_shape(&id("ns#Missing")).is_none());
        assert!(model.contains(&id("idl.api#String")));
    }

    #[test]
    #[should_panic(expected = "expected shape")]
    fn test_expect_shape_panics_on_absence() {
        sample_model().expect_shape(&id("ns#Missing"));
    }

    #[test]
    fn test_members_and_target() {
        let model = sample_model();
        let members = model.members_of(&id("ns#S"));
        assert_eq!(members.len(), 1);
        let target = model.member_target(&id("ns#S$name")).unwrap();
        assert_eq!(target.id(), &id("idl.api#String"));
    }

    #[test]
    fn test_operations_bound_to_service() {
        let model = sample_model();
        let ops = model.operations_bound_to(&id("ns#Svc"));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id(), &id("ns#Op"));
    }

    #[test]
    fn test_related_edges() {
        let model = sample_model();
        assert!(model
            .related(&id("ns#Op"), Relationship::Input)
            .contains(&id("ns#S")));
        assert!(model
            .related(&id("ns#S$name"), Relationship::Target)
            .contains(&id("idl.api#String")));
        // bound is the reverse binding edge
        assert!(model
            .related(&id("ns#Op"), Relationship::Bound)
            .contains(&id("ns#Svc")));
    }

    #[test]
    fn test_related_reverse() {
        let model = sample_model();
        let sources = model.related_reverse(&id("ns#S"), Relationship::Input);
        assert!(sources.contains(&id("ns#Op")));
    }

    #[test]
    fn test_reachable_includes_self_and_descendants() {
        let model = sample_model();
        let reachable = model.reachable_from(&id("ns#Svc"));
        for expected in ["ns#Svc", "ns#Op", "ns#S", "ns#S$name", "idl.api#String"] {
            assert!(reachable.contains(&id(expected)), "missing {expected}");
        }
    }

    #[test]
    fn test_not_recursive() {
        let model = sample_model();
        assert!(!model.is_recursive(&id("ns#S")));
    }

    #[test]
    fn test_kind_filter() {
        let model = sample_model();
        let structures = model.shape_ids_of_kind(ShapeKind::Structure);
        assert!(structures.contains(&id("ns#S")));
        assert!(!structures.contains(&id("ns#Op")));
    }

    #[test]
    fn test_prelude_contents() {
        let model = Model::from_shapes(
            prelude()
                .iter()
                .map(|s| (s.id().clone(), s.clone()))
                .collect(),
        );
        assert!(model.contains(&id("idl.api#String")));
        assert!(model.contains(&id("idl.api#Timestamp")));
        assert_eq!(
            model.expect_shape(&id("idl.api#Unit")).kind(),
            ShapeKind::Structure
        );
    }
}
