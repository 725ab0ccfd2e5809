//! Selector evaluation
//!
//! Walks a compiled expression tree against a frozen model. Pure
//! interpretation over immutable data: no bytecode, no caches required
//! for correctness, and nothing here can fail — the worst case is an
//! empty result set.

use std::collections::BTreeSet;

use crate::model::Model;
use crate::shapes::ShapeId;
use crate::traits::TraitValue;

use super::parser::{Composition, Direction, KindTest, Pipeline, SelectorExpr, Step};

pub(crate) fn eval(expr: &SelectorExpr, model: &Model) -> BTreeSet<ShapeId> {
    let mut out = BTreeSet::new();
    for pipeline in &expr.alternatives {
        out.extend(eval_pipeline(pipeline, model));
    }
    out
}

fn eval_pipeline(pipeline: &Pipeline, model: &Model) -> BTreeSet<ShapeId> {
    let mut current: BTreeSet<ShapeId> = model.shape_ids().cloned().collect();

    for pipeline_step in &pipeline.steps {
        let candidates: BTreeSet<ShapeId> = match pipeline_step.composition {
            Composition::Initial => current,
            Composition::DescendantOrSelf => current
                .iter()
                .flat_map(|id| model.reachable_from(id))
                .collect(),
            Composition::Direct => current.iter().flat_map(|id| model.neighbors(id)).collect(),
        };
        current = apply_step(&pipeline_step.step, candidates, model);
        if current.is_empty() {
            break;
        }
    }

    current
}

fn apply_step(step: &Step, candidates: BTreeSet<ShapeId>, model: &Model) -> BTreeSet<ShapeId> {
    match step {
        Step::Kind(KindTest::Any) => candidates,
        Step::Kind(KindTest::Kind(kind)) => candidates
            .into_iter()
            .filter(|id| model.get_shape(id).is_some_and(|s| s.kind() == *kind))
            .collect(),
        Step::TraitTest { trait_id, value } => candidates
            .into_iter()
            .filter(|id| {
                model
                    .get_shape(id)
                    .and_then(|s| s.get_trait(trait_id))
                    .is_some_and(|tv| match value {
                        None => true,
                        Some(expected) => trait_value_matches(tv, expected),
                    })
            })
            .collect(),
        Step::Relationship { rel, direction } => candidates
            .iter()
            .flat_map(|id| match direction {
                Direction::Forward => model.related(id, *rel),
                Direction::Reverse => model.related_reverse(id, *rel),
            })
            .collect(),
        Step::Not(inner) => {
            let excluded = eval(inner, model);
            candidates
                .into_iter()
                .filter(|id| !excluded.contains(id))
                .collect()
        }
        Step::Recursive => candidates
            .into_iter()
            .filter(|id| model.is_recursive(id))
            .collect(),
    }
}

/// Value predicates compare against string-valued payloads only
fn trait_value_matches(value: &TraitValue, expected: &str) -> bool {
    value.as_str() == Some(expected)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::model::prelude;
    use crate::selector::Selector;
    use crate::shapes::{Shape, ShapeBody, ShapeId};
    use crate::traits::{known, TraitValue};

    use super::*;

    fn id(text: &str) -> ShapeId {
        ShapeId::parse(text).unwrap()
    }

    /// Two structures (one error-tagged), an operation, a recursive list
    fn sample_model() -> Model {
        let string_id = id("idl.api#String");
        let mut shapes: BTreeMap<ShapeId, Shape> = prelude()
            .iter()
            .map(|s| (s.id().clone(), s.clone()))
            .collect();

        // structure Plain { name: String }
        let plain = id("ns#Plain");
        let plain_name = plain.with_member("name");
        shapes.insert(
            plain.clone(),
            Shape::builder(
                plain.clone(),
                ShapeBody::Structure {
                    members: vec![plain_name.clone()],
                },
            )
            .build(),
        );
        shapes.insert(
            plain_name.clone(),
            Shape::builder(
                plain_name.clone(),
                ShapeBody::Member {
                    container: plain.clone(),
                    target: string_id.clone(),
                },
            )
            .build(),
        );

        // structure Bad (error-tagged)
        let bad = id("ns#Bad");
        shapes.insert(
            bad.clone(),
            Shape::builder(bad.clone(), ShapeBody::Structure { members: vec![] })
                .with_trait(
                    known::ERROR.clone(),
                    TraitValue::String("client".to_string()),
                )
                .build(),
        );

        // operation Op { input: Plain, errors: [Bad] }
        let op = id("ns#Op");
        shapes.insert(
            op.clone(),
            Shape::builder(
                op.clone(),
                ShapeBody::Operation {
                    input: Some(plain.clone()),
                    output: None,
                    errors: vec![bad.clone()],
                },
            )
            .build(),
        );

        // list Loop { member: Loop } (recursive through itself)
        let looped = id("ns#Loop");
        let loop_member = looped.with_member("member");
        shapes.insert(
            looped.clone(),
            Shape::builder(
                looped.clone(),
                ShapeBody::List {
                    member: loop_member.clone(),
                },
            )
            .build(),
        );
        shapes.insert(
            loop_member.clone(),
            Shape::builder(
                loop_member.clone(),
                ShapeBody::Member {
                    container: looped.clone(),
                    target: looped.clone(),
                },
            )
            .build(),
        );

        Model::from_shapes(shapes)
    }

    fn select(text: &str, model: &Model) -> BTreeSet<ShapeId> {
        Selector::parse(text).unwrap().select(model)
    }

    #[test]
    fn test_kind_test() {
        let model = sample_model();
        let result = select("operation", &model);
        assert_eq!(result, BTreeSet::from([id("ns#Op")]));
    }

    #[test]
    fn test_trait_test_matches_only_tagged() {
        let model = sample_model();
        let result = select("structure [trait|error]", &model);
        assert_eq!(result, BTreeSet::from([id("ns#Bad")]));
    }

    #[test]
    fn test_trait_value_predicate() {
        let model = sample_model();
        assert_eq!(
            select(r#"[trait|error = "client"]"#, &model),
            BTreeSet::from([id("ns#Bad")])
        );
        assert!(select(r#"[trait|error = "server"]"#, &model).is_empty());
    }

    #[test]
    fn test_direct_composition_only_immediate_edges() {
        let model = sample_model();
        // Direct neighbors of the operation: input + error structures
        let result = select("operation > structure", &model);
        assert_eq!(result, BTreeSet::from([id("ns#Plain"), id("ns#Bad")]));
        // But the members are two hops away
        assert!(select("operation > member", &model).is_empty());
    }

    #[test]
    fn test_descendant_composition_reaches_deep() {
        let model = sample_model();
        let result = select("operation string", &model);
        assert_eq!(result, BTreeSet::from([id("idl.api#String")]));
    }

    #[test]
    fn test_relationship_traversal() {
        let model = sample_model();
        assert_eq!(
            select("operation -[input]->", &model),
            BTreeSet::from([id("ns#Plain")])
        );
        assert_eq!(
            select("operation -[error]->", &model),
            BTreeSet::from([id("ns#Bad")])
        );
    }

    #[test]
    fn test_reverse_relationship() {
        let model = sample_model();
        let result = select("structure <-[input]-", &model);
        assert_eq!(result, BTreeSet::from([id("ns#Op")]));
    }

    #[test]
    fn test_union_merges_as_set() {
        let model = sample_model();
        let result = select("operation, operation, list", &model);
        assert_eq!(result, BTreeSet::from([id("ns#Op"), id("ns#Loop")]));
    }

    #[test]
    fn test_not_excludes() {
        let model = sample_model();
        let result = select("structure :not([trait|error])", &model);
        assert!(result.contains(&id("ns#Plain")));
        assert!(!result.contains(&id("ns#Bad")));
    }

    #[test]
    fn test_recursive_function() {
        let model = sample_model();
        let result = select("* :recursive", &model);
        assert_eq!(result, BTreeSet::from([id("ns#Loop"), id("ns#Loop$member")]));
    }

    #[test]
    fn test_empty_result_is_ok() {
        let model = sample_model();
        assert!(select("service", &model).is_empty());
    }

    #[test]
    fn test_deterministic_re_evaluation() {
        let model = sample_model();
        let selector = Selector::parse("structure [trait|error], operation").unwrap();
        assert_eq!(selector.select(&model), selector.select(&model));
    }
}
