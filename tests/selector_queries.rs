//! Selector queries over assembled models
//!
//! Exercises the selector engine against models produced by the real
//! assembler rather than hand-built graphs.

use std::collections::BTreeSet;

use idl_core::{Assembler, Model, Selector, SelectorSyntaxError, ShapeId};

fn id(text: &str) -> ShapeId {
    ShapeId::parse(text).unwrap()
}

fn weather_model() -> Model {
    let fragment = r#"{
        "shapes": {
            "weather#Forecast": {
                "type": "structure",
                "members": {
                    "city": {"target": "idl.api#String", "traits": {"required": {}}},
                    "high": {"target": "idl.api#Integer"}
                },
                "traits": {"documentation": "a forecast"}
            },
            "weather#NoSuchCity": {
                "type": "structure",
                "members": {"message": {"target": "idl.api#String"}},
                "traits": {"error": "client", "documentation": "not found"}
            },
            "weather#GetForecast": {
                "type": "operation",
                "input": {"target": "weather#Forecast"},
                "errors": [{"target": "weather#NoSuchCity"}]
            },
            "weather#Weather": {
                "type": "service",
                "version": "2026-08-01",
                "operations": [{"target": "weather#GetForecast"}],
                "traits": {"documentation": "the service"}
            }
        }
    }"#;

    let result = Assembler::new().assemble_sources(&[fragment]);
    assert!(!result.is_broken(), "events: {:?}", result.events());
    result.into_value().unwrap()
}

fn select(text: &str, model: &Model) -> BTreeSet<ShapeId> {
    Selector::parse(text).unwrap().select(model)
}

/// `structure [trait|error]` matches only the error-tagged structure
#[test]
fn trait_test_scopes_to_tagged_structures() {
    let model = weather_model();
    let result = select("structure [trait|error]", &model);
    assert_eq!(result, BTreeSet::from([id("weather#NoSuchCity")]));
}

#[test]
fn kind_tests_partition_the_model() {
    let model = weather_model();
    assert_eq!(
        select("operation", &model),
        BTreeSet::from([id("weather#GetForecast")])
    );
    assert_eq!(
        select("service", &model),
        BTreeSet::from([id("weather#Weather")])
    );
    // Members of both structures
    assert_eq!(select("member", &model).len(), 3);
}

#[test]
fn relationship_traversal_walks_real_edges() {
    let model = weather_model();
    assert_eq!(
        select("service -[operation]->", &model),
        BTreeSet::from([id("weather#GetForecast")])
    );
    assert_eq!(
        select("operation -[error]->", &model),
        BTreeSet::from([id("weather#NoSuchCity")])
    );
    assert_eq!(
        select("operation -[input]-> -[member]->", &model),
        BTreeSet::from([id("weather#Forecast$city"), id("weather#Forecast$high")])
    );
}

#[test]
fn bound_is_the_reverse_binding_edge() {
    let model = weather_model();
    assert_eq!(
        select("operation -[bound]->", &model),
        BTreeSet::from([id("weather#Weather")])
    );
}

#[test]
fn direct_vs_descendant_composition() {
    let model = weather_model();
    // Direct: one hop from the service reaches only the operation
    assert_eq!(
        select("service > operation", &model),
        BTreeSet::from([id("weather#GetForecast")])
    );
    assert!(select("service > member", &model).is_empty());
    // Descendant-or-self: members are reachable transitively
    assert_eq!(select("service member", &model).len(), 3);
}

#[test]
fn union_and_negation() {
    let model = weather_model();
    let either = select("operation, service", &model);
    assert_eq!(either.len(), 2);

    let plain = select("structure :not([trait|error])", &model);
    assert!(plain.contains(&id("weather#Forecast")));
    assert!(!plain.contains(&id("weather#NoSuchCity")));
}

#[test]
fn required_members_via_trait_test() {
    let model = weather_model();
    let required = select("member [trait|required]", &model);
    assert_eq!(required, BTreeSet::from([id("weather#Forecast$city")]));
}

#[test]
fn empty_match_is_not_an_error() {
    let model = weather_model();
    assert!(select("resource", &model).is_empty());
    assert!(select(r#"[trait|error = "server"]"#, &model).is_empty());
}

#[test]
fn same_selector_same_model_same_result() {
    let model = weather_model();
    let selector = Selector::parse("structure > member -[target]->").unwrap();
    let first = selector.select(&model);
    let second = selector.select(&model);
    assert_eq!(first, second);
    assert_eq!(first, BTreeSet::from([id("idl.api#String"), id("idl.api#Integer")]));
}

// =============================================================================
// COMPILE-TIME FAILURES
// =============================================================================

#[test]
fn grammar_errors_fail_at_compile_time_with_positions() {
    match Selector::parse("structure -[membre]->").unwrap_err() {
        SelectorSyntaxError::UnknownRelationship { name, position } => {
            assert_eq!(name, "membre");
            assert_eq!(position, 12);
        }
        other => panic!("expected unknown relationship, got {other:?}"),
    }

    assert!(matches!(
        Selector::parse("structre").unwrap_err(),
        SelectorSyntaxError::UnknownKind { .. }
    ));
    assert!(matches!(
        Selector::parse("[trait|error = beta]").unwrap_err(),
        SelectorSyntaxError::MalformedTraitTest { .. }
    ));
    assert!(matches!(
        Selector::parse(":nope(structure)").unwrap_err(),
        SelectorSyntaxError::UnknownFunction { .. }
    ));
}

/// A selector compiled once is reusable across models
#[test]
fn compiled_selector_is_reusable() {
    let selector = Selector::parse("structure [trait|error]").unwrap();
    let model_a = weather_model();
    let model_b = weather_model();
    assert_eq!(selector.select(&model_a), selector.select(&model_b));
    assert_eq!(selector.source(), "structure [trait|error]");
}
