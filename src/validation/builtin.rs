//! Built-in validators

use crate::model::Model;
use crate::selector::Selector;
use crate::shapes::{Shape, ShapeKind};
use crate::traits::known;
use crate::validation::{NodeChecker, ValidationEvent, Validator};

/// Re-validates `idl.test#cases` example payloads
///
/// For every operation (or structure) carrying the trait, each example's
/// `params` bag is checked against the operation's input structure (or
/// the structure itself) using the shared [`NodeChecker`], one event per
/// mismatch, located by `idl.test#cases.<index>.params.<path>`. An
/// operation with no input structure but non-empty params is an error.
pub struct TestCasesValidator;

impl Validator for TestCasesValidator {
    fn name(&self) -> &'static str {
        "TestCases"
    }

    fn validate(&self, model: &Model) -> Vec<ValidationEvent> {
        let mut events = Vec::new();

        for shape in model.shapes() {
            let Some(cases) = shape
                .get_trait(&known::TEST_CASES)
                .and_then(|t| t.as_test_cases())
            else {
                continue;
            };

            let target: Option<&Shape> = match shape.kind() {
                ShapeKind::Operation => model.operation_input(shape.id()),
                ShapeKind::Structure => Some(shape),
                _ => None,
            };

            for (index, case) in cases.iter().enumerate() {
                let context = format!("{}.{index}.params", &*known::TEST_CASES);
                match target {
                    Some(structure) => {
                        let checker =
                            NodeChecker::new(model, shape.id().clone(), self.name());
                        events.extend(checker.check(structure, &case.params, &context));
                    }
                    None => {
                        let has_params =
                            case.params.as_object().is_some_and(|o| !o.is_empty());
                        if has_params && shape.kind() == ShapeKind::Operation {
                            events.push(
                                ValidationEvent::error(
                                    self.name(),
                                    format!(
                                        "test case `{}` supplies parameters but operation \
                                         `{}` has no input structure: {}",
                                        case.id,
                                        shape.id(),
                                        case.params.to_json_string()
                                    ),
                                )
                                .with_shape(shape.id().clone())
                                .with_location(case.params.location),
                            );
                        }
                    }
                }
            }
        }

        events
    }
}

/// Flags aggregate shapes missing `idl.api#documentation`
///
/// Scoped with a selector rather than a hand-rolled scan; prelude shapes
/// are exempt.
pub struct UndocumentedShapesValidator {
    selector: Selector,
}

impl UndocumentedShapesValidator {
    pub fn new() -> Self {
        // Compile-time constant, known valid.
        let selector = Selector::parse(
            "structure :not([trait|documentation]), union :not([trait|documentation])",
        )
        .expect("built-in selector parses");
        Self { selector }
    }
}

impl Default for UndocumentedShapesValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for UndocumentedShapesValidator {
    fn name(&self) -> &'static str {
        "UndocumentedShape"
    }

    fn validate(&self, model: &Model) -> Vec<ValidationEvent> {
        self.selector
            .select(model)
            .into_iter()
            .filter(|id| id.namespace() != "idl.api")
            .map(|id| {
                ValidationEvent::note(
                    self.name(),
                    format!("shape `{id}` has no documentation"),
                )
                .with_shape(id)
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
