//! Validation framework
//!
//! A registry of independent [`Validator`] units runs over a frozen
//! [`Model`], each producing structured [`ValidationEvent`]s. Validators
//! are pure functions of the model and `Send + Sync`, so a host may run
//! them in parallel; this framework runs them sequentially in
//! registration order, which is equivalent because event *content* never
//! depends on execution order.
//!
//! Shapes may carry the `idl.api#suppress` trait naming event ids (or
//! `"*"`); matching events below ERROR severity are removed from the
//! emitted list but still counted, so a build can report how many were
//! suppressed without failing on them.

mod builtin;
mod node_checker;

pub use builtin::{TestCasesValidator, UndocumentedShapesValidator};
pub use node_checker::NodeChecker;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Model;
use crate::node::SourceLocation;
use crate::shapes::ShapeId;
use crate::traits::known;

// =============================================================================
// EVENTS
// =============================================================================

/// Diagnostic severity, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Note,
    Warning,
    Danger,
    Error,
}

/// A structured diagnostic produced by assembly or validation
///
/// The serde form of this type — severity, event id, shape id, message,
/// line, column — is the stable machine-readable contract consumed by
/// external tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEvent {
    pub severity: Severity,
    /// Stable event id, matched by suppressions
    pub id: String,
    pub shape: Option<ShapeId>,
    pub message: String,
    #[serde(flatten)]
    pub location: SourceLocation,
}

impl ValidationEvent {
    pub fn new(severity: Severity, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            id: id.into(),
            shape: None,
            message: message.into(),
            location: SourceLocation::none(),
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, id, message)
    }

    pub fn danger(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Danger, id, message)
    }

    pub fn warning(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, id, message)
    }

    pub fn note(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Note, id, message)
    }

    pub fn with_shape(mut self, shape: ShapeId) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// The stable structured form, for machine consumption
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// =============================================================================
// VALIDATED RESULT
// =============================================================================

/// A value paired with the diagnostics produced while building it
///
/// The value is present even when diagnostics were produced, so
/// best-effort tooling can still inspect a broken model. Callers decide
/// pass/fail from the severities via [`ValidatedResult::is_broken`].
#[derive(Debug)]
pub struct ValidatedResult<T> {
    value: Option<T>,
    events: Vec<ValidationEvent>,
    suppressed_count: usize,
}

impl<T> ValidatedResult<T> {
    pub fn new(value: Option<T>, events: Vec<ValidationEvent>) -> Self {
        Self {
            value,
            events,
            suppressed_count: 0,
        }
    }

    pub(crate) fn with_suppressed_count(mut self, count: usize) -> Self {
        self.suppressed_count = count;
        self
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }

    /// How many events were removed by suppressions
    pub fn suppressed_count(&self) -> usize {
        self.suppressed_count
    }

    /// True when any ERROR, or any DANGER that survived suppression,
    /// was emitted — the result is unusable for strict consumers
    pub fn is_broken(&self) -> bool {
        self.events.iter().any(|e| e.severity >= Severity::Danger)
    }

    /// The value if the result is intact, otherwise the full event list
    pub fn into_result(self) -> Result<T, Vec<ValidationEvent>> {
        let broken = self.is_broken();
        match self.value {
            Some(value) if !broken => Ok(value),
            _ => Err(self.events),
        }
    }
}

// =============================================================================
// VALIDATORS
// =============================================================================

/// One independent validation unit
///
/// Implementations must be pure functions of the model: no mutation, no
/// shared mutable state, so instances can be reused across models and
/// run concurrently.
pub trait Validator: Send + Sync {
    /// Name used as the default event id for this validator's events
    fn name(&self) -> &'static str;

    fn validate(&self, model: &Model) -> Vec<ValidationEvent>;
}

/// Validators in registration order
///
/// Constructed by the host and handed to the
/// [`Assembler`](crate::assembler::Assembler); execution order is stable
/// (registration order) and results are concatenated.
pub struct ValidatorRegistry {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Registry preloaded with the built-in validators
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(TestCasesValidator);
        registry.register(UndocumentedShapesValidator::new());
        registry
    }

    pub fn register(&mut self, validator: impl Validator + 'static) {
        self.validators.push(Box::new(validator));
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every validator against the model, concatenating results
    pub fn run(&self, model: &Model) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        for validator in &self.validators {
            let produced = validator.validate(model);
            debug!(
                validator = validator.name(),
                events = produced.len(),
                "validator finished"
            );
            events.extend(produced);
        }
        events
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// SUPPRESSION
// =============================================================================

/// Remove events exempted by `idl.api#suppress` traits
///
/// Returns the surviving events plus the count of removed ones. ERROR
/// severity is never suppressible.
pub fn apply_suppressions(
    model: &Model,
    events: Vec<ValidationEvent>,
) -> (Vec<ValidationEvent>, usize) {
    let mut kept = Vec::with_capacity(events.len());
    let mut suppressed = 0;
    for event in events {
        if is_suppressed(model, &event) {
            suppressed += 1;
        } else {
            kept.push(event);
        }
    }
    (kept, suppressed)
}

fn is_suppressed(model: &Model, event: &ValidationEvent) -> bool {
    if event.severity == Severity::Error {
        return false;
    }
    let Some(shape_id) = &event.shape else {
        return false;
    };
    let Some(shape) = model.get_shape(shape_id) else {
        return false;
    };
    let Some(suppressions) = shape
        .get_trait(&known::SUPPRESS)
        .and_then(|t| t.as_string_list())
    else {
        return false;
    };
    suppressions.iter().any(|s| s == "*" || s == &event.id)
}

// =============================================================================
// Tests
// =============================================================================
