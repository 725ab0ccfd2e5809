//! Node-vs-shape structural checker
//!
//! Validates a raw [`Node`] value against a target [`Shape`]'s full
//! constraint set: value types per simple kind, unknown and missing
//! structure members, union arity, enum values, with recursion through
//! lists, maps, and nested structures. Shared by every validator that
//! needs to re-check example payloads instead of re-implementing
//! structural rules.

use crate::model::Model;
use crate::node::{Node, NodeValue};
use crate::shapes::{Shape, ShapeBody, ShapeId, ShapeKind};
use crate::traits::known;
use crate::validation::ValidationEvent;

/// Checks node values against shapes, emitting one event per mismatch
///
/// Events are attributed to a fixed `event_shape` (the shape whose trait
/// supplied the value being checked) under a fixed `event_id`, with a
/// dotted context path locating the mismatch inside the value.
pub struct NodeChecker<'a> {
    model: &'a Model,
    event_shape: ShapeId,
    event_id: String,
}

impl<'a> NodeChecker<'a> {
    pub fn new(model: &'a Model, event_shape: ShapeId, event_id: impl Into<String>) -> Self {
        Self {
            model,
            event_shape,
            event_id: event_id.into(),
        }
    }

    /// Validate `node` against `target`, returning every mismatch found
    pub fn check(&self, target: &Shape, node: &Node, context: &str) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        self.check_value(target, node, context, &mut events);
        events
    }

    fn error(&self, node: &Node, message: String) -> ValidationEvent {
        ValidationEvent::error(self.event_id.clone(), message)
            .with_shape(self.event_shape.clone())
            .with_location(node.location)
    }

    fn check_value(
        &self,
        shape: &Shape,
        node: &Node,
        context: &str,
        out: &mut Vec<ValidationEvent>,
    ) {
        match shape.body() {
            ShapeBody::Simple(kind) => self.check_simple(*kind, node, context, out),
            ShapeBody::Member { target, .. } => {
                if let Some(target_shape) = self.model.get_shape(target) {
                    self.check_value(target_shape, node, context, out);
                }
            }
            ShapeBody::Enum { members } => self.check_enum(shape, members, node, context, out),
            ShapeBody::List { member } => self.check_list(member, node, context, out),
            ShapeBody::Map { value, .. } => self.check_map(value, node, context, out),
            ShapeBody::Structure { members } => {
                self.check_structure(shape, members, node, context, out)
            }
            ShapeBody::Union { members } => self.check_union(shape, members, node, context, out),
            ShapeBody::Operation { .. } | ShapeBody::Resource { .. } | ShapeBody::Service { .. } => {
                out.push(self.error(
                    node,
                    format!(
                        "{context}: shape `{}` ({}) cannot be used as a value target",
                        shape.id(),
                        shape.kind().lexical_name()
                    ),
                ));
            }
        }
    }

    fn check_simple(
        &self,
        kind: ShapeKind,
        node: &Node,
        context: &str,
        out: &mut Vec<ValidationEvent>,
    ) {
        let ok = match kind {
            ShapeKind::Boolean => matches!(node.value, NodeValue::Boolean(_)),
            ShapeKind::Byte => self.check_integer_range(node, i8::MIN as i64, i8::MAX as i64),
            ShapeKind::Short => self.check_integer_range(node, i16::MIN as i64, i16::MAX as i64),
            ShapeKind::Integer => {
                self.check_integer_range(node, i32::MIN as i64, i32::MAX as i64)
            }
            ShapeKind::Long => matches!(node.value, NodeValue::Integer(_)),
            ShapeKind::BigInteger => match &node.value {
                NodeValue::Integer(_) => true,
                NodeValue::Decimal(d) => d.fract().is_zero(),
                _ => false,
            },
            ShapeKind::Float | ShapeKind::Double | ShapeKind::BigDecimal => {
                matches!(node.value, NodeValue::Integer(_) | NodeValue::Decimal(_))
            }
            ShapeKind::String | ShapeKind::Blob => matches!(node.value, NodeValue::String(_)),
            // Epoch seconds
            ShapeKind::Timestamp => {
                matches!(node.value, NodeValue::Integer(_) | NodeValue::Decimal(_))
            }
            // Non-simple kinds are handled by check_value
            _ => true,
        };

        if !ok {
            out.push(self.error(
                node,
                format!(
                    "{context}: expected {} value, found {}",
                    kind.lexical_name(),
                    node.kind_name()
                ),
            ));
        }
    }

    fn check_integer_range(&self, node: &Node, min: i64, max: i64) -> bool {
        match node.value {
            NodeValue::Integer(i) => (min..=max).contains(&i),
            _ => false,
        }
    }

    fn check_enum(
        &self,
        shape: &Shape,
        members: &[ShapeId],
        node: &Node,
        context: &str,
        out: &mut Vec<ValidationEvent>,
    ) {
        let Some(text) = node.as_str() else {
            out.push(self.error(
                node,
                format!("{context}: expected enum string, found {}", node.kind_name()),
            ));
            return;
        };

        // The wire value is the enumValue trait when present, else the
        // member name.
        let allowed = members.iter().any(|member_id| {
            let wire_value = self
                .model
                .get_shape(member_id)
                .and_then(|m| m.get_trait(&known::ENUM_VALUE))
                .and_then(|t| t.as_str());
            match wire_value {
                Some(v) => v == text,
                None => member_id.member_name() == Some(text),
            }
        });

        if !allowed {
            out.push(self.error(
                node,
                format!(
                    "{context}: value \"{text}\" is not a member of enum `{}`",
                    shape.id()
                ),
            ));
        }
    }

    fn check_list(
        &self,
        member: &ShapeId,
        node: &Node,
        context: &str,
        out: &mut Vec<ValidationEvent>,
    ) {
        let Some(items) = node.as_array() else {
            out.push(self.error(
                node,
                format!("{context}: expected array, found {}", node.kind_name()),
            ));
            return;
        };
        let Some(member_shape) = self.model.get_shape(member) else {
            return;
        };
        for (index, item) in items.iter().enumerate() {
            self.check_value(member_shape, item, &format!("{context}[{index}]"), out);
        }
    }

    fn check_map(
        &self,
        value_member: &ShapeId,
        node: &Node,
        context: &str,
        out: &mut Vec<ValidationEvent>,
    ) {
        let Some(entries) = node.as_object() else {
            out.push(self.error(
                node,
                format!("{context}: expected object, found {}", node.kind_name()),
            ));
            return;
        };
        let Some(value_shape) = self.model.get_shape(value_member) else {
            return;
        };
        for (key, entry) in entries {
            self.check_value(value_shape, entry, &format!("{context}.{key}"), out);
        }
    }

    fn check_structure(
        &self,
        shape: &Shape,
        members: &[ShapeId],
        node: &Node,
        context: &str,
        out: &mut Vec<ValidationEvent>,
    ) {
        let Some(entries) = node.as_object() else {
            out.push(self.error(
                node,
                format!("{context}: expected object, found {}", node.kind_name()),
            ));
            return;
        };

        for (key, _) in entries {
            if !members.iter().any(|m| m.member_name() == Some(key.as_str())) {
                out.push(self.error(
                    node,
                    format!(
                        "{context}: unknown member `{key}` supplied for structure `{}`",
                        shape.id()
                    ),
                ));
            }
        }

        for member_id in members {
            let Some(member_shape) = self.model.get_shape(member_id) else {
                continue;
            };
            let Some(name) = member_id.member_name() else {
                continue;
            };
            match node.get(name) {
                Some(value) => {
                    self.check_value(member_shape, value, &format!("{context}.{name}"), out);
                }
                None => {
                    if member_shape.has_trait(&known::REQUIRED) {
                        out.push(self.error(
                            node,
                            format!(
                                "{context}: missing required member `{name}` of structure `{}`",
                                shape.id()
                            ),
                        ));
                    }
                }
            }
        }
    }

    fn check_union(
        &self,
        shape: &Shape,
        members: &[ShapeId],
        node: &Node,
        context: &str,
        out: &mut Vec<ValidationEvent>,
    ) {
        let Some(entries) = node.as_object() else {
            out.push(self.error(
                node,
                format!("{context}: expected object, found {}", node.kind_name()),
            ));
            return;
        };

        if entries.len() != 1 {
            out.push(self.error(
                node,
                format!(
                    "{context}: union `{}` requires exactly one member set, found {}",
                    shape.id(),
                    entries.len()
                ),
            ));
            return;
        }

        let (key, value) = &entries[0];
        match members.iter().find(|m| m.member_name() == Some(key.as_str())) {
            Some(member_id) => {
                if let Some(member_shape) = self.model.get_shape(member_id) {
                    self.check_value(member_shape, value, &format!("{context}.{key}"), out);
                }
            }
            None => {
                out.push(self.error(
                    node,
                    format!(
                        "{context}: unknown member `{key}` supplied for union `{}`",
                        shape.id()
                    ),
                ));
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
