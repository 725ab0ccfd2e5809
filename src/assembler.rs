//! Model assembler
//!
//! External-facing entry point: ingests raw model fragments (parsed node
//! trees), merges them into one shape graph, resolves mixins, decodes
//! and merges traits, runs the validation framework, and returns a
//! [`ValidatedResult`] holding the model plus every diagnostic produced
//! along the way.
//!
//! ## Pipeline
//!
//! ```text
//! fragments → raw shapes → merge → closure/cycle checks
//!                                → mixin resolution → trait resolution
//!                                → freeze → validators → suppression
//! ```
//!
//! Structural problems quarantine only the shapes they affect; the rest
//! of the graph is still assembled and validated so one malformed shape
//! never hides the diagnostics of the others. No partial model is ever
//! exposed — the returned model is frozen before validators see it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info};

use crate::error::StructuralError;
use crate::model::{prelude, Model};
use crate::node::{Node, SourceLocation};
use crate::node_parser::parse_node;
use crate::shapes::{is_identifier, Shape, ShapeBody, ShapeId, ShapeKind};
use crate::traits::TraitRegistry;
use crate::validation::{
    apply_suppressions, ValidatedResult, ValidationEvent, ValidatorRegistry,
};

/// Namespace used to resolve relative trait names in fragments
const RELATIVE_TRAIT_NAMESPACE: &str = "idl.api";

/// Event id for malformed fragment input
const INVALID_FRAGMENT: &str = "InvalidFragment";

/// Event id for trait payloads that fail to decode
const TRAIT_DECODE: &str = "TraitDecode";

// =============================================================================
// ASSEMBLER
// =============================================================================

/// Builds a frozen [`Model`] from raw fragments
///
/// Holds the trait and validator registries for the host application;
/// construct once and reuse across assemblies.
pub struct Assembler {
    traits: TraitRegistry,
    validators: ValidatorRegistry,
}

impl Assembler {
    /// Assembler with the built-in trait catalog and validators
    pub fn new() -> Self {
        Self {
            traits: TraitRegistry::builtin(),
            validators: ValidatorRegistry::builtin(),
        }
    }

    /// Assembler with host-supplied registries
    pub fn with_registries(traits: TraitRegistry, validators: ValidatorRegistry) -> Self {
        Self { traits, validators }
    }

    /// Parse JSON fragment texts, then assemble
    pub fn assemble_sources(&self, sources: &[&str]) -> ValidatedResult<Model> {
        let mut parse_events = Vec::new();
        let mut nodes = Vec::new();
        for source in sources {
            match parse_node(source) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    parse_events.push(ValidationEvent::error(INVALID_FRAGMENT, e.to_string()))
                }
            }
        }

        let result = self.assemble(&nodes);
        if parse_events.is_empty() {
            return result;
        }
        let suppressed = result.suppressed_count();
        parse_events.extend(result.events().iter().cloned());
        ValidatedResult::new(result.into_value(), parse_events).with_suppressed_count(suppressed)
    }

    /// Merge fragments into one model and validate it
    ///
    /// Always returns the best-effort model alongside the full diagnostic
    /// list; callers decide pass/fail from the severities.
    pub fn assemble(&self, fragments: &[Node]) -> ValidatedResult<Model> {
        let mut events: Vec<ValidationEvent> = Vec::new();

        let mut raws: Vec<RawShape> = Vec::new();
        for fragment in fragments {
            collect_fragment(fragment, &mut raws, &mut events);
        }

        let merged = merge_raws(raws, &mut events);
        info!(
            fragments = fragments.len(),
            shapes = merged.len(),
            "collected raw shapes"
        );

        let mut broken: BTreeSet<ShapeId> = BTreeSet::new();
        check_closure(&merged, &mut events, &mut broken);
        check_mixin_cycles(&merged, &mut events, &mut broken);

        let mut member_memo: HashMap<ShapeId, Vec<(String, MemberSpec)>> = HashMap::new();
        let mut in_progress: HashSet<ShapeId> = HashSet::new();
        // Resolve members for every surviving container so conflicts
        // surface even when a shape is never referenced.
        for id in merged.keys().filter(|id| !id.is_member()) {
            if !broken.contains(id) {
                resolved_members(
                    id,
                    &merged,
                    &broken,
                    &mut member_memo,
                    &mut in_progress,
                    &mut events,
                );
            }
        }

        check_structural_cycles(&merged, &member_memo, &mut events, &mut broken);

        let mut trait_memo: HashMap<ShapeId, BTreeMap<ShapeId, crate::traits::TraitValue>> =
            HashMap::new();
        let mut trait_in_progress: HashSet<ShapeId> = HashSet::new();

        let mut shapes: BTreeMap<ShapeId, Shape> = prelude()
            .iter()
            .map(|s| (s.id().clone(), s.clone()))
            .collect();

        for (id, raw) in &merged {
            if id.is_member() || broken.contains(id) {
                continue;
            }

            let traits = resolved_traits(
                id,
                &merged,
                &broken,
                &self.traits,
                &mut trait_memo,
                &mut trait_in_progress,
                &mut events,
            );

            match &raw.body {
                ShapeBody::Structure { .. } | ShapeBody::Union { .. } => {
                    let specs = member_memo.get(id).cloned().unwrap_or_default();
                    let member_ids: Vec<ShapeId> =
                        specs.iter().map(|(name, _)| id.with_member(name)).collect();
                    let body = match raw.body {
                        ShapeBody::Union { .. } => ShapeBody::Union {
                            members: member_ids.clone(),
                        },
                        _ => ShapeBody::Structure {
                            members: member_ids.clone(),
                        },
                    };

                    let mut builder = Shape::builder(id.clone(), body);
                    for mixin in &raw.mixins {
                        builder = builder.with_mixin(mixin.clone());
                    }
                    for (trait_id, value) in traits {
                        builder = builder.with_trait(trait_id, value);
                    }
                    shapes.insert(id.clone(), builder.build());

                    for (name, spec) in specs {
                        let member_id = id.with_member(&name);
                        let mut builder = Shape::builder(
                            member_id.clone(),
                            ShapeBody::Member {
                                container: id.clone(),
                                target: spec.target.clone(),
                            },
                        );
                        for (trait_id, payload) in &spec.traits {
                            match self.traits.decode(trait_id, payload) {
                                Ok(value) => {
                                    builder = builder.with_trait(trait_id.clone(), value)
                                }
                                Err(e) => events.push(
                                    ValidationEvent::error(TRAIT_DECODE, e.to_string())
                                        .with_shape(member_id.clone())
                                        .with_location(payload.location),
                                ),
                            }
                        }
                        shapes.insert(member_id, builder.build());
                    }
                }
                _ => {
                    let mut builder = Shape::builder(id.clone(), raw.body.clone());
                    for mixin in &raw.mixins {
                        builder = builder.with_mixin(mixin.clone());
                    }
                    for (trait_id, value) in traits {
                        builder = builder.with_trait(trait_id, value);
                    }
                    shapes.insert(id.clone(), builder.build());

                    // Enum, list, and map members are always local
                    for member_id in raw.body.members() {
                        let Some(member_raw) = merged.get(member_id) else {
                            continue;
                        };
                        let mut builder =
                            Shape::builder(member_id.clone(), member_raw.body.clone());
                        for (trait_id, payload) in &member_raw.traits {
                            match self.traits.decode(trait_id, payload) {
                                Ok(value) => {
                                    builder = builder.with_trait(trait_id.clone(), value)
                                }
                                Err(e) => events.push(
                                    ValidationEvent::error(TRAIT_DECODE, e.to_string())
                                        .with_shape(member_id.clone())
                                        .with_location(payload.location),
                                ),
                            }
                        }
                        shapes.insert(member_id.clone(), builder.build());
                    }
                }
            }
        }

        let model = Model::from_shapes(shapes);
        info!(shapes = model.len(), quarantined = broken.len(), "model frozen");

        events.extend(self.validators.run(&model));
        let (kept, suppressed) = apply_suppressions(&model, events);
        debug!(events = kept.len(), suppressed, "assembly finished");

        ValidatedResult::new(Some(model), kept).with_suppressed_count(suppressed)
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RAW SHAPES
// =============================================================================

/// A shape definition before graph admission
#[derive(Debug, Clone, PartialEq)]
struct RawShape {
    id: ShapeId,
    body: ShapeBody,
    mixins: Vec<ShapeId>,
    traits: Vec<(ShapeId, Node)>,
    location: SourceLocation,
}

impl RawShape {
    /// Content equality, ignoring provenance
    fn same_definition(&self, other: &RawShape) -> bool {
        self.body == other.body && self.mixins == other.mixins && self.traits == other.traits
    }
}

/// Target and raw traits of one resolved member
#[derive(Debug, Clone, PartialEq)]
struct MemberSpec {
    target: ShapeId,
    traits: Vec<(ShapeId, Node)>,
}

fn structural_event(error: StructuralError, location: SourceLocation) -> ValidationEvent {
    ValidationEvent::error(error.event_id(), error.to_string())
        .with_shape(error.shape().clone())
        .with_location(location)
}

// =============================================================================
// FRAGMENT PARSING
// =============================================================================

fn collect_fragment(fragment: &Node, raws: &mut Vec<RawShape>, events: &mut Vec<ValidationEvent>) {
    let Some(defs) = fragment.get("shapes").and_then(Node::as_object) else {
        events.push(
            ValidationEvent::error(
                INVALID_FRAGMENT,
                "fragment must be an object with a `shapes` object",
            )
            .with_location(fragment.location),
        );
        return;
    };

    for (id_text, def) in defs {
        let id = match ShapeId::parse(id_text) {
            Ok(id) if !id.is_member() => id,
            Ok(id) => {
                events.push(
                    ValidationEvent::error(
                        INVALID_FRAGMENT,
                        format!("member `{id}` must be defined inline by its container"),
                    )
                    .with_location(def.location),
                );
                continue;
            }
            Err(e) => {
                events.push(
                    ValidationEvent::error(INVALID_FRAGMENT, e.to_string())
                        .with_location(def.location),
                );
                continue;
            }
        };
        collect_shape_def(&id, def, raws, events);
    }
}

fn collect_shape_def(
    id: &ShapeId,
    def: &Node,
    raws: &mut Vec<RawShape>,
    events: &mut Vec<ValidationEvent>,
) {
    let invalid = |message: String| {
        ValidationEvent::error(INVALID_FRAGMENT, message)
            .with_shape(id.clone())
            .with_location(def.location)
    };

    if def.as_object().is_none() {
        events.push(invalid(format!("definition of `{id}` must be an object")));
        return;
    }
    let Some(type_name) = def.get("type").and_then(Node::as_str) else {
        events.push(invalid(format!("definition of `{id}` is missing a string `type`")));
        return;
    };

    let mixins = collect_target_list(id, def.get("mixins"), events);
    let traits = collect_traits(id, def.get("traits"), events);

    let unit_target = ShapeId::from_parts(RELATIVE_TRAIT_NAMESPACE, "Unit");
    let body = match type_name {
        "structure" => ShapeBody::Structure {
            members: collect_members(id, def.get("members"), None, raws, events),
        },
        "union" => ShapeBody::Union {
            members: collect_members(id, def.get("members"), None, raws, events),
        },
        "enum" => ShapeBody::Enum {
            members: collect_members(id, def.get("members"), Some(&unit_target), raws, events),
        },
        "list" => {
            let Some(member) =
                collect_single_member(id, "member", def.get("member"), raws, events)
            else {
                return;
            };
            ShapeBody::List { member }
        }
        "map" => {
            let Some(key) = collect_single_member(id, "key", def.get("key"), raws, events) else {
                return;
            };
            let Some(value) = collect_single_member(id, "value", def.get("value"), raws, events)
            else {
                return;
            };
            ShapeBody::Map { key, value }
        }
        "operation" => {
            let mut binding = |field: &str| match def.get(field) {
                None => None,
                Some(node) => {
                    let target = parse_target(node);
                    if target.is_none() {
                        events.push(
                            ValidationEvent::error(
                                INVALID_FRAGMENT,
                                format!("`{field}` of `{id}` is not a valid shape id target"),
                            )
                            .with_shape(id.clone())
                            .with_location(node.location),
                        );
                    }
                    target
                }
            };
            let input = binding("input");
            let output = binding("output");
            ShapeBody::Operation {
                input,
                output,
                errors: collect_target_list(id, def.get("errors"), events),
            }
        }
        "resource" => ShapeBody::Resource {
            operations: collect_target_list(id, def.get("operations"), events),
        },
        "service" => ShapeBody::Service {
            version: def
                .get("version")
                .and_then(Node::as_str)
                .unwrap_or_default()
                .to_string(),
            operations: collect_target_list(id, def.get("operations"), events),
            resources: collect_target_list(id, def.get("resources"), events),
        },
        other => match ShapeKind::from_lexical_name(other).filter(ShapeKind::is_simple) {
            Some(kind) => ShapeBody::Simple(kind),
            None => {
                events.push(invalid(format!("unknown shape type `{other}` for `{id}`")));
                return;
            }
        },
    };

    raws.push(RawShape {
        id: id.clone(),
        body,
        mixins,
        traits,
        location: def.location,
    });
}

/// `"ns#Id"` or `{"target": "ns#Id"}`
fn parse_target(node: &Node) -> Option<ShapeId> {
    let text = node.as_str().or_else(|| node.get("target")?.as_str())?;
    ShapeId::parse(text).ok()
}

fn collect_target_list(
    id: &ShapeId,
    node: Option<&Node>,
    events: &mut Vec<ValidationEvent>,
) -> Vec<ShapeId> {
    let Some(node) = node else { return vec![] };
    let Some(items) = node.as_array() else {
        events.push(
            ValidationEvent::error(
                INVALID_FRAGMENT,
                format!("expected an array of shape id targets in `{id}`"),
            )
            .with_shape(id.clone())
            .with_location(node.location),
        );
        return vec![];
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match parse_target(item) {
            Some(target) => out.push(target),
            None => events.push(
                ValidationEvent::error(
                    INVALID_FRAGMENT,
                    format!("invalid shape id target in `{id}`"),
                )
                .with_shape(id.clone())
                .with_location(item.location),
            ),
        }
    }
    out
}

fn collect_traits(
    id: &ShapeId,
    node: Option<&Node>,
    events: &mut Vec<ValidationEvent>,
) -> Vec<(ShapeId, Node)> {
    let Some(node) = node else { return vec![] };
    let Some(entries) = node.as_object() else {
        events.push(
            ValidationEvent::error(
                INVALID_FRAGMENT,
                format!("`traits` of `{id}` must be an object"),
            )
            .with_shape(id.clone())
            .with_location(node.location),
        );
        return vec![];
    };

    let mut out = Vec::with_capacity(entries.len());
    for (trait_text, payload) in entries {
        let absolute = if trait_text.contains('#') {
            trait_text.clone()
        } else {
            format!("{RELATIVE_TRAIT_NAMESPACE}#{trait_text}")
        };
        match ShapeId::parse(&absolute) {
            Ok(trait_id) => out.push((trait_id, payload.clone())),
            Err(e) => events.push(
                ValidationEvent::error(INVALID_FRAGMENT, e.to_string())
                    .with_shape(id.clone())
                    .with_location(payload.location),
            ),
        }
    }
    out
}

fn collect_members(
    container: &ShapeId,
    node: Option<&Node>,
    default_target: Option<&ShapeId>,
    raws: &mut Vec<RawShape>,
    events: &mut Vec<ValidationEvent>,
) -> Vec<ShapeId> {
    let Some(node) = node else { return vec![] };
    let Some(entries) = node.as_object() else {
        events.push(
            ValidationEvent::error(
                INVALID_FRAGMENT,
                format!("`members` of `{container}` must be an object"),
            )
            .with_shape(container.clone())
            .with_location(node.location),
        );
        return vec![];
    };

    let mut out = Vec::with_capacity(entries.len());
    for (name, member_def) in entries {
        if !is_identifier(name) {
            events.push(
                ValidationEvent::error(
                    INVALID_FRAGMENT,
                    format!("invalid member name `{name}` in `{container}`"),
                )
                .with_shape(container.clone())
                .with_location(member_def.location),
            );
            continue;
        }
        let target = match parse_target(member_def).or_else(|| default_target.cloned()) {
            Some(target) => target,
            None => {
                events.push(
                    ValidationEvent::error(
                        INVALID_FRAGMENT,
                        format!("member `{name}` of `{container}` is missing a `target`"),
                    )
                    .with_shape(container.clone())
                    .with_location(member_def.location),
                );
                continue;
            }
        };
        let member_id = container.with_member(name);
        let traits = collect_traits(&member_id, member_def.get("traits"), events);
        raws.push(RawShape {
            id: member_id.clone(),
            body: ShapeBody::Member {
                container: container.clone(),
                target,
            },
            mixins: vec![],
            traits,
            location: member_def.location,
        });
        out.push(member_id);
    }
    out
}

fn collect_single_member(
    container: &ShapeId,
    name: &str,
    node: Option<&Node>,
    raws: &mut Vec<RawShape>,
    events: &mut Vec<ValidationEvent>,
) -> Option<ShapeId> {
    let Some(node) = node else {
        events.push(
            ValidationEvent::error(
                INVALID_FRAGMENT,
                format!("`{container}` is missing its `{name}` member"),
            )
            .with_shape(container.clone()),
        );
        return None;
    };
    let Some(target) = parse_target(node) else {
        events.push(
            ValidationEvent::error(
                INVALID_FRAGMENT,
                format!("`{name}` member of `{container}` is missing a `target`"),
            )
            .with_shape(container.clone())
            .with_location(node.location),
        );
        return None;
    };
    let member_id = container.with_member(name);
    let traits = collect_traits(&member_id, node.get("traits"), events);
    raws.push(RawShape {
        id: member_id.clone(),
        body: ShapeBody::Member {
            container: container.clone(),
            target,
        },
        mixins: vec![],
        traits,
        location: node.location,
    });
    Some(member_id)
}

// =============================================================================
// MERGE
// =============================================================================

/// Fragment merge: identical redefinitions are idempotent, conflicting
/// ones produce an error and keep the first definition
fn merge_raws(
    raws: Vec<RawShape>,
    events: &mut Vec<ValidationEvent>,
) -> BTreeMap<ShapeId, RawShape> {
    let mut merged: BTreeMap<ShapeId, RawShape> = BTreeMap::new();
    for raw in raws {
        match merged.get(&raw.id) {
            None => {
                merged.insert(raw.id.clone(), raw);
            }
            Some(existing) if existing.same_definition(&raw) => {}
            Some(existing) => {
                events.push(structural_event(conflict_error(existing, &raw), raw.location));
            }
        }
    }
    merged
}

fn conflict_error(existing: &RawShape, incoming: &RawShape) -> StructuralError {
    if let Some(member) = incoming.id.member_name() {
        return StructuralError::ConflictingMember {
            shape: incoming.id.without_member(),
            member: member.to_string(),
        };
    }
    if let Some(member) = first_member_difference(existing, incoming) {
        return StructuralError::ConflictingMember {
            shape: incoming.id.clone(),
            member,
        };
    }
    StructuralError::ConflictingDefinition {
        shape: incoming.id.clone(),
    }
}

/// First member name present in one definition but not the other
fn first_member_difference(a: &RawShape, b: &RawShape) -> Option<String> {
    let names = |raw: &RawShape| -> Vec<String> {
        raw.body
            .members()
            .iter()
            .filter_map(|m| m.member_name().map(str::to_string))
            .collect()
    };
    let a_names = names(a);
    let b_names = names(b);
    b_names
        .iter()
        .find(|n| !a_names.contains(*n))
        .or_else(|| a_names.iter().find(|n| !b_names.contains(*n)))
        .cloned()
}

// =============================================================================
// STRUCTURAL CHECKS
// =============================================================================

fn check_closure(
    merged: &BTreeMap<ShapeId, RawShape>,
    events: &mut Vec<ValidationEvent>,
    broken: &mut BTreeSet<ShapeId>,
) {
    let known: HashSet<&ShapeId> = merged
        .keys()
        .chain(prelude().iter().map(Shape::id))
        .collect();

    for raw in merged.values() {
        for target in referenced_ids(raw) {
            if !known.contains(target) {
                events.push(structural_event(
                    StructuralError::UnresolvedShapeId {
                        referrer: raw.id.clone(),
                        target: target.clone(),
                    },
                    raw.location,
                ));
                broken.insert(raw.id.without_member());
            }
        }
    }
}

fn referenced_ids(raw: &RawShape) -> Vec<&ShapeId> {
    let mut out: Vec<&ShapeId> = raw.mixins.iter().collect();
    match &raw.body {
        ShapeBody::Member { target, .. } => out.push(target),
        ShapeBody::Operation {
            input,
            output,
            errors,
        } => {
            out.extend(input.iter());
            out.extend(output.iter());
            out.extend(errors.iter());
        }
        ShapeBody::Service {
            operations,
            resources,
            ..
        } => {
            out.extend(operations.iter());
            out.extend(resources.iter());
        }
        ShapeBody::Resource { operations } => out.extend(operations.iter()),
        // Aggregate member ids are created alongside their containers
        _ => {}
    }
    out
}

fn check_mixin_cycles(
    merged: &BTreeMap<ShapeId, RawShape>,
    events: &mut Vec<ValidationEvent>,
    broken: &mut BTreeSet<ShapeId>,
) {
    for (id, raw) in merged {
        if raw.mixins.is_empty() {
            continue;
        }
        // Can this shape reach itself along mixin edges?
        let mut queue: Vec<&ShapeId> = raw.mixins.iter().collect();
        let mut seen: HashSet<&ShapeId> = HashSet::new();
        let mut cyclic = false;
        while let Some(current) = queue.pop() {
            if current == id {
                cyclic = true;
                break;
            }
            if seen.insert(current) {
                if let Some(next) = merged.get(current) {
                    queue.extend(next.mixins.iter());
                }
            }
        }
        if cyclic {
            events.push(structural_event(
                StructuralError::CyclicMixin { shape: id.clone() },
                raw.location,
            ));
            broken.insert(id.clone());
        }
    }
}

/// A structure member chain that returns to its container without
/// passing a list, map, or union is an invalid cycle
fn check_structural_cycles(
    merged: &BTreeMap<ShapeId, RawShape>,
    member_memo: &HashMap<ShapeId, Vec<(String, MemberSpec)>>,
    events: &mut Vec<ValidationEvent>,
    broken: &mut BTreeSet<ShapeId>,
) {
    let structure_targets = |id: &ShapeId| -> Vec<ShapeId> {
        member_memo
            .get(id)
            .map(|specs| {
                specs
                    .iter()
                    .map(|(_, spec)| spec.target.clone())
                    .filter(|t| {
                        merged
                            .get(t)
                            .is_some_and(|r| r.body.kind() == ShapeKind::Structure)
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    let candidates: Vec<&ShapeId> = merged
        .iter()
        .filter(|(id, raw)| {
            !id.is_member() && !broken.contains(*id) && raw.body.kind() == ShapeKind::Structure
        })
        .map(|(id, _)| id)
        .collect();

    for id in candidates {
        let mut queue = structure_targets(id);
        let mut seen: HashSet<ShapeId> = HashSet::new();
        while let Some(current) = queue.pop() {
            if &current == id {
                events.push(structural_event(
                    StructuralError::InvalidStructuralCycle { shape: id.clone() },
                    merged[id].location,
                ));
                broken.insert(id.clone());
                break;
            }
            if seen.insert(current.clone()) {
                queue.extend(structure_targets(&current));
            }
        }
    }
}

// =============================================================================
// MIXIN RESOLUTION
// =============================================================================

/// Materialized member list of a container: inherited members first
/// (mixin declaration order), then locals; a local member overrides a
/// same-named inherited one
fn resolved_members(
    id: &ShapeId,
    merged: &BTreeMap<ShapeId, RawShape>,
    broken: &BTreeSet<ShapeId>,
    memo: &mut HashMap<ShapeId, Vec<(String, MemberSpec)>>,
    in_progress: &mut HashSet<ShapeId>,
    events: &mut Vec<ValidationEvent>,
) -> Vec<(String, MemberSpec)> {
    if let Some(done) = memo.get(id) {
        return done.clone();
    }
    // Mixin cycles are quarantined separately; just refuse to loop.
    if !in_progress.insert(id.clone()) {
        return vec![];
    }

    let result = (|| {
        let Some(raw) = merged.get(id) else {
            return vec![];
        };
        let local_ids: Vec<ShapeId> = match &raw.body {
            ShapeBody::Structure { members } | ShapeBody::Union { members } => members.clone(),
            _ => return vec![],
        };

        let locals: Vec<(String, MemberSpec)> = local_ids
            .iter()
            .filter_map(|member_id| {
                let name = member_id.member_name()?.to_string();
                let member_raw = merged.get(member_id)?;
                let ShapeBody::Member { target, .. } = &member_raw.body else {
                    return None;
                };
                Some((
                    name,
                    MemberSpec {
                        target: target.clone(),
                        traits: member_raw.traits.clone(),
                    },
                ))
            })
            .collect();

        let mut inherited: Vec<(String, MemberSpec)> = Vec::new();
        for mixin in &raw.mixins {
            if broken.contains(mixin) {
                continue;
            }
            for (name, spec) in
                resolved_members(mixin, merged, broken, memo, in_progress, events)
            {
                if locals.iter().any(|(n, _)| n == &name) {
                    continue;
                }
                match inherited.iter().find(|(n, _)| n == &name) {
                    Some((_, existing)) if existing == &spec => {}
                    Some(_) => events.push(structural_event(
                        StructuralError::ConflictingMember {
                            shape: id.clone(),
                            member: name.clone(),
                        },
                        raw.location,
                    )),
                    None => inherited.push((name, spec)),
                }
            }
        }

        inherited.extend(locals);
        inherited
    })();

    in_progress.remove(id);
    memo.insert(id.clone(), result.clone());
    result
}

/// Resolved trait map of a shape: direct attachments win; inherited
/// values merge per the trait's policy
fn resolved_traits(
    id: &ShapeId,
    merged: &BTreeMap<ShapeId, RawShape>,
    broken: &BTreeSet<ShapeId>,
    registry: &TraitRegistry,
    memo: &mut HashMap<ShapeId, BTreeMap<ShapeId, crate::traits::TraitValue>>,
    in_progress: &mut HashSet<ShapeId>,
    events: &mut Vec<ValidationEvent>,
) -> BTreeMap<ShapeId, crate::traits::TraitValue> {
    if let Some(done) = memo.get(id) {
        return done.clone();
    }
    if !in_progress.insert(id.clone()) {
        return BTreeMap::new();
    }

    let result = (|| {
        let Some(raw) = merged.get(id) else {
            return BTreeMap::new();
        };

        let mut direct: BTreeMap<ShapeId, crate::traits::TraitValue> = BTreeMap::new();
        for (trait_id, payload) in &raw.traits {
            match registry.decode(trait_id, payload) {
                Ok(value) => {
                    direct.insert(trait_id.clone(), value);
                }
                Err(e) => events.push(
                    ValidationEvent::error(TRAIT_DECODE, e.to_string())
                        .with_shape(id.clone())
                        .with_location(payload.location),
                ),
            }
        }

        let mut inherited: BTreeMap<ShapeId, Vec<crate::traits::TraitValue>> = BTreeMap::new();
        for mixin in &raw.mixins {
            if broken.contains(mixin) {
                continue;
            }
            for (trait_id, value) in
                resolved_traits(mixin, merged, broken, registry, memo, in_progress, events)
            {
                inherited.entry(trait_id).or_default().push(value);
            }
        }

        let mut result = BTreeMap::new();
        for (trait_id, values) in inherited {
            if direct.contains_key(&trait_id) {
                continue;
            }
            match registry.merge_inherited(&trait_id, values) {
                Some(value) => {
                    result.insert(trait_id, value);
                }
                None => events.push(structural_event(
                    StructuralError::ConflictingTrait {
                        shape: id.clone(),
                        trait_id,
                    },
                    raw.location,
                )),
            }
        }
        result.extend(direct);
        result
    })();

    in_progress.remove(id);
    memo.insert(id.clone(), result.clone());
    result
}

// =============================================================================
// Tests
// =============================================================================
