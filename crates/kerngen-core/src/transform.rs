use crate::error::{RefusalKind, Result, TransformationError};
use crate::ir::{NodeId, NodeKind, NodeTag};
use crate::schedule::Schedule;
use crate::types::{DirectiveKind, ScheduleKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MovePosition {
    #[default]
    Before,
    After,
}

/// Options understood by the transformation library. Each transformation
/// recognises a subset of keys and refuses any other key that is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TransformOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_kind: Option<ScheduleKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive_kind: Option<DirectiveKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<MovePosition>,
}

impl TransformOptions {
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.schedule_kind.is_some() {
            keys.push("schedule_kind");
        }
        if self.directive_kind.is_some() {
            keys.push("directive_kind");
        }
        if self.default_present.is_some() {
            keys.push("default_present");
        }
        if self.tile_size.is_some() {
            keys.push("tile_size");
        }
        if self.position.is_some() {
            keys.push("position");
        }
        keys
    }
}

/// A tree rewrite split into a side-effect free `validate` and an `apply`
/// that re-validates before it touches the tree, so a refused apply leaves
/// the schedule exactly as it was.
pub trait Transformation: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognised_options(&self) -> &'static [&'static str] {
        &[]
    }

    fn validate(
        &self,
        schedule: &Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> std::result::Result<(), TransformationError>;

    fn apply(
        &self,
        schedule: &mut Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> Result<()>;
}

pub(crate) fn refuse(
    transformation: &str,
    kind: RefusalKind,
    message: impl Into<String>,
) -> TransformationError {
    TransformationError::new(transformation, kind, message)
}

pub(crate) fn check_options(
    transformation: &dyn Transformation,
    options: &TransformOptions,
) -> std::result::Result<(), TransformationError> {
    let recognised = transformation.recognised_options();
    let unknown: Vec<&str> = options
        .keys()
        .into_iter()
        .filter(|key| !recognised.contains(key))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    Err(refuse(
        transformation.name(),
        RefusalKind::InvalidOptions,
        format!(
            "unrecognised option(s) {} (expected one of [{}])",
            unknown.join(", "),
            recognised.join(", ")
        ),
    ))
}

pub(crate) fn check_target_count(
    transformation: &str,
    targets: &[NodeId],
    expected: usize,
) -> std::result::Result<(), TransformationError> {
    if targets.len() == expected {
        return Ok(());
    }
    Err(refuse(
        transformation,
        RefusalKind::InvalidTarget,
        format!("expected {expected} target node(s) but got {}", targets.len()),
    ))
}

/// The target must be a live, attached statement (not the root).
pub(crate) fn check_statement(
    transformation: &str,
    schedule: &Schedule,
    id: NodeId,
) -> std::result::Result<(), TransformationError> {
    if !schedule.contains(id) {
        return Err(refuse(
            transformation,
            RefusalKind::InvalidTarget,
            format!("node {id} is not part of schedule '{}'", schedule.invoke()),
        ));
    }
    if id == schedule.root() || schedule.parent(id).is_none() {
        return Err(refuse(
            transformation,
            RefusalKind::InvalidTarget,
            format!("node {id} is not a statement of the schedule"),
        ));
    }
    Ok(())
}

/// A directive of kind `kind` wrapping `region` must fit inside every
/// enclosing directive and must itself be able to enclose every directive
/// already inside the region.
pub(crate) fn check_directive_nesting(
    transformation: &str,
    schedule: &Schedule,
    region: &[NodeId],
    kind: DirectiveKind,
) -> std::result::Result<(), TransformationError> {
    let Some(first) = region.first() else {
        return Ok(());
    };
    for ancestor in schedule.ancestors(*first) {
        let Some(NodeKind::Directive(enclosing)) = schedule.kind(ancestor) else {
            continue;
        };
        if enclosing.kind == kind {
            return Err(refuse(
                transformation,
                RefusalKind::Redundant,
                format!("already inside {kind} directive {ancestor}"),
            ));
        }
        if !enclosing.kind.may_enclose(kind) {
            return Err(refuse(
                transformation,
                RefusalKind::ConflictingDirective,
                format!(
                    "{kind} directive cannot be placed inside {} directive {ancestor}",
                    enclosing.kind
                ),
            ));
        }
    }
    for node in region {
        for inner in schedule.walk_from(*node, Some(NodeTag::Directive)) {
            let Some(NodeKind::Directive(contained)) = schedule.kind(inner) else {
                continue;
            };
            if contained.kind == kind && inner == *node && region.len() == 1 {
                return Err(refuse(
                    transformation,
                    RefusalKind::Redundant,
                    format!("{inner} is already a {kind} directive"),
                ));
            }
            if !kind.may_enclose(contained.kind) {
                return Err(refuse(
                    transformation,
                    RefusalKind::ConflictingDirective,
                    format!(
                        "{kind} directive cannot enclose {} directive {inner}",
                        contained.kind
                    ),
                ));
            }
        }
    }
    Ok(())
}

pub(crate) fn check_analyzable(
    transformation: &str,
    schedule: &Schedule,
    region: &[NodeId],
) -> std::result::Result<(), TransformationError> {
    for node in region {
        if let Some(block) = schedule.walk_from(*node, Some(NodeTag::CodeBlock)).next() {
            return Err(refuse(
                transformation,
                RefusalKind::Unanalyzable,
                format!("code block {block} inside the region cannot be analysed"),
            ));
        }
    }
    Ok(())
}
