use crate::clauses::refresh_enclosing;
use crate::dependency::{dependency_between, Dependency};
use crate::error::{RefusalKind, Result, TransformationError};
use crate::ir::NodeId;
use crate::schedule::Schedule;
use crate::transform::{
    check_options, check_statement, check_target_count, refuse, MovePosition, TransformOptions,
    Transformation,
};
use tracing::{debug, instrument};

const NAME: &str = "move";

/// Moves a statement before or after a sibling anchor. Every statement it
/// jumps over must be independent of it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoveTrans;

impl MoveTrans {
    /// Siblings between the node's current slot and its destination.
    fn crossed(
        &self,
        schedule: &Schedule,
        node: NodeId,
        anchor: NodeId,
        position: MovePosition,
    ) -> Vec<NodeId> {
        let (Some(parent), Some(from), Some(to)) = (
            schedule.parent(node),
            schedule.position(node),
            schedule.position(anchor),
        ) else {
            return Vec::new();
        };
        let range = match (from < to, position) {
            (true, MovePosition::Before) => from + 1..to,
            (true, MovePosition::After) => from + 1..to + 1,
            (false, MovePosition::Before) => to..from,
            (false, MovePosition::After) => to + 1..from,
        };
        schedule.children(parent)[range].to_vec()
    }
}

impl Transformation for MoveTrans {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognised_options(&self) -> &'static [&'static str] {
        &["position"]
    }

    fn validate(
        &self,
        schedule: &Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> std::result::Result<(), TransformationError> {
        check_options(self, options)?;
        check_target_count(NAME, targets, 2)?;
        let (node, anchor) = (targets[0], targets[1]);
        check_statement(NAME, schedule, node)?;
        check_statement(NAME, schedule, anchor)?;
        if node == anchor {
            return Err(refuse(
                NAME,
                RefusalKind::InvalidTarget,
                "a node cannot be moved relative to itself",
            ));
        }
        if schedule.parent(node) != schedule.parent(anchor) {
            return Err(refuse(
                NAME,
                RefusalKind::NotAdjacent,
                format!("{node} and {anchor} have different parents"),
            ));
        }

        let crossed = self.crossed(schedule, node, anchor, options.position.unwrap_or_default());
        if crossed.is_empty() {
            return Err(refuse(
                NAME,
                RefusalKind::Redundant,
                format!("{node} is already in the requested position"),
            ));
        }
        for sibling in crossed {
            match dependency_between(schedule, node, sibling) {
                Dependency::Independent => {}
                Dependency::Conflict { names } => {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Conflict,
                        format!(
                            "{node} and {sibling} both access [{}] with a write",
                            names.join(", ")
                        ),
                    ));
                }
                Dependency::Unanalyzable { node: block } => {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Unanalyzable,
                        format!("code block {block} blocks reordering"),
                    ));
                }
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(invoke = schedule.invoke()))]
    fn apply(
        &self,
        schedule: &mut Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> Result<()> {
        self.validate(schedule, targets, options)?;
        let (node, anchor) = (targets[0], targets[1]);
        let Some(parent) = schedule.parent(node) else {
            return Err(refuse(NAME, RefusalKind::InvalidTarget, "detached node").into());
        };

        schedule.detach(node)?;
        let anchor_position = schedule.position(anchor).unwrap_or(0);
        let index = match options.position.unwrap_or_default() {
            MovePosition::Before => anchor_position,
            MovePosition::After => anchor_position + 1,
        };
        schedule.insert_child(parent, index, node)?;
        refresh_enclosing(schedule, parent)?;

        debug!(%node, %anchor, index, "moved");
        Ok(())
    }
}
