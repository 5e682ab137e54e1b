use crate::clauses::refresh_enclosing;
use crate::error::{RefusalKind, Result, TransformationError};
use crate::ir::{NodeId, NodeKind};
use crate::schedule::Schedule;
use crate::transform::{
    check_analyzable, check_options, check_statement, check_target_count, refuse,
    TransformOptions, Transformation,
};
use crate::types::DirectiveKind;
use tracing::{debug, instrument};

const NAME: &str = "fuse";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FuseShape {
    Loops,
    Regions,
    StatementIntoRegion,
}

/// Merges two adjacent siblings. Loops of identical type, variable, bounds and
/// nesting depth have their bodies concatenated; an offload region absorbs
/// the kernel call or same-kind region that follows it.
#[derive(Debug, Default, Clone, Copy)]
pub struct FuseTrans;

impl FuseTrans {
    fn shape(
        &self,
        schedule: &Schedule,
        first: NodeId,
        second: NodeId,
    ) -> std::result::Result<FuseShape, TransformationError> {
        let (Some(lhs), Some(rhs)) = (schedule.kind(first), schedule.kind(second)) else {
            return Err(refuse(NAME, RefusalKind::InvalidTarget, "unknown node"));
        };
        match (lhs, rhs) {
            (NodeKind::Loop(a), NodeKind::Loop(b)) => {
                if a.loop_type != b.loop_type {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Incompatible,
                        format!(
                            "loops have different types '{}' and '{}'",
                            a.loop_type, b.loop_type
                        ),
                    ));
                }
                // The moved body may name its own loop variable, e.g. in
                // tiled inner bounds.
                if a.variable != b.variable {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Incompatible,
                        format!(
                            "loops iterate over different variables '{}' and '{}'",
                            a.variable, b.variable
                        ),
                    ));
                }
                if !a.bounds.same_as(&b.bounds) {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Incompatible,
                        format!(
                            "loop bounds differ: {}..{} step {} and {}..{} step {}",
                            a.bounds.start,
                            a.bounds.stop,
                            a.bounds.step,
                            b.bounds.start,
                            b.bounds.stop,
                            b.bounds.step
                        ),
                    ));
                }
                let (depth_a, depth_b) = (schedule.loop_depth(first), schedule.loop_depth(second));
                if depth_a != depth_b {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Incompatible,
                        format!("loop nests have different depths {depth_a} and {depth_b}"),
                    ));
                }
                Ok(FuseShape::Loops)
            }
            (NodeKind::Loop(_), _) | (_, NodeKind::Loop(_)) => Err(refuse(
                NAME,
                RefusalKind::Incompatible,
                "a loop can only be fused with another loop",
            )),
            (NodeKind::Directive(a), NodeKind::Directive(b)) => {
                if a.kind != b.kind {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Incompatible,
                        format!("directive kinds differ: {} and {}", a.kind, b.kind),
                    ));
                }
                if a.kind == DirectiveKind::Parallel {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Incompatible,
                        "a parallel directive wraps exactly one loop",
                    ));
                }
                Ok(FuseShape::Regions)
            }
            (NodeKind::Directive(a), NodeKind::KernelCall(_)) => {
                if a.kind == DirectiveKind::Parallel {
                    return Err(refuse(
                        NAME,
                        RefusalKind::Incompatible,
                        "a parallel directive wraps exactly one loop",
                    ));
                }
                Ok(FuseShape::StatementIntoRegion)
            }
            (_, NodeKind::CodeBlock(_)) | (NodeKind::CodeBlock(_), _) => Err(refuse(
                NAME,
                RefusalKind::Unanalyzable,
                "code blocks cannot be fused",
            )),
            _ => Err(refuse(
                NAME,
                RefusalKind::Incompatible,
                format!("node {first} has no body to fuse into"),
            )),
        }
    }
}

impl Transformation for FuseTrans {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(
        &self,
        schedule: &Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> std::result::Result<(), TransformationError> {
        check_options(self, options)?;
        check_target_count(NAME, targets, 2)?;
        let (first, second) = (targets[0], targets[1]);
        check_statement(NAME, schedule, first)?;
        check_statement(NAME, schedule, second)?;

        let adjacent = schedule.parent(first) == schedule.parent(second)
            && schedule.position(first).map(|p| p + 1) == schedule.position(second);
        if !adjacent {
            return Err(refuse(
                NAME,
                RefusalKind::NotAdjacent,
                format!("{second} does not immediately follow {first} in the same parent"),
            ));
        }

        self.shape(schedule, first, second)?;
        check_analyzable(NAME, schedule, &[first, second])
    }

    #[instrument(skip_all, fields(invoke = schedule.invoke()))]
    fn apply(
        &self,
        schedule: &mut Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> Result<()> {
        self.validate(schedule, targets, options)?;
        let (first, second) = (targets[0], targets[1]);
        let shape = self.shape(schedule, first, second)?;

        match shape {
            FuseShape::Loops | FuseShape::Regions => {
                let moved = schedule.children(second).to_vec();
                for child in moved {
                    schedule.detach(child)?;
                    schedule.push_child(first, child)?;
                }
                let merged_reductions = match schedule.kind(second) {
                    Some(NodeKind::Loop(lp)) => lp.reductions.clone(),
                    _ => Default::default(),
                };
                schedule.detach(second)?;
                schedule.discard(second)?;
                if let Some(NodeKind::Loop(lp)) = schedule.kind_mut(first) {
                    lp.reductions.extend(merged_reductions);
                }
            }
            FuseShape::StatementIntoRegion => {
                schedule.detach(second)?;
                schedule.push_child(first, second)?;
            }
        }

        refresh_enclosing(schedule, first)?;
        debug!(%first, %second, ?shape, "fused");
        Ok(())
    }
}
