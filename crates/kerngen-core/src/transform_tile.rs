use crate::clauses::refresh_enclosing;
use crate::error::{RefusalKind, Result, TransformationError};
use crate::ir::{Loop, NodeId, NodeKind};
use crate::schedule::Schedule;
use crate::transform::{
    check_options, check_statement, check_target_count, refuse, TransformOptions, Transformation,
};
use crate::types::{Bounds, DirectiveKind, LoopType};
use tracing::{debug, instrument};

const NAME: &str = "tile";
const DEFAULT_TILE_SIZE: u32 = 32;

/// Strip-mines a loop into a `tile` loop stepping over blocks and the
/// original loop iterating inside one block.
#[derive(Debug, Default, Clone, Copy)]
pub struct TileTrans;

fn tiled_bounds(variable: &str, bounds: &Bounds, tile_size: u32) -> (Bounds, Bounds) {
    let tile_var = format!("{variable}_tile");
    let unit_step = bounds.step.trim() == "1";
    let (outer_step, extent) = if unit_step {
        (tile_size.to_string(), (tile_size - 1).to_string())
    } else {
        (
            format!("{tile_size}*({})", bounds.step),
            format!("{}*({})", tile_size - 1, bounds.step),
        )
    };
    let outer = Bounds::new(bounds.start.clone(), bounds.stop.clone(), outer_step);
    let inner = Bounds::new(
        tile_var.clone(),
        format!("min({tile_var}+{extent}, {})", bounds.stop),
        bounds.step.clone(),
    );
    (outer, inner)
}

impl Transformation for TileTrans {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognised_options(&self) -> &'static [&'static str] {
        &["tile_size"]
    }

    fn validate(
        &self,
        schedule: &Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> std::result::Result<(), TransformationError> {
        check_options(self, options)?;
        check_target_count(NAME, targets, 1)?;
        let target = targets[0];
        check_statement(NAME, schedule, target)?;
        let Some(NodeKind::Loop(lp)) = schedule.kind(target) else {
            return Err(refuse(
                NAME,
                RefusalKind::InvalidTarget,
                format!("node {target} is not a loop"),
            ));
        };
        if lp.loop_type == LoopType::Tile {
            return Err(refuse(
                NAME,
                RefusalKind::Redundant,
                format!("loop {target} already iterates over tiles"),
            ));
        }
        let tile_var = format!("{}_tile", lp.variable);
        let enclosing = schedule.ancestors(target).find(|ancestor| {
            schedule
                .kind(*ancestor)
                .and_then(NodeKind::as_loop)
                .is_some_and(|outer| outer.variable == tile_var)
        });
        if let Some(outer) = enclosing {
            return Err(refuse(
                NAME,
                RefusalKind::Redundant,
                format!("loop {target} is already tiled by loop {outer} over '{tile_var}'"),
            ));
        }
        let tile_size = options.tile_size.unwrap_or(DEFAULT_TILE_SIZE);
        if tile_size < 2 {
            return Err(refuse(
                NAME,
                RefusalKind::InvalidOptions,
                format!("tile_size must be >= 2 but got {tile_size}"),
            ));
        }
        let wrapped = schedule
            .parent(target)
            .and_then(|parent| schedule.kind(parent))
            .and_then(NodeKind::as_directive)
            .is_some_and(|directive| directive.kind == DirectiveKind::Parallel);
        if wrapped {
            return Err(refuse(
                NAME,
                RefusalKind::ConflictingDirective,
                format!("loop {target} is the subject of a parallel directive"),
            ));
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
        let target = targets[0];
        let tile_size = options.tile_size.unwrap_or(DEFAULT_TILE_SIZE);
        let Some(NodeKind::Loop(original)) = schedule.kind(target).cloned() else {
            return Err(refuse(NAME, RefusalKind::InvalidTarget, "not a loop").into());
        };

        let (outer_bounds, inner_bounds) =
            tiled_bounds(&original.variable, &original.bounds, tile_size);
        let outer = Loop {
            loop_type: LoopType::Tile,
            variable: format!("{}_tile", original.variable),
            bounds: outer_bounds,
            reductions: original.reductions.clone(),
        };
        let tile_loop = schedule.create(NodeKind::Loop(outer))?;
        schedule.replace(target, tile_loop)?;
        schedule.push_child(tile_loop, target)?;
        if let Some(NodeKind::Loop(inner)) = schedule.kind_mut(target) {
            inner.bounds = inner_bounds;
            inner.reductions.clear();
        }
        refresh_enclosing(schedule, tile_loop)?;

        debug!(loop_id = %target, %tile_loop, tile_size, "loop tiled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_step_bounds_are_simplified() {
        let (outer, inner) = tiled_bounds("i", &Bounds::new("1", "n", "1"), 16);
        assert_eq!(outer, Bounds::new("1", "n", "16"));
        assert_eq!(inner, Bounds::new("i_tile", "min(i_tile+15, n)", "1"));
    }

    #[test]
    fn symbolic_step_is_scaled() {
        let (outer, inner) = tiled_bounds("k", &Bounds::new("2", "m", "s"), 4);
        assert_eq!(outer.step, "4*(s)");
        assert_eq!(inner.stop, "min(k_tile+3*(s), m)");
        assert_eq!(inner.step, "s");
    }
}
