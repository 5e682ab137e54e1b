use crate::clauses::{compute_clauses, refresh_enclosing, ClauseSettings};
use crate::error::{RefusalKind, Result, TransformationError};
use crate::ir::{Directive, NodeId, NodeKind};
use crate::schedule::Schedule;
use crate::transform::{
    check_analyzable, check_directive_nesting, check_options, check_statement, refuse,
    TransformOptions, Transformation,
};
use crate::types::DirectiveKind;
use tracing::{debug, instrument};

/// Wraps a contiguous run of sibling statements in one offload directive.
#[derive(Debug, Clone, Copy)]
pub struct OffloadRegionTrans {
    kind: DirectiveKind,
}

impl OffloadRegionTrans {
    pub fn kernels() -> Self {
        Self {
            kind: DirectiveKind::OffloadKernels,
        }
    }

    pub fn data() -> Self {
        Self {
            kind: DirectiveKind::OffloadData,
        }
    }

    pub fn kind(&self) -> DirectiveKind {
        self.kind
    }

    /// Targets sorted by position, after checking they form one
    /// contiguous run under a single parent.
    fn region(
        &self,
        schedule: &Schedule,
        targets: &[NodeId],
    ) -> std::result::Result<Vec<NodeId>, TransformationError> {
        let name = self.name();
        if targets.is_empty() {
            return Err(refuse(
                name,
                RefusalKind::InvalidTarget,
                "at least one statement is required",
            ));
        }
        for target in targets {
            check_statement(name, schedule, *target)?;
        }
        let parent = schedule.parent(targets[0]);
        if let Some(stray) = targets.iter().find(|t| schedule.parent(**t) != parent) {
            return Err(refuse(
                name,
                RefusalKind::NotAdjacent,
                format!("{stray} does not share a parent with {}", targets[0]),
            ));
        }
        let mut region = targets.to_vec();
        region.sort_by_key(|id| schedule.position(*id));
        for pair in region.windows(2) {
            let (a, b) = (schedule.position(pair[0]), schedule.position(pair[1]));
            if a == b {
                return Err(refuse(
                    name,
                    RefusalKind::InvalidTarget,
                    format!("{} is listed more than once", pair[0]),
                ));
            }
            if a.map(|p| p + 1) != b {
                return Err(refuse(
                    name,
                    RefusalKind::NotAdjacent,
                    format!("{} and {} are not contiguous siblings", pair[0], pair[1]),
                ));
            }
        }
        Ok(region)
    }
}

impl Transformation for OffloadRegionTrans {
    fn name(&self) -> &'static str {
        match self.kind {
            DirectiveKind::OffloadData => "offload_data_region",
            _ => "offload_region",
        }
    }

    fn recognised_options(&self) -> &'static [&'static str] {
        match self.kind {
            DirectiveKind::OffloadKernels => &["default_present"],
            _ => &[],
        }
    }

    fn validate(
        &self,
        schedule: &Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> std::result::Result<(), TransformationError> {
        check_options(self, options)?;
        let region = self.region(schedule, targets)?;
        check_directive_nesting(self.name(), schedule, &region, self.kind)?;
        check_analyzable(self.name(), schedule, &region)
    }

    #[instrument(skip_all, fields(invoke = schedule.invoke(), kind = %self.kind))]
    fn apply(
        &self,
        schedule: &mut Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> Result<()> {
        self.validate(schedule, targets, options)?;
        let region = self.region(schedule, targets)?;
        let settings = ClauseSettings {
            schedule: None,
            default_present: options.default_present.unwrap_or(false),
        };

        let (Some(parent), Some(position)) =
            (schedule.parent(region[0]), schedule.position(region[0]))
        else {
            return Err(refuse(self.name(), RefusalKind::InvalidTarget, "detached region").into());
        };
        let clauses = compute_clauses(schedule, self.kind, &region, settings);
        let directive = schedule.create(NodeKind::Directive(Directive {
            kind: self.kind,
            clauses,
        }))?;
        for node in &region {
            schedule.detach(*node)?;
        }
        schedule.insert_child(parent, position, directive)?;
        for node in &region {
            schedule.push_child(directive, *node)?;
        }
        refresh_enclosing(schedule, directive)?;

        debug!(%directive, statements = region.len(), "region wrapped");
        Ok(())
    }
}
