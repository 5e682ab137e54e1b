use crate::clauses::{compute_clauses, refresh_enclosing, ClauseSettings};
use crate::config::EngineConfig;
use crate::dependency::DependencyTools;
use crate::error::{RefusalKind, Result, TransformationError};
use crate::ir::{Directive, NodeId, NodeKind};
use crate::schedule::Schedule;
use crate::transform::{
    check_directive_nesting, check_options, check_statement, check_target_count, refuse,
    TransformOptions, Transformation,
};
use crate::types::{DirectiveKind, ScheduleKind};
use tracing::{debug, instrument};

const NAME: &str = "parallelize";

/// Wraps a single loop in a `parallel` (default) or `offload_kernels`
/// directive after checking that its iterations are independent.
#[derive(Debug, Clone, Default)]
pub struct ParallelizeTrans {
    tools: DependencyTools,
    default_schedule: ScheduleKind,
}

impl ParallelizeTrans {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tools: DependencyTools::new(config),
            default_schedule: config.default_schedule_kind,
        }
    }

    fn settings(
        &self,
        options: &TransformOptions,
    ) -> std::result::Result<(DirectiveKind, ClauseSettings), TransformationError> {
        let kind = options.directive_kind.unwrap_or(DirectiveKind::Parallel);
        match kind {
            DirectiveKind::Parallel => Ok((
                kind,
                ClauseSettings {
                    schedule: Some(options.schedule_kind.unwrap_or(self.default_schedule)),
                    default_present: false,
                },
            )),
            DirectiveKind::OffloadKernels => {
                if options.schedule_kind.is_some() {
                    return Err(refuse(
                        NAME,
                        RefusalKind::InvalidOptions,
                        "schedule_kind only applies to parallel directives",
                    ));
                }
                Ok((kind, ClauseSettings::default()))
            }
            DirectiveKind::OffloadData => Err(refuse(
                NAME,
                RefusalKind::InvalidOptions,
                "a data region is created with offload_data_region, not parallelize",
            )),
        }
    }
}

impl Transformation for ParallelizeTrans {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognised_options(&self) -> &'static [&'static str] {
        &["schedule_kind", "directive_kind"]
    }

    fn validate(
        &self,
        schedule: &Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> std::result::Result<(), TransformationError> {
        check_options(self, options)?;
        let (kind, _) = self.settings(options)?;
        check_target_count(NAME, targets, 1)?;
        let target = targets[0];
        check_statement(NAME, schedule, target)?;
        if !matches!(schedule.kind(target), Some(NodeKind::Loop(_))) {
            return Err(refuse(
                NAME,
                RefusalKind::InvalidTarget,
                format!("node {target} is not a loop"),
            ));
        }

        check_directive_nesting(NAME, schedule, &[target], kind)?;

        let analysis = self.tools.can_loop_be_parallelised(schedule, target);
        if !analysis.parallelisable {
            let kind = if analysis.unanalyzable {
                RefusalKind::Unanalyzable
            } else {
                RefusalKind::Conflict
            };
            return Err(refuse(
                NAME,
                kind,
                format!("loop {target} cannot be parallelised: {}", analysis.summary()),
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
        let (kind, settings) = self.settings(options)?;
        let target = targets[0];

        let clauses = compute_clauses(schedule, kind, &[target], settings);
        let directive = schedule.create(NodeKind::Directive(Directive { kind, clauses }))?;
        schedule.replace(target, directive)?;
        schedule.push_child(directive, target)?;
        refresh_enclosing(schedule, directive)?;

        debug!(loop_id = %target, %directive, %kind, "loop wrapped");
        Ok(())
    }
}
