use crate::access::{reads_outside, AccessInfo};
use crate::error::{Error, Result};
use crate::ir::{Clauses, NodeId, NodeKind, SharedClause};
use crate::schedule::Schedule;
use crate::types::{AccessMode, ArgumentCategory, DirectiveKind, ScheduleKind};
use std::collections::BTreeSet;

/// Settings a transformation chose for a directive; everything else in
/// [`Clauses`] is derived from the region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClauseSettings {
    pub schedule: Option<ScheduleKind>,
    pub default_present: bool,
}

impl ClauseSettings {
    pub fn from_clauses(clauses: &Clauses) -> Self {
        Self {
            schedule: clauses.schedule,
            default_present: clauses.default_present,
        }
    }
}

pub fn compute_clauses(
    schedule: &Schedule,
    kind: DirectiveKind,
    region: &[NodeId],
    settings: ClauseSettings,
) -> Clauses {
    let info = AccessInfo::collect_all(schedule, region);
    let mut clauses = Clauses {
        shared: shared_clause(&info),
        reduction: info.reductions(),
        ..Clauses::default()
    };
    match kind {
        DirectiveKind::Parallel => {
            clauses.schedule = Some(settings.schedule.unwrap_or_default());
            clauses.private = private_names(schedule, &info, region);
        }
        DirectiveKind::OffloadKernels => {
            clauses.private = private_names(schedule, &info, region);
            clauses.default_present = settings.default_present;
            (clauses.copy_in, clauses.copy_out) = copy_sets(&info);
        }
        DirectiveKind::OffloadData => {
            (clauses.copy_in, clauses.copy_out) = copy_sets(&info);
        }
    }
    clauses
}

/// Loop variables, kernel locals and scalars whose first access in the
/// region is a write, minus anything read after the region.
fn private_names(schedule: &Schedule, info: &AccessInfo, region: &[NodeId]) -> BTreeSet<String> {
    let escaping = reads_outside(schedule, region);
    let mut names: BTreeSet<String> = info
        .loop_variables()
        .iter()
        .chain(info.local_vars())
        .cloned()
        .collect();
    for name in info.names() {
        let Some(first) = info.first(name) else {
            continue;
        };
        if first.category == ArgumentCategory::Scalar && first.mode == AccessMode::Write {
            names.insert(name.to_string());
        }
    }
    names.retain(|name| !escaping.contains(name));
    names
}

fn shared_clause(info: &AccessInfo) -> SharedClause {
    let mut shared = SharedClause::default();
    for name in info.names() {
        let data = info.of(name).any(|a| a.category.is_data());
        if !data {
            continue;
        }
        let read = info.of(name).any(|a| a.mode.is_read());
        let written = info.is_written(name);
        let target = match (read, written) {
            (_, false) => &mut shared.read,
            (false, true) if info.of(name).all(|a| a.mode == AccessMode::Write) => {
                &mut shared.write
            }
            _ => &mut shared.read_write,
        };
        target.insert(name.to_string());
    }
    shared
}

/// Copy-in: first touched by a read. Copy-out: written anywhere, since no
/// liveness information is available after the region.
fn copy_sets(info: &AccessInfo) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut copy_in = BTreeSet::new();
    for name in info.names() {
        if info.local_vars().contains(name) {
            continue;
        }
        if info.first(name).is_some_and(|a| a.mode.is_read()) {
            copy_in.insert(name.to_string());
        }
    }
    let copy_out = info
        .written_names()
        .into_iter()
        .filter(|name| !info.local_vars().contains(name))
        .collect();
    (copy_in, copy_out)
}

/// Recomputes the clauses of `id` if it is a directive.
pub fn refresh_directive(schedule: &mut Schedule, id: NodeId) -> Result<()> {
    let (kind, settings) = match schedule.kind(id) {
        Some(NodeKind::Directive(directive)) => (
            directive.kind,
            ClauseSettings::from_clauses(&directive.clauses),
        ),
        Some(_) => return Ok(()),
        None => return Err(Error::structural(format!("unknown node {id}"))),
    };
    let region = schedule.children(id).to_vec();
    let clauses = compute_clauses(schedule, kind, &region, settings);
    if let Some(NodeKind::Directive(directive)) = schedule.kind_mut(id) {
        directive.clauses = clauses;
    }
    Ok(())
}

/// Recomputes `id` (if a directive) and every enclosing directive, since
/// region contents or statement order below them changed.
pub fn refresh_enclosing(schedule: &mut Schedule, id: NodeId) -> Result<()> {
    let chain: Vec<NodeId> = std::iter::once(id).chain(schedule.ancestors(id)).collect();
    for node in chain {
        refresh_directive(schedule, node)?;
    }
    Ok(())
}
