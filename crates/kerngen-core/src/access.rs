use crate::ir::{NodeId, NodeKind, NodeTag};
use crate::schedule::Schedule;
use crate::types::{AccessMode, ArgumentCategory};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub name: String,
    pub category: ArgumentCategory,
    pub mode: AccessMode,
    pub call: NodeId,
}

/// Argument accesses of every kernel call under a set of nodes, in program
/// order. Code blocks make the set unanalyzable.
#[derive(Debug, Clone, Default)]
pub struct AccessInfo {
    accesses: Vec<Access>,
    unanalyzable: Vec<NodeId>,
    loop_variables: BTreeSet<String>,
    local_vars: BTreeSet<String>,
}

impl AccessInfo {
    pub fn collect(schedule: &Schedule, id: NodeId) -> Self {
        Self::collect_all(schedule, &[id])
    }

    pub fn collect_all(schedule: &Schedule, ids: &[NodeId]) -> Self {
        let mut info = AccessInfo::default();
        for id in ids {
            for node in schedule.walk_from(*id, None) {
                match schedule.kind(node) {
                    Some(NodeKind::KernelCall(call)) => {
                        info.accesses
                            .extend(call.arguments().iter().map(|arg| Access {
                                name: arg.name.clone(),
                                category: arg.category,
                                mode: arg.access,
                                call: node,
                            }));
                        info.local_vars.extend(call.local_vars().iter().cloned());
                    }
                    Some(NodeKind::Loop(lp)) => {
                        info.loop_variables.insert(lp.variable.clone());
                    }
                    Some(NodeKind::CodeBlock(_)) => info.unanalyzable.push(node),
                    _ => {}
                }
            }
        }
        info
    }

    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    pub fn is_analyzable(&self) -> bool {
        self.unanalyzable.is_empty()
    }

    pub fn unanalyzable(&self) -> &[NodeId] {
        &self.unanalyzable
    }

    pub fn loop_variables(&self) -> &BTreeSet<String> {
        &self.loop_variables
    }

    pub fn local_vars(&self) -> &BTreeSet<String> {
        &self.local_vars
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.accesses.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Access> + 'a {
        self.accesses.iter().filter(move |a| a.name == name)
    }

    pub fn first(&self, name: &str) -> Option<&Access> {
        self.accesses.iter().find(|a| a.name == name)
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        self.of(name).all(|a| a.mode == AccessMode::Read)
    }

    pub fn is_written(&self, name: &str) -> bool {
        self.of(name).any(|a| a.mode.is_write())
    }

    pub fn written_names(&self) -> BTreeSet<String> {
        self.accesses
            .iter()
            .filter(|a| a.mode.is_write())
            .map(|a| a.name.clone())
            .collect()
    }

    /// Scalars updated through `reduce_sum`.
    pub fn reductions(&self) -> BTreeSet<String> {
        self.accesses
            .iter()
            .filter(|a| a.category == ArgumentCategory::Scalar && a.mode.is_reduction())
            .map(|a| a.name.clone())
            .collect()
    }
}

/// Names read by kernel calls that are not inside any of `region`.
pub fn reads_outside(schedule: &Schedule, region: &[NodeId]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for node in schedule.walk(Some(NodeTag::KernelCall)) {
        let inside = region
            .iter()
            .any(|r| *r == node || schedule.is_ancestor(*r, node));
        if inside {
            continue;
        }
        if let Some(NodeKind::KernelCall(call)) = schedule.kind(node) {
            names.extend(
                call.arguments()
                    .iter()
                    .filter(|arg| arg.access.is_read())
                    .map(|arg| arg.name.clone()),
            );
        }
    }
    names
}
