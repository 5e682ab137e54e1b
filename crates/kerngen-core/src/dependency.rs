use crate::access::{reads_outside, Access, AccessInfo};
use crate::config::EngineConfig;
use crate::ir::{NodeId, NodeKind, NodeTag};
use crate::schedule::Schedule;
use crate::types::{ArgumentCategory, LoopType, Message};
use std::collections::BTreeSet;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Independent,
    Conflict { names: Vec<String> },
    Unanalyzable { node: NodeId },
}

impl Dependency {
    pub fn is_independent(&self) -> bool {
        matches!(self, Dependency::Independent)
    }
}

/// Decides whether two statements of the same scope touch a common entity
/// in a way that pins their relative order. Read-read pairs never conflict,
/// and neither do two `reduce_sum` updates of the same variable.
pub fn dependency_between(schedule: &Schedule, first: NodeId, second: NodeId) -> Dependency {
    let lhs = AccessInfo::collect(schedule, first);
    let rhs = AccessInfo::collect(schedule, second);
    if let Some(node) = lhs.unanalyzable().first().or(rhs.unanalyzable().first()) {
        trace!(%first, %second, code_block = %node, "dependency unanalyzable");
        return Dependency::Unanalyzable { node: *node };
    }

    let mut names = Vec::new();
    for name in lhs.names().intersection(&rhs.names()) {
        let clash = lhs
            .of(name)
            .any(|a| rhs.of(name).any(|b| accesses_conflict(a, b)));
        if clash {
            names.push((*name).to_string());
        }
    }

    if names.is_empty() {
        Dependency::Independent
    } else {
        trace!(%first, %second, ?names, "dependency conflict");
        Dependency::Conflict { names }
    }
}

fn accesses_conflict(a: &Access, b: &Access) -> bool {
    if a.mode.is_reduction() && b.mode.is_reduction() {
        return false;
    }
    a.mode.is_write() || b.mode.is_write()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopAnalysis {
    pub parallelisable: bool,
    pub unanalyzable: bool,
    pub messages: Vec<Message>,
}

impl LoopAnalysis {
    fn refused(message: Message) -> Self {
        Self {
            parallelisable: false,
            unanalyzable: false,
            messages: vec![message],
        }
    }

    pub fn summary(&self) -> String {
        self.messages
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyTools {
    loop_types_to_parallelise: Vec<LoopType>,
    only_nested_loops: bool,
}

impl DependencyTools {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            loop_types_to_parallelise: config.loop_types_to_parallelise.clone(),
            only_nested_loops: config.only_nested_loops,
        }
    }

    /// Checks that the iterations of `id` may run concurrently. Entities are
    /// compared by name only: two differently named arguments are assumed
    /// never to alias.
    pub fn can_loop_be_parallelised(&self, schedule: &Schedule, id: NodeId) -> LoopAnalysis {
        let Some(NodeKind::Loop(lp)) = schedule.kind(id) else {
            return LoopAnalysis::refused(Message::warning(format!("{id} is not a loop.")));
        };

        if !self.loop_types_to_parallelise.is_empty()
            && !self.loop_types_to_parallelise.contains(&lp.loop_type)
        {
            return LoopAnalysis::refused(Message::info(format!(
                "Loop has wrong loop type '{}'.",
                lp.loop_type
            )));
        }

        if self.only_nested_loops && schedule.descendants(id, Some(NodeTag::Loop)).next().is_none()
        {
            return LoopAnalysis::refused(Message::info("Not a nested loop."));
        }

        let info = AccessInfo::collect(schedule, id);
        if !info.is_analyzable() {
            let messages = info
                .unanalyzable()
                .iter()
                .map(|node| Message::warning(format!("Code block {node} cannot be analysed.")))
                .collect();
            return LoopAnalysis {
                parallelisable: false,
                unanalyzable: true,
                messages,
            };
        }

        let escaping = reads_outside(schedule, &[id]);
        let mut messages = Vec::new();
        for name in info.names() {
            if info.loop_variables().contains(name)
                || info.local_vars().contains(name)
                || info.is_read_only(name)
            {
                continue;
            }
            let category = info
                .first(name)
                .map(|a| a.category)
                .unwrap_or(ArgumentCategory::Field);
            let problem = if category.is_data() {
                data_problem(&info, name)
            } else {
                scalar_problem(&info, name, &escaping)
            };
            if let Some(message) = problem {
                trace!(loop_id = %id, variable = name, "loop-carried dependency");
                messages.push(message);
            }
        }

        LoopAnalysis {
            parallelisable: messages.is_empty(),
            unanalyzable: false,
            messages,
        }
    }
}

/// A written field is safe only when a single call touches it; any other
/// statement of the body may read a neighbouring iteration's value.
fn data_problem(info: &AccessInfo, name: &str) -> Option<Message> {
    let writers: BTreeSet<NodeId> = info
        .of(name)
        .filter(|a| a.mode.is_write())
        .map(|a| a.call)
        .collect();
    let other = info
        .of(name)
        .find(|a| !writers.contains(&a.call) || writers.len() > 1)?;
    let writer = writers.iter().find(|w| **w != other.call).or(writers.first())?;
    Some(Message::warning(format!(
        "Variable '{name}' is written by call {writer} and accessed by call {} in the same loop.",
        other.call
    )))
}

fn scalar_problem(info: &AccessInfo, name: &str, escaping: &BTreeSet<String>) -> Option<Message> {
    let accesses: Vec<&Access> = info.of(name).collect();
    let reductions = accesses.iter().filter(|a| a.mode.is_reduction()).count();
    if reductions == accesses.len() {
        return None;
    }
    if reductions > 0 {
        return Some(Message::warning(format!(
            "Variable '{name}' is both reduced and accessed directly."
        )));
    }
    if accesses.first().is_some_and(|a| a.mode.is_read()) {
        return Some(Message::warning(format!(
            "Variable '{name}' is read first, which indicates a reduction."
        )));
    }
    if escaping.contains(name) {
        return Some(Message::warning(format!(
            "Scalar variable '{name}' is written in the loop and read after it."
        )));
    }
    None
}
