//! Indented text rendering of a schedule, one node per line.

use crate::ir::{Clauses, NodeId, NodeKind};
use crate::schedule::Schedule;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter, Write};

const INDENT: &str = "    ";

/// Renders `start` and its subtree. Deterministic for a given tree.
pub struct View<'a> {
    schedule: &'a Schedule,
    start: NodeId,
}

impl<'a> View<'a> {
    pub fn new(schedule: &'a Schedule, start: NodeId) -> Self {
        Self { schedule, start }
    }
}

impl Display for View<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut stack = vec![(self.start, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(kind) = self.schedule.kind(id) else {
                continue;
            };
            for _ in 0..depth {
                f.write_str(INDENT)?;
            }
            write_node(f, kind)?;
            f.write_char('\n')?;
            for child in self.schedule.children(id).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        Ok(())
    }
}

impl Schedule {
    pub fn view(&self) -> View<'_> {
        View::new(self, self.root())
    }
}

pub fn render(schedule: &Schedule, start: NodeId) -> String {
    View::new(schedule, start).to_string()
}

fn write_node(f: &mut Formatter<'_>, kind: &NodeKind) -> fmt::Result {
    match kind {
        NodeKind::Schedule(root) => write!(f, "Schedule[invoke='{}']", root.invoke),
        NodeKind::Loop(lp) => {
            write!(
                f,
                "Loop[type='{}', variable='{}', start='{}', stop='{}', step='{}'",
                lp.loop_type, lp.variable, lp.bounds.start, lp.bounds.stop, lp.bounds.step
            )?;
            if !lp.reductions.is_empty() {
                write!(f, ", reductions={}", list(&lp.reductions))?;
            }
            f.write_char(']')
        }
        NodeKind::KernelCall(call) => {
            let args = call
                .arguments()
                .iter()
                .map(|arg| format!("{}:{}", arg.name, arg.access))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "KernelCall[name='{}', args=[{args}]]", call.name())
        }
        NodeKind::Directive(directive) => {
            write!(f, "Directive[kind='{}'", directive.kind)?;
            write_clauses(f, &directive.clauses)?;
            f.write_char(']')
        }
        NodeKind::CodeBlock(block) => {
            // One node per line.
            let fragment = block.fragment.trim().replace('\r', "").replace('\n', "\\n");
            write!(f, "CodeBlock[fragment='{fragment}']")
        }
    }
}

fn write_clauses(f: &mut Formatter<'_>, clauses: &Clauses) -> fmt::Result {
    if let Some(schedule) = clauses.schedule {
        write!(f, ", schedule='{schedule}'")?;
    }
    let sets = [
        ("private", &clauses.private),
        ("shared_read", &clauses.shared.read),
        ("shared_write", &clauses.shared.write),
        ("shared_read_write", &clauses.shared.read_write),
        ("reduction", &clauses.reduction),
        ("copy_in", &clauses.copy_in),
        ("copy_out", &clauses.copy_out),
    ];
    for (label, names) in sets {
        if !names.is_empty() {
            write!(f, ", {label}={}", list(names))?;
        }
    }
    if clauses.default_present {
        f.write_str(", default_present")?;
    }
    Ok(())
}

fn list(names: &BTreeSet<String>) -> String {
    format!("[{}]", names.iter().cloned().collect::<Vec<_>>().join(", "))
}
