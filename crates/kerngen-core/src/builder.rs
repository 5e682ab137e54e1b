//! Schedule construction from a front-end event stream.
//!
//! The front end reports one `begin_schedule` per invoke, then statements in
//! program order. `add_loop` opens a loop scope that the next `end_scope`
//! closes; an `end_scope` with no open loop closes the schedule itself.

use crate::access::AccessInfo;
use crate::error::{Error, Result};
use crate::ir::{CodeBlock, KernelCall, Loop, NodeId, NodeKind};
use crate::schedule::Schedule;
use crate::types::{Argument, Bounds, LoopType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IrEvent {
    BeginSchedule {
        name: String,
    },
    AddLoop {
        loop_type: LoopType,
        variable: String,
        bounds: Bounds,
    },
    AddKernelCall {
        name: String,
        arguments: Vec<Argument>,
        #[serde(default)]
        local_vars: Vec<String>,
    },
    AddCodeBlock {
        fragment: String,
    },
    EndScope,
}

impl IrEvent {
    fn label(&self) -> &'static str {
        match self {
            IrEvent::BeginSchedule { .. } => "begin_schedule",
            IrEvent::AddLoop { .. } => "add_loop",
            IrEvent::AddKernelCall { .. } => "add_kernel_call",
            IrEvent::AddCodeBlock { .. } => "add_code_block",
            IrEvent::EndScope => "end_scope",
        }
    }
}

#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    finished: Vec<Schedule>,
    names: BTreeSet<String>,
    current: Option<Schedule>,
    open_loops: Vec<NodeId>,
    consumed: usize,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: IrEvent) -> Result<()> {
        self.consumed += 1;
        let label = event.label();
        debug!(event = label, index = self.consumed, "ir event");
        match event {
            IrEvent::BeginSchedule { name } => self.begin(name),
            IrEvent::AddLoop {
                loop_type,
                variable,
                bounds,
            } => {
                if variable.trim().is_empty() {
                    return Err(self.malformed("add_loop needs a loop variable"));
                }
                let id = self.add(label, NodeKind::Loop(Loop::new(loop_type, variable, bounds)))?;
                self.open_loops.push(id);
                Ok(())
            }
            IrEvent::AddKernelCall {
                name,
                arguments,
                local_vars,
            } => {
                if name.trim().is_empty() {
                    return Err(self.malformed("add_kernel_call needs a kernel name"));
                }
                let call = KernelCall::new(name, arguments).with_local_vars(local_vars);
                self.add(label, NodeKind::KernelCall(call)).map(|_| ())
            }
            IrEvent::AddCodeBlock { fragment } => self
                .add(label, NodeKind::CodeBlock(CodeBlock { fragment }))
                .map(|_| ()),
            IrEvent::EndScope => self.end_scope(),
        }
    }

    /// Returns every completed schedule, failing if one is still open.
    pub fn finish(self) -> Result<Vec<Schedule>> {
        if let Some(open) = &self.current {
            return Err(Error::malformed(format!(
                "schedule '{}' is not terminated by end_scope",
                open.invoke()
            )));
        }
        Ok(self.finished)
    }

    fn begin(&mut self, name: String) -> Result<()> {
        if let Some(open) = &self.current {
            return Err(self.malformed(format!(
                "begin_schedule '{name}' while '{}' is still open",
                open.invoke()
            )));
        }
        if name.trim().is_empty() {
            return Err(self.malformed("schedule name is empty"));
        }
        if !self.names.insert(name.clone()) {
            return Err(self.malformed(format!("duplicate schedule name '{name}'")));
        }
        self.current = Some(Schedule::new(name));
        Ok(())
    }

    fn add(&mut self, label: &str, kind: NodeKind) -> Result<NodeId> {
        let consumed = self.consumed;
        let scope = self.open_loops.last().copied();
        let Some(schedule) = self.current.as_mut() else {
            return Err(Error::malformed(format!(
                "event {consumed}: {label} outside of a schedule"
            )));
        };
        let parent = scope.unwrap_or_else(|| schedule.root());
        let id = schedule.create(kind)?;
        schedule.push_child(parent, id)?;
        Ok(id)
    }

    fn end_scope(&mut self) -> Result<()> {
        let consumed = self.consumed;
        let Some(schedule) = self.current.as_mut() else {
            return Err(Error::malformed(format!(
                "event {consumed}: end_scope without an open schedule"
            )));
        };

        if let Some(lp) = self.open_loops.pop() {
            if schedule.children(lp).is_empty() {
                return Err(Error::malformed(format!(
                    "event {consumed}: loop {lp} closed with an empty body"
                )));
            }
            // Reductions are initialised once, ahead of the outermost loop.
            if self.open_loops.is_empty() {
                let reductions = AccessInfo::collect(schedule, lp).reductions();
                if let Some(NodeKind::Loop(node)) = schedule.kind_mut(lp) {
                    node.reductions = reductions;
                }
            }
            return Ok(());
        }

        if let Some(schedule) = self.current.take() {
            schedule.verify()?;
            info!(
                invoke = schedule.invoke(),
                nodes = schedule.node_count(),
                "schedule built"
            );
            self.finished.push(schedule);
        }
        Ok(())
    }

    /// Drops the open invoke and returns how many scopes it still had open,
    /// the schedule itself included.
    fn abandon(&mut self) -> usize {
        let depth = self.open_loops.len() + usize::from(self.current.is_some());
        self.open_loops.clear();
        self.current = None;
        depth
    }

    fn malformed(&self, message: impl std::fmt::Display) -> Error {
        Error::malformed(format!("event {}: {message}", self.consumed))
    }
}

/// Result of building one invoke. `invoke` is `None` for events that
/// occur outside of any schedule.
#[derive(Debug)]
pub struct InvokeBuild {
    pub invoke: Option<String>,
    pub result: Result<Schedule>,
}

impl InvokeBuild {
    fn failed(invoke: Option<String>, error: Error) -> Self {
        Self {
            invoke,
            result: Err(error),
        }
    }
}

/// Builds every invoke of the stream independently. A malformed invoke is
/// reported and its remaining events are skipped up to its closing
/// `end_scope`; the invokes around it are still built.
pub fn build_invokes<I>(events: I) -> Vec<InvokeBuild>
where
    I: IntoIterator<Item = IrEvent>,
{
    let mut builder = ScheduleBuilder::new();
    let mut builds = Vec::new();
    // Scopes of an abandoned invoke that are still to be closed.
    let mut skip = 0usize;

    for event in events {
        if skip > 0 {
            match event {
                IrEvent::BeginSchedule { .. } => skip = 0,
                IrEvent::AddLoop { .. } => {
                    skip += 1;
                    continue;
                }
                IrEvent::EndScope => {
                    skip -= 1;
                    continue;
                }
                _ => continue,
            }
        }

        let open = builder.current.as_ref().map(|s| s.invoke().to_string());
        let begin_name = match &event {
            IrEvent::BeginSchedule { name } => Some(name.clone()),
            _ => None,
        };
        let opens_loop = matches!(event, IrEvent::AddLoop { .. });

        match builder.apply(event) {
            Ok(()) => {}
            Err(error) => {
                let depth = builder.abandon();
                warn!(invoke = ?open.as_deref().or(begin_name.as_deref()), %error, "invoke abandoned");
                match (begin_name, open) {
                    // The open invoke was never terminated; the new one starts.
                    (Some(name), Some(open)) => {
                        builds.push(InvokeBuild::failed(Some(open), error));
                        if let Err(error) = builder.begin(name.clone()) {
                            builds.push(InvokeBuild::failed(Some(name), error));
                            skip = 1;
                        }
                    }
                    (Some(name), None) => {
                        builds.push(InvokeBuild::failed(Some(name), error));
                        skip = 1;
                    }
                    (None, open) => {
                        if open.is_some() {
                            skip = depth + usize::from(opens_loop);
                        }
                        builds.push(InvokeBuild::failed(open, error));
                    }
                }
            }
        }
        builds.extend(builder.finished.drain(..).map(|schedule| InvokeBuild {
            invoke: Some(schedule.invoke().to_string()),
            result: Ok(schedule),
        }));
    }

    let open = builder.current.as_ref().map(|s| s.invoke().to_string());
    if let Err(error) = builder.finish() {
        builds.push(InvokeBuild::failed(open, error));
    }
    builds
}

/// Builds one schedule per `begin_schedule` in the stream, failing on the
/// first malformed invoke.
pub fn build_schedules<I>(events: I) -> Result<Vec<Schedule>>
where
    I: IntoIterator<Item = IrEvent>,
{
    build_invokes(events)
        .into_iter()
        .map(|build| build.result)
        .collect()
}
