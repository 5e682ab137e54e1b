use crate::types::{Argument, Bounds, DirectiveKind, LoopType, ScheduleKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTag {
    Schedule,
    Loop,
    KernelCall,
    Directive,
    CodeBlock,
}

impl NodeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeTag::Schedule => "schedule",
            NodeTag::Loop => "loop",
            NodeTag::KernelCall => "kernel_call",
            NodeTag::Directive => "directive",
            NodeTag::CodeBlock => "code_block",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeKind {
    Schedule(ScheduleRoot),
    Loop(Loop),
    KernelCall(KernelCall),
    Directive(Directive),
    CodeBlock(CodeBlock),
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Schedule(_) => NodeTag::Schedule,
            NodeKind::Loop(_) => NodeTag::Loop,
            NodeKind::KernelCall(_) => NodeTag::KernelCall,
            NodeKind::Directive(_) => NodeTag::Directive,
            NodeKind::CodeBlock(_) => NodeTag::CodeBlock,
        }
    }

    /// Leaf kinds never own children.
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeKind::KernelCall(_) | NodeKind::CodeBlock(_))
    }

    pub fn as_loop(&self) -> Option<&Loop> {
        match self {
            NodeKind::Loop(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_kernel_call(&self) -> Option<&KernelCall> {
        match self {
            NodeKind::KernelCall(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_directive(&self) -> Option<&Directive> {
        match self {
            NodeKind::Directive(node) => Some(node),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScheduleRoot {
    pub invoke: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Loop {
    pub loop_type: LoopType,
    pub variable: String,
    pub bounds: Bounds,
    /// Reduction variables initialised once ahead of this loop.
    pub reductions: BTreeSet<String>,
}

impl Loop {
    pub fn new(loop_type: LoopType, variable: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            loop_type,
            variable: variable.into(),
            bounds,
            reductions: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KernelCall {
    name: String,
    arguments: Vec<Argument>,
    local_vars: Vec<String>,
}

impl KernelCall {
    pub fn new(name: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            name: name.into(),
            arguments,
            local_vars: Vec::new(),
        }
    }

    pub fn with_local_vars(mut self, local_vars: Vec<String>) -> Self {
        self.local_vars = local_vars;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn local_vars(&self) -> &[String] {
        &self.local_vars
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub clauses: Clauses,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SharedClause {
    pub read: BTreeSet<String>,
    pub write: BTreeSet<String>,
    pub read_write: BTreeSet<String>,
}

impl SharedClause {
    pub fn names(&self) -> BTreeSet<String> {
        self.read
            .iter()
            .chain(&self.write)
            .chain(&self.read_write)
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty() && self.read_write.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Clauses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleKind>,
    pub private: BTreeSet<String>,
    pub shared: SharedClause,
    pub reduction: BTreeSet<String>,
    pub copy_in: BTreeSet<String>,
    pub copy_out: BTreeSet<String>,
    pub default_present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CodeBlock {
    pub fragment: String,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) position: usize,
    pub(crate) children: Vec<NodeId>,
}
