use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    Outer,
    Inner,
    Levels,
    Lat,
    Lon,
    Colours,
    Colour,
    Dofs,
    Tile,
}

impl LoopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopType::Outer => "outer",
            LoopType::Inner => "inner",
            LoopType::Levels => "levels",
            LoopType::Lat => "lat",
            LoopType::Lon => "lon",
            LoopType::Colours => "colours",
            LoopType::Colour => "colour",
            LoopType::Dofs => "dofs",
            LoopType::Tile => "tile",
        }
    }
}

impl Display for LoopType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentCategory {
    Field,
    Scalar,
    Operator,
}

impl ArgumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgumentCategory::Field => "field",
            ArgumentCategory::Scalar => "scalar",
            ArgumentCategory::Operator => "operator",
        }
    }

    /// Fields and operators live in memory shared by every iteration.
    pub fn is_data(&self) -> bool {
        matches!(self, ArgumentCategory::Field | ArgumentCategory::Operator)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
    ReduceSum,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::ReadWrite => "read_write",
            AccessMode::ReduceSum => "reduce_sum",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            AccessMode::Write | AccessMode::ReadWrite | AccessMode::ReduceSum
        )
    }

    pub fn is_reduction(&self) -> bool {
        matches!(self, AccessMode::ReduceSum)
    }
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Argument {
    pub name: String,
    pub category: ArgumentCategory,
    pub access: AccessMode,
    #[serde(default)]
    pub function_space: String,
}

impl Argument {
    pub fn new(
        name: impl Into<String>,
        category: ArgumentCategory,
        access: AccessMode,
        function_space: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            access,
            function_space: function_space.into(),
        }
    }

    pub fn field(name: impl Into<String>, access: AccessMode, function_space: &str) -> Self {
        Self::new(name, ArgumentCategory::Field, access, function_space)
    }

    pub fn scalar(name: impl Into<String>, access: AccessMode) -> Self {
        Self::new(name, ArgumentCategory::Scalar, access, "")
    }

    pub fn operator(name: impl Into<String>, access: AccessMode, function_space: &str) -> Self {
        Self::new(name, ArgumentCategory::Operator, access, function_space)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub start: String,
    pub stop: String,
    #[serde(default = "default_step")]
    pub step: String,
}

fn default_step() -> String {
    "1".to_string()
}

impl Bounds {
    pub fn new(start: impl Into<String>, stop: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            stop: stop.into(),
            step: step.into(),
        }
    }

    /// Textual comparison, ignoring surrounding and embedded whitespace.
    pub fn same_as(&self, other: &Bounds) -> bool {
        fn norm(text: &str) -> String {
            text.chars().filter(|c| !c.is_whitespace()).collect()
        }
        norm(&self.start) == norm(&other.start)
            && norm(&self.stop) == norm(&other.stop)
            && norm(&self.step) == norm(&other.step)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Parallel,
    OffloadKernels,
    OffloadData,
}

impl DirectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::Parallel => "parallel",
            DirectiveKind::OffloadKernels => "offload_kernels",
            DirectiveKind::OffloadData => "offload_data",
        }
    }

    /// Whether a directive of kind `inner` may appear anywhere inside a
    /// directive of kind `self`.
    pub fn may_enclose(&self, inner: DirectiveKind) -> bool {
        match (self, inner) {
            (DirectiveKind::OffloadData, DirectiveKind::OffloadKernels) => true,
            (DirectiveKind::OffloadData, DirectiveKind::Parallel) => true,
            _ => false,
        }
    }
}

impl Display for DirectiveKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    #[default]
    Static,
    Dynamic,
    Guided,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Static => "static",
            ScheduleKind::Dynamic => "dynamic",
            ScheduleKind::Guided => "guided",
        }
    }
}

impl Display for ScheduleKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.severity {
            Severity::Info => write!(f, "Info: {}", self.text),
            Severity::Warning => write!(f, "Warning: {}", self.text),
        }
    }
}
