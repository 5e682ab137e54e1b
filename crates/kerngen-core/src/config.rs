use crate::types::{LoopType, ScheduleKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Empty means every loop type may be parallelised.
    pub loop_types_to_parallelise: Vec<LoopType>,
    pub only_nested_loops: bool,
    pub default_schedule_kind: ScheduleKind,
}
