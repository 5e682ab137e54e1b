pub mod access;
pub mod builder;
pub mod catalog;
pub mod clauses;
pub mod config;
pub mod dependency;
pub mod error;
pub mod explore;
pub mod ir;
pub mod navigate;
pub mod schedule;
pub mod snapshot;
pub mod transform;
pub mod transform_fuse;
pub mod transform_move;
pub mod transform_offload;
pub mod transform_parallel;
pub mod transform_tile;
pub mod types;
pub mod view;

pub use access::{Access, AccessInfo};
pub use builder::{build_invokes, build_schedules, InvokeBuild, IrEvent, ScheduleBuilder};
pub use catalog::TransformationCatalog;
pub use clauses::{compute_clauses, ClauseSettings};
pub use config::EngineConfig;
pub use dependency::{dependency_between, Dependency, DependencyTools, LoopAnalysis};
pub use error::{Error, RefusalKind, Result, TransformationError};
pub use explore::{
    explore_candidates, explore_sequential, Candidate, CandidateOutcome, CandidateStatus,
    ExploreReport,
};
pub use ir::{
    Clauses, CodeBlock, Directive, KernelCall, Loop, NodeId, NodeKind, NodeTag, ScheduleRoot,
    SharedClause,
};
pub use navigate::{format_path, Walk};
pub use schedule::Schedule;
pub use snapshot::{fingerprint, NodeSnapshot};
pub use transform::{MovePosition, TransformOptions, Transformation};
pub use transform_fuse::FuseTrans;
pub use transform_move::MoveTrans;
pub use transform_offload::OffloadRegionTrans;
pub use transform_parallel::ParallelizeTrans;
pub use transform_tile::TileTrans;
pub use types::{
    AccessMode, Argument, ArgumentCategory, Bounds, DirectiveKind, LoopType, Message,
    ScheduleKind, Severity,
};
pub use view::{render, View};
