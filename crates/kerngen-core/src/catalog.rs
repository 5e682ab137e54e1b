use crate::config::EngineConfig;
use crate::error::{RefusalKind, Result, TransformationError};
use crate::ir::NodeId;
use crate::schedule::Schedule;
use crate::transform::{TransformOptions, Transformation};
use crate::transform_fuse::FuseTrans;
use crate::transform_move::MoveTrans;
use crate::transform_offload::OffloadRegionTrans;
use crate::transform_parallel::ParallelizeTrans;
use crate::transform_tile::TileTrans;
use std::collections::BTreeMap;
use tracing::debug;

/// Transformations registered under stable names.
#[derive(Default)]
pub struct TransformationCatalog {
    entries: BTreeMap<&'static str, Box<dyn Transformation>>,
}

impl TransformationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(config: &EngineConfig) -> Self {
        let mut catalog = Self::new();
        catalog.register(Box::new(FuseTrans));
        catalog.register(Box::new(ParallelizeTrans::new(config)));
        catalog.register(Box::new(OffloadRegionTrans::kernels()));
        catalog.register(Box::new(OffloadRegionTrans::data()));
        catalog.register(Box::new(MoveTrans));
        catalog.register(Box::new(TileTrans));
        catalog
    }

    /// Replaces any transformation previously registered under that name.
    pub fn register(&mut self, transformation: Box<dyn Transformation>) {
        self.entries.insert(transformation.name(), transformation);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Transformation> {
        self.entries.get(name).map(|entry| entry.as_ref())
    }

    pub fn recognised_options(&self, name: &str) -> Option<&'static [&'static str]> {
        self.get(name).map(|entry| entry.recognised_options())
    }

    pub fn validate(
        &self,
        name: &str,
        schedule: &Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> std::result::Result<(), TransformationError> {
        let result = self.lookup(name)?.validate(schedule, targets, options);
        if let Err(err) = &result {
            debug!(transformation = name, kind = %err.kind, reason = %err.message, "refused");
        }
        result
    }

    /// Applies the named transformation and re-checks the structural
    /// invariants of the resulting tree.
    pub fn apply(
        &self,
        name: &str,
        schedule: &mut Schedule,
        targets: &[NodeId],
        options: &TransformOptions,
    ) -> Result<()> {
        let transformation = self.lookup(name)?;
        if let Err(err) = transformation.apply(schedule, targets, options) {
            debug!(transformation = name, error = %err, "apply failed");
            return Err(err);
        }
        schedule.verify()?;
        debug!(transformation = name, ?targets, "applied");
        Ok(())
    }

    fn lookup(&self, name: &str) -> std::result::Result<&dyn Transformation, TransformationError> {
        self.get(name).ok_or_else(|| {
            TransformationError::new(
                name,
                RefusalKind::UnknownTransformation,
                format!(
                    "no transformation named '{name}' (known: {})",
                    self.names().join(", ")
                ),
            )
        })
    }
}

impl std::fmt::Debug for TransformationCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationCatalog")
            .field("entries", &self.names())
            .finish()
    }
}
