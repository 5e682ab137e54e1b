use crate::catalog::TransformationCatalog;
use crate::error::{Error, Result, TransformationError};
use crate::ir::NodeId;
use crate::schedule::Schedule;
use crate::snapshot::fingerprint;
use crate::transform::TransformOptions;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// One speculative transformation step.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub label: String,
    pub transformation: String,
    pub targets: Vec<NodeId>,
    pub options: TransformOptions,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Applied,
    Refused,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateOutcome {
    pub label: String,
    pub transformation: String,
    pub status: CandidateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<TransformationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Top-level statements of the schedule after the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Label of an earlier candidate that produced the same tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExploreReport {
    pub outcomes: Vec<CandidateOutcome>,
    pub applied: usize,
    pub distinct: usize,
}

/// Applies `candidate` to a private copy; the source schedule is untouched.
pub fn evaluate(
    schedule: &Schedule,
    catalog: &TransformationCatalog,
    candidate: &Candidate,
) -> CandidateOutcome {
    let mut copy = schedule.clone();
    let mut outcome = CandidateOutcome {
        label: candidate.label.clone(),
        transformation: candidate.transformation.clone(),
        status: CandidateStatus::Applied,
        refusal: None,
        error: None,
        statements: None,
        fingerprint: None,
        duplicate_of: None,
    };
    match catalog.apply(
        &candidate.transformation,
        &mut copy,
        &candidate.targets,
        &candidate.options,
    ) {
        Ok(()) => {
            outcome.statements = Some(copy.children(copy.root()).len());
            outcome.fingerprint = Some(fingerprint(&copy));
        }
        Err(Error::Transformation(refusal)) => {
            outcome.status = CandidateStatus::Refused;
            outcome.refusal = Some(refusal);
        }
        Err(err) => {
            outcome.status = CandidateStatus::Error;
            outcome.error = Some(err.to_string());
        }
    }
    outcome
}

pub fn explore_sequential(
    schedule: &Schedule,
    catalog: &TransformationCatalog,
    candidates: &[Candidate],
) -> ExploreReport {
    let outcomes = candidates
        .iter()
        .map(|candidate| evaluate(schedule, catalog, candidate))
        .collect();
    summarize(outcomes)
}

#[instrument(skip_all, fields(invoke = schedule.invoke(), candidates = candidates.len(), workers = workers))]
pub fn explore_candidates(
    schedule: &Schedule,
    catalog: &TransformationCatalog,
    candidates: &[Candidate],
    workers: usize,
) -> Result<ExploreReport> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|err| Error::Explorer {
            message: err.to_string(),
        })?;

    let outcomes = pool.install(|| {
        candidates
            .par_iter()
            .map(|candidate| evaluate(schedule, catalog, candidate))
            .collect::<Vec<_>>()
    });
    let report = summarize(outcomes);
    info!(
        applied = report.applied,
        distinct = report.distinct,
        "exploration finished"
    );
    Ok(report)
}

fn summarize(mut outcomes: Vec<CandidateOutcome>) -> ExploreReport {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    let mut applied = 0;
    for outcome in &mut outcomes {
        let Some(print) = &outcome.fingerprint else {
            continue;
        };
        applied += 1;
        match seen.get(print) {
            Some(first) => outcome.duplicate_of = Some(first.clone()),
            None => {
                seen.insert(print.clone(), outcome.label.clone());
            }
        }
    }
    ExploreReport {
        outcomes,
        applied,
        distinct: seen.len(),
    }
}
