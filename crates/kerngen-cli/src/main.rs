use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kerngen_core::{
    build_invokes, explore_candidates, Candidate, CandidateOutcome, CandidateStatus,
    EngineConfig, Error as EngineError, ExploreReport, IrEvent, NodeId, NodeSnapshot,
    RefusalKind, Schedule, TransformOptions, TransformationCatalog, TransformationError,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kerngen")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, value_enum, default_value = "json", global = true)]
    format: OutputFormat,

    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Engine configuration (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the diagnostic view of every invoke.
    View { ir: PathBuf },
    /// Apply a transformation script in order.
    Transform(TransformArgs),
    /// Try candidate transformations on independent copies.
    Explore(ExploreArgs),
    /// List registered transformations and their options.
    Catalog,
}

#[derive(Args)]
struct TransformArgs {
    ir: PathBuf,

    #[arg(long)]
    script: PathBuf,

    /// Continue with later steps after a refusal.
    #[arg(long)]
    keep_going: bool,
}

#[derive(Args)]
struct ExploreArgs {
    ir: PathBuf,

    #[arg(long)]
    candidates: PathBuf,

    #[arg(long, default_value_t = 1)]
    workers: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

impl OutputFormat {
    fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
enum Status {
    Pass,
    Refused,
    Error,
}

impl Status {
    fn exit_code(self) -> i32 {
        match self {
            Status::Pass => 0,
            Status::Refused => 1,
            Status::Error => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Refused => "refused",
            Status::Error => "error",
        }
    }
}

/// One entry of a transformation script or candidate list.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Step {
    transformation: String,
    #[serde(default)]
    label: Option<String>,
    /// Restricts the step to one invoke; every invoke otherwise.
    #[serde(default)]
    invoke: Option<String>,
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    options: TransformOptions,
}

impl Step {
    fn selects(&self, schedule: &Schedule) -> bool {
        self.invoke
            .as_deref()
            .map_or(true, |name| name == schedule.invoke())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum StepStatus {
    Applied,
    Refused,
    Error,
}

#[derive(Serialize)]
struct StepResult {
    step: usize,
    transformation: String,
    targets: Vec<String>,
    status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    refusal: Option<TransformationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct InvokeReport {
    invoke: String,
    status: Status,
    steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<NodeSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

#[derive(Serialize)]
struct ExploreEntry {
    invoke: String,
    #[serde(flatten)]
    report: Option<ExploreReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

#[derive(Serialize)]
struct CatalogEntry {
    name: &'static str,
    options: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorInfo {
    kind: String,
    message: String,
}

impl ErrorInfo {
    fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl From<EngineError> for ErrorInfo {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MalformedInput { message } => Self::new("malformed_input", message),
            EngineError::StructuralViolation { message } => {
                Self::new("structural_violation", message)
            }
            other => Self::new("invalid_input", other.to_string()),
        }
    }
}

/// One invoke of the input, in stream order. A malformed invoke keeps its
/// slot so that it is reported next to the invokes that did build.
struct LoadedInvoke {
    name: String,
    schedule: Result<Schedule, ErrorInfo>,
}

struct LoadedIr {
    invokes: Vec<LoadedInvoke>,
    /// Events that belong to no invoke.
    stray: Option<ErrorInfo>,
}

impl LoadedIr {
    fn names(&self) -> impl Iterator<Item = &str> {
        self.invokes.iter().map(|invoke| invoke.name.as_str())
    }

    fn status(&self) -> Status {
        if self.stray.is_some() || self.invokes.iter().any(|invoke| invoke.schedule.is_err()) {
            Status::Error
        } else {
            Status::Pass
        }
    }
}

#[derive(Serialize)]
struct ResultJson {
    schema_version: String,
    tool: ToolInfo,
    invocation: Invocation,
    inputs: Vec<InputInfo>,
    status: Status,
    exit_code: i32,
    started_at: String,
    finished_at: String,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invokes: Option<Vec<InvokeReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<ExploreEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformations: Option<Vec<CatalogEntry>>,
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    version: String,
    git_sha: String,
}

#[derive(Serialize)]
struct Invocation {
    command: String,
    args: Vec<String>,
    format: String,
    config: Option<String>,
}

#[derive(Serialize)]
struct InputInfo {
    path: String,
    sha256: String,
}

/// Everything a command produced, before timing and tool metadata.
struct Outcome {
    command: &'static str,
    args: Vec<String>,
    inputs: Vec<InputInfo>,
    status: Status,
    error: Option<ErrorInfo>,
    invokes: Option<Vec<InvokeReport>>,
    candidates: Option<Vec<ExploreEntry>>,
    transformations: Option<Vec<CatalogEntry>>,
}

impl Outcome {
    fn new(command: &'static str, paths: &[&Path]) -> Self {
        Self {
            command,
            args: paths
                .iter()
                .map(|path| path.to_string_lossy().to_string())
                .collect(),
            inputs: build_inputs(paths),
            status: Status::Pass,
            error: None,
            invokes: None,
            candidates: None,
            transformations: None,
        }
    }

    /// Records per-invoke reports; events outside of any invoke fail the run.
    fn with_invokes(mut self, reports: Vec<InvokeReport>, stray: Option<ErrorInfo>) -> Self {
        self.status = reports
            .iter()
            .map(|report| report.status)
            .max()
            .unwrap_or(Status::Pass);
        self.invokes = Some(reports);
        match stray {
            Some(error) => self.fail(error),
            None => self,
        }
    }

    fn fail(mut self, error: ErrorInfo) -> Self {
        warn!(kind = %error.kind, message = %error.message, "input rejected");
        self.status = Status::Error;
        self.error = Some(error);
        self
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tool error: {err:#}");
            2
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kerngen=debug,kerngen_core=debug"
    } else {
        "kerngen=info,kerngen_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let started_at = Utc::now();
    let timer = Instant::now();

    let config = load_config(cli.config.as_deref())?;
    let catalog = TransformationCatalog::with_defaults(&config);
    let outcome = execute(&cli, &catalog)?;

    let finished_at = Utc::now();
    let duration_ms = timer.elapsed().as_millis() as u64;
    let exit_code = outcome.status.exit_code();
    info!(
        command = outcome.command,
        status = outcome.status.label(),
        duration_ms,
        "finished"
    );

    let result = ResultJson {
        schema_version: "0.1".to_string(),
        tool: ToolInfo {
            name: "kerngen".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: std::env::var("KERNGEN_GIT_SHA").unwrap_or_else(|_| "UNKNOWN".to_string()),
        },
        invocation: Invocation {
            command: outcome.command.to_string(),
            args: outcome.args,
            format: cli.format.as_str().to_string(),
            config: cli
                .config
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        },
        inputs: outcome.inputs,
        status: outcome.status,
        exit_code,
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        finished_at: finished_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        duration_ms,
        error: outcome.error,
        invokes: outcome.invokes,
        candidates: outcome.candidates,
        transformations: outcome.transformations,
    };

    match cli.format {
        OutputFormat::Json => emit_json(&result, cli.output.as_deref()),
        OutputFormat::Text => emit_text(&result, cli.output.as_deref()),
    }?;

    Ok(exit_code)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("parse config {}", path.display()))?;
    debug!(?config, "engine config loaded");
    Ok(config)
}

fn execute(cli: &Cli, catalog: &TransformationCatalog) -> Result<Outcome> {
    let outcome = match &cli.command {
        Command::View { ir } => {
            let outcome = Outcome::new("view", &[ir.as_path()]);
            match load_schedules(ir) {
                Ok(loaded) => {
                    let reports = loaded
                        .invokes
                        .iter()
                        .map(|invoke| invoke_report(invoke, Vec::new(), Status::Pass))
                        .collect();
                    outcome.with_invokes(reports, loaded.stray)
                }
                Err(error) => outcome.fail(error),
            }
        }
        Command::Transform(args) => {
            let outcome = Outcome::new("transform", &[args.ir.as_path(), args.script.as_path()]);
            let loaded = load_schedules(&args.ir).and_then(|loaded| {
                let steps = load_steps(&args.script, &loaded)?;
                Ok((loaded, steps))
            });
            match loaded {
                Ok((mut loaded, steps)) => {
                    let reports = run_script(catalog, &mut loaded.invokes, &steps, args.keep_going);
                    outcome.with_invokes(reports, loaded.stray)
                }
                Err(error) => outcome.fail(error),
            }
        }
        Command::Explore(args) => {
            let outcome = Outcome::new("explore", &[args.ir.as_path(), args.candidates.as_path()]);
            let loaded = load_schedules(&args.ir).and_then(|loaded| {
                let steps = load_steps(&args.candidates, &loaded)?;
                Ok((loaded, steps))
            });
            match loaded {
                Ok((loaded, steps)) => {
                    let mut outcome = outcome;
                    outcome.status = loaded.status();
                    let mut entries = Vec::with_capacity(loaded.invokes.len());
                    for invoke in &loaded.invokes {
                        let entry = match &invoke.schedule {
                            Ok(schedule) => explore_invoke(catalog, schedule, &steps, args.workers)?,
                            Err(error) => ExploreEntry {
                                invoke: invoke.name.clone(),
                                report: None,
                                error: Some(error.clone()),
                            },
                        };
                        entries.push(entry);
                    }
                    outcome.candidates = Some(entries);
                    match loaded.stray {
                        Some(error) => outcome.fail(error),
                        None => outcome,
                    }
                }
                Err(error) => outcome.fail(error),
            }
        }
        Command::Catalog => {
            let mut outcome = Outcome::new("catalog", &[]);
            outcome.transformations = Some(
                catalog
                    .names()
                    .into_iter()
                    .map(|name| CatalogEntry {
                        name,
                        options: catalog
                            .recognised_options(name)
                            .map(|options| options.to_vec())
                            .unwrap_or_default(),
                    })
                    .collect(),
            );
            outcome
        }
    };
    Ok(outcome)
}

/// Fails only when the file cannot be read or parsed; a malformed invoke is
/// carried in its slot.
fn load_schedules(path: &Path) -> Result<LoadedIr, ErrorInfo> {
    let text = fs::read_to_string(path)
        .map_err(|err| ErrorInfo::new("invalid_input", format!("{}: {err}", path.display())))?;
    let events: Vec<IrEvent> = serde_json::from_str(&text)
        .map_err(|err| ErrorInfo::new("invalid_input", format!("{}: {err}", path.display())))?;

    let mut loaded = LoadedIr {
        invokes: Vec::new(),
        stray: None,
    };
    for build in build_invokes(events) {
        match (build.invoke, build.result) {
            (Some(name), result) => loaded.invokes.push(LoadedInvoke {
                name,
                schedule: result.map_err(ErrorInfo::from),
            }),
            (None, Err(err)) => {
                let error = ErrorInfo::from(err);
                warn!(kind = %error.kind, message = %error.message, "event outside of any invoke");
                loaded.stray.get_or_insert(error);
            }
            (None, Ok(_)) => {}
        }
    }
    let failed = loaded
        .invokes
        .iter()
        .filter(|invoke| invoke.schedule.is_err())
        .count();
    info!(
        path = %path.display(),
        invokes = loaded.invokes.len(),
        failed,
        "ir loaded"
    );
    Ok(loaded)
}

fn load_steps(path: &Path, loaded: &LoadedIr) -> Result<Vec<Step>, ErrorInfo> {
    let text = fs::read_to_string(path)
        .map_err(|err| ErrorInfo::new("invalid_input", format!("{}: {err}", path.display())))?;
    let steps: Vec<Step> = serde_json::from_str(&text)
        .map_err(|err| ErrorInfo::new("invalid_input", format!("{}: {err}", path.display())))?;
    for (index, step) in steps.iter().enumerate() {
        if let Some(name) = &step.invoke {
            if !loaded.names().any(|known| known == name) {
                return Err(ErrorInfo::new(
                    "invalid_input",
                    format!("step {index} names unknown invoke '{name}'"),
                ));
            }
        }
    }
    Ok(steps)
}

fn resolve_targets(schedule: &Schedule, paths: &[String]) -> Result<Vec<NodeId>, String> {
    paths
        .iter()
        .map(|path| {
            schedule.resolve(path).ok_or_else(|| {
                format!(
                    "path '{path}' does not name a node of invoke '{}'",
                    schedule.invoke()
                )
            })
        })
        .collect()
}

/// Applies steps in order. A structural error ends the pipeline of that
/// invoke only; a refusal ends the whole script unless `keep_going`.
/// Invokes that failed to build take no steps.
fn run_script(
    catalog: &TransformationCatalog,
    invokes: &mut [LoadedInvoke],
    steps: &[Step],
    keep_going: bool,
) -> Vec<InvokeReport> {
    let mut results: Vec<Vec<StepResult>> = invokes.iter().map(|_| Vec::new()).collect();
    let mut statuses = vec![Status::Pass; invokes.len()];

    for (index, step) in steps.iter().enumerate() {
        let mut refused = false;
        for (slot, invoke) in invokes.iter_mut().enumerate() {
            let Ok(schedule) = invoke.schedule.as_mut() else {
                continue;
            };
            if !step.selects(schedule) || statuses[slot] == Status::Error {
                continue;
            }
            let result = apply_step(catalog, schedule, index, step);
            match result.status {
                StepStatus::Applied => {}
                StepStatus::Refused => {
                    refused = true;
                    statuses[slot] = statuses[slot].max(Status::Refused);
                }
                StepStatus::Error => statuses[slot] = Status::Error,
            }
            results[slot].push(result);
        }
        if refused && !keep_going {
            info!(step = index, "stopping after refusal");
            break;
        }
    }

    invokes
        .iter()
        .zip(results)
        .zip(statuses)
        .map(|((invoke, steps), status)| invoke_report(invoke, steps, status))
        .collect()
}

fn apply_step(
    catalog: &TransformationCatalog,
    schedule: &mut Schedule,
    index: usize,
    step: &Step,
) -> StepResult {
    let mut result = StepResult {
        step: index,
        transformation: step.transformation.clone(),
        targets: step.targets.clone(),
        status: StepStatus::Applied,
        refusal: None,
        error: None,
    };
    let targets = match resolve_targets(schedule, &step.targets) {
        Ok(targets) => targets,
        Err(message) => {
            result.status = StepStatus::Refused;
            result.refusal = Some(TransformationError::new(
                &step.transformation,
                RefusalKind::InvalidTarget,
                message,
            ));
            return result;
        }
    };

    match catalog.apply(&step.transformation, schedule, &targets, &step.options) {
        Ok(()) => {
            debug!(step = index, invoke = schedule.invoke(), "step applied");
        }
        Err(EngineError::Transformation(refusal)) => {
            info!(step = index, invoke = schedule.invoke(), reason = %refusal, "step refused");
            result.status = StepStatus::Refused;
            result.refusal = Some(refusal);
        }
        Err(err) => {
            warn!(step = index, invoke = schedule.invoke(), error = %err, "invoke aborted");
            result.status = StepStatus::Error;
            result.error = Some(err.to_string());
        }
    }
    result
}

fn explore_invoke(
    catalog: &TransformationCatalog,
    schedule: &Schedule,
    steps: &[Step],
    workers: usize,
) -> Result<ExploreEntry> {
    let mut candidates = Vec::new();
    let mut unresolved: Vec<(usize, CandidateOutcome)> = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        if !step.selects(schedule) {
            continue;
        }
        let slot = candidates.len() + unresolved.len();
        let label = step
            .label
            .clone()
            .unwrap_or_else(|| format!("{index}:{}", step.transformation));
        match resolve_targets(schedule, &step.targets) {
            Ok(targets) => candidates.push(Candidate {
                label,
                transformation: step.transformation.clone(),
                targets,
                options: step.options.clone(),
            }),
            Err(message) => unresolved.push((
                slot,
                CandidateOutcome {
                    label,
                    transformation: step.transformation.clone(),
                    status: CandidateStatus::Refused,
                    refusal: Some(TransformationError::new(
                        &step.transformation,
                        RefusalKind::InvalidTarget,
                        message,
                    )),
                    error: None,
                    statements: None,
                    fingerprint: None,
                    duplicate_of: None,
                },
            )),
        }
    }

    let mut report = explore_candidates(schedule, catalog, &candidates, workers)
        .with_context(|| format!("explore invoke '{}'", schedule.invoke()))?;
    for (slot, outcome) in unresolved {
        report.outcomes.insert(slot, outcome);
    }
    Ok(ExploreEntry {
        invoke: schedule.invoke().to_string(),
        report: Some(report),
        error: None,
    })
}

fn invoke_report(invoke: &LoadedInvoke, steps: Vec<StepResult>, status: Status) -> InvokeReport {
    match &invoke.schedule {
        Ok(schedule) => InvokeReport {
            invoke: invoke.name.clone(),
            status,
            steps,
            view: Some(schedule.view().to_string()),
            snapshot: Some(schedule.snapshot()),
            error: None,
        },
        Err(error) => InvokeReport {
            invoke: invoke.name.clone(),
            status: Status::Error,
            steps,
            view: None,
            snapshot: None,
            error: Some(error.clone()),
        },
    }
}

fn build_inputs(paths: &[&Path]) -> Vec<InputInfo> {
    paths
        .iter()
        .map(|path| InputInfo {
            path: path.to_string_lossy().to_string(),
            sha256: compute_sha256(path).unwrap_or_else(|_| "UNKNOWN".to_string()),
        })
        .collect()
}

fn compute_sha256(path: &Path) -> Result<String> {
    let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn emit_json(result: &ResultJson, output: Option<&Path>) -> Result<()> {
    let payload = serde_json::to_string_pretty(result).context("serialize result json")?;
    if let Some(path) = output {
        write_atomic(path, payload.as_bytes())?;
        return Ok(());
    }

    println!("{payload}");
    Ok(())
}

fn emit_text(result: &ResultJson, output: Option<&Path>) -> Result<()> {
    let mut text = String::new();
    if let Some(error) = &result.error {
        writeln!(text, "error: {}: {}", error.kind, error.message)?;
    }
    for invoke in result.invokes.iter().flatten() {
        writeln!(text, "invoke {} ({})", invoke.invoke, invoke.status.label())?;
        for step in &invoke.steps {
            let detail = match (&step.refusal, &step.error) {
                (Some(refusal), _) => format!("refused [{}] {}", refusal.kind, refusal.message),
                (None, Some(error)) => format!("error {error}"),
                (None, None) => "applied".to_string(),
            };
            writeln!(
                text,
                "  step {} {} [{}]: {detail}",
                step.step,
                step.transformation,
                step.targets.join(", ")
            )?;
        }
        if let Some(error) = &invoke.error {
            writeln!(text, "  error: {}: {}", error.kind, error.message)?;
        }
        if let Some(view) = &invoke.view {
            text.push_str(view);
        }
    }
    for entry in result.candidates.iter().flatten() {
        let Some(report) = &entry.report else {
            if let Some(error) = &entry.error {
                writeln!(text, "invoke {}: error: {}: {}", entry.invoke, error.kind, error.message)?;
            }
            continue;
        };
        writeln!(
            text,
            "invoke {}: {} applied, {} distinct",
            entry.invoke, report.applied, report.distinct
        )?;
        for outcome in &report.outcomes {
            let detail = match (&outcome.refusal, &outcome.error, &outcome.duplicate_of) {
                (Some(refusal), _, _) => format!("refused [{}]", refusal.kind),
                (None, Some(error), _) => format!("error {error}"),
                (None, None, Some(first)) => format!("duplicate of {first}"),
                (None, None, None) => format!(
                    "applied statements={}",
                    outcome.statements.unwrap_or_default()
                ),
            };
            writeln!(text, "  {}: {detail}", outcome.label)?;
        }
    }
    for entry in result.transformations.iter().flatten() {
        writeln!(text, "{} options=[{}]", entry.name, entry.options.join(", "))?;
    }
    write!(
        text,
        "status={} exit_code={}",
        result.status.label(),
        result.exit_code
    )?;

    if let Some(path) = output {
        write_atomic(path, text.as_bytes())?;
        return Ok(());
    }
    println!("{text}");
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("rename {}", path.display()))?;
    Ok(())
}
