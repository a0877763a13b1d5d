//! Validation pipeline
//!
//! One run is a fixed sequence of [`Stage`]s over one input document:
//! parse, grammar check, the four collaborator batches, merge, navigation
//! enrichment and report assembly. Stages never reorder, a stage without
//! input is skipped, and a failing collaborator is recorded without
//! stopping the run. Only unrecoverable input aborts before any stage.

pub mod context;
pub mod stage;

pub use context::RunContext;
pub use stage::{Stage, StageRecord, StageStatus};

use crate::bundle::ResolutionPolicy;
use crate::config::ValidatorConfig;
use crate::diagnostics::aggregator::{self, ErrorAggregator};
use crate::diagnostics::{IssueProvider, Severity, Source, UnifiedError};
use crate::error::parse_input;
use crate::grammar::GrammarValidator;
use crate::parser::PathCache;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Cooperative cancellation flag, checked between stages
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Input of one run: the document and the collaborator batches that apply
#[derive(Clone, Default)]
pub struct ValidationRequest {
    /// Raw document text
    pub input: String,
    /// Third-party structural validator
    pub external: Option<Arc<dyn IssueProvider>>,
    /// Business-rule evaluator
    pub rules: Option<Arc<dyn IssueProvider>>,
    /// Terminology checker
    pub terminology: Option<Arc<dyn IssueProvider>>,
    /// Reference checker
    pub references: Option<Arc<dyn IssueProvider>>,
    /// Policy for this run, overriding the configured one
    pub policy: Option<ResolutionPolicy>,
}

impl fmt::Debug for ValidationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |p: &Option<Arc<dyn IssueProvider>>| p.as_ref().map(|p| p.name().to_string());
        f.debug_struct("ValidationRequest")
            .field("input_len", &self.input.len())
            .field("external", &name(&self.external))
            .field("rules", &name(&self.rules))
            .field("terminology", &name(&self.terminology))
            .field("references", &name(&self.references))
            .field("policy", &self.policy)
            .finish()
    }
}

impl ValidationRequest {
    /// Request for a raw document
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Attach the structural validator batch
    pub fn with_external(mut self, provider: Arc<dyn IssueProvider>) -> Self {
        self.external = Some(provider);
        self
    }

    /// Attach the business-rule batch
    pub fn with_rules(mut self, provider: Arc<dyn IssueProvider>) -> Self {
        self.rules = Some(provider);
        self
    }

    /// Attach the terminology batch
    pub fn with_terminology(mut self, provider: Arc<dyn IssueProvider>) -> Self {
        self.terminology = Some(provider);
        self
    }

    /// Attach the reference batch
    pub fn with_references(mut self, provider: Arc<dyn IssueProvider>) -> Self {
        self.references = Some(provider);
        self
    }

    /// Choose the resolution policy for this run
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    fn provider(&self, stage: Stage) -> Option<&Arc<dyn IssueProvider>> {
        match stage {
            Stage::ExternalStructuralValidate => self.external.as_ref(),
            Stage::BusinessRuleEvaluate => self.rules.as_ref(),
            Stage::TerminologyValidate => self.terminology.as_ref(),
            Stage::ReferenceValidate => self.references.as_ref(),
            _ => None,
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Every stage reached
    Completed,
    /// Stopped by unrecoverable input or cancellation
    Aborted,
}

/// The single error reported for unrecoverable input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalError {
    /// Machine readable code
    pub error_code: String,
    /// Human readable message
    pub message: String,
}

/// Error counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Total errors
    pub total: usize,
    /// Errors per source
    pub by_source: BTreeMap<Source, usize>,
    /// Errors per severity
    pub by_severity: BTreeMap<Severity, usize>,
}

impl Summary {
    /// Count a list of errors
    pub fn of(errors: &[UnifiedError]) -> Self {
        let mut summary = Summary {
            total: errors.len(),
            ..Summary::default()
        };
        for error in errors {
            *summary.by_source.entry(error.source).or_default() += 1;
            *summary.by_severity.entry(error.severity).or_default() += 1;
        }
        summary
    }

    /// Number of error-severity entries
    pub fn blocking(&self) -> usize {
        self.by_severity.get(&Severity::Error).copied().unwrap_or(0)
    }
}

/// Result of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Terminal state
    pub status: RunStatus,
    /// Present only for unrecoverable input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_error: Option<TerminalError>,
    /// Merged errors in stage order
    pub errors: Vec<UnifiedError>,
    /// Counts by source and severity
    pub summary: Summary,
    /// What each stage did
    pub stages: Vec<StageRecord>,
}

impl ValidationReport {
    /// True when the run completed without error-severity findings
    pub fn is_valid(&self) -> bool {
        self.status == RunStatus::Completed && self.summary.blocking() == 0
    }

    /// Record for one stage, if it was reached
    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

/// Entry point: owns the configuration, grammar tables and path cache
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
    grammar: GrammarValidator,
    paths: Arc<PathCache>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl Validator {
    /// Create a validator
    pub fn new(config: ValidatorConfig) -> Self {
        let grammar = GrammarValidator::new(&config.grammar);
        let paths = Arc::new(PathCache::new(config.path_cache_capacity));
        Self {
            config,
            grammar,
            paths,
        }
    }

    /// The configuration
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Compiled-path cache shared by this validator's runs
    pub fn path_cache(&self) -> &Arc<PathCache> {
        &self.paths
    }

    /// Build a run context for a raw document, e.g. for ad hoc navigation
    pub fn context(&self, input: &str, policy: Option<ResolutionPolicy>) -> crate::Result<RunContext> {
        let tree = parse_input(input)?;
        Ok(RunContext::new(
            tree,
            policy.unwrap_or(self.config.resolution_policy),
            Arc::clone(&self.paths),
        ))
    }

    /// Run the pipeline
    pub fn validate(&self, request: &ValidationRequest) -> ValidationReport {
        self.validate_with_cancel(request, &CancellationToken::new())
    }

    /// Run the pipeline, checking `token` between stages
    pub fn validate_with_cancel(
        &self,
        request: &ValidationRequest,
        token: &CancellationToken,
    ) -> ValidationReport {
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        log::debug!("stage {}", Stage::ParseInput);
        let policy = request.policy.unwrap_or(self.config.resolution_policy);
        let ctx = match parse_input(&request.input) {
            Ok(tree) => RunContext::new(tree, policy, Arc::clone(&self.paths)),
            Err(err) => {
                log::warn!("aborting run: {err}");
                stages.push(StageRecord::failed(Stage::ParseInput, err.to_string()));
                return ValidationReport {
                    status: RunStatus::Aborted,
                    terminal_error: Some(TerminalError {
                        error_code: err.code().to_string(),
                        message: err.to_string(),
                    }),
                    errors: Vec::new(),
                    summary: Summary::default(),
                    stages,
                };
            }
        };
        stages.push(StageRecord::ran(Stage::ParseInput, 0));

        let mut aggregator = ErrorAggregator::new();
        let mut merged = None;
        let mut enriched = None;
        let mut status = RunStatus::Completed;

        for stage in Stage::ALL.into_iter().skip(1) {
            if token.is_cancelled() {
                log::warn!("run cancelled before {stage}");
                status = RunStatus::Aborted;
                break;
            }
            log::debug!("stage {stage}");
            let record = match stage {
                Stage::StructureCheck => {
                    let errors = self.grammar.validate(ctx.tree());
                    let count = errors.len();
                    aggregator.extend(errors);
                    StageRecord::ran(stage, count)
                }
                Stage::ExternalStructuralValidate
                | Stage::BusinessRuleEvaluate
                | Stage::TerminologyValidate
                | Stage::ReferenceValidate => {
                    Self::collect(stage, request.provider(stage), &ctx, &mut aggregator)
                }
                Stage::Aggregate => {
                    let errors = std::mem::take(&mut aggregator).merged();
                    let count = errors.len();
                    merged = Some(errors);
                    StageRecord::ran(stage, count)
                }
                Stage::NavigationEnrich => match merged.take() {
                    Some(errors) if self.config.enrich_navigation => {
                        let unified = aggregator::enrich(errors, &ctx);
                        let count = unified.len();
                        enriched = Some(unified);
                        StageRecord::ran(stage, count)
                    }
                    errors => {
                        merged = errors;
                        StageRecord::skipped(stage)
                    }
                },
                Stage::AssembleResponse | Stage::ParseInput => StageRecord::ran(stage, 0),
            };
            stages.push(record);
        }

        // A cancelled run still reports whatever was gathered
        let errors = match (enriched, merged) {
            (Some(unified), _) => unified,
            (None, Some(errors)) => errors.into_iter().map(UnifiedError::unresolved).collect(),
            (None, None) => aggregator
                .merged()
                .into_iter()
                .map(UnifiedError::unresolved)
                .collect(),
        };
        let summary = Summary::of(&errors);
        if let Some(record) = stages.iter_mut().find(|r| r.stage == Stage::AssembleResponse) {
            record.error_count = errors.len();
        }
        log::info!(
            "run {:?}: {} error(s), {} blocking",
            status,
            summary.total,
            summary.blocking()
        );

        ValidationReport {
            status,
            terminal_error: None,
            errors,
            summary,
            stages,
        }
    }

    /// Validate independent documents on worker threads, keeping request order
    ///
    /// Uses one worker per available core.
    pub fn validate_all(&self, requests: &[ValidationRequest]) -> Vec<ValidationReport> {
        let workers = std::thread::available_parallelism().map_or(1, usize::from);
        self.validate_all_with_workers(requests, workers)
    }

    /// Validate independent documents on at most `workers` threads
    ///
    /// Workers pull the next request from a shared cursor. A request whose
    /// run panics gets an aborted report; the other requests are unaffected.
    pub fn validate_all_with_workers(
        &self,
        requests: &[ValidationRequest],
        workers: usize,
    ) -> Vec<ValidationReport> {
        let workers = workers.clamp(1, requests.len().max(1));
        let cursor = &AtomicUsize::new(0);
        log::debug!("validating {} request(s) on {workers} worker(s)", requests.len());

        let mut slots: Vec<Option<ValidationReport>> = vec![None; requests.len()];
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let i = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(request) = requests.get(i) else { break };
                            let report = panic::catch_unwind(AssertUnwindSafe(|| self.validate(request)))
                                .unwrap_or_else(|_| Self::worker_panicked());
                            done.push((i, report));
                        }
                        done
                    })
                })
                .collect();
            for handle in handles {
                // Runs are unwound per request, so a worker itself does not panic
                if let Ok(done) = handle.join() {
                    for (i, report) in done {
                        slots[i] = Some(report);
                    }
                }
            }
        });

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(Self::worker_panicked))
            .collect()
    }

    fn worker_panicked() -> ValidationReport {
        log::warn!("validation worker panicked");
        ValidationReport {
            status: RunStatus::Aborted,
            terminal_error: Some(TerminalError {
                error_code: "WORKER_PANICKED".to_string(),
                message: "validation worker panicked".to_string(),
            }),
            errors: Vec::new(),
            summary: Summary::default(),
            stages: Vec::new(),
        }
    }

    fn collect(
        stage: Stage,
        provider: Option<&Arc<dyn IssueProvider>>,
        ctx: &RunContext,
        aggregator: &mut ErrorAggregator,
    ) -> StageRecord {
        let (Some(provider), Some(source)) = (provider, stage.source()) else {
            return StageRecord::skipped(stage);
        };
        match provider.issues(ctx.tree()) {
            Ok(issues) => {
                let count = issues.len();
                aggregator.extend(issues.into_iter().map(|issue| issue.into_error(source)));
                StageRecord::ran(stage, count)
            }
            Err(err) => {
                log::warn!("{stage} failed in {}: {err}", provider.name());
                StageRecord::failed(stage, err.to_string())
            }
        }
    }
}
