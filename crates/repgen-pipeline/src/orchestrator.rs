//! Report pipeline state machine.
//!
//! `GOAL → METADATA(×N) → REQUIREMENT → GAP → COMPLETION? → PLAN → DESIGN →
//! GENERATE → VALIDATE → DONE`. Each state is gated on the previous one
//! succeeding; VALIDATE is advisory and never fails the run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use repgen_core::config::RunnableConfig;
use repgen_core::error::{PipelineError, ReportError, Result};
use repgen_core::runnable::Runnable;
use repgen_core::tool::Tool;
use repgen_llm::TextGenerator;
use repgen_llm::generator::DEFAULT_MAX_TOOL_ROUNDS;

use crate::catalog::ComponentCatalog;
use crate::clock::Clock;
use crate::document::{ComponentKind, DraftDocument, ReportDocument};
use crate::fallback::{FallbackAssembler, FallbackStyle, extract_title};
use crate::records::{
    CompletionResult, DataGap, Goal, ReportSection, Requirement, SectionPlan, SourceMetadata,
    ValidationVerdict,
};
use crate::stage::{StageId, StageInput, StageRunner, StageTask};

pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Goal,
    Metadata,
    Requirement,
    Gap,
    Completion,
    Plan,
    Design,
    Generate,
    Validate,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Goal => "GOAL",
            RunState::Metadata => "METADATA",
            RunState::Requirement => "REQUIREMENT",
            RunState::Gap => "GAP",
            RunState::Completion => "COMPLETION",
            RunState::Plan => "PLAN",
            RunState::Design => "DESIGN",
            RunState::Generate => "GENERATE",
            RunState::Validate => "VALIDATE",
            RunState::Done => "DONE",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the advisory validation state.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Passed,
    /// Negative verdict, including locally detected structural issues.
    Failed(ValidationVerdict),
    /// The validation stage itself failed; the document is returned anyway
    /// with whatever structural issues were found locally.
    Unavailable {
        reason: String,
        structural_issues: Vec<String>,
    },
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub document: ReportDocument,
    pub goal: Goal,
    pub metadata: Vec<SourceMetadata>,
    pub requirement: Requirement,
    pub gap: DataGap,
    /// Present only when a gap was found. Not fed back into planning.
    pub completion: Option<CompletionResult>,
    pub plan: Vec<ReportSection>,
    pub design: Vec<ReportSection>,
    pub validation: ValidationOutcome,
    pub states: Vec<RunState>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Upper bound for each generation call. `None` waits indefinitely.
    pub stage_timeout: Option<Duration>,
    /// Tool-call rounds allowed per stage when the generator is chat based.
    pub max_tool_rounds: usize,
    pub fallback_style: FallbackStyle,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Some(DEFAULT_STAGE_TIMEOUT),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            fallback_style: FallbackStyle::default(),
        }
    }
}

/// Wrap a stage failure with the state it happened in.
fn in_state<T>(state: RunState, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        ReportError::Pipeline(PipelineError::Run {
            state: state.to_string(),
            source: Box::new(e),
        })
    })
}

pub struct ReportPipeline {
    runner: Arc<StageRunner>,
    clock: Arc<dyn Clock>,
    catalog: ComponentCatalog,
    fallback: FallbackAssembler,
    options: PipelineOptions,
}

impl ReportPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        tools: Vec<Arc<dyn Tool>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runner: Arc::new(StageRunner::new(generator, tools)),
            fallback: FallbackAssembler::new(clock.clone()),
            clock,
            catalog: ComponentCatalog::standard(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn fallback(&self) -> &FallbackAssembler {
        &self.fallback
    }

    /// Run every state in order. Any failure before VALIDATE aborts the run.
    pub async fn run(
        &self,
        request: &str,
        paths: &[String],
        config: &RunnableConfig,
    ) -> Result<PipelineRun> {
        let config = match (config.timeout, self.options.stage_timeout) {
            (None, Some(limit)) => config.clone().with_timeout(limit),
            _ => config.clone(),
        };
        let run_id = config.run_id;
        tracing::info!(%run_id, tags = ?config.tags, paths = paths.len(), "pipeline run started");
        let mut states = Vec::new();
        let mut enter = |state: RunState| {
            tracing::info!(%run_id, %state, "entering state");
            states.push(state);
        };

        enter(RunState::Goal);
        let goal: Goal = in_state(
            RunState::Goal,
            self.runner
                .run_stage(StageId::Goal, StageInput::from(request), &config)
                .await,
        )?;

        enter(RunState::Metadata);
        let metadata_task = StageTask::<SourceMetadata>::new(self.runner.clone(), StageId::Metadata);
        let inputs = paths.iter().map(|p| StageInput::Text(p.clone())).collect();
        let metadata = in_state(RunState::Metadata, metadata_task.batch(inputs, &config).await)?;

        enter(RunState::Requirement);
        let requirement: Requirement = in_state(
            RunState::Requirement,
            self.runner
                .run_stage(StageId::Requirement, StageInput::from(request), &config)
                .await,
        )?;

        enter(RunState::Gap);
        let gap_payload = json!({
            "goal": goal,
            "csv_metadata": metadata,
            "requirements": requirement,
        });
        let gap: DataGap = in_state(
            RunState::Gap,
            self.runner
                .run_stage(StageId::Gap, gap_payload.into(), &config)
                .await,
        )?;

        let completion = if gap.has_gap() {
            enter(RunState::Completion);
            let payload = in_state(RunState::Completion, serde_json::to_value(&gap).map_err(Into::into))?;
            let result: CompletionResult = in_state(
                RunState::Completion,
                self.runner
                    .run_stage(StageId::Completion, payload.into(), &config)
                    .await,
            )?;
            tracing::info!(
                %run_id,
                missing_columns = gap.missing_columns.len(),
                missing_periods = gap.missing_periods.len(),
                "data gap recorded"
            );
            Some(result)
        } else {
            None
        };

        enter(RunState::Plan);
        let plan_payload = json!({
            "goal": goal,
            "requirements": requirement,
            "metadata": metadata,
        });
        let plan: SectionPlan = in_state(
            RunState::Plan,
            self.runner
                .run_stage(StageId::Planning, plan_payload.into(), &config)
                .await,
        )?;

        enter(RunState::Design);
        let design_payload = json!({ "sections": plan.sections });
        let mut design: SectionPlan = in_state(
            RunState::Design,
            self.runner
                .run_stage(StageId::Design, design_payload.into(), &config)
                .await,
        )?;
        for section in &mut design.sections {
            if section.component_type.is_none() {
                section.component_type = Some(ComponentKind::TextField.to_string());
            }
        }

        enter(RunState::Generate);
        let generate_payload = json!({
            "sections": design.sections,
            "s3_paths": paths,
        });
        let draft: DraftDocument = in_state(
            RunState::Generate,
            self.runner
                .run_stage(StageId::Generation, generate_payload.into(), &config)
                .await,
        )?;
        let document = draft.finalize(self.clock.as_ref(), &extract_title(request));

        enter(RunState::Validate);
        let validation = self.validate(&document, &config).await;

        enter(RunState::Done);
        tracing::info!(
            %run_id,
            report_id = %document.report_id,
            sections = document.sections.main.len(),
            validated = validation.passed(),
            "pipeline run complete"
        );

        Ok(PipelineRun {
            run_id,
            document,
            goal,
            metadata,
            requirement,
            gap,
            completion,
            plan: plan.sections,
            design: design.sections,
            validation,
            states,
        })
    }

    async fn validate(&self, document: &ReportDocument, config: &RunnableConfig) -> ValidationOutcome {
        let structural_issues = document.structural_issues(&self.catalog);
        let payload = match serde_json::to_value(document) {
            Ok(v) => v,
            Err(e) => {
                return ValidationOutcome::Unavailable {
                    reason: e.to_string(),
                    structural_issues,
                };
            }
        };

        let verdict = self
            .runner
            .run_stage::<ValidationVerdict>(StageId::Validation, payload.into(), config)
            .await;

        match verdict {
            Ok(verdict) => {
                let verdict = verdict.with_structural_issues(structural_issues);
                if verdict.passed() {
                    ValidationOutcome::Passed
                } else {
                    tracing::warn!(
                        run_id = %config.run_id,
                        issues = verdict.issues.len(),
                        "validation reported issues; returning document anyway"
                    );
                    ValidationOutcome::Failed(verdict)
                }
            }
            Err(e) => {
                tracing::warn!(
                    run_id = %config.run_id,
                    error = %e,
                    structural_issues = structural_issues.len(),
                    "validation unavailable"
                );
                ValidationOutcome::Unavailable {
                    reason: e.to_string(),
                    structural_issues,
                }
            }
        }
    }

    /// Run the pipeline; on failure return the configured fallback document.
    pub async fn run_or_fallback(
        &self,
        request: &str,
        paths: &[String],
        config: &RunnableConfig,
    ) -> ReportDocument {
        match self.run(request, paths, config).await {
            Ok(run) => run.document,
            Err(e) => {
                tracing::warn!(
                    run_id = %config.run_id,
                    error = %e,
                    style = ?self.options.fallback_style,
                    "pipeline failed, using fallback document"
                );
                self.fallback
                    .build(self.options.fallback_style, request, paths)
            }
        }
    }
}
