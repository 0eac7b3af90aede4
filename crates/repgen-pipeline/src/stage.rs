//! Stage definitions and the single-stage runner.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use repgen_core::config::RunnableConfig;
use repgen_core::error::{ModelError, PipelineError, ReportError, Result};
use repgen_core::runnable::Runnable;
use repgen_core::tool::Tool;
use repgen_llm::TextGenerator;

use crate::coerce::{Coercible, RawOutput, coerce};
use crate::tools::{ANALYZE_JSON_DATA, CALCULATE_KPI, READ_S3_DATA, VALIDATE_S3_PATH};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Goal,
    Metadata,
    Requirement,
    Gap,
    Completion,
    Planning,
    Design,
    Generation,
    Validation,
}

impl StageId {
    pub const ALL: [StageId; 9] = [
        StageId::Goal,
        StageId::Metadata,
        StageId::Requirement,
        StageId::Gap,
        StageId::Completion,
        StageId::Planning,
        StageId::Design,
        StageId::Generation,
        StageId::Validation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageId::Goal => "goal",
            StageId::Metadata => "metadata",
            StageId::Requirement => "requirement",
            StageId::Gap => "gap",
            StageId::Completion => "completion",
            StageId::Planning => "planning",
            StageId::Design => "design",
            StageId::Generation => "generation",
            StageId::Validation => "validation",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StageId::Goal => "Goal Analyzer",
            StageId::Metadata => "Data Metadata Analyzer",
            StageId::Requirement => "Requirement Analyzer",
            StageId::Gap => "Data Gap Analyzer",
            StageId::Completion => "Data Completer",
            StageId::Planning => "Report Planner",
            StageId::Design => "Component Designer",
            StageId::Generation => "JSON Generator",
            StageId::Validation => "Validator",
        }
    }

    /// Names of the tools this stage may call.
    pub fn tool_names(&self) -> &'static [&'static str] {
        match self {
            StageId::Metadata => &[READ_S3_DATA, ANALYZE_JSON_DATA],
            StageId::Generation => &[VALIDATE_S3_PATH],
            StageId::Planning => &[CALCULATE_KPI, READ_S3_DATA],
            _ => &[],
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            StageId::Goal => GOAL_INSTRUCTIONS,
            StageId::Metadata => METADATA_INSTRUCTIONS,
            StageId::Requirement => REQUIREMENT_INSTRUCTIONS,
            StageId::Gap => GAP_INSTRUCTIONS,
            StageId::Completion => COMPLETION_INSTRUCTIONS,
            StageId::Planning => PLANNING_INSTRUCTIONS,
            StageId::Design => DESIGN_INSTRUCTIONS,
            StageId::Generation => GENERATION_INSTRUCTIONS,
            StageId::Validation => VALIDATION_INSTRUCTIONS,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const GOAL_INSTRUCTIONS: &str = r#"Extract the purpose and the period of the report request.
Answer with a single JSON object with the fields "goal" and "period".
If the request names no period, use "unspecified".

Input example: "Analyse the sales data for Q1 2024"
Output example: {"goal": "Sales data analysis", "period": "2024 Q1"}"#;

const METADATA_INSTRUCTIONS: &str = r#"You receive the S3 path of one data file.
Use read_s3_data to load a preview of the file and analyze_json_data to inspect its columns.
Answer with a single JSON object describing the file:
- "id": a stable identifier (the file name is fine)
- "columns": the column names in file order, without duplicates
- "period": the date range covered by the data
- "row_count": the total number of rows

Output example:
{"id": "daily-sales.json", "columns": ["date", "sales", "profit"], "period": "2024-01-01 to 2024-01-31", "row_count": 31}"#;

const REQUIREMENT_INSTRUCTIONS: &str = r#"Decide which metrics, which granularity and which period the report needs.
Answer with a single JSON object with "metrics" (list of metric names), "granularity" and "period".
Consider the usual business metrics and KPIs for the request.

Output example:
{"metrics": ["total sales", "sales by product", "growth rate"], "granularity": "daily", "period": "2024-01-01 to 2024-03-31"}"#;

const GAP_INSTRUCTIONS: &str = r#"Compare the requirements with the available data files.
The input holds "goal", "csv_metadata" (one entry per data file) and "requirements".
Check that every required metric is present, that the granularity matches and that the period is covered.
Answer with a single JSON object:
- "missing_columns": metrics with no matching column (empty list if none)
- "missing_periods": periods not covered by the data (empty list if none)
- "granularity_mismatch": a short note, or null

Output example:
{"missing_columns": ["growth rate"], "missing_periods": ["2024-03"], "granularity_mismatch": null}"#;

const COMPLETION_INSTRUCTIONS: &str = r#"The input lists data that is missing for the report.
For each gap, suggest where the data could be found or ask for an additional upload.
Answer with a JSON object with "web_data_found" and "additional_uploads_needed", both mapping the gap to a note.

Output example:
{"web_data_found": {"growth rate": "https://example.com/growth.csv"}, "additional_uploads_needed": {"2024-03": "Upload the March 2024 sales data"}}"#;

const PLANNING_INSTRUCTIONS: &str = r#"Plan the sections of the report.
The input holds "goal", "requirements" and "metadata" of the data files.
Start with a summary, group related metrics, move from overview to detail and end with actionable findings.
You may call calculate_kpi on data loaded with read_s3_data to ground the summary.
Answer with a JSON array of sections, each with "title", "subsections" (list of {"title", "content"}),
and optionally "component_type" and "props".

Output example:
[{"title": "Executive summary", "subsections": [{"title": "Key findings", "content": "Overview of the main insights"}], "component_type": "Card", "props": {"title": "Sales this month"}}]"#;

const DESIGN_INSTRUCTIONS: &str = r#"Choose a display component for every section.
Allowed component types:
- DataTable: detailed rows from a data file
- BarChart: category comparison; props "xField" and "yFields" are required
- Card: a single KPI; prop "title" is required
- TextField: plain text
- MarkdownField: formatted text
Answer with a JSON object {"sections": [...]} repeating every input section with "component_type" and "props" set.

Output example:
{"sections": [{"title": "Sales by category", "subsections": [], "component_type": "BarChart", "props": {"xField": "category", "yFields": ["sales", "profit"]}}]}"#;

const GENERATION_INSTRUCTIONS: &str = r#"Produce the final report layout document.
The input holds the designed "sections" and the available "s3_paths".
Use validate_s3_path before referencing a data file.
Answer with a single JSON object of this shape:
{
  "title": "<report title>",
  "sections": {
    "header": [{"id": "section_header_1", "type": "Default", "component": "MainHeader",
                "contents": [{"source": "TEXT", "component": "MainHeader", "value": "<title>", "props": {}}]}],
    "main": [{"id": "section_main_1", "type": "Default", "component": "<DataTable|BarChart|Card|TextField|MarkdownField>",
              "title": "...", "description": "...",
              "contents": [{"source": "<TEXT|S3>", "component": "<same as section>", "value": "<text or s3:// path>", "props": {}}]}]
  }
}
Header components are MainHeader or SubHeader. Contents with source S3 carry an s3:// path as value."#;

const VALIDATION_INSTRUCTIONS: &str = r#"Validate the report layout document.
Check the JSON structure, the required fields, the consistency of data types, the component props and the section structure.
Answer with a single JSON object {"is_valid": <bool>, "issues": [...], "suggestions": [...]}.

Output example:
{"is_valid": false, "issues": [{"section": "Sales by category", "problem": "BarChart is missing 'yFields'"}], "suggestions": ["Add a summary card at the top"]}"#;

/// Payload of one stage call, serialised to a single message.
#[derive(Debug, Clone)]
pub enum StageInput {
    Text(String),
    Json(Value),
}

impl StageInput {
    pub fn into_message(self) -> Result<String> {
        match self {
            StageInput::Text(text) => Ok(text),
            StageInput::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

impl From<&str> for StageInput {
    fn from(text: &str) -> Self {
        StageInput::Text(text.to_string())
    }
}

impl From<Value> for StageInput {
    fn from(value: Value) -> Self {
        StageInput::Json(value)
    }
}

/// Runs one stage: one generation call, one coercion. No retries.
pub struct StageRunner {
    generator: Arc<dyn TextGenerator>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl StageRunner {
    pub fn new(generator: Arc<dyn TextGenerator>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let tools = tools.into_iter().map(|t| (t.definition().name, t)).collect();
        Self { generator, tools }
    }

    fn tools_for(&self, stage: StageId) -> Vec<Arc<dyn Tool>> {
        stage
            .tool_names()
            .iter()
            .filter_map(|name| self.tools.get(*name).cloned())
            .collect()
    }

    pub async fn run_stage<T: Coercible>(
        &self,
        stage: StageId,
        input: StageInput,
        config: &RunnableConfig,
    ) -> Result<T> {
        let message = input.into_message()?;
        let tools = self.tools_for(stage);
        tracing::debug!(
            run_id = %config.run_id,
            stage = stage.name(),
            input_len = message.len(),
            tools = tools.len(),
            "running stage"
        );

        let call = self
            .generator
            .generate(stage.instructions(), &tools, &message);
        let raw = match config.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ReportError::Model(ModelError::Timeout { limit }))??,
            None => call.await?,
        };

        if raw.trim().is_empty() {
            return Err(ReportError::Pipeline(PipelineError::EmptyOutput {
                stage: stage.name().to_string(),
            }));
        }

        tracing::debug!(run_id = %config.run_id, stage = stage.name(), output_len = raw.len(), "stage answered");
        coerce(stage.name(), RawOutput::Text(raw))
    }
}

/// A stage bound to its output record, usable wherever a [`Runnable`] is.
pub struct StageTask<T> {
    runner: Arc<StageRunner>,
    stage: StageId,
    _output: PhantomData<fn() -> T>,
}

impl<T> StageTask<T> {
    pub fn new(runner: Arc<StageRunner>, stage: StageId) -> Self {
        Self {
            runner,
            stage,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Runnable for StageTask<T>
where
    T: Coercible + Send + 'static,
{
    type Input = StageInput;
    type Output = T;

    async fn invoke(&self, input: StageInput, config: &RunnableConfig) -> Result<T> {
        self.runner.run_stage(self.stage, input, config).await
    }
}
