//! Intermediate records threaded between pipeline stages.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::coerce::{Coercible, LabeledFields, ParseStrategy, RawTextCapture};
use crate::document::DraftDocument;

/// Treat an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept `1000` as well as `"1000"`.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s
            .trim()
            .replace(',', "")
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid row count '{s}'"))),
    }
}

/// Keep the first occurrence of each entry, drop blanks.
fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn require_text(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("field `{field}` is empty"))
    } else {
        Ok(())
    }
}

/// Extracted intent of a report request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub goal: String,
    pub period: String,
}

impl Coercible for Goal {
    fn normalize(self) -> std::result::Result<Self, String> {
        require_text("goal", &self.goal)?;
        require_text("period", &self.period)?;
        Ok(Self {
            goal: self.goal.trim().to_string(),
            period: self.period.trim().to_string(),
        })
    }
}

/// Shape of one input data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub id: String,
    pub columns: Vec<String>,
    pub period: String,
    #[serde(deserialize_with = "lenient_count")]
    pub row_count: u64,
}

impl Coercible for SourceMetadata {
    fn normalize(self) -> std::result::Result<Self, String> {
        require_text("id", &self.id)?;
        let mut seen: Vec<&str> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            if seen.contains(&column.as_str()) {
                return Err(format!("duplicate column `{column}`"));
            }
            seen.push(column);
        }
        Ok(self)
    }

    fn fallback_strategies() -> Vec<Box<dyn ParseStrategy>> {
        vec![Box::new(LabeledFields)]
    }
}

/// Metrics, granularity and period a report needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub metrics: Vec<String>,
    pub granularity: String,
    pub period: String,
}

impl Coercible for Requirement {
    fn normalize(mut self) -> std::result::Result<Self, String> {
        self.metrics = dedup_preserving_order(self.metrics);
        Ok(self)
    }
}

/// Shortfall between the requirement and the available data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataGap {
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_columns: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_periods: Vec<String>,
    #[serde(default)]
    pub granularity_mismatch: Option<String>,
}

impl DataGap {
    pub fn has_gap(&self) -> bool {
        !self.missing_columns.is_empty() || !self.missing_periods.is_empty()
    }
}

impl Coercible for DataGap {
    fn normalize(mut self) -> std::result::Result<Self, String> {
        self.missing_columns = dedup_preserving_order(self.missing_columns);
        self.missing_periods = dedup_preserving_order(self.missing_periods);
        self.granularity_mismatch = self.granularity_mismatch.filter(|s| !s.trim().is_empty());
        Ok(self)
    }
}

/// Output of the data completion stage. Recorded, never fed back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub web_data_found: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_uploads_needed: Map<String, Value>,
    #[serde(default)]
    pub raw_text: Option<String>,
}

impl Coercible for CompletionResult {
    fn fallback_strategies() -> Vec<Box<dyn ParseStrategy>> {
        vec![Box::new(RawTextCapture)]
    }
}

/// One planned layout block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subsections: Vec<Value>,
    #[serde(default)]
    pub component_type: Option<String>,
    #[serde(default)]
    pub props: Option<Map<String, Value>>,
}

/// Ordered list of sections; accepted bare or as `{"sections": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub sections: Vec<ReportSection>,
}

impl Coercible for SectionPlan {
    fn from_mapping(value: Value) -> std::result::Result<Self, String> {
        let value = match value {
            Value::Array(items) => serde_json::json!({ "sections": items }),
            other => other,
        };
        let plan: Self = serde_json::from_value(value).map_err(|e| e.to_string())?;
        plan.normalize()
    }

    fn normalize(self) -> std::result::Result<Self, String> {
        if self.sections.is_empty() {
            return Err("section list is empty".into());
        }
        for section in &self.sections {
            require_text("title", &section.title)?;
        }
        Ok(self)
    }
}

/// Advisory judgement of the validation stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    #[serde(default)]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub has_issues: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestions: Vec<Value>,
}

impl ValidationVerdict {
    /// Collapse the verdict to pass/fail. `is_valid` wins over `has_issues`.
    pub fn passed(&self) -> bool {
        match (self.is_valid, self.has_issues) {
            (Some(valid), _) => valid,
            (None, Some(has_issues)) => !has_issues,
            (None, None) => self.issues.is_empty(),
        }
    }

    /// Append locally detected issues; any issue makes the verdict negative.
    pub fn with_structural_issues(mut self, issues: Vec<String>) -> Self {
        if !issues.is_empty() {
            self.is_valid = Some(false);
            self.issues.extend(issues.into_iter().map(Value::String));
        }
        self
    }
}

impl Coercible for ValidationVerdict {
    fn normalize(self) -> std::result::Result<Self, String> {
        if self.is_valid.is_none() && self.has_issues.is_none() {
            return Err("verdict has neither `is_valid` nor `has_issues`".into());
        }
        Ok(self)
    }
}

impl Coercible for DraftDocument {
    fn from_mapping(value: Value) -> std::result::Result<Self, String> {
        let value = match value {
            Value::Object(mut map) if !map.contains_key("sections") && map.contains_key("report") => {
                map.remove("report").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}
