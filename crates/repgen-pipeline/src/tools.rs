//! Data tools the generation backend may call while running a stage.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use repgen_core::error::{ReportError, Result, ToolError};
use repgen_core::tool::{Tool, ToolDefinition};

use crate::storage::{ObjectStore, S3Path};

pub const READ_S3_DATA: &str = "read_s3_data";
pub const VALIDATE_S3_PATH: &str = "validate_s3_path";
pub const ANALYZE_JSON_DATA: &str = "analyze_json_data";
pub const CALCULATE_KPI: &str = "calculate_kpi";

/// Rows inspected when deciding whether a column is numeric.
const NUMERIC_SAMPLE_ROWS: usize = 10;

/// All data tools, sharing one object store.
pub fn data_tools(store: Arc<dyn ObjectStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadObjectTool::new(store.clone())),
        Arc::new(ValidatePathTool::new(store)),
        Arc::new(AnalyzeDataTool),
        Arc::new(CalculateKpiTool),
    ]
}

fn invalid_input(msg: impl Into<String>) -> ReportError {
    ReportError::Tool(ToolError::InvalidInput(msg.into()))
}

fn required_str<'a>(input: &'a Value, field: &str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_input(format!("missing '{field}' string argument")))
}

/// Accept rows as an array, a JSON-encoded string, or a `read_s3_data` result.
fn rows_argument(input: &Value) -> Result<Vec<Value>> {
    let raw = input
        .get("json_data")
        .ok_or_else(|| invalid_input("missing 'json_data' argument"))?;

    let value = match raw {
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| invalid_input(format!("'json_data' is not valid JSON: {e}")))?,
        other => other.clone(),
    };

    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Ok(vec![Value::Object(map)]),
        },
        _ => Err(invalid_input("'json_data' must be an array of rows")),
    }
}

/// Parse CSV text with a header row into JSON objects with string values.
pub fn parse_csv(text: &str) -> Vec<Value> {
    let mut records = split_csv_records(text).into_iter();
    let Some(header) = records.next() else {
        return Vec::new();
    };

    records
        .filter(|fields| !(fields.len() == 1 && fields[0].is_empty()))
        .map(|fields| {
            let row: Map<String, Value> = header
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let cell = fields.get(i).cloned().unwrap_or_default();
                    (name.clone(), Value::String(cell))
                })
                .collect();
            Value::Object(row)
        })
        .collect()
}

fn split_csv_records(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut fields));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }
    records
}

/// `read_s3_data`: fetch a JSON or CSV object.
pub struct ReadObjectTool {
    store: Arc<dyn ObjectStore>,
}

impl ReadObjectTool {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReadObjectTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: READ_S3_DATA.into(),
            description: "Read a JSON or CSV data file from S3".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "s3_path": {"type": "string", "description": "s3://bucket/key of the file"},
                    "file_type": {"type": "string", "enum": ["json", "csv"]},
                    "preview_rows": {"type": "integer", "description": "Return only the first N rows"}
                },
                "required": ["s3_path"]
            }),
        }
    }

    async fn call(&self, input: Value) -> Result<String> {
        let path = S3Path::parse(required_str(&input, "s3_path")?)?;
        let file_type = input.get("file_type").and_then(Value::as_str).unwrap_or("json");
        let preview = input
            .get("preview_rows")
            .and_then(Value::as_u64)
            .map(|n| n as usize);

        let body = self.store.get_object(&path.bucket, &path.key).await?;
        let text = String::from_utf8_lossy(&body);

        let data = match file_type {
            "json" => {
                let value: Value = serde_json::from_str(&text).map_err(|e| {
                    ReportError::Tool(ToolError::ExecutionFailed(format!("{path}: {e}")))
                })?;
                match (value, preview) {
                    (Value::Array(rows), Some(n)) => Value::Array(rows.into_iter().take(n).collect()),
                    (other, _) => other,
                }
            }
            "csv" => {
                let rows = parse_csv(&text);
                let rows = match preview {
                    Some(n) => rows.into_iter().take(n).collect(),
                    None => rows,
                };
                Value::Array(rows)
            }
            other => return Err(invalid_input(format!("Unsupported file type: {other}"))),
        };

        tracing::debug!(path = %path, file_type, "read data file");
        Ok(json!({"status": "success", "data": data, "type": file_type}).to_string())
    }
}

/// `validate_s3_path`: report whether an object exists.
pub struct ValidatePathTool {
    store: Arc<dyn ObjectStore>,
}

impl ValidatePathTool {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ValidatePathTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: VALIDATE_S3_PATH.into(),
            description: "Check that an S3 path exists".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "s3_path": {"type": "string"}
                },
                "required": ["s3_path"]
            }),
        }
    }

    async fn call(&self, input: Value) -> Result<String> {
        let raw = required_str(&input, "s3_path")?;
        let exists = match S3Path::parse(raw) {
            Ok(path) => self.store.exists(&path.bucket, &path.key).await.unwrap_or(false),
            Err(_) => false,
        };
        Ok(json!({"exists": exists, "path": raw}).to_string())
    }
}

/// `analyze_json_data`: row count, columns and numeric columns.
pub struct AnalyzeDataTool;

impl AnalyzeDataTool {
    pub fn summarize(rows: &[Value]) -> Value {
        let columns: Vec<String> = rows
            .first()
            .and_then(Value::as_object)
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();

        let sample = &rows[..rows.len().min(NUMERIC_SAMPLE_ROWS)];
        let numeric_fields: Vec<&String> = columns
            .iter()
            .filter(|col| sample.iter().all(|row| row.get(col.as_str()).is_some_and(Value::is_number)))
            .collect();

        json!({
            "row_count": rows.len(),
            "columns": columns,
            "numeric_fields": numeric_fields,
        })
    }
}

#[async_trait]
impl Tool for AnalyzeDataTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ANALYZE_JSON_DATA.into(),
            description: "Summarise rows: row count, column names and numeric columns".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "json_data": {"description": "Array of row objects, or its JSON encoding"}
                },
                "required": ["json_data"]
            }),
        }
    }

    async fn call(&self, input: Value) -> Result<String> {
        let rows = rows_argument(&input)?;
        if rows.is_empty() {
            return Err(ReportError::Tool(ToolError::ExecutionFailed(
                "No data to analyze".into(),
            )));
        }
        Ok(json!({"status": "success", "summary": Self::summarize(&rows)}).to_string())
    }
}

/// `calculate_kpi`: total / average / max / min of one field.
pub struct CalculateKpiTool;

impl CalculateKpiTool {
    /// Rows whose field is missing, null, zero or blank are skipped.
    pub fn calculate(rows: &[Value], kpi_type: &str, field: &str) -> Result<f64> {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| match row.get(field)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().replace(',', "").parse().ok(),
                _ => None,
            })
            .filter(|v| *v != 0.0)
            .collect();

        let value = match kpi_type {
            "total" => values.iter().sum::<f64>(),
            "average" if values.is_empty() => 0.0,
            "average" => values.iter().sum::<f64>() / values.len() as f64,
            "max" => values.iter().copied().reduce(f64::max).unwrap_or(0.0),
            "min" => values.iter().copied().reduce(f64::min).unwrap_or(0.0),
            other => return Err(invalid_input(format!("Unknown KPI type: {other}"))),
        };
        Ok(value)
    }
}

#[async_trait]
impl Tool for CalculateKpiTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: CALCULATE_KPI.into(),
            description: "Compute a KPI over one numeric field".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "json_data": {"description": "Array of row objects, or its JSON encoding"},
                    "kpi_type": {"type": "string", "enum": ["total", "average", "max", "min"]},
                    "field": {"type": "string"}
                },
                "required": ["json_data", "kpi_type", "field"]
            }),
        }
    }

    async fn call(&self, input: Value) -> Result<String> {
        let rows = rows_argument(&input)?;
        let kpi_type = required_str(&input, "kpi_type")?;
        let field = required_str(&input, "field")?;
        let value = Self::calculate(&rows, kpi_type, field)?;
        Ok(json!({"status": "success", "kpi": {"type": kpi_type, "value": value}}).to_string())
    }
}
