//! Output coercion: turn whatever a stage produced into one typed record.
//!
//! Raw outputs are tried against an ordered chain of [`ParseStrategy`]
//! objects. Each strategy either yields a JSON value or passes; the first
//! value that also builds the target record wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use repgen_core::error::{PipelineError, ReportError, Result};

const EXCERPT_CHARS: usize = 200;

/// A stage result before coercion.
#[derive(Debug, Clone)]
pub enum RawOutput<T> {
    /// Already the target record.
    Typed(T),
    Mapping(Value),
    Text(String),
}

impl<T> From<String> for RawOutput<T> {
    fn from(text: String) -> Self {
        RawOutput::Text(text)
    }
}

/// A record that can be built from a loosely structured stage output.
pub trait Coercible: DeserializeOwned + Sized {
    /// Validate and canonicalise a freshly deserialised record.
    fn normalize(self) -> std::result::Result<Self, String> {
        Ok(self)
    }

    fn from_mapping(value: Value) -> std::result::Result<Self, String> {
        let record: Self = serde_json::from_value(value).map_err(|e| e.to_string())?;
        record.normalize()
    }

    /// Extra text strategies tried after the generic ones.
    fn fallback_strategies() -> Vec<Box<dyn ParseStrategy>> {
        Vec::new()
    }
}

/// One way of recovering structured data from free text.
pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, text: &str) -> Option<Value>;
}

static LABELED_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?i:json|python)[ \t]*\r?\n?(.*?)```").expect("valid regex")
});

static BARE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[ \t]*\r?\n(.*?)```").expect("valid regex"));

/// A fenced code block labelled `json`/`python`, then any unlabelled block.
pub struct FencedBlock;

impl ParseStrategy for FencedBlock {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        LABELED_FENCE
            .captures_iter(text)
            .chain(BARE_FENCE.captures_iter(text))
            .filter_map(|caps| caps.get(1))
            .find_map(|body| serde_json::from_str(body.as_str().trim()).ok())
    }
}

/// The whole trimmed text as a JSON document.
pub struct WholeText;

impl ParseStrategy for WholeText {
    fn name(&self) -> &'static str {
        "whole_text"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        serde_json::from_str(text.trim()).ok()
    }
}

static LABEL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\*\*(?:ID|ファイル名|(?i:id|file ?name))\*\*:\s*(.+)$").expect("valid regex")
});
static LABEL_COLUMNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\*\*(?:列名|(?i:columns))\*\*:\s*(\[.*\])").expect("valid regex")
});
static LABEL_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\*\*(?:期間|(?i:period))\*\*:\s*(.+)$").expect("valid regex")
});
static LABEL_ROWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\*\*(?:行数|(?i:row ?count|rows))\*\*:\s*(\d+)").expect("valid regex")
});

/// Markdown `**Label**: value` lines describing one data file.
///
/// All four labels must be present; nothing is invented for a missing one.
pub struct LabeledFields;

impl ParseStrategy for LabeledFields {
    fn name(&self) -> &'static str {
        "labeled_fields"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        let capture = |re: &Regex| {
            re.captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        };

        let id = capture(&LABEL_ID)?;
        let columns: Value = serde_json::from_str(&capture(&LABEL_COLUMNS)?).ok()?;
        let period = capture(&LABEL_PERIOD)?;
        let row_count: u64 = capture(&LABEL_ROWS)?.parse().ok()?;

        Some(json!({
            "id": id,
            "columns": columns,
            "period": period,
            "row_count": row_count,
        }))
    }
}

/// Keeps unstructured text as `{"raw_text": ...}`.
pub struct RawTextCapture;

impl ParseStrategy for RawTextCapture {
    fn name(&self) -> &'static str {
        "raw_text"
    }

    fn extract(&self, text: &str) -> Option<Value> {
        let text = text.trim();
        (!text.is_empty()).then(|| json!({ "raw_text": text }))
    }
}

fn text_strategies<T: Coercible>() -> Vec<Box<dyn ParseStrategy>> {
    let mut strategies: Vec<Box<dyn ParseStrategy>> = vec![Box::new(FencedBlock), Box::new(WholeText)];
    strategies.extend(T::fallback_strategies());
    strategies
}

/// Produce exactly one `T` from a raw stage output, or a `PipelineError::Parse`.
pub fn coerce<T: Coercible>(stage: &str, raw: RawOutput<T>) -> Result<T> {
    match raw {
        RawOutput::Typed(record) => Ok(record),
        RawOutput::Mapping(value) => {
            let excerpt = excerpt(&value.to_string());
            T::from_mapping(value).map_err(|reason| parse_error(stage, reason, excerpt))
        }
        RawOutput::Text(text) => coerce_text(stage, &text),
    }
}

fn coerce_text<T: Coercible>(stage: &str, text: &str) -> Result<T> {
    let mut first_error: Option<String> = None;

    for strategy in text_strategies::<T>() {
        let Some(value) = strategy.extract(text) else {
            continue;
        };
        match T::from_mapping(value) {
            Ok(record) => {
                tracing::debug!(stage, strategy = strategy.name(), "coerced stage output");
                return Ok(record);
            }
            Err(reason) => {
                first_error.get_or_insert(format!("{}: {reason}", strategy.name()));
            }
        }
    }

    let reason = first_error.unwrap_or_else(|| "no structured data found".into());
    Err(parse_error(stage, reason, excerpt(text)))
}

fn parse_error(stage: &str, reason: String, excerpt: String) -> ReportError {
    ReportError::Pipeline(PipelineError::Parse {
        stage: stage.to_string(),
        reason,
        excerpt,
    })
}

/// First 200 characters, cut on a char boundary.
pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Pair {
        name: String,
        count: u32,
    }

    impl Coercible for Pair {
        fn normalize(self) -> std::result::Result<Self, String> {
            if self.name.is_empty() {
                return Err("name is empty".into());
            }
            Ok(self)
        }
    }

    fn parse_reason(err: ReportError) -> (String, String) {
        match err {
            ReportError::Pipeline(PipelineError::Parse { stage, reason, .. }) => (stage, reason),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn typed_is_returned_unchanged() {
        let p = Pair {
            name: "a".into(),
            count: 1,
        };
        assert_eq!(coerce("s", RawOutput::Typed(p)).unwrap().name, "a");
    }

    #[test]
    fn mapping_builds_record() {
        let p: Pair = coerce("s", RawOutput::Mapping(json!({"name": "a", "count": 2}))).unwrap();
        assert_eq!(p.count, 2);
    }

    #[test]
    fn mapping_missing_field_is_parse_error() {
        let err = coerce::<Pair>("goal", RawOutput::Mapping(json!({"name": "a"}))).unwrap_err();
        let (stage, reason) = parse_reason(err);
        assert_eq!(stage, "goal");
        assert!(reason.contains("count"));
    }

    #[test]
    fn labelled_fence_wins_over_prose() {
        let text = "Here you go:\n```json\n{\"name\": \"x\", \"count\": 3}\n```\nThanks";
        let p: Pair = coerce("s", RawOutput::Text(text.into())).unwrap();
        assert_eq!(p.count, 3);
    }

    #[test]
    fn python_and_unlabelled_fences() {
        let py = "```python\n{\"name\": \"py\", \"count\": 1}\n```";
        assert_eq!(coerce::<Pair>("s", RawOutput::Text(py.into())).unwrap().name, "py");

        let bare = "```\n{\"name\": \"bare\", \"count\": 1}\n```";
        assert_eq!(coerce::<Pair>("s", RawOutput::Text(bare.into())).unwrap().name, "bare");
    }

    #[test]
    fn whole_text_json() {
        let p: Pair = coerce("s", RawOutput::Text("  {\"name\":\"w\",\"count\":9} ".into())).unwrap();
        assert_eq!(p.count, 9);
    }

    #[test]
    fn unparseable_text_is_parse_error_with_excerpt() {
        let long = "no json here ".repeat(40);
        let err = coerce::<Pair>("design", RawOutput::Text(long)).unwrap_err();
        match err {
            ReportError::Pipeline(PipelineError::Parse {
                stage,
                reason,
                excerpt,
            }) => {
                assert_eq!(stage, "design");
                assert_eq!(reason, "no structured data found");
                assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn record_validation_error_is_reported() {
        let err = coerce::<Pair>("s", RawOutput::Text("{\"name\":\"\",\"count\":1}".into()))
            .unwrap_err();
        let (_, reason) = parse_reason(err);
        assert_eq!(reason, "whole_text: name is empty");
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let jp = "売".repeat(250);
        let e = excerpt(&jp);
        assert!(e.starts_with(&"売".repeat(200)));
        assert!(e.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn labeled_fields_need_every_label() {
        let full = "**ID**: daily\n**列名**: [\"date\", \"sales\"]\n**期間**: 2024-01\n**行数**: 31";
        let v = LabeledFields.extract(full).unwrap();
        assert_eq!(v["id"], "daily");
        assert_eq!(v["row_count"], 31);

        let partial = "**ID**: daily\n**期間**: 2024-01";
        assert!(LabeledFields.extract(partial).is_none());
    }

    #[test]
    fn raw_text_capture_skips_blank() {
        assert!(RawTextCapture.extract("   ").is_none());
        assert_eq!(RawTextCapture.extract(" note ").unwrap()["raw_text"], "note");
    }
}
