//! Deterministic, backend-free report assembly.
//!
//! Serves as the offline mock generator and as the replacement document
//! when a pipeline run fails in resilient mode.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value, json};

use crate::clock::{Clock, iso_timestamp, report_id_at};
use crate::document::{
    CREATED_BY_AGENT, ComponentKind, ComponentSpec, DocumentSections, HeaderSection, MainSection,
    ReportDocument, SECTION_TYPE_DEFAULT,
};

pub const DEFAULT_TITLE: &str = "レポート";

const TABLE_KEYWORDS: &[&str] = &["売上", "推移", "sales", "trend"];
const BAR_CHART_KEYWORDS: &[&str] = &["カテゴリ", "比較", "別", "category", "comparison", " by "];
const CARD_KEYWORDS: &[&str] = &["kpi", "指標", "サマリー", "indicator", "summary"];

const DAILY_MARKER: &str = "daily";
const CATEGORY_MARKER: &str = "category";

const CLOSING_NOTE: &str =
    "このレポートは自動生成されました。データは指定されたS3パスから取得しています。";
const ERROR_NOTICE: &str = "レポート生成中にエラーが発生しました。";

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.+?(?:レポート|(?i:report)))").expect("valid regex"));

/// Which canned document replaces a failed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackStyle {
    /// Keyword-driven layout built from the request.
    #[default]
    Keyword,
    /// Fixed layout with a single error notice.
    ErrorNotice,
}

impl FromStr for FallbackStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "error_notice" | "error-notice" => Ok(Self::ErrorNotice),
            other => Err(format!("unknown fallback style '{other}'")),
        }
    }
}

/// Title and component choice derived from a request text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAnalysis {
    pub title: String,
    /// Selected components in detection order: table, bar chart, card.
    pub components: Vec<ComponentKind>,
}

impl RequestAnalysis {
    pub fn of(request: &str) -> Self {
        let lowered = request.to_lowercase();
        let mentions = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

        let mut components = Vec::new();
        if mentions(TABLE_KEYWORDS) {
            components.push(ComponentKind::DataTable);
        }
        if mentions(BAR_CHART_KEYWORDS) {
            components.push(ComponentKind::BarChart);
        }
        if mentions(CARD_KEYWORDS) {
            components.push(ComponentKind::Card);
        }
        if components.is_empty() {
            components = vec![ComponentKind::Card, ComponentKind::DataTable];
        }

        Self {
            title: extract_title(request),
            components,
        }
    }

    pub fn wants(&self, kind: ComponentKind) -> bool {
        self.components.contains(&kind)
    }
}

/// Shortest leading run of text ending in "レポート"/"report", else `レポート`.
pub fn extract_title(request: &str) -> String {
    TITLE_RE
        .captures(request)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Path for the table: first containing `daily`, else the first path.
pub fn pick_table_path(paths: &[String]) -> Option<&String> {
    paths
        .iter()
        .find(|p| p.contains(DAILY_MARKER))
        .or_else(|| paths.first())
}

/// Path for the bar chart: first containing `category`, else the second path.
/// Requires at least two paths.
pub fn pick_bar_chart_path(paths: &[String]) -> Option<&String> {
    if paths.len() < 2 {
        return None;
    }
    paths
        .iter()
        .find(|p| p.contains(CATEGORY_MARKER))
        .or_else(|| paths.get(1))
}

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn header(title: &str) -> HeaderSection {
    HeaderSection {
        id: "section_header_1".into(),
        section_type: SECTION_TYPE_DEFAULT.into(),
        component: ComponentKind::MainHeader,
        contents: vec![ComponentSpec::text(ComponentKind::MainHeader, title)],
    }
}

fn main_section(
    component: ComponentKind,
    title: &str,
    description: &str,
    content: ComponentSpec,
) -> MainSection {
    MainSection {
        id: String::new(),
        section_type: SECTION_TYPE_DEFAULT.into(),
        component,
        title: title.into(),
        description: description.into(),
        contents: vec![content],
    }
}

/// Keyword-rule report builder. Never fails and never calls a backend.
#[derive(Clone)]
pub struct FallbackAssembler {
    clock: Arc<dyn Clock>,
}

impl FallbackAssembler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn assemble(&self, request: &str, paths: &[String]) -> ReportDocument {
        let analysis = RequestAnalysis::of(request);
        let mut main = Vec::new();

        if analysis.wants(ComponentKind::Card) {
            let card = ComponentSpec::text(ComponentKind::Card, "").with_props(props(json!({
                "title": "今月の売上",
                "description": "前月比 +15%",
                "content": "¥45,280,000",
                "footer": "目標達成率: 112%"
            })));
            main.push(main_section(ComponentKind::Card, "売上サマリー", "主要KPI", card));
        }

        if analysis.wants(ComponentKind::DataTable) {
            if let Some(path) = pick_table_path(paths) {
                main.push(main_section(
                    ComponentKind::DataTable,
                    "売上詳細データ",
                    "日別の売上推移",
                    ComponentSpec::s3(ComponentKind::DataTable, path.as_str()),
                ));
            }
        }

        if analysis.wants(ComponentKind::BarChart) {
            if let Some(path) = pick_bar_chart_path(paths) {
                let chart = ComponentSpec::s3(ComponentKind::BarChart, path.as_str()).with_props(
                    props(json!({
                        "xField": "category",
                        "yFields": ["sales", "profit"]
                    })),
                );
                main.push(main_section(
                    ComponentKind::BarChart,
                    "製品カテゴリ別売上",
                    "カテゴリ別の売上比較",
                    chart,
                ));
            }
        }

        main.push(main_section(
            ComponentKind::TextField,
            "補足情報",
            "",
            ComponentSpec::text(ComponentKind::TextField, CLOSING_NOTE),
        ));

        self.document(analysis.title, main)
    }

    /// Fixed layout announcing that generation failed.
    pub fn error_notice(&self) -> ReportDocument {
        let main = vec![main_section(
            ComponentKind::TextField,
            "エラー",
            "",
            ComponentSpec::text(ComponentKind::TextField, ERROR_NOTICE),
        )];
        self.document(DEFAULT_TITLE.to_string(), main)
    }

    pub fn build(&self, style: FallbackStyle, request: &str, paths: &[String]) -> ReportDocument {
        match style {
            FallbackStyle::Keyword => self.assemble(request, paths),
            FallbackStyle::ErrorNotice => self.error_notice(),
        }
    }

    fn document(&self, title: String, main: Vec<MainSection>) -> ReportDocument {
        let now = self.clock.now();
        let mut sections = DocumentSections {
            header: vec![header(&title)],
            main,
        };
        sections.assign_missing_ids();

        ReportDocument {
            report_id: report_id_at(now),
            title,
            created_at: iso_timestamp(now),
            created_by: CREATED_BY_AGENT.into(),
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::document::ContentSource;

    const SAMPLE_REQUEST: &str =
        "月次売上レポートを作成してください。日別の売上推移と製品カテゴリ別の売上を見たいです。";

    fn assembler() -> FallbackAssembler {
        FallbackAssembler::new(Arc::new(FixedClock::from_millis(1_718_000_000_000)))
    }

    fn sample_paths() -> Vec<String> {
        vec![
            "s3://kizukai-ds-tmp/ai_report_json_mock/input_data/daily-sales.json".into(),
            "s3://kizukai-ds-tmp/ai_report_json_mock/input_data/category-sales.json".into(),
        ]
    }

    fn kinds(doc: &ReportDocument) -> Vec<ComponentKind> {
        doc.sections.main.iter().map(|s| s.component).collect()
    }

    #[test]
    fn title_extraction() {
        assert_eq!(extract_title(SAMPLE_REQUEST), "月次売上レポート");
        assert_eq!(extract_title("売上を見たい"), "レポート");
        assert_eq!(extract_title("Build a quarterly sales report please"), "Build a quarterly sales report");
        assert_eq!(extract_title(""), "レポート");
    }

    #[test]
    fn keyword_detection() {
        let a = RequestAnalysis::of(SAMPLE_REQUEST);
        assert_eq!(a.components, vec![ComponentKind::DataTable, ComponentKind::BarChart]);

        let a = RequestAnalysis::of("KPIを確認したい");
        assert_eq!(a.components, vec![ComponentKind::Card]);

        let a = RequestAnalysis::of("Revenue by region with a kpi summary");
        assert_eq!(a.components, vec![ComponentKind::BarChart, ComponentKind::Card]);

        let a = RequestAnalysis::of("hello");
        assert_eq!(a.components, vec![ComponentKind::Card, ComponentKind::DataTable]);
    }

    #[test]
    fn sample_request_layout() {
        let doc = assembler().assemble(SAMPLE_REQUEST, &sample_paths());

        assert_eq!(doc.title, "月次売上レポート");
        assert_eq!(doc.report_id, "report_1718000000000");
        assert_eq!(doc.created_by, "agent_generated");
        assert_eq!(doc.sections.header[0].contents[0].value, "月次売上レポート");
        assert_eq!(
            kinds(&doc),
            vec![ComponentKind::DataTable, ComponentKind::BarChart, ComponentKind::TextField]
        );

        let table = &doc.sections.main[0];
        assert_eq!(table.id, "section_main_1");
        assert_eq!(table.contents[0].source, ContentSource::S3);
        assert!(table.contents[0].value.ends_with("daily-sales.json"));

        let chart = &doc.sections.main[1].contents[0];
        assert!(chart.value.ends_with("category-sales.json"));
        assert_eq!(chart.props["xField"], "category");
        assert_eq!(chart.props["yFields"], json!(["sales", "profit"]));

        let note = &doc.sections.main[2];
        assert_eq!(note.id, "section_main_3");
        assert_eq!(note.title, "補足情報");
        assert_eq!(note.contents[0].value, CLOSING_NOTE);
    }

    #[test]
    fn kpi_without_paths_has_card_and_note_only() {
        let doc = assembler().assemble("KPIレポート", &[]);
        assert_eq!(kinds(&doc), vec![ComponentKind::Card, ComponentKind::TextField]);
        assert_eq!(doc.sections.main[0].contents[0].props["content"], "¥45,280,000");
    }

    #[test]
    fn bar_chart_needs_two_paths() {
        let paths = vec!["s3://b/category-sales.json".to_string()];
        let doc = assembler().assemble("カテゴリ比較", &paths);
        assert_eq!(kinds(&doc), vec![ComponentKind::TextField]);
    }

    #[test]
    fn path_selection_without_markers() {
        let paths: Vec<String> = vec!["s3://b/a.json".into(), "s3://b/b.json".into(), "s3://b/c.json".into()];
        assert_eq!(pick_table_path(&paths).unwrap(), "s3://b/a.json");
        assert_eq!(pick_bar_chart_path(&paths).unwrap(), "s3://b/b.json");
        assert!(pick_table_path(&[]).is_none());
    }

    #[test]
    fn error_notice_layout() {
        let doc = assembler().error_notice();
        assert_eq!(doc.title, "レポート");
        assert_eq!(doc.sections.main.len(), 1);
        assert_eq!(doc.sections.main[0].id, "section_main_1");
        assert_eq!(doc.sections.main[0].title, "エラー");
        assert_eq!(doc.sections.main[0].contents[0].value, ERROR_NOTICE);
    }

    #[test]
    fn style_parsing() {
        assert_eq!("keyword".parse::<FallbackStyle>().unwrap(), FallbackStyle::Keyword);
        assert_eq!("Error_Notice".parse::<FallbackStyle>().unwrap(), FallbackStyle::ErrorNotice);
        assert!("loud".parse::<FallbackStyle>().is_err());
    }
}
