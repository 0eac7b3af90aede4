//! Report layout document: the shape returned to clients.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::catalog::ComponentCatalog;
use crate::clock::{Clock, iso_timestamp, report_id_at};
use crate::records::null_as_default;

pub const SECTION_TYPE_DEFAULT: &str = "Default";
pub const CREATED_BY_AGENT: &str = "agent_generated";

/// Where a component's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentSource {
    /// Value is inline text.
    #[serde(rename = "TEXT")]
    Text,
    /// Value is an `s3://` data path.
    #[serde(rename = "S3")]
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    MainHeader,
    SubHeader,
    DataTable,
    BarChart,
    Card,
    TextField,
    MarkdownField,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainHeader => "MainHeader",
            Self::SubHeader => "SubHeader",
            Self::DataTable => "DataTable",
            Self::BarChart => "BarChart",
            Self::Card => "Card",
            Self::TextField => "TextField",
            Self::MarkdownField => "MarkdownField",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of one renderable block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub source: ContentSource,
    pub component: ComponentKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub props: Map<String, Value>,
}

impl ComponentSpec {
    pub fn text(component: ComponentKind, value: impl Into<String>) -> Self {
        Self {
            source: ContentSource::Text,
            component,
            value: value.into(),
            props: Map::new(),
        }
    }

    pub fn s3(component: ComponentKind, path: impl Into<String>) -> Self {
        Self {
            source: ContentSource::S3,
            component,
            value: path.into(),
            props: Map::new(),
        }
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }
}

fn default_section_type() -> String {
    SECTION_TYPE_DEFAULT.into()
}

fn section_type_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(default_section_type))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(
        rename = "type",
        default = "default_section_type",
        deserialize_with = "section_type_or_default"
    )]
    pub section_type: String,
    pub component: ComponentKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contents: Vec<ComponentSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainSection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(
        rename = "type",
        default = "default_section_type",
        deserialize_with = "section_type_or_default"
    )]
    pub section_type: String,
    pub component: ComponentKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contents: Vec<ComponentSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSections {
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: Vec<HeaderSection>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub main: Vec<MainSection>,
}

impl DocumentSections {
    /// Fill empty section ids with `section_header_<n>` / `section_main_<n>`.
    ///
    /// `<n>` starts at the section's position and skips ids already taken.
    pub fn assign_missing_ids(&mut self) {
        let mut used: HashSet<String> = self
            .header
            .iter()
            .map(|s| s.id.clone())
            .chain(self.main.iter().map(|s| s.id.clone()))
            .filter(|id| !id.trim().is_empty())
            .collect();

        for (i, section) in self.header.iter_mut().enumerate() {
            fill_id(&mut section.id, "section_header", i + 1, &mut used);
        }
        for (i, section) in self.main.iter_mut().enumerate() {
            fill_id(&mut section.id, "section_main", i + 1, &mut used);
        }
    }

    /// Ids that occur on more than one section.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        let ids = self
            .header
            .iter()
            .map(|s| &s.id)
            .chain(self.main.iter().map(|s| &s.id));
        for id in ids {
            if !seen.insert(id) && !duplicates.contains(id) {
                duplicates.push(id.clone());
            }
        }
        duplicates
    }
}

fn fill_id(id: &mut String, prefix: &str, position: usize, used: &mut HashSet<String>) {
    if !id.trim().is_empty() {
        return;
    }
    let mut n = position;
    let mut candidate = format!("{prefix}_{n}");
    while used.contains(&candidate) {
        n += 1;
        candidate = format!("{prefix}_{n}");
    }
    used.insert(candidate.clone());
    *id = candidate;
}

/// The final deliverable. Always carries id, timestamp and creator tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub report_id: String,
    pub title: String,
    pub created_at: String,
    pub created_by: String,
    pub sections: DocumentSections,
}

impl ReportDocument {
    /// Catalog rule violations, e.g. a BarChart without `yFields`.
    ///
    /// Purely informational: callers attach these to the validation outcome.
    pub fn structural_issues(&self, catalog: &ComponentCatalog) -> Vec<String> {
        let mut issues = Vec::new();

        if self.sections.header.is_empty() {
            issues.push("document has no header section".to_string());
        }
        for id in self.sections.duplicate_ids() {
            issues.push(format!("section id '{id}' is used more than once"));
        }
        for section in &self.sections.header {
            if !catalog.is_header_kind(section.component) {
                issues.push(format!(
                    "header section '{}' uses non-header component {}",
                    section.id, section.component
                ));
            }
        }

        for section in &self.sections.main {
            if !catalog.is_main_kind(section.component) {
                issues.push(format!(
                    "main section '{}' uses header component {}",
                    section.id, section.component
                ));
            }
            for content in &section.contents {
                for prop in catalog.required_props(content.component) {
                    if !content.props.contains_key(*prop) {
                        issues.push(format!(
                            "section '{}': {} is missing required prop '{}'",
                            section.id, content.component, prop
                        ));
                    }
                }
                if content.source == ContentSource::S3 && !content.value.starts_with("s3://") {
                    issues.push(format!(
                        "section '{}': S3 content value '{}' is not an s3:// path",
                        section.id, content.value
                    ));
                }
            }
        }

        issues
    }
}

/// Document as emitted by the generation stage; metadata may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDocument {
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub sections: DocumentSections,
}

impl DraftDocument {
    /// Synthesise whatever the generator left out.
    pub fn finalize(self, clock: &dyn Clock, fallback_title: &str) -> ReportDocument {
        let now = clock.now();
        let mut sections = self.sections;
        sections.assign_missing_ids();

        ReportDocument {
            report_id: non_blank(self.report_id).unwrap_or_else(|| report_id_at(now)),
            title: non_blank(self.title).unwrap_or_else(|| fallback_title.to_string()),
            created_at: non_blank(self.created_at).unwrap_or_else(|| iso_timestamp(now)),
            created_by: non_blank(self.created_by).unwrap_or_else(|| CREATED_BY_AGENT.into()),
            sections,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
