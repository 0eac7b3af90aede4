use serde::Serialize;

use crate::document::{ComponentKind, ContentSource};

/// Static catalog of layout components and their required props.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentCatalog {
    pub header_components: Vec<ComponentKind>,
    pub main_components: Vec<ComponentKind>,
    pub data_sources: Vec<ContentSource>,
    pub bar_chart_required_props: Vec<&'static str>,
    pub card_required_props: Vec<&'static str>,
}

impl ComponentCatalog {
    pub fn standard() -> Self {
        Self {
            header_components: vec![ComponentKind::MainHeader, ComponentKind::SubHeader],
            main_components: vec![
                ComponentKind::DataTable,
                ComponentKind::BarChart,
                ComponentKind::Card,
                ComponentKind::TextField,
                ComponentKind::MarkdownField,
            ],
            data_sources: vec![ContentSource::Text, ContentSource::S3],
            bar_chart_required_props: vec!["xField", "yFields"],
            card_required_props: vec!["title"],
        }
    }

    pub fn is_header_kind(&self, kind: ComponentKind) -> bool {
        self.header_components.contains(&kind)
    }

    pub fn is_main_kind(&self, kind: ComponentKind) -> bool {
        self.main_components.contains(&kind)
    }

    pub fn required_props(&self, kind: ComponentKind) -> &[&'static str] {
        match kind {
            ComponentKind::BarChart => &self.bar_chart_required_props,
            ComponentKind::Card => &self.card_required_props,
            _ => &[],
        }
    }
}

impl Default for ComponentCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_json() {
        let v = serde_json::to_value(ComponentCatalog::standard()).unwrap();
        assert_eq!(v["header_components"], serde_json::json!(["MainHeader", "SubHeader"]));
        assert_eq!(
            v["main_components"],
            serde_json::json!(["DataTable", "BarChart", "Card", "TextField", "MarkdownField"])
        );
        assert_eq!(v["data_sources"], serde_json::json!(["TEXT", "S3"]));
        assert_eq!(v["bar_chart_required_props"], serde_json::json!(["xField", "yFields"]));
        assert_eq!(v["card_required_props"], serde_json::json!(["title"]));
    }

    #[test]
    fn required_props_by_kind() {
        let catalog = ComponentCatalog::standard();
        assert_eq!(catalog.required_props(ComponentKind::Card), &["title"]);
        assert!(catalog.required_props(ComponentKind::DataTable).is_empty());
        assert!(catalog.is_header_kind(ComponentKind::SubHeader));
        assert!(!catalog.is_main_kind(ComponentKind::MainHeader));
    }
}
