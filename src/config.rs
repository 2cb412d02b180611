use crate::marker::{Legend, LegendEntry};
use crate::model::{ConflictPolicy, MarkerKind};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    #[default]
    Curved,
    Orthogonal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub style: PathStyle,
    /// Share of the horizontal anchor distance used as control point offset.
    pub curvature: f32,
    pub min_control_offset: f32,
    /// Distance between the outer block edge and the column a same-side path loops through.
    pub loop_offset: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            style: PathStyle::Curved,
            curvature: 0.5,
            min_control_offset: 50.0,
            loop_offset: 40.0,
        }
    }
}

/// Block box metrics used when no measured rectangle is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockLayoutConfig {
    pub min_width: f32,
    pub max_width: f32,
    pub padding_x: f32,
    /// Height of one row band. The header and the trailing "Add new row" or
    /// option summary line take half a band each, which keeps every row
    /// centred on its connector anchor.
    pub row_height: f32,
}

impl Default for BlockLayoutConfig {
    fn default() -> Self {
        Self {
            min_width: 180.0,
            max_width: 360.0,
            padding_x: 12.0,
            row_height: 40.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMenuConfig {
    /// Lift applied so the menu opens above the cursor.
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for ContextMenuConfig {
    fn default() -> Self {
        Self {
            offset_y: 50.0,
            width: 140.0,
            height: 72.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Horizontal shift of the glyph origin from the path midpoint.
    pub offset_x: f32,
    pub label_dx: f32,
    pub label_dy: f32,
    pub label_font_size: f32,
    pub fallback_color: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            offset_x: -13.0,
            label_dx: 10.0,
            label_dy: -10.0,
            label_font_size: 15.0,
            fallback_color: "#000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub routing: RoutingConfig,
    pub block: BlockLayoutConfig,
    pub context_menu: ContextMenuConfig,
    pub marker: MarkerConfig,
    pub conflict_policy: ConflictPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub show_legend: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            show_legend: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub legend: Legend,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            legend: Legend::relational(),
            render,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    block_fill: Option<String>,
    block_border: Option<String>,
    table_header_fill: Option<String>,
    enum_header_fill: Option<String>,
    header_text_color: Option<String>,
    text_color: Option<String>,
    primary_color: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    style: Option<PathStyle>,
    curvature: Option<f32>,
    min_control_offset: Option<f32>,
    loop_offset: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BlockConfigFile {
    min_width: Option<f32>,
    max_width: Option<f32>,
    padding_x: Option<f32>,
    row_height: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ContextMenuConfigFile {
    offset_y: Option<f32>,
    width: Option<f32>,
    height: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct MarkerConfigFile {
    offset_x: Option<f32>,
    label_dx: Option<f32>,
    label_dy: Option<f32>,
    label_font_size: Option<f32>,
    fallback_color: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    routing: Option<RoutingConfigFile>,
    block: Option<BlockConfigFile>,
    context_menu: Option<ContextMenuConfigFile>,
    marker: Option<MarkerConfigFile>,
    conflict_policy: Option<ConflictPolicy>,
    /// Replaces the default legend when present.
    legend: Option<BTreeMap<MarkerKind, LegendEntry>>,
    show_legend: Option<bool>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Merges a camelCase JSON config over the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "modern" => config.theme = Theme::modern(),
            "classic" | "default" | "base" => config.theme = Theme::classic(),
            other => tracing::warn!(theme = other, "unknown theme, keeping default"),
        }
        config.render.background = config.theme.background.clone();
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.background {
            config.render.background = v.clone();
            config.theme.background = v;
        }
        if let Some(v) = vars.block_fill {
            config.theme.block_fill = v;
        }
        if let Some(v) = vars.block_border {
            config.theme.block_border = v;
        }
        if let Some(v) = vars.table_header_fill {
            config.theme.table_header_fill = v;
        }
        if let Some(v) = vars.enum_header_fill {
            config.theme.enum_header_fill = v;
        }
        if let Some(v) = vars.header_text_color {
            config.theme.header_text_color = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.primary_color {
            config.theme.primary_color = v;
        }
    }

    if let Some(routing) = parsed.routing {
        let target = &mut config.layout.routing;
        if let Some(v) = routing.style {
            target.style = v;
        }
        if let Some(v) = routing.curvature {
            target.curvature = v.max(0.0);
        }
        if let Some(v) = routing.min_control_offset {
            target.min_control_offset = v.max(0.0);
        }
        if let Some(v) = routing.loop_offset {
            target.loop_offset = v.max(0.0);
        }
    }

    if let Some(block) = parsed.block {
        let target = &mut config.layout.block;
        if let Some(v) = block.min_width {
            target.min_width = v;
        }
        if let Some(v) = block.max_width {
            target.max_width = v;
        }
        if let Some(v) = block.padding_x {
            target.padding_x = v;
        }
        if let Some(v) = block.row_height {
            target.row_height = v;
        }
        if target.max_width < target.min_width {
            target.max_width = target.min_width;
        }
    }

    if let Some(menu) = parsed.context_menu {
        let target = &mut config.layout.context_menu;
        if let Some(v) = menu.offset_y {
            target.offset_y = v;
        }
        if let Some(v) = menu.width {
            target.width = v;
        }
        if let Some(v) = menu.height {
            target.height = v;
        }
    }

    if let Some(marker) = parsed.marker {
        let target = &mut config.layout.marker;
        if let Some(v) = marker.offset_x {
            target.offset_x = v;
        }
        if let Some(v) = marker.label_dx {
            target.label_dx = v;
        }
        if let Some(v) = marker.label_dy {
            target.label_dy = v;
        }
        if let Some(v) = marker.label_font_size {
            target.label_font_size = v;
        }
        if let Some(v) = marker.fallback_color {
            target.fallback_color = v;
        }
    }

    if let Some(policy) = parsed.conflict_policy {
        config.layout.conflict_policy = policy;
    }

    if let Some(entries) = parsed.legend {
        let mut legend = Legend::new();
        for (kind, entry) in entries {
            legend.insert(kind, entry);
        }
        config.legend = legend;
    }

    if let Some(v) = parsed.show_legend {
        config.render.show_legend = v;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_keeps_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.layout.routing.style, PathStyle::Curved);
        assert_eq!(config.layout.context_menu.offset_y, 50.0);
        assert_eq!(config.legend.len(), 4);
        assert_eq!(config.layout.conflict_policy, ConflictPolicy::Reject);
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let config = parse_config(
            r##"{
                "theme": "modern",
                "themeVariables": { "primaryColor": "#101010" },
                "routing": { "style": "orthogonal", "loopOffset": 24 },
                "contextMenu": { "offsetY": 30 },
                "conflictPolicy": "last-write-wins",
                "legend": { "Circle": { "color": "#00ff00", "label": "Has many" } }
            }"##,
        )
        .unwrap();
        assert_eq!(config.theme.primary_color, "#101010");
        assert_eq!(config.theme.font_size, Theme::modern().font_size);
        assert_eq!(config.layout.routing.style, PathStyle::Orthogonal);
        assert_eq!(config.layout.routing.loop_offset, 24.0);
        assert_eq!(config.layout.routing.curvature, 0.5);
        assert_eq!(config.layout.context_menu.offset_y, 30.0);
        assert_eq!(config.layout.conflict_policy, ConflictPolicy::LastWriteWins);
        assert_eq!(config.legend.len(), 1);
        assert_eq!(config.legend.get(MarkerKind::Circle).unwrap().color, "#00ff00");
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_config("{ not json").is_err());
    }
}
