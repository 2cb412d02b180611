use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub block_fill: String,
    pub block_border: String,
    pub table_header_fill: String,
    pub enum_header_fill: String,
    pub header_text_color: String,
    pub text_color: String,
    pub muted_text_color: String,
    pub row_divider: String,
    /// Stroke of connection paths and label text.
    pub primary_color: String,
    pub menu_fill: String,
    pub menu_border: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            background: "#FFFFFF".to_string(),
            block_fill: "#FFFFFF".to_string(),
            block_border: "#9370DB".to_string(),
            table_header_fill: "#ECECFF".to_string(),
            enum_header_fill: "#FFFFDE".to_string(),
            header_text_color: "#333333".to_string(),
            text_color: "#333333".to_string(),
            muted_text_color: "#888888".to_string(),
            row_divider: "#E0E0F0".to_string(),
            primary_color: "#9370DB".to_string(),
            menu_fill: "#FFFFFF".to_string(),
            menu_border: "#AAAA33".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            background: "#FFFFFF".to_string(),
            block_fill: "#F8FAFF".to_string(),
            block_border: "#C7D2E5".to_string(),
            table_header_fill: "#EEF2F8".to_string(),
            enum_header_fill: "#FFF7E6".to_string(),
            header_text_color: "#1C2430".to_string(),
            text_color: "#1C2430".to_string(),
            muted_text_color: "#7A8AA6".to_string(),
            row_divider: "#D7E0F0".to_string(),
            primary_color: "#4F6BED".to_string(),
            menu_fill: "#FFFFFF".to_string(),
            menu_border: "#D7E0F0".to_string(),
        }
    }
}
