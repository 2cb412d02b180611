use crate::config::{BlockLayoutConfig, Config, RenderConfig};
use crate::controller::EditorPanel;
use crate::frame::{BlockFrame, Frame};
use crate::geometry::{BlockBands, Rect};
use crate::marker::{Glyph, Legend};
use crate::model::{Block, BlockType, Row};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const CANVAS_MARGIN: f32 = 24.0;
const LEGEND_ROW_HEIGHT: f32 = 24.0;
const LEGEND_PADDING: f32 = 10.0;
const LEGEND_GLYPH_WIDTH: f32 = 26.0;

/// Shared inputs of a [`BlockRenderer`].
pub struct RenderContext<'a> {
    pub theme: &'a Theme,
    pub block: &'a BlockLayoutConfig,
}

impl RenderContext<'_> {
    fn text(&self, x: f32, y: f32, anchor: &str, fill: &str, weight: &str, content: &str) -> String {
        format!(
            "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"{anchor}\" dominant-baseline=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{weight}\" fill=\"{}\">{}</text>",
            escape_xml(&self.theme.font_family),
            self.theme.font_size,
            escape_xml(fill),
            escape_xml(content)
        )
    }
}

/// Draws the inside of a block. Hosts override single parts; every method
/// has a default that renders ids only.
pub trait BlockRenderer {
    fn render_block_header(&self, block: &Block, header: &Rect, ctx: &RenderContext<'_>) -> String {
        let fill = match block.kind {
            BlockType::Table => &ctx.theme.table_header_fill,
            BlockType::Enum => &ctx.theme.enum_header_fill,
        };
        let mut svg = format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
            header.x,
            header.y,
            header.width,
            header.height,
            escape_xml(fill)
        );
        svg.push_str(&ctx.text(
            header.x + ctx.block.padding_x,
            header.y + header.height / 2.0,
            "start",
            &ctx.theme.header_text_color,
            "bold",
            &block.id,
        ));
        svg
    }

    fn render_row(&self, row: &Row, _index: usize, band: &Rect, ctx: &RenderContext<'_>) -> String {
        ctx.text(
            band.x + ctx.block.padding_x,
            band.y + band.height / 2.0,
            "start",
            &ctx.theme.text_color,
            "normal",
            &row.id,
        )
    }

    fn render_enum_row(&self, row: &Row, index: usize, band: &Rect, ctx: &RenderContext<'_>) -> String {
        self.render_row(row, index, band, ctx)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer;

impl BlockRenderer for DefaultRenderer {}

/// Adds each column's `type` right aligned and marks primary keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedColumnsRenderer;

impl BlockRenderer for TypedColumnsRenderer {
    fn render_row(&self, row: &Row, _index: usize, band: &Rect, ctx: &RenderContext<'_>) -> String {
        let y = band.y + band.height / 2.0;
        let weight = if row.is_primary_key() { "bold" } else { "normal" };
        let mut svg = ctx.text(
            band.x + ctx.block.padding_x,
            y,
            "start",
            &ctx.theme.text_color,
            weight,
            &row.id,
        );
        if let Some(column_type) = row.column_type() {
            svg.push_str(&ctx.text(
                band.right() - ctx.block.padding_x,
                y,
                "end",
                &ctx.theme.muted_text_color,
                "normal",
                column_type,
            ));
        }
        svg
    }

    fn render_enum_row(&self, row: &Row, index: usize, band: &Rect, ctx: &RenderContext<'_>) -> String {
        DefaultRenderer.render_row(row, index, band, ctx)
    }
}

pub fn render_svg(frame: &Frame, config: &Config, renderer: &dyn BlockRenderer) -> String {
    let theme = &config.theme;
    let (width, height) = canvas_size(frame, &config.render);
    let ctx = RenderContext {
        theme,
        block: &config.layout.block,
    };
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&config.render.background)
    ));

    svg.push_str("<g class=\"connections\">");
    for conn in &frame.connections {
        if conn.path.is_empty() {
            continue;
        }
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"/>",
            conn.path.d,
            escape_xml(&theme.primary_color)
        ));
    }
    svg.push_str("</g>");

    let edited = match &frame.editor {
        EditorPanel::Closed => None,
        EditorPanel::OpenForBlock { block_id } | EditorPanel::OpenForRow { block_id, .. } => {
            Some(block_id.as_str())
        }
    };
    for entry in &frame.blocks {
        svg.push_str(&block_svg(entry, edited == Some(entry.key.as_str()), &ctx, renderer));
    }

    svg.push_str("<g class=\"markers\">");
    for conn in &frame.connections {
        if let Some(marker) = &conn.marker {
            svg.push_str(&marker.svg());
        }
        if let Some(label) = &conn.label {
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
                label.x,
                label.y,
                escape_xml(&theme.font_family),
                label.font_size,
                escape_xml(&theme.primary_color),
                escape_xml(&label.text)
            ));
        }
    }
    svg.push_str("</g>");

    if let Some((x, y)) = frame.context_menu.anchor() {
        svg.push_str(&context_menu_svg(x, y, config));
    }

    if config.render.show_legend && !config.legend.is_empty() {
        svg.push_str(&legend_svg(&config.legend, height, theme));
    }

    svg.push_str("</svg>");
    svg
}

fn canvas_size(frame: &Frame, render: &RenderConfig) -> (f32, f32) {
    let (mut width, mut height) = (render.width.max(200.0), render.height.max(200.0));
    if let Some(bounds) = frame.bounds() {
        width = width.max(bounds.right() + CANVAS_MARGIN);
        height = height.max(bounds.bottom() + CANVAS_MARGIN);
    }
    if let Some((x, y)) = frame.context_menu.anchor() {
        width = width.max(x + CANVAS_MARGIN);
        height = height.max(y + CANVAS_MARGIN);
    }
    (width, height)
}

fn block_svg(entry: &BlockFrame, edited: bool, ctx: &RenderContext<'_>, renderer: &dyn BlockRenderer) -> String {
    // Unmeasured blocks have nowhere to go.
    let Some(rect) = entry.rect.filter(|rect| rect.is_measurable()) else {
        return String::new();
    };
    let block = &entry.block;
    let mut svg = format!(
        "<g class=\"block {}\" data-key=\"{}\">",
        block.kind.as_str(),
        escape_xml(&entry.key)
    );
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        escape_xml(&ctx.theme.block_fill),
        escape_xml(&ctx.theme.block_border),
        if edited { 2.5 } else { 1.2 }
    ));

    let bands = BlockBands::new(&rect, block.rows.len());
    svg.push_str(&renderer.render_block_header(block, &bands.header(), ctx));

    for (index, row) in block.rows.iter().enumerate() {
        let band = bands.row(index);
        svg.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
            band.x,
            band.y,
            band.right(),
            band.y,
            escape_xml(&ctx.theme.row_divider)
        ));
        let row_svg = match block.kind {
            BlockType::Table => renderer.render_row(row, index, &band, ctx),
            BlockType::Enum => renderer.render_enum_row(row, index, &band, ctx),
        };
        svg.push_str(&row_svg);
    }

    let footer = bands.footer();
    let footer_text = match block.kind {
        BlockType::Table => "+ Add new row".to_string(),
        BlockType::Enum => format!("{} options", block.rows.len()),
    };
    svg.push_str(&ctx.text(
        footer.x + ctx.block.padding_x,
        footer.y + footer.height / 2.0,
        "start",
        &ctx.theme.muted_text_color,
        "normal",
        &footer_text,
    ));
    svg.push_str("</g>");
    svg
}

fn context_menu_svg(x: f32, y: f32, config: &Config) -> String {
    let menu = &config.layout.context_menu;
    let theme = &config.theme;
    let item_height = menu.height / 2.0;
    let mut svg = format!(
        "<g class=\"context-menu\"><rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"4\" ry=\"4\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
        menu.width,
        menu.height,
        escape_xml(&theme.menu_fill),
        escape_xml(&theme.menu_border)
    );
    for (idx, item) in ["Add Block", "Add Options"].iter().enumerate() {
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" dominant-baseline=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            x + 12.0,
            y + item_height * (idx as f32 + 0.5),
            escape_xml(&theme.font_family),
            theme.font_size,
            escape_xml(&theme.text_color),
            item
        ));
    }
    svg.push_str("</g>");
    svg
}

fn legend_svg(legend: &Legend, canvas_height: f32, theme: &Theme) -> String {
    let height = legend.len() as f32 * LEGEND_ROW_HEIGHT + LEGEND_PADDING * 2.0;
    let top = canvas_height - height - CANVAS_MARGIN;
    let left = CANVAS_MARGIN;
    let mut svg = format!(
        "<g class=\"legend\"><rect x=\"{left:.2}\" y=\"{top:.2}\" width=\"180\" height=\"{height:.2}\" rx=\"4\" ry=\"4\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
        escape_xml(&theme.menu_fill),
        escape_xml(&theme.block_border)
    );
    for (idx, (kind, entry)) in legend.iter().enumerate() {
        let Some(glyph) = Glyph::for_marker(kind) else {
            continue;
        };
        let row_y = top + LEGEND_PADDING + LEGEND_ROW_HEIGHT * (idx as f32 + 0.5);
        svg.push_str(&format!(
            "<g transform=\"translate({:.2}, {row_y:.2})\">{}</g>",
            left + LEGEND_PADDING,
            glyph.svg(&entry.color)
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{row_y:.2}\" dominant-baseline=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            left + LEGEND_PADDING + LEGEND_GLYPH_WIDTH + 8.0,
            escape_xml(&theme.font_family),
            theme.font_size,
            escape_xml(&theme.text_color),
            escape_xml(&entry.label)
        ));
    }
    svg.push_str("</g>");
    svg
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "sans-serif".to_string());
    opt.fontdb_mut().load_system_fonts();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::controller::EditorController;
    use crate::measure::MeasureTable;
    use crate::model::{Connection, Diagram, MarkerKind, Position};

    fn sample_frame() -> (Frame, Config) {
        let mut diagram = Diagram::new();
        diagram
            .insert_block(
                "users",
                Block::new("users", BlockType::Table, Position::default()).with_rows([
                    Row::new("id").with_data("type", "PK"),
                    Row::new("role").with_data("type", "varchar"),
                ]),
            )
            .unwrap();
        diagram
            .insert_block(
                "Role",
                Block::new("Role", BlockType::Enum, Position::new(300.0, 0.0))
                    .with_rows([Row::new("ADMIN"), Row::new("USER")]),
            )
            .unwrap();
        diagram
            .add_connection(
                Connection::new("users", 1, "Role", 0)
                    .with_marker(MarkerKind::Hexagon)
                    .with_label("a < b"),
            )
            .unwrap();
        let mut table = MeasureTable::new();
        table.record("users", Rect::new(0.0, 0.0, 200.0, 140.0));
        table.record("Role", Rect::new(300.0, 0.0, 180.0, 140.0));
        let config = Config::default();
        let mut controller = EditorController::new(diagram, LayoutConfig::default());
        controller.recompute(&table);
        (controller.frame(&table, &config.legend), config)
    }

    #[test]
    fn renders_blocks_paths_and_markers() {
        let (frame, config) = sample_frame();
        let svg = render_svg(&frame, &config, &DefaultRenderer);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("users"));
        assert!(svg.contains("ADMIN"));
        assert!(svg.contains("+ Add new row"));
        assert!(svg.contains("2 options"));
        assert!(svg.contains("fill=\"#F5A623\""));
        assert!(svg.contains("a &lt; b"));
        assert!(svg.contains(&frame.connections[0].path.d));
        assert!(!svg.contains("varchar"));
    }

    #[test]
    fn typed_renderer_shows_column_types() {
        let (frame, config) = sample_frame();
        let svg = render_svg(&frame, &config, &TypedColumnsRenderer);
        assert!(svg.contains("varchar"));
        assert!(svg.contains("PK"));
    }

    #[test]
    fn legend_follows_configuration() {
        let (frame, mut config) = sample_frame();
        assert!(render_svg(&frame, &config, &DefaultRenderer).contains("Enum reference"));
        config.render.show_legend = false;
        assert!(!render_svg(&frame, &config, &DefaultRenderer).contains("class=\"legend\""));
    }

    #[test]
    fn context_menu_is_drawn_when_open() {
        let (mut frame, config) = sample_frame();
        assert!(!render_svg(&frame, &config, &DefaultRenderer).contains("Add Options"));
        frame.context_menu = crate::controller::ContextMenu::Open { x: 40.0, y: 500.0 };
        assert!(render_svg(&frame, &config, &DefaultRenderer).contains("Add Options"));
    }

    #[test]
    fn row_text_sits_on_connector_anchor() {
        use crate::config::BlockLayoutConfig;
        use crate::geometry::row_anchor_y;
        use crate::measure::{EstimatedLayout, MeasurementSource};

        let config = Config::default();
        let layout = EstimatedLayout::new(&BlockLayoutConfig::default(), &config.theme);
        for row_count in [1usize, 5, 10] {
            let block = Block::new("wide", BlockType::Table, Position::new(10.0, 20.0))
                .with_rows((0..row_count).map(|idx| Row::new(format!("c{idx}"))));
            let rect = layout.measure("wide", &block).unwrap();
            let entry = BlockFrame {
                key: "wide".to_string(),
                block: block.clone(),
                rect: Some(rect),
            };
            let ctx = RenderContext {
                theme: &config.theme,
                block: &config.layout.block,
            };
            let svg = block_svg(&entry, false, &ctx, &DefaultRenderer);
            let bands = BlockBands::new(&rect, row_count);
            assert!(bands.header().height > 0.0);
            for row in 0..row_count {
                let anchor = row_anchor_y(&rect, row, row_count);
                let band = bands.row(row);
                assert!(anchor > band.y && anchor < band.bottom());
                assert!(svg.contains(&format!("y=\"{anchor:.2}\"")), "row {row} of {row_count}");
            }
        }
    }

    #[test]
    fn labels_use_primary_color_and_colors_are_escaped() {
        let (frame, mut config) = sample_frame();
        config.render.background = "url(\"#bg\")".to_string();
        config.legend = Legend::new().with(
            MarkerKind::Hexagon,
            crate::marker::LegendEntry::new("#fff\"/><script/>", "Enum reference"),
        );
        let svg = render_svg(&frame, &config, &DefaultRenderer);
        assert!(svg.contains(&format!(
            "fill=\"{}\">a &lt; b</text>",
            config.theme.primary_color
        )));
        assert!(svg.contains("fill=\"url(&quot;#bg&quot;)\""));
        assert!(!svg.contains("<script/>"));
    }

    #[test]
    fn escapes_xml_entities() {
        assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
    }
}
