#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod frame_dump;
pub mod geometry;
pub mod marker;
pub mod measure;
pub mod model;
pub mod render;
pub mod scene;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, load_config, parse_config};
pub use controller::{ContextMenu, EditorController, EditorData, EditorPanel, EditorTarget};
pub use error::{EditorError, Result};
pub use frame::Frame;
pub use geometry::{PathGeometry, Rect, compute_path};
pub use marker::{Legend, LegendEntry};
pub use measure::{EstimatedLayout, Layered, MeasureTable, MeasurementSource};
pub use model::{Block, BlockType, Connection, ConflictPolicy, Diagram, MarkerKind, Position, Row};
pub use render::{BlockRenderer, DefaultRenderer, TypedColumnsRenderer, render_svg};
pub use scene::{Scene, parse_scene};
pub use theme::Theme;

/// Routes a scene and renders it to SVG in one call. Blocks without a
/// measured box are sized by [`EstimatedLayout`].
pub fn render_scene(source: &str, config: &Config) -> anyhow::Result<String> {
    let (diagram, measured) = parse_scene(source)?;
    let measure = Layered {
        primary: measured,
        fallback: EstimatedLayout::new(&config.layout.block, &config.theme),
    };
    let mut controller = EditorController::new(diagram, config.layout.clone());
    controller.recompute(&measure);
    let frame = controller.frame(&measure, &config.legend);
    Ok(render_svg(&frame, config, &DefaultRenderer))
}
