use crate::config::{Config, load_config};
use crate::controller::EditorController;
use crate::frame_dump::{FrameDump, write_frame_dump};
use crate::measure::{EstimatedLayout, Layered};
use crate::render::{BlockRenderer, DefaultRenderer, TypedColumnsRenderer, render_svg, write_output_svg};
use crate::scene::parse_scene;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "umlc", version, about = "Route and render UML table/enum scenes")]
pub struct Args {
    /// Scene file (.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png/json). Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, routing, legend, ...)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// Re-key blocks to their ids before routing, as closing the editor does
    #[arg(long = "reconcile")]
    pub reconcile: bool,

    /// Show column types next to column names
    #[arg(long = "typedColumns")]
    pub typed_columns: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;

    let source = read_input(args.input.as_deref())?;
    let (diagram, measured) = parse_scene(&source)?;
    let mut measure = Layered {
        primary: measured,
        fallback: EstimatedLayout::new(&config.layout.block, &config.theme),
    };

    let mut controller = EditorController::new(diagram, config.layout.clone());
    let reconciliation = args
        .reconcile
        .then(|| controller.commit_identity(&mut measure));
    controller.recompute(&measure);
    let frame = controller.frame(&measure, &config.legend);

    match args.output_format {
        OutputFormat::Json => {
            let dump = FrameDump::from_frame(&frame).with_reconciliation(reconciliation);
            match args.output.as_deref() {
                Some(path) => write_frame_dump(path, &dump)?,
                None => println!("{}", serde_json::to_string_pretty(&dump)?),
            }
        }
        OutputFormat::Svg => {
            let svg = render(&frame, &config, args.typed_columns);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render(&frame, &config, args.typed_columns);
            write_png(&svg, &output, &config)?;
        }
    }
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when embedded in another binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn render(frame: &crate::frame::Frame, config: &Config, typed_columns: bool) -> String {
    let renderer: &dyn BlockRenderer = if typed_columns {
        &TypedColumnsRenderer
    } else {
        &DefaultRenderer
    };
    render_svg(frame, config, renderer)
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &Config) -> Result<()> {
    crate::render::write_output_png(svg, output, &config.render, &config.theme)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "umlc",
            "-i",
            "scene.json5",
            "-e",
            "json",
            "--reconcile",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("scene.json5")));
        assert!(matches!(args.output_format, OutputFormat::Json));
        assert!(args.reconcile);
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.width, 1200.0);
    }

    #[test]
    fn png_requires_output_path() {
        assert!(ensure_output(&None, "png").is_err());
        assert_eq!(
            ensure_output(&Some(PathBuf::from("out.png")), "png").unwrap(),
            PathBuf::from("out.png")
        );
    }
}
