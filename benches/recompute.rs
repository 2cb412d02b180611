use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use uml_canvas::config::{LayoutConfig, PathStyle};
use uml_canvas::{
    Block, BlockType, Config, Connection, DefaultRenderer, Diagram, EditorController, MarkerKind,
    MeasureTable, Position, Rect, Row, render_svg,
};

/// Grid of `blocks` tables with `rows` columns each; every block links to its
/// right and lower neighbour.
fn grid_scene(blocks: usize, rows: usize) -> (Diagram, MeasureTable) {
    let columns = (blocks as f32).sqrt().ceil() as usize;
    let mut diagram = Diagram::new();
    let mut measure = MeasureTable::new();
    for idx in 0..blocks {
        let key = format!("t{idx}");
        let left = (idx % columns) as f32 * 320.0;
        let top = (idx / columns) as f32 * 260.0;
        let block = Block::new(key.clone(), BlockType::Table, Position::new(left, top))
            .with_rows((0..rows).map(|row| Row::new(format!("c{row}"))));
        diagram.insert_block(key.clone(), block).expect("unique key");
        measure.record(key, Rect::new(left, top, 200.0, 40.0 + rows as f32 * 32.0));
    }
    let markers = [
        MarkerKind::Triangle,
        MarkerKind::Rectangle,
        MarkerKind::Circle,
        MarkerKind::Hexagon,
    ];
    for idx in 0..blocks {
        for next in [idx + 1, idx + columns] {
            if next < blocks && (next != idx + 1 || next % columns != 0) {
                let connection = Connection::new(
                    format!("t{idx}"),
                    idx % rows,
                    format!("t{next}"),
                    next % rows,
                )
                .with_marker(markers[idx % markers.len()]);
                diagram.add_connection(connection).expect("valid rows");
            }
        }
    }
    (diagram, measure)
}

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");
    for style in [PathStyle::Curved, PathStyle::Orthogonal] {
        let mut config = LayoutConfig::default();
        config.routing.style = style;
        for blocks in [16usize, 64, 256] {
            let (diagram, measure) = grid_scene(blocks, 6);
            let mut controller = EditorController::new(diagram, config.clone());
            group.bench_with_input(
                BenchmarkId::new(format!("{style:?}"), blocks),
                &measure,
                |b, measure| {
                    b.iter(|| black_box(controller.recompute(black_box(measure)).len()));
                },
            );
        }
    }
    group.finish();
}

fn bench_drag(c: &mut Criterion) {
    let mut group = c.benchmark_group("drag_block");
    for blocks in [16usize, 64, 256] {
        let (diagram, mut measure) = grid_scene(blocks, 6);
        let mut controller = EditorController::new(diagram, LayoutConfig::default());
        let mut step = 0.0f32;
        group.bench_function(BenchmarkId::from_parameter(blocks), |b| {
            b.iter(|| {
                step = if step > 100.0 { 0.0 } else { step + 1.0 };
                controller
                    .drag_block("t0", Position::new(step, step), &mut measure)
                    .expect("block exists");
                black_box(controller.paths().len());
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_svg");
    let config = Config::default();
    for blocks in [16usize, 64] {
        let (diagram, measure) = grid_scene(blocks, 6);
        let mut controller = EditorController::new(diagram, config.layout.clone());
        controller.recompute(&measure);
        let frame = controller.frame(&measure, &config.legend);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &frame, |b, frame| {
            b.iter(|| black_box(render_svg(black_box(frame), &config, &DefaultRenderer).len()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_recompute, bench_drag, bench_render);
criterion_main!(benches);
