//! Connector geometry between row anchors of two blocks.
//!
//! Everything here is pure: the same rectangles, rows and routing settings
//! always produce the same path string and midpoint.

use serde::{Deserialize, Serialize};

use crate::config::{PathStyle, RoutingConfig};

/// Axis aligned box in canvas coordinates; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// False for boxes that were never laid out (zero area or NaN).
    pub fn is_measurable(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

/// Renderable connector: an SVG path plus the point markers and labels hang off.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PathGeometry {
    pub d: String,
    pub mid_x: f32,
    pub mid_y: f32,
}

impl PathGeometry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.d.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeSide {
    Left,
    Right,
}

impl EdgeSide {
    fn outward(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    fn edge_x(self, rect: &Rect) -> f32 {
        match self {
            Self::Left => rect.x,
            Self::Right => rect.right(),
        }
    }
}

/// Vertical anchor of `row` inside a block of `row_count` rows.
///
/// The box is cut into `row_count + 1` even slots and row `i` anchors on the
/// `i + 1`th slot boundary. Rows past the end clamp to the last row; a block
/// without rows anchors at its vertical centre.
pub fn row_anchor_y(rect: &Rect, row: usize, row_count: usize) -> f32 {
    if row_count == 0 {
        return rect.y + rect.height / 2.0;
    }
    let slot = rect.height / (row_count + 1) as f32;
    let index = row.min(row_count - 1);
    rect.y + slot * (index + 1) as f32
}

/// Horizontal bands a block is drawn in, laid out so that every row band is
/// centred on its [`row_anchor_y`]. The header and footer get half a slot each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockBands {
    rect: Rect,
    slot: f32,
    row_count: usize,
}

impl BlockBands {
    pub fn new(rect: &Rect, row_count: usize) -> Self {
        Self {
            rect: *rect,
            slot: rect.height / (row_count + 1) as f32,
            row_count,
        }
    }

    /// Height of one row band.
    pub fn slot(&self) -> f32 {
        self.slot
    }

    pub fn header(&self) -> Rect {
        Rect::new(self.rect.x, self.rect.y, self.rect.width, self.slot / 2.0)
    }

    pub fn row(&self, index: usize) -> Rect {
        let index = index.min(self.row_count.saturating_sub(1));
        Rect::new(
            self.rect.x,
            self.rect.y + self.slot * (index as f32 + 0.5),
            self.rect.width,
            self.slot,
        )
    }

    pub fn footer(&self) -> Rect {
        let top = self.rect.y + self.slot * (self.row_count as f32 + 0.5);
        Rect::new(self.rect.x, top, self.rect.width, self.rect.bottom() - top)
    }
}

/// Edges the connector leaves `from` and enters `to` through.
///
/// Separated blocks use their facing edges. Blocks that overlap horizontally
/// share one side and the path loops around the outside of both.
pub fn edge_sides(from: &Rect, to: &Rect) -> (EdgeSide, EdgeSide) {
    if from.right() <= to.x {
        (EdgeSide::Right, EdgeSide::Left)
    } else if to.right() <= from.x {
        (EdgeSide::Left, EdgeSide::Right)
    } else if from.center_x() <= to.center_x() {
        (EdgeSide::Right, EdgeSide::Right)
    } else {
        (EdgeSide::Left, EdgeSide::Left)
    }
}

/// Path from row `from_row` of the first block to row `to_row` of the second.
///
/// Either rectangle missing or unmeasurable yields an empty path with a
/// (0, 0) midpoint.
pub fn compute_path(
    rect1: Option<&Rect>,
    rect2: Option<&Rect>,
    from_row: usize,
    to_row: usize,
    row_count1: usize,
    row_count2: usize,
    routing: &RoutingConfig,
) -> PathGeometry {
    let (Some(from), Some(to)) = (
        rect1.filter(|rect| rect.is_measurable()),
        rect2.filter(|rect| rect.is_measurable()),
    ) else {
        return PathGeometry::empty();
    };

    let (start_side, end_side) = edge_sides(from, to);
    let start = (start_side.edge_x(from), row_anchor_y(from, from_row, row_count1));
    let end = (end_side.edge_x(to), row_anchor_y(to, to_row, row_count2));
    let route = Route {
        from,
        to,
        start,
        end,
        start_side,
        end_side,
    };

    match routing.style {
        PathStyle::Curved => route.curved(routing),
        PathStyle::Orthogonal => route.orthogonal(routing),
    }
}

struct Route<'a> {
    from: &'a Rect,
    to: &'a Rect,
    start: (f32, f32),
    end: (f32, f32),
    start_side: EdgeSide,
    end_side: EdgeSide,
}

impl Route<'_> {
    fn facing(&self) -> bool {
        self.start_side != self.end_side
    }

    /// Column outside both blocks used when the anchors share a side.
    fn loop_column(&self, routing: &RoutingConfig) -> f32 {
        match self.start_side {
            EdgeSide::Right => self.from.right().max(self.to.right()) + routing.loop_offset,
            EdgeSide::Left => self.from.x.min(self.to.x) - routing.loop_offset,
        }
    }

    fn curved(&self, routing: &RoutingConfig) -> PathGeometry {
        let (c1, c2) = if self.facing() {
            let dx = (self.end.0 - self.start.0).abs();
            let offset = (dx * routing.curvature).max(routing.min_control_offset);
            (
                (self.start.0 + self.start_side.outward() * offset, self.start.1),
                (self.end.0 + self.end_side.outward() * offset, self.end.1),
            )
        } else {
            let column = self.loop_column(routing);
            ((column, self.start.1), (column, self.end.1))
        };
        let curve = CubicBezier {
            p0: self.start,
            p1: c1,
            p2: c2,
            p3: self.end,
        };
        let (mid_x, mid_y) = curve.eval(0.5);
        PathGeometry {
            d: format!(
                "M {:.2} {:.2} C {:.2} {:.2}, {:.2} {:.2}, {:.2} {:.2}",
                self.start.0, self.start.1, c1.0, c1.1, c2.0, c2.1, self.end.0, self.end.1
            ),
            mid_x,
            mid_y,
        }
    }

    fn orthogonal(&self, routing: &RoutingConfig) -> PathGeometry {
        let column = if self.facing() {
            (self.start.0 + self.end.0) / 2.0
        } else {
            self.loop_column(routing)
        };
        PathGeometry {
            d: format!(
                "M {:.2} {:.2} H {:.2} V {:.2} H {:.2}",
                self.start.0, self.start.1, column, self.end.1, self.end.0
            ),
            mid_x: column,
            mid_y: (self.start.1 + self.end.1) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CubicBezier {
    p0: (f32, f32),
    p1: (f32, f32),
    p2: (f32, f32),
    p3: (f32, f32),
}

impl CubicBezier {
    fn eval(&self, t: f32) -> (f32, f32) {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        (
            a * self.p0.0 + b * self.p1.0 + c * self.p2.0 + d * self.p3.0,
            a * self.p0.1 + b * self.p1.1 + c * self.p2.1 + d * self.p3.1,
        )
    }
}
