//! Lattice geometry shared by placement, routing and the renderers.
//!
//! Grid cell `(x, y)` is centred on lattice point `(CELL * x, CELL * y)`.
//! A component body is the 3x3 block of lattice points around the centre;
//! pins sit [`PIN_REACH`] units out from the centre. Lattice row 0 is the
//! ground rail and `y` grows upwards.

use serde::Serialize;

/// Lattice units per grid cell.
pub const CELL: i32 = 6;

/// Distance from a body centre to its pins.
pub const PIN_REACH: i32 = 2;

/// Half the side of a body block.
pub const BODY_RADIUS: i32 = 1;

/// Point on the routing lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: Point) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// Placement grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Lattice point at the centre of the cell.
    pub fn center(&self) -> Point {
        Point::new(self.x * CELL, self.y * CELL)
    }

    /// Whether `p` lies inside the component body drawn in this cell.
    pub fn body_contains(&self, p: Point) -> bool {
        let c = self.center();
        (p.x - c.x).abs() <= BODY_RADIUS && (p.y - c.y).abs() <= BODY_RADIUS
    }

    /// Lattice points of the body block.
    pub fn body(&self) -> impl Iterator<Item = Point> {
        let c = self.center();
        (-BODY_RADIUS..=BODY_RADIUS)
            .flat_map(move |dy| (-BODY_RADIUS..=BODY_RADIUS).map(move |dx| c.offset(dx, dy)))
    }
}

/// Axis-aligned wire segment between two lattice points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    /// Segment with its endpoints ordered by (x, y).
    pub fn new(a: Point, b: Point) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y && self.start.x != self.end.x
    }

    pub fn is_vertical(&self) -> bool {
        self.start.x == self.end.x && self.start.y != self.end.y
    }

    pub fn is_point(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> i32 {
        self.start.manhattan(self.end)
    }

    pub fn contains(&self, p: Point) -> bool {
        if self.is_horizontal() || self.is_point() {
            p.y == self.start.y && p.x >= self.start.x && p.x <= self.end.x
        } else {
            p.x == self.start.x && p.y >= self.start.y && p.y <= self.end.y
        }
    }

    /// Every lattice point on the segment, start to end.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        let (dx, dy) = if self.is_horizontal() { (1, 0) } else { (0, 1) };
        (0..=self.len()).map(move |i| self.start.offset(dx * i, dy * i))
    }
}

/// Bounding box over lattice points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn around(p: Point) -> Self {
        Self { min: p, max: p }
    }

    pub fn include(&mut self, p: Point) {
        self.min = Point::new(self.min.x.min(p.x), self.min.y.min(p.y));
        self.max = Point::new(self.max.x.max(p.x), self.max.y.max(p.y));
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_excludes_pins() {
        let cell = Cell::new(1, 2);
        let c = cell.center();
        assert_eq!(c, Point::new(6, 12));
        assert_eq!(cell.body().count(), 9);
        assert!(cell.body_contains(c.offset(1, -1)));
        assert!(!cell.body_contains(c.offset(0, PIN_REACH)));
        assert!(!cell.body_contains(c.offset(-PIN_REACH, 1)));
    }

    #[test]
    fn test_segment_points() {
        let seg = Segment::new(Point::new(4, 3), Point::new(1, 3));
        assert_eq!(seg.start, Point::new(1, 3));
        assert!(seg.is_horizontal());
        let xs: Vec<_> = seg.points().map(|p| p.x).collect();
        assert_eq!(xs, vec![1, 2, 3, 4]);
        assert!(seg.contains(Point::new(2, 3)));
        assert!(!seg.contains(Point::new(2, 4)));
    }
}
