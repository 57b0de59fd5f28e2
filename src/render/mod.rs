//! Schematic renderers.
//!
//! Renderers are pure projections of a [`Schematic`]: they draw the placed
//! bodies, pin leads and routed wires and make no layout decisions of
//! their own.

mod ascii;
mod vector;

pub use ascii::{AsciiConfig, AsciiRenderer};
pub use vector::{Anchor, Shape, VectorConfig, VectorDiagram, VectorRenderer};

use crate::layout::{Bounds, PlacedComponent, Point};
use crate::Schematic;

/// Something that can draw a schematic.
pub trait Renderer {
    type Output;

    fn render(&self, schematic: &Schematic) -> Self::Output;
}

/// Lattice bounds covering every body, pin and wire; the origin for an empty
/// schematic.
pub(crate) fn lattice_bounds(schematic: &Schematic) -> Bounds {
    let mut bounds = schematic.placement().bounds();
    schematic.route().extend_bounds(&mut bounds);
    bounds.unwrap_or_else(|| Bounds::around(Point::new(0, 0)))
}

/// Text shown next to a component: reference, then value when wanted.
pub(crate) fn component_label(schematic: &Schematic, placed: &PlacedComponent, values: bool) -> String {
    let value = schematic
        .graph()
        .component(placed.id)
        .value_label()
        .filter(|_| values);
    match value {
        Some(value) => format!("{} {}", placed.reference, value),
        None => placed.reference.clone(),
    }
}
