//! Schematic layout: grid placement and wire routing.
//!
//! [`layout`] assigns every component a grid cell and orientation, and
//! [`route`] joins the pins of each net with orthogonal wires that stay
//! clear of component bodies. Both are deterministic for a given graph.

mod geometry;
mod placement;
mod routing;

pub use geometry::{Bounds, Cell, Point, Segment, BODY_RADIUS, CELL, PIN_REACH};
pub use placement::{layout, Orientation, PlacedComponent, Placement};
pub use routing::{merge_segments, route, NetRoute, Route, RouterConfig};
