//! Grid placement of components.
//!
//! Placement is greedy and runs in declaration order, so identical graphs
//! always produce identical placements:
//!
//! 1. Ground stacks: every two-terminal component touching ground starts a
//!    column on row 1 with its ground pin down on the rail. The column then
//!    grows upward with components that continue the stack's `from -> to`
//!    direction from its top net.
//! 2. Multi-pin components get a column each, pins fixed by the kind schema.
//! 3. Floating chains: the remaining two-terminal components are chained in
//!    series and stacked on the column whose top net they continue. A single
//!    component joining the tops of two columns is laid across as a bridge.
//!    Chains with nowhere to attach go above the leftmost column that shares
//!    no net with them, or in a new column.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::geometry::{Bounds, Cell, Point, PIN_REACH};
use crate::circuit::{CircuitGraph, Component, ComponentId, NetId};
use crate::kinds::{KindTable, PinSpec, Side};

/// Which way a component's body is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A component with its grid cell and pin locations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedComponent {
    pub id: ComponentId,
    pub reference: String,
    pub kind: String,
    pub cell: Cell,
    pub orientation: Orientation,
    /// `from` drawn at the top (vertical) or right (horizontal)
    pub flipped: bool,
    /// Pin name to lattice point
    pub pins: IndexMap<String, Point>,
}

impl PlacedComponent {
    pub fn center(&self) -> Point {
        self.cell.center()
    }

    pub fn pin(&self, name: &str) -> Option<Point> {
        self.pins.get(name).copied()
    }

    pub fn is_vertical(&self) -> bool {
        self.orientation == Orientation::Vertical
    }
}

/// Placement of every component, keyed by reference in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Placement {
    components: IndexMap<String, PlacedComponent>,
}

impl Placement {
    pub fn get(&self, reference: &str) -> Option<&PlacedComponent> {
        self.components.get(reference)
    }

    /// Placement of a component by graph id.
    pub fn component(&self, id: ComponentId) -> Option<&PlacedComponent> {
        self.components
            .get_index(id.0)
            .map(|(_, placed)| placed)
            .filter(|placed| placed.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedComponent> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn pin_point(&self, id: ComponentId, pin: &str) -> Option<Point> {
        self.component(id).and_then(|placed| placed.pin(pin))
    }

    /// Component whose body covers `p`.
    pub fn body_at(&self, p: Point) -> Option<&PlacedComponent> {
        self.iter().find(|placed| placed.cell.body_contains(p))
    }

    /// Lattice bounds over bodies and pins.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut points = self
            .iter()
            .flat_map(|placed| placed.cell.body().chain(placed.pins.values().copied()));
        let mut bounds = Bounds::around(points.next()?);
        for p in points {
            bounds.include(p);
        }
        Some(bounds)
    }
}

/// Place every component of `graph` on the grid.
pub fn layout(graph: &CircuitGraph, kinds: &KindTable) -> Placement {
    LayoutEngine::new(graph, kinds).run()
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    cell: Cell,
    orientation: Orientation,
    flipped: bool,
}

/// A column of stacked cells.
#[derive(Debug)]
struct Column {
    x: i32,
    /// Highest occupied row
    top: i32,
    /// Net on the upward-facing pin of the top component, if it can be extended
    top_net: Option<NetId>,
    /// Whether the stack runs `from -> to` upwards
    rising: bool,
    nets: HashSet<NetId>,
}

/// Floating chain, bottom component first.
struct Chain {
    links: Vec<(ComponentId, bool)>,
    bottom: NetId,
    top: NetId,
    nets: HashSet<NetId>,
}

impl Chain {
    /// Turn the chain upside down.
    fn reversed(self) -> Self {
        Self {
            links: self.links.into_iter().rev().map(|(id, flipped)| (id, !flipped)).collect(),
            bottom: self.top,
            top: self.bottom,
            nets: self.nets,
        }
    }
}

struct LayoutEngine<'a> {
    graph: &'a CircuitGraph,
    kinds: &'a KindTable,
    slots: Vec<Option<Slot>>,
    columns: Vec<Column>,
    occupied: HashSet<Cell>,
}

impl<'a> LayoutEngine<'a> {
    fn new(graph: &'a CircuitGraph, kinds: &'a KindTable) -> Self {
        Self {
            graph,
            kinds,
            slots: vec![None; graph.components().len()],
            columns: Vec::new(),
            occupied: HashSet::new(),
        }
    }

    fn run(mut self) -> Placement {
        self.place_ground_stacks();
        self.place_multi_pin();
        self.place_floating();

        let placement = self.finish();
        debug!(
            components = placement.len(),
            columns = self.columns.len(),
            "placed components"
        );
        placement
    }

    fn place_ground_stacks(&mut self) {
        let graph = self.graph;
        for component in graph.components() {
            if self.is_placed(component.id) {
                continue;
            }
            let Some((from, to)) = ends(component) else {
                continue;
            };
            if !graph.is_ground(from) && !graph.is_ground(to) {
                continue;
            }

            let flipped = !graph.is_ground(from);
            let top_net = if flipped { from } else { to };
            let column = self.new_column();
            self.put(component.id, column, 1, Orientation::Vertical, flipped);

            let col = &mut self.columns[column];
            col.top_net = (!graph.is_ground(top_net)).then_some(top_net);
            col.rising = !flipped;
            self.extend_stack(column);
        }
    }

    /// Grow a column upward with direction-consistent components.
    fn extend_stack(&mut self, column: usize) {
        let graph = self.graph;
        while let Some(top) = self.columns[column].top_net {
            let rising = self.columns[column].rising;
            let next = graph.components().iter().find(|c| {
                !self.is_placed(c.id)
                    && !self.touches_ground(c)
                    && ends(c).is_some_and(|(from, to)| if rising { from == top } else { to == top })
            });
            let Some(next) = next else {
                break;
            };
            let Some((from, to)) = ends(next) else {
                break;
            };

            let row = self.columns[column].top + 1;
            self.put(next.id, column, row, Orientation::Vertical, !rising);
            self.columns[column].top_net = Some(if rising { to } else { from });
        }
    }

    fn place_multi_pin(&mut self) {
        let graph = self.graph;
        for component in graph.components() {
            if self.is_placed(component.id) || component.is_two_terminal() {
                continue;
            }
            let column = self.new_column();
            self.put(component.id, column, 1, Orientation::Vertical, false);

            let top_net = self
                .pin_specs(component)
                .into_iter()
                .filter(|spec| spec.side == Side::Top)
                .min_by_key(|spec| spec.offset.abs())
                .and_then(|spec| component.net(&spec.name))
                .filter(|net| !graph.is_ground(*net));
            let col = &mut self.columns[column];
            col.top_net = top_net;
            col.rising = true;
        }
    }

    fn place_floating(&mut self) {
        let graph = self.graph;
        for component in graph.components() {
            if self.is_placed(component.id) {
                continue;
            }
            let Some((from, to)) = ends(component) else {
                continue;
            };

            if let (Some(a), Some(b)) = (self.column_topped_by(from), self.column_topped_by(to)) {
                if a != b {
                    self.place_bridge(component.id, a, b);
                    continue;
                }
            }

            let chain = self.chain_from(component.id, from, to);
            self.place_chain(chain);
        }
    }

    /// Lay a component across the tops of two columns, over the left one.
    fn place_bridge(&mut self, id: ComponentId, from_column: usize, to_column: usize) {
        let (left, flipped) = if self.columns[from_column].x < self.columns[to_column].x {
            (from_column, false)
        } else {
            (to_column, true)
        };
        let row = self.columns[left].top + 1;
        self.put(id, left, row, Orientation::Horizontal, flipped);
        self.columns[left].top_net = None;
    }

    /// Series chain of unplaced components growing up from `start`.
    fn chain_from(&self, start: ComponentId, bottom: NetId, mut top: NetId) -> Chain {
        let mut links = vec![(start, false)];
        let mut nets: HashSet<NetId> = [bottom, top].into_iter().collect();

        loop {
            let in_chain = |id: ComponentId| links.iter().any(|(linked, _)| *linked == id);
            let next = self
                .graph
                .components()
                .iter()
                .filter(|c| !self.is_placed(c.id) && !in_chain(c.id))
                .find_map(|c| match ends(c) {
                    Some((from, to)) if from == top => Some((c.id, false, to)),
                    Some((from, to)) if to == top => Some((c.id, true, from)),
                    _ => None,
                });
            let Some((id, flipped, next_top)) = next else {
                break;
            };
            links.push((id, flipped));
            nets.insert(next_top);
            top = next_top;
        }

        Chain {
            links,
            bottom,
            top,
            nets,
        }
    }

    fn place_chain(&mut self, chain: Chain) {
        let attach = self.columns.iter().enumerate().find_map(|(index, col)| match col.top_net {
            Some(net) if net == chain.bottom => Some((index, false)),
            Some(net) if net == chain.top => Some((index, true)),
            _ => None,
        });

        let (column, chain, row) = match attach {
            Some((index, reverse)) => {
                let chain = if reverse { chain.reversed() } else { chain };
                (index, chain, self.columns[index].top + 1)
            }
            None => {
                let packed = self
                    .columns
                    .iter()
                    .position(|col| col.nets.is_disjoint(&chain.nets));
                match packed {
                    // Leave a blank row between unrelated stacks.
                    Some(index) => (index, chain, self.columns[index].top + 2),
                    None => (self.new_column(), chain, 1),
                }
            }
        };

        let mut row = row;
        for &(id, flipped) in &chain.links {
            row = self.put(id, column, row, Orientation::Vertical, flipped) + 1;
        }

        let col = &mut self.columns[column];
        col.top_net = Some(chain.top);
        col.rising = chain.links.last().map_or(true, |(_, flipped)| !flipped);
    }

    fn new_column(&mut self) -> usize {
        let index = self.columns.len();
        self.columns.push(Column {
            x: index as i32,
            top: 0,
            top_net: None,
            rising: true,
            nets: HashSet::new(),
        });
        index
    }

    /// Put a component in the first free row at or above `row`; returns the
    /// row used.
    fn put(
        &mut self,
        id: ComponentId,
        column: usize,
        row: i32,
        orientation: Orientation,
        flipped: bool,
    ) -> i32 {
        let x = self.columns[column].x;
        let mut row = row.max(1);
        while self.occupied.contains(&Cell::new(x, row)) {
            row += 1;
        }
        let cell = Cell::new(x, row);
        self.occupied.insert(cell);
        self.slots[id.0] = Some(Slot {
            cell,
            orientation,
            flipped,
        });

        let nets: Vec<NetId> = self.graph.component(id).pins.values().copied().collect();
        let col = &mut self.columns[column];
        col.top = col.top.max(row);
        col.nets.extend(nets);
        row
    }

    fn is_placed(&self, id: ComponentId) -> bool {
        self.slots[id.0].is_some()
    }

    fn touches_ground(&self, component: &Component) -> bool {
        component.pins.values().any(|net| self.graph.is_ground(*net))
    }

    fn column_topped_by(&self, net: NetId) -> Option<usize> {
        self.columns.iter().position(|col| col.top_net == Some(net))
    }

    /// Pin specs for a multi-pin component; pins the kind does not describe
    /// are spread around the body in order.
    fn pin_specs(&self, component: &Component) -> Vec<PinSpec> {
        let spec = self.kinds.get(&component.kind);
        component
            .pins
            .keys()
            .enumerate()
            .map(|(index, name)| {
                spec.and_then(|s| s.pins.pin(name))
                    .cloned()
                    .unwrap_or_else(|| fallback_pin(name, index))
            })
            .collect()
    }

    fn finish(&self) -> Placement {
        let mut components = IndexMap::new();
        for component in self.graph.components() {
            let Some(slot) = self.slots[component.id.0] else {
                continue;
            };
            let center = slot.cell.center();
            let pins = if component.is_two_terminal() {
                two_terminal_pins(center, slot.orientation, slot.flipped)
            } else {
                self.pin_specs(component)
                    .into_iter()
                    .map(|spec| {
                        let point = pin_point(center, &spec);
                        (spec.name, point)
                    })
                    .collect()
            };
            components.insert(
                component.reference.clone(),
                PlacedComponent {
                    id: component.id,
                    reference: component.reference.clone(),
                    kind: component.kind.clone(),
                    cell: slot.cell,
                    orientation: slot.orientation,
                    flipped: slot.flipped,
                    pins,
                },
            );
        }
        Placement { components }
    }
}

/// `(from, to)` nets of a two-terminal component.
fn ends(component: &Component) -> Option<(NetId, NetId)> {
    if !component.is_two_terminal() {
        return None;
    }
    Some((component.net("from")?, component.net("to")?))
}

fn two_terminal_pins(center: Point, orientation: Orientation, flipped: bool) -> IndexMap<String, Point> {
    let (low, high) = match orientation {
        Orientation::Vertical => (center.offset(0, -PIN_REACH), center.offset(0, PIN_REACH)),
        Orientation::Horizontal => (center.offset(-PIN_REACH, 0), center.offset(PIN_REACH, 0)),
    };
    let (from, to) = if flipped { (high, low) } else { (low, high) };
    [("from".to_string(), from), ("to".to_string(), to)]
        .into_iter()
        .collect()
}

fn pin_point(center: Point, spec: &PinSpec) -> Point {
    match spec.side {
        Side::Left => center.offset(-PIN_REACH, spec.offset),
        Side::Right => center.offset(PIN_REACH, spec.offset),
        Side::Top => center.offset(spec.offset, PIN_REACH),
        Side::Bottom => center.offset(spec.offset, -PIN_REACH),
    }
}

fn fallback_pin(name: &str, index: usize) -> PinSpec {
    const SIDES: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];
    const OFFSETS: [i32; 3] = [0, -1, 1];
    PinSpec::new(name, SIDES[index % 4], OFFSETS[(index / 4) % 3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{build_graph, BuildOptions};
    use crate::dsl::parse;

    fn place(input: &str) -> Placement {
        let kinds = KindTable::builtin();
        let parsed = parse(input, &kinds);
        let (graph, diagnostics) = build_graph(&parsed.statements, &kinds, &BuildOptions::default());
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        layout(&graph, &kinds)
    }

    fn cell(placement: &Placement, reference: &str) -> (i32, i32) {
        let c = placement.get(reference).unwrap().cell;
        (c.x, c.y)
    }

    const DIVIDER: &str = "\
ground GND
node v_in, v_out
battery V1 +9V from GND to v_out
resistor R1 10k from v_in to v_out
resistor R2 5k from v_out to GND";

    #[test]
    fn test_divider_stacks_r1_over_r2() {
        let placement = place(DIVIDER);
        assert_eq!(cell(&placement, "V1"), (0, 1));
        assert_eq!(cell(&placement, "R2"), (1, 1));
        assert_eq!(cell(&placement, "R1"), (1, 2));

        let r2 = placement.get("R2").unwrap();
        let r1 = placement.get("R1").unwrap();
        assert!(r2.flipped);
        // R2's ground pin sits on the bottom, v_out on top meets R1's `to`.
        assert_eq!(r2.pin("to"), Some(Point::new(6, 4)));
        assert_eq!(r2.pin("from").map(|p| p.y), Some(8));
        assert_eq!(r1.pin("to").map(|p| p.y), Some(10));
    }

    #[test]
    fn test_layout_is_deterministic() {
        assert_eq!(place(DIVIDER), place(DIVIDER));
    }

    #[test]
    fn test_multi_pin_uses_schema_sides() {
        let placement = place("ground GND\ntransistor Q1 base=b collector=c emitter=GND\nresistor RC 1k from c to vcc");
        let q1 = placement.get("Q1").unwrap();
        let center = q1.center();
        assert_eq!(q1.pin("base"), Some(center.offset(-2, 0)));
        assert_eq!(q1.pin("collector"), Some(center.offset(0, 2)));
        assert_eq!(q1.pin("emitter"), Some(center.offset(0, -2)));
        // The collector load stacks on the transistor.
        assert_eq!(cell(&placement, "RC"), (q1.cell.x, q1.cell.y + 1));
    }

    #[test]
    fn test_bridge_between_columns() {
        let placement = place(
            "ground GND\n\
             resistor R1 1k from GND to a\n\
             resistor R2 1k from b to GND\n\
             resistor R3 1k from b to a",
        );
        let r3 = placement.get("R3").unwrap();
        assert_eq!(r3.orientation, Orientation::Horizontal);
        assert_eq!((r3.cell.x, r3.cell.y), (0, 2));
        // `from` is on the right-hand column.
        assert!(r3.flipped);
        assert_eq!(r3.pin("from"), Some(Point::new(2, 12)));
    }

    #[test]
    fn test_floating_chain_gets_own_column() {
        let placement = place("resistor R1 1k from a to b\nresistor R2 1k from b to c");
        assert_eq!(cell(&placement, "R1"), (0, 1));
        assert_eq!(cell(&placement, "R2"), (0, 2));
    }

    #[test]
    fn test_no_two_components_share_a_cell() {
        let placement = place(
            "ground GND\n\
             resistor R1 1k from GND to a\n\
             resistor R2 1k from a to b\n\
             resistor R3 1k from a to b\n\
             capacitor C1 1u from b to GND\n\
             opamp U1 in_p=a in_n=b out=c\n\
             resistor R4 1k from x to y",
        );
        let cells: HashSet<Cell> = placement.iter().map(|p| p.cell).collect();
        assert_eq!(cells.len(), placement.len());
        assert_eq!(placement.len(), 6);
    }
}
