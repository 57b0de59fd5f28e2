//! Wire routing (orthogonal Manhattan paths).
//!
//! Each net's pins are joined one at a time, in (x, y) order, to the nearest
//! point already wired for that net. A connection tries the two L-routes
//! first, then dog-legs pushed one lattice unit further out per attempt (a
//! row above, a column to either side). Paths may never cross a component
//! body. A path that lies along another net's wire or touches its pins is
//! only taken when nothing better exists, and the net is then reported as
//! not cleanly routed.
//!
//! Ground pins drop straight onto the rail at lattice row 0, and the rail
//! runs between the outermost drops.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, warn};

use super::geometry::{Bounds, Point, Segment};
use super::placement::Placement;
use crate::circuit::{CircuitGraph, NetId};
use crate::error::{Diagnostics, Issue};

/// Nearest wired points tried per connection.
const MAX_TARGETS: usize = 4;

/// Router settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Dog-leg shifts tried before a connection is given up as unroutable
    pub max_shift_attempts: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_shift_attempts: 8,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_shift_attempts(mut self, attempts: usize) -> Self {
        self.max_shift_attempts = attempts;
        self
    }
}

/// Wiring of one net.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetRoute {
    pub net: NetId,
    pub name: String,
    pub is_ground: bool,
    /// Merged, axis-aligned segments
    pub segments: Vec<Segment>,
    /// Points where three or more wires or pins meet
    pub junctions: Vec<Point>,
    /// False when some connection had to cross a component body
    pub clean: bool,
}

/// Routed wiring keyed by canonical net name, in net order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Route {
    nets: IndexMap<String, NetRoute>,
}

impl Route {
    pub fn get(&self, net: &str) -> Option<&NetRoute> {
        self.nets.get(net)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetRoute> {
        self.nets.values()
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Extend `bounds` with every wire point.
    pub fn extend_bounds(&self, bounds: &mut Option<Bounds>) {
        for segment in self.iter().flat_map(|net| net.segments.iter()) {
            for p in [segment.start, segment.end] {
                match bounds {
                    Some(b) => b.include(p),
                    None => *bounds = Some(Bounds::around(p)),
                }
            }
        }
    }
}

/// Route every net of `graph` over `placement`.
pub fn route(
    graph: &CircuitGraph,
    placement: &Placement,
    config: &RouterConfig,
) -> (Route, Diagnostics) {
    Router::new(graph, placement, config).run()
}

struct Router<'a> {
    graph: &'a CircuitGraph,
    placement: &'a Placement,
    config: &'a RouterConfig,
    bodies: HashSet<Point>,
    pin_owner: HashMap<Point, NetId>,
    horizontal: HashMap<Point, NetId>,
    vertical: HashMap<Point, NetId>,
}

impl<'a> Router<'a> {
    fn new(graph: &'a CircuitGraph, placement: &'a Placement, config: &'a RouterConfig) -> Self {
        let bodies = placement.iter().flat_map(|placed| placed.cell.body()).collect();

        let mut pin_owner = HashMap::new();
        for net in graph.nets() {
            for pin in graph.pins_on(net.id) {
                if let Some(p) = placement.pin_point(pin.component, &pin.pin) {
                    pin_owner.entry(p).or_insert(net.id);
                }
            }
        }

        Self {
            graph,
            placement,
            config,
            bodies,
            pin_owner,
            horizontal: HashMap::new(),
            vertical: HashMap::new(),
        }
    }

    fn run(mut self) -> (Route, Diagnostics) {
        let mut route = Route::default();
        let mut diagnostics = Diagnostics::new();
        let graph = self.graph;
        let placement = self.placement;

        for net in graph.nets() {
            let mut pins: Vec<Point> = graph
                .pins_on(net.id)
                .iter()
                .filter_map(|pin| placement.pin_point(pin.component, &pin.pin))
                .collect();
            if pins.is_empty() {
                continue;
            }
            pins.sort();
            pins.dedup();

            let (segments, clean) = if net.is_ground {
                self.route_ground(net.id, &pins)
            } else {
                self.route_net(net.id, &pins)
            };
            let segments = merge_segments(&segments);
            self.claim(net.id, &segments);
            let junctions = junctions(&segments, &pins);

            if !clean {
                warn!(net = %net.name, "net could not be routed clear of components and other nets");
                diagnostics.report(
                    net.line,
                    Issue::UnroutableNet {
                        net: net.name.clone(),
                    },
                );
            }

            route.nets.insert(
                net.name.clone(),
                NetRoute {
                    net: net.id,
                    name: net.name.clone(),
                    is_ground: net.is_ground,
                    segments,
                    junctions,
                    clean,
                },
            );
        }

        debug!(
            nets = route.len(),
            unroutable = diagnostics.len(),
            "routed nets"
        );
        (route, diagnostics)
    }

    /// Spanning connector over `pins`, which are sorted.
    fn route_net(&self, net: NetId, pins: &[Point]) -> (Vec<Segment>, bool) {
        let Some((&first, rest)) = pins.split_first() else {
            return (Vec::new(), true);
        };
        let mut tree: IndexSet<Point> = IndexSet::from([first]);
        let mut segments = Vec::new();
        let mut clean = true;

        for &pin in rest {
            self.join(net, pin, &mut tree, &mut segments, &mut clean);
        }
        (segments, clean)
    }

    fn route_ground(&self, net: NetId, pins: &[Point]) -> (Vec<Segment>, bool) {
        let mut segments = Vec::new();
        let mut feet: Vec<i32> = Vec::new();
        let mut deferred = Vec::new();

        for &pin in pins {
            let stub = [Segment::new(pin, Point::new(pin.x, 0))];
            if pin.y >= 0 && !self.hits_body(&stub) && !self.conflicts(net, &stub) {
                if !stub[0].is_point() {
                    segments.push(stub[0]);
                }
                feet.push(pin.x);
            } else {
                deferred.push(pin);
            }
        }

        if let (Some(&min), Some(&max)) = (feet.iter().min(), feet.iter().max()) {
            if min < max {
                segments.push(Segment::new(Point::new(min, 0), Point::new(max, 0)));
            }
        }

        let mut tree: IndexSet<Point> = segments.iter().flat_map(|s| s.points()).collect();
        if let Some(&x) = feet.first() {
            tree.insert(Point::new(x, 0));
        }
        let mut clean = true;
        for pin in deferred {
            if tree.is_empty() {
                tree.insert(pin);
                continue;
            }
            self.join(net, pin, &mut tree, &mut segments, &mut clean);
        }
        (segments, clean)
    }

    /// Wire `pin` to the tree and grow the tree by the new path.
    fn join(
        &self,
        net: NetId,
        pin: Point,
        tree: &mut IndexSet<Point>,
        segments: &mut Vec<Segment>,
        clean: &mut bool,
    ) {
        if tree.contains(&pin) {
            return;
        }
        let (path, ok) = self.connect(net, pin, tree);
        *clean &= ok;
        for segment in path {
            tree.extend(segment.points());
            segments.push(segment);
        }
        tree.insert(pin);
    }

    /// Best path from `from` to the wired points in `tree`; the flag is false
    /// unless the path is clear of bodies and of every other net.
    fn connect(&self, net: NetId, from: Point, tree: &IndexSet<Point>) -> (Vec<Segment>, bool) {
        let mut targets: Vec<Point> = tree.iter().copied().collect();
        targets.sort_by_key(|t| t.manhattan(from));

        let mut crowded = None;
        for &target in targets.iter().take(MAX_TARGETS) {
            for candidate in self.candidates(from, target) {
                if self.hits_body(&candidate) {
                    continue;
                }
                if !self.conflicts(net, &candidate) {
                    return (candidate, true);
                }
                crowded.get_or_insert(candidate);
            }
        }

        match crowded {
            Some(path) => (path, false),
            None => {
                let nearest = targets.first().copied().unwrap_or(from);
                (polyline(&[from, Point::new(from.x, nearest.y), nearest]), false)
            }
        }
    }

    /// Candidate paths in preference order.
    fn candidates(&self, a: Point, b: Point) -> Vec<Vec<Segment>> {
        let mut out = vec![
            polyline(&[a, Point::new(a.x, b.y), b]),
            polyline(&[a, Point::new(b.x, a.y), b]),
        ];
        for k in 1..=self.config.max_shift_attempts as i32 {
            let row = a.y.max(b.y) + k;
            out.push(polyline(&[a, Point::new(a.x, row), Point::new(b.x, row), b]));
            let right = a.x.max(b.x) + k;
            out.push(polyline(&[a, Point::new(right, a.y), Point::new(right, b.y), b]));
            let left = a.x.min(b.x) - k;
            out.push(polyline(&[a, Point::new(left, a.y), Point::new(left, b.y), b]));
        }
        out
    }

    fn hits_body(&self, path: &[Segment]) -> bool {
        path.iter()
            .flat_map(|s| s.points())
            .any(|p| self.bodies.contains(&p))
    }

    /// Whether a path runs along, ends on, or passes a pin of another net.
    fn conflicts(&self, net: NetId, path: &[Segment]) -> bool {
        let foreign = |owner: Option<&NetId>| owner.is_some_and(|o| *o != net);
        path.iter().any(|segment| {
            let along = if segment.is_vertical() {
                &self.vertical
            } else {
                &self.horizontal
            };
            segment.points().any(|p| {
                foreign(self.pin_owner.get(&p)) || foreign(along.get(&p))
            }) || [segment.start, segment.end].into_iter().any(|p| {
                foreign(self.horizontal.get(&p)) || foreign(self.vertical.get(&p))
            })
        })
    }

    fn claim(&mut self, net: NetId, segments: &[Segment]) {
        for segment in segments {
            let map = if segment.is_vertical() {
                &mut self.vertical
            } else {
                &mut self.horizontal
            };
            for p in segment.points() {
                map.entry(p).or_insert(net);
            }
        }
    }
}

/// Segments through consecutive points, dropping zero-length ones.
fn polyline(points: &[Point]) -> Vec<Segment> {
    points
        .windows(2)
        .filter(|pair| pair[0] != pair[1])
        .map(|pair| Segment::new(pair[0], pair[1]))
        .collect()
}

/// Merge overlapping and touching colinear segments.
pub fn merge_segments(segments: &[Segment]) -> Vec<Segment> {
    let mut rows: BTreeMap<i32, Vec<(i32, i32)>> = BTreeMap::new();
    let mut cols: BTreeMap<i32, Vec<(i32, i32)>> = BTreeMap::new();
    for segment in segments {
        if segment.is_horizontal() {
            rows.entry(segment.start.y)
                .or_default()
                .push((segment.start.x, segment.end.x));
        } else if segment.is_vertical() {
            cols.entry(segment.start.x)
                .or_default()
                .push((segment.start.y, segment.end.y));
        }
    }

    let mut merged = Vec::new();
    for (y, spans) in rows {
        for (a, b) in merge_spans(spans) {
            merged.push(Segment::new(Point::new(a, y), Point::new(b, y)));
        }
    }
    for (x, spans) in cols {
        for (a, b) in merge_spans(spans) {
            merged.push(Segment::new(Point::new(x, a), Point::new(x, b)));
        }
    }
    merged
}

fn merge_spans(mut spans: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
    spans.sort_unstable();
    let mut out: Vec<(i32, i32)> = Vec::new();
    for (a, b) in spans {
        match out.last_mut() {
            Some(last) if a <= last.1 => last.1 = last.1.max(b),
            _ => out.push((a, b)),
        }
    }
    out
}

/// Points where wire ends, wire interiors and pins add up to three or more
/// arms.
fn junctions(segments: &[Segment], pins: &[Point]) -> Vec<Point> {
    let mut arms: BTreeMap<Point, u8> = BTreeMap::new();
    for segment in segments {
        for p in segment.points() {
            let n = if p == segment.start || p == segment.end { 1 } else { 2 };
            *arms.entry(p).or_default() += n;
        }
    }
    for pin in pins {
        if let Some(count) = arms.get_mut(pin) {
            *count += 1;
        }
    }
    arms.into_iter()
        .filter(|&(_, count)| count >= 3)
        .map(|(p, _)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{build_graph, BuildOptions};
    use crate::dsl::parse;
    use crate::kinds::KindTable;
    use crate::layout::{layout, Cell};

    fn routed(input: &str) -> (Placement, Route, Diagnostics) {
        let kinds = KindTable::builtin();
        let parsed = parse(input, &kinds);
        let (graph, diagnostics) = build_graph(&parsed.statements, &kinds, &BuildOptions::default());
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        let placement = layout(&graph, &kinds);
        let (route, warnings) = route(&graph, &placement, &RouterConfig::default());
        (placement, route, warnings)
    }

    fn assert_clear(placement: &Placement, route: &Route) {
        for net in route.iter().filter(|n| n.clean) {
            for segment in &net.segments {
                for p in segment.points() {
                    assert!(
                        placement.body_at(p).is_none(),
                        "net {} crosses a body at {:?}",
                        net.name,
                        p
                    );
                }
            }
        }
    }

    #[test]
    fn test_divider_routes_cleanly() {
        let (placement, route, warnings) = routed(
            "ground GND\nnode v_in, v_out\n\
             battery V1 +9V from GND to v_out\n\
             resistor R1 10k from v_in to v_out\n\
             resistor R2 5k from v_out to GND",
        );
        assert!(warnings.is_empty(), "{}", warnings);
        assert_clear(&placement, &route);

        let ground = route.get("GND").unwrap();
        assert!(ground.is_ground);
        assert!(ground
            .segments
            .contains(&Segment::new(Point::new(0, 0), Point::new(6, 0))));

        let v_out = route.get("v_out").unwrap();
        assert!(v_out.clean);
        assert!(!v_out.segments.is_empty());
        // V1.to, R2.from and R1.to meet on one wire.
        assert_eq!(v_out.junctions.len(), 1);

        // A single pin needs no wire.
        assert!(route.get("v_in").unwrap().segments.is_empty());
    }

    #[test]
    fn test_l_route_avoids_bodies() {
        let (placement, route, _) = routed(
            "ground GND\n\
             resistor R1 1k from GND to a\n\
             resistor R2 1k from a to b\n\
             resistor R3 1k from GND to b\n\
             capacitor C1 1n from a to GND",
        );
        assert_clear(&placement, &route);
        assert!(route.iter().all(|n| n.clean));
    }

    #[test]
    fn test_merge_touching_segments() {
        let merged = merge_segments(&[
            Segment::new(Point::new(0, 0), Point::new(6, 0)),
            Segment::new(Point::new(6, 0), Point::new(12, 0)),
            Segment::new(Point::new(3, 0), Point::new(4, 0)),
            Segment::new(Point::new(6, 0), Point::new(6, 4)),
        ]);
        assert_eq!(
            merged,
            vec![
                Segment::new(Point::new(0, 0), Point::new(12, 0)),
                Segment::new(Point::new(6, 0), Point::new(6, 4)),
            ]
        );
        let found = junctions(&merged, &[Point::new(6, 4)]);
        assert_eq!(found, vec![Point::new(6, 0)]);
    }

    #[test]
    fn test_blocked_net_is_reported_unroutable() {
        // Net `a` joins the bottom of R2 in one column to the top of R5 in
        // the next; both L-routes cross a body.
        let kinds = KindTable::builtin();
        let parsed = parse(
            "ground GND\n\
             resistor R1 1k from GND to a\n\
             resistor R2 1k from a to b\n\
             resistor R4 1k from GND to d\n\
             resistor R5 1k from d to a",
            &kinds,
        );
        let (graph, _) = build_graph(&parsed.statements, &kinds, &BuildOptions::default());
        let placement = layout(&graph, &kinds);
        assert_eq!(placement.get("R2").unwrap().cell, Cell::new(0, 2));
        assert_eq!(placement.get("R5").unwrap().cell, Cell::new(1, 2));

        let config = RouterConfig::new().with_max_shift_attempts(0);
        let (route, warnings) = route(&graph, &placement, &config);

        let a = route.get("a").unwrap();
        assert!(!a.clean);
        assert!(!a.segments.is_empty());
        let reported: Vec<_> = warnings.iter().collect();
        assert_eq!(reported.len(), 1, "{}", warnings);
        assert_eq!(reported[0].line, 2);
        assert!(!reported[0].is_error());
        assert!(matches!(&reported[0].issue, Issue::UnroutableNet { net } if net == "a"));
        assert_clear(&placement, &route);
    }

    #[test]
    fn test_without_dog_legs_clean_nets_stay_clear() {
        let kinds = KindTable::builtin();
        let parsed = parse(
            "ground GND\n\
             resistor R1 1k from GND to a\n\
             resistor R2 1k from b to c\n\
             resistor R3 1k from a to d",
            &kinds,
        );
        let (graph, _) = build_graph(&parsed.statements, &kinds, &BuildOptions::default());
        let placement = layout(&graph, &kinds);
        let config = RouterConfig::new().with_max_shift_attempts(0);
        let (route, _) = route(&graph, &placement, &config);
        assert_clear(&placement, &route);
    }
}
