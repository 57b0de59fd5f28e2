//! Placement and routing invariants over random two-terminal circuits.

use std::collections::{HashMap, HashSet};

use circuitmark::circuit::NetId;
use circuitmark::layout::{self, Point};
use circuitmark::{build, compile, KindTable, Options};
use proptest::prelude::*;

const NETS: [&str; 6] = ["GND", "n1", "n2", "n3", "n4", "n5"];

/// Pairs of distinct net indices, one per component.
fn arb_links() -> impl Strategy<Value = Vec<(usize, usize)>> {
    proptest::collection::vec((0..NETS.len(), 0..NETS.len()), 1..10)
        .prop_map(|links| links.into_iter().filter(|(a, b)| a != b).collect::<Vec<_>>())
        .prop_filter("needs at least one component", |links| !links.is_empty())
}

fn source_for(links: &[(usize, usize)]) -> String {
    let mut source = String::from("ground GND\n");
    for (i, (a, b)) in links.iter().enumerate() {
        let kind = if i % 3 == 2 { "capacitor" } else { "resistor" };
        let prefix = if kind == "capacitor" { "C" } else { "R" };
        source.push_str(&format!("{} {}{} 1k from {} to {}\n", kind, prefix, i + 1, NETS[*a], NETS[*b]));
    }
    source
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_component_is_placed_once(links in arb_links()) {
        let source = source_for(&links);
        let schematic = compile(&source, &Options::default()).unwrap();
        prop_assert_eq!(schematic.placement().len(), links.len());

        let mut owner: HashMap<Point, String> = HashMap::new();
        for placed in schematic.placement().iter() {
            for p in placed.cell.body() {
                if let Some(other) = owner.insert(p, placed.reference.clone()) {
                    prop_assert!(false, "{} and {} share {:?}", other, placed.reference, p);
                }
            }
        }
    }

    #[test]
    fn clean_routes_never_cross_bodies(links in arb_links()) {
        let source = source_for(&links);
        let schematic = compile(&source, &Options::default()).unwrap();
        for net in schematic.route().iter().filter(|n| n.clean) {
            for segment in &net.segments {
                prop_assert!(segment.is_horizontal() || segment.is_vertical());
                for p in segment.points() {
                    let hit = schematic.placement().body_at(p);
                    prop_assert!(hit.is_none(), "net {} crosses {:?} at {:?}", net.name, hit.map(|c| &c.reference), p);
                }
            }
        }
    }

    #[test]
    fn clean_nets_keep_to_themselves(links in arb_links()) {
        let source = source_for(&links);
        let schematic = compile(&source, &Options::default()).unwrap();
        let graph = schematic.graph();
        let route = schematic.route();

        let mut pin_owner: HashMap<Point, NetId> = HashMap::new();
        for net in graph.nets() {
            for pin in graph.pins_on(net.id) {
                if let Some(p) = schematic.placement().pin_point(pin.component, &pin.pin) {
                    pin_owner.insert(p, net.id);
                }
            }
        }
        let mut runs: HashMap<(Point, bool), HashSet<NetId>> = HashMap::new();
        for net in route.iter() {
            for segment in &net.segments {
                for p in segment.points() {
                    runs.entry((p, segment.is_horizontal())).or_default().insert(net.net);
                }
            }
        }
        let clean: HashSet<NetId> = route.iter().filter(|n| n.clean).map(|n| n.net).collect();

        for ((p, horizontal), owners) in &runs {
            // Any overlap must be owned by a net reported as not clean.
            let sharing: Vec<_> = owners.iter().filter(|n| clean.contains(n)).collect();
            prop_assert!(
                owners.len() < 2 || sharing.len() <= 1,
                "clean nets {:?} share a {} run at {:?}",
                owners, if *horizontal { "horizontal" } else { "vertical" }, p
            );
            for net in owners.iter().filter(|n| clean.contains(n)) {
                let owner = pin_owner.get(p);
                prop_assert!(
                    owner.map_or(true, |o| o == net),
                    "clean net {:?} runs over a pin of {:?} at {:?}", net, owner, p
                );
            }
        }
    }

    #[test]
    fn every_pin_is_on_its_net(links in arb_links()) {
        let source = source_for(&links);
        let schematic = compile(&source, &Options::default()).unwrap();
        let graph = schematic.graph();
        for net in schematic.route().iter().filter(|n| n.clean && !n.segments.is_empty()) {
            for pin in graph.pins_on(net.net) {
                let point = schematic.placement().pin_point(pin.component, &pin.pin).unwrap();
                prop_assert!(
                    net.segments.iter().any(|s| s.contains(point)),
                    "pin {:?} of net {} is not wired", point, net.name
                );
            }
        }
    }

    #[test]
    fn layout_is_deterministic(links in arb_links()) {
        let source = source_for(&links);
        let (graph, _) = build(&source);
        let kinds = KindTable::builtin();
        prop_assert_eq!(layout::layout(&graph, &kinds), layout::layout(&graph, &kinds));
    }
}
