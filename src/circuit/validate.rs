//! Circuit validation.

use tracing::trace;

use super::CircuitGraph;
use crate::error::{Diagnostics, Issue};

/// Report connectivity warnings for a flattened circuit.
///
/// Checks:
/// - Components whose pins all land on one net
/// - Nets with no pins, or a single pin
/// - A circuit with components but no ground
pub fn validate_graph(graph: &CircuitGraph, diagnostics: &mut Diagnostics) {
    for component in graph.components() {
        let mut nets = component.pins.values();
        let Some(first) = nets.next() else {
            continue;
        };
        if component.pins.len() >= 2 && nets.all(|n| n == first) {
            diagnostics.report(
                component.line,
                Issue::ShortedComponent {
                    reference: component.reference.clone(),
                    net: graph.net_name(*first).to_string(),
                },
            );
        }
    }

    for net in graph.nets() {
        let pins = graph.pins_on(net.id);
        match pins {
            [] => diagnostics.report(
                net.line,
                Issue::UnusedNet {
                    net: net.name.clone(),
                },
            ),
            // A lone ground pin is still tied to the rail.
            [pin] if !net.is_ground => diagnostics.report(
                net.line,
                Issue::DanglingNet {
                    net: net.name.clone(),
                    reference: graph.component(pin.component).reference.clone(),
                },
            ),
            _ => trace!(net = %net.name, pins = pins.len(), "net ok"),
        }
    }

    if !graph.is_empty() && graph.ground().is_none() {
        diagnostics.report(0, Issue::MissingGround);
    }
}

#[cfg(test)]
mod tests {
    use crate::circuit::{build_graph, BuildOptions};
    use crate::dsl::parse;
    use crate::error::{Diagnostics, Issue};
    use crate::kinds::KindTable;

    fn warnings(input: &str) -> Diagnostics {
        let kinds = KindTable::builtin();
        let parsed = parse(input, &kinds);
        let (_, diagnostics) = build_graph(&parsed.statements, &kinds, &BuildOptions::default());
        diagnostics
    }

    #[test]
    fn test_self_loop_is_a_warning() {
        let diagnostics = warnings("ground GND\nresistor R1 1k from a to a\nresistor R2 1k from a to GND");
        assert!(!diagnostics.has_errors());
        let shorted: Vec<_> = diagnostics
            .warnings()
            .filter(|d| matches!(d.issue, Issue::ShortedComponent { .. }))
            .map(|d| d.line)
            .collect();
        assert_eq!(shorted, vec![2]);
    }

    #[test]
    fn test_unused_and_dangling_nets() {
        let diagnostics = warnings("ground GND\nnode spare, tip\nresistor R1 1k from tip to GND");
        let issues: Vec<_> = diagnostics.warnings().map(|d| d.issue.clone()).collect();
        assert!(issues.contains(&Issue::UnusedNet { net: "spare".into() }));
        assert!(issues.contains(&Issue::DanglingNet {
            net: "tip".into(),
            reference: "R1".into()
        }));
    }

    #[test]
    fn test_missing_ground() {
        let diagnostics = warnings("resistor R1 1k from a to b\nresistor R2 1k from b to a");
        assert!(!diagnostics.has_errors());
        assert!(diagnostics.warnings().any(|d| d.issue == Issue::MissingGround));
    }
}
