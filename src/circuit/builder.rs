//! Flattening parsed statements into a [`CircuitGraph`].
//!
//! Subcircuit instances are expanded in place. Inside an instance `X1`, a
//! local name `n` becomes `X1.n` and a component `R1` becomes `X1.R1`; port
//! names resolve to whatever the instance bound them to. Ground names are
//! global and never prefixed.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use super::alias::AliasTable;
use super::graph::{CircuitGraph, Component, Net};
use super::types::{ComponentId, NetId};
use super::validate::validate_graph;
use crate::dsl::{ComponentInst, Statement, StatementKind, SubcircuitDef, SubcircuitInst, Value};
use crate::error::{Diagnostics, Issue};
use crate::kinds::{KindTable, TWO_TERMINAL_PINS};

/// Name that is ground without any declaration.
pub const GROUND_LITERAL: &str = "GND";

/// Options controlling graph construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum subcircuit nesting depth
    pub max_depth: usize,
    /// Report nets that were never declared with `node` or `ground`
    pub require_declared_nets: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            require_declared_nets: false,
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_require_declared_nets(mut self, strict: bool) -> Self {
        self.require_declared_nets = strict;
        self
    }
}

/// Flatten `statements` into a graph, collecting diagnostics.
pub fn build_graph(
    statements: &[Statement],
    kinds: &KindTable,
    options: &BuildOptions,
) -> (CircuitGraph, Diagnostics) {
    GraphBuilder::new(kinds, options).build(statements)
}

/// Component with its pins still bound to alias keys.
struct PendingComponent {
    kind: String,
    reference: String,
    value: Option<Value>,
    params: IndexMap<String, Value>,
    pins: IndexMap<String, String>,
    line: usize,
}

/// Name resolution context for one level of the hierarchy.
struct Scope {
    /// Hierarchical prefix; empty at the top level
    prefix: String,
    /// Port name to the outer alias key it is bound to
    ports: IndexMap<String, String>,
}

impl Scope {
    fn top() -> Self {
        Self {
            prefix: String::new(),
            ports: IndexMap::new(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }
}

type Definitions<'s> = IndexMap<&'s str, (usize, &'s SubcircuitDef)>;

/// Builds a [`CircuitGraph`] from statements.
pub struct GraphBuilder<'k> {
    kinds: &'k KindTable,
    options: BuildOptions,
    aliases: AliasTable,
    /// Keys declared with `node` or `ground`
    declared: HashSet<String>,
    /// Line each alias key was first seen on
    origins: HashMap<String, usize>,
    undeclared_reported: HashSet<String>,
    references: HashSet<String>,
    cyclic: HashSet<String>,
    used: HashSet<String>,
    pending: Vec<PendingComponent>,
    diagnostics: Diagnostics,
}

impl<'k> GraphBuilder<'k> {
    pub fn new(kinds: &'k KindTable, options: &BuildOptions) -> Self {
        Self {
            kinds,
            options: options.clone(),
            aliases: AliasTable::new(),
            declared: HashSet::new(),
            origins: HashMap::new(),
            undeclared_reported: HashSet::new(),
            references: HashSet::new(),
            cyclic: HashSet::new(),
            used: HashSet::new(),
            pending: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Flatten the statements and validate the result.
    pub fn build(mut self, statements: &[Statement]) -> (CircuitGraph, Diagnostics) {
        let definitions = self.collect_definitions(statements);
        self.check_hierarchy(&definitions);

        // Declarations first, so nets are numbered in declaration order and
        // `node` lines may appear after their first use.
        for stmt in statements {
            match &stmt.kind {
                StatementKind::GroundDecl { name } => self.declare_ground(name, stmt.line),
                StatementKind::NodeDecl { names } => {
                    for name in names {
                        self.declare_node(&Scope::top(), name, stmt.line);
                    }
                }
                _ => {}
            }
        }

        self.instantiate(statements, &Scope::top(), &definitions, 0);

        for (name, (line, _)) in &definitions {
            if !self.used.contains(*name) {
                self.diagnostics.report(
                    *line,
                    Issue::UnusedSubcircuit {
                        name: name.to_string(),
                    },
                );
            }
        }

        let graph = self.finish();
        validate_graph(&graph, &mut self.diagnostics);

        debug!(
            nets = graph.nets().len(),
            components = graph.components().len(),
            errors = self.diagnostics.error_count(),
            "built circuit graph"
        );

        (graph, self.diagnostics)
    }

    fn collect_definitions<'s>(&mut self, statements: &'s [Statement]) -> Definitions<'s> {
        let mut definitions = Definitions::new();
        for stmt in statements {
            if let StatementKind::SubcircuitDef(def) = &stmt.kind {
                if definitions.contains_key(def.name.as_str()) {
                    self.diagnostics.report(
                        stmt.line,
                        Issue::DuplicateSubcircuit {
                            name: def.name.clone(),
                        },
                    );
                } else {
                    definitions.insert(def.name.as_str(), (stmt.line, def));
                }
            }
        }
        definitions
    }

    /// Reject every definition that reaches itself through `use`, whether or
    /// not it is instantiated. Walks with an explicit path stack.
    fn check_hierarchy(&mut self, definitions: &Definitions<'_>) {
        let mut done: HashSet<&str> = HashSet::new();
        let mut reported: HashSet<Vec<&str>> = HashSet::new();

        for &start in definitions.keys() {
            if done.contains(start) {
                continue;
            }
            // (definition, index of the next child to visit)
            let mut path: Vec<(&str, usize)> = vec![(start, 0)];

            while let Some(&(name, next)) = path.last() {
                let children = uses_in(definitions, name);
                let Some(&(child, line)) = children.get(next) else {
                    done.insert(name);
                    path.pop();
                    continue;
                };
                if let Some(top) = path.last_mut() {
                    top.1 += 1;
                }

                if let Some(pos) = path.iter().position(|&(n, _)| n == child) {
                    let members: Vec<&str> = path[pos..].iter().map(|&(n, _)| n).collect();
                    let mut key = members.clone();
                    key.sort_unstable();
                    for member in &members {
                        self.cyclic.insert(member.to_string());
                    }
                    if reported.insert(key) {
                        let mut cycle = members;
                        cycle.push(child);
                        self.diagnostics.report(
                            line,
                            Issue::CyclicHierarchy {
                                path: cycle.join(" -> "),
                            },
                        );
                    }
                    continue;
                }

                if !done.contains(child) && definitions.contains_key(child) {
                    path.push((child, 0));
                }
            }
        }
    }

    fn instantiate(
        &mut self,
        body: &[Statement],
        scope: &Scope,
        definitions: &Definitions<'_>,
        depth: usize,
    ) {
        for stmt in body {
            match &stmt.kind {
                StatementKind::GroundDecl { name } if depth > 0 => {
                    self.declare_ground(name, stmt.line)
                }
                StatementKind::NodeDecl { names } if depth > 0 => {
                    for name in names {
                        self.declare_node(scope, name, stmt.line);
                    }
                }
                StatementKind::ComponentInst(inst) => self.add_component(inst, scope, stmt.line),
                StatementKind::SubcircuitInst(inst) => {
                    self.expand(inst, scope, definitions, depth, stmt.line)
                }
                _ => {}
            }
        }
    }

    fn expand(
        &mut self,
        inst: &SubcircuitInst,
        scope: &Scope,
        definitions: &Definitions<'_>,
        depth: usize,
        line: usize,
    ) {
        let reference = scope.qualify(&inst.reference);
        let Some(&(_, def)) = definitions.get(inst.def_name.as_str()) else {
            self.diagnostics.report(
                line,
                Issue::UnknownSubcircuit {
                    name: inst.def_name.clone(),
                },
            );
            return;
        };
        self.used.insert(def.name.clone());

        if self.cyclic.contains(&def.name) {
            return;
        }
        if depth >= self.options.max_depth {
            self.diagnostics.report(
                line,
                Issue::HierarchyTooDeep {
                    instance: reference,
                    limit: self.options.max_depth,
                },
            );
            return;
        }
        if !self.references.insert(reference.clone()) {
            self.diagnostics
                .report(line, Issue::ReferenceCollision { reference });
            return;
        }

        let mut ports = IndexMap::new();
        for (port, net) in &inst.port_bindings {
            if def.ports.contains(port) {
                let key = self.resolve(scope, net, line);
                ports.insert(port.clone(), key);
            } else {
                self.diagnostics.report(
                    line,
                    Issue::UnknownPort {
                        subcircuit: def.name.clone(),
                        instance: reference.clone(),
                        port: port.clone(),
                    },
                );
            }
        }
        for port in &def.ports {
            if !inst.port_bindings.contains_key(port) {
                self.diagnostics.report(
                    line,
                    Issue::MissingPort {
                        subcircuit: def.name.clone(),
                        instance: reference.clone(),
                        port: port.clone(),
                    },
                );
            }
        }

        debug!(instance = %reference, subcircuit = %def.name, depth, "expanding subcircuit");
        let inner = Scope {
            prefix: reference,
            ports,
        };
        self.instantiate(&def.body, &inner, definitions, depth + 1);
    }

    fn add_component(&mut self, inst: &ComponentInst, scope: &Scope, line: usize) {
        let reference = scope.qualify(&inst.reference);
        if !self.references.insert(reference.clone()) {
            self.diagnostics
                .report(line, Issue::ReferenceCollision { reference });
            return;
        }

        let Some(spec) = self.kinds.get(&inst.kind) else {
            self.diagnostics.report(
                line,
                Issue::UnknownKind {
                    kind: inst.kind.clone(),
                },
            );
            return;
        };
        let kind = spec.name.clone();

        let schema_pins: Vec<String> = if spec.pins.is_two_terminal() {
            TWO_TERMINAL_PINS.iter().map(|p| p.to_string()).collect()
        } else {
            spec.pins.pin_names().into_iter().map(str::to_string).collect()
        };

        let mut pins = IndexMap::new();
        for pin in inst.pins.keys() {
            if !schema_pins.contains(pin) {
                self.diagnostics.report(
                    line,
                    Issue::UnknownPin {
                        kind: kind.clone(),
                        reference: reference.clone(),
                        pin: pin.clone(),
                    },
                );
            }
        }
        for pin in &schema_pins {
            match inst.pins.get(pin) {
                Some(net) => {
                    let key = self.resolve(scope, net, line);
                    pins.insert(pin.clone(), key);
                }
                None => self.diagnostics.report(
                    line,
                    Issue::MissingPin {
                        kind: kind.clone(),
                        reference: reference.clone(),
                        pin: pin.clone(),
                    },
                ),
            }
        }

        self.pending.push(PendingComponent {
            kind,
            reference,
            value: inst.value.clone(),
            params: inst.params.clone(),
            pins,
            line,
        });
    }

    fn declare_ground(&mut self, name: &str, line: usize) {
        self.note_origin(name, line);
        self.aliases.declare_ground(name);
        self.declared.insert(name.to_string());
    }

    fn declare_node(&mut self, scope: &Scope, name: &str, line: usize) {
        if scope.ports.contains_key(name) || self.is_ground_name(name) {
            return;
        }
        let key = scope.qualify(name);
        self.note_origin(&key, line);
        self.aliases.insert(&key);
        self.declared.insert(key);
    }

    fn is_ground_name(&mut self, name: &str) -> bool {
        name.eq_ignore_ascii_case(GROUND_LITERAL) || self.aliases.is_ground(name)
    }

    /// Alias key for a net name used in `scope`: a port binding, a global
    /// ground name, or the scope-qualified local name.
    fn resolve(&mut self, scope: &Scope, name: &str, line: usize) -> String {
        if let Some(key) = scope.ports.get(name) {
            return key.clone();
        }

        if self.is_ground_name(name) {
            self.note_origin(name, line);
            self.aliases.declare_ground(name);
            return name.to_string();
        }

        let key = scope.qualify(name);
        if self.options.require_declared_nets
            && !self.declared.contains(&key)
            && self.undeclared_reported.insert(key.clone())
        {
            self.diagnostics
                .report(line, Issue::UndeclaredNet { name: key.clone() });
        }
        self.note_origin(&key, line);
        self.aliases.insert(&key);
        key
    }

    fn note_origin(&mut self, key: &str, line: usize) {
        self.origins.entry(key.to_string()).or_insert(line);
    }

    fn finish(&mut self) -> CircuitGraph {
        let ground = self.aliases.ground();
        let mut ids: HashMap<String, NetId> = HashMap::new();
        let mut nets = Vec::new();

        for (index, (root, names)) in self.aliases.groups().into_iter().enumerate() {
            let id = NetId(index);
            for name in &names {
                ids.insert(name.clone(), id);
            }
            let line = names
                .iter()
                .filter_map(|n| self.origins.get(n))
                .min()
                .copied()
                .unwrap_or(0);
            nets.push(Net {
                id,
                is_ground: ground.as_deref() == Some(root.as_str()),
                name: root,
                aliases: names.into_iter().collect::<IndexSet<_>>(),
                line,
            });
        }

        let components = self
            .pending
            .drain(..)
            .enumerate()
            .map(|(index, pending)| Component {
                id: ComponentId(index),
                kind: pending.kind,
                reference: pending.reference,
                value: pending.value,
                params: pending.params,
                pins: pending
                    .pins
                    .into_iter()
                    .filter_map(|(pin, key)| ids.get(&key).map(|id| (pin, *id)))
                    .collect(),
                line: pending.line,
            })
            .collect();

        CircuitGraph::new(nets, components)
    }
}

/// Subcircuits instantiated directly in the body of `name`.
fn uses_in<'s>(definitions: &Definitions<'s>, name: &str) -> Vec<(&'s str, usize)> {
    definitions
        .get(name)
        .map(|(_, def)| {
            def.body
                .iter()
                .filter_map(|stmt| match &stmt.kind {
                    StatementKind::SubcircuitInst(inst) => Some((inst.def_name.as_str(), stmt.line)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    fn build(input: &str) -> (CircuitGraph, Diagnostics) {
        build_with(input, &BuildOptions::default())
    }

    fn build_with(input: &str, options: &BuildOptions) -> (CircuitGraph, Diagnostics) {
        let kinds = KindTable::builtin();
        let parsed = parse(input, &kinds);
        assert!(!parsed.diagnostics.has_errors(), "{}", parsed.diagnostics);
        build_graph(&parsed.statements, &kinds, options)
    }

    fn net_of<'g>(graph: &'g CircuitGraph, reference: &str, pin: &str) -> &'g str {
        let component = graph.find_component(reference).unwrap();
        graph.net_name(component.net(pin).unwrap())
    }

    #[test]
    fn test_divider_nets() {
        let (graph, diagnostics) = build(
            "ground GND\nnode v_in, v_out\n\
             battery V1 9V from GND to v_out\n\
             resistor R1 10k from v_in to v_out\n\
             resistor R2 5k from v_out to GND",
        );
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        let names: Vec<_> = graph.nets().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["GND", "v_in", "v_out"]);
        assert_eq!(graph.components().len(), 3);
        assert!(graph.net(graph.ground().unwrap()).is_ground);
        assert_eq!(graph.pins_on(graph.find_net("v_out").unwrap().id).len(), 3);
    }

    #[test]
    fn test_ground_aliases_share_one_net() {
        let (graph, diagnostics) = build(
            "ground 0\nground AGND\n\
             resistor R1 1k from a to 0\n\
             resistor R2 1k from a to AGND\n\
             resistor R3 1k from a to gnd",
        );
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        let ground = graph.ground().unwrap();
        assert_eq!(graph.net_name(ground), "0");
        for r in ["R1", "R2", "R3"] {
            assert_eq!(graph.find_component(r).unwrap().net("to"), Some(ground));
        }
        assert_eq!(graph.nets().len(), 2);
    }

    #[test]
    fn test_subcircuit_instances_have_independent_nets() {
        let (graph, diagnostics) = build(
            "ground GND\n\
             subcircuit rc (in, out)\n\
               resistor R1 1k from in to mid\n\
               capacitor C1 10n from mid to out\n\
             end\n\
             use rc as X1 in=a out=b\n\
             use rc as X2 in=b out=GND",
        );
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert_eq!(graph.components().len(), 4);
        assert_eq!(net_of(&graph, "X1.R1", "to"), "X1.mid");
        assert_eq!(net_of(&graph, "X2.R1", "to"), "X2.mid");
        assert_eq!(net_of(&graph, "X1.C1", "to"), "b");
        assert_eq!(net_of(&graph, "X2.R1", "from"), "b");
        assert_eq!(net_of(&graph, "X2.C1", "to"), "GND");
    }

    #[test]
    fn test_nested_prefixes() {
        let (graph, diagnostics) = build(
            "ground GND\n\
             subcircuit inner (p)\n\
               resistor R1 1k from p to q\n\
               resistor R2 1k from q to GND\n\
             end\n\
             subcircuit outer (x)\n\
               use inner as X2 p=x\n\
             end\n\
             use outer as X1 x=top",
        );
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        assert!(graph.find_component("X1.X2.R1").is_some());
        assert_eq!(net_of(&graph, "X1.X2.R1", "from"), "top");
        assert_eq!(net_of(&graph, "X1.X2.R1", "to"), "X1.X2.q");
        assert_eq!(net_of(&graph, "X1.X2.R2", "to"), "GND");
    }

    #[test]
    fn test_cycles_rejected_even_when_unused() {
        let (_, diagnostics) = build(
            "subcircuit A (p)\n  use B as X1 p=p\nend\n\
             subcircuit B (p)\n  use A as X1 p=p\nend",
        );
        let cycles: Vec<_> = diagnostics
            .errors()
            .filter_map(|d| match &d.issue {
                Issue::CyclicHierarchy { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, vec!["A -> B -> A".to_string()]);
    }

    #[test]
    fn test_self_instantiation() {
        let (graph, diagnostics) = build(
            "subcircuit loop (p)\n  use loop as X1 p=p\nend\nuse loop as X1 p=a",
        );
        assert!(diagnostics.has_errors());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_depth_limit() {
        let options = BuildOptions::new().with_max_depth(1);
        let (_, diagnostics) = build_with(
            "ground GND\n\
             subcircuit leaf (p)\n  resistor R1 1k from p to GND\nend\n\
             subcircuit mid (p)\n  use leaf as Y p=p\nend\n\
             use mid as X p=a",
            &options,
        );
        assert!(diagnostics
            .errors()
            .any(|d| matches!(&d.issue, Issue::HierarchyTooDeep { instance, limit: 1 } if instance == "X.Y")));
    }

    #[test]
    fn test_unknown_pin_reported_once() {
        let (graph, diagnostics) = build(
            "ground GND\ntransistor Q1 base=b collector=c emitter=GND gate=g",
        );
        let errors: Vec<_> = diagnostics.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 2);
        assert!(matches!(&errors[0].issue, Issue::UnknownPin { pin, .. } if pin == "gate"));
        assert!(graph.find_net("g").is_none());
    }

    #[test]
    fn test_missing_pin_and_port() {
        let (_, diagnostics) = build(
            "ground GND\n\
             opamp U1 in_p=a out=b\n\
             subcircuit s (x, y)\n  resistor R1 1k from x to y\nend\n\
             use s as X1 x=a z=c",
        );
        let issues: Vec<_> = diagnostics.errors().map(|d| d.issue.clone()).collect();
        assert!(issues.iter().any(|i| matches!(i, Issue::MissingPin { pin, .. } if pin == "in_n")));
        assert!(issues.iter().any(|i| matches!(i, Issue::UnknownPort { port, .. } if port == "z")));
        assert!(issues.iter().any(|i| matches!(i, Issue::MissingPort { port, .. } if port == "y")));
    }

    #[test]
    fn test_unknown_subcircuit_and_unused_definition() {
        let (_, diagnostics) = build(
            "ground GND\nsubcircuit spare (p)\nend\nuse missing as X1 p=a",
        );
        assert!(diagnostics
            .errors()
            .any(|d| matches!(&d.issue, Issue::UnknownSubcircuit { name } if name == "missing")));
        assert!(diagnostics
            .warnings()
            .any(|d| matches!(&d.issue, Issue::UnusedSubcircuit { name } if name == "spare")));
    }

    #[test]
    fn test_strict_mode_requires_declarations() {
        let options = BuildOptions::new().with_require_declared_nets(true);
        let (_, diagnostics) = build_with(
            "ground GND\nnode a\nresistor R1 1k from a to b\nresistor R2 1k from b to GND",
            &options,
        );
        let undeclared: Vec<_> = diagnostics
            .errors()
            .filter(|d| matches!(d.issue, Issue::UndeclaredNet { .. }))
            .map(|d| d.line)
            .collect();
        assert_eq!(undeclared, vec![3]);
    }

    #[test]
    fn test_reference_collision_after_flattening() {
        let (_, diagnostics) = build(
            "ground GND\n\
             subcircuit s (p)\n  resistor R1 1k from p to GND\nend\n\
             resistor X1.R1 1k from a to GND\n\
             use s as X1 p=a",
        );
        assert!(diagnostics
            .errors()
            .any(|d| matches!(&d.issue, Issue::ReferenceCollision { reference } if reference == "X1.R1")));
    }
}
