//! Circuit graph structure.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::types::{ComponentId, NetId, PinRef};
use crate::dsl::Value;

/// A canonical electrical node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Net {
    pub id: NetId,
    /// Canonical name (the first name seen for this net)
    pub name: String,
    /// Every name that resolves to this net, canonical name first
    pub aliases: IndexSet<String>,
    pub is_ground: bool,
    /// Line where the net was first named
    pub line: usize,
}

/// A flattened component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub id: ComponentId,
    /// Kind name as registered in the kind table
    pub kind: String,
    /// Hierarchical reference id (`X1.Q1` inside instance `X1`)
    pub reference: String,
    pub value: Option<Value>,
    pub params: IndexMap<String, Value>,
    /// Pin name to net, in schema order
    pub pins: IndexMap<String, NetId>,
    /// Line of the statement that declared the component
    pub line: usize,
}

impl Component {
    /// Net bound to `pin`.
    pub fn net(&self, pin: &str) -> Option<NetId> {
        self.pins.get(pin).copied()
    }

    /// Whether the component has the implicit `from`/`to` schema.
    pub fn is_two_terminal(&self) -> bool {
        self.pins.len() == 2 && self.pins.contains_key("from") && self.pins.contains_key("to")
    }

    /// The net on the other side of a two-terminal component.
    pub fn other_net(&self, net: NetId) -> Option<NetId> {
        let from = self.net("from")?;
        let to = self.net("to")?;
        if from == net {
            Some(to)
        } else if to == net {
            Some(from)
        } else {
            None
        }
    }

    /// Value label shown next to the symbol.
    pub fn value_label(&self) -> Option<&str> {
        self.value.as_ref().map(Value::text)
    }
}

/// The fully flattened circuit.
///
/// Nets and components iterate in insertion order so every later stage
/// produces the same output for the same input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CircuitGraph {
    nets: Vec<Net>,
    components: Vec<Component>,
    /// Alias name to net
    #[serde(skip)]
    aliases: IndexMap<String, NetId>,
    /// Reference id to component
    #[serde(skip)]
    references: IndexMap<String, ComponentId>,
    /// Pins incident on each net, indexed by net id
    #[serde(skip)]
    incidence: Vec<Vec<PinRef>>,
    ground: Option<NetId>,
}

impl CircuitGraph {
    /// Assemble a graph from resolved nets and components.
    pub(crate) fn new(nets: Vec<Net>, components: Vec<Component>) -> Self {
        let mut aliases = IndexMap::new();
        for net in &nets {
            for alias in &net.aliases {
                aliases.insert(alias.clone(), net.id);
            }
        }

        let references = components
            .iter()
            .map(|c| (c.reference.clone(), c.id))
            .collect();

        let mut incidence = vec![Vec::new(); nets.len()];
        for component in &components {
            for (pin, net) in &component.pins {
                incidence[net.0].push(PinRef::new(component.id, pin.clone()));
            }
        }

        let ground = nets.iter().find(|n| n.is_ground).map(|n| n.id);

        Self {
            nets,
            components,
            aliases,
            references,
            incidence,
            ground,
        }
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.0]
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }

    /// Resolve any alias to its net.
    pub fn find_net(&self, name: &str) -> Option<&Net> {
        self.aliases.get(name).map(|id| &self.nets[id.0])
    }

    pub fn find_component(&self, reference: &str) -> Option<&Component> {
        self.references.get(reference).map(|id| &self.components[id.0])
    }

    /// The ground net, if the circuit has one.
    pub fn ground(&self) -> Option<NetId> {
        self.ground
    }

    pub fn is_ground(&self, net: NetId) -> bool {
        self.ground == Some(net)
    }

    /// Pins connected to `net`, in component declaration order.
    pub fn pins_on(&self, net: NetId) -> &[PinRef] {
        &self.incidence[net.0]
    }

    /// Name of a net, for messages.
    pub fn net_name(&self, net: NetId) -> &str {
        &self.nets[net.0].name
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(id: usize, name: &str, ground: bool) -> Net {
        Net {
            id: NetId(id),
            name: name.to_string(),
            aliases: [name.to_string()].into_iter().collect(),
            is_ground: ground,
            line: 1,
        }
    }

    fn resistor(id: usize, reference: &str, from: usize, to: usize) -> Component {
        Component {
            id: ComponentId(id),
            kind: "resistor".into(),
            reference: reference.into(),
            value: None,
            params: IndexMap::new(),
            pins: [("from".to_string(), NetId(from)), ("to".to_string(), NetId(to))]
                .into_iter()
                .collect(),
            line: id + 1,
        }
    }

    #[test]
    fn test_incidence_is_insertion_ordered() {
        let graph = CircuitGraph::new(
            vec![net(0, "GND", true), net(1, "a", false)],
            vec![resistor(0, "R1", 1, 0), resistor(1, "R2", 0, 1)],
        );
        let pins: Vec<_> = graph
            .pins_on(NetId(0))
            .iter()
            .map(|p| (graph.component(p.component).reference.as_str(), p.pin.as_str()))
            .collect();
        assert_eq!(pins, vec![("R1", "to"), ("R2", "from")]);
        assert_eq!(graph.ground(), Some(NetId(0)));
        assert_eq!(graph.find_component("R2").map(|c| c.id), Some(ComponentId(1)));
    }

    #[test]
    fn test_other_net() {
        let r = resistor(0, "R1", 1, 2);
        assert!(r.is_two_terminal());
        assert_eq!(r.other_net(NetId(1)), Some(NetId(2)));
        assert_eq!(r.other_net(NetId(3)), None);
    }
}
