//! Core identifier types for the circuit graph.

use std::fmt;

use serde::Serialize;

/// Index of a net in its [`super::CircuitGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NetId(pub usize);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Index of a component in its [`super::CircuitGraph`], in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ComponentId(pub usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// One pin of one component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PinRef {
    pub component: ComponentId,
    pub pin: String,
}

impl PinRef {
    pub fn new(component: ComponentId, pin: impl Into<String>) -> Self {
        Self {
            component,
            pin: pin.into(),
        }
    }
}
