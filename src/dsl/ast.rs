//! Abstract Syntax Tree types for CircuitMark statements.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::lexer::Quantity;

/// One parsed statement with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Source line number for error reporting
    pub line: usize,
    pub kind: StatementKind,
}

/// Statement variants produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `ground <name>`
    GroundDecl { name: String },
    /// `node <name> (, <name>)*`
    NodeDecl { names: Vec<String> },
    /// A component line in either pin form
    ComponentInst(ComponentInst),
    /// `subcircuit <name> (<port>, ...) ... end`
    SubcircuitDef(SubcircuitDef),
    /// `use <name> as <ref> (<port>=<net>)*`
    SubcircuitInst(SubcircuitInst),
    /// A line holding only a comment
    Comment { text: String },
}

/// A component instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInst {
    /// Kind name as registered in the kind table (lower-case)
    pub kind: String,
    /// Reference id, unique within its scope
    pub reference: String,
    /// Bare value following the reference (`10k`, `2N3904`)
    pub value: Option<Value>,
    /// `name=value` parameters in source order
    pub params: IndexMap<String, Value>,
    /// Pin name to net name, in source order
    pub pins: IndexMap<String, String>,
}

/// A subcircuit definition block.
#[derive(Debug, Clone, PartialEq)]
pub struct SubcircuitDef {
    pub name: String,
    /// Port names in declaration order
    pub ports: Vec<String>,
    pub body: Vec<Statement>,
}

/// A subcircuit instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct SubcircuitInst {
    /// Name of the definition being instantiated
    pub def_name: String,
    /// Instance reference id, used as the hierarchical prefix
    pub reference: String,
    /// Port name to outer net name
    pub port_bindings: IndexMap<String, String>,
}

/// A parameter or component value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Value {
    /// A word or string kept as written (`2N3904`, `"dark red"`)
    Bare { text: String },
    /// A magnitude with optional SI prefix and unit (`10k`, `+9V`)
    Quantity { text: String, quantity: Quantity },
    /// A percentage (`5%`)
    Percent { text: String, percent: f64 },
}

impl Value {
    /// Classify a literal the way the lexer classified its token.
    pub fn from_literal(text: &str) -> Self {
        match Quantity::parse(text) {
            Some(q) if q.percent => Value::Percent {
                text: text.to_string(),
                percent: q.magnitude,
            },
            Some(quantity) => Value::Quantity {
                text: text.to_string(),
                quantity,
            },
            None => Value::Bare {
                text: text.to_string(),
            },
        }
    }

    /// Source text of the value.
    pub fn text(&self) -> &str {
        match self {
            Value::Bare { text } | Value::Quantity { text, .. } | Value::Percent { text, .. } => text,
        }
    }

    /// Numeric value scaled by its SI prefix, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bare { .. } => None,
            Value::Quantity { quantity, .. } => Some(quantity.value()),
            Value::Percent { percent, .. } => Some(*percent),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_value_classification() {
        assert!(matches!(Value::from_literal("2N3904"), Value::Bare { .. }));
        assert!(matches!(Value::from_literal("5%"), Value::Percent { percent, .. } if percent == 5.0));

        let v = Value::from_literal("4.7k");
        assert_relative_eq!(v.as_f64().unwrap(), 4700.0);
        assert_eq!(v.to_string(), "4.7k");
    }
}
