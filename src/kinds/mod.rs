//! Component kind table.
//!
//! A component's kind is a plain name plus an entry in a [`KindTable`] that
//! holds its pin schema, accepted parameters and drawing templates. Adding a
//! kind means registering a [`KindSpec`]:
//!
//! | Kind | Symbol | Pins |
//! |------|--------|------|
//! | resistor | R | `from … to …` |
//! | capacitor | C | `from … to …` |
//! | inductor | L | `from … to …` |
//! | diode | D | `from` (anode) `to` (cathode) |
//! | led | LED | `from` (anode) `to` (cathode) |
//! | battery | B | `from` (−) `to` (+) |
//! | acsource | AC | `from … to …` |
//! | switch | SW | `from … to …` |
//! | wire | W | `from … to …` |
//! | transistor | Q | `base=` `collector=` `emitter=` |
//! | mosfet | M | `gate=` `drain=` `source=` |
//! | opamp | U | `in_p=` `in_n=` `out=` |
//! | potentiometer | P | `a=` `wiper=` `b=` |

mod glyphs;

pub use glyphs::Glyph;

use indexmap::IndexMap;
use serde::Serialize;

/// Parameters every kind accepts.
pub const SHARED_PARAMS: &[&str] = &[
    "model",
    "tolerance",
    "power",
    "color",
    "state",
    "amplitude",
    "frequency",
    "label",
];

/// Pin names of every two-terminal kind, in `from`/`to` order.
pub const TWO_TERMINAL_PINS: [&str; 2] = ["from", "to"];

/// Side of a component body a pin leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

/// A named pin and where it sits on the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSpec {
    pub name: String,
    pub side: Side,
    /// Slot along the side: -1, 0 or +1 (towards +x / +y)
    pub offset: i32,
}

impl PinSpec {
    pub fn new(name: impl Into<String>, side: Side, offset: i32) -> Self {
        Self {
            name: name.into(),
            side,
            offset: offset.clamp(-1, 1),
        }
    }
}

/// How a kind's pins are written and bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinSchema {
    /// Implicit `from`/`to` pins written as `from <net> to <net>`
    TwoTerminal,
    /// Explicit pins written as `<pin>=<net>`
    Named(Vec<PinSpec>),
}

impl PinSchema {
    pub fn is_two_terminal(&self) -> bool {
        matches!(self, PinSchema::TwoTerminal)
    }

    /// Pin names in schema order.
    pub fn pin_names(&self) -> Vec<&str> {
        match self {
            PinSchema::TwoTerminal => TWO_TERMINAL_PINS.to_vec(),
            PinSchema::Named(pins) => pins.iter().map(|p| p.name.as_str()).collect(),
        }
    }

    pub fn has_pin(&self, name: &str) -> bool {
        self.pin_names().contains(&name)
    }

    /// Named pin entry, if this schema uses named pins.
    pub fn pin(&self, name: &str) -> Option<&PinSpec> {
        match self {
            PinSchema::TwoTerminal => None,
            PinSchema::Named(pins) => pins.iter().find(|p| p.name == name),
        }
    }
}

/// Everything the compiler knows about one component kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindSpec {
    /// Lower-case kind name used in source (`resistor`)
    pub name: String,
    /// Short symbol used for boxed drawings and labels (`R`)
    pub symbol: String,
    pub pins: PinSchema,
    /// Kind-specific parameter names (in addition to [`SHARED_PARAMS`])
    pub params: Vec<String>,
    pub glyph: Glyph,
}

impl KindSpec {
    /// A two-terminal kind drawn with the given templates.
    pub fn two_terminal(name: &str, symbol: &str, params: &[&str], glyph: Glyph) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            symbol: symbol.to_string(),
            pins: PinSchema::TwoTerminal,
            params: params.iter().map(|p| p.to_string()).collect(),
            glyph,
        }
    }

    /// A multi-pin kind drawn as a labelled box.
    pub fn named(name: &str, symbol: &str, pins: Vec<PinSpec>, params: &[&str]) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            symbol: symbol.to_string(),
            pins: PinSchema::Named(pins),
            params: params.iter().map(|p| p.to_string()).collect(),
            glyph: Glyph::boxed(symbol),
        }
    }

    pub fn accepts_param(&self, name: &str) -> bool {
        SHARED_PARAMS.contains(&name) || self.params.iter().any(|p| p == name)
    }

    pub fn pin_count(&self) -> usize {
        self.pins.pin_names().len()
    }
}

/// Lookup table from kind name to [`KindSpec`], in registration order.
#[derive(Debug, Clone)]
pub struct KindTable {
    kinds: IndexMap<String, KindSpec>,
}

impl KindTable {
    /// A table with no kinds registered.
    pub fn empty() -> Self {
        Self {
            kinds: IndexMap::new(),
        }
    }

    /// The standard kinds.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.register(KindSpec::two_terminal("resistor", "R", &[], glyphs::resistor()));
        table.register(KindSpec::two_terminal(
            "capacitor",
            "C",
            &["voltage", "dielectric"],
            glyphs::capacitor(),
        ));
        table.register(KindSpec::two_terminal("inductor", "L", &["current"], glyphs::inductor()));
        table.register(KindSpec::two_terminal("diode", "D", &[], glyphs::diode()));
        table.register(KindSpec::two_terminal("led", "LED", &["wavelength"], glyphs::diode()));
        table.register(KindSpec::two_terminal("battery", "B", &["capacity"], glyphs::battery()));
        table.register(KindSpec::two_terminal("acsource", "AC", &["phase"], glyphs::ac_source()));
        table.register(KindSpec::two_terminal("switch", "SW", &[], glyphs::switch()));
        table.register(KindSpec::two_terminal("wire", "W", &[], glyphs::wire()));
        table.register(KindSpec::named(
            "transistor",
            "Q",
            vec![
                PinSpec::new("base", Side::Left, 0),
                PinSpec::new("collector", Side::Top, 0),
                PinSpec::new("emitter", Side::Bottom, 0),
            ],
            &["type", "gain"],
        ));
        table.register(KindSpec::named(
            "mosfet",
            "M",
            vec![
                PinSpec::new("gate", Side::Left, 0),
                PinSpec::new("drain", Side::Top, 0),
                PinSpec::new("source", Side::Bottom, 0),
            ],
            &["type", "threshold"],
        ));
        table.register(KindSpec::named(
            "opamp",
            "U",
            vec![
                PinSpec::new("in_n", Side::Left, 1),
                PinSpec::new("in_p", Side::Left, -1),
                PinSpec::new("out", Side::Right, 0),
            ],
            &["gain"],
        ));
        table.register(KindSpec::named(
            "potentiometer",
            "P",
            vec![
                PinSpec::new("a", Side::Bottom, 0),
                PinSpec::new("wiper", Side::Right, 0),
                PinSpec::new("b", Side::Top, 0),
            ],
            &["taper", "position"],
        ));
        table
    }

    /// Register a kind, replacing any kind with the same name.
    pub fn register(&mut self, spec: KindSpec) {
        self.kinds.insert(spec.name.clone(), spec);
    }

    /// Look a kind up by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&KindSpec> {
        self.kinds
            .get(name)
            .or_else(|| self.kinds.get(&name.to_ascii_lowercase()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KindSpec> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for KindTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let table = KindTable::builtin();
        assert!(table.contains("Resistor"));
        assert!(table.contains("TRANSISTOR"));
        assert!(!table.contains("flux_capacitor"));
    }

    #[test]
    fn test_pin_schemas() {
        let table = KindTable::builtin();
        let r = table.get("resistor").unwrap();
        assert!(r.pins.is_two_terminal());
        assert_eq!(r.pins.pin_names(), vec!["from", "to"]);

        let q = table.get("transistor").unwrap();
        assert_eq!(q.pin_count(), 3);
        assert_eq!(q.pins.pin("base").map(|p| p.side), Some(Side::Left));
        assert!(!q.pins.has_pin("gate"));
    }

    #[test]
    fn test_register_custom_kind() {
        let mut table = KindTable::empty();
        table.register(KindSpec::named(
            "relay",
            "K",
            vec![
                PinSpec::new("coil_a", Side::Left, -1),
                PinSpec::new("coil_b", Side::Left, 1),
                PinSpec::new("com", Side::Right, 0),
            ],
            &[],
        ));
        let relay = table.get("relay").unwrap();
        assert!(relay.accepts_param("model"));
        assert!(!relay.accepts_param("gain"));
        assert_eq!(relay.glyph.vertical[1], "| K |");
    }
}
