//! DSL (Domain Specific Language) front end for circuit descriptions.
//!
//! CircuitMark is a line-oriented, human-editable netlist language. One
//! statement per line, except `subcircuit … end` blocks.
//!
//! # Grammar Overview
//!
//! ```text
//! circuit     = { line }
//! line        = [ statement ] [ comment ]
//! comment     = '#' { any_char }
//! statement   = ground | node | component | subcircuit | use | 'end'
//!
//! ground      = 'ground' net
//! node        = 'node' net { ',' net }
//! component   = kind ref [ value ] { param } ( from_to | { pin_binding } ) { param }
//! from_to     = 'from' net 'to' net
//! pin_binding = pin '=' net
//! param       = name '=' value
//! subcircuit  = 'subcircuit' name [ '(' ] [ port { [','] port } ] [ ')' ]
//! use         = 'use' name 'as' ref { port '=' net }
//!
//! value       = number | identifier | string
//! number      = ['+'|'-'] digit+ ['.' digit+] [('e'|'E') ['+'|'-'] digit+] [si_prefix] [unit] ['%']
//! si_prefix   = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! Two-terminal kinds (resistor, battery, …) must use `from … to …`; kinds
//! that declare named pins (transistor, opamp, …) must use `pin=net`. See
//! [`crate::kinds`] for the kind table.
//!
//! # Example
//!
//! ```text
//! # Voltage divider
//! ground GND
//! node v_in, v_out
//!
//! battery  V1 +9V from GND to v_out
//! resistor R1 10k from v_in to v_out
//! resistor R2 5k  from v_out to GND
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{tokenize, Lexer, Quantity, SiPrefix, Token, TokenKind, KEYWORDS};
pub use parser::{Line, Parsed, Parser};

use crate::kinds::KindTable;

/// Parse a circuit description into statements plus diagnostics.
pub fn parse(input: &str, kinds: &KindTable) -> Parsed {
    Parser::new(kinds).parse(input)
}

/// Read and parse a circuit file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path, kinds: &KindTable) -> crate::error::Result<Parsed> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::error::CircuitMarkError::FileRead {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(parse(&content, kinds))
}
