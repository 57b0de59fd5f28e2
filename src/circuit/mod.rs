//! Circuit graph representation and validation.
//!
//! This module turns parsed statements into a [`CircuitGraph`]: subcircuits
//! flattened, every net name resolved to one canonical net, and pins indexed
//! by net for the layout stage.

mod alias;
mod builder;
mod graph;
mod types;
mod validate;

pub use alias::AliasTable;
pub use builder::{build_graph, BuildOptions, GraphBuilder, GROUND_LITERAL};
pub use graph::{CircuitGraph, Component, Net};
pub use types::*;
pub use validate::validate_graph;
