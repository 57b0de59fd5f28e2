//! # CircuitMark
//!
//! A text-to-schematic compiler for electronic circuits.
//!
//! This library provides:
//! - A line-oriented language for describing components, nets and pins
//! - A circuit graph builder with hierarchical subcircuit flattening
//! - Automatic grid placement and orthogonal wire routing
//! - ASCII and vector (SVG) schematic renderers
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Lexer and parser for the circuit description language
//! - [`kinds`] - Component kind table (pin schemas, parameters, glyphs)
//! - [`circuit`] - Net aliasing, graph building and validation
//! - [`layout`] - Grid placement and wire routing
//! - [`render`] - ASCII and vector renderers
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! circuitmark divider.cml                # ASCII to stdout
//! circuitmark divider.cml -f svg -o divider.svg
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use circuitmark::{compile, AsciiConfig, Options};
//!
//! let source = "ground GND\nresistor R1 10k from v_in to GND";
//! let schematic = compile(source, &Options::default())?;
//! println!("{}", schematic.render_ascii(&AsciiConfig::default()));
//! # Ok::<(), circuitmark::CircuitMarkError>(())
//! ```
//!
//! ## Pipeline
//!
//! Every stage consumes the previous stage's output and hands on an
//! immutable result:
//!
//! 1. Lex and parse each line into statements, collecting diagnostics
//! 2. Flatten statements into a [`CircuitGraph`]
//! 3. Stop if any diagnostic so far is an error
//! 4. Place components on the grid and route every net
//! 5. Render the [`Schematic`]
//!
//! Warnings never stop the pipeline; a circuit with warnings still renders.

pub mod circuit;
pub mod dsl;
pub mod error;
pub mod kinds;
pub mod layout;
pub mod render;

use serde::Serialize;
use tracing::debug;

// Re-export main types for convenience
pub use circuit::{BuildOptions, CircuitGraph};
pub use dsl::Parsed;
pub use error::{CircuitMarkError, Diagnostic, Diagnostics, Result};
pub use kinds::KindTable;
pub use layout::{Placement, Route, RouterConfig};
pub use render::{AsciiConfig, AsciiRenderer, Renderer, VectorConfig, VectorDiagram, VectorRenderer};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmSchematic;

/// Settings for a full compile.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub kinds: KindTable,
    pub build: BuildOptions,
    pub router: RouterConfig,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kinds(mut self, kinds: KindTable) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_build(mut self, build: BuildOptions) -> Self {
        self.build = build;
        self
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }
}

/// A placed and routed circuit, ready to render.
#[derive(Debug, Clone, Serialize)]
pub struct Schematic {
    graph: CircuitGraph,
    placement: Placement,
    route: Route,
    diagnostics: Diagnostics,
    #[serde(skip)]
    kinds: KindTable,
}

impl Schematic {
    pub fn graph(&self) -> &CircuitGraph {
        &self.graph
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Warnings from every stage, including unroutable nets.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn kinds(&self) -> &KindTable {
        &self.kinds
    }

    pub fn render_ascii(&self, config: &AsciiConfig) -> String {
        AsciiRenderer::new(config.clone()).render(self)
    }

    pub fn render_vector(&self, config: &VectorConfig) -> VectorDiagram {
        VectorRenderer::new(config.clone()).render(self)
    }
}

/// Parse a circuit description.
pub fn parse(source: &str, kinds: &KindTable) -> Parsed {
    dsl::parse(source, kinds)
}

/// Parse and build a circuit graph with the builtin kinds and default
/// options.
pub fn build(source: &str) -> (CircuitGraph, Diagnostics) {
    build_with(source, &Options::default())
}

/// Parse and build a circuit graph. Diagnostics from both stages are
/// returned in line order.
pub fn build_with(source: &str, options: &Options) -> (CircuitGraph, Diagnostics) {
    let Parsed {
        statements,
        mut diagnostics,
    } = parse(source, &options.kinds);
    let (graph, graph_diagnostics) =
        circuit::build_graph(&statements, &options.kinds, &options.build);
    diagnostics.extend(graph_diagnostics);
    diagnostics.sort_by_line();
    (graph, diagnostics)
}

/// Compile a circuit description into a placed and routed schematic.
///
/// Returns [`CircuitMarkError::InvalidCircuit`] with every diagnostic if the
/// description has errors.
pub fn compile(source: &str, options: &Options) -> Result<Schematic> {
    let (graph, diagnostics) = build_with(source, options);
    if diagnostics.has_errors() {
        debug!(errors = diagnostics.error_count(), "circuit rejected before layout");
        return Err(CircuitMarkError::InvalidCircuit { diagnostics });
    }
    Ok(compile_graph(graph, diagnostics, options))
}

/// Lay out and route an already built graph.
pub fn compile_graph(graph: CircuitGraph, mut diagnostics: Diagnostics, options: &Options) -> Schematic {
    let placement = layout::layout(&graph, &options.kinds);
    let (route, route_diagnostics) = layout::route(&graph, &placement, &options.router);
    diagnostics.extend(route_diagnostics);

    Schematic {
        graph,
        placement,
        route,
        diagnostics,
        kinds: options.kinds.clone(),
    }
}
