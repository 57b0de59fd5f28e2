//! CircuitMark - text to schematic compiler
//!
//! Reads a circuit description and prints its schematic.
//!
//! # Usage
//!
//! ```bash
//! circuitmark divider.cml
//! circuitmark divider.cml -f svg -o divider.svg
//! RUST_LOG=circuitmark=debug circuitmark divider.cml -f json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use circuitmark::{
    compile_graph,
    circuit::build_graph,
    dsl,
    error::{CircuitMarkError, Diagnostics, Result},
    AsciiConfig, BuildOptions, Options, VectorConfig,
};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Ascii,
    Svg,
    Json,
}

/// Circuit description to schematic compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit description file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Ascii)]
    format: Format,

    /// Write output here instead of stdout
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Require every net to be declared with `node` before use
    #[arg(long)]
    strict: bool,

    /// Maximum subcircuit nesting depth
    #[arg(long, value_name = "N", default_value_t = 32)]
    max_depth: usize,

    /// Leave component values out of labels
    #[arg(long)]
    no_values: bool,

    /// Log pipeline progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CircuitMarkError::InvalidCircuit { .. }) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "circuitmark=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(args: &Args) -> Result<()> {
    let options = Options::new().with_build(
        BuildOptions::new()
            .with_max_depth(args.max_depth)
            .with_require_declared_nets(args.strict),
    );

    let parsed = dsl::parse_file(&args.file, &options.kinds)?;
    let (graph, graph_diagnostics) = build_graph(&parsed.statements, &options.kinds, &options.build);
    let mut diagnostics = parsed.diagnostics;
    diagnostics.extend(graph_diagnostics);
    diagnostics.sort_by_line();

    if diagnostics.has_errors() {
        report(&args.file, &diagnostics);
        return Err(CircuitMarkError::InvalidCircuit { diagnostics });
    }

    let schematic = compile_graph(graph, diagnostics, &options);
    report(&args.file, schematic.diagnostics());

    let rendered = match args.format {
        Format::Ascii => schematic.render_ascii(&AsciiConfig::new().with_values(!args.no_values)),
        Format::Svg => schematic
            .render_vector(&VectorConfig::new().with_values(!args.no_values))
            .to_svg(),
        Format::Json => serde_json::to_string_pretty(&schematic).map_err(|e| CircuitMarkError::Serialize {
            message: e.to_string(),
        })?,
    };

    match &args.output {
        Some(path) => std::fs::write(path, rendered).map_err(|e| CircuitMarkError::FileWrite {
            path: path.display().to_string(),
            source: e,
        }),
        None => {
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

/// Print diagnostics as `file:line: severity: message`.
fn report(file: &Path, diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!(
            "{}:{}: {}: {}",
            file.display(),
            diagnostic.line,
            diagnostic.severity,
            diagnostic.issue
        );
    }
}
