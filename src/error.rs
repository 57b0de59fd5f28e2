//! Error types for the CircuitMark compiler.
//!
//! Problems found while compiling a circuit are collected rather than raised:
//! every stage reports [`Issue`]s wrapped in a [`Diagnostic`] (line number and
//! severity) so a single pass can report as many problems as possible.
//! Operations that can fail outright return [`CircuitMarkError`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias using [`CircuitMarkError`].
pub type Result<T> = std::result::Result<T, CircuitMarkError>;

/// Unified error type for fallible CircuitMark operations.
#[derive(Error, Debug)]
pub enum CircuitMarkError {
    /// The circuit has at least one error-severity diagnostic.
    #[error("circuit has {} error(s)", diagnostics.error_count())]
    InvalidCircuit { diagnostics: Diagnostics },

    /// Error reading a circuit file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing rendered output
    #[error("Failed to write output file '{path}': {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error serializing a schematic snapshot
    #[error("Failed to serialize schematic: {message}")]
    Serialize { message: String },
}

impl CircuitMarkError {
    /// Diagnostics carried by an [`CircuitMarkError::InvalidCircuit`] error.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::InvalidCircuit { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Pipeline stage an issue originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lex,
    Parse,
    Graph,
    Layout,
}

/// A single problem found in a circuit description.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Issue {
    // ============ Lexical Issues ============
    /// Character sequence the lexer could not classify
    #[error("unrecognized input '{text}' at column {column}")]
    InvalidToken { text: String, column: usize },

    // ============ Statement Issues ============
    /// Token that does not fit the statement grammar
    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    /// First word of a line is neither a keyword nor a known component kind
    #[error("unknown keyword or component kind '{word}'")]
    UnknownKeyword { word: String },

    /// Two-terminal kind written with named pins
    #[error("{kind} '{reference}' must be connected with 'from <net> to <net>'")]
    ExpectedFromTo { kind: String, reference: String },

    /// Named-pin kind written with `from ... to ...`
    #[error("{kind} '{reference}' must be connected with named pins (<pin>=<net>)")]
    ExpectedNamedPins { kind: String, reference: String },

    /// Same pin or parameter bound twice on one line
    #[error("'{name}' is given more than once for '{reference}'")]
    DuplicateBinding { reference: String, name: String },

    /// Reference id reused within one scope
    #[error("duplicate reference '{reference}'")]
    DuplicateReference { reference: String },

    /// `subcircuit` inside another `subcircuit` block
    #[error("subcircuit '{name}' cannot be defined inside another subcircuit")]
    NestedSubcircuit { name: String },

    /// Block still open at end of input
    #[error("subcircuit '{name}' is missing its 'end'")]
    UnclosedSubcircuit { name: String },

    /// `end` without an open block
    #[error("'end' without a matching 'subcircuit'")]
    UnmatchedEnd,

    /// Port listed twice in a subcircuit header
    #[error("port '{port}' is listed more than once in subcircuit '{name}'")]
    DuplicatePort { name: String, port: String },

    /// Net name declared twice with `node`
    #[error("node '{name}' is declared more than once")]
    RedeclaredNode { name: String },

    // ============ Graph Issues ============
    /// Kind missing from the kind table
    #[error("unknown component kind '{kind}'")]
    UnknownKind { kind: String },

    /// Pin name the kind does not declare
    #[error("'{pin}' is not a pin of {kind} '{reference}'")]
    UnknownPin {
        kind: String,
        reference: String,
        pin: String,
    },

    /// Required pin left unbound
    #[error("{kind} '{reference}' is missing required pin '{pin}'")]
    MissingPin {
        kind: String,
        reference: String,
        pin: String,
    },

    /// Net used without a declaration in strict mode
    #[error("net '{name}' is used before being declared")]
    UndeclaredNet { name: String },

    /// Two subcircuit definitions with one name
    #[error("subcircuit '{name}' is defined more than once")]
    DuplicateSubcircuit { name: String },

    /// `use` of an undefined subcircuit
    #[error("unknown subcircuit '{name}'")]
    UnknownSubcircuit { name: String },

    /// Instance binds a port the definition does not declare
    #[error("subcircuit '{subcircuit}' has no port '{port}' (instance '{instance}')")]
    UnknownPort {
        subcircuit: String,
        instance: String,
        port: String,
    },

    /// Instance leaves a declared port unbound
    #[error("instance '{instance}' of '{subcircuit}' does not bind port '{port}'")]
    MissingPort {
        subcircuit: String,
        instance: String,
        port: String,
    },

    /// Definition that instantiates itself, directly or transitively
    #[error("cyclic subcircuit hierarchy: {path}")]
    CyclicHierarchy { path: String },

    /// Nesting deeper than the configured limit
    #[error("subcircuit nesting under '{instance}' exceeds depth limit {limit}")]
    HierarchyTooDeep { instance: String, limit: usize },

    /// Flattened reference collides with another component
    #[error("reference '{reference}' collides with another component after flattening")]
    ReferenceCollision { reference: String },

    /// Every pin of a component lands on one net
    #[error("component '{reference}' is shorted: all pins connect to net '{net}'")]
    ShortedComponent { reference: String, net: String },

    /// Declared net nothing connects to
    #[error("net '{net}' has no connections")]
    UnusedNet { net: String },

    /// Net with a single incident pin
    #[error("net '{net}' only connects to '{reference}'")]
    DanglingNet { net: String, reference: String },

    /// Circuit with components but no ground net
    #[error("circuit has no ground net")]
    MissingGround,

    /// Definition never instantiated
    #[error("subcircuit '{name}' is never used")]
    UnusedSubcircuit { name: String },

    // ============ Layout Issues ============
    /// Net the router could only draw through a component body or over
    /// another net's wire or pin
    #[error("net '{net}' could not be routed clear of components and other nets")]
    UnroutableNet { net: String },
}

impl Issue {
    /// Severity this issue is reported with.
    pub fn severity(&self) -> Severity {
        match self {
            Self::RedeclaredNode { .. }
            | Self::ShortedComponent { .. }
            | Self::UnusedNet { .. }
            | Self::DanglingNet { .. }
            | Self::MissingGround
            | Self::UnusedSubcircuit { .. }
            | Self::UnroutableNet { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Stage that reports this issue.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidToken { .. } => Stage::Lex,
            Self::UnexpectedToken { .. }
            | Self::UnknownKeyword { .. }
            | Self::ExpectedFromTo { .. }
            | Self::ExpectedNamedPins { .. }
            | Self::DuplicateBinding { .. }
            | Self::DuplicateReference { .. }
            | Self::NestedSubcircuit { .. }
            | Self::UnclosedSubcircuit { .. }
            | Self::UnmatchedEnd
            | Self::DuplicatePort { .. }
            | Self::RedeclaredNode { .. } => Stage::Parse,
            Self::UnroutableNet { .. } => Stage::Layout,
            _ => Stage::Graph,
        }
    }
}

/// An issue tied to a source line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Source line (1-indexed); 0 when the issue concerns the whole circuit
    pub line: usize,
    pub severity: Severity,
    pub issue: Issue,
}

impl Diagnostic {
    /// Wrap an issue, taking its natural severity.
    pub fn new(line: usize, issue: Issue) -> Self {
        Self {
            line,
            severity: issue.severity(),
            issue,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: {}: {}", self.line, self.severity, self.issue)
        } else {
            write!(f, "{}: {}", self.severity, self.issue)
        }
    }
}

/// Ordered collection of diagnostics from one or more stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue found on `line`.
    pub fn report(&mut self, line: usize, issue: Issue) {
        self.items.push(Diagnostic::new(line, issue));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stable sort by line so merged stage output reads top to bottom.
    pub fn sort_by_line(&mut self) {
        self.items.sort_by_key(|d| d.line);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.items {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
