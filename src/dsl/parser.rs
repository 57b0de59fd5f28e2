//! Parser for CircuitMark statements.
//!
//! Each physical line is tokenized and parsed on its own. A bad line is
//! reported and skipped so one pass collects every problem in the file.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use crate::error::{Diagnostics, Issue};
use crate::kinds::{KindSpec, KindTable};

/// Statements and diagnostics from one parse.
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    pub statements: Vec<Statement>,
    pub diagnostics: Diagnostics,
}

/// What a single line contributes to the statement stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// Whitespace only
    Blank,
    Statement(StatementKind),
    /// `subcircuit <name> (<ports>)`
    BlockStart { name: String, ports: Vec<String> },
    /// `end`
    BlockEnd,
}

/// Parser for circuit descriptions.
pub struct Parser<'k> {
    kinds: &'k KindTable,
}

/// A subcircuit block being collected.
struct OpenBlock {
    def: SubcircuitDef,
    line: usize,
    references: HashSet<String>,
    nodes: HashSet<String>,
}

impl<'k> Parser<'k> {
    /// Create a parser that recognizes the kinds in `kinds`.
    pub fn new(kinds: &'k KindTable) -> Self {
        Self { kinds }
    }

    /// Parse a complete circuit description.
    pub fn parse(&self, source: &str) -> Parsed {
        let mut statements = Vec::new();
        let mut diagnostics = Diagnostics::new();
        let mut top_references = HashSet::new();
        let mut top_nodes = HashSet::new();
        let mut block: Option<OpenBlock> = None;
        // Depth of rejected nested blocks whose lines are being skipped.
        let mut skipping = 0usize;

        for (index, text) in source.lines().enumerate() {
            let line = index + 1;
            let tokens = tokenize(text, line);

            let parsed = match self.parse_line(&tokens) {
                Ok(parsed) => parsed,
                Err(issue) => {
                    diagnostics.report(line, issue);
                    continue;
                }
            };

            if skipping > 0 {
                match parsed {
                    Line::BlockStart { .. } => skipping += 1,
                    Line::BlockEnd => skipping -= 1,
                    _ => {}
                }
                continue;
            }

            match parsed {
                Line::Blank => {}
                Line::BlockStart { name, ports } => {
                    if block.is_some() {
                        diagnostics.report(line, Issue::NestedSubcircuit { name });
                        skipping = 1;
                    } else {
                        block = Some(OpenBlock {
                            def: SubcircuitDef {
                                name,
                                ports,
                                body: Vec::new(),
                            },
                            line,
                            references: HashSet::new(),
                            nodes: HashSet::new(),
                        });
                    }
                }
                Line::BlockEnd => match block.take() {
                    Some(open) => statements.push(Statement {
                        line: open.line,
                        kind: StatementKind::SubcircuitDef(open.def),
                    }),
                    None => diagnostics.report(line, Issue::UnmatchedEnd),
                },
                Line::Statement(kind) => {
                    let (body, references, nodes) = match block.as_mut() {
                        Some(open) => (&mut open.def.body, &mut open.references, &mut open.nodes),
                        None => (&mut statements, &mut top_references, &mut top_nodes),
                    };
                    for name in declared_names(&kind) {
                        if !nodes.insert(name.to_string()) {
                            diagnostics.report(
                                line,
                                Issue::RedeclaredNode {
                                    name: name.to_string(),
                                },
                            );
                        }
                    }
                    if let Some(reference) = statement_reference(&kind) {
                        if !references.insert(reference.to_string()) {
                            diagnostics.report(
                                line,
                                Issue::DuplicateReference {
                                    reference: reference.to_string(),
                                },
                            );
                            continue;
                        }
                    }
                    body.push(Statement { line, kind });
                }
            }
        }

        if let Some(open) = block {
            diagnostics.report(
                open.line,
                Issue::UnclosedSubcircuit {
                    name: open.def.name.clone(),
                },
            );
            statements.push(Statement {
                line: open.line,
                kind: StatementKind::SubcircuitDef(open.def),
            });
        }

        debug!(
            statements = statements.len(),
            diagnostics = diagnostics.len(),
            "parsed circuit description"
        );

        Parsed {
            statements,
            diagnostics,
        }
    }

    /// Parse the tokens of one line.
    pub fn parse_line(&self, tokens: &[Token]) -> Result<Line, Issue> {
        if let Some(bad) = tokens.iter().find(|t| t.is(TokenKind::Invalid)) {
            return Err(Issue::InvalidToken {
                text: bad.text.clone(),
                column: bad.column,
            });
        }

        if let Some(comment) = tokens.first().filter(|t| t.is(TokenKind::Comment)) {
            return Ok(Line::Statement(StatementKind::Comment {
                text: comment.text.trim_start_matches('#').trim().to_string(),
            }));
        }

        let mut cursor = Cursor::new(tokens);
        let first = cursor.peek().clone();

        match first.kind {
            TokenKind::EndOfLine => Ok(Line::Blank),
            TokenKind::Keyword => {
                cursor.advance();
                match first.text.as_str() {
                    "ground" => self.parse_ground(&mut cursor),
                    "node" => self.parse_node(&mut cursor),
                    "subcircuit" => self.parse_subcircuit_header(&mut cursor),
                    "end" => {
                        cursor.expect_end()?;
                        Ok(Line::BlockEnd)
                    }
                    "use" => self.parse_use(&mut cursor),
                    _ => Err(Issue::UnexpectedToken {
                        expected: "a statement".to_string(),
                        found: first.text.clone(),
                    }),
                }
            }
            TokenKind::Identifier => match self.kinds.get(&first.text) {
                Some(spec) => {
                    cursor.advance();
                    self.parse_component(spec, &mut cursor)
                }
                None => Err(Issue::UnknownKeyword {
                    word: first.text.clone(),
                }),
            },
            _ => Err(Issue::UnexpectedToken {
                expected: "a statement".to_string(),
                found: first.text.clone(),
            }),
        }
    }

    fn parse_ground(&self, cursor: &mut Cursor<'_>) -> Result<Line, Issue> {
        let name = cursor.expect_net("ground net name")?;
        cursor.expect_end()?;
        Ok(Line::Statement(StatementKind::GroundDecl { name }))
    }

    fn parse_node(&self, cursor: &mut Cursor<'_>) -> Result<Line, Issue> {
        let mut names = vec![cursor.expect_net("node name")?];
        while !cursor.at_end() {
            if !cursor.eat_punct(',') {
                return Err(cursor.unexpected("','"));
            }
            names.push(cursor.expect_net("node name")?);
        }
        Ok(Line::Statement(StatementKind::NodeDecl { names }))
    }

    fn parse_subcircuit_header(&self, cursor: &mut Cursor<'_>) -> Result<Line, Issue> {
        let name = cursor.expect_name("subcircuit name")?;
        let parenthesized = cursor.eat_punct('(');
        let mut ports: Vec<String> = Vec::new();

        loop {
            if cursor.at_end() || (parenthesized && cursor.peek().is_punct(')')) {
                break;
            }
            if !ports.is_empty() {
                cursor.eat_punct(',');
            }
            let port = cursor.expect_name("port name")?;
            if ports.contains(&port) {
                return Err(Issue::DuplicatePort { name, port });
            }
            ports.push(port);
        }

        if parenthesized && !cursor.eat_punct(')') {
            return Err(cursor.unexpected("')'"));
        }
        cursor.expect_end()?;
        Ok(Line::BlockStart { name, ports })
    }

    fn parse_use(&self, cursor: &mut Cursor<'_>) -> Result<Line, Issue> {
        let def_name = cursor.expect_name("subcircuit name")?;
        if !cursor.peek().is_keyword("as") {
            return Err(cursor.unexpected("'as'"));
        }
        cursor.advance();
        let reference = cursor.expect_name("instance reference")?;

        let mut port_bindings = IndexMap::new();
        while !cursor.at_end() {
            cursor.eat_punct(',');
            let (port, net) = cursor.expect_binding()?;
            if port_bindings.insert(port.clone(), net).is_some() {
                return Err(Issue::DuplicateBinding {
                    reference,
                    name: port,
                });
            }
        }

        Ok(Line::Statement(StatementKind::SubcircuitInst(SubcircuitInst {
            def_name,
            reference,
            port_bindings,
        })))
    }

    fn parse_component(&self, spec: &KindSpec, cursor: &mut Cursor<'_>) -> Result<Line, Issue> {
        let reference = cursor.expect_name("component reference")?;
        let two_terminal = spec.pins.is_two_terminal();

        let mut value = None;
        let next = cursor.peek();
        if matches!(next.kind, TokenKind::Identifier | TokenKind::Number | TokenKind::Str)
            && !cursor.peek_at(1).is_punct('=')
        {
            value = Some(cursor.value()?);
        }

        let mut params = IndexMap::new();
        let mut pins = IndexMap::new();
        let mut connected = false;

        while !cursor.at_end() {
            let token = cursor.peek().clone();
            let binding = matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword)
                && cursor.peek_at(1).is_punct('=');

            if binding {
                let (key, raw) = cursor.expect_binding()?;
                if two_terminal && spec.pins.has_pin(&key) {
                    return Err(Issue::ExpectedFromTo {
                        kind: spec.name.clone(),
                        reference,
                    });
                }
                if !two_terminal && spec.pins.has_pin(&key) {
                    if pins.insert(key.clone(), raw).is_some() {
                        return Err(duplicate(&reference, &key));
                    }
                } else if spec.accepts_param(&key) {
                    if params.insert(key.clone(), Value::from_literal(&raw)).is_some() {
                        return Err(duplicate(&reference, &key));
                    }
                } else if pins.insert(key.clone(), raw).is_some() {
                    // Neither pin nor parameter: kept so graph validation
                    // can report it as an unknown pin.
                    return Err(duplicate(&reference, &key));
                }
            } else if token.is_keyword("from") {
                if !two_terminal {
                    return Err(Issue::ExpectedNamedPins {
                        kind: spec.name.clone(),
                        reference,
                    });
                }
                if connected {
                    return Err(Issue::DuplicateBinding {
                        reference,
                        name: "from".to_string(),
                    });
                }
                cursor.advance();
                let from = cursor.expect_net("net after 'from'")?;
                if !cursor.peek().is_keyword("to") {
                    return Err(cursor.unexpected("'to'"));
                }
                cursor.advance();
                let to = cursor.expect_net("net after 'to'")?;
                pins.insert("from".to_string(), from);
                pins.insert("to".to_string(), to);
                connected = true;
            } else {
                return Err(cursor.unexpected("'from', '<name>=<value>' or end of line"));
            }
        }

        if two_terminal && !connected {
            return Err(Issue::ExpectedFromTo {
                kind: spec.name.clone(),
                reference,
            });
        }

        // `from`/`to` first so pin order follows the schema.
        if two_terminal {
            pins.sort_by(|a, _, b, _| pin_rank(a).cmp(&pin_rank(b)));
        }

        Ok(Line::Statement(StatementKind::ComponentInst(ComponentInst {
            kind: spec.name.clone(),
            reference,
            value,
            params,
            pins,
        })))
    }
}

fn duplicate(reference: &str, name: &str) -> Issue {
    Issue::DuplicateBinding {
        reference: reference.to_string(),
        name: name.to_string(),
    }
}

fn pin_rank(pin: &str) -> u8 {
    match pin {
        "from" => 0,
        "to" => 1,
        _ => 2,
    }
}

fn declared_names(kind: &StatementKind) -> Vec<&str> {
    match kind {
        StatementKind::NodeDecl { names } => names.iter().map(String::as_str).collect(),
        StatementKind::GroundDecl { name } => vec![name.as_str()],
        _ => Vec::new(),
    }
}

fn statement_reference(kind: &StatementKind) -> Option<&str> {
    match kind {
        StatementKind::ComponentInst(c) => Some(&c.reference),
        StatementKind::SubcircuitInst(s) => Some(&s.reference),
        _ => None,
    }
}

/// Position within one line's tokens.
struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: Token,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let line = tokens.first().map_or(0, |t| t.line);
        Self {
            tokens,
            pos: 0,
            end: Token {
                kind: TokenKind::EndOfLine,
                text: String::new(),
                line,
                column: 0,
            },
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    /// Token `offset` places ahead; trailing comments read as end of line.
    fn peek_at(&self, offset: usize) -> &Token {
        match self.tokens.get(self.pos + offset) {
            Some(token) if !token.is(TokenKind::Comment) => token,
            _ => &self.end,
        }
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.peek().is(TokenKind::EndOfLine)
    }

    fn eat_punct(&mut self, punct: char) -> bool {
        if self.peek().is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Issue {
        Issue::UnexpectedToken {
            expected: expected.to_string(),
            found: self.peek().describe().to_string(),
        }
    }

    fn expect_end(&self) -> Result<(), Issue> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of line"))
        }
    }

    /// An identifier naming a component, subcircuit or port.
    fn expect_name(&mut self, what: &str) -> Result<String, Issue> {
        let token = self.peek();
        if token.is(TokenKind::Identifier) {
            let text = token.text.clone();
            self.advance();
            Ok(text)
        } else {
            Err(self.unexpected(what))
        }
    }

    /// A net name; numeric names such as `0` are allowed.
    fn expect_net(&mut self, what: &str) -> Result<String, Issue> {
        let token = self.peek();
        if matches!(token.kind, TokenKind::Identifier | TokenKind::Number) {
            let text = token.text.clone();
            self.advance();
            Ok(text)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn value(&mut self) -> Result<Value, Issue> {
        let token = self.peek();
        let value = match token.kind {
            TokenKind::Str => Value::Bare {
                text: token.text.clone(),
            },
            TokenKind::Identifier | TokenKind::Number => Value::from_literal(&token.text),
            _ => return Err(self.unexpected("a value")),
        };
        self.advance();
        Ok(value)
    }

    /// `<name>=<value>`, returning the value's raw text.
    fn expect_binding(&mut self) -> Result<(String, String), Issue> {
        let key = self.peek();
        if !matches!(key.kind, TokenKind::Identifier | TokenKind::Keyword) {
            return Err(self.unexpected("'<name>=<value>'"));
        }
        let key = key.text.clone();
        self.advance();
        if !self.eat_punct('=') {
            return Err(self.unexpected("'='"));
        }
        let value = self.peek();
        if !matches!(value.kind, TokenKind::Identifier | TokenKind::Number | TokenKind::Str) {
            return Err(self.unexpected("a value after '='"));
        }
        let value = value.text.clone();
        self.advance();
        Ok((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Issue;

    fn parse(input: &str) -> Parsed {
        let kinds = KindTable::builtin();
        Parser::new(&kinds).parse(input)
    }

    fn component(stmt: &Statement) -> &ComponentInst {
        match &stmt.kind {
            StatementKind::ComponentInst(c) => c,
            other => panic!("expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_two_terminal() {
        let parsed = parse("resistor R1 10k tolerance=5% from v_in to v_out");
        assert!(parsed.diagnostics.is_empty(), "{}", parsed.diagnostics);
        let r1 = component(&parsed.statements[0]);
        assert_eq!(r1.kind, "resistor");
        assert_eq!(r1.reference, "R1");
        assert_eq!(r1.value.as_ref().map(|v| v.text()), Some("10k"));
        assert_eq!(r1.params["tolerance"].text(), "5%");
        assert_eq!(r1.pins["from"], "v_in");
        assert_eq!(r1.pins["to"], "v_out");
    }

    #[test]
    fn test_parse_named_pins() {
        let parsed = parse("transistor Q1 2N3904 base=b collector=c emitter=GND");
        assert!(parsed.diagnostics.is_empty(), "{}", parsed.diagnostics);
        let q1 = component(&parsed.statements[0]);
        assert_eq!(q1.value.as_ref().map(|v| v.text()), Some("2N3904"));
        let pins: Vec<_> = q1.pins.keys().map(String::as_str).collect();
        assert_eq!(pins, vec!["base", "collector", "emitter"]);
    }

    #[test]
    fn test_wrong_pin_form_is_reported() {
        let parsed = parse("transistor Q1 from a to b\nresistor R1 from=a to=b");
        let issues: Vec<_> = parsed.diagnostics.iter().map(|d| (d.line, d.issue.clone())).collect();
        assert_eq!(issues.len(), 2);
        assert!(matches!(issues[0], (1, Issue::ExpectedNamedPins { .. })));
        assert!(matches!(issues[1], (2, Issue::ExpectedFromTo { .. })));
        assert!(parsed.statements.is_empty());
    }

    #[test]
    fn test_declarations() {
        let parsed = parse("ground GND\nnode v_in, v_out\n# divider\n");
        assert_eq!(parsed.statements.len(), 3);
        assert_eq!(
            parsed.statements[1].kind,
            StatementKind::NodeDecl {
                names: vec!["v_in".into(), "v_out".into()]
            }
        );
        assert_eq!(
            parsed.statements[2].kind,
            StatementKind::Comment {
                text: "divider".into()
            }
        );
    }

    #[test]
    fn test_subcircuit_block() {
        let input = "\
subcircuit stage (in, out)
  resistor R1 1k from in to out
  capacitor C1 10n from out to GND
end
use stage as X1 in=a out=b";
        let parsed = parse(input);
        assert!(parsed.diagnostics.is_empty(), "{}", parsed.diagnostics);
        assert_eq!(parsed.statements.len(), 2);
        match &parsed.statements[0].kind {
            StatementKind::SubcircuitDef(def) => {
                assert_eq!(def.name, "stage");
                assert_eq!(def.ports, vec!["in", "out"]);
                assert_eq!(def.body.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &parsed.statements[1].kind {
            StatementKind::SubcircuitInst(inst) => {
                assert_eq!(inst.def_name, "stage");
                assert_eq!(inst.reference, "X1");
                assert_eq!(inst.port_bindings["out"], "b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recovers_after_bad_lines() {
        let input = "\
ground GND
flux F1 from a to b
resistor R1 1k from a to GND
resistor R1 2k from a to GND
resistor R2 @ from a to GND
end";
        let parsed = parse(input);
        let lines: Vec<_> = parsed.diagnostics.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![2, 4, 5, 6]);
        assert!(matches!(
            parsed.diagnostics.iter().next().map(|d| &d.issue),
            Some(Issue::UnknownKeyword { .. })
        ));
        assert_eq!(parsed.statements.len(), 2);
    }

    #[test]
    fn test_unclosed_and_nested_blocks() {
        let input = "\
subcircuit outer (a)
subcircuit inner (b)
end
resistor R1 1k from a to GND";
        let parsed = parse(input);
        let issues: Vec<_> = parsed.diagnostics.iter().map(|d| &d.issue).collect();
        assert!(matches!(issues[0], Issue::NestedSubcircuit { .. }));
        assert!(matches!(issues[1], Issue::UnclosedSubcircuit { .. }));
    }

    #[test]
    fn test_node_names_need_commas() {
        let parsed = parse("node a b\nnode c,");
        assert!(parsed.statements.is_empty());
        let issues: Vec<_> = parsed.diagnostics.iter().map(|d| (d.line, &d.issue)).collect();
        assert_eq!(issues.len(), 2);
        assert!(matches!(issues[0], (1, Issue::UnexpectedToken { expected, found }) if expected == "','" && found == "b"));
        assert!(matches!(issues[1], (2, Issue::UnexpectedToken { .. })));
    }

    #[test]
    fn test_redeclared_node_is_a_warning() {
        let parsed = parse("node a, b\nnode b");
        assert_eq!(parsed.statements.len(), 2);
        let d = parsed.diagnostics.iter().next().unwrap();
        assert_eq!(d.line, 2);
        assert!(!d.is_error());
        assert!(matches!(d.issue, Issue::RedeclaredNode { ref name } if name == "b"));
    }

    #[test]
    fn test_unknown_key_kept_as_pin() {
        let parsed = parse("transistor Q1 base=b collector=c emitter=e gate=g");
        assert!(parsed.diagnostics.is_empty());
        let q1 = component(&parsed.statements[0]);
        assert_eq!(q1.pins.len(), 4);
        assert!(q1.params.is_empty());
    }
}
