//! Lexer (tokenizer) for CircuitMark source lines.
//!
//! The lexer works on one physical line at a time and never fails: input it
//! cannot classify becomes a [`TokenKind::Invalid`] token that the parser
//! reports.

use std::fmt;

use serde::Serialize;

/// Statement keywords. Component kinds are not keywords; they live in the
/// kind table and lex as identifiers.
pub const KEYWORDS: &[&str] = &["ground", "node", "subcircuit", "end", "use", "as", "from", "to"];

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text (string literals without their quotes)
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_punct(&self, punct: char) -> bool {
        self.kind == TokenKind::Punct && self.text.starts_with(punct)
    }

    /// Text used when quoting the token back in a diagnostic.
    pub fn describe(&self) -> &str {
        match self.kind {
            TokenKind::EndOfLine => "end of line",
            _ => &self.text,
        }
    }
}

/// Token types in the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Name of a net, component, kind, pin or subcircuit
    Identifier,
    /// One of [`KEYWORDS`]
    Keyword,
    /// Decimal magnitude with optional SI prefix, unit letters and `%`
    Number,
    /// Double-quoted string literal
    Str,
    /// `=`, `,`, `(` or `)`
    Punct,
    /// `#` to end of line
    Comment,
    /// Unrecognized input
    Invalid,
    /// Terminates every token sequence
    EndOfLine,
}

/// Lexer over a single source line.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer for `text`, reporting positions on `line`.
    pub fn new(text: &'a str, line: usize) -> Self {
        Self {
            chars: text.chars().peekable(),
            line,
            column: 1,
            finished: false,
        }
    }

    /// Get the next token. Returns `None` once the end-of-line token has
    /// been produced.
    pub fn next_token(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        self.skip_whitespace();

        let start_column = self.column;
        let ch = match self.chars.peek().copied() {
            Some(ch) => ch,
            None => {
                self.finished = true;
                return Some(self.token(TokenKind::EndOfLine, String::new(), start_column));
            }
        };

        let token = match ch {
            '#' => {
                let text: String = self.chars.by_ref().collect();
                self.column += text.chars().count();
                self.token(TokenKind::Comment, text, start_column)
            }
            '=' | ',' | '(' | ')' => {
                self.advance();
                self.token(TokenKind::Punct, ch.to_string(), start_column)
            }
            '"' => self.read_string(start_column),
            _ if is_word_char(ch) => {
                let word = self.read_word();
                let kind = classify_word(&word);
                self.token(kind, word, start_column)
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || is_word_char(c) || matches!(c, '=' | ',' | '(' | ')' | '"' | '#') {
                        break;
                    }
                    text.push(c);
                    self.advance();
                }
                self.token(TokenKind::Invalid, text, start_column)
            }
        };

        Some(token)
    }

    fn token(&self, kind: TokenKind, text: String, column: usize) -> Token {
        Token {
            kind,
            text,
            line: self.line,
            column,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.column += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if is_word_char(ch) {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    fn read_string(&mut self, start_column: usize) -> Token {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => return self.token(TokenKind::Str, text, start_column),
                Some(ch) => text.push(ch),
                None => return self.token(TokenKind::Invalid, format!("\"{}", text), start_column),
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '+' | '-' | '%' | 'µ')
}

fn classify_word(word: &str) -> TokenKind {
    if KEYWORDS.contains(&word) {
        TokenKind::Keyword
    } else if Quantity::parse(word).is_some() {
        TokenKind::Number
    } else if word.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        // Words such as `2N3904` fail the number grammar and stay names.
        TokenKind::Identifier
    } else {
        TokenKind::Invalid
    }
}

/// Tokenize one source line. The result always ends with a
/// [`TokenKind::EndOfLine`] token.
pub fn tokenize(text: &str, line: usize) -> Vec<Token> {
    Lexer::new(text, line).collect()
}

/// SI prefixes accepted after a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SiPrefix {
    Pico,
    Nano,
    Micro,
    Milli,
    Kilo,
    Mega,
    Giga,
}

impl SiPrefix {
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            'p' => Some(Self::Pico),
            'n' => Some(Self::Nano),
            'u' | 'µ' => Some(Self::Micro),
            'm' => Some(Self::Milli),
            'k' | 'K' => Some(Self::Kilo),
            'M' => Some(Self::Mega),
            'G' => Some(Self::Giga),
            _ => None,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Pico => 1e-12,
            Self::Nano => 1e-9,
            Self::Micro => 1e-6,
            Self::Milli => 1e-3,
            Self::Kilo => 1e3,
            Self::Mega => 1e6,
            Self::Giga => 1e9,
        }
    }
}

/// A numeric literal such as `10k`, `4.7uF`, `+9V` or `5%`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantity {
    /// Decimal magnitude as written (sign included)
    pub magnitude: f64,
    pub prefix: Option<SiPrefix>,
    /// Trailing unit letters, e.g. `V`, `F`, `Hz`
    pub unit: String,
    pub percent: bool,
}

impl Quantity {
    /// Parse a numeric literal. Returns `None` when the magnitude is not a
    /// decimal number or unexpected characters follow the unit.
    pub fn parse(text: &str) -> Option<Self> {
        let (body, percent) = match text.strip_suffix('%') {
            Some(body) => (body, true),
            None => (text, false),
        };

        let chars: Vec<char> = body.chars().collect();
        let mut i = 0;
        if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
            i += 1;
        }

        // Integer and decimal part
        let mut digits = 0;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
        if i < chars.len() && chars[i] == '.' {
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
                digits += 1;
            }
        }
        if digits == 0 {
            return None;
        }

        // Exponent, only when digits follow
        if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
            let mut j = i + 1;
            if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                j += 1;
            }
            let exp_start = j;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if j > exp_start {
                i = j;
            }
        }

        let magnitude: f64 = chars[..i].iter().collect::<String>().parse().ok()?;

        let mut prefix = None;
        if i < chars.len() {
            if let Some(p) = SiPrefix::from_char(chars[i]) {
                prefix = Some(p);
                i += 1;
            }
        }

        let unit: String = chars[i..].iter().collect();
        if !unit.chars().all(|c| c.is_ascii_alphabetic() || c == 'Ω') {
            return None;
        }
        if percent && (prefix.is_some() || !unit.is_empty()) {
            return None;
        }

        Some(Self {
            magnitude,
            prefix,
            unit,
            percent,
        })
    }

    /// Magnitude scaled by the SI prefix.
    pub fn value(&self) -> f64 {
        self.magnitude * self.prefix.map_or(1.0, |p| p.multiplier())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.magnitude)?;
        if let Some(prefix) = self.prefix {
            let ch = match prefix {
                SiPrefix::Pico => 'p',
                SiPrefix::Nano => 'n',
                SiPrefix::Micro => 'u',
                SiPrefix::Milli => 'm',
                SiPrefix::Kilo => 'k',
                SiPrefix::Mega => 'M',
                SiPrefix::Giga => 'G',
            };
            write!(f, "{}", ch)?;
        }
        write!(f, "{}", self.unit)?;
        if self.percent {
            write!(f, "%")?;
        }
        Ok(())
    }
}
