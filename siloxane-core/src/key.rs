use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A hashable name: a mapping key or the name of a node.
///
/// String keys are stored under their own text. Every other key is stored
/// under its canonical textual form (`42`, `1.5`, `True`, `None`, `(1, 'a')`)
/// and the key's NTYPE tag tells the decoder how to parse it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Key {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Key>),
}

impl Key {
    /// Returns the NTYPE tag recorded for this key.
    pub fn type_name(&self) -> &'static str {
        match self {
            Key::None => "NoneType",
            Key::Bool(_) => "bool",
            Key::Int(_) => "int",
            Key::Float(_) => "float",
            Key::Str(_) => "str",
            Key::Tuple(_) => "tuple",
        }
    }

    /// Returns the name under which this key is stored as a child node.
    pub fn to_physical(&self) -> String {
        match self {
            Key::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Rebuilds a key from its physical name and recorded NTYPE tag.
    ///
    /// A missing tag is treated as `str`, which is what every legacy writer
    /// produced for plain names.
    pub fn from_physical(text: &str, ntype: Option<&str>) -> Result<Key, KeyParseError> {
        let ntype = ntype.unwrap_or("str");
        if ntype == "str" || ntype == "unicode" {
            return Ok(Key::Str(text.to_string()));
        }
        let expected = if ntype == "long" { "int" } else { ntype };
        let parsed = match (expected, Key::parse_repr(text)?) {
            ("float", Key::Int(i)) => Key::Float(i as f64),
            (_, key) => key,
        };
        if parsed.type_name() != expected {
            return Err(KeyParseError::TypeMismatch {
                text: text.to_string(),
                expected: ntype.to_string(),
                found: parsed.type_name(),
            });
        }
        Ok(parsed)
    }

    /// Parses the canonical textual form produced by `Display`.
    pub fn parse_repr(text: &str) -> Result<Key, KeyParseError> {
        let mut parser = ReprParser {
            input: text,
            pos: 0,
        };
        let key = parser.parse_key()?;
        parser.skip_ws();
        if parser.pos != text.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(key)
    }

    /// Returns true if the physical form can name a child node.
    pub fn is_valid_physical(name: &str) -> bool {
        !name.is_empty() && !name.contains('/')
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::None, Key::None) => true,
            (Key::Bool(a), Key::Bool(b)) => a == b,
            (Key::Int(a), Key::Int(b)) => a == b,
            // Bitwise, so that Eq stays consistent with Hash.
            (Key::Float(a), Key::Float(b)) => a.to_bits() == b.to_bits(),
            (Key::Str(a), Key::Str(b)) => a == b,
            (Key::Tuple(a), Key::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Key::None => {}
            Key::Bool(b) => b.hash(state),
            Key::Int(i) => i.hash(state),
            Key::Float(f) => f.to_bits().hash(state),
            Key::Str(s) => s.hash(state),
            Key::Tuple(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::None => f.write_str("None"),
            Key::Bool(true) => f.write_str("True"),
            Key::Bool(false) => f.write_str("False"),
            Key::Int(i) => write!(f, "{}", i),
            Key::Float(x) => write!(f, "{:?}", x),
            Key::Str(s) => write_quoted(f, s),
            Key::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 || c == '\u{7f}' => write!(f, "\\x{:02x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("'")
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Str(s.clone())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<f64> for Key {
    fn from(x: f64) -> Self {
        Key::Float(x)
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

/// Error returned when a textual key cannot be parsed back.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KeyParseError {
    #[error("invalid key {text:?} at offset {offset}: {reason}")]
    Syntax {
        text: String,
        offset: usize,
        reason: &'static str,
    },
    #[error("key {text:?} parses as {found}, expected {expected}")]
    TypeMismatch {
        text: String,
        expected: String,
        found: &'static str,
    },
}

struct ReprParser<'a> {
    input: &'a str,
    pos: usize,
}

impl ReprParser<'_> {
    fn error(&self, reason: &'static str) -> KeyParseError {
        KeyParseError::Syntax {
            text: self.input.to_string(),
            offset: self.pos,
            reason,
        }
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn parse_key(&mut self) -> Result<Key, KeyParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('(') => self.parse_tuple(),
            Some('\'') | Some('"') => self.parse_string().map(Key::Str),
            Some(_) => self.parse_atom(),
        }
    }

    fn parse_tuple(&mut self) -> Result<Key, KeyParseError> {
        self.bump();
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(')') {
                self.bump();
                break;
            }
            items.push(self.parse_key()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(')') => {
                    trailing_comma = false;
                    break;
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
        // "(1)" is a parenthesized int, not a tuple.
        if items.len() == 1 && !trailing_comma {
            return Ok(items.remove(0));
        }
        Ok(Key::Tuple(items))
    }

    fn parse_string(&mut self) -> Result<String, KeyParseError> {
        let quote = self.bump().ok_or_else(|| self.error("expected quote"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('x') => {
                        let hex = self.rest().get(..2).ok_or_else(|| self.error("short \\x escape"))?;
                        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("bad \\x escape"))?;
                        let c = char::from_u32(code).ok_or_else(|| self.error("bad \\x escape"))?;
                        self.pos += 2;
                        out.push(c);
                    }
                    _ => return Err(self.error("unknown escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Key, KeyParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != ',' && c != ')' && !c.is_whitespace()) {
            self.bump();
        }
        let atom = &self.input[start..self.pos];
        match atom {
            "None" => return Ok(Key::None),
            "True" => return Ok(Key::Bool(true)),
            "False" => return Ok(Key::Bool(false)),
            _ => {}
        }
        if let Ok(i) = atom.parse::<i64>() {
            return Ok(Key::Int(i));
        }
        if let Ok(x) = atom.parse::<f64>() {
            return Ok(Key::Float(x));
        }
        self.pos = start;
        Err(self.error("unrecognized literal"))
    }
}
