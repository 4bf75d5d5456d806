//! # Value-reference grammar
//!
//! Descriptions locate values with dotted paths such as `kwargs.value`,
//! `settings.datasets.geom` or `location(hdu_type="events").path().__str__()`. The grammar is
//! intentionally small: attribute access, `[n]` indexing, and method calls whose arguments are
//! literals.
//!
//! ```text
//! reference := segment ( "." segment )*
//! segment   := ( ident call? | digits ) ( "[" digits "]" )*
//! call      := "(" ( argument ( "," argument )* ","? )? ")"
//! argument  := literal | ident "=" literal
//! literal   := quoted string | number | true | false | null | None | bareword
//! ```
//!
//! References are parsed once when a description is loaded; evaluation lives in
//! [`crate::evaluate`].

use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use indexmap::IndexMap;
use serde_json::{Number, Value};
use thiserror::Error;

/// A parsed value reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueReference {
    text: String,
    segments: Vec<Segment>,
}

/// One step of a value reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Attribute or mapping-key access.
    Attribute(String),
    /// Sequence indexing, from `name[n]` or a numeric segment (`args.0`).
    Index(usize),
    /// Method invocation with literal arguments.
    Call(MethodCall),
}

/// A method invocation inside a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: CallArguments,
}

/// Literal arguments passed to a method call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArguments {
    pub positional: Vec<Value>,
    pub keyword: IndexMap<String, Value>,
}

impl CallArguments {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Looks up an argument by keyword first, then by position.
    pub fn get(&self, keyword: &str, position: usize) -> Option<&Value> {
        self.keyword.get(keyword).or_else(|| self.positional.get(position))
    }
}

impl ValueReference {
    /// Parses a reference from its textual form.
    pub fn parse(text: &str) -> Result<Self, ReferenceParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ReferenceParseError::Empty);
        }
        let segments = ReferenceParser::new(trimmed).parse()?;
        Ok(Self {
            text: trimmed.to_string(),
            segments,
        })
    }

    /// Reference text as authored (trimmed).
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Name of the first attribute segment, which selects the root namespace.
    pub fn root_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Attribute(name)) => Some(name),
            _ => None,
        }
    }
}

impl FromStr for ValueReference {
    type Err = ReferenceParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        ValueReference::parse(text)
    }
}

impl fmt::Display for ValueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Errors produced while parsing a reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceParseError {
    #[error("reference is empty")]
    Empty,

    #[error("expected an identifier at offset {offset}")]
    ExpectedIdentifier { offset: usize },

    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedCharacter { found: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("unterminated argument list in call to '{method}'")]
    UnterminatedCall { method: String },

    #[error("invalid index '{index}' at offset {offset}")]
    InvalidIndex { index: String, offset: usize },

    #[error("invalid literal '{literal}' at offset {offset}")]
    InvalidLiteral { literal: String, offset: usize },

    #[error("positional argument follows keyword argument in call to '{method}'")]
    PositionalAfterKeyword { method: String },
}

struct ReferenceParser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> ReferenceParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, ReferenceParseError> {
        let mut segments = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    let offset = self.offset();
                    let digits = self.take_while(|c| c.is_ascii_digit());
                    let index = digits.parse().map_err(|_| ReferenceParseError::InvalidIndex { index: digits, offset })?;
                    segments.push(Segment::Index(index));
                }
                _ => {
                    let name = self.identifier()?;
                    self.skip_whitespace();
                    if self.peek() == Some('(') {
                        self.bump();
                        let arguments = self.arguments(&name)?;
                        segments.push(Segment::Call(MethodCall { method: name, arguments }));
                    } else {
                        segments.push(Segment::Attribute(name));
                    }
                }
            }
            self.indices(&mut segments)?;

            self.skip_whitespace();
            match self.bump() {
                None => return Ok(segments),
                Some((_, '.')) => continue,
                Some((offset, found)) => return Err(ReferenceParseError::UnexpectedCharacter { found, offset }),
            }
        }
    }

    fn indices(&mut self, segments: &mut Vec<Segment>) -> Result<(), ReferenceParseError> {
        loop {
            self.skip_whitespace();
            if self.peek() != Some('[') {
                return Ok(());
            }
            self.bump();
            self.skip_whitespace();
            let offset = self.offset();
            let digits = self.take_while(|c| c.is_ascii_digit());
            self.skip_whitespace();
            match self.bump() {
                Some((_, ']')) if !digits.is_empty() => {
                    let index = digits.parse().map_err(|_| ReferenceParseError::InvalidIndex { index: digits, offset })?;
                    segments.push(Segment::Index(index));
                }
                Some((_, ']')) => {
                    return Err(ReferenceParseError::InvalidIndex { index: String::new(), offset });
                }
                Some((offset, found)) => return Err(ReferenceParseError::UnexpectedCharacter { found, offset }),
                None => {
                    return Err(ReferenceParseError::InvalidIndex { index: digits, offset });
                }
            }
        }
    }

    fn arguments(&mut self, method: &str) -> Result<CallArguments, ReferenceParseError> {
        let mut arguments = CallArguments::default();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ReferenceParseError::UnterminatedCall { method: method.to_string() }),
                Some(')') => {
                    self.bump();
                    return Ok(arguments);
                }
                _ => {}
            }

            if self.peek().is_some_and(is_identifier_start) {
                let word = self.take_while(is_identifier_continue);
                self.skip_whitespace();
                if self.peek() == Some('=') {
                    self.bump();
                    self.skip_whitespace();
                    let value = self.literal(method)?;
                    arguments.keyword.insert(word, value);
                } else {
                    if !arguments.keyword.is_empty() {
                        return Err(ReferenceParseError::PositionalAfterKeyword { method: method.to_string() });
                    }
                    arguments.positional.push(bareword(&word));
                }
            } else {
                let value = self.literal(method)?;
                if !arguments.keyword.is_empty() {
                    return Err(ReferenceParseError::PositionalAfterKeyword { method: method.to_string() });
                }
                arguments.positional.push(value);
            }

            self.skip_whitespace();
            match self.bump() {
                Some((_, ',')) => continue,
                Some((_, ')')) => return Ok(arguments),
                Some((offset, found)) => return Err(ReferenceParseError::UnexpectedCharacter { found, offset }),
                None => return Err(ReferenceParseError::UnterminatedCall { method: method.to_string() }),
            }
        }
    }

    fn literal(&mut self, method: &str) -> Result<Value, ReferenceParseError> {
        let offset = self.offset();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.string(quote, offset).map(Value::String)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => {
                let literal = self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'));
                number(&literal).ok_or(ReferenceParseError::InvalidLiteral { literal, offset })
            }
            Some(c) if is_identifier_start(c) => {
                let word = self.take_while(is_identifier_continue);
                Ok(bareword(&word))
            }
            Some(found) => Err(ReferenceParseError::UnexpectedCharacter { found, offset }),
            None => Err(ReferenceParseError::UnterminatedCall { method: method.to_string() }),
        }
    }

    fn string(&mut self, quote: char, offset: usize) -> Result<String, ReferenceParseError> {
        let mut out = String::new();
        while let Some((_, c)) = self.bump() {
            match c {
                '\\' => match self.bump() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
        Err(ReferenceParseError::UnterminatedString { offset })
    }

    fn identifier(&mut self) -> Result<String, ReferenceParseError> {
        let offset = self.offset();
        match self.peek() {
            Some(c) if is_identifier_start(c) => Ok(self.take_while(is_identifier_continue)),
            _ => Err(ReferenceParseError::ExpectedIdentifier { offset }),
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|(offset, _)| *offset).unwrap_or(self.source.len())
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Unquoted words: the usual constants, anything else is taken as a string.
fn bareword(word: &str) -> Value {
    match word {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        "null" | "None" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

fn number(literal: &str) -> Option<Value> {
    if let Ok(integer) = literal.parse::<i64>() {
        return Some(Value::Number(integer.into()));
    }
    literal.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attribute(name: &str) -> Segment {
        Segment::Attribute(name.to_string())
    }

    #[test]
    fn parses_dotted_attributes() {
        let reference = ValueReference::parse("settings.datasets.geom").expect("parse");
        assert_eq!(reference.segments(), &[attribute("settings"), attribute("datasets"), attribute("geom")]);
        assert_eq!(reference.root_name(), Some("settings"));
    }

    #[test]
    fn parses_calls_with_keyword_literals() {
        let reference = ValueReference::parse(r#"location(hdu_type="events").path().__str__()"#).expect("parse");
        let segments = reference.segments();
        assert_eq!(segments.len(), 3);

        let Segment::Call(call) = &segments[0] else {
            panic!("expected a call, got {:?}", segments[0]);
        };
        assert_eq!(call.method, "location");
        assert_eq!(call.arguments.keyword.get("hdu_type"), Some(&json!("events")));

        assert_eq!(
            segments[2],
            Segment::Call(MethodCall {
                method: "__str__".into(),
                arguments: CallArguments::default(),
            })
        );
    }

    #[test]
    fn parses_mixed_arguments() {
        let reference = ValueReference::parse("obj.get('key', 1.5, flag = True, other=None, count=-3)").expect("parse");
        let Segment::Call(call) = &reference.segments()[1] else {
            panic!("expected a call");
        };
        assert_eq!(call.arguments.positional, vec![json!("key"), json!(1.5)]);
        assert_eq!(call.arguments.keyword["flag"], json!(true));
        assert_eq!(call.arguments.keyword["other"], json!(null));
        assert_eq!(call.arguments.keyword["count"], json!(-3));
        assert_eq!(call.arguments.get("flag", 9), Some(&json!(true)));
        assert_eq!(call.arguments.get("missing", 0), Some(&json!("key")));
    }

    #[test]
    fn parses_indices_in_both_forms() {
        let bracketed = ValueReference::parse("args[0]").expect("parse");
        let dotted = ValueReference::parse("args.0").expect("parse");
        assert_eq!(bracketed.segments(), dotted.segments());

        let nested = ValueReference::parse("datasets[1][2].name").expect("parse");
        assert_eq!(
            nested.segments(),
            &[attribute("datasets"), Segment::Index(1), Segment::Index(2), attribute("name")]
        );
    }

    #[test]
    fn keeps_trimmed_text() {
        let reference: ValueReference = "  kwargs.value ".parse().expect("parse");
        assert_eq!(reference.to_string(), "kwargs.value");
    }

    #[test]
    fn rejects_malformed_references() {
        assert_eq!(ValueReference::parse("   "), Err(ReferenceParseError::Empty));
        assert!(matches!(
            ValueReference::parse("a..b"),
            Err(ReferenceParseError::ExpectedIdentifier { offset: 2 })
        ));
        assert!(matches!(
            ValueReference::parse("a b"),
            Err(ReferenceParseError::UnexpectedCharacter { found: 'b', .. })
        ));
        assert!(matches!(
            ValueReference::parse(r#"f("x"#),
            Err(ReferenceParseError::UnterminatedString { .. })
        ));
        assert!(matches!(ValueReference::parse("f(a=1"), Err(ReferenceParseError::UnterminatedCall { .. })));
        assert!(matches!(ValueReference::parse("a[x]"), Err(ReferenceParseError::UnexpectedCharacter { .. })));
        assert!(matches!(
            ValueReference::parse("f(a=1, 2)"),
            Err(ReferenceParseError::PositionalAfterKeyword { .. })
        ));
        assert!(matches!(ValueReference::parse("a.b."), Err(ReferenceParseError::ExpectedIdentifier { .. })));
    }
}
