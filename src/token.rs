//! Pull tokenizer for JSON byte streams
//!
//! Reads one structural token at a time from any [`Read`], so callers can
//! walk arbitrarily long documents while holding only the read buffer and
//! the current scalar in memory. Delimiter placement (`,` and `:`) is
//! validated here; the parser above only sees tokens.

use std::fmt;
use std::io::{BufRead, BufReader, ErrorKind, Read};

use serde_json::Number;

use crate::error::TokenError;

/// Default size of the read buffer
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Maximum number of open arrays and objects
pub const MAX_DEPTH: usize = 512;

/// A structural JSON token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginArray,
    EndArray,
    BeginObject,
    EndObject,
    /// Object member name
    Key(String),
    String(String),
    /// Number as written: integers stay integers
    Number(Number),
    Bool(bool),
    Null,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::BeginArray => write!(f, "'['"),
            Token::EndArray => write!(f, "']'"),
            Token::BeginObject => write!(f, "'{{'"),
            Token::EndObject => write!(f, "'}}'"),
            Token::Key(key) => write!(f, "key {:?}", key),
            Token::String(s) => write!(f, "string {:?}", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Bool(b) => write!(f, "boolean {}", b),
            Token::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Array,
    Object,
}

/// What the next token may be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TopLevel,
    ArrayStart,
    ArrayNext,
    ObjectStart,
    ObjectNext,
    ObjectValue,
    Finished,
}

/// Streaming JSON tokenizer with one token of lookahead
pub struct Tokenizer<R> {
    reader: BufReader<R>,
    offset: u64,
    scopes: Vec<Scope>,
    state: State,
    peeked: Option<Option<Token>>,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            offset: 0,
            scopes: Vec::new(),
            state: State::TopLevel,
            peeked: None,
        }
    }

    /// Number of bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Look at the next token without consuming it
    ///
    /// `None` means the top-level value is complete (or the input was empty).
    pub fn peek(&mut self) -> Result<Option<&Token>, TokenError> {
        if self.peeked.is_none() {
            let token = self.read_token()?;
            self.peeked = Some(token);
        }
        Ok(self.peeked.as_ref().and_then(Option::as_ref))
    }

    /// Consume and return the next token
    pub fn next_token(&mut self) -> Result<Option<Token>, TokenError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.read_token(),
        }
    }

    /// Consume one complete value, including everything nested in it
    ///
    /// Must be called where a value is expected, e.g. right after a key.
    pub fn skip_value(&mut self) -> Result<(), TokenError> {
        let mut depth = 0usize;
        loop {
            let token = self.next_token()?.ok_or(TokenError::UnexpectedEof {
                offset: self.offset,
                context: "value",
            })?;
            match token {
                Token::BeginArray | Token::BeginObject => depth += 1,
                Token::EndArray | Token::EndObject => depth = depth.saturating_sub(1),
                Token::Key(_) => continue,
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    fn read_token(&mut self) -> Result<Option<Token>, TokenError> {
        match self.state {
            State::Finished => Ok(None),
            State::TopLevel => match self.skip_whitespace()? {
                None => Ok(None),
                Some(_) => self.read_value().map(Some),
            },
            State::ArrayStart => {
                if self.skip_whitespace()? == Some(b']') {
                    self.bump();
                    return Ok(Some(self.close(Token::EndArray)));
                }
                self.read_value().map(Some)
            }
            State::ArrayNext => match self.next_significant("',' or ']'")? {
                b',' => self.read_value().map(Some),
                b']' => Ok(Some(self.close(Token::EndArray))),
                other => Err(self.unexpected(other, "',' or ']'")),
            },
            State::ObjectStart => match self.next_significant("object key or '}'")? {
                b'"' => self.read_key().map(Some),
                b'}' => Ok(Some(self.close(Token::EndObject))),
                other => Err(self.unexpected(other, "object key or '}'")),
            },
            State::ObjectNext => match self.next_significant("',' or '}'")? {
                b',' => match self.next_significant("object key")? {
                    b'"' => self.read_key().map(Some),
                    other => Err(self.unexpected(other, "object key")),
                },
                b'}' => Ok(Some(self.close(Token::EndObject))),
                other => Err(self.unexpected(other, "',' or '}'")),
            },
            State::ObjectValue => match self.next_significant("':'")? {
                b':' => self.read_value().map(Some),
                other => Err(self.unexpected(other, "':'")),
            },
        }
    }

    fn read_value(&mut self) -> Result<Token, TokenError> {
        let token = match self.next_significant("value")? {
            b'[' => {
                self.open(Scope::Array)?;
                return Ok(Token::BeginArray);
            }
            b'{' => {
                self.open(Scope::Object)?;
                return Ok(Token::BeginObject);
            }
            b'"' => Token::String(self.read_string()?),
            b't' => {
                self.expect_literal(b"rue", "true")?;
                Token::Bool(true)
            }
            b'f' => {
                self.expect_literal(b"alse", "false")?;
                Token::Bool(false)
            }
            b'n' => {
                self.expect_literal(b"ull", "null")?;
                Token::Null
            }
            first @ (b'-' | b'0'..=b'9') => Token::Number(self.read_number(first)?),
            other => return Err(self.unexpected(other, "value")),
        };
        self.after_value();
        Ok(token)
    }

    fn read_key(&mut self) -> Result<Token, TokenError> {
        let key = self.read_string()?;
        self.state = State::ObjectValue;
        Ok(Token::Key(key))
    }

    fn open(&mut self, scope: Scope) -> Result<(), TokenError> {
        if self.scopes.len() >= MAX_DEPTH {
            return Err(TokenError::TooDeep {
                offset: self.offset,
                max: MAX_DEPTH,
            });
        }
        self.scopes.push(scope);
        self.state = match scope {
            Scope::Array => State::ArrayStart,
            Scope::Object => State::ObjectStart,
        };
        Ok(())
    }

    fn close(&mut self, token: Token) -> Token {
        self.scopes.pop();
        self.after_value();
        token
    }

    fn after_value(&mut self) {
        self.state = match self.scopes.last() {
            Some(Scope::Array) => State::ArrayNext,
            Some(Scope::Object) => State::ObjectNext,
            None => State::Finished,
        };
    }

    // Opening quote already consumed
    fn read_string(&mut self) -> Result<String, TokenError> {
        let mut bytes = Vec::new();
        loop {
            match self.next_byte("string")? {
                b'"' => break,
                b'\\' => self.read_escape(&mut bytes)?,
                b @ 0x00..=0x1f => return Err(self.unexpected(b, "string character")),
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| TokenError::InvalidUtf8 {
            offset: self.offset,
        })
    }

    fn read_escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), TokenError> {
        let offset = self.offset - 1;
        let c = match self.next_byte("escape sequence")? {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => self.read_unicode_escape(offset)?,
            _ => return Err(TokenError::InvalidEscape { offset }),
        };
        let mut buf = [0u8; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }

    fn read_unicode_escape(&mut self, offset: u64) -> Result<char, TokenError> {
        let high = self.read_hex4(offset)?;
        let code = if (0xD800..0xDC00).contains(&high) {
            if self.next_byte("escape sequence")? != b'\\'
                || self.next_byte("escape sequence")? != b'u'
            {
                return Err(TokenError::InvalidEscape { offset });
            }
            let low = self.read_hex4(offset)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(TokenError::InvalidEscape { offset });
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code).ok_or(TokenError::InvalidEscape { offset })
    }

    fn read_hex4(&mut self, offset: u64) -> Result<u32, TokenError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let digit = (self.next_byte("escape sequence")? as char)
                .to_digit(16)
                .ok_or(TokenError::InvalidEscape { offset })?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn read_number(&mut self, first: u8) -> Result<Number, TokenError> {
        let offset = self.offset - 1;
        let mut literal = String::new();
        literal.push(first as char);
        while let Some(b) = self.peek_byte()? {
            if !matches!(b, b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-') {
                break;
            }
            literal.push(b as char);
            self.bump();
        }
        if !is_json_number(&literal) {
            return Err(TokenError::InvalidNumber { offset, literal });
        }
        match number_from_literal(&literal) {
            Some(n) => Ok(n),
            None => Err(TokenError::InvalidNumber { offset, literal }),
        }
    }

    fn expect_literal(&mut self, rest: &[u8], context: &'static str) -> Result<(), TokenError> {
        for &expected in rest {
            let b = self.next_byte(context)?;
            if b != expected {
                return Err(self.unexpected(b, context));
            }
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, TokenError> {
        let offset = self.offset;
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(TokenError::Io { offset, source }),
            }
        }
    }

    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    fn next_byte(&mut self, context: &'static str) -> Result<u8, TokenError> {
        let b = self.peek_byte()?.ok_or(TokenError::UnexpectedEof {
            offset: self.offset,
            context,
        })?;
        self.bump();
        Ok(b)
    }

    fn skip_whitespace(&mut self) -> Result<Option<u8>, TokenError> {
        while let Some(b) = self.peek_byte()? {
            if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                return Ok(Some(b));
            }
            self.bump();
        }
        Ok(None)
    }

    fn next_significant(&mut self, context: &'static str) -> Result<u8, TokenError> {
        self.skip_whitespace()?;
        self.next_byte(context)
    }

    // `found` has already been consumed
    fn unexpected(&self, found: u8, expected: &'static str) -> TokenError {
        TokenError::UnexpectedByte {
            offset: self.offset.saturating_sub(1),
            found: found as char,
            expected,
        }
    }
}

/// Integer literals that fit 64 bits keep their exact value; anything else
/// becomes a finite `f64`
fn number_from_literal(literal: &str) -> Option<Number> {
    if !literal.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        if let Ok(n) = literal.parse::<u64>() {
            return Some(n.into());
        }
        if let Ok(n) = literal.parse::<i64>() {
            return Some(n.into());
        }
    }
    literal.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Check a collected literal against the JSON number grammar
fn is_json_number(literal: &str) -> bool {
    let b = literal.as_bytes();
    let mut i = 0;
    let digits = |i: &mut usize| {
        let start = *i;
        while matches!(b.get(*i), Some(b'0'..=b'9')) {
            *i += 1;
        }
        *i > start
    };

    if b.get(i) == Some(&b'-') {
        i += 1;
    }
    match b.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            digits(&mut i);
        }
        _ => return false,
    }
    if b.get(i) == Some(&b'.') {
        i += 1;
        if !digits(&mut i) {
            return false;
        }
    }
    if matches!(b.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(b.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        if !digits(&mut i) {
            return false;
        }
    }
    i == b.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Token {
        Token::Number(Number::from_f64(n).unwrap())
    }

    fn int(n: i64) -> Token {
        Token::Number(n.into())
    }

    fn tokens(input: &str) -> Result<Vec<Token>, TokenError> {
        let mut t = Tokenizer::with_capacity(4, input.as_bytes());
        let mut out = Vec::new();
        while let Some(token) = t.next_token()? {
            out.push(token);
        }
        Ok(out)
    }

    #[test]
    fn test_tokenize_document() {
        let result = tokens(r#" [ {"a": 1.5, "b": [true, false, null, "x"]}, {} ] "#).unwrap();
        assert_eq!(
            result,
            vec![
                Token::BeginArray,
                Token::BeginObject,
                Token::Key("a".to_string()),
                num(1.5),
                Token::Key("b".to_string()),
                Token::BeginArray,
                Token::Bool(true),
                Token::Bool(false),
                Token::Null,
                Token::String("x".to_string()),
                Token::EndArray,
                Token::EndObject,
                Token::BeginObject,
                Token::EndObject,
                Token::EndArray,
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(tokens("").unwrap().is_empty());
        assert!(tokens("  \n ").unwrap().is_empty());
    }

    #[test]
    fn test_stops_after_top_level_value() {
        let mut t = Tokenizer::new("[] trailing garbage".as_bytes());
        assert_eq!(t.next_token().unwrap(), Some(Token::BeginArray));
        assert_eq!(t.next_token().unwrap(), Some(Token::EndArray));
        assert_eq!(t.next_token().unwrap(), None);
        assert_eq!(t.offset(), 2);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut t = Tokenizer::new(r#"["a"]"#.as_bytes());
        assert_eq!(t.next_token().unwrap(), Some(Token::BeginArray));
        assert_eq!(t.peek().unwrap(), Some(&Token::String("a".to_string())));
        assert_eq!(t.peek().unwrap(), Some(&Token::String("a".to_string())));
        assert_eq!(t.next_token().unwrap(), Some(Token::String("a".to_string())));
        assert_eq!(t.next_token().unwrap(), Some(Token::EndArray));
    }

    #[test]
    fn test_missing_comma() {
        let err = tokens(r#"[1 2]"#).unwrap_err();
        assert!(matches!(
            err,
            TokenError::UnexpectedByte {
                offset: 3,
                found: '2',
                ..
            }
        ));
    }

    #[test]
    fn test_missing_colon() {
        let err = tokens(r#"{"a" 1}"#).unwrap_err();
        assert!(matches!(err, TokenError::UnexpectedByte { expected: "':'", .. }));
    }

    #[test]
    fn test_trailing_comma_rejected() {
        assert!(tokens("[1,]").is_err());
        assert!(tokens(r#"{"a":1,}"#).is_err());
    }

    #[test]
    fn test_truncated_input() {
        let err = tokens(r#"[{"a": "#).unwrap_err();
        assert!(matches!(err, TokenError::UnexpectedEof { .. }));
        let err = tokens(r#"["abc"#).unwrap_err();
        assert!(matches!(err, TokenError::UnexpectedEof { context: "string", .. }));
    }

    #[test]
    fn test_string_escapes() {
        let result = tokens(r#"["a\"b\\c\/d\n\u00e9\ud83d\ude00"]"#).unwrap();
        assert_eq!(result[1], Token::String("a\"b\\c/d\n\u{e9}\u{1F600}".to_string()));
    }

    #[test]
    fn test_raw_utf8_passes_through() {
        let result = tokens("[\"Tromsø\"]").unwrap();
        assert_eq!(result[1], Token::String("Tromsø".to_string()));
    }

    #[test]
    fn test_invalid_escapes() {
        assert!(matches!(
            tokens(r#"["\x"]"#).unwrap_err(),
            TokenError::InvalidEscape { .. }
        ));
        assert!(matches!(
            tokens(r#"["\ud83d"]"#).unwrap_err(),
            TokenError::InvalidEscape { .. }
        ));
        assert!(matches!(
            tokens(r#"["\ude00"]"#).unwrap_err(),
            TokenError::InvalidEscape { .. }
        ));
    }

    #[test]
    fn test_numbers() {
        let result = tokens("[0, -1, 10.25, 1e3, -2.5E-1]").unwrap();
        assert_eq!(
            result[1..6],
            [
                int(0),
                int(-1),
                num(10.25),
                num(1000.0),
                num(-0.25),
            ]
        );
    }

    #[test]
    fn test_integers_keep_their_form() {
        let result = tokens("[2, 18446744073709551615, -9223372036854775808, 2.0]").unwrap();
        assert_eq!(result[1], Token::Number(2u64.into()));
        assert_eq!(result[2], Token::Number(u64::MAX.into()));
        assert_eq!(result[3], Token::Number(i64::MIN.into()));
        assert_eq!(result[4], num(2.0));

        let json: Vec<String> = result[1..5]
            .iter()
            .map(|t| match t {
                Token::Number(n) => n.to_string(),
                other => panic!("unexpected {other}"),
            })
            .collect();
        assert_eq!(json, ["2", "18446744073709551615", "-9223372036854775808", "2.0"]);
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        let result = tokens("[18446744073709551616]").unwrap();
        assert_eq!(result[1], num(18446744073709551616.0));
    }

    #[test]
    fn test_invalid_numbers() {
        for input in ["[01]", "[-]", "[1.]", "[1e]", "[1.2.3]", "[1-2]", "[1e400]", "[-1e400]"] {
            assert!(
                matches!(tokens(input), Err(TokenError::InvalidNumber { .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn test_bad_literal() {
        assert!(tokens("[tru]").is_err());
        assert!(tokens("[nul]").is_err());
    }

    #[test]
    fn test_skip_value() {
        let mut t = Tokenizer::new(r#"{"skip": {"a": [1, {"b": []}]}, "keep": 2}"#.as_bytes());
        assert_eq!(t.next_token().unwrap(), Some(Token::BeginObject));
        assert_eq!(t.next_token().unwrap(), Some(Token::Key("skip".to_string())));
        t.skip_value().unwrap();
        assert_eq!(t.next_token().unwrap(), Some(Token::Key("keep".to_string())));
        t.skip_value().unwrap();
        assert_eq!(t.next_token().unwrap(), Some(Token::EndObject));
        assert_eq!(t.next_token().unwrap(), None);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "[".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            tokens(&deep).unwrap_err(),
            TokenError::TooDeep { max: MAX_DEPTH, .. }
        ));
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::BeginObject.to_string(), "'{'");
        assert_eq!(Token::Key("id".to_string()).to_string(), "key \"id\"");
        assert_eq!(int(2).to_string(), "number 2");
        assert_eq!(num(2.5).to_string(), "number 2.5");
    }
}
