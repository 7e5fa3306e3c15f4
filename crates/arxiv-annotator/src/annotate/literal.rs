//! Reader for the small literal grammar models answer in.
//!
//! Accepts a mapping of quoted strings written the way the models print them:
//! single or double quotes, backslash escapes, adjacent string concatenation and
//! a trailing comma. Anything else (numbers, nested containers, bare words) is
//! rejected.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::CharIndices;

/// Why a literal could not be read.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    /// Byte offset into the input.
    pub offset: usize,
    /// What was expected.
    pub message: String,
}

struct Reader<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, chars: input.char_indices().peekable() }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn error<T>(&mut self, message: impl Into<String>) -> Result<T, LiteralError> {
        Err(LiteralError { offset: self.offset(), message: message.into() })
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn expect(&mut self, wanted: char) -> Result<(), LiteralError> {
        self.skip_whitespace();
        if self.chars.next_if(|(_, c)| *c == wanted).is_some() {
            Ok(())
        } else {
            self.error(format!("expected '{wanted}'"))
        }
    }

    fn at_string(&mut self) -> bool {
        self.skip_whitespace();
        match self.peek() {
            Some('\'' | '"') => true,
            Some('u' | 'U') => {
                let mut ahead = self.chars.clone();
                ahead.next();
                matches!(ahead.next(), Some((_, '\'' | '"')))
            }
            _ => false,
        }
    }

    /// One or more adjacent string literals, concatenated.
    fn string(&mut self) -> Result<String, LiteralError> {
        if !self.at_string() {
            return self.error("expected a quoted string");
        }
        let mut out = String::new();
        while self.at_string() {
            self.single_string(&mut out)?;
        }
        Ok(out)
    }

    fn single_string(&mut self, out: &mut String) -> Result<(), LiteralError> {
        self.chars.next_if(|(_, c)| matches!(c, 'u' | 'U'));
        let Some((_, quote)) = self.chars.next() else {
            return self.error("expected a quote");
        };

        loop {
            match self.chars.next() {
                None => return self.error("unterminated string"),
                Some((_, c)) if c == quote => return Ok(()),
                Some((_, '\n')) => return self.error("newline in string"),
                Some((_, '\\')) => self.escape(out)?,
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let Some((_, c)) = self.chars.next() else {
            return self.error("unterminated escape");
        };
        match c {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => out.push(self.code_point(2)?),
            'u' => out.push(self.code_point(4)?),
            'U' => out.push(self.code_point(8)?),
            // Unknown escapes keep their backslash.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn code_point(&mut self, digits: usize) -> Result<char, LiteralError> {
        let mut value = 0u32;
        for _ in 0..digits {
            let Some(d) = self
                .chars
                .next_if(|(_, c)| c.is_ascii_hexdigit())
                .and_then(|(_, c)| c.to_digit(16))
            else {
                return self.error("truncated escape");
            };
            value = value * 16 + d;
        }
        match char::from_u32(value) {
            Some(c) => Ok(c),
            None => self.error("invalid code point"),
        }
    }
}

/// Parse a `{'key': 'value', ...}` literal whose keys and values are strings.
///
/// Later duplicates of a key replace earlier ones.
///
/// # Errors
///
/// Returns [`LiteralError`] on any input outside the accepted grammar, including
/// trailing text after the closing brace.
pub fn parse_string_map(input: &str) -> Result<BTreeMap<String, String>, LiteralError> {
    let mut reader = Reader::new(input);
    let mut map = BTreeMap::new();

    reader.expect('{')?;
    loop {
        reader.skip_whitespace();
        if reader.peek() == Some('}') {
            break;
        }

        let key = reader.string()?;
        reader.expect(':')?;
        let value = reader.string()?;
        map.insert(key, value);

        reader.skip_whitespace();
        match reader.peek() {
            Some(',') => {
                reader.chars.next();
            }
            Some('}') => break,
            _ => return reader.error("expected ',' or '}'"),
        }
    }
    reader.expect('}')?;

    reader.skip_whitespace();
    if reader.peek().is_some() {
        return reader.error("unexpected trailing input");
    }
    Ok(map)
}

/// Render keywords the way the models were shown lists: `['a', 'b']`.
///
/// Strings containing a single quote but no double quote use double quotes.
#[must_use]
pub fn format_string_list(items: &[String]) -> String {
    let rendered: Vec<String> = items.iter().map(|s| quote(s)).collect();
    format!("[{}]", rendered.join(", "))
}

fn quote(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
