//! Tokenizer for the brace-nested entity text used by `.MAP` files and by
//! the BSP `entities` lump, plus the key/value block reader they share.

use std::collections::HashMap;

use super::map::MapError;

/// Key → value pairs of one entity.  Later duplicates overwrite earlier.
pub type Properties = HashMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    /// Contents between double quotes, without the quotes.
    Quoted(&'a str),
    /// Any other run of non-whitespace, non-punctuation characters.
    Word(&'a str),
}

impl Token<'_> {
    /// Short printable form used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::OpenBrace => "`{`".into(),
            Token::CloseBrace => "`}`".into(),
            Token::OpenParen => "`(`".into(),
            Token::CloseParen => "`)`".into(),
            Token::Quoted(s) => format!("\"{s}\""),
            Token::Word(s) => format!("`{s}`"),
        }
    }
}

fn is_punct(c: u8) -> bool {
    matches!(c, b'{' | b'}' | b'(' | b')' | b'"')
}

/// Pull tokenizer over ASCII entity text.
///
/// Whitespace (any ASCII whitespace, NULs included) separates tokens;
/// `//` starts a comment that runs to the end of the line.
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    peeked: Option<(Token<'a>, usize)>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            peeked: None,
        }
    }

    /// 1-based line of the most recently returned token.
    pub fn line(&self) -> usize {
        self.line
    }

    fn skip_blank(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            if c == b'\n' {
                self.line += 1;
                self.pos += 1;
            } else if c.is_ascii_whitespace() || c == 0 {
                self.pos += 1;
            } else if c == b'/' && bytes.get(self.pos + 1) == Some(&b'/') {
                while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn lex(&mut self) -> Result<Option<Token<'a>>, MapError> {
        self.skip_blank();
        let bytes = self.src.as_bytes();
        let Some(&c) = bytes.get(self.pos) else {
            return Ok(None);
        };
        let tok = match c {
            b'{' => Token::OpenBrace,
            b'}' => Token::CloseBrace,
            b'(' => Token::OpenParen,
            b')' => Token::CloseParen,
            b'"' => {
                let start = self.pos + 1;
                let Some(len) = bytes[start..].iter().position(|&b| b == b'"') else {
                    return Err(MapError::UnexpectedEndOfInput {
                        context: "quoted string",
                    });
                };
                let text = &self.src[start..start + len];
                self.line += text.bytes().filter(|&b| b == b'\n').count();
                self.pos = start + len + 1;
                return Ok(Some(Token::Quoted(text)));
            }
            _ => {
                let start = self.pos;
                while self.pos < bytes.len()
                    && !bytes[self.pos].is_ascii_whitespace()
                    && bytes[self.pos] != 0
                    && !is_punct(bytes[self.pos])
                {
                    self.pos += 1;
                }
                return Ok(Some(Token::Word(&self.src[start..self.pos])));
            }
        };
        self.pos += 1;
        Ok(Some(tok))
    }

    /// Next token, `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, MapError> {
        if let Some((tok, line)) = self.peeked.take() {
            self.line = line;
            return Ok(Some(tok));
        }
        self.lex()
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<Token<'a>>, MapError> {
        if self.peeked.is_none() {
            let before = self.line;
            if let Some(tok) = self.lex()? {
                self.peeked = Some((tok, self.line));
            }
            self.line = before;
        }
        Ok(self.peeked.map(|(t, _)| t))
    }

    /// Next token; end of input is an error naming `context`.
    pub fn require(&mut self, context: &'static str) -> Result<Token<'a>, MapError> {
        self.next_token()?
            .ok_or(MapError::UnexpectedEndOfInput { context })
    }

    /// Consume `want` or fail with `UnexpectedToken`.
    pub fn expect(&mut self, want: Token<'static>, context: &'static str) -> Result<(), MapError> {
        let tok = self.require(context)?;
        if tok == want {
            Ok(())
        } else {
            Err(self.unexpected(tok, want.describe()))
        }
    }

    /// Build an `UnexpectedToken` error at the current line.
    pub fn unexpected(&self, found: Token<'_>, expected: impl Into<String>) -> MapError {
        MapError::UnexpectedToken {
            found: found.describe(),
            expected: expected.into(),
            line: self.line,
        }
    }

    /// Next bare word parsed as `f32`.
    pub fn number(&mut self, context: &'static str) -> Result<f32, MapError> {
        match self.require(context)? {
            Token::Word(w) => w.parse::<f32>().map_err(|_| MapError::InvalidNumber {
                text: w.to_owned(),
                line: self.line,
            }),
            other => Err(self.unexpected(other, "a number")),
        }
    }

    /// The value of a `"key" "value"` pair whose key was just consumed.
    pub fn property_value(&mut self) -> Result<&'a str, MapError> {
        match self.require("property value")? {
            Token::Quoted(v) => Ok(v),
            other => Err(self.unexpected(other, "a quoted value")),
        }
    }
}

/// Read every `{ "key" "value" ... }` block of a BSP `entities` lump.
pub fn parse_entity_lump(text: &str) -> Result<Vec<Properties>, MapError> {
    let mut tok = Tokenizer::new(text);
    let mut out = Vec::new();
    while let Some(t) = tok.next_token()? {
        if t != Token::OpenBrace {
            return Err(tok.unexpected(t, "`{`"));
        }
        let mut props = Properties::new();
        loop {
            match tok.require("entity")? {
                Token::CloseBrace => break,
                Token::Quoted(key) => {
                    let value = tok.property_value()?;
                    props.insert(key.to_owned(), value.to_owned());
                }
                other => return Err(tok.unexpected(other, "`\"` or `}`")),
            }
        }
        out.push(props);
    }
    Ok(out)
}
