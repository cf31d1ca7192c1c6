//! Recursive-descent parser for tuple schema strings.

use std::collections::HashSet;

use super::types::{Attribute, AttributeType, PrimitiveType, Schema};
use crate::error::{Error, Result};

/// Deepest allowed nesting of `tuple`, `list`, `set` and `map` types.
pub const MAX_NESTING: usize = 32;

/// Parse a complete `tuple<...>` schema string.
pub fn parse_schema(input: &str) -> Result<Schema> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    let keyword_at = parser.skip_ws();
    if parser.ident()? != "tuple" {
        return Err(error_at(keyword_at, "Schema must start with 'tuple'"));
    }
    let schema = parser.tuple_body()?;
    if parser.skip_ws() != input.len() {
        return Err(parser.error("Unexpected trailing characters"));
    }
    Ok(schema)
}

fn error_at(offset: usize, message: &str) -> Error {
    Error::Schema {
        offset,
        message: message.to_string(),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    /// Skip whitespace and return the new position.
    fn skip_ws(&mut self) -> usize {
        while let Some(c) = self.peek()
            && c.is_whitespace()
        {
            self.pos += c.len_utf8();
        }
        self.pos
    }

    fn error(&self, message: &str) -> Error {
        error_at(self.pos, message)
    }

    fn expect(&mut self, want: char) -> Result<()> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.error(&format!("Expected '{want}', found '{c}'"))),
            None => Err(self.error(&format!("Expected '{want}', found end of input"))),
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        let start = self.skip_ws();
        while let Some(c) = self.peek()
            && (c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let ident = &self.src[start..self.pos];
        match ident.chars().next() {
            None => Err(self.error("Expected identifier")),
            Some(c) if c.is_ascii_digit() => {
                Err(error_at(start, "Identifier must not start with a digit"))
            }
            Some(_) => Ok(ident),
        }
    }

    /// Parses `<type name, ...>` after the `tuple` keyword.
    fn tuple_body(&mut self) -> Result<Schema> {
        self.expect('<')?;
        let mut attributes = Vec::new();
        let mut seen = HashSet::new();
        loop {
            let ty = self.attr_type()?;
            let name_at = self.skip_ws();
            let name = self.ident()?;
            if !seen.insert(name) {
                return Err(error_at(name_at, &format!("Duplicate attribute '{name}'")));
            }
            attributes.push(Attribute {
                name: name.to_string(),
                ty,
            });

            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.error("Expected ',' or '>' after attribute")),
            }
        }
        Ok(Schema::from_attributes(attributes))
    }

    /// Run `f` one nesting level deeper, failing at `at` past [`MAX_NESTING`].
    fn nested<T>(&mut self, at: usize, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(error_at(
                at,
                &format!("Type nesting exceeds {MAX_NESTING} levels"),
            ));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn attr_type(&mut self) -> Result<AttributeType> {
        let at = self.skip_ws();
        let keyword = self.ident()?;
        match keyword {
            "tuple" => self.nested(at, |p| Ok(AttributeType::Tuple(p.tuple_body()?))),
            "list" | "set" => self.nested(at, |p| {
                p.expect('<')?;
                let elem = Box::new(p.attr_type()?);
                p.expect('>')?;
                Ok(if keyword == "list" {
                    AttributeType::List(elem)
                } else {
                    AttributeType::Set(elem)
                })
            }),
            "map" => self.nested(at, |p| {
                p.expect('<')?;
                let key = Box::new(p.attr_type()?);
                p.expect(',')?;
                let value = Box::new(p.attr_type()?);
                p.expect('>')?;
                Ok(AttributeType::Map(key, value))
            }),
            other => PrimitiveType::from_name(other)
                .map(AttributeType::Primitive)
                .ok_or_else(|| error_at(at, &format!("Unknown type '{other}'"))),
        }
    }
}
