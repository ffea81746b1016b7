//! Recursive-descent parser for visibility expressions.
//!
//! ```text
//! expr    := term (('&' | '|') term)*     -- one operator kind per level
//! term    := '(' expr ')' | literal
//! literal := bareword | '"' escaped-chars '"'
//! ```

use crate::types::{ParseError, ParseErrorKind};

use super::VisibilityLabel;

/// Deepest parenthesis nesting `parse` accepts.
///
/// Parsing, evaluation and rendering all recurse once per level, so the bound
/// keeps hostile labels from exhausting the stack.
pub const MAX_NESTING: usize = 64;

/// Returns `true` for bytes allowed in an unquoted token.
pub(crate) fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '/')
}

/// Parses `expression` into a label tree. The empty string is the
/// always-visible label.
pub fn parse(expression: &str) -> Result<VisibilityLabel, ParseError> {
    if expression.is_empty() {
        return Ok(VisibilityLabel::Always);
    }
    let mut parser = Parser {
        src: expression,
        pos: 0,
        depth: 0,
    };
    let label = parser.expr()?;
    match parser.peek() {
        None => Ok(label),
        Some(')') => Err(parser.error(ParseErrorKind::UnbalancedParens)),
        Some(c) if c == '(' || c == '"' || is_bare_char(c) => {
            Err(parser.error(ParseErrorKind::TrailingInput))
        }
        Some(c) => Err(parser.error(ParseErrorKind::InvalidCharacter(c))),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.pos, kind)
    }

    fn expr(&mut self) -> Result<VisibilityLabel, ParseError> {
        let first = self.term()?;
        let mut op: Option<char> = None;
        let mut operands = vec![first];
        while let Some(c @ ('&' | '|')) = self.peek() {
            match op {
                Some(prev) if prev != c => {
                    return Err(self.error(ParseErrorKind::MixedOperators));
                }
                _ => op = Some(c),
            }
            self.bump();
            operands.push(self.term()?);
        }
        Ok(match op {
            None => operands.swap_remove(0),
            Some('&') => VisibilityLabel::And(operands),
            Some(_) => VisibilityLabel::Or(operands),
        })
    }

    fn term(&mut self) -> Result<VisibilityLabel, ParseError> {
        match self.peek() {
            None | Some(')' | '&' | '|') => Err(self.error(ParseErrorKind::Empty)),
            Some('(') => {
                let open = self.pos;
                if self.depth == MAX_NESTING {
                    return Err(self.error(ParseErrorKind::TooDeep));
                }
                self.bump();
                if self.peek() == Some(')') {
                    return Err(self.error(ParseErrorKind::Empty));
                }
                self.depth += 1;
                let inner = self.expr()?;
                self.depth -= 1;
                if self.peek() != Some(')') {
                    return Err(ParseError::new(open, ParseErrorKind::UnbalancedParens));
                }
                self.bump();
                Ok(inner)
            }
            Some('"') => self.quoted(),
            Some(c) if is_bare_char(c) => Ok(self.bareword()),
            Some(c) => Err(self.error(ParseErrorKind::InvalidCharacter(c))),
        }
    }

    fn bareword(&mut self) -> VisibilityLabel {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_bare_char(c)) {
            self.bump();
        }
        VisibilityLabel::Term(self.src[start..self.pos].to_owned())
    }

    fn quoted(&mut self) -> Result<VisibilityLabel, ParseError> {
        let open = self.pos;
        self.bump();
        let mut token = String::new();
        loop {
            let at = self.pos;
            match self.bump() {
                None => return Err(ParseError::new(open, ParseErrorKind::UnterminatedQuote)),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some(c @ ('"' | '\\')) => token.push(c),
                    None => {
                        return Err(ParseError::new(open, ParseErrorKind::UnterminatedQuote))
                    }
                    Some(_) => return Err(ParseError::new(at, ParseErrorKind::InvalidEscape)),
                },
                Some(c) => token.push(c),
            }
        }
        if token.is_empty() {
            return Err(ParseError::new(open, ParseErrorKind::EmptyQuotedToken));
        }
        Ok(VisibilityLabel::Term(token))
    }
}
