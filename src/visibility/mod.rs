#![forbid(unsafe_code)]
//! Boolean security labels and the caller authorizations they are checked against.
//!
//! Every mutation record, property value and metadata entry carries a
//! [`Visibility`]: the source text of a label such as `(admin|audit)&eu`.
//! [`parse`] turns that text into a [`VisibilityLabel`] tree and [`evaluate`]
//! decides whether an [`Authorizations`] set satisfies it. Tokens are compared
//! byte for byte; `Secret` and `secret` are different capabilities.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ParseError;

mod eval;
mod parser;

pub use eval::{evaluate, LabelCache};
pub use parser::parse;

/// Parsed form of a visibility expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisibilityLabel {
    /// The empty expression: no restriction.
    Always,
    /// A single authorization token.
    Term(String),
    /// Every operand must hold.
    And(Vec<VisibilityLabel>),
    /// At least one operand must hold.
    Or(Vec<VisibilityLabel>),
}

impl VisibilityLabel {
    /// Renders the label back to canonical expression syntax.
    ///
    /// Nested operators are always parenthesized and tokens are quoted only
    /// when they contain characters outside the bareword set, so
    /// `parse(&label.to_expression())` yields the same tree.
    pub fn to_expression(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }

    fn render(&self, out: &mut String) {
        match self {
            VisibilityLabel::Always => {}
            VisibilityLabel::Term(token) => out.push_str(&quote(token)),
            VisibilityLabel::And(operands) => render_chain(operands, '&', out),
            VisibilityLabel::Or(operands) => render_chain(operands, '|', out),
        }
    }

    /// Collects every token the label mentions.
    pub fn tokens(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            VisibilityLabel::Always => {}
            VisibilityLabel::Term(token) => {
                out.insert(token.as_str());
            }
            VisibilityLabel::And(operands) | VisibilityLabel::Or(operands) => {
                for operand in operands {
                    operand.collect_tokens(out);
                }
            }
        }
    }
}

fn render_chain(operands: &[VisibilityLabel], op: char, out: &mut String) {
    for (idx, operand) in operands.iter().enumerate() {
        if idx > 0 {
            out.push(op);
        }
        let nested = matches!(operand, VisibilityLabel::And(_) | VisibilityLabel::Or(_));
        if nested {
            out.push('(');
        }
        operand.render(out);
        if nested {
            out.push(')');
        }
    }
}

impl fmt::Display for VisibilityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expression())
    }
}

/// Quotes `token` if it cannot be written as a bareword.
pub fn quote(token: &str) -> String {
    if !token.is_empty() && token.chars().all(parser::is_bare_char) {
        return token.to_owned();
    }
    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A visibility expression that is known to parse.
///
/// Stored and compared by its source text: hide/unhide matching and the wire
/// format both work on the exact string.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Visibility(String);

impl Visibility {
    /// Validates and wraps an expression.
    pub fn new(expression: impl Into<String>) -> Result<Self, ParseError> {
        let expression = expression.into();
        parse(&expression)?;
        Ok(Self(expression))
    }

    /// The always-visible label.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Source text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the unrestricted label.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the stored text.
    pub fn label(&self) -> Result<VisibilityLabel, ParseError> {
        parse(&self.0)
    }
}

impl TryFrom<String> for Visibility {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Visibility::new(value)
    }
}

impl TryFrom<&str> for Visibility {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Visibility::new(value)
    }
}

impl From<Visibility> for String {
    fn from(value: Visibility) -> Self {
        value.0
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of tokens a caller holds for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authorizations(BTreeSet<String>);

impl Authorizations {
    /// Builds a set from any iterator of tokens.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// A caller holding nothing; sees only unrestricted records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a comma-separated token list, ignoring blank entries.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty()),
        )
    }

    /// Returns `true` if the exact token is held.
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// Evaluates a stored visibility against this set.
    pub fn can_see(&self, visibility: &Visibility) -> crate::types::Result<bool> {
        Ok(evaluate(&visibility.label()?, self)?)
    }

    /// Iterates held tokens in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of tokens held.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no tokens are held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Authorizations {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
