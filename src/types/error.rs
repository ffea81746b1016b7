use std::fmt;

use thiserror::Error;

use super::{ElementId, ElementKind};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Reason a visibility expression was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A group or operand position held no token.
    Empty,
    /// An opening parenthesis was never closed, or a closing one never opened.
    UnbalancedParens,
    /// `&` and `|` appeared at the same nesting level without parentheses.
    MixedOperators,
    /// A quoted token ran to the end of input.
    UnterminatedQuote,
    /// A backslash inside quotes escaped something other than `"` or `\`.
    InvalidEscape,
    /// `""` carries no token.
    EmptyQuotedToken,
    /// A character that is not part of the grammar.
    InvalidCharacter(char),
    /// Parentheses nested deeper than the parser accepts.
    TooDeep,
    /// Input continued after a complete expression.
    TrailingInput,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Empty => write!(f, "empty term"),
            ParseErrorKind::UnbalancedParens => write!(f, "unbalanced parentheses"),
            ParseErrorKind::MixedOperators => {
                write!(f, "cannot mix '&' and '|' without parentheses")
            }
            ParseErrorKind::UnterminatedQuote => write!(f, "unterminated quoted token"),
            ParseErrorKind::InvalidEscape => write!(f, "invalid escape in quoted token"),
            ParseErrorKind::EmptyQuotedToken => write!(f, "empty quoted token"),
            ParseErrorKind::InvalidCharacter(c) => write!(f, "unexpected character {c:?}"),
            ParseErrorKind::TooDeep => write!(f, "parentheses nested too deeply"),
            ParseErrorKind::TrailingInput => write!(f, "unexpected trailing input"),
        }
    }
}

/// A malformed visibility expression, with the byte offset where parsing stopped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} at position {position}")]
pub struct ParseError {
    /// Byte offset into the source expression.
    pub position: usize,
    /// What went wrong.
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Creates a parse error at `position`.
    pub fn new(position: usize, kind: ParseErrorKind) -> Self {
        Self { position, kind }
    }

    /// Returns a machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self.kind {
            ParseErrorKind::Empty => "EmptyTerm",
            ParseErrorKind::UnbalancedParens => "UnbalancedParens",
            ParseErrorKind::MixedOperators => "MixedOperators",
            ParseErrorKind::UnterminatedQuote => "UnterminatedQuote",
            ParseErrorKind::InvalidEscape => "InvalidEscape",
            ParseErrorKind::EmptyQuotedToken => "EmptyQuotedToken",
            ParseErrorKind::InvalidCharacter(_) => "InvalidCharacter",
            ParseErrorKind::TooDeep => "TooDeep",
            ParseErrorKind::TrailingInput => "TrailingInput",
        }
    }
}

/// A label tree that `parse` could never have produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// An `And`/`Or` node with fewer than two operands.
    #[error("{op} node requires at least two operands (got {count})")]
    Arity {
        /// `"and"` or `"or"`.
        op: &'static str,
        /// Operands present.
        count: usize,
    },
    /// A term node with an empty token.
    #[error("term node carries an empty token")]
    EmptyTerm,
}

/// Wire data that does not match the binary layout.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Lengths, tags or field widths disagree with the bytes available.
    #[error("corrupt payload at byte {offset}: {reason}")]
    CorruptPayload {
        /// Offset at which the inconsistency was detected.
        offset: usize,
        /// Human-readable description.
        reason: String,
    },
    /// The frame was written by an unknown format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
}

impl DecodeError {
    /// Shorthand for [`DecodeError::CorruptPayload`].
    pub fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        DecodeError::CorruptPayload {
            offset,
            reason: reason.into(),
        }
    }
}

/// Caller misuse detected by the fold engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FoldError {
    /// Vertex and edge records were mixed in one fold call.
    #[error("fold mixes element kinds: expected {expected}, found {found}")]
    MixedElementKinds {
        /// Kind of the first record.
        expected: ElementKind,
        /// Conflicting kind.
        found: ElementKind,
    },
    /// Records for two different elements were passed to a single-element fold.
    #[error("fold mixes elements: expected {expected}, found {found}")]
    MixedElements {
        /// Element of the first record.
        expected: ElementId,
        /// Conflicting element.
        found: ElementId,
    },
}

/// Umbrella error for every fallible operation in the crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrataError {
    /// Malformed visibility expression.
    #[error("visibility parse error: {0}")]
    Parse(#[from] ParseError),
    /// Internal label invariant violated.
    #[error("visibility evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    /// Wire data rejected.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    /// Mutation fields failed validation at construction.
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),
    /// Fold called with inconsistent input.
    #[error("fold error: {0}")]
    Fold(#[from] FoldError),
}

impl StrataError {
    /// Builds an [`StrataError::InvalidMutation`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        StrataError::InvalidMutation(reason.into())
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            StrataError::Parse(err) => err.code(),
            StrataError::Evaluation(_) => "EvaluationError",
            StrataError::Decode(DecodeError::CorruptPayload { .. }) => "CorruptPayload",
            StrataError::Decode(DecodeError::UnsupportedVersion(_)) => "UnsupportedVersion",
            StrataError::InvalidMutation(_) => "InvalidMutation",
            StrataError::Fold(FoldError::MixedElementKinds { .. }) => "MixedElementKinds",
            StrataError::Fold(FoldError::MixedElements { .. }) => "MixedElements",
        }
    }
}
