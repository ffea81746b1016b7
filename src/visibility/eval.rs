use rustc_hash::FxHashMap;
use tracing::trace;

use crate::types::EvaluationError;

use super::{Authorizations, Visibility, VisibilityLabel};

/// Evaluates `label` against the caller's authorizations.
///
/// A term is satisfied iff its exact token is held. Returns an error only for
/// label trees `parse` never produces.
pub fn evaluate(label: &VisibilityLabel, auths: &Authorizations) -> Result<bool, EvaluationError> {
    match label {
        VisibilityLabel::Always => Ok(true),
        VisibilityLabel::Term(token) => {
            if token.is_empty() {
                return Err(EvaluationError::EmptyTerm);
            }
            Ok(auths.contains(token))
        }
        VisibilityLabel::And(operands) => {
            check_arity("and", operands)?;
            for operand in operands {
                if !evaluate(operand, auths)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        VisibilityLabel::Or(operands) => {
            check_arity("or", operands)?;
            for operand in operands {
                if evaluate(operand, auths)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn check_arity(op: &'static str, operands: &[VisibilityLabel]) -> Result<(), EvaluationError> {
    if operands.len() < 2 {
        return Err(EvaluationError::Arity {
            op,
            count: operands.len(),
        });
    }
    Ok(())
}

/// Memoizes verdicts by label source string for one caller.
///
/// A fold evaluates the same handful of labels against many records; the cache
/// lives for one fold invocation so the authorization set never changes under it.
#[derive(Debug)]
pub struct LabelCache<'a> {
    auths: &'a Authorizations,
    verdicts: FxHashMap<String, bool>,
    enabled: bool,
}

impl<'a> LabelCache<'a> {
    /// Creates an empty cache for `auths`.
    pub fn new(auths: &'a Authorizations) -> Self {
        Self {
            auths,
            verdicts: FxHashMap::default(),
            enabled: true,
        }
    }

    /// Creates a pass-through cache that re-parses on every call.
    pub fn disabled(auths: &'a Authorizations) -> Self {
        Self {
            enabled: false,
            ..Self::new(auths)
        }
    }

    /// The authorization set verdicts are computed against.
    pub fn auths(&self) -> &'a Authorizations {
        self.auths
    }

    /// Returns whether the caller satisfies `visibility`.
    pub fn can_see(&mut self, visibility: &Visibility) -> crate::types::Result<bool> {
        if visibility.is_empty() {
            return Ok(true);
        }
        if self.enabled {
            if let Some(&verdict) = self.verdicts.get(visibility.as_str()) {
                return Ok(verdict);
            }
        }
        let verdict = evaluate(&visibility.label()?, self.auths)?;
        trace!(label = visibility.as_str(), verdict, "visibility.evaluate");
        if self.enabled {
            self.verdicts.insert(visibility.as_str().to_owned(), verdict);
        }
        Ok(verdict)
    }

    /// Number of distinct labels memoized so far.
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    /// Returns `true` when nothing has been memoized.
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}
