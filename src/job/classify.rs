use regex::RegexSet;

use super::model::JobKind;
use crate::error::TailpoolError;

/// Decides whether a raw item becomes a job, and of which kind.
///
/// Implementations must be pure: the same text always yields the same answer.
pub trait Classifier: Send + Sync {
    fn classify(&self, item: &str) -> Option<JobKind>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Option<JobKind> + Send + Sync,
{
    fn classify(&self, item: &str) -> Option<JobKind> {
        self(item)
    }
}

/// Regex-driven classifier built from the `kind_a_patterns` and
/// `kind_b_patterns` config lists.
///
/// Kind A patterns are tried first. With both lists empty every item is
/// accepted as [`JobKind::A`].
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    kind_a: RegexSet,
    kind_b: RegexSet,
}

impl PatternClassifier {
    pub fn new(kind_a: &[String], kind_b: &[String]) -> Result<Self, TailpoolError> {
        if kind_a.is_empty() && kind_b.is_empty() {
            return Ok(Self::accept_all());
        }
        Ok(Self {
            kind_a: compile(kind_a)?,
            kind_b: compile(kind_b)?,
        })
    }

    pub fn accept_all() -> Self {
        Self {
            kind_a: RegexSet::empty(),
            kind_b: RegexSet::empty(),
        }
    }
}

// Compiles each pattern on its own first so the error names the offender.
fn compile(patterns: &[String]) -> Result<RegexSet, TailpoolError> {
    for pattern in patterns {
        regex::Regex::new(pattern).map_err(|source| TailpoolError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
    }
    RegexSet::new(patterns).map_err(|source| TailpoolError::Pattern {
        pattern: patterns.join(" | "),
        source,
    })
}

impl Classifier for PatternClassifier {
    fn classify(&self, item: &str) -> Option<JobKind> {
        if self.kind_a.is_empty() && self.kind_b.is_empty() {
            return Some(JobKind::A);
        }
        if self.kind_a.is_match(item) {
            Some(JobKind::A)
        } else if self.kind_b.is_match(item) {
            Some(JobKind::B)
        } else {
            None
        }
    }
}
