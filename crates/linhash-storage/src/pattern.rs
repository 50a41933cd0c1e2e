//! Partial-match query patterns.
//!
//! A pattern has one field per attribute. `?` matches any value, a field
//! containing `%` is a glob, anything else is a literal compared exactly.
//! Only literals contribute hash bits to candidate bucket selection.

use crate::tuple::{DELIMITER, Tuple, hash_bytes};
use linhash_common::bits::Bits;
use linhash_common::{LinHashError, Result};

/// Marker for an attribute whose value is unknown.
pub const ANY_VALUE: &str = "?";

/// Wildcard matching zero or more characters inside a glob field.
pub const GLOB_WILDCARD: char = '%';

/// One field of a query pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternField {
    /// `?`: matches anything.
    Any,
    /// Contains `%`: matched with [`glob_match`].
    Glob(String),
    /// Exact value.
    Literal(String),
}

impl PatternField {
    fn parse(raw: &str) -> Self {
        let field = raw.trim_matches(' ');
        if field == ANY_VALUE {
            PatternField::Any
        } else if field.contains(GLOB_WILDCARD) {
            PatternField::Glob(field.to_string())
        } else {
            PatternField::Literal(field.to_string())
        }
    }

    /// Returns true if the field's hash is fixed, so it can address buckets.
    pub fn is_known(&self) -> bool {
        matches!(self, PatternField::Literal(_))
    }

    /// Tests one stored value against this field.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            PatternField::Any => true,
            PatternField::Glob(glob) => glob_match(glob, value),
            PatternField::Literal(literal) => literal == value,
        }
    }
}

/// A parsed query pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPattern {
    fields: Vec<PatternField>,
}

impl QueryPattern {
    /// Parses a pattern for a relation with `attribute_count` attributes.
    pub fn parse(text: &str, attribute_count: usize) -> Result<Self> {
        let text = text.trim_end_matches(['\n', '\r']);
        let fields: Vec<PatternField> = text.split(DELIMITER).map(PatternField::parse).collect();
        if fields.len() != attribute_count {
            return Err(LinHashError::InvalidQueryArity {
                expected: attribute_count,
                actual: fields.len(),
            });
        }
        Ok(Self { fields })
    }

    /// Returns the parsed fields in attribute order.
    pub fn fields(&self) -> &[PatternField] {
        &self.fields
    }

    /// Returns the hash of attribute `attr` if the pattern fixes its value.
    pub fn known_hash(&self, attr: usize) -> Option<Bits> {
        match self.fields.get(attr)? {
            PatternField::Literal(value) => Some(hash_bytes(value.as_bytes())),
            _ => None,
        }
    }

    /// Tests a stored tuple against the pattern. Stops at the first mismatch.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        let mut values = tuple.as_str().split(DELIMITER);
        for field in &self.fields {
            match values.next() {
                Some(value) if field.matches(value) => continue,
                _ => return false,
            }
        }
        values.next().is_none()
    }
}

impl std::fmt::Display for QueryPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", DELIMITER)?;
            }
            match field {
                PatternField::Any => f.write_str(ANY_VALUE)?,
                PatternField::Glob(s) | PatternField::Literal(s) => f.write_str(s)?,
            }
        }
        Ok(())
    }
}

/// Anchored glob match where each run of `%` matches any, possibly empty,
/// sequence of characters and every other character must match exactly.
///
/// Greedy with single-point backtracking to the most recent `%`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    // Position after the last `%` run, and the text position it resumed from.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == GLOB_WILDCARD {
            while pi < p.len() && p[pi] == GLOB_WILDCARD {
                pi += 1;
            }
            star = Some((pi, ti));
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star_p, star_t)) = star {
            pi = star_p;
            ti = star_t + 1;
            star = Some((star_p, ti));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == GLOB_WILDCARD {
        pi += 1;
    }
    pi == p.len()
}
