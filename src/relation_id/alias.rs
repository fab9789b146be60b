//! Per-query alias generation.
//!
//! Every alias a query selects or uses for a subquery table goes through one
//! [`AliasGenerator`], so output aliases never collide with each other, with
//! the base columns, or with subquery tables. The generator is owned by the
//! query being built; nothing is shared between builds.

use crate::relation_id::error::RelationIdError;
use std::collections::HashSet;

const MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone)]
pub struct AliasGenerator {
    prefix: String,
    max_len: usize,
    used: HashSet<String>,
    subqueries: usize,
}

impl AliasGenerator {
    pub fn new(prefix: impl Into<String>, max_len: usize) -> Self {
        Self {
            prefix: prefix.into(),
            max_len,
            used: HashSet::new(),
            subqueries: 0,
        }
    }

    pub fn is_used(&self, alias: &str) -> bool {
        self.used.contains(alias)
    }

    /// Reserve an alias derived from `base`.
    ///
    /// `base` is clipped to the length limit first. If taken, `_<n>` is
    /// appended with `n` starting at `request_index` and counting up.
    pub fn reserve(&mut self, base: &str, request_index: usize) -> Result<String, RelationIdError> {
        let base = base.replace('.', "_");
        let clipped = clip(&base, self.max_len);
        if self.used.insert(clipped.to_string()) {
            return Ok(clipped.to_string());
        }
        for n in request_index..request_index + MAX_ATTEMPTS {
            let suffix = format!("_{n}");
            let Some(room) = self.max_len.checked_sub(suffix.len()) else {
                break;
            };
            let candidate = format!("{}{suffix}", clip(&base, room));
            if self.used.insert(candidate.clone()) {
                log::debug!("alias \"{clipped}\" taken, using \"{candidate}\"");
                return Ok(candidate);
            }
        }
        Err(RelationIdError::AmbiguousAlias {
            alias: clipped.to_string(),
        })
    }

    /// Reserve the next table alias for a correlated subquery.
    pub fn subquery_alias(&mut self) -> Result<String, RelationIdError> {
        self.subqueries += 1;
        let base = format!("{}_sq{}", self.prefix, self.subqueries);
        self.reserve(&base, self.subqueries)
    }
}

// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
