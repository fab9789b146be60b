//! Relation-id requests and their options.

use crate::relation_id::error::RelationIdError;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::Condition;
use std::fmt;
use std::sync::Arc;

static RELATION_PATH: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)$"));

static PROPERTY_PATH: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$"));

/// Condition added to the correlated subquery; receives the subquery's alias for the target table.
pub type SubqueryFilter = Arc<dyn Fn(&str) -> Condition + Send + Sync>;

/// Optional knobs of one `load_relation_id_and_map` call
#[derive(Clone, Default)]
pub struct RelationIdOptions {
    /// Base of the output alias instead of `<prefix>_<alias>_<relation>`
    pub alias: Option<String>,
    /// Map keys as `{ keyProperty: value }` even when the key has one column;
    /// `None` uses the configured default
    pub disable_mixed_map: Option<bool>,
    pub filter: Option<SubqueryFilter>,
}

impl RelationIdOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn disable_mixed_map(mut self, disable: bool) -> Self {
        self.disable_mixed_map = Some(disable);
        self
    }

    /// Restrict the related rows whose ids are returned.
    ///
    /// ```
    /// use relid::RelationIdOptions;
    /// use sea_query::{Condition, Expr};
    ///
    /// let options = RelationIdOptions::new().filter(|target| {
    ///     Condition::all().add(Expr::cust(format!("\"{target}\".\"active\" = TRUE")))
    /// });
    /// assert!(options.filter.is_some());
    /// ```
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> Condition + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for RelationIdOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationIdOptions")
            .field("alias", &self.alias)
            .field("disable_mixed_map", &self.disable_mixed_map)
            .field("filter", &if self.filter.is_some() { "Some" } else { "None" })
            .finish()
    }
}

/// One registered relation-id mapping
///
/// Immutable once built; planned exactly once when it is registered on a
/// query.
#[derive(Debug, Clone)]
pub struct RelationIdRequest {
    /// Alias of the entity the relation is declared on
    pub source_alias: String,
    /// Relation property on that entity
    pub relation_property: String,
    /// `source_alias.relation_property` as given by the caller
    pub relation_property_path: String,
    /// Where the ids are written on each result, dot separated, without a
    /// leading source alias
    pub output_property_path: String,
    pub alias_prefix: String,
    pub options: RelationIdOptions,
}

impl RelationIdRequest {
    /// Validate both paths and build a request.
    ///
    /// The output path may be qualified with the source alias:
    /// `post.categoryId` on `post.category` writes `categoryId` on each post,
    /// the same as plain `categoryId`.
    pub fn parse(
        output_property_path: &str,
        relation_property_path: &str,
        alias_prefix: &str,
        options: RelationIdOptions,
    ) -> Result<Self, RelationIdError> {
        let relation_re = compiled(&RELATION_PATH)?;
        let caps = relation_re
            .captures(relation_property_path)
            .ok_or_else(|| RelationIdError::InvalidPath {
                path: relation_property_path.to_string(),
                reason: "expected `alias.relation`".into(),
            })?;
        let (source_alias, relation_property) = match (caps.get(1), caps.get(2)) {
            (Some(a), Some(r)) => (a.as_str().to_string(), r.as_str().to_string()),
            _ => {
                return Err(RelationIdError::InvalidPath {
                    path: relation_property_path.to_string(),
                    reason: "expected `alias.relation`".into(),
                })
            }
        };

        if !compiled(&PROPERTY_PATH)?.is_match(output_property_path) {
            return Err(RelationIdError::InvalidPath {
                path: output_property_path.to_string(),
                reason: "output property must be a dot-separated list of identifiers".into(),
            });
        }
        if let Some(alias) = &options.alias {
            if alias.is_empty() {
                return Err(RelationIdError::InvalidPath {
                    path: relation_property_path.to_string(),
                    reason: "explicit alias must not be empty".into(),
                });
            }
        }

        let output_property_path = output_property_path
            .strip_prefix(source_alias.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(output_property_path);

        Ok(Self {
            source_alias,
            relation_property,
            relation_property_path: relation_property_path.to_string(),
            output_property_path: output_property_path.to_string(),
            alias_prefix: alias_prefix.to_string(),
            options,
        })
    }

    /// Alias the planner starts from before collision handling.
    pub fn base_alias(&self) -> String {
        match &self.options.alias {
            Some(alias) => alias.replace('.', "_"),
            None => format!(
                "{}_{}_{}",
                self.alias_prefix, self.source_alias, self.relation_property
            ),
        }
    }

    /// Segments of the output property path.
    pub fn output_segments(&self) -> impl Iterator<Item = &str> {
        self.output_property_path.split('.')
    }
}

fn compiled(re: &'static Lazy<Result<Regex, regex::Error>>) -> Result<&'static Regex, RelationIdError> {
    Lazy::force(re).as_ref().map_err(|e| RelationIdError::InvalidPath {
        path: String::new(),
        reason: format!("invalid path pattern: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_relation_path() {
        let req = RelationIdRequest::parse("categoryId", "post.category", "relid", RelationIdOptions::new()).unwrap();
        assert_eq!(req.source_alias, "post");
        assert_eq!(req.relation_property, "category");
        assert_eq!(req.base_alias(), "relid_post_category");
        assert_eq!(req.output_segments().collect::<Vec<_>>(), vec!["categoryId"]);
    }

    #[test]
    fn test_output_path_qualified_with_source_alias() {
        let req = RelationIdRequest::parse("post.categoryId", "post.category", "relid", RelationIdOptions::new()).unwrap();
        assert_eq!(req.output_property_path, "categoryId");
        assert_eq!(req.output_segments().collect::<Vec<_>>(), vec!["categoryId"]);

        let req = RelationIdRequest::parse("post.meta.categoryId", "post.category", "relid", RelationIdOptions::new())
            .unwrap();
        assert_eq!(req.output_property_path, "meta.categoryId");

        // Only an exact alias segment is stripped.
        let req = RelationIdRequest::parse("postal.code", "post.category", "relid", RelationIdOptions::new()).unwrap();
        assert_eq!(req.output_property_path, "postal.code");
        let req = RelationIdRequest::parse("post", "post.category", "relid", RelationIdOptions::new()).unwrap();
        assert_eq!(req.output_property_path, "post");
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for bad in ["category", "post.", ".category", "post.category.id", "post category"] {
            let err = RelationIdRequest::parse("x", bad, "relid", RelationIdOptions::new()).unwrap_err();
            assert!(matches!(err, RelationIdError::InvalidPath { .. }), "{bad}");
        }
        for bad in ["", "meta.", "a..b", "1abc"] {
            let err = RelationIdRequest::parse(bad, "post.category", "relid", RelationIdOptions::new()).unwrap_err();
            assert!(matches!(err, RelationIdError::InvalidPath { .. }), "{bad}");
        }
    }

    #[test]
    fn test_nested_output_and_explicit_alias() {
        let req = RelationIdRequest::parse(
            "meta.categoryId",
            "post.category",
            "relid",
            RelationIdOptions::new().alias("cat.id"),
        )
        .unwrap();
        assert_eq!(req.output_segments().collect::<Vec<_>>(), vec!["meta", "categoryId"]);
        assert_eq!(req.base_alias(), "cat_id");
    }

    #[test]
    fn test_options_debug_hides_closure() {
        let options = RelationIdOptions::new().filter(|_| Condition::all());
        let text = format!("{options:?}");
        assert!(text.contains("filter: \"Some\""));
    }
}
