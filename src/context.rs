//! Namespace context of an entity stream
//!
//! Holds the prefix <-> expansion table declared at the head of every
//! stream and resolves raw identifiers to canonical URIs with it.

use std::collections::HashMap;

use crate::error::ContextError;
use crate::id::{classify_id, IdKind};
use crate::vocab::DEFAULT_PREFIX;

/// Bidirectional prefix/expansion table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    prefix_to_expansion: HashMap<String, String>,
    expansion_to_prefix: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prefix and its expansion in both directions
    ///
    /// Rebinding either side drops the pair it replaces, so both maps
    /// always hold the same pairs.
    pub fn store(&mut self, prefix: impl Into<String>, expansion: impl Into<String>) {
        let prefix = prefix.into();
        let expansion = expansion.into();

        if let Some(old_expansion) = self.prefix_to_expansion.remove(&prefix) {
            if self.expansion_to_prefix.get(&old_expansion) == Some(&prefix) {
                self.expansion_to_prefix.remove(&old_expansion);
            }
        }
        if let Some(old_prefix) = self.expansion_to_prefix.remove(&expansion) {
            if self.prefix_to_expansion.get(&old_prefix) == Some(&expansion) {
                self.prefix_to_expansion.remove(&old_prefix);
            }
        }

        self.prefix_to_expansion
            .insert(prefix.clone(), expansion.clone());
        self.expansion_to_prefix.insert(expansion, prefix);
    }

    pub fn expand(&self, prefix: &str) -> Result<&str, ContextError> {
        self.prefix_to_expansion
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| ContextError::UnknownPrefix(prefix.to_string()))
    }

    pub fn compress(&self, expansion: &str) -> Result<&str, ContextError> {
        self.expansion_to_prefix
            .get(expansion)
            .map(String::as_str)
            .ok_or_else(|| ContextError::UnknownExpansion(expansion.to_string()))
    }

    pub fn len(&self) -> usize {
        self.prefix_to_expansion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefix_to_expansion.is_empty()
    }

    /// Resolve a full URI, CURIE or bare token to a canonical URI
    ///
    /// Expansions are concatenated with the local part as-is, so the
    /// expansion string has to carry its own trailing separator.
    pub fn canonicalize(&self, id: &str) -> Result<String, ContextError> {
        match classify_id(id) {
            IdKind::FullUri => Ok(id.to_string()),
            IdKind::Curie { prefix, local } => Ok(format!("{}{}", self.expand(prefix)?, local)),
            IdKind::Bare => Ok(format!("{}{}", self.expand(DEFAULT_PREFIX)?, id)),
        }
    }

    /// Union of two contexts
    ///
    /// Fails on the first key that maps to different values in `self` and
    /// `other`, in either direction. Neither input is modified.
    pub fn merge(&self, other: &Context) -> Result<Context, ContextError> {
        let prefix_to_expansion = merge_map(&self.prefix_to_expansion, &other.prefix_to_expansion)?;
        let expansion_to_prefix = merge_map(&self.expansion_to_prefix, &other.expansion_to_prefix)?;
        Ok(Context {
            prefix_to_expansion,
            expansion_to_prefix,
        })
    }
}

fn merge_map(
    a: &HashMap<String, String>,
    b: &HashMap<String, String>,
) -> Result<HashMap<String, String>, ContextError> {
    let mut result = a.clone();
    for (key, incoming) in b {
        match a.get(key) {
            Some(existing) if existing != incoming => {
                return Err(ContextError::Conflict {
                    key: key.clone(),
                    existing: existing.clone(),
                    incoming: incoming.clone(),
                });
            }
            Some(_) => {}
            None => {
                result.insert(key.clone(), incoming.clone());
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Context {
        let mut ctx = Context::new();
        ctx.store("_", "http://x/");
        ctx.store("geo", "http://data.mimiro.io/models/flatgeo/");
        ctx
    }

    #[test]
    fn test_store_is_bidirectional() {
        let ctx = sample();
        assert_eq!(ctx.expand("geo").unwrap(), "http://data.mimiro.io/models/flatgeo/");
        assert_eq!(ctx.compress("http://data.mimiro.io/models/flatgeo/").unwrap(), "geo");
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_last_store_wins() {
        let mut ctx = Context::new();
        ctx.store("ns", "http://a/");
        ctx.store("ns", "http://b/");
        assert_eq!(ctx.expand("ns").unwrap(), "http://b/");
    }

    #[test]
    fn test_rebinding_prefix_drops_old_expansion() {
        let mut ctx = Context::new();
        ctx.store("ns", "http://a/");
        ctx.store("ns", "http://b/");
        assert_eq!(ctx.expand("ns").unwrap(), "http://b/");
        assert_eq!(ctx.compress("http://b/").unwrap(), "ns");
        assert_eq!(
            ctx.compress("http://a/"),
            Err(ContextError::UnknownExpansion("http://a/".to_string()))
        );
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_rebinding_expansion_drops_old_prefix() {
        let mut ctx = Context::new();
        ctx.store("a", "http://x/");
        ctx.store("b", "http://x/");
        assert_eq!(ctx.compress("http://x/").unwrap(), "b");
        assert_eq!(ctx.expand("b").unwrap(), "http://x/");
        assert!(ctx.expand("a").is_err());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_rebinding_leaves_no_stale_merge_conflict() {
        let mut ctx = Context::new();
        ctx.store("ns", "http://a/");
        ctx.store("ns", "http://b/");

        let mut other = Context::new();
        other.store("other", "http://a/");

        let merged = ctx.merge(&other).unwrap();
        assert_eq!(merged.expand("ns").unwrap(), "http://b/");
        assert_eq!(merged.compress("http://a/").unwrap(), "other");
    }

    #[test]
    fn test_missing_lookups() {
        let ctx = sample();
        assert_eq!(
            ctx.expand("nope"),
            Err(ContextError::UnknownPrefix("nope".to_string()))
        );
        assert!(matches!(
            ctx.compress("http://nope/"),
            Err(ContextError::UnknownExpansion(_))
        ));
    }

    #[test]
    fn test_canonicalize() {
        let ctx = sample();
        assert_eq!(ctx.canonicalize("a").unwrap(), "http://x/a");
        assert_eq!(
            ctx.canonicalize("geo:Point").unwrap(),
            "http://data.mimiro.io/models/flatgeo/Point"
        );
        assert_eq!(
            ctx.canonicalize("https://example.org/thing").unwrap(),
            "https://example.org/thing"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent_for_full_uris() {
        let ctx = sample();
        let once = ctx.canonicalize("geo:coordinates").unwrap();
        assert_eq!(ctx.canonicalize(&once).unwrap(), once);
    }

    #[test]
    fn test_canonicalize_unknown_prefix() {
        let ctx = sample();
        assert_eq!(
            ctx.canonicalize("foo:bar"),
            Err(ContextError::UnknownPrefix("foo".to_string()))
        );
    }

    #[test]
    fn test_canonicalize_without_default_namespace() {
        let mut ctx = Context::new();
        ctx.store("ns", "http://a/");
        assert_eq!(
            ctx.canonicalize("bare"),
            Err(ContextError::UnknownPrefix("_".to_string()))
        );
    }

    #[test]
    fn test_merge_union() {
        let a = sample();
        let mut b = Context::new();
        b.store("_", "http://x/");
        b.store("foaf", "http://xmlns.com/foaf/0.1/");

        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.expand("foaf").unwrap(), "http://xmlns.com/foaf/0.1/");
        assert_eq!(merged.compress("http://x/").unwrap(), "_");
    }

    #[test]
    fn test_merge_conflict_leaves_inputs_untouched() {
        let a = sample();
        let mut b = Context::new();
        b.store("geo", "http://other/");
        b.store("extra", "http://extra/");

        let before_a = a.clone();
        let before_b = b.clone();
        let err = a.merge(&b).unwrap_err();
        assert_eq!(
            err,
            ContextError::Conflict {
                key: "geo".to_string(),
                existing: "http://data.mimiro.io/models/flatgeo/".to_string(),
                incoming: "http://other/".to_string(),
            }
        );
        assert_eq!(a, before_a);
        assert_eq!(b, before_b);
    }

    #[test]
    fn test_merge_detects_expansion_conflict() {
        let a = sample();
        let mut b = Context::new();
        b.store("x", "http://x/");
        assert!(matches!(a.merge(&b), Err(ContextError::Conflict { .. })));
    }
}
