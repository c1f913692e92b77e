//! Deterministic cache-key derivation
//!
//! Keys are plain UTF-8 strings handed to an external cache. Every function
//! here is pure: the same inputs in the same order always render the same
//! key, and reordering the inputs renders a different one.
//!
//! # Example
//!
//! ```rust
//! use acton_data::cache_key::{by_key, by_predicates};
//! use acton_data::query::SortOrder;
//!
//! assert_eq!(by_key("Customers", 42), "customers:42");
//!
//! let key = by_predicates(&["a == 1", "b == 2"], Some(1), Some(10), Some(SortOrder::Desc));
//! assert_eq!(key.as_deref(), Some("a == 1:b == 2:1:10:Desc"));
//! assert_eq!(by_predicates::<&str>(&[], None, None, None), None);
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::query::SortOrder;

/// Prefix plus ordered arguments, rendered as `prefix[:arg1:arg2...]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: String,
    args: Vec<String>,
}

impl CacheKey {
    /// Create a key with no arguments
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Append several arguments in order
    #[must_use]
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.args.extend(args.into_iter().map(|a| a.to_string()));
        self
    }

    /// The prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        for arg in &self.args {
            write!(f, ":{}", arg)?;
        }
        Ok(())
    }
}

/// Key for a single record of a named store
pub fn by_key(entity_name: &str, key: impl fmt::Display) -> String {
    format!("{}:{}", entity_name.to_lowercase(), key)
}

/// Key for a single record qualified by its type name and extra arguments
pub fn by_entity_and_key<I>(entity_type_name: &str, key: impl fmt::Display, extra: I) -> String
where
    I: IntoIterator,
    I::Item: fmt::Display,
{
    CacheKey::new(entity_type_name)
        .arg(key)
        .args(extra)
        .to_string()
}

fn trim_noise(description: &str) -> &str {
    description.trim_matches(|c| c == '(' || c == ')' || c == '"')
}

/// Key for a predicate query
///
/// Returns `None` when `descriptions` is empty: such a query is not cacheable.
/// Descriptions are used in the order given.
pub fn by_predicates<S: AsRef<str>>(
    descriptions: &[S],
    page_number: Option<u32>,
    page_size: Option<u32>,
    sort: Option<SortOrder>,
) -> Option<String> {
    if descriptions.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = descriptions
        .iter()
        .map(|d| trim_noise(d.as_ref()).to_string())
        .collect();
    if let Some(page_number) = page_number {
        parts.push(page_number.to_string());
    }
    if let Some(page_size) = page_size {
        parts.push(page_size.to_string());
    }
    if page_number.is_some() || page_size.is_some() || sort.is_some() {
        parts.push(sort.unwrap_or_default().to_string());
    }
    Some(parts.join(":"))
}

/// Order-independent variant of [`by_predicates`]
///
/// Descriptions are trimmed, sorted and de-duplicated first, so logically
/// identical predicate sets built in a different order share one key.
pub fn by_predicate_set<S: AsRef<str>>(
    descriptions: &[S],
    page_number: Option<u32>,
    page_size: Option<u32>,
    sort: Option<SortOrder>,
) -> Option<String> {
    let mut normalized: Vec<&str> = descriptions
        .iter()
        .map(|d| trim_noise(d.as_ref()))
        .collect();
    normalized.sort_unstable();
    normalized.dedup();
    by_predicates(&normalized, page_number, page_size, sort)
}

/// Static mapping from entity type to its cache-key prefix
///
/// Built once at startup and optionally installed process-wide.
///
/// # Example
///
/// ```rust
/// use acton_data::cache_key::CacheKeyRegistry;
///
/// struct Invoice;
///
/// let registry = CacheKeyRegistry::new().register::<Invoice>("invoices");
/// assert_eq!(registry.prefix_of::<Invoice>(), Some("invoices"));
/// assert_eq!(registry.key_for::<Invoice>(7).as_deref(), Some("invoices:7"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct CacheKeyRegistry {
    prefixes: HashMap<TypeId, String>,
}

static GLOBAL_REGISTRY: OnceCell<CacheKeyRegistry> = OnceCell::new();

impl CacheKeyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the prefix for a type
    #[must_use]
    pub fn register<T: 'static>(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.insert(TypeId::of::<T>(), prefix.into());
        self
    }

    /// The registered prefix for a type
    pub fn prefix_of<T: 'static>(&self) -> Option<&str> {
        self.prefixes.get(&TypeId::of::<T>()).map(String::as_str)
    }

    /// Registered prefix, falling back to the short type name
    pub fn prefix_or_type_name<T: 'static>(&self) -> String {
        self.prefix_of::<T>()
            .map(str::to_string)
            .unwrap_or_else(|| short_type_name::<T>().to_string())
    }

    /// Key for a single record of a registered type
    pub fn key_for<T: 'static>(&self, key: impl fmt::Display) -> Option<String> {
        self.prefix_of::<T>().map(|prefix| by_key(prefix, key))
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Install this registry process-wide
    ///
    /// Returns the registry back if one was already installed.
    pub fn install(self) -> Result<(), Self> {
        GLOBAL_REGISTRY.set(self)
    }

    /// The process-wide registry, if installed
    pub fn global() -> Option<&'static CacheKeyRegistry> {
        GLOBAL_REGISTRY.get()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_render() {
        assert_eq!(CacheKey::new("users").to_string(), "users");
        assert_eq!(
            CacheKey::new("users").arg(42).args(["active", "eu"]).to_string(),
            "users:42:active:eu"
        );
    }

    #[test]
    fn test_by_key_lowercases_name() {
        assert_eq!(by_key("Customers", 42), "customers:42");
        assert_eq!(by_key("orders", "abc"), "orders:abc");
    }

    #[test]
    fn test_by_entity_and_key() {
        assert_eq!(
            by_entity_and_key("Customer", 7, Vec::<String>::new()),
            "Customer:7"
        );
        assert_eq!(
            by_entity_and_key("Customer", 7, ["detail", "v2"]),
            "Customer:7:detail:v2"
        );
    }

    #[test]
    fn test_by_predicates_deterministic() {
        let first = by_predicates(&["a == 1", "b == 2"], Some(1), Some(10), Some(SortOrder::Desc));
        let second = by_predicates(&["a == 1", "b == 2"], Some(1), Some(10), Some(SortOrder::Desc));
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_by_predicates_order_sensitive() {
        let forward = by_predicates(&["a == 1", "b == 2"], Some(1), Some(10), Some(SortOrder::Desc));
        let reversed = by_predicates(&["b == 2", "a == 1"], Some(1), Some(10), Some(SortOrder::Desc));
        assert_ne!(forward, reversed);
    }

    #[test]
    fn test_by_predicates_empty_is_not_cacheable() {
        assert_eq!(by_predicates::<&str>(&[], Some(1), Some(10), None), None);
        assert_eq!(by_predicate_set::<String>(&[], None, None, None), None);
    }

    #[test]
    fn test_by_predicates_trims_noise() {
        let key = by_predicates(&["(status == \"active\")"], None, None, None);
        assert_eq!(key.as_deref(), Some("status == \"active"));
        let key = by_predicates(&["((x > 1))"], None, None, None);
        assert_eq!(key.as_deref(), Some("x > 1"));
    }

    #[test]
    fn test_by_predicates_default_sort_when_paged() {
        let key = by_predicates(&["a"], Some(2), Some(5), None);
        assert_eq!(key.as_deref(), Some("a:2:5:Desc"));
        let key = by_predicates(&["a"], None, None, None);
        assert_eq!(key.as_deref(), Some("a"));
    }

    #[test]
    fn test_by_predicate_set_order_independent() {
        let forward = by_predicate_set(&["a == 1", "b == 2"], Some(1), Some(10), None);
        let reversed = by_predicate_set(&["(b == 2)", "a == 1", "a == 1"], Some(1), Some(10), None);
        assert_eq!(forward, reversed);
    }

    struct Invoice;
    struct Unregistered;

    #[test]
    fn test_registry_lookup() {
        let registry = CacheKeyRegistry::new().register::<Invoice>("invoices");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.prefix_of::<Invoice>(), Some("invoices"));
        assert_eq!(registry.prefix_of::<Unregistered>(), None);
        assert_eq!(registry.key_for::<Invoice>(3).as_deref(), Some("invoices:3"));
        assert_eq!(registry.prefix_or_type_name::<Unregistered>(), "Unregistered");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Invoice>(), "Invoice");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }
}
