//! Entitlement resolution and scope filtering.
//!
//! The ACL is a JSON object mapping subject id to group names. Resolution
//! fails open: if the ACL cannot be fetched or parsed the subject gets the
//! `default` group only, which still shows every unscoped package.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::BoxFuture;

/// Group every subject belongs to.
pub const DEFAULT_GROUP: &str = "default";

/// Subject id → group names.
pub type AccessList = HashMap<String, Vec<String>>;

/// Why the ACL could not be obtained. Never surfaces past the resolver.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("ACL request failed: {0}")]
    Fetch(String),
    #[error("ACL is not valid JSON: {0}")]
    Parse(String),
}

/// The groups a subject belongs to. Always contains [`DEFAULT_GROUP`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementSet {
    groups: BTreeSet<String>,
}

impl Default for EntitlementSet {
    fn default() -> Self {
        Self::from_groups(std::iter::empty::<String>())
    }
}

impl EntitlementSet {
    pub fn from_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut groups: BTreeSet<String> = groups
            .into_iter()
            .map(Into::into)
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        groups.insert(DEFAULT_GROUP.to_string());
        Self { groups }
    }

    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether an item with `required` scopes is visible to this set.
    ///
    /// Unscoped items are always visible.
    pub fn allows(&self, required: &[String]) -> bool {
        required.is_empty() || required.iter().any(|s| self.groups.contains(s.trim()))
    }
}

/// Anything carrying a list of required scopes.
pub trait Scoped {
    fn required_scopes(&self) -> &[String];
}

/// Keep the entries visible to `entitlements`, preserving order.
pub fn filter_by_scope<T: Scoped>(entries: Vec<T>, entitlements: &EntitlementSet) -> Vec<T> {
    entries
        .into_iter()
        .filter(|e| entitlements.allows(e.required_scopes()))
        .collect()
}

/// Source of the access list.
pub trait AclSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<AccessList, AccessError>>;
}

/// ACL served as JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAclSource {
    client: Client,
    url: String,
}

impl HttpAclSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AccessError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccessError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl AclSource for HttpAclSource {
    fn fetch(&self) -> BoxFuture<'_, Result<AccessList, AccessError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| AccessError::Fetch(e.to_string()))?;
            if !response.status().is_success() {
                return Err(AccessError::Fetch(format!("HTTP {}", response.status())));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| AccessError::Fetch(e.to_string()))?;
            serde_json::from_slice(&bytes).map_err(|e| AccessError::Parse(e.to_string()))
        })
    }
}

/// Fixed in-memory ACL.
#[derive(Debug, Clone, Default)]
pub struct StaticAclSource {
    list: AccessList,
}

impl StaticAclSource {
    pub fn new(list: AccessList) -> Self {
        Self { list }
    }
}

impl AclSource for StaticAclSource {
    fn fetch(&self) -> BoxFuture<'_, Result<AccessList, AccessError>> {
        let list = self.list.clone();
        Box::pin(async move { Ok(list) })
    }
}

/// Maps a subject to its [`EntitlementSet`].
#[derive(Clone)]
pub struct AccessResolver {
    source: Arc<dyn AclSource>,
}

impl AccessResolver {
    pub fn new(source: Arc<dyn AclSource>) -> Self {
        Self { source }
    }

    /// Resolve the subject's groups. Never fails.
    pub async fn resolve(&self, subject: &str) -> EntitlementSet {
        match self.source.fetch().await {
            Ok(list) => {
                let groups = list.get(subject).cloned().unwrap_or_default();
                let set = EntitlementSet::from_groups(groups);
                debug!(uuid = %subject, groups = set.len(), "Entitlements resolved");
                set
            }
            Err(e) => {
                warn!(uuid = %subject, error = %e, "ACL unavailable, using default group only");
                EntitlementSet::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        scopes: Vec<String>,
    }

    impl Scoped for Item {
        fn required_scopes(&self) -> &[String] {
            &self.scopes
        }
    }

    fn item(name: &'static str, scopes: &[&str]) -> Item {
        Item {
            name,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    struct FailingSource;

    impl AclSource for FailingSource {
        fn fetch(&self) -> BoxFuture<'_, Result<AccessList, AccessError>> {
            Box::pin(async { Err(AccessError::Fetch("connection refused".into())) })
        }
    }

    #[test]
    fn test_default_group_always_present() {
        let set = EntitlementSet::from_groups(["beta", " ", "beta"]);
        assert!(set.contains(DEFAULT_GROUP));
        assert!(set.contains("beta"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_beta_package_needs_beta_group() {
        let catalog = vec![item("p1", &["beta"])];

        let default_only = EntitlementSet::default();
        assert!(filter_by_scope(catalog.clone(), &default_only).is_empty());

        let beta = EntitlementSet::from_groups(["default", "beta"]);
        assert_eq!(filter_by_scope(catalog, &beta).len(), 1);
    }

    #[test]
    fn test_unscoped_entries_always_visible() {
        let entries = vec![item("a", &[]), item("b", &["staff"])];
        let kept = filter_by_scope(entries, &EntitlementSet::default());
        assert_eq!(kept, vec![item("a", &[])]);
    }

    #[tokio::test]
    async fn test_resolver_uses_acl_entry() {
        let mut list = AccessList::new();
        list.insert("0d3a".into(), vec!["beta".into()]);
        let resolver = AccessResolver::new(Arc::new(StaticAclSource::new(list)));

        let set = resolver.resolve("0d3a").await;
        assert!(set.contains("beta"));
        assert!(set.contains(DEFAULT_GROUP));

        let stranger = resolver.resolve("ffff").await;
        assert_eq!(stranger, EntitlementSet::default());
    }

    #[tokio::test]
    async fn test_resolver_fails_open() {
        let resolver = AccessResolver::new(Arc::new(FailingSource));
        assert_eq!(resolver.resolve("0d3a").await, EntitlementSet::default());
    }

    proptest! {
        #[test]
        fn prop_filter_is_monotonic(
            groups in proptest::collection::vec("[a-d]", 0..4),
            extra in "[a-d]",
            scopes in proptest::collection::vec(proptest::collection::vec("[a-d]", 0..3), 0..8),
        ) {
            let entries: Vec<Item> = scopes
                .into_iter()
                .map(|s| Item { name: "x", scopes: s })
                .collect();
            let small = EntitlementSet::from_groups(groups.clone());
            let mut bigger_groups = groups;
            bigger_groups.push(extra);
            let big = EntitlementSet::from_groups(bigger_groups);

            let small_kept = filter_by_scope(entries.clone(), &small);
            let big_kept = filter_by_scope(entries, &big);

            prop_assert!(small_kept.len() <= big_kept.len());
            for entry in &small_kept {
                prop_assert!(big_kept.contains(entry));
            }
        }
    }
}
