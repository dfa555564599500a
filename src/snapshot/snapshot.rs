use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;

use super::Resource;
use super::ResourceSet;

lazy_static! {
    static ref EMPTY_SNAPSHOT: Arc<Snapshot> = Arc::new(Snapshot::default());
}

/// Per-group aggregate of one [`ResourceSet`] per resource type.
///
/// The default (empty) snapshot stands for "unknown": every accessor answers
/// with an empty value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub(super) sets: BTreeMap<String, ResourceSet>,
}

impl Snapshot {
    pub fn new(sets: impl IntoIterator<Item = (String, ResourceSet)>) -> Self {
        Self {
            sets: sets.into_iter().collect(),
        }
    }

    /// Groups unversioned `resources` by type. Every type in `types` gets a
    /// set even when no resource carries it.
    pub fn from_resources(
        types: &[String],
        resources: Vec<Resource>,
    ) -> Self {
        let mut grouped: BTreeMap<String, Vec<Resource>> =
            types.iter().map(|t| (t.clone(), Vec::new())).collect();
        for resource in resources {
            grouped.entry(resource.type_url().to_string()).or_default().push(resource);
        }

        Self::new(
            grouped
                .into_iter()
                .map(|(type_url, items)| (type_url, ResourceSet::new("", items))),
        )
    }

    /// Shared instance returned for unknown keys.
    pub fn empty() -> Arc<Snapshot> {
        EMPTY_SNAPSHOT.clone()
    }

    pub fn resource_set(
        &self,
        type_url: &str,
    ) -> Option<&ResourceSet> {
        self.sets.get(type_url)
    }

    pub fn resources<'a>(
        &'a self,
        type_url: &str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.sets.get(type_url).into_iter().flat_map(|set| set.items().values())
    }

    pub fn version(
        &self,
        type_url: &str,
    ) -> &str {
        self.sets.get(type_url).map(ResourceSet::version).unwrap_or_default()
    }

    /// Returns a snapshot whose `type_url` set carries `version`. When the
    /// version is already current the very same instance comes back.
    pub fn with_version(
        self: &Arc<Self>,
        type_url: &str,
        version: &str,
    ) -> Arc<Self> {
        if self.version(type_url) == version {
            return self.clone();
        }

        let mut next = Snapshot::clone(self);
        let set = next
            .sets
            .get(type_url)
            .map(|set| set.with_version(version))
            .unwrap_or_else(|| ResourceSet::new(version, Vec::new()));
        next.sets.insert(type_url.to_string(), set);
        Arc::new(next)
    }

    pub fn supported_types(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// True when no set holds a resource.
    pub fn is_empty(&self) -> bool {
        self.sets.values().all(ResourceSet::is_empty)
    }

    /// Same version and same items for `type_url`.
    pub fn content_equal(
        &self,
        other: &Snapshot,
        type_url: &str,
    ) -> bool {
        match (self.sets.get(type_url), other.sets.get(type_url)) {
            (Some(a), Some(b)) => a.version() == b.version() && a.items() == b.items(),
            (None, None) => true,
            _ => false,
        }
    }

    /// [`Self::content_equal`] over the union of both snapshots' types.
    pub fn content_equal_all(
        &self,
        other: &Snapshot,
    ) -> bool {
        self.sets
            .keys()
            .chain(other.sets.keys())
            .all(|type_url| self.content_equal(other, type_url))
    }
}
