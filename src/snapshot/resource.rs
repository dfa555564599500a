use std::collections::BTreeMap;
use std::time::Duration;

use crate::proto::TypedPayload;

/// One named, typed, serialized configuration object.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub payload: TypedPayload,
    pub ttl: Option<Duration>,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        payload: TypedPayload,
    ) -> Self {
        Self {
            name: name.into(),
            payload,
            ttl: None,
        }
    }

    pub fn with_ttl(
        mut self,
        ttl: Duration,
    ) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn type_url(&self) -> &str {
        &self.payload.type_url
    }
}

/// All resources of one type, tagged with a version.
///
/// Two sets of the same type with equal versions hold identical items; the
/// versioner guarantees it by deriving the version from the items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    version: String,
    items: BTreeMap<String, Resource>,
}

impl ResourceSet {
    /// Builds a set keyed by resource name. A later resource with an already
    /// seen name replaces the earlier one.
    pub fn new(
        version: impl Into<String>,
        resources: impl IntoIterator<Item = Resource>,
    ) -> Self {
        Self {
            version: version.into(),
            items: resources.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn items(&self) -> &BTreeMap<String, Resource> {
        &self.items
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Resource> {
        self.items.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn with_version(
        &self,
        version: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            items: self.items.clone(),
        }
    }

    pub(crate) fn set_version(
        &mut self,
        version: String,
    ) {
        self.version = version;
    }
}
