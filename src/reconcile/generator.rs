use std::collections::BTreeSet;

#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::GroupKey;
use crate::Resource;
use crate::Result;

/// Source of snapshot content. Implementations read the backing store; the
/// reconciler never looks inside the resources they return.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SnapshotGenerator: Send + Sync + 'static {
    /// Full resource list for `key`, possibly spanning several types.
    async fn generate(
        &self,
        key: &GroupKey,
    ) -> Result<Vec<Resource>>;

    /// Client ids the backing store addresses individually. Every other id
    /// is served from the default group.
    async fn client_ids(&self) -> Result<BTreeSet<String>>;

    /// Types every generated snapshot carries, even when empty.
    fn type_urls(&self) -> Vec<String>;
}
