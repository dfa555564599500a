use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tonic::async_trait;
use tracing::debug;

use crate::constants::ADDRESS_LABEL;
use crate::constants::INSTANCE_LABEL;
use crate::constants::JOB_LABEL;
use crate::constants::MESH_LABEL;
use crate::constants::METRICS_PATH_LABEL;
use crate::constants::SCHEME_LABEL;
use crate::proto::MonitoringAssignment;
use crate::Result;
use crate::TransportError;

/// A set of scrape targets sharing a source, in Prometheus file-SD shape.
///
/// A group without targets and labels is a tombstone: the source existed in
/// an earlier batch and must be dropped by the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetGroup {
    pub source: String,
    pub targets: Vec<BTreeMap<String, String>>,
    pub labels: BTreeMap<String, String>,
}

impl TargetGroup {
    pub fn tombstone(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.targets.is_empty() && self.labels.is_empty()
    }
}

impl From<&MonitoringAssignment> for TargetGroup {
    fn from(assignment: &MonitoringAssignment) -> Self {
        let targets = assignment
            .targets
            .iter()
            .map(|target| {
                let mut labels = target.labels.clone();
                labels.insert(ADDRESS_LABEL.to_string(), target.address.clone());
                labels.insert(SCHEME_LABEL.to_string(), target.scheme.clone());
                labels.insert(METRICS_PATH_LABEL.to_string(), target.metrics_path.clone());
                labels.insert(INSTANCE_LABEL.to_string(), target.name.clone());
                labels
            })
            .collect();

        let mut labels = assignment.labels.clone();
        labels.insert(MESH_LABEL.to_string(), assignment.mesh.clone());
        labels.insert(JOB_LABEL.to_string(), assignment.service.clone());

        Self {
            source: assignment.name.clone(),
            targets,
            labels,
        }
    }
}

/// Consumer of delivered batches. A batch is applied as one unit.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TargetGroupSink: Send + Sync + 'static {
    async fn deliver(
        &self,
        groups: Vec<TargetGroup>,
    ) -> Result<()>;
}

#[async_trait]
impl TargetGroupSink for mpsc::Sender<Vec<TargetGroup>> {
    async fn deliver(
        &self,
        groups: Vec<TargetGroup>,
    ) -> Result<()> {
        self.send(groups)
            .await
            .map_err(|_| TransportError::SinkClosed.into())
    }
}

/// Remembers which sources were delivered to each requester group.
#[derive(Debug, Default)]
pub struct Delivery {
    delivered: HashMap<String, BTreeSet<String>>,
}

impl Delivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(
        &self,
        group: &str,
    ) -> Option<&BTreeSet<String>> {
        self.delivered.get(group)
    }

    /// Appends a tombstone for every source of the previous batch missing
    /// from `groups`. Returns the outgoing batch and the sources it carries.
    pub fn with_removals(
        &self,
        group: &str,
        mut groups: Vec<TargetGroup>,
    ) -> (Vec<TargetGroup>, BTreeSet<String>) {
        let current: BTreeSet<String> = groups.iter().map(|g| g.source.clone()).collect();
        if let Some(previous) = self.delivered.get(group) {
            groups.extend(previous.difference(&current).map(TargetGroup::tombstone));
        }
        (groups, current)
    }

    /// Replaces the delivered set of `group`.
    pub fn commit(
        &mut self,
        group: &str,
        sources: BTreeSet<String>,
    ) {
        self.delivered.insert(group.to_string(), sources);
    }

    /// Delivers `groups` plus tombstones as one batch, then records the new
    /// set. The set is left untouched when the sink fails.
    pub async fn deliver(
        &mut self,
        group: &str,
        groups: Vec<TargetGroup>,
        sink: &dyn TargetGroupSink,
    ) -> Result<()> {
        let (batch, sources) = self.with_removals(group, groups);
        let removed = batch.len() - sources.len();
        sink.deliver(batch).await?;
        debug!(group, delivered = sources.len(), removed, "delivered target groups");
        self.commit(group, sources);
        Ok(())
    }
}
