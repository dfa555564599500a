use std::fmt;

use crate::DEFAULT_CLIENT_ID;

/// Bucket under which a snapshot is cached and reconciled.
///
/// Distinct from the raw client id: every id the generator does not know
/// maps onto [`GroupKey::default_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn default_key() -> Self {
        Self(DEFAULT_CLIENT_ID.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_CLIENT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}
