use sha2::Digest;
use sha2::Sha256;

use super::ResourceSet;
use super::Snapshot;

/// Derives versions from content so that regenerating unchanged content
/// never produces a new version.
///
/// The version is the hex SHA-256 over the type url followed by every
/// resource in name order (name, payload type, payload bytes, ttl). An empty
/// set still hashes its type url, so its version is stable and non-empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentVersioner;

impl ContentVersioner {
    pub fn version_of(
        type_url: &str,
        set: &ResourceSet,
    ) -> String {
        let mut hasher = Sha256::new();
        write_field(&mut hasher, type_url.as_bytes());

        for (name, resource) in set.items() {
            write_field(&mut hasher, name.as_bytes());
            write_field(&mut hasher, resource.payload.type_url.as_bytes());
            write_field(&mut hasher, &resource.payload.value);
            match resource.ttl {
                Some(ttl) => {
                    hasher.update([1u8]);
                    hasher.update(ttl.as_nanos().to_be_bytes());
                }
                None => hasher.update([0u8]),
            }
        }

        hex::encode(hasher.finalize())
    }

    /// Replaces every set's version with its content version.
    pub fn stamp(
        &self,
        mut snapshot: Snapshot,
    ) -> Snapshot {
        for (type_url, set) in snapshot.sets.iter_mut() {
            let version = Self::version_of(type_url, set);
            set.set_version(version);
        }
        snapshot
    }
}

// Length-prefixed so that ("ab","c") and ("a","bc") hash differently.
fn write_field(
    hasher: &mut Sha256,
    bytes: &[u8],
) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
