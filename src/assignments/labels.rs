use std::collections::BTreeMap;
use std::collections::BTreeSet;

use super::Workload;

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub(crate) fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Scrape labels of a workload's target.
///
/// Plural labels (`<tag>s` = `,v1,v2,`) list every distinct value of a tag
/// across all tag sets. Singular labels take the value from the earliest
/// tag set declaring the tag and win over a generated plural of the same
/// name. Name extensions are applied last.
pub(crate) fn target_labels(workload: &Workload) -> BTreeMap<String, String> {
    let tag_sets = workload.tag_sets();
    let mut labels = BTreeMap::new();

    let mut values: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for tags in &tag_sets {
        for (key, value) in tags.iter() {
            values.entry(key.as_str()).or_default().insert(value.as_str());
        }
    }
    for (key, distinct) in values {
        let joined = distinct.into_iter().collect::<Vec<_>>().join(",");
        labels.insert(format!("{}s", sanitize_label_name(key)), format!(",{joined},"));
    }

    for tags in tag_sets.iter().rev() {
        for (key, value) in tags.iter() {
            labels.insert(sanitize_label_name(key), value.clone());
        }
    }

    for (key, value) in &workload.name_extensions {
        labels.insert(sanitize_label_name(key), value.clone());
    }

    labels
}
