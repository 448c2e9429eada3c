//! Ordered name/value tags attached to ledger transactions.
//!
//! Tags are transmitted as an ordered sequence; duplicate names are legal and
//! ordering is meaningful (system tags are appended after custom tags so the
//! network's resolution rule sees them last).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single name/value metadata pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Convert a tag map into an ordered tag list.
pub fn tags_from_map(map: &BTreeMap<String, String>) -> Vec<Tag> {
    map.iter()
        .map(|(name, value)| Tag::new(name.clone(), value.clone()))
        .collect()
}

/// Collapse an ordered tag list into a map. Later entries shadow earlier
/// ones on duplicate names.
pub fn tags_to_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|t| (t.name.clone(), t.value.clone()))
        .collect()
}

/// Value of the first tag with the given name, if any.
pub fn tag_value<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.name == name)
        .map(|t| t.value.as_str())
}
