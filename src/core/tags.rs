//! Object tags
//!
//! Tag keys are not unique in the data we receive, so a `TagSet` is an
//! ordered list rather than a map. Lookups match any entry carrying both
//! the expected key and value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker tag key written on bundles claimed by the Voltron route
pub const CAT3_BUNDLE_TAG: &str = "CAT3-BUNDLE";

/// Value of the marker tag
pub const CAT3_BUNDLE_TAG_VALUE: &str = "TRUE";

/// Tag set by the upstream pipeline once it has processed a bundle
pub const VOLTRON_PROCESSING_TAG: &str = "VOLTRON-PROCESSING";

/// Value of [`VOLTRON_PROCESSING_TAG`] meaning processing succeeded
pub const VOLTRON_PROCESSING_SUCCESS: &str = "SUCCESS";

/// A single key/value tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The marker appended on the Voltron route
    pub fn cat3_bundle_marker() -> Self {
        Self::new(CAT3_BUNDLE_TAG, CAT3_BUNDLE_TAG_VALUE)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Ordered tags attached to one object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive match on key and value
    pub fn exists(&self, key: &str, expected_value: &str) -> bool {
        tag_exists(&self.0, key, expected_value)
    }

    /// Copy of this set with `tag` appended unless an identical tag is present.
    ///
    /// `self` is left untouched.
    pub fn with_tag(&self, tag: Tag) -> TagSet {
        let mut tags = self.0.clone();
        if !tag_exists(&tags, &tag.key, &tag.value) {
            tags.push(tag);
        }
        TagSet(tags)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `k=v` strings, used when logging the tags present on a bundle
    pub fn describe(&self) -> Vec<String> {
        self.0.iter().map(Tag::to_string).collect()
    }

    /// URL-encoded `k1=v1&k2=v2` form used by the S3 `x-amz-tagging` header
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for tag in &self.0 {
            serializer.append_pair(&tag.key, &tag.value);
        }
        serializer.finish()
    }
}

impl From<Vec<Tag>> for TagSet {
    fn from(tags: Vec<Tag>) -> Self {
        TagSet(tags)
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        TagSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// True if any tag has exactly `key` and `expected_value`.
///
/// An absent key is simply `false`.
pub fn tag_exists(tags: &[Tag], key: &str, expected_value: &str) -> bool {
    tags.iter()
        .any(|tag| tag.key == key && tag.value == expected_value)
}
