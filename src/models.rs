//! Data models for listing records and extracted snippets.
//!
//! - [`PostId`]: identifier of a post, integer or string as the API hands it out
//! - [`ListingRecord`]: one entry of the article listing, kept as the raw JSON
//!   object so every field the API sends is written back to the index untouched
//! - [`Snippet`]: one code block pulled out of a post body

use crate::error::Error;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a post.
///
/// The listing API returns ids as strings, older dumps carry integers. Both
/// forms are accepted and rendered the same way, which is also the artifact
/// file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Int(u64),
    Str(String),
}

impl PostId {
    /// Read an id from a JSON value, rejecting anything that cannot safely be
    /// used as a file name.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(PostId::Int),
            Value::String(s) => {
                let s = s.trim();
                let usable = !s.is_empty()
                    && s != "."
                    && s != ".."
                    && !s.contains(['/', '\\', '\0']);
                usable.then(|| PostId::Str(s.to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Int(n) => write!(f, "{n}"),
            PostId::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PostId {
    fn from(n: u64) -> Self {
        PostId::Int(n)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        PostId::Str(s.to_string())
    }
}

/// One entry of the paginated article listing.
///
/// Records are immutable once built. Serialization writes back exactly the
/// object that was received, in the order the API sent its fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ListingRecord {
    id: PostId,
    fields: Map<String, Value>,
}

impl ListingRecord {
    pub fn id(&self) -> &PostId {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// True when the record's `hubs` list has an entry with the given `alias`.
    ///
    /// Records without a `hubs` list never match.
    pub fn has_hub(&self, alias: &str) -> bool {
        self.fields
            .get("hubs")
            .and_then(Value::as_array)
            .is_some_and(|hubs| {
                hubs.iter()
                    .any(|hub| hub.get("alias").and_then(Value::as_str) == Some(alias))
            })
    }
}

impl TryFrom<Map<String, Value>> for ListingRecord {
    type Error = Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = fields
            .get("id")
            .and_then(PostId::from_value)
            .ok_or_else(|| Error::InvalidRecord(format!("missing or unusable id in {:?}", fields.get("id"))))?;
        Ok(Self { id, fields })
    }
}

impl TryFrom<Value> for ListingRecord {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => fields.try_into(),
            other => Err(Error::InvalidRecord(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

impl Serialize for ListingRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// A code block extracted from a post, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
}

impl Snippet {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Number of lines in the snippet; a trailing newline does not open a new line.
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_id_from_value() {
        assert_eq!(PostId::from_value(&json!(123)), Some(PostId::Int(123)));
        assert_eq!(
            PostId::from_value(&json!("654321")),
            Some(PostId::Str("654321".to_string()))
        );
        assert_eq!(PostId::from_value(&json!("")), None);
        assert_eq!(PostId::from_value(&json!("..")), None);
        assert_eq!(PostId::from_value(&json!("../etc/passwd")), None);
        assert_eq!(PostId::from_value(&json!(-5)), None);
        assert_eq!(PostId::from_value(&json!(null)), None);
        assert_eq!(PostId::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_post_id_display() {
        assert_eq!(PostId::from(7u64).to_string(), "7");
        assert_eq!(PostId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_record_round_trip_keeps_fields_and_order() {
        let line = r#"{"titleHtml":"Hi","id":"100","hubs":[{"alias":"python"}],"extra":{"b":1,"a":2}}"#;
        let record: ListingRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.id(), &PostId::from("100"));
        assert_eq!(serde_json::to_string(&record).unwrap(), line);
    }

    #[test]
    fn test_record_without_id_is_rejected() {
        let err = serde_json::from_str::<ListingRecord>(r#"{"hubs":[]}"#).unwrap_err();
        assert!(err.to_string().contains("id"));

        let err = ListingRecord::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_has_hub() {
        let record = ListingRecord::try_from(json!({
            "id": 1,
            "hubs": [{"alias": "webdev"}, {"alias": "python", "title": "Python"}]
        }))
        .unwrap();
        assert!(record.has_hub("python"));
        assert!(!record.has_hub("rust"));

        let no_hubs = ListingRecord::try_from(json!({"id": 2})).unwrap();
        assert!(!no_hubs.has_hub("python"));

        let malformed = ListingRecord::try_from(json!({"id": 3, "hubs": "python"})).unwrap();
        assert!(!malformed.has_hub("python"));
    }

    #[test]
    fn test_snippet_line_count() {
        assert_eq!(Snippet::new("").line_count(), 0);
        assert_eq!(Snippet::new("one").line_count(), 1);
        assert_eq!(Snippet::new("a\nb\nc\n").line_count(), 3);
        assert_eq!(Snippet::new("a\n\nc").line_count(), 3);
    }
}
