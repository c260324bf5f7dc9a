//! ZenTao bug and product types.
//!
//! The three API dialects disagree on field names and shapes (a product may
//! be a bare id, a string, or a nested `{id, name}` object; the legacy
//! dialect writes `0000-00-00 00:00:00` for "no date"). Everything in this
//! module funnels those raw shapes into one normalized [`Bug`] record, so
//! downstream code never sees dialect-specific JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The legacy dialect's "no date" sentinel.
pub const ZERO_DATE: &str = "0000-00-00 00:00:00";

/// Keys tried, in order, when a field arrives as a nested object.
const NESTED_TEXT_KEYS: &[&str] = &["name", "account", "realname", "title", "id"];

/// A product, used to scope bug queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// The product ID.
    pub id: String,
    /// The product name.
    pub name: String,
}

impl Product {
    /// Create a new product.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Build a product from a raw API object.
    ///
    /// Returns `None` when the object carries no usable id.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let id = text_of(raw.get("id"));
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            name: text_of(raw.get("name")),
        })
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.name)
    }
}

/// A normalized ZenTao bug.
///
/// Timestamps are either empty or `YYYY-MM-DD HH:MM:SS`, which keeps them
/// lexically comparable against a watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bug {
    pub id: String,
    pub title: String,
    pub severity: String,
    pub status: String,
    pub opened_by: String,
    pub opened_date: String,
    pub last_edited_date: String,
    pub product: String,
    pub module: String,
}

impl Bug {
    /// Normalize a raw bug object from any dialect.
    ///
    /// Normalizing an already-normalized bug (serialized back to JSON)
    /// yields the same bug.
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            id: text_of(raw.get("id")),
            title: text_of(raw.get("title")),
            severity: text_of(raw.get("severity")),
            status: text_of(raw.get("status")),
            opened_by: text_of(raw.get("openedBy")),
            opened_date: normalize_date(&text_of(raw.get("openedDate"))),
            last_edited_date: normalize_date(&text_of(raw.get("lastEditedDate"))),
            product: text_of(raw.get("product")),
            module: text_of(raw.get("module")),
        }
    }

    /// Whether the bug was opened or last edited at or after `watermark`.
    ///
    /// The opened date is checked first; the last-edited date only matters
    /// when the opened date does not pass, so old bugs with recent edits
    /// still qualify.
    pub fn touched_since(&self, watermark: &str) -> bool {
        if !self.opened_date.is_empty() && self.opened_date.as_str() >= watermark {
            return true;
        }
        !self.last_edited_date.is_empty() && self.last_edited_date.as_str() >= watermark
    }
}

impl fmt::Display for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bug #{}: {}", self.id, self.title)
    }
}

/// Render a raw JSON field as text.
///
/// Strings are trimmed, numbers and booleans are stringified, nested
/// objects collapse to their first non-empty descriptive key and anything
/// else becomes the empty string.
pub(crate) fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Object(map)) => NESTED_TEXT_KEYS
            .iter()
            .map(|key| text_of(map.get(*key)))
            .find(|text| !text.is_empty())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Normalize a timestamp to `YYYY-MM-DD HH:MM:SS` or empty.
///
/// Zero dates become empty; ISO-8601 `T`-separated timestamps have the
/// separator replaced and any fraction or offset dropped.
pub(crate) fn normalize_date(raw: &str) -> String {
    let date = raw.trim();
    if date.is_empty() || date.starts_with("0000-00-00") {
        return String::new();
    }
    if date.len() >= 19 && date.as_bytes()[10] == b'T' && date.is_char_boundary(19) {
        return format!("{} {}", &date[..10], &date[11..19]);
    }
    date.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bug_from_rest_shape() {
        let raw = json!({
            "id": 42,
            "title": "  Crash on save ",
            "severity": 2,
            "status": "active",
            "openedBy": {"id": 7, "account": "alice", "realname": "Alice"},
            "openedDate": "2024-05-01 10:00:00",
            "lastEditedDate": null,
            "product": {"id": 1, "name": "Web"},
            "module": 0
        });

        let bug = Bug::from_raw(&raw);
        assert_eq!(bug.id, "42");
        assert_eq!(bug.title, "Crash on save");
        assert_eq!(bug.severity, "2");
        assert_eq!(bug.opened_by, "alice");
        assert_eq!(bug.opened_date, "2024-05-01 10:00:00");
        assert_eq!(bug.last_edited_date, "");
        assert_eq!(bug.product, "Web");
        assert_eq!(bug.module, "0");
    }

    #[test]
    fn test_zero_date_collapses_to_empty() {
        let raw = json!({"id": "3", "openedDate": ZERO_DATE, "lastEditedDate": "0000-00-00"});
        let bug = Bug::from_raw(&raw);
        assert_eq!(bug.opened_date, "");
        assert_eq!(bug.last_edited_date, "");
    }

    #[test]
    fn test_iso_date_is_reformatted() {
        assert_eq!(
            normalize_date("2024-06-01T08:30:00Z"),
            "2024-06-01 08:30:00"
        );
        assert_eq!(
            normalize_date("2024-06-01T08:30:00.123+08:00"),
            "2024-06-01 08:30:00"
        );
        assert_eq!(normalize_date("2024-06-01 08:30:00"), "2024-06-01 08:30:00");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raws = vec![
            json!({
                "id": 1,
                "title": "t",
                "openedDate": ZERO_DATE,
                "lastEditedDate": "2024-07-01T00:00:00Z",
                "product": {"id": 2, "name": "App"},
                "openedBy": {"account": "bob"}
            }),
            json!({"id": "9", "severity": "3", "module": {"name": "Core"}}),
            json!({}),
        ];

        for raw in raws {
            let once = Bug::from_raw(&raw);
            let twice = Bug::from_raw(&serde_json::to_value(&once).unwrap());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_touched_since_opened_before_not_edited() {
        let bug = Bug {
            opened_date: "2024-01-01 00:00:00".to_string(),
            ..Default::default()
        };
        assert!(!bug.touched_since("2024-06-01 00:00:00"));
    }

    #[test]
    fn test_touched_since_edited_after() {
        let bug = Bug {
            opened_date: "2024-01-01 00:00:00".to_string(),
            last_edited_date: "2024-07-01 00:00:00".to_string(),
            ..Default::default()
        };
        assert!(bug.touched_since("2024-06-01 00:00:00"));
    }

    #[test]
    fn test_touched_since_is_inclusive() {
        let bug = Bug {
            opened_date: "2024-06-01 00:00:00".to_string(),
            ..Default::default()
        };
        assert!(bug.touched_since("2024-06-01 00:00:00"));
    }

    #[test]
    fn test_touched_since_without_dates() {
        let bug = Bug::default();
        assert!(!bug.touched_since("2024-06-01 00:00:00"));
    }

    #[test]
    fn test_product_from_raw() {
        let product = Product::from_raw(&json!({"id": 5, "name": "Mobile"})).unwrap();
        assert_eq!(product, Product::new("5", "Mobile"));
        assert!(Product::from_raw(&json!({"name": "no id"})).is_none());
    }
}
