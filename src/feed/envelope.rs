//! Locating the record list inside a feed response
//!
//! The feed does not commit to a response shape. Each [`Envelope`] strategy
//! knows one shape; they are tried in [`Envelope::PRIORITY`] order and the
//! first match wins.

use super::types::RawDisclosure;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Body is the list itself
    BareList,
    /// `{"data": [...]}`
    DataField,
    /// `{"items": [...]}`
    ItemsField,
    /// First list-valued field of the object, in document order
    FirstListField,
}

impl Envelope {
    pub const PRIORITY: [Envelope; 4] = [
        Envelope::BareList,
        Envelope::DataField,
        Envelope::ItemsField,
        Envelope::FirstListField,
    ];

    /// Try this strategy against a response body
    pub fn locate<'a>(&self, body: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            Envelope::BareList => body.as_array(),
            Envelope::DataField => body.get("data").and_then(Value::as_array),
            Envelope::ItemsField => body.get("items").and_then(Value::as_array),
            Envelope::FirstListField => body.as_object()?.values().find_map(Value::as_array),
        }
    }
}

/// Extract feed records from a response body
///
/// Returns an empty list when no strategy matches.
pub fn extract_records(body: Value) -> Vec<RawDisclosure> {
    for envelope in Envelope::PRIORITY {
        if let Some(records) = envelope.locate(&body) {
            log::debug!("Feed envelope matched {:?} ({} records)", envelope, records.len());
            return records.clone();
        }
    }

    log::warn!("⚠️  No record list found in feed response");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(records: &[RawDisclosure]) -> Vec<i64> {
        records.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn test_bare_list() {
        let body = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(ids(&extract_records(body)), vec![1, 2]);
    }

    #[test]
    fn test_data_field_beats_items() {
        let body = json!({"items": [{"id": 9}], "data": [{"id": 1}]});
        assert_eq!(ids(&extract_records(body)), vec![1]);
    }

    #[test]
    fn test_items_field() {
        let body = json!({"total": 1, "items": [{"id": 3}]});
        assert_eq!(ids(&extract_records(body)), vec![3]);
    }

    #[test]
    fn test_data_field_not_a_list_falls_through() {
        let body = json!({"data": {"nested": true}, "items": [{"id": 4}]});
        assert_eq!(ids(&extract_records(body)), vec![4]);
    }

    #[test]
    fn test_first_list_field_in_document_order() {
        let body = json!({"meta": {"page": 1}, "zeta": [{"id": 5}], "alpha": [{"id": 6}]});
        assert_eq!(ids(&extract_records(body)), vec![5]);
    }

    #[test]
    fn test_no_list_anywhere() {
        assert!(extract_records(json!({"status": "ok"})).is_empty());
        assert!(extract_records(json!("nothing")).is_empty());
        assert!(extract_records(Value::Null).is_empty());
    }
}
