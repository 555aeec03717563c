//! Disclosure records as they come off the feed
//!
//! The upstream schema is loose: the same slot shows up under several field
//! names and issuer codes arrive either as a list or as one delimited string.
//! [`Disclosure::from_json`] folds all of that into one shape.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

/// Textual format of `publishDate` (e.g. `01.01.2025 10:00:00`)
pub const PUBLISH_DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// One record from the feed, before any validation
pub type RawDisclosure = Value;

const ID_FIELDS: &[&str] = &["disclosureIndex", "id"];
const PUBLISH_DATE_FIELDS: &[&str] = &["publishDate", "publish_date"];
const ISSUER_FIELDS: &[&str] = &["stockCodes", "relatedStocks", "stock"];
const TITLE_FIELDS: &[&str] = &["title", "summary", "subject"];
const BODY_FIELDS: &[&str] = &["summary", "subject"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisclosureError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no disclosure id")]
    MissingId,
}

/// A disclosure normalized from the feed
///
/// Lives only for the duration of one cycle; what survives is the
/// `ProcessedRecord` written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disclosure {
    /// Stable dedup key
    pub id: String,

    /// Publish timestamp exactly as published (kept for display and storage)
    pub publish_date: String,

    /// Parsed publish timestamp; `None` when the text did not parse
    pub published_at: Option<NaiveDateTime>,

    /// Issuer codes, comma-joined without spaces
    pub issuer_codes: String,

    /// Issuer field as published, before trimming and delimiter cleanup
    pub raw_issuers: String,

    pub title: String,
    pub body: String,
}

impl Disclosure {
    /// Create a disclosure with empty title and body
    ///
    /// `publish_date` is parsed with [`PUBLISH_DATE_FORMAT`]; a bad value is
    /// kept verbatim and `published_at` is left empty.
    pub fn new(id: impl Into<String>, publish_date: impl Into<String>, issuer_codes: &str) -> Self {
        let publish_date = publish_date.into();
        Self {
            id: id.into(),
            published_at: parse_publish_date(&publish_date),
            publish_date,
            issuer_codes: join_codes(issuer_codes.split([',', ';'])),
            raw_issuers: issuer_codes.to_string(),
            title: String::new(),
            body: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Build a disclosure from one feed record
    ///
    /// Field fallback chains:
    /// - id: `disclosureIndex` → `id` (string or number)
    /// - timestamp: `publishDate` → `publish_date`
    /// - issuers: `stockCodes` → `relatedStocks` → `stock` (list or delimited string)
    /// - title: `title` → `summary` → `subject`
    /// - body: `summary` → `subject`
    ///
    /// # Returns
    /// * `Err(MissingId)` - no usable id; the record cannot be deduplicated
    /// * `Err(NotAnObject)` - record is not a JSON object
    pub fn from_json(raw: &RawDisclosure) -> Result<Self, DisclosureError> {
        let obj = raw.as_object().ok_or(DisclosureError::NotAnObject)?;

        let id = first_text(obj, ID_FIELDS).ok_or(DisclosureError::MissingId)?;
        let publish_date = first_text(obj, PUBLISH_DATE_FIELDS).unwrap_or_default();

        let (raw_issuers, issuer_codes) = ISSUER_FIELDS
            .iter()
            .filter_map(|field| obj.get(*field))
            .map(|value| (raw_issuer_text(value), issuer_codes_from_value(value)))
            .find(|(_, codes)| !codes.is_empty())
            .unwrap_or_default();

        Ok(Self {
            id,
            published_at: parse_publish_date(&publish_date),
            publish_date,
            issuer_codes,
            raw_issuers,
            title: first_text(obj, TITLE_FIELDS).unwrap_or_default(),
            body: first_text(obj, BODY_FIELDS).unwrap_or_default(),
        })
    }

    /// Ordering key: unparseable timestamps sort before everything else
    pub fn sort_key(&self) -> NaiveDateTime {
        self.published_at.unwrap_or(NaiveDateTime::MIN)
    }

    /// Individual issuer codes
    pub fn issuers(&self) -> impl Iterator<Item = &str> {
        self.issuer_codes.split(',').filter(|code| !code.is_empty())
    }
}

pub fn parse_publish_date(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), PUBLISH_DATE_FORMAT).ok()
}

/// First non-empty string (or number) among `fields`
fn first_text(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match obj.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn issuer_codes_from_value(value: &Value) -> String {
    match value {
        Value::Array(items) => join_codes(items.iter().filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })),
        Value::String(s) => join_codes(s.split([',', ';'])),
        _ => String::new(),
    }
}

/// Issuer field text without normalization; list items are joined with `,`
fn raw_issuer_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn join_codes<'a>(codes: impl Iterator<Item = &'a str>) -> String {
    codes
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_fields() {
        let raw = json!({
            "disclosureIndex": 1234567,
            "publishDate": "01.01.2025 10:00:00",
            "stockCodes": "THYAO, PGSUS",
            "title": "Özel Durum Açıklaması",
            "summary": "Yeni uçak siparişi",
        });

        let d = Disclosure::from_json(&raw).unwrap();
        assert_eq!(d.id, "1234567");
        assert_eq!(d.publish_date, "01.01.2025 10:00:00");
        assert_eq!(
            d.published_at,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|day| day.and_hms_opt(10, 0, 0))
        );
        assert_eq!(d.issuer_codes, "THYAO,PGSUS");
        assert_eq!(d.raw_issuers, "THYAO, PGSUS");
        assert_eq!(d.title, "Özel Durum Açıklaması");
        assert_eq!(d.body, "Yeni uçak siparişi");
        assert_eq!(d.issuers().collect::<Vec<_>>(), vec!["THYAO", "PGSUS"]);
    }

    #[test]
    fn test_fallback_fields() {
        let raw = json!({
            "id": " abc-1 ",
            "publish_date": "02.01.2025 09:30:00",
            "relatedStocks": ["ASELS", " ", "GARAN"],
            "summary": "Finansal rapor",
            "subject": "Genel",
        });

        let d = Disclosure::from_json(&raw).unwrap();
        assert_eq!(d.id, "abc-1");
        assert!(d.published_at.is_some());
        assert_eq!(d.issuer_codes, "ASELS,GARAN");
        assert_eq!(d.raw_issuers, "ASELS, ,GARAN");
        // No title: falls back to summary, body takes summary too
        assert_eq!(d.title, "Finansal rapor");
        assert_eq!(d.body, "Finansal rapor");
    }

    #[test]
    fn test_empty_primary_field_falls_through() {
        let raw = json!({
            "disclosureIndex": "",
            "id": "X9",
            "stockCodes": "",
            "stock": "ISMEN",
            "title": "",
            "subject": "Konu",
        });

        let d = Disclosure::from_json(&raw).unwrap();
        assert_eq!(d.id, "X9");
        assert_eq!(d.issuer_codes, "ISMEN");
        assert_eq!(d.title, "Konu");
        assert_eq!(d.body, "Konu");
    }

    #[test]
    fn test_missing_id_rejected() {
        let raw = json!({"publishDate": "01.01.2025 10:00:00", "stockCodes": "ABC"});
        assert_eq!(Disclosure::from_json(&raw), Err(DisclosureError::MissingId));

        let blank = json!({"disclosureIndex": "   "});
        assert_eq!(Disclosure::from_json(&blank), Err(DisclosureError::MissingId));

        assert_eq!(Disclosure::from_json(&json!("A")), Err(DisclosureError::NotAnObject));
    }

    #[test]
    fn test_unparseable_timestamp_sorts_first() {
        let bad = Disclosure::new("A", "yesterday-ish", "ABC");
        let good = Disclosure::new("B", "01.01.2025 10:00:00", "ABC");

        assert!(bad.published_at.is_none());
        assert_eq!(bad.publish_date, "yesterday-ish");
        assert!(bad.sort_key() < good.sort_key());
    }

    #[test]
    fn test_absent_text_defaults_to_empty() {
        let d = Disclosure::from_json(&json!({"id": "1"})).unwrap();
        assert_eq!(d.title, "");
        assert_eq!(d.body, "");
        assert_eq!(d.issuer_codes, "");
        assert_eq!(d.issuers().count(), 0);
    }
}
