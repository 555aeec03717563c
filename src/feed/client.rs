//! KAP disclosure feed client
//!
//! One POST per cycle against the `byCriteria` endpoint, carrying the date
//! range and the tracked issuer allow-list. Every other criteria field is
//! sent empty.
//!
//! ## Failure policy
//!
//! The client never returns an error. Transport failures, non-2xx statuses
//! and unparseable bodies are logged and come back as
//! [`FetchOutcome::Failed`], which callers treat as "nothing new".

use super::envelope::extract_records;
use super::types::RawDisclosure;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Inclusive date range of a feed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn single_day(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    /// Today's date as seen in the exchange timezone
    pub fn today_in(tz: Tz) -> Self {
        Self::single_day(Utc::now().with_timezone(&tz).date_naive())
    }
}

/// Why a fetch produced no data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Could not reach the endpoint (DNS, connect, timeout...)
    Transport(String),
    /// Endpoint answered with a non-success status
    Status { code: u16, body: String },
    /// Body was not JSON
    Malformed(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            FetchFailure::Status { code, .. } => write!(f, "Status Code: {}", code),
            FetchFailure::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(Vec<RawDisclosure>),
    Failed(FetchFailure),
}

/// Source of disclosure records
///
/// Implemented by [`KapFeedClient`] in production and by in-memory fakes in
/// tests.
#[async_trait]
pub trait DisclosureSource: Send + Sync {
    /// Fetch all disclosures in `range` for the `members` allow-list
    ///
    /// Must not fail: problems are reported through [`FetchOutcome::Failed`].
    async fn fetch(&self, range: &DateRange, members: &[String]) -> FetchOutcome;
}

/// `byCriteria` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaPayload<'a> {
    pub from_date: String,
    pub to_date: String,
    pub member_type: &'a str,
    pub mkk_member_oid_list: &'a [String],
    pub inactive_mkk_member_oid_list: Vec<String>,
    pub disclosure_class: &'static str,
    pub subject_list: Vec<String>,
    pub is_late: &'static str,
    pub main_sector: &'static str,
    pub sector: &'static str,
    pub sub_sector: &'static str,
    pub market_oid: &'static str,
    pub index: &'static str,
    pub bdk_review: &'static str,
    pub bdk_member_oid_list: Vec<String>,
    pub year: &'static str,
    pub term: &'static str,
    pub rule_type: &'static str,
    pub period: &'static str,
    pub from_src: bool,
    pub src_category: &'static str,
    pub disclosure_index_list: Vec<String>,
}

impl<'a> CriteriaPayload<'a> {
    pub fn new(range: &DateRange, member_type: &'a str, members: &'a [String]) -> Self {
        Self {
            from_date: range.from.format("%Y-%m-%d").to_string(),
            to_date: range.to.format("%Y-%m-%d").to_string(),
            member_type,
            mkk_member_oid_list: members,
            inactive_mkk_member_oid_list: Vec::new(),
            disclosure_class: "",
            subject_list: Vec::new(),
            is_late: "",
            main_sector: "",
            sector: "",
            sub_sector: "",
            market_oid: "",
            index: "",
            bdk_review: "",
            bdk_member_oid_list: Vec::new(),
            year: "",
            term: "",
            rule_type: "",
            period: "",
            from_src: false,
            src_category: "",
            disclosure_index_list: Vec::new(),
        }
    }
}

/// HTTP client for the KAP disclosure feed
#[derive(Debug, Clone)]
pub struct KapFeedClient {
    client: reqwest::Client,
    url: String,
    member_type: String,
}

impl KapFeedClient {
    /// Create a feed client
    ///
    /// # Arguments
    /// * `url` - `byCriteria` endpoint
    /// * `member_type` - `memberType` criteria value (e.g. `IGS`)
    /// * `timeout` - upper bound for the whole request
    pub fn new(url: &str, member_type: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            member_type: member_type.to_string(),
        })
    }
}

#[async_trait]
impl DisclosureSource for KapFeedClient {
    async fn fetch(&self, range: &DateRange, members: &[String]) -> FetchOutcome {
        let payload = CriteriaPayload::new(range, &self.member_type, members);

        let response = match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("❌ KAP feed request failed: {}", e);
                return FetchOutcome::Failed(FetchFailure::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            log::error!("❌ KAP feed returned {}: {}", status, body);
            return FetchOutcome::Failed(FetchFailure::Status {
                code: status.as_u16(),
                body,
            });
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => {
                let records = extract_records(body);
                log::info!("📥 Fetched {} disclosures ({} → {})", records.len(), range.from, range.to);
                FetchOutcome::Fetched(records)
            }
            Err(e) => {
                log::error!("❌ KAP feed body could not be parsed: {}", e);
                FetchOutcome::Failed(FetchFailure::Malformed(e.to_string()))
            }
        }
    }
}
