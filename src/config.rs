//! Runtime configuration from environment variables
//!
//! Everything is read once at process start into an immutable [`KapConfig`]
//! that is then handed to each component. Parsing goes through a lookup
//! function so tests can feed a map instead of touching the process env.

use crate::engine::{FilterPolicy, IssuerAlias, SelectionMode};
use chrono_tz::Tz;
use std::env;
use std::time::Duration;

pub const DEFAULT_FEED_URL: &str = "https://www.kap.org.tr/tr/api/disclosure/members/byCriteria";
pub const DEFAULT_LINK_BASE: &str = "https://www.kap.org.tr/tr/Bildirim";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const DEFAULT_DB_PATH: &str = "kap_records.db";

/// Minutes between consecutive disclosures before the earlier one is stale
pub const DEFAULT_STALENESS_GAP_MINUTES: u32 = 20;

/// Issuer OIDs tracked when `KAP_TRACKED_MEMBERS` is not set
pub const DEFAULT_TRACKED_MEMBERS: &[&str] = &[
    "4028e4a140f2ed720140f3790d6a01ad",
    "4028e4a140f2ed71014106890fae0138",
    "4028e4a140f2ed710140f328bed700a5",
    "4028e4a240e8d16e0140e951bf04007b",
    "8acae2c57d3bf002017e016f30e442c6",
    "4028e4a240f2ef470141175e189f0453",
    "4028e4a140f2ed720140f37f139c01bc",
    "4028e4a2422d9a78014232e751bc22a4",
    "4028e4a140f2ed720140f376bebb01a7",
    "4028e4a240f2ef4701413a5c97b805ea",
    "4028e4a140ee84900140f1f1584c0015",
    "4028e4a140f275530140f277aa100008",
    "8acae2c562329bd10164405fe6c17996",
    "4028e4a1415f4d9b0141603cd3904103",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Configuration for the disclosure notifier
#[derive(Debug, Clone)]
pub struct KapConfig {
    /// Bot credential for the push channel
    pub telegram_token: String,

    /// Bot API base URL (overridable for self-hosted bot API servers)
    pub telegram_api_base: String,

    /// Destination chat ids; empty means notifications are skipped
    pub chat_ids: Vec<String>,

    /// Path to the SQLite file holding processed disclosures
    pub db_path: String,

    /// Disclosure feed endpoint
    pub feed_url: String,

    /// Base URL for disclosure deep links (`<link_base>/<id>`)
    pub link_base: String,

    /// `memberType` criteria field of the feed query
    pub member_type: String,

    /// Issuer allow-list sent with each feed query
    pub tracked_members: Vec<String>,

    /// Exchange timezone used to decide what "today" is
    pub timezone: Tz,

    /// Suppression, alias and selection rules for the engine
    pub filter: FilterPolicy,

    pub feed_timeout: Duration,
    pub send_timeout: Duration,

    /// Broadcast a notice to every destination when the feed fails
    pub notify_on_fetch_failure: bool,

    /// When set, the binary loops with this interval instead of running once
    pub poll_interval: Option<Duration>,
}

impl KapConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `TELEGRAM_TOKEN` (required)
    /// - `TELEGRAM_CHAT_IDS` (comma-separated, plus legacy `TELEGRAM_CHAT_ID1`/`2`)
    /// - `KAP_DB_PATH` (default: kap_records.db)
    /// - `KAP_FEED_URL`, `KAP_LINK_BASE`, `TELEGRAM_API_BASE`
    /// - `KAP_MEMBER_TYPE` (default: IGS), `KAP_TRACKED_MEMBERS` (comma-separated OIDs)
    /// - `KAP_TIMEZONE` (default: Europe/Istanbul)
    /// - `SUPPRESSED_ISSUERS` (default: ISMEN)
    /// - `ISSUER_ALIASES` (default: THYAO=THYAO)
    /// - `STALENESS_GAP_MINUTES` (default: 20)
    /// - `SELECTION_MODE` (latest-only | full-sweep, default: full-sweep)
    /// - `FEED_TIMEOUT_SECS` (default: 30), `SEND_TIMEOUT_SECS` (default: 15)
    /// - `NOTIFY_ON_FETCH_FAILURE` (default: false)
    /// - `POLL_INTERVAL_SECS` (default: unset, single cycle)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_token = get("TELEGRAM_TOKEN")
            .ok_or_else(|| ConfigError::MissingVariable("TELEGRAM_TOKEN".to_string()))?;

        let mut chat_ids = get("TELEGRAM_CHAT_IDS")
            .map(|s| split_list(&s))
            .unwrap_or_default();
        for legacy in ["TELEGRAM_CHAT_ID1", "TELEGRAM_CHAT_ID2"] {
            if let Some(id) = get(legacy) {
                if !chat_ids.contains(&id) {
                    chat_ids.push(id);
                }
            }
        }

        let feed_url = get("KAP_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        let telegram_api_base =
            get("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string());
        for (name, url) in [("KAP_FEED_URL", &feed_url), ("TELEGRAM_API_BASE", &telegram_api_base)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        let link_base = get("KAP_LINK_BASE")
            .unwrap_or_else(|| DEFAULT_LINK_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let tracked_members = get("KAP_TRACKED_MEMBERS")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| DEFAULT_TRACKED_MEMBERS.iter().map(|s| s.to_string()).collect());

        let tz_name = get("KAP_TIMEZONE").unwrap_or_else(|| "Europe/Istanbul".to_string());
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("unknown KAP_TIMEZONE '{}'", tz_name)))?;

        let selection_mode = match get("SELECTION_MODE") {
            Some(raw) => raw.parse::<SelectionMode>().map_err(ConfigError::InvalidValue)?,
            None => SelectionMode::FullSweep,
        };

        let suppressed_issuers = get("SUPPRESSED_ISSUERS")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| vec!["ISMEN".to_string()]);

        let issuer_aliases = match get("ISSUER_ALIASES") {
            Some(raw) => parse_aliases(&raw)?,
            None => vec![IssuerAlias::new("THYAO", "THYAO")],
        };

        // Unsigned: a negative gap would mark every item stale
        let staleness_gap_minutes = parse_or(
            "STALENESS_GAP_MINUTES",
            get("STALENESS_GAP_MINUTES"),
            DEFAULT_STALENESS_GAP_MINUTES,
        );
        let staleness_gap = chrono::Duration::try_minutes(i64::from(staleness_gap_minutes))
            .unwrap_or_else(|| chrono::Duration::minutes(i64::from(DEFAULT_STALENESS_GAP_MINUTES)));

        let filter = FilterPolicy {
            mode: selection_mode,
            staleness_gap,
            suppressed_issuers,
            issuer_aliases,
        };

        let poll_interval = match parse_or("POLL_INTERVAL_SECS", get("POLL_INTERVAL_SECS"), 0u64) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            telegram_token,
            telegram_api_base: telegram_api_base.trim_end_matches('/').to_string(),
            chat_ids,
            db_path: get("KAP_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            feed_url,
            link_base,
            member_type: get("KAP_MEMBER_TYPE").unwrap_or_else(|| "IGS".to_string()),
            tracked_members,
            timezone,
            filter,
            feed_timeout: Duration::from_secs(parse_or("FEED_TIMEOUT_SECS", get("FEED_TIMEOUT_SECS"), 30)),
            send_timeout: Duration::from_secs(parse_or("SEND_TIMEOUT_SECS", get("SEND_TIMEOUT_SECS"), 15)),
            notify_on_fetch_failure: parse_or(
                "NOTIFY_ON_FETCH_FAILURE",
                get("NOTIFY_ON_FETCH_FAILURE").map(|s| s.to_lowercase()),
                false,
            ),
            poll_interval,
        })
    }

    /// Token with everything but the bot id masked, safe for logs
    pub fn masked_token(&self) -> String {
        match self.telegram_token.split_once(':') {
            Some((bot_id, _)) => format!("{}:****", bot_id),
            None => "****".to_string(),
        }
    }

    /// Log the effective configuration (startup banner)
    pub fn log_summary(&self) {
        log::info!("📊 Configuration:");
        log::info!("   ├─ Database: {}", self.db_path);
        log::info!("   ├─ Feed: {}", self.feed_url);
        log::info!("   ├─ Tracked issuers: {}", self.tracked_members.len());
        log::info!("   ├─ Timezone: {}", self.timezone.name());
        log::info!("   ├─ Bot token: {}", self.masked_token());
        log::info!("   ├─ Destinations: {}", self.chat_ids.len());
        log::info!("   ├─ Selection mode: {}", self.filter.mode);
        log::info!("   ├─ Staleness gap: {}m", self.filter.staleness_gap.num_minutes());
        log::info!("   ├─ Suppressed issuers: {:?}", self.filter.suppressed_issuers);
        log::info!("   ├─ Aliases: {}", self.filter.issuer_aliases.len());
        match self.poll_interval {
            Some(interval) => log::info!("   └─ Poll interval: {}s", interval.as_secs()),
            None => log::info!("   └─ Poll interval: single cycle"),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `TOKEN=CANONICAL[,TOKEN=CANONICAL...]`
fn parse_aliases(raw: &str) -> Result<Vec<IssuerAlias>, ConfigError> {
    split_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((token, canonical)) if !token.trim().is_empty() && !canonical.trim().is_empty() => {
                Ok(IssuerAlias::new(token.trim(), canonical.trim()))
            }
            _ => Err(ConfigError::InvalidValue(format!(
                "ISSUER_ALIASES entry '{}' must look like TOKEN=CANONICAL",
                pair
            ))),
        })
        .collect()
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("Invalid {} '{}', defaulting to {}", name, value, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<KapConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        KapConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[("TELEGRAM_TOKEN", "123:abc")]).unwrap();

        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.link_base, DEFAULT_LINK_BASE);
        assert!(config.chat_ids.is_empty());
        assert_eq!(config.tracked_members.len(), DEFAULT_TRACKED_MEMBERS.len());
        assert_eq!(config.timezone, chrono_tz::Europe::Istanbul);
        assert_eq!(config.filter.mode, SelectionMode::FullSweep);
        assert_eq!(config.filter.staleness_gap, chrono::Duration::minutes(20));
        assert_eq!(config.filter.suppressed_issuers, vec!["ISMEN".to_string()]);
        assert_eq!(config.filter.issuer_aliases, vec![IssuerAlias::new("THYAO", "THYAO")]);
        assert_eq!(config.feed_timeout, Duration::from_secs(30));
        assert_eq!(config.send_timeout, Duration::from_secs(15));
        assert!(!config.notify_on_fetch_failure);
        assert!(config.poll_interval.is_none());
    }

    #[test]
    fn test_missing_token() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(ref v) if v == "TELEGRAM_TOKEN"));
    }

    #[test]
    fn test_custom_config() {
        let config = load(&[
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_IDS", "111, 222,,"),
            ("TELEGRAM_CHAT_ID1", "222"),
            ("TELEGRAM_CHAT_ID2", "333"),
            ("KAP_DB_PATH", "/tmp/test.db"),
            ("KAP_LINK_BASE", "https://example.org/d/"),
            ("SELECTION_MODE", "latest-only"),
            ("STALENESS_GAP_MINUTES", "45"),
            ("SUPPRESSED_ISSUERS", "ISMEN,GARAN"),
            ("ISSUER_ALIASES", "THYAO=THYAO, PGSUS.E=PGSUS"),
            ("NOTIFY_ON_FETCH_FAILURE", "TRUE"),
            ("POLL_INTERVAL_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(config.chat_ids, vec!["111", "222", "333"]);
        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.link_base, "https://example.org/d");
        assert_eq!(config.filter.mode, SelectionMode::LatestOnly);
        assert_eq!(config.filter.staleness_gap, chrono::Duration::minutes(45));
        assert_eq!(config.filter.suppressed_issuers, vec!["ISMEN", "GARAN"]);
        assert_eq!(config.filter.issuer_aliases[1], IssuerAlias::new("PGSUS.E", "PGSUS"));
        assert!(config.notify_on_fetch_failure);
        assert_eq!(config.poll_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("TELEGRAM_TOKEN", "t"), ("SELECTION_MODE", "sometimes")]).is_err());
        assert!(load(&[("TELEGRAM_TOKEN", "t"), ("ISSUER_ALIASES", "THYAO")]).is_err());
        assert!(load(&[("TELEGRAM_TOKEN", "t"), ("KAP_TIMEZONE", "Mars/Olympus")]).is_err());
        assert!(load(&[("TELEGRAM_TOKEN", "t"), ("KAP_FEED_URL", "ftp://nope")]).is_err());

        // Unparseable numbers fall back to defaults
        let config = load(&[("TELEGRAM_TOKEN", "t"), ("STALENESS_GAP_MINUTES", "soon")]).unwrap();
        assert_eq!(config.filter.staleness_gap, chrono::Duration::minutes(20));
    }

    #[test]
    fn test_staleness_gap_out_of_range_falls_back() {
        for raw in ["-5", "9223372036854775807", "99999999999"] {
            let config = load(&[("TELEGRAM_TOKEN", "t"), ("STALENESS_GAP_MINUTES", raw)]).unwrap();
            assert_eq!(config.filter.staleness_gap, chrono::Duration::minutes(20), "value {}", raw);
        }

        let zero = load(&[("TELEGRAM_TOKEN", "t"), ("STALENESS_GAP_MINUTES", "0")]).unwrap();
        assert_eq!(zero.filter.staleness_gap, chrono::Duration::zero());
    }

    #[test]
    fn test_masked_token() {
        let config = load(&[("TELEGRAM_TOKEN", "8153:SECRET")]).unwrap();
        assert_eq!(config.masked_token(), "8153:****");
    }
}
