//! Dedup & filter engine
//!
//! Turns one raw feed response plus the record store into the ordered list
//! of disclosures to act on this cycle.
//!
//! ## Pipeline
//!
//! ```text
//! raw records
//!     ↓ parse (records without an id are dropped with a warning)
//!     ↓ stable sort by publish timestamp (unparseable first)
//!     ↓ collapse repeated ids within the batch
//!     ↓ select candidates (latest-only | full-sweep)
//!     ↓ dedup gate (id already in store → drop)
//!     ↓ staleness gate (full-sweep only)
//!     ↓ alias rewrite + suppression
//! Vec<Decision { disclosure, notify }>
//! ```
//!
//! The engine only reads the store. Writing the record after the notify
//! decision is the cycle's job, one item at a time.

use crate::feed::{Disclosure, RawDisclosure};
use crate::store::{RecordStore, StoreError};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Which sorted items are notification candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Only the chronologically last item of the batch
    LatestOnly,
    /// Every unseen item, oldest first
    FullSweep,
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "latest-only" | "latest" => Ok(SelectionMode::LatestOnly),
            "full-sweep" | "full" => Ok(SelectionMode::FullSweep),
            other => Err(format!(
                "SELECTION_MODE must be latest-only or full-sweep, got '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::LatestOnly => write!(f, "latest-only"),
            SelectionMode::FullSweep => write!(f, "full-sweep"),
        }
    }
}

/// Issuer alias: any raw issuer string containing `token` collapses to `canonical`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerAlias {
    pub token: String,
    pub canonical: String,
}

impl IssuerAlias {
    pub fn new(token: &str, canonical: &str) -> Self {
        Self {
            token: token.to_uppercase(),
            canonical: canonical.to_string(),
        }
    }
}

/// Filtering rules applied by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPolicy {
    pub mode: SelectionMode,

    /// Gap to the next item above which a candidate counts as stale
    pub staleness_gap: chrono::Duration,

    /// Issuers that are recorded but never delivered
    pub suppressed_issuers: Vec<String>,

    /// Alias rewrites, first match wins
    pub issuer_aliases: Vec<IssuerAlias>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            mode: SelectionMode::FullSweep,
            staleness_gap: chrono::Duration::minutes(20),
            suppressed_issuers: vec!["ISMEN".to_string()],
            issuer_aliases: vec![IssuerAlias::new("THYAO", "THYAO")],
        }
    }
}

/// What to do with one disclosure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Disclosure with canonical issuer codes
    pub disclosure: Disclosure,
    /// false: record only (suppressed issuer)
    pub notify: bool,
}

/// Engine output for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Chronological, each id at most once
    pub decisions: Vec<Decision>,
    /// Records without a usable id
    pub dropped: usize,
    /// Candidates whose id was already in the store
    pub already_seen: usize,
    /// Candidates skipped by the staleness gate
    pub skipped_stale: usize,
}

impl Plan {
    pub fn to_notify(&self) -> usize {
        self.decisions.iter().filter(|d| d.notify).count()
    }

    pub fn suppressed(&self) -> usize {
        self.decisions.iter().filter(|d| !d.notify).count()
    }
}

/// Dedup & filter engine
pub struct DedupEngine {
    policy: FilterPolicy,
}

impl DedupEngine {
    pub fn new(policy: FilterPolicy) -> Self {
        Self { policy }
    }

    /// Compute the decisions for one raw batch
    ///
    /// # Returns
    /// * `Ok(Plan)` - ordered decisions plus counters for logging
    /// * `Err(StoreError)` - the store could not be queried; dedup cannot
    ///   be trusted so the cycle must stop
    pub fn plan(&self, raw: &[RawDisclosure], store: &dyn RecordStore) -> Result<Plan, StoreError> {
        let mut plan = Plan::default();

        let mut batch: Vec<Disclosure> = Vec::with_capacity(raw.len());
        for record in raw {
            match Disclosure::from_json(record) {
                Ok(disclosure) => batch.push(disclosure),
                Err(e) => {
                    log::warn!("⚠️  Dropping feed record ({}): {}", e, record);
                    plan.dropped += 1;
                }
            }
        }

        // Stable: equal timestamps keep feed order
        batch.sort_by_key(Disclosure::sort_key);

        let mut seen_ids = HashSet::new();
        batch.retain(|d| seen_ids.insert(d.id.clone()));

        let candidates = match self.policy.mode {
            SelectionMode::LatestOnly => batch.len().saturating_sub(1)..batch.len(),
            SelectionMode::FullSweep => 0..batch.len(),
        };

        for i in candidates {
            let candidate = &batch[i];

            if store.exists(&candidate.id)? {
                log::debug!("Already processed: {}", candidate.id);
                plan.already_seen += 1;
                continue;
            }

            if self.policy.mode == SelectionMode::FullSweep {
                if let Some(next) = batch.get(i + 1) {
                    if self.is_stale(candidate, next) {
                        log::info!(
                            "⏭  {} skipped as stale ({} → next at {})",
                            candidate.id,
                            candidate.publish_date,
                            next.publish_date
                        );
                        plan.skipped_stale += 1;
                        continue;
                    }
                }
            }

            let notify = !is_suppressed(candidate, &self.policy.suppressed_issuers);
            if !notify {
                log::info!("⏭  {} ({}) suppressed, recording only", candidate.id, candidate.issuer_codes);
            }

            let mut disclosure = candidate.clone();
            disclosure.issuer_codes = canonical_issuers(candidate, &self.policy.issuer_aliases);

            plan.decisions.push(Decision { disclosure, notify });
        }

        Ok(plan)
    }

    /// Gap to the next item exceeds the threshold
    ///
    /// Only applies when both timestamps parsed; an unparseable timestamp
    /// never makes an item stale.
    fn is_stale(&self, candidate: &Disclosure, next: &Disclosure) -> bool {
        match (candidate.published_at, next.published_at) {
            (Some(current), Some(following)) => following - current > self.policy.staleness_gap,
            _ => false,
        }
    }
}

/// Issuer codes after alias rewriting
///
/// The alias token is searched in the raw issuer field (substring,
/// case-insensitive): `"THYAO.E; XYZ"` with alias `THYAO → THYAO` becomes
/// `"THYAO"`. Without a match the normalized codes are kept.
pub fn canonical_issuers(disclosure: &Disclosure, aliases: &[IssuerAlias]) -> String {
    let upper = disclosure.raw_issuers.to_uppercase();
    aliases
        .iter()
        .find(|alias| upper.contains(&alias.token))
        .map(|alias| alias.canonical.clone())
        .unwrap_or_else(|| disclosure.issuer_codes.clone())
}

/// True when any issuer code equals a suppressed token (case-insensitive)
pub fn is_suppressed(disclosure: &Disclosure, suppressed: &[String]) -> bool {
    disclosure
        .issuers()
        .any(|code| suppressed.iter().any(|token| token.eq_ignore_ascii_case(code)))
}
