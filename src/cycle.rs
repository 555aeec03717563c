//! Cycle orchestrator
//!
//! One cycle = one linear pass:
//!
//! ```text
//! ensure store initialized
//!     ↓
//! fetch (today, tracked issuers)
//!     ↓ failed → optional failure notice, stop (nothing persisted)
//!     ↓ empty  → stop
//! DedupEngine::plan
//!     ↓
//! for each decision, in order:
//!     notify (if notify=true) → insert record immediately
//! ```
//!
//! Records are inserted one at a time right after their notify decision, so
//! a crash mid-cycle loses at most the items not reached yet (worst case a
//! duplicate notification on restart, never a flood).
//!
//! Only store failures abort the cycle; everything else degrades to
//! "nothing delivered" and is visible in the logs and the [`CycleReport`].

use crate::engine::DedupEngine;
use crate::feed::{DateRange, DisclosureSource, FetchOutcome};
use crate::notifier::{fetch_failure_message, format_disclosure, Notifier};
use crate::store::{ProcessedRecord, RecordStore, StoreError};
use chrono_tz::Tz;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("record store failure: {0}")]
    Store(#[from] StoreError),
}

/// Summary of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub dropped: usize,
    pub already_seen: usize,
    pub skipped_stale: usize,
    pub notified: usize,
    pub suppressed: usize,
    /// Individual destination sends that failed
    pub failed_sends: usize,
    /// Set when the feed could not be read
    pub fetch_failure: Option<String>,
}

impl CycleReport {
    pub fn log(&self) {
        if let Some(reason) = &self.fetch_failure {
            log::warn!("⚠️  Cycle ended early, feed unavailable: {}", reason);
            return;
        }
        log::info!("✅ Cycle complete");
        log::info!("   ├─ Fetched: {}", self.fetched);
        log::info!("   ├─ Notified: {}", self.notified);
        log::info!("   ├─ Suppressed: {}", self.suppressed);
        log::info!("   ├─ Already processed: {}", self.already_seen);
        log::info!("   ├─ Skipped stale: {}", self.skipped_stale);
        log::info!("   ├─ Dropped (no id): {}", self.dropped);
        log::info!("   └─ Failed sends: {}", self.failed_sends);
    }
}

/// Settings the orchestrator needs beyond its collaborators
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub tracked_members: Vec<String>,
    pub timezone: Tz,
    pub link_base: String,
    pub notify_on_fetch_failure: bool,
}

/// Ties feed, engine, notifier and store together
pub struct CycleOrchestrator {
    source: Arc<dyn DisclosureSource>,
    store: Arc<dyn RecordStore>,
    engine: DedupEngine,
    notifier: Notifier,
    settings: CycleSettings,
}

impl CycleOrchestrator {
    pub fn new(
        source: Arc<dyn DisclosureSource>,
        store: Arc<dyn RecordStore>,
        engine: DedupEngine,
        notifier: Notifier,
        settings: CycleSettings,
    ) -> Self {
        Self {
            source,
            store,
            engine,
            notifier,
            settings,
        }
    }

    /// Run one cycle for today's date in the exchange timezone
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        self.run_cycle_for(DateRange::today_in(self.settings.timezone)).await
    }

    /// Run one cycle for an explicit date range
    pub async fn run_cycle_for(&self, range: DateRange) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        self.store.initialize()?;

        let raw = match self.source.fetch(&range, &self.settings.tracked_members).await {
            FetchOutcome::Fetched(records) => records,
            FetchOutcome::Failed(failure) => {
                let reason = failure.to_string();
                if self.settings.notify_on_fetch_failure {
                    let reports = self.notifier.notify(&fetch_failure_message(&reason)).await;
                    report.failed_sends += reports.iter().filter(|r| !r.is_delivered()).count();
                }
                report.fetch_failure = Some(reason);
                return Ok(report);
            }
        };

        report.fetched = raw.len();
        if raw.is_empty() {
            log::info!("📭 No disclosures for {}", range.from);
            return Ok(report);
        }

        let plan = self.engine.plan(&raw, self.store.as_ref())?;
        report.dropped = plan.dropped;
        report.already_seen = plan.already_seen;
        report.skipped_stale = plan.skipped_stale;

        if plan.decisions.is_empty() {
            log::info!("📭 No new disclosures");
        }

        for decision in plan.decisions {
            let disclosure = &decision.disclosure;

            if decision.notify {
                let text = format_disclosure(disclosure, &self.settings.link_base);
                let reports = self.notifier.notify(&text).await;
                report.failed_sends += reports.iter().filter(|r| !r.is_delivered()).count();
                report.notified += 1;
            } else {
                report.suppressed += 1;
            }

            let record = ProcessedRecord::from_disclosure(disclosure, decision.notify);
            if self.store.insert(&record)? {
                log::info!("💾 Recorded {} ({})", disclosure.id, disclosure.issuer_codes);
            } else {
                log::debug!("{} was already recorded", disclosure.id);
            }
        }

        Ok(report)
    }
}
