//! # kapflow
//!
//! Polls the KAP public disclosure feed, works out which disclosures are new
//! against a persisted record, and pushes them to Telegram chats.
//!
//! ```text
//! KapFeedClient ──raw records──▶ DedupEngine ◀──exists── SqliteRecordStore
//!                                     │                          ▲
//!                           ordered decisions                    │ insert (per item)
//!                                     ▼                          │
//!                                 Notifier ──────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - `config` - immutable runtime configuration from the environment
//! - `feed` - disclosure model, response envelope handling, HTTP client
//! - `store` - processed-disclosure store (SQLite)
//! - `engine` - new-item detection, dedup and business-rule filtering
//! - `notifier` - message formatting and per-destination delivery
//! - `cycle` - one poll-fetch-notify-persist pass
//! - `scheduler` - optional in-process interval loop

pub mod config;
pub mod cycle;
pub mod engine;
pub mod feed;
pub mod notifier;
pub mod scheduler;
pub mod store;

pub use config::KapConfig;
pub use cycle::{CycleError, CycleOrchestrator, CycleReport, CycleSettings};
pub use engine::{DedupEngine, FilterPolicy, SelectionMode};
pub use feed::{Disclosure, DisclosureSource, KapFeedClient};
pub use notifier::{MessageSender, Notifier, TelegramSender};
pub use store::{ProcessedRecord, RecordStore, SqliteRecordStore};
