//! Disclosure feed: record model, envelope extraction and HTTP client

pub mod client;
pub mod envelope;
pub mod types;

pub use client::{DateRange, DisclosureSource, FetchFailure, FetchOutcome, KapFeedClient};
pub use types::{Disclosure, DisclosureError, RawDisclosure};
