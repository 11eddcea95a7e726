//! commit-ledger - records commit statistics from GitLab, Gitee and GitHub push webhooks.
//!
//! Deliveries are authenticated and parsed per platform into canonical
//! commit records, then persisted by a bounded worker pool together with
//! per-file and per-language line counts.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod ingest;
pub mod platform;
pub mod pool;
pub mod server;
pub mod store;
pub mod types;
