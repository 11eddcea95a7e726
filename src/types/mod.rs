//! Core domain types shared by the adapters, the aggregator and the store.

pub mod record;

pub use record::{
    ChangeKind, CommitRecord, FileStat, MAX_TITLE_CHARS, ProjectInfo, PushInfo, RepositoryInfo,
    UNKNOWN_IDENTITY, derive_title,
};
