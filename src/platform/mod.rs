//! Platform adapters.
//!
//! Each supported forge sends push webhooks in its own shape. A [`Platform`]
//! recognizes its deliveries by header, authenticates them, and turns the
//! payload into canonical [`CommitRecord`]s. Parsing never fails: malformed
//! or partial payloads produce fewer records, not errors.

mod common;
mod gitee;
mod github;
mod gitlab;
pub mod signature;

use std::fmt;

use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use crate::types::CommitRecord;

pub use signature::SignatureError;

/// GitLab's and Gitee's push event name.
pub const PUSH_HOOK: &str = "Push Hook";

/// GitLab's and Gitee's tag-push event name.
pub const TAG_PUSH_HOOK: &str = "Tag Push Hook";

/// GitHub's push event name (branch and tag pushes alike).
pub const GITHUB_PUSH: &str = "push";

/// A supported source-hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GitLab,
    Gitee,
    GitHub,
}

/// Detection order. The first platform whose event header is present wins.
pub const DETECTION_ORDER: [Platform; 3] = [Platform::GitLab, Platform::Gitee, Platform::GitHub];

/// The kind of push an event announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Push,
    TagPush,
}

impl Platform {
    /// Returns the platform's lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::GitLab => "gitlab",
            Platform::Gitee => "gitee",
            Platform::GitHub => "github",
        }
    }

    /// Returns the header that carries the event name.
    pub fn event_header(&self) -> &'static str {
        match self {
            Platform::GitLab => "X-Gitlab-Event",
            Platform::Gitee => "X-Gitee-Event",
            Platform::GitHub => "X-GitHub-Event",
        }
    }

    /// Returns the header that authenticates a delivery.
    pub fn secret_header(&self) -> &'static str {
        match self {
            Platform::GitLab => "X-Gitlab-Token",
            Platform::Gitee => "X-Gitee-Token",
            Platform::GitHub => "X-Hub-Signature-256",
        }
    }

    /// Returns true if the headers identify a delivery from this platform.
    pub fn detect(&self, headers: &HeaderMap) -> bool {
        get_header(headers, self.event_header()).is_some()
    }

    /// Returns the event name, verbatim.
    pub fn event_type(&self, headers: &HeaderMap) -> Option<String> {
        get_header(headers, self.event_header()).map(str::to_string)
    }

    /// Classifies an event. Returns `None` for events that carry no commits
    /// of interest.
    pub fn push_event_kind(&self, event_type: &str, payload: &Value) -> Option<PushKind> {
        match self {
            Platform::GitLab | Platform::Gitee => match event_type {
                PUSH_HOOK => Some(PushKind::Push),
                TAG_PUSH_HOOK => Some(PushKind::TagPush),
                _ => None,
            },
            Platform::GitHub => match event_type {
                GITHUB_PUSH if github::is_tag_ref(payload) => Some(PushKind::TagPush),
                GITHUB_PUSH => Some(PushKind::Push),
                _ => None,
            },
        }
    }

    /// Extracts one record per commit of a push event.
    pub fn parse_push_event(&self, payload: &Value) -> Vec<CommitRecord> {
        match self {
            Platform::GitLab => gitlab::parse_push(payload),
            Platform::Gitee => gitee::parse_push(payload),
            Platform::GitHub => github::parse_push(payload),
        }
    }

    /// Extracts records from a tag-push event. Every platform uses the push
    /// wire shape for tag pushes.
    pub fn parse_tag_push_event(&self, payload: &Value) -> Vec<CommitRecord> {
        self.parse_push_event(payload)
    }

    /// Authenticates a delivery against the configured secret.
    ///
    /// An empty `secret` disables verification.
    pub fn verify_secret(
        &self,
        headers: &HeaderMap,
        raw_body: &[u8],
        secret: &str,
    ) -> Result<(), SignatureError> {
        if secret.is_empty() {
            return Ok(());
        }

        let header_name = self.secret_header();
        let provided =
            get_header(headers, header_name).ok_or(SignatureError::MissingHeader(header_name))?;

        let valid = match self {
            Platform::GitLab | Platform::Gitee => signature::tokens_match(provided, secret),
            Platform::GitHub => {
                signature::verify_signature(raw_body, provided, secret.as_bytes())
            }
        };

        if valid {
            Ok(())
        } else {
            Err(SignatureError::Mismatch(header_name))
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the first platform recognizing the headers, if any.
pub fn try_detect_platform(headers: &HeaderMap) -> Option<Platform> {
    DETECTION_ORDER
        .into_iter()
        .find(|platform| platform.detect(headers))
}

/// Returns the first platform recognizing the headers, falling back to
/// GitLab when none does.
pub fn detect_platform(headers: &HeaderMap) -> Platform {
    try_detect_platform(headers).unwrap_or(Platform::GitLab)
}

/// Returns a header's value if present, valid UTF-8 and non-empty.
pub(crate) fn get_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
