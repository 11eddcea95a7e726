//! GitLab push and tag-push payloads.

use serde::Deserialize;
use serde_json::Value;

use super::common::{
    CommitList, CommitRules, Lenient, PushMeta, branch_from_ref, build_records,
};
use crate::types::{CommitRecord, ProjectInfo, PushInfo, RepositoryInfo};

/// GitLab commit entries carry `id` only and RFC 3339 timestamps.
const RULES: CommitRules = CommitRules {
    sha_fallback: false,
    time_layouts: &[],
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    id: Lenient<i64>,
    name: Lenient<String>,
    path_with_namespace: Lenient<String>,
    description: Lenient<String>,
    web_url: Lenient<String>,
    namespace: Lenient<String>,
    visibility_level: Lenient<i64>,
    default_branch: Lenient<String>,
    git_ssh_url: Lenient<String>,
    git_http_url: Lenient<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRepository {
    name: Lenient<String>,
    url: Lenient<String>,
    description: Lenient<String>,
    homepage: Lenient<String>,
    git_ssh_url: Lenient<String>,
    git_http_url: Lenient<String>,
    visibility_level: Lenient<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPush {
    #[serde(rename = "ref")]
    git_ref: Lenient<String>,
    ref_protected: Lenient<bool>,
    before: Lenient<String>,
    after: Lenient<String>,
    checkout_sha: Lenient<String>,
    message: Lenient<String>,
    total_commits_count: Lenient<i64>,
    user_id: Lenient<i64>,
    user_name: Lenient<String>,
    user_username: Lenient<String>,
    user_email: Lenient<String>,
    project: Lenient<RawProject>,
    repository: Lenient<RawRepository>,
    commits: CommitList,
}

pub(super) fn parse_push(payload: &Value) -> Vec<CommitRecord> {
    let raw = RawPush::deserialize(payload).unwrap_or_default();
    if raw.commits.entries.is_empty() {
        return Vec::new();
    }

    let project = raw.project.into_inner().unwrap_or_default();
    let repository = raw.repository.into_inner().unwrap_or_default();

    let meta = PushMeta {
        project_id: project.id.into_inner(),
        branch: branch_from_ref(&raw.git_ref.or_empty()),
        ref_protected: raw.ref_protected.into_inner(),
        project: ProjectInfo {
            name: project.name.or_empty(),
            path: project.path_with_namespace.or_empty(),
            description: project.description.or_empty(),
            web_url: project.web_url.or_empty(),
            namespace: project.namespace.or_empty(),
            visibility_level: project.visibility_level.into_inner(),
            default_branch: project.default_branch.or_empty(),
            git_ssh_url: project.git_ssh_url.or_empty(),
            git_http_url: project.git_http_url.or_empty(),
        },
        repository: RepositoryInfo {
            name: repository.name.or_empty(),
            url: repository.url.or_empty(),
            description: repository.description.or_empty(),
            homepage: repository.homepage.or_empty(),
            git_ssh_url: repository.git_ssh_url.or_empty(),
            git_http_url: repository.git_http_url.or_empty(),
            visibility_level: repository.visibility_level.into_inner(),
        },
        push: PushInfo {
            before_sha: raw.before.or_empty(),
            after_sha: raw.after.or_empty(),
            checkout_sha: raw.checkout_sha.or_empty(),
            message: raw.message.or_empty(),
            total_commits_count: raw.total_commits_count.into_inner().unwrap_or(0),
            user_id: raw.user_id.into_inner(),
            user_name: raw.user_name.or_empty(),
            user_username: raw.user_username.or_empty(),
            user_email: raw.user_email.or_empty(),
        },
    };

    build_records(&meta, raw.commits.entries, RULES)
}
