//! Gitee push and tag-push payloads.
//!
//! Gitee reports repository details only under `project`; the repository
//! block of each record mirrors it.

use serde::Deserialize;
use serde_json::Value;

use super::common::{
    CommitList, CommitRules, Lenient, PushMeta, RawPerson, branch_from_ref, build_records,
    visibility_from_public,
};
use crate::types::{CommitRecord, ProjectInfo, PushInfo, RepositoryInfo};

const RULES: CommitRules = CommitRules {
    sha_fallback: true,
    time_layouts: &["%Y-%m-%d %H:%M:%S"],
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    id: Lenient<i64>,
    name: Lenient<String>,
    path_with_namespace: Lenient<String>,
    full_name: Lenient<String>,
    description: Lenient<String>,
    html_url: Lenient<String>,
    url: Lenient<String>,
    namespace: Lenient<String>,
    owner: Lenient<RawPerson>,
    public: Lenient<bool>,
    default_branch: Lenient<String>,
    ssh_url: Lenient<String>,
    clone_url: Lenient<String>,
    git_http_url: Lenient<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPush {
    #[serde(rename = "ref")]
    git_ref: Lenient<String>,
    before: Lenient<String>,
    after: Lenient<String>,
    total_commits_count: Lenient<i64>,
    pusher: Lenient<RawPerson>,
    user: Lenient<RawPerson>,
    project: Lenient<RawProject>,
    commits: CommitList,
}

fn project_info(project: RawProject) -> (Option<i64>, ProjectInfo) {
    let namespace = match project.namespace.into_inner() {
        Some(namespace) => namespace,
        None => project
            .owner
            .into_inner()
            .and_then(|owner| owner.login.into_inner())
            .unwrap_or_default(),
    };

    let info = ProjectInfo {
        name: project.name.or_empty(),
        path: project
            .path_with_namespace
            .into_inner()
            .or(project.full_name.into_inner())
            .unwrap_or_default(),
        description: project.description.or_empty(),
        web_url: project
            .html_url
            .into_inner()
            .or(project.url.into_inner())
            .unwrap_or_default(),
        namespace,
        visibility_level: project.public.into_inner().map(visibility_from_public),
        default_branch: project.default_branch.or_empty(),
        git_ssh_url: project.ssh_url.or_empty(),
        git_http_url: project
            .clone_url
            .into_inner()
            .or(project.git_http_url.into_inner())
            .unwrap_or_default(),
    };
    (project.id.into_inner(), info)
}

fn pusher_info(pusher: Option<RawPerson>, user: Option<RawPerson>) -> (String, String, String) {
    if let Some(pusher) = pusher {
        let name = pusher.name.or_empty();
        return (name.clone(), name, pusher.email.or_empty());
    }
    match user {
        Some(user) => (user.name.or_empty(), user.login.or_empty(), user.email.or_empty()),
        None => Default::default(),
    }
}

pub(super) fn parse_push(payload: &Value) -> Vec<CommitRecord> {
    let raw = RawPush::deserialize(payload).unwrap_or_default();
    if raw.commits.entries.is_empty() {
        return Vec::new();
    }

    let (project_id, project) = project_info(raw.project.into_inner().unwrap_or_default());
    let repository = RepositoryInfo {
        name: project.name.clone(),
        url: project.web_url.clone(),
        description: project.description.clone(),
        homepage: project.web_url.clone(),
        git_ssh_url: project.git_ssh_url.clone(),
        git_http_url: project.git_http_url.clone(),
        visibility_level: project.visibility_level,
    };

    let after = raw.after.or_empty();
    let total_commits_count = raw
        .total_commits_count
        .into_inner()
        .unwrap_or(raw.commits.len as i64);
    let (user_name, user_username, user_email) =
        pusher_info(raw.pusher.into_inner(), raw.user.into_inner());

    let meta = PushMeta {
        project_id,
        branch: branch_from_ref(&raw.git_ref.or_empty()),
        ref_protected: None,
        project,
        repository,
        push: PushInfo {
            before_sha: raw.before.or_empty(),
            checkout_sha: after.clone(),
            after_sha: after,
            message: String::new(),
            total_commits_count,
            user_id: None,
            user_name,
            user_username,
            user_email,
        },
    };

    build_records(&meta, raw.commits.entries, RULES)
}
