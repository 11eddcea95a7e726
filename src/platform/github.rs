//! GitHub `push` payloads.
//!
//! GitHub has no separate tag-push event; tag pushes arrive as `push` with a
//! `refs/tags/` ref.

use serde::Deserialize;
use serde_json::Value;

use super::common::{
    CommitList, CommitRules, Lenient, PushMeta, RawPerson, branch_from_ref, build_records,
    visibility_from_public,
};
use crate::types::{CommitRecord, ProjectInfo, PushInfo, RepositoryInfo};

const RULES: CommitRules = CommitRules {
    sha_fallback: true,
    time_layouts: &["%Y-%m-%dT%H:%M:%SZ"],
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRepository {
    id: Lenient<i64>,
    name: Lenient<String>,
    full_name: Lenient<String>,
    description: Lenient<String>,
    html_url: Lenient<String>,
    owner: Lenient<RawPerson>,
    private: Lenient<bool>,
    default_branch: Lenient<String>,
    ssh_url: Lenient<String>,
    clone_url: Lenient<String>,
    protected: Lenient<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPush {
    #[serde(rename = "ref")]
    git_ref: Lenient<String>,
    before: Lenient<String>,
    after: Lenient<String>,
    pusher: Lenient<RawPerson>,
    sender: Lenient<RawPerson>,
    repository: Lenient<RawRepository>,
    commits: CommitList,
}

/// Returns true when the payload's ref names a tag.
pub(super) fn is_tag_ref(payload: &Value) -> bool {
    payload
        .get("ref")
        .and_then(Value::as_str)
        .is_some_and(|git_ref| git_ref.starts_with("refs/tags/"))
}

pub(super) fn parse_push(payload: &Value) -> Vec<CommitRecord> {
    let raw = RawPush::deserialize(payload).unwrap_or_default();
    if raw.commits.entries.is_empty() {
        return Vec::new();
    }

    let repo = raw.repository.into_inner().unwrap_or_default();
    let name = repo.name.or_empty();
    let description = repo.description.or_empty();
    let html_url = repo.html_url.or_empty();
    let ssh_url = repo.ssh_url.or_empty();
    let clone_url = repo.clone_url.or_empty();
    let visibility_level = repo
        .private
        .into_inner()
        .map(|private| visibility_from_public(!private));

    let project = ProjectInfo {
        name: name.clone(),
        path: repo.full_name.or_empty(),
        description: description.clone(),
        web_url: html_url.clone(),
        namespace: repo
            .owner
            .into_inner()
            .and_then(|owner| owner.login.into_inner())
            .unwrap_or_default(),
        visibility_level,
        default_branch: repo.default_branch.or_empty(),
        git_ssh_url: ssh_url.clone(),
        git_http_url: clone_url.clone(),
    };
    let repository = RepositoryInfo {
        name,
        url: html_url.clone(),
        description,
        homepage: html_url,
        git_ssh_url: ssh_url,
        git_http_url: clone_url,
        visibility_level,
    };

    let pusher = raw.pusher.into_inner();
    let sender = raw.sender.into_inner();
    let (user_name, user_username, user_email) = match (pusher, sender) {
        (Some(pusher), _) => {
            let name = pusher.name.or_empty();
            (name.clone(), name, pusher.email.or_empty())
        }
        (None, Some(sender)) => (
            sender.name.or_empty(),
            sender.login.or_empty(),
            sender.email.or_empty(),
        ),
        (None, None) => Default::default(),
    };

    let after = raw.after.or_empty();
    let meta = PushMeta {
        project_id: repo.id.into_inner(),
        branch: branch_from_ref(&raw.git_ref.or_empty()),
        ref_protected: repo.protected.into_inner(),
        project,
        repository,
        push: PushInfo {
            before_sha: raw.before.or_empty(),
            checkout_sha: after.clone(),
            after_sha: after,
            message: String::new(),
            total_commits_count: raw.commits.len as i64,
            user_id: None,
            user_name,
            user_username,
            user_email,
        },
    };

    build_records(&meta, raw.commits.entries, RULES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_push() -> Value {
        json!({
            "ref": "refs/heads/main",
            "before": "aaaa",
            "after": "bbbb",
            "repository": {
                "id": 1296269,
                "name": "Hello-World",
                "full_name": "octocat/Hello-World",
                "description": null,
                "html_url": "https://github.com/octocat/Hello-World",
                "owner": {"login": "octocat"},
                "private": false,
                "default_branch": "main",
                "ssh_url": "git@github.com:octocat/Hello-World.git",
                "clone_url": "https://github.com/octocat/Hello-World.git"
            },
            "pusher": {"name": "octocat", "email": "octocat@github.com"},
            "sender": {"login": "octocat"},
            "commits": [
                {
                    "id": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
                    "message": "Fix all the bugs",
                    "timestamp": "2024-01-02T03:04:05Z",
                    "url": "https://github.com/octocat/Hello-World/commit/6dcb09b",
                    "author": {"name": "Monalisa", "email": "mona@github.com", "username": "mona"},
                    "committer": {"name": "GitHub", "email": "noreply@github.com"},
                    "added": [],
                    "modified": ["README.md"],
                    "removed": []
                }
            ]
        })
    }

    #[test]
    fn parses_github_push() {
        let records = parse_push(&sample_push());
        assert_eq!(records.len(), 1);
        let record = &records[0];

        assert_eq!(record.project_id, Some(1296269));
        assert_eq!(record.author_email, "mona@github.com");
        assert_eq!(record.committer_name, "GitHub");
        assert_eq!(record.branch, "main");
        assert!(record.authored_at.is_some());
        assert_eq!(record.modified, vec!["README.md"]);

        assert_eq!(record.project.path, "octocat/Hello-World");
        assert_eq!(record.project.namespace, "octocat");
        assert_eq!(record.project.description, "");
        assert_eq!(record.project.visibility_level, Some(20));
        assert_eq!(record.repository.homepage, "https://github.com/octocat/Hello-World");
        assert_eq!(record.push.checkout_sha, "bbbb");
        assert_eq!(record.push.total_commits_count, 1);
        assert_eq!(record.push.user_username, "octocat");
    }

    #[test]
    fn sender_used_without_pusher() {
        let payload = json!({
            "repository": {"private": true},
            "sender": {"login": "hubot", "name": "Hubot"},
            "commits": [{"sha": "123"}]
        });
        let records = parse_push(&payload);
        assert_eq!(records[0].commit_id, "123");
        assert_eq!(records[0].project.visibility_level, Some(0));
        assert_eq!(records[0].push.user_name, "Hubot");
        assert_eq!(records[0].push.user_username, "hubot");
    }

    #[test]
    fn tag_ref_detection() {
        assert!(is_tag_ref(&json!({"ref": "refs/tags/v1.2.0"})));
        assert!(!is_tag_ref(&json!({"ref": "refs/heads/main"})));
        assert!(!is_tag_ref(&json!({"ref": 5})));
        assert!(!is_tag_ref(&json!({})));
    }
}
