//! Table definitions.
//!
//! `commits` is append-only. A commit is identified by `(commit_id,
//! project_id)`; a missing project id is its own identity class, which the
//! expression index expresses with `ifnull`.

pub(super) const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS commits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_id TEXT NOT NULL CHECK (length(commit_id) > 0),
        project_id INTEGER,
        message TEXT NOT NULL,
        title TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        author TEXT NOT NULL,
        author_email TEXT NOT NULL,
        committer_name TEXT NOT NULL,
        committer_email TEXT NOT NULL,
        authored_date TEXT,
        committed_date TEXT,
        branch TEXT NOT NULL,
        ref_protected INTEGER,
        url TEXT NOT NULL,
        project_name TEXT NOT NULL,
        project_path TEXT NOT NULL,
        project_description TEXT NOT NULL,
        project_web_url TEXT NOT NULL,
        project_namespace TEXT NOT NULL,
        project_visibility_level INTEGER,
        project_default_branch TEXT NOT NULL,
        project_git_ssh_url TEXT NOT NULL,
        project_git_http_url TEXT NOT NULL,
        repository_name TEXT NOT NULL,
        repository_url TEXT NOT NULL,
        repository_description TEXT NOT NULL,
        repository_homepage TEXT NOT NULL,
        repository_git_ssh_url TEXT NOT NULL,
        repository_git_http_url TEXT NOT NULL,
        repository_visibility_level INTEGER,
        before_sha TEXT NOT NULL,
        after_sha TEXT NOT NULL,
        checkout_sha TEXT NOT NULL,
        push_message TEXT NOT NULL,
        total_commits_count INTEGER NOT NULL DEFAULT 0,
        push_user_id INTEGER,
        push_user_name TEXT NOT NULL,
        push_user_username TEXT NOT NULL,
        push_user_email TEXT NOT NULL,
        total_added_lines INTEGER NOT NULL DEFAULT 0,
        total_removed_lines INTEGER NOT NULL DEFAULT 0,
        total_changed_files INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_commits_commit_project
        ON commits (commit_id, ifnull(project_id, ''))",
    "CREATE INDEX IF NOT EXISTS idx_commits_author_email ON commits (author_email, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_commits_timestamp ON commits (timestamp)",
    "CREATE TABLE IF NOT EXISTS commit_files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_id INTEGER NOT NULL REFERENCES commits (id) ON DELETE CASCADE,
        file_path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_extension TEXT NOT NULL,
        change_type TEXT NOT NULL CHECK (change_type IN ('added', 'modified', 'removed')),
        added_lines INTEGER NOT NULL DEFAULT 0,
        removed_lines INTEGER NOT NULL DEFAULT 0,
        language TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_commit_files_commit ON commit_files (commit_id)",
    "CREATE INDEX IF NOT EXISTS idx_commit_files_language ON commit_files (language)",
    "CREATE TABLE IF NOT EXISTS commit_languages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_id INTEGER NOT NULL REFERENCES commits (id) ON DELETE CASCADE,
        language TEXT NOT NULL,
        added_lines INTEGER NOT NULL DEFAULT 0,
        removed_lines INTEGER NOT NULL DEFAULT 0,
        file_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_commit_languages_commit ON commit_languages (commit_id)",
    "CREATE INDEX IF NOT EXISTS idx_commit_languages_language ON commit_languages (language)",
];
