//! SQLite persistence for commits and their derived rows.
//!
//! Writes happen inside caller-owned transactions so that a commit, its file
//! rows and its language rows land together or not at all. Reads are plain
//! queries against the pool.

mod rows;
mod schema;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::ChangeKind;

pub use rows::{
    CommitSummary, DateRange, FileRow, LanguageRow, LanguageStats, MemberStats, NewCommit,
    StoredCommit,
};

/// Connections kept open against a file-backed database.
const MAX_CONNECTIONS: u32 = 8;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SUMMARY_COLUMNS: &str = "id, commit_id, project_id, project_name, branch, title, author, \
     author_email, timestamp, url, total_added_lines, total_removed_lines, total_changed_files";

/// Errors from the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The `(commit_id, project_id)` pair is already stored.
    #[error("commit {commit_id} is already recorded")]
    Duplicate { commit_id: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle to the commit database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if needed) the database at `url`, e.g.
    /// `sqlite:commit-ledger.db`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        info!(url, "Connected to database");
        Ok(Store { pool })
    }

    /// Opens a private in-memory database with the schema applied.
    ///
    /// The pool holds a single connection that never expires, since each
    /// in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Store { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates tables and indexes that do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema ready");
        Ok(())
    }

    /// Starts a write transaction.
    ///
    /// The write lock is taken up front with `BEGIN IMMEDIATE`. A deferred
    /// transaction that reads first and then writes cannot wait out a
    /// competing writer under WAL and fails with `SQLITE_BUSY` at once;
    /// taking the lock at `BEGIN` lets the busy timeout queue writers.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Returns true if `(commit_id, project_id)` is already stored. A `None`
    /// project id only matches rows without one.
    pub async fn commit_exists_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        commit_id: &str,
        project_id: Option<i64>,
    ) -> Result<bool> {
        let found = sqlx::query("SELECT 1 FROM commits WHERE commit_id = ? AND project_id IS ?")
            .bind(commit_id)
            .bind(project_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(found.is_some())
    }

    /// Inserts a commit with its file and language rows. Returns the new
    /// row id.
    pub async fn insert_commit_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        commit: &NewCommit<'_>,
        files: &[FileRow],
        languages: &[LanguageRow],
    ) -> Result<i64> {
        let record = commit.record;
        let created_at = to_db_time(&Utc::now());

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO commits (commit_id, project_id, message, title, timestamp, author, \
             author_email, committer_name, committer_email, authored_date, committed_date, \
             branch, ref_protected, url, project_name, project_path, project_description, \
             project_web_url, project_namespace, project_visibility_level, \
             project_default_branch, project_git_ssh_url, project_git_http_url, \
             repository_name, repository_url, repository_description, repository_homepage, \
             repository_git_ssh_url, repository_git_http_url, repository_visibility_level, \
             before_sha, after_sha, checkout_sha, push_message, total_commits_count, \
             push_user_id, push_user_name, push_user_username, push_user_email, \
             total_added_lines, total_removed_lines, total_changed_files, created_at) ",
        );
        qb.push_values(std::iter::once(commit), |mut row, commit| {
            let project = &record.project;
            let repository = &record.repository;
            let push = &record.push;
            row.push_bind(record.commit_id.as_str())
                .push_bind(record.project_id)
                .push_bind(record.message.as_str())
                .push_bind(record.title.as_str())
                .push_bind(to_db_time(&commit.timestamp))
                .push_bind(record.author_name.as_str())
                .push_bind(record.author_email.as_str())
                .push_bind(record.committer_name.as_str())
                .push_bind(record.committer_email.as_str())
                .push_bind(to_db_time(&commit.authored_date))
                .push_bind(to_db_time(&commit.committed_date))
                .push_bind(record.branch.as_str())
                .push_bind(record.ref_protected)
                .push_bind(record.url.as_str())
                .push_bind(project.name.as_str())
                .push_bind(project.path.as_str())
                .push_bind(project.description.as_str())
                .push_bind(project.web_url.as_str())
                .push_bind(project.namespace.as_str())
                .push_bind(project.visibility_level)
                .push_bind(project.default_branch.as_str())
                .push_bind(project.git_ssh_url.as_str())
                .push_bind(project.git_http_url.as_str())
                .push_bind(repository.name.as_str())
                .push_bind(repository.url.as_str())
                .push_bind(repository.description.as_str())
                .push_bind(repository.homepage.as_str())
                .push_bind(repository.git_ssh_url.as_str())
                .push_bind(repository.git_http_url.as_str())
                .push_bind(repository.visibility_level)
                .push_bind(push.before_sha.as_str())
                .push_bind(push.after_sha.as_str())
                .push_bind(push.checkout_sha.as_str())
                .push_bind(push.message.as_str())
                .push_bind(push.total_commits_count)
                .push_bind(push.user_id)
                .push_bind(push.user_name.as_str())
                .push_bind(push.user_username.as_str())
                .push_bind(push.user_email.as_str())
                .push_bind(commit.total_added_lines)
                .push_bind(commit.total_removed_lines)
                .push_bind(commit.total_changed_files)
                .push_bind(created_at.as_str());
        });
        qb.push(" RETURNING id");

        let id = qb
            .build_query_scalar::<i64>()
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| insert_error(e, &record.commit_id))?;

        if !files.is_empty() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO commit_files (commit_id, file_path, file_name, file_extension, \
                 change_type, added_lines, removed_lines, language, created_at) ",
            );
            qb.push_values(files, |mut row, file| {
                row.push_bind(id)
                    .push_bind(file.file_path.as_str())
                    .push_bind(file.file_name.as_str())
                    .push_bind(file.file_extension.as_str())
                    .push_bind(file.change_type.as_str())
                    .push_bind(file.added_lines)
                    .push_bind(file.removed_lines)
                    .push_bind(file.language.as_str())
                    .push_bind(created_at.as_str());
            });
            qb.build().execute(&mut **tx).await?;
        }

        if !languages.is_empty() {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO commit_languages (commit_id, language, added_lines, removed_lines, \
                 file_count, created_at) ",
            );
            qb.push_values(languages, |mut row, language| {
                row.push_bind(id)
                    .push_bind(language.language.as_str())
                    .push_bind(language.added_lines)
                    .push_bind(language.removed_lines)
                    .push_bind(language.file_count)
                    .push_bind(created_at.as_str());
            });
            qb.build().execute(&mut **tx).await?;
        }

        Ok(id)
    }

    /// Number of stored commits.
    pub async fn commit_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commits")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Loads one commit with its file and language rows.
    pub async fn load_commit(
        &self,
        commit_id: &str,
        project_id: Option<i64>,
    ) -> Result<Option<StoredCommit>> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM commits WHERE commit_id = ? AND project_id IS ?"
        );
        let Some(row) = sqlx::query(&query)
            .bind(commit_id)
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let summary = summary_from_row(&row)?;

        let files = sqlx::query(
            "SELECT file_path, file_name, file_extension, change_type, added_lines, \
             removed_lines, language FROM commit_files WHERE commit_id = ? ORDER BY id",
        )
        .bind(summary.id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(file_from_row)
        .collect::<Result<Vec<_>>>()?;

        let languages = sqlx::query(
            "SELECT language, added_lines, removed_lines, file_count FROM commit_languages \
             WHERE commit_id = ? ORDER BY language",
        )
        .bind(summary.id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(language_from_row)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(StoredCommit {
            summary,
            files,
            languages,
        }))
    }

    /// Lists a member's commits, newest first.
    pub async fn member_commits(
        &self,
        author_email: &str,
        range: DateRange,
    ) -> Result<Vec<CommitSummary>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        qb.push(SUMMARY_COLUMNS);
        qb.push(" FROM commits WHERE author_email = ");
        qb.push_bind(author_email);
        push_range(&mut qb, "timestamp", range);
        qb.push(" ORDER BY timestamp DESC, id DESC");

        qb.build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(summary_from_row)
            .collect()
    }

    /// Sums a member's commit rollups.
    pub async fn member_stats(&self, author_email: &str, range: DateRange) -> Result<MemberStats> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) AS commit_count, \
             COALESCE(SUM(total_added_lines), 0) AS total_added, \
             COALESCE(SUM(total_removed_lines), 0) AS total_removed, \
             COALESCE(SUM(total_changed_files), 0) AS total_files \
             FROM commits WHERE author_email = ",
        );
        qb.push_bind(author_email);
        push_range(&mut qb, "timestamp", range);

        let row = qb.build().fetch_one(&self.pool).await?;
        Ok(MemberStats {
            commit_count: row.try_get("commit_count")?,
            total_added: row.try_get("total_added")?,
            total_removed: row.try_get("total_removed")?,
            total_files: row.try_get("total_files")?,
        })
    }

    /// Sums a member's language rows per language, largest addition first.
    pub async fn language_stats(
        &self,
        author_email: &str,
        range: DateRange,
    ) -> Result<Vec<LanguageStats>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT commit_languages.language AS language, \
             COALESCE(SUM(commit_languages.added_lines), 0) AS total_added, \
             COALESCE(SUM(commit_languages.removed_lines), 0) AS total_removed, \
             COALESCE(SUM(commit_languages.file_count), 0) AS total_files \
             FROM commit_languages JOIN commits ON commit_languages.commit_id = commits.id \
             WHERE commits.author_email = ",
        );
        qb.push_bind(author_email);
        push_range(&mut qb, "commits.timestamp", range);
        qb.push(" GROUP BY commit_languages.language ORDER BY total_added DESC, language");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<LanguageStats> {
                Ok(LanguageStats {
                    language: row.try_get("language")?,
                    total_added: row.try_get("total_added")?,
                    total_removed: row.try_get("total_removed")?,
                    total_files: row.try_get("total_files")?,
                })
            })
            .collect()
    }
}

/// Formats a time for storage. The fixed width keeps text comparison in
/// step with time order.
pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn push_range(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, range: DateRange) {
    if let Some(start) = range.start {
        qb.push(format!(" AND {column} >= "));
        qb.push_bind(to_db_time(&start));
    }
    if let Some(end) = range.end {
        qb.push(format!(" AND {column} < "));
        qb.push_bind(to_db_time(&end));
    }
}

fn insert_error(e: sqlx::Error, commit_id: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate {
            commit_id: commit_id.to_string(),
        },
        _ => StoreError::Database(e),
    }
}

fn summary_from_row(row: &SqliteRow) -> Result<CommitSummary> {
    Ok(CommitSummary {
        id: row.try_get("id")?,
        commit_id: row.try_get("commit_id")?,
        project_id: row.try_get("project_id")?,
        project_name: row.try_get("project_name")?,
        branch: row.try_get("branch")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        author_email: row.try_get("author_email")?,
        timestamp: row.try_get("timestamp")?,
        url: row.try_get("url")?,
        total_added_lines: row.try_get("total_added_lines")?,
        total_removed_lines: row.try_get("total_removed_lines")?,
        total_changed_files: row.try_get("total_changed_files")?,
    })
}

fn file_from_row(row: &SqliteRow) -> Result<FileRow> {
    let change_type: String = row.try_get("change_type")?;
    Ok(FileRow {
        file_path: row.try_get("file_path")?,
        file_name: row.try_get("file_name")?,
        file_extension: row.try_get("file_extension")?,
        change_type: ChangeKind::from_str(&change_type).map_err(StoreError::CorruptRow)?,
        added_lines: row.try_get("added_lines")?,
        removed_lines: row.try_get("removed_lines")?,
        language: row.try_get("language")?,
    })
}

fn language_from_row(row: &SqliteRow) -> Result<LanguageRow> {
    Ok(LanguageRow {
        language: row.try_get("language")?,
        added_lines: row.try_get("added_lines")?,
        removed_lines: row.try_get("removed_lines")?,
        file_count: row.try_get("file_count")?,
    })
}
