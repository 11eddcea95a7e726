//! Read-only statistics endpoints over recorded commits.
//!
//! All endpoints take `email` (required) and optional `start_date` and
//! `end_date` in `YYYY-MM-DD` form. Dates are whole UTC days and both ends
//! are inclusive.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use super::AppState;
use crate::store::{CommitSummary, DateRange, LanguageStats, MemberStats, StoreError};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("email is required")]
    MissingEmail,

    #[error("invalid {field}: {value:?}, expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = match &self {
            StatsError::MissingEmail | StatsError::InvalidDate { .. } => StatusCode::BAD_REQUEST,
            StatsError::Store(e) => {
                error!(error = %e, "Stats query failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// Query string shared by the stats endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub email: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl StatsQuery {
    /// Validates the query into an email and a half-open date range.
    fn resolve(self) -> Result<(String, DateRange), StatsError> {
        let email = self
            .email
            .filter(|email| !email.is_empty())
            .ok_or(StatsError::MissingEmail)?;

        let start = parse_day("start_date", self.start_date.as_deref())?;
        let end = parse_day("end_date", self.end_date.as_deref())?;

        let range = DateRange::new(
            start.map(start_of_day),
            // The end day is included, so the bound is the next midnight.
            end.and_then(|day| day.checked_add_days(Days::new(1)))
                .map(start_of_day),
        );
        Ok((email, range))
    }
}

fn parse_day(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, StatsError> {
    match raw {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Some)
            .map_err(|_| StatsError::InvalidDate {
                field,
                value: value.to_string(),
            }),
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[derive(Debug, Serialize)]
pub struct MemberStatsResponse {
    pub email: String,
    #[serde(flatten)]
    pub stats: MemberStats,
}

#[derive(Debug, Serialize)]
pub struct LanguageStatsResponse {
    pub email: String,
    pub languages: Vec<LanguageStats>,
}

#[derive(Debug, Serialize)]
pub struct MemberCommitsResponse {
    pub email: String,
    pub commits: Vec<CommitSummary>,
    pub count: usize,
}

/// `GET /api/stats/member`: commit count and line totals.
pub async fn member_stats_handler(
    State(app_state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<MemberStatsResponse>, StatsError> {
    let (email, range) = query.resolve()?;
    let stats = app_state.aggregator().member_stats(&email, range).await?;
    Ok(Json(MemberStatsResponse { email, stats }))
}

/// `GET /api/stats/languages`: per-language totals.
pub async fn language_stats_handler(
    State(app_state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<LanguageStatsResponse>, StatsError> {
    let (email, range) = query.resolve()?;
    let languages = app_state.aggregator().language_stats(&email, range).await?;
    Ok(Json(LanguageStatsResponse { email, languages }))
}

/// `GET /api/stats/commits`: the member's commits, newest first.
pub async fn member_commits_handler(
    State(app_state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<MemberCommitsResponse>, StatsError> {
    let (email, range) = query.resolve()?;
    let commits = app_state.aggregator().member_commits(&email, range).await?;
    Ok(Json(MemberCommitsResponse {
        email,
        count: commits.len(),
        commits,
    }))
}
