//! HTTP surface of the proxy.
//!
//! Three same-origin endpoints over the access layer, all returning the
//! `{ success, ... }` envelope the frontend consumes. A caller's
//! `Authorization: Bearer` header forwards as the per-request user token;
//! without one the layer falls back to the process-wide app token.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::{StatusCode, header, request::Parts};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::{Value, json};

use repolens::GitHubClient;
use repolens::GitHubError;
use repolens::github::{QualityFilters, UserPreferences};

/// Shared state behind every handler.
pub struct AppState {
    pub client: GitHubClient,
}

/// Build the proxy router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/github/repos", get(list_repos))
        .route("/api/github/rate-limit", get(rate_limit))
        .route("/api/github/contributors", get(contributors))
        .with_state(state)
}

/// User token extracted from the `Authorization: Bearer` header, if any.
struct UserToken(Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for UserToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        Ok(Self(parse_bearer(raw)))
    }
}

/// Pull the token out of an `Authorization` header value.
fn parse_bearer(value: Option<&str>) -> Option<String> {
    value
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Access-layer error carrying its HTTP mapping.
struct ApiError(GitHubError);

impl From<GitHubError> for ApiError {
    fn from(e: GitHubError) -> Self {
        Self(e)
    }
}

fn status_for(e: &GitHubError) -> StatusCode {
    match e {
        GitHubError::Auth { .. } => StatusCode::UNAUTHORIZED,
        GitHubError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        GitHubError::NotFound { .. } => StatusCode::NOT_FOUND,
        GitHubError::Api { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        GitHubError::Network { .. } => StatusCode::BAD_GATEWAY,
        GitHubError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = json!({ "success": false, "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ListKind {
    #[default]
    Popular,
    Trending,
    Search,
}

#[derive(Debug, Deserialize)]
struct ReposQuery {
    #[serde(rename = "type", default)]
    kind: ListKind,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    beginner: Option<bool>,
}

const DEFAULT_SEARCH_LIMIT: usize = 10;

async fn list_repos(
    State(state): State<Arc<AppState>>,
    UserToken(token): UserToken,
    Query(params): Query<ReposQuery>,
) -> Result<Json<Value>, ApiError> {
    let token = token.as_deref();
    let page = params.page.unwrap_or(1);

    let repositories = match params.kind {
        ListKind::Popular => {
            let filters = QualityFilters {
                language: params.language,
                topic: params.topic,
                beginner_friendly: params.beginner.unwrap_or(false),
            };
            state
                .client
                .popular_repositories(page, &filters, token)
                .await?
        }
        ListKind::Trending => state.client.trending_repositories(page, token).await?,
        ListKind::Search => {
            let query = params.q.unwrap_or_default();
            let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
            let prefs = UserPreferences {
                preferred_language: params.language,
                preferred_topic: params.topic,
            };
            state
                .client
                .search_repositories(&query, limit, &prefs, token)
                .await?
        }
    };

    Ok(Json(
        json!({ "success": true, "repositories": repositories }),
    ))
}

async fn rate_limit(
    State(state): State<Arc<AppState>>,
    UserToken(token): UserToken,
) -> Json<Value> {
    let allowed = state.client.check_quota(token.as_deref()).await;
    Json(json!({ "success": true, "data": { "allowed": allowed } }))
}

#[derive(Debug, Deserialize)]
struct ContributorsQuery {
    owner: String,
    name: String,
}

async fn contributors(
    State(state): State<Arc<AppState>>,
    UserToken(token): UserToken,
    Query(params): Query<ContributorsQuery>,
) -> Result<Json<Value>, ApiError> {
    let contributors = state
        .client
        .fetch_contributors(&params.owner, &params.name, token.as_deref())
        .await?;
    Ok(Json(json!({ "success": true, "data": contributors })))
}
