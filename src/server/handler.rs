use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    Error, Feature, FeatureName, FeatureNameBuf, QueryResult, ReadStore, Scope, ScopeBuf,
    WriteStore,
};

/// Error surfaced to HTTP clients. Bodies are short plain-text messages;
/// backend detail goes to the log, never to the client.
#[derive(Debug)]
pub(super) enum ApiError {
    Validation(String),
    NotFound,
    Unauthorized,
    Unsupported,
    Backend(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> ApiError {
        match err {
            Error::Scope(_) | Error::Feature(_) => ApiError::Validation(err.to_string()),
            Error::Auth(_) => ApiError::Unauthorized,
            Error::Unsupported(_) => ApiError::Unsupported,
            err => ApiError::Backend(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => {
                (StatusCode::NOT_ACCEPTABLE, message).into_response()
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
            ApiError::Unsupported => (
                StatusCode::NOT_IMPLEMENTED,
                "not supported by the configured persistence store",
            )
                .into_response(),
            ApiError::Backend(err) => {
                tracing::error!(error = %err, "persistence operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence error").into_response()
            }
        }
    }
}

type ApiResult<T = Response> = Result<T, ApiError>;

/// The raw query string and its decoded pairs, in arrival order.
///
/// Routes declare the exact parameter-name sets they accept; an unknown or
/// repeated parameter fails every declared set and is answered with 406.
struct RouteQuery {
    raw: String,
    pairs: Vec<(String, String)>,
}

impl RouteQuery {
    fn parse(raw: Option<String>) -> RouteQuery {
        let raw = raw.unwrap_or_default();
        let pairs = url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect();
        RouteQuery { raw, pairs }
    }

    /// True when the query carries exactly the given names, each once.
    fn matches(&self, names: &[&str]) -> bool {
        self.pairs.len() == names.len()
            && names
                .iter()
                .all(|name| self.pairs.iter().filter(|(key, _)| key == name).count() == 1)
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn unacceptable(&self) -> ApiError {
        ApiError::Validation(format!("unacceptable query: {:?}", self.raw))
    }
}

/// `[A-Za-z0-9_-]+`, the pattern route parameters must satisfy. A failing
/// parameter means the route did not match, which surfaces as 404.
fn matches_route_pattern(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn route_param(value: Option<&str>) -> ApiResult<String> {
    match value {
        Some(value) if matches_route_pattern(value) => Ok(value.to_owned()),
        _ => Err(ApiError::NotFound),
    }
}

fn route_scope(value: Option<&str>) -> ApiResult<ScopeBuf> {
    let value = route_param(value)?;
    Ok(Scope::parse(&value).map_err(Error::from)?.to_owned())
}

/// The `feature` query parameter admits any nonempty value at the routing
/// layer; name validation then applies as usual.
fn feature_query(value: Option<&str>) -> ApiResult<FeatureNameBuf> {
    match value {
        Some(value) if !value.is_empty() => {
            Ok(FeatureName::parse(value).map_err(Error::from)?.to_owned())
        }
        _ => Err(ApiError::NotFound),
    }
}

/// `[0-9]+` route pattern for `count` and `offset`.
fn number_param(value: Option<&str>) -> ApiResult<usize> {
    match value {
        Some(value) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
            value.parse().map_err(|_| ApiError::NotFound)
        }
        _ => Err(ApiError::NotFound),
    }
}

/// Run one store operation off the async runtime.
async fn blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::Backend(Error::Io(std::io::Error::other(err))))?
        .map_err(ApiError::from)
}

#[derive(Serialize)]
struct Envelope {
    data: QueryResult,
}

/// Wrap a successful read in the `{"data": ...}` envelope.
fn envelope(data: impl Into<QueryResult>) -> ApiResult {
    let body = serde_json::to_string(&Envelope { data: data.into() }).map_err(Error::from)?;
    Ok((
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        body,
    )
        .into_response())
}

pub(super) async fn home() -> &'static str {
    "flipadelphia flips your features"
}

/// `GET /features?scope=S[&value=V]`
pub(super) async fn scope_features(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult {
    let query = RouteQuery::parse(raw);
    let store = state.store.clone();

    if query.matches(&["scope"]) {
        let scope = route_scope(query.value("scope"))?;
        let features = blocking(move || store.scope_features(&scope)).await?;
        return envelope(features);
    }
    if query.matches(&["scope", "value"]) {
        let scope = route_scope(query.value("scope"))?;
        let value = route_param(query.value("value"))?;
        let features = blocking(move || store.scope_features_with_value(&scope, &value)).await?;
        return envelope(features);
    }
    Err(query.unacceptable())
}

/// `GET /features/{name}?scope=S`
pub(super) async fn check_feature(
    State(state): State<AppState>,
    Path(name): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult {
    let name = route_param(Some(name.as_str()))?;
    let query = RouteQuery::parse(raw);
    if !query.matches(&["scope"]) {
        return Err(query.unacceptable());
    }
    let scope = route_scope(query.value("scope"))?;
    let feature = FeatureName::parse(&name).map_err(Error::from)?.to_owned();

    let store = state.store.clone();
    let record: Option<Feature> = blocking(move || {
        if !store.has_scope(&scope)? {
            return Ok(None);
        }
        store.get(&scope, &feature).map(Some)
    })
    .await?;

    match record {
        Some(record) => envelope(record),
        None => Err(ApiError::NotFound),
    }
}

#[derive(Debug, Deserialize)]
struct SetFeatureBody {
    #[serde(default)]
    scope: String,
    #[serde(default)]
    value: String,
}

/// `POST /admin/features/{name}` with body `{"scope": ..., "value": ...}`
pub(super) async fn set_feature(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    body: Bytes,
) -> ApiResult {
    let name = route_param(Some(name.as_str()))?;
    let query = RouteQuery::parse(raw);
    if !query.matches(&[]) {
        return Err(query.unacceptable());
    }

    match state.auth.authenticate_request(&headers).await {
        Ok(true) => {}
        Ok(false) | Err(_) => return Err(ApiError::Unauthorized),
    }

    let body: SetFeatureBody = serde_json::from_slice(&body)
        .map_err(|err| ApiError::Validation(format!("invalid request body: {err}")))?;
    let scope = Scope::parse(&body.scope).map_err(Error::from)?.to_owned();
    let feature = FeatureName::parse(&name).map_err(Error::from)?.to_owned();

    let store = state.store.clone();
    let value = body.value;
    let record = blocking(move || store.set(&scope, &feature, &value)).await?;
    envelope(record)
}

/// `GET /admin/scopes` and its prefix, feature and pagination overloads.
pub(super) async fn admin_scopes(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult {
    let query = RouteQuery::parse(raw);
    let store = state.store.clone();

    if query.matches(&[]) {
        let scopes = blocking(move || store.scopes()).await?;
        return envelope(scopes);
    }
    if query.matches(&["prefix"]) {
        let prefix = route_param(query.value("prefix"))?;
        let scopes = blocking(move || store.scopes_with_prefix(&prefix)).await?;
        return envelope(scopes);
    }
    if query.matches(&["feature"]) {
        let feature = feature_query(query.value("feature"))?;
        let scopes = blocking(move || store.scopes_with_feature(&feature)).await?;
        return envelope(scopes);
    }
    if query.matches(&["count"]) || query.matches(&["count", "offset"]) {
        let count = number_param(query.value("count"))?;
        let offset = match query.value("offset") {
            Some(offset) => number_param(Some(offset))?,
            None => 0,
        };
        let scopes = blocking(move || store.scopes_paginated(offset, count)).await?;
        return envelope(scopes);
    }
    Err(query.unacceptable())
}

/// `GET /admin/features` and its pagination overload.
pub(super) async fn admin_features(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult {
    let query = RouteQuery::parse(raw);
    let store = state.store.clone();

    if query.matches(&[]) {
        let features = blocking(move || store.features()).await?;
        return envelope(features);
    }
    if query.matches(&["count"]) || query.matches(&["count", "offset"]) {
        let count = number_param(query.value("count"))?;
        let offset = match query.value("offset") {
            Some(offset) => number_param(Some(offset))?,
            None => 0,
        };
        let features = blocking(move || store.features_paginated(offset, count)).await?;
        return envelope(features);
    }
    Err(query.unacceptable())
}

/// `GET /admin/scopes/{scope}/features`
pub(super) async fn scope_features_full(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    RawQuery(raw): RawQuery,
) -> ApiResult {
    let scope = route_scope(Some(scope.as_str()))?;
    let query = RouteQuery::parse(raw);
    if !query.matches(&[]) {
        return Err(query.unacceptable());
    }

    let store = state.store.clone();
    let records: Option<Vec<Feature>> = blocking(move || {
        if !store.has_scope(&scope)? {
            return Ok(None);
        }
        store.scope_features_full(&scope).map(Some)
    })
    .await?;

    match records {
        Some(records) => envelope(records),
        None => Err(ApiError::NotFound),
    }
}
