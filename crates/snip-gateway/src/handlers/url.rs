use crate::error::Result;
use crate::model::{BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse, UserUrl};
use crate::state::{AppState, Owner, TrustedClient};
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use snip_core::{BatchEntry, CreateOutcome, Resolution, ShortCode, Stats};
use tracing::{debug, warn};

fn create_status(outcome: &CreateOutcome) -> StatusCode {
    if outcome.is_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

/// `POST /` with the URL as a plain-text body.
pub async fn create_text_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: String,
) -> Result<Response> {
    let outcome = state.shortener().create(&owner, body.trim()).await?;
    let short_url = state.short_url(&outcome.record().short);

    Ok((create_status(&outcome), short_url).into_response())
}

pub async fn create_json_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<ShortenRequest>,
) -> Result<Response> {
    let outcome = state.shortener().create(&owner, request.url.trim()).await?;
    let result = state.short_url(&outcome.record().short);

    Ok((create_status(&outcome), Json(ShortenResponse { result })).into_response())
}

/// Redirects to the original URL. Deleted codes answer 410, unknown ones 400.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response> {
    let code = ShortCode::new(code)?;

    let response = match state.shortener().resolve(&code).await? {
        Resolution::Found(record) => match HeaderValue::from_str(&record.original_url) {
            Ok(location) => (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response(),
            Err(err) => {
                warn!(code = %code, error = %err, "stored url is not a valid location header");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Resolution::Gone(_) => StatusCode::GONE.into_response(),
        Resolution::NotFound => {
            debug!(code = %code, "unknown short code");
            StatusCode::BAD_REQUEST.into_response()
        }
    };
    Ok(response)
}

pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Response> {
    let records = state.shortener().list_by_owner(&owner).await?;
    if records.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let urls: Vec<UserUrl> = records
        .into_iter()
        .map(|record| UserUrl {
            short_url: state.short_url(&record.short),
            original_url: record.original_url,
        })
        .collect();

    Ok(Json(urls).into_response())
}

pub async fn create_batch_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<Vec<BatchRequestItem>>,
) -> Result<(StatusCode, Json<Vec<BatchResponseItem>>)> {
    let entries: Vec<BatchEntry> = request
        .into_iter()
        .map(|item| BatchEntry {
            correlation_id: item.correlation_id,
            original_url: item.original_url,
        })
        .collect();

    let items = state.shortener().create_batch(&owner, entries).await?;
    let response: Vec<BatchResponseItem> = items
        .into_iter()
        .map(|item| BatchResponseItem {
            short_url: state.short_url(&item.short),
            correlation_id: item.correlation_id,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(response)))
}

/// Accepts the codes for deletion and returns before they are processed.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(codes): Json<Vec<String>>,
) -> Result<StatusCode> {
    let shorts = codes
        .into_iter()
        .map(ShortCode::new)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let shortener = state.shortener().clone();
    tokio::spawn(async move {
        shortener.delete_urls(&owner, shorts).await;
    });

    Ok(StatusCode::ACCEPTED)
}

/// Only answers clients inside the trusted subnet.
pub async fn stats_handler(
    State(state): State<AppState>,
    _client: TrustedClient,
) -> Result<Json<Stats>> {
    Ok(Json(state.shortener().stats().await?))
}
