use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use flog_api_types::{ApiEnvelope, AuthRequest, EntryPayload, SidebarRequest, UploadRequest};
use tracing::{info, warn};

use crate::application::auth::AuthError;
use crate::application::entries::EntryWriteError;
use crate::application::repos::RepoError;
use crate::domain::slug::validate_entry_slug;
use crate::infra::http::AppState;
use crate::infra::uploads::UploadStorageError;

use super::error::ApiError;
use super::session::{clear_session, session_cookie, session_token};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn json_body<T>(source: &'static str, body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(source, rejection.body_text()))
}

fn entry_error(source: &'static str, err: EntryWriteError) -> ApiError {
    match err {
        EntryWriteError::NotFound { .. } | EntryWriteError::Repo(RepoError::NotFound) => {
            ApiError::not_found(source, err.to_string())
        }
        EntryWriteError::Repo(RepoError::Duplicate { .. }) => {
            ApiError::new(source, StatusCode::CONFLICT, err.to_string())
        }
        ref client if client.is_client_error() => ApiError::bad_request(source, client.to_string()),
        other => ApiError::internal(source, &other),
    }
}

pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> Response {
    const SOURCE: &str = "infra::http::api::authenticate";

    let request = match json_body(SOURCE, body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    match state.auth.login(&request.username, &request.password) {
        Ok(token) => (jar.add(session_cookie(token)), Json(ApiEnvelope::ok())).into_response(),
        Err(AuthError::InvalidCredentials | AuthError::NotConfigured) => {
            ApiError::rejected(SOURCE).into_response()
        }
    }
}

/// End the caller's session. Unknown or missing tokens are accepted silently.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiEnvelope>) {
    if let Some(token) = session_token(&jar) {
        state.auth.logout(&token);
        info!(target = "infra::http::api::logout", "session closed");
    }
    (clear_session(jar), Json(ApiEnvelope::ok()))
}

pub async fn upsert_entry(
    State(state): State<AppState>,
    body: Result<Json<EntryPayload>, JsonRejection>,
) -> ApiResult<ApiEnvelope> {
    const SOURCE: &str = "infra::http::api::upsert_entry";

    let payload = json_body(SOURCE, body)?;
    state
        .entries
        .upsert(payload)
        .await
        .map_err(|err| entry_error(SOURCE, err))?;
    Ok(Json(ApiEnvelope::ok()))
}

pub async fn update_entry(
    State(state): State<AppState>,
    body: Result<Json<EntryPayload>, JsonRejection>,
) -> ApiResult<ApiEnvelope> {
    const SOURCE: &str = "infra::http::api::update_entry";

    let payload = json_body(SOURCE, body)?;
    state
        .entries
        .update(payload)
        .await
        .map_err(|err| entry_error(SOURCE, err))?;
    Ok(Json(ApiEnvelope::ok()))
}

pub async fn read_entry(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<EntryPayload> {
    const SOURCE: &str = "infra::http::api::read_entry";

    match state.entries.read(&slug).await {
        Ok(Some(entry)) => Ok(Json(entry)),
        Ok(None) => Err(ApiError::not_found(
            SOURCE,
            format!("entry `{slug}` does not exist"),
        )),
        Err(err) => Err(ApiError::internal(SOURCE, &err)),
    }
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<ApiEnvelope> {
    const SOURCE: &str = "infra::http::api::delete_entry";

    state
        .entries
        .delete(&slug)
        .await
        .map_err(|err| entry_error(SOURCE, err))?;

    if validate_entry_slug(&slug).is_ok()
        && let Err(err) = state.uploads.delete_entry_files(&slug).await
    {
        warn!(
            target = SOURCE,
            slug = %slug,
            error = %err,
            "entry deleted but its uploads could not be removed"
        );
    }
    Ok(Json(ApiEnvelope::ok()))
}

pub async fn upload_files(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    body: Result<Json<UploadRequest>, JsonRejection>,
) -> ApiResult<ApiEnvelope> {
    const SOURCE: &str = "infra::http::api::upload_files";

    let request = json_body(SOURCE, body)?;
    validate_entry_slug(&slug).map_err(|err| ApiError::bad_request(SOURCE, err.to_string()))?;
    if request.slug != slug {
        return Err(ApiError::bad_request(
            SOURCE,
            format!("body slug `{}` does not match path `{slug}`", request.slug),
        ));
    }

    let mut files = Vec::with_capacity(request.files.len());
    for (name, encoded) in request.files {
        let decoded = STANDARD.decode(encoded.as_bytes()).map_err(|err| {
            ApiError::bad_request(SOURCE, format!("file `{name}` is not valid base64: {err}"))
        })?;
        files.push((name, Bytes::from(decoded)));
    }

    match state.uploads.replace_entry_files(&slug, files).await {
        Ok(stored) => {
            info!(target = SOURCE, slug = %slug, files = stored.len(), "uploads replaced");
            Ok(Json(ApiEnvelope::ok()))
        }
        Err(err @ (UploadStorageError::InvalidName { .. } | UploadStorageError::InvalidPath)) => {
            Err(ApiError::bad_request(SOURCE, err.to_string()))
        }
        Err(err) => Err(ApiError::internal(SOURCE, &err)),
    }
}

pub async fn replace_sidebar(
    State(state): State<AppState>,
    body: Result<Json<SidebarRequest>, JsonRejection>,
) -> ApiResult<ApiEnvelope> {
    const SOURCE: &str = "infra::http::api::replace_sidebar";

    let request = json_body(SOURCE, body)?;
    match state.sidebar.replace(request.modules).await {
        Ok(_) => Ok(Json(ApiEnvelope::ok())),
        Err(RepoError::InvalidInput { message }) => Err(ApiError::bad_request(SOURCE, message)),
        Err(err) => Err(ApiError::internal(SOURCE, &err)),
    }
}

pub async fn list_sidebar(State(state): State<AppState>) -> ApiResult<SidebarRequest> {
    const SOURCE: &str = "infra::http::api::list_sidebar";

    let modules = state
        .sidebar
        .list()
        .await
        .map_err(|err| ApiError::internal(SOURCE, &err))?;
    Ok(Json(SidebarRequest { modules }))
}
