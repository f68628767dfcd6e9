use std::io::ErrorKind;

use axum::{
    Extension, Router,
    body::Body,
    extract::{Path, Request, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use flog_api_types::{PREVIEW_PREFIX, UPLOAD_URL_BASE};
use time::OffsetDateTime;
use tracing::error;

use crate::{
    application::{error::HttpError, site::FEED_PATH},
    domain::visibility::VisibilityMode,
    infra::{http::AppState, uploads::UploadStorageError},
    presentation::views::{
        ArchiveTemplate, EntryTemplate, IndexTemplate, LayoutContext, ListingTemplate,
        render_not_found_response, render_template_response,
    },
};

use super::api::session::has_session;

/// Pages served identically by the public site and its preview.
fn site_routes(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(&format!("{prefix}/"), get(index))
        .route(&format!("{prefix}/entry/{{slug}}/"), get(entry_detail))
        .route(&format!("{prefix}/tag/{{slug}}/"), get(tag_listing))
        .route(&format!("{prefix}/category/{{slug}}/"), get(category_first_page))
        .route(&format!("{prefix}/category/{{slug}}/{{page}}/"), get(category_page))
        .route(&format!("{prefix}/archives/"), get(archives))
        .route(&format!("{prefix}{FEED_PATH}"), get(atom_feed))
}

pub fn build_public_router(state: AppState) -> Router {
    let public_routes = site_routes("").layer(Extension(VisibilityMode::Public));

    let preview_routes = site_routes(PREVIEW_PREFIX)
        .layer(Extension(VisibilityMode::Preview))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_preview_session,
        ));

    Router::new()
        .merge(public_routes)
        .merge(preview_routes)
        .route(&format!("{UPLOAD_URL_BASE}/{{slug}}/{{file}}"), get(serve_upload))
        .fallback(not_found)
        .with_state(state)
}

async fn require_preview_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if has_session(&state.auth, request.headers()) {
        let mut response = next.run(request).await;
        set_no_store(&mut response);
        return response;
    }

    HttpError::new(
        "infra::http::public::require_preview_session",
        StatusCode::UNAUTHORIZED,
        "Log in with flog-cli to see the preview",
        "preview requested without a valid session",
    )
    .into_response()
}

async fn index(State(state): State<AppState>, Extension(mode): Extension<VisibilityMode>) -> Response {
    let chrome = match state.site.chrome(mode).await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };

    match state.site.index(mode, OffsetDateTime::now_utc()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

async fn entry_detail(
    State(state): State<AppState>,
    Extension(mode): Extension<VisibilityMode>,
    Path(slug): Path<String>,
) -> Response {
    let chrome = match state.site.chrome(mode).await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };

    match state.site.entry(mode, &slug, OffsetDateTime::now_utc()).await {
        Ok(Some(content)) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(EntryTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => err.into_response(),
    }
}

async fn tag_listing(
    State(state): State<AppState>,
    Extension(mode): Extension<VisibilityMode>,
    Path(slug): Path<String>,
) -> Response {
    let chrome = match state.site.chrome(mode).await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };

    match state.site.tag(mode, &slug, OffsetDateTime::now_utc()).await {
        Ok(Some(content)) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(ListingTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => err.into_response(),
    }
}

async fn category_first_page(
    state: State<AppState>,
    mode: Extension<VisibilityMode>,
    Path(slug): Path<String>,
) -> Response {
    render_category(state, mode, slug, 1).await
}

async fn category_page(
    state: State<AppState>,
    mode: Extension<VisibilityMode>,
    Path((slug, page)): Path<(String, String)>,
) -> Response {
    // non-numeric pages fall through to the not-found page
    let page = page.parse().unwrap_or(0);
    render_category(state, mode, slug, page).await
}

async fn render_category(
    State(state): State<AppState>,
    Extension(mode): Extension<VisibilityMode>,
    slug: String,
    page: usize,
) -> Response {
    let chrome = match state.site.chrome(mode).await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };

    match state
        .site
        .category(mode, &slug, page, OffsetDateTime::now_utc())
        .await
    {
        Ok(Some(content)) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(ListingTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => err.into_response(),
    }
}

async fn archives(
    State(state): State<AppState>,
    Extension(mode): Extension<VisibilityMode>,
) -> Response {
    let chrome = match state.site.chrome(mode).await {
        Ok(chrome) => chrome,
        Err(err) => return err.into_response(),
    };

    match state.site.archives(mode, OffsetDateTime::now_utc()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome, content);
            render_template_response(ArchiveTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

async fn atom_feed(
    State(state): State<AppState>,
    Extension(mode): Extension<VisibilityMode>,
) -> Response {
    match state
        .syndication
        .atom_feed(mode, OffsetDateTime::now_utc())
        .await
    {
        Ok(body) => xml_response(body, "application/atom+xml; charset=utf-8"),
        Err(err) => err.into_response(),
    }
}

async fn not_found(State(state): State<AppState>) -> Response {
    match state.site.chrome(VisibilityMode::Public).await {
        Ok(chrome) => render_not_found_response(chrome),
        Err(err) => err.into_response(),
    }
}

async fn serve_upload(
    State(state): State<AppState>,
    Path((slug, file)): Path<(String, String)>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.uploads.read(&slug, &file).await {
        Ok(bytes) => build_upload_response(&file, bytes),
        Err(UploadStorageError::InvalidPath | UploadStorageError::InvalidName { .. }) => {
            HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Upload not found",
                "The requested upload is not available",
            )
            .into_response()
        }
        Err(UploadStorageError::Io(err))
            if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) =>
        {
            HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Upload not found",
                "The requested upload is not available",
            )
            .into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                slug = %slug,
                file = %file,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn set_no_store(response: &mut Response) {
    let value = HeaderValue::from_static("no-store");
    response.headers_mut().insert(CACHE_CONTROL, value);
}

fn xml_response(body: String, content_type: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
