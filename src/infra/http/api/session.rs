use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use flog_api_types::SESSION_COOKIE;
use uuid::Uuid;

use crate::application::auth::AuthService;
use crate::infra::http::AppState;

use super::error::ApiError;

pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub fn has_session(auth: &AuthService, headers: &HeaderMap) -> bool {
    session_token(&CookieJar::from_headers(headers)).is_some_and(|token| auth.is_valid(&token))
}

pub fn session_cookie(token: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .build()
}

/// Jar update that expires the session cookie on the client.
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

pub async fn require_session(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !has_session(&state.auth, request.headers()) {
        return ApiError::unauthorized().into_response();
    }
    next.run(request).await
}
