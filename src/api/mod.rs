//! JSON endpoints. Handlers stay thin: they pull parameters out of the
//! request, call into the services and shape the reply.

mod auth;
mod bookmarks;
mod catalog;

use crate::bookmarks::{BookmarkError, ErrorKind};
use crate::config::Config;
use actix_identity::{CookieIdentityPolicy, Identity, IdentityService};
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use log::debug;
use serde::Serialize;
use std::fmt;

pub type Db = web::Data<sled::Db>;

/// Error reply with the `{error, code}` envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        ApiError::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication required",
        )
    }
}

/// Logs the details and hands the client a generic message.
pub fn log_error<E: fmt::Debug>(err: E, message: &'static str) -> ApiError {
    debug!("{:?}", err);
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_SERVER_ERROR",
        message,
    )
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(ErrorBody {
            error: &self.message,
            code: self.code,
        })
    }
}

impl From<BookmarkError> for ApiError {
    fn from(err: BookmarkError) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => return log_error(err, "Internal server error"),
        };
        ApiError::new(status, err.code(), err.to_string())
    }
}

pub fn identity_service(config: &Config) -> IdentityService<CookieIdentityPolicy> {
    IdentityService::new(
        CookieIdentityPolicy::new(&config.session_key)
            .name("reelmark-session")
            .secure(config.secure_cookie),
    )
}

/// The user id the session cookie vouches for, if any.
fn session_user(id: &Identity) -> Option<String> {
    id.identity().filter(|user_id| !user_id.is_empty())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/bookmarks", web::get().to(bookmarks::list))
        .route(
            "/api/bookmarks/is-bookmarked",
            web::get().to(bookmarks::is_bookmarked),
        )
        .route("/api/bookmarks/check", web::get().to(bookmarks::is_bookmarked))
        .route(
            "/api/bookmarks/check-simple",
            web::get().to(bookmarks::is_bookmarked),
        )
        .route("/api/bookmarks/add", web::post().to(bookmarks::add))
        .route("/api/bookmarks/remove", web::post().to(bookmarks::remove))
        .route("/api/movies", web::get().to(catalog::movies))
        .route("/api/movies/{id}", web::get().to(catalog::movie))
        .route("/api/avatars", web::get().to(catalog::avatars))
        .route("/api/auth/check-user", web::post().to(auth::check_user))
        .route("/api/auth/sign-up", web::post().to(auth::sign_up))
        .route("/api/auth/sign-in", web::post().to(auth::sign_in))
        .route("/api/auth/sign-out", web::post().to(auth::sign_out))
        .route("/api/auth/session", web::get().to(auth::session));
}

#[cfg(test)]
mod tests;
