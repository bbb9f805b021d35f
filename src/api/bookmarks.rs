use super::{session_user, ApiError, Db};
use crate::bookmarks::{self, BookmarkError};
use crate::codec::Bookmarks;
use actix_identity::Identity;
use actix_web::{http::StatusCode, web, HttpResponse};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize)]
pub struct LookupParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "movieId")]
    movie_id: Option<String>,
}

#[derive(Serialize)]
struct BookmarkList {
    bookmarks: Bookmarks,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkStatus {
    is_bookmarked: bool,
}

pub async fn list(params: web::Query<LookupParams>, db: Db) -> Result<HttpResponse, ApiError> {
    let bookmarks = bookmarks::list_bookmarks(db.get_ref(), params.user_id.as_deref())?;
    Ok(HttpResponse::Ok().json(BookmarkList { bookmarks }))
}

pub async fn is_bookmarked(
    params: web::Query<LookupParams>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let is_bookmarked = bookmarks::is_bookmarked(
        db.get_ref(),
        params.user_id.as_deref(),
        params.movie_id.as_deref(),
    )?;
    Ok(HttpResponse::Ok().json(BookmarkStatus { is_bookmarked }))
}

/// Reads a mutation body. The session is checked first, so an anonymous
/// caller gets 401 whatever it sent. The content type is not checked.
fn mutation_body(user_id: Option<&str>, body: &[u8]) -> Result<Value, ApiError> {
    if user_id.is_none() {
        return Err(BookmarkError::Unauthorized.into());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected bookmark body: {}", e);
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_BODY",
            "Request body must be valid JSON",
        )
    })
}

pub async fn add(id: Identity, body: web::Bytes, db: Db) -> Result<HttpResponse, ApiError> {
    let user_id = session_user(&id);
    let body = mutation_body(user_id.as_deref(), &body)?;
    let bookmarks = bookmarks::add_bookmark(db.get_ref(), user_id.as_deref(), &body)?;
    Ok(HttpResponse::Ok().json(BookmarkList { bookmarks }))
}

pub async fn remove(id: Identity, body: web::Bytes, db: Db) -> Result<HttpResponse, ApiError> {
    let user_id = session_user(&id);
    let body = mutation_body(user_id.as_deref(), &body)?;
    let bookmarks = bookmarks::remove_bookmark(db.get_ref(), user_id.as_deref(), &body)?;
    Ok(HttpResponse::Ok().json(BookmarkList { bookmarks }))
}
