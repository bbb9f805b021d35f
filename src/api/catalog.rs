use super::{log_error, ApiError, Db};
use crate::bookmarks::parse_int;
use crate::database::{AvatarDb, MovieDb};
use crate::model::Movie;
use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Deserialize;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct MovieParams {
    id: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
    search: Option<String>,
}

fn non_negative(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(parse_int)
        .filter(|n| *n >= 0)
        .map(|n| n as usize)
        .unwrap_or(default)
}

fn find_movie(db: &sled::Db, raw_id: &str) -> Result<Movie, ApiError> {
    let id = parse_int(raw_id).ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_ID",
            "Valid movie ID is required",
        )
    })?;
    db.get_movie(id)
        .map_err(|err| log_error(err, "Database error"))?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "MOVIE_NOT_FOUND", "Movie not found"))
}

/// Either one movie (`?id=`) or a page of the catalog, optionally filtered by
/// a title search.
pub async fn movies(params: web::Query<MovieParams>, db: Db) -> Result<HttpResponse, ApiError> {
    if let Some(id) = params.id.as_deref().filter(|id| !id.is_empty()) {
        return Ok(HttpResponse::Ok().json(find_movie(&db, id)?));
    }
    let limit = non_negative(params.limit.as_deref(), DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = non_negative(params.offset.as_deref(), 0);
    let movies = match params.search.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(search) => db.search_movies(search, offset, limit),
        None => db.list_movies(offset, limit),
    }
    .map_err(|err| log_error(err, "Database error"))?;
    Ok(HttpResponse::Ok().json(movies))
}

pub async fn movie(path: web::Path<String>, db: Db) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(find_movie(&db, &path)?))
}

pub async fn avatars(db: Db) -> Result<HttpResponse, ApiError> {
    let avatars = db
        .list_avatars()
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(HttpResponse::Ok().json(avatars))
}
