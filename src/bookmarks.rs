//! Bookmark lookups and mutations over the user store.
//!
//! Mutations only ever act on the session's user. A request body naming a user
//! is refused outright rather than ignored.

use crate::codec::{Bookmarks, MovieKey};
use crate::database::UserDb;
use chrono::Utc;
use log::{debug, info};
use serde_json::Value;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Unauthorized,
    Internal,
}

#[derive(Error, Debug)]
pub enum BookmarkError {
    #[error("userId is required")]
    MissingUserId,
    #[error("movieId is required")]
    MissingMovieId,
    #[error("movieId must be a valid number")]
    InvalidMovieId,
    #[error("User ID cannot be provided in request body")]
    IdentityOverride,
    #[error("User not found")]
    UserNotFound,
    #[error("Authentication required")]
    Unauthorized,
    #[error("user store failed: {0}")]
    Internal(#[source] Box<dyn StdError + Send + Sync>),
}

impl BookmarkError {
    fn internal<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        BookmarkError::Internal(Box::new(err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BookmarkError::MissingUserId
            | BookmarkError::MissingMovieId
            | BookmarkError::InvalidMovieId
            | BookmarkError::IdentityOverride => ErrorKind::InvalidArgument,
            BookmarkError::UserNotFound => ErrorKind::NotFound,
            BookmarkError::Unauthorized => ErrorKind::Unauthorized,
            BookmarkError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BookmarkError::MissingUserId => "MISSING_USER_ID",
            BookmarkError::MissingMovieId => "MISSING_MOVIE_ID",
            BookmarkError::InvalidMovieId => "INVALID_MOVIE_ID",
            BookmarkError::IdentityOverride => "USER_ID_NOT_ALLOWED",
            BookmarkError::UserNotFound => "USER_NOT_FOUND",
            BookmarkError::Unauthorized => "UNAUTHORIZED",
            BookmarkError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BookmarkError>;

/// Reads a leading base 10 integer the way browsers parse ids out of URLs:
/// leading whitespace and trailing garbage are ignored, `"12abc"` is 12.
pub fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or_else(|| digits.len());
    if end == 0 {
        return None;
    }
    let value = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Extracts the movie id from a mutation body. JSON numbers are taken as
/// written, strings are parsed as integers.
pub fn movie_id_from_body(body: &Value) -> Result<MovieKey> {
    let fields = body.as_object().ok_or(BookmarkError::MissingMovieId)?;
    if fields.contains_key("userId") || fields.contains_key("user_id") {
        return Err(BookmarkError::IdentityOverride);
    }
    let movie_id = match fields.get("movieId") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {
            return Err(BookmarkError::MissingMovieId)
        }
        Some(Value::String(s)) if s.is_empty() => return Err(BookmarkError::MissingMovieId),
        Some(Value::String(s)) => parse_int(s).map(MovieKey::Id),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(id) => Some(MovieKey::Id(id)),
            None => n.as_f64().map(|f| {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    MovieKey::Id(f as i64)
                } else {
                    MovieKey::Number(f)
                }
            }),
        },
        Some(_) => None,
    };
    match movie_id {
        // A numeric zero is falsy to clients and reads as missing.
        Some(MovieKey::Id(0)) if !fields["movieId"].is_string() => {
            Err(BookmarkError::MissingMovieId)
        }
        Some(key) => Ok(key),
        None => Err(BookmarkError::InvalidMovieId),
    }
}

fn load_bookmarks<D>(db: &D, user_id: &str) -> Result<Bookmarks>
where
    D: UserDb,
    D::Error: StdError + Send + Sync + 'static,
{
    let user = db
        .get_user(user_id)
        .map_err(BookmarkError::internal)?
        .ok_or(BookmarkError::UserNotFound)?;
    Ok(Bookmarks::decode(user.bookmarks.as_deref()))
}

pub fn is_bookmarked<D>(db: &D, user_id: Option<&str>, movie_id: Option<&str>) -> Result<bool>
where
    D: UserDb,
    D::Error: StdError + Send + Sync + 'static,
{
    let user_id = present(user_id).ok_or(BookmarkError::MissingUserId)?;
    let movie_id = present(movie_id).ok_or(BookmarkError::MissingMovieId)?;
    let movie_id = parse_int(movie_id).ok_or(BookmarkError::InvalidMovieId)?;
    let bookmarked = load_bookmarks(db, user_id)?.contains(movie_id);
    debug!("user {} movie {} bookmarked: {}", user_id, movie_id, bookmarked);
    Ok(bookmarked)
}

pub fn list_bookmarks<D>(db: &D, user_id: Option<&str>) -> Result<Bookmarks>
where
    D: UserDb,
    D::Error: StdError + Send + Sync + 'static,
{
    let user_id = present(user_id).ok_or(BookmarkError::MissingUserId)?;
    load_bookmarks(db, user_id)
}

/// Read-modify-write of the session user's bookmark list. The store applies
/// the change as a compare-and-swap on the whole record, so concurrent
/// mutations for one user are serialized instead of overwriting each other.
fn mutate<D, F>(db: &D, session: Option<&str>, body: &Value, change: F) -> Result<Bookmarks>
where
    D: UserDb,
    D::Error: StdError + Send + Sync + 'static,
    F: Fn(&mut Bookmarks, MovieKey),
{
    let user_id = present(session).ok_or(BookmarkError::Unauthorized)?;
    let movie_id = movie_id_from_body(body)?;
    let user = db
        .update_user(user_id, |user| {
            let mut bookmarks = Bookmarks::decode(user.bookmarks.as_deref());
            change(&mut bookmarks, movie_id);
            user.bookmarks = Some(bookmarks.encode());
            user.updated_at = Utc::now();
        })
        .map_err(BookmarkError::internal)?
        .ok_or(BookmarkError::UserNotFound)?;
    let bookmarks = Bookmarks::decode(user.bookmarks.as_deref());
    info!(
        "user {} now has {} bookmarks after change to movie {}",
        user_id,
        bookmarks.len(),
        movie_id
    );
    Ok(bookmarks)
}

pub fn remove_bookmark<D>(db: &D, session: Option<&str>, body: &Value) -> Result<Bookmarks>
where
    D: UserDb,
    D::Error: StdError + Send + Sync + 'static,
{
    mutate(db, session, body, Bookmarks::remove)
}

pub fn add_bookmark<D>(db: &D, session: Option<&str>, body: &Value) -> Result<Bookmarks>
where
    D: UserDb,
    D::Error: StdError + Send + Sync + 'static,
{
    mutate(db, session, body, Bookmarks::insert)
}
