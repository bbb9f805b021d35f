use crate::model::*;
use crate::search::SearchExt;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionResult, Transactional,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("record encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("invalid record: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub(crate) fn serialize_id(id: i64) -> [u8; 8] {
    // Big endian so tree iteration follows id order.
    id.to_be_bytes()
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub trait UserDb {
    type Error;
    /// Registers a user. Returns `None` if the email is already taken.
    fn add_user(&self, user: NewUser) -> std::result::Result<Option<User>, Self::Error>;
    fn get_user(&self, id: &str) -> std::result::Result<Option<User>, Self::Error>;
    fn get_user_by_email(&self, email: &str) -> std::result::Result<Option<User>, Self::Error>;
    /// Applies `f` to the stored user atomically and returns the result, or
    /// `None` if there is no such user. `f` may run more than once when the
    /// record changes underneath it.
    fn update_user<F>(&self, id: &str, f: F) -> std::result::Result<Option<User>, Self::Error>
    where
        F: FnMut(&mut User);
}

pub trait MovieDb {
    type Error;
    fn add_movie(&self, movie: NewMovie) -> std::result::Result<Movie, Self::Error>;
    fn get_movie(&self, id: i64) -> std::result::Result<Option<Movie>, Self::Error>;
    fn list_movies(&self, offset: usize, limit: usize)
        -> std::result::Result<Vec<Movie>, Self::Error>;
    fn search_movies(
        &self,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> std::result::Result<Vec<Movie>, Self::Error>;
}

pub trait AvatarDb {
    type Error;
    fn add_avatar(&self, url: &str) -> std::result::Result<Avatar, Self::Error>;
    fn list_avatars(&self) -> std::result::Result<Vec<Avatar>, Self::Error>;
}

const USERS: &[u8] = b"users";
const USERS_EMAIL: &[u8] = b"users_email";
const MOVIES: &[u8] = b"movies";
const MOVIE_TITLES: &[u8] = b"movie_titles";
const AVATARS: &[u8] = b"avatars";

impl UserDb for sled::Db {
    type Error = StoreError;

    fn add_user(&self, user: NewUser) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let now = Utc::now();
        let user = User {
            id: format!("{:016x}", self.generate_id()?),
            name: user.name,
            email: normalize_email(&user.email),
            password_hash: user.password_hash,
            image: user.image,
            bookmarks: Some("[]".to_owned()),
            created_at: now,
            updated_at: now,
        };
        let record = encode(&user)?;
        let result: TransactionResult<(), ()> =
            (&users, &users_email).transaction(|(users, users_email)| {
                if users_email
                    .insert(user.email.as_bytes(), user.id.as_bytes())?
                    .is_some()
                {
                    return Err(ConflictableTransactionError::Abort(()));
                }
                users.insert(user.id.as_bytes(), record.as_slice())?;
                Ok(())
            });
        match result {
            Ok(()) => Ok(Some(user)),
            Err(TransactionError::Abort(())) => Ok(None),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        users.get(id.as_bytes())?.map(|d| decode(&d)).transpose()
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        let users = self.open_tree(USERS)?;
        match users_email.get(normalize_email(email).as_bytes())? {
            Some(id) => users.get(&id)?.map(|d| decode(&d)).transpose(),
            None => Ok(None),
        }
    }

    fn update_user<F>(&self, id: &str, mut f: F) -> Result<Option<User>>
    where
        F: FnMut(&mut User),
    {
        let users = self.open_tree(USERS)?;
        let mut failure = None;
        let updated = users.update_and_fetch(id.as_bytes(), |old| {
            failure = None;
            let old = old?;
            let updated = decode::<User>(old).and_then(|mut user| {
                f(&mut user);
                encode(&user)
            });
            match updated {
                Ok(record) => Some(record),
                Err(e) => {
                    // Leave the record untouched and report after the swap.
                    failure = Some(e);
                    Some(old.to_vec())
                }
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }
        updated.map(|d| decode(&d)).transpose()
    }
}

fn validate_movie(movie: &NewMovie) -> Result<()> {
    if movie.title.trim().is_empty() {
        return Err(StoreError::Invalid("movie title is empty".to_owned()));
    }
    if !(0.0..=5.0).contains(&movie.rating) {
        return Err(StoreError::Invalid(format!(
            "rating {} is outside 0-5",
            movie.rating
        )));
    }
    Ok(())
}

impl MovieDb for sled::Db {
    type Error = StoreError;

    fn add_movie(&self, movie: NewMovie) -> Result<Movie> {
        validate_movie(&movie)?;
        let movies = self.open_tree(MOVIES)?;
        let titles = self.open_search(MOVIE_TITLES)?;
        // Ids start at 1; a zero movie id is treated as absent by clients.
        let movie = movie.with_id(self.generate_id()? as i64 + 1);
        movies.insert(serialize_id(movie.id), encode(&movie)?)?;
        titles.index(movie.id, &movie.title)?;
        Ok(movie)
    }

    fn get_movie(&self, id: i64) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        movies.get(serialize_id(id))?.map(|d| decode(&d)).transpose()
    }

    fn list_movies(&self, offset: usize, limit: usize) -> Result<Vec<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        movies
            .iter()
            .values()
            .skip(offset)
            .take(limit)
            .map(|d| decode(&d?))
            .collect()
    }

    fn search_movies(&self, query: &str, offset: usize, limit: usize) -> Result<Vec<Movie>> {
        let titles = self.open_search(MOVIE_TITLES)?;
        let mut found = Vec::new();
        for (id, _score) in titles.search(query)?.into_iter().skip(offset).take(limit) {
            // The index may still name a movie whose record is gone.
            if let Some(movie) = self.get_movie(id)? {
                found.push(movie);
            }
        }
        Ok(found)
    }
}

impl AvatarDb for sled::Db {
    type Error = StoreError;

    fn add_avatar(&self, url: &str) -> Result<Avatar> {
        let avatars = self.open_tree(AVATARS)?;
        let avatar = Avatar {
            id: self.generate_id()? as i64 + 1,
            url: url.to_owned(),
        };
        avatars.insert(serialize_id(avatar.id), encode(&avatar)?)?;
        Ok(avatar)
    }

    fn list_avatars(&self) -> Result<Vec<Avatar>> {
        let avatars = self.open_tree(AVATARS)?;
        avatars.iter().values().map(|d| decode(&d?)).collect()
    }
}
