use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user as kept in the `users` tree.
///
/// `bookmarks` holds the JSON text of the user's bookmark list exactly as it
/// was persisted. It is only ever interpreted through [`crate::codec`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub bookmarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
}

/// What a client gets to see of a user.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Profile {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub genre: String,
    pub release_year: i32,
    pub director: String,
    pub rating: f32,
    pub poster_image_url: String,
    pub description: String,
    pub duration: String,
    pub download_link: String,
}

/// A movie before the catalog has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewMovie {
    pub title: String,
    pub genre: String,
    pub release_year: i32,
    pub director: String,
    pub rating: f32,
    pub poster_image_url: String,
    pub description: String,
    pub duration: String,
    pub download_link: String,
}

impl NewMovie {
    pub fn with_id(self, id: i64) -> Movie {
        Movie {
            id,
            title: self.title,
            genre: self.genre,
            release_year: self.release_year,
            director: self.director,
            rating: self.rating,
            poster_image_url: self.poster_image_url,
            description: self.description,
            duration: self.duration,
            download_link: self.download_link,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Avatar {
    pub id: i64,
    pub url: String,
}
