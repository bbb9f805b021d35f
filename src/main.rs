mod api;
mod bookmarks;
mod codec;
mod config;
mod database;
mod model;
mod search;

use actix_web::{middleware::Logger, App, HttpServer};
use config::Config;
use database::*;
use log::info;
use model::*;
use std::io;

fn demo_movie(
    title: &str,
    genre: &str,
    release_year: i32,
    director: &str,
    rating: f32,
    duration: &str,
) -> NewMovie {
    let slug = title.to_lowercase().replace(' ', "-");
    NewMovie {
        title: title.to_owned(),
        genre: genre.to_owned(),
        release_year,
        director: director.to_owned(),
        rating,
        poster_image_url: format!("/posters/{}.jpg", slug),
        description: String::new(),
        duration: duration.to_owned(),
        download_link: String::new(),
    }
}

/// Fills an empty database with a small catalog and a demo account.
fn seed_demo(db: &sled::Db, config: &Config) -> database::Result<()> {
    if !db.list_movies(0, 1)?.is_empty() {
        return Ok(());
    }
    info!("Seeding demo catalog");
    let movies = vec![
        demo_movie("Pulp Fiction", "Crime", 1994, "Quentin Tarantino", 4.6, "2h 34m"),
        demo_movie("The Dark Knight", "Action", 2008, "Christopher Nolan", 4.8, "2h 32m"),
        demo_movie("Spirited Away", "Animation", 2001, "Hayao Miyazaki", 4.7, "2h 5m"),
        demo_movie("Heat", "Crime", 1995, "Michael Mann", 4.4, "2h 50m"),
        demo_movie("Dark City", "Sci-Fi", 1998, "Alex Proyas", 3.9, "1h 40m"),
    ];
    let mut ids = Vec::new();
    for movie in movies {
        ids.push(db.add_movie(movie)?.id);
    }
    for n in 1..=4 {
        db.add_avatar(&format!("/avatars/{}.gif", n))?;
    }
    let password_hash = bcrypt::hash("password", config.bcrypt_cost)
        .map_err(|err| StoreError::Invalid(err.to_string()))?;
    if let Some(user) = db.add_user(NewUser {
        name: "Demo".to_owned(),
        email: "demo@reelmark.local".to_owned(),
        password_hash,
        image: Some("/avatars/1.gif".to_owned()),
    })? {
        let bookmarks = codec::Bookmarks::from(ids.into_iter().take(2).collect::<Vec<_>>());
        db.update_user(&user.id, |user| user.bookmarks = Some(bookmarks.encode()))?;
        info!("Demo account {} is {}", user.email, user.id);
    }
    Ok(())
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::from_env(
        env_logger::Env::default().default_filter_or("reelmark=debug,actix_web=info"),
    )
    .init();

    let config = Config::load().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let db = config
        .open_database()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    if config.seed {
        seed_demo(&db, &config).map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    }

    let bind = config.bind.clone();
    info!("Listening on {}", bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(api::identity_service(&config))
            .data(db.clone())
            .data(config.clone())
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await
}
