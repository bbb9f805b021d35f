use super::*;
use crate::database::tests::{new_movie, temporary_db};
use crate::database::{AvatarDb, MovieDb};
use actix_web::{test, App};
use serde_json::{json, Value};

fn test_config() -> Config {
    Config {
        bcrypt_cost: 4,
        seed: false,
        ..Config::default()
    }
}

macro_rules! test_app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .wrap(identity_service(&test_config()))
                .data($db.clone())
                .data(test_config())
                .configure(configure),
        )
        .await
    };
}

async fn body_json<B: actix_web::body::MessageBody>(
    resp: actix_web::dev::ServiceResponse<B>,
) -> Value {
    serde_json::from_slice(&test::read_body(resp).await).unwrap()
}

macro_rules! sign_up {
    ($app:expr, $email:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/sign-up")
            .set_json(&json!({
                "name": "Viewer",
                "email": $email,
                "password": "correct horse",
            }))
            .to_request();
        let resp = test::call_service(&mut $app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.response().cookies().next().unwrap().into_owned();
        let profile = body_json(resp).await;
        (cookie, profile["id"].as_str().unwrap().to_owned())
    }};
}

#[actix_rt::test]
async fn bookmark_round_trip() {
    let db = temporary_db();
    let mut app = test_app!(db);
    let (cookie, user_id) = sign_up!(app, "viewer@example.com");

    for movie_id in &[5, 10, 22] {
        let req = test::TestRequest::post()
            .uri("/api/bookmarks/add")
            .cookie(cookie.clone())
            .set_json(&json!({ "movieId": movie_id }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    for path in &["is-bookmarked", "check", "check-simple"] {
        let req = test::TestRequest::get()
            .uri(&format!(
                "/api/bookmarks/{}?userId={}&movieId=10",
                path, user_id
            ))
            .to_request();
        let body: Value = test::read_response_json(&mut app, req).await;
        assert_eq!(body, json!({ "isBookmarked": true }));
    }

    let req = test::TestRequest::post()
        .uri("/api/bookmarks/remove")
        .cookie(cookie.clone())
        .set_json(&json!({ "movieId": "10" }))
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body, json!({ "bookmarks": [5, 22] }));

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookmarks?userId={}", user_id))
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body, json!({ "bookmarks": [5, 22] }));

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/bookmarks/is-bookmarked?userId={}&movieId=10",
            user_id
        ))
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body, json!({ "isBookmarked": false }));
}

#[actix_rt::test]
async fn mutation_needs_a_session() {
    let db = temporary_db();
    let mut app = test_app!(db);
    let req = test::TestRequest::post()
        .uri("/api/bookmarks/remove")
        .set_json(&json!({ "movieId": 3 }))
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[actix_rt::test]
async fn session_is_checked_before_the_body() {
    let db = temporary_db();
    let mut app = test_app!(db);
    for path in &["/api/bookmarks/add", "/api/bookmarks/remove"] {
        let req = test::TestRequest::post()
            .uri(path)
            .header("content-type", "text/plain")
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", path);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "UNAUTHORIZED", "{}", path);
        assert!(body["error"].is_string());
    }
}

#[actix_rt::test]
async fn malformed_body_gets_the_error_envelope() {
    let db = temporary_db();
    let mut app = test_app!(db);
    let (cookie, _) = sign_up!(app, "typist@example.com");

    for payload in &["not json", "", "{\"movieId\": 4"] {
        let req = test::TestRequest::post()
            .uri("/api/bookmarks/add")
            .cookie(cookie.clone())
            .set_payload(*payload)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{:?}", payload);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "INVALID_BODY", "{:?}", payload);
    }

    // JSON sent without a JSON content type is still read.
    let req = test::TestRequest::post()
        .uri("/api/bookmarks/add")
        .cookie(cookie)
        .header("content-type", "text/plain")
        .set_payload(r#"{"movieId": 4}"#)
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "bookmarks": [4] }));
}

#[actix_rt::test]
async fn mutation_refuses_foreign_identity() {
    let db = temporary_db();
    let mut app = test_app!(db);
    let (cookie, _) = sign_up!(app, "owner@example.com");
    let req = test::TestRequest::post()
        .uri("/api/bookmarks/remove")
        .cookie(cookie)
        .set_json(&json!({ "movieId": 3, "userId": "other" }))
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "USER_ID_NOT_ALLOWED");
    assert!(body["error"].is_string());
}

#[actix_rt::test]
async fn lookup_errors() {
    let db = temporary_db();
    let mut app = test_app!(db);

    let cases = vec![
        (
            "/api/bookmarks/check?userId=nobody&movieId=1",
            StatusCode::NOT_FOUND,
            "USER_NOT_FOUND",
        ),
        (
            "/api/bookmarks/check?movieId=1",
            StatusCode::BAD_REQUEST,
            "MISSING_USER_ID",
        ),
        (
            "/api/bookmarks/check?userId=x",
            StatusCode::BAD_REQUEST,
            "MISSING_MOVIE_ID",
        ),
        (
            "/api/bookmarks/check?userId=x&movieId=abc",
            StatusCode::BAD_REQUEST,
            "INVALID_MOVIE_ID",
        ),
        ("/api/bookmarks", StatusCode::BAD_REQUEST, "MISSING_USER_ID"),
        (
            "/api/bookmarks?userId=nobody",
            StatusCode::NOT_FOUND,
            "USER_NOT_FOUND",
        ),
    ];
    for (uri, status, code) in cases {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), status, "{}", uri);
        let body = body_json(resp).await;
        assert_eq!(body["code"], code, "{}", uri);
    }
}

#[actix_rt::test]
async fn movie_catalog() {
    let db = temporary_db();
    let heat = db.add_movie(new_movie("Heat")).unwrap();
    db.add_movie(new_movie("Dark City")).unwrap();
    db.add_movie(new_movie("The Dark Knight")).unwrap();
    let mut app = test_app!(db);

    let req = test::TestRequest::get().uri("/api/movies").to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[0]["title"], "Heat");
    assert_eq!(body[0]["releaseYear"], 1994);

    let req = test::TestRequest::get()
        .uri("/api/movies?limit=1&offset=1")
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Dark City");

    let req = test::TestRequest::get()
        .uri("/api/movies?search=dark")
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri(&format!("/api/movies?id={}", heat.id))
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body["id"], heat.id);

    let req = test::TestRequest::get()
        .uri(&format!("/api/movies/{}", heat.id))
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body["title"], "Heat");

    for (uri, status, code) in vec![
        ("/api/movies/abc", StatusCode::BAD_REQUEST, "INVALID_ID"),
        ("/api/movies?id=abc", StatusCode::BAD_REQUEST, "INVALID_ID"),
        ("/api/movies/9999", StatusCode::NOT_FOUND, "MOVIE_NOT_FOUND"),
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), status, "{}", uri);
        let body = body_json(resp).await;
        assert_eq!(body["code"], code, "{}", uri);
    }
}

#[actix_rt::test]
async fn avatar_list() {
    let db = temporary_db();
    db.add_avatar("/avatars/1.gif").unwrap();
    let mut app = test_app!(db);
    let req = test::TestRequest::get().uri("/api/avatars").to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body[0]["url"], "/avatars/1.gif");
}

#[actix_rt::test]
async fn accounts() {
    let db = temporary_db();
    let mut app = test_app!(db);
    let (cookie, user_id) = sign_up!(app, "Fan@Example.com");

    let req = test::TestRequest::get()
        .uri("/api/auth/session")
        .cookie(cookie.clone())
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body["id"], user_id.as_str());
    assert_eq!(body["email"], "fan@example.com");
    assert!(body.get("passwordHash").is_none());

    let req = test::TestRequest::post()
        .uri("/api/auth/check-user")
        .set_json(&json!({ "email": "fan@example.com" }))
        .to_request();
    let body: Value = test::read_response_json(&mut app, req).await;
    assert_eq!(body, json!({ "exists": true }));

    let req = test::TestRequest::post()
        .uri("/api/auth/check-user")
        .set_json(&json!({}))
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/auth/sign-up")
        .set_json(&json!({
            "name": "Again",
            "email": "fan@example.com",
            "password": "another password",
        }))
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/auth/sign-up")
        .set_json(&json!({
            "name": "Short",
            "email": "s@example.com",
            "password": "x",
        }))
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/auth/sign-in")
        .set_json(&json!({
            "email": "fan@example.com",
            "password": "wrong password",
        }))
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/sign-in")
        .set_json(&json!({
            "email": "fan@example.com",
            "password": "correct horse",
        }))
        .to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/auth/session").to_request();
    let resp = test::call_service(&mut app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
