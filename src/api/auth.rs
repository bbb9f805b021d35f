use super::{log_error, session_user, ApiError, Db};
use crate::config::Config;
use crate::database::UserDb;
use crate::model::{NewUser, Profile};
use actix_identity::Identity;
use actix_web::{http::StatusCode, web, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct CheckUserParams {
    email: Option<String>,
}

#[derive(Serialize)]
struct CheckUserReply {
    exists: bool,
}

#[derive(Deserialize)]
pub struct SignUpParams {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    image: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInParams {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn plausible_email(email: &str) -> bool {
    let mut parts = email.trim().splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.contains('.')
        }
        _ => false,
    }
}

fn invalid_sign_up(message: &'static str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "INVALID_SIGN_UP", message)
}

fn invalid_credentials() -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "INVALID_CREDENTIALS",
        "Invalid email or password",
    )
}

pub async fn check_user(
    params: web::Json<CheckUserParams>,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let email = params
        .email
        .as_deref()
        .filter(|email| !email.is_empty())
        .ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "MISSING_EMAIL", "Email is required")
        })?;
    let exists = db
        .get_user_by_email(email)
        .map_err(|err| log_error(err, "Failed to check user"))?
        .is_some();
    Ok(HttpResponse::Ok().json(CheckUserReply { exists }))
}

pub async fn sign_up(
    params: web::Json<SignUpParams>,
    id: Identity,
    db: Db,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    if params.name.trim().is_empty() {
        return Err(invalid_sign_up("Name is required"));
    }
    if !plausible_email(&params.email) {
        return Err(invalid_sign_up("A valid email is required"));
    }
    if params.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid_sign_up("Password must be at least 8 characters"));
    }
    let password_hash = bcrypt::hash(&params.password, config.bcrypt_cost)
        .map_err(|err| log_error(err, "Hashing error"))?;
    let user = db
        .add_user(NewUser {
            name: params.name.trim().to_owned(),
            email: params.email,
            password_hash,
            image: params.image.filter(|image| !image.is_empty()),
        })
        .map_err(|err| log_error(err, "Database error"))?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::CONFLICT,
                "EMAIL_TAKEN",
                "An account with this email already exists",
            )
        })?;
    info!("Registered user {}", user.id);
    id.remember(user.id.clone());
    Ok(HttpResponse::Ok().json(Profile::from(&user)))
}

pub async fn sign_in(
    params: web::Json<SignInParams>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, ApiError> {
    let user = db
        .get_user_by_email(&params.email)
        .map_err(|err| log_error(err, "Database error"))?
        .ok_or_else(invalid_credentials)?;
    if !bcrypt::verify(&params.password, &user.password_hash)
        .map_err(|err| log_error(err, "Verification error"))?
    {
        return Err(invalid_credentials());
    }
    id.remember(user.id.clone());
    Ok(HttpResponse::Ok().json(Profile::from(&user)))
}

pub async fn sign_out(id: Identity) -> HttpResponse {
    id.forget();
    HttpResponse::Ok().json(serde_json::json!({ "success": true }))
}

pub async fn session(id: Identity, db: Db) -> Result<HttpResponse, ApiError> {
    let user_id = session_user(&id).ok_or_else(ApiError::unauthorized)?;
    match db
        .get_user(&user_id)
        .map_err(|err| log_error(err, "Database error"))?
    {
        Some(user) => Ok(HttpResponse::Ok().json(Profile::from(&user))),
        None => {
            // The account went away under a live cookie.
            id.forget();
            Err(ApiError::unauthorized())
        }
    }
}
