use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use store::models::{Donation, Role, User, UserRef, user::EMAIL_INDEX};
use tracing::{error, info};
use uuid::Uuid;

use super::Ack;
use crate::{
    auth::{AuthUser, hash_password, verify_password},
    error::AppError,
    extract::{AppJson, AppPath},
    populate::Directory,
    state::AppState,
    utils::{bounded, is_valid_email, non_empty, normalize_email},
};

const MIN_PASSWORD: usize = 6;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/profile", get(profile_handler).put(update_profile_handler))
        .route("/saved", get(saved_handler))
        .route("/saved/{id}", post(save_handler).delete(unsave_handler))
}

#[derive(Deserialize)]
pub struct Register {
    fullname: String,
    email: String,
    password: String,
    role: Role,
}

#[derive(Deserialize)]
pub struct Login {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct UpdateProfile {
    fullname: Option<String>,
    email: Option<String>,
    password: Option<String>,
    phone: Option<String>,
    address: Option<String>,
}

#[derive(Serialize)]
pub struct Session {
    #[serde(rename = "_id")]
    id: Uuid,
    fullname: String,
    email: String,
    role: Role,
    token: String,
}

/// A user as the owner sees it: everything but the password hash.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id")]
    id: Uuid,
    fullname: String,
    email: String,
    role: Role,
    phone: Option<String>,
    address: Option<String>,
    saved_items: Vec<Uuid>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname,
            email: user.email,
            role: user.role,
            phone: user.phone,
            address: user.address,
            saved_items: user.saved_items,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn validated_email(raw: &str) -> Result<String, AppError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest(
            "\"email\" must be a valid email".to_string(),
        ));
    }

    Ok(email)
}

fn validated_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD {
        return Err(AppError::BadRequest(format!(
            "\"password\" length must be at least {MIN_PASSWORD} characters long"
        )));
    }

    Ok(())
}

fn session(state: &AppState, user: &User) -> Result<Session, AppError> {
    Ok(Session {
        id: user.id,
        fullname: user.fullname.clone(),
        email: user.email.clone(),
        role: user.role,
        token: state.keys.issue(user.id)?,
    })
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<Register>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let fullname = bounded("fullname", &payload.fullname, 2, 100)?;
    let email = validated_email(&payload.email)?;
    validated_password(&payload.password)?;

    let password = hash_password(payload.password).await?;
    let user = User::new(
        Uuid::new_v4(),
        fullname,
        email,
        password,
        payload.role,
        Utc::now(),
    );

    if !state.db.claim(EMAIL_INDEX, &user.email, user.id).await? {
        return Err(AppError::BadRequest(
            "User with this email already exists".to_string(),
        ));
    }

    if let Err(e) = state.db.insert(&user).await {
        release_email(&state, &user.email).await;
        return Err(e.into());
    }

    info!("New user registered: {}", user.email);

    Ok((StatusCode::CREATED, Json(session(&state, &user)?)))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<Login>,
) -> Result<Json<Session>, AppError> {
    const INVALID: AppError = AppError::Unauthorized("Invalid email or password");

    let email = normalize_email(&payload.email);
    let Some(user_id) = state.db.owner(EMAIL_INDEX, &email).await? else {
        return Err(INVALID);
    };
    let Some(user) = state.db.get::<User>(user_id).await? else {
        return Err(INVALID);
    };

    if !verify_password(payload.password, user.password.clone()).await? {
        return Err(INVALID);
    }

    Ok(Json(session(&state, &user)?))
}

pub async fn profile_handler(AuthUser(user): AuthUser) -> Json<Profile> {
    Json(Profile::from(user))
}

pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<UpdateProfile>,
) -> Result<Json<Profile>, AppError> {
    let fullname = match &payload.fullname {
        Some(fullname) => Some(bounded("fullname", fullname, 2, 100)?),
        None => None,
    };

    let password = match non_empty(payload.password) {
        Some(password) => {
            validated_password(&password)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let email = match &payload.email {
        Some(raw) => Some(validated_email(raw)?).filter(|email| *email != user.email),
        None => None,
    };
    if let Some(email) = &email {
        if !state.db.claim(EMAIL_INDEX, email, user.id).await? {
            return Err(AppError::BadRequest("Email already in use".to_string()));
        }
    }

    // Present but blank clears the field; absent leaves it alone.
    let phone = payload.phone.map(|phone| non_empty(Some(phone)));
    let address = payload.address.map(|address| non_empty(Some(address)));

    // Hands back the address being replaced, which may differ from `user.email` under a race.
    let updated = state
        .db
        .update_with::<User, Option<String>, AppError, _>(user.id, |doc| {
            if let Some(fullname) = &fullname {
                doc.fullname = fullname.clone();
            }
            let previous = email
                .as_ref()
                .map(|email| std::mem::replace(&mut doc.email, email.clone()));
            if let Some(password) = &password {
                doc.password = password.clone();
            }
            if let Some(phone) = &phone {
                doc.phone = phone.clone();
            }
            if let Some(address) = &address {
                doc.address = address.clone();
            }
            doc.updated_at = Utc::now();
            Ok(previous)
        })
        .await;

    match (&updated, &email) {
        (Ok((_, Some(previous))), _) => release_email(&state, previous).await,
        (Err(_), Some(email)) => release_email(&state, email).await,
        _ => {}
    }

    let (updated, _) = updated?;
    Ok(Json(Profile::from(updated)))
}

// The caller's outcome is already decided; a stale claim only blocks that address.
async fn release_email(state: &AppState, email: &str) {
    if let Err(e) = state.db.release(EMAIL_INDEX, email).await {
        error!("Failed to release email claim for {email}: {e}");
    }
}

pub async fn saved_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Donation<UserRef>>>, AppError> {
    let mut donations = Vec::new();
    for id in &user.saved_items {
        if let Some(donation) = state.db.get::<Donation>(*id).await? {
            donations.push(donation);
        }
    }

    let directory = Directory::load(&state.db, donations.iter().map(|d| d.donor)).await?;

    Ok(Json(
        donations
            .into_iter()
            .map(|donation| donation.populate(|id| directory.named(id)))
            .collect(),
    ))
}

pub async fn save_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(donation_id): AppPath<Uuid>,
) -> Result<(StatusCode, Json<Ack>), AppError> {
    state.db.fetch::<Donation>(donation_id).await?;

    let (_, added) = state
        .db
        .update_with::<User, _, AppError, _>(user.id, |doc| {
            Ok(doc.save_item(donation_id, Utc::now()))
        })
        .await?;

    if added {
        Ok((StatusCode::CREATED, Json(Ack::new("Saved"))))
    } else {
        Ok((StatusCode::OK, Json(Ack::new("Already saved"))))
    }
}

pub async fn unsave_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(donation_id): AppPath<Uuid>,
) -> Result<Json<Ack>, AppError> {
    state
        .db
        .update::<User, AppError, _>(user.id, |doc| {
            doc.unsave_item(donation_id, Utc::now());
            Ok(())
        })
        .await?;

    Ok(Json(Ack::new("Removed")))
}
