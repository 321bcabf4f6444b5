use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use store::{
    DomainError,
    models::{Donation, DonationStatus, Rating, RatingSummary, UserRef, rating::RATER_INDEX},
};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{AppJson, AppPath},
    populate::Directory,
    state::AppState,
    utils::non_empty,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(rate_handler))
        .route("/donation/{donation_id}", get(donation_handler))
        .route("/donor/{donor_id}", get(donor_handler))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    donation_id: Uuid,
    stars: i64,
    comment: Option<String>,
}

async fn with_raters(
    state: &AppState,
    ratings: Vec<Rating>,
) -> Result<Vec<Rating<UserRef>>, AppError> {
    let directory = Directory::load(&state.db, ratings.iter().map(|rating| rating.rater)).await?;

    Ok(ratings
        .into_iter()
        .map(|rating| rating.populate(|id| directory.named(id)))
        .collect())
}

pub async fn rate_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<NewRating>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    let donation = state.db.fetch::<Donation>(payload.donation_id).await?;
    if donation.requested_by != Some(user.id) {
        return Err(DomainError::Forbidden("Only the requester can rate this donation").into());
    }
    if donation.status != DonationStatus::Donated {
        return Err(AppError::BadRequest(
            "Donation not marked as donated yet".to_string(),
        ));
    }

    let rating = Rating::new(
        donation.id,
        user.id,
        donation.donor,
        payload.stars,
        non_empty(payload.comment),
        Utc::now(),
    )?;

    let key = Rating::rater_key(donation.id, user.id);
    if !state.db.claim(RATER_INDEX, &key, rating.id).await? {
        return Err(AppError::BadRequest(
            "You have already rated this donation".to_string(),
        ));
    }

    if let Err(e) = state.db.insert(&rating).await {
        if let Err(release) = state.db.release(RATER_INDEX, &key).await {
            error!("Failed to release rating claim {key}: {release}");
        }
        return Err(e.into());
    }

    info!(donation = %donation.id, stars = rating.stars, "Donation rated");

    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn donation_handler(
    State(state): State<Arc<AppState>>,
    AppPath(donation_id): AppPath<Uuid>,
) -> Result<Json<Vec<Rating<UserRef>>>, AppError> {
    let ratings = state
        .db
        .find(|rating: &Rating| rating.donation == donation_id)
        .await?;

    Ok(Json(with_raters(&state, ratings).await?))
}

pub async fn donor_handler(
    State(state): State<Arc<AppState>>,
    AppPath(donor_id): AppPath<Uuid>,
) -> Result<Json<RatingSummary<UserRef>>, AppError> {
    let ratings = state
        .db
        .find(|rating: &Rating| rating.donor == donor_id)
        .await?;

    Ok(Json(RatingSummary::new(with_raters(&state, ratings).await?)))
}
