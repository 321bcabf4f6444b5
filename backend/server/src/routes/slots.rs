use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use serde::Deserialize;
use store::{
    DomainError,
    models::{Donation, PickupSlot, UserRef},
};
use uuid::Uuid;

use super::Ack;
use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{AppJson, AppPath},
    notify::{self, Notice},
    populate::Directory,
    state::AppState,
    utils::{non_empty, parse_time},
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/propose", post(propose_handler))
        .route("/donation/{donation_id}", get(list_handler))
        .route("/{id}/accept", put(accept_handler))
        .route("/{id}/confirm", put(confirm_handler))
        .route("/{id}", delete(cancel_handler))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    donation_id: Uuid,
    proposed_time: String,
    message: Option<String>,
}

pub async fn propose_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<Proposal>,
) -> Result<(StatusCode, Json<PickupSlot>), AppError> {
    let donation = state.db.fetch::<Donation>(payload.donation_id).await?;
    if donation.donor == user.id {
        return Err(AppError::BadRequest(
            "Donor cannot propose a pickup for their own item".to_string(),
        ));
    }

    let proposed_time = parse_time(&payload.proposed_time).ok_or_else(|| {
        AppError::BadRequest("\"proposedTime\" must be a valid date".to_string())
    })?;

    let slot = PickupSlot::new(
        donation.id,
        user.id,
        donation.donor,
        proposed_time,
        non_empty(payload.message),
        Utc::now(),
    );
    state.db.insert(&slot).await?;

    notify::deliver(&state, donation.donor, notify::pickup_proposed(&donation, &slot)).await;

    Ok((StatusCode::CREATED, Json(slot)))
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(donation_id): AppPath<Uuid>,
) -> Result<Json<Vec<PickupSlot<UserRef>>>, AppError> {
    let donation = state.db.fetch::<Donation>(donation_id).await?;
    if !donation.is_party(user.id) {
        return Err(DomainError::Forbidden("Not authorized").into());
    }

    let mut slots = state
        .db
        .find(|slot: &PickupSlot| slot.donation == donation.id)
        .await?;
    slots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let directory = Directory::load(&state.db, slots.iter().map(|slot| slot.proposer)).await?;

    Ok(Json(
        slots
            .into_iter()
            .map(|slot| slot.populate(|id| directory.contact(id)))
            .collect(),
    ))
}

/// Applies `step` to the slot and tells the proposer.
async fn settle<F>(
    state: &AppState,
    id: Uuid,
    mut step: F,
    notice: fn(&Donation, &PickupSlot) -> Notice,
) -> Result<Json<PickupSlot>, AppError>
where
    F: FnMut(&mut PickupSlot) -> Result<(), DomainError> + Send,
{
    let slot = state
        .db
        .update::<PickupSlot, AppError, _>(id, |slot| Ok(step(slot)?))
        .await?;

    if let Some(donation) = state.db.get::<Donation>(slot.donation).await? {
        notify::deliver(state, slot.proposer, notice(&donation, &slot)).await;
    }

    Ok(Json(slot))
}

pub async fn accept_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PickupSlot>, AppError> {
    settle(
        &state,
        id,
        |slot| slot.accept(user.id, Utc::now()),
        notify::pickup_accepted,
    )
    .await
}

pub async fn confirm_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PickupSlot>, AppError> {
    settle(
        &state,
        id,
        |slot| slot.confirm(user.id, Utc::now()),
        notify::pickup_confirmed,
    )
    .await
}

pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Ack>, AppError> {
    state
        .db
        .update::<PickupSlot, AppError, _>(id, |slot| Ok(slot.cancel(user.id, Utc::now())?))
        .await?;

    Ok(Json(Ack::new("Cancelled")))
}
