use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use store::{
    Document, DomainError, StoreError,
    models::{Conversation, Donation, DonationRef, PopulatedConversation, conversation::PAIR_INDEX},
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{AppJson, AppPath},
    notify,
    populate::{Directory, donation_refs},
    state::AppState,
};

/// Reads of a freshly claimed pair may land before the winner's insert.
const PAIR_LOOKUP_ATTEMPTS: usize = 5;
const PAIR_LOOKUP_DELAY: Duration = Duration::from_millis(20);

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler))
        .route("/for-donation/{donation_id}", post(open_handler))
        .route("/{id}", get(detail_handler))
        .route("/{id}/messages", post(message_handler))
}

#[derive(Deserialize)]
pub struct NewMessage {
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<String>,
}

async fn populated(
    state: &AppState,
    conversations: Vec<Conversation>,
) -> Result<Vec<PopulatedConversation>, AppError> {
    let directory = Directory::load(
        &state.db,
        conversations
            .iter()
            .flat_map(|conversation| conversation.participants.iter().copied()),
    )
    .await?;
    let donations = donation_refs(
        &state.db,
        conversations.iter().map(|conversation| conversation.donation),
    )
    .await?;

    Ok(conversations
        .into_iter()
        .map(|conversation| {
            conversation.populate(
                |id| directory.contact(id),
                |id| donations.get(&id).cloned().unwrap_or(DonationRef::Id(id)),
            )
        })
        .collect())
}

pub async fn open_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(donation_id): AppPath<Uuid>,
) -> Result<Json<Conversation>, AppError> {
    let donation = state.db.fetch::<Donation>(donation_id).await?;
    if donation.donor == user.id {
        return Err(AppError::BadRequest(
            "Cannot start conversation with yourself".to_string(),
        ));
    }

    let key = Conversation::pair_key(donation.id, user.id);
    let id = Uuid::new_v4();

    if state.db.claim(PAIR_INDEX, &key, id).await? {
        let conversation = Conversation::new(id, donation.id, vec![user.id, donation.donor], Utc::now());
        if let Err(e) = state.db.insert(&conversation).await {
            if let Err(release) = state.db.release(PAIR_INDEX, &key).await {
                error!("Failed to release conversation claim {key}: {release}");
            }
            return Err(e.into());
        }
        info!(conversation = %id, donation = %donation.id, "Conversation started");
        return Ok(Json(conversation));
    }

    let existing = state
        .db
        .owner(PAIR_INDEX, &key)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Conversation claim {key} has no owner")))?;

    for _ in 0..PAIR_LOOKUP_ATTEMPTS {
        if let Some(conversation) = state.db.get::<Conversation>(existing).await? {
            return Ok(Json(conversation));
        }
        debug!(conversation = %existing, "Claimed conversation not written yet");
        tokio::time::sleep(PAIR_LOOKUP_DELAY).await;
    }

    // The winner is still writing, or failed and is about to release the claim.
    Err(StoreError::Conflict {
        collection: Conversation::COLLECTION,
        id: existing,
    }
    .into())
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PopulatedConversation>>, AppError> {
    let mut conversations = state
        .db
        .find(|conversation: &Conversation| conversation.includes(user.id))
        .await?;
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    Ok(Json(populated(&state, conversations).await?))
}

pub async fn detail_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PopulatedConversation>, AppError> {
    let conversation = state.db.fetch::<Conversation>(id).await?;
    if !conversation.includes(user.id) {
        return Err(DomainError::Forbidden("Not authorized").into());
    }

    populated(&state, vec![conversation])
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::Internal("Conversation vanished while populating".to_string()))
}

pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<NewMessage>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = state
        .db
        .update::<Conversation, AppError, _>(id, |conversation| {
            Ok(conversation.post(
                user.id,
                payload.text.clone(),
                payload.attachments.clone(),
                Utc::now(),
            )?)
        })
        .await?;

    let title = match state.db.get::<Donation>(conversation.donation).await? {
        Some(donation) => donation.title,
        None => "your donation".to_string(),
    };

    for participant in conversation.participants.iter().filter(|p| **p != user.id) {
        notify::deliver(
            &state,
            *participant,
            notify::new_message(&conversation, &user, &title),
        )
        .await;
    }

    Ok(Json(conversation))
}
