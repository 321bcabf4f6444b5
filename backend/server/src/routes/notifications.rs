use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use chrono::Utc;
use serde::Serialize;
use store::models::Notification;
use uuid::Uuid;

use crate::{auth::AuthUser, error::AppError, extract::AppPath, state::AppState};

const LIMIT: usize = 100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler))
        .route("/read-all", put(read_all_handler))
        .route("/{id}/read", put(read_handler))
}

#[derive(Serialize)]
pub struct ReadAll {
    updated: usize,
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Notification>>, AppError> {
    let mut notifications = state
        .db
        .find(|notification: &Notification| notification.user == user.id)
        .await?;
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications.truncate(LIMIT);

    Ok(Json(notifications))
}

pub async fn read_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state
        .db
        .update::<Notification, AppError, _>(id, |notification| {
            Ok(notification.mark_read(user.id, Utc::now())?)
        })
        .await?;

    Ok(Json(notification))
}

pub async fn read_all_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<ReadAll>, AppError> {
    let unread = state
        .db
        .find(|notification: &Notification| notification.user == user.id && !notification.read)
        .await?;

    let mut updated = 0;
    for notification in unread {
        state
            .db
            .update::<Notification, AppError, _>(notification.id, |notification| {
                Ok(notification.mark_read(user.id, Utc::now())?)
            })
            .await?;
        updated += 1;
    }

    Ok(Json(ReadAll { updated }))
}
