use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use chrono::Utc;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use store::{
    DomainError,
    models::{Category, Condition, Donation, DonationStatus, ImageLinks, Listing, UserRef},
};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    images::MAX_FILES,
    notify::{self, Notice},
    populate::Directory,
    state::AppState,
    utils::{bounded, non_empty},
};

type PopulatedDonation = Donation<UserRef>;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler).post(create_handler))
        .route("/mydonations", get(my_donations_handler))
        .route("/myrequests", get(my_requests_handler))
        .route("/{id}", get(detail_handler))
        .route("/{id}/request", put(request_handler))
        .route("/{id}/approve", put(approve_handler))
        .route("/{id}/cancel", put(cancel_handler))
        .route("/{id}/reject", put(reject_handler))
        .route("/{id}/complete", put(complete_handler))
}

#[derive(Deserialize)]
pub struct Filters {
    search: Option<String>,
    category: Option<String>,
    condition: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDonation {
    title: String,
    description: String,
    category: Category,
    condition: Condition,
    image_path: Option<String>,
    #[serde(default)]
    images: Vec<ImageLinks>,
}

/// Blank filter values mean "any".
fn filter<T: DeserializeOwned>(field: &str, raw: Option<String>) -> Result<Option<T>, AppError> {
    non_empty(raw)
        .map(|value| {
            serde_json::from_value(Value::String(value))
                .map_err(|_| AppError::BadRequest(format!("\"{field}\" is not a valid option")))
        })
        .transpose()
}

async fn populated(
    state: &AppState,
    donations: Vec<Donation>,
    render: fn(&Directory, Uuid) -> UserRef,
) -> Result<Vec<PopulatedDonation>, AppError> {
    let directory = Directory::load(
        &state.db,
        donations
            .iter()
            .flat_map(|donation| std::iter::once(donation.donor).chain(donation.requested_by)),
    )
    .await?;

    Ok(donations
        .into_iter()
        .map(|donation| donation.populate(|id| render(&directory, id)))
        .collect())
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    AppQuery(filters): AppQuery<Filters>,
) -> Result<Json<Vec<PopulatedDonation>>, AppError> {
    let search = non_empty(filters.search);
    let category = filter::<Category>("category", filters.category)?;
    let condition = filter::<Condition>("condition", filters.condition)?;

    let mut donations = state
        .db
        .find(|donation: &Donation| {
            donation.status == DonationStatus::Available
                && donation.matches(search.as_deref(), category, condition)
        })
        .await?;
    donations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(populated(&state, donations, Directory::contact).await?))
}

pub async fn my_donations_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PopulatedDonation>>, AppError> {
    let mut donations = state
        .db
        .find(|donation: &Donation| donation.donor == user.id)
        .await?;
    donations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(populated(&state, donations, Directory::contact).await?))
}

pub async fn my_requests_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PopulatedDonation>>, AppError> {
    let mut donations = state
        .db
        .find(|donation: &Donation| donation.requested_by == Some(user.id))
        .await?;
    donations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    Ok(Json(populated(&state, donations, Directory::named).await?))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<NewDonation>,
) -> Result<(StatusCode, Json<Donation>), AppError> {
    if payload.images.len() > MAX_FILES {
        return Err(AppError::BadRequest(format!(
            "\"images\" must contain less than or equal to {MAX_FILES} items"
        )));
    }

    let listing = Listing {
        title: bounded("title", &payload.title, 3, 200)?,
        description: bounded("description", &payload.description, 10, 2000)?,
        category: payload.category,
        condition: payload.condition,
        image_path: non_empty(payload.image_path),
        images: payload.images,
    };

    let donation = Donation::new(user.id, listing, Utc::now());
    state.db.insert(&donation).await?;

    info!(donation = %donation.id, donor = %user.id, "Donation created");

    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn detail_handler(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PopulatedDonation>, AppError> {
    let donation = state.db.fetch::<Donation>(id).await?;

    let directory = Directory::load(
        &state.db,
        std::iter::once(donation.donor).chain(donation.requested_by),
    )
    .await?;

    Ok(Json(donation.populate(|id| directory.contact(id))))
}

/// Runs one lifecycle step; `step` returns who to notify.
async fn transition<F>(
    state: &AppState,
    id: Uuid,
    mut step: F,
    notice: fn(&Donation) -> Notice,
) -> Result<Json<Donation>, AppError>
where
    F: FnMut(&mut Donation) -> Result<Uuid, DomainError> + Send,
{
    let (donation, recipient) = state
        .db
        .update_with::<Donation, _, AppError, _>(id, |donation| Ok(step(donation)?))
        .await?;

    notify::deliver(state, recipient, notice(&donation)).await;

    Ok(Json(donation))
}

pub async fn request_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Donation>, AppError> {
    transition(
        &state,
        id,
        |donation| {
            donation.request(user.id, Utc::now())?;
            Ok(donation.donor)
        },
        notify::requested,
    )
    .await
}

pub async fn approve_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Donation>, AppError> {
    transition(
        &state,
        id,
        |donation| {
            donation.approve(user.id, Utc::now())?;
            donation.requested_by.ok_or(DomainError::NoRequester)
        },
        notify::approved,
    )
    .await
}

pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Donation>, AppError> {
    transition(
        &state,
        id,
        |donation| {
            donation.cancel(user.id, Utc::now())?;
            Ok(donation.donor)
        },
        notify::cancelled,
    )
    .await
}

pub async fn reject_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Donation>, AppError> {
    transition(
        &state,
        id,
        |donation| donation.reject(user.id, Utc::now()),
        notify::rejected,
    )
    .await
}

pub async fn complete_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Donation>, AppError> {
    transition(
        &state,
        id,
        |donation| {
            donation.complete(user.id, Utc::now())?;
            donation.requested_by.ok_or(DomainError::NoRequester)
        },
        notify::completed,
    )
    .await
}
