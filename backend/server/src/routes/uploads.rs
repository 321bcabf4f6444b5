use std::{path::Path, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, State},
    routing::post,
};
use chrono::Utc;
use serde::Serialize;
use store::models::ImageLinks;
use tokio::fs;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    images::{self, MAX_FILE_SIZE, MAX_FILES, StoredImage},
    state::AppState,
    utils::join_url,
};

const FIELD: &str = "images";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(upload_handler))
}

#[derive(Serialize)]
pub struct Uploaded {
    message: &'static str,
    images: Vec<ImageLinks>,
}

struct Upload {
    extension: &'static str,
    bytes: Bytes,
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FIELD) {
            return Err(AppError::BadRequest(format!(
                "Unexpected field, expected \"{FIELD}\""
            )));
        }
        if uploads.len() == MAX_FILES {
            return Err(AppError::BadRequest(format!(
                "At most {MAX_FILES} files per upload"
            )));
        }

        let extension = images::accepted_extension(
            field.file_name().unwrap_or_default(),
            field.content_type().unwrap_or_default(),
        )?;

        let bytes = field.bytes().await?;
        if bytes.len() > MAX_FILE_SIZE {
            return Err(AppError::PayloadTooLarge("File too large"));
        }

        uploads.push(Upload { extension, bytes });
    }

    Ok(uploads)
}

async fn store_upload(dir: &Path, upload: Upload) -> Result<StoredImage, AppError> {
    let dir = dir.to_path_buf();
    let stem = format!(
        "{FIELD}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    );

    let stored = tokio::task::spawn_blocking(move || {
        images::store(&upload.bytes, &dir, &stem, upload.extension)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Image task failed: {e}")))??;

    Ok(stored)
}

pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Uploaded>, AppError> {
    let uploads = read_uploads(multipart).await?;
    if uploads.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".to_string()));
    }

    let dir = state.config.upload_dir.clone();
    fs::create_dir_all(&dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {e}", dir.display());
        AppError::ImageProcessing(e.to_string())
    })?;

    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match store_upload(&dir, upload).await {
            Ok(image) => stored.push(image),
            Err(e) => {
                // All or nothing: drop what this request already wrote.
                let _ = tokio::task::spawn_blocking(move || {
                    for image in &stored {
                        images::discard(&dir, image);
                    }
                })
                .await;
                return Err(e);
            }
        }
    }

    let links: Vec<_> = stored
        .iter()
        .map(|image| ImageLinks {
            image: join_url(&state.config.server_url, &format!("uploads/{}", image.image)),
            thumbnail: join_url(
                &state.config.server_url,
                &format!("uploads/{}", image.thumbnail),
            ),
        })
        .collect();

    info!("Stored {} uploaded image(s)", links.len());

    Ok(Json(Uploaded {
        message: "Images Uploaded",
        images: links,
    }))
}
