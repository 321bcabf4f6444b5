use thiserror::Error;
use uuid::Uuid;

use crate::models::SlotStatus;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found")]
    NotFound { kind: &'static str },

    #[error("Concurrent update on {collection}/{id}")]
    Conflict { collection: &'static str, id: Uuid },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Rule violations raised by the document models themselves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Donation is no longer available")]
    NotAvailable,

    #[error("You cannot request your own donation")]
    OwnDonation,

    #[error("No requester found for this donation")]
    NoRequester,

    #[error("No active request to reject")]
    NoActiveRequest,

    #[error("Donation must be approved before it is completed")]
    NotApproved,

    #[error("Donation has already been donated")]
    AlreadyDonated,

    #[error("Pickup slot is already {0}")]
    SlotClosed(SlotStatus),

    #[error("Pickup slot has not been accepted yet")]
    SlotNotAccepted,

    #[error("Message text is required")]
    EmptyMessage,

    #[error("Stars must be between 1 and 5")]
    InvalidStars,
}
