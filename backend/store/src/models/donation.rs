//! # Donations
//!
//! ## Lifecycle
//!
//! ```text
//! available --request--> requested --approve--> approved --complete--> donated
//!     ^                      |                     |
//!     +------cancel/reject---+---------------------+
//! ```
//!
//! - Only the donor approves, rejects or completes
//! - Only the current requester cancels
//! - `donated` is terminal
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{database::Document, error::DomainError};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Electronics,
    Furniture,
    Clothing,
    Books,
    Other,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    New,
    #[serde(rename = "Like New")]
    LikeNew,
    Good,
    Fair,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Available,
    Requested,
    Approved,
    Donated,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ImageLinks {
    pub image: String,
    pub thumbnail: String,
}

/// Donor-supplied fields of a new listing.
#[derive(Clone, Debug)]
pub struct Listing {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub condition: Condition,
    pub image_path: Option<String>,
    pub images: Vec<ImageLinks>,
}

/// A listed item. `U` is how user references are rendered: bare ids in
/// storage, summaries once populated.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Donation<U = Uuid> {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub donor: U,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<U>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageLinks>,
    pub status: DonationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Donation {
    const COLLECTION: &'static str = "donations";
    const KIND: &'static str = "Donation";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Donation {
    pub fn new(donor: Uuid, listing: Listing, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            donor,
            title: listing.title,
            description: listing.description,
            category: listing.category,
            condition: listing.condition,
            requested_by: None,
            image_path: listing.image_path,
            images: listing.images,
            status: DonationStatus::Available,
            approved_at: None,
            canceled_at: None,
            rejected_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn request(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != DonationStatus::Available {
            return Err(DomainError::NotAvailable);
        }
        if self.donor == actor {
            return Err(DomainError::OwnDonation);
        }

        self.status = DonationStatus::Requested;
        self.requested_by = Some(actor);
        self.updated_at = now;
        Ok(())
    }

    pub fn approve(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.donor != actor {
            return Err(DomainError::Forbidden(
                "Not authorized to approve this donation",
            ));
        }
        self.ensure_open()?;
        if self.requested_by.is_none() {
            return Err(DomainError::NoRequester);
        }

        self.status = DonationStatus::Approved;
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.requested_by != Some(actor) {
            return Err(DomainError::Forbidden(
                "Not authorized to cancel this request",
            ));
        }
        self.ensure_open()?;

        self.reopen(now);
        self.canceled_at = Some(now);
        Ok(())
    }

    /// Returns the requester whose request was turned down.
    pub fn reject(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<Uuid, DomainError> {
        if self.donor != actor {
            return Err(DomainError::Forbidden(
                "Not authorized to reject this request",
            ));
        }
        self.ensure_open()?;
        let requester = self.requested_by.ok_or(DomainError::NoActiveRequest)?;

        self.reopen(now);
        self.rejected_at = Some(now);
        Ok(requester)
    }

    pub fn complete(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.donor != actor {
            return Err(DomainError::Forbidden(
                "Not authorized to complete this donation",
            ));
        }
        self.ensure_open()?;
        if self.status != DonationStatus::Approved {
            return Err(DomainError::NotApproved);
        }

        self.status = DonationStatus::Donated;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn is_party(&self, user: Uuid) -> bool {
        self.donor == user || self.requested_by == Some(user)
    }

    /// Listing filter: exact category/condition, case-insensitive substring
    /// search over title and description.
    pub fn matches(
        &self,
        search: Option<&str>,
        category: Option<Category>,
        condition: Option<Condition>,
    ) -> bool {
        if category.is_some_and(|category| category != self.category) {
            return false;
        }
        if condition.is_some_and(|condition| condition != self.condition) {
            return false;
        }

        match search.map(str::to_lowercase) {
            Some(needle) => {
                self.title.to_lowercase().contains(&needle)
                    || self.description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }

    /// Renders user references through `populate`.
    pub fn populate<V>(self, mut populate: impl FnMut(Uuid) -> V) -> Donation<V> {
        Donation {
            id: self.id,
            donor: populate(self.donor),
            title: self.title,
            description: self.description,
            category: self.category,
            condition: self.condition,
            requested_by: self.requested_by.map(&mut populate),
            image_path: self.image_path,
            images: self.images,
            status: self.status,
            approved_at: self.approved_at,
            canceled_at: self.canceled_at,
            rejected_at: self.rejected_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        match self.status {
            DonationStatus::Donated => Err(DomainError::AlreadyDonated),
            _ => Ok(()),
        }
    }

    fn reopen(&mut self, now: DateTime<Utc>) {
        self.status = DonationStatus::Available;
        self.requested_by = None;
        self.approved_at = None;
        self.updated_at = now;
    }
}
