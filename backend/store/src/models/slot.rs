use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{database::Document, error::DomainError};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Proposed,
    Accepted,
    Confirmed,
    Cancelled,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotStatus::Proposed => "proposed",
            SlotStatus::Accepted => "accepted",
            SlotStatus::Confirmed => "confirmed",
            SlotStatus::Cancelled => "cancelled",
        };

        f.write_str(name)
    }
}

/// A pickup time proposed by a would-be recipient.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PickupSlot<U = Uuid> {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub donation: Uuid,
    pub proposer: U,
    pub donor: Uuid,
    pub proposed_at: DateTime<Utc>,
    pub proposed_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: SlotStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for PickupSlot {
    const COLLECTION: &'static str = "slots";
    const KIND: &'static str = "Slot";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl PickupSlot {
    pub fn new(
        donation: Uuid,
        proposer: Uuid,
        donor: Uuid,
        proposed_time: DateTime<Utc>,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            donation,
            proposer,
            donor,
            proposed_at: now,
            proposed_time,
            message,
            status: SlotStatus::Proposed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn accept(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.donor != actor {
            return Err(DomainError::Forbidden("Not authorized"));
        }
        if self.status != SlotStatus::Proposed {
            return Err(DomainError::SlotClosed(self.status));
        }

        self.status = SlotStatus::Accepted;
        self.updated_at = now;
        Ok(())
    }

    pub fn confirm(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_party(actor)?;
        match self.status {
            SlotStatus::Accepted | SlotStatus::Confirmed => {}
            SlotStatus::Proposed => return Err(DomainError::SlotNotAccepted),
            SlotStatus::Cancelled => return Err(DomainError::SlotClosed(self.status)),
        }

        self.status = SlotStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_party(actor)?;

        self.status = SlotStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    pub fn populate<V>(self, populate: impl FnOnce(Uuid) -> V) -> PickupSlot<V> {
        PickupSlot {
            id: self.id,
            donation: self.donation,
            proposer: populate(self.proposer),
            donor: self.donor,
            proposed_at: self.proposed_at,
            proposed_time: self.proposed_time,
            message: self.message,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn ensure_party(&self, actor: Uuid) -> Result<(), DomainError> {
        if self.donor == actor || self.proposer == actor {
            Ok(())
        } else {
            Err(DomainError::Forbidden("Not authorized"))
        }
    }
}
