use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{database::Document, error::DomainError};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Request,
    Approval,
    Cancellation,
    Rejection,
    Completion,
    PickupProposed,
    PickupAccepted,
    PickupConfirmed,
    Message,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";
    const KIND: &'static str = "Notification";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Notification {
    pub fn new(
        user: Uuid,
        kind: NotificationKind,
        title: String,
        body: String,
        link: Option<String>,
        meta: Option<Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            kind,
            title,
            body,
            link,
            meta,
            read: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_read(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.user != actor {
            return Err(DomainError::Forbidden("Not authorized"));
        }

        self.read = true;
        self.updated_at = now;
        Ok(())
    }
}
