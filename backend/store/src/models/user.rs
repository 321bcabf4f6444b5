use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::Document;

/// Unique index from lowercase email to user id.
pub const EMAIL_INDEX: &str = "user-email";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Recipient,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub saved_items: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for User {
    const COLLECTION: &'static str = "users";
    const KIND: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl User {
    pub fn new(
        id: Uuid,
        fullname: String,
        email: String,
        password: String,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            fullname,
            email,
            password,
            role,
            phone: None,
            address: None,
            saved_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `false` when the donation was already saved.
    pub fn save_item(&mut self, donation: Uuid, now: DateTime<Utc>) -> bool {
        if self.saved_items.contains(&donation) {
            return false;
        }

        self.saved_items.push(donation);
        self.updated_at = now;
        true
    }

    pub fn unsave_item(&mut self, donation: Uuid, now: DateTime<Utc>) {
        self.saved_items.retain(|saved| *saved != donation);
        self.updated_at = now;
    }
}

/// Populated form of a user reference.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub fullname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserSummary {
    pub fn named(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: None,
        }
    }

    pub fn contact(user: &User) -> Self {
        Self {
            email: Some(user.email.clone()),
            ..Self::named(user)
        }
    }
}

/// A user reference that could be populated; dangling ids stay bare.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum UserRef {
    Summary(UserSummary),
    Id(Uuid),
}
