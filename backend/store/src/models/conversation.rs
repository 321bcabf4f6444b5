use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    database::Document,
    error::DomainError,
    models::{donation::Donation, user::UserRef},
};

/// Unique index from `<donation>:<requester>` to the conversation id.
pub const PAIR_INDEX: &str = "conversation-pair";

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub sender: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Messages between a donor and one interested user about one donation.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Conversation<P = Uuid, D = Uuid> {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub participants: Vec<P>,
    pub donation: D,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Conversation {
    const COLLECTION: &'static str = "conversations";
    const KIND: &'static str = "Conversation";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Conversation {
    pub fn new(id: Uuid, donation: Uuid, participants: Vec<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            participants,
            donation,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pair_key(donation: Uuid, requester: Uuid) -> String {
        format!("{donation}:{requester}")
    }

    pub fn includes(&self, user: Uuid) -> bool {
        self.participants.contains(&user)
    }

    pub fn post(
        &mut self,
        sender: Uuid,
        text: Option<String>,
        attachments: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.includes(sender) {
            return Err(DomainError::Forbidden("Not a participant"));
        }

        let text = text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if text.is_none() && attachments.is_empty() {
            return Err(DomainError::EmptyMessage);
        }

        self.messages.push(Message {
            id: Uuid::new_v4(),
            sender,
            text,
            attachments,
            created_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn populate<P, D>(
        self,
        participant: impl FnMut(Uuid) -> P,
        donation: impl FnOnce(Uuid) -> D,
    ) -> Conversation<P, D> {
        Conversation {
            id: self.id,
            participants: self.participants.into_iter().map(participant).collect(),
            donation: donation(self.donation),
            messages: self.messages,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonationSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl<U> From<&Donation<U>> for DonationSummary {
    fn from(donation: &Donation<U>) -> Self {
        Self {
            id: donation.id,
            title: donation.title.clone(),
            image_path: donation.image_path.clone(),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum DonationRef {
    Summary(DonationSummary),
    Id(Uuid),
}

/// Conversation as sent to clients.
pub type PopulatedConversation = Conversation<UserRef, DonationRef>;
