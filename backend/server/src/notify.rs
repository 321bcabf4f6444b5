//! # Notifications
//!
//! Every lifecycle step leaves an in-app notification for the other party and, for donation
//! decisions, an email.
//!
//! Delivery is best effort: failures are logged and never fail the request that triggered them.
//! Mail goes out on a background task, so a slow relay never holds up the response.
use chrono::Utc;
use serde_json::{Value, json};
use store::models::{Conversation, Donation, Notification, NotificationKind, PickupSlot, User};
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AppState;

pub struct Email {
    pub subject: &'static str,
    /// Everything after the greeting line.
    pub text: String,
}

pub struct Notice {
    pub kind: NotificationKind,
    pub title: &'static str,
    pub body: String,
    pub link: String,
    pub meta: Value,
    pub email: Option<Email>,
}

pub async fn deliver(state: &AppState, recipient: Uuid, notice: Notice) {
    let user = match state.db.get::<User>(recipient).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(%recipient, "Notification recipient no longer exists");
            return;
        }
        Err(e) => {
            error!(%recipient, "Failed to load notification recipient: {e}");
            return;
        }
    };

    let record = Notification::new(
        user.id,
        notice.kind,
        notice.title.to_string(),
        notice.body,
        Some(notice.link),
        Some(notice.meta),
        Utc::now(),
    );
    if let Err(e) = state.db.insert(&record).await {
        error!(user = %user.id, "Failed to create notification record: {e}");
    }

    if let Some(email) = notice.email {
        let text = format!("{},\n\n{}", greeting(&user), email.text);
        let mail = state.mailer.compose(&user.email, email.subject, text);

        info!(to = %user.email, kind = ?notice.kind, "Queueing notification mail");
        state.mailer.dispatch(mail);
    }
}

fn greeting(user: &User) -> String {
    match user.fullname.trim() {
        "" => "Hi there".to_string(),
        name => format!("Hi {name}"),
    }
}

fn donation_link(donation: &Donation) -> String {
    format!("/donations/{}", donation.id)
}

pub fn requested(donation: &Donation) -> Notice {
    Notice {
        kind: NotificationKind::Request,
        title: "Item requested",
        body: format!("Your donation \"{}\" was requested.", donation.title),
        link: donation_link(donation),
        meta: json!({ "donationId": donation.id }),
        email: Some(Email {
            subject: "Your item has been requested",
            text: format!(
                "Your donation \"{}\" has been requested by a user. Please check your dashboard.",
                donation.title
            ),
        }),
    }
}

pub fn approved(donation: &Donation) -> Notice {
    Notice {
        kind: NotificationKind::Approval,
        title: "Request approved",
        body: format!("Your request for \"{}\" was approved.", donation.title),
        link: donation_link(donation),
        meta: json!({ "donationId": donation.id }),
        email: Some(Email {
            subject: "Your request was approved",
            text: format!(
                "Your request for \"{}\" has been approved by the donor. Please contact them to arrange pickup.",
                donation.title
            ),
        }),
    }
}

pub fn cancelled(donation: &Donation) -> Notice {
    Notice {
        kind: NotificationKind::Cancellation,
        title: "Request cancelled",
        body: format!(
            "The request for \"{}\" was cancelled by the requester.",
            donation.title
        ),
        link: donation_link(donation),
        meta: json!({ "donationId": donation.id }),
        email: Some(Email {
            subject: "A request was cancelled",
            text: format!(
                "The request for your donation \"{}\" was cancelled by the requester. The item is available again.",
                donation.title
            ),
        }),
    }
}

pub fn rejected(donation: &Donation) -> Notice {
    Notice {
        kind: NotificationKind::Rejection,
        title: "Request rejected",
        body: format!(
            "Your request for \"{}\" was rejected by the donor.",
            donation.title
        ),
        link: donation_link(donation),
        meta: json!({ "donationId": donation.id }),
        email: Some(Email {
            subject: "Your request was rejected",
            text: format!(
                "Unfortunately your request for \"{}\" was rejected by the donor.",
                donation.title
            ),
        }),
    }
}

pub fn completed(donation: &Donation) -> Notice {
    Notice {
        kind: NotificationKind::Completion,
        title: "Donation completed",
        body: format!(
            "The donor marked \"{}\" as picked up/donated.",
            donation.title
        ),
        link: donation_link(donation),
        meta: json!({ "donationId": donation.id }),
        email: Some(Email {
            subject: "Your donation has been marked as picked up",
            text: format!(
                "The donor has marked \"{}\" as picked up/donated. Thank you for using Share-Wear.",
                donation.title
            ),
        }),
    }
}

pub fn pickup_proposed(donation: &Donation, slot: &PickupSlot) -> Notice {
    Notice {
        kind: NotificationKind::PickupProposed,
        title: "Pickup proposed",
        body: format!("A pickup time was proposed for {}", donation.title),
        link: donation_link(donation),
        meta: json!({ "donationId": donation.id, "slotId": slot.id }),
        email: None,
    }
}

pub fn pickup_accepted(donation: &Donation, slot: &PickupSlot) -> Notice {
    Notice {
        kind: NotificationKind::PickupAccepted,
        title: "Pickup accepted",
        body: format!("Your proposed pickup for {} was accepted.", donation.title),
        link: donation_link(donation),
        meta: json!({ "slotId": slot.id }),
        email: None,
    }
}

pub fn pickup_confirmed(donation: &Donation, slot: &PickupSlot) -> Notice {
    Notice {
        kind: NotificationKind::PickupConfirmed,
        title: "Pickup confirmed",
        body: format!("Pickup for {} is confirmed.", donation.title),
        link: donation_link(donation),
        meta: json!({ "slotId": slot.id }),
        email: None,
    }
}

pub fn new_message(conversation: &Conversation, sender: &User, title: &str) -> Notice {
    Notice {
        kind: NotificationKind::Message,
        title: "New message",
        body: format!("{} sent you a message about {}", sender.fullname, title),
        link: format!("/conversations/{}", conversation.id),
        meta: json!({ "conversationId": conversation.id, "donationId": conversation.donation }),
        email: None,
    }
}
