use serde::Serialize;

pub mod conversations;
pub mod donations;
pub mod health;
pub mod notifications;
pub mod ratings;
pub mod slots;
pub mod uploads;
pub mod users;

/// `{"message": ...}` acknowledgement body.
#[derive(Serialize)]
pub struct Ack {
    pub message: &'static str,
}

impl Ack {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}
