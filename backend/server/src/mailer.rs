use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Failed to build mail client: {0}")]
    Client(reqwest::Error),

    #[error("Mail relay request failed: {0}")]
    Relay(#[from] reqwest::Error),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Hands outgoing mail to an HTTP relay, or only logs it when none is configured.
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    relay_url: Option<String>,
    from: String,
}

impl Mailer {
    /// `timeout` bounds a whole relay request, connect included.
    pub fn new(relay_url: Option<String>, from: String, timeout: Duration) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MailError::Client)?;

        Ok(Self {
            client,
            relay_url,
            from,
        })
    }

    pub fn compose(&self, to: &str, subject: &str, text: String) -> Mail {
        Mail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            text,
        }
    }

    pub async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let Some(relay_url) = &self.relay_url else {
            info!(to = %mail.to, subject = %mail.subject, "Mail relay not configured, skipping delivery");
            return Ok(());
        };

        self.client
            .post(relay_url)
            .json(mail)
            .send()
            .await?
            .error_for_status()?;

        info!(to = %mail.to, subject = %mail.subject, "Mail handed to relay");
        Ok(())
    }

    /// Sends on a background task; the caller never waits on the relay.
    pub fn dispatch(&self, mail: Mail) {
        let mailer = self.clone();

        tokio::spawn(async move {
            if let Err(e) = mailer.send(&mail).await {
                error!(to = %mail.to, subject = %mail.subject, "Failed to send mail: {e}");
            }
        });
    }
}
