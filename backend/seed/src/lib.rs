//! # Seeding
//!
//! Fills a running server with demo users and listings through the public API.
//!
//! 1. Read the fixture file.
//!
//! 2. Register every fixture user. If the email is taken, log in instead so reruns are harmless.
//!
//! 3. Create every listing with its donor's token.
//!
//! Listings whose donor is missing from the fixture, or whose donor could not sign in, are skipped.
use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Response, StatusCode};

pub mod models;
pub mod utils;

use models::{Credentials, ErrorBody, Fixture, FixtureUser, NewDonation, Session};
use utils::{endpoint, normalize_email, orphaned};

pub async fn seed(server: &str, fixture: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(fixture)
        .with_context(|| format!("Failed to read fixture {}", fixture.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw).context("Fixture is not valid JSON")?;

    println!("Loaded Users: {}", fixture.users.len());
    println!("Loaded Donations: {}\n", fixture.donations.len());

    for orphan in orphaned(&fixture) {
        println!("Skipping \"{}\": unknown donor {}", orphan.title, orphan.donor);
    }

    let client = Client::new();
    let pb = progress(fixture.users.len() + fixture.donations.len())?;

    let mut tokens = HashMap::new();
    for user in &fixture.users {
        pb.set_message(user.email.clone());
        match sign_in(&client, server, user).await {
            Ok(token) => {
                tokens.insert(normalize_email(&user.email), token);
            }
            Err(e) => pb.println(format!("User {} failed: {e:#}", user.email)),
        }
        pb.inc(1);
    }

    let mut created = 0;
    for donation in &fixture.donations {
        pb.set_message(donation.title.clone());
        if let Some(token) = tokens.get(&normalize_email(&donation.donor)) {
            let res = client
                .post(endpoint(server, "/api/donations"))
                .bearer_auth(token)
                .json(&NewDonation::from(donation))
                .send()
                .await?;

            match ensure_success(res).await {
                Ok(_) => created += 1,
                Err(e) => pb.println(format!("Donation \"{}\" failed: {e:#}", donation.title)),
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!("\nTotal Users Ready: {}", tokens.len());
    println!("Total Donations Created: {created}");

    Ok(())
}

fn progress(len: usize) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    Ok(pb)
}

/// Registers `user`, falling back to a login when the account already exists.
async fn sign_in(client: &Client, server: &str, user: &FixtureUser) -> anyhow::Result<String> {
    let res = client
        .post(endpoint(server, "/api/users/register"))
        .json(user)
        .send()
        .await?;

    let res = if res.status() == StatusCode::BAD_REQUEST {
        client
            .post(endpoint(server, "/api/users/login"))
            .json(&Credentials {
                email: &user.email,
                password: &user.password,
            })
            .send()
            .await?
    } else {
        res
    };

    let session: Session = ensure_success(res).await?.json().await?;
    Ok(session.token)
}

async fn ensure_success(res: Response) -> anyhow::Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    match res.json::<ErrorBody>().await {
        Ok(body) => bail!("{status}: {}", body.message),
        Err(_) => Err(anyhow!("{status}")),
    }
}
