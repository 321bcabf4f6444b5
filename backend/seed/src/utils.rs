use std::collections::HashSet;

use crate::models::{Fixture, FixtureDonation};

/// Joins the server base URL and an API path with exactly one slash between them.
pub fn endpoint(server: &str, path: &str) -> String {
    format!(
        "{}/{}",
        server.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Listings whose donor is not among the fixture users.
pub fn orphaned(fixture: &Fixture) -> Vec<&FixtureDonation> {
    let emails: HashSet<String> = fixture
        .users
        .iter()
        .map(|user| normalize_email(&user.email))
        .collect();

    fixture
        .donations
        .iter()
        .filter(|donation| !emails.contains(&normalize_email(&donation.donor)))
        .collect()
}
