use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::json;

use crate::TestApp;

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new();
    let session = app.register("Ada Lovelace", "Ada@Example.com", "donor").await;
    assert!(!session.token.is_empty());

    let reply = app
        .post(
            "/api/users/login",
            None,
            json!({ "email": "  ada@example.COM ", "password": "password123" }),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["email"], "ada@example.com");
    assert_eq!(reply.body["role"], "donor");
    assert_eq!(reply.body["_id"], session.id.as_str());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com", "donor").await;

    let reply = app
        .post(
            "/api/users/register",
            None,
            json!({
                "fullname": "Other Ada",
                "email": "ADA@example.com",
                "password": "password123",
                "role": "recipient",
            }),
        )
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "User with this email already exists");
}

#[tokio::test]
async fn registration_validates_fields() {
    let app = TestApp::new();

    let short_password = app
        .post(
            "/api/users/register",
            None,
            json!({ "fullname": "Ada", "email": "ada@example.com", "password": "abc", "role": "donor" }),
        )
        .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);

    let bad_email = app
        .post(
            "/api/users/register",
            None,
            json!({ "fullname": "Ada", "email": "not-an-email", "password": "password123", "role": "donor" }),
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_email.body["message"], "\"email\" must be a valid email");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.register("Ada Lovelace", "ada@example.com", "donor").await;

    for body in [
        json!({ "email": "ada@example.com", "password": "wrong-password" }),
        json!({ "email": "nobody@example.com", "password": "password123" }),
    ] {
        let reply = app.post("/api/users/login", None, body).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["message"], "Invalid email or password");
    }
}

#[tokio::test]
async fn profile_requires_a_valid_token() {
    let app = TestApp::new();

    let missing = app.get("/api/users/profile", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["message"], "Not authorized, no token");

    let garbage = app.get("/api/users/profile", Some("not-a-jwt")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.body["message"], "Not authorized, token failed");
}

#[tokio::test]
async fn scheme_must_be_followed_by_a_space() {
    let app = TestApp::new();
    let session = app.register("Ada Lovelace", "ada@example.com", "donor").await;

    let glued = app
        .send(
            Request::get("/api/users/profile")
                .header(header::AUTHORIZATION, format!("Bearer{}", session.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(glued.status, StatusCode::UNAUTHORIZED);
    assert_eq!(glued.body["message"], "Not authorized, no token");

    let spaced = app.get("/api/users/profile", Some(&session.token)).await;
    assert_eq!(spaced.status, StatusCode::OK);
}

#[tokio::test]
async fn profile_hides_password_and_updates() {
    let app = TestApp::new();
    let session = app.register("Ada Lovelace", "ada@example.com", "donor").await;
    app.register("Grace Hopper", "grace@example.com", "recipient").await;

    let profile = app.get("/api/users/profile", Some(&session.token)).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert!(profile.body.get("password").is_none());

    let taken = app
        .call(
            Method::PUT,
            "/api/users/profile",
            Some(&session.token),
            Some(json!({ "email": "grace@example.com" })),
        )
        .await;
    assert_eq!(taken.status, StatusCode::BAD_REQUEST);
    assert_eq!(taken.body["message"], "Email already in use");

    let updated = app
        .call(
            Method::PUT,
            "/api/users/profile",
            Some(&session.token),
            Some(json!({ "email": "countess@example.com", "phone": "555-0100", "password": "" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["email"], "countess@example.com");
    assert_eq!(updated.body["phone"], "555-0100");

    // Old address is free again, and the untouched password still works.
    app.register("New Ada", "ada@example.com", "recipient").await;
    let login = app
        .post(
            "/api/users/login",
            None,
            json!({ "email": "countess@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);

    let cleared = app
        .call(
            Method::PUT,
            "/api/users/profile",
            Some(&session.token),
            Some(json!({ "phone": "" })),
        )
        .await;
    assert!(cleared.body["phone"].is_null());
}

#[tokio::test]
async fn racing_email_changes_free_every_replaced_address() {
    let app = TestApp::new();
    let session = app.register("Ada Lovelace", "ada@example.com", "donor").await;

    let (app, token) = (&app, session.token.as_str());
    let change = move |email: &'static str| {
        app.call(
            Method::PUT,
            "/api/users/profile",
            Some(token),
            Some(json!({ "email": email })),
        )
    };
    let (b, c) = tokio::join!(change("b@example.com"), change("c@example.com"));
    assert_eq!(b.status, StatusCode::OK);
    assert_eq!(c.status, StatusCode::OK);

    let profile = app.get("/api/users/profile", Some(&session.token)).await;
    let kept = profile.body["email"].as_str().unwrap().to_string();

    for email in ["ada@example.com", "b@example.com", "c@example.com"] {
        if email != kept {
            app.register("Someone Else", email, "recipient").await;
        }
    }
}

#[tokio::test]
async fn saved_items() {
    let app = TestApp::new();
    let (donor, recipient, donation) = app.pair().await;
    let uri = format!("/api/users/saved/{donation}");

    let first = app.post(&uri, Some(&recipient.token), json!({})).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["message"], "Saved");

    let again = app.post(&uri, Some(&recipient.token), json!({})).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["message"], "Already saved");

    let saved = app.get("/api/users/saved", Some(&recipient.token)).await;
    let items = saved.body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["donor"]["fullname"], "Dana Donor");
    assert_eq!(items[0]["donor"]["_id"], donor.id.as_str());

    let removed = app.call(Method::DELETE, &uri, Some(&recipient.token), None).await;
    assert_eq!(removed.body["message"], "Removed");

    let unknown = app
        .post(
            "/api/users/saved/00000000-0000-4000-8000-000000000000",
            Some(&recipient.token),
            json!({}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}
