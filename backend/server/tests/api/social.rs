use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use store::{Backend, Database, MemoryBackend, StoreError};

use crate::{Session, TestApp};

/// Memory storage whose first conversation insert fails.
struct FlakyConversations {
    inner: MemoryBackend,
    failed: AtomicBool,
}

#[async_trait]
impl Backend for FlakyConversations {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(collection).await
    }

    async fn insert(&self, collection: &str, id: &str, json: &str) -> Result<(), StoreError> {
        if collection == "conversations" && !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Poisoned);
        }
        self.inner.insert(collection, id, json).await
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        self.inner.compare_and_swap(collection, id, expected, new).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn claim(&self, index: &str, key: &str, owner: &str) -> Result<bool, StoreError> {
        self.inner.claim(index, key, owner).await
    }

    async fn release(&self, index: &str, key: &str) -> Result<(), StoreError> {
        self.inner.release(index, key).await
    }

    async fn owner(&self, index: &str, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.owner(index, key).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

async fn donate(app: &TestApp, donor: &Session, recipient: &Session, donation: &str) {
    for (step, who) in [
        ("request", recipient),
        ("approve", donor),
        ("complete", donor),
    ] {
        let reply = app
            .put(&format!("/api/donations/{donation}/{step}"), Some(&who.token))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{step}: {}", reply.body);
    }
}

#[tokio::test]
async fn failed_conversation_insert_can_be_retried() {
    let app = TestApp::with_database(Database::new(Arc::new(FlakyConversations {
        inner: MemoryBackend::new(),
        failed: AtomicBool::new(false),
    })));
    let (_, recipient, donation) = app.pair().await;
    let uri = format!("/api/conversations/for-donation/{donation}");

    let failed = app.post(&uri, Some(&recipient.token), json!({})).await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);

    let retried = app.post(&uri, Some(&recipient.token), json!({})).await;
    assert_eq!(retried.status, StatusCode::OK, "{}", retried.body);

    let fetched = app
        .get(
            &format!("/api/conversations/{}", retried.body["_id"].as_str().unwrap()),
            Some(&recipient.token),
        )
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
}

#[tokio::test]
async fn conversation_is_found_or_created_once() {
    let app = TestApp::new();
    let (donor, recipient, donation) = app.pair().await;
    let uri = format!("/api/conversations/for-donation/{donation}");

    let first = app.post(&uri, Some(&recipient.token), json!({})).await;
    assert_eq!(first.status, StatusCode::OK);
    let second = app.post(&uri, Some(&recipient.token), json!({})).await;
    assert_eq!(first.body["_id"], second.body["_id"]);

    let participants = first.body["participants"].as_array().unwrap();
    assert!(participants.contains(&json!(donor.id)));
    assert!(participants.contains(&json!(recipient.id)));

    let yourself = app.post(&uri, Some(&donor.token), json!({})).await;
    assert_eq!(yourself.status, StatusCode::BAD_REQUEST);
    assert_eq!(yourself.body["message"], "Cannot start conversation with yourself");
}

#[tokio::test]
async fn messages_reach_the_other_participant() {
    let app = TestApp::new();
    let (donor, recipient, donation) = app.pair().await;
    let outsider = app.register("Otto Outsider", "otto@example.com", "recipient").await;

    let conversation = app
        .post(
            &format!("/api/conversations/for-donation/{donation}"),
            Some(&recipient.token),
            json!({}),
        )
        .await;
    let id = conversation.body["_id"].as_str().unwrap().to_string();
    let messages = format!("/api/conversations/{id}/messages");

    let posted = app
        .post(&messages, Some(&recipient.token), json!({ "text": "  Is it still free?  " }))
        .await;
    assert_eq!(posted.status, StatusCode::OK);
    assert_eq!(posted.body["messages"][0]["text"], "Is it still free?");

    let empty = app.post(&messages, Some(&donor.token), json!({ "text": "   " })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let intruder = app
        .post(&messages, Some(&outsider.token), json!({ "text": "hello" }))
        .await;
    assert_eq!(intruder.status, StatusCode::FORBIDDEN);
    assert_eq!(intruder.body["message"], "Not a participant");

    let peek = app
        .get(&format!("/api/conversations/{id}"), Some(&outsider.token))
        .await;
    assert_eq!(peek.status, StatusCode::FORBIDDEN);

    let inbox = app.get("/api/notifications", Some(&donor.token)).await;
    assert_eq!(inbox.body[0]["type"], "message");
    assert_eq!(inbox.body[0]["link"], format!("/conversations/{id}"));

    let listed = app.get("/api/conversations", Some(&donor.token)).await;
    let first = &listed.body[0];
    assert_eq!(first["donation"]["title"], "Oak side table");
    assert!(
        first["participants"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["email"] == "remy@example.com")
    );
}

#[tokio::test]
async fn pickup_slot_flow() {
    let app = TestApp::new();
    let (donor, recipient, donation) = app.pair().await;
    app.put(&format!("/api/donations/{donation}/request"), Some(&recipient.token))
        .await;

    let by_donor = app
        .post(
            "/api/slots/propose",
            Some(&donor.token),
            json!({ "donationId": donation, "proposedTime": "2030-05-01T17:30" }),
        )
        .await;
    assert_eq!(by_donor.status, StatusCode::BAD_REQUEST);

    let proposed = app
        .post(
            "/api/slots/propose",
            Some(&recipient.token),
            json!({ "donationId": donation, "proposedTime": "2030-05-01T17:30", "message": "After work?" }),
        )
        .await;
    assert_eq!(proposed.status, StatusCode::CREATED);
    assert_eq!(proposed.body["status"], "proposed");
    let slot = proposed.body["_id"].as_str().unwrap().to_string();

    let early_confirm = app
        .put(&format!("/api/slots/{slot}/confirm"), Some(&recipient.token))
        .await;
    assert_eq!(early_confirm.status, StatusCode::BAD_REQUEST);

    let stolen = app
        .put(&format!("/api/slots/{slot}/accept"), Some(&recipient.token))
        .await;
    assert_eq!(stolen.status, StatusCode::FORBIDDEN);

    let accepted = app
        .put(&format!("/api/slots/{slot}/accept"), Some(&donor.token))
        .await;
    assert_eq!(accepted.body["status"], "accepted");

    let confirmed = app
        .put(&format!("/api/slots/{slot}/confirm"), Some(&recipient.token))
        .await;
    assert_eq!(confirmed.body["status"], "confirmed");

    let listed = app
        .get(&format!("/api/slots/donation/{donation}"), Some(&donor.token))
        .await;
    assert_eq!(listed.body[0]["proposer"]["fullname"], "Remy Recipient");

    let cancelled = app
        .call(Method::DELETE, &format!("/api/slots/{slot}"), Some(&donor.token), None)
        .await;
    assert_eq!(cancelled.body["message"], "Cancelled");

    let inbox = app.get("/api/notifications", Some(&recipient.token)).await;
    let kinds: Vec<_> = inbox
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["type"].as_str().unwrap().to_string())
        .collect();
    assert!(kinds.contains(&"pickup_accepted".to_string()));
    assert!(kinds.contains(&"pickup_confirmed".to_string()));
}

#[tokio::test]
async fn ratings_need_a_finished_donation() {
    let app = TestApp::new();
    let (donor, recipient, donation) = app.pair().await;
    let rate = |stars: i64| json!({ "donationId": donation, "stars": stars, "comment": "Lovely table" });

    let early = app.post("/api/ratings", Some(&recipient.token), rate(5)).await;
    assert_eq!(early.status, StatusCode::FORBIDDEN);
    assert_eq!(early.body["message"], "Only the requester can rate this donation");

    app.put(&format!("/api/donations/{donation}/request"), Some(&recipient.token))
        .await;
    let undelivered = app.post("/api/ratings", Some(&recipient.token), rate(5)).await;
    assert_eq!(undelivered.status, StatusCode::BAD_REQUEST);
    assert_eq!(undelivered.body["message"], "Donation not marked as donated yet");

    app.put(&format!("/api/donations/{donation}/approve"), Some(&donor.token))
        .await;
    app.put(&format!("/api/donations/{donation}/complete"), Some(&donor.token))
        .await;

    let out_of_range = app.post("/api/ratings", Some(&recipient.token), rate(6)).await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);

    let rated = app.post("/api/ratings", Some(&recipient.token), rate(4)).await;
    assert_eq!(rated.status, StatusCode::CREATED);

    let twice = app.post("/api/ratings", Some(&recipient.token), rate(5)).await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);
    assert_eq!(twice.body["message"], "You have already rated this donation");

    let for_donation = app
        .get(&format!("/api/ratings/donation/{donation}"), None)
        .await;
    assert_eq!(for_donation.body[0]["rater"]["fullname"], "Remy Recipient");

    let summary = app.get(&format!("/api/ratings/donor/{}", donor.id), None).await;
    assert_eq!(summary.body["count"], 1);
    assert_eq!(summary.body["average"], 4.0);
}

#[tokio::test]
async fn donor_summary_averages_every_rating() {
    let app = TestApp::new();
    let donor = app.register("Dana Donor", "dana@example.com", "donor").await;
    let first = app.register("Remy Recipient", "remy@example.com", "recipient").await;
    let second = app.register("Sam Recipient", "sam@example.com", "recipient").await;

    for (recipient, stars) in [(&first, 5), (&second, 2)] {
        let donation = app.list_item(&donor, "Kitchen chair").await;
        donate(&app, &donor, recipient, &donation).await;
        let rated = app
            .post(
                "/api/ratings",
                Some(&recipient.token),
                json!({ "donationId": donation, "stars": stars }),
            )
            .await;
        assert_eq!(rated.status, StatusCode::CREATED);
    }

    let summary = app.get(&format!("/api/ratings/donor/{}", donor.id), None).await;
    assert_eq!(summary.body["count"], 2);
    assert_eq!(summary.body["average"], 3.5);
}

#[tokio::test]
async fn notifications_are_private_and_markable() {
    let app = TestApp::new();
    let (donor, recipient, donation) = app.pair().await;
    app.put(&format!("/api/donations/{donation}/request"), Some(&recipient.token))
        .await;

    let inbox = app.get("/api/notifications", Some(&donor.token)).await;
    let id = inbox.body[0]["_id"].as_str().unwrap().to_string();
    assert_eq!(inbox.body[0]["read"], false);

    let foreign = app
        .put(&format!("/api/notifications/{id}/read"), Some(&recipient.token))
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let read = app
        .put(&format!("/api/notifications/{id}/read"), Some(&donor.token))
        .await;
    assert_eq!(read.body["read"], true);

    app.put(&format!("/api/donations/{donation}/cancel"), Some(&recipient.token))
        .await;
    let all = app.put("/api/notifications/read-all", Some(&donor.token)).await;
    assert_eq!(all.body["updated"], 1);
}
