use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};

use crate::TestApp;

#[tokio::test]
async fn health_reports_store() {
    let app = TestApp::new();

    let reply = app.get("/health", None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");
    assert_eq!(reply.body["store"], "ok");
}

#[tokio::test]
async fn request_id_is_echoed_or_minted() {
    let app = TestApp::new();

    let echoed = app
        .send(
            Request::get("/health")
                .header("x-request-id", "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(echoed.headers["x-request-id"], "trace-me");

    let minted = app.get("/health", None).await;
    assert!(!minted.headers["x-request-id"].is_empty());
}

#[tokio::test]
async fn security_headers_on_every_response() {
    let app = TestApp::new();

    for uri in ["/health", "/api/donations", "/api/nowhere"] {
        let reply = app.get(uri, None).await;
        assert_eq!(reply.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(reply.headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(reply.headers[header::REFERRER_POLICY], "no-referrer");
    }
}

#[tokio::test]
async fn cors_answers_with_the_client_origin() {
    let app = TestApp::new();

    let preflight = |origin: &'static str| {
        Request::options("/api/donations")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app.send(preflight("http://localhost:3000")).await;
    assert_eq!(
        allowed.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );

    // A fixed origin is always echoed; browsers reject the mismatch.
    let foreign = app.send(preflight("http://evil.example")).await;
    assert_eq!(
        foreign.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn rate_limit_is_per_client() {
    let app = TestApp::with_config(|config| config.rate_limit_max = 2);

    let from = |ip: &'static str| {
        Request::get("/api/donations")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    let first = app.send(from("203.0.113.7")).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers["ratelimit-limit"], "2");
    assert_eq!(first.headers["ratelimit-remaining"], "1");

    app.send(from("203.0.113.7")).await;
    let blocked = app.send(from("203.0.113.7")).await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(blocked.body["message"], "Too many requests");

    let other = app.send(from("198.51.100.1")).await;
    assert_eq!(other.status, StatusCode::OK);

    // Health checks are outside the limited API.
    let health = app
        .send(
            Request::get("/health")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_ignores_spoofed_forwarded_entries() {
    let app = TestApp::with_config(|config| config.rate_limit_max = 2);

    let mut statuses = Vec::new();
    for i in 0..5 {
        let reply = app
            .send(
                Request::get("/api/donations")
                    .header("x-forwarded-for", format!("10.9.9.{i}, 198.51.100.9"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        statuses.push(reply.status);
    }

    assert_eq!(
        statuses,
        [
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}
