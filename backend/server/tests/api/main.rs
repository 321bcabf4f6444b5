use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use server::{build_router, config::Config, state::AppState};
use store::Database;
use tempfile::TempDir;
use tower::ServiceExt;

mod middleware;
mod social;
mod uploads;
mod users;

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    uploads: TempDir,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct Session {
    pub id: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, Database::in_memory())
    }

    pub fn with_database(db: Database) -> Self {
        Self::build(|_| {}, db)
    }

    fn build(configure: impl FnOnce(&mut Config), db: Database) -> Self {
        let uploads = tempfile::tempdir().unwrap();

        let mut config = Config::with_secret("test-secret");
        config.upload_dir = uploads.path().to_path_buf();
        config.server_url = "http://files.test/".to_string();
        config.rate_limit_max = 10_000;
        // Requests reach the router without a socket, as if from one proxy.
        config.trust_proxy = true;
        configure(&mut config);

        let state = AppState::with_database(config, db).unwrap();

        Self {
            router: build_router(state.clone()),
            state,
            uploads,
        }
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        self.uploads.path()
    }

    pub async fn send(&self, req: Request<Body>) -> Reply {
        let res = self.router.clone().oneshot(req).await.unwrap();

        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        };

        self.send(req.unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>) -> Reply {
        self.call(Method::PUT, uri, token, None).await
    }

    pub async fn register(&self, fullname: &str, email: &str, role: &str) -> Session {
        let reply = self
            .post(
                "/api/users/register",
                None,
                json!({
                    "fullname": fullname,
                    "email": email,
                    "password": "password123",
                    "role": role,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);

        Session {
            id: reply.body["_id"].as_str().unwrap().to_string(),
            token: reply.body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Creates a listing as `donor` and returns its id.
    pub async fn list_item(&self, donor: &Session, title: &str) -> String {
        let reply = self
            .post(
                "/api/donations",
                Some(&donor.token),
                json!({
                    "title": title,
                    "description": "Gently used and ready for a new home.",
                    "category": "Furniture",
                    "condition": "Good",
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);

        reply.body["_id"].as_str().unwrap().to_string()
    }

    /// A donor and a recipient, with one listing by the donor.
    pub async fn pair(&self) -> (Session, Session, String) {
        let donor = self.register("Dana Donor", "dana@example.com", "donor").await;
        let recipient = self.register("Remy Recipient", "remy@example.com", "recipient").await;
        let donation = self.list_item(&donor, "Oak side table").await;

        (donor, recipient, donation)
    }
}
