#![cfg(feature = "web")]

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, SystemTime};
use tower::ServiceExt;

use imc::app::{self, AppState};
use imc::client::{Credentials, IdentityProvider, ImcBackend, ServiceError};
use imc::history::{FilterSpec, HistoryProjector};
use imc::record::{CalculationRecord, CalculationRequest};
use imc::session::{Session, SessionStore};

#[derive(Default)]
struct FakeBackend {
    records: Mutex<Vec<CalculationRecord>>,
    tokens_seen: Mutex<Vec<String>>,
    failure: Option<u16>,
}

impl FakeBackend {
    fn with_records(records: Vec<CalculationRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            failure: Some(status),
            ..Self::default()
        }
    }

    fn check(&self, session: &Session) -> Result<(), ServiceError> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(session.access_token.clone());
        match self.failure {
            Some(0) => Err(ServiceError::Unreachable("connection refused".to_string())),
            Some(status) => Err(ServiceError::Rejected {
                status,
                message: "nope".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ImcBackend for FakeBackend {
    async fn calculate(
        &self,
        session: &Session,
        request: &CalculationRequest,
    ) -> Result<CalculationRecord, ServiceError> {
        self.check(session)?;
        let mut records = self.records.lock().unwrap();
        let record = CalculationRecord {
            id: records.len() as i64 + 1,
            height: request.height(),
            weight: request.weight(),
            index: request.weight() / (request.height() * request.height()),
            category: "Normal".to_string(),
            created_at: Utc::now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn history(
        &self,
        session: &Session,
        _filter: &FilterSpec,
    ) -> Result<Vec<CalculationRecord>, ServiceError> {
        self.check(session)?;
        Ok(self.records.lock().unwrap().clone())
    }
}

struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, ServiceError> {
        if email == "ana@example.com" && password == "secreto" {
            Ok(Credentials {
                access_token: "token-ana".to_string(),
                expires_in: Some(3600),
            })
        } else {
            Err(ServiceError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            })
        }
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<(), ServiceError> {
        if email == "ana@example.com" {
            Err(ServiceError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            })
        } else {
            Ok(())
        }
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct Harness {
    router: Router,
    backend: Arc<FakeBackend>,
    sessions: Arc<SessionStore>,
}

impl Harness {
    fn new(backend: FakeBackend) -> Self {
        let backend = Arc::new(backend);
        let sessions = Arc::new(SessionStore::default());
        let state = AppState::new(
            backend.clone(),
            Arc::new(FakeIdentity),
            sessions.clone(),
            HistoryProjector::default(),
        );
        Self {
            router: app::router(state),
            backend,
            sessions,
        }
    }

    fn cookie(&self) -> String {
        format!(
            "session={}",
            self.sessions.create("ana@example.com", "token-ana")
        )
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn record(id: i64, weight: f64, day: u32) -> CalculationRecord {
    CalculationRecord {
        id,
        height: 1.70,
        weight,
        index: weight / (1.70 * 1.70),
        category: if weight < 72.0 { "Normal" } else { "Sobrepeso" }.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
            + Duration::days(day as i64),
    }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn pages_redirect_to_login_without_session() {
    let harness = Harness::new(FakeBackend::default());
    let response = harness
        .router
        .clone()
        .oneshot(get("/history", None))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn api_answers_401_without_session() {
    let harness = Harness::new(FakeBackend::default());
    let (status, body) = harness.send(get("/api/history", Some("session=stale"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn calculate_reports_both_field_errors() {
    let harness = Harness::new(FakeBackend::default());
    let cookie = harness.cookie();
    let (status, body) = harness
        .send(post_json(
            "/api/calculate",
            Some(&cookie),
            json!({ "altura": "3,5", "peso": "" }),
        ))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["altura"], "La altura no puede superar 3,00 m");
    assert_eq!(body["errors"]["peso"], "Ingresa un peso válido. Ejemplo: 70");
    assert!(harness.backend.tokens_seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn calculate_sends_truncated_values_with_bearer_token() {
    let harness = Harness::new(FakeBackend::default());
    let cookie = harness.cookie();
    let (status, body) = harness
        .send(post_json(
            "/api/calculate",
            Some(&cookie),
            json!({ "altura": "1,759", "peso": "70" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["altura"], 1.75);
    assert_eq!(body["peso"], 70.0);
    assert_eq!(body["categoria"], "Normal");
    assert_eq!(
        *harness.backend.tokens_seen.lock().unwrap(),
        vec!["token-ana".to_string()]
    );
}

#[tokio::test]
async fn backend_failures_become_a_generic_notice() {
    let harness = Harness::new(FakeBackend::failing(0));
    let cookie = harness.cookie();
    let (status, body) = harness
        .send(post_json(
            "/api/calculate",
            Some(&cookie),
            json!({ "altura": "1.70", "peso": "65" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], app::BACKEND_UNAVAILABLE);
}

#[tokio::test]
async fn rejected_token_is_reported_as_unauthorized() {
    let harness = Harness::new(FakeBackend::failing(401));
    let cookie = harness.cookie();
    let (status, _) = harness.send(get("/api/history", Some(&cookie))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn history_pages_are_sorted_and_bounded() {
    let records = (1..=25).map(|i| record(i, 50.0 + i as f64, i as u32)).collect();
    let harness = Harness::new(FakeBackend::with_records(records));
    let cookie = harness.cookie();

    let (status, body) = harness
        .send(get("/api/history?sort=peso&dir=asc&page=3", Some(&cookie)))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["currentPage"], 3);
    assert_eq!(body["filteredCount"], 25);
    assert_eq!(body["hasPrevious"], true);
    assert_eq!(body["hasNext"], false);

    let ids: Vec<i64> = body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![21, 22, 23, 24, 25]);
}

#[tokio::test]
async fn history_without_sort_is_newest_first() {
    let records = vec![record(1, 60.0, 1), record(3, 62.0, 3), record(2, 61.0, 2)];
    let harness = Harness::new(FakeBackend::with_records(records));
    let cookie = harness.cookie();

    let (_, body) = harness.send(get("/api/history", Some(&cookie))).await;
    let ids: Vec<i64> = body["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test]
async fn history_filters_by_calendar_date() {
    // Day n is 2025-01-(1 + n)
    let records = (1..=5).map(|i| record(i, 60.0, i as u32)).collect();
    let harness = Harness::new(FakeBackend::with_records(records));
    let cookie = harness.cookie();

    let (_, body) = harness
        .send(get(
            "/api/history?desde=2025-01-03&hasta=2025-01-04&sort=&dir=",
            Some(&cookie),
        ))
        .await;
    assert_eq!(body["filteredCount"], 2);
    assert_eq!(body["totalPages"], 1);

    let (_, body) = harness
        .send(get("/api/history?desde=2026-01-01", Some(&cookie)))
        .await;
    assert_eq!(body["filteredCount"], 0);
    assert_eq!(body["totalPages"], 1);
    assert_eq!(body["hasNext"], false);
}

#[tokio::test]
async fn history_page_beyond_any_offset_is_empty() {
    let records = (1..=3).map(|i| record(i, 60.0, i as u32)).collect();
    let harness = Harness::new(FakeBackend::with_records(records));
    let cookie = harness.cookie();

    let uri = format!("/api/history?page={}", usize::MAX);
    let (status, body) = harness.send(get(&uri, Some(&cookie))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["rows"].as_array().unwrap().is_empty());
    assert_eq!(body["filteredCount"], 3);
    assert_eq!(body["hasNext"], false);
}

#[tokio::test]
async fn history_rejects_malformed_dates() {
    let harness = Harness::new(FakeBackend::default());
    let cookie = harness.cookie();
    let (status, body) = harness
        .send(get("/api/history?desde=03-01-2025", Some(&cookie)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn dashboard_summarizes_whole_history() {
    let records = vec![record(1, 70.0, 1), record(2, 80.0, 2), record(3, 71.0, 3)];
    let harness = Harness::new(FakeBackend::with_records(records));
    let cookie = harness.cookie();

    let (status, body) = harness.send(get("/api/dashboard", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRecords"], 3);
    assert_eq!(body["mostFrequent"], "Normal");
    assert_eq!(body["categories"][0]["name"], "Normal");
    assert_eq!(body["categories"][0]["count"], 2);
    assert_eq!(body["evolution"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn normalize_is_public() {
    let harness = Harness::new(FakeBackend::default());
    let (status, body) = harness
        .send(post_json("/api/normalize", None, json!({ "text": "70,456" })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "70,45");
}

#[tokio::test]
async fn login_opens_a_session() {
    let harness = Harness::new(FakeBackend::default());
    let response = harness
        .router
        .clone()
        .oneshot(post_form(
            "/login",
            None,
            "email=ana%40example.com&password=secreto",
        ))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/");
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let session_id = cookie
        .trim_start_matches("session=")
        .split(';')
        .next()
        .unwrap();
    let session = harness.sessions.get(session_id).unwrap();
    assert_eq!(session.access_token, "token-ana");
    // The identity provider reports a one hour token
    assert!(session.expires_at <= SystemTime::now() + StdDuration::from_secs(3600));
}

#[tokio::test]
async fn login_failure_redirects_with_translated_error() {
    let harness = Harness::new(FakeBackend::default());
    let response = harness
        .router
        .clone()
        .oneshot(post_form(
            "/login",
            None,
            "email=ana%40example.com&password=wrong",
        ))
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::LOCATION],
        "/login?error=Correo%20o%20contrase%C3%B1a%20incorrectos"
    );
    assert!(harness.sessions.is_empty());
}

#[tokio::test]
async fn signup_of_existing_account_is_refused() {
    let harness = Harness::new(FakeBackend::default());
    let response = harness
        .router
        .clone()
        .oneshot(post_form(
            "/signup",
            None,
            "email=ana%40example.com&password=secreto",
        ))
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::LOCATION],
        "/signup?error=Este%20email%20ya%20est%C3%A1%20registrado"
    );
}

#[tokio::test]
async fn logout_drops_the_session() {
    let harness = Harness::new(FakeBackend::default());
    let cookie = harness.cookie();
    assert_eq!(harness.sessions.len(), 1);

    let response = harness
        .router
        .clone()
        .oneshot(post_form("/logout", Some(&cookie), ""))
        .await
        .unwrap();

    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert!(harness.sessions.is_empty());
}
