//! Clients for the external services
//!
//! The calculation/history backend and the identity provider live elsewhere;
//! this module only knows their request and response shapes. Every backend
//! call takes the caller's [`Session`] explicitly.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::AppConfig;
use crate::history::FilterSpec;
use crate::record::{CalculationRecord, CalculationRequest};
use crate::session::Session;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Failure talking to an external service
///
/// Never part of the input validation errors: the UI shows a generic
/// "try again" notice for all of these.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service unreachable: {0}")]
    Unreachable(String),

    #[error("service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response from service: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Whether the service turned the credentials down
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServiceError::Rejected { status: 401 | 403, .. })
    }

    /// Spanish notice for identity failures shown on the auth pages
    pub fn localized(&self) -> &'static str {
        match self {
            ServiceError::Unreachable(_) => {
                "Error de conexión. Verifica tu internet e intenta nuevamente"
            }
            ServiceError::Rejected { status: 429, .. } => "Demasiados intentos. Espera un momento",
            ServiceError::Rejected { message, .. } => {
                let message = message.to_lowercase();
                if message.contains("rate limit") {
                    "Demasiados intentos. Espera un momento"
                } else if message.contains("invalid login credentials") {
                    "Correo o contraseña incorrectos"
                } else if message.contains("user not found") {
                    "No se encontró una cuenta con este email"
                } else if message.contains("invalid email") || message.contains("invalid format")
                {
                    "Formato de email inválido"
                } else if message.contains("already registered") {
                    "Este email ya está registrado"
                } else {
                    "Ocurrió un error. Intenta nuevamente"
                }
            }
            ServiceError::Malformed(_) => "Ocurrió un error inesperado",
        }
    }
}

/// Tokens handed out by the identity provider on sign-in
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub access_token: String,

    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// The calculation and history backend
#[async_trait]
pub trait ImcBackend: Send + Sync {
    /// Ask the backend to compute and store a BMI
    async fn calculate(
        &self,
        session: &Session,
        request: &CalculationRequest,
    ) -> Result<CalculationRecord, ServiceError>;

    /// Fetch the caller's stored calculations, optionally bounded by date
    ///
    /// The order of the returned records is unspecified.
    async fn history(
        &self,
        session: &Session,
        filter: &FilterSpec,
    ) -> Result<Vec<CalculationRecord>, ServiceError>;
}

/// The identity provider behind sign-in and sign-up
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, ServiceError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), ServiceError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError>;
}

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| Client::new())
}

async fn send(request: RequestBuilder) -> Result<Response, ServiceError> {
    let response = request
        .send()
        .await
        .map_err(|err| ServiceError::Unreachable(err.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(rejected(status, message))
}

fn rejected(status: StatusCode, message: String) -> ServiceError {
    let message = if message.trim().is_empty() {
        status.canonical_reason().unwrap_or("error").to_string()
    } else {
        message
    };
    ServiceError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// [`ImcBackend`] over HTTP
///
/// * `POST {api_url}/imc/calcular` with `{ "altura", "peso" }`
/// * `GET {api_url}/imc/historial?desde=YYYY-MM-DD&hasta=YYYY-MM-DD`
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    api_url: String,
}

impl HttpBackend {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            http: http_client(),
            api_url: api_url.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_url.clone())
    }
}

/// Query parameters of the history endpoint for a date filter
pub fn history_query(filter: &FilterSpec) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(from) = filter.from {
        params.push(("desde", from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filter.to {
        params.push(("hasta", to.format("%Y-%m-%d").to_string()));
    }
    params
}

#[async_trait]
impl ImcBackend for HttpBackend {
    async fn calculate(
        &self,
        session: &Session,
        request: &CalculationRequest,
    ) -> Result<CalculationRecord, ServiceError> {
        let url = format!("{}/imc/calcular", self.api_url);
        let response = send(
            self.http
                .post(url)
                .bearer_auth(&session.access_token)
                .json(request),
        )
        .await?;

        response
            .json::<CalculationRecord>()
            .await
            .map_err(|err| ServiceError::Malformed(err.to_string()))
    }

    async fn history(
        &self,
        session: &Session,
        filter: &FilterSpec,
    ) -> Result<Vec<CalculationRecord>, ServiceError> {
        let url = format!("{}/imc/historial", self.api_url);
        let response = send(
            self.http
                .get(url)
                .bearer_auth(&session.access_token)
                .query(&history_query(filter)),
        )
        .await?;

        response
            .json::<Vec<CalculationRecord>>()
            .await
            .map_err(|err| ServiceError::Malformed(err.to_string()))
    }
}

/// [`IdentityProvider`] for a password-grant token service
///
/// * `POST {auth_url}/token?grant_type=password` with `{ "email", "password" }`
/// * `POST {auth_url}/signup` with `{ "email", "password" }`
/// * `POST {auth_url}/recover` with `{ "email" }`
///
/// The optional project key is sent as the `apikey` header.
#[derive(Debug, Clone)]
pub struct HttpIdentity {
    http: Client,
    auth_url: String,
    api_key: Option<String>,
}

impl HttpIdentity {
    pub fn new(auth_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: http_client(),
            auth_url: auth_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.auth_url.clone(), config.auth_api_key.clone())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.http.post(format!("{}{}", self.auth_url, path));
        match &self.api_key {
            Some(key) => request.header("apikey", key),
            None => request,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, ServiceError> {
        let response = send(
            self.post("/token")
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;

        response
            .json::<Credentials>()
            .await
            .map_err(|err| ServiceError::Malformed(err.to_string()))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), ServiceError> {
        send(
            self.post("/signup")
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        send(self.post("/recover").json(&json!({ "email": email }))).await?;
        Ok(())
    }
}
