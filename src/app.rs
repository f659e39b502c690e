use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::client::{HttpBackend, HttpIdentity, IdentityProvider, ImcBackend, ServiceError};
use crate::config::AppConfig;
use crate::dashboard::{self, DashboardSummary};
use crate::form::{FormErrors, FormInput, ImcForm};
use crate::history::{FilterSpec, HistoryProjector, PageWindow, SortDirection, SortKey, SortSpec};
use crate::login;
use crate::measurement::truncate_to_two_decimals;
use crate::record::{CalculationRecord, sort_newest_first};
use crate::session::{Session, SessionStore};

/// Notice shown when the calculation backend cannot be used
pub const BACKEND_UNAVAILABLE: &str =
    "Error al calcular el IMC. Verifica si el backend está corriendo.";

/// Notice shown when the history cannot be loaded
pub const HISTORY_UNAVAILABLE: &str = "No se pudo cargar el historial. Intenta nuevamente.";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ImcBackend>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionStore>,
    pub projector: HistoryProjector,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn ImcBackend>,
        identity: Arc<dyn IdentityProvider>,
        sessions: Arc<SessionStore>,
        projector: HistoryProjector,
    ) -> Self {
        Self {
            backend,
            identity,
            sessions,
            projector,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(HttpBackend::from_config(config)),
            Arc::new(HttpIdentity::from_config(config)),
            Arc::new(SessionStore::new(config.session_lifetime)),
            HistoryProjector::new(config.reference_offset),
        )
    }
}

/// JSON body of every API error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Error type of the API handlers
#[derive(Debug)]
pub enum AppError {
    /// Malformed query or body
    BadRequest(String),
    /// Measurements that failed validation
    Validation(FormErrors),
    /// The backend refused the session's credentials
    Unauthorized,
    /// The backend could not be used
    Service {
        source: ServiceError,
        notice: &'static str,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new("BAD_REQUEST", msg)),
            )
                .into_response(),
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "errors": errors })),
            )
                .into_response(),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new("UNAUTHORIZED", "Sesión expirada")),
            )
                .into_response(),
            AppError::Service { source, notice } => {
                log::warn!("backend call failed: {}", source);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ApiError::new("BACKEND_UNAVAILABLE", notice)),
                )
                    .into_response()
            }
        }
    }
}

impl AppError {
    fn service(source: ServiceError, notice: &'static str) -> Self {
        if source.is_unauthorized() {
            AppError::Unauthorized
        } else {
            AppError::Service { source, notice }
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NormalizeBody {
    pub text: String,
}

/// Query of the history endpoint; empty values count as absent
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub desde: Option<String>,
    pub hasta: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub page: Option<usize>,
}

impl HistoryQuery {
    pub fn filter(&self) -> Result<FilterSpec, AppError> {
        Ok(FilterSpec::new(
            parse_date("desde", self.desde.as_deref())?,
            parse_date("hasta", self.hasta.as_deref())?,
        ))
    }

    pub fn sort(&self) -> Result<SortSpec, AppError> {
        let key = match self.sort.as_deref().map(str::trim) {
            None | Some("") => return Ok(SortSpec::default()),
            Some(name) => SortKey::from_name(name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown sort column {:?}", name)))?,
        };

        let direction = match self.dir.as_deref().map(str::trim) {
            None | Some("") | Some("desc") => SortDirection::Descending,
            Some("asc") => SortDirection::Ascending,
            Some(other) => {
                return Err(AppError::BadRequest(format!(
                    "unknown sort direction {:?}",
                    other
                )));
            }
        };

        Ok(SortSpec::by(key, direction))
    }

    pub fn page(&self) -> PageWindow {
        PageWindow::new(self.page.unwrap_or(1))
    }
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{} must be a YYYY-MM-DD date", name))),
    }
}

/// One page of the history table
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub rows: Vec<CalculationRecord>,
    pub current_page: usize,
    pub total_pages: usize,
    pub filtered_count: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(serve_form_page))
        .route("/history", get(serve_history_page))
        .route("/dashboard", get(serve_dashboard_page))
        .route("/api/calculate", post(calculate))
        .route("/api/history", get(history))
        .route("/api/dashboard", get(dashboard_summary))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .route(
            "/signup",
            get(login::serve_signup_page).post(login::handle_signup),
        )
        .route(
            "/forgot-password",
            get(login::serve_forgot_password_page).post(login::handle_forgot_password),
        )
        .route("/logout", post(login::handle_logout))
        .route("/api/normalize", post(normalize))
        .merge(protected)
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(AppState::from_config(&config));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    log::info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Inject a JSON value into a page as a global script constant
pub(crate) fn inject(template: &str, name: &str, value: &impl Serialize) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    template.replace(
        "</head>",
        &format!("    <script>const {} = {};</script>\n</head>", name, json),
    )
}

async fn serve_form_page(Extension(session): Extension<Session>) -> Html<String> {
    Html(inject(
        include_str!("./static/index.html"),
        "USER_EMAIL",
        &session.user_email,
    ))
}

async fn serve_history_page() -> Html<&'static str> {
    Html(include_str!("./static/history.html"))
}

async fn serve_dashboard_page() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

/// Keystroke normalization for clients without the wasm build
async fn normalize(Json(body): Json<NormalizeBody>) -> Json<NormalizeBody> {
    Json(NormalizeBody {
        text: truncate_to_two_decimals(&body.text),
    })
}

async fn calculate(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(input): Json<FormInput>,
) -> Result<Json<CalculationRecord>, AppError> {
    let mut form = ImcForm::from_input(&input);
    let request = form.submit().map_err(|errors| {
        log::debug!("rejected measurements: {:?}", errors);
        AppError::Validation(errors)
    })?;

    let record = state
        .backend
        .calculate(&session, &request)
        .await
        .map_err(|err| AppError::service(err, BACKEND_UNAVAILABLE))?;

    log::info!(
        "calculation {} stored for {} ({})",
        record.id,
        session.user_email,
        record.category
    );
    Ok(Json(record))
}

async fn history(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, AppError> {
    let filter = query.filter()?;
    let sort = query.sort()?;
    let page = query.page();

    // Backend bounds are applied in its own zone; the projector re-applies
    // them in the reference zone.
    let mut records = state
        .backend
        .history(&session, &filter)
        .await
        .map_err(|err| AppError::service(err, HISTORY_UNAVAILABLE))?;
    sort_newest_first(&mut records);

    let projection = state.projector.project(&records, &filter, &sort, &page);

    Ok(Json(HistoryPage {
        has_previous: projection.has_previous(),
        has_next: projection.has_next(),
        current_page: projection.current_page,
        total_pages: projection.total_pages,
        filtered_count: projection.filtered_count,
        rows: projection.visible,
    }))
}

async fn dashboard_summary(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<DashboardSummary>, AppError> {
    let records = state
        .backend
        .history(&session, &FilterSpec::default())
        .await
        .map_err(|err| AppError::service(err, HISTORY_UNAVAILABLE))?;

    Ok(Json(dashboard::summarize(&records)))
}
