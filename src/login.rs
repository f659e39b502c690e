use axum::{
    Form, Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use std::time::Duration;

use crate::app::{ApiError, AppState};
use crate::session::SESSION_COOKIE;

/// Shown after a successful sign-up
pub const SIGNUP_NOTICE: &str = "Cuenta creada. Revisa tu correo para confirmar.";

/// Shown after a password reset email was requested
pub const RESET_NOTICE: &str = "Te enviamos un correo para restablecer tu contraseña.";

const MISSING_FIELDS: &str = "Completa todos los campos";

/// Sign-in and sign-up form data
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Password reset form data
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Redirect to `path` carrying a message in the query string
///
/// # Arguments
/// * `path` - Page to send the browser to
/// * `key` - Query parameter name, `error` or `success`
/// * `message` - Text shown by the page
fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "{}?{}={}",
        path,
        key,
        urlencoding::encode(message)
    ))
}

/// Serve the login page HTML
pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

/// Serve the signup page HTML
pub async fn serve_signup_page() -> Html<&'static str> {
    Html(include_str!("./static/signup.html"))
}

/// Serve the password recovery page HTML
pub async fn serve_forgot_password_page() -> Html<&'static str> {
    Html(include_str!("./static/password.html"))
}

/// Handle user login requests
///
/// Exchanges the credentials for an access token at the identity provider and
/// opens a session holding it.
///
/// # Returns
/// * `Response` - Redirect to the form page with the session cookie set, or
///   back to the login page with a translated error
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(credentials): Form<Credentials>,
) -> Response {
    let email = credentials.email.trim();
    if email.is_empty() || credentials.password.is_empty() {
        return redirect_with("/login", "error", MISSING_FIELDS).into_response();
    }

    match state.identity.sign_in(email, &credentials.password).await {
        Ok(tokens) => {
            let session_id = state.sessions.create_for_token(
                email,
                &tokens.access_token,
                tokens.expires_in.map(Duration::from_secs),
            );
            log::info!("{} signed in", email);

            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true);
            (jar.add(cookie), Redirect::to("/")).into_response()
        }
        Err(err) => {
            log::warn!("sign-in failed for {}: {}", email, err);
            redirect_with("/login", "error", err.localized()).into_response()
        }
    }
}

/// Handle user registration
///
/// The identity provider sends the confirmation mail; the user signs in
/// afterwards.
pub async fn handle_signup(
    State(state): State<AppState>,
    Form(credentials): Form<Credentials>,
) -> Redirect {
    let email = credentials.email.trim();
    if email.is_empty() || credentials.password.is_empty() {
        return redirect_with("/signup", "error", MISSING_FIELDS);
    }

    match state.identity.sign_up(email, &credentials.password).await {
        Ok(()) => {
            log::info!("account created for {}", email);
            redirect_with("/login", "success", SIGNUP_NOTICE)
        }
        Err(err) => {
            log::warn!("sign-up failed for {}: {}", email, err);
            redirect_with("/signup", "error", err.localized())
        }
    }
}

/// Handle password recovery requests
pub async fn handle_forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ResetRequest>,
) -> Redirect {
    let email = form.email.trim();
    if email.is_empty() {
        return redirect_with("/forgot-password", "error", MISSING_FIELDS);
    }

    match state.identity.request_password_reset(email).await {
        Ok(()) => redirect_with("/forgot-password", "success", RESET_NOTICE),
        Err(err) => {
            log::warn!("password reset failed for {}: {}", email, err);
            redirect_with("/forgot-password", "error", err.localized())
        }
    }
}

/// Handle user logout
///
/// Drops the server-side session and clears the cookie.
pub async fn handle_logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(cookie.value()) {
            log::info!("{} signed out", session.user_email);
        }
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/login"),
    )
}

/// Authentication middleware
///
/// Puts the caller's [`Session`](crate::session::Session) into the request
/// extensions. Without a live session, API calls get a 401 JSON body and
/// pages redirect to the login page.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(session) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.get(cookie.value()))
    {
        request.extensions_mut().insert(session);
        return next.run(request).await;
    }

    if request.uri().path().starts_with("/api/") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("UNAUTHORIZED", "Inicia sesión para continuar")),
        )
            .into_response();
    }

    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn redirect_messages_are_url_encoded() {
        let response = redirect_with("/login", "error", "Correo o contraseña incorrectos")
            .into_response();
        assert_eq!(
            response.headers()[LOCATION],
            "/login?error=Correo%20o%20contrase%C3%B1a%20incorrectos"
        );
    }
}
