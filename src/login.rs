use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lazy_static::lazy_static;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::forms::{LoginForm, RegisterForm, validate_registration};
use crate::models::User;
use crate::routes;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// The authenticated user, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    pub user: CurrentUser,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Password(e.to_string()))
}

/// Check a password against a stored Argon2 hash.
///
/// A malformed stored hash is an error; a wrong password is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AppError::Password(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Create an account. Returns `None` when the username is taken.
pub fn register_user(store: &Store, username: &str, password_hash: &str) -> AppResult<Option<i64>> {
    if store.find_user(username)?.is_some() {
        return Ok(None);
    }
    store.create_user(username, password_hash).map(Some)
}

/// Create a session for an authenticated user and return its id.
///
/// Expired sessions are purged on every login.
pub fn create_session(user: CurrentUser, ttl: Duration) -> AppResult<String> {
    let now = SystemTime::now();
    let session_id = Uuid::new_v4().to_string();
    let session = Session {
        user,
        expires_at: now + ttl,
    };

    let mut sessions = SESSIONS.write().map_err(|_| AppError::Poisoned)?;
    sessions.retain(|_, session| session.expires_at > now);
    sessions.insert(session_id.clone(), session);
    Ok(session_id)
}

/// Look up a live session. Expired sessions are dropped on the way.
pub fn validate_session(session_id: &str) -> Option<CurrentUser> {
    let now = SystemTime::now();
    {
        let sessions = SESSIONS.read().ok()?;
        match sessions.get(session_id) {
            Some(session) if session.expires_at > now => return Some(session.user.clone()),
            Some(_) => {}
            None => return None,
        }
    }

    if let Ok(mut sessions) = SESSIONS.write() {
        sessions.retain(|_, session| session.expires_at > now);
    }
    None
}

pub fn end_session(session_id: &str) {
    if let Ok(mut sessions) = SESSIONS.write() {
        sessions.remove(session_id);
    }
}

fn session_cookie(session_id: String, ttl: Duration) -> Cookie<'static> {
    let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// Authentication middleware
///
/// Passes the request through with a [`CurrentUser`] extension when the
/// session cookie is valid, otherwise redirects to the login page.
pub async fn require_auth(jar: CookieJar, mut request: Request, next: Next) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(user) = validate_session(cookie.value()) {
            request.extensions_mut().insert(user);
            return next.run(request).await;
        }
    }

    log::debug!("unauthenticated request to {}", request.uri().path());
    Redirect::to(routes::LOGIN).into_response()
}

pub async fn serve_login_page(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    Ok(state
        .views
        .page("login", &json!({ "page_title": "Log in" }))?
        .into_response())
}

/// Handle user login requests
///
/// On success a session cookie is set and the user lands on the home page;
/// otherwise the form comes back with an error.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let username = form.username.trim();
    let password = form.password.trim();

    let user: Option<User> = state.db()?.find_user(username)?;
    let verified = match user {
        Some(user) if verify_password(password, &user.password_hash)? => Some(user),
        _ => None,
    };

    match verified {
        Some(user) => {
            log::info!("user '{}' logged in", user.username);
            let session_id = create_session(
                CurrentUser {
                    id: user.id,
                    username: user.username,
                },
                state.session_ttl,
            )?;
            let cookie = session_cookie(session_id, state.session_ttl);
            Ok((jar.add(cookie), Redirect::to(routes::HOME_PAGE)).into_response())
        }
        None => {
            log::warn!("failed login for '{}'", username);
            Ok(state
                .views
                .page(
                    "login",
                    &json!({
                        "page_title": "Log in",
                        "error": "Invalid username or password."
                    }),
                )?
                .into_response())
        }
    }
}

pub async fn serve_register_page(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    Ok(state
        .views
        .page("register", &json!({ "page_title": "Register" }))?
        .into_response())
}

/// Handle user registration
///
/// Redirects to the login page once the account exists.
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let render_error = |error: String| -> AppResult<Response> {
        Ok(state
            .views
            .page(
                "register",
                &json!({ "page_title": "Register", "error": error }),
            )?
            .into_response())
    };

    let registration = match validate_registration(&form) {
        Ok(valid) => valid,
        Err(error) => return render_error(error),
    };

    let password_hash = hash_password(&registration.password)?;
    let created = {
        let store = state.db()?;
        register_user(&store, &registration.username, &password_hash)?
    };

    match created {
        Some(id) => {
            log::info!("registered user '{}' ({})", registration.username, id);
            Ok(Redirect::to(routes::LOGIN).into_response())
        }
        None => render_error("Username already taken.".to_string()),
    }
}

/// Handle user logout
///
/// Drops the server-side session, clears the cookie and redirects to login.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        end_session(cookie.value());
    }

    let removal = Cookie::build(SESSION_COOKIE).path("/").build();
    (jar.remove(removal), Redirect::to(routes::LOGIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> CurrentUser {
        CurrentUser {
            id,
            username: format!("user{}", id),
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn sessions_expire_and_end() {
        let live = create_session(user(1), Duration::from_secs(60)).unwrap();
        assert_eq!(validate_session(&live), Some(user(1)));

        end_session(&live);
        assert_eq!(validate_session(&live), None);

        let stale = create_session(user(2), Duration::ZERO).unwrap();
        assert_eq!(validate_session(&stale), None);
        assert!(!SESSIONS.read().unwrap().contains_key(&stale));
    }

    #[test]
    fn new_sessions_purge_abandoned_ones() {
        let abandoned: Vec<String> = (0..20)
            .map(|_| create_session(user(3), Duration::ZERO).unwrap())
            .collect();

        let live = create_session(user(4), Duration::from_secs(60)).unwrap();

        let sessions = SESSIONS.read().unwrap();
        assert!(sessions.contains_key(&live));
        assert!(abandoned.iter().all(|id| !sessions.contains_key(id)));
    }

    #[test]
    fn session_cookie_lives_as_long_as_the_session() {
        let cookie = session_cookie("abc".to_string(), Duration::from_secs(2 * 3600));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(2)));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn unknown_session_is_rejected() {
        assert_eq!(validate_session("no-such-session"), None);
    }

    #[test]
    fn duplicate_registration_returns_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(register_user(&store, "sam", "h").unwrap().is_some());
        assert!(register_user(&store, "sam", "h").unwrap().is_none());
    }
}
