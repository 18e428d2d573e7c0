use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::views::Views;
use crate::{grades, groups, learners, login, routes};

pub struct AppState {
    store: Mutex<Store>,
    pub views: Views,
    pub session_ttl: Duration,
}

impl AppState {
    pub fn new(store: Store, views: Views, session_ttl: Duration) -> Self {
        AppState {
            store: Mutex::new(store),
            views,
            session_ttl,
        }
    }

    /// Locks the store. Never hold the guard across an `.await`.
    pub fn db(&self) -> AppResult<MutexGuard<'_, Store>> {
        self.store.lock().map_err(|_| AppError::Poisoned)
    }
}

/// Build the full router: public auth pages, session-protected gradebook
/// pages and the static file service.
pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let protected = Router::new()
        .route(routes::HOME_PAGE, get(groups::home_page))
        .route(routes::LOGOUT, get(login::handle_logout))
        .route(
            routes::ADD_GROUP,
            get(groups::add_group_page).post(groups::add_group),
        )
        .route(routes::VIEW_GROUP, get(groups::view_group))
        .route(
            routes::EDIT_GROUP,
            get(groups::edit_group_page).post(groups::edit_group),
        )
        .route(routes::DELETE_GROUP, post(groups::delete_group))
        .route(
            routes::UPLOAD_BOUNDARIES,
            get(groups::upload_boundaries_page).post(groups::upload_boundaries),
        )
        .route(routes::EXPORT_GROUP_CSV, get(groups::export_group_csv))
        .route(routes::EXPORT_GROUP_XLSX, get(groups::export_group_xlsx))
        .route(
            routes::ADD_LEARNER,
            get(learners::add_learner_page).post(learners::add_learner),
        )
        .route(routes::VIEW_LEARNER, get(learners::view_learner))
        .route(
            routes::EDIT_LEARNER,
            get(learners::edit_learner_page).post(learners::edit_learner),
        )
        .route(routes::DELETE_LEARNER, post(learners::delete_learner))
        .route(
            routes::ADD_LEARNER_GRADE,
            get(grades::add_grade_page).post(grades::add_grade),
        )
        .route(
            routes::EDIT_LEARNER_GRADE,
            get(grades::edit_grade_page).post(grades::edit_grade),
        )
        .route(routes::DELETE_LEARNER_GRADE, post(grades::delete_grade))
        .route_layer(middleware::from_fn(login::require_auth));

    Router::new()
        .route(
            routes::LOGIN,
            get(login::serve_login_page).post(login::handle_login),
        )
        .route(
            routes::REGISTER,
            get(login::serve_register_page).post(login::handle_register),
        )
        .merge(protected)
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

/// Open the database, compile templates and serve until the process stops.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(&config.database)?;
    let views = Views::new()?;
    let state = Arc::new(AppState::new(store, views, config.session_ttl()));

    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(&config.bind).await?;
    log::info!(
        "gradebook listening on http://{} (database {})",
        listener.local_addr()?,
        config.database.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}
