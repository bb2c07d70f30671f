use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};

use crate::auth;
use crate::config::AppConfig;
use crate::db::{self, DbPool};
use crate::error::AppError;
use crate::handlers;
use crate::user::ensure_user;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: DbPool,
}

/// The user id resolved from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("Invalid Authorization header format"))?;
    let user_id = auth::validate_token(token.trim(), &state.config.jwt_secret)?;

    let id = user_id.clone();
    db::with_connection(&state.pool, move |conn| ensure_user(conn, &id)).await?;
    log::debug!("Authenticated user: {}", user_id);

    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/me", get(handlers::get_me).post(handlers::save_me))
        .route("/listings", post(handlers::create_listing))
        .route("/listings/others", get(handlers::listings_of_others))
        .route("/match/next", get(handlers::next_candidate))
        .route("/match/swipe", post(handlers::swipe))
        .route("/matches", get(handlers::list_matches))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/", get(|| async { "Hello, Scrap Exchange!" }))
        .route("/health", get(handlers::health))
        .route("/auth/anonymous", post(handlers::anonymous_session))
        .route("/auth/login", post(handlers::login))
        .merge(protected_routes)
        .with_state(state)
}
