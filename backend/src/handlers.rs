use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::{AppState, CurrentUser};
use crate::auth;
use crate::candidate::{self, CandidateQuery};
use crate::db::{self, with_connection};
use crate::error::AppError;
use crate::listing;
use crate::matches;
use crate::models::{ListingRequest, LoginRequest, NextQuery, ProfileRequest, SessionResponse, SwipeRequest};
use crate::swipe;
use crate::user;

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    with_connection(&state.pool, db::ping).await?;
    Ok(Json(json!({"status": "ok"})))
}

/// Starts a session for a fresh anonymous user.
pub async fn anonymous_session(State(state): State<AppState>) -> Result<Json<SessionResponse>, AppError> {
    let user_id = Uuid::new_v4().to_string();
    let id = user_id.clone();
    with_connection(&state.pool, move |conn| user::ensure_user(conn, &id)).await?;
    let token = auth::create_token(&user_id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    Ok(Json(SessionResponse { token, user_id }))
}

/// Exchanges an identity assertion from the OAuth provider for a session
/// bound to the provider's stable subject.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, AppError> {
    let Json(request) = body?;
    let provider_secret = state
        .config
        .identity_provider_secret
        .as_deref()
        .ok_or(AppError::NotConfigured("IDENTITY_PROVIDER_SECRET"))?;
    let identity = auth::verify_identity_assertion(&request.assertion, provider_secret)?;
    let user = with_connection(&state.pool, move |conn| user::upsert_external_identity(conn, &identity)).await?;
    let token = auth::create_token(&user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    Ok(Json(SessionResponse {
        token,
        user_id: user.id,
    }))
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let id = user_id.clone();
    let me = with_connection(&state.pool, move |conn| user::get_profile(conn, &id)).await?;
    Ok(Json(match me {
        Some(me) => json!({"me": me}),
        None => json!({"me": {"id": user_id}}),
    }))
}

pub async fn save_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(profile) = body?;
    let me = with_connection(&state.pool, move |conn| user::upsert_profile(conn, &user_id, &profile)).await?;
    Ok(Json(json!({"me": me})))
}

pub async fn create_listing(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    body: Result<Json<ListingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = body?;
    let listing =
        with_connection(&state.pool, move |conn| listing::create_listing(conn, &user_id, &request)).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "listing": listing}))))
}

pub async fn listings_of_others(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let listings = with_connection(&state.pool, move |conn| listing::listings_of_others(conn, &user_id)).await?;
    Ok(Json(json!({"listings": listings})))
}

pub async fn next_candidate(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(params): Query<NextQuery>,
) -> Result<Json<Value>, AppError> {
    let query = CandidateQuery::from_params(&params)?;
    let card = with_connection(&state.pool, move |conn| candidate::next_candidate(conn, &user_id, &query)).await?;
    Ok(Json(json!({"card": card})))
}

pub async fn swipe(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    body: Result<Json<SwipeRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = body?;
    let (listing_id, decision) = swipe::parse_swipe(&request)?;
    let outcome =
        with_connection(&state.pool, move |conn| swipe::record_swipe(conn, &user_id, listing_id, decision)).await?;
    Ok(Json(json!({
        "success": true,
        "matched": outcome.matched,
        "match_id": outcome.match_id,
    })))
}

pub async fn list_matches(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let matches = with_connection(&state.pool, move |conn| matches::list_matches(conn, &user_id)).await?;
    Ok(Json(json!({"matches": matches})))
}
