use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        GenerateCardRequest, GenerateCardResponse, HistoryQuery, HistoryResponse, UnusedQuery,
        UnusedResponse, UsageResponse, UsedResponse,
    },
    repo_types::Category,
    services::{parse_difficulty, resolve_card},
};
use crate::{
    auth::extractors::{CurrentUser, MaybeUser},
    error::{AppError, AppResult, JsonBody},
    state::AppState,
};

const MAX_HISTORY: i64 = 100;

pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/cards/generate", post(generate_card))
}

pub fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/cards/history", get(card_history))
        .route("/cards/unused", get(unused_card))
        .route("/cards/:id/usage", get(card_usage))
        .route("/cards/:id/used", get(card_used))
}

/// POST /cards/generate { category, secretItem?, difficulty? }
#[instrument(skip(state, identity, body))]
pub async fn generate_card(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    JsonBody(body): JsonBody<GenerateCardRequest>,
) -> AppResult<Json<GenerateCardResponse>> {
    let resolution = resolve_card(&state, body, identity).await?;
    let message = resolution.message().to_string();
    Ok(Json(GenerateCardResponse {
        success: true,
        card: resolution.card,
        message,
        from_database: resolution.from_database,
        warnings: resolution.warnings,
    }))
}

/// GET /cards/history?limit=50
#[instrument(skip(state, user))]
pub async fn card_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<HistoryQuery>,
) -> AppResult<Json<HistoryResponse>> {
    let limit = q.limit.clamp(1, MAX_HISTORY);
    let history = state.ledger.history(user.id, limit).await?;
    Ok(Json(HistoryResponse {
        success: true,
        history,
    }))
}

/// GET /cards/unused?category=pessoa&difficulty=fácil
#[instrument(skip(state, user))]
pub async fn unused_card(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<UnusedQuery>,
) -> AppResult<Json<UnusedResponse>> {
    let category = Category::parse(&q.category)
        .ok_or_else(|| AppError::BadRequest("Categoria inválida".into()))?;
    let difficulty = parse_difficulty(&q.difficulty)?;

    let remaining = state
        .ledger
        .count_unused(user.id, category.as_str(), difficulty)
        .await?;
    let card = state
        .ledger
        .find_unused(user.id, category.as_str(), difficulty)
        .await?;
    Ok(Json(UnusedResponse {
        success: true,
        card,
        remaining,
    }))
}

/// GET /cards/:id/usage
#[instrument(skip(state))]
pub async fn card_usage(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> AppResult<Json<UsageResponse>> {
    let users = state.ledger.count_usage(card_id).await?;
    Ok(Json(UsageResponse { card_id, users }))
}

/// GET /cards/:id/used, whether the caller has already been served this card
#[instrument(skip(state, user))]
pub async fn card_used(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(card_id): Path<Uuid>,
) -> AppResult<Json<UsedResponse>> {
    let used = state.ledger.has_used(user.id, card_id).await?;
    Ok(Json(UsedResponse { card_id, used }))
}
