use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::AdminSession;
use crate::error::AppResult;
use crate::models::{NewQuote, Quote, QuotePatch, QuoteStatus};
use crate::services::EntityView;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TransitionQuote {
    pub status: QuoteStatus,
}

pub async fn list_quotes(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<Vec<Quote>>> {
    let quotes = session
        .services(&state)
        .quotes
        .base()
        .repository()
        .list_all(None)
        .await?;
    Ok(Json(quotes))
}

pub async fn list_request_quotes(
    State(state): State<AppState>,
    session: AdminSession,
    Path(request_id): Path<String>,
) -> AppResult<Json<Vec<Quote>>> {
    let quotes = session
        .services(&state)
        .quotes
        .list_for_request(&request_id)
        .await?;
    Ok(Json(quotes))
}

pub async fn get_quote(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<EntityView<Quote>>> {
    let services = session.services(&state);
    let quote = services.quotes.base().get(&id).await?;
    Ok(Json(services.quotes.base().view(quote)))
}

pub async fn create_quote(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<NewQuote>,
) -> AppResult<(StatusCode, Json<Quote>)> {
    let quote = session.services(&state).quotes.create(payload).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn update_quote(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<QuotePatch>,
) -> AppResult<Json<Quote>> {
    let quote = session
        .services(&state)
        .quotes
        .update(&id, &payload)
        .await?;
    Ok(Json(quote))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    session.services(&state).quotes.base().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn transition_quote(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<TransitionQuote>,
) -> AppResult<Json<Quote>> {
    let quote = session
        .services(&state)
        .quotes
        .transition(&id, payload.status)
        .await?;
    Ok(Json(quote))
}
