use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::AdminSession;
use crate::error::AppResult;
use crate::models::{Property, PropertyPatch};
use crate::services::{EntityView, PropertyInput, UpsertOutcome, Upserted};
use crate::state::AppState;

pub async fn list_properties(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<Vec<Property>>> {
    let properties = session
        .services(&state)
        .properties
        .base()
        .repository()
        .list_all(None)
        .await?;
    Ok(Json(properties))
}

pub async fn get_property(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<EntityView<Property>>> {
    let services = session.services(&state);
    let property = services.properties.base().get(&id).await?;
    Ok(Json(services.properties.base().view(property)))
}

pub async fn upsert_property(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<PropertyInput>,
) -> AppResult<(StatusCode, Json<Upserted<Property>>)> {
    let upserted = session.services(&state).properties.upsert(&payload).await?;
    let status = match upserted.outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Merged | UpsertOutcome::Unchanged => StatusCode::OK,
    };
    Ok((status, Json(upserted)))
}

pub async fn update_property(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<PropertyPatch>,
) -> AppResult<Json<Property>> {
    let property = session
        .services(&state)
        .properties
        .update(&id, &payload)
        .await?;
    Ok(Json(property))
}

pub async fn delete_property(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    session.services(&state).properties.base().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
