use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::AdminSession;
use crate::error::AppResult;
use crate::models::{Contact, ContactPatch};
use crate::services::{ContactInput, EntityView, UpsertOutcome, Upserted};
use crate::state::AppState;

pub async fn list_contacts(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<Vec<Contact>>> {
    let contacts = session
        .services(&state)
        .contacts
        .base()
        .repository()
        .list_all(None)
        .await?;
    Ok(Json(contacts))
}

pub async fn get_contact(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<EntityView<Contact>>> {
    let services = session.services(&state);
    let contact = services.contacts.base().get(&id).await?;
    Ok(Json(services.contacts.base().view(contact)))
}

/// Creating a contact whose email already exists merges into that contact.
pub async fn upsert_contact(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<ContactInput>,
) -> AppResult<(StatusCode, Json<Upserted<Contact>>)> {
    let upserted = session.services(&state).contacts.upsert(&payload).await?;
    let status = match upserted.outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Merged | UpsertOutcome::Unchanged => StatusCode::OK,
    };
    Ok((status, Json(upserted)))
}

pub async fn update_contact(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<ContactPatch>,
) -> AppResult<Json<Contact>> {
    let contact = session
        .services(&state)
        .contacts
        .update(&id, &payload)
        .await?;
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    session.services(&state).contacts.base().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
