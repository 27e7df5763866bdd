use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::AdminSession;
use crate::error::AppResult;
use crate::models::{Milestone, NewProject, Project, ProjectPatch};
use crate::services::EntityView;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddComment {
    pub author: String,
    pub body: String,
}

pub async fn list_projects(
    State(state): State<AppState>,
    session: AdminSession,
) -> AppResult<Json<Vec<Project>>> {
    let projects = session
        .services(&state)
        .projects
        .base()
        .repository()
        .list_all(None)
        .await?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<EntityView<Project>>> {
    let services = session.services(&state);
    let project = services.projects.base().get(&id).await?;
    Ok(Json(services.projects.base().view(project)))
}

pub async fn create_project(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<NewProject>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = session.services(&state).projects.create(payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn create_from_quote(
    State(state): State<AppState>,
    session: AdminSession,
    Path(quote_id): Path<String>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = session
        .services(&state)
        .projects
        .create_from_quote(&quote_id)
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<ProjectPatch>,
) -> AppResult<Json<Project>> {
    let project = session
        .services(&state)
        .projects
        .update(&id, &payload)
        .await?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    session.services(&state).projects.base().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_milestone(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<Milestone>,
) -> AppResult<Json<Project>> {
    let project = session
        .services(&state)
        .projects
        .add_milestone(&id, payload)
        .await?;
    Ok(Json(project))
}

pub async fn add_comment(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<AddComment>,
) -> AppResult<Json<Project>> {
    let project = session
        .services(&state)
        .projects
        .add_comment(&id, &payload.author, &payload.body)
        .await?;
    Ok(Json(project))
}
