use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AdminSession;
use crate::error::{AppError, AppResult};
use crate::models::{AccountExecutive, NewRequest, Request, RequestPatch, RequestStatus};
use crate::repository::requests::RequestDetails;
use crate::services::Assignee;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub ae_id: String,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignResponse {
    pub assigned: bool,
    pub assignee: Option<AccountExecutive>,
}

pub async fn list_requests(
    State(state): State<AppState>,
    session: AdminSession,
    Query(query): Query<ListRequestsQuery>,
) -> AppResult<Json<Vec<RequestDetails>>> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;
    let details = session
        .services(&state)
        .requests
        .list_details(status)
        .await?;
    Ok(Json(details))
}

pub async fn get_request(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<RequestDetails>> {
    let details = session.services(&state).requests.details(&id).await?;
    Ok(Json(details))
}

pub async fn create_request(
    State(state): State<AppState>,
    session: AdminSession,
    Json(payload): Json<NewRequest>,
) -> AppResult<(StatusCode, Json<Request>)> {
    let request = session.services(&state).requests.create(payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn update_request(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<RequestPatch>,
) -> AppResult<Json<Request>> {
    let request = session
        .services(&state)
        .requests
        .update(&id, &payload)
        .await?;
    Ok(Json(request))
}

pub async fn assign_request(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<Json<Request>> {
    let request = session
        .services(&state)
        .assignment
        .assign(&id, &payload.ae_id)
        .await?;
    Ok(Json(request))
}

pub async fn auto_assign_request(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<AutoAssignResponse>> {
    let assignee = session
        .services(&state)
        .assignment
        .auto_assign(&id)
        .await?;
    let response = match assignee {
        Assignee::Executive(ae) => AutoAssignResponse {
            assigned: true,
            assignee: Some(ae),
        },
        Assignee::Unassigned => AutoAssignResponse {
            assigned: false,
            assignee: None,
        },
    };
    Ok(Json(response))
}

pub async fn transition_request(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
    Json(payload): Json<TransitionRequest>,
) -> AppResult<Json<Request>> {
    let target = parse_status(&payload.status)?;
    let request = session
        .services(&state)
        .requests
        .transition_status(&id, target)
        .await?;
    Ok(Json(request))
}

pub async fn reopen_request(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<String>,
) -> AppResult<Json<Request>> {
    let request = session.services(&state).requests.reopen(&id).await?;
    Ok(Json(request))
}

fn parse_status(raw: &str) -> AppResult<RequestStatus> {
    raw.parse::<RequestStatus>().map_err(AppError::bad_request)
}
