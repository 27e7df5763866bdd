use axum::{extract::State, http::StatusCode, Json};

use crate::error::AppResult;
use crate::services::{ContactUsSubmission, EstimateSubmission, SubmissionReceipt};
use crate::state::AppState;

pub async fn submit_estimate(
    State(state): State<AppState>,
    Json(payload): Json<EstimateSubmission>,
) -> AppResult<(StatusCode, Json<SubmissionReceipt>)> {
    let receipt = state
        .public_services()
        .submissions
        .submit_estimate(payload)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn submit_contact_us(
    State(state): State<AppState>,
    Json(payload): Json<ContactUsSubmission>,
) -> AppResult<(StatusCode, Json<SubmissionReceipt>)> {
    let receipt = state
        .public_services()
        .submissions
        .submit_contact_us(payload)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
