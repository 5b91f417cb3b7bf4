use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use guidepost_types::api::{CounselorSendRequest, StudentSendRequest};
use guidepost_types::models::{ParticipantId, Role};

use crate::error::ServiceResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

/// POST /students/{student_id}/messages: the student writes to a counselor.
pub async fn student_send(
    State(state): State<AppState>,
    ApiPath(student_id): ApiPath<ParticipantId>,
    ApiJson(req): ApiJson<StudentSendRequest>,
) -> ServiceResult<impl IntoResponse> {
    let message = state
        .conversations
        .send(student_id, req.counselor_id, Role::Student, req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /counselors/{counselor_id}/messages: the counselor writes to a student.
pub async fn counselor_send(
    State(state): State<AppState>,
    ApiPath(counselor_id): ApiPath<ParticipantId>,
    ApiJson(req): ApiJson<CounselorSendRequest>,
) -> ServiceResult<impl IntoResponse> {
    let message = state
        .conversations
        .send(req.student_id, counselor_id, Role::Counselor, req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn history(
    State(state): State<AppState>,
    ApiPath((student_id, counselor_id)): ApiPath<(ParticipantId, ParticipantId)>,
) -> ServiceResult<impl IntoResponse> {
    let messages = state.conversations.history(student_id, counselor_id).await?;
    Ok(Json(messages))
}
