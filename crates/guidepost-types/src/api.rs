use serde::{Deserialize, Serialize};

use crate::models::ParticipantId;

// -- Accounts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAccountRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: ParticipantId,
    pub name: String,
}

// -- Messages --

/// Body of `POST /students/{student_id}/messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentSendRequest {
    pub counselor_id: ParticipantId,
    pub text: String,
}

/// Body of `POST /counselors/{counselor_id}/messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CounselorSendRequest {
    pub student_id: ParticipantId,
    pub text: String,
}

// -- Gateway --

/// Query parameters on the `/gateway` upgrade request. Exactly one must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeParams {
    pub student_id: Option<String>,
    pub counselor_id: Option<String>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
