use thiserror::Error;

use guidepost_types::api::HandshakeParams;
use guidepost_types::models::{Participant, ParticipantId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("handshake must carry studentId or counselorId")]
    MissingIdentity,

    #[error("handshake must carry only one of studentId and counselorId")]
    AmbiguousIdentity,

    #[error("malformed {field} '{value}'")]
    MalformedId { field: &'static str, value: String },
}

/// Resolve the connecting participant. Exactly one identity must be present;
/// anything else is rejected rather than guessed at.
pub fn parse_handshake(params: &HandshakeParams) -> Result<Participant, HandshakeError> {
    match (&params.student_id, &params.counselor_id) {
        (Some(raw), None) => Ok(Participant::student(parse_id("studentId", raw)?)),
        (None, Some(raw)) => Ok(Participant::counselor(parse_id("counselorId", raw)?)),
        (None, None) => Err(HandshakeError::MissingIdentity),
        (Some(_), Some(_)) => Err(HandshakeError::AmbiguousIdentity),
    }
}

fn parse_id(field: &'static str, raw: &str) -> Result<ParticipantId, HandshakeError> {
    match raw.trim().parse::<ParticipantId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(HandshakeError::MalformedId {
            field,
            value: raw.chars().take(32).collect(),
        }),
    }
}
