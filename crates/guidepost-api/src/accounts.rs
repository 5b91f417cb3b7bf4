use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use guidepost_db::models::AccountRow;
use guidepost_types::api::{AccountResponse, CreateAccountRequest};

use crate::error::{ServiceError, ServiceResult};
use crate::extract::ApiJson;
use crate::state::AppState;

const MAX_NAME_CHARS: usize = 64;

// Minimal account directory: enough to give sends something to validate
// against. Credentials live outside this service.

pub async fn create_student(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateAccountRequest>,
) -> ServiceResult<impl IntoResponse> {
    let name = validate_name(&req.name)?;
    let db = state.db.clone();
    let row = run_blocking(move || db.create_student(&name)).await?;
    info!("Created student {} ({})", row.id, row.name);
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn create_counselor(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateAccountRequest>,
) -> ServiceResult<impl IntoResponse> {
    let name = validate_name(&req.name)?;
    let db = state.db.clone();
    let row = run_blocking(move || db.create_counselor(&name)).await?;
    info!("Created counselor {} ({})", row.id, row.name);
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

fn validate_name(raw: &str) -> ServiceResult<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ServiceError::Validation(format!(
            "name must be 1-{} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

async fn run_blocking<F>(f: F) -> ServiceResult<AccountRow>
where
    F: FnOnce() -> anyhow::Result<AccountRow> + Send + 'static,
{
    let row = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Storage(anyhow::anyhow!("account task failed: {}", e)))??;
    Ok(row)
}

fn to_response(row: AccountRow) -> AccountResponse {
    AccountResponse {
        id: row.id,
        name: row.name,
    }
}
