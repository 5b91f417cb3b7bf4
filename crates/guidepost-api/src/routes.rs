use axum::{
    Json, Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::rejection::WebSocketUpgradeRejection,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use guidepost_gateway::connection;
use guidepost_gateway::handshake::parse_handshake;
use guidepost_types::api::HandshakeParams;

use crate::accounts;
use crate::error::ServiceError;
use crate::messages;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/students", post(accounts::create_student))
        .route("/counselors", post(accounts::create_counselor))
        .route("/students/{student_id}/messages", post(messages::student_send))
        .route("/counselors/{counselor_id}/messages", post(messages::counselor_send))
        .route(
            "/conversations/{student_id}/{counselor_id}/messages",
            get(messages::history),
        )
        .route("/presence", get(presence))
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

async fn presence(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.lifecycle.registry().snapshot().await)
}

/// The handshake is validated before the upgrade, so a bad one gets a plain
/// 400 and never touches the registry.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let participant = match parse_handshake(&params) {
        Ok(participant) => participant,
        Err(e) => {
            warn!("Rejected gateway handshake: {}", e);
            return ServiceError::from(e).into_response();
        }
    };

    match ws {
        Ok(ws) => {
            let lifecycle = state.lifecycle.clone();
            ws.on_upgrade(move |socket| connection::handle_connection(socket, lifecycle, participant))
        }
        Err(rejection) => rejection.into_response(),
    }
}
