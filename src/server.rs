//! HTTP surface: `POST /contract`, `GET /health`, `GET /`.

use crate::logging::{log_contract_card, log_error_card};
use crate::{ContractError, ContractRequest, ContractResponse, ContractService, HealthStatus};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
struct AppState {
    service: ContractService,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Serialize)]
struct ServiceInfo {
    message: &'static str,
    version: &'static str,
    endpoints: [&'static str; 2],
}

pub fn router(service: ContractService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/contract", post(contract_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(service: ContractService, addr: SocketAddr) -> Result<(), ContractError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ContractError::InvalidConfiguration(format!("cannot bind {addr}: {e}")))?;

    info!("API server listening on {}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ContractError::InvalidConfiguration(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

async fn root_handler() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "QuickContract API へようこそ",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ["POST /contract", "GET /health"],
    })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.service.health().await)
}

async fn contract_handler(
    State(state): State<AppState>,
    payload: Result<Json<ContractRequest>, JsonRejection>,
) -> Result<Json<ContractResponse>, ApiErrorResponse> {
    let Json(request) = payload.map_err(|rejection| {
        ApiErrorResponse(ContractError::InvalidRequest(rejection.body_text()))
    })?;

    match state.service.generate_contract(&request.url).await {
        Ok(response) => {
            log_contract_card(&response);
            Ok(Json(response))
        }
        Err(e) => {
            log_error_card(&request.url, &e);
            Err(ApiErrorResponse(e))
        }
    }
}

struct ApiErrorResponse(ContractError);

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            detail: self.0.detail(),
        };

        (status, Json(body)).into_response()
    }
}
