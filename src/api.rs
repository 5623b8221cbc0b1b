//! REST API for the calculator
//!
//! Exposes the operation list and the execution engine over HTTP.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CalcError, OperationFailure};
use crate::execution::ExecutionEngine;
use crate::input::parse_decimal;
use crate::registry::{CategoryGroup, OperationDescriptor};

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteRequest {
    pub operation: String,
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct OperationSummary {
    pub name: String,
    pub description: Option<String>,
    pub arity: usize,
    pub parameters: Vec<String>,
}

impl From<&OperationDescriptor> for OperationSummary {
    fn from(descriptor: &OperationDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            description: descriptor.description().map(str::to_string),
            arity: descriptor.arity(),
            parameters: (0..descriptor.arity())
                .map(|i| descriptor.parameter_label(i))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub operations: Vec<OperationSummary>,
}

impl From<&CategoryGroup<'_>> for CategorySummary {
    fn from(group: &CategoryGroup<'_>) -> Self {
        Self {
            name: group.name.to_string(),
            description: group.description.map(str::to_string),
            sort_order: group.sort_order,
            operations: group.operations.iter().map(|d| OperationSummary::from(*d)).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub execution_id: Uuid,
    pub operation: String,
    pub result: Decimal,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: ExecutionEngine,
}

/// =============================
/// Helpers
/// =============================

fn parse_argument(value: &serde_json::Value) -> Result<Decimal, CalcError> {
    match value {
        serde_json::Value::String(s) => parse_decimal(s),
        serde_json::Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| CalcError::InvalidInput(text))
        }
        other => Err(CalcError::InvalidInput(other.to_string())),
    }
}

fn status_for(error: &CalcError) -> StatusCode {
    match error {
        CalcError::ValidationError { .. } | CalcError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CalcError::OperationNotFound(_) => StatusCode::NOT_FOUND,
        CalcError::InvocationError {
            source: OperationFailure::PriceFetch(_),
            ..
        } => StatusCode::BAD_GATEWAY,
        CalcError::InvocationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_operations(State(state): State<ApiState>) -> Json<ApiResponse> {
    let categories: Vec<CategorySummary> = state
        .engine
        .categories()
        .iter()
        .map(CategorySummary::from)
        .collect();

    Json(ApiResponse::success(categories))
}

async fn execute_operation(
    State(state): State<ApiState>,
    Json(req): Json<ExecuteRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let execution_id = Uuid::new_v4();
    info!(%execution_id, operation = %req.operation, "Received execute request");

    let result = run_request(&state.engine, &req).await;

    match result {
        Ok(value) => (
            StatusCode::OK,
            Json(ApiResponse::success(ExecuteResponse {
                execution_id,
                operation: req.operation,
                result: value,
            })),
        ),
        Err(e) => {
            warn!(%execution_id, operation = %req.operation, error = %e, "Execute request failed");
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

async fn run_request(engine: &ExecutionEngine, req: &ExecuteRequest) -> Result<Decimal, CalcError> {
    let descriptor = engine
        .find(&req.operation)
        .ok_or_else(|| CalcError::OperationNotFound(req.operation.clone()))?;

    let arguments = req
        .arguments
        .iter()
        .map(parse_argument)
        .collect::<Result<Vec<_>, _>>()?;

    engine.execute(descriptor, &arguments).await
}

/// =============================
/// Router
/// =============================

pub fn create_router(engine: ExecutionEngine) -> Router {
    let state = ApiState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/operations", get(list_operations))
        .route("/api/v1/operations/execute", post(execute_operation))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    engine: ExecutionEngine,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
