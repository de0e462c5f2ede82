use crate::error::StatementError;
use crate::schema::LoanPredictionResponse;
use crate::service::{StatementService, TrainingDatapointRequest};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub service: StatementService,
}

/// Error body is `{"detail": message}`.
#[derive(Debug)]
pub struct ApiError(pub StatementError);

impl From<StatementError> for ApiError {
    fn from(err: StatementError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            StatementError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PredictionParams {
    statement_pdf_blob: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrainingParams {
    statement_analysis_ref: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrainingSaved {
    message: &'static str,
    statement_analysis_ref: String,
}

pub fn router(service: StatementService) -> Router {
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/get_loan_prediction_endpoint/",
            post(get_loan_prediction),
        )
        .route(
            "/save_training_datapoint_endpoint/",
            post(save_training_datapoint),
        )
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_loan_prediction(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictionParams>,
) -> Result<Json<LoanPredictionResponse>, ApiError> {
    let blob = params
        .statement_pdf_blob
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| {
            StatementError::InvalidRequest("statement_pdf_blob is required".to_string())
        })?;

    let response = state.service.get_loan_prediction(&blob).await?;
    Ok(Json(response))
}

async fn save_training_datapoint(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrainingParams>,
    body: Bytes,
) -> Result<Json<TrainingSaved>, ApiError> {
    let mut request = parse_training_body(&body)?;
    if let Some(statement_ref) = params.statement_analysis_ref {
        request.statement_analysis_ref = Some(statement_ref);
    }

    let statement_analysis_ref = state.service.save_training_datapoint(request).await?;
    Ok(Json(TrainingSaved {
        message: "Training data point saved successfully",
        statement_analysis_ref,
    }))
}

fn parse_training_body(body: &[u8]) -> Result<TrainingDatapointRequest, StatementError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TrainingDatapointRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| StatementError::InvalidRequest(format!("Invalid request body: {}", e)))
}
