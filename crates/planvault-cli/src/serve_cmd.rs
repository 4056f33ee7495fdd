use std::borrow::Cow;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::header::{ETAG, IF_MATCH, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use planvault_core::{
    Plan, PlanError, PlanService, ReadOutcome, Validators, evaluate_read, stamp_on_create,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    /// Log `err` and hide its detail from the client.
    pub fn internal(err: &dyn std::error::Error) -> Self {
        tracing::error!(error = %ErrorChain(err), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Validation(msg) => Self::bad_request(msg),
            PlanError::NotFound(_) => Self::not_found("Plan not found"),
            PlanError::AlreadyExists(_) => Self::conflict("Plan already exists"),
            other => Self::internal(&other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Renders an error with its `source()` chain, `a: b: c`.
struct ErrorChain<'a>(&'a dyn std::error::Error);

impl std::fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(service: PlanService) -> Router {
    // The bare `/plan` and `/plan/` routes exist so a missing id is a 400
    // rather than a 404/405.
    let v1 = Router::new()
        .route("/plan", post(create_plan).get(get_plan).delete(delete_plan))
        .route("/plan/", get(get_plan).delete(delete_plan))
        .route("/plan/{object_id}", get(get_plan).delete(delete_plan))
        .route("/plans", get(list_plans));

    Router::new()
        .nest("/v1", v1)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(service: PlanService, bind: &str, port: u16) -> Result<()> {
    let backend = service.repository().backend().to_string();
    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    let addr = listener.local_addr()?;
    tracing::info!(store = %backend, "planvault listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("planvault shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn object_id(path: Result<Path<String>, PathRejection>) -> Result<String, AppError> {
    match path {
        Ok(Path(id)) if !id.trim().is_empty() => Ok(id),
        _ => Err(AppError::bad_request("objectId is required")),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<Cow<'a, str>> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()))
}

fn validators(headers: &HeaderMap) -> Validators {
    let if_none_match = header_str(headers, &IF_NONE_MATCH);
    let if_match = header_str(headers, &IF_MATCH);
    Validators::new(if_none_match.as_deref(), if_match.as_deref())
}

fn with_etag(mut response: Response, etag: &str) -> Response {
    if etag.is_empty() {
        return response;
    }
    match HeaderValue::from_str(etag) {
        Ok(value) => {
            response.headers_mut().insert(ETAG, value);
        }
        Err(e) => tracing::warn!(error = %e, "etag is not a valid header value"),
    }
    response
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// The body is decoded as JSON whatever its `Content-Type` says.
async fn create_plan(
    State(service): State<PlanService>,
    body: Bytes,
) -> Result<Response, AppError> {
    let plan: Plan = serde_json::from_slice(&body).map_err(|e| {
        tracing::info!(reason = %e, "rejected plan body");
        AppError::bad_request("Missing or invalid fields in the request")
    })?;

    service.create(&plan).await?;

    let etag = stamp_on_create(&plan);
    let body = serde_json::json!({ "message": "Plan created successfully" });
    Ok(with_etag(
        (StatusCode::CREATED, Json(body)).into_response(),
        &etag,
    ))
}

async fn get_plan(
    State(service): State<PlanService>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id = object_id(path)?;
    let plan = service.get(&id).await?;

    let response = match evaluate_read(plan, &validators(&headers)) {
        ReadOutcome::NotModified => StatusCode::NOT_MODIFIED.into_response(),
        ReadOutcome::PreconditionFailed => StatusCode::PRECONDITION_FAILED.into_response(),
        ReadOutcome::Fresh { body, etag } => with_etag(Json(body).into_response(), &etag),
    };
    Ok(response)
}

async fn delete_plan(
    State(service): State<PlanService>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    let id = object_id(path)?;
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_plans(State(service): State<PlanService>) -> Result<Response, AppError> {
    // Any failure here (including a key vanishing mid-scan) is a 500.
    let plans = service
        .get_all()
        .await
        .map_err(|e| AppError::internal(&e))?;
    Ok(Json(plans).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
