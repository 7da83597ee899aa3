//! # API REST
//!
//! REST API for the Nutrilog consultation journal.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation served at `/api-docs/openapi.json`
//! - REST-specific concerns (JSON serialization, status codes, CORS)
//!
//! All journal logic lives in `nutrilog-core`; handlers only translate between HTTP and
//! [`JournalService`] calls.

#![warn(rust_2018_idioms)]

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use nutrilog_core::JournalService;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

pub mod dto;
pub mod error;
pub mod handlers;

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<JournalService>,
}

impl AppState {
    pub fn new(service: Arc<JournalService>) -> Self {
        Self { service }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_patients,
        handlers::get_patient,
        handlers::rename_patient,
        handlers::list_events,
        handlers::grouped_timeline,
        handlers::create_consultation,
        handlers::create_adjustment,
        handlers::edit_note,
        handlers::delete_event,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ListPatientsRes,
        dto::PatientRes,
        dto::RenamePatientReq,
        dto::ListEventsRes,
        dto::TimelineRes,
        dto::EventRes,
        dto::CreateConsultationReq,
        dto::CreateAdjustmentReq,
        dto::EditNoteReq,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router over a journal service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .route("/patients", get(handlers::list_patients))
        .route("/patients/:id", get(handlers::get_patient))
        .route("/patients/:id/name", put(handlers::rename_patient))
        .route("/patients/:id/events", get(handlers::list_events))
        .route("/patients/:id/timeline", get(handlers::grouped_timeline))
        .route("/patients/:id/adjustments", post(handlers::create_adjustment))
        .route("/consultations", post(handlers::create_consultation))
        .route("/events/:id/note", put(handlers::edit_note))
        .route("/events/:id", axum::routing::delete(handlers::delete_event))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
