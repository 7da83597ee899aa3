use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use nutrilog_core::{
    ClinicalResult, JournalResult, NewAdjustment, NewConsultation, PatientFilter, RecordId,
};
use utoipa::OpenApi;

use crate::dto::{
    CreateAdjustmentReq, CreateConsultationReq, EditNoteReq, EventRes, HealthRes,
    ListEventsRes, ListPatientsQuery, ListPatientsRes, PatientRes, RenamePatientReq,
    TimelineRes,
};
use crate::error::{api_error, bad_request, not_found, ApiError};
use crate::{ApiDoc, AppState};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Reports whether the service is up and whether journal snapshots are being stored.
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthRes>, ApiError> {
    let status = state.service.persistence_status().map_err(api_error)?;
    Ok(Json(HealthRes::from_status(status)))
}

/// Serves the OpenAPI document for this API.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/patients",
    params(
        ("q" = Option<String>, Query, description = "Case-insensitive name fragment"),
        ("date" = Option<String>, Query, description = "Day with activity, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Patients, latest activity first", body = ListPatientsRes),
        (status = 400, description = "Malformed date"),
        (status = 500, description = "Internal server error")
    )
)]
/// List patients with their consultation counts and last activity.
#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListPatientsQuery>,
) -> Result<Json<ListPatientsRes>, ApiError> {
    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| bad_request(format!("invalid date '{raw}', expected YYYY-MM-DD")))?,
        ),
        None => None,
    };
    let filter = PatientFilter {
        name_query: query.q,
        date,
    };

    let patients = state
        .service
        .read(|journal| journal.patient_summaries(&filter))
        .map_err(api_error)?;
    Ok(Json(ListPatientsRes { patients }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Patient record", body = PatientRes),
        (status = 404, description = "Patient not found")
    )
)]
#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientRes>, ApiError> {
    let id = parse_id(&id)?;
    let res = state
        .service
        .read(|journal| -> JournalResult<PatientRes> {
            let patient = journal.get_patient(&id)?.clone();
            let last_visit = journal.last_visit(&id)?;
            Ok(PatientRes {
                patient,
                last_visit,
            })
        })
        .and_then(|res| res)
        .map_err(api_error)?;
    Ok(Json(res))
}

#[utoipa::path(
    put,
    path = "/patients/{id}/name",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = RenamePatientReq,
    responses(
        (status = 200, description = "Patient after the rename", body = PatientRes),
        (status = 404, description = "Patient not found"),
        (status = 409, description = "Another patient already has this name")
    )
)]
/// Rename a patient. A blank name leaves the patient unchanged.
#[axum::debug_handler]
pub async fn rename_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenamePatientReq>,
) -> Result<Json<PatientRes>, ApiError> {
    let id = parse_id(&id)?;
    let res = state
        .service
        .mutate(|journal| {
            journal.rename_patient(&id, &req.name)?;
            Ok(PatientRes {
                patient: journal.get_patient(&id)?.clone(),
                last_visit: journal.last_visit(&id)?,
            })
        })
        .map_err(api_error)?;
    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/events",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Events, most recently recorded first", body = ListEventsRes),
        (status = 404, description = "Patient not found")
    )
)]
#[axum::debug_handler]
pub async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListEventsRes>, ApiError> {
    let id = parse_id(&id)?;
    let events = state
        .service
        .read(|journal| {
            journal
                .list_events(&id)
                .map(|events| events.into_iter().cloned().collect::<Vec<_>>())
        })
        .and_then(|res| res)
        .map_err(api_error)?;
    Ok(Json(ListEventsRes { events }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/timeline",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Consultations with their adjustments", body = TimelineRes),
        (status = 404, description = "Patient not found")
    )
)]
/// Timeline with adjustments nested under the consultation they amend.
#[axum::debug_handler]
pub async fn grouped_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TimelineRes>, ApiError> {
    let id = parse_id(&id)?;
    let entries = state
        .service
        .read(|journal| journal.grouped_timeline(&id))
        .and_then(|res| res)
        .map_err(api_error)?;
    Ok(Json(TimelineRes { entries }))
}

#[utoipa::path(
    post,
    path = "/consultations",
    request_body = CreateConsultationReq,
    responses(
        (status = 201, description = "Consultation recorded", body = EventRes),
        (status = 400, description = "Incomplete result or date before latest event"),
        (status = 500, description = "Internal server error")
    )
)]
/// Record a finalised consultation.
///
/// The patient is found by normalised name or created. The first consultation of a patient is
/// recorded as `initial`, later ones as `followup`.
#[axum::debug_handler]
pub async fn create_consultation(
    State(state): State<AppState>,
    Json(req): Json<CreateConsultationReq>,
) -> Result<(StatusCode, Json<EventRes>), ApiError> {
    let result = ClinicalResult::new(req.result).map_err(api_error)?;
    let input = NewConsultation {
        patient_name: req.patient_name,
        context: req.context,
        transcript: req.transcript,
        result,
        date: parse_date(req.date.as_deref())?,
    };

    let event = state
        .service
        .mutate(|journal| journal.record_consultation(input).cloned())
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(EventRes { event })))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/adjustments",
    params(("id" = String, Path, description = "Patient identifier")),
    request_body = CreateAdjustmentReq,
    responses(
        (status = 201, description = "Adjustment recorded", body = EventRes),
        (status = 400, description = "Blank note"),
        (status = 404, description = "Patient not found")
    )
)]
#[axum::debug_handler]
pub async fn create_adjustment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateAdjustmentReq>,
) -> Result<(StatusCode, Json<EventRes>), ApiError> {
    let input = NewAdjustment {
        patient_id: parse_id(&id)?,
        note: req.note,
        previous_plan: req.previous_plan,
        new_plan: req.new_plan,
        date: parse_date(req.date.as_deref())?,
    };

    let event = state
        .service
        .mutate(|journal| journal.record_adjustment(input).cloned())
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(EventRes { event })))
}

#[utoipa::path(
    put,
    path = "/events/{id}/note",
    params(("id" = String, Path, description = "Adjustment event identifier")),
    request_body = EditNoteReq,
    responses(
        (status = 204, description = "Note replaced"),
        (status = 400, description = "Blank note"),
        (status = 404, description = "No adjustment with this identifier")
    )
)]
/// Replace the note of an adjustment. Consultations cannot be edited.
#[axum::debug_handler]
pub async fn edit_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditNoteReq>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let changed = state
        .service
        .mutate(|journal| journal.edit_adjustment(&id, &req.note))
        .map_err(api_error)?;

    if changed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("adjustment not found: {id}")))
    }
}

#[utoipa::path(
    delete,
    path = "/events/{id}",
    params(("id" = String, Path, description = "Adjustment event identifier")),
    responses(
        (status = 204, description = "Adjustment deleted"),
        (status = 404, description = "No adjustment with this identifier")
    )
)]
/// Delete an adjustment. Consultations cannot be deleted.
#[axum::debug_handler]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .service
        .mutate(|journal| Ok(journal.delete_adjustment(&id)))
        .map_err(api_error)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("adjustment not found: {id}")))
    }
}

fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
    RecordId::parse(raw).map_err(|e| bad_request(e.to_string()))
}

fn parse_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| bad_request(format!("invalid date '{raw}', expected RFC 3339")))
}
