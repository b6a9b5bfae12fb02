// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::error::AppointmentError;
use crate::models::{BookingDraft, Clinic, PatientProfile, PatientSnapshot};
use crate::services::calendar::local_today;
use crate::services::AppointmentServices;

pub const ROLE_PATIENT: &str = "patient";
pub const ROLE_DOCTOR: &str = "doctor";
pub const ROLE_CLINIC: &str = "clinic";

const STAFF_ROLES: [&str; 2] = [ROLE_CLINIC, ROLE_DOCTOR];

// ==============================================================================
// REQUEST STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    /// Defaults to the doctor's clinic.
    pub clinic_id: Option<Uuid>,
    pub doctor_id: Uuid,
    /// `DD/MM/YYYY`
    pub preferred_date: String,
    #[serde(default = "default_true")]
    pub is_for_self: bool,
    /// Required when `is_for_self` is false.
    pub patient: Option<PatientSnapshot>,
    pub time: String,
    pub reason: String,
    pub remarks: Option<String>,
    pub region: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    /// `YYYY-MM-DD`
    pub date: Option<String>,
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn caller_id(user: &User) -> Result<Uuid, AppError> {
    user.user_uuid()
        .ok_or_else(|| AppError::Auth("Token subject is not a valid user id".to_string()))
}

async fn caller_patient(services: &AppointmentServices, user: &User) -> Result<PatientProfile, AppError> {
    let user_id = caller_id(user)?;
    services
        .patients
        .find_patient_by_user(user_id)
        .await?
        .ok_or_else(|| AppointmentError::PatientNotFound.into())
}

/// Clinic of a clinic account, or the clinic a doctor works at.
async fn staff_clinic(services: &AppointmentServices, user: &User) -> Result<Clinic, AppError> {
    require_role(user, &STAFF_ROLES)?;
    let user_id = caller_id(user)?;
    services
        .clinics
        .find_clinic_for_staff(user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("No clinic is associated with this account".to_string()))
}

fn parse_booking_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y")
        .map_err(|_| AppError::BadRequest("Invalid preferred_date format. Use DD/MM/YYYY".to_string()))
}

fn parse_query_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid date format. Use YYYY-MM-DD".to_string()))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn create_appointment(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, &[ROLE_PATIENT])?;
    let booked_by = caller_id(&user)?;

    let date = parse_booking_date(&request.preferred_date)?;
    if date < local_today(services.settings.utc_offset) {
        return Err(AppError::BadRequest("Cannot book an appointment in the past".to_string()));
    }

    let draft = BookingDraft {
        booked_by,
        is_for_self: request.is_for_self,
        doctor_id: request.doctor_id,
        patient: request.patient,
        time: request.time,
        reason: request.reason,
        remarks: request.remarks,
        region: request.region,
    };

    let appointment = services.allocator.allocate(request.clinic_id, date, draft).await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

pub async fn cancel_appointment(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_PATIENT])?;
    let patient = caller_patient(&services, &user).await?;

    let appointment = services.lifecycle.cancel(appointment_id, patient.id).await?;

    Ok(Json(json!({
        "message": "Appointment deleted successfully.",
        "appointment": appointment
    })))
}

// ==============================================================================
// READ HANDLERS
// ==============================================================================

pub async fn get_appointment(
    State(services): State<Arc<AppointmentServices>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = services.queries.get_appointment(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

pub async fn get_my_appointments(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_PATIENT])?;
    let patient = caller_patient(&services, &user).await?;

    let appointments = services.queries.appointments_for_patient(patient.id).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_doctor_appointments(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_DOCTOR])?;
    let doctor_id = caller_id(&user)?;

    let appointments = services.queries.appointments_for_doctor(doctor_id).await?;
    debug!("Doctor {} has {} appointments", doctor_id, appointments.len());

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_available_dates(
    State(services): State<Arc<AppointmentServices>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let dates = services.queries.available_dates(clinic_id).await?;
    Ok(Json(json!(dates)))
}

pub async fn get_today_appointments(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let clinic = staff_clinic(&services, &user).await?;
    let buckets = services.queries.today_buckets(clinic.id).await?;
    Ok(Json(json!(buckets)))
}

pub async fn get_appointments_by_date(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let clinic = staff_clinic(&services, &user).await?;
    let raw = query
        .date
        .ok_or_else(|| AppError::BadRequest("date (query) is required".to_string()))?;
    let date = parse_query_date(&raw)?;

    let buckets = services.queries.bucket_by_status(clinic.id, date).await?;

    Ok(Json(json!({
        "date": date,
        "clinicId": clinic.id,
        "appointments": buckets
    })))
}

// ==============================================================================
// STATUS HANDLERS
// ==============================================================================

async fn ensure_same_clinic(
    services: &AppointmentServices,
    clinic: &Clinic,
    appointment_id: Uuid,
) -> Result<(), AppError> {
    let appointment = services.queries.get_appointment(appointment_id).await?;
    if appointment.clinic_id != clinic.id {
        return Err(AppError::Forbidden("Appointment belongs to another clinic".to_string()));
    }
    Ok(())
}

pub async fn forward_status(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let clinic = staff_clinic(&services, &user).await?;
    ensure_same_clinic(&services, &clinic, appointment_id).await?;

    let appointment = services.lifecycle.advance(appointment_id).await?;

    Ok(Json(json!({
        "message": format!("Status updated to {}", appointment.status),
        "appointment": appointment
    })))
}

pub async fn reverse_status(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let clinic = staff_clinic(&services, &user).await?;
    ensure_same_clinic(&services, &clinic, appointment_id).await?;

    let appointment = services.lifecycle.revert(appointment_id).await?;

    Ok(Json(json!({
        "message": format!("Status reverted to {}", appointment.status),
        "appointment": appointment
    })))
}

pub async fn approve_appointment(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_DOCTOR])?;
    let appointment = services.lifecycle.approve(appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment approved successfully",
        "appointment": appointment
    })))
}

pub async fn reject_appointment(
    State(services): State<Arc<AppointmentServices>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[ROLE_DOCTOR])?;
    let appointment = services.lifecycle.reject(appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment rejected successfully",
        "appointment": appointment
    })))
}
