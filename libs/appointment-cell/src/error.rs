use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::ConsultationStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppointmentError {
    #[error("Clinic not found: {0}")]
    ClinicNotFound(String),

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Clinic is fully booked for this date => {}", .0.format("%a %b %d %Y"))]
    CapacityExceeded(NaiveDate),

    #[error("You already have an appointment with this doctor on {}", .0.format("%a %b %d %Y"))]
    DuplicateBooking(NaiveDate),

    #[error("No valid next status for '{0}'")]
    NoNextState(ConsultationStatus),

    #[error("No previous status to revert to for '{0}'")]
    NoPreviousState(ConsultationStatus),

    #[error("Appointment {0} changed status concurrently, reload and retry")]
    StatusConflict(Uuid),

    #[error("Invalid booking: {0}")]
    Validation(String),

    #[error("Appointment store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::ClinicNotFound(_)
            | AppointmentError::PatientNotFound
            | AppointmentError::AppointmentNotFound(_) => AppError::NotFound(message),
            AppointmentError::CapacityExceeded(_)
            | AppointmentError::DuplicateBooking(_)
            | AppointmentError::NoNextState(_)
            | AppointmentError::NoPreviousState(_)
            | AppointmentError::Validation(_) => AppError::BadRequest(message),
            AppointmentError::StatusConflict(_) => AppError::Conflict(message),
            AppointmentError::StoreUnavailable(_) => AppError::ServiceUnavailable(message),
            AppointmentError::Internal(_) => AppError::Internal(message),
        }
    }
}
