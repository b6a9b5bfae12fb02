// libs/appointment-cell/src/services/allocation.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, BookingDraft, ClaimOutcome, Clinic, PatientProfile, PatientSnapshot,
    PendingAppointment, SchedulingSettings, SlotClaim,
};
use crate::services::calendar::{day_window, token_prefix};
use crate::services::directory::{ClinicCapacityDirectory, PatientDirectory};
use crate::services::store::AppointmentStore;

/// Assigns per-day appointment numbers against a clinic's daily capacity.
pub struct SlotAllocationService {
    store: Arc<dyn AppointmentStore>,
    clinics: Arc<dyn ClinicCapacityDirectory>,
    patients: Arc<dyn PatientDirectory>,
    settings: SchedulingSettings,
}

impl SlotAllocationService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        clinics: Arc<dyn ClinicCapacityDirectory>,
        patients: Arc<dyn PatientDirectory>,
        settings: SchedulingSettings,
    ) -> Self {
        Self { store, clinics, patients, settings }
    }

    /// Books `draft` on `requested_date` at `clinic_id`, or at the doctor's
    /// clinic when no clinic is given.
    ///
    /// The booking that brings the day's open count up to capacity also
    /// advances the clinic's latest available date by one day. Once the day
    /// is full further requests fail with `CapacityExceeded`.
    ///
    /// `requested_date` is not checked against today; callers reject past dates.
    #[instrument(skip(self, draft), fields(doctor_id = %draft.doctor_id, booked_by = %draft.booked_by))]
    pub async fn allocate(
        &self,
        clinic_id: Option<Uuid>,
        requested_date: NaiveDate,
        draft: BookingDraft,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Allocating slot on {} for clinic {:?}", requested_date, clinic_id);

        let caller_patient = self.patients.find_patient_by_user(draft.booked_by).await?;
        let snapshot = Self::resolve_snapshot(&draft, caller_patient.as_ref())?;

        let clinic = self.resolve_clinic(clinic_id, draft.doctor_id).await?;
        let window = day_window(requested_date, self.settings.utc_offset);

        if let Some(patient) = &caller_patient {
            if self.store.has_open_booking(patient.id, draft.doctor_id, window).await? {
                warn!("Patient {} already booked doctor {} on {}", patient.id, draft.doctor_id, requested_date);
                return Err(AppointmentError::DuplicateBooking(requested_date));
            }
        }

        let pending = PendingAppointment {
            id: Uuid::new_v4(),
            patient_id: caller_patient.as_ref().map(|p| p.id),
            doctor_id: draft.doctor_id,
            clinic_id: clinic.id,
            patient: snapshot,
            is_for_self: draft.is_for_self,
            preferred_date: window.start,
            token_prefix: token_prefix(&clinic.code, window.start, self.settings.utc_offset),
            time: draft.time,
            reason: draft.reason,
            remarks: draft.remarks,
            region: draft.region,
        };

        let claim = SlotClaim {
            clinic_id: clinic.id,
            window,
            capacity: clinic.capacity,
        };

        let (appointment, open_before) = match self.store.claim_slot(claim, pending).await? {
            ClaimOutcome::Granted { appointment, open_before } => (appointment, open_before),
            ClaimOutcome::Full { open } => {
                warn!(
                    "Clinic {} fully booked on {} ({} open of {})",
                    clinic.id, requested_date, open, clinic.capacity
                );
                return Err(AppointmentError::CapacityExceeded(requested_date));
            }
            ClaimOutcome::Duplicate => {
                warn!("Concurrent duplicate booking for doctor {} on {}", draft.doctor_id, requested_date);
                return Err(AppointmentError::DuplicateBooking(requested_date));
            }
        };

        if open_before + 1 == clinic.capacity {
            self.roll_over(&clinic).await;
        }

        if let Some(patient) = &caller_patient {
            if let Err(e) = self.patients.add_known_doctor(patient.id, appointment.doctor_id).await {
                warn!("Failed to link doctor {} to patient {}: {}", appointment.doctor_id, patient.id, e);
            }
        }

        info!(
            "Appointment {} allocated as {} for clinic {}",
            appointment.id, appointment.appointment_token, clinic.id
        );
        Ok(appointment)
    }

    async fn resolve_clinic(&self, clinic_id: Option<Uuid>, doctor_id: Uuid) -> Result<Clinic, AppointmentError> {
        match clinic_id {
            Some(id) => self
                .clinics
                .get_clinic(id)
                .await?
                .ok_or_else(|| AppointmentError::ClinicNotFound(id.to_string())),
            None => self
                .clinics
                .find_clinic_by_doctor(doctor_id)
                .await?
                .ok_or_else(|| {
                    AppointmentError::ClinicNotFound(format!("no clinic found for doctor {}", doctor_id))
                }),
        }
    }

    fn resolve_snapshot(
        draft: &BookingDraft,
        caller_patient: Option<&PatientProfile>,
    ) -> Result<PatientSnapshot, AppointmentError> {
        if draft.is_for_self {
            return caller_patient
                .map(PatientProfile::snapshot)
                .ok_or(AppointmentError::PatientNotFound);
        }

        draft.patient.clone().ok_or_else(|| {
            AppointmentError::Validation("patient details are required when booking for someone else".to_string())
        })
    }

    /// Runs after the insert; failures are logged only.
    async fn roll_over(&self, clinic: &Clinic) {
        match self.clinics.advance_latest_available_date(clinic.id).await {
            Ok(updated) => info!(
                "Clinic {} reached capacity, latest available date now {}",
                clinic.id, updated.latest_available_date
            ),
            Err(e) => error!("Failed to advance latest available date for clinic {}: {}", clinic.id, e),
        }
    }
}
