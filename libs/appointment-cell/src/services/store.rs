// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, ApprovalStatus, ClaimOutcome, ConsultationStatus, DayWindow, PendingAppointment,
    SlotClaim,
};

/// Durable appointment records.
///
/// `claim_slot` is the only write that touches scheduling fields and must
/// be atomic per (clinic, day). The duplicate check, counting open
/// appointments, the capacity check, numbering and the insert happen as
/// one step.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Appointments of `clinic_id` whose `preferred_date` falls in `window`,
    /// optionally restricted to one status, ordered by appointment number.
    async fn list_in_window(
        &self,
        clinic_id: Uuid,
        window: DayWindow,
        status: Option<ConsultationStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Non-completed appointments of `clinic_id` in `window`.
    async fn count_open_in_window(&self, clinic_id: Uuid, window: DayWindow) -> Result<u32, AppointmentError>;

    /// Early duplicate check. `claim_slot` repeats it under its lock.
    async fn has_open_booking(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        window: DayWindow,
    ) -> Result<bool, AppointmentError>;

    /// `Duplicate` when `pending.patient_id` already holds an open booking
    /// with `pending.doctor_id` inside the window.
    async fn claim_slot(
        &self,
        claim: SlotClaim,
        pending: PendingAppointment,
    ) -> Result<ClaimOutcome, AppointmentError>;

    /// Compare-and-set on the consultation status. `None` when the record is
    /// missing or no longer in `from`.
    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: ConsultationStatus,
        to: ConsultationStatus,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn set_approval_status(
        &self,
        appointment_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    /// Cancellation: removes the appointment if it belongs to `patient_id`.
    async fn delete_for_patient(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError>;
}

/// Process-local store. A single write lock makes `claim_slot` atomic.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record as-is, bypassing allocation. Used for seeding.
    pub async fn insert_raw(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

fn is_open_booking_of(appointment: &Appointment, patient_id: Uuid, doctor_id: Uuid, window: &DayWindow) -> bool {
    appointment.patient_id == Some(patient_id)
        && appointment.doctor_id == doctor_id
        && window.contains(&appointment.preferred_date)
        && appointment.status.is_open()
}

fn sorted_by_number(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| (a.preferred_date, a.appointment_number));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn list_in_window(
        &self,
        clinic_id: Uuid,
        window: DayWindow,
        status: Option<ConsultationStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let matching = appointments
            .values()
            .filter(|a| a.clinic_id == clinic_id && window.contains(&a.preferred_date))
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        Ok(sorted_by_number(matching))
    }

    async fn count_open_in_window(&self, clinic_id: Uuid, window: DayWindow) -> Result<u32, AppointmentError> {
        let appointments = self.appointments.read().await;
        let count = appointments
            .values()
            .filter(|a| a.clinic_id == clinic_id && window.contains(&a.preferred_date) && a.status.is_open())
            .count();
        Ok(count as u32)
    }

    async fn has_open_booking(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        window: DayWindow,
    ) -> Result<bool, AppointmentError> {
        let appointments = self.appointments.read().await;
        Ok(appointments
            .values()
            .any(|a| is_open_booking_of(a, patient_id, doctor_id, &window)))
    }

    async fn claim_slot(
        &self,
        claim: SlotClaim,
        pending: PendingAppointment,
    ) -> Result<ClaimOutcome, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        if let Some(patient_id) = pending.patient_id {
            if appointments
                .values()
                .any(|a| is_open_booking_of(a, patient_id, pending.doctor_id, &claim.window))
            {
                return Ok(ClaimOutcome::Duplicate);
            }
        }

        let day: Vec<&Appointment> = appointments
            .values()
            .filter(|a| a.clinic_id == claim.clinic_id && claim.window.contains(&a.preferred_date))
            .collect();

        let open = day.iter().filter(|a| a.status.is_open()).count() as u32;
        if open >= claim.capacity {
            return Ok(ClaimOutcome::Full { open });
        }

        let highest_issued = day.iter().map(|a| a.appointment_number).max().unwrap_or(0);
        let appointment = pending.into_appointment(highest_issued + 1, Utc::now());

        debug!(
            "Slot {} claimed for clinic {} ({} open before)",
            appointment.appointment_number, claim.clinic_id, open
        );
        appointments.insert(appointment.id, appointment.clone());

        Ok(ClaimOutcome::Granted { appointment, open_before: open })
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: ConsultationStatus,
        to: ConsultationStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment_id) {
            Some(appointment) if appointment.status == from => {
                appointment.status = to;
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_approval_status(
        &self,
        appointment_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        Ok(appointments.get_mut(&appointment_id).map(|appointment| {
            appointment.approval_status = status;
            appointment.updated_at = Utc::now();
            appointment.clone()
        }))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let matching = appointments
            .values()
            .filter(|a| a.patient_id == Some(patient_id))
            .cloned()
            .collect();
        Ok(sorted_by_number(matching))
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let matching = appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        Ok(sorted_by_number(matching))
    }

    async fn delete_for_patient(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let owned = appointments
            .get(&appointment_id)
            .map(|a| a.patient_id == Some(patient_id))
            .unwrap_or(false);

        if owned {
            Ok(appointments.remove(&appointment_id))
        } else {
            Ok(None)
        }
    }
}
