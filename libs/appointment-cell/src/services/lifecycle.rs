// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{Appointment, ApprovalStatus, ConsultationStatus};
use crate::services::store::AppointmentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Status, approval and cancellation writes on existing appointments.
pub struct ConsultationLifecycleService {
    store: Arc<dyn AppointmentStore>,
}

impl ConsultationLifecycleService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Next status in the chain. Fails with `NoNextState` on `Completed`.
    pub async fn advance(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.step(appointment_id, Direction::Forward).await
    }

    /// Previous status in the chain. Fails with `NoPreviousState` on `Not Arrived`.
    pub async fn revert(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.step(appointment_id, Direction::Reverse).await
    }

    async fn step(&self, appointment_id: Uuid, direction: Direction) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        let from = current.status;

        let to = match direction {
            Direction::Forward => from.next().ok_or(AppointmentError::NoNextState(from))?,
            Direction::Reverse => from.previous().ok_or(AppointmentError::NoPreviousState(from))?,
        };
        debug!("Appointment {} {:?}: {} -> {}", appointment_id, direction, from, to);

        match self.store.transition_status(appointment_id, from, to).await? {
            Some(updated) => {
                info!("Appointment {} status updated to {}", appointment_id, to);
                Ok(updated)
            }
            None => {
                // Lost a race: either deleted or moved by someone else.
                if self.store.get(appointment_id).await?.is_none() {
                    return Err(AppointmentError::AppointmentNotFound(appointment_id));
                }
                warn!("Appointment {} left status {} before {:?} could apply", appointment_id, from, direction);
                Err(AppointmentError::StatusConflict(appointment_id))
            }
        }
    }

    pub async fn approve(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.set_approval(appointment_id, ApprovalStatus::Approved).await
    }

    pub async fn reject(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.set_approval(appointment_id, ApprovalStatus::Rejected).await
    }

    async fn set_approval(
        &self,
        appointment_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<Appointment, AppointmentError> {
        let updated = self
            .store
            .set_approval_status(appointment_id, status)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound(appointment_id))?;

        info!("Appointment {} approval set to {}", appointment_id, status);
        Ok(updated)
    }

    /// Removes a patient's own appointment.
    pub async fn cancel(&self, appointment_id: Uuid, patient_id: Uuid) -> Result<Appointment, AppointmentError> {
        let removed = self
            .store
            .delete_for_patient(appointment_id, patient_id)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound(appointment_id))?;

        info!("Appointment {} cancelled by patient {}", appointment_id, patient_id);
        Ok(removed)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound(appointment_id))
    }
}
