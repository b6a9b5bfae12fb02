// libs/appointment-cell/src/services/directory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{Clinic, PatientProfile};

/// Per-clinic capacity and the "latest available date" watermark.
#[async_trait]
pub trait ClinicCapacityDirectory: Send + Sync {
    async fn get_clinic(&self, clinic_id: Uuid) -> Result<Option<Clinic>, AppointmentError>;

    async fn find_clinic_by_doctor(&self, doctor_id: Uuid) -> Result<Option<Clinic>, AppointmentError>;

    /// Clinic administered by `user_id`, or else the clinic listing that user as a doctor.
    async fn find_clinic_for_staff(&self, user_id: Uuid) -> Result<Option<Clinic>, AppointmentError>;

    /// Moves the watermark one day past its current stored value.
    async fn advance_latest_available_date(&self, clinic_id: Uuid) -> Result<Clinic, AppointmentError>;
}

/// Identity-side view of patients needed by the allocator.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patient_by_user(&self, user_id: Uuid) -> Result<Option<PatientProfile>, AppointmentError>;

    /// Idempotent.
    async fn add_known_doctor(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<(), AppointmentError>;
}

#[derive(Default)]
pub struct InMemoryClinicDirectory {
    clinics: RwLock<HashMap<Uuid, Clinic>>,
}

impl InMemoryClinicDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, clinic: Clinic) {
        self.clinics.write().await.insert(clinic.id, clinic);
    }
}

#[async_trait]
impl ClinicCapacityDirectory for InMemoryClinicDirectory {
    async fn get_clinic(&self, clinic_id: Uuid) -> Result<Option<Clinic>, AppointmentError> {
        Ok(self.clinics.read().await.get(&clinic_id).cloned())
    }

    async fn find_clinic_by_doctor(&self, doctor_id: Uuid) -> Result<Option<Clinic>, AppointmentError> {
        let clinics = self.clinics.read().await;
        Ok(clinics
            .values()
            .find(|clinic| clinic.doctor_ids.contains(&doctor_id))
            .cloned())
    }

    async fn find_clinic_for_staff(&self, user_id: Uuid) -> Result<Option<Clinic>, AppointmentError> {
        let clinics = self.clinics.read().await;
        let owned = clinics.values().find(|clinic| clinic.user_id == user_id);
        Ok(owned
            .or_else(|| clinics.values().find(|clinic| clinic.doctor_ids.contains(&user_id)))
            .cloned())
    }

    async fn advance_latest_available_date(&self, clinic_id: Uuid) -> Result<Clinic, AppointmentError> {
        let mut clinics = self.clinics.write().await;
        let clinic = clinics
            .get_mut(&clinic_id)
            .ok_or_else(|| AppointmentError::ClinicNotFound(clinic_id.to_string()))?;

        clinic.latest_available_date = clinic
            .latest_available_date
            .succ_opt()
            .ok_or_else(|| AppointmentError::Internal("latest available date overflow".to_string()))?;
        info!("Clinic {} latest available date advanced to {}", clinic_id, clinic.latest_available_date);
        Ok(clinic.clone())
    }
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<Uuid, PatientProfile>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, patient: PatientProfile) {
        self.patients.write().await.insert(patient.id, patient);
    }

    pub async fn get(&self, patient_id: Uuid) -> Option<PatientProfile> {
        self.patients.read().await.get(&patient_id).cloned()
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_patient_by_user(&self, user_id: Uuid) -> Result<Option<PatientProfile>, AppointmentError> {
        let patients = self.patients.read().await;
        Ok(patients.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn add_known_doctor(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<(), AppointmentError> {
        let mut patients = self.patients.write().await;
        if let Some(patient) = patients.get_mut(&patient_id) {
            if !patient.doctor_ids.contains(&doctor_id) {
                patient.doctor_ids.push(doctor_id);
                debug!("Doctor {} added to patient {}", doctor_id, patient_id);
            }
        }
        Ok(())
    }
}
