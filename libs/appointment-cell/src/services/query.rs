// libs/appointment-cell/src/services/query.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::AppointmentError;
use crate::models::{Appointment, AvailableDate, ConsultationStatus, SchedulingSettings, StatusBuckets};
use crate::services::calendar::{day_window, is_weekend, local_today};
use crate::services::directory::ClinicCapacityDirectory;
use crate::services::store::AppointmentStore;

/// Read-side views over appointments. Nothing here writes.
pub struct AppointmentQueryService {
    store: Arc<dyn AppointmentStore>,
    clinics: Arc<dyn ClinicCapacityDirectory>,
    settings: SchedulingSettings,
}

impl AppointmentQueryService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        clinics: Arc<dyn ClinicCapacityDirectory>,
        settings: SchedulingSettings,
    ) -> Self {
        Self { store, clinics, settings }
    }

    /// Appointments of `clinic_id` on `date`, one bucket per status, each
    /// ordered by appointment number.
    #[instrument(skip(self))]
    pub async fn bucket_by_status(&self, clinic_id: Uuid, date: NaiveDate) -> Result<StatusBuckets, AppointmentError> {
        let window = day_window(date, self.settings.utc_offset);
        let store = &self.store;

        let (not_arrived, queued, ongoing, completed) = futures::join!(
            store.list_in_window(clinic_id, window, Some(ConsultationStatus::NotArrived)),
            store.list_in_window(clinic_id, window, Some(ConsultationStatus::Queued)),
            store.list_in_window(clinic_id, window, Some(ConsultationStatus::Ongoing)),
            store.list_in_window(clinic_id, window, Some(ConsultationStatus::Completed)),
        );

        let buckets = StatusBuckets {
            not_arrived: not_arrived?,
            queued: queued?,
            ongoing: ongoing?,
            completed: completed?,
        };
        debug!("Clinic {} has {} appointments on {}", clinic_id, buckets.total(), date);
        Ok(buckets)
    }

    pub async fn today_buckets(&self, clinic_id: Uuid) -> Result<StatusBuckets, AppointmentError> {
        self.bucket_by_status(clinic_id, local_today(self.settings.utc_offset)).await
    }

    /// Upcoming weekdays with free capacity, starting today.
    pub async fn available_dates(&self, clinic_id: Uuid) -> Result<Vec<AvailableDate>, AppointmentError> {
        self.available_dates_from(
            clinic_id,
            local_today(self.settings.utc_offset),
            self.settings.available_dates_scan_days,
            self.settings.available_dates_max_results,
        )
        .await
    }

    /// Scans `scan_days` days from `today` inclusive, skipping Saturdays and
    /// Sundays, and returns at most `max_results` days with `slots_left > 0`.
    #[instrument(skip(self))]
    pub async fn available_dates_from(
        &self,
        clinic_id: Uuid,
        today: NaiveDate,
        scan_days: u32,
        max_results: usize,
    ) -> Result<Vec<AvailableDate>, AppointmentError> {
        let clinic = self
            .clinics
            .get_clinic(clinic_id)
            .await?
            .ok_or_else(|| AppointmentError::ClinicNotFound(clinic_id.to_string()))?;

        let mut available = Vec::new();
        for date in today.iter_days().take(scan_days as usize) {
            if available.len() >= max_results {
                break;
            }
            if is_weekend(date) {
                continue;
            }

            let window = day_window(date, self.settings.utc_offset);
            let open = self.store.count_open_in_window(clinic_id, window).await?;
            let slots_left = clinic.capacity.saturating_sub(open);
            if slots_left > 0 {
                available.push(AvailableDate { date, slots_left });
            }
        }

        debug!("Clinic {} has {} available dates from {}", clinic_id, available.len(), today);
        Ok(available)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::AppointmentNotFound(appointment_id))
    }

    pub async fn appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_for_patient(patient_id).await
    }

    pub async fn appointments_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_for_doctor(doctor_id).await
    }
}
