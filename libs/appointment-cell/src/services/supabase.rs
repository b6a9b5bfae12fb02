// libs/appointment-cell/src/services/supabase.rs
//
// PostgREST-backed implementations of the store and directory traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, ApprovalStatus, ClaimOutcome, Clinic, ConsultationStatus, DayWindow,
    PatientProfile, PendingAppointment, SlotClaim,
};
use crate::services::directory::{ClinicCapacityDirectory, PatientDirectory};
use crate::services::store::AppointmentStore;

const CLAIM_FUNCTION: &str = "claim_appointment_slot";
const ADD_DOCTOR_FUNCTION: &str = "add_known_doctor";
const WATERMARK_ATTEMPTS: usize = 3;
const ORDER_BY_NUMBER: &str = "order=preferred_date.asc,appointment_number.asc";

/// Supabase backend for appointments, clinics and patients.
///
/// Slot claims go through the `claim_appointment_slot` database function,
/// which serialises claims per (clinic, day) with an advisory lock.
pub struct SupabaseBackend {
    supabase: Arc<SupabaseClient>,
}

#[derive(Debug, Deserialize)]
struct ClaimRow {
    granted: bool,
    #[serde(default)]
    duplicate: bool,
    #[serde(default)]
    open_before: u32,
    #[serde(default)]
    open: u32,
    appointment: Option<Value>,
}

fn store_error(e: anyhow::Error) -> AppointmentError {
    AppointmentError::StoreUnavailable(e.to_string())
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Vec<T>, AppointmentError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| AppointmentError::Internal(format!("Failed to parse {}: {}", what, e)))
        })
        .collect()
}

fn first_row<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Option<T>, AppointmentError> {
    Ok(decode_rows(rows, what)?.into_iter().next())
}

fn window_filter(window: &DayWindow) -> String {
    let start = window.start.to_rfc3339();
    let end = window.end.to_rfc3339();
    format!(
        "preferred_date=gte.{}&preferred_date=lte.{}",
        urlencoding::encode(&start),
        urlencoding::encode(&end)
    )
}

fn status_filter(status: ConsultationStatus) -> String {
    format!("status=eq.{}", urlencoding::encode(status.as_str()))
}

fn open_filter() -> String {
    format!("status=neq.{}", ConsultationStatus::Completed.as_str())
}

impl SupabaseBackend {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, path: &str) -> Result<Vec<Value>, AppointmentError> {
        self.supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(store_error)
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Vec<Value>, AppointmentError> {
        self.supabase
            .request_with_headers(
                Method::PATCH,
                path,
                None,
                Some(body),
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(store_error)
    }

    async fn list_appointments(&self, filters: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}&select=*&{}", filters, ORDER_BY_NUMBER);
        let rows = self.select(&path).await?;
        decode_rows(rows, "appointment")
    }

    fn claim_args(claim: &SlotClaim, pending: &PendingAppointment) -> Value {
        json!({
            "p_clinic_id": claim.clinic_id,
            "p_window_start": claim.window.start.to_rfc3339(),
            "p_window_end": claim.window.end.to_rfc3339(),
            "p_capacity": claim.capacity,
            "p_token_prefix": pending.token_prefix,
            "p_appointment": {
                "id": pending.id,
                "patient_id": pending.patient_id,
                "doctor_id": pending.doctor_id,
                "clinic_id": pending.clinic_id,
                "patient_name": pending.patient.patient_name,
                "patient_age": pending.patient.patient_age,
                "patient_gender": pending.patient.patient_gender,
                "patient_blood_group": pending.patient.patient_blood_group,
                "patient_phone": pending.patient.patient_phone,
                "patient_address": pending.patient.patient_address,
                "is_for_self": pending.is_for_self,
                "preferred_date": pending.preferred_date.to_rfc3339(),
                "time": pending.time,
                "reason": pending.reason,
                "remarks": pending.remarks,
                "region": pending.region,
            }
        })
    }
}

#[async_trait]
impl AppointmentStore for SupabaseBackend {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&select=*", appointment_id);
        let rows = self.select(&path).await?;
        first_row(rows, "appointment")
    }

    async fn list_in_window(
        &self,
        clinic_id: Uuid,
        window: DayWindow,
        status: Option<ConsultationStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut filters = format!("clinic_id=eq.{}&{}", clinic_id, window_filter(&window));
        if let Some(status) = status {
            filters.push('&');
            filters.push_str(&status_filter(status));
        }
        self.list_appointments(&filters).await
    }

    async fn count_open_in_window(&self, clinic_id: Uuid, window: DayWindow) -> Result<u32, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?clinic_id=eq.{}&{}&{}&select=id",
            clinic_id,
            window_filter(&window),
            open_filter()
        );
        let total = self.supabase.count(&path, None).await.map_err(store_error)?;
        u32::try_from(total)
            .map_err(|_| AppointmentError::Internal(format!("open appointment count {} out of range", total)))
    }

    async fn has_open_booking(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        window: DayWindow,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&doctor_id=eq.{}&{}&{}&select=id&limit=1",
            patient_id,
            doctor_id,
            window_filter(&window),
            open_filter()
        );
        let rows = self.select(&path).await?;
        Ok(!rows.is_empty())
    }

    async fn claim_slot(
        &self,
        claim: SlotClaim,
        pending: PendingAppointment,
    ) -> Result<ClaimOutcome, AppointmentError> {
        let args = Self::claim_args(&claim, &pending);
        let row: ClaimRow = self
            .supabase
            .rpc(CLAIM_FUNCTION, args, None)
            .await
            .map_err(store_error)?;

        if row.duplicate {
            debug!("Claim refused for clinic {}: patient already booked this doctor", claim.clinic_id);
            return Ok(ClaimOutcome::Duplicate);
        }
        if !row.granted {
            debug!("Claim refused for clinic {} ({} open)", claim.clinic_id, row.open);
            return Ok(ClaimOutcome::Full { open: row.open });
        }

        let value = row
            .appointment
            .ok_or_else(|| AppointmentError::Internal("granted claim returned no appointment".to_string()))?;
        let appointment: Appointment = serde_json::from_value(value)
            .map_err(|e| AppointmentError::Internal(format!("Failed to parse claimed appointment: {}", e)))?;

        Ok(ClaimOutcome::Granted { appointment, open_before: row.open_before })
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: ConsultationStatus,
        to: ConsultationStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&{}", appointment_id, status_filter(from));
        let body = json!({
            "status": to,
            "updated_at": Utc::now().to_rfc3339(),
        });
        let rows = self.patch(&path, body).await?;
        first_row(rows, "appointment")
    }

    async fn set_approval_status(
        &self,
        appointment_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let body = json!({
            "approval_status": status,
            "updated_at": Utc::now().to_rfc3339(),
        });
        let rows = self.patch(&path, body).await?;
        first_row(rows, "appointment")
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_appointments(&format!("patient_id=eq.{}", patient_id)).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.list_appointments(&format!("doctor_id=eq.{}", doctor_id)).await
    }

    async fn delete_for_patient(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&patient_id=eq.{}",
            appointment_id, patient_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                None,
                None,
                Some(SupabaseClient::representation_headers()),
            )
            .await
            .map_err(store_error)?;
        first_row(rows, "appointment")
    }
}

#[async_trait]
impl ClinicCapacityDirectory for SupabaseBackend {
    async fn get_clinic(&self, clinic_id: Uuid) -> Result<Option<Clinic>, AppointmentError> {
        let rows = self
            .select(&format!("/rest/v1/clinics?id=eq.{}&select=*", clinic_id))
            .await?;
        first_row(rows, "clinic")
    }

    async fn find_clinic_by_doctor(&self, doctor_id: Uuid) -> Result<Option<Clinic>, AppointmentError> {
        let contains = format!("{{{}}}", doctor_id);
        let path = format!(
            "/rest/v1/clinics?doctor_ids=cs.{}&select=*&limit=1",
            urlencoding::encode(&contains)
        );
        let rows = self.select(&path).await?;
        first_row(rows, "clinic")
    }

    async fn find_clinic_for_staff(&self, user_id: Uuid) -> Result<Option<Clinic>, AppointmentError> {
        let rows = self
            .select(&format!("/rest/v1/clinics?user_id=eq.{}&select=*&limit=1", user_id))
            .await?;
        if let Some(clinic) = first_row(rows, "clinic")? {
            return Ok(Some(clinic));
        }
        self.find_clinic_by_doctor(user_id).await
    }

    /// Compare-and-set on the stored date, retried when another writer moved it first.
    async fn advance_latest_available_date(&self, clinic_id: Uuid) -> Result<Clinic, AppointmentError> {
        for attempt in 1..=WATERMARK_ATTEMPTS {
            let clinic = self
                .get_clinic(clinic_id)
                .await?
                .ok_or_else(|| AppointmentError::ClinicNotFound(clinic_id.to_string()))?;

            let current: NaiveDate = clinic.latest_available_date;
            let next = current
                .succ_opt()
                .ok_or_else(|| AppointmentError::Internal("latest available date overflow".to_string()))?;

            let path = format!(
                "/rest/v1/clinics?id=eq.{}&latest_available_date=eq.{}",
                clinic_id, current
            );
            let rows = self
                .patch(&path, json!({ "latest_available_date": next }))
                .await?;

            if let Some(updated) = first_row::<Clinic>(rows, "clinic")? {
                info!("Clinic {} latest available date advanced to {}", clinic_id, next);
                return Ok(updated);
            }
            warn!(
                "Latest available date of clinic {} changed concurrently (attempt {}/{})",
                clinic_id, attempt, WATERMARK_ATTEMPTS
            );
        }

        Err(AppointmentError::StoreUnavailable(format!(
            "could not advance latest available date for clinic {}",
            clinic_id
        )))
    }
}

#[async_trait]
impl PatientDirectory for SupabaseBackend {
    async fn find_patient_by_user(&self, user_id: Uuid) -> Result<Option<PatientProfile>, AppointmentError> {
        let rows = self
            .select(&format!("/rest/v1/patients?user_id=eq.{}&select=*", user_id))
            .await?;
        first_row(rows, "patient")
    }

    /// Set-add done by the database in a single `UPDATE`.
    async fn add_known_doctor(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<(), AppointmentError> {
        let args = json!({ "p_patient_id": patient_id, "p_doctor_id": doctor_id });
        let added: bool = self
            .supabase
            .rpc(ADD_DOCTOR_FUNCTION, args, None)
            .await
            .map_err(store_error)?;

        if added {
            debug!("Doctor {} added to patient {}", doctor_id, patient_id);
        }
        Ok(())
    }
}
