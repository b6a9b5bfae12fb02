#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use appointment_cell::models::*;
use appointment_cell::services::{
    AppointmentServices, InMemoryAppointmentStore, InMemoryClinicDirectory, InMemoryPatientDirectory,
};

pub struct Harness {
    pub store: Arc<InMemoryAppointmentStore>,
    pub clinics: Arc<InMemoryClinicDirectory>,
    pub patients: Arc<InMemoryPatientDirectory>,
    pub services: Arc<AppointmentServices>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SchedulingSettings::default())
    }

    pub fn with_settings(settings: SchedulingSettings) -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let clinics = Arc::new(InMemoryClinicDirectory::new());
        let patients = Arc::new(InMemoryPatientDirectory::new());
        let services = Arc::new(AppointmentServices::in_memory(
            store.clone(),
            clinics.clone(),
            patients.clone(),
            settings,
        ));
        Self { store, clinics, patients, services }
    }

    pub async fn add_clinic(&self, code: &str, capacity: u32, latest: NaiveDate) -> Clinic {
        let clinic = clinic(code, capacity, latest);
        self.clinics.upsert(clinic.clone()).await;
        clinic
    }

    /// Registers a patient profile and returns it with its account id.
    pub async fn add_patient(&self, name: &str) -> PatientProfile {
        let patient = patient(Uuid::new_v4(), name);
        self.patients.upsert(patient.clone()).await;
        patient
    }

    pub async fn book(
        &self,
        clinic: &Clinic,
        patient: &PatientProfile,
        date: NaiveDate,
    ) -> Result<Appointment, appointment_cell::AppointmentError> {
        let doctor_id = clinic.doctor_ids.first().copied().unwrap_or_else(Uuid::new_v4);
        self.services
            .allocator
            .allocate(Some(clinic.id), date, self_draft(patient.user_id, doctor_id))
            .await
    }

    pub async fn latest_available_date(&self, clinic_id: Uuid) -> NaiveDate {
        use appointment_cell::services::ClinicCapacityDirectory;
        self.clinics
            .get_clinic(clinic_id)
            .await
            .unwrap()
            .expect("clinic exists")
            .latest_available_date
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn clinic(code: &str, capacity: u32, latest: NaiveDate) -> Clinic {
    Clinic {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        name: format!("{} Clinic", code),
        code: code.to_string(),
        doctor_ids: vec![Uuid::new_v4()],
        capacity,
        latest_available_date: latest,
        is_open: true,
        opens_at: "09:00".to_string(),
        closes_at: "17:00".to_string(),
        location: "Main Street".to_string(),
        contact: None,
    }
}

pub fn patient(user_id: Uuid, name: &str) -> PatientProfile {
    PatientProfile {
        id: Uuid::new_v4(),
        user_id,
        name: name.to_string(),
        age: 34,
        gender: Gender::Female,
        blood_group: Some(BloodGroup::OPositive),
        phone: "0123456789".to_string(),
        address: Some("1 Test Lane".to_string()),
        doctor_ids: Vec::new(),
    }
}

pub fn snapshot(name: &str) -> PatientSnapshot {
    PatientSnapshot {
        patient_name: name.to_string(),
        patient_age: 61,
        patient_gender: Gender::Male,
        patient_blood_group: None,
        patient_phone: "0987654321".to_string(),
        patient_address: None,
    }
}

pub fn self_draft(booked_by: Uuid, doctor_id: Uuid) -> BookingDraft {
    BookingDraft {
        booked_by,
        is_for_self: true,
        doctor_id,
        patient: None,
        time: "10:00".to_string(),
        reason: "Checkup".to_string(),
        remarks: None,
        region: "North".to_string(),
    }
}

pub fn proxy_draft(booked_by: Uuid, doctor_id: Uuid, patient: Option<PatientSnapshot>) -> BookingDraft {
    BookingDraft {
        is_for_self: false,
        patient,
        ..self_draft(booked_by, doctor_id)
    }
}
