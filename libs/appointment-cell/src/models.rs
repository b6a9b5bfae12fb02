// libs/appointment-cell/src/models.rs
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_config::AppConfig;

// ==============================================================================
// CLINIC & PATIENT RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub id: Uuid,
    /// Account that administers the clinic.
    pub user_id: Uuid,
    pub name: String,
    /// Short unique code used as the ticket prefix.
    pub code: String,
    #[serde(default)]
    pub doctor_ids: Vec<Uuid>,
    /// Maximum open appointments per calendar day.
    pub capacity: u32,
    /// Earliest date still believed to have open slots. Only moves forward.
    pub latest_available_date: NaiveDate,
    pub is_open: bool,
    pub opens_at: String,
    pub closes_at: String,
    pub location: String,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub phone: String,
    pub address: Option<String>,
    #[serde(default)]
    pub doctor_ids: Vec<Uuid>,
}

impl PatientProfile {
    pub fn snapshot(&self) -> PatientSnapshot {
        PatientSnapshot {
            patient_name: self.name.clone(),
            patient_age: self.age,
            patient_gender: self.gender.clone(),
            patient_blood_group: self.blood_group.clone(),
            patient_phone: self.phone.clone(),
            patient_address: self.address.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

/// Patient details copied onto the appointment at booking time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSnapshot {
    pub patient_name: String,
    pub patient_age: u32,
    pub patient_gender: Gender,
    pub patient_blood_group: Option<BloodGroup>,
    pub patient_phone: String,
    pub patient_address: Option<String>,
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    /// Patient profile of the account that booked.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    #[serde(flatten)]
    pub patient: PatientSnapshot,
    pub is_for_self: bool,
    /// Clinic-local midnight of the booked day.
    pub preferred_date: DateTime<Utc>,
    pub appointment_number: u32,
    pub appointment_token: String,
    pub status: ConsultationStatus,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    pub time: String,
    pub reason: String,
    pub remarks: Option<String>,
    pub region: String,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Consultation lifecycle: `Not Arrived -> Queued -> Ongoing -> Completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConsultationStatus {
    #[serde(rename = "Not Arrived")]
    NotArrived,
    Queued,
    Ongoing,
    Completed,
}

impl ConsultationStatus {
    pub fn next(&self) -> Option<ConsultationStatus> {
        match self {
            ConsultationStatus::NotArrived => Some(ConsultationStatus::Queued),
            ConsultationStatus::Queued => Some(ConsultationStatus::Ongoing),
            ConsultationStatus::Ongoing => Some(ConsultationStatus::Completed),
            ConsultationStatus::Completed => None,
        }
    }

    pub fn previous(&self) -> Option<ConsultationStatus> {
        match self {
            ConsultationStatus::NotArrived => None,
            ConsultationStatus::Queued => Some(ConsultationStatus::NotArrived),
            ConsultationStatus::Ongoing => Some(ConsultationStatus::Queued),
            ConsultationStatus::Completed => Some(ConsultationStatus::Ongoing),
        }
    }

    /// Counts toward the day's occupancy.
    pub fn is_open(&self) -> bool {
        !matches!(self, ConsultationStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::NotArrived => "Not Arrived",
            ConsultationStatus::Queued => "Queued",
            ConsultationStatus::Ongoing => "Ongoing",
            ConsultationStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking approval, kept apart from the consultation lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "Pending"),
            ApprovalStatus::Approved => write!(f, "Approved"),
            ApprovalStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "Not Paid")]
    NotPaid,
    Paid,
}

// ==============================================================================
// BOOKING MODELS
// ==============================================================================

/// What the caller wants booked. Scheduling fields are assigned by the allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDraft {
    /// Account placing the booking.
    pub booked_by: Uuid,
    pub is_for_self: bool,
    pub doctor_id: Uuid,
    /// Required when `is_for_self` is false.
    pub patient: Option<PatientSnapshot>,
    pub time: String,
    pub reason: String,
    pub remarks: Option<String>,
    pub region: String,
}

/// A fully resolved appointment waiting for its number.
#[derive(Debug, Clone)]
pub struct PendingAppointment {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub patient: PatientSnapshot,
    pub is_for_self: bool,
    pub preferred_date: DateTime<Utc>,
    /// `{code}-{DD-MM-YYYY}-`; the number is appended on claim.
    pub token_prefix: String,
    pub time: String,
    pub reason: String,
    pub remarks: Option<String>,
    pub region: String,
}

impl PendingAppointment {
    pub fn into_appointment(self, appointment_number: u32, now: DateTime<Utc>) -> Appointment {
        Appointment {
            appointment_token: format!("{}{}", self.token_prefix, appointment_number),
            id: self.id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            clinic_id: self.clinic_id,
            patient: self.patient,
            is_for_self: self.is_for_self,
            preferred_date: self.preferred_date,
            appointment_number,
            status: ConsultationStatus::NotArrived,
            approval_status: ApprovalStatus::Pending,
            time: self.time,
            reason: self.reason,
            remarks: self.remarks,
            region: self.region,
            payment_status: PaymentStatus::NotPaid,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Inclusive `[00:00:00.000, 23:59:59.999]` clinic-local day, expressed in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant <= self.end
    }
}

/// Input to the store's atomic capacity primitive.
#[derive(Debug, Clone, Copy)]
pub struct SlotClaim {
    pub clinic_id: Uuid,
    pub window: DayWindow,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Granted {
        appointment: Appointment,
        /// Open appointments on the day before this insert.
        open_before: u32,
    },
    Full {
        open: u32,
    },
    /// The patient already holds an open booking with this doctor on the day.
    Duplicate,
}

// ==============================================================================
// QUERY MODELS
// ==============================================================================

/// Keyed by the status wire names, e.g. `"Not Arrived"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusBuckets {
    #[serde(rename = "Not Arrived")]
    pub not_arrived: Vec<Appointment>,
    #[serde(rename = "Queued")]
    pub queued: Vec<Appointment>,
    #[serde(rename = "Ongoing")]
    pub ongoing: Vec<Appointment>,
    #[serde(rename = "Completed")]
    pub completed: Vec<Appointment>,
}

impl StatusBuckets {
    pub fn bucket(&self, status: ConsultationStatus) -> &[Appointment] {
        match status {
            ConsultationStatus::NotArrived => &self.not_arrived,
            ConsultationStatus::Queued => &self.queued,
            ConsultationStatus::Ongoing => &self.ongoing,
            ConsultationStatus::Completed => &self.completed,
        }
    }

    pub fn total(&self) -> usize {
        self.not_arrived.len() + self.queued.len() + self.ongoing.len() + self.completed.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableDate {
    pub date: NaiveDate,
    pub slots_left: u32,
}

// ==============================================================================
// SCHEDULING SETTINGS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingSettings {
    /// Offset of the clinic-local calendar from UTC.
    pub utc_offset: FixedOffset,
    pub available_dates_scan_days: u32,
    pub available_dates_max_results: usize,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            available_dates_scan_days: 30,
            available_dates_max_results: 7,
        }
    }
}

/// `None` when the offset does not fit a `FixedOffset` (beyond +-24h).
fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

impl SchedulingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let utc_offset = offset_from_minutes(config.clinic_utc_offset_minutes).unwrap_or_else(|| {
            tracing::warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                config.clinic_utc_offset_minutes
            );
            Utc.fix()
        });

        Self {
            utc_offset,
            available_dates_scan_days: config.available_dates_scan_days,
            available_dates_max_results: config.available_dates_max_results,
        }
    }

    pub fn with_offset_minutes(minutes: i32) -> Self {
        Self {
            utc_offset: offset_from_minutes(minutes).unwrap_or_else(|| Self::default().utc_offset),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_minutes_in_range() {
        let settings = SchedulingSettings::with_offset_minutes(330);
        assert_eq!(settings.utc_offset.local_minus_utc(), 330 * 60);

        let settings = SchedulingSettings::with_offset_minutes(-300);
        assert_eq!(settings.utc_offset.local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        for minutes in [24 * 60, -24 * 60, 40_000_000, i32::MAX, i32::MIN] {
            let settings = SchedulingSettings::with_offset_minutes(minutes);
            assert_eq!(settings.utc_offset, Utc.fix(), "offset {minutes}");
        }
    }

    #[test]
    fn test_from_config_out_of_range_offset_uses_utc() {
        let mut config = shared_utils::test_utils::TestConfig::default().to_app_config();
        config.clinic_utc_offset_minutes = 40_000_000;

        let settings = SchedulingSettings::from_config(&config);
        assert_eq!(settings.utc_offset, Utc.fix());
        assert_eq!(settings.available_dates_scan_days, config.available_dates_scan_days);
    }
}
