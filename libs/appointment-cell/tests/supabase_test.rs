use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, Offset};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::*;
use appointment_cell::services::calendar::day_window;
use appointment_cell::services::{AppointmentStore, ClinicCapacityDirectory, PatientDirectory, SupabaseBackend};
use appointment_cell::AppointmentError;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn backend(server: &MockServer) -> SupabaseBackend {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseBackend::new(Arc::new(SupabaseClient::new(&config)))
}

fn pending(clinic_id: Uuid) -> PendingAppointment {
    PendingAppointment {
        id: Uuid::new_v4(),
        patient_id: None,
        doctor_id: Uuid::new_v4(),
        clinic_id,
        patient: PatientSnapshot {
            patient_name: "Test Patient".to_string(),
            patient_age: 40,
            patient_gender: Gender::Male,
            patient_blood_group: None,
            patient_phone: "0987654321".to_string(),
            patient_address: None,
        },
        is_for_self: false,
        preferred_date: day_window(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), chrono::Utc.fix()).start,
        token_prefix: "ABC-20-10-2026-".to_string(),
        time: "10:00".to_string(),
        reason: "Checkup".to_string(),
        remarks: None,
        region: "North".to_string(),
    }
}

fn claim(clinic_id: Uuid, capacity: u32) -> SlotClaim {
    SlotClaim {
        clinic_id,
        window: day_window(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), chrono::Utc.fix()),
        capacity,
    }
}

#[tokio::test]
async fn test_get_clinic_parses_row() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(&clinic_id.to_string(), "ABC", 2, "2026-10-20")
        ])))
        .mount(&server)
        .await;

    let clinic = backend(&server).get_clinic(clinic_id).await.unwrap().unwrap();
    assert_eq!(clinic.id, clinic_id);
    assert_eq!(clinic.code, "ABC");
    assert_eq!(clinic.capacity, 2);
    assert_eq!(clinic.latest_available_date, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
}

#[tokio::test]
async fn test_claim_slot_granted() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let pending = pending(clinic_id);
    let row = MockSupabaseResponses::appointment_row(
        &pending.id.to_string(),
        &clinic_id.to_string(),
        &pending.doctor_id.to_string(),
        2,
        "ABC-20-10-2026-2",
        "Not Arrived",
    );

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/claim_appointment_slot"))
        .and(body_partial_json(json!({
            "p_clinic_id": clinic_id,
            "p_capacity": 2,
            "p_token_prefix": "ABC-20-10-2026-"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "granted": true,
            "open_before": 1,
            "open": 2,
            "appointment": row
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend(&server).claim_slot(claim(clinic_id, 2), pending).await.unwrap();

    assert_matches!(
        outcome,
        ClaimOutcome::Granted { appointment, open_before: 1 }
            if appointment.appointment_number == 2 && appointment.status == ConsultationStatus::NotArrived
    );
}

#[tokio::test]
async fn test_claim_slot_full() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/claim_appointment_slot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "granted": false,
            "open": 2,
            "appointment": null
        })))
        .mount(&server)
        .await;

    let outcome = backend(&server)
        .claim_slot(claim(clinic_id, 2), pending(clinic_id))
        .await
        .unwrap();
    assert_matches!(outcome, ClaimOutcome::Full { open: 2 });
}

#[tokio::test]
async fn test_claim_slot_duplicate() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let pending = PendingAppointment {
        patient_id: Some(patient_id),
        is_for_self: true,
        ..pending(clinic_id)
    };

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/claim_appointment_slot"))
        .and(body_partial_json(json!({
            "p_appointment": { "patient_id": patient_id, "doctor_id": pending.doctor_id }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "granted": false,
            "duplicate": true,
            "open": 0,
            "appointment": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend(&server).claim_slot(claim(clinic_id, 2), pending).await.unwrap();
    assert_matches!(outcome, ClaimOutcome::Duplicate);
}

#[tokio::test]
async fn test_transition_status_filters_on_current_status() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "eq.Not Arrived"))
        .and(body_partial_json(json!({ "status": "Queued" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &clinic_id.to_string(),
                &Uuid::new_v4().to_string(),
                1,
                "ABC-20-10-2026-1",
                "Queued",
            )
        ])))
        .mount(&server)
        .await;

    let updated = backend(&server)
        .transition_status(appointment_id, ConsultationStatus::NotArrived, ConsultationStatus::Queued)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, ConsultationStatus::Queued);
}

#[tokio::test]
async fn test_transition_status_lost_race_returns_none() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = backend(&server)
        .transition_status(Uuid::new_v4(), ConsultationStatus::Queued, ConsultationStatus::Ongoing)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_advance_watermark_compare_and_set() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(&clinic_id.to_string(), "ABC", 2, "2026-10-20")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("latest_available_date", "eq.2026-10-20"))
        .and(body_partial_json(json!({ "latest_available_date": "2026-10-21" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(&clinic_id.to_string(), "ABC", 2, "2026-10-21")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let clinic = backend(&server).advance_latest_available_date(clinic_id).await.unwrap();
    assert_eq!(clinic.latest_available_date, NaiveDate::from_ymd_opt(2026, 10, 21).unwrap());
}

#[tokio::test]
async fn test_advance_watermark_gives_up_under_contention() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(&clinic_id.to_string(), "ABC", 2, "2026-10-20")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(3)
        .mount(&server)
        .await;

    assert_matches!(
        backend(&server).advance_latest_available_date(clinic_id).await,
        Err(AppointmentError::StoreUnavailable(_))
    );
}

#[tokio::test]
async fn test_find_clinic_by_doctor_uses_array_contains() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("doctor_ids", format!("cs.{{{}}}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_row(&clinic_id.to_string(), "DOC", 5, "2026-10-20")
        ])))
        .mount(&server)
        .await;

    let clinic = backend(&server).find_clinic_by_doctor(doctor_id).await.unwrap();
    assert_eq!(clinic.map(|c| c.id), Some(clinic_id));
}

#[tokio::test]
async fn test_count_open_reads_exact_total() {
    let server = MockServer::start().await;
    let clinic_id = Uuid::new_v4();

    // The total comes from Content-Range, not from the (capped) rows.
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("clinic_id", format!("eq.{}", clinic_id)))
        .and(query_param("status", "neq.Completed"))
        .and(header("Prefer", "count=exact"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", "0-999/1500"))
        .expect(1)
        .mount(&server)
        .await;

    let window = day_window(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), chrono::Utc.fix());
    let open = backend(&server).count_open_in_window(clinic_id, window).await.unwrap();
    assert_eq!(open, 1500);
}

#[tokio::test]
async fn test_count_open_empty_range() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", "*/0"))
        .mount(&server)
        .await;

    let window = day_window(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), chrono::Utc.fix());
    let open = backend(&server).count_open_in_window(Uuid::new_v4(), window).await.unwrap();
    assert_eq!(open, 0);
}

#[tokio::test]
async fn test_count_open_without_content_range_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let window = day_window(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), chrono::Utc.fix());
    assert_matches!(
        backend(&server).count_open_in_window(Uuid::new_v4(), window).await,
        Err(AppointmentError::StoreUnavailable(_))
    );
}

#[tokio::test]
async fn test_add_known_doctor_is_a_single_rpc() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/add_known_doctor"))
        .and(body_partial_json(json!({
            "p_patient_id": patient_id,
            "p_doctor_id": doctor_id
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    // No read-modify-write of the patient row.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    backend(&server).add_known_doctor(patient_id, doctor_id).await.unwrap();
}

#[tokio::test]
async fn test_add_known_doctor_already_known() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/add_known_doctor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
        .expect(1)
        .mount(&server)
        .await;

    assert!(backend(&server)
        .add_known_doctor(Uuid::new_v4(), Uuid::new_v4())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_find_patient_by_user() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id.to_string(), &user_id.to_string(), "Asha")
        ])))
        .mount(&server)
        .await;

    let patient = backend(&server).find_patient_by_user(user_id).await.unwrap().unwrap();
    assert_eq!(patient.id, patient_id);
    assert_eq!(patient.blood_group, Some(BloodGroup::OPositive));
    assert_eq!(patient.snapshot().patient_name, "Asha");
}

#[tokio::test]
async fn test_server_error_maps_to_store_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("boom", "XX000"),
        ))
        .mount(&server)
        .await;

    assert_matches!(
        backend(&server).get(Uuid::new_v4()).await,
        Err(AppointmentError::StoreUnavailable(_))
    );
}

#[tokio::test]
async fn test_undecodable_row_maps_to_internal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "not-a-uuid" }])))
        .mount(&server)
        .await;

    assert_matches!(
        backend(&server).get(Uuid::new_v4()).await,
        Err(AppointmentError::Internal(_))
    );
}
