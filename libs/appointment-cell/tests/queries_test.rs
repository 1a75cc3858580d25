use shared_database::Mutation;
use shared_models::appointment::AppointmentStatus;
use shared_utils::test_utils::{appointment_record, slot, ymd, TestClinic};

use appointment_cell::services::AppointmentQueryService;

/// Today is 2025-06-10, 08:00. Seeds a spread of appointments around "now".
async fn seeded_clinic() -> TestClinic {
    let clinic = TestClinic::new();
    let rows = vec![
        // Past and completed
        appointment_record(&clinic.doctor, &clinic.patient, TestClinic::yesterday(), "09:00 AM", AppointmentStatus::Completed),
        // Past, never closed
        appointment_record(&clinic.doctor, &clinic.patient, TestClinic::yesterday(), "10:00 AM", AppointmentStatus::Confirmed),
        // Past and cancelled
        appointment_record(&clinic.doctor, &clinic.patient, TestClinic::yesterday(), "11:00 AM", AppointmentStatus::Cancelled),
        // Upcoming, listed out of chronological order on purpose
        appointment_record(&clinic.doctor, &clinic.patient, TestClinic::tomorrow(), "09:00 AM", AppointmentStatus::Pending),
        appointment_record(&clinic.doctor, &clinic.patient, TestClinic::today(), "11:00 AM", AppointmentStatus::Scheduled),
        appointment_record(&clinic.doctor, &clinic.patient, TestClinic::today(), "09:00 AM", AppointmentStatus::Confirmed),
        // Someone else's
        appointment_record(&clinic.other_doctor, &clinic.other_patient, TestClinic::tomorrow(), "09:00 AM", AppointmentStatus::Pending),
    ];
    clinic
        .apply(rows.into_iter().map(Mutation::InsertAppointment).collect())
        .await;
    clinic
}

#[tokio::test]
async fn upcoming_includes_pending_in_chronological_order() {
    let clinic = seeded_clinic().await;

    let upcoming = AppointmentQueryService::new(&clinic.state)
        .upcoming(clinic.patient.actor())
        .await
        .unwrap();

    let slots: Vec<_> = upcoming
        .iter()
        .map(|a| (a.appointment.appointment_date, a.appointment.appointment_time))
        .collect();
    assert_eq!(
        slots,
        vec![
            (TestClinic::today(), slot("09:00 AM")),
            (TestClinic::today(), slot("11:00 AM")),
            (TestClinic::tomorrow(), slot("09:00 AM")),
        ]
    );
}

#[tokio::test]
async fn same_day_appointments_move_from_upcoming_to_completed() {
    let clinic = seeded_clinic().await;
    let service = AppointmentQueryService::new(&clinic.state);

    clinic.set_time(10, 0);

    let upcoming = service.upcoming(clinic.patient.actor()).await.unwrap();
    assert_eq!(upcoming.len(), 2);

    let completed = service.completed(clinic.patient.actor()).await.unwrap();
    let times: Vec<_> = completed
        .iter()
        .map(|a| (a.appointment.appointment_date, a.appointment.appointment_time.to_string()))
        .collect();
    assert_eq!(
        times,
        vec![
            (TestClinic::yesterday(), "09:00 AM".to_string()),
            (TestClinic::yesterday(), "10:00 AM".to_string()),
            (TestClinic::today(), "09:00 AM".to_string()),
        ]
    );
}

#[tokio::test]
async fn listings_are_scoped_by_role() {
    let clinic = seeded_clinic().await;
    let service = AppointmentQueryService::new(&clinic.state);

    let mine = service
        .user_appointments(clinic.other_patient.actor(), None, true)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    let doctors = service
        .user_appointments(clinic.doctor.actor(), None, true)
        .await
        .unwrap();
    assert_eq!(doctors.len(), 6);

    let everyone = service
        .user_appointments(clinic.admin.actor(), None, true)
        .await
        .unwrap();
    assert_eq!(everyone.len(), 7);
}

#[tokio::test]
async fn listing_hides_past_unless_asked() {
    let clinic = seeded_clinic().await;
    let service = AppointmentQueryService::new(&clinic.state);

    let current = service
        .user_appointments(clinic.patient.actor(), None, false)
        .await
        .unwrap();
    assert_eq!(current.len(), 3);
    assert!(current.iter().all(|a| a.appointment.appointment_date >= TestClinic::today()));

    let confirmed = service
        .user_appointments(clinic.patient.actor(), Some(AppointmentStatus::Confirmed), true)
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 2);
    assert_eq!(confirmed[0].appointment.appointment_date, TestClinic::yesterday());
}

#[tokio::test]
async fn existence_checks_follow_lists() {
    let clinic = TestClinic::new();
    let service = AppointmentQueryService::new(&clinic.state);

    assert!(!service.has_upcoming(clinic.patient.actor()).await.unwrap());
    assert!(!service.has_completed(clinic.patient.actor()).await.unwrap());

    clinic
        .apply(vec![Mutation::InsertAppointment(appointment_record(
            &clinic.doctor,
            &clinic.patient,
            ymd(2025, 6, 11),
            "10:00 AM",
            AppointmentStatus::Pending,
        ))])
        .await;

    assert!(service.has_upcoming(clinic.patient.actor()).await.unwrap());
    assert!(!service.has_completed(clinic.patient.actor()).await.unwrap());
    assert!(!service.has_upcoming(clinic.other_patient.actor()).await.unwrap());
}

#[tokio::test]
async fn listings_carry_party_names_and_specialization() {
    let clinic = seeded_clinic().await;

    let upcoming = AppointmentQueryService::new(&clinic.state)
        .upcoming(clinic.admin.actor())
        .await
        .unwrap();

    let mine = upcoming
        .iter()
        .find(|view| view.appointment.patient_id == clinic.patient.id)
        .unwrap();
    assert_eq!(mine.doctor_name.as_deref(), Some("doctor"));
    assert_eq!(mine.patient_name.as_deref(), Some("patient"));
    assert_eq!(mine.doctor_specialization.as_deref(), Some("General Practice"));

    let theirs = upcoming
        .iter()
        .find(|view| view.appointment.patient_id == clinic.other_patient.id)
        .unwrap();
    assert_eq!(theirs.doctor_name.as_deref(), Some("other.doctor"));
    assert_eq!(theirs.patient_name.as_deref(), Some("other.patient"));

    // Flattened on the wire: the appointment fields sit beside the names.
    let wire = serde_json::to_value(mine).unwrap();
    assert_eq!(wire["doctor_id"], serde_json::json!(clinic.doctor.id));
    assert_eq!(wire["doctor_name"], "doctor");
}
