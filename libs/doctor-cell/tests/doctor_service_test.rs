use assert_matches::assert_matches;
use chrono::Duration;

use doctor_cell::models::{AvailableDateAction, CreateDoctorRequest, DoctorError, UpdateDoctorProfileRequest};
use doctor_cell::services::{AvailabilityService, DoctorService};
use shared_database::{ClinicStore, Mutation};
use shared_models::appointment::AppointmentStatus;
use shared_models::doctor::DoctorProfile;
use shared_utils::test_utils::{appointment_record, slot, ymd, TestClinic};

#[tokio::test]
async fn slots_exclude_booked_times_on_future_dates() {
    let clinic = TestClinic::new();
    clinic
        .apply(vec![Mutation::InsertAppointment(appointment_record(
            &clinic.doctor,
            &clinic.patient,
            TestClinic::tomorrow(),
            "10:00 AM",
            AppointmentStatus::Pending,
        ))])
        .await;

    let slots = AvailabilityService::new(&clinic.state)
        .get_available_slots(clinic.doctor.id, TestClinic::tomorrow())
        .await
        .unwrap();

    assert_eq!(slots, vec![slot("09:00 AM"), slot("11:00 AM")]);
}

#[tokio::test]
async fn terminal_appointments_release_their_slot() {
    let clinic = TestClinic::new();
    clinic
        .apply(vec![
            Mutation::InsertAppointment(appointment_record(
                &clinic.doctor,
                &clinic.patient,
                TestClinic::tomorrow(),
                "09:00 AM",
                AppointmentStatus::Cancelled,
            )),
            Mutation::InsertAppointment(appointment_record(
                &clinic.doctor,
                &clinic.other_patient,
                TestClinic::tomorrow(),
                "10:00 AM",
                AppointmentStatus::Completed,
            )),
        ])
        .await;

    let slots = AvailabilityService::new(&clinic.state)
        .get_available_slots(clinic.doctor.id, TestClinic::tomorrow())
        .await
        .unwrap();

    assert_eq!(slots.len(), 3);
}

#[tokio::test]
async fn todays_elapsed_slots_are_hidden() {
    let clinic = TestClinic::new();
    clinic.set_time(10, 0);

    let slots = AvailabilityService::new(&clinic.state)
        .get_available_slots(clinic.doctor.id, TestClinic::today())
        .await
        .unwrap();

    assert_eq!(slots, vec![slot("11:00 AM")]);
}

#[tokio::test]
async fn past_and_unlisted_dates_have_no_slots() {
    let clinic = TestClinic::new();
    let service = AvailabilityService::new(&clinic.state);

    let past = service
        .get_available_slots(clinic.doctor.id, TestClinic::yesterday())
        .await
        .unwrap();
    let unlisted = service
        .get_available_slots(clinic.other_doctor.id, TestClinic::today())
        .await
        .unwrap();

    assert!(past.is_empty());
    assert!(unlisted.is_empty());
}

#[tokio::test]
async fn unknown_or_inactive_doctor_is_not_found() {
    let clinic = TestClinic::new();
    let service = AvailabilityService::new(&clinic.state);

    assert_matches!(
        service.get_available_slots(clinic.patient.id, TestClinic::today()).await,
        Err(DoctorError::NotFound)
    );

    DoctorService::new(&clinic.state)
        .deactivate(clinic.doctor.id, clinic.admin.actor())
        .await
        .unwrap();
    assert_matches!(
        service.get_available_slots(clinic.doctor.id, TestClinic::today()).await,
        Err(DoctorError::NotFound)
    );
}

fn create_request(clinic: &TestClinic) -> CreateDoctorRequest {
    CreateDoctorRequest {
        user_id: clinic.unprofiled_doctor.id,
        specialization: "Neurology".to_string(),
        experience_years: 12,
        slot_template: vec!["02:00 PM".to_string(), "09:30 AM".to_string()],
        available_dates: vec![TestClinic::tomorrow(), TestClinic::yesterday(), TestClinic::tomorrow()],
        profile: DoctorProfile {
            clinic_name: Some("  Northside Neuro ".to_string()),
            ..DoctorProfile::default()
        },
    }
}

#[tokio::test]
async fn admin_creates_profile_for_doctor_user() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);

    let doctor = service
        .create_profile(create_request(&clinic), clinic.admin.actor())
        .await
        .unwrap();

    assert_eq!(doctor.id, clinic.unprofiled_doctor.id);
    assert_eq!(doctor.slot_template, vec![slot("02:00 PM"), slot("09:30 AM")]);
    assert_eq!(doctor.available_dates, vec![TestClinic::tomorrow()]);
    assert_eq!(doctor.review_count, 0);
    assert_eq!(doctor.profile.clinic_name.as_deref(), Some("Northside Neuro"));

    assert_matches!(
        service.create_profile(create_request(&clinic), clinic.admin.actor()).await,
        Err(DoctorError::ProfileExists)
    );
}

#[tokio::test]
async fn profile_creation_checks_caller_and_role() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);

    assert_matches!(
        service
            .create_profile(create_request(&clinic), clinic.unprofiled_doctor.actor())
            .await,
        Err(DoctorError::Forbidden(_))
    );

    let mut request = create_request(&clinic);
    request.user_id = clinic.unprofiled_patient.id;
    assert_matches!(
        service.create_profile(request, clinic.admin.actor()).await,
        Err(DoctorError::NotADoctor)
    );

    let mut request = create_request(&clinic);
    request.slot_template = vec!["09:00 AM".to_string(), "09:00 am".to_string()];
    assert_matches!(
        service.create_profile(request, clinic.admin.actor()).await,
        Err(DoctorError::Validation(_))
    );
}

#[tokio::test]
async fn doctor_detail_hides_past_dates() {
    let clinic = TestClinic::new();

    let doctor = DoctorService::new(&clinic.state)
        .get_doctor(clinic.doctor.id)
        .await
        .unwrap();

    assert_eq!(doctor.available_dates, vec![TestClinic::today(), TestClinic::tomorrow()]);
}

#[tokio::test]
async fn listing_filters_online_and_pages() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);

    service
        .set_online(clinic.other_doctor.id, false, clinic.other_doctor.actor())
        .await
        .unwrap();

    let online = service.list_doctors(Some(true), None, None).await.unwrap();
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].id, clinic.doctor.id);

    let first_page = service.list_doctors(None, Some(1), None).await.unwrap();
    let second_page = service.list_doctors(None, Some(1), Some(1)).await.unwrap();
    assert_eq!(first_page.len(), 1);
    assert_eq!(second_page.len(), 1);
    assert_ne!(first_page[0].id, second_page[0].id);
}

#[tokio::test]
async fn template_update_is_limited_to_owner_and_admin() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);
    let template = vec!["08:00 AM".to_string(), "01:00 PM".to_string()];

    assert_matches!(
        service
            .update_slot_template(clinic.doctor.id, &template, clinic.other_doctor.actor())
            .await,
        Err(DoctorError::Forbidden(_))
    );

    let updated = service
        .update_slot_template(clinic.doctor.id, &template, clinic.doctor.actor())
        .await
        .unwrap();
    assert_eq!(updated.slot_template, vec![slot("08:00 AM"), slot("01:00 PM")]);

    assert_matches!(
        service
            .update_slot_template(clinic.doctor.id, &["25:00 PM".to_string()], clinic.admin.actor())
            .await,
        Err(DoctorError::Validation(_))
    );
}

#[tokio::test]
async fn adding_and_removing_dates_is_idempotent() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);
    let actor = clinic.doctor.actor();
    let in_a_week = ymd(2025, 6, 17);

    let dates = service
        .manage_available_date(clinic.doctor.id, in_a_week, AvailableDateAction::Add, actor)
        .await
        .unwrap();
    assert_eq!(dates, vec![TestClinic::today(), TestClinic::tomorrow(), in_a_week]);

    let again = service
        .manage_available_date(clinic.doctor.id, in_a_week, AvailableDateAction::Add, actor)
        .await
        .unwrap();
    assert_eq!(again, dates);

    let removed = service
        .manage_available_date(clinic.doctor.id, TestClinic::tomorrow(), AvailableDateAction::Remove, actor)
        .await
        .unwrap();
    assert_eq!(removed, vec![TestClinic::today(), in_a_week]);

    let missing = service
        .manage_available_date(clinic.doctor.id, ymd(2025, 7, 1), AvailableDateAction::Remove, actor)
        .await
        .unwrap();
    assert_eq!(missing, removed);
}

#[tokio::test]
async fn past_dates_cannot_be_added() {
    let clinic = TestClinic::new();

    let result = DoctorService::new(&clinic.state)
        .manage_available_date(
            clinic.doctor.id,
            TestClinic::yesterday(),
            AvailableDateAction::Add,
            clinic.doctor.actor(),
        )
        .await;

    assert_matches!(result, Err(DoctorError::Validation(_)));
}

#[tokio::test]
async fn extending_merges_horizon_with_future_dates() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);
    let far_out = ymd(2025, 8, 1);

    service
        .manage_available_date(clinic.doctor.id, far_out, AvailableDateAction::Add, clinic.doctor.actor())
        .await
        .unwrap();

    let dates = service
        .extend_available_dates(clinic.doctor.id, Some(3), clinic.doctor.actor())
        .await
        .unwrap();

    let today = TestClinic::today();
    assert_eq!(
        dates,
        vec![today, today + Duration::days(1), today + Duration::days(2), far_out]
    );

    assert_matches!(
        service
            .extend_available_dates(clinic.doctor.id, Some(366), clinic.doctor.actor())
            .await,
        Err(DoctorError::Validation(_))
    );
}

#[tokio::test]
async fn extending_uses_configured_horizon_by_default() {
    let clinic = TestClinic::new();

    let dates = DoctorService::new(&clinic.state)
        .extend_available_dates(clinic.other_doctor.id, None, clinic.admin.actor())
        .await
        .unwrap();

    assert_eq!(dates.len(), clinic.state.config.available_dates_horizon_days as usize);
    assert_eq!(dates[0], TestClinic::today());
}

#[tokio::test]
async fn pruning_removes_only_past_dates() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);

    let removed = service
        .prune_past_dates(clinic.doctor.id, clinic.doctor.actor())
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let mut tx = clinic.store.begin().await.unwrap();
    let stored = tx.find_doctor(clinic.doctor.id).await.unwrap().unwrap();
    assert_eq!(stored.available_dates, vec![TestClinic::today(), TestClinic::tomorrow()]);
    drop(tx);

    let again = service
        .prune_past_dates(clinic.doctor.id, clinic.doctor.actor())
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn deactivation_cascades_to_user_and_can_be_reversed() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);

    assert_matches!(
        service.deactivate(clinic.doctor.id, clinic.doctor.actor()).await,
        Err(DoctorError::Forbidden(_))
    );

    assert!(service.deactivate(clinic.doctor.id, clinic.admin.actor()).await.unwrap());
    assert!(!service.deactivate(clinic.doctor.id, clinic.admin.actor()).await.unwrap());

    {
        let mut tx = clinic.store.begin().await.unwrap();
        let user = tx.find_user(clinic.doctor.id).await.unwrap().unwrap();
        let doctor = tx.find_doctor(clinic.doctor.id).await.unwrap().unwrap();
        assert!(!user.active);
        assert!(!doctor.active);
        assert!(!doctor.online);
    }

    assert_matches!(service.get_doctor(clinic.doctor.id).await, Err(DoctorError::NotFound));

    assert!(service.reactivate(clinic.doctor.id, clinic.admin.actor()).await.unwrap());
    let mut tx = clinic.store.begin().await.unwrap();
    assert!(tx.find_user(clinic.doctor.id).await.unwrap().unwrap().active);
}

#[tokio::test]
async fn profile_update_changes_only_the_given_fields() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);

    let updated = service
        .update_profile(
            clinic.doctor.id,
            UpdateDoctorProfileRequest {
                specialization: Some(" Cardiology ".to_string()),
                education: Some("MD, State University".to_string()),
                clinic_location: Some("12 Harbor Rd".to_string()),
                ..UpdateDoctorProfileRequest::default()
            },
            clinic.doctor.actor(),
        )
        .await
        .unwrap();
    assert_eq!(updated.specialization, "Cardiology");
    assert_eq!(updated.experience_years, 5);
    assert_eq!(updated.profile.education.as_deref(), Some("MD, State University"));
    assert_eq!(updated.slot_template.len(), 3);

    // Blank clears, absent keeps
    let cleared = service
        .update_profile(
            clinic.doctor.id,
            UpdateDoctorProfileRequest {
                clinic_location: Some("   ".to_string()),
                experience_years: Some(9),
                ..UpdateDoctorProfileRequest::default()
            },
            clinic.admin.actor(),
        )
        .await
        .unwrap();
    assert_eq!(cleared.profile.clinic_location, None);
    assert_eq!(cleared.profile.education.as_deref(), Some("MD, State University"));
    assert_eq!(cleared.experience_years, 9);

    let stored = clinic
        .store
        .begin_read()
        .await
        .unwrap()
        .find_doctor(clinic.doctor.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.specialization, "Cardiology");
    assert_eq!(stored.audit.version, 2);
}

#[tokio::test]
async fn profile_update_is_validated_and_scoped() {
    let clinic = TestClinic::new();
    let service = DoctorService::new(&clinic.state);

    assert_matches!(
        service
            .update_profile(clinic.doctor.id, UpdateDoctorProfileRequest::default(), clinic.doctor.actor())
            .await,
        Err(DoctorError::Validation(_))
    );
    assert_matches!(
        service
            .update_profile(
                clinic.doctor.id,
                UpdateDoctorProfileRequest {
                    specialization: Some("  ".to_string()),
                    ..UpdateDoctorProfileRequest::default()
                },
                clinic.doctor.actor(),
            )
            .await,
        Err(DoctorError::Validation(_))
    );
    assert_matches!(
        service
            .update_profile(
                clinic.doctor.id,
                UpdateDoctorProfileRequest {
                    experience_years: Some(-1),
                    ..UpdateDoctorProfileRequest::default()
                },
                clinic.doctor.actor(),
            )
            .await,
        Err(DoctorError::Validation(_))
    );
    assert_matches!(
        service
            .update_profile(
                clinic.doctor.id,
                UpdateDoctorProfileRequest {
                    experience_years: Some(3),
                    ..UpdateDoctorProfileRequest::default()
                },
                clinic.patient.actor(),
            )
            .await,
        Err(DoctorError::Forbidden(_))
    );
}
