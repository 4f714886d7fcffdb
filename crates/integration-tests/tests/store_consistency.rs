//! Concurrent sign-ins and abandoned draft cleanup against the shared store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::{Duration, NaiveDate};
use mommypump_core::booking::{Booking, CustomerSnapshot, NewBooking};
use mommypump_core::{BookingId, BookingStatus, ContentId, CustomerId, Money, ProductId, RentalOptionId, SubjectId};
use mommypump_integration_tests::TestApp;
use mommypump_storefront::db::{BookingRepository, CustomerRepository, now_millis};
use mommypump_storefront::identity::AuthSubject;
use tokio::task::JoinSet;
use uuid::Uuid;

fn draft(id: &str, age: Duration) -> Booking {
    let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    Booking::draft(
        BookingId::new(id),
        NewBooking {
            customer_id: CustomerId::new("c1"),
            product_id: ProductId::new("pump1"),
            product_name: "Spectra S1 Plus".to_owned(),
            rental_option_id: RentalOptionId::new(1),
            rental_duration: 1,
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            total_amount: Money::from_baht(7_500),
            customer: CustomerSnapshot {
                customer_name: "Malee".to_owned(),
                customer_phone: "+66812345678".to_owned(),
                address: "99/1 Sukhumvit, Watthana, Bangkok 10110".to_owned(),
                ..CustomerSnapshot::default()
            },
            notes: None,
        },
        now_millis() - age,
    )
}

// =============================================================================
// Customers
// =============================================================================

#[tokio::test]
async fn test_concurrent_first_sign_ins_create_one_customer() {
    let app = TestApp::new().await;
    let mut subject = AuthSubject::new(SubjectId::new("google-oauth2|malee"));
    subject.display_name = Some("Malee".to_owned());
    subject.email = Some("malee@example.com".to_owned());

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let state = app.state.clone();
        let subject = subject.clone();
        tasks.spawn(async move { state.auth().ensure_customer(&subject).await });
    }

    let mut ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        ids.push(joined.unwrap().unwrap().id);
    }

    assert_eq!(ids.len(), 8);
    assert!(ids.iter().all(|id| id == &ids[0]));
    let customers = CustomerRepository::new(app.store.as_ref())
        .list_all()
        .await
        .unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].name, "Malee");
}

#[tokio::test]
async fn test_google_sign_in_creates_profile_from_provider_fields() {
    let mut app = TestApp::new().await;
    let mut subject = AuthSubject::new(SubjectId::new("google-oauth2|somchai"));
    subject.display_name = Some("Somchai".to_owned());
    subject.email = Some("somchai@example.com".to_owned());
    app.identity.add_google_user("good-code", subject);

    let start = app.get("/auth/google/login").await;
    let location = start.location().unwrap().to_owned();
    let state = location
        .split('&')
        .find_map(|pair| pair.strip_prefix("state="))
        .unwrap()
        .to_owned();

    let callback = app
        .get(&format!("/auth/google/callback?code=good-code&state={state}"))
        .await;
    assert_eq!(callback.location(), Some("/"));

    let customers = CustomerRepository::new(app.store.as_ref())
        .list_all()
        .await
        .unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].name, "Somchai");
    assert_eq!(
        customers[0].email.as_ref().map(ToString::to_string).as_deref(),
        Some("somchai@example.com")
    );
}

// =============================================================================
// Drafts
// =============================================================================

#[tokio::test]
async fn test_sweep_cancels_only_stale_drafts() {
    let app = TestApp::new().await;
    let repo = BookingRepository::new(app.store.as_ref());

    repo.reserve_draft(Uuid::new_v4(), &draft("stale", Duration::hours(30)))
        .await
        .unwrap();
    repo.reserve_draft(Uuid::new_v4(), &draft("fresh", Duration::minutes(5)))
        .await
        .unwrap();
    repo.reserve_draft(Uuid::new_v4(), &draft("paid", Duration::hours(48)))
        .await
        .unwrap();
    repo.promote(&BookingId::new("paid"), &ContentId::new("receipts/paid"))
        .await
        .unwrap();

    let cancelled = app
        .state
        .booking_admin()
        .sweep_abandoned_drafts(Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(cancelled, vec![BookingId::new("stale")]);

    let stale = repo.get(&BookingId::new("stale")).await.unwrap().unwrap();
    assert_eq!(stale.status, BookingStatus::Cancelled);
    assert!(stale.details.notes.is_some());

    let fresh = repo.get(&BookingId::new("fresh")).await.unwrap().unwrap();
    assert_eq!(fresh.status, BookingStatus::Draft);
    let paid = repo.get(&BookingId::new("paid")).await.unwrap().unwrap();
    assert_eq!(paid.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_same_submission_token_reserves_once() {
    let app = TestApp::new().await;
    let repo = BookingRepository::new(app.store.as_ref());
    let token = Uuid::new_v4();

    let (first, created) = repo
        .reserve_draft(token, &draft("first", Duration::zero()))
        .await
        .unwrap();
    assert!(created);
    let (second, created) = repo
        .reserve_draft(token, &draft("second", Duration::zero()))
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);

    assert_eq!(app.state.booking_admin().list(None).await.unwrap().len(), 1);
}
