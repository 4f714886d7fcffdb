//! The booking wizard end to end: sign in, shipping details, receipt upload,
//! confirmation.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chrono::{Days, NaiveDate};
use mommypump_core::booking::{BookingFlow, MAX_RECEIPT_BYTES};
use mommypump_core::{BookingStatus, CustomerId, ProductId, RentalOptionId};
use mommypump_integration_tests::{TestApp, TestResponse};
use mommypump_storefront::db::ProductRepository;
use mommypump_storefront::images::RECEIPTS_FOLDER;

const WIZARD: &str = "/products/pump1/booking";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n-receipt-";

fn tomorrow(app: &TestApp) -> String {
    app.state
        .config()
        .today()
        .checked_add_days(Days::new(1))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

async fn submit_shipping(app: &mut TestApp, rental: &str, start_date: &str) -> TestResponse {
    app.post_form(
        &format!("{WIZARD}/shipping"),
        &[
            ("rentalOption", rental),
            ("startDate", start_date),
            ("name", "มะลิ ใจดี"),
            ("phone", "0812345678"),
            ("email", "malee@example.com"),
            ("lineId", "malee.j"),
            ("address", "99/1 ถนนสุขุมวิท"),
            ("district", "วัฒนา"),
            ("province", "กรุงเทพมหานคร"),
            ("postalCode", "10110"),
            ("notes", "ส่งช่วงเช้า"),
        ],
    )
    .await
}

/// Sign in and reach the payment step for `rental`.
async fn reach_payment(app: &mut TestApp, rental: &str) {
    app.sign_in_with_phone().await;
    let wizard = app.get(&format!("{WIZARD}?rental={rental}")).await;
    assert_eq!(wizard.status, StatusCode::OK);

    let start = tomorrow(app);
    let shipping = submit_shipping(app, rental, &start).await;
    assert!(shipping.status.is_redirection(), "shipping: {}", shipping.status);
    assert_eq!(shipping.location(), Some(WIZARD));
}

async fn upload_receipt(app: &mut TestApp) -> TestResponse {
    app.post_receipt(&format!("{WIZARD}/payment"), "slip.png", "image/png", PNG_BYTES)
        .await
}

async fn booking_count(app: &TestApp) -> u64 {
    ProductRepository::new(app.store.as_ref())
        .get(&ProductId::new("pump1"))
        .await
        .unwrap()
        .unwrap()
        .booking_count
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_booking_one_month_rental() {
    let mut app = TestApp::new().await;
    let count_before = booking_count(&app).await;
    reach_payment(&mut app, "1").await;

    let payment_step = app.get(WIZARD).await;
    assert_eq!(payment_step.status, StatusCode::OK);
    // ฿1,500 rental plus ฿6,000 deposit
    assert!(payment_step.body.contains("฿7,500"));

    let submitted = upload_receipt(&mut app).await;
    assert!(submitted.status.is_redirection(), "payment: {}", submitted.status);
    assert_eq!(submitted.location(), Some("/products/pump1/booking/confirmation"));

    let bookings = app.state.booking_admin().list(None).await.unwrap();
    assert_eq!(bookings.len(), 1);
    let booking = &bookings[0];
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.details.rental_duration, 1);
    assert_eq!(booking.details.total_amount.minor_units(), 750_000);
    assert_eq!(booking.details.customer.customer_name, "มะลิ ใจดี");
    assert_eq!(booking.details.notes.as_deref(), Some("ส่งช่วงเช้า"));

    let receipt_id = booking.receipt_id.as_ref().unwrap();
    let (folder, size) = app.images.upload(receipt_id).unwrap();
    assert_eq!(folder, RECEIPTS_FOLDER);
    assert_eq!(size, PNG_BYTES.len());

    assert_eq!(booking_count(&app).await, count_before + 1);

    let confirmation = app.get("/products/pump1/booking/confirmation").await;
    assert_eq!(confirmation.status, StatusCode::OK);
    assert!(confirmation.body.contains(booking.id.as_str()));

    let account = app.get("/account").await;
    assert!(account.body.contains("Spectra S1 Plus"));
}

#[tokio::test]
async fn test_confirmed_flow_starts_fresh_next_time() {
    let mut app = TestApp::new().await;
    reach_payment(&mut app, "1").await;
    assert!(upload_receipt(&mut app).await.status.is_redirection());

    // A confirmed flow is not resumed; the customer books again from step 1.
    let again = app.get(&format!("{WIZARD}?rental=2")).await;
    assert_eq!(again.status, StatusCode::OK);
    let start = tomorrow(&app);
    assert!(submit_shipping(&mut app, "2", &start).await.status.is_redirection());
    assert!(upload_receipt(&mut app).await.status.is_redirection());

    let bookings = app.state.booking_admin().list(None).await.unwrap();
    assert_eq!(bookings.len(), 2);
    assert_ne!(bookings[0].id, bookings[1].id);
    assert!(bookings.iter().all(|b| b.status == BookingStatus::Pending));
    assert_eq!(app.images.upload_count(), 2);
}

// =============================================================================
// Step 1 Validation
// =============================================================================

#[tokio::test]
async fn test_missing_shipping_fields_rerender_step_one() {
    let mut app = TestApp::new().await;
    app.sign_in_with_phone().await;
    app.get(WIZARD).await;

    let response = app
        .post_form(
            &format!("{WIZARD}/shipping"),
            &[
                ("name", ""),
                ("phone", "0812345678"),
                ("address", "99/1 ถนนสุขุมวิท"),
                ("district", ""),
                ("province", "กรุงเทพมหานคร"),
                ("postalCode", "10110"),
            ],
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("กรุณากรอกข้อมูลที่จำเป็นให้ครบถ้วน"));
    // Typed values survive the round trip.
    assert!(response.body.contains("99/1 ถนนสุขุมวิท"));
}

#[tokio::test]
async fn test_start_date_in_the_past_is_rejected() {
    let mut app = TestApp::new().await;
    app.sign_in_with_phone().await;
    app.get(WIZARD).await;

    let response = submit_shipping(&mut app, "1", "2020-01-01").await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("วันที่เริ่มเช่าต้องไม่ก่อนวันนี้"));
}

#[tokio::test]
async fn test_back_returns_to_shipping_with_entries() {
    let mut app = TestApp::new().await;
    reach_payment(&mut app, "3").await;

    let back = app.post_form(&format!("{WIZARD}/back"), &[]).await;
    assert_eq!(back.location(), Some(WIZARD));

    let step_one = app.get(WIZARD).await;
    assert_eq!(step_one.status, StatusCode::OK);
    assert!(step_one.body.contains("กรุงเทพมหานคร"));
    assert!(step_one.body.contains("ส่งช่วงเช้า"));
}

// =============================================================================
// Step 2 Validation
// =============================================================================

#[tokio::test]
async fn test_payment_without_receipt_is_rejected() {
    let mut app = TestApp::new().await;
    reach_payment(&mut app, "1").await;

    let response = app
        .post_receipt(&format!("{WIZARD}/payment"), "", "application/octet-stream", b"")
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("กรุณาแนบสลิปการโอนเงิน"));
    assert!(app.state.booking_admin().list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_receipt_is_rejected_before_upload() {
    let mut app = TestApp::new().await;
    reach_payment(&mut app, "1").await;

    let six_mb = vec![0_u8; 6 * 1024 * 1024];
    let response = app
        .post_receipt(&format!("{WIZARD}/payment"), "slip.jpg", "image/jpeg", &six_mb)
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("5MB"));
    assert_eq!(app.images.upload_count(), 0);
    assert!(app.state.booking_admin().list(None).await.unwrap().is_empty());

    // Still on step 2; a valid receipt goes through.
    assert!(upload_receipt(&mut app).await.status.is_redirection());
}

#[tokio::test]
async fn test_non_image_receipt_is_rejected() {
    let mut app = TestApp::new().await;
    reach_payment(&mut app, "1").await;

    let response = app
        .post_receipt(&format!("{WIZARD}/payment"), "slip.pdf", "application/pdf", b"%PDF-1.7")
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("สลิปต้องเป็นไฟล์รูปภาพเท่านั้น"));
    assert_eq!(app.images.upload_count(), 0);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_upload_failure_keeps_step_two_and_retry_reuses_draft() {
    let mut app = TestApp::new().await;
    reach_payment(&mut app, "2").await;

    app.images.set_failing(true);
    let failed = upload_receipt(&mut app).await;
    assert_eq!(failed.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(failed.body.contains("กรุณาลองใหม่อีกครั้ง"));

    let drafts = app
        .state
        .booking_admin()
        .list(Some(BookingStatus::Draft))
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);

    app.images.set_failing(false);
    let retried = upload_receipt(&mut app).await;
    assert!(retried.status.is_redirection(), "retry: {}", retried.status);

    let bookings = app.state.booking_admin().list(None).await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].id, drafts[0].id);
    assert_eq!(bookings[0].status, BookingStatus::Pending);
    assert_eq!(app.images.upload_count(), 1);
}

#[tokio::test]
async fn test_retry_after_changing_option_stores_the_new_option() {
    let mut app = TestApp::new().await;
    reach_payment(&mut app, "1").await;

    app.images.set_failing(true);
    assert_eq!(
        upload_receipt(&mut app).await.status,
        StatusCode::SERVICE_UNAVAILABLE
    );
    app.images.set_failing(false);

    let back = app.post_form(&format!("{WIZARD}/back"), &[]).await;
    assert_eq!(back.location(), Some(WIZARD));
    let start = tomorrow(&app);
    assert!(submit_shipping(&mut app, "3", &start).await.status.is_redirection());
    assert!(upload_receipt(&mut app).await.status.is_redirection());

    let bookings = app.state.booking_admin().list(None).await.unwrap();
    assert_eq!(bookings.len(), 1);
    let booking = &bookings[0];
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.details.rental_option_id, RentalOptionId::new(3));
    assert_eq!(booking.details.rental_duration, 6);
    // ฿7,800 for six months plus the ฿6,000 deposit
    assert_eq!(booking.details.total_amount.minor_units(), 1_380_000);

    let confirmation = app.get("/products/pump1/booking/confirmation").await;
    assert!(confirmation.body.contains("฿13,800"));
}

#[tokio::test]
async fn test_unknown_option_in_wizard_is_not_found() {
    let mut app = TestApp::new().await;
    app.sign_in_with_phone().await;

    let response = app.get(&format!("{WIZARD}?rental=42")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_without_flow_redirects_to_wizard() {
    let mut app = TestApp::new().await;
    app.sign_in_with_phone().await;

    let response = upload_receipt(&mut app).await;
    assert_eq!(response.location(), Some(WIZARD));
    assert_eq!(app.images.upload_count(), 0);
}

// =============================================================================
// Dates
// =============================================================================

#[tokio::test]
async fn test_month_end_start_date_clamps_end_date() {
    let app = TestApp::new().await;
    let product = app
        .state
        .catalog()
        .product(&ProductId::new("pump1"))
        .await
        .unwrap()
        .unwrap();

    let today = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
    let mut flow = BookingFlow::start(
        product,
        Some(RentalOptionId::new(1)),
        CustomerId::new("c1"),
        today,
    )
    .unwrap();
    flow.set_start_date(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(), today)
        .unwrap();

    assert_eq!(flow.end_date(), NaiveDate::from_ymd_opt(2025, 2, 28));
    assert_eq!(flow.total_amount().minor_units(), 750_000);
    assert_eq!(MAX_RECEIPT_BYTES, 5 * 1024 * 1024);
}
