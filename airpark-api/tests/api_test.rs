use std::sync::Arc;

use airpark_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig, ResiliencyState, WebhookConfig},
};
use airpark_booking::{BookingPolicy, BookingService, MockPaymentAdapter, PaymentOrchestrator};
use airpark_catalog::{NewTariff, ParkingSlot, TariffKind};
use airpark_core::identity::{hash_password, CustomerType, Role, User};
use airpark_core::repository::{ParkingSlotRepository, TariffRepository, UserRepository};
use airpark_store::{memory_repositories, InMemoryStore, RecordingPublisher};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const STAFF_EMAIL: &str = "desk@airpark.test";
const ADMIN_EMAIL: &str = "admin@airpark.test";
const PASSWORD: &str = "correct-horse";

struct TestApp {
    app: Router,
    card: Arc<MockPaymentAdapter>,
    tariff_id: Uuid,
}

async fn setup(slots: i32, stripe_secret: &str) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let card = Arc::new(MockPaymentAdapter::new("mock_card"));
    let paypal = Arc::new(MockPaymentAdapter::new("mock_paypal"));

    for n in 1..=slots {
        store.create_slot(&ParkingSlot::new(n, Some("A".into())).unwrap()).await.unwrap();
    }
    let tariff = NewTariff {
        kind: TariffKind::ParkingSlot,
        name: "Meet & Park".to_string(),
        description: None,
        daily_rate_pence: 1200,
        service_fee_pence: 0,
        is_active: true,
    }
    .into_tariff()
    .unwrap();
    store.create_tariff(&tariff).await.unwrap();

    for (email, role) in [(STAFF_EMAIL, Role::Staff), (ADMIN_EMAIL, Role::Admin)] {
        store
            .create_user(&User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                full_name: "Operations".to_string(),
                phone: None,
                role,
                customer_type: CustomerType::Personal,
                company_name: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let repos = memory_repositories(store.clone());
    let service = BookingService::new(
        repos.clone(),
        Arc::new(PaymentOrchestrator::new(card.clone(), paypal)),
        Arc::new(RecordingPublisher::new()),
        BookingPolicy {
            booking_fee_pence: 250,
            ..BookingPolicy::default()
        },
    );

    let state = AppState {
        service: Arc::new(service),
        repos,
        redis: None,
        auth: AuthConfig {
            secret: "test-secret".to_string(),
            expiration: 3600,
        },
        webhooks: WebhookConfig {
            stripe_secret: stripe_secret.to_string(),
            dedupe_ttl_seconds: 60,
        },
        rate_limit_per_minute: 0,
        resiliency: Arc::new(ResiliencyState::default()),
        metrics: Arc::new(Metrics::new().unwrap()),
    };

    TestApp {
        app: app(state),
        card,
        tariff_id: tariff.id,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(&self, email: &str, corporate: bool) -> String {
        let mut body = json!({
            "email": email,
            "password": PASSWORD,
            "full_name": "Jo Traveller",
        });
        if corporate {
            body["customer_type"] = json!("CORPORATE");
            body["company_name"] = json!("Acme Ltd");
        }
        let (status, value) = self.send("POST", "/v1/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", value);
        value["token"].as_str().unwrap().to_string()
    }

    async fn login(&self, email: &str) -> String {
        let (status, value) = self
            .send(
                "POST",
                "/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", value);
        value["token"].as_str().unwrap().to_string()
    }

    /// Vehicle and a three-night trip for the token's owner
    async fn trip(&self, token: &str, registration: &str) -> (String, String) {
        let (status, vehicle) = self
            .send(
                "POST",
                "/v1/vehicles",
                Some(token),
                Some(json!({ "registration": registration, "make": "Ford", "model": "Focus" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", vehicle);

        let (status, flight) = self
            .send(
                "POST",
                "/v1/flights",
                Some(token),
                Some(json!({
                    "outbound_flight_number": "ba2490",
                    "departure_at": "2030-06-01T08:00:00Z",
                    "return_flight_number": "BA2491",
                    "return_at": "2030-06-04T18:00:00Z",
                    "destination": "Lisbon",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", flight);

        (
            vehicle["id"].as_str().unwrap().to_string(),
            flight["id"].as_str().unwrap().to_string(),
        )
    }

    async fn book(
        &self,
        token: &str,
        vehicle_id: &str,
        flight_id: &str,
        method: &str,
    ) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/v1/bookings",
            Some(token),
            Some(json!({
                "flight_id": flight_id,
                "tariff_id": self.tariff_id,
                "vehicle_ids": [vehicle_id],
                "payment_method": method,
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_and_metrics() {
    let t = setup(1, "").await;

    let (status, body) = t.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("airpark_http_requests_total"));
}

#[tokio::test]
async fn test_register_login_and_me() {
    let t = setup(1, "").await;
    let token = t.register("Jo@Example.com", false).await;

    let (status, me) = t.send("GET", "/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "jo@example.com");
    assert_eq!(me["role"], "CUSTOMER");
    assert!(me.get("password_hash").is_none());

    let (status, _) = t
        .send(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": "jo@example.com", "password": PASSWORD, "full_name": "Again" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .send(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": "jo@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t
        .send(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": "short@example.com", "password": "abc", "full_name": "Short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn test_missing_or_wrong_role_token() {
    let t = setup(1, "").await;
    let customer = t.register("jo@example.com", false).await;

    let (status, _) = t.send("GET", "/v1/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.send("GET", "/v1/admin/bookings", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff = t.login(STAFF_EMAIL).await;
    let (status, _) = t.send("GET", "/v1/admin/bookings", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send("GET", "/v1/admin/users", Some(&staff), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_vehicles_are_private_and_unique() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;
    let sam = t.register("sam@example.com", false).await;

    let (vehicle_id, _) = t.trip(&jo, "ab12 cde").await;

    let (status, vehicle) = t
        .send("GET", &format!("/v1/vehicles/{}", vehicle_id), Some(&jo), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vehicle["registration"], "AB12CDE");

    let (status, _) = t
        .send("GET", &format!("/v1/vehicles/{}", vehicle_id), Some(&sam), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send(
            "POST",
            "/v1/vehicles",
            Some(&jo),
            Some(json!({ "registration": "AB12-CDE", "make": "Kia", "model": "Ceed" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .send("DELETE", &format!("/v1/vehicles/{}", vehicle_id), Some(&jo), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = t.send("GET", "/v1/vehicles", Some(&jo), None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_invalid_flight_rejected() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;

    let (status, _) = t
        .send(
            "POST",
            "/v1/flights",
            Some(&jo),
            Some(json!({
                "outbound_flight_number": "BA2490",
                "departure_at": "2030-06-04T08:00:00Z",
                "return_flight_number": "BA2491",
                "return_at": "2030-06-01T18:00:00Z",
                "destination": "Lisbon",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_card_booking_quote_and_pay() {
    let t = setup(2, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;

    let (status, quote) = t
        .send(
            "POST",
            "/v1/quotes",
            Some(&jo),
            Some(json!({ "flight_id": flight_id, "tariff_id": t.tariff_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["days"], 3);
    assert_eq!(quote["total_pence"], 3 * 1200 + 250);

    let (status, created) = t.book(&jo, &vehicle_id, &flight_id, "CARD").await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["booking"]["status"], "PENDING_PAYMENT");
    assert_eq!(created["booking"]["total_pence"], quote["total_pence"]);
    assert!(created["payment"]["client_secret"].is_string());
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();

    let (status, paid) = t
        .send("POST", &format!("/v1/bookings/{}/pay", booking_id), Some(&jo), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", paid);
    assert_eq!(paid["status"], "CONFIRMED");
    assert_eq!(paid["payment_status"], "PAID");

    let (status, _) = t
        .send("POST", &format!("/v1/bookings/{}/pay", booking_id), Some(&jo), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, mine) = t.send("GET", "/v1/bookings", Some(&jo), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let sam = t.register("sam@example.com", false).await;
    let (status, _) = t
        .send("GET", &format!("/v1/bookings/{}", booking_id), Some(&sam), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let text = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("airpark_bookings_total{outcome=\"created\"} 1"));
    assert!(text.contains("airpark_payments_total{method=\"CARD\",outcome=\"paid\"} 1"));
}

#[tokio::test]
async fn test_declined_card_is_payment_required() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;

    let (_, created) = t.book(&jo, &vehicle_id, &flight_id, "CARD").await;
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();

    t.card.set_decline(true);
    let (status, body) = t
        .send("POST", &format!("/v1/bookings/{}/pay", booking_id), Some(&jo), None)
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body["error"].as_str().unwrap().contains("declined"));
}

#[tokio::test]
async fn test_full_car_park_is_conflict() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;

    let (status, _) = t.book(&jo, &vehicle_id, &flight_id, "CASH").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = t.book(&jo, &vehicle_id, &flight_id, "CASH").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "No parking slots available");
}

#[tokio::test]
async fn test_gateway_outage_trips_payment_breaker() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;

    let (_, created) = t.book(&jo, &vehicle_id, &flight_id, "CARD").await;
    let pay_uri = format!("/v1/bookings/{}/pay", created["booking"]["id"].as_str().unwrap());

    t.card.set_outage(true);
    for _ in 0..5 {
        let (status, _) = t.send("POST", &pay_uri, Some(&jo), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
    let (status, body) = t.send("POST", &pay_uri, Some(&jo), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("payments"));

    // Other routes are unaffected
    let (status, _) = t.send("GET", "/v1/bookings", Some(&jo), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_corporate_booking_is_invoiced() {
    let t = setup(1, "").await;
    let acme = t.register("ap@acme.test", true).await;
    let (vehicle_id, flight_id) = t.trip(&acme, "AB12CDE").await;

    let (status, created) = t.book(&acme, &vehicle_id, &flight_id, "CARD").await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["booking"]["payment_method"], "INVOICE");
    assert_eq!(created["booking"]["status"], "CONFIRMED");
    assert!(created["invoice"]["invoice_number"].as_str().unwrap().starts_with("INV-"));

    let (_, invoices) = t.send("GET", "/v1/invoices", Some(&acme), None).await;
    assert_eq!(invoices.as_array().unwrap().len(), 1);

    let staff = t.login(STAFF_EMAIL).await;
    let (status, listing) = t
        .send("GET", "/v1/admin/invoices?status=ISSUED", Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["summary"]["outstanding_pence"], created["booking"]["total_pence"]);
    let invoice_id = listing["invoices"][0]["id"].as_str().unwrap().to_string();

    let (status, paid) = t
        .send("POST", &format!("/v1/admin/invoices/{}/mark-paid", invoice_id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "PAID");

    let (status, _) = t
        .send("POST", &format!("/v1/admin/invoices/{}/mark-paid", invoice_id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_personal_customer_cannot_choose_invoice() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;

    let (status, _) = t.book(&jo, &vehicle_id, &flight_id, "INVOICE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_desk_flow_cash_check_in_and_out() {
    let t = setup(2, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;
    let (_, created) = t.book(&jo, &vehicle_id, &flight_id, "CASH").await;
    let id = created["booking"]["id"].as_str().unwrap().to_string();

    let staff = t.login(STAFF_EMAIL).await;

    let (status, booking) = t
        .send("POST", &format!("/v1/admin/bookings/{}/check-in", id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "CHECKED_IN");

    let (_, occupancy) = t.send("GET", "/v1/admin/slots/occupancy", Some(&staff), None).await;
    assert_eq!(occupancy["total"], 2);
    assert_eq!(occupancy["occupied"], 1);
    assert_eq!(occupancy["utilisation"], 0.5);

    let (status, _) = t
        .send("POST", &format!("/v1/admin/bookings/{}/check-out", id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, booking) = t
        .send("POST", &format!("/v1/admin/bookings/{}/cash-payment", id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["payment_status"], "PAID");

    let (status, booking) = t
        .send("POST", &format!("/v1/admin/bookings/{}/check-out", id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "COMPLETED");

    let (_, occupancy) = t.send("GET", "/v1/admin/slots/occupancy", Some(&staff), None).await;
    assert_eq!(occupancy["available"], 2);
}

#[tokio::test]
async fn test_staff_schedule_filters_and_cancel() {
    let t = setup(2, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;
    let (_, created) = t.book(&jo, &vehicle_id, &flight_id, "CASH").await;
    let id = created["booking"]["id"].as_str().unwrap().to_string();
    let staff = t.login(STAFF_EMAIL).await;

    let (status, window) = t
        .send(
            "GET",
            "/v1/admin/schedule?from=2030-06-02T00:00:00Z&to=2030-06-03T00:00:00Z",
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(window.as_array().unwrap().len(), 1);

    let (_, empty) = t
        .send(
            "GET",
            "/v1/admin/schedule?from=2030-07-01T00:00:00Z&to=2030-07-02T00:00:00Z",
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(empty.as_array().unwrap().len(), 0);

    let (status, _) = t
        .send(
            "GET",
            "/v1/admin/schedule?from=2030-07-02T00:00:00Z&to=2030-07-01T00:00:00Z",
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, confirmed) = t
        .send("GET", "/v1/admin/bookings?status=CONFIRMED", Some(&staff), None)
        .await;
    assert_eq!(confirmed.as_array().unwrap().len(), 1);

    let (status, cancelled) = t
        .send("POST", &format!("/v1/admin/bookings/{}/cancel", id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, _) = t
        .send("POST", &format!("/v1/admin/bookings/{}/check-in", id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_slot_administration() {
    let t = setup(3, "").await;
    let staff = t.login(STAFF_EMAIL).await;

    let (status, created) = t
        .send(
            "POST",
            "/v1/admin/slots/bulk",
            Some(&staff),
            Some(json!({ "count": 2, "zone": "B" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let numbers: Vec<i64> = created
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![4, 5]);

    let (status, _) = t
        .send("POST", "/v1/admin/slots/bulk", Some(&staff), Some(json!({ "count": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send("POST", "/v1/admin/slots", Some(&staff), Some(json!({ "number": 4 })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .send("POST", "/v1/admin/slots", Some(&staff), Some(json!({ "number": -1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Reserve slot 1, then try to remove it
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;
    let (_, booking) = t.book(&jo, &vehicle_id, &flight_id, "CASH").await;
    let slot_id = booking["booking"]["parking_slot_id"].as_str().unwrap().to_string();

    let (status, _) = t
        .send("DELETE", &format!("/v1/admin/slots/{}", slot_id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Renaming a held slot keeps its reservation
    let (status, renamed) = t
        .send(
            "PUT",
            &format!("/v1/admin/slots/{}", slot_id),
            Some(&staff),
            Some(json!({ "zone": "VIP" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["zone"], "VIP");
    assert_eq!(renamed["number"], 1);
    assert_eq!(renamed["status"], "RESERVED");

    let spare = created[1]["id"].as_str().unwrap().to_string();
    let (status, moved) = t
        .send(
            "PUT",
            &format!("/v1/admin/slots/{}", spare),
            Some(&staff),
            Some(json!({ "number": 50 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["number"], 50);
    assert_eq!(moved["zone"], "B");

    let (status, _) = t
        .send("DELETE", &format!("/v1/admin/slots/{}", spare), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_bulk_slots_limits() {
    let t = setup(0, "").await;
    let staff = t.login(STAFF_EMAIL).await;

    let (status, _) = t
        .send("POST", "/v1/admin/slots/bulk", Some(&staff), Some(json!({ "count": 501 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = t
        .send("POST", "/v1/admin/slots/bulk", Some(&staff), Some(json!({ "count": 500 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.as_array().unwrap().len(), 500);
    assert_eq!(created[499]["number"], 500);

    // Nothing can be numbered after the highest possible slot
    let (status, _) = t
        .send("POST", "/v1/admin/slots", Some(&staff), Some(json!({ "number": i32::MAX })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = t
        .send("POST", "/v1/admin/slots/bulk", Some(&staff), Some(json!({ "count": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    let (_, slots) = t.send("GET", "/v1/admin/slots", Some(&staff), None).await;
    assert_eq!(slots.as_array().unwrap().len(), 501);
}

#[tokio::test]
async fn test_booking_outage_trips_payment_breaker() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;

    t.card.set_outage(true);
    for _ in 0..5 {
        let (status, _) = t.book(&jo, &vehicle_id, &flight_id, "CARD").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
    let (status, body) = t.book(&jo, &vehicle_id, &flight_id, "CARD").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("payments"));

    // Every failed attempt gave its slot back
    let (_, mine) = t.send("GET", "/v1/bookings", Some(&jo), None).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_tariff_administration() {
    let t = setup(1, "").await;
    let staff = t.login(STAFF_EMAIL).await;

    let (status, valet) = t
        .send(
            "POST",
            "/v1/admin/tariffs",
            Some(&staff),
            Some(json!({
                "kind": "FULL_VALET",
                "name": "Full Valet",
                "daily_rate_pence": 1500,
                "service_fee_pence": 4500,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", valet);
    let valet_id = valet["id"].as_str().unwrap().to_string();

    let (status, _) = t
        .send(
            "POST",
            "/v1/admin/tariffs",
            Some(&staff),
            Some(json!({ "kind": "MINI_VALET", "name": "Mini", "daily_rate_pence": 1500 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = t
        .send(
            "PUT",
            &format!("/v1/admin/tariffs/{}", valet_id),
            Some(&staff),
            Some(json!({
                "kind": "FULL_VALET",
                "name": "Full Valet",
                "daily_rate_pence": 1500,
                "service_fee_pence": 4500,
                "is_active": false,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], false);

    let (_, public) = t.send("GET", "/v1/tariffs", None, None).await;
    assert_eq!(public.as_array().unwrap().len(), 1);
    let (_, all) = t.send("GET", "/v1/admin/tariffs", Some(&staff), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = t
        .send("DELETE", &format!("/v1/admin/tariffs/{}", valet_id), Some(&staff), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_admin_promotes_user() {
    let t = setup(1, "").await;
    t.register("jo@example.com", false).await;
    let admin = t.login(ADMIN_EMAIL).await;

    let (status, users) = t.send("GET", "/v1/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let jo_id = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["email"] == "jo@example.com")
        .map(|u| u["id"].as_str().unwrap().to_string())
        .unwrap();

    let (status, promoted) = t
        .send(
            "PUT",
            &format!("/v1/admin/users/{}/role", jo_id),
            Some(&admin),
            Some(json!({ "role": "STAFF" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "STAFF");

    let jo = t.login("jo@example.com").await;
    let (status, _) = t.send("GET", "/v1/admin/bookings", Some(&jo), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .send(
            "PUT",
            &format!("/v1/admin/users/{}/role", Uuid::new_v4()),
            Some(&admin),
            Some(json!({ "role": "STAFF" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stripe_webhook_reconciles_paid_booking() {
    let t = setup(1, "").await;
    let jo = t.register("jo@example.com", false).await;
    let (vehicle_id, flight_id) = t.trip(&jo, "AB12CDE").await;
    let (_, created) = t.book(&jo, &vehicle_id, &flight_id, "CARD").await;
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();
    let intent_id = created["payment"]["id"].as_str().unwrap().to_string();

    t.send("POST", &format!("/v1/bookings/{}/pay", booking_id), Some(&jo), None).await;

    let event = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id } }
    });
    let (status, body) = t.send("POST", "/v1/webhooks/stripe", None, Some(event.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");
    assert_eq!(body["payment_status"], "PAID");

    // Redelivery changes nothing
    let (status, body) = t.send("POST", "/v1/webhooks/stripe", None, Some(event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "PAID");

    let (status, body) = t
        .send(
            "POST",
            "/v1/webhooks/stripe",
            None,
            Some(json!({
                "id": "evt_2",
                "type": "payment_intent.succeeded",
                "data": { "object": { "id": "pi_unknown" } }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ignored"], true);
}

#[tokio::test]
async fn test_stripe_webhook_requires_valid_signature() {
    let t = setup(1, "whsec_test").await;
    let event = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_1" } }
    });

    let (status, _) = t.send("POST", "/v1/webhooks/stripe", None, Some(event.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/stripe")
        .header("Content-Type", "application/json")
        .header("Stripe-Signature", format!("t={},v1=deadbeef", Utc::now().timestamp()))
        .body(Body::from(event.to_string()))
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_paypal_webhook_ignores_unrelated_events() {
    let t = setup(1, "").await;
    let (status, body) = t
        .send(
            "POST",
            "/v1/webhooks/paypal",
            None,
            Some(json!({ "id": "WH-1", "event_type": "BILLING.PLAN.CREATED", "resource": {} })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ignored"], true);
}
