//! Router-level tests for the order lifecycle: creation, reads and ownership
//! narrowing, staff transitions, and client cancellation.

mod common;

use axum::http::{Method, StatusCode};
use common::{expect_json, TestApp};
use consulting_api::auth::Role;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

async fn create_order(app: &TestApp, token: &str) -> serde_json::Value {
    let service = app.seed_service("GST Registration", dec!(4999)).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(token),
            Some(json!({
                "service_id": service.id,
                "amount": "1000",
                "currency": "INR"
            })),
        )
        .await;
    expect_json(response, StatusCode::CREATED).await
}

#[tokio::test]
async fn created_order_starts_pending_with_one_timeline_entry() {
    let app = TestApp::new().await;
    let client = Uuid::new_v4();
    let token = app.token_for_user(client, Role::Client);

    let body = create_order(&app, &token).await;
    let order = &body["data"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(order["payment_verified"], false);
    assert_eq!(order["client_id"], json!(client));
    assert!(order["order_number"]
        .as_str()
        .unwrap()
        .starts_with("ORD-"));

    let order_id = order["id"].as_str().unwrap();

    // Fetch it back and walk the timeline
    let fetched = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&token),
            None,
        )
        .await;
    let fetched = expect_json(fetched, StatusCode::OK).await;
    assert_eq!(fetched["data"]["status"], "pending");

    let timeline = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/timeline", order_id),
            Some(&token),
            None,
        )
        .await;
    let timeline = expect_json(timeline, StatusCode::OK).await;
    let entries = timeline["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], "Order created");
}

#[tokio::test]
async fn non_positive_and_malformed_amounts_are_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for(Role::Client);
    let service = app.seed_service("Trademark Filing", dec!(7999)).await;

    for amount in ["0", "-10"] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/orders",
                Some(&token),
                Some(json!({
                    "service_id": service.id,
                    "amount": amount,
                    "currency": "INR"
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // Non-numeric amount fails deserialization outright
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "service_id": service.id,
                "amount": "not-a-number",
                "currency": "INR"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_service_is_a_404() {
    let app = TestApp::new().await;
    let token = app.token_for(Role::Client);

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "service_id": Uuid::new_v4(),
                "amount": "1000",
                "currency": "INR"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clients_cannot_read_each_others_orders() {
    let app = TestApp::new().await;
    let alice = app.token_for(Role::Client);
    let bob = app.token_for(Role::Client);

    let body = create_order(&app, &alice).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Staff see every order
    let employee = app.token_for(Role::Employee);
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&employee),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn staff_status_update_appends_a_timeline_entry() {
    let app = TestApp::new().await;
    let client = app.token_for(Role::Client);
    let employee = app.token_for(Role::Employee);

    let body = create_order(&app, &client).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(&employee),
            Some(json!({"status": "in-progress", "message": "Kickoff complete"})),
        )
        .await;
    let updated = expect_json(response, StatusCode::OK).await;
    assert_eq!(updated["data"]["status"], "in-progress");

    let timeline = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/timeline", order_id),
            Some(&client),
            None,
        )
        .await;
    let timeline = expect_json(timeline, StatusCode::OK).await;
    let entries = timeline["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[1]["message"]
        .as_str()
        .unwrap()
        .contains("Kickoff complete"));
}

#[tokio::test]
async fn clients_cannot_drive_staff_transitions() {
    let app = TestApp::new().await;
    let client = app.token_for(Role::Client);

    let body = create_order(&app, &client).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(&client),
            Some(json!({"status": "completed"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cancellation_requires_a_reason_and_is_terminal() {
    let app = TestApp::new().await;
    let client = Uuid::new_v4();
    let token = app.token_for_user(client, Role::Client);

    let body = create_order(&app, &token).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // "other" without detail is rejected
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(&token),
            Some(json!({"reason": "other"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(&token),
            Some(json!({"reason": "budget-constraints"})),
        )
        .await;
    let cancelled = expect_json(response, StatusCode::OK).await;
    assert_eq!(cancelled["data"]["status"], "cancelled");
    assert_eq!(
        cancelled["data"]["cancellation_reason"],
        "budget-constraints"
    );

    // Cancelling twice is rejected
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(&token),
            Some(json!({"reason": "budget-constraints"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_listing_is_scoped_to_the_caller() {
    let app = TestApp::new().await;
    let alice = app.token_for(Role::Client);
    let bob = app.token_for(Role::Client);

    create_order(&app, &alice).await;
    create_order(&app, &bob).await;

    let response = app
        .request(Method::GET, "/api/v1/orders", Some(&alice), None)
        .await;
    let listing = expect_json(response, StatusCode::OK).await;
    assert_eq!(listing["data"]["total"], 1);

    let manager = app.token_for(Role::Manager);
    let response = app
        .request(Method::GET, "/api/v1/orders", Some(&manager), None)
        .await;
    let listing = expect_json(response, StatusCode::OK).await;
    assert_eq!(listing["data"]["total"], 2);
}

#[tokio::test]
async fn order_is_reachable_by_its_public_number() {
    let app = TestApp::new().await;
    let token = app.token_for(Role::Client);

    let body = create_order(&app, &token).await;
    let order_number = body["data"]["order_number"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/by-number/{}", order_number),
            Some(&token),
            None,
        )
        .await;
    let fetched = expect_json(response, StatusCode::OK).await;
    assert_eq!(fetched["data"]["order_number"], order_number.as_str());
}
