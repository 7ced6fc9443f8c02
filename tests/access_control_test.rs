//! Access-guard behavior across both enforcement points: the edge
//! (cookie-inspecting redirects) and the router (bearer-token 401/403).

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::TestApp;
use consulting_api::auth::Role;
use serde_json::json;
use tower::ServiceExt;

async fn get_with_cookies(
    app: &TestApp,
    uri: &str,
    cookies: Option<&str>,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    app.router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn unauthenticated_edge_request_redirects_to_sign_in_with_callback() {
    let app = TestApp::new().await;

    let response = get_with_cookies(&app, "/dashboard", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/signin?callback=/dashboard");
}

#[tokio::test]
async fn client_role_cookie_is_redirected_off_the_admin_dashboard() {
    let app = TestApp::new().await;

    let response =
        get_with_cookies(&app, "/dashboard/admin", Some("session=tok; role=client")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/unauthorized");
}

#[tokio::test]
async fn staff_role_cookie_reaches_the_staff_dashboard_prefix() {
    let app = TestApp::new().await;

    // No page is mounted there, so passing the guard means reaching the
    // router's own 404 rather than being redirected
    let response =
        get_with_cookies(&app, "/dashboard/staff", Some("session=tok; role=employee")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_role_cookie_never_satisfies_a_role_requirement() {
    let app = TestApp::new().await;

    let response =
        get_with_cookies(&app, "/dashboard/admin", Some("session=tok; role=superuser")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn missing_bearer_token_is_a_401_on_protected_routes() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/orders", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_token_is_forbidden_on_admin_routes() {
    let app = TestApp::new().await;
    let client = app.token_for(Role::Client);

    let response = app
        .request(
            Method::POST,
            "/api/v1/services",
            Some(&client),
            Some(json!({
                "name": "Payroll Setup",
                "description": "Payroll system setup",
                "category": "operations",
                "price": "2999",
                "currency": "INR",
                "billing_type": "one-time"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_token_manages_the_catalog() {
    let app = TestApp::new().await;
    let admin = app.token_for(Role::Admin);

    let response = app
        .request(
            Method::POST,
            "/api/v1/services",
            Some(&admin),
            Some(json!({
                "name": "Payroll Setup",
                "description": "Payroll system setup",
                "category": "operations",
                "price": "2999",
                "currency": "INR",
                "billing_type": "one-time"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn catalog_browsing_is_public() {
    let app = TestApp::new().await;
    app.seed_service("GST Registration", rust_decimal_macros::dec!(4999))
        .await;

    let response = app
        .request(Method::GET, "/api/v1/services", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::response_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deactivated_services_are_hidden_from_public_listings() {
    let app = TestApp::new().await;
    let admin = app.token_for(Role::Admin);
    let service = app
        .seed_service("Trademark Filing", rust_decimal_macros::dec!(7999))
        .await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/services/{}", service.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let listing = app
        .request(Method::GET, "/api/v1/services", None, None)
        .await;
    let body = common::response_json(listing).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Anonymous fetch of the retired entry is a 404; staff still see it
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/services/{}", service.id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/services/{}", service.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cart_routes_belong_to_the_client_role() {
    let app = TestApp::new().await;
    let employee = app.token_for(Role::Employee);
    let client = app.token_for(Role::Client);

    let response = app
        .request(Method::GET, "/api/v1/cart", Some(&employee), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(Method::GET, "/api/v1/cart", Some(&client), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn assignment_is_reserved_for_managers_and_admins() {
    let app = TestApp::new().await;
    let client = app.token_for(Role::Client);
    let employee = app.token_for(Role::Employee);
    let manager = app.token_for(Role::Manager);

    let service = app
        .seed_service("Compliance Review", rust_decimal_macros::dec!(9999))
        .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&client),
            Some(json!({
                "service_id": service.id,
                "amount": "1000",
                "currency": "INR"
            })),
        )
        .await;
    let body = common::expect_json(response, StatusCode::CREATED).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let assign = json!({"assigned_to": uuid::Uuid::new_v4()});

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/assign", order_id),
            Some(&employee),
            Some(assign.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/assign", order_id),
            Some(&manager),
            Some(assign),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}
