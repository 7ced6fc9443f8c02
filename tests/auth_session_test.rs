//! Token issuance, refresh, and the session/role cookie endpoint feeding the
//! edge-level guard.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{expect_json, TestApp};
use consulting_api::auth::Role;
use serde_json::json;

#[tokio::test]
async fn login_issues_a_working_token_pair() {
    let app = TestApp::new().await;
    app.seed_user("asha@client.example", "correct horse battery staple", Role::Client)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({
                "email": "asha@client.example",
                "password": "correct horse battery staple"
            })),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    let access_token = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh_token = body["data"]["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["token_type"], "Bearer");

    // The access token opens protected routes
    let response = app
        .request(Method::GET, "/api/v1/orders", Some(&access_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The refresh token mints a fresh pair but is not an access token
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({"refresh_token": refresh_token})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/orders", Some(&refresh_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_and_unknown_account_are_indistinguishable() {
    let app = TestApp::new().await;
    app.seed_user("asha@client.example", "correct horse battery staple", Role::Client)
        .await;

    for (email, password) in [
        ("asha@client.example", "wrong password"),
        ("nobody@client.example", "correct horse battery staple"),
    ] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"email": email, "password": password})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = common::response_json(response).await;
        assert_eq!(body["message"], "Unauthorized: Invalid credentials");
    }
}

#[tokio::test]
async fn inactive_accounts_cannot_log_in() {
    use consulting_api::entities::user;
    use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

    let app = TestApp::new().await;
    app.seed_user("asha@client.example", "correct horse battery staple", Role::Client)
        .await;

    let account = user::Entity::find()
        .filter(user::Column::Email.eq("asha@client.example"))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut am: user::ActiveModel = account.into();
    am.is_active = Set(false);
    am.update(&*app.state.db).await.unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({
                "email": "asha@client.example",
                "password": "correct horse battery staple"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_endpoint_sets_and_clears_the_cookie_pair() {
    let app = TestApp::new().await;
    let token = app.token_for(Role::Employee);

    let response = app
        .request(Method::POST, "/api/v1/auth/session", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    assert_eq!(cookies.len(), 2);

    let session = cookies
        .iter()
        .find(|c| c.starts_with("session="))
        .expect("session cookie set");
    assert!(session.contains("HttpOnly"));
    // 7 days
    assert!(session.contains("Max-Age=604800"));

    let role = cookies
        .iter()
        .find(|c| c.starts_with("role="))
        .expect("role cookie set");
    assert!(role.starts_with("role=employee"));
    assert!(!role.contains("HttpOnly"));

    // Clearing resets both cookies
    let response = app
        .request(Method::DELETE, "/api/v1/auth/session", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let removals: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    assert_eq!(removals.len(), 2);
    for removal in removals {
        assert!(removal.contains("Max-Age=0"));
    }
}

#[tokio::test]
async fn session_endpoint_rejects_missing_and_invalid_tokens() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/auth/session", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/session",
            Some("not-a-jwt"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
