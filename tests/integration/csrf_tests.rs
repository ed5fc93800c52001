// ===============================
// tests/integration/csrf_tests.rs
// ===============================
//! Anti-forgery checks on state-changing requests
use crate::test_utils::{body_string, cookie_value, location, TestApp, FORM};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};

#[tokio::test]
async fn test_safe_methods_need_no_token() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .get("/recetas/detalle/3", Some(&format!("SESSIONID={}", browser.session)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let head = app
        .send(Request::head("/login").body(Body::empty()).unwrap())
        .await;
    assert_ne!(head.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_must_match_visitor_cookie() {
    let app = TestApp::new().await;
    let victim = app.anonymous_token().await;
    let attacker = app.anonymous_token().await;

    let response = app
        .post_form(
            "/login",
            Some(&format!("XSRF-TOKEN={victim}")),
            &format!("username=chef&password=usuario123&_csrf={attacker}"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(cookie_value(&response, "SESSIONID"), None);
}

#[tokio::test]
async fn test_token_without_cookie_is_rejected() {
    let app = TestApp::new().await;
    let token = app.anonymous_token().await;

    let response = app
        .post_form("/login", None, &format!("username=chef&password=usuario123&_csrf={token}"))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_pre_login_token_stops_working_after_login() {
    let app = TestApp::new().await;
    let anonymous = app.anonymous_token().await;
    let browser = app.login().await;

    let response = app
        .post_form(
            "/logout",
            Some(&format!("SESSIONID={}; XSRF-TOKEN={anonymous}", browser.session)),
            &format!("_csrf={anonymous}"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains("CSRF_001"));

    // The session survived the rejected request
    let me = app.get("/me", Some(&browser.cookie_header())).await;
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_header_token_accepted_without_form() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .send(
            Request::post("/logout")
                .header(header::COOKIE, browser.cookie_header())
                .header("X-XSRF-TOKEN", browser.csrf.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?logout=true");
}

#[tokio::test]
async fn test_non_form_body_without_header_is_rejected() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .send(
            Request::post("/logout")
                .header(header::COOKIE, browser.cookie_header())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(r#"{{"_csrf":"{}"}}"#, browser.csrf)))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_query_string_token_is_ignored() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .send(
            Request::post(format!("/logout?_csrf={}", browser.csrf))
                .header(header::COOKIE, browser.cookie_header())
                .header(header::CONTENT_TYPE, FORM)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_oversized_form_is_refused() {
    let app = TestApp::new().await;
    let token = app.anonymous_token().await;
    let padding = "a".repeat(128 * 1024);

    let response = app
        .post_form(
            "/login",
            Some(&format!("XSRF-TOKEN={token}")),
            &format!("username=chef&password={padding}&_csrf={token}"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(cookie_value(&response, "SESSIONID"), None);
}
