// ====================================
// tests/integration/auth_flow_tests.rs
// ====================================
//! Login, session and logout flows driven through the full router
use crate::test_utils::{
    body_string, cookie_value, location, set_cookie_line, test_settings, Browser, TestApp, PASSWORD,
    USERNAME,
};
use axum::http::{header, StatusCode};
use recipe_backend_lib::storage::CredentialStore;
use recipe_common::RouteRule;
use std::time::Duration;

async fn detail(app: &TestApp, browser: &Browser) -> axum::response::Response {
    app.get("/recetas/detalle/1", Some(&browser.cookie_header())).await
}

#[tokio::test]
async fn test_login_grants_access_to_protected_page() {
    let app = TestApp::new().await;

    let anonymous = app.get("/recetas/detalle/1", None).await;
    assert_eq!(anonymous.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&anonymous), "/login");

    let response = app.attempt_login(USERNAME, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let line = set_cookie_line(&response, "SESSIONID").unwrap();
    assert!(line.contains("HttpOnly"));
    assert!(line.contains("SameSite=Strict"));
    assert!(line.contains("Path=/"));

    let browser = Browser {
        session: cookie_value(&response, "SESSIONID").unwrap(),
        csrf: cookie_value(&response, "XSRF-TOKEN").unwrap(),
    };
    let page = detail(&app, &browser).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(body_string(page).await, "detalle");
}

#[tokio::test]
async fn test_login_rotates_csrf_token() {
    let app = TestApp::new().await;
    let anonymous = app.anonymous_token().await;
    let browser = app.login().await;

    assert_ne!(browser.csrf, anonymous);
    assert_ne!(browser.session, browser.csrf);
}

#[tokio::test]
async fn test_failed_logins_are_indistinguishable() {
    let app = TestApp::new().await;
    let csrf = app.anonymous_token().await;
    let cookies = format!("XSRF-TOKEN={csrf}");

    let wrong_password = app
        .post_form(
            "/login",
            Some(&cookies),
            &format!("username=chef&password=incorrecta&_csrf={csrf}"),
        )
        .await;
    let unknown_user = app
        .post_form(
            "/login",
            Some(&cookies),
            &format!("username=nadie&password=incorrecta&_csrf={csrf}"),
        )
        .await;

    assert_eq!(wrong_password.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&wrong_password), "/login?error=true");
    assert_eq!(cookie_value(&wrong_password, "SESSIONID"), None);

    assert_eq!(unknown_user.status(), wrong_password.status());
    assert_eq!(unknown_user.headers(), wrong_password.headers());
    assert_eq!(body_string(unknown_user).await, body_string(wrong_password).await);
}

#[tokio::test]
async fn test_empty_and_missing_fields_fail_like_bad_credentials() {
    let app = TestApp::new().await;
    let csrf = app.anonymous_token().await;
    let cookies = format!("XSRF-TOKEN={csrf}");

    for form in [
        format!("username=&password=&_csrf={csrf}"),
        format!("username=chef&_csrf={csrf}"),
        format!("_csrf={csrf}"),
    ] {
        let response = app.post_form("/login", Some(&cookies), &form).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{form}");
        assert_eq!(location(&response), "/login?error=true");
        assert_eq!(cookie_value(&response, "SESSIONID"), None);
    }
}

#[tokio::test]
async fn test_post_without_csrf_field_changes_nothing() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .post_form(
            "/account/password",
            Some(&browser.cookie_header()),
            "current_password=usuario123&new_password=Receta2024Nueva",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains("CSRF_001"));

    // Neither the session nor the password moved
    assert_eq!(detail(&app, &browser).await.status(), StatusCode::OK);
    app.login_as(USERNAME, PASSWORD).await;
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .post_form(
            "/logout",
            Some(&browser.cookie_header()),
            &format!("_csrf={}", browser.csrf),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?logout=true");
    let cleared = set_cookie_line(&response, "SESSIONID").unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert_ne!(cookie_value(&response, "XSRF-TOKEN").unwrap(), browser.csrf);

    let after = detail(&app, &browser).await;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&after), "/login");
    assert_eq!(app.state.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_second_login_ends_first_session() {
    let app = TestApp::new().await;
    let first = app.login().await;
    let second = app.login().await;

    assert_ne!(first.session, second.session);
    assert_eq!(detail(&app, &second).await.status(), StatusCode::OK);

    let stale = detail(&app, &first).await;
    assert_eq!(stale.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&stale), "/login");
    assert!(set_cookie_line(&stale, "SESSIONID").unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_idle_and_absolute_expiry() {
    let app = TestApp::new().await;

    let browser = app.login().await;
    app.clock.advance(Duration::from_secs(29 * 60));
    assert_eq!(detail(&app, &browser).await.status(), StatusCode::OK);
    app.clock.advance(Duration::from_secs(31 * 60));
    assert_eq!(detail(&app, &browser).await.status(), StatusCode::SEE_OTHER);

    let browser = app.login().await;
    for _ in 0..16 {
        app.clock.advance(Duration::from_secs(29 * 60));
        assert_eq!(detail(&app, &browser).await.status(), StatusCode::OK);
    }
    // 8h of continuous activity ends the session anyway
    app.clock.advance(Duration::from_secs(29 * 60));
    assert_eq!(detail(&app, &browser).await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_repeated_failures_lock_out_client() {
    let app = TestApp::new().await;

    for _ in 0..5 {
        let response = app.attempt_login(USERNAME, "incorrecta").await;
        assert_eq!(location(&response), "/login?error=true");
    }

    // Correct credentials during the lockout look like any other failure
    let locked = app.attempt_login(USERNAME, PASSWORD).await;
    assert_eq!(locked.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&locked), "/login?error=true");
    assert_eq!(cookie_value(&locked, "SESSIONID"), None);
}

#[tokio::test]
async fn test_password_change_rotates_session() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .post_form(
            "/account/password",
            Some(&browser.cookie_header()),
            &format!(
                "current_password=usuario123&new_password=Receta2024Nueva&_csrf={}",
                browser.csrf
            ),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let rotated = Browser {
        session: cookie_value(&response, "SESSIONID").unwrap(),
        csrf: cookie_value(&response, "XSRF-TOKEN").unwrap(),
    };
    assert_ne!(rotated.session, browser.session);
    assert_eq!(detail(&app, &browser).await.status(), StatusCode::SEE_OTHER);
    assert_eq!(detail(&app, &rotated).await.status(), StatusCode::OK);

    let old = app.attempt_login(USERNAME, PASSWORD).await;
    assert_eq!(location(&old), "/login?error=true");
    app.login_as(USERNAME, "Receta2024Nueva").await;
}

#[tokio::test]
async fn test_password_change_rejects_wrong_current_or_weak_new() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    for form in [
        "current_password=incorrecta&new_password=Receta2024Nueva",
        "current_password=usuario123&new_password=corta",
    ] {
        let response = app
            .post_form(
                "/account/password",
                Some(&browser.cookie_header()),
                &format!("{form}&_csrf={}", browser.csrf),
            )
            .await;
        assert_eq!(location(&response), "/account/password?error=true", "{form}");
        assert_eq!(cookie_value(&response, "SESSIONID"), None);
    }

    assert_eq!(detail(&app, &browser).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disabling_account_ends_its_session() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    app.store.set_enabled(USERNAME, false).await.unwrap();
    let response = detail(&app, &browser).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let again = app.attempt_login(USERNAME, PASSWORD).await;
    assert_eq!(location(&again), "/login?error=true");
}

#[tokio::test]
async fn test_role_changes_apply_to_live_session() {
    let mut settings = test_settings();
    let mut admin = RouteRule::requires_auth("/admin/**");
    admin.roles = vec!["ROLE_ADMIN".to_string()];
    settings.routes.push(admin);

    let app = TestApp::with_settings(settings).await;
    let browser = app.login().await;
    let denied = app.get("/admin/panel", Some(&browser.cookie_header())).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    app.store
        .assign_roles(USERNAME, &["ROLE_USER".to_string(), "ROLE_ADMIN".to_string()])
        .await
        .unwrap();
    let allowed = app.get("/admin/panel", Some(&browser.cookie_header())).await;
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_public_pages_need_no_session() {
    let app = TestApp::new().await;

    for path in ["/", "/recetas/buscar"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    let unknown = app.get("/no/existe", None).await;
    assert_eq!(unknown.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&unknown), "/login");
}

#[tokio::test]
async fn test_encoded_traversal_redirects_to_login() {
    let app = TestApp::new().await;

    for path in ["/css/..%2frecetas/detalle/1", "/images/%2e%2e/recetas/detalle/1"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/login");
    }
}

#[tokio::test]
async fn test_dot_segments_redirect_to_login() {
    let app = TestApp::new().await;

    // Each of these resolves to a public page but dispatches to a protected handler
    for path in [
        "/perfil/..",
        "/perfil/.",
        "/recetas/detalle/x/../../buscar",
        "//recetas/detalle/1",
    ] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/login", "{path}");
    }
}

#[tokio::test]
async fn test_dot_segment_detail_is_not_cacheable() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app
        .get("/recetas/detalle/x/../../buscar", Some(&browser.cookie_header()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate, max-age=0"
    );
    assert_eq!(body_string(response).await, "detalle");

    let anonymous = app.get("/recetas/detalle/x/../../buscar", None).await;
    assert_eq!(
        anonymous.headers()[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate, max-age=0"
    );
}

#[tokio::test]
async fn test_me_reports_principal() {
    let app = TestApp::new().await;
    let browser = app.login().await;

    let response = app.get("/me", Some(&browser.cookie_header())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate, max-age=0"
    );

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["username"], USERNAME);
    assert_eq!(json["roles"], serde_json::json!(["ROLE_USER"]));
}
