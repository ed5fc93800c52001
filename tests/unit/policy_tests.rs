// ==========================
// tests/unit/policy_tests.rs
// ==========================
//! Access decisions over the catalog's shipped route table
use axum::http::Method;
use recipe_backend_lib::config::default_routes;
use recipe_backend_lib::identity::Principal;
use recipe_backend_lib::policy::{Decision, RoutePolicy};
use recipe_common::RouteRule;

fn catalog_policy() -> RoutePolicy {
    RoutePolicy::from_rules(&default_routes()).unwrap()
}

fn chef() -> Principal {
    Principal {
        username: "chef".to_string(),
        roles: ["ROLE_USER".to_string()].into(),
        session_id: "sid".to_string(),
    }
}

#[test]
fn test_browsing_and_search_are_public() {
    let policy = catalog_policy();
    for path in [
        "/",
        "/home",
        "/index",
        "/buscar",
        "/recetas/buscar",
        "/login",
        "/error",
        "/css/site.css",
        "/js/app.js",
        "/images/paella.jpg",
        "/webjars/bootstrap/5.3.0/css/bootstrap.min.css",
        "/favicon.ico",
    ] {
        assert_eq!(policy.decide(path, &Method::GET, None), Decision::Allow, "{path}");
    }
}

#[test]
fn test_recipe_detail_needs_login() {
    let policy = catalog_policy();
    assert_eq!(
        policy.decide("/recetas/detalle/42", &Method::GET, None),
        Decision::RequireLogin
    );
    assert_eq!(
        policy.decide("/recetas/detalle/42", &Method::GET, Some(&chef())),
        Decision::Allow
    );
}

#[test]
fn test_unlisted_paths_fail_closed() {
    let policy = catalog_policy();
    for path in ["/recetas", "/recetas/nueva", "/admin", "/me", "/logout"] {
        assert_eq!(policy.decide(path, &Method::GET, None), Decision::RequireLogin, "{path}");
    }
}

#[test]
fn test_dot_segments_never_reach_public_rule() {
    let policy = catalog_policy();
    for path in [
        "//login",
        "/css/../login",
        "/perfil/..",
        "/recetas/detalle/1/../../buscar",
        "/recetas/detalle/x/./../../recetas/buscar",
    ] {
        assert_eq!(policy.decide(path, &Method::GET, None), Decision::RequireLogin, "{path}");
    }

    // A session still opens them, as with any unlisted path
    assert_eq!(
        policy.decide("/recetas/detalle/1/../../buscar", &Method::GET, Some(&chef())),
        Decision::Allow
    );
}

#[test]
fn test_traversal_out_of_public_prefix_needs_login() {
    let policy = catalog_policy();
    for path in [
        "/css/../recetas/detalle/1",
        "/css/..%2frecetas/detalle/1",
        "/css/%2e%2e/recetas/detalle/1",
        "/images/..%5Crecetas/detalle/1",
        "/js/..\\recetas\\detalle\\1",
    ] {
        assert_eq!(policy.decide(path, &Method::GET, None), Decision::RequireLogin, "{path}");
    }
}

#[test]
fn test_trailing_slash_does_not_widen_exact_rule() {
    let policy = catalog_policy();
    assert_eq!(policy.decide("/login/", &Method::GET, None), Decision::RequireLogin);
}

#[test]
fn test_first_matching_rule_wins() {
    let mut rules = vec![RouteRule::public("/recetas/detalle/muestra")];
    rules.extend(default_routes());
    let policy = RoutePolicy::from_rules(&rules).unwrap();

    assert_eq!(
        policy.decide("/recetas/detalle/muestra", &Method::GET, None),
        Decision::Allow
    );
    assert_eq!(
        policy.decide("/recetas/detalle/1", &Method::GET, None),
        Decision::RequireLogin
    );
}

#[test]
fn test_role_rule_denies_principal_without_role() {
    let mut rules = default_routes();
    let mut admin = RouteRule::requires_auth("/admin/**");
    admin.roles = vec!["ROLE_ADMIN".to_string()];
    rules.push(admin);
    let policy = RoutePolicy::from_rules(&rules).unwrap();

    assert_eq!(policy.decide("/admin/panel", &Method::GET, None), Decision::RequireLogin);
    assert_eq!(policy.decide("/admin/panel", &Method::GET, Some(&chef())), Decision::Deny);

    let mut admin = chef();
    admin.roles.insert("ROLE_ADMIN".to_string());
    assert_eq!(policy.decide("/admin/panel", &Method::GET, Some(&admin)), Decision::Allow);
}

#[test]
fn test_catalog_table_rejects_duplicate_entry() {
    let mut rules = default_routes();
    rules.push(RouteRule::public("/login"));
    assert!(RoutePolicy::from_rules(&rules).is_err());

    let mut rules = default_routes();
    rules.push(RouteRule::requires_auth("/login"));
    assert!(RoutePolicy::from_rules(&rules).is_err());
}
