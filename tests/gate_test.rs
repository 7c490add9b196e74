//! Role gate tests — the pure gate decision table plus the session
//! middleware's redirect behavior for anonymous requests.

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpResponse, cookie::Key, web};

use acadoc::auth::gate::{GateDecision, evaluate};
use acadoc::auth::middleware::require_auth;
use acadoc::models::role::Role;

#[test]
fn gate_challenges_without_a_user() {
    assert_eq!(evaluate(None, &[Role::Admin]), GateDecision::Challenge);
    assert_eq!(evaluate(None, &[]), GateDecision::Challenge);
}

#[test]
fn gate_denies_on_role_mismatch() {
    assert_eq!(
        evaluate(Some(Role::Student), &[Role::Admin, Role::Teacher]),
        GateDecision::Deny
    );
    assert_eq!(
        evaluate(Some(Role::Language), &[Role::Admin]),
        GateDecision::Deny
    );
}

#[test]
fn gate_allows_permitted_roles() {
    assert_eq!(
        evaluate(Some(Role::Teacher), &[Role::Admin, Role::Teacher]),
        GateDecision::Allow
    );
    // Empty allowed set admits any authenticated user
    assert_eq!(evaluate(Some(Role::Student), &[]), GateDecision::Allow);
}

#[actix_web::test]
async fn anonymous_request_redirects_to_login() {
    let session_mw =
        SessionMiddleware::builder(CookieSessionStore::default(), Key::generate()).build();

    let app = actix_web::test::init_service(
        App::new()
            .wrap(session_mw)
            .route("/login", web::get().to(|| async { HttpResponse::Ok().body("login") }))
            .service(
                web::scope("")
                    .wrap(actix_web::middleware::from_fn(require_auth))
                    .route(
                        "/dashboard",
                        web::get().to(|| async { HttpResponse::Ok().body("dashboard") }),
                    ),
            ),
    )
    .await;

    let resp = actix_web::test::call_service(&app, actix_web::test::TestRequest::get().uri("/dashboard").to_request()).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::SEE_OTHER);
    let location = resp
        .headers()
        .get("Location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert_eq!(location, "/login");
}

#[actix_web::test]
async fn public_routes_bypass_the_gate() {
    let session_mw =
        SessionMiddleware::builder(CookieSessionStore::default(), Key::generate()).build();

    let app = actix_web::test::init_service(
        App::new()
            .wrap(session_mw)
            .route("/login", web::get().to(|| async { HttpResponse::Ok().body("login") }))
            .service(
                web::scope("")
                    .wrap(actix_web::middleware::from_fn(require_auth))
                    .route(
                        "/dashboard",
                        web::get().to(|| async { HttpResponse::Ok().body("dashboard") }),
                    ),
            ),
    )
    .await;

    let resp = actix_web::test::call_service(&app, actix_web::test::TestRequest::get().uri("/login").to_request()).await;
    assert!(resp.status().is_success());
}
