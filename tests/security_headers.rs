#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App, HttpResponse};
use anywhere::SecurityHeaders;
use common::TestEnv;

macro_rules! app_with {
    ($env:expr, $sec:expr) => {
        test::init_service(
            App::new()
                .wrap($sec)
                .app_data(web::Data::new($env.state.clone()))
                .configure(anywhere::config)
                .route("/docs/index.html", web::get().to(|| async { HttpResponse::Ok().body("<html></html>") }))
                .route(
                    "/custom",
                    web::get().to(|| async {
                        HttpResponse::Ok()
                            .insert_header((actix_web::http::header::CONTENT_SECURITY_POLICY, "custom-src 'none'"))
                            .finish()
                    }),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn baseline_headers_present() {
    let env = TestEnv::new();
    let app = app_with!(env, SecurityHeaders::default());
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert!(headers.get("content-security-policy").is_some());
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}

#[actix_web::test]
async fn errors_carry_headers_too() {
    let env = TestEnv::new();
    let app = app_with!(env, SecurityHeaders::default());
    let req = test::TestRequest::get().uri("/api/locations/4242").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");
}

#[actix_web::test]
async fn hsts_only_when_enabled() {
    let env = TestEnv::new();
    let app = app_with!(env, SecurityHeaders::new(true));
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    let hsts = resp.headers().get("strict-transport-security").expect("HSTS header missing");
    assert!(hsts.to_str().unwrap().starts_with("max-age="));
}

#[actix_web::test]
async fn docs_skip_csp() {
    let env = TestEnv::new();
    let app = app_with!(env, SecurityHeaders::default());
    let req = test::TestRequest::get().uri("/docs/index.html").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(resp.headers().get("content-security-policy").is_none());
    assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
}

#[actix_web::test]
async fn existing_csp_header_preserved() {
    let env = TestEnv::new();
    let app = app_with!(env, SecurityHeaders::default());
    let req = test::TestRequest::get().uri("/custom").to_request();
    let resp = test::call_service(&app, req).await;
    let csp = resp.headers().get("content-security-policy").unwrap().to_str().unwrap();
    assert_eq!(csp, "custom-src 'none'");
}
