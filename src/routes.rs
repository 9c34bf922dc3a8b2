use crate::{
    api::{admin, attendance, device, me, notifications, roles, zones},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("non-zero period and burst size");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(web::resource("/me").route(web::get().to(me::me)))
            .service(
                web::resource("/me/notification-settings")
                    .route(web::put().to(me::update_notification_settings)),
            )
            .service(
                web::scope("/device")
                    .service(web::resource("/location").route(web::post().to(device::report_location)))
                    .service(web::resource("/permission").route(web::post().to(device::report_permission))),
            )
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::check_in))
                            .route(web::put().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/manual-checkout").route(web::post().to(attendance::manual_checkout)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/history").route(web::get().to(attendance::history))),
            )
            .service(web::resource("/zones").route(web::get().to(zones::my_zones)))
            .service(
                web::scope("/notifications")
                    .service(web::resource("").route(web::get().to(notifications::list_notifications)))
                    .service(web::resource("/{id}/read").route(web::put().to(notifications::mark_read))),
            )
            .service(
                web::scope("/role-requests")
                    .service(web::resource("").route(web::post().to(roles::request_admin_role)))
                    .service(web::resource("/status").route(web::get().to(roles::role_request_status))),
            )
            .service(
                web::scope("/admin")
                    .service(web::resource("/employees").route(web::get().to(admin::list_employees)))
                    // /admin/employees/{id}/zones
                    .service(
                        web::resource("/employees/{id}/zones")
                            .route(web::get().to(admin::list_zones))
                            .route(web::post().to(admin::assign_zone)),
                    )
                    .service(
                        web::resource("/employees/{id}/zones/{zone_id}")
                            .route(web::delete().to(admin::remove_zone)),
                    )
                    .service(web::resource("/users/{id}/role").route(web::put().to(admin::change_role)))
                    .service(
                        web::resource("/attendance")
                            .route(web::get().to(admin::list_attendance))
                            .route(web::delete().to(admin::clear_attendance)),
                    )
                    .service(
                        web::resource("/presence")
                            .route(web::get().to(admin::list_presence))
                            .route(web::delete().to(admin::clear_presence)),
                    )
                    .service(
                        web::resource("/role-requests").route(web::get().to(admin::pending_role_requests)),
                    )
                    .service(
                        web::resource("/role-requests/{id}/approve")
                            .route(web::post().to(admin::approve_role_request)),
                    )
                    .service(
                        web::resource("/role-requests/{id}/reject")
                            .route(web::post().to(admin::reject_role_request)),
                    )
                    .service(web::resource("/invitations").route(web::post().to(admin::invite_admin)))
                    .service(web::resource("/audit-logs").route(web::get().to(admin::audit_logs))),
            ),
    );
}

// LOGIN
//  └─ access_token (1 day); employees also get an attendance session

// API REQUEST
//  └─ Authorization: Bearer access_token

// LOGOUT
//  └─ stops the attendance session

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::storage::MemoryStore;
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web::Data};
    use serde_json::{Value, json};

    fn peer() -> std::net::SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    macro_rules! send {
        ($app:expr, $req:expr $(,)?) => {{
            let resp = test::call_service($app, $req.peer_addr(peer()).to_request()).await;
            let status = resp.status();
            let body = test::read_body(resp).await;
            let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            (status, json)
        }};
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn employee_day_through_the_api() {
        let config = Config::for_tests();
        let state = AppState::new(std::sync::Arc::new(MemoryStore::new()), &config);
        let app = test::init_service(
            App::new()
                .app_data(Data::new(state))
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, config.clone())),
        )
        .await;

        // first account seeds the admin
        for (email, name) in [("boss@company.com", "Boss"), ("jane@company.com", "Jane")] {
            let (status, _) = send!(
                &app,
                test::TestRequest::post()
                    .uri("/auth/register")
                    .set_json(json!({"email": email, "password": "pw", "name": name})),
            );
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, _) = send!(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .set_json(json!({"email": "JANE@company.com", "password": "pw", "name": "Again"})),
        );
        assert_eq!(status, StatusCode::CONFLICT);

        let mut tokens = Vec::new();
        let mut ids = Vec::new();
        for email in ["boss@company.com", "jane@company.com"] {
            let (status, body) = send!(
                &app,
                test::TestRequest::post()
                    .uri("/auth/login")
                    .set_json(json!({"email": email, "password": "pw"})),
            );
            assert_eq!(status, StatusCode::OK);
            tokens.push(body["access_token"].as_str().unwrap().to_string());
            ids.push(body["user"]["id"].as_str().unwrap().to_string());
        }
        let (admin, employee) = (&tokens[0], &tokens[1]);
        let employee_id = &ids[1];

        let (status, _) = send!(&app, test::TestRequest::get().uri("/api/me"));
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // no zone yet: an expected refusal, not an error
        let (status, body) = send!(
            &app,
            test::TestRequest::post()
                .uri("/api/device/location")
                .insert_header(bearer(employee))
                .set_json(json!({"latitude": 37.0, "longitude": -122.0})),
        );
        assert_eq!(status, StatusCode::ACCEPTED, "{}", body);
        let (status, body) = send!(
            &app,
            test::TestRequest::post().uri("/api/attendance").insert_header(bearer(employee)),
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "no_action");
        assert_eq!(body["reason"], "no geofence assigned");

        let (status, _) = send!(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/admin/employees/{}/zones", employee_id))
                .insert_header(bearer(employee))
                .set_json(json!({"name": "Office", "latitude": 37.0, "longitude": -122.0, "radius": 100.0})),
        );
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send!(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/admin/employees/{}/zones", employee_id))
                .insert_header(bearer(admin))
                .set_json(json!({"name": "Office", "latitude": 37.0, "longitude": -122.0, "radius": 100.0})),
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (_, body) = send!(
            &app,
            test::TestRequest::post().uri("/api/attendance").insert_header(bearer(employee)),
        );
        assert_eq!(body["action"], "checked_in");
        assert!(body["record"]["checkOutTime"].is_null());

        let (_, body) = send!(
            &app,
            test::TestRequest::get().uri("/api/attendance/today").insert_header(bearer(employee)),
        );
        assert_eq!(body["state"], "CHECKED_IN");
        assert_eq!(body["canCheckOut"], true);

        let (_, body) = send!(
            &app,
            test::TestRequest::post()
                .uri("/api/attendance/manual-checkout")
                .insert_header(bearer(employee)),
        );
        assert_eq!(body["action"], "checked_out");
        assert_eq!(body["record"]["manualCheckout"], true);

        let (_, body) = send!(
            &app,
            test::TestRequest::put().uri("/api/attendance").insert_header(bearer(employee)),
        );
        assert_eq!(body["action"], "no_action");
        assert_eq!(body["reason"], "daily attendance completed");

        let (status, _) = send!(
            &app,
            test::TestRequest::get().uri("/api/admin/attendance").insert_header(bearer(employee)),
        );
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send!(
            &app,
            test::TestRequest::get().uri("/api/admin/attendance").insert_header(bearer(admin)),
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, body) = send!(
            &app,
            test::TestRequest::post().uri("/api/attendance").insert_header(bearer(admin)),
        );
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "only employees can record attendance");

        let (status, _) = send!(
            &app,
            test::TestRequest::post().uri("/auth/logout").insert_header(bearer(employee)),
        );
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn invitation_registers_an_admin() {
        let config = Config::for_tests();
        let state = AppState::new(std::sync::Arc::new(MemoryStore::new()), &config);
        let app = test::init_service(
            App::new()
                .app_data(Data::new(state))
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, config.clone())),
        )
        .await;

        send!(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .set_json(json!({"email": "boss@company.com", "password": "pw", "name": "Boss"})),
        );
        let (_, body) = send!(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .set_json(json!({"email": "boss@company.com", "password": "pw"})),
        );
        let admin = body["access_token"].as_str().unwrap().to_string();

        let (status, body) = send!(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/invitations")
                .insert_header(bearer(&admin))
                .set_json(json!({"email": "second@company.com"})),
        );
        assert_eq!(status, StatusCode::CREATED);
        let invite = body["token"].as_str().unwrap().to_string();

        // an invitation is not an access token
        let (status, _) = send!(&app, test::TestRequest::get().uri("/api/me").insert_header(bearer(&invite)));
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send!(
            &app,
            test::TestRequest::post().uri("/auth/register").set_json(json!({
                "email": "second@company.com",
                "password": "pw",
                "name": "Second",
                "invite_token": invite,
            })),
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["role"], "admin");
    }
}
