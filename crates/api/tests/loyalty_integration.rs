//! Integration tests for the fidelity program endpoints.
//!
//! Requires a PostgreSQL database; see `common::create_test_pool`.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Helpers
// ============================================================================

fn visit_body(price: i64, method: &str) -> serde_json::Value {
    json!({
        "appointment_id": Uuid::new_v4(),
        "total_price": price,
        "payment_method": method,
    })
}

async fn post_visit(
    app: &axum::Router,
    client_id: Uuid,
    body: serde_json::Value,
    api_key: &str,
) -> (StatusCode, serde_json::Value) {
    let request = common::json_request_with_api_key(
        Method::POST,
        &format!("/api/v1/clients/{}/loyalty/visits", client_id),
        body,
        api_key,
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, common::parse_response_body(response).await)
}

// ============================================================================
// Fidelity settings
// ============================================================================

#[tokio::test]
async fn test_get_and_update_fidelity_config() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, false, 10, 0).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let response = app
        .clone()
        .oneshot(common::get_request_with_api_key(
            &format!("/api/v1/units/{}/fidelity", unit_id),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["enabled"], false);
    assert_eq!(body["cuts_threshold"], 10);

    let response = app
        .clone()
        .oneshot(common::json_request_with_api_key(
            Method::PUT,
            &format!("/api/v1/units/{}/fidelity", unit_id),
            json!({"enabled": true, "cuts_threshold": 5, "min_qualifying_value": 30}),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["unit_id"], unit_id.to_string());
    assert_eq!(body["enabled"], true);
    assert_eq!(body["cuts_threshold"], 5);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_update_fidelity_config_rejects_zero_threshold() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let response = app
        .oneshot(common::json_request_with_api_key(
            Method::PUT,
            &format!("/api/v1/units/{}/fidelity", unit_id),
            json!({"enabled": true, "cuts_threshold": 0, "min_qualifying_value": 30}),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");

    common::cleanup_unit(&pool, unit_id).await;
}

// ============================================================================
// Accrual and redemption
// ============================================================================

#[tokio::test]
async fn test_five_cuts_earn_a_courtesy_and_redeem_once() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let client_id = common::create_test_client(&pool, unit_id, "Rafael Lima", None).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    for expected_cuts in 1..=4 {
        let (status, body) = post_visit(&app, client_id, visit_body(40, "card"), &api_key).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "accrued");
        assert_eq!(body["state"]["loyalty_cuts"], expected_cuts);
    }

    let (status, body) = post_visit(&app, client_id, visit_body(40, "pix"), &api_key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "courtesy_earned");
    assert_eq!(body["courtesies_earned"], 1);
    assert_eq!(body["state"]["loyalty_cuts"], 0);
    assert_eq!(body["state"]["available_courtesies"], 1);
    assert_eq!(body["phase"]["kind"], "courtesy_pending");

    let response = app
        .clone()
        .oneshot(common::get_request_with_api_key(
            &format!("/api/v1/clients/{}/loyalty/free-cut?candidate_value=40", client_id),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["is_free_cut"], true);

    let redeem_uri = format!("/api/v1/clients/{}/loyalty/redemptions", client_id);
    let response = app
        .clone()
        .oneshot(common::post_request_with_api_key(&redeem_uri, &api_key))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["redeemed"], true);
    assert_eq!(body["state"]["available_courtesies"], 0);
    assert_eq!(body["state"]["total_courtesies_earned"], 1);

    let response = app
        .clone()
        .oneshot(common::post_request_with_api_key(&redeem_uri, &api_key))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["error"], "insufficient_courtesies");

    let response = app
        .oneshot(common::get_request_with_api_key(
            &format!("/api/v1/clients/{}/loyalty", client_id),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["total_visits"], 5);
    assert_eq!(body["available_courtesies"], 0);
    assert_eq!(body["cuts_threshold"], 5);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_same_appointment_accrues_once() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let client_id =
        common::create_test_client(&pool, unit_id, &common::fake_client_name(), None).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let body = visit_body(45, "cash");
    let (_, first) = post_visit(&app, client_id, body.clone(), &api_key).await;
    assert_eq!(first["outcome"], "accrued");

    let (status, second) = post_visit(&app, client_id, body, &api_key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "already_applied");
    assert_eq!(second["state"]["loyalty_cuts"], 1);
    assert_eq!(second["state"]["total_visits"], 1);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_same_appointment_redeems_once() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 1, 0).await;
    let client_id =
        common::create_test_client(&pool, unit_id, &common::fake_client_name(), None).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    post_visit(&app, client_id, visit_body(40, "card"), &api_key).await;
    post_visit(&app, client_id, visit_body(40, "card"), &api_key).await;

    let appointment_id = Uuid::new_v4();
    let redeem_uri = format!("/api/v1/clients/{}/loyalty/redemptions", client_id);
    let redeem = || {
        common::json_request_with_api_key(
            Method::POST,
            &redeem_uri,
            json!({"appointment_id": appointment_id}),
            &api_key,
        )
    };

    let body = common::parse_response_body(app.clone().oneshot(redeem()).await.unwrap()).await;
    assert_eq!(body["redeemed"], true);

    let body = common::parse_response_body(app.clone().oneshot(redeem()).await.unwrap()).await;
    assert_eq!(body["redeemed"], false);
    assert_eq!(body["state"]["available_courtesies"], 0);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_malformed_redemption_body_is_rejected() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 1, 0).await;
    let client_id =
        common::create_test_client(&pool, unit_id, &common::fake_client_name(), None).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    post_visit(&app, client_id, visit_body(40, "card"), &api_key).await;

    let redeem_uri = format!("/api/v1/clients/{}/loyalty/redemptions", client_id);
    let response = app
        .clone()
        .oneshot(common::json_request_with_api_key(
            Method::POST,
            &redeem_uri,
            json!({"appointment_id": "6f1e7a3c-typo"}),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");

    let truncated = Request::builder()
        .method(Method::POST)
        .uri(&redeem_uri)
        .header("X-API-Key", &api_key)
        .body(Body::from(r#"{"appointment_id":"#))
        .unwrap();
    let response = app.clone().oneshot(truncated).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let state = common::parse_response_body(
        app.oneshot(common::get_request_with_api_key(
            &format!("/api/v1/clients/{}/loyalty", client_id),
            &api_key,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(state["available_courtesies"], 1);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_disabled_program_changes_nothing() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, false, 5, 30).await;
    let client_id =
        common::create_test_client(&pool, unit_id, &common::fake_client_name(), None).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let (status, body) = post_visit(&app, client_id, visit_body(80, "card"), &api_key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "disabled");
    assert_eq!(body["state"]["total_visits"], 0);
    assert_eq!(body["state"]["loyalty_cuts"], 0);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_courtesy_and_cheap_visits_do_not_count() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let client_id =
        common::create_test_client(&pool, unit_id, &common::fake_client_name(), None).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let (_, body) = post_visit(&app, client_id, visit_body(20, "cash"), &api_key).await;
    assert_eq!(body["outcome"], "not_qualifying");

    let (_, body) = post_visit(&app, client_id, visit_body(40, "courtesy"), &api_key).await;
    assert_eq!(body["outcome"], "not_qualifying");
    assert_eq!(body["state"]["loyalty_cuts"], 0);
    assert_eq!(body["state"]["total_visits"], 2);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_negative_price_is_rejected() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let client_id =
        common::create_test_client(&pool, unit_id, &common::fake_client_name(), None).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let (status, body) = post_visit(&app, client_id, visit_body(-10, "cash"), &api_key).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "total_price");

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_unknown_client_returns_not_found() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let (status, body) = post_visit(&app, Uuid::new_v4(), visit_body(40, "cash"), &api_key).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    common::cleanup_unit(&pool, unit_id).await;
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_recalculate_rebuilds_counters_from_history() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let client_id =
        common::create_test_client(&pool, unit_id, "Gustavo Prado", Some("11988887777")).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    for _ in 0..5 {
        common::create_completed_appointment(&pool, unit_id, Some(client_id), None, None, 40, "card")
            .await;
    }
    // Booked before the client record existed; matched by phone and by name.
    common::create_completed_appointment(
        &pool,
        unit_id,
        None,
        Some("Walk-in"),
        Some("+55 (11) 98888-7777"),
        50,
        "pix",
    )
    .await;
    common::create_completed_appointment(&pool, unit_id, None, Some("  gustavo   PRADO "), None, 35, "cash")
        .await;
    common::create_completed_appointment(&pool, unit_id, None, Some("\tGustavo Prado\n"), None, 60, "card")
        .await;
    common::create_completed_appointment(&pool, unit_id, Some(client_id), None, None, 15, "cash")
        .await;
    common::create_completed_appointment(
        &pool,
        unit_id,
        Some(client_id),
        None,
        None,
        40,
        "Cortesia de Fidelidade",
    )
    .await;

    let response = app
        .oneshot(common::post_request_with_api_key(
            &format!("/api/v1/clients/{}/loyalty/recalculate", client_id),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["qualifying_visits"], 8);
    assert_eq!(body["total_courtesies_earned"], 1);
    assert_eq!(body["available_courtesies"], 1);
    assert_eq!(body["loyalty_cuts"], 3);
    assert_eq!(body["total_visits"], 10);

    common::cleanup_unit(&pool, unit_id).await;
}

#[tokio::test]
async fn test_admin_recalculates_whole_unit() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 2, 0).await;
    let first = common::create_test_client(&pool, unit_id, "Hugo Melo", None).await;
    let second = common::create_test_client(&pool, unit_id, "Igor Dias", None).await;
    for _ in 0..3 {
        common::create_completed_appointment(&pool, unit_id, Some(first), None, None, 40, "card")
            .await;
    }
    common::create_completed_appointment(&pool, unit_id, Some(second), None, None, 40, "card")
        .await;
    let admin_key = common::create_admin_api_key(&pool).await;

    let response = app
        .clone()
        .oneshot(common::post_request_with_api_key(
            &format!("/api/v1/admin/units/{}/loyalty/recalculate", unit_id),
            &admin_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::parse_response_body(response).await;
    assert_eq!(body["processed"], 2);
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], json!([]));

    let response = app
        .oneshot(common::get_request_with_api_key(
            &format!("/api/v1/clients/{}/loyalty", first),
            &admin_key,
        ))
        .await
        .unwrap();
    let body = common::parse_response_body(response).await;
    assert_eq!(body["total_courtesies_earned"], 1);
    assert_eq!(body["loyalty_cuts"], 1);

    common::cleanup_unit(&pool, unit_id).await;
    common::admin_keys_cleanup(&pool, &admin_key).await;
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_missing_api_key_is_unauthorized() {
    let (_pool, app) = common::setup().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/v1/clients/{}/loyalty", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_api_key_is_unauthorized() {
    let (_pool, app) = common::setup().await;

    let response = app
        .oneshot(common::get_request_with_api_key(
            &format!("/api/v1/units/{}/fidelity", Uuid::new_v4()),
            "fl_nosuchkey000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_key_cannot_reach_another_unit() {
    let (pool, app) = common::setup().await;
    let own_unit = common::create_test_unit(&pool, true, 5, 30).await;
    let other_unit = common::create_test_unit(&pool, true, 5, 30).await;
    let other_client =
        common::create_test_client(&pool, other_unit, &common::fake_client_name(), None).await;
    let api_key = common::create_unit_api_key(&pool, own_unit).await;

    let response = app
        .clone()
        .oneshot(common::get_request_with_api_key(
            &format!("/api/v1/units/{}/fidelity", other_unit),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, _) = post_visit(&app, other_client, visit_body(40, "card"), &api_key).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let state = common::parse_response_body(
        app.oneshot(common::get_request_with_api_key(
            &format!("/api/v1/units/{}/fidelity", own_unit),
            &api_key,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(state["unit_id"], own_unit.to_string());

    common::cleanup_unit(&pool, own_unit).await;
    common::cleanup_unit(&pool, other_unit).await;
}

#[tokio::test]
async fn test_admin_route_requires_admin_key() {
    let (pool, app) = common::setup().await;
    let unit_id = common::create_test_unit(&pool, true, 5, 30).await;
    let api_key = common::create_unit_api_key(&pool, unit_id).await;

    let response = app
        .oneshot(common::post_request_with_api_key(
            &format!("/api/v1/admin/units/{}/loyalty/recalculate", unit_id),
            &api_key,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    common::cleanup_unit(&pool, unit_id).await;
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let (_pool, app) = common::setup().await;

    let live = Request::builder()
        .uri("/api/health/live")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(live).await.unwrap().status(), StatusCode::OK);

    let ready = Request::builder()
        .uri("/api/health/ready")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(ready).await.unwrap().status(), StatusCode::OK);
}
