use std::net::SocketAddr;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use first_million::api::{app_router, build_state};
use first_million::auth::{AuthConfig, DEFAULT_TOKEN_TTL};
use first_million::config::Config;
use first_million::core::{ProjectionInput, project, summarize};
use first_million::store::NewCalculation;
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_config(database_url: Option<String>) -> Config {
    Config {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        auth: AuthConfig {
            jwt_secret: b"integration-secret-0123456789abcdef".to_vec(),
            token_ttl: DEFAULT_TOKEN_TTL,
        },
        goal: 1_000_000.0,
        max_months: 10_000,
        database_url,
    }
}

fn test_router() -> Router {
    app_router(build_state(&test_config(None)).unwrap())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn signup(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": email, "password": "secret-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "signup failed: {body}");
    body["accessToken"].as_str().unwrap().to_string()
}

fn saved_payload(name: &str) -> Value {
    let input = ProjectionInput::default();
    let months = project(&input);
    let summary = summarize(&months, input.goal).unwrap();
    let payload = NewCalculation::from_summary(
        Some(name.to_string()),
        input.initial_contribution,
        input.monthly_contribution,
        input.monthly_rate_percent,
        &summary,
    );
    json!({
        "calculation_name": payload.calculation_name,
        "initial_contribution": payload.initial_contribution,
        "monthly_contribution": payload.monthly_contribution,
        "monthly_rate": payload.monthly_rate,
        "months_to_reach_goal": payload.months_to_reach_goal,
        "final_amount": payload.final_amount,
        "total_contributed": payload.total_contributed,
        "total_interest": payload.total_interest,
    })
}

#[tokio::test]
async fn project_endpoint_applies_defaults_and_parses_strings() {
    let app = test_router();

    let (status, body) = send(&app, empty_request(Method::GET, "/api/project", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["monthsToReachGoal"], 266);
    assert_eq!(body["months"].as_array().unwrap().len(), 266);

    let (status, body) = send(
        &app,
        empty_request(
            Method::GET,
            "/api/project?initialContribution=1000000&monthlyContribution=0&monthlyRatePercent=0",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let months = body["months"].as_array().unwrap();
    assert_eq!(months.len(), 1);
    assert_eq!(months[0]["total"], 1_000_000.0);
    assert_eq!(months[0]["month"], 1);
    assert_eq!(months[0]["year"], 1);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/project",
            None,
            json!({ "initialContribution": "oops", "monthlyContribution": "1000", "monthlyRatePercent": 0.8 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["monthsToReachGoal"], 266);
}

#[tokio::test]
async fn out_of_range_json_number_is_a_bad_request_but_text_falls_back() {
    let app = test_router();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/project")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"initialContribution": 1e400}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON payload"));

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/project",
            None,
            json!({ "initialContribution": "1e400" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["monthsToReachGoal"], 266);

    let (status, body) = send(
        &app,
        empty_request(Method::GET, "/api/project?initialContribution=1e400", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["monthsToReachGoal"], 266);
}

#[tokio::test]
async fn project_endpoint_reports_cap_without_error() {
    let app = test_router();
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/project",
            None,
            json!({ "initialContribution": 0, "monthlyContribution": 0, "monthlyRatePercent": 0 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["months"].as_array().unwrap().len(), 10_000);
    assert_eq!(body["summary"]["goalReached"], false);
    assert_eq!(body["summary"]["finalAmount"], 0.0);
}

#[tokio::test]
async fn calculations_require_authentication() {
    let app = test_router();

    let (status, body) = send(&app, empty_request(Method::GET, "/api/calculations", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        empty_request(Method::GET, "/api/calculations", Some("garbage")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_validates_and_rejects_duplicates() {
    let app = test_router();

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": "short@example.com", "password": "12345" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/auth/signup", None, json!({ "email": "a@b.c" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    signup(&app, "dup@example.com").await;
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": "dup@example.com", "password": "another-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_issues_token_and_cookie() {
    let app = test_router();
    signup(&app, "login@example.com").await;

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "login@example.com", "password": "wrong-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": "secret-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "login@example.com", "password": "secret-pass" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("auth-token="));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie.split(';').next().unwrap().to_string();
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/calculations")
            .header(header::COOKIE, session)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["calculations"], json!([]));
}

#[tokio::test]
async fn calculation_lifecycle_respects_ownership() {
    let app = test_router();
    let alice = signup(&app, "alice@example.com").await;
    let bob = signup(&app, "bob@example.com").await;

    for name in ["first plan", "second plan"] {
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/calculations",
                Some(&alice),
                saved_payload(name),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        assert_eq!(body["calculation"]["months_to_reach_goal"], 266);
    }

    let (status, body) = send(
        &app,
        empty_request(Method::GET, "/api/calculations", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = body["calculations"].as_array().unwrap().clone();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["calculation_name"], "second plan");
    assert_eq!(listed[1]["calculation_name"], "first plan");

    let (_, body) = send(&app, empty_request(Method::GET, "/api/calculations", Some(&bob))).await;
    assert_eq!(body["calculations"], json!([]));

    let id = listed[0]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/calculations/{id}");

    let (status, _) = send(&app, empty_request(Method::DELETE, &uri, Some(&bob))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, empty_request(Method::DELETE, &uri, Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, empty_request(Method::DELETE, &uri, Some(&alice))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        empty_request(Method::DELETE, "/api/calculations/not-a-uuid", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_missing_fields() {
    let app = test_router();
    let token = signup(&app, "carol@example.com").await;

    let mut payload = saved_payload("incomplete");
    payload.as_object_mut().unwrap().remove("final_amount");
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/calculations", Some(&token), payload),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("final_amount"));

    let mut unnamed = saved_payload("");
    unnamed["calculation_name"] = Value::Null;
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/calculations", Some(&token), unnamed),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["calculation"]["calculation_name"], "Untitled");
}

#[tokio::test]
async fn sqlite_backed_router_keeps_accounts_and_records_across_restarts() {
    let dir = tempfile::TempDir::new().unwrap();
    let url = dir.path().join("api.db").to_str().unwrap().to_string();

    let token = {
        let app = app_router(build_state(&test_config(Some(url.clone()))).unwrap());
        let token = signup(&app, "dana@example.com").await;
        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/calculations",
                Some(&token),
                saved_payload("durable"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        token
    };

    let app = app_router(build_state(&test_config(Some(url))).unwrap());
    let (status, body) = send(
        &app,
        empty_request(Method::GET, "/api/calculations", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["calculations"][0]["calculation_name"], "durable");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": "DANA@example.com", "password": "another-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "dana@example.com", "password": "secret-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_routes_are_json_404() {
    let app = test_router();
    let (status, body) = send(&app, empty_request(Method::GET, "/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, body) = send(&app, empty_request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
