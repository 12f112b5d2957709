use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use sqlx::postgres::PgConnectOptions;
use storefront_api::{
    config::AppConfig,
    routes::create_router,
    security::{JwtKeys, Role},
    state::AppState,
};
use tower::ServiceExt;

const SECRET: &str = "guard-secret";

// Every request here is rejected before a query runs, so no database is needed.
fn app() -> Router {
    let config = AppConfig {
        database: PgConnectOptions::new_without_pgpass(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: SECRET.into(),
        upload_dir: std::env::temp_dir().join("storefront-guard-uploads"),
    };
    create_router(AppState::new(DatabaseConnection::Disconnected, config))
}

fn token(role: Role) -> String {
    let keys = JwtKeys::new(SECRET.as_bytes());
    let identifier = match role {
        Role::Admin => "admin",
        Role::Customer => "ann@example.com",
    };
    keys.issue(1, identifier, role).unwrap()
}

async fn send(method: Method, uri: &str, bearer: Option<&str>, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
    }
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn unknown_path_uses_the_envelope() {
    let (status, body) = send(Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not Found");
    assert_eq!(body["data"]["path"], "/nope");
}

#[tokio::test]
async fn cart_requires_a_customer() {
    let (status, _) = send(Method::GET, "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = token(Role::Admin);
    let (status, body) = send(Method::GET, "/cart", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap_or_default().contains("customer"));
}

#[tokio::test]
async fn catalog_writes_require_an_admin() {
    let customer = token(Role::Customer);
    let (status, _) = send(
        Method::POST,
        "/categories",
        Some(&customer),
        Some(r#"{"name":"Kitchen"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(Method::DELETE, "/products/1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_tokens_are_rejected() {
    let (status, _) = send(Method::GET, "/orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = JwtKeys::new(b"other-secret").issue(1, "admin", Role::Admin).unwrap();
    let (status, _) = send(Method::GET, "/orders", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn orders_need_a_login_except_checkout() {
    let (status, _) = send(Method::GET, "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        Method::PUT,
        "/orders/1/status",
        None,
        Some(r#"{"status":"shipped"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = token(Role::Customer);
    let (status, _) = send(
        Method::PUT,
        "/orders/1/status",
        Some(&customer),
        Some(r#"{"status":"shipped"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Guest checkout is open; an empty order fails validation, not auth.
    let (status, _) = send(Method::POST, "/orders", None, Some(r#"{"items":[]}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let admin = token(Role::Admin);
    let (status, body) = send(Method::POST, "/categories", Some(&admin), Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}
