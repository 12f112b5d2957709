use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::auth::{
        CustomerAuthResponse, CustomerLoginRequest, CustomerRegisterRequest, LoginRequest,
        RegisterRequest, UserAuthResponse,
    },
    error::AppResult,
    extract::AppJson,
    response::{ApiResponse, Created},
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/customers/register", post(register_customer))
        .route("/customers/login", post(login_customer))
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register staff user", body = ApiResponse<UserAuthResponse>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already exists")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<Created<UserAuthResponse>> {
    let resp = auth_service::register_user(&state, payload).await?;
    Ok(Created(resp))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login staff user", body = ApiResponse<UserAuthResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<UserAuthResponse>>> {
    let resp = auth_service::login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/customers/register",
    request_body = CustomerRegisterRequest,
    responses(
        (status = 201, description = "Register customer", body = ApiResponse<CustomerAuthResponse>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already exists")
    ),
    tag = "Auth"
)]
pub async fn register_customer(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CustomerRegisterRequest>,
) -> AppResult<Created<CustomerAuthResponse>> {
    let resp = auth_service::register_customer(&state, payload).await?;
    Ok(Created(resp))
}

#[utoipa::path(
    post,
    path = "/customers/login",
    request_body = CustomerLoginRequest,
    responses(
        (status = 200, description = "Login customer", body = ApiResponse<CustomerAuthResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login_customer(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CustomerLoginRequest>,
) -> AppResult<Json<ApiResponse<CustomerAuthResponse>>> {
    let resp = auth_service::login_customer(&state, payload).await?;
    Ok(Json(resp))
}
