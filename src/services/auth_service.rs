use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    dto::auth::{
        CustomerAuthResponse, CustomerLoginRequest, CustomerRegisterRequest, LoginRequest,
        RegisterRequest, UserAuthResponse,
    },
    entity::{
        Customers, Users,
        customers::{ActiveModel as CustomerActive, Column as CustomerCol},
        users::{ActiveModel as UserActive, Column as UserCol},
    },
    error::{AppError, AppResult},
    models::{customer_from_entity, user_from_entity},
    response::ApiResponse,
    security::{Role, hash_password, verify_password},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Prefix of the password column for customers created through guest checkout.
/// The value is not a PHC string, so it never verifies.
const GUEST_PASSWORD_PREFIX: &str = "!guest:";

pub fn guest_password_marker() -> String {
    format!("{GUEST_PASSWORD_PREFIX}{}", Uuid::new_v4())
}

pub fn is_guest_password(stored: &str) -> bool {
    stored.starts_with(GUEST_PASSWORD_PREFIX)
}

/// Trims and lowercases an address, rejecting anything not shaped like `local@domain`.
pub fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    };
    if !valid {
        return Err(AppError::BadRequest("invalid email".into()));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<UserAuthResponse>> {
    let username = payload.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".into()));
    }
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;

    let taken = Users::find()
        .filter(UserCol::Username.eq(username.as_str()))
        .one(&state.orm)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("username already exists".into()));
    }
    let taken = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("email already exists".into()));
    }

    let user = UserActive {
        username: Set(username),
        email: Set(email),
        password_hash: Set(hash_password(&payload.password)?),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;

    let token = state.jwt.issue(user.id, &user.username, Role::Admin)?;
    tracing::info!(user_id = user.id, username = %user.username, "staff user registered");

    Ok(ApiResponse::item(
        "User registered",
        UserAuthResponse {
            user: user_from_entity(user),
            token,
        },
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<UserAuthResponse>> {
    let user = Users::find()
        .filter(UserCol::Username.eq(payload.username.trim()))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    let token = state.jwt.issue(user.id, &user.username, Role::Admin)?;
    tracing::debug!(user_id = user.id, "staff user logged in");

    Ok(ApiResponse::item(
        "Login successful",
        UserAuthResponse {
            user: user_from_entity(user),
            token,
        },
    ))
}

/// Registers a customer. An e-mail that only belongs to a guest-checkout
/// account is claimed: the account keeps its orders and receives the new
/// password and profile.
pub async fn register_customer(
    state: &AppState,
    payload: CustomerRegisterRequest,
) -> AppResult<ApiResponse<CustomerAuthResponse>> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    let password_hash = hash_password(&payload.password)?;

    let existing = Customers::find()
        .filter(CustomerCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let customer = match existing {
        Some(found) if is_guest_password(&found.password_hash) => {
            let mut active: CustomerActive = found.into();
            active.name = Set(name);
            active.password_hash = Set(password_hash);
            if let Some(phone) = payload.phone {
                active.phone = Set(phone);
            }
            if let Some(address) = payload.address {
                active.address = Set(address);
            }
            let customer = active.update(&state.orm).await?;
            tracing::info!(customer_id = customer.id, "guest customer claimed");
            customer
        }
        Some(_) => return Err(AppError::Conflict("email already exists".into())),
        None => {
            let customer = CustomerActive {
                name: Set(name),
                email: Set(email),
                password_hash: Set(password_hash),
                phone: Set(payload.phone.unwrap_or_default()),
                address: Set(payload.address.unwrap_or_default()),
                ..Default::default()
            }
            .insert(&state.orm)
            .await?;
            tracing::info!(customer_id = customer.id, "customer registered");
            customer
        }
    };

    let token = state.jwt.issue(customer.id, &customer.email, Role::Customer)?;
    Ok(ApiResponse::item(
        "Customer registered",
        CustomerAuthResponse {
            customer: customer_from_entity(customer),
            token,
        },
    ))
}

pub async fn login_customer(
    state: &AppState,
    payload: CustomerLoginRequest,
) -> AppResult<ApiResponse<CustomerAuthResponse>> {
    let email = payload.email.trim().to_lowercase();
    let customer = Customers::find()
        .filter(CustomerCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(&payload.password, &customer.password_hash) {
        return Err(invalid_credentials());
    }

    let token = state.jwt.issue(customer.id, &customer.email, Role::Customer)?;
    tracing::debug!(customer_id = customer.id, "customer logged in");

    Ok(ApiResponse::item(
        "Login successful",
        CustomerAuthResponse {
            customer: customer_from_entity(customer),
            token,
        },
    ))
}
