use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::{
    dto::customers::{CreateCustomerRequest, CustomerDetail, CustomerList, UpdateCustomerRequest},
    entity::{
        Customers, Orders,
        customers::{ActiveModel, Column},
        orders::Column as OrderCol,
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::{Customer, customer_from_entity},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    security::hash_password,
    services::{
        auth_service::{normalize_email, validate_password},
        order_service::hydrate_orders,
    },
    state::AppState,
};

pub async fn list_customers(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<CustomerList>> {
    let (page, per_page, offset) = pagination.normalize();
    let finder = Customers::find().order_by_asc(Column::Id);
    let total = finder.clone().count(&state.orm).await?;

    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(customer_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

/// Customer together with their orders, newest first.
pub async fn get_customer(state: &AppState, id: i64) -> AppResult<ApiResponse<CustomerDetail>> {
    let customer = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;
    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(id))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id)
        .all(&state.orm)
        .await?;
    let orders = hydrate_orders(&state.orm, orders).await?;

    Ok(ApiResponse::item(
        "Customer",
        CustomerDetail {
            customer: customer_from_entity(customer),
            orders,
        },
    ))
}

pub async fn create_customer(
    state: &AppState,
    principal: &Principal,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    principal.require_admin()?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    ensure_email_free(state, &email, None).await?;

    let customer = ActiveModel {
        name: Set(name),
        email: Set(email),
        password_hash: Set(hash_password(&payload.password)?),
        phone: Set(payload.phone.unwrap_or_default()),
        address: Set(payload.address.unwrap_or_default()),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    tracing::info!(customer_id = customer.id, "customer created");

    Ok(ApiResponse::item("Customer created", customer_from_entity(customer)))
}

pub async fn update_customer(
    state: &AppState,
    principal: &Principal,
    id: i64,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    principal.require_admin()?;
    let existing = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name must not be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(email) = payload.email {
        let email = normalize_email(&email)?;
        ensure_email_free(state, &email, Some(id)).await?;
        active.email = Set(email);
    }
    if let Some(password) = payload.password {
        validate_password(&password)?;
        active.password_hash = Set(hash_password(&password)?);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone);
    }
    if let Some(address) = payload.address {
        active.address = Set(address);
    }
    let customer = active.update(&state.orm).await?;

    Ok(ApiResponse::item("Customer updated", customer_from_entity(customer)))
}

/// Customers with orders are kept; their cart goes with them.
pub async fn delete_customer(state: &AppState, principal: &Principal, id: i64) -> AppResult<()> {
    principal.require_admin()?;
    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(id))
        .count(&state.orm)
        .await?;
    if orders > 0 {
        return Err(AppError::Conflict("customer has orders".into()));
    }

    let result = Customers::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Customer"));
    }
    tracing::info!(customer_id = id, "customer deleted");
    Ok(())
}

async fn ensure_email_free(state: &AppState, email: &str, except: Option<i64>) -> AppResult<()> {
    let mut finder = Customers::find().filter(Column::Email.eq(email));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::Conflict("email already exists".into()));
    }
    Ok(())
}
