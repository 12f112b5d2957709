#![allow(dead_code)]

use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use sqlx::postgres::PgConnectOptions;
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{categories, customers, products},
    middleware::auth::Principal,
    security::hash_password,
    state::AppState,
};

/// Connects to the test database and empties every table. `None` when no
/// database is configured, in which case the caller skips.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run database tests.");
            return Ok(None);
        }
    };

    let database = database_url.parse::<PgConnectOptions>()?;
    let orm = create_orm_conn(&database).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, carts, products, categories, customers, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let config = AppConfig {
        database,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        upload_dir: std::env::temp_dir().join("storefront-test-uploads"),
    };
    Ok(Some(AppState::new(orm, config)))
}

pub fn admin() -> Principal {
    Principal::Admin {
        id: 1,
        username: "admin".into(),
    }
}

pub async fn create_customer(state: &AppState, email: &str) -> anyhow::Result<Principal> {
    let customer = customers::ActiveModel {
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password("secret1")?),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    Ok(Principal::Customer {
        id: customer.id,
        email: customer.email,
    })
}

pub async fn create_category(state: &AppState, name: &str) -> anyhow::Result<i64> {
    let category = categories::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    Ok(category.id)
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: i64,
    category_id: Option<i64>,
) -> anyhow::Result<i64> {
    let product = products::ActiveModel {
        name: Set(name.to_string()),
        price: Set(price),
        category_id: Set(category_id),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub fn customer_id(principal: &Principal) -> i64 {
    match principal {
        Principal::Customer { id, .. } => *id,
        other => panic!("not a customer: {other:?}"),
    }
}
