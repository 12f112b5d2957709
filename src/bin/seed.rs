use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    security::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database).await?;
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool();

    let admin_id = ensure_admin(pool, "admin", "admin@example.com", "admin123").await?;
    seed_catalog(pool).await?;

    println!("Seed completed. Admin ID: {admin_id}");
    Ok(())
}

async fn ensure_admin(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<i64> {
    let password_hash = hash_password(password)?;

    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_optional(pool)
    .await?;

    let admin_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (i64,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured admin {username}");
    Ok(admin_id)
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let categories = [
        ("Apparel", "Things to wear"),
        ("Kitchen", "Mugs, bottles and the like"),
        ("Stationery", "Stickers and notebooks"),
    ];
    for (name, description) in categories {
        sqlx::query(
            "INSERT INTO categories (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;
    }

    let products = [
        ("Canvas Hoodie", 550_000_i64, "Apparel"),
        ("Enamel Mug", 120_000, "Kitchen"),
        ("Sticker Pack", 50_000, "Stationery"),
        ("Dot Grid Notebook", 90_000, "Stationery"),
    ];
    for (name, price, category) in products {
        sqlx::query(
            r#"
            INSERT INTO products (name, price, category_id)
            SELECT $1, $2, c.id FROM categories c
            WHERE c.name = $3
              AND NOT EXISTS (SELECT 1 FROM products p WHERE p.name = $1)
            "#,
        )
        .bind(name)
        .bind(price)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded categories and products");
    Ok(())
}
