use std::collections::HashMap;

use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::{
    dto::products::ProductList,
    entity::{
        CartItems, Categories, Products,
        cart_items::Column as CartItemCol,
        categories::Model as CategoryModel,
        products::{ActiveModel, Column, Model as ProductModel},
    },
    error::{AppError, AppResult},
    extract::{ImageInput, ProductForm},
    middleware::auth::Principal,
    models::{MAX_PRICE, Product, category_from_entity, product_from_entity},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::cart_service::recalc_cart_total,
    state::AppState,
    uploads::store_image,
};

fn hydrate((product, category): (ProductModel, Option<CategoryModel>)) -> Product {
    product_from_entity(product, category.map(category_from_entity))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, per_page, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col((Products, Column::Name)).ilike(contains_pattern(search)));
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };
    let finder = Products::find().filter(condition);
    let total = finder.clone().count(&state.orm).await?;

    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col).order_by_asc(Column::Id),
        SortOrder::Desc => finder.order_by_desc(sort_col).order_by_desc(Column::Id),
    };
    let items = finder
        .find_also_related(Categories)
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(hydrate)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn get_product(state: &AppState, id: i64) -> AppResult<ApiResponse<Product>> {
    let product = find_product(&state.orm, id).await?;
    Ok(ApiResponse::item("Product", product))
}

pub async fn create_product(
    state: &AppState,
    principal: &Principal,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    principal.require_admin()?;
    let name = form
        .name
        .ok_or_else(|| AppError::BadRequest("name is required".into()))?;
    let price = form
        .price
        .ok_or_else(|| AppError::BadRequest("price is required".into()))?;
    validate_price(price)?;
    if let Some(category_id) = form.category_id {
        ensure_category(state, category_id).await?;
    }
    let image = match form.image {
        Some(input) => Some(resolve_image(state, input).await?),
        None => None,
    };

    let product = ActiveModel {
        name: Set(name),
        price: Set(price),
        image: Set(image),
        category_id: Set(form.category_id),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    tracing::info!(product_id = product.id, "product created");

    let product = find_product(&state.orm, product.id).await?;
    Ok(ApiResponse::item("Product created", product))
}

pub async fn update_product(
    state: &AppState,
    principal: &Principal,
    id: i64,
    form: ProductForm,
) -> AppResult<ApiResponse<Product>> {
    principal.require_admin()?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = form.name {
        active.name = Set(name);
    }
    if let Some(price) = form.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if form.clear_category {
        active.category_id = Set(None);
    } else if let Some(category_id) = form.category_id {
        ensure_category(state, category_id).await?;
        active.category_id = Set(Some(category_id));
    }
    if let Some(input) = form.image {
        active.image = Set(Some(resolve_image(state, input).await?));
    }
    active.update(&state.orm).await?;

    let product = find_product(&state.orm, id).await?;
    Ok(ApiResponse::item("Product updated", product))
}

/// Cart lines for the product go with it (cascade), so the totals of the
/// carts that held it are recomputed in the same transaction.
pub async fn delete_product(state: &AppState, principal: &Principal, id: i64) -> AppResult<()> {
    principal.require_admin()?;
    let txn = state.orm.begin().await?;

    let cart_ids: Vec<i64> = CartItems::find()
        .select_only()
        .column(CartItemCol::CartId)
        .filter(CartItemCol::ProductId.eq(id))
        .distinct()
        .into_tuple()
        .all(&txn)
        .await?;

    let result = Products::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Product"));
    }
    for cart_id in &cart_ids {
        recalc_cart_total(&txn, *cart_id).await?;
    }

    txn.commit().await?;
    tracing::info!(product_id = id, carts = cart_ids.len(), "product deleted");
    Ok(())
}

/// Loads the given products with their category, keyed by id. Unknown ids are skipped.
pub async fn load_products_by_id<C, I>(conn: &C, ids: I) -> AppResult<HashMap<i64, Product>>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = i64>,
{
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products = Products::find()
        .filter(Column::Id.is_in(ids))
        .find_also_related(Categories)
        .all(conn)
        .await?
        .into_iter()
        .map(|row| {
            let product = hydrate(row);
            (product.id, product)
        })
        .collect();
    Ok(products)
}

async fn find_product<C: ConnectionTrait>(conn: &C, id: i64) -> AppResult<Product> {
    Products::find_by_id(id)
        .find_also_related(Categories)
        .one(conn)
        .await?
        .map(hydrate)
        .ok_or(AppError::NotFound("Product"))
}

fn contains_pattern(search: &str) -> LikeExpr {
    LikeExpr::new(escape_like(search)).escape('\\')
}

/// `%search%` with the LIKE wildcards in `search` matched literally.
fn escape_like(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if price > MAX_PRICE {
        return Err(AppError::BadRequest(format!("price must be at most {MAX_PRICE}")));
    }
    Ok(())
}

async fn ensure_category(state: &AppState, category_id: i64) -> AppResult<()> {
    if Categories::find_by_id(category_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("category not found".into()));
    }
    Ok(())
}

async fn resolve_image(state: &AppState, input: ImageInput) -> AppResult<String> {
    match input {
        ImageInput::Upload { file_name, bytes } => {
            store_image(&state.config.upload_dir, &file_name, &bytes).await
        }
        ImageInput::Path(path) => Ok(path),
    }
}
