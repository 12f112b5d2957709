//! Cart mutations. Each one runs in a transaction that locates (or creates)
//! the customer's cart, applies the change, recomputes `carts.total_amount`
//! from the current lines and commits; the response is re-read afterwards.

use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use crate::{
    dto::cart::{AddCartItemRequest, UpdateCartItemRequest},
    entity::{
        CartItems, Carts, Customers, Products,
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol},
        carts::{ActiveModel as CartActive, Column as CartCol, Model as CartModel},
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::{Cart, MAX_LINE_QUANTITY, cart_from_entity, cart_item_from_entity},
    response::ApiResponse,
    services::{order_service::validate_line_quantity, product_service::load_products_by_id},
    state::AppState,
};

pub async fn get_cart(state: &AppState, principal: &Principal) -> AppResult<ApiResponse<Cart>> {
    let customer_id = principal.require_customer()?;
    let cart = find_or_create_cart(&state.orm, customer_id).await?;
    let cart = load_cart(&state.orm, cart.id).await?;
    Ok(ApiResponse::item("Cart", cart))
}

/// Adds `quantity` of a product, merging into the existing line for that product.
pub async fn add_item(
    state: &AppState,
    principal: &Principal,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    let customer_id = principal.require_customer()?;
    validate_line_quantity(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let cart = find_or_create_cart(&txn, customer_id).await?;
    let product = Products::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let line = CartItemActive {
        cart_id: Set(cart.id),
        product_id: Set(product.id),
        product_name: Set(product.name),
        product_image: Set(product.image),
        unit_price: Set(product.price),
        quantity: Set(payload.quantity),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    };
    CartItems::insert(line)
        .on_conflict(
            OnConflict::columns([CartItemCol::CartId, CartItemCol::ProductId])
                .value(
                    CartItemCol::Quantity,
                    Expr::col((CartItems, CartItemCol::Quantity))
                        .add(Expr::col((Alias::new("excluded"), CartItemCol::Quantity))),
                )
                .update_columns([
                    CartItemCol::ProductName,
                    CartItemCol::ProductImage,
                    CartItemCol::UnitPrice,
                    CartItemCol::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    // The merged quantity is only known after the upsert; returning drops the txn.
    let merged = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(payload.product_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;
    if merged.quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }

    let total = recalc_cart_total(&txn, cart.id).await?;
    txn.commit().await?;
    tracing::info!(
        cart_id = cart.id,
        product_id = payload.product_id,
        quantity = payload.quantity,
        total,
        "cart item added"
    );

    let cart = load_cart(&state.orm, cart.id).await?;
    Ok(ApiResponse::item("Item added to cart", cart))
}

/// Overwrites the quantity of one line and refreshes its product snapshot.
pub async fn update_item_quantity(
    state: &AppState,
    principal: &Principal,
    item_id: i64,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    let customer_id = principal.require_customer()?;
    validate_line_quantity(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let cart = find_or_create_cart(&txn, customer_id).await?;
    let item = CartItems::find()
        .filter(CartItemCol::Id.eq(item_id))
        .filter(CartItemCol::CartId.eq(cart.id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;
    let product = Products::find_by_id(item.product_id).one(&txn).await?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.updated_at = Set(Utc::now().into());
    if let Some(product) = product {
        active.product_name = Set(product.name);
        active.product_image = Set(product.image);
        active.unit_price = Set(product.price);
    }
    active.update(&txn).await?;

    let total = recalc_cart_total(&txn, cart.id).await?;
    txn.commit().await?;
    tracing::info!(cart_id = cart.id, item_id, quantity = payload.quantity, total, "cart item updated");

    let cart = load_cart(&state.orm, cart.id).await?;
    Ok(ApiResponse::item("Cart item updated", cart))
}

pub async fn delete_item(
    state: &AppState,
    principal: &Principal,
    item_id: i64,
) -> AppResult<ApiResponse<Cart>> {
    let customer_id = principal.require_customer()?;

    let txn = state.orm.begin().await?;
    let cart = find_or_create_cart(&txn, customer_id).await?;
    let result = CartItems::delete_many()
        .filter(CartItemCol::Id.eq(item_id))
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Cart item"));
    }

    let total = recalc_cart_total(&txn, cart.id).await?;
    txn.commit().await?;
    tracing::info!(cart_id = cart.id, item_id, total, "cart item removed");

    let cart = load_cart(&state.orm, cart.id).await?;
    Ok(ApiResponse::item("Cart item removed", cart))
}

pub async fn clear_cart(state: &AppState, principal: &Principal) -> AppResult<ApiResponse<Cart>> {
    let customer_id = principal.require_customer()?;

    let txn = state.orm.begin().await?;
    let cart = find_or_create_cart(&txn, customer_id).await?;
    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    recalc_cart_total(&txn, cart.id).await?;
    txn.commit().await?;
    tracing::info!(cart_id = cart.id, removed = result.rows_affected, "cart cleared");

    let cart = load_cart(&state.orm, cart.id).await?;
    Ok(ApiResponse::item("Cart cleared", cart))
}

/// Concurrent first accesses race on `carts.customer_id`; the loser's insert
/// is a no-op and both read the same row.
async fn find_or_create_cart<C: ConnectionTrait>(conn: &C, customer_id: i64) -> AppResult<CartModel> {
    if let Some(cart) = find_cart(conn, customer_id).await? {
        return Ok(cart);
    }
    if Customers::find_by_id(customer_id).one(conn).await?.is_none() {
        return Err(AppError::NotFound("Customer"));
    }

    let cart = CartActive {
        customer_id: Set(customer_id),
        total_amount: Set(0),
        ..Default::default()
    };
    Carts::insert(cart)
        .on_conflict(OnConflict::column(CartCol::CustomerId).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;
    tracing::debug!(customer_id, "cart created");

    find_cart(conn, customer_id)
        .await?
        .ok_or(AppError::NotFound("Cart"))
}

async fn find_cart<C: ConnectionTrait>(conn: &C, customer_id: i64) -> AppResult<Option<CartModel>> {
    Ok(Carts::find()
        .filter(CartCol::CustomerId.eq(customer_id))
        .one(conn)
        .await?)
}

/// Writes `SUM(unit_price * quantity)` of the cart's current lines to the cart.
pub(crate) async fn recalc_cart_total<C: ConnectionTrait>(conn: &C, cart_id: i64) -> AppResult<i64> {
    let total = CartItems::find()
        .select_only()
        .column_as(
            Expr::cust("COALESCE(SUM(unit_price * quantity), 0)::BIGINT"),
            "total",
        )
        .filter(CartItemCol::CartId.eq(cart_id))
        .into_tuple::<i64>()
        .one(conn)
        .await?
        .unwrap_or(0);

    Carts::update_many()
        .col_expr(CartCol::TotalAmount, Expr::value(total))
        .col_expr(CartCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(CartCol::Id.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(total)
}

async fn load_cart<C: ConnectionTrait>(conn: &C, cart_id: i64) -> AppResult<Cart> {
    let cart = Carts::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;
    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?;
    let products = load_products_by_id(conn, lines.iter().map(|l| l.product_id)).await?;

    let items = lines
        .into_iter()
        .map(|line| {
            let product = products.get(&line.product_id).cloned();
            cart_item_from_entity(line, product)
        })
        .collect();
    Ok(cart_from_entity(cart, items))
}
