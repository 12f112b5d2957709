use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::{
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems, ShippingAddress, UpdateOrderStatusRequest},
    entity::{
        Customers, OrderItems, Orders, Products,
        customers::{ActiveModel as CustomerActive, Column as CustomerCol},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel, OrderStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::{MAX_LINE_QUANTITY, customer_from_entity, order_from_entity, order_item_from_entity},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        auth_service::{guest_password_marker, normalize_email},
        product_service::load_products_by_id,
    },
    state::AppState,
};

const INVALID_STATUS: &str =
    "invalid status: must be one of pending, processing, shipped, delivered, cancelled";

/// Places an order for the logged-in customer, or for a guest identified by e-mail.
/// Prices are copied from the catalog; the order and all its lines commit together.
pub async fn create_order(
    state: &AppState,
    principal: &Principal,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("order must contain at least one item".into()));
    }
    for line in &payload.items {
        validate_line_quantity(line.quantity)?;
    }
    let shipping_address = flatten_shipping_address(payload.shipping_address.as_ref());

    let txn = state.orm.begin().await?;

    let customer_id = match principal {
        Principal::Customer { id, .. } => {
            Customers::find_by_id(*id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::BadRequest("customer not found".into()))?
                .id
        }
        _ => resolve_guest_customer(&txn, &payload).await?,
    };

    let order = OrderActive {
        customer_id: Set(customer_id),
        status: Set(OrderStatus::Pending),
        total_amount: Set(0),
        shipping_address: Set(shipping_address),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut total: i64 = 0;
    for line in &payload.items {
        let product = Products::find_by_id(line.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::BadRequest("product not found".into()))?;

        OrderItemActive {
            order_id: Set(order.id),
            product_id: Set(product.id),
            image: Set(product.image.clone()),
            price: Set(product.price),
            quantity: Set(line.quantity),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        total = product
            .price
            .checked_mul(i64::from(line.quantity))
            .and_then(|subtotal| total.checked_add(subtotal))
            .ok_or_else(|| AppError::BadRequest("order total too large".into()))?;
    }

    let mut active: OrderActive = order.into();
    active.total_amount = Set(total);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;
    tracing::info!(order_id = order.id, customer_id, total, "order created");

    let order = hydrate_one(&state.orm, order).await?;
    Ok(ApiResponse::item("Order created", order))
}

/// Admins see every order; customers only their own.
pub async fn list_orders(
    state: &AppState,
    principal: &Principal,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    principal.require_authenticated()?;
    let (page, per_page, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Principal::Customer { id, .. } = principal {
        condition = condition.add(OrderCol::CustomerId.eq(*id));
    }
    if let Some(raw) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        let status = OrderStatus::parse(raw).ok_or_else(|| AppError::BadRequest(INVALID_STATUS.into()))?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let finder = Orders::find().filter(condition);
    let total = finder.clone().count(&state.orm).await?;

    let finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt).order_by_asc(OrderCol::Id),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt).order_by_desc(OrderCol::Id),
    };
    let orders = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = hydrate_orders(&state.orm, orders).await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    principal: &Principal,
    id: i64,
) -> AppResult<ApiResponse<OrderWithItems>> {
    principal.require_authenticated()?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if let Principal::Customer { id: customer_id, .. } = principal {
        if order.customer_id != *customer_id {
            return Err(AppError::Forbidden("order belongs to another customer"));
        }
    }

    let order = hydrate_one(&state.orm, order).await?;
    Ok(ApiResponse::item("Order", order))
}

/// Any status may follow any other.
pub async fn update_order_status(
    state: &AppState,
    principal: &Principal,
    id: i64,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    principal.require_admin()?;
    let status = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest(INVALID_STATUS.into()))?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    let previous = order.status;

    let mut active: OrderActive = order.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;
    tracing::info!(
        order_id = order.id,
        from = previous.as_str(),
        to = status.as_str(),
        "order status changed"
    );

    let order = hydrate_one(&state.orm, order).await?;
    Ok(ApiResponse::item("Order status updated", order))
}

pub async fn delete_order(state: &AppState, principal: &Principal, id: i64) -> AppResult<()> {
    principal.require_admin()?;
    let txn = state.orm.begin().await?;

    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(id))
        .exec(&txn)
        .await?;
    let result = Orders::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Order"));
    }

    txn.commit().await?;
    tracing::info!(order_id = id, "order deleted");
    Ok(())
}

/// Attaches customer and lines (with their products) to each order, keeping the input order.
pub async fn hydrate_orders<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let customer_ids: Vec<i64> = orders.iter().map(|o| o.customer_id).collect();

    let customers: HashMap<i64, _> = Customers::find()
        .filter(CustomerCol::Id.is_in(customer_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, customer_from_entity(c)))
        .collect();

    let lines = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?;
    let products = load_products_by_id(conn, lines.iter().map(|l| l.product_id)).await?;

    let mut items_by_order: HashMap<i64, Vec<_>> = HashMap::new();
    for line in lines {
        let product = products.get(&line.product_id).cloned();
        items_by_order
            .entry(line.order_id)
            .or_default()
            .push(order_item_from_entity(line, product));
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderWithItems {
            customer: customers.get(&order.customer_id).cloned(),
            items: items_by_order.remove(&order.id).unwrap_or_default(),
            order: order_from_entity(order),
        })
        .collect())
}

async fn hydrate_one<C: ConnectionTrait>(conn: &C, order: OrderModel) -> AppResult<OrderWithItems> {
    hydrate_orders(conn, vec![order])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Order"))
}

/// Finds the customer owning `email`, creating a guest account if there is none.
/// Guest accounts carry a password marker that never verifies.
async fn resolve_guest_customer(
    txn: &DatabaseTransaction,
    payload: &CreateOrderRequest,
) -> AppResult<i64> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("email is required for guest checkout".into()))?;
    let email = normalize_email(email)?;

    if let Some(existing) = find_customer_by_email(txn, &email).await? {
        return Ok(existing);
    }

    let name = guest_display_name(
        payload.customer_name.as_deref(),
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
        &email,
    );
    let guest = CustomerActive {
        name: Set(name),
        email: Set(email.clone()),
        password_hash: Set(guest_password_marker()),
        ..Default::default()
    };
    Customers::insert(guest)
        .on_conflict(OnConflict::column(CustomerCol::Email).do_nothing().to_owned())
        .exec_without_returning(txn)
        .await?;

    let id = find_customer_by_email(txn, &email)
        .await?
        .ok_or(AppError::NotFound("Customer"))?;
    tracing::info!(customer_id = id, "guest customer created");
    Ok(id)
}

async fn find_customer_by_email(txn: &DatabaseTransaction, email: &str) -> AppResult<Option<i64>> {
    Ok(Customers::find()
        .filter(CustomerCol::Email.eq(email))
        .one(txn)
        .await?
        .map(|c| c.id))
}

pub(crate) fn validate_line_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// Explicit name, else "first last", else the e-mail.
pub fn guest_display_name(
    customer_name: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
    email: &str,
) -> String {
    if let Some(name) = customer_name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let full = [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if full.is_empty() { email.to_string() } else { full }
}

pub fn flatten_shipping_address(address: Option<&ShippingAddress>) -> String {
    let Some(address) = address else {
        return String::new();
    };
    [
        &address.street,
        &address.city,
        &address.state,
        &address.zip_code,
        &address.country,
    ]
    .into_iter()
    .filter_map(|part| part.as_deref().map(str::trim))
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_skips_missing_parts() {
        let address = ShippingAddress {
            street: Some("1 Main St".into()),
            city: Some("Springfield".into()),
            state: None,
            zip_code: Some("  ".into()),
            country: Some("US".into()),
        };
        assert_eq!(
            flatten_shipping_address(Some(&address)),
            "1 Main St, Springfield, US"
        );
        assert_eq!(flatten_shipping_address(None), "");
        assert_eq!(flatten_shipping_address(Some(&ShippingAddress::default())), "");
    }

    #[test]
    fn zip_alias_is_accepted() {
        let address: ShippingAddress =
            serde_json::from_str(r#"{"city":"Oslo","zip":"0150"}"#).unwrap();
        assert_eq!(flatten_shipping_address(Some(&address)), "Oslo, 0150");
    }

    #[test]
    fn guest_name_falls_back_in_order() {
        assert_eq!(
            guest_display_name(Some(" Ann Lee "), Some("X"), Some("Y"), "a@x.io"),
            "Ann Lee"
        );
        assert_eq!(guest_display_name(None, Some("Ann"), Some("Lee"), "a@x.io"), "Ann Lee");
        assert_eq!(guest_display_name(Some(""), None, Some("Lee"), "a@x.io"), "Lee");
        assert_eq!(guest_display_name(None, None, None, "a@x.io"), "a@x.io");
    }

    #[test]
    fn line_quantity_is_bounded() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(matches!(validate_line_quantity(0), Err(AppError::BadRequest(_))));
        assert!(matches!(
            validate_line_quantity(MAX_LINE_QUANTITY + 1),
            Err(AppError::BadRequest(_))
        ));
    }
}
