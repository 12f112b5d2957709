use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entity::{
    cart_items::Model as CartItemModel, carts::Model as CartModel,
    categories::Model as CategoryModel, customers::Model as CustomerModel,
    order_items::Model as OrderItemModel, orders::Model as OrderModel,
    products::Model as ProductModel, users::Model as UserModel,
};

pub use crate::entity::orders::OrderStatus;

/// Largest accepted product price, in the smallest currency unit.
pub const MAX_PRICE: i64 = 1_000_000_000_000;
/// Largest quantity a single cart or order line may hold.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Smallest currency unit.
    pub price: i64,
    pub image: Option<String>,
    pub category_id: Option<i64>,
    pub category: Option<Category>,
    pub created_at: DateTime<Utc>,
}

/// Staff account as exposed over the API. The password hash never leaves the service layer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: i64,
    pub quantity: i32,
    /// `unit_price * quantity`, computed when the cart is read.
    pub subtotal: i64,
    pub product: Option<Product>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Cart {
    pub id: i64,
    pub customer_id: i64,
    pub total_amount: i64,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub image: Option<String>,
    pub price: i64,
    pub quantity: i32,
    pub product: Option<Product>,
}

pub fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn product_from_entity(model: ProductModel, category: Option<Category>) -> Product {
    Product {
        id: model.id,
        name: model.name,
        price: model.price,
        image: model.image,
        category_id: model.category_id,
        category,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn customer_from_entity(model: CustomerModel) -> Customer {
    Customer {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        address: model.address,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn cart_item_from_entity(model: CartItemModel, product: Option<Product>) -> CartItem {
    CartItem {
        id: model.id,
        cart_id: model.cart_id,
        product_id: model.product_id,
        product_name: model.product_name,
        product_image: model.product_image,
        unit_price: model.unit_price,
        quantity: model.quantity,
        subtotal: model.unit_price.saturating_mul(i64::from(model.quantity)),
        product,
    }
}

/// The response total is the sum of the item subtotals, never the cached column.
pub fn cart_from_entity(model: CartModel, items: Vec<CartItem>) -> Cart {
    let total_amount = items
        .iter()
        .fold(0i64, |acc, item| acc.saturating_add(item.subtotal));
    Cart {
        id: model.id,
        customer_id: model.customer_id,
        total_amount,
        items,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        status: model.status,
        total_amount: model.total_amount,
        shipping_address: model.shipping_address,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel, product: Option<Product>) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        image: model.image,
        price: model.price,
        quantity: model.quantity,
        product,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn now() -> chrono::DateTime<FixedOffset> {
        Utc::now().fixed_offset()
    }

    fn line(id: i64, unit_price: i64, quantity: i32) -> CartItemModel {
        CartItemModel {
            id,
            cart_id: 1,
            product_id: id * 10,
            product_name: format!("product {id}"),
            product_image: None,
            unit_price,
            quantity,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn cart_total_is_sum_of_subtotals() {
        let cart = CartModel {
            id: 1,
            customer_id: 7,
            total_amount: 999,
            created_at: now(),
            updated_at: now(),
        };
        let items = vec![
            cart_item_from_entity(line(1, 100, 2), None),
            cart_item_from_entity(line(2, 250, 3), None),
        ];

        let cart = cart_from_entity(cart, items);

        assert_eq!(cart.items[0].subtotal, 200);
        assert_eq!(cart.items[1].subtotal, 750);
        assert_eq!(cart.total_amount, 950);
    }

    #[test]
    fn empty_cart_totals_zero() {
        let cart = CartModel {
            id: 1,
            customer_id: 7,
            total_amount: 0,
            created_at: now(),
            updated_at: now(),
        };
        assert_eq!(cart_from_entity(cart, Vec::new()).total_amount, 0);
    }

    #[test]
    fn oversized_lines_saturate_instead_of_wrapping() {
        let cart = CartModel {
            id: 1,
            customer_id: 7,
            total_amount: 0,
            created_at: now(),
            updated_at: now(),
        };
        let items = vec![
            cart_item_from_entity(line(1, i64::MAX / 2, 3), None),
            cart_item_from_entity(line(2, 100, 1), None),
        ];

        let cart = cart_from_entity(cart, items);

        assert_eq!(cart.items[0].subtotal, i64::MAX);
        assert_eq!(cart.total_amount, i64::MAX);
    }
}
