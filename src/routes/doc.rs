use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            CustomerAuthResponse, CustomerLoginRequest, CustomerRegisterRequest, LoginRequest,
            RegisterRequest, UserAuthResponse,
        },
        cart::{AddCartItemRequest, UpdateCartItemRequest},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        customers::{CreateCustomerRequest, CustomerDetail, CustomerList, UpdateCustomerRequest},
        orders::{
            CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems, ShippingAddress,
            UpdateOrderStatusRequest,
        },
        products::{ProductList, ProductPayload},
    },
    models::{Cart, CartItem, Category, Customer, Order, OrderItem, OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, categories, customers, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::register_customer,
        auth::login_customer,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        customers::list_customers,
        customers::get_customer,
        customers::create_customer,
        customers::update_customer,
        customers::delete_customer,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::delete_item,
        cart::clear_cart,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order_status,
        orders::delete_order
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Customer,
            Cart,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            RegisterRequest,
            LoginRequest,
            CustomerRegisterRequest,
            CustomerLoginRequest,
            UserAuthResponse,
            CustomerAuthResponse,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            ProductPayload,
            ProductList,
            CreateCustomerRequest,
            UpdateCustomerRequest,
            CustomerList,
            CustomerDetail,
            AddCartItemRequest,
            UpdateCartItemRequest,
            OrderLineRequest,
            ShippingAddress,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<Product>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Staff and customer authentication"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Customers", description = "Customer endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
