pub mod auth;
pub mod cart;
pub mod categories;
pub mod customers;
pub mod orders;
pub mod products;
