pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_document;
pub mod order_timeline;
pub mod service;
pub mod user;
