pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_services_table;
mod m20250101_000002_create_orders_table;
mod m20250101_000003_create_order_timeline_table;
mod m20250101_000004_create_order_documents_table;
mod m20250101_000005_create_carts_table;
mod m20250101_000006_create_cart_items_table;
mod m20250101_000007_create_users_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_services_table::Migration),
            Box::new(m20250101_000002_create_orders_table::Migration),
            Box::new(m20250101_000003_create_order_timeline_table::Migration),
            Box::new(m20250101_000004_create_order_documents_table::Migration),
            Box::new(m20250101_000005_create_carts_table::Migration),
            Box::new(m20250101_000006_create_cart_items_table::Migration),
            Box::new(m20250101_000007_create_users_table::Migration),
        ]
    }
}
